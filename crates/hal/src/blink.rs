// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::gpio::Pin;
use crate::reg::RegisterBus;

/// Delay counts used by the two firmware images.
pub const DELAY_HSI: u32 = 500_000;
pub const DELAY_PLL: u32 = 5_000_000;

/// Flip the pin's ODR bit. Returns the new level.
pub fn toggle<B: RegisterBus>(bus: &mut B, pin: Pin) -> bool {
    let odr = pin.port().odr();
    let mask = pin.odr_mask();
    let next = bus.read(odr) ^ mask;
    bus.write(odr, next);
    next & mask != 0
}

/// Busy-wait by counting `count` down to zero, running `step` once per count.
///
/// `step` is where the target puts its `nop`; the counter itself has no
/// other side effect.
pub fn spin_delay<F: FnMut()>(count: u32, mut step: F) {
    let mut remaining = count;
    while remaining > 0 {
        step();
        remaining = core::hint::black_box(remaining) - 1;
    }
}

/// Toggle, wait, repeat. Only power-off stops it.
pub fn run<B, D>(bus: &mut B, pin: Pin, mut delay: D) -> !
where
    B: RegisterBus,
    D: FnMut(),
{
    loop {
        toggle(bus, pin);
        delay();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{Port, LED_PA5};
    use crate::reg::testing::FlatBus;

    #[test]
    fn test_toggle_two_cycle_law() {
        let mut bus = FlatBus::default();
        let odr = Port::A.odr();

        assert!(toggle(&mut bus, LED_PA5));
        assert_eq!(bus.get(odr) & (1 << 5), 1 << 5);

        assert!(!toggle(&mut bus, LED_PA5));
        assert_eq!(bus.get(odr) & (1 << 5), 0);
    }

    #[test]
    fn test_toggle_leaves_other_outputs() {
        let mut bus = FlatBus::default();
        bus.set(Port::A.odr(), 0b1001);
        toggle(&mut bus, LED_PA5);
        assert_eq!(bus.get(Port::A.odr()), 0b10_1001);
    }

    #[test]
    fn test_spin_delay_steps_once_per_count() {
        let mut steps = 0u32;
        spin_delay(0, || steps += 1);
        assert_eq!(steps, 0);

        spin_delay(DELAY_HSI, || steps += 1);
        assert_eq!(steps, DELAY_HSI);
    }
}

// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::device::{self, gpio, rcc};
use crate::reg::{Reg, RegisterBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    H,
}

impl Port {
    pub const ALL: [Port; 6] = [Port::A, Port::B, Port::C, Port::D, Port::E, Port::H];

    pub const fn base(self) -> u32 {
        match self {
            Port::A => device::GPIOA_BASE,
            Port::B => device::GPIOB_BASE,
            Port::C => device::GPIOC_BASE,
            Port::D => device::GPIOD_BASE,
            Port::E => device::GPIOE_BASE,
            Port::H => device::GPIOH_BASE,
        }
    }

    /// RCC_AHB1ENR enable bit for this port.
    pub const fn enable_bit(self) -> rcc::Ahb1Enr {
        match self {
            Port::A => rcc::Ahb1Enr::GPIOAEN,
            Port::B => rcc::Ahb1Enr::GPIOBEN,
            Port::C => rcc::Ahb1Enr::GPIOCEN,
            Port::D => rcc::Ahb1Enr::GPIODEN,
            Port::E => rcc::Ahb1Enr::GPIOEEN,
            Port::H => rcc::Ahb1Enr::GPIOHEN,
        }
    }

    pub const fn moder(self) -> Reg {
        Reg::new("GPIO_MODER", self.base(), gpio::MODER)
    }

    pub const fn odr(self) -> Reg {
        Reg::new("GPIO_ODR", self.base(), gpio::ODR)
    }

    pub const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
            Port::H => 'H',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pin {
    port: Port,
    index: u8,
}

impl Pin {
    /// Panics (at compile time in a `const`) if `index` is not 0..=15.
    pub const fn new(port: Port, index: u8) -> Self {
        assert!(index < 16, "GPIO pin index out of range");
        Self { port, index }
    }

    pub const fn try_new(port: Port, index: u8) -> Option<Self> {
        if index < 16 {
            Some(Self { port, index })
        } else {
            None
        }
    }

    pub const fn port(self) -> Port {
        self.port
    }

    pub const fn index(self) -> u8 {
        self.index
    }

    /// The two MODER bits belonging to this pin.
    pub const fn mode_mask(self) -> u32 {
        gpio::MODE_MASK << (self.index as u32 * 2)
    }

    pub const fn odr_mask(self) -> u32 {
        1 << self.index as u32
    }
}

/// NUCLEO-F401RE user LED LD2.
pub const LED_PA5: Pin = Pin::new(Port::A, 5);

pub fn enable_port_clock<B: RegisterBus>(bus: &mut B, port: Port) {
    bus.set_bits(rcc::AHB1ENR, port.enable_bit().bits());
}

/// Set `pin` to general-purpose output. Only the pin's own MODER field changes.
pub fn set_output<B: RegisterBus>(bus: &mut B, pin: Pin) {
    let shift = pin.index() as u32 * 2;
    bus.modify(pin.port().moder(), |moder| {
        (moder & !pin.mode_mask()) | (gpio::MODE_OUTPUT << shift)
    });
}

/// Port clock on, then output mode.
pub fn configure_output<B: RegisterBus>(bus: &mut B, pin: Pin) {
    enable_port_clock(bus, pin.port());
    set_output(bus, pin);
}

/// MODER field of `pin` as last written.
pub fn mode<B: RegisterBus>(bus: &mut B, pin: Pin) -> u32 {
    (bus.read(pin.port().moder()) >> (pin.index() as u32 * 2)) & gpio::MODE_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::testing::FlatBus;

    #[test]
    fn test_set_output_touches_only_own_field() {
        for index in 0..16 {
            let pin = Pin::new(Port::A, index);
            let mut bus = FlatBus::default();
            bus.set(Port::A.moder(), 0xFFFF_FFFF);
            set_output(&mut bus, pin);

            let moder = bus.get(Port::A.moder());
            assert_eq!(moder & !pin.mode_mask(), !pin.mode_mask(), "pin {}", index);
            assert_eq!((moder >> (index * 2)) & 0b11, gpio::MODE_OUTPUT);
        }
    }

    #[test]
    fn test_configure_output_enables_port_clock_first() {
        let mut bus = FlatBus::default();
        configure_output(&mut bus, Pin::new(Port::C, 13));

        assert_eq!(bus.get(rcc::AHB1ENR), rcc::Ahb1Enr::GPIOCEN.bits());
        assert_eq!(bus.get(Port::C.moder()), 0b01 << 26);
        assert_eq!(bus.log.len(), 4);
    }

    #[test]
    fn test_mode_reads_back_own_field() {
        let mut bus = FlatBus::default();
        bus.set(Port::A.moder(), gpio::MODER_RESET_A);

        assert_eq!(mode(&mut bus, LED_PA5), gpio::MODE_INPUT);
        set_output(&mut bus, LED_PA5);
        assert_eq!(mode(&mut bus, LED_PA5), gpio::MODE_OUTPUT);
        // SWDIO and SWCLK stay in alternate function mode.
        assert_eq!(mode(&mut bus, Pin::new(Port::A, 13)), gpio::MODE_ALTERNATE);
        assert_eq!(mode(&mut bus, Pin::new(Port::A, 14)), gpio::MODE_ALTERNATE);
    }

    #[test]
    fn test_pin_bounds() {
        assert!(Pin::try_new(Port::B, 15).is_some());
        assert!(Pin::try_new(Port::B, 16).is_none());
        assert_eq!(LED_PA5.odr_mask(), 1 << 5);
        assert_eq!(LED_PA5.mode_mask(), 0b11 << 10);
    }
}

#![no_std]
// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.
#![no_main]

use cortex_m_rt::entry;
use f4blink_hal::blink::{self, DELAY_HSI};
use f4blink_hal::gpio::{self, LED_PA5};
use f4blink_hal::Mmio;
use panic_halt as _;

#[entry]
fn main() -> ! {
    // SAFETY: sole owner of RCC/GPIO on this device.
    let mut bus = unsafe { Mmio::steal() };

    // Reset clock is the 16 MHz HSI; nothing to configure.
    gpio::configure_output(&mut bus, LED_PA5);

    blink::run(&mut bus, LED_PA5, || {
        blink::spin_delay(DELAY_HSI, cortex_m::asm::nop)
    })
}

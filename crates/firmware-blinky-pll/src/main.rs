#![no_std]
// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.
#![no_main]
#![allow(clippy::empty_loop)]

use f4blink_hal::blink::{self, DELAY_PLL};
use f4blink_hal::clock::{self, ClockConfig, WaitPolicy};
use f4blink_hal::gpio::{self, LED_PA5};
use f4blink_hal::Mmio;
use panic_halt as _;

const CLOCK: ClockConfig = ClockConfig::NUCLEO_F401RE;

// Reject an out-of-range clock tree at compile time.
const _: () = assert!(CLOCK.validate().is_ok());

/// Called by `Reset` once `.data` and `.bss` are initialized.
#[no_mangle]
pub extern "C" fn main() {
    // SAFETY: sole owner of RCC/FLASH/GPIO on this device.
    let mut bus = unsafe { Mmio::steal() };

    if clock::configure_pll(&mut bus, &CLOCK, WaitPolicy::Forever).is_err() {
        halt();
    }
    if !clock::verify_pll_selected(&mut bus) {
        halt();
    }

    gpio::configure_output(&mut bus, LED_PA5);

    blink::run(&mut bus, LED_PA5, || {
        blink::spin_delay(DELAY_PLL, cortex_m::asm::nop)
    })
}

fn halt() -> ! {
    loop {}
}

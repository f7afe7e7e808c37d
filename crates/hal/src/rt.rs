// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Vector table and reset trampoline for images that do not use
//! `cortex-m-rt`. The linker script must place `.vector_table` at the start
//! of flash and define `_sidata`, `_sdata`, `_edata`, `_sbss` and `_ebss`.

#![allow(non_snake_case)]

use crate::device::STACK_START;
use crate::startup::{self, Slot};
use core::ptr::{addr_of, addr_of_mut};

extern "C" {
    static _sidata: u32;
    static mut _sdata: u32;
    static mut _edata: u32;
    static mut _sbss: u32;
    static mut _ebss: u32;

    /// Application entry point, exported by the firmware crate.
    fn main();
}

/// One vector table slot.
#[derive(Clone, Copy)]
#[repr(C)]
pub union Vector {
    handler: unsafe extern "C" fn() -> !,
    word: u32,
}

impl Vector {
    const RESERVED: Self = Self { word: 0 };
    const DEFAULT: Self = Self {
        handler: DefaultHandler,
    };
}

/// Built from [`startup::VECTOR_SLOTS`]: stack top, `Reset`, zero for the
/// reserved slots, `DefaultHandler` for every system exception.
#[link_section = ".vector_table"]
#[no_mangle]
#[used]
pub static VECTOR_TABLE: [Vector; 16] = vector_table();

const fn vector_table() -> [Vector; 16] {
    let mut table = [Vector::DEFAULT; 16];
    let mut i = 0;
    while i < table.len() {
        table[i] = match startup::VECTOR_SLOTS[i] {
            Slot::StackTop => Vector { word: STACK_START },
            Slot::Reset => Vector { handler: Reset },
            Slot::Exception(_) => Vector::DEFAULT,
            Slot::Reserved => Vector::RESERVED,
        };
        i += 1;
    }
    table
}

/// Initialize `.data` and `.bss`, then run `main`. Never returns.
#[no_mangle]
pub unsafe extern "C" fn Reset() -> ! {
    startup::copy_words(addr_of!(_sidata), addr_of_mut!(_sdata), addr_of_mut!(_edata));
    startup::zero_words(addr_of_mut!(_sbss), addr_of_mut!(_ebss));

    main();

    // main is not supposed to return.
    loop {
        core::hint::spin_loop();
    }
}

/// Every fault and exception lands here and stays here.
#[no_mangle]
pub unsafe extern "C" fn DefaultHandler() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

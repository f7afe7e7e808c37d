// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register access layer.
//!
//! Every routine in this crate talks to hardware through a [`RegisterBus`]
//! handle passed in by the caller. On the device that handle is [`Mmio`];
//! on the host it is the register simulator.

use core::fmt;

/// A named 32-bit memory-mapped register.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    name: &'static str,
    addr: u32,
}

impl Reg {
    pub const fn new(name: &'static str, base: u32, offset: u32) -> Self {
        Self {
            name,
            addr: base + offset,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn addr(&self) -> u32 {
        self.addr
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#010x}", self.name, self.addr)
    }
}

/// Volatile, ordered access to the device registers.
///
/// Reads take `&mut self`: a read may have a hardware side effect, and an
/// implementation is allowed to observe it.
pub trait RegisterBus {
    fn read(&mut self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, value: u32);

    /// Read-modify-write. Always issues exactly one read followed by one write.
    fn modify<F>(&mut self, reg: Reg, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    fn set_bits(&mut self, reg: Reg, mask: u32) {
        self.modify(reg, |v| v | mask);
    }

    /// Clear `mask`, then OR in `value & mask`, in a single read-modify-write.
    fn write_field(&mut self, reg: Reg, mask: u32, value: u32) {
        self.modify(reg, |v| (v & !mask) | (value & mask));
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read(&mut self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

/// Direct memory-mapped access to the real peripherals.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Must run on an STM32F401 and at most one `Mmio` may exist at a time;
    /// the routines in this crate assume they are the only code touching
    /// RCC, FLASH and GPIO.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline(always)]
    fn read(&mut self, reg: Reg) -> u32 {
        unsafe { core::ptr::read_volatile(reg.addr() as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&mut self, reg: Reg, value: u32) {
        unsafe { core::ptr::write_volatile(reg.addr() as usize as *mut u32, value) }
    }
}

// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Memory initialization run by the reset handler before `main`.

use core::ptr;

/// Copy words from `src` into `dst` until `dst` reaches `dst_end`.
///
/// # Safety
///
/// `dst..dst_end` must be writable, word aligned and not overlap the source;
/// `src` must be readable for the same number of words.
pub unsafe fn copy_words(mut src: *const u32, mut dst: *mut u32, dst_end: *mut u32) {
    while dst < dst_end {
        ptr::write_volatile(dst, ptr::read_volatile(src));
        dst = dst.add(1);
        src = src.add(1);
    }
}

/// Zero every word in `start..end`.
///
/// # Safety
///
/// `start..end` must be writable and word aligned.
pub unsafe fn zero_words(mut start: *mut u32, end: *mut u32) {
    while start < end {
        ptr::write_volatile(start, 0);
        start = start.add(1);
    }
}

/// What occupies each of the 16 Cortex-M vector table slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Initial main stack pointer.
    StackTop,
    Reset,
    /// A system exception routed to the default handler.
    Exception(&'static str),
    /// Architecturally reserved; must hold 0.
    Reserved,
}

pub const VECTOR_SLOTS: [Slot; 16] = [
    Slot::StackTop,
    Slot::Reset,
    Slot::Exception("NMI"),
    Slot::Exception("HardFault"),
    Slot::Exception("MemManage"),
    Slot::Exception("BusFault"),
    Slot::Exception("UsageFault"),
    Slot::Reserved,
    Slot::Reserved,
    Slot::Reserved,
    Slot::Reserved,
    Slot::Exception("SVCall"),
    Slot::Exception("DebugMonitor"),
    Slot::Reserved,
    Slot::Exception("PendSV"),
    Slot::Exception("SysTick"),
];

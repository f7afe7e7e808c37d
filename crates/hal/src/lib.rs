// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bare-metal bring-up for the STM32F401RE: register access, PLL clock
//! sequencing, GPIO output configuration, the blink loop and the startup
//! trampoline.
//!
//! All hardware routines take an explicit [`reg::RegisterBus`], so the same
//! code runs against [`reg::Mmio`] on the device and against a simulated
//! register file on the host.

#![cfg_attr(not(test), no_std)]

pub mod blink;
pub mod clock;
pub mod device;
pub mod gpio;
pub mod reg;
pub mod startup;

#[cfg(all(feature = "rt", target_arch = "arm", target_os = "none"))]
pub mod rt;

pub use clock::{ClockConfig, ClockError, ClockReport, WaitPolicy};
pub use gpio::{Pin, Port};
pub use reg::{Mmio, Reg, RegisterBus};

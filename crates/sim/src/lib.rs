// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod peripherals;

use std::any::Any;

pub use bus::SystemBus;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Unaligned register access at {0:#x}")]
    Unaligned(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Something the firmware did that real hardware would not tolerate.
///
/// Violations are recorded, never raised: the simulated hardware behaves the
/// way the silicon does (ignores the write, keeps running on the old clock)
/// and the test or CLI inspects the log afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("access to unmapped address {addr:#x}")]
    Unmapped { addr: u64 },
    #[error("RCC_PLLCFGR written ({value:#010x}) while PLLON is set; write ignored")]
    PllConfigWhilePllOn { value: u32 },
    #[error("{peripheral} written at offset {offset:#x} with its AHB1 clock disabled; write ignored")]
    GpioWriteWithClockOff { peripheral: String, offset: u64 },
    #[error("SYSCLK {sysclk_hz} Hz needs {required} flash wait states, FLASH_ACR has {configured}")]
    InsufficientFlashLatency {
        sysclk_hz: u32,
        required: u8,
        configured: u8,
    },
    #[error("{bus} clock {hz} Hz above its {max_hz} Hz limit")]
    BusClockOutOfRange {
        bus: &'static str,
        hz: u32,
        max_hz: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

/// One register access as seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BusEvent {
    pub seq: u64,
    pub kind: AccessKind,
    pub addr: u64,
    pub value: u32,
}

/// A memory-mapped peripheral with 32-bit registers.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u32>;
    fn write(&mut self, offset: u64, value: u32) -> SimResult<()>;

    /// Advance hardware state by one bus access.
    fn tick(&mut self) {}

    /// Writes this peripheral refused since the last call.
    fn take_violations(&mut self) -> Vec<Violation> {
        Vec::new()
    }

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

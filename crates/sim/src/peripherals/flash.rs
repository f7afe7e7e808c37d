// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use f4blink_hal::device::flash::LATENCY_MASK;

const ACR: u64 = 0x00;

// LATENCY, PRFTEN, ICEN, DCEN
const ACR_WRITABLE: u32 = LATENCY_MASK | (0x7 << 8);
// ICRST and DCRST self-clear.
const ACR_CACHE_RESET: u32 = 0x3 << 11;

/// Flash interface: only the access control register is modelled.
#[derive(Debug, Default, serde::Serialize)]
pub struct Flash {
    acr: u32,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency(&self) -> u8 {
        (self.acr & LATENCY_MASK) as u8
    }
}

impl crate::Peripheral for Flash {
    fn read(&self, offset: u64) -> SimResult<u32> {
        Ok(match offset {
            ACR => self.acr,
            _ => 0,
        })
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        match offset {
            ACR => {
                if value & ACR_CACHE_RESET != 0 {
                    tracing::debug!("FLASH: cache reset requested");
                }
                self.acr = value & ACR_WRITABLE;
            }
            _ => tracing::debug!("FLASH: write to unmodelled offset {:#x}", offset),
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

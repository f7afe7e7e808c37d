// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use f4blink_hal::device::gpio as regs;
use f4blink_hal::gpio::Port;

/// STM32F4 GPIO port (MODER/OTYPER/OSPEEDR/PUPDR/IDR/ODR/BSRR/LCKR/AFR).
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioPort {
    moder: u32,   // 0x00: mode register
    otyper: u32,  // 0x04: output type register
    ospeedr: u32, // 0x08: output speed register
    pupdr: u32,   // 0x0C: pull-up/pull-down register
    idr: u32,     // 0x10: input data register
    odr: u32,     // 0x14: output data register
    lckr: u32,    // 0x1C: configuration lock register
    afrl: u32,    // 0x20: alternate function low register
    afrh: u32,    // 0x24: alternate function high register
}

impl GpioPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port with its datasheet reset values; A and B keep the debug pins in
    /// alternate function mode.
    pub fn for_port(port: Port) -> Self {
        let mut gpio = Self::new();
        match port {
            Port::A => {
                gpio.moder = regs::MODER_RESET_A;
                gpio.ospeedr = 0x0C00_0000;
                gpio.pupdr = 0x6400_0000;
            }
            Port::B => {
                gpio.moder = regs::MODER_RESET_B;
                gpio.ospeedr = 0x0000_00C0;
                gpio.pupdr = 0x0000_0100;
            }
            _ => {}
        }
        gpio
    }

    pub fn moder(&self) -> u32 {
        self.moder
    }

    pub fn odr(&self) -> u32 {
        self.odr
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset as u32 {
            regs::MODER => self.moder,
            regs::OTYPER => self.otyper,
            regs::OSPEEDR => self.ospeedr,
            regs::PUPDR => self.pupdr,
            regs::IDR => self.idr,
            regs::ODR => self.odr,
            regs::LCKR => self.lckr,
            regs::AFRL => self.afrl,
            regs::AFRH => self.afrh,
            // BSRR reads as zero.
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset as u32 {
            regs::MODER => self.moder = value,
            regs::OTYPER => self.otyper = value & 0xFFFF,
            regs::OSPEEDR => self.ospeedr = value,
            regs::PUPDR => self.pupdr = value,
            regs::ODR => self.odr = value & 0xFFFF,
            regs::BSRR => {
                // Lower 16 bits set, upper 16 bits reset; set wins.
                let set = value & 0xFFFF;
                let reset = (value >> 16) & 0xFFFF;
                self.odr &= !reset;
                self.odr |= set;
            }
            regs::LCKR => self.lckr = value,
            regs::AFRL => self.afrl = value,
            regs::AFRH => self.afrh = value,
            _ => {}
        }
    }
}

impl crate::Peripheral for GpioPort {
    fn read(&self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

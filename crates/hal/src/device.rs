// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! STM32F401RE register map (RM0368). Only the blocks this firmware touches.

use crate::reg::Reg;
use bitflags::bitflags;

pub const RCC_BASE: u32 = 0x4002_3800;
pub const FLASH_BASE: u32 = 0x4002_3C00;

pub const GPIOA_BASE: u32 = 0x4002_0000;
pub const GPIOB_BASE: u32 = 0x4002_0400;
pub const GPIOC_BASE: u32 = 0x4002_0800;
pub const GPIOD_BASE: u32 = 0x4002_0C00;
pub const GPIOE_BASE: u32 = 0x4002_1000;
pub const GPIOH_BASE: u32 = 0x4002_1C00;

/// End of the 96 KiB SRAM; initial main stack pointer.
pub const STACK_START: u32 = 0x2001_8000;

pub mod rcc {
    use super::*;

    pub const CR: Reg = Reg::new("RCC_CR", RCC_BASE, 0x00);
    pub const PLLCFGR: Reg = Reg::new("RCC_PLLCFGR", RCC_BASE, 0x04);
    pub const CFGR: Reg = Reg::new("RCC_CFGR", RCC_BASE, 0x08);
    pub const AHB1ENR: Reg = Reg::new("RCC_AHB1ENR", RCC_BASE, 0x30);

    bitflags! {
        /// RCC_CR control and ready bits.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Cr: u32 {
            const HSION = 1 << 0;
            const HSIRDY = 1 << 1;
            const HSEON = 1 << 16;
            const HSERDY = 1 << 17;
            const HSEBYP = 1 << 18;
            const CSSON = 1 << 19;
            const PLLON = 1 << 24;
            const PLLRDY = 1 << 25;
        }
    }

    bitflags! {
        /// RCC_AHB1ENR GPIO port clock enables.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Ahb1Enr: u32 {
            const GPIOAEN = 1 << 0;
            const GPIOBEN = 1 << 1;
            const GPIOCEN = 1 << 2;
            const GPIODEN = 1 << 3;
            const GPIOEEN = 1 << 4;
            const GPIOHEN = 1 << 7;
        }
    }

    // Reset values.
    pub const CR_RESET: u32 = 0x0000_0083;
    pub const PLLCFGR_RESET: u32 = 0x2400_3010;

    // PLLCFGR fields.
    pub const PLLM_SHIFT: u32 = 0;
    pub const PLLM_MASK: u32 = 0x3F << PLLM_SHIFT;
    pub const PLLN_SHIFT: u32 = 6;
    pub const PLLN_MASK: u32 = 0x1FF << PLLN_SHIFT;
    pub const PLLP_SHIFT: u32 = 16;
    pub const PLLP_MASK: u32 = 0x3 << PLLP_SHIFT;
    pub const PLLSRC_HSE: u32 = 1 << 22;
    pub const PLLQ_SHIFT: u32 = 24;
    pub const PLLQ_MASK: u32 = 0xF << PLLQ_SHIFT;

    // CFGR fields.
    pub const SW_SHIFT: u32 = 0;
    pub const SW_MASK: u32 = 0x3 << SW_SHIFT;
    pub const SWS_SHIFT: u32 = 2;
    pub const SWS_MASK: u32 = 0x3 << SWS_SHIFT;
    pub const HPRE_SHIFT: u32 = 4;
    pub const HPRE_MASK: u32 = 0xF << HPRE_SHIFT;
    pub const PPRE1_SHIFT: u32 = 10;
    pub const PPRE1_MASK: u32 = 0x7 << PPRE1_SHIFT;
    pub const PPRE2_SHIFT: u32 = 13;
    pub const PPRE2_MASK: u32 = 0x7 << PPRE2_SHIFT;

    /// SW / SWS encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    pub enum SysclkSource {
        Hsi = 0b00,
        Hse = 0b01,
        Pll = 0b10,
    }

    impl SysclkSource {
        /// Decode a two-bit SW/SWS field; `0b11` is not allowed on this part.
        pub const fn from_bits(bits: u32) -> Option<Self> {
            match bits & 0b11 {
                0b00 => Some(Self::Hsi),
                0b01 => Some(Self::Hse),
                0b10 => Some(Self::Pll),
                _ => None,
            }
        }

        pub const fn bits(self) -> u32 {
            self as u32
        }
    }

    /// Source currently reported by CFGR.SWS.
    pub const fn sws(cfgr: u32) -> Option<SysclkSource> {
        SysclkSource::from_bits((cfgr & SWS_MASK) >> SWS_SHIFT)
    }
}

pub mod flash {
    use super::*;

    pub const ACR: Reg = Reg::new("FLASH_ACR", FLASH_BASE, 0x00);

    pub const LATENCY_MASK: u32 = 0xF;
    pub const MAX_LATENCY: u8 = 15;
}

pub mod gpio {
    /// Offsets within a GPIO block.
    pub const MODER: u32 = 0x00;
    pub const OTYPER: u32 = 0x04;
    pub const OSPEEDR: u32 = 0x08;
    pub const PUPDR: u32 = 0x0C;
    pub const IDR: u32 = 0x10;
    pub const ODR: u32 = 0x14;
    pub const BSRR: u32 = 0x18;
    pub const LCKR: u32 = 0x1C;
    pub const AFRL: u32 = 0x20;
    pub const AFRH: u32 = 0x24;

    pub const MODE_MASK: u32 = 0b11;
    pub const MODE_INPUT: u32 = 0b00;
    pub const MODE_OUTPUT: u32 = 0b01;
    pub const MODE_ALTERNATE: u32 = 0b10;
    pub const MODE_ANALOG: u32 = 0b11;

    /// MODER reset values: PA13/PA14/PA15 and PB3/PB4 come up in their debug
    /// alternate function.
    pub const MODER_RESET_A: u32 = 0xA800_0000;
    pub const MODER_RESET_B: u32 = 0x0000_0280;
}

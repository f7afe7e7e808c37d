// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, Violation};
use f4blink_hal::clock::{ApbPrescaler, HSI_HZ};
use f4blink_hal::device::rcc::{self as regs, Cr, SysclkSource};

const CR: u64 = 0x00;
const PLLCFGR: u64 = 0x04;
const CFGR: u64 = 0x08;
const AHB1ENR: u64 = 0x30;

const HSITRIM_MASK: u32 = 0x1F << 3;
const CR_WRITABLE: u32 = Cr::HSION.bits()
    | HSITRIM_MASK
    | Cr::HSEON.bits()
    | Cr::HSEBYP.bits()
    | Cr::CSSON.bits()
    | Cr::PLLON.bits();
const PLLCFGR_WRITABLE: u32 =
    regs::PLLM_MASK | regs::PLLN_MASK | regs::PLLP_MASK | regs::PLLSRC_HSE | regs::PLLQ_MASK;
// GPIOA..E, GPIOH, CRC, DMA1, DMA2
const AHB1ENR_WRITABLE: u32 = 0x0060_109F;

/// Oscillator and switch timing of the simulated RCC, counted in bus accesses.
///
/// A latency of `n` means the firmware sees the status flag clear on `n`
/// polls and set on poll `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RccTiming {
    pub hse_hz: u32,
    /// With `false` HSERDY never rises, as with an unpopulated crystal.
    pub hse_present: bool,
    pub hse_latency: u32,
    pub pll_latency: u32,
    pub switch_latency: u32,
}

impl Default for RccTiming {
    fn default() -> Self {
        Self {
            hse_hz: 8_000_000,
            hse_present: true,
            hse_latency: 0,
            pll_latency: 0,
            switch_latency: 0,
        }
    }
}

impl From<&f4blink_config::BoardProfile> for RccTiming {
    fn from(profile: &f4blink_config::BoardProfile) -> Self {
        let sim = &profile.simulation;
        Self {
            hse_hz: profile.hse_hz,
            hse_present: sim.hse_present,
            hse_latency: sim.hse_latency,
            pll_latency: sim.pll_latency,
            switch_latency: sim.switch_latency,
        }
    }
}

/// Frequencies implied by the current RCC register state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ClockTree {
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
struct PendingSwitch {
    remaining: u32,
    target: u32,
}

/// STM32F401 Reset and Clock Control: HSE, main PLL, SYSCLK mux, bus
/// prescalers and the AHB1 GPIO clock gates.
#[derive(Debug, serde::Serialize)]
pub struct Rcc {
    timing: RccTiming,
    cr: u32,
    pllcfgr: u32,
    cfgr: u32,
    ahb1enr: u32,
    hse_pending: Option<u32>,
    pll_pending: Option<u32>,
    switch_pending: Option<PendingSwitch>,
    #[serde(skip)]
    violations: Vec<Violation>,
}

impl Default for Rcc {
    fn default() -> Self {
        Self::new()
    }
}

impl Rcc {
    pub fn new() -> Self {
        Self::with_timing(RccTiming::default())
    }

    pub fn with_timing(timing: RccTiming) -> Self {
        Self {
            timing,
            cr: regs::CR_RESET,
            pllcfgr: regs::PLLCFGR_RESET,
            cfgr: 0,
            ahb1enr: 0,
            hse_pending: None,
            pll_pending: None,
            switch_pending: None,
            violations: Vec::new(),
        }
    }

    pub fn timing(&self) -> RccTiming {
        self.timing
    }

    pub fn ahb1enr(&self) -> u32 {
        self.ahb1enr
    }

    pub fn cr(&self) -> Cr {
        Cr::from_bits_retain(self.cr)
    }

    pub fn pllcfgr(&self) -> u32 {
        self.pllcfgr
    }

    pub fn cfgr(&self) -> u32 {
        self.cfgr
    }

    pub fn sysclk_source(&self) -> Option<SysclkSource> {
        regs::sws(self.cfgr)
    }

    pub fn clock_tree(&self) -> ClockTree {
        let sysclk_hz = match self.sysclk_source() {
            Some(SysclkSource::Hsi) | None => HSI_HZ,
            Some(SysclkSource::Hse) => self.timing.hse_hz,
            Some(SysclkSource::Pll) => self.pll_output_hz(),
        };
        let hclk_hz = sysclk_hz / ahb_divisor((self.cfgr & regs::HPRE_MASK) >> regs::HPRE_SHIFT);
        let ppre1 = ApbPrescaler::from_bits((self.cfgr & regs::PPRE1_MASK) >> regs::PPRE1_SHIFT);
        let ppre2 = ApbPrescaler::from_bits((self.cfgr & regs::PPRE2_MASK) >> regs::PPRE2_SHIFT);

        ClockTree {
            sysclk_hz,
            hclk_hz,
            pclk1_hz: hclk_hz / ppre1.divisor(),
            pclk2_hz: hclk_hz / ppre2.divisor(),
        }
    }

    fn pll_output_hz(&self) -> u32 {
        let m = (self.pllcfgr & regs::PLLM_MASK) >> regs::PLLM_SHIFT;
        let n = (self.pllcfgr & regs::PLLN_MASK) >> regs::PLLN_SHIFT;
        let p = (((self.pllcfgr & regs::PLLP_MASK) >> regs::PLLP_SHIFT) + 1) * 2;
        if m == 0 {
            return 0;
        }
        let input = if self.pllcfgr & regs::PLLSRC_HSE != 0 {
            self.timing.hse_hz
        } else {
            HSI_HZ
        };
        (input as u64 * n as u64 / m as u64 / p as u64) as u32
    }

    fn pll_input_ready(&self) -> bool {
        let cr = self.cr();
        if self.pllcfgr & regs::PLLSRC_HSE != 0 {
            cr.contains(Cr::HSERDY)
        } else {
            cr.contains(Cr::HSIRDY)
        }
    }

    fn source_ready(&self, source: SysclkSource) -> bool {
        let cr = self.cr();
        match source {
            SysclkSource::Hsi => cr.contains(Cr::HSIRDY),
            SysclkSource::Hse => cr.contains(Cr::HSERDY),
            SysclkSource::Pll => cr.contains(Cr::PLLRDY),
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            CR => self.cr,
            PLLCFGR => self.pllcfgr,
            CFGR => self.cfgr,
            AHB1ENR => self.ahb1enr,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            CR => self.write_cr(value),
            PLLCFGR => {
                if self.cr().contains(Cr::PLLON) {
                    tracing::warn!("RCC: PLLCFGR write {:#010x} ignored, PLL is on", value);
                    self.violations
                        .push(Violation::PllConfigWhilePllOn { value });
                } else {
                    self.pllcfgr = value & PLLCFGR_WRITABLE;
                }
            }
            CFGR => self.write_cfgr(value),
            AHB1ENR => self.ahb1enr = value & AHB1ENR_WRITABLE,
            _ => tracing::debug!("RCC: write to unmodelled offset {:#x}", offset),
        }
    }

    fn write_cr(&mut self, value: u32) {
        let old = self.cr();
        let mut control = value & CR_WRITABLE;
        if old.contains(Cr::HSEON) {
            // HSEBYP is locked while the oscillator runs.
            control = (control & !Cr::HSEBYP.bits()) | (self.cr & Cr::HSEBYP.bits());
        }
        self.cr = (self.cr & !CR_WRITABLE) | control;
        let new = self.cr();

        if new.contains(Cr::HSEON) && !old.contains(Cr::HSEON) {
            if self.timing.hse_present {
                self.hse_pending = Some(self.timing.hse_latency);
            } else {
                tracing::debug!("RCC: HSEON set with no oscillator fitted");
            }
        } else if !new.contains(Cr::HSEON) && old.contains(Cr::HSEON) {
            self.hse_pending = None;
            self.cr &= !Cr::HSERDY.bits();
        }

        if new.contains(Cr::PLLON) && !old.contains(Cr::PLLON) {
            self.pll_pending = Some(self.timing.pll_latency);
        } else if !new.contains(Cr::PLLON) && old.contains(Cr::PLLON) {
            self.pll_pending = None;
            self.cr &= !Cr::PLLRDY.bits();
        }
    }

    fn write_cfgr(&mut self, value: u32) {
        let old_sw = self.cfgr & regs::SW_MASK;
        self.cfgr = (self.cfgr & regs::SWS_MASK) | (value & !regs::SWS_MASK);
        let sw = self.cfgr & regs::SW_MASK;
        if sw == old_sw {
            return;
        }
        match SysclkSource::from_bits(sw >> regs::SW_SHIFT) {
            Some(target) if Some(target) != self.sysclk_source() => {
                self.switch_pending = Some(PendingSwitch {
                    remaining: self.timing.switch_latency,
                    target: target.bits(),
                });
            }
            Some(_) => self.switch_pending = None,
            None => tracing::debug!("RCC: reserved SW encoding {:#b}", sw),
        }
    }
}

/// HPRE: `0xxx` is /1, `1000` to `1111` are /2, /4, /8, /16, /64, /128, /256, /512.
fn ahb_divisor(hpre: u32) -> u32 {
    match hpre & 0xF {
        0b1000 => 2,
        0b1001 => 4,
        0b1010 => 8,
        0b1011 => 16,
        0b1100 => 64,
        0b1101 => 128,
        0b1110 => 256,
        0b1111 => 512,
        _ => 1,
    }
}

impl crate::Peripheral for Rcc {
    fn read(&self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn tick(&mut self) {
        if let Some(remaining) = self.hse_pending {
            if remaining == 0 {
                self.cr |= Cr::HSERDY.bits();
                self.hse_pending = None;
            } else {
                self.hse_pending = Some(remaining - 1);
            }
        }

        if let Some(remaining) = self.pll_pending {
            if remaining > 0 {
                self.pll_pending = Some(remaining - 1);
            } else if self.pll_input_ready() {
                self.cr |= Cr::PLLRDY.bits();
                self.pll_pending = None;
            }
        }

        if let Some(pending) = self.switch_pending {
            if pending.remaining > 0 {
                self.switch_pending = Some(PendingSwitch {
                    remaining: pending.remaining - 1,
                    ..pending
                });
            } else if let Some(target) = SysclkSource::from_bits(pending.target) {
                // The mux only moves once the target clock is stable.
                if self.source_ready(target) {
                    self.cfgr = (self.cfgr & !regs::SWS_MASK) | (target.bits() << regs::SWS_SHIFT);
                    self.switch_pending = None;
                }
            }
        }
    }

    fn take_violations(&mut self) -> Vec<Violation> {
        std::mem::take(&mut self.violations)
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

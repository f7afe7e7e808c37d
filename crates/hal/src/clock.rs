// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! System clock bring-up: HSE, main PLL, flash latency, bus prescalers and
//! the SYSCLK switch, in the order the RCC requires.

use crate::device::flash;
use crate::device::rcc::{self, Cr, SysclkSource};
use crate::reg::RegisterBus;
use core::fmt;

pub const HSI_HZ: u32 = 16_000_000;

pub const HSE_MIN_HZ: u32 = 4_000_000;
pub const HSE_MAX_HZ: u32 = 26_000_000;
pub const VCO_IN_MIN_HZ: u32 = 1_000_000;
pub const VCO_IN_MAX_HZ: u32 = 2_000_000;
pub const VCO_OUT_MIN_HZ: u32 = 192_000_000;
pub const VCO_OUT_MAX_HZ: u32 = 432_000_000;
pub const SYSCLK_MAX_HZ: u32 = 84_000_000;
pub const APB1_MAX_HZ: u32 = 42_000_000;
pub const APB2_MAX_HZ: u32 = 84_000_000;

/// HCLK covered by each flash wait state at 2.7 V to 3.6 V.
pub const HZ_PER_WAIT_STATE: u32 = 30_000_000;

/// Main PLL factors: `VCO = HSE / m * n`, `SYSCLK = VCO / p`, `PLL48CLK = VCO / q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllConfig {
    pub m: u8,
    pub n: u16,
    pub p: u8,
    pub q: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    pub const fn from_divisor(divisor: u32) -> Option<Self> {
        match divisor {
            1 => Some(Self::Div1),
            2 => Some(Self::Div2),
            4 => Some(Self::Div4),
            8 => Some(Self::Div8),
            16 => Some(Self::Div16),
            _ => None,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            Self::Div1 => 1,
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
            Self::Div16 => 16,
        }
    }

    /// PPREx encoding: `0xx` is /1, `100` to `111` are /2 to /16.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Div1 => 0b000,
            Self::Div2 => 0b100,
            Self::Div4 => 0b101,
            Self::Div8 => 0b110,
            Self::Div16 => 0b111,
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b100 => Self::Div2,
            0b101 => Self::Div4,
            0b110 => Self::Div8,
            0b111 => Self::Div16,
            _ => Self::Div1,
        }
    }
}

/// Per-board clock tree settings. None of these numbers is fixed by the
/// hardware; they depend on the crystal fitted and the target frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub hse_hz: u32,
    /// HSE is an external clock signal rather than a crystal.
    pub hse_bypass: bool,
    pub pll: PllConfig,
    pub flash_latency: u8,
    pub apb1: ApbPrescaler,
    pub apb2: ApbPrescaler,
}

impl ClockConfig {
    /// NUCLEO-F401RE: 8 MHz from the ST-LINK MCO, 84 MHz SYSCLK, 48 MHz PLL48CLK.
    pub const NUCLEO_F401RE: Self = Self {
        hse_hz: 8_000_000,
        hse_bypass: true,
        pll: PllConfig {
            m: 8,
            n: 336,
            p: 4,
            q: 7,
        },
        flash_latency: 2,
        apb1: ApbPrescaler::Div2,
        apb2: ApbPrescaler::Div1,
    };

    /// Check every factor against the RM0368 limits and derive the resulting
    /// frequencies.
    pub const fn validate(&self) -> Result<Frequencies, ConfigError> {
        let pll = self.pll;
        if pll.m < 2 || pll.m > 63 {
            return Err(ConfigError::PllM(pll.m));
        }
        if pll.n < 50 || pll.n > 432 {
            return Err(ConfigError::PllN(pll.n));
        }
        if !matches!(pll.p, 2 | 4 | 6 | 8) {
            return Err(ConfigError::PllP(pll.p));
        }
        if pll.q < 2 || pll.q > 15 {
            return Err(ConfigError::PllQ(pll.q));
        }
        if self.hse_hz < HSE_MIN_HZ || self.hse_hz > HSE_MAX_HZ {
            return Err(ConfigError::HseFrequency(self.hse_hz));
        }

        let vco_in = self.hse_hz / pll.m as u32;
        let m = pll.m as u64;
        let hse = self.hse_hz as u64;
        if hse < VCO_IN_MIN_HZ as u64 * m || hse > VCO_IN_MAX_HZ as u64 * m {
            return Err(ConfigError::VcoInput(vco_in));
        }

        let vco = (hse * pll.n as u64 / m) as u32;
        if vco < VCO_OUT_MIN_HZ || vco > VCO_OUT_MAX_HZ {
            return Err(ConfigError::VcoOutput(vco));
        }

        let sysclk = vco / pll.p as u32;
        if sysclk > SYSCLK_MAX_HZ {
            return Err(ConfigError::Sysclk(sysclk));
        }

        let pclk1 = sysclk / self.apb1.divisor();
        if pclk1 > APB1_MAX_HZ {
            return Err(ConfigError::Apb1(pclk1));
        }
        let pclk2 = sysclk / self.apb2.divisor();
        if pclk2 > APB2_MAX_HZ {
            return Err(ConfigError::Apb2(pclk2));
        }

        let required = min_flash_latency(sysclk);
        if self.flash_latency < required || self.flash_latency > flash::MAX_LATENCY {
            return Err(ConfigError::FlashLatency {
                required,
                configured: self.flash_latency,
            });
        }

        Ok(Frequencies {
            vco_hz: vco,
            sysclk_hz: sysclk,
            hclk_hz: sysclk,
            pclk1_hz: pclk1,
            pclk2_hz: pclk2,
            pll48_hz: vco / pll.q as u32,
        })
    }

    /// RCC_PLLCFGR value selecting HSE as the PLL input.
    pub const fn pllcfgr(&self) -> u32 {
        let pll = self.pll;
        ((pll.m as u32) << rcc::PLLM_SHIFT) & rcc::PLLM_MASK
            | ((pll.n as u32) << rcc::PLLN_SHIFT) & rcc::PLLN_MASK
            | (((pll.p as u32 >> 1).wrapping_sub(1)) << rcc::PLLP_SHIFT) & rcc::PLLP_MASK
            | ((pll.q as u32) << rcc::PLLQ_SHIFT) & rcc::PLLQ_MASK
            | rcc::PLLSRC_HSE
    }
}

/// Minimum FLASH_ACR.LATENCY for a given HCLK.
pub const fn min_flash_latency(hclk_hz: u32) -> u8 {
    if hclk_hz == 0 {
        return 0;
    }
    ((hclk_hz - 1) / HZ_PER_WAIT_STATE) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequencies {
    pub vco_hz: u32,
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
    pub pll48_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    PllM(u8),
    PllN(u16),
    PllP(u8),
    PllQ(u8),
    HseFrequency(u32),
    VcoInput(u32),
    VcoOutput(u32),
    Sysclk(u32),
    Apb1(u32),
    Apb2(u32),
    FlashLatency { required: u8, configured: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PllM(m) => write!(f, "PLLM {} outside 2..=63", m),
            Self::PllN(n) => write!(f, "PLLN {} outside 50..=432", n),
            Self::PllP(p) => write!(f, "PLLP {} is not one of 2, 4, 6, 8", p),
            Self::PllQ(q) => write!(f, "PLLQ {} outside 2..=15", q),
            Self::HseFrequency(hz) => write!(
                f,
                "HSE {} Hz outside {}..={} Hz",
                hz, HSE_MIN_HZ, HSE_MAX_HZ
            ),
            Self::VcoInput(hz) => write!(
                f,
                "VCO input {} Hz outside {}..={} Hz",
                hz, VCO_IN_MIN_HZ, VCO_IN_MAX_HZ
            ),
            Self::VcoOutput(hz) => write!(
                f,
                "VCO output {} Hz outside {}..={} Hz",
                hz, VCO_OUT_MIN_HZ, VCO_OUT_MAX_HZ
            ),
            Self::Sysclk(hz) => write!(f, "SYSCLK {} Hz above {} Hz", hz, SYSCLK_MAX_HZ),
            Self::Apb1(hz) => write!(f, "APB1 {} Hz above {} Hz", hz, APB1_MAX_HZ),
            Self::Apb2(hz) => write!(f, "APB2 {} Hz above {} Hz", hz, APB2_MAX_HZ),
            Self::FlashLatency {
                required,
                configured,
            } => write!(
                f,
                "flash latency {} WS invalid, need at least {} WS",
                configured, required
            ),
        }
    }
}

/// How long to spin on a hardware status flag.
///
/// `Forever` is the fail-stop behavior the firmware uses: if the oscillator
/// never starts, the device hangs. `Polls` bounds every wait and turns a stuck
/// flag into [`ClockError::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    #[default]
    Forever,
    /// At most this many status reads per wait. `Polls(0)` reads nothing and
    /// times out at once.
    Polls(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HseReady,
    PllReady,
    SwitchToPll,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HseReady => "HSE ready",
            Self::PllReady => "PLL lock",
            Self::SwitchToPll => "SYSCLK switch to PLL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    Config(ConfigError),
    Timeout { stage: Stage, polls: u32 },
    /// PLLON was already set on entry; nothing was written.
    PllAlreadyOn,
}

impl From<ConfigError> for ClockError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid clock configuration: {}", err),
            Self::Timeout { stage, polls } => {
                write!(f, "timed out waiting for {} after {} polls", stage, polls)
            }
            Self::PllAlreadyOn => f.write_str("main PLL already enabled, PLLCFGR is locked"),
        }
    }
}

/// Status reads spent in each wait of a successful bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockReport {
    pub hse_polls: u32,
    pub pll_polls: u32,
    pub switch_polls: u32,
    pub frequencies: Option<Frequencies>,
}

impl ClockReport {
    pub fn total_polls(&self) -> u32 {
        self.hse_polls + self.pll_polls + self.switch_polls
    }
}

/// Register accesses `configure_pll` makes besides the status polls.
pub const FIXED_ACCESSES: u32 = 11;

/// Switch SYSCLK from HSI to the HSE-fed main PLL.
///
/// The configuration is validated before the first register access, and a
/// PLL that is already enabled is refused with [`ClockError::PllAlreadyOn`]
/// before anything is written. Each step waits for its hardware acknowledgement before the next starts:
/// HSE ready, PLL factors written while the PLL is off, PLL lock, flash
/// latency raised, APB prescalers set, then SW=PLL and SWS polled until the
/// switch is visible.
pub fn configure_pll<B: RegisterBus>(
    bus: &mut B,
    config: &ClockConfig,
    wait: WaitPolicy,
) -> Result<ClockReport, ClockError> {
    let frequencies = config.validate()?;

    let mut hse = Cr::HSEON;
    if config.hse_bypass {
        hse |= Cr::HSEBYP;
    }
    // The PLL ignores PLLCFGR while it runs, so a running PLL cannot be
    // retuned from here. Checked on the read half of the HSEON update.
    let cr = bus.read(rcc::CR);
    if Cr::from_bits_retain(cr).contains(Cr::PLLON) {
        return Err(ClockError::PllAlreadyOn);
    }
    bus.write(rcc::CR, cr | hse.bits());
    let hse_polls = wait_until(bus, wait, Stage::HseReady, rcc::CR, |cr| {
        Cr::from_bits_retain(cr).contains(Cr::HSERDY)
    })?;

    bus.write(rcc::PLLCFGR, config.pllcfgr());

    bus.set_bits(rcc::CR, Cr::PLLON.bits());
    let pll_polls = wait_until(bus, wait, Stage::PllReady, rcc::CR, |cr| {
        Cr::from_bits_retain(cr).contains(Cr::PLLRDY)
    })?;

    bus.write_field(
        flash::ACR,
        flash::LATENCY_MASK,
        config.flash_latency as u32,
    );

    bus.write_field(
        rcc::CFGR,
        rcc::PPRE1_MASK | rcc::PPRE2_MASK,
        config.apb1.bits() << rcc::PPRE1_SHIFT | config.apb2.bits() << rcc::PPRE2_SHIFT,
    );

    bus.write_field(
        rcc::CFGR,
        rcc::SW_MASK,
        SysclkSource::Pll.bits() << rcc::SW_SHIFT,
    );
    let switch_polls = wait_until(bus, wait, Stage::SwitchToPll, rcc::CFGR, |cfgr| {
        rcc::sws(cfgr) == Some(SysclkSource::Pll)
    })?;

    Ok(ClockReport {
        hse_polls,
        pll_polls,
        switch_polls,
        frequencies: Some(frequencies),
    })
}

/// Current SYSCLK source as reported by CFGR.SWS.
pub fn sysclk_source<B: RegisterBus>(bus: &mut B) -> Option<SysclkSource> {
    rcc::sws(bus.read(rcc::CFGR))
}

/// Independent re-read of CFGR.SWS after bring-up. Running on an unconfirmed
/// clock is unsafe; callers halt when this is false.
pub fn verify_pll_selected<B: RegisterBus>(bus: &mut B) -> bool {
    sysclk_source(bus) == Some(SysclkSource::Pll)
}

fn wait_until<B, F>(
    bus: &mut B,
    wait: WaitPolicy,
    stage: Stage,
    reg: crate::reg::Reg,
    done: F,
) -> Result<u32, ClockError>
where
    B: RegisterBus,
    F: Fn(u32) -> bool,
{
    let mut polls: u32 = 0;
    loop {
        if let WaitPolicy::Polls(limit) = wait {
            if polls >= limit {
                return Err(ClockError::Timeout { stage, polls });
            }
        }
        let value = bus.read(reg);
        polls = polls.saturating_add(1);
        if done(value) {
            return Ok(polls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::testing::{FlatBus, Op};

    #[test]
    fn test_nucleo_profile_frequencies() {
        let f = ClockConfig::NUCLEO_F401RE.validate().unwrap();
        assert_eq!(f.vco_hz, 336_000_000);
        assert_eq!(f.sysclk_hz, 84_000_000);
        assert_eq!(f.pclk1_hz, 42_000_000);
        assert_eq!(f.pclk2_hz, 84_000_000);
        assert_eq!(f.pll48_hz, 48_000_000);
    }

    #[test]
    fn test_pllcfgr_encoding() {
        // M=8, N=336, P=4 (01), Q=7, PLLSRC=HSE
        let expected = 8 | (336 << 6) | (0b01 << 16) | (1 << 22) | (7 << 24);
        assert_eq!(ClockConfig::NUCLEO_F401RE.pllcfgr(), expected);
    }

    #[test]
    fn test_validate_rejects_out_of_range_factors() {
        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.pll.p = 3;
        assert_eq!(cfg.validate(), Err(ConfigError::PllP(3)));

        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.pll.m = 1;
        assert_eq!(cfg.validate(), Err(ConfigError::PllM(1)));

        // M=4 puts 2 MHz into the VCO, N=84 only reaches 168 MHz.
        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.pll.m = 4;
        cfg.pll.n = 84;
        assert_eq!(cfg.validate(), Err(ConfigError::VcoOutput(168_000_000)));

        // N=168 with M=4, P=2 would run the core at 168 MHz.
        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.pll.m = 4;
        cfg.pll.n = 168;
        cfg.pll.p = 2;
        assert_eq!(cfg.validate(), Err(ConfigError::Sysclk(168_000_000)));
    }

    #[test]
    fn test_validate_bus_and_latency_limits() {
        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.apb1 = ApbPrescaler::Div1;
        assert_eq!(cfg.validate(), Err(ConfigError::Apb1(84_000_000)));

        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.flash_latency = 1;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::FlashLatency {
                required: 2,
                configured: 1
            })
        );

        // More wait states than needed is allowed.
        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.flash_latency = 5;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_min_flash_latency_bands() {
        assert_eq!(min_flash_latency(16_000_000), 0);
        assert_eq!(min_flash_latency(30_000_000), 0);
        assert_eq!(min_flash_latency(30_000_001), 1);
        assert_eq!(min_flash_latency(60_000_000), 1);
        assert_eq!(min_flash_latency(84_000_000), 2);
    }

    #[test]
    fn test_prescaler_encoding() {
        assert_eq!(ApbPrescaler::Div1.bits(), 0b000);
        assert_eq!(ApbPrescaler::Div2.bits(), 0b100);
        assert_eq!(ApbPrescaler::Div16.bits(), 0b111);
        assert_eq!(ApbPrescaler::from_bits(0b011), ApbPrescaler::Div1);
        assert_eq!(ApbPrescaler::from_divisor(4), Some(ApbPrescaler::Div4));
        assert_eq!(ApbPrescaler::from_divisor(3), None);
    }

    #[test]
    fn test_invalid_config_touches_no_register() {
        let mut bus = FlatBus::default();
        let mut cfg = ClockConfig::NUCLEO_F401RE;
        cfg.pll.q = 1;

        let err = configure_pll(&mut bus, &cfg, WaitPolicy::Forever).unwrap_err();
        assert_eq!(err, ClockError::Config(ConfigError::PllQ(1)));
        assert!(bus.log.is_empty());
    }

    #[test]
    fn test_stuck_flag_times_out_with_poll_limit() {
        // A flat register file never raises HSERDY.
        let mut bus = FlatBus::default();
        let err = configure_pll(&mut bus, &ClockConfig::NUCLEO_F401RE, WaitPolicy::Polls(4))
            .unwrap_err();

        assert_eq!(
            err,
            ClockError::Timeout {
                stage: Stage::HseReady,
                polls: 4
            }
        );
        let pll_writes = bus
            .log
            .iter()
            .filter(|op| matches!(op, Op::Write(addr, _) if *addr == rcc::PLLCFGR.addr()))
            .count();
        assert_eq!(pll_writes, 0);
    }

    #[test]
    fn test_zero_poll_limit_reads_nothing() {
        let mut bus = FlatBus::default();
        let err = configure_pll(&mut bus, &ClockConfig::NUCLEO_F401RE, WaitPolicy::Polls(0))
            .unwrap_err();

        assert_eq!(
            err,
            ClockError::Timeout {
                stage: Stage::HseReady,
                polls: 0
            }
        );
        // Only the HSEON read-modify-write.
        assert_eq!(bus.log.len(), 2);
    }

    #[test]
    fn test_running_pll_is_refused_before_any_write() {
        let mut bus = FlatBus::default();
        let running = Cr::HSEON | Cr::HSERDY | Cr::PLLON | Cr::PLLRDY;
        bus.set(rcc::CR, running.bits());
        bus.set(rcc::PLLCFGR, 0x2400_3010);

        let err = configure_pll(&mut bus, &ClockConfig::NUCLEO_F401RE, WaitPolicy::Forever)
            .unwrap_err();

        assert_eq!(err, ClockError::PllAlreadyOn);
        assert_eq!(bus.log, vec![Op::Read(rcc::CR.addr())]);
        assert_eq!(bus.get(rcc::PLLCFGR), 0x2400_3010);
    }

    #[test]
    fn test_verify_reads_sws_not_sw() {
        let mut bus = FlatBus::default();
        bus.set(rcc::CFGR, SysclkSource::Pll.bits() << rcc::SW_SHIFT);
        assert!(!verify_pll_selected(&mut bus));

        bus.set(rcc::CFGR, SysclkSource::Pll.bits() << rcc::SWS_SHIFT);
        assert!(verify_pll_selected(&mut bus));
    }
}

// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Board profiles: the per-board numbers (oscillator, PLL factors, flash
//! latency, bus prescalers, LED pin) that the clock sequencer treats as
//! configuration data, plus the timing the register simulator should model.

use anyhow::{Context, Result};
use f4blink_hal::clock::{ApbPrescaler, ClockConfig, ConfigError, Frequencies, PllConfig};
use f4blink_hal::gpio::{Pin, Port};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_prescaler() -> u32 {
    1
}

fn default_blink_delay() -> u32 {
    f4blink_hal::blink::DELAY_HSI
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortName {
    A,
    B,
    C,
    D,
    E,
    H,
}

impl From<PortName> for Port {
    fn from(name: PortName) -> Self {
        match name {
            PortName::A => Port::A,
            PortName::B => Port::B,
            PortName::C => Port::C,
            PortName::D => Port::D,
            PortName::E => Port::E,
            PortName::H => Port::H,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedBinding {
    pub port: PortName,
    pub pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PllSettings {
    pub m: u8,
    pub n: u16,
    pub p: u8,
    pub q: u8,
}

/// Ready-flag latencies for the register simulator, in bus accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_true")]
    pub hse_present: bool,
    #[serde(default)]
    pub hse_latency: u32,
    #[serde(default)]
    pub pll_latency: u32,
    #[serde(default)]
    pub switch_latency: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            hse_present: true,
            hse_latency: 0,
            pll_latency: 0,
            switch_latency: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardProfile {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub hse_hz: u32,
    #[serde(default)]
    pub hse_bypass: bool,
    pub pll: PllSettings,
    pub flash_latency: u8,
    #[serde(default = "default_prescaler")]
    pub apb1_prescaler: u32,
    #[serde(default = "default_prescaler")]
    pub apb2_prescaler: u32,
    pub led: LedBinding,
    #[serde(default = "default_blink_delay")]
    pub blink_delay: u32,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("unsupported schema version '{0}', expected 1.x")]
    SchemaVersion(String),
    #[error("{bus} prescaler /{divisor} is not one of 1, 2, 4, 8, 16")]
    Prescaler { bus: &'static str, divisor: u32 },
    #[error("LED pin {0} outside 0..=15")]
    LedPin(u8),
    #[error("invalid clock tree: {0}")]
    Clock(ConfigError),
}

impl From<ConfigError> for ProfileError {
    fn from(err: ConfigError) -> Self {
        Self::Clock(err)
    }
}

impl BoardProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board profile {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("in {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let profile: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Profile YAML")?;
        tracing::debug!("Loaded board profile '{}'", profile.name);
        Ok(profile)
    }

    /// The profile as a `ClockConfig`, without checking the clock tree.
    pub fn clock_config(&self) -> Result<ClockConfig, ProfileError> {
        if !self.schema_version.starts_with("1.") && self.schema_version != "1" {
            return Err(ProfileError::SchemaVersion(self.schema_version.clone()));
        }
        let apb1 = prescaler("APB1", self.apb1_prescaler)?;
        let apb2 = prescaler("APB2", self.apb2_prescaler)?;
        Ok(ClockConfig {
            hse_hz: self.hse_hz,
            hse_bypass: self.hse_bypass,
            pll: PllConfig {
                m: self.pll.m,
                n: self.pll.n,
                p: self.pll.p,
                q: self.pll.q,
            },
            flash_latency: self.flash_latency,
            apb1,
            apb2,
        })
    }

    pub fn led_pin(&self) -> Result<Pin, ProfileError> {
        Pin::try_new(self.led.port.into(), self.led.pin).ok_or(ProfileError::LedPin(self.led.pin))
    }

    /// Check the whole profile and return the frequencies it produces.
    pub fn validate(&self) -> Result<Frequencies, ProfileError> {
        self.led_pin()?;
        let frequencies = self.clock_config()?.validate()?;
        Ok(frequencies)
    }
}

fn prescaler(bus: &'static str, divisor: u32) -> Result<ApbPrescaler, ProfileError> {
    ApbPrescaler::from_divisor(divisor).ok_or(ProfileError::Prescaler { bus, divisor })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: "minimal"
hse_hz: 8000000
pll: { m: 8, n: 336, p: 4, q: 7 }
flash_latency: 2
apb1_prescaler: 2
led: { port: a, pin: 5 }
"#;

    #[test]
    fn test_defaults_apply() {
        let profile = BoardProfile::from_yaml(MINIMAL).unwrap();
        assert_eq!(profile.schema_version, "1.0");
        assert!(!profile.hse_bypass);
        assert_eq!(profile.apb2_prescaler, 1);
        assert_eq!(profile.blink_delay, 500_000);
        assert_eq!(profile.simulation, SimulationSettings::default());
        assert!(profile.simulation.hse_present);
    }

    #[test]
    fn test_clock_config_matches_builtin_nucleo_values() {
        let mut profile = BoardProfile::from_yaml(MINIMAL).unwrap();
        profile.hse_bypass = true;
        assert_eq!(
            profile.clock_config().unwrap(),
            ClockConfig::NUCLEO_F401RE
        );
    }

    #[test]
    fn test_rejects_bad_prescaler_and_pin() {
        let mut profile = BoardProfile::from_yaml(MINIMAL).unwrap();
        profile.apb2_prescaler = 3;
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::Prescaler { bus: "APB2", divisor: 3 })
        ));

        let mut profile = BoardProfile::from_yaml(MINIMAL).unwrap();
        profile.led.pin = 16;
        assert!(matches!(profile.validate(), Err(ProfileError::LedPin(16))));
    }

    #[test]
    fn test_rejects_unknown_schema_major() {
        let mut profile = BoardProfile::from_yaml(MINIMAL).unwrap();
        profile.schema_version = "2.0".to_string();
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::SchemaVersion(v)) if v == "2.0"
        ));
    }
}

// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Drives the firmware flows against the register simulator.

use f4blink_config::{BoardProfile, ProfileError};
use f4blink_hal::clock::{self, ClockError, Stage, WaitPolicy};
use f4blink_hal::{blink, gpio};
use f4blink_sim::peripherals::rcc::ClockTree;
use f4blink_sim::{SystemBus, Violation};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const RESULT_SCHEMA_VERSION: &str = "1.0";

/// Which firmware image to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// `firmware-blinky`: stay on the 16 MHz HSI.
    Hsi,
    /// `firmware-blinky-pll`: switch to the PLL first.
    Pll,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub flow: Flow,
    pub blinks: u32,
    pub wait: WaitPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    /// A ready flag never rose within the poll limit.
    Timeout,
    /// SWS did not read back as PLL after bring-up.
    Unconfirmed,
    /// The PLL was already running, so its factors could not be written.
    PllAlreadyOn,
    /// The flow finished but the simulator recorded ordering violations.
    Violations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Polls {
    pub hse: u32,
    pub pll: u32,
    pub switch: u32,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub result_schema_version: String,
    pub board: String,
    pub flow: Flow,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polls: Option<Polls>,
    pub clock: ClockTree,
    pub led: String,
    pub blink_delay: u32,
    pub toggles: u32,
    pub led_on: bool,
    pub accesses: u64,
    pub violations: Vec<Violation>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Replay one firmware image on `bus`.
///
/// Mirrors what the target does: on a failed or unconfirmed clock switch the
/// real device halts before touching the LED, so the report stops there too.
pub fn run(
    profile: &BoardProfile,
    bus: &mut SystemBus,
    options: &RunOptions,
) -> Result<RunReport, ProfileError> {
    let pin = profile.led_pin()?;
    let mut report = RunReport {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        board: profile.name.clone(),
        flow: options.flow,
        status: Status::Pass,
        message: None,
        polls: None,
        clock: ClockTree::default(),
        led: format!("P{}{}", pin.port().letter(), pin.index()),
        blink_delay: match options.flow {
            Flow::Hsi => blink::DELAY_HSI,
            Flow::Pll => profile.blink_delay,
        },
        toggles: 0,
        led_on: false,
        accesses: 0,
        violations: Vec::new(),
    };

    if options.flow == Flow::Pll {
        let config = profile.clock_config()?;
        match clock::configure_pll(bus, &config, options.wait) {
            Ok(clock_report) => {
                info!(
                    "PLL running: {} HSE polls, {} PLL polls, {} switch polls",
                    clock_report.hse_polls, clock_report.pll_polls, clock_report.switch_polls
                );
                report.polls = Some(Polls {
                    hse: clock_report.hse_polls,
                    pll: clock_report.pll_polls,
                    switch: clock_report.switch_polls,
                });
            }
            Err(ClockError::Config(err)) => return Err(err.into()),
            Err(err @ ClockError::Timeout { stage, .. }) => {
                warn!("{}", err);
                report.status = Status::Timeout;
                report.message = Some(err.to_string());
                if stage == Stage::HseReady {
                    warn!("check that the board's HSE source is fitted and enabled");
                }
                return Ok(finish(report, bus));
            }
            Err(err @ ClockError::PllAlreadyOn) => {
                warn!("{}", err);
                report.status = Status::PllAlreadyOn;
                report.message = Some(err.to_string());
                return Ok(finish(report, bus));
            }
        }

        if !clock::verify_pll_selected(bus) {
            warn!("SWS does not report PLL; firmware halts here");
            report.status = Status::Unconfirmed;
            report.message = Some("SYSCLK switch to PLL not confirmed".to_string());
            return Ok(finish(report, bus));
        }
    }

    gpio::configure_output(bus, pin);
    info!("{} configured as output", report.led);

    for _ in 0..options.blinks {
        report.led_on = blink::toggle(bus, pin);
        report.toggles += 1;
        debug!("{} -> {}", report.led, if report.led_on { "on" } else { "off" });
    }

    Ok(finish(report, bus))
}

fn finish(mut report: RunReport, bus: &SystemBus) -> RunReport {
    report.clock = bus.rcc().map(|rcc| rcc.clock_tree()).unwrap_or_default();
    report.accesses = bus.access_count();
    report.violations = bus.violations().to_vec();
    if report.status == Status::Pass && !report.violations.is_empty() {
        report.status = Status::Violations;
        report.message = Some(format!(
            "{} ordering violation(s) recorded",
            report.violations.len()
        ));
    }
    report
}

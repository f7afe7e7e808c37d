// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use f4blink_config::BoardProfile;
use f4blink_hal::clock::{Frequencies, WaitPolicy};
use f4blink_sim::SystemBus;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

mod runner;

use runner::{Flow, RunOptions, RunReport};

const EXIT_PASS: u8 = 0;
const EXIT_BRINGUP_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "STM32F401 bring-up simulator",
    long_about = None
)]
struct Cli {
    /// Log every simulated register access
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a firmware image against the simulated RCC, FLASH and GPIO.
    Run(RunArgs),

    /// Validate a board profile and print the clock tree it produces.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the board profile (YAML)
    #[arg(short, long)]
    board: PathBuf,

    /// Replay the HSI-only blinky instead of the PLL one
    #[arg(long)]
    no_pll: bool,

    /// Number of LED toggles to simulate
    #[arg(long, default_value = "4")]
    blinks: u32,

    /// Give up on a ready flag after this many polls (0 waits forever)
    #[arg(long, default_value = "100000")]
    timeout_polls: u32,

    /// Override the profile's HSE start-up latency (bus accesses)
    #[arg(long)]
    hse_latency: Option<u32>,

    /// Override the profile's PLL lock latency (bus accesses)
    #[arg(long)]
    pll_latency: Option<u32>,

    /// Override the profile's SYSCLK switch latency (bus accesses)
    #[arg(long)]
    switch_latency: Option<u32>,

    /// Simulate a board with no HSE source
    #[arg(long)]
    no_hse: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write the final register state, report and access trace (JSON)
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Path to the board profile (YAML)
    #[arg(short, long)]
    board: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays machine readable.
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run_board(args),
        Commands::Check(args) => check_board(args),
    }
}

fn load_profile(path: &Path) -> Option<(BoardProfile, Frequencies)> {
    let profile = match BoardProfile::from_file(path) {
        Ok(profile) => profile,
        Err(e) => {
            error!("{:#}", e);
            return None;
        }
    };
    match profile.validate() {
        Ok(frequencies) => Some((profile, frequencies)),
        Err(e) => {
            error!("Board profile {:?} rejected: {}", path, e);
            None
        }
    }
}

fn run_board(args: RunArgs) -> ExitCode {
    let Some((mut profile, _)) = load_profile(&args.board) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let sim = &mut profile.simulation;
    if let Some(latency) = args.hse_latency {
        sim.hse_latency = latency;
    }
    if let Some(latency) = args.pll_latency {
        sim.pll_latency = latency;
    }
    if let Some(latency) = args.switch_latency {
        sim.switch_latency = latency;
    }
    if args.no_hse {
        sim.hse_present = false;
    }

    let options = RunOptions {
        flow: if args.no_pll { Flow::Hsi } else { Flow::Pll },
        blinks: args.blinks,
        wait: match args.timeout_polls {
            0 => WaitPolicy::Forever,
            limit => WaitPolicy::Polls(limit),
        },
    };

    info!("Simulating '{}' ({:?} flow)", profile.name, options.flow);
    let mut bus = build_bus(&profile, args.snapshot.is_some());
    let report = match runner::run(&profile, &mut bus, &options) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Some(path) = &args.snapshot {
        if let Err(e) = write_snapshot(path, &report, &bus) {
            error!("{:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
        info!("Snapshot written to {:?}", path);
    }

    if args.json {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    } else {
        print_summary(&report);
    }

    if report.passed() {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_BRINGUP_FAIL)
    }
}

/// The access trace is only kept when a snapshot will be written; an
/// unbounded wait would otherwise grow it without limit.
fn build_bus(profile: &BoardProfile, record_trace: bool) -> SystemBus {
    let mut bus = SystemBus::from_profile(profile);
    bus.set_record_trace(record_trace);
    bus
}

fn write_snapshot(path: &Path, report: &RunReport, bus: &SystemBus) -> anyhow::Result<()> {
    let snapshot = serde_json::json!({
        "report": report,
        "bus": bus.snapshot(),
        "trace": bus.trace(),
    });
    let f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create snapshot {:?}", path))?;
    serde_json::to_writer_pretty(f, &snapshot)
        .with_context(|| format!("Failed to write snapshot {:?}", path))?;
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("board:      {}", report.board);
    println!("status:     {:?}", report.status);
    if let Some(message) = &report.message {
        println!("message:    {}", message);
    }
    if let Some(polls) = &report.polls {
        println!(
            "polls:      hse={} pll={} switch={}",
            polls.hse, polls.pll, polls.switch
        );
    }
    println!("sysclk:     {} Hz", report.clock.sysclk_hz);
    println!(
        "apb1/apb2:  {} Hz / {} Hz",
        report.clock.pclk1_hz, report.clock.pclk2_hz
    );
    println!(
        "led:        {} toggled {} times, {}",
        report.led,
        report.toggles,
        if report.led_on { "on" } else { "off" }
    );
    println!("accesses:   {}", report.accesses);
    for violation in &report.violations {
        println!("violation:  {}", violation);
    }
}

fn check_board(args: CheckArgs) -> ExitCode {
    let Some((profile, f)) = load_profile(&args.board) else {
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    println!("board:      {}", profile.name);
    println!("vco:        {} Hz", f.vco_hz);
    println!("sysclk:     {} Hz", f.sysclk_hz);
    println!("hclk:       {} Hz", f.hclk_hz);
    println!("pclk1:      {} Hz", f.pclk1_hz);
    println!("pclk2:      {} Hz", f.pclk2_hz);
    println!("pll48:      {} Hz", f.pll48_hz);
    println!("flash:      {} WS", profile.flash_latency);
    ExitCode::from(EXIT_PASS)
}

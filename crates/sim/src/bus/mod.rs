// f4blink - STM32F401 bring-up firmware
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::flash::Flash;
use crate::peripherals::gpio::GpioPort;
use crate::peripherals::rcc::{ClockTree, Rcc, RccTiming};
use crate::{AccessKind, BusEvent, Peripheral, SimResult, SimulationError, Violation};
use f4blink_config::BoardProfile;
use f4blink_hal::clock::{self, APB1_MAX_HZ, APB2_MAX_HZ};
use f4blink_hal::device;
use f4blink_hal::gpio::Port;
use f4blink_hal::reg::{Reg, RegisterBus};

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    /// RCC_AHB1ENR bit that must be set for writes to reach the peripheral.
    pub clock_gate: Option<u32>,
    pub dev: Box<dyn Peripheral>,
}

/// The RCC, FLASH interface and GPIO ports of one STM32F401, behind a
/// word-addressed bus that records every access.
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    trace: Vec<BusEvent>,
    record_trace: bool,
    violations: Vec<Violation>,
    accesses: u64,
    last_clock: ClockTree,
    last_latency: u8,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::with_timing(RccTiming::default())
    }

    pub fn with_timing(timing: RccTiming) -> Self {
        let mut peripherals = vec![
            PeripheralEntry {
                name: "rcc".to_string(),
                base: device::RCC_BASE as u64,
                size: 0x400,
                clock_gate: None,
                dev: Box::new(Rcc::with_timing(timing)),
            },
            PeripheralEntry {
                name: "flash".to_string(),
                base: device::FLASH_BASE as u64,
                size: 0x400,
                clock_gate: None,
                dev: Box::new(Flash::new()),
            },
        ];
        for port in Port::ALL {
            peripherals.push(PeripheralEntry {
                name: format!("gpio{}", port.letter().to_ascii_lowercase()),
                base: port.base() as u64,
                size: 0x400,
                clock_gate: Some(port.enable_bit().bits()),
                dev: Box::new(GpioPort::for_port(port)),
            });
        }

        let mut bus = Self {
            peripherals,
            trace: Vec::new(),
            record_trace: true,
            violations: Vec::new(),
            accesses: 0,
            last_clock: ClockTree::default(),
            last_latency: 0,
        };
        bus.last_clock = bus.rcc().map(Rcc::clock_tree).unwrap_or_default();
        bus
    }

    pub fn from_profile(profile: &BoardProfile) -> Self {
        Self::with_timing(RccTiming::from(profile))
    }

    /// Stop keeping the per-access trace; counters and violations still update.
    pub fn set_record_trace(&mut self, enabled: bool) {
        self.record_trace = enabled;
    }

    pub fn trace(&self) -> &[BusEvent] {
        &self.trace
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn access_count(&self) -> u64 {
        self.accesses
    }

    pub fn find_peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn rcc(&self) -> Option<&Rcc> {
        self.find_peripheral("rcc")
    }

    pub fn flash(&self) -> Option<&Flash> {
        self.find_peripheral("flash")
    }

    pub fn gpio(&self, port: Port) -> Option<&GpioPort> {
        let name = format!("gpio{}", port.letter().to_ascii_lowercase());
        self.find_peripheral(&name)
    }

    fn entry_index(&self, addr: u64) -> Option<usize> {
        self.peripherals
            .iter()
            .position(|p| addr >= p.base && addr < p.base + p.size)
    }

    pub fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        if addr % 4 != 0 {
            return Err(SimulationError::Unaligned(addr));
        }
        let index = self
            .entry_index(addr)
            .ok_or(SimulationError::MemoryViolation(addr))?;
        let p = &self.peripherals[index];
        let value = p.dev.read(addr - p.base)?;
        tracing::debug!("{}: read {:#010x} -> {:#010x}", p.name, addr, value);

        self.record(AccessKind::Read, addr, value);
        self.tick();
        Ok(value)
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        if addr % 4 != 0 {
            return Err(SimulationError::Unaligned(addr));
        }
        let index = self
            .entry_index(addr)
            .ok_or(SimulationError::MemoryViolation(addr))?;
        let ahb1enr = self.rcc().map(Rcc::ahb1enr).unwrap_or(0);

        let p = &mut self.peripherals[index];
        let offset = addr - p.base;
        tracing::debug!("{}: write {:#010x} <- {:#010x}", p.name, addr, value);
        match p.clock_gate {
            Some(gate) if ahb1enr & gate == 0 => {
                tracing::warn!("{}: clock disabled, write to {:#x} dropped", p.name, addr);
                let violation = Violation::GpioWriteWithClockOff {
                    peripheral: p.name.clone(),
                    offset,
                };
                self.violations.push(violation);
            }
            _ => {
                p.dev.write(offset, value)?;
                let rejected = p.dev.take_violations();
                self.violations.extend(rejected);
            }
        }

        self.record(AccessKind::Write, addr, value);
        self.tick();
        Ok(())
    }

    fn record(&mut self, kind: AccessKind, addr: u64, value: u32) {
        let seq = self.accesses;
        self.accesses += 1;
        if self.record_trace {
            self.trace.push(BusEvent {
                seq,
                kind,
                addr,
                value,
            });
        }
    }

    /// One bus access worth of hardware time, then re-check the clock tree.
    fn tick(&mut self) {
        for p in &mut self.peripherals {
            p.dev.tick();
        }
        self.check_clock_limits();
    }

    /// Flag the moment SYSCLK or a bus clock moves out of what the flash
    /// latency and the bus ratings allow.
    fn check_clock_limits(&mut self) {
        let Some(tree) = self.rcc().map(Rcc::clock_tree) else {
            return;
        };
        let latency = self.flash().map(Flash::latency).unwrap_or(0);
        let (previous, previous_latency) = (self.last_clock, self.last_latency);
        self.last_clock = tree;
        self.last_latency = latency;

        let required = clock::min_flash_latency(tree.hclk_hz);
        let was_short = previous_latency < clock::min_flash_latency(previous.hclk_hz);
        if latency < required && !was_short {
            self.report(Violation::InsufficientFlashLatency {
                sysclk_hz: tree.sysclk_hz,
                required,
                configured: latency,
            });
        }

        for (bus, hz, was, max_hz) in [
            ("APB1", tree.pclk1_hz, previous.pclk1_hz, APB1_MAX_HZ),
            ("APB2", tree.pclk2_hz, previous.pclk2_hz, APB2_MAX_HZ),
        ] {
            if hz > max_hz && was <= max_hz {
                self.report(Violation::BusClockOutOfRange { bus, hz, max_hz });
            }
        }
    }

    fn report(&mut self, violation: Violation) {
        tracing::warn!("{}", violation);
        self.violations.push(violation);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let peripherals: serde_json::Map<String, serde_json::Value> = self
            .peripherals
            .iter()
            .map(|p| (p.name.clone(), p.dev.snapshot()))
            .collect();
        serde_json::json!({
            "accesses": self.accesses,
            "clock": self.last_clock,
            "violations": self.violations,
            "peripherals": peripherals,
        })
    }
}

impl RegisterBus for SystemBus {
    fn read(&mut self, reg: Reg) -> u32 {
        match self.read_u32(reg.addr() as u64) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("{:?}: {}", reg, e);
                self.violations.push(Violation::Unmapped {
                    addr: reg.addr() as u64,
                });
                0
            }
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        if let Err(e) = self.write_u32(reg.addr() as u64, value) {
            tracing::error!("{:?}: {}", reg, e);
            self.violations.push(Violation::Unmapped {
                addr: reg.addr() as u64,
            });
        }
    }
}

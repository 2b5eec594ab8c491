//! `ProcSubstrateProbe`
//!
//! Reads `/proc/meminfo` and `/proc/stat` for a real, if coarse, substrate
//! reading. Returns `None` from `new` when `/proc` isn't present (non-Linux
//! hosts), so the caller falls back to `StaticSubstrateProbe`.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use kernel_core::substrate::{SubstrateProbe, SubstrateReading};

pub struct ProcSubstrateProbe;

impl ProcSubstrateProbe {
    pub fn new() -> Option<Self> {
        if fs::metadata("/proc/meminfo").is_ok() {
            Some(Self)
        } else {
            None
        }
    }

    fn read_meminfo() -> Option<(u64, u64)> {
        let text = fs::read_to_string("/proc/meminfo").ok()?;
        let mut total = None;
        let mut available = None;
        for line in text.lines() {
            if let Some(kb) = parse_kb_line(line, "MemTotal:") {
                total = Some(kb);
            } else if let Some(kb) = parse_kb_line(line, "MemAvailable:") {
                available = Some(kb);
            }
        }
        Some((total?, available?))
    }

    fn read_cpu_hz() -> u64 {
        fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|text| {
                text.lines().find_map(|line| {
                    line.strip_prefix("cpu MHz")
                        .and_then(|rest| rest.split(':').nth(1))
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .map(|mhz| (mhz * 1_000_000.0) as u64)
                })
            })
            .unwrap_or(1_000_000_000)
    }
}

fn parse_kb_line(line: &str, prefix: &str) -> Option<u64> {
    let rest = line.strip_prefix(prefix)?;
    rest.trim().strip_suffix(" kB")?.trim().parse::<u64>().ok()
}

impl SubstrateProbe for ProcSubstrateProbe {
    fn read(&self) -> SubstrateReading {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let (hour, min, sec) = (
            ((now / 3600) % 24) as u8,
            ((now / 60) % 60) as u8,
            (now % 60) as u8,
        );

        match Self::read_meminfo() {
            Some((total_kb, available_kb)) => {
                let total_ram_mb = total_kb / 1024;
                let available_ram_mb = available_kb / 1024;
                let used_ram_estimate = total_ram_mb.saturating_sub(available_ram_mb);
                // A simple fraction of available RAM, floored at 16 units,
                // matching `allocate_from`'s own clamping contract.
                let recommended_kernel_budget = ((available_ram_mb as f32) / 8.0).max(16.0);
                SubstrateReading {
                    total_ram_mb,
                    available_ram_mb,
                    used_ram_estimate,
                    cpu_cycle_hz: Self::read_cpu_hz(),
                    rtc_hour: hour,
                    rtc_min: min,
                    rtc_sec: sec,
                    recommended_kernel_budget,
                }
            }
            None => SubstrateReading {
                total_ram_mb: 0,
                available_ram_mb: 0,
                used_ram_estimate: 0,
                cpu_cycle_hz: 0,
                rtc_hour: hour,
                rtc_min: min,
                rtc_sec: sec,
                // Signals failure to `SubstrateMonitor::refresh` per §6.
                recommended_kernel_budget: 0.0,
            },
        }
    }
}

//! SubstrateMonitor
//!
//! Probes RAM/CPU via an injected `SubstrateProbe` and emits a recommended
//! energy budget. OS substrate probing itself is out of scope for the
//! core (spec §1) — the driver supplies the probe implementation.

/// A point-in-time reading from the host, as spec §6 defines it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstrateReading {
    pub total_ram_mb: u64,
    pub available_ram_mb: u64,
    pub used_ram_estimate: u64,
    pub cpu_cycle_hz: u64,
    pub rtc_hour: u8,
    pub rtc_min: u8,
    pub rtc_sec: u8,
    /// `> 0` when the RAM probe succeeded, else `0`.
    pub recommended_kernel_budget: f32,
}

/// Injected host probe. Implemented by the driver; the core never touches
/// the OS directly.
pub trait SubstrateProbe: Send + Sync {
    fn read(&self) -> SubstrateReading;
}

/// A fixed-reading probe for tests and as the documented fallback when a
/// real probe is unavailable.
pub struct StaticSubstrateProbe {
    reading: SubstrateReading,
}

impl StaticSubstrateProbe {
    pub fn new(reading: SubstrateReading) -> Self {
        Self { reading }
    }

    pub fn default_reading() -> SubstrateReading {
        SubstrateReading {
            total_ram_mb: 8192,
            available_ram_mb: 4096,
            used_ram_estimate: 4096,
            cpu_cycle_hz: 2_000_000_000,
            rtc_hour: 0,
            rtc_min: 0,
            rtc_sec: 0,
            recommended_kernel_budget: 100.0,
        }
    }
}

impl Default for StaticSubstrateProbe {
    fn default() -> Self {
        Self::new(Self::default_reading())
    }
}

impl SubstrateProbe for StaticSubstrateProbe {
    fn read(&self) -> SubstrateReading {
        self.reading
    }
}

/// Keeps the last-known good reading so a probe failure degrades to stale
/// data instead of crashing the pipeline.
pub struct SubstrateMonitor {
    last_known: SubstrateReading,
}

impl SubstrateMonitor {
    pub fn new(initial: SubstrateReading) -> Self {
        Self {
            last_known: initial,
        }
    }

    /// Re-read the probe. On success, updates and returns the new recommended
    /// budget (scaled by `AllocateFrom` semantics: a simple fraction of
    /// available RAM, clamped to a sane floor). On a probe that reports
    /// `recommended_kernel_budget <= 0` (failure signal per §6), falls back
    /// to the last-known budget and logs the degradation.
    pub fn refresh(&mut self, probe: &dyn SubstrateProbe) -> f32 {
        let reading = probe.read();
        if reading.recommended_kernel_budget > 0.0 {
            self.last_known = reading;
            reading.recommended_kernel_budget
        } else {
            tracing::warn!("substrate probe failed, falling back to last-known budget");
            self.last_known.recommended_kernel_budget
        }
    }

    pub fn last_known(&self) -> SubstrateReading {
        self.last_known
    }

    /// Allocate a slice of the recommended budget — used by
    /// `ProgramManifold` to carve out a per-tenant sub-budget.
    pub fn allocate_from(&self, percentage: f32, minimum: f32) -> f32 {
        let share = self.last_known.recommended_kernel_budget * percentage.clamp(0.0, 1.0);
        share.max(minimum)
    }
}

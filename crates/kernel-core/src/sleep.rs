//! Sleep Cycle Scheduler
//!
//! Bio-inspired consolidation trigger, mirroring the teacher's sleep
//! consolidation engine: an entropy estimator over the working-memory
//! cache, and a trigger policy that fires on metabolic drain, cognitive
//! overload, or idle consolidation — whichever applies first.

use chrono::{DateTime, Utc};

use crate::cache::WorkingMemoryCache;

/// Why a sleep cycle fired (or why none did). Stable wire values per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTrigger {
    Manual,
    MetabolicDrain,
    CognitiveOverload,
    IdleConsolidation,
    None,
}

impl SleepTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepTrigger::Manual => "manual",
            SleepTrigger::MetabolicDrain => "metabolic_drain",
            SleepTrigger::CognitiveOverload => "cognitive_overload",
            SleepTrigger::IdleConsolidation => "idle_consolidation",
            SleepTrigger::None => "none",
        }
    }
}

/// Configuration + mutable scheduling state for sleep/consolidation.
pub struct SleepCycleScheduler {
    cognitive_entropy_buffer: f32,
    critical_sleep_threshold_percent: f32,
    max_entropy_capacity: f32,
    optimal_consolidation_interval_seconds: i64,
    idle_window_seconds: i64,
    last_sleep_utc: DateTime<Utc>,
    last_activity_utc: DateTime<Utc>,
    interrupts_locked: bool,
    sleep_cycles: u64,
    last_trigger: SleepTrigger,
}

impl SleepCycleScheduler {
    pub fn new(
        now: DateTime<Utc>,
        critical_sleep_threshold_percent: f32,
        max_entropy_capacity: f32,
        optimal_consolidation_interval_seconds: i64,
        idle_window_seconds: i64,
    ) -> Self {
        Self {
            cognitive_entropy_buffer: 0.0,
            critical_sleep_threshold_percent: critical_sleep_threshold_percent
                .clamp(0.01, 0.95),
            max_entropy_capacity: max_entropy_capacity.clamp(0.05, 1.0),
            optimal_consolidation_interval_seconds,
            idle_window_seconds,
            last_sleep_utc: now,
            last_activity_utc: now,
            interrupts_locked: false,
            sleep_cycles: 0,
            last_trigger: SleepTrigger::None,
        }
    }

    pub fn sleep_cycles(&self) -> u64 {
        self.sleep_cycles
    }

    pub fn last_trigger(&self) -> SleepTrigger {
        self.last_trigger
    }

    pub fn entropy(&self) -> f32 {
        self.cognitive_entropy_buffer
    }

    pub fn interrupts_locked(&self) -> bool {
        self.interrupts_locked
    }

    pub fn mark_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity_utc = now;
    }

    /// Entropy over the top-64 cache entries: `w_i = max(0.01,
    /// fitness_i) * 1/(1+hits_i)`, `p_i = w_i / sum(w)`, `C = sum(p_i^2)`,
    /// `diversity = 1 - C`, `load = count/capacity`, `unresolved_ratio =
    /// |{hits=0 or fitness>0.90}| / count`. `entropy = clamp01(0.55 *
    /// diversity + 0.30 * load + 0.15 * unresolved_ratio)`.
    pub fn estimate_entropy(&mut self, cache: &WorkingMemoryCache) -> f32 {
        let top = cache.snapshot_by_priority(64);
        if top.is_empty() {
            self.cognitive_entropy_buffer = 0.0;
            return 0.0;
        }
        let weights: Vec<f32> = top
            .iter()
            .map(|e| e.fitness.max(0.01) * (1.0 / (1.0 + e.hits as f32)))
            .collect();
        let total: f32 = weights.iter().sum();
        let c: f32 = weights
            .iter()
            .map(|w| {
                let p = if total > 0.0 { w / total } else { 0.0 };
                p * p
            })
            .sum();
        let diversity = 1.0 - c;
        let load = top.len() as f32 / cache.capacity() as f32;
        let unresolved = top
            .iter()
            .filter(|e| e.hits == 0 || e.fitness > 0.90)
            .count();
        let unresolved_ratio = unresolved as f32 / top.len() as f32;
        let entropy = (0.55 * diversity + 0.30 * load + 0.15 * unresolved_ratio).clamp(0.0, 1.0);
        self.cognitive_entropy_buffer = entropy;
        entropy
    }

    /// First-match trigger priority: metabolic drain, then cognitive
    /// overload, then idle consolidation, else none.
    #[allow(clippy::too_many_arguments)]
    fn decide_trigger(
        &self,
        energy_pct: f32,
        entropy: f32,
        idle: bool,
        now: DateTime<Utc>,
    ) -> SleepTrigger {
        if energy_pct < self.critical_sleep_threshold_percent {
            return SleepTrigger::MetabolicDrain;
        }
        if entropy > self.max_entropy_capacity {
            return SleepTrigger::CognitiveOverload;
        }
        let since_sleep = (now - self.last_sleep_utc).num_seconds();
        let since_activity = (now - self.last_activity_utc).num_seconds();
        if idle
            && since_sleep >= self.optimal_consolidation_interval_seconds
            && since_activity >= self.idle_window_seconds
        {
            return SleepTrigger::IdleConsolidation;
        }
        SleepTrigger::None
    }

    /// Recompute entropy, pick a trigger, and — if one fires — atomically
    /// lock interrupts and bump `sleep_cycles`.
    pub fn monitor_metabolic_load(
        &mut self,
        now: DateTime<Utc>,
        energy_pct: f32,
        idle: bool,
        cache: &WorkingMemoryCache,
    ) -> SleepTrigger {
        let entropy = self.estimate_entropy(cache);
        let trigger = self.decide_trigger(energy_pct, entropy, idle, now);
        self.last_trigger = trigger;
        if trigger != SleepTrigger::None {
            self.lock_hardware_interrupts(trigger);
            self.sleep_cycles += 1;
        }
        trigger
    }

    /// Idempotent: locking an already-locked scheduler is a no-op beyond
    /// recording the reason.
    pub fn lock_hardware_interrupts(&mut self, reason: SleepTrigger) {
        self.interrupts_locked = true;
        self.last_trigger = reason;
    }

    /// Unlock interrupts, zero entropy, refresh both timestamps.
    pub fn complete_sleep(&mut self, now: DateTime<Utc>) {
        self.interrupts_locked = false;
        self.cognitive_entropy_buffer = 0.0;
        self.last_sleep_utc = now;
        self.last_activity_utc = now;
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.cognitive_entropy_buffer = 0.0;
        self.last_sleep_utc = now;
        self.last_activity_utc = now;
        self.interrupts_locked = false;
        self.sleep_cycles = 0;
        self.last_trigger = SleepTrigger::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scheduler_at(now: DateTime<Utc>) -> SleepCycleScheduler {
        SleepCycleScheduler::new(now, 0.15, 0.8, 1, 1)
    }

    #[test]
    fn metabolic_drain_takes_priority() {
        let now = Utc::now();
        let mut sched = scheduler_at(now);
        let cache = WorkingMemoryCache::new(8);
        let trigger = sched.monitor_metabolic_load(now, 0.05, false, &cache);
        assert_eq!(trigger, SleepTrigger::MetabolicDrain);
        assert_eq!(sched.sleep_cycles(), 1);
    }

    #[test]
    fn idle_consolidation_fires_after_windows_elapse() {
        let start = Utc::now();
        let mut sched = scheduler_at(start);
        sched.complete_sleep(start);
        let later = start + Duration::seconds(3);
        let cache = WorkingMemoryCache::new(8);
        let trigger = sched.monitor_metabolic_load(later, 0.9, true, &cache);
        assert_eq!(trigger, SleepTrigger::IdleConsolidation);
    }

    #[test]
    fn no_trigger_when_nothing_applies() {
        let now = Utc::now();
        let mut sched = scheduler_at(now);
        let cache = WorkingMemoryCache::new(8);
        let trigger = sched.monitor_metabolic_load(now, 0.9, false, &cache);
        assert_eq!(trigger, SleepTrigger::None);
        assert_eq!(sched.sleep_cycles(), 0);
    }

    #[test]
    fn sleep_cycles_increments_exactly_once_per_trigger() {
        let now = Utc::now();
        let mut sched = scheduler_at(now);
        let cache = WorkingMemoryCache::new(8);
        let before = sched.sleep_cycles();
        let triggered = sched.monitor_metabolic_load(now, 0.05, false, &cache) != SleepTrigger::None;
        assert_eq!(sched.sleep_cycles(), before + u64::from(triggered));
    }

    #[test]
    fn complete_sleep_unlocks_and_zeroes_entropy() {
        let now = Utc::now();
        let mut sched = scheduler_at(now);
        let cache = WorkingMemoryCache::new(8);
        sched.monitor_metabolic_load(now, 0.05, false, &cache);
        assert!(sched.interrupts_locked());
        sched.complete_sleep(now);
        assert!(!sched.interrupts_locked());
        assert_eq!(sched.entropy(), 0.0);
    }
}

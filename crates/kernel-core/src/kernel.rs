//! KernelLoop
//!
//! Top-level orchestrator: ingest pipeline, reflex/deep-think selection,
//! auto-sleep polling, status snapshot. Owns every other component;
//! `CognitiveAdapter` receives non-owning references for the duration of a
//! call rather than holding back-references (see `DESIGN.md`).

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::adapter::{CognitiveAdapter, DataStream, SignalProfile};
use crate::cache::WorkingMemoryCache;
use crate::fnv::{fnv64_str, hex16};
use crate::hdc::HdcSystem;
use crate::metabolism::SystemMetabolism;
use crate::sleep::{SleepCycleScheduler, SleepTrigger};
use crate::substrate::{SubstrateMonitor, SubstrateProbe};
use crate::tensor::TensorOps;

/// Shared handle to an `HdcSystem`. Single-threaded cooperative model (§5)
/// means `Rc<RefCell<_>>` is sufficient — no cross-thread sharing is ever
/// required, and this is what lets a `ProgramManifold` share its host's
/// symbol space without the core taking on a thread-safety burden it
/// doesn't need.
pub type SharedHdc = Rc<RefCell<HdcSystem>>;

const MAX_DEEP_THINK_ITERATIONS: u32 = 64;
const MEMORY_CANDIDATE_SNAPSHOT: usize = 12;

/// Injected wall-clock. The core never calls `Utc::now()` directly so
/// tests can control time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Stable wire outcome values per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    System1Reflex,
    System2VolatileHit,
    ZombieMode,
    FatigueLimit,
    EncodeFailed,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::System1Reflex => "system1_reflex",
            Outcome::System2VolatileHit => "system2_volatile_hit",
            Outcome::ZombieMode => "zombie_mode",
            Outcome::FatigueLimit => "fatigue_limit",
            Outcome::EncodeFailed => "encode_failed",
            Outcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub success: bool,
    pub reflex_hit: bool,
    pub deep_think_path: bool,
    pub zombie_triggered: bool,
    pub sleep_triggered: bool,
    pub discovery_triggered: bool,
    pub iterations: u32,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub sleep_reason: SleepTrigger,
    pub cache_key: Option<String>,
    pub similarity: Option<f32>,
    pub energy_remaining: f32,
    pub profile: Option<SignalProfile>,
}

impl IngestResult {
    fn failed(error: &str) -> Self {
        Self {
            success: false,
            reflex_hit: false,
            deep_think_path: false,
            zombie_triggered: false,
            sleep_triggered: false,
            discovery_triggered: false,
            iterations: 0,
            outcome: Outcome::Failed,
            error: Some(error.to_string()),
            sleep_reason: SleepTrigger::None,
            cache_key: None,
            similarity: None,
            energy_remaining: 0.0,
            profile: None,
        }
    }
}

/// Composed status snapshot for `get_status`.
#[derive(Debug, Clone)]
pub struct KernelStatus {
    pub energy_current: f32,
    pub energy_max: f32,
    pub zombie_active: bool,
    pub sleep_cycles: u64,
    pub last_trigger: SleepTrigger,
    pub cache_len: usize,
    pub cache_capacity: usize,
    pub processed_inputs: u64,
}

pub struct KernelLoop {
    pub hdc: SharedHdc,
    pub cache: WorkingMemoryCache,
    pub metabolism: SystemMetabolism,
    pub scheduler: SleepCycleScheduler,
    pub substrate: SubstrateMonitor,
    clock: Box<dyn Clock>,
    processed_inputs: u64,
}

impl KernelLoop {
    pub fn new(
        hdc: SharedHdc,
        cache: WorkingMemoryCache,
        metabolism: SystemMetabolism,
        scheduler: SleepCycleScheduler,
        substrate: SubstrateMonitor,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            hdc,
            cache,
            metabolism,
            scheduler,
            substrate,
            clock,
            processed_inputs: 0,
        }
    }

    /// Construct with a freshly owned, unshared `HdcSystem` — the common
    /// case for a standalone kernel.
    pub fn with_owned_hdc(
        cache: WorkingMemoryCache,
        metabolism: SystemMetabolism,
        scheduler: SleepCycleScheduler,
        substrate: SubstrateMonitor,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self::new(
            Rc::new(RefCell::new(HdcSystem::new())),
            cache,
            metabolism,
            scheduler,
            substrate,
            clock,
        )
    }

    pub fn processed_inputs(&self) -> u64 {
        self.processed_inputs
    }

    pub fn process_ingest_pipeline(
        &mut self,
        input: Option<DataStream>,
        probe: &dyn SubstrateProbe,
    ) -> IngestResult {
        let recommended = self.substrate.refresh(probe);
        if (recommended - self.metabolism.max_capacity()).abs() > f32::EPSILON {
            self.metabolism.rescale_max_capacity(recommended, true);
        }

        let Some(mut input) = input else {
            return IngestResult::failed("missing_input");
        };

        let now = self.clock.now();
        self.scheduler.mark_activity(now);
        input.dataset_type = CognitiveAdapter::normalize_type(&input.dataset_type);

        let profile = CognitiveAdapter::analyze_heuristics(&input);
        let target = {
            let mut hdc = self.hdc.borrow_mut();
            match CognitiveAdapter::l2_normalize_and_flatten(&input, &mut hdc) {
                Ok(t) => t,
                Err(_) => {
                    let mut result = IngestResult::failed("encode_failed");
                    result.outcome = Outcome::EncodeFailed;
                    result.profile = Some(profile);
                    return result;
                }
            }
        };
        self.hdc.borrow_mut().remember(target.clone());

        let mut result = if let Some((key, similarity)) = self
            .cache
            .cosine_similarity_hit(&target, profile.system1_similarity_threshold)
        {
            self.reflex_hit(&key, similarity, &target, &input, &profile)
        } else {
            self.deep_think(&target, &input, &profile)
        };

        self.processed_inputs += 1;
        let idle = false;
        let trigger = self.try_auto_sleep(idle);
        if trigger != SleepTrigger::None {
            result.sleep_triggered = true;
            result.sleep_reason = trigger;
        }
        result.energy_remaining = self.metabolism.current();
        result.profile = Some(profile);
        result
    }

    fn reflex_hit(
        &mut self,
        key: &str,
        similarity: f32,
        target: &crate::tensor::Tensor,
        input: &DataStream,
        profile: &SignalProfile,
    ) -> IngestResult {
        let cost = 1.0 + profile.deep_think_cost_bias * 0.15;
        self.metabolism.consume(cost);
        let existing_fitness = self.cache.get(key).map(|e| e.fitness).unwrap_or(0.0);
        let burn = cost / self.metabolism.max_capacity();
        self.cache.promote_to_cache(
            key,
            target.clone(),
            similarity.max(existing_fitness),
            &input.dataset_type,
            &input.dataset_id,
            burn,
        );
        IngestResult {
            success: true,
            reflex_hit: true,
            deep_think_path: false,
            zombie_triggered: false,
            sleep_triggered: false,
            discovery_triggered: false,
            iterations: 0,
            outcome: Outcome::System1Reflex,
            error: None,
            sleep_reason: SleepTrigger::None,
            cache_key: Some(key.to_string()),
            similarity: Some(similarity),
            energy_remaining: self.metabolism.current(),
            profile: None,
        }
    }

    fn deep_think(
        &mut self,
        target: &crate::tensor::Tensor,
        input: &DataStream,
        profile: &SignalProfile,
    ) -> IngestResult {
        let snapshot = self.cache.snapshot_by_priority(MEMORY_CANDIDATE_SNAPSHOT);
        let memory_candidates: Vec<crate::tensor::Tensor> =
            snapshot.iter().map(|e| e.vector.clone()).collect();

        let mut best: Option<crate::adapter::RouteCandidate> = None;
        let mut iterations = 0u32;

        while iterations < MAX_DEEP_THINK_ITERATIONS && self.metabolism.can_deep_think() {
            let candidate = CognitiveAdapter::route_dynamic_connectome(
                target,
                profile,
                &memory_candidates,
                iterations,
            );
            let cost = CognitiveAdapter::calculate_thermodynamic_cost(profile, iterations);
            self.metabolism.consume(cost);

            let passes = CognitiveAdapter::passes_critic_threshold(&candidate, profile, &self.metabolism);
            let is_better = best
                .as_ref()
                .map(|b| candidate.fitness > b.fitness)
                .unwrap_or(true);
            if is_better {
                best = Some(candidate.clone());
            }
            iterations += 1;

            if passes {
                let key = format!("{}::{}", input.dataset_type, input.dataset_id);
                let id_seed = fnv64_str(&format!("{}:{}", input.payload, iterations));
                let id = hex16(id_seed);
                let burn = cost / self.metabolism.max_capacity();
                self.cache.promote_to_cache(
                    &key,
                    candidate.vector.clone(),
                    candidate.fitness,
                    &input.dataset_type,
                    &id,
                    burn,
                );
                let discovery = candidate.strategy == crate::adapter::Strategy::DiscoveryInduction;
                if discovery {
                    let shifted = TensorOps::permute(target, 42);
                    let gap = CognitiveAdapter::deduce_geometric_gap(target, &shifted);
                    self.cache.flag_anomaly(&key, Some(gap));
                }
                return IngestResult {
                    success: true,
                    reflex_hit: false,
                    deep_think_path: true,
                    zombie_triggered: false,
                    sleep_triggered: false,
                    discovery_triggered: discovery,
                    iterations,
                    outcome: Outcome::System2VolatileHit,
                    error: None,
                    sleep_reason: SleepTrigger::None,
                    cache_key: Some(key),
                    similarity: Some(candidate.similarity),
                    energy_remaining: self.metabolism.current(),
                    profile: None,
                };
            }
        }

        let exhausted = iterations >= MAX_DEEP_THINK_ITERATIONS;
        let zombie =
            self.metabolism.current() <= self.metabolism.zombie_activation_threshold() || exhausted;
        let outcome = if zombie {
            Outcome::ZombieMode
        } else {
            Outcome::FatigueLimit
        };
        IngestResult {
            success: false,
            reflex_hit: false,
            deep_think_path: true,
            zombie_triggered: zombie,
            sleep_triggered: false,
            discovery_triggered: false,
            iterations,
            outcome,
            error: Some(outcome.as_str().to_string()),
            sleep_reason: SleepTrigger::None,
            cache_key: None,
            similarity: best.map(|b| b.similarity),
            energy_remaining: self.metabolism.current(),
            profile: None,
        }
    }

    /// Poll the scheduler; on a non-`None` trigger, run the full sleep
    /// cycle and return the trigger.
    pub fn try_auto_sleep(&mut self, idle: bool) -> SleepTrigger {
        let now = self.clock.now();
        let energy_pct = self.metabolism.energy_pct();
        let trigger = self
            .scheduler
            .monitor_metabolic_load(now, energy_pct, idle, &self.cache);
        if trigger != SleepTrigger::None {
            self.trigger_sleep_cycle(trigger);
        }
        trigger
    }

    /// Lock interrupts, consolidate anomalies into the cache, clear them,
    /// decay fitness, recharge energy, and complete the sleep cycle.
    pub fn trigger_sleep_cycle(&mut self, reason: SleepTrigger) {
        self.scheduler.lock_hardware_interrupts(reason);
        CognitiveAdapter::consolidate_memory(&self.cache);
        self.cache.clear_anomalies();
        self.cache.apply_time_decay(0.93, 0.20);
        self.metabolism.recharge(None);
        let now = self.clock.now();
        self.scheduler.complete_sleep(now);
    }

    pub fn get_status(&self) -> KernelStatus {
        KernelStatus {
            energy_current: self.metabolism.current(),
            energy_max: self.metabolism.max_capacity(),
            zombie_active: self.metabolism.is_zombie_active(),
            sleep_cycles: self.scheduler.sleep_cycles(),
            last_trigger: self.scheduler.last_trigger(),
            cache_len: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            processed_inputs: self.processed_inputs,
        }
    }

    /// Carve a sub-budget of this kernel's last-known substrate
    /// recommendation for a `ProgramManifold` tenant.
    pub fn allocate_energy_budget(&self, percentage: f32, minimum: f32) -> f32 {
        self.substrate.allocate_from(percentage, minimum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::StaticSubstrateProbe;

    fn fresh_kernel() -> KernelLoop {
        let now = Utc::now();
        KernelLoop::with_owned_hdc(
            WorkingMemoryCache::new(64),
            SystemMetabolism::configure_relative(100.0, 0.28, 0.20, 0.0).unwrap(),
            SleepCycleScheduler::new(now, 0.15, 0.9, 3600, 3600),
            SubstrateMonitor::new(StaticSubstrateProbe::default_reading()),
            Box::new(SystemClock),
        )
    }

    fn stream(id: &str, payload: &str) -> DataStream {
        DataStream {
            dataset_type: "Text".to_string(),
            dataset_id: id.to_string(),
            payload: payload.to_string(),
            dim_hint: 64,
        }
    }

    #[test]
    fn missing_input_fails() {
        let mut kernel = fresh_kernel();
        let probe = StaticSubstrateProbe::default();
        let result = kernel.process_ingest_pipeline(None, &probe);
        assert!(!result.success);
        assert_eq!(result.outcome, Outcome::Failed);
    }

    #[test]
    fn second_identical_ingest_is_reflex_hit() {
        let mut kernel = fresh_kernel();
        let probe = StaticSubstrateProbe::default();
        let first = kernel.process_ingest_pipeline(Some(stream("1", "A")), &probe);
        assert!(first.success);
        let second = kernel.process_ingest_pipeline(Some(stream("1", "A")), &probe);
        assert!(second.reflex_hit);
        assert_eq!(second.outcome, Outcome::System1Reflex);
        assert_eq!(second.iterations, 0);
    }

    #[test]
    fn novel_payload_takes_deep_think_path_and_uses_energy() {
        let mut kernel = fresh_kernel();
        let probe = StaticSubstrateProbe::default();
        let before = kernel.metabolism.current();
        let result = kernel.process_ingest_pipeline(Some(stream("1", "A B C unique payload")), &probe);
        assert!(result.deep_think_path);
        assert!(kernel.metabolism.current() < before);
        assert!(result.iterations >= 1);
    }

    #[test]
    fn status_reports_cache_and_energy() {
        let kernel = fresh_kernel();
        let status = kernel.get_status();
        assert_eq!(status.cache_len, 0);
        assert_eq!(status.energy_max, 100.0);
    }

    #[test]
    fn sleep_cycle_recharges_and_clears_anomalies() {
        let mut kernel = fresh_kernel();
        kernel.metabolism.consume(50.0);
        kernel.cache.flag_anomaly("k", None);
        let before_cycles = kernel.scheduler.sleep_cycles();
        kernel.trigger_sleep_cycle(SleepTrigger::Manual);
        assert_eq!(kernel.metabolism.current(), kernel.metabolism.max_capacity());
        assert!(kernel.cache.get_anomalies().is_empty());
        assert_eq!(kernel.scheduler.sleep_cycles(), before_cycles);
    }
}

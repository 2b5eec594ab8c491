//! ProgramManifold
//!
//! A tenant sub-kernel: its own ruleset, cache, and metabolism, but a
//! symbol space shared with its host via `SharedHdc` (§5: "the HdcSystem —
//! specifically its SymbolSpace — may be shared across ProgramManifolds").

use chrono::Utc;

use crate::cache::WorkingMemoryCache;
use crate::kernel::{Clock, KernelLoop, SystemClock};
use crate::metabolism::SystemMetabolism;
use crate::ruleset::{ReflexTrigger, Ruleset};
use crate::sleep::{SleepCycleScheduler, SleepTrigger};
use crate::substrate::SubstrateMonitor;

pub struct ProgramManifold {
    pub tenant_id: String,
    pub ruleset: Ruleset,
    kernel: KernelLoop,
}

impl ProgramManifold {
    /// Register `ruleset`'s symbols into the host's shared symbol space,
    /// carve out `percentage` of the host's substrate-recommended budget
    /// (floored at `minimum`), and spin up a private kernel sharing the
    /// host's `HdcSystem`.
    pub fn new(
        tenant_id: &str,
        ruleset: Ruleset,
        host: &KernelLoop,
        cache_capacity: usize,
        percentage: f32,
        minimum: f32,
    ) -> Self {
        Self::with_clock(
            tenant_id,
            ruleset,
            host,
            cache_capacity,
            percentage,
            minimum,
            Box::new(SystemClock),
        )
    }

    pub fn with_clock(
        tenant_id: &str,
        ruleset: Ruleset,
        host: &KernelLoop,
        cache_capacity: usize,
        percentage: f32,
        minimum: f32,
        clock: Box<dyn Clock>,
    ) -> Self {
        {
            let mut hdc = host.hdc.borrow_mut();
            for (name, vector) in &ruleset.symbol_definitions {
                // Last-writer-wins on conflicting dim, per §5 — a failed
                // registration here just means a later caller's dim won.
                let _ = hdc.symbols.register(name, vector.clone());
            }
        }

        let budget = host.allocate_energy_budget(percentage, minimum);
        let metabolism = SystemMetabolism::configure_relative(budget, 0.28, 0.20, 0.0)
            .unwrap_or_else(|_| SystemMetabolism::configure_relative(minimum.max(1.0), 0.28, 0.20, 0.0).unwrap());
        let now = Utc::now();
        let scheduler = SleepCycleScheduler::new(now, 0.15, 0.85, 3600, 600);
        let substrate = SubstrateMonitor::new(host.substrate.last_known());

        let kernel = KernelLoop::new(
            host.hdc.clone(),
            WorkingMemoryCache::new(cache_capacity),
            metabolism,
            scheduler,
            substrate,
            clock,
        );

        Self {
            tenant_id: tenant_id.to_string(),
            ruleset,
            kernel,
        }
    }

    pub fn kernel(&mut self) -> &mut KernelLoop {
        &mut self.kernel
    }

    pub fn kernel_ref(&self) -> &KernelLoop {
        &self.kernel
    }

    /// Evolve the local ruleset from consolidated anomalies, then trigger
    /// a manual sleep on the local kernel.
    pub fn sleep(&mut self) -> SleepTrigger {
        self.evolve_ruleset();
        self.kernel.trigger_sleep_cycle(SleepTrigger::Manual);
        SleepTrigger::Manual
    }

    /// Each anomaly becomes a symbol override plus a new `ReflexTrigger`
    /// with `similarity_threshold = heuristics.critic_min` and
    /// `action_intent = "execute_geometric_shift"`.
    fn evolve_ruleset(&mut self) {
        let anomalies = self.kernel.cache.get_anomalies();
        for (key, deduced) in anomalies {
            let Some(deduced) = deduced else { continue };
            self.ruleset
                .symbol_definitions
                .insert(key.clone(), deduced);
            self.ruleset.reflex_triggers.push(ReflexTrigger {
                target_symbol: key,
                similarity_threshold: self.ruleset.heuristics.critic_min,
                action_intent: "execute_geometric_shift".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DataStream;
    use crate::substrate::StaticSubstrateProbe;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn host_kernel() -> KernelLoop {
        let now = Utc::now();
        KernelLoop::new(
            Rc::new(RefCell::new(crate::hdc::HdcSystem::new())),
            WorkingMemoryCache::new(64),
            SystemMetabolism::configure_relative(200.0, 0.28, 0.20, 0.0).unwrap(),
            SleepCycleScheduler::new(now, 0.15, 0.9, 3600, 3600),
            SubstrateMonitor::new(StaticSubstrateProbe::default_reading()),
            Box::new(SystemClock),
        )
    }

    #[test]
    fn manifold_gets_a_sub_budget_not_the_full_host_budget() {
        let host = host_kernel();
        let manifold = ProgramManifold::new("tenant-a", Ruleset::default(), &host, 16, 0.25, 1.0);
        assert!(manifold.kernel_ref().metabolism.max_capacity() <= host.allocate_energy_budget(1.0, 0.0));
    }

    #[test]
    fn sleep_evolves_ruleset_from_anomalies() {
        let host = host_kernel();
        let mut manifold = ProgramManifold::new("tenant-b", Ruleset::default(), &host, 16, 0.5, 1.0);
        let probe = StaticSubstrateProbe::default();
        manifold.kernel().process_ingest_pipeline(
            Some(DataStream {
                dataset_type: "t".to_string(),
                dataset_id: "1".to_string(),
                payload: "trigger discovery seven rounds of search".to_string(),
                dim_hint: 32,
            }),
            &probe,
        );
        // Force an anomaly directly to exercise evolution deterministically.
        manifold
            .kernel()
            .cache
            .flag_anomaly("k", Some(crate::tensor::Tensor::from_vec(vec![1.0, 0.0])));
        let before = manifold.ruleset.reflex_triggers.len();
        manifold.sleep();
        assert!(manifold.ruleset.reflex_triggers.len() > before);
        assert!(manifold.ruleset.symbol_definitions.contains_key("k"));
    }

    #[test]
    fn symbols_are_registered_into_shared_space() {
        let host = host_kernel();
        let mut ruleset = Ruleset::default();
        ruleset
            .symbol_definitions
            .insert("CUSTOM".to_string(), crate::tensor::Tensor::from_vec(vec![1.0, 0.0]));
        let _manifold = ProgramManifold::new("tenant-c", ruleset, &host, 8, 0.5, 1.0);
        assert!(host.hdc.borrow().symbols.symbol_dim().is_some());
    }
}

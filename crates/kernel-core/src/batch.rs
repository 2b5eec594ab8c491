//! BatchController
//!
//! FIFO queue of `DataStream` drained against a kernel up to a per-call
//! item budget, tallying the six outcome counters spec §4.9 names.

use std::collections::VecDeque;

use crate::adapter::DataStream;
use crate::kernel::{KernelLoop, Outcome};
use crate::substrate::SubstrateProbe;

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub processed: u64,
    pub succeeded: u64,
    pub reflex: u64,
    pub deep_think: u64,
    pub zombie: u64,
    pub sleep: u64,
    pub failures: u64,
}

#[derive(Default)]
pub struct BatchController {
    queue: VecDeque<DataStream>,
}

impl BatchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, item: DataStream) {
        self.queue.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drain up to `max_items` (or the whole queue, whichever is smaller)
    /// through `kernel`.
    pub fn run(
        &mut self,
        kernel: &mut KernelLoop,
        max_items: usize,
        probe: &dyn SubstrateProbe,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for _ in 0..max_items {
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            let result = kernel.process_ingest_pipeline(Some(item), probe);
            report.processed += 1;
            if result.success {
                report.succeeded += 1;
            } else {
                report.failures += 1;
            }
            match result.outcome {
                Outcome::System1Reflex => report.reflex += 1,
                Outcome::System2VolatileHit | Outcome::FatigueLimit => report.deep_think += 1,
                Outcome::ZombieMode => report.zombie += 1,
                _ => {}
            }
            if result.sleep_triggered {
                report.sleep += 1;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::WorkingMemoryCache;
    use crate::kernel::SystemClock;
    use crate::metabolism::SystemMetabolism;
    use crate::sleep::SleepCycleScheduler;
    use crate::substrate::{StaticSubstrateProbe, SubstrateMonitor};
    use chrono::Utc;

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

    #[test]
    fn drains_up_to_max_items() {
        let mut kernel = fresh_kernel();
        let probe = StaticSubstrateProbe::default();
        let mut batch = BatchController::new();
        for i in 0..5 {
            batch.enqueue(DataStream {
                dataset_type: "t".to_string(),
                dataset_id: i.to_string(),
                payload: format!("payload {i}"),
                dim_hint: 32,
            });
        }
        let report = batch.run(&mut kernel, 3, &probe);
        assert_eq!(report.processed, 3);
        assert_eq!(batch.len(), 2);
    }
}

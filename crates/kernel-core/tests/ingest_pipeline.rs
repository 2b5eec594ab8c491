//! End-to-end ingest pipeline: reflex hit, deep-think novelty, and a
//! metabolic-drain-forced sleep cycle that recharges energy and clears
//! anomalies.

use chrono::Utc;

use kernel_core::adapter::DataStream;
use kernel_core::cache::WorkingMemoryCache;
use kernel_core::kernel::{KernelLoop, Outcome, SystemClock};
use kernel_core::metabolism::SystemMetabolism;
use kernel_core::sleep::SleepCycleScheduler;
use kernel_core::substrate::{StaticSubstrateProbe, SubstrateMonitor};

fn stream(id: &str, payload: &str) -> DataStream {
    DataStream {
        dataset_type: "Text".to_string(),
        dataset_id: id.to_string(),
        payload: payload.to_string(),
        dim_hint: 48,
    }
}

#[test]
fn reflex_then_deep_think_then_forced_sleep() {
    let now = Utc::now();
    let mut kernel = KernelLoop::with_owned_hdc(
        WorkingMemoryCache::new(32),
        SystemMetabolism::configure_relative(40.0, 0.28, 0.20, 0.0).unwrap(),
        SleepCycleScheduler::new(now, 0.15, 0.9, 3600, 3600),
        SubstrateMonitor::new(StaticSubstrateProbe::default_reading()),
        Box::new(SystemClock),
    );
    let probe = StaticSubstrateProbe::default();

    let first = kernel.process_ingest_pipeline(Some(stream("a", "the quick brown fox")), &probe);
    assert!(first.success);
    assert!(first.deep_think_path);

    let repeat = kernel.process_ingest_pipeline(Some(stream("a", "the quick brown fox")), &probe);
    assert!(repeat.reflex_hit);
    assert_eq!(repeat.outcome, Outcome::System1Reflex);

    // Drive the budget down until a metabolic-drain sleep fires on its own.
    let mut triggered = false;
    for i in 0..64 {
        let result = kernel.process_ingest_pipeline(
            Some(stream(&i.to_string(), &format!("distinct payload number {i}"))),
            &probe,
        );
        if result.sleep_triggered {
            triggered = true;
            break;
        }
    }
    assert!(triggered, "expected a metabolic-drain sleep to fire as energy drained");

    let status = kernel.get_status();
    assert!(status.energy_current > 0.0);
}

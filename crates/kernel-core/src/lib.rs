//! # Kernel Core
//!
//! An adaptive cognitive kernel: a hyperdimensional-computing substrate
//! (`tensor`, `symbol`, `sequence`, `hdc`) feeds an ingest pipeline
//! (`kernel`) that gates between a fast reflex cache (`cache`) and an
//! iterative deep-think search (`adapter`). A metabolic energy budget
//! (`metabolism`) throttles deep-think and a sleep/consolidation scheduler
//! (`sleep`) decides when to fold anomalies back into memory. Content is
//! addressable on disk through a holographic file store (`hfs`), and
//! per-tenant sub-kernels (`manifold`) share the host's symbol space while
//! keeping their own ruleset, cache, and budget.
//!
//! ## Quick start
//!
//! ```rust
//! use kernel_core::adapter::DataStream;
//! use kernel_core::kernel::{KernelLoop, SystemClock};
//! use kernel_core::cache::WorkingMemoryCache;
//! use kernel_core::metabolism::SystemMetabolism;
//! use kernel_core::sleep::SleepCycleScheduler;
//! use kernel_core::substrate::{StaticSubstrateProbe, SubstrateMonitor};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut kernel = KernelLoop::with_owned_hdc(
//!     WorkingMemoryCache::new(256),
//!     SystemMetabolism::configure_relative(100.0, 0.28, 0.20, 0.0).unwrap(),
//!     SleepCycleScheduler::new(now, 0.15, 0.85, 3600, 600),
//!     SubstrateMonitor::new(StaticSubstrateProbe::default_reading()),
//!     Box::new(SystemClock),
//! );
//! let probe = StaticSubstrateProbe::default();
//! let result = kernel.process_ingest_pipeline(
//!     Some(DataStream {
//!         dataset_type: "text".to_string(),
//!         dataset_id: "1".to_string(),
//!         payload: "the mitochondria is the powerhouse of the cell".to_string(),
//!         dim_hint: 0,
//!     }),
//!     &probe,
//! );
//! assert!(result.success);
//! ```

pub mod adapter;
pub mod batch;
pub mod cache;
pub mod fnv;
pub mod hdc;
pub mod hfs;
pub mod kernel;
pub mod manifold;
pub mod metabolism;
pub mod ruleset;
pub mod sequence;
pub mod sleep;
pub mod substrate;
pub mod symbol;
pub mod tensor;

pub use adapter::{CognitiveAdapter, DataStream, RouteCandidate, SignalProfile, Strategy};
pub use batch::{BatchController, BatchReport};
pub use cache::{CacheEntry, WorkingMemoryCache};
pub use hdc::HdcSystem;
pub use hfs::{Entry as HfsEntry, HfsError, HolographicFileSystem};
pub use kernel::{Clock, IngestResult, KernelLoop, KernelStatus, Outcome, SharedHdc, SystemClock};
pub use manifold::ProgramManifold;
pub use metabolism::{MetabolismError, SystemMetabolism};
pub use ruleset::{HeuristicConfig, ReflexTrigger, Ruleset, RulesetError, RulesetParser};
pub use sleep::{SleepCycleScheduler, SleepTrigger};
pub use substrate::{SubstrateMonitor, SubstrateProbe, SubstrateReading};
pub use symbol::{SymbolError, SymbolSpace};
pub use tensor::{Tensor, TensorError, TensorOps};

/// Crate version, surfaced in `kernel status --json` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

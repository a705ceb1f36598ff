//! fsindex Core Components
//!
//! This crate ties the scanner and the sync client together: configuration,
//! scan identifiers, per-run statistics, engine construction, the single-run
//! guard and the scan orchestrator that drives one pass end to end.

mod config;
mod engine;
mod error;
mod lock;
mod orchestrator;
mod scan_id;
mod stats;

pub use config::{Backend, EngineConfig, IndexerConfig, RetryConfig, RootConfig};
pub use engine::{connect, writer_for};
pub use error::CoreError;
pub use lock::PidLock;
pub use orchestrator::{RunPhase, ScanOrchestrator};
pub use scan_id::ScanIdGenerator;
pub use stats::{RunSummary, ScanStats};

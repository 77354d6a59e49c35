//! poserelay Core - Snapshot Consolidation and Noisy-Sensor Relay
//!
//! This library relays pose telemetry for a dynamically growing set of
//! agents inside a simulated multi-agent environment:
//! 1. **Discovery**: agents are registered as their names first appear
//! 2. **Consolidation**: raw snapshots are filtered, renamed, and sorted
//! 3. **Relay**: per-agent pose streams plus a bounded recent-path history
//! 4. **Noise**: optional uniform positional noise with a cached 6x6
//!    measurement-covariance estimate, emulating a noisy sensor

pub mod consolidate;
pub mod error;
pub mod history;
pub mod noise;
pub mod registry;
pub mod scheduler;

// Re-export key types for convenience
pub use consolidate::SnapshotConsolidator;
pub use error::RelayError;
pub use history::PathHistory;
pub use noise::{NoiseModel, NoiseStrategy};
pub use registry::{Entity, EntityRegistry};
pub use scheduler::{RelayConfig, RelayScheduler};

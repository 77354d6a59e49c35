//! Consolidation of raw snapshots into the canonical per-agent form.

use crate::registry::Entity;
use poserelay_env::{NamedPose, Snapshot};
use tracing::warn;

/// Filters, renames, and orders raw named-pose snapshots.
///
/// Entries whose name starts with the configured prefix are kept; the
/// prefix is replaced with the canonical tag (e.g. `sim_3` -> `agent3`)
/// and the result is sorted lexicographically by renamed name.
///
/// Entries whose renamed suffix does not parse as an integer id are
/// rejected here, at the boundary, with a warning - a single malformed
/// producer name must not abort ingestion of the rest of the snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotConsolidator {
    /// Producer-side name prefix selecting agents of interest
    prefix: String,

    /// Canonical tag substituted for the prefix
    tag: String,
}

impl SnapshotConsolidator {
    pub fn new(prefix: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            tag: tag.into(),
        }
    }

    /// Consolidates a raw snapshot into canonical form.
    ///
    /// Empty input, or input with no matching names, yields an empty
    /// snapshot - never an error.
    pub fn consolidate(&self, raw: &Snapshot) -> Snapshot {
        let mut kept: Vec<NamedPose> = raw
            .iter()
            .filter(|entry| entry.name.starts_with(&self.prefix))
            .filter_map(|entry| {
                let renamed = entry.name.replace(&self.prefix, &self.tag);
                match Entity::parse(&renamed, &self.tag) {
                    Ok(_) => Some(NamedPose::new(renamed, entry.pose)),
                    Err(err) => {
                        warn!(name = %entry.name, %err, "rejecting snapshot entry");
                        None
                    }
                }
            })
            .collect();

        // Lexicographic by renamed string, not numeric id: "agent10" sorts
        // before "agent2". Downstream consumers depend on this order only
        // for reproducibility.
        kept.sort_by(|a, b| a.name.cmp(&b.name));

        Snapshot::new(kept)
    }
}

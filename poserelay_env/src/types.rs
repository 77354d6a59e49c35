//! Wire types shared by the relay core and the transport boundary.

use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A rigid-body pose: position plus orientation.
///
/// The relay treats poses as opaque values - they are copied and
/// republished, never mutated in place. The only transformation applied
/// anywhere in the pipeline is positional noise injection, which produces
/// a new `Pose`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the world frame (meters)
    pub position: Point3<f64>,

    /// Orientation in the world frame
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Creates a pose from position and orientation.
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Creates a pose at the given position with identity orientation.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(0.0, 0.0, 0.0)
    }
}

/// One named entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPose {
    /// Producer-assigned model name (e.g. `sim_3`)
    pub name: String,

    /// The pose at the snapshot instant
    pub pose: Pose,
}

impl NamedPose {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
        }
    }
}

/// The full named-pose state of all agents at one instant.
///
/// Names are unique within a snapshot (producer invariant).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub poses: Vec<NamedPose>,
}

impl Snapshot {
    pub fn new(poses: Vec<NamedPose>) -> Self {
        Self { poses }
    }

    /// Iterates over the entries in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedPose> {
        self.poses.iter()
    }

    /// Iterates over the entry names in snapshot order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.poses.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// A pose tagged with the context-relative monotonic time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    /// Monotonic timestamp from the relay context
    pub stamp: Duration,

    /// The observed pose
    pub pose: Pose,
}

impl StampedPose {
    pub fn new(stamp: Duration, pose: Pose) -> Self {
        Self { stamp, pose }
    }
}

/// One publication emitted by the relay.
///
/// Each variant corresponds to one outbound stream of the pub/sub
/// boundary; a concrete transport maps variants onto topics, channels,
/// or output records as it sees fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelayOutput {
    /// The consolidated (or noised) snapshot, republished on every ingest
    Aggregate(Snapshot),

    /// Per-agent pose stream (ground-truth stage)
    Pose { name: String, pose: StampedPose },

    /// Per-agent pose stream with the cached measurement covariance
    /// (noisy stage); `covariance` is the 6x6 matrix flattened row-major
    PoseWithCovariance {
        name: String,
        pose: StampedPose,
        covariance: Vec<f64>,
    },

    /// Per-agent bounded recent-path stream (noisy stage), oldest first
    Path {
        name: String,
        poses: Vec<StampedPose>,
    },
}

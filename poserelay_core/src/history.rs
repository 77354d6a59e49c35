//! Bounded FIFO of timestamped poses per agent.

use poserelay_env::StampedPose;
use std::collections::VecDeque;

/// Bounded recent-path history with strict FIFO eviction.
///
/// Length never exceeds the capacity; each append evicts at most one
/// element from the front (appends arrive at most once per history tick).
#[derive(Debug, Clone)]
pub struct PathHistory {
    poses: VecDeque<StampedPose>,
    capacity: usize,
}

impl PathHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            poses: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a stamped pose, evicting the oldest entry when full.
    pub fn append(&mut self, pose: StampedPose) {
        self.poses.push_back(pose);
        if self.poses.len() > self.capacity {
            self.poses.pop_front();
        }
    }

    /// Returns the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<StampedPose> {
        self.poses.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

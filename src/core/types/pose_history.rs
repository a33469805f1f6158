//! Retained pose history with timed queries.
//!
//! The controller records every successfully tracked pose here; timed-pose
//! queries interpolate between retained entries and fail explicitly when the
//! requested time falls outside the retained span. A pose is never
//! fabricated for an uncovered timestamp.

use std::collections::VecDeque;

use crate::core::types::{pose, Pose, Timestamped};
use crate::error::{LocateError, Result};

/// Bounded history of timestamped poses.
///
/// Entries are pushed in timestamp order; out-of-order pushes are rejected.
/// Capacity bounds memory under sustained operation: the oldest entry is
/// evicted when full.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    entries: VecDeque<Timestamped<Pose>>,
    capacity: usize,
}

impl PoseHistory {
    /// Create a history retaining at most `capacity` poses.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Number of retained poses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all retained poses.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record a tracked pose.
    ///
    /// Returns `false` (and drops the pose) when its timestamp is not newer
    /// than the latest retained entry.
    pub fn push(&mut self, pose: Timestamped<Pose>) -> bool {
        if let Some(last) = self.entries.back() {
            if pose.timestamp_us <= last.timestamp_us {
                return false;
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(pose);
        true
    }

    /// Most recent pose, if any.
    pub fn latest(&self) -> Option<&Timestamped<Pose>> {
        self.entries.back()
    }

    /// Pose at `timestamp_us`, interpolated between the two bracketing
    /// entries.
    ///
    /// Fails with [`LocateError::NoPose`] when the history is empty and with
    /// [`LocateError::QueryOutOfRange`] when the timestamp falls outside the
    /// retained span.
    pub fn pose_at(&self, timestamp_us: u64) -> Result<Pose> {
        let (oldest, newest) = match (self.entries.front(), self.entries.back()) {
            (Some(f), Some(b)) => (f.timestamp_us, b.timestamp_us),
            _ => return Err(LocateError::NoPose),
        };
        if timestamp_us < oldest || timestamp_us > newest {
            return Err(LocateError::QueryOutOfRange {
                requested_us: timestamp_us,
                oldest_us: oldest,
                newest_us: newest,
            });
        }

        // Binary search for the first entry at or after the query time.
        let idx = self
            .entries
            .partition_point(|e| e.timestamp_us < timestamp_us);
        let upper = &self.entries[idx];
        if upper.timestamp_us == timestamp_us || idx == 0 {
            return Ok(upper.data);
        }
        let lower = &self.entries[idx - 1];
        pose::interpolate(lower, upper, timestamp_us).ok_or(LocateError::QueryOutOfRange {
            requested_us: timestamp_us,
            oldest_us: oldest,
            newest_us: newest,
        })
    }
}

//! Bounded pose channel between the controller and the map window thread.
//!
//! The controller pushes every tracked pose; the window thread only ever
//! cares about the most recent one. The queue therefore has an explicit
//! capacity with a drop-oldest overflow policy: the producer never blocks,
//! and memory stays bounded under sustained backpressure.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::core::types::{Pose, Timestamped};

/// Producer end, held by the controller.
#[derive(Debug, Clone)]
pub struct PoseSender {
    tx: Sender<Timestamped<Pose>>,
    rx: Receiver<Timestamped<Pose>>,
}

/// Consumer end, held by the map window thread.
#[derive(Debug)]
pub struct PoseReceiver {
    rx: Receiver<Timestamped<Pose>>,
}

/// Create a bounded pose queue pair.
///
/// `capacity` is clamped to at least 1.
pub fn pose_queue(capacity: usize) -> (PoseSender, PoseReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        PoseSender {
            tx,
            rx: rx.clone(),
        },
        PoseReceiver { rx },
    )
}

impl PoseSender {
    /// Enqueue a pose without blocking.
    ///
    /// When the queue is full the oldest entry is dropped to make room;
    /// only the most recent pose matters for local-map relevance.
    pub fn send_latest(&self, pose: Timestamped<Pose>) {
        let mut pending = pose;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(p)) => {
                    let _ = self.rx.try_recv();
                    pending = p;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Number of queued poses.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl PoseReceiver {
    /// Block for the next pose, up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout (a shutdown-check wake point) and
    /// `Err(())` when the producer side is gone.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<Option<Timestamped<Pose>>, ()> {
        match self.rx.recv_timeout(timeout) {
            Ok(pose) => Ok(Some(pose)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    /// Drain any queued poses, returning the newest of `latest` and the
    /// drained entries.
    ///
    /// Called after a successful receive so a burst of poses collapses into
    /// a single rebuild centered on the freshest one.
    pub fn drain_to_latest(&self, latest: Timestamped<Pose>) -> Timestamped<Pose> {
        let mut newest = latest;
        while let Ok(pose) = self.rx.try_recv() {
            if pose.timestamp_us >= newest.timestamp_us {
                newest = pose;
            }
        }
        newest
    }
}

//! Local map window thread.
//!
//! Rebuilding the local map means a radius query over the keyframe index
//! plus a union/downsample of fragment clouds, too expensive for the
//! per-frame estimation path. This thread decouples it:
//!
//! - Wakes when the controller pushes a pose onto the queue (blocking wait
//!   with a timeout so shutdown is never delayed past one wake period).
//! - Collapses queued poses to the most recent one, rebuilds under a graph
//!   read lock, and publishes the finished map by swapping the shared
//!   handle.
//! - On empty radius query it keeps the previous map and raises the
//!   no-coverage flag for the controller instead of publishing nothing.
//!
//! The thread never mutates a published map; readers always see either the
//! prior or the fully-new map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;

use crate::engine::map::{build_local_map, LocalMapConfig, LocalMapHandle, MapGraph};
use crate::state::PoseReceiver;

/// Wake period for shutdown checks while the queue is idle.
const WAKE_PERIOD: Duration = Duration::from_millis(100);

/// Handle to the running local map thread.
pub struct LocalMapThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl LocalMapThread {
    /// Spawn the window thread.
    pub fn spawn(
        config: LocalMapConfig,
        graph: Arc<RwLock<MapGraph>>,
        local_map: LocalMapHandle,
        pose_rx: PoseReceiver,
        no_coverage: Arc<AtomicBool>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("local-map".into())
            .spawn(move || {
                run_window_loop(config, graph, local_map, pose_rx, no_coverage, thread_running);
            })
            .expect("Failed to spawn local map thread");

        Self { handle, running }
    }

    /// Signal the thread to stop and wait for it to finish.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn run_window_loop(
    config: LocalMapConfig,
    graph: Arc<RwLock<MapGraph>>,
    local_map: LocalMapHandle,
    pose_rx: PoseReceiver,
    no_coverage: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
) {
    log::info!("local map thread starting (radius {} m)", config.radius);
    let mut generation = local_map.snapshot().generation;

    while running.load(Ordering::SeqCst) {
        let pose = match pose_rx.recv_timeout(WAKE_PERIOD) {
            Ok(Some(pose)) => pose_rx.drain_to_latest(pose),
            Ok(None) => continue,
            Err(()) => {
                log::debug!("pose queue disconnected, local map thread exiting");
                break;
            }
        };

        generation += 1;
        let rebuilt = {
            let graph = graph.read();
            build_local_map(&graph, &pose.data, &config, generation)
        };

        match rebuilt {
            Some(map) => {
                log::debug!(
                    "local map {}: {} keyframes, {} points",
                    map.generation,
                    map.keyframe_ids.len(),
                    map.cloud.len()
                );
                no_coverage.store(false, Ordering::SeqCst);
                local_map.publish(Arc::new(map));
            }
            None => {
                // Outside the mapped area: keep the stale map so tracking
                // can limp along, but surface the condition.
                if !no_coverage.swap(true, Ordering::SeqCst) {
                    log::warn!(
                        "no keyframes within {} m of current pose, keeping previous local map",
                        config.radius
                    );
                }
            }
        }
    }

    log::info!("local map thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::pose::from_xyz_yaw;
    use crate::core::types::{PointCloud3D, Timestamped};
    use crate::engine::map::KeyFrame;
    use crate::state::pose_queue;

    fn test_graph() -> Arc<RwLock<MapGraph>> {
        let frames = (0..5)
            .map(|i| {
                Arc::new(KeyFrame::new(
                    i,
                    from_xyz_yaw(i as f64 * 10.0, 0.0, 0.0, 0.0),
                    PointCloud3D::from_points(vec![[0.0, 0.0, 0.0]]),
                    i * 1000,
                ))
            })
            .collect();
        Arc::new(RwLock::new(MapGraph::from_frames(frames)))
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) -> bool {
        for _ in 0..100 {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_thread_rebuilds_on_pose() {
        let (tx, rx) = pose_queue(4);
        let handle = LocalMapHandle::new();
        let no_coverage = Arc::new(AtomicBool::new(false));
        let thread = LocalMapThread::spawn(
            LocalMapConfig {
                radius: 15.0,
                voxel_resolution: 0.0,
            },
            test_graph(),
            handle.clone(),
            rx,
            no_coverage.clone(),
        );

        tx.send_latest(Timestamped::new(from_xyz_yaw(0.0, 0.0, 0.0, 0.0), 100));
        assert!(wait_for(|| handle.snapshot().generation > 0));

        let map = handle.snapshot();
        assert_eq!(map.keyframe_ids, vec![0, 1]);
        assert!(!no_coverage.load(Ordering::SeqCst));

        thread.stop();
    }

    #[test]
    fn test_thread_keeps_stale_map_outside_coverage() {
        let (tx, rx) = pose_queue(4);
        let handle = LocalMapHandle::new();
        let no_coverage = Arc::new(AtomicBool::new(false));
        let thread = LocalMapThread::spawn(
            LocalMapConfig {
                radius: 15.0,
                voxel_resolution: 0.0,
            },
            test_graph(),
            handle.clone(),
            rx,
            no_coverage.clone(),
        );

        tx.send_latest(Timestamped::new(from_xyz_yaw(0.0, 0.0, 0.0, 0.0), 100));
        assert!(wait_for(|| handle.snapshot().generation > 0));
        let before = handle.snapshot();

        tx.send_latest(Timestamped::new(from_xyz_yaw(9999.0, 0.0, 0.0, 0.0), 200));
        assert!(wait_for(|| no_coverage.load(Ordering::SeqCst)));

        // Previous map retained.
        let after = handle.snapshot();
        assert_eq!(after.generation, before.generation);
        assert_eq!(after.keyframe_ids, before.keyframe_ids);

        // Re-entering coverage clears the flag.
        tx.send_latest(Timestamped::new(from_xyz_yaw(10.0, 0.0, 0.0, 0.0), 300));
        assert!(wait_for(|| !no_coverage.load(Ordering::SeqCst)));

        thread.stop();
    }

    #[test]
    fn test_thread_stops_promptly_when_idle() {
        let (_tx, rx) = pose_queue(4);
        let handle = LocalMapHandle::new();
        let thread = LocalMapThread::spawn(
            LocalMapConfig::default(),
            test_graph(),
            handle,
            rx,
            Arc::new(AtomicBool::new(false)),
        );

        let start = std::time::Instant::now();
        thread.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}

//! Publish consistency of the local map window under concurrent access.
//!
//! Readers must only ever observe a fully built map: either the previous
//! window or the new one, never a mixture of the two.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;

use dhruva_locate::core::types::pose;
use dhruva_locate::state::pose_queue;
use dhruva_locate::threads::LocalMapThread;
use dhruva_locate::{KeyFrame, LocalMapConfig, LocalMapHandle, MapGraph, PointCloud3D, Timestamped};

/// Points carried by every keyframe fragment.
const POINTS_PER_FRAME: usize = 50;

/// Two well-separated keyframe clusters. Cluster A has ids 0..5 near the
/// origin, cluster B has ids 100..105 around x = 1000.
fn clustered_graph() -> Arc<RwLock<MapGraph>> {
    let mut frames = Vec::new();
    for i in 0..5u64 {
        frames.push(frame(i, i as f64 * 2.0));
    }
    for i in 0..5u64 {
        frames.push(frame(100 + i, 1000.0 + i as f64 * 2.0));
    }
    Arc::new(RwLock::new(MapGraph::from_frames(frames)))
}

fn frame(id: u64, x: f64) -> Arc<KeyFrame> {
    let cloud = PointCloud3D::from_points(
        (0..POINTS_PER_FRAME)
            .map(|k| [k as f32 * 0.01, 0.0, 0.0])
            .collect(),
    );
    Arc::new(KeyFrame::new(
        id,
        pose::from_xyz_yaw(x, 0.0, 0.0, 0.0),
        cloud,
        id * 1000,
    ))
}

#[test]
fn readers_never_observe_a_partially_rebuilt_map() {
    let graph = clustered_graph();
    let handle = LocalMapHandle::new();
    let (tx, rx) = pose_queue(4);

    let thread = LocalMapThread::spawn(
        LocalMapConfig {
            radius: 20.0,
            voxel_resolution: 0.0,
        },
        graph,
        handle.clone(),
        rx,
        Arc::new(AtomicBool::new(false)),
    );

    // Writer: bounce the window between the two clusters as fast as the
    // thread will take poses.
    let writer = {
        let tx = tx.clone();
        thread::spawn(move || {
            for i in 0..200u64 {
                let x = if i % 2 == 0 { 0.0 } else { 1000.0 };
                tx.send_latest(Timestamped::new(pose::from_xyz_yaw(x, 0.0, 0.0, 0.0), i + 1));
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    // Reader: every snapshot must be entirely cluster A or entirely
    // cluster B, with a cloud size matching its keyframe count.
    let mut observed_generations = 0u64;
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        let map = handle.snapshot();
        if map.generation == 0 {
            continue;
        }
        observed_generations = observed_generations.max(map.generation);

        let all_a = map.keyframe_ids.iter().all(|&id| id < 100);
        let all_b = map.keyframe_ids.iter().all(|&id| id >= 100);
        assert!(
            all_a || all_b,
            "mixed clusters in one snapshot: {:?}",
            map.keyframe_ids
        );
        assert_eq!(map.keyframe_ids.len(), 5);
        assert_eq!(map.cloud.len(), 5 * POINTS_PER_FRAME);

        if writer.is_finished() && observed_generations > 10 {
            break;
        }
    }

    writer.join().unwrap();
    assert!(
        observed_generations > 10,
        "thread barely republished ({} generations)",
        observed_generations
    );
    thread.stop();
}

#[test]
fn stale_snapshot_survives_later_publishes() {
    let graph = clustered_graph();
    let handle = LocalMapHandle::new();
    let (tx, rx) = pose_queue(4);

    let thread = LocalMapThread::spawn(
        LocalMapConfig {
            radius: 20.0,
            voxel_resolution: 0.0,
        },
        graph,
        handle.clone(),
        rx,
        Arc::new(AtomicBool::new(false)),
    );

    tx.send_latest(Timestamped::new(pose::from_xyz_yaw(0.0, 0.0, 0.0, 0.0), 1));
    let mut first = handle.snapshot();
    for _ in 0..200 {
        first = handle.snapshot();
        if first.generation > 0 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(first.generation > 0, "first window never built");
    let first_ids = first.keyframe_ids.clone();

    // Move to the other cluster; the held snapshot must stay intact.
    tx.send_latest(Timestamped::new(pose::from_xyz_yaw(1000.0, 0.0, 0.0, 0.0), 2));
    for _ in 0..200 {
        if handle.snapshot().generation > first.generation {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(first.keyframe_ids, first_ids);
    assert!(handle.snapshot().keyframe_ids.iter().all(|&id| id >= 100));

    thread.stop();
}

//! Contract tests for the fitness / information estimator.
//!
//! These pin the externally observable properties the graph backend relies
//! on: the zero-score identity case, the no-correspondence sentinel, the
//! bounded monotone variance curve, and positive-definite diagonal
//! information matrices.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dhruva_locate::core::types::pose;
use dhruva_locate::{InformationEstimator, InformationEstimatorConfig, PointCloud3D};

fn random_cloud(rng: &mut StdRng, n: usize, extent: f32) -> PointCloud3D {
    let mut cloud = PointCloud3D::with_capacity(n);
    for _ in 0..n {
        cloud.push([
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        ]);
    }
    cloud
}

#[test]
fn identical_clouds_identity_pose_score_is_exactly_zero() {
    let mut rng = StdRng::seed_from_u64(7);
    let cloud = random_cloud(&mut rng, 500, 20.0);

    let score = InformationEstimator::fitness_score(&cloud, &cloud, &pose::identity(), f64::MAX);
    assert_eq!(score, 0.0);
}

#[test]
fn zero_max_range_on_non_coincident_clouds_returns_sentinel() {
    let mut rng = StdRng::seed_from_u64(11);
    let map = random_cloud(&mut rng, 200, 20.0);
    let scan = map.transform(&pose::from_xyz_yaw(0.5, 0.5, 0.5, 0.0));

    let score = InformationEstimator::fitness_score(&map, &scan, &pose::identity(), 0.0);
    assert_eq!(score, f64::MAX);
}

#[test]
fn occlusion_cutoff_excludes_far_points() {
    // Map is a line; scan adds one far outlier. With a tight cutoff the
    // outlier must not drag the mean.
    let map = PointCloud3D::from_points((0..100).map(|i| [i as f32 * 0.1, 0.0, 0.0]).collect());
    let mut scan = map.clone();
    scan.push([500.0, 500.0, 500.0]);

    let tight = InformationEstimator::fitness_score(&map, &scan, &pose::identity(), 1.0);
    assert_relative_eq!(tight, 0.0, epsilon = 1e-12);

    let loose = InformationEstimator::fitness_score(&map, &scan, &pose::identity(), f64::MAX);
    assert!(loose > 1.0);
}

#[test]
fn weight_is_bounded_and_monotone_for_any_score() {
    let mut rng = StdRng::seed_from_u64(13);
    let (gain, thresh, min_var, max_var) = (20.0, 0.5, 0.01, 25.0);

    let mut scores: Vec<f64> = (0..500).map(|_| rng.gen_range(0.0..10.0)).collect();
    scores.push(0.0);
    scores.push(f64::MAX);
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut prev = f64::NEG_INFINITY;
    for score in scores {
        let w = InformationEstimator::weight(gain, thresh, min_var, max_var, score);
        assert!((min_var..=max_var).contains(&w), "weight {} out of bounds", w);
        assert!(w >= prev, "weight decreased at score {}", score);
        prev = w;
    }
}

#[test]
fn constant_mode_matrix_is_input_independent() {
    let estimator = InformationEstimator::new(InformationEstimatorConfig {
        use_const_information: true,
        ..Default::default()
    });

    let mut rng = StdRng::seed_from_u64(17);
    let a = estimator.information_matrix(
        &random_cloud(&mut rng, 100, 10.0),
        &random_cloud(&mut rng, 100, 10.0),
        &pose::from_xyz_yaw(1.0, 2.0, 3.0, 0.7),
    );
    let b = estimator.information_matrix(
        &random_cloud(&mut rng, 50, 50.0),
        &PointCloud3D::new(),
        &pose::identity(),
    );
    assert_eq!(a, b);
}

#[test]
fn information_matrix_is_diagonal_positive_definite() {
    let estimator = InformationEstimator::new(InformationEstimatorConfig::default());
    let mut rng = StdRng::seed_from_u64(19);
    let map = random_cloud(&mut rng, 300, 20.0);
    let scan = map.transform(&pose::from_xyz_yaw(0.05, -0.02, 0.0, 0.01));

    let inf = estimator.information_matrix(&map, &scan, &pose::identity());
    for i in 0..6 {
        assert!(inf[(i, i)] > 0.0, "diagonal entry {} not positive", i);
        for j in 0..6 {
            if i != j {
                assert_eq!(inf[(i, j)], 0.0, "off-diagonal ({}, {}) not zero", i, j);
            }
        }
    }
    // Translation and rotation blocks weighted independently.
    assert_ne!(inf[(0, 0)], inf[(3, 3)]);
}

#[test]
fn anomaly_inliers_flag_curb_like_steps_only() {
    // Ground plane with a map point at z=0; scan sees a 0.5 m step above it
    // (flagged) and a 0.1 m lip elsewhere (not flagged).
    let map = PointCloud3D::from_points(vec![[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]]);
    let scan = PointCloud3D::from_points(vec![[0.0, 0.0, 0.5], [5.0, 0.0, 0.1]]);

    let mut estimator = InformationEstimator::new(InformationEstimatorConfig::default());
    estimator.rebuild_index(&map);

    let (_, inliers) =
        estimator.fitness_with_inliers(&map, &scan, &pose::identity(), 0.0, f64::MAX);
    assert_eq!(inliers, vec![0]);
}

#[test]
fn anomaly_detection_is_independent_of_fitness_cutoff() {
    // Even when every correspondence is outside the occlusion range (score
    // becomes the sentinel), the inlier flagging still runs.
    let map = PointCloud3D::from_points(vec![[0.0, 0.0, 0.0]]);
    let scan = PointCloud3D::from_points(vec![[0.0, 0.0, 0.5]]);

    let mut estimator = InformationEstimator::new(InformationEstimatorConfig::default());
    estimator.rebuild_index(&map);

    let (score, inliers) =
        estimator.fitness_with_inliers(&map, &scan, &pose::identity(), 0.0, 0.0);
    assert_eq!(score, f64::MAX);
    assert_eq!(inliers, vec![0]);
}

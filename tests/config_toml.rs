//! Configuration loading from TOML.

use dhruva_locate::LocalizationConfig;

#[test]
fn full_config_parses() {
    let text = r#"
        lidar_name = "velodyne"
        image_name = "front-camera"
        sensors = ["velodyne", "front-camera", "ins"]
        map_directory = "/data/maps/site-a"
        floor_height = -1.2
        max_range_sq = 16.0
        queue_capacity = 4
        pose_history_capacity = 1024

        [search_bounds]
        x_min = -200.0
        x_max = 200.0
        y_min = -200.0
        y_max = 200.0
        z_min = -10.0
        z_max = 10.0

        [local_map]
        radius = 80.0
        voxel_resolution = 0.5

        [estimator]
        var_gain = 10.0
        fitness_score_thresh = 0.4
        min_stddev_x = 0.2
        max_stddev_x = 4.0

        [failure]
        fitness_threshold = 0.4
        max_consecutive_failures = 8
    "#;

    let config: LocalizationConfig = toml::from_str(text).unwrap();
    assert_eq!(config.lidar_name, "velodyne");
    assert_eq!(config.image_name.as_deref(), Some("front-camera"));
    assert_eq!(config.sensors.len(), 3);
    assert_eq!(config.search_bounds.x_max, 200.0);
    assert_eq!(config.local_map.radius, 80.0);
    assert_eq!(config.estimator.var_gain, 10.0);
    assert_eq!(config.failure.max_consecutive_failures, 8);
    // Unspecified estimator fields keep their defaults.
    assert_eq!(config.estimator.min_stddev_q, 0.05);
}

#[test]
fn minimal_config_uses_defaults() {
    let config: LocalizationConfig = toml::from_str("").unwrap();
    assert_eq!(config.lidar_name, "lidar");
    assert!(config.image_name.is_none());
    assert_eq!(config.failure.max_consecutive_failures, 5);
    assert!(config.search_bounds.validate());
}

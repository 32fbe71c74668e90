use std::io::Write;

use tempfile::NamedTempFile;

use stereocast::{ConfigOverrides, StereocastConfig};

#[test]
fn loads_config_from_file_with_override_precedence() {
    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "left_video": "/srv/pairs/pair1_left.mp4",
        "right_video": "/srv/pairs/pair1_right.mp4",
        "rate_hz": 15.0,
        "start_frame": 120,
        "mqtt": {
            "broker_addr": "127.0.0.1:1884",
            "topic_prefix": "rig3",
            "queue_capacity": 4
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    let overrides = ConfigOverrides {
        start_frame: Some(200),
        ..ConfigOverrides::default()
    };
    let cfg = StereocastConfig::load(Some(file.path()), overrides).expect("load config");

    assert_eq!(cfg.left_video, "/srv/pairs/pair1_left.mp4");
    assert_eq!(cfg.right_video, "/srv/pairs/pair1_right.mp4");
    assert_eq!(cfg.rate_hz, 15.0);
    assert_eq!(cfg.start_frame, 200);
    assert_eq!(cfg.mqtt.broker_addr, "127.0.0.1:1884");
    assert_eq!(cfg.mqtt.topic_prefix, "rig3");
    assert_eq!(cfg.mqtt.queue_capacity, 4);
    assert_eq!(cfg.mqtt.client_id, "stereocastd");
}

#[test]
fn file_without_paths_still_fails_validation() {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "rate_hz": 5.0 }"#).expect("write config");

    let err = StereocastConfig::load(Some(file.path()), ConfigOverrides::default()).unwrap_err();
    assert!(format!("{err}").contains("left_video"));
}

#[test]
fn malformed_config_file_is_rejected() {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"rate_hz = 5.0").expect("write config");

    let err = StereocastConfig::load(Some(file.path()), ConfigOverrides::default()).unwrap_err();
    assert!(format!("{err:#}").contains("invalid config file"));
}

#[test]
fn unreadable_config_path_is_an_error() {
    let path = std::path::Path::new("/nonexistent/stereocast.json");
    let err = StereocastConfig::load(Some(path), ConfigOverrides::default()).unwrap_err();
    assert!(format!("{err}").contains("failed to read config file"));
}

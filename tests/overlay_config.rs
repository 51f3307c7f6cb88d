use std::sync::Mutex;

use tempfile::NamedTempFile;

use overlay_engine::config::OverlayConfig;
use overlay_engine::{Rgb, TargetRegion};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "OVERLAY_CONFIG",
        "OVERLAY_CAPACITY",
        "OVERLAY_TIMEOUT_MS",
        "OVERLAY_FRAME_INTERVAL_MS",
        "OVERLAY_IOU_THRESHOLD",
        "OVERLAY_SHOW_LABELS",
        "OVERLAY_REGION",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "capacity": 64,
        "timeout_ms": 1500,
        "frame_interval_ms": 16,
        "iou_threshold": 0.4,
        "show_labels": false,
        "transparency_key": { "r": 255, "g": 0, "b": 254 },
        "region": { "left": 0, "top": 0, "right": 1920, "bottom": 1080 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("OVERLAY_CONFIG", file.path());
    std::env::set_var("OVERLAY_CAPACITY", "32");
    std::env::set_var("OVERLAY_REGION", "100,50,1380,770");

    let cfg = OverlayConfig::load().expect("load config");

    // Env wins over file, file wins over defaults.
    assert_eq!(cfg.capacity, 32);
    assert_eq!(cfg.timeout_ms, 1500);
    assert_eq!(cfg.frame_interval.as_millis(), 16);
    assert!((cfg.iou_threshold - 0.4).abs() < f32::EPSILON);
    assert!(!cfg.show_labels);
    assert_eq!(cfg.transparency_key, Rgb::new(255, 0, 254));
    assert_eq!(cfg.region, TargetRegion::new(100, 50, 1380, 770));

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = OverlayConfig::load().expect("load config");
    assert_eq!(cfg.capacity, 100);
    assert_eq!(cfg.timeout_ms, 2000);
    assert!(cfg.show_labels);

    clear_env();
}

#[test]
fn invalid_values_fail_loading() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("OVERLAY_CAPACITY", "0");
    assert!(OverlayConfig::load().is_err());

    clear_env();
    std::env::set_var("OVERLAY_IOU_THRESHOLD", "2.0");
    assert!(OverlayConfig::load().is_err());

    clear_env();
    std::env::set_var("OVERLAY_REGION", "10,10,10,500");
    assert!(OverlayConfig::load().is_err());

    clear_env();
    std::env::set_var("OVERLAY_TIMEOUT_MS", "soon");
    assert!(OverlayConfig::load().is_err());

    clear_env();
}

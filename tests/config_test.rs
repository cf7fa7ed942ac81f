//! Configuration round-trip and clamping behavior through the public API

use face_retouch::config::{BackgroundMode, EffectParameters, EXAMPLE_CONFIG};

#[test]
fn test_example_config_is_valid_yaml() {
    let params: EffectParameters = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
    assert_eq!(params.background.mode, BackgroundMode::Blur);

    // Clamping an already-valid config is the identity
    let clamped = params.clamped();
    assert_eq!(clamped.background.blur_strength, params.background.blur_strength);
    assert_eq!(clamped.wrinkle.keep_ratio, params.wrinkle.keep_ratio);
}

#[test]
fn test_file_roundtrip() {
    let path = std::env::temp_dir().join("face_retouch_config_roundtrip.yaml");

    let mut params = EffectParameters::default();
    params.background.mode = BackgroundMode::Solid;
    params.skin.enabled = true;
    params.skin.amount = 0.75;
    params.to_file(&path).unwrap();

    let loaded = EffectParameters::from_file(&path).unwrap();
    assert_eq!(loaded.background.mode, BackgroundMode::Solid);
    assert!(loaded.skin.enabled);
    assert!((loaded.skin.amount - 0.75).abs() < 1e-6);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_missing_file_errors() {
    assert!(EffectParameters::from_file("/nonexistent/path/config.yaml").is_err());
}

#[test]
fn test_partial_yaml_fills_defaults() {
    let yaml = "skin:\n  enabled: true\n";
    let params: EffectParameters = serde_yaml::from_str(yaml).unwrap();
    assert!(params.skin.enabled);
    assert_eq!(params.background.mode, BackgroundMode::None);
    assert_eq!(params.teeth.margin_px, 2);
}

#[test]
fn test_wire_level_blur_strength_clamping() {
    // The documented example: an even 24 becomes 25
    let mut params = EffectParameters::default();
    params.background.blur_strength = 24;
    assert_eq!(params.clamped().background.blur_strength, 25);

    params.background.blur_strength = 1;
    assert_eq!(params.clamped().background.blur_strength, 1);
}

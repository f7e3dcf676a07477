use std::fs;

use fieldconfig::{ConfigError, FieldConfig};

#[test]
fn loads_config_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hyperfield.toml");
    fs::write(
        &path,
        "version = 1\n[render]\ngeometry = \"duocylinder\"\n[governor]\ntier = \"medium\"\n",
    )
    .expect("write config");

    let config = FieldConfig::load(&path).expect("load config");
    assert_eq!(config.render.geometry.as_deref(), Some("duocylinder"));
    assert_eq!(config.governor.fixed_tier(), Some("medium"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        FieldConfig::load(&path),
        Err(ConfigError::Read { .. })
    ));
    let config = FieldConfig::load_or_default(&path).expect("defaults");
    assert_eq!(config, FieldConfig::default());
}

#[test]
fn syntax_errors_surface_as_parse_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "version = \n").expect("write config");

    assert!(matches!(FieldConfig::load(&path), Err(ConfigError::Parse(_))));
}

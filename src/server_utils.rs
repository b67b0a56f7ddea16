use std::path::{Path, PathBuf};

use crate::config::{ConfigError, GameConfig};

pub const DEFAULT_PORT: u16 = 8080;

pub fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(DEFAULT_PORT)
}

pub fn normalize_pointer_x(x: f32, width: f32) -> Option<f32> {
    if !x.is_finite() {
        return None;
    }
    Some(x.clamp(0.0, width.max(0.0)))
}

pub fn resolve_static_dir(raw: Option<&str>, fallback: &Path) -> Option<PathBuf> {
    if let Some(value) = raw {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let path = PathBuf::from(trimmed);
        return path.is_dir().then_some(path);
    }
    fallback.is_dir().then(|| fallback.to_path_buf())
}

pub fn load_config(raw_path: Option<&str>) -> Result<GameConfig, ConfigError> {
    match raw_path.map(str::trim).filter(|value| !value.is_empty()) {
        Some(path) => GameConfig::load(Path::new(path)),
        None => Ok(GameConfig::default()),
    }
}

pub fn make_session_id(counter: u64, seed: u32) -> String {
    format!("s{counter}-{seed:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_port_falls_back_for_invalid_values() {
        assert_eq!(parse_port(Some("3000")), 3000);
        assert_eq!(parse_port(Some(" 9000 ")), 9000);
        assert_eq!(parse_port(Some("0")), DEFAULT_PORT);
        assert_eq!(parse_port(Some("70000")), DEFAULT_PORT);
        assert_eq!(parse_port(Some("abc")), DEFAULT_PORT);
        assert_eq!(parse_port(None), DEFAULT_PORT);
    }

    #[test]
    fn normalize_pointer_x_clamps_and_rejects_nan() {
        assert_eq!(normalize_pointer_x(-20.0, 540.0), Some(0.0));
        assert_eq!(normalize_pointer_x(800.0, 540.0), Some(540.0));
        assert_eq!(normalize_pointer_x(123.0, 540.0), Some(123.0));
        assert_eq!(normalize_pointer_x(f32::NAN, 540.0), None);
        assert_eq!(normalize_pointer_x(f32::INFINITY, 540.0), None);
    }

    #[test]
    fn resolve_static_dir_requires_existing_directory() {
        let missing = std::env::temp_dir().join("rank-merge-missing-static-dir");
        assert_eq!(resolve_static_dir(Some(""), &missing), None);
        assert_eq!(
            resolve_static_dir(missing.to_str(), Path::new(".")),
            None
        );
        let temp = std::env::temp_dir();
        assert_eq!(
            resolve_static_dir(temp.to_str(), &missing),
            Some(temp.clone())
        );
        assert_eq!(resolve_static_dir(None, &temp), Some(temp));
        assert_eq!(resolve_static_dir(None, &missing), None);
    }

    #[test]
    fn load_config_defaults_without_path_and_reports_missing_file() {
        let config = load_config(None).expect("default config");
        assert_eq!(config.drop_cooldown_ms, 300);
        assert!(load_config(Some("  ")).is_ok());
        let missing = std::env::temp_dir().join("rank-merge-missing-config.json");
        assert!(matches!(
            load_config(missing.to_str()),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn session_id_embeds_counter_and_seed() {
        assert_eq!(make_session_id(3, 255), "s3-000000ff");
    }
}

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::constants::{
    DROP_COOLDOWN_MS, FOLLOW_LEFT_X, FOLLOW_MARGIN, FOLLOW_RIGHT_X, GAME_OVER_THRESHOLD_MS,
    LIMIT_LINE_Y, MERGE_POP_VELOCITY_Y, RESPAWN_DELAY_MS, SPAWN_RANK_POOL, SPAWN_X, SPAWN_Y,
    TICK_MS,
};
use crate::physics::Material;
use crate::ranks::{self, RankTableError, RANKS};
use crate::types::Vec2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid rank table: {0}")]
    RankTable(#[from] RankTableError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    #[serde(rename = "tickMs")]
    pub tick_ms: u64,
    #[serde(rename = "spawnX")]
    pub spawn_x: f32,
    #[serde(rename = "spawnY")]
    pub spawn_y: f32,
    #[serde(rename = "followLeftX")]
    pub follow_left_x: f32,
    #[serde(rename = "followRightX")]
    pub follow_right_x: f32,
    #[serde(rename = "followMargin")]
    pub follow_margin: f32,
    #[serde(rename = "limitLineY")]
    pub limit_line_y: f32,
    #[serde(rename = "dropCooldownMs")]
    pub drop_cooldown_ms: u64,
    #[serde(rename = "respawnDelayMs")]
    pub respawn_delay_ms: u64,
    #[serde(rename = "gameOverThresholdMs")]
    pub game_over_threshold_ms: u64,
    #[serde(rename = "spawnRankPool")]
    pub spawn_rank_pool: usize,
    #[serde(
        rename = "mergePopVelocity",
        deserialize_with = "deserialize_pop_velocity"
    )]
    pub merge_pop_velocity: Vec2,
    pub material: Material,
}

#[derive(Deserialize)]
struct PartialVec2 {
    x: Option<f32>,
    y: Option<f32>,
}

// A component left out of the file keeps its default rather than zero.
fn deserialize_pop_velocity<'de, D>(deserializer: D) -> Result<Vec2, D::Error>
where
    D: Deserializer<'de>,
{
    let partial = PartialVec2::deserialize(deserializer)?;
    Ok(Vec2::new(
        partial.x.unwrap_or(0.0),
        partial.y.unwrap_or(MERGE_POP_VELOCITY_Y),
    ))
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            spawn_x: SPAWN_X,
            spawn_y: SPAWN_Y,
            follow_left_x: FOLLOW_LEFT_X,
            follow_right_x: FOLLOW_RIGHT_X,
            follow_margin: FOLLOW_MARGIN,
            limit_line_y: LIMIT_LINE_Y,
            drop_cooldown_ms: DROP_COOLDOWN_MS,
            respawn_delay_ms: RESPAWN_DELAY_MS,
            game_over_threshold_ms: GAME_OVER_THRESHOLD_MS,
            spawn_rank_pool: SPAWN_RANK_POOL,
            merge_pop_velocity: Vec2::new(0.0, MERGE_POP_VELOCITY_Y),
            material: Material::default(),
        }
    }
}

impl GameConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ranks::validate_table(&RANKS)?;
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick length must be positive".into()));
        }
        if self.game_over_threshold_ms == 0 {
            return Err(ConfigError::Invalid(
                "gameOverThresholdMs must be positive".into(),
            ));
        }
        if self.spawn_rank_pool == 0 || self.spawn_rank_pool > RANKS.len() {
            return Err(ConfigError::Invalid(format!(
                "spawnRankPool must be within 1..={}",
                RANKS.len()
            )));
        }
        let widest = RANKS[self.spawn_rank_pool - 1].radius;
        let (min_x, max_x) = self.follow_bounds(widest);
        if min_x > max_x {
            return Err(ConfigError::Invalid(
                "follow edges leave no room for the widest spawn rank".into(),
            ));
        }
        if self.spawn_y >= self.limit_line_y {
            return Err(ConfigError::Invalid(
                "spawnY must be above limitLineY".into(),
            ));
        }
        Ok(())
    }

    pub fn follow_bounds(&self, radius: f32) -> (f32, f32) {
        (
            self.follow_left_x + radius + self.follow_margin,
            self.follow_right_x - radius - self.follow_margin,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GameConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.follow_bounds(18.0), (53.0, 487.0));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GameConfig::from_json(r#"{"dropCooldownMs":450,"limitLineY":180}"#)
            .expect("partial config should parse");
        assert_eq!(config.drop_cooldown_ms, 450);
        assert_eq!(config.limit_line_y, 180.0);
        assert_eq!(config.respawn_delay_ms, RESPAWN_DELAY_MS);
        assert_eq!(config.material, Material::default());
    }

    #[test]
    fn nested_overrides_keep_sibling_defaults() {
        let config = GameConfig::from_json(r#"{"material":{"restitution":0.5}}"#)
            .expect("partial material should parse");
        assert_eq!(config.material.restitution, 0.5);
        assert_eq!(config.material.friction, Material::default().friction);
        assert_eq!(config.material.density, Material::default().density);

        let config = GameConfig::from_json(r#"{"mergePopVelocity":{"y":-200}}"#)
            .expect("partial pop velocity should parse");
        assert_eq!(config.merge_pop_velocity, Vec2::new(0.0, -200.0));

        let config = GameConfig::from_json(r#"{"mergePopVelocity":{"x":15}}"#)
            .expect("partial pop velocity should parse");
        assert_eq!(config.merge_pop_velocity, Vec2::new(15.0, MERGE_POP_VELOCITY_Y));
    }

    #[test]
    fn tick_length_is_the_only_timing_knob() {
        let config = GameConfig::from_json(r#"{"tickMs":100}"#).expect("tick override");
        assert_eq!(config.tick_ms, 100);
        let value = serde_json::to_value(&config).expect("config should serialize");
        assert_eq!(value["tickMs"], 100);
        assert!(value.get("tickRate").is_none());
        assert!(matches!(
            GameConfig::from_json(r#"{"tickMs":0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            GameConfig::from_json(r#"{"spawnRankPool":0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"gameOverThresholdMs":0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"followLeftX":400,"followRightX":100}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let error = GameConfig::load(Path::new("/nonexistent/rank-merge.json"))
            .expect_err("missing file should fail");
        assert!(error.to_string().contains("/nonexistent/rank-merge.json"));
    }
}

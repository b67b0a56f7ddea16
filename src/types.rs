use serde::{Deserialize, Serialize};

use crate::physics::BodyId;
use crate::ranks::RankId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Overflow,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PieceView {
    #[serde(rename = "bodyId")]
    pub body_id: BodyId,
    #[serde(rename = "rankId")]
    pub rank_id: RankId,
    pub label: &'static str,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: u32,
    #[serde(rename = "isStatic")]
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    PieceSpawned {
        piece: PieceView,
    },
    PieceDropped {
        #[serde(rename = "oldBodyId")]
        old_body_id: BodyId,
        piece: PieceView,
    },
    PiecesMerged {
        consumed: [BodyId; 2],
        piece: PieceView,
        points: u32,
    },
    PieceRemoved {
        #[serde(rename = "bodyId")]
        body_id: BodyId,
    },
    ScoreAdded {
        points: u32,
        total: u64,
    },
    NextRankChanged {
        #[serde(rename = "rankId")]
        rank_id: RankId,
    },
    GameOver {
        score: u64,
    },
    Reset,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    pub score: u64,
    #[serde(rename = "nextRankId")]
    pub next_rank_id: RankId,
    #[serde(rename = "overLimitRatio")]
    pub over_limit_ratio: f32,
    #[serde(rename = "canDrop")]
    pub can_drop: bool,
    pub running: bool,
    pub pieces: Vec<PieceView>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: Option<GameOverReason>,
    pub score: u64,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub ticks: u64,
    pub drops: u32,
    pub merges: u32,
    #[serde(rename = "highestRankId")]
    pub highest_rank_id: Option<RankId>,
}

pub const TICK_RATE: u32 = 60;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const PLAYFIELD_WIDTH: f32 = 540.0;
pub const PLAYFIELD_HEIGHT: f32 = 960.0;
pub const WALL_THICKNESS: f32 = 32.0;

// Inner edges used for the controlled piece follow clamp.
pub const FOLLOW_LEFT_X: f32 = 30.0;
pub const FOLLOW_RIGHT_X: f32 = 510.0;
pub const FOLLOW_MARGIN: f32 = 5.0;

pub const SPAWN_X: f32 = 270.0;
pub const SPAWN_Y: f32 = 100.0;
pub const LIMIT_LINE_Y: f32 = 150.0;

pub const DROP_COOLDOWN_MS: u64 = 300;
pub const RESPAWN_DELAY_MS: u64 = 500;
pub const GAME_OVER_THRESHOLD_MS: u64 = 3_000;

pub const SPAWN_RANK_POOL: usize = 5;

/// Upward velocity given to every merge result, in px/s.
pub const MERGE_POP_VELOCITY_Y: f32 = -120.0;

pub const PIECE_RESTITUTION: f32 = 0.2;
pub const PIECE_FRICTION: f32 = 0.8;
pub const PIECE_AIR_FRICTION: f32 = 0.02;
pub const PIECE_DENSITY: f32 = 0.002;

pub const GRAVITY_Y: f32 = 1_200.0;

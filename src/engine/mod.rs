use log::info;

use crate::config::GameConfig;
use crate::physics::{BodyId, PhysicsWorld};
use crate::ranks::RankId;
use crate::registry::PieceRegistry;
use crate::types::{GameOverReason, GameSummary, RuntimeEvent, Snapshot};

mod merge_system;
mod overflow_system;
mod spawn_system;
mod utils;

pub use self::merge_system::{MergeOutcome, MergeResolver};
pub use self::overflow_system::OverflowMonitor;
pub use self::spawn_system::Spawner;

use self::utils::now_ms;

#[derive(Clone, Debug)]
pub struct GameEngine<P: PhysicsWorld> {
    pub started_at_ms: u64,
    pub config: GameConfig,

    physics: P,
    registry: PieceRegistry,
    spawner: Spawner,
    merger: MergeResolver,
    overflow: OverflowMonitor,
    events: Vec<RuntimeEvent>,

    pointer_x: f32,
    score: u64,
    running: bool,
    end_reason: Option<GameOverReason>,
    tick_counter: u64,
    elapsed_ms: u64,
    drops: u32,
    merges: u32,
    highest_rank_id: Option<RankId>,
}

impl<P: PhysicsWorld> GameEngine<P> {
    pub fn new(physics: P, config: GameConfig, seed: u32) -> Self {
        let spawner = Spawner::new(config.clone(), seed);
        let merger = MergeResolver::new(config.merge_pop_velocity, config.material);
        let overflow = OverflowMonitor::new(config.limit_line_y, config.game_over_threshold_ms);
        let mut engine = Self {
            started_at_ms: now_ms(),
            pointer_x: config.spawn_x,
            config,
            physics,
            registry: PieceRegistry::new(),
            spawner,
            merger,
            overflow,
            events: Vec::new(),
            score: 0,
            running: false,
            end_reason: None,
            tick_counter: 0,
            elapsed_ms: 0,
            drops: 0,
            merges: 0,
            highest_rank_id: None,
        };
        engine.start_game();
        engine
    }

    fn start_game(&mut self) {
        self.running = true;
        if let Some(body_id) =
            self.spawner
                .spawn_new_piece(&mut self.registry, &mut self.physics, &mut self.events)
        {
            self.note_rank(body_id);
        }
    }

    pub fn is_ended(&self) -> bool {
        !self.running
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn registry(&self) -> &PieceRegistry {
        &self.registry
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    pub fn overflow(&self) -> &OverflowMonitor {
        &self.overflow
    }

    pub fn next_rank_id(&self) -> RankId {
        self.spawner.next_rank_id()
    }

    pub fn over_limit_ratio(&self) -> f32 {
        self.overflow.over_limit_ratio()
    }

    pub fn receive_pointer(&mut self, x: f32) {
        if x.is_finite() {
            self.pointer_x = x;
        }
    }

    pub fn request_drop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let dropped =
            self.spawner
                .try_drop(&mut self.registry, &mut self.physics, &mut self.events);
        if dropped {
            self.drops += 1;
        }
        dropped
    }

    pub fn step(&mut self, dt_ms: u64) {
        if !self.running {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);

        let spawned_before = self.spawner.controlled();
        self.spawner.update(
            dt_ms,
            self.pointer_x,
            &mut self.registry,
            &mut self.physics,
            &mut self.events,
        );
        if let Some(body_id) = self.spawner.controlled() {
            if spawned_before != Some(body_id) {
                self.note_rank(body_id);
            }
        }

        let contacts = self.physics.advance(dt_ms);
        self.registry.sync_positions(&self.physics);

        let outcomes = self.merger.resolve(
            &contacts,
            &mut self.registry,
            &mut self.physics,
            &mut self.events,
        );
        for outcome in &outcomes {
            self.add_score(outcome.points);
            self.merges += 1;
            self.note_rank(outcome.created);
        }
        self.merger.update();
        self.spawner.release_if_consumed(&self.registry);

        if self.overflow.update(dt_ms, &self.registry) {
            self.handle_game_over();
        }
    }

    fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points as u64);
        self.events.push(RuntimeEvent::ScoreAdded {
            points,
            total: self.score,
        });
    }

    fn note_rank(&mut self, body_id: BodyId) {
        if let Some(piece) = self.registry.get(body_id) {
            self.highest_rank_id = Some(
                self.highest_rank_id
                    .map_or(piece.rank_id, |best| best.max(piece.rank_id)),
            );
        }
    }

    fn handle_game_over(&mut self) {
        self.running = false;
        self.end_reason = Some(GameOverReason::Overflow);
        self.spawner
            .stop(&mut self.registry, &mut self.physics, &mut self.events);
        self.events.push(RuntimeEvent::GameOver { score: self.score });
        info!(
            "game over after {} ms: score {}, {} merges",
            self.elapsed_ms, self.score, self.merges
        );
    }

    pub fn retry(&mut self) {
        self.spawner
            .stop(&mut self.registry, &mut self.physics, &mut self.events);
        for body_id in self.registry.clear(&mut self.physics) {
            self.events.push(RuntimeEvent::PieceRemoved { body_id });
        }
        self.overflow.reset();
        self.merger.update();

        self.score = 0;
        self.end_reason = None;
        self.tick_counter = 0;
        self.elapsed_ms = 0;
        self.drops = 0;
        self.merges = 0;
        self.highest_rank_id = None;
        self.started_at_ms = now_ms();
        self.events.push(RuntimeEvent::Reset);
        info!("retry requested; field cleared");

        self.start_game();
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            elapsed_ms: self.elapsed_ms,
            score: self.score,
            next_rank_id: self.spawner.next_rank_id(),
            over_limit_ratio: self.overflow.over_limit_ratio(),
            can_drop: self.running && self.spawner.can_drop(),
            running: self.running,
            pieces: self.registry.views(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            reason: self.end_reason,
            score: self.score,
            duration_ms: self.elapsed_ms,
            ticks: self.tick_counter,
            drops: self.drops,
            merges: self.merges,
            highest_rank_id: self.highest_rank_id,
        }
    }
}

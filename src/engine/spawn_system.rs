use log::debug;

use super::utils::clamp_follow_x;
use crate::config::GameConfig;
use crate::physics::{BodyId, PhysicsWorld};
use crate::ranks::{self, RankId};
use crate::registry::{Piece, PieceRegistry};
use crate::rng::Rng;
use crate::types::{RuntimeEvent, Vec2};

#[derive(Clone, Debug)]
pub struct Spawner {
    config: GameConfig,
    rng: Rng,
    controlled: Option<BodyId>,
    next_rank_id: RankId,
    can_drop: bool,
    drop_cooldown_ms: u64,
    respawn_in_ms: Option<u64>,
}

impl Spawner {
    pub fn new(config: GameConfig, seed: u32) -> Self {
        let mut rng = Rng::new(seed);
        let next_rank_id = ranks::random_spawn_rank(&mut rng, config.spawn_rank_pool);
        Self {
            config,
            rng,
            controlled: None,
            next_rank_id,
            can_drop: false,
            drop_cooldown_ms: 0,
            respawn_in_ms: None,
        }
    }

    pub fn controlled(&self) -> Option<BodyId> {
        self.controlled
    }

    pub fn next_rank_id(&self) -> RankId {
        self.next_rank_id
    }

    pub fn can_drop(&self) -> bool {
        self.can_drop
    }

    pub fn respawn_pending(&self) -> bool {
        self.respawn_in_ms.is_some()
    }

    pub fn spawn_new_piece<P: PhysicsWorld>(
        &mut self,
        registry: &mut PieceRegistry,
        physics: &mut P,
        events: &mut Vec<RuntimeEvent>,
    ) -> Option<BodyId> {
        if self.controlled.is_some() {
            return None;
        }
        let rank = ranks::lookup(self.next_rank_id)?;

        self.next_rank_id = ranks::random_spawn_rank(&mut self.rng, self.config.spawn_rank_pool);
        events.push(RuntimeEvent::NextRankChanged {
            rank_id: self.next_rank_id,
        });

        let position = Vec2::new(self.config.spawn_x, self.config.spawn_y);
        let body_id = physics.create_body(position, rank.radius, true, self.config.material);
        let piece = Piece::new(rank.id, body_id, position, true);
        events.push(RuntimeEvent::PieceSpawned {
            piece: piece.view(),
        });
        registry.insert(piece);

        self.controlled = Some(body_id);
        self.respawn_in_ms = None;
        self.drop_cooldown_ms = self.config.drop_cooldown_ms;
        self.can_drop = self.drop_cooldown_ms == 0;
        debug!(
            "spawned rank {} on body {} (next {})",
            rank.id, body_id, self.next_rank_id
        );
        Some(body_id)
    }

    pub fn update<P: PhysicsWorld>(
        &mut self,
        dt_ms: u64,
        pointer_x: f32,
        registry: &mut PieceRegistry,
        physics: &mut P,
        events: &mut Vec<RuntimeEvent>,
    ) {
        if let Some(remaining) = self.respawn_in_ms {
            if remaining <= dt_ms {
                self.respawn_in_ms = None;
                self.spawn_new_piece(registry, physics, events);
            } else {
                self.respawn_in_ms = Some(remaining - dt_ms);
            }
        }

        if self.drop_cooldown_ms > 0 {
            self.drop_cooldown_ms = self.drop_cooldown_ms.saturating_sub(dt_ms);
            if self.drop_cooldown_ms == 0 {
                self.can_drop = true;
            }
        }

        if self.release_if_consumed(registry) {
            return;
        }
        let Some(body_id) = self.controlled else {
            return;
        };
        let Some(piece) = registry.get_mut(body_id) else {
            return;
        };
        let Some(rank) = ranks::lookup(piece.rank_id) else {
            return;
        };

        let (min_x, max_x) = self.config.follow_bounds(rank.radius);
        let target = Vec2::new(
            clamp_follow_x(pointer_x, min_x, max_x),
            self.config.spawn_y,
        );
        physics.set_body_position(body_id, target);
        piece.position = target;
    }

    /// Forgets a held piece that left the registry (merged at the spawn
    /// point) and schedules the respawn. Returns whether that happened.
    pub fn release_if_consumed(&mut self, registry: &PieceRegistry) -> bool {
        let Some(body_id) = self.controlled else {
            return false;
        };
        if registry.contains(body_id) {
            return false;
        }
        debug!("controlled body {body_id} left the registry");
        self.controlled = None;
        self.can_drop = false;
        self.respawn_in_ms = Some(self.config.respawn_delay_ms);
        true
    }

    pub fn try_drop<P: PhysicsWorld>(
        &mut self,
        registry: &mut PieceRegistry,
        physics: &mut P,
        events: &mut Vec<RuntimeEvent>,
    ) -> bool {
        if !self.can_drop {
            return false;
        }
        let Some(old_body_id) = self.controlled else {
            return false;
        };
        let Some(piece) = registry.get(old_body_id) else {
            return false;
        };
        let Some(rank) = ranks::lookup(piece.rank_id) else {
            return false;
        };
        let position = physics
            .body_position(old_body_id)
            .unwrap_or(piece.position);

        physics.destroy_body(old_body_id);
        let new_body_id = physics.create_body(position, rank.radius, false, self.config.material);
        if registry.rekey(old_body_id, new_body_id).is_none() {
            return false;
        }
        let Some(piece) = registry.get_mut(new_body_id) else {
            return false;
        };
        piece.is_static = false;
        piece.position = position;
        let view = piece.view();

        self.can_drop = false;
        self.controlled = None;
        self.respawn_in_ms = Some(self.config.respawn_delay_ms);
        events.push(RuntimeEvent::PieceDropped {
            old_body_id,
            piece: view,
        });
        debug!(
            "dropped rank {} at x={:.1}: body {} -> {}",
            rank.id, position.x, old_body_id, new_body_id
        );
        true
    }

    pub fn stop<P: PhysicsWorld>(
        &mut self,
        registry: &mut PieceRegistry,
        physics: &mut P,
        events: &mut Vec<RuntimeEvent>,
    ) {
        self.can_drop = false;
        self.drop_cooldown_ms = 0;
        self.respawn_in_ms = None;
        if let Some(body_id) = self.controlled.take() {
            physics.destroy_body(body_id);
            registry.remove(body_id);
            events.push(RuntimeEvent::PieceRemoved { body_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::scripted::ScriptedWorld;

    struct Harness {
        spawner: Spawner,
        registry: PieceRegistry,
        world: ScriptedWorld,
        events: Vec<RuntimeEvent>,
    }

    impl Harness {
        fn new(seed: u32) -> Self {
            Self {
                spawner: Spawner::new(GameConfig::default(), seed),
                registry: PieceRegistry::new(),
                world: ScriptedWorld::new(),
                events: Vec::new(),
            }
        }

        fn spawn(&mut self) -> Option<BodyId> {
            self.spawner
                .spawn_new_piece(&mut self.registry, &mut self.world, &mut self.events)
        }

        fn update(&mut self, dt_ms: u64, pointer_x: f32) {
            self.spawner.update(
                dt_ms,
                pointer_x,
                &mut self.registry,
                &mut self.world,
                &mut self.events,
            );
        }

        fn drop_piece(&mut self) -> bool {
            self.spawner
                .try_drop(&mut self.registry, &mut self.world, &mut self.events)
        }
    }

    #[test]
    fn spawn_creates_static_piece_and_rolls_lookahead() {
        let mut h = Harness::new(11);
        let expected_rank = h.spawner.next_rank_id();
        let body_id = h.spawn().expect("first spawn");

        let piece = h.registry.get(body_id).expect("registered");
        assert_eq!(piece.rank_id, expected_rank);
        assert!(piece.is_static);
        assert_eq!(piece.position, Vec2::new(270.0, 100.0));
        assert!(h.world.body(body_id).expect("body").is_static);
        assert!(h.spawner.next_rank_id() <= 4);
        assert!(h
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::NextRankChanged { .. })));
    }

    #[test]
    fn second_spawn_is_a_no_op_while_controlled() {
        let mut h = Harness::new(3);
        h.spawn().expect("first spawn");
        let next = h.spawner.next_rank_id();
        assert!(h.spawn().is_none());
        assert_eq!(h.registry.len(), 1);
        assert_eq!(h.spawner.next_rank_id(), next);
    }

    #[test]
    fn drop_is_ignored_until_cooldown_elapses() {
        let mut h = Harness::new(5);
        let body_id = h.spawn().expect("spawn");

        h.update(100, 270.0);
        h.update(100, 270.0);
        assert!(!h.drop_piece());
        assert_eq!(h.spawner.controlled(), Some(body_id));
        assert!(h.registry.get(body_id).expect("still held").is_static);

        h.update(100, 270.0);
        assert!(h.spawner.can_drop());
        assert!(h.drop_piece());
    }

    #[test]
    fn controlled_piece_follows_pointer_inside_walls() {
        let mut h = Harness::new(8);
        let body_id = h.spawn().expect("spawn");
        let radius = ranks::lookup(h.registry.get(body_id).expect("piece").rank_id)
            .expect("rank")
            .radius;

        h.update(16, -500.0);
        let left = h.world.body_position(body_id).expect("body");
        assert_eq!(left, Vec2::new(30.0 + radius + 5.0, 100.0));

        h.update(16, 5_000.0);
        let right = h.world.body_position(body_id).expect("body");
        assert_eq!(right, Vec2::new(510.0 - radius - 5.0, 100.0));

        h.update(16, 250.0);
        assert_eq!(h.registry.get(body_id).expect("piece").position.x, 250.0);
    }

    #[test]
    fn drop_replaces_body_and_schedules_respawn() {
        let mut h = Harness::new(21);
        let old_id = h.spawn().expect("spawn");
        h.update(300, 200.0);
        assert!(h.drop_piece());

        assert!(!h.world.contains(old_id));
        assert!(!h.registry.contains(old_id));
        assert_eq!(h.registry.len(), 1);
        let piece = h.registry.iter().next().expect("dropped piece").clone();
        assert_ne!(piece.body_id, old_id);
        assert!(!piece.is_static);
        assert_eq!(piece.position, Vec2::new(200.0, 100.0));
        assert!(!h.world.body(piece.body_id).expect("new body").is_static);
        assert_eq!(h.spawner.controlled(), None);
        assert!(!h.spawner.can_drop());

        assert!(!h.drop_piece());

        h.update(400, 200.0);
        assert_eq!(h.spawner.controlled(), None);
        h.update(100, 200.0);
        assert!(h.spawner.controlled().is_some());
        assert_eq!(h.registry.len(), 2);
        assert_eq!(h.registry.static_count(), 1);
    }

    #[test]
    fn stop_removes_controlled_piece_and_cancels_respawn() {
        let mut h = Harness::new(2);
        let body_id = h.spawn().expect("spawn");
        h.spawner
            .stop(&mut h.registry, &mut h.world, &mut h.events);
        assert!(h.registry.is_empty());
        assert!(!h.world.contains(body_id));
        assert_eq!(h.spawner.controlled(), None);

        let mut h = Harness::new(2);
        h.spawn().expect("spawn");
        h.update(300, 270.0);
        assert!(h.drop_piece());
        h.spawner
            .stop(&mut h.registry, &mut h.world, &mut h.events);
        assert!(!h.spawner.respawn_pending());
        h.update(1_000, 270.0);
        assert_eq!(h.spawner.controlled(), None);
        assert_eq!(h.registry.len(), 1);
    }

    #[test]
    fn lost_controlled_piece_triggers_respawn() {
        let mut h = Harness::new(4);
        let body_id = h.spawn().expect("spawn");
        h.registry.remove(body_id);
        h.world.destroy_body(body_id);

        h.update(16, 270.0);
        assert_eq!(h.spawner.controlled(), None);
        assert!(h.spawner.respawn_pending());
        h.update(500, 270.0);
        assert!(h.spawner.controlled().is_some());
    }

    #[test]
    fn release_if_consumed_clears_drop_latch_immediately() {
        let mut h = Harness::new(6);
        let body_id = h.spawn().expect("spawn");
        h.update(300, 270.0);
        assert!(h.spawner.can_drop());
        assert!(!h.spawner.release_if_consumed(&h.registry));

        h.registry.remove(body_id);
        assert!(h.spawner.release_if_consumed(&h.registry));
        assert!(!h.spawner.can_drop());
        assert_eq!(h.spawner.controlled(), None);
        assert!(h.spawner.respawn_pending());
        assert!(!h.drop_piece());
    }
}

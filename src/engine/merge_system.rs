use std::collections::HashSet;

use log::debug;

use super::utils::pair_key;
use crate::physics::{BodyId, ContactPair, Material, PhysicsWorld};
use crate::ranks::{self, RankId};
use crate::registry::{Piece, PieceRegistry};
use crate::types::{RuntimeEvent, Vec2};

#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    pub consumed: [BodyId; 2],
    pub created: BodyId,
    pub rank_id: RankId,
    pub position: Vec2,
    pub points: u32,
}

#[derive(Clone, Debug)]
pub struct MergeResolver {
    processed_pairs: HashSet<(BodyId, BodyId)>,
    pop_velocity: Vec2,
    material: Material,
}

impl MergeResolver {
    pub fn new(pop_velocity: Vec2, material: Material) -> Self {
        Self {
            processed_pairs: HashSet::new(),
            pop_velocity,
            material,
        }
    }

    pub fn processed_pair_count(&self) -> usize {
        self.processed_pairs.len()
    }

    /// Resolves one step's batch in order. A piece consumed by an earlier
    /// contact is skipped by every later one.
    pub fn resolve<P: PhysicsWorld>(
        &mut self,
        contacts: &[ContactPair],
        registry: &mut PieceRegistry,
        physics: &mut P,
        events: &mut Vec<RuntimeEvent>,
    ) -> Vec<MergeOutcome> {
        let mut outcomes = Vec::new();
        for contact in contacts {
            if contact.a == contact.b {
                continue;
            }
            let (Some(piece_a), Some(piece_b)) = (registry.get(contact.a), registry.get(contact.b))
            else {
                continue;
            };
            if piece_a.rank_id != piece_b.rank_id {
                continue;
            }
            if ranks::is_max_rank(piece_a.rank_id) {
                continue;
            }
            if piece_a.merge_lock || piece_b.merge_lock {
                continue;
            }
            let Some(next_rank) = ranks::lookup(piece_a.rank_id + 1) else {
                continue;
            };
            if !self.processed_pairs.insert(pair_key(contact.a, contact.b)) {
                continue;
            }

            let outcome = self.commit(contact.a, contact.b, next_rank.id, registry, physics, events);
            outcomes.push(outcome);
        }
        outcomes
    }

    fn commit<P: PhysicsWorld>(
        &mut self,
        id_a: BodyId,
        id_b: BodyId,
        rank_id: RankId,
        registry: &mut PieceRegistry,
        physics: &mut P,
        events: &mut Vec<RuntimeEvent>,
    ) -> MergeOutcome {
        let mut positions = [Vec2::ZERO; 2];
        for (slot, body_id) in [id_a, id_b].into_iter().enumerate() {
            if let Some(piece) = registry.get_mut(body_id) {
                piece.merge_lock = true;
                positions[slot] = physics.body_position(body_id).unwrap_or(piece.position);
            }
        }
        let position = positions[0].midpoint(positions[1]);
        let (radius, points) = ranks::lookup(rank_id)
            .map(|rank| (rank.radius, rank.score))
            .unwrap_or((0.0, 0));

        for body_id in [id_a, id_b] {
            physics.destroy_body(body_id);
            registry.remove(body_id);
        }

        let created = physics.create_body(position, radius, false, self.material);
        let piece = Piece::new(rank_id, created, position, false);
        let view = piece.view();
        registry.insert(piece);
        physics.set_body_velocity(created, self.pop_velocity);

        events.push(RuntimeEvent::PiecesMerged {
            consumed: [id_a, id_b],
            piece: view,
            points,
        });
        debug!("merged bodies {id_a}+{id_b} into rank {rank_id} body {created}");

        MergeOutcome {
            consumed: [id_a, id_b],
            created,
            rank_id,
            position,
            points,
        }
    }

    pub fn update(&mut self) {
        self.processed_pairs.clear();
    }
}

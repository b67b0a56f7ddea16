use std::collections::BTreeMap;

use crate::physics::{BodyId, PhysicsWorld};
use crate::ranks::{self, RankId};
use crate::types::{PieceView, Vec2};

#[derive(Clone, Debug, PartialEq)]
pub struct Piece {
    pub rank_id: RankId,
    pub body_id: BodyId,
    pub position: Vec2,
    pub merge_lock: bool,
    pub is_static: bool,
}

impl Piece {
    pub fn new(rank_id: RankId, body_id: BodyId, position: Vec2, is_static: bool) -> Self {
        Self {
            rank_id,
            body_id,
            position,
            merge_lock: false,
            is_static,
        }
    }

    pub fn view(&self) -> PieceView {
        let rank = ranks::lookup(self.rank_id);
        PieceView {
            body_id: self.body_id,
            rank_id: self.rank_id,
            label: rank.map(|r| r.name).unwrap_or(""),
            x: self.position.x,
            y: self.position.y,
            radius: rank.map(|r| r.radius).unwrap_or(0.0),
            color: rank.map(|r| r.color).unwrap_or(0),
            is_static: self.is_static,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PieceRegistry {
    pieces: BTreeMap<BodyId, Piece>,
}

impl PieceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, piece: Piece) {
        self.pieces.insert(piece.body_id, piece);
    }

    pub fn get(&self, body_id: BodyId) -> Option<&Piece> {
        self.pieces.get(&body_id)
    }

    pub fn get_mut(&mut self, body_id: BodyId) -> Option<&mut Piece> {
        self.pieces.get_mut(&body_id)
    }

    pub fn remove(&mut self, body_id: BodyId) -> Option<Piece> {
        self.pieces.remove(&body_id)
    }

    pub fn contains(&self, body_id: BodyId) -> bool {
        self.pieces.contains_key(&body_id)
    }

    pub fn rekey(&mut self, old_body_id: BodyId, new_body_id: BodyId) -> Option<&Piece> {
        let mut piece = self.pieces.remove(&old_body_id)?;
        piece.body_id = new_body_id;
        self.pieces.insert(new_body_id, piece);
        self.pieces.get(&new_body_id)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.values()
    }

    pub fn dynamic_pieces(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.values().filter(|piece| !piece.is_static)
    }

    pub fn static_count(&self) -> usize {
        self.pieces.values().filter(|piece| piece.is_static).count()
    }

    pub fn sync_positions<P: PhysicsWorld>(&mut self, physics: &P) {
        for piece in self.pieces.values_mut() {
            if let Some(position) = physics.body_position(piece.body_id) {
                piece.position = position;
            }
        }
    }

    pub fn clear<P: PhysicsWorld>(&mut self, physics: &mut P) -> Vec<BodyId> {
        let removed: Vec<BodyId> = self.pieces.keys().copied().collect();
        for body_id in &removed {
            physics.destroy_body(*body_id);
        }
        self.pieces.clear();
        removed
    }

    pub fn views(&self) -> Vec<PieceView> {
        self.pieces.values().map(Piece::view).collect()
    }
}

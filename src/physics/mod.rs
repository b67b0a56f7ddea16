//! Contract between the rule engine and the physics/render collaborator.
//!
//! The engine never integrates motion itself. It creates and destroys circle
//! bodies, teleports the controlled piece, gives merge results their pop
//! velocity and reads positions back. Collision-start notifications are
//! returned from [`PhysicsWorld::advance`] as one batch per step, so every
//! contact of a step is available before merge resolution runs.
//!
//! A body never changes from static to dynamic in place. Dropping a piece is
//! always `destroy_body` followed by `create_body` with the same geometry.

use serde::{Deserialize, Serialize};

use crate::constants::{PIECE_AIR_FRICTION, PIECE_DENSITY, PIECE_FRICTION, PIECE_RESTITUTION};
use crate::types::Vec2;

pub mod sandbox;
pub mod scripted;

pub type BodyId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub restitution: f32,
    pub friction: f32,
    #[serde(rename = "airFriction")]
    pub air_friction: f32,
    pub density: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: PIECE_RESTITUTION,
            friction: PIECE_FRICTION,
            air_friction: PIECE_AIR_FRICTION,
            density: PIECE_DENSITY,
        }
    }
}

/// Two bodies that started touching during the last step. Order is whatever
/// the collaborator reports; the same pair may appear more than once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactPair {
    pub a: BodyId,
    pub b: BodyId,
}

impl ContactPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        Self { a, b }
    }
}

pub trait PhysicsWorld {
    fn create_body(
        &mut self,
        position: Vec2,
        radius: f32,
        is_static: bool,
        material: Material,
    ) -> BodyId;

    fn destroy_body(&mut self, id: BodyId);

    /// Direct teleport with no physics response.
    fn set_body_position(&mut self, id: BodyId, position: Vec2);

    fn set_body_velocity(&mut self, id: BodyId, velocity: Vec2);

    fn body_position(&self, id: BodyId) -> Option<Vec2>;

    /// Integrates one step and returns the contacts that started during it.
    fn advance(&mut self, dt_ms: u64) -> Vec<ContactPair>;
}

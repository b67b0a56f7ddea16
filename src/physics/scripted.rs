use std::collections::BTreeMap;

use super::{BodyId, ContactPair, Material, PhysicsWorld};
use crate::types::Vec2;

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub is_static: bool,
    pub material: Material,
}

#[derive(Clone, Debug, Default)]
pub struct ScriptedWorld {
    bodies: BTreeMap<BodyId, ScriptedBody>,
    queued_contacts: Vec<ContactPair>,
    next_body_id: BodyId,
    destroyed: Vec<BodyId>,
    steps: u64,
}

impl ScriptedWorld {
    pub fn new() -> Self {
        Self {
            next_body_id: 1,
            ..Self::default()
        }
    }

    pub fn add_wall(&mut self, position: Vec2) -> BodyId {
        self.create_body(position, 16.0, true, Material::default())
    }

    pub fn queue_contact(&mut self, a: BodyId, b: BodyId) {
        self.queued_contacts.push(ContactPair::new(a, b));
    }

    pub fn place(&mut self, id: BodyId, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = position;
        }
    }

    pub fn body(&self, id: BodyId) -> Option<&ScriptedBody> {
        self.bodies.get(&id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn destroyed(&self) -> &[BodyId] {
        &self.destroyed
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl PhysicsWorld for ScriptedWorld {
    fn create_body(
        &mut self,
        position: Vec2,
        radius: f32,
        is_static: bool,
        material: Material,
    ) -> BodyId {
        let id = self.next_body_id.max(1);
        self.next_body_id = id + 1;
        self.bodies.insert(
            id,
            ScriptedBody {
                position,
                velocity: Vec2::ZERO,
                radius,
                is_static,
                material,
            },
        );
        id
    }

    fn destroy_body(&mut self, id: BodyId) {
        if self.bodies.remove(&id).is_some() {
            self.destroyed.push(id);
        }
    }

    fn set_body_position(&mut self, id: BodyId, position: Vec2) {
        self.place(id, position);
    }

    fn set_body_velocity(&mut self, id: BodyId, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.velocity = velocity;
        }
    }

    fn body_position(&self, id: BodyId) -> Option<Vec2> {
        self.bodies.get(&id).map(|body| body.position)
    }

    fn advance(&mut self, _dt_ms: u64) -> Vec<ContactPair> {
        self.steps += 1;
        std::mem::take(&mut self.queued_contacts)
    }
}

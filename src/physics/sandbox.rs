use std::collections::{BTreeMap, HashSet};

use super::{BodyId, ContactPair, Material, PhysicsWorld};
use crate::constants::{GRAVITY_Y, PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH, WALL_THICKNESS};
use crate::types::Vec2;

const CONTACT_SLOP: f32 = 0.5;
const REFERENCE_STEP_SEC: f32 = 1.0 / 60.0;

#[derive(Clone, Copy, Debug)]
pub struct SandboxConfig {
    pub gravity_y: f32,
    pub left_x: f32,
    pub right_x: f32,
    pub floor_y: f32,
    pub solver_iterations: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            gravity_y: GRAVITY_Y,
            left_x: WALL_THICKNESS,
            right_x: PLAYFIELD_WIDTH - WALL_THICKNESS,
            floor_y: PLAYFIELD_HEIGHT - WALL_THICKNESS,
            solver_iterations: 4,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SandboxBody {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    is_static: bool,
    material: Material,
}

impl SandboxBody {
    fn inverse_mass(&self) -> f32 {
        if self.is_static {
            return 0.0;
        }
        let mass = self.material.density * std::f32::consts::PI * self.radius * self.radius;
        if mass <= 0.0 {
            1.0
        } else {
            1.0 / mass
        }
    }
}

#[derive(Clone, Debug)]
pub struct SandboxWorld {
    config: SandboxConfig,
    bodies: BTreeMap<BodyId, SandboxBody>,
    touching: HashSet<(BodyId, BodyId)>,
    next_body_id: BodyId,
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

fn ordered(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl SandboxWorld {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            bodies: BTreeMap::new(),
            touching: HashSet::new(),
            next_body_id: 1,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body_velocity(&self, id: BodyId) -> Option<Vec2> {
        self.bodies.get(&id).map(|body| body.velocity)
    }

    fn integrate(&mut self, dt_sec: f32) {
        let config = self.config;
        for body in self.bodies.values_mut() {
            if body.is_static {
                continue;
            }
            let drag = (1.0 - body.material.air_friction)
                .clamp(0.0, 1.0)
                .powf(dt_sec / REFERENCE_STEP_SEC);
            body.velocity.y += config.gravity_y * dt_sec;
            body.velocity.x *= drag;
            body.velocity.y *= drag;
            body.position.x += body.velocity.x * dt_sec;
            body.position.y += body.velocity.y * dt_sec;
            clamp_to_walls(body, &config, dt_sec);
        }
    }

    fn solve_overlaps(&mut self) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        for _ in 0..self.config.solver_iterations.max(1) {
            for (index, &id_a) in ids.iter().enumerate() {
                for &id_b in &ids[index + 1..] {
                    let (Some(a), Some(b)) =
                        (self.bodies.get(&id_a).copied(), self.bodies.get(&id_b).copied())
                    else {
                        continue;
                    };
                    if a.is_static && b.is_static {
                        continue;
                    }
                    if let Some((a, b)) = resolve_pair(a, b) {
                        self.bodies.insert(id_a, a);
                        self.bodies.insert(id_b, b);
                    }
                }
            }
            let config = self.config;
            for body in self.bodies.values_mut() {
                if !body.is_static {
                    clamp_to_walls(body, &config, 0.0);
                }
            }
        }
    }

    fn collect_started_contacts(&mut self) -> Vec<ContactPair> {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        let mut now_touching = HashSet::new();
        let mut started = Vec::new();
        for (index, &id_a) in ids.iter().enumerate() {
            for &id_b in &ids[index + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(&id_a), self.bodies.get(&id_b)) else {
                    continue;
                };
                if a.is_static && b.is_static {
                    continue;
                }
                if a.position.distance(b.position) > a.radius + b.radius + CONTACT_SLOP {
                    continue;
                }
                let key = ordered(id_a, id_b);
                if !self.touching.contains(&key) {
                    started.push(ContactPair::new(id_a, id_b));
                }
                now_touching.insert(key);
            }
        }
        self.touching = now_touching;
        started
    }
}

fn clamp_to_walls(body: &mut SandboxBody, config: &SandboxConfig, dt_sec: f32) {
    let restitution = body.material.restitution;
    if body.position.x - body.radius < config.left_x {
        body.position.x = config.left_x + body.radius;
        if body.velocity.x < 0.0 {
            body.velocity.x = -body.velocity.x * restitution;
        }
    }
    if body.position.x + body.radius > config.right_x {
        body.position.x = config.right_x - body.radius;
        if body.velocity.x > 0.0 {
            body.velocity.x = -body.velocity.x * restitution;
        }
    }
    if body.position.y + body.radius > config.floor_y {
        body.position.y = config.floor_y - body.radius;
        if body.velocity.y > 0.0 {
            body.velocity.y = -body.velocity.y * restitution;
        }
        body.velocity.x *= (1.0 - body.material.friction * dt_sec * 10.0).max(0.0);
    }
}

fn resolve_pair(mut a: SandboxBody, mut b: SandboxBody) -> Option<(SandboxBody, SandboxBody)> {
    let dx = b.position.x - a.position.x;
    let dy = b.position.y - a.position.y;
    let distance = (dx * dx + dy * dy).sqrt();
    let overlap = a.radius + b.radius - distance;
    if overlap <= 0.0 {
        return None;
    }
    let (nx, ny) = if distance > f32::EPSILON {
        (dx / distance, dy / distance)
    } else {
        (0.0, 1.0)
    };

    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return None;
    }

    let push_a = overlap * inv_a / inv_sum;
    let push_b = overlap * inv_b / inv_sum;
    a.position.x -= nx * push_a;
    a.position.y -= ny * push_a;
    b.position.x += nx * push_b;
    b.position.y += ny * push_b;

    let relative_normal =
        (b.velocity.x - a.velocity.x) * nx + (b.velocity.y - a.velocity.y) * ny;
    if relative_normal < 0.0 {
        let restitution = a.material.restitution.min(b.material.restitution);
        let impulse = -(1.0 + restitution) * relative_normal / inv_sum;
        a.velocity.x -= impulse * inv_a * nx;
        a.velocity.y -= impulse * inv_a * ny;
        b.velocity.x += impulse * inv_b * nx;
        b.velocity.y += impulse * inv_b * ny;
    }
    Some((a, b))
}

impl PhysicsWorld for SandboxWorld {
    fn create_body(
        &mut self,
        position: Vec2,
        radius: f32,
        is_static: bool,
        material: Material,
    ) -> BodyId {
        let id = self.next_body_id;
        self.next_body_id += 1;
        self.bodies.insert(
            id,
            SandboxBody {
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
        self.bodies.remove(&id);
        self.touching.retain(|(a, b)| *a != id && *b != id);
    }

    fn set_body_position(&mut self, id: BodyId, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = position;
        }
    }

    fn set_body_velocity(&mut self, id: BodyId, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            if !body.is_static {
                body.velocity = velocity;
            }
        }
    }

    fn body_position(&self, id: BodyId) -> Option<Vec2> {
        self.bodies.get(&id).map(|body| body.position)
    }

    fn advance(&mut self, dt_ms: u64) -> Vec<ContactPair> {
        let dt_sec = dt_ms as f32 / 1000.0;
        self.integrate(dt_sec);
        self.solve_overlaps();
        self.collect_started_contacts()
    }
}

//! The physics world: body arena, integration, collision detection and
//! resolution.
//!
//! Determinism rules: bodies integrate and collide in ascending id order,
//! broad-phase candidates are sorted before the narrow phase, and a
//! degenerate contact normal falls back to +X. Given the same body set and
//! the same step sequence, every platform produces identical state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{INVALID_ID, MAX_BODIES, PhysicsConfig};
use crate::events::{ContactKind, EventQueue, SimEvent};
use crate::math::{Fixed, Vec2F, Vec3F};

use super::body::{BodyKind, RigidBody};

/// Axis-aligned box collider (static world geometry).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2F,
    pub max: Vec2F,
}

impl Aabb {
    /// Closest point on the box to `p`.
    pub fn closest_point(&self, p: Vec2F) -> Vec2F {
        Vec2F::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsWorld {
    pub config: PhysicsConfig,
    slots: Vec<Option<RigidBody>>,
    free: Vec<u32>,
    aabbs: Vec<Aabb>,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> PhysicsWorld {
        PhysicsWorld {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            aabbs: Vec::new(),
        }
    }

    // -- arena ------------------------------------------------------------

    /// Allocate a body. Returns [`INVALID_ID`] when the arena is full.
    pub fn create_body(
        &mut self,
        kind: BodyKind,
        position: Vec3F,
        mass: Fixed,
        radius: Fixed,
    ) -> u32 {
        let id = if let Some(id) = self.free.pop() {
            id
        } else if self.slots.len() < MAX_BODIES {
            self.slots.push(None);
            (self.slots.len() - 1) as u32
        } else {
            log::warn!("physics arena full ({} bodies)", MAX_BODIES);
            return INVALID_ID;
        };
        self.slots[id as usize] = Some(RigidBody::new(id, kind, position, mass, radius));
        id
    }

    /// Free a body slot. Unknown ids are ignored.
    pub fn destroy_body(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&RigidBody> {
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut RigidBody> {
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Live bodies in ascending id order.
    pub fn bodies(&self) -> impl Iterator<Item = &RigidBody> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Teleport a body (kinematic moves, registry updates). Wakes it.
    pub fn set_position(&mut self, id: u32, position: Vec3F) {
        if let Some(body) = self.get_mut(id) {
            body.position = position;
            body.wake();
        }
    }

    pub fn add_static_aabb(&mut self, aabb: Aabb) {
        self.aabbs.push(aabb);
    }

    // -- snapshot plumbing ------------------------------------------------

    pub fn slots(&self) -> &[Option<RigidBody>] {
        &self.slots
    }

    pub fn free_list(&self) -> &[u32] {
        &self.free
    }

    pub fn aabbs(&self) -> &[Aabb] {
        &self.aabbs
    }

    /// Replace arena contents wholesale (snapshot restore).
    pub fn restore(&mut self, slots: Vec<Option<RigidBody>>, free: Vec<u32>, aabbs: Vec<Aabb>) {
        self.slots = slots;
        self.free = free;
        self.aabbs = aabbs;
    }

    // -- stepping ---------------------------------------------------------

    /// Advance one fixed timestep: integrate, collide, resolve, sleep.
    pub fn step(&mut self, dt: Fixed, events: &mut EventQueue) {
        self.integrate(dt);
        self.collide_pairs(events);
        self.collide_aabbs(events);
        self.confine_to_bounds();
        self.update_sleep();
    }

    fn integrate(&mut self, dt: Fixed) {
        let gravity = self.config.gravity;
        for slot in self.slots.iter_mut() {
            let Some(body) = slot else { continue };
            if !body.is_dynamic() {
                body.force = Vec3F::ZERO;
                body.impulse = Vec3F::ZERO;
                continue;
            }
            if !body.awake {
                continue;
            }
            let inv = body.inverse_mass;
            let mut v = body.velocity;
            v = v.add(body.force.scale(inv * dt));
            v = v.add(body.impulse.scale(inv));
            if body.use_gravity {
                v.z -= gravity * dt;
            }
            // First-order approximation of drag^dt.
            let retain = Fixed::ONE - (Fixed::ONE - body.drag) * dt;
            v = v.scale(retain.clamp(Fixed::ZERO, Fixed::ONE));
            body.velocity = v;
            body.position = body.position.add(v.scale(dt));
            body.force = Vec3F::ZERO;
            body.impulse = Vec3F::ZERO;
        }
    }

    /// Broad phase on a uniform grid, narrow phase circle-circle.
    fn collide_pairs(&mut self, events: &mut EventQueue) {
        let cell = self.config.cell_size;
        let mut grid: HashMap<(i32, i32), Vec<u32>> = HashMap::new();
        for body in self.bodies() {
            let key = (
                (body.position.x / cell).to_int(),
                (body.position.y / cell).to_int(),
            );
            grid.entry(key).or_default().push(body.id);
        }

        let ids: Vec<u32> = self.bodies().map(|b| b.id).collect();
        for &a_id in &ids {
            let Some(a) = self.get(a_id) else { continue };
            let key = (
                (a.position.x / cell).to_int(),
                (a.position.y / cell).to_int(),
            );
            // Candidates from the 3x3 neighbourhood, ascending id, deduped.
            let mut candidates: Vec<u32> = Vec::new();
            for dx in -1..=1 {
                for dy in -1..=1 {
                    if let Some(ids) = grid.get(&(key.0 + dx, key.1 + dy)) {
                        candidates.extend(ids.iter().copied().filter(|&b| b > a_id));
                    }
                }
            }
            candidates.sort_unstable();
            candidates.dedup();

            for b_id in candidates {
                self.resolve_pair(a_id, b_id, events);
            }
        }
    }

    fn resolve_pair(&mut self, a_id: u32, b_id: u32, events: &mut EventQueue) {
        let (Some(a), Some(b)) = (self.get(a_id), self.get(b_id)) else {
            return;
        };
        if !a.collides_with(b) {
            return;
        }
        let delta = b.position.xy().sub(a.position.xy());
        let dist = delta.length();
        let overlap = a.radius + b.radius - dist;
        if overlap <= Fixed::ZERO {
            return;
        }
        // Degenerate overlap: fixed +X fallback keeps peers identical.
        let normal = if dist.is_zero() {
            Vec2F::UNIT_X
        } else {
            delta.scale(Fixed::ONE / dist)
        };

        let sensor_pair = a.sensor || b.sensor;
        let inv_sum = a.inverse_mass + b.inverse_mass;
        if sensor_pair || inv_sum.is_zero() {
            let kind = if sensor_pair {
                ContactKind::Trigger
            } else {
                ContactKind::Overlap
            };
            let point = a.position.xy().add(normal.scale(a.radius));
            events.push(SimEvent::Contact {
                kind,
                body_a: a_id,
                body_b: b_id,
                point: Vec3F::from_xy(point),
                normal: Vec3F::from_xy(normal),
                impulse: Fixed::ZERO,
            });
            return;
        }

        let restitution = a.restitution.min(b.restitution);
        let friction = (a.friction + b.friction) * Fixed::HALF;
        let correction_mag =
            (overlap - self.config.slop).max(Fixed::ZERO) * self.config.correction / inv_sum;
        let (inv_a, inv_b) = (a.inverse_mass, b.inverse_mass);
        let rel_v = b.velocity.xy().sub(a.velocity.xy());
        let vn = rel_v.dot(normal);

        // Normal impulse only when the pair is closing.
        let jn = if vn < Fixed::ZERO {
            -(Fixed::ONE + restitution) * vn / inv_sum
        } else {
            Fixed::ZERO
        };

        // Friction impulse along the tangent, clamped by Coulomb's cone.
        let tangent = {
            let t = rel_v.sub(normal.scale(vn));
            t.normalize()
        };
        let jt_raw = if tangent.is_zero() {
            Fixed::ZERO
        } else {
            -rel_v.dot(tangent) / inv_sum
        };
        let jt_max = friction * jn;
        let jt = jt_raw.clamp(-jt_max, jt_max);

        let point = a.position.xy().add(normal.scale(a.radius));
        if let Some(a) = self.get_mut(a_id) {
            a.position = a
                .position
                .sub(Vec3F::from_xy(normal.scale(correction_mag * inv_a)));
            a.velocity = a
                .velocity
                .sub(Vec3F::from_xy(normal.scale(jn * inv_a)))
                .sub(Vec3F::from_xy(tangent.scale(jt * inv_a)));
            a.wake();
        }
        if let Some(b) = self.get_mut(b_id) {
            b.position = b
                .position
                .add(Vec3F::from_xy(normal.scale(correction_mag * inv_b)));
            b.velocity = b
                .velocity
                .add(Vec3F::from_xy(normal.scale(jn * inv_b)))
                .add(Vec3F::from_xy(tangent.scale(jt * inv_b)));
            b.wake();
        }
        events.push(SimEvent::Contact {
            kind: ContactKind::Contact,
            body_a: a_id,
            body_b: b_id,
            point: Vec3F::from_xy(point),
            normal: Vec3F::from_xy(normal),
            impulse: jn,
        });
    }

    /// Circle-vs-AABB narrow phase against static box colliders.
    fn collide_aabbs(&mut self, events: &mut EventQueue) {
        if self.aabbs.is_empty() {
            return;
        }
        let aabbs = self.aabbs.clone();
        let ids: Vec<u32> = self.bodies().filter(|b| b.is_dynamic()).map(|b| b.id).collect();
        for id in ids {
            for aabb in &aabbs {
                let Some(body) = self.get(id) else { break };
                let center = body.position.xy();
                let closest = aabb.closest_point(center);
                let delta = center.sub(closest);
                let dist = delta.length();
                let overlap = body.radius - dist;
                if overlap <= Fixed::ZERO {
                    continue;
                }
                let normal = if dist.is_zero() {
                    Vec2F::UNIT_X
                } else {
                    delta.scale(Fixed::ONE / dist)
                };
                let Some(body) = self.get_mut(id) else { break };
                body.position = body.position.add(Vec3F::from_xy(normal.scale(overlap)));
                let restitution = body.restitution;
                let vn = body.velocity.xy().dot(normal);
                if vn < Fixed::ZERO {
                    let bounce = normal.scale(vn * (Fixed::ONE + restitution));
                    body.velocity = body.velocity.sub(Vec3F::from_xy(bounce));
                }
                body.wake();
                events.push(SimEvent::Contact {
                    kind: ContactKind::Contact,
                    body_a: id,
                    body_b: INVALID_ID,
                    point: Vec3F::from_xy(closest),
                    normal: Vec3F::from_xy(normal),
                    impulse: Fixed::ZERO,
                });
            }
        }
    }

    /// Keep dynamic bodies inside the configured world rectangle.
    fn confine_to_bounds(&mut self) {
        let cfg = self.config;
        for slot in self.slots.iter_mut() {
            let Some(body) = slot else { continue };
            if !body.is_dynamic() {
                continue;
            }
            let r = body.radius;
            let (lo_x, hi_x) = (cfg.min_x + r, cfg.max_x - r);
            let (lo_y, hi_y) = (cfg.min_y + r, cfg.max_y - r);
            if body.position.x < lo_x {
                body.position.x = lo_x;
                if body.velocity.x < Fixed::ZERO {
                    body.velocity.x = -body.velocity.x * body.restitution;
                }
            } else if body.position.x > hi_x {
                body.position.x = hi_x;
                if body.velocity.x > Fixed::ZERO {
                    body.velocity.x = -body.velocity.x * body.restitution;
                }
            }
            if body.position.y < lo_y {
                body.position.y = lo_y;
                if body.velocity.y < Fixed::ZERO {
                    body.velocity.y = -body.velocity.y * body.restitution;
                }
            } else if body.position.y > hi_y {
                body.position.y = hi_y;
                if body.velocity.y > Fixed::ZERO {
                    body.velocity.y = -body.velocity.y * body.restitution;
                }
            }
        }
    }

    fn update_sleep(&mut self) {
        let eps = self.config.sleep_epsilon;
        let eps_sq = eps * eps;
        let threshold = self.config.sleep_frames;
        for slot in self.slots.iter_mut() {
            let Some(body) = slot else { continue };
            if !body.is_dynamic() || !body.awake {
                continue;
            }
            if body.velocity.length_sq() < eps_sq {
                body.sleep_frames = body.sleep_frames.saturating_add(1);
                if body.sleep_frames >= threshold {
                    body.awake = false;
                    body.velocity = Vec3F::ZERO;
                }
            } else {
                body.sleep_frames = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default())
    }

    fn dt() -> Fixed {
        Fixed::from_millis(16)
    }

    fn dynamic_at(w: &mut PhysicsWorld, x: i32, y: i32) -> u32 {
        w.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(x), Fixed::from_int(y), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        )
    }

    #[test]
    fn ids_are_reused_after_destroy() {
        let mut w = world();
        let a = dynamic_at(&mut w, 1, 1);
        let b = dynamic_at(&mut w, 2, 2);
        w.destroy_body(a);
        let c = dynamic_at(&mut w, 3, 3);
        assert_eq!(c, a);
        assert_ne!(b, c);
    }

    #[test]
    fn arena_capacity_returns_sentinel() {
        let mut w = world();
        for _ in 0..MAX_BODIES {
            assert_ne!(dynamic_at(&mut w, 5, 5), INVALID_ID);
        }
        assert_eq!(dynamic_at(&mut w, 5, 5), INVALID_ID);
    }

    #[test]
    fn impulse_moves_body() {
        let mut w = world();
        let id = dynamic_at(&mut w, 10, 10);
        w.get_mut(id)
            .unwrap()
            .add_impulse(Vec3F::new(Fixed::from_int(2), Fixed::ZERO, Fixed::ZERO));
        let mut events = EventQueue::new();
        w.step(dt(), &mut events);
        let body = w.get(id).unwrap();
        assert!(body.velocity.x > Fixed::ZERO);
        assert!(body.position.x > Fixed::from_int(10));
    }

    #[test]
    fn head_on_collision_separates_and_conserves_energy_bound() {
        let mut w = world();
        let a = w.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(5), Fixed::from_int(5), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        let b = w.create_body(
            BodyKind::Dynamic,
            Vec3F::new(
                Fixed::from_ratio(58, 10),
                Fixed::from_int(5),
                Fixed::ZERO,
            ),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        w.get_mut(a).unwrap().velocity = Vec3F::new(Fixed::from_int(2), Fixed::ZERO, Fixed::ZERO);
        w.get_mut(b).unwrap().velocity = Vec3F::new(-Fixed::from_int(2), Fixed::ZERO, Fixed::ZERO);
        let pre = w.get(a).unwrap().kinetic_energy() + w.get(b).unwrap().kinetic_energy();

        let mut events = EventQueue::new();
        w.step(dt(), &mut events);

        let post = w.get(a).unwrap().kinetic_energy() + w.get(b).unwrap().kinetic_energy();
        assert!(
            post <= pre + Fixed::EPSILON,
            "energy grew: {} -> {}",
            pre,
            post
        );
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::Contact {
                kind: ContactKind::Contact,
                ..
            }
        )));
        // Bodies are moving apart.
        let va = w.get(a).unwrap().velocity.x;
        let vb = w.get(b).unwrap().velocity.x;
        assert!(va <= Fixed::ZERO && vb >= Fixed::ZERO);
    }

    #[test]
    fn static_body_never_moves() {
        let mut w = world();
        let wall = w.create_body(
            BodyKind::Static,
            Vec3F::new(Fixed::from_int(5), Fixed::from_int(5), Fixed::ZERO),
            Fixed::ZERO,
            Fixed::ONE,
        );
        let ball = w.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_ratio(66, 10), Fixed::from_int(5), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        w.get_mut(ball).unwrap().velocity =
            Vec3F::new(-Fixed::from_int(3), Fixed::ZERO, Fixed::ZERO);
        let mut events = EventQueue::new();
        for _ in 0..10 {
            w.step(dt(), &mut events);
        }
        let wall_body = w.get(wall).unwrap();
        assert_eq!(wall_body.position.x, Fixed::from_int(5));
        // Ball bounced back.
        assert!(w.get(ball).unwrap().velocity.x >= Fixed::ZERO);
    }

    #[test]
    fn bodies_fall_asleep_when_calm() {
        let mut w = world();
        let id = dynamic_at(&mut w, 10, 10);
        let mut events = EventQueue::new();
        for _ in 0..40 {
            w.step(dt(), &mut events);
        }
        let body = w.get(id).unwrap();
        assert!(!body.awake);
        assert_eq!(body.velocity, Vec3F::ZERO);
    }

    #[test]
    fn world_bounds_confine_dynamics() {
        let mut w = world();
        let id = dynamic_at(&mut w, 1, 1);
        w.get_mut(id).unwrap().velocity =
            Vec3F::new(-Fixed::from_int(50), Fixed::ZERO, Fixed::ZERO);
        let mut events = EventQueue::new();
        for _ in 0..30 {
            w.step(dt(), &mut events);
        }
        let body = w.get(id).unwrap();
        assert!(body.position.x >= w.config.min_x + body.radius - Fixed::EPSILON);
    }

    #[test]
    fn sensor_emits_trigger_without_response() {
        let mut w = world();
        let a = dynamic_at(&mut w, 5, 5);
        let b = dynamic_at(&mut w, 5, 5);
        w.get_mut(b).unwrap().sensor = true;
        let before = w.get(a).unwrap().position;
        let mut events = EventQueue::new();
        w.step(dt(), &mut events);
        assert_eq!(w.get(a).unwrap().position, before);
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::Contact {
                kind: ContactKind::Trigger,
                ..
            }
        )));
    }
}

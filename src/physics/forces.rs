//! Force propagation: explosions, scripted impulse chains, slope rolling.
//!
//! Explosions expand by `expansion_speed * dt` per step and push every body
//! inside the current radius away from the origin; force falls off with the
//! square of relative distance, is scaled by a density-based material
//! response, and is halved when an obstacle blocks the line of sight. Force
//! nodes let gameplay code propagate an impulse to up to eight connected
//! bodies in a single hop.

use serde::{Deserialize, Serialize};

use crate::config::{INVALID_ID, MAX_EXPLOSIONS, MAX_FORCE_NODES};
use crate::events::{EventQueue, SimEvent};
use crate::math::{Fixed, Vec2F, Vec3F};
use crate::terrain::Obstacle;

use super::world::PhysicsWorld;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    pub origin: Vec3F,
    pub max_radius: Fixed,
    pub current_radius: Fixed,
    pub expansion_speed: Fixed,
    pub max_force: Fixed,
    pub active: bool,
}

/// Scripted impulse-chain node: one source body wired to up to eight
/// receivers with a shared transmission efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceNode {
    pub body: u32,
    pub connections: [u32; 8],
    /// Fraction of the impulse passed to each connection, in [0, 1].
    pub efficiency: Fixed,
}

impl ForceNode {
    pub fn new(body: u32, efficiency: Fixed) -> ForceNode {
        ForceNode {
            body,
            connections: [INVALID_ID; 8],
            efficiency: efficiency.clamp(Fixed::ZERO, Fixed::ONE),
        }
    }

    /// Wire a connection; false when all eight slots are taken.
    pub fn connect(&mut self, body: u32) -> bool {
        for slot in self.connections.iter_mut() {
            if *slot == INVALID_ID {
                *slot = body;
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForcePropagator {
    explosions: Vec<Explosion>,
    nodes: Vec<ForceNode>,
}

impl ForcePropagator {
    pub fn new() -> ForcePropagator {
        ForcePropagator::default()
    }

    /// Start an explosion. Returns false when all slots are busy.
    pub fn create_explosion(
        &mut self,
        origin: Vec3F,
        max_radius: Fixed,
        max_force: Fixed,
        expansion_speed: Fixed,
        events: &mut EventQueue,
    ) -> bool {
        // Reuse an expired slot before growing.
        let slot = self.explosions.iter_mut().find(|e| !e.active);
        let explosion = Explosion {
            origin,
            max_radius,
            current_radius: Fixed::ZERO,
            expansion_speed,
            max_force,
            active: true,
        };
        match slot {
            Some(s) => *s = explosion,
            None => {
                if self.explosions.len() >= MAX_EXPLOSIONS {
                    log::warn!("explosion slots exhausted");
                    return false;
                }
                self.explosions.push(explosion);
            }
        }
        events.push(SimEvent::ExplosionSpawned { origin, max_radius });
        true
    }

    pub fn add_node(&mut self, node: ForceNode) -> u32 {
        if self.nodes.len() >= MAX_FORCE_NODES {
            return INVALID_ID;
        }
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    pub fn node_mut(&mut self, index: u32) -> Option<&mut ForceNode> {
        self.nodes.get_mut(index as usize)
    }

    /// Push `impulse` through one node: each connected body receives
    /// `impulse * efficiency`. Single hop; callers iterate for chains.
    pub fn propagate(&self, world: &mut PhysicsWorld, index: u32, impulse: Vec3F) {
        let Some(node) = self.nodes.get(index as usize) else {
            return;
        };
        let passed = impulse.scale(node.efficiency);
        for &target in node.connections.iter() {
            if target == INVALID_ID {
                continue;
            }
            if let Some(body) = world.get_mut(target) {
                body.add_impulse(passed);
            }
        }
    }

    pub fn active_explosions(&self) -> impl Iterator<Item = &Explosion> {
        self.explosions.iter().filter(|e| e.active)
    }

    /// Expand explosions and apply their impulses. Runs before world
    /// integration so impulses land the same frame.
    pub fn step(
        &mut self,
        world: &mut PhysicsWorld,
        obstacles: &[Obstacle],
        dt: Fixed,
        events: &mut EventQueue,
    ) {
        for explosion in self.explosions.iter_mut() {
            if !explosion.active {
                continue;
            }
            explosion.current_radius =
                (explosion.current_radius + explosion.expansion_speed * dt).min(explosion.max_radius);
            let radius = explosion.current_radius;
            if radius.is_zero() {
                continue;
            }

            let ids: Vec<u32> = world
                .bodies()
                .filter(|b| b.is_dynamic())
                .map(|b| b.id)
                .collect();
            for id in ids {
                let Some(body) = world.get(id) else { continue };
                let delta = body.position.sub(explosion.origin);
                let dist = delta.length();
                if dist > radius {
                    continue;
                }
                let falloff = {
                    let t = Fixed::ONE - dist / radius;
                    t * t
                };
                let density = if body.radius.is_zero() {
                    Fixed::ONE
                } else {
                    body.mass / (body.radius * body.radius)
                };
                let mut magnitude =
                    explosion.max_force * falloff * material_response(density);
                if blocked_by_obstacle(explosion.origin.xy(), body.position.xy(), obstacles) {
                    magnitude = magnitude * Fixed::HALF;
                }
                // Degenerate center overlap pushes along +X.
                let dir = if dist.is_zero() {
                    Vec3F::new(Fixed::ONE, Fixed::ZERO, Fixed::ZERO)
                } else {
                    delta.scale(Fixed::ONE / dist)
                };
                if let Some(body) = world.get_mut(id) {
                    body.add_impulse(dir.scale(magnitude * dt));
                }
            }

            if explosion.current_radius >= explosion.max_radius {
                explosion.active = false;
                events.push(SimEvent::ExplosionExpired {
                    origin: explosion.origin,
                });
            }
        }
    }

    /// Gravity-along-slope minus kinetic friction for rolling bodies on the
    /// configured incline.
    pub fn apply_rolling(&self, world: &mut PhysicsWorld, rolling_ids: &[u32], gravity: Fixed) {
        let Some(slope) = world.config.slope else {
            return;
        };
        if slope.is_zero() {
            return;
        }
        let downhill = slope.normalize();
        let grade = slope.length();
        for &id in rolling_ids {
            let Some(body) = world.get_mut(id) else { continue };
            if !body.is_dynamic() {
                continue;
            }
            let pull = downhill.scale(gravity * grade * body.mass);
            // Kinetic friction opposes motion along the slope.
            let along = body.velocity.xy().dot(downhill);
            let friction_mag = (body.friction * gravity * body.mass).min(pull.length());
            let friction = if along > Fixed::ZERO {
                downhill.scale(-friction_mag)
            } else {
                Vec2F::ZERO
            };
            body.add_force(Vec3F::from_xy(pull.add(friction)));
        }
    }

    // snapshot plumbing

    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub fn nodes(&self) -> &[ForceNode] {
        &self.nodes
    }

    pub fn restore(&mut self, explosions: Vec<Explosion>, nodes: Vec<ForceNode>) {
        self.explosions = explosions;
        self.nodes = nodes;
    }
}

/// Density response: light debris flies, dense bodies shrug.
fn material_response(density: Fixed) -> Fixed {
    (Fixed::TWO / (Fixed::ONE + density)).clamp(Fixed::from_ratio(1, 4), Fixed::TWO)
}

/// Segment-vs-circle occlusion test against the obstacle field.
fn blocked_by_obstacle(from: Vec2F, to: Vec2F, obstacles: &[Obstacle]) -> bool {
    let seg = to.sub(from);
    let len_sq = seg.length_sq();
    for obstacle in obstacles {
        let to_center = obstacle.center.sub(from);
        let t = if len_sq.is_zero() {
            Fixed::ZERO
        } else {
            (to_center.dot(seg) / len_sq).clamp(Fixed::ZERO, Fixed::ONE)
        };
        let closest = from.add(seg.scale(t));
        if obstacle.center.distance(closest) < obstacle.radius {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::physics::body::BodyKind;

    fn setup() -> (PhysicsWorld, ForcePropagator, EventQueue) {
        (
            PhysicsWorld::new(PhysicsConfig::default()),
            ForcePropagator::new(),
            EventQueue::new(),
        )
    }

    #[test]
    fn explosion_pushes_bodies_outward() {
        let (mut world, mut forces, mut events) = setup();
        let id = world.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(10), Fixed::from_int(10), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        forces.create_explosion(
            Vec3F::new(Fixed::from_int(9), Fixed::from_int(10), Fixed::ZERO),
            Fixed::from_int(5),
            Fixed::from_int(200),
            Fixed::from_int(100),
            &mut events,
        );
        let dt = Fixed::from_millis(16);
        forces.step(&mut world, &[], dt, &mut events);
        world.step(dt, &mut events);
        let body = world.get(id).unwrap();
        assert!(body.velocity.x > Fixed::ZERO, "pushed away from origin");
    }

    #[test]
    fn explosion_deactivates_at_max_radius() {
        let (mut world, mut forces, mut events) = setup();
        forces.create_explosion(
            Vec3F::ZERO,
            Fixed::from_int(1),
            Fixed::from_int(10),
            Fixed::from_int(100),
            &mut events,
        );
        let dt = Fixed::from_millis(16);
        forces.step(&mut world, &[], dt, &mut events);
        assert_eq!(forces.active_explosions().count(), 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::ExplosionExpired { .. })));
    }

    #[test]
    fn line_of_sight_blocked_halves_force() {
        let blockers = [Obstacle {
            center: Vec2F::new(Fixed::from_int(5), Fixed::ZERO),
            radius: Fixed::ONE,
        }];
        assert!(blocked_by_obstacle(
            Vec2F::ZERO,
            Vec2F::new(Fixed::from_int(10), Fixed::ZERO),
            &blockers
        ));
        assert!(!blocked_by_obstacle(
            Vec2F::ZERO,
            Vec2F::new(Fixed::ZERO, Fixed::from_int(10)),
            &blockers
        ));
    }

    #[test]
    fn force_node_propagates_single_hop() {
        let (mut world, mut forces, _events) = setup();
        let a = world.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(3), Fixed::from_int(3), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        let b = world.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(6), Fixed::from_int(6), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        let mut node = ForceNode::new(a, Fixed::HALF);
        assert!(node.connect(b));
        let idx = forces.add_node(node);
        forces.propagate(
            &mut world,
            idx,
            Vec3F::new(Fixed::from_int(4), Fixed::ZERO, Fixed::ZERO),
        );
        // Receiver got impulse * 0.5; source got nothing from propagate.
        assert_eq!(world.get(b).unwrap().impulse.x, Fixed::from_int(2));
        assert_eq!(world.get(a).unwrap().impulse, Vec3F::ZERO);
    }

    #[test]
    fn node_connections_are_bounded() {
        let mut node = ForceNode::new(0, Fixed::ONE);
        for i in 1..=8 {
            assert!(node.connect(i));
        }
        assert!(!node.connect(99));
    }

    #[test]
    fn rolling_accelerates_downhill() {
        let mut cfg = PhysicsConfig::default();
        cfg.slope = Some(Vec2F::new(Fixed::from_ratio(3, 10), Fixed::ZERO));
        let mut world = PhysicsWorld::new(cfg);
        let forces = ForcePropagator::new();
        let id = world.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(10), Fixed::from_int(10), Fixed::ZERO),
            Fixed::ONE,
            Fixed::from_ratio(1, 2),
        );
        forces.apply_rolling(&mut world, &[id], Fixed::from_int(10));
        let mut events = EventQueue::new();
        world.step(Fixed::from_millis(16), &mut events);
        assert!(world.get(id).unwrap().velocity.x > Fixed::ZERO);
    }
}

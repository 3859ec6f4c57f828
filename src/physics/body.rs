//! Rigid body records.
//!
//! Bodies live in a slot arena owned by [`super::PhysicsWorld`]; everything
//! else holds the `u32` id as a weak reference. A body is a circle in the XY
//! plane with an optional Z for explosion geometry.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec3F};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BodyKind {
    /// Immovable; infinite mass.
    Static = 0,
    /// Script-moved; infinite mass for collision response.
    Kinematic = 1,
    /// Fully simulated.
    Dynamic = 2,
}

impl BodyKind {
    pub fn from_u8(v: u8) -> BodyKind {
        match v {
            1 => BodyKind::Kinematic,
            2 => BodyKind::Dynamic,
            _ => BodyKind::Static,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub id: u32,
    pub kind: BodyKind,
    pub position: Vec3F,
    pub velocity: Vec3F,
    pub mass: Fixed,
    /// Zero iff Static or Kinematic.
    pub inverse_mass: Fixed,
    /// Per-second velocity retention in [0, 1].
    pub drag: Fixed,
    pub friction: Fixed,
    pub restitution: Fixed,
    pub radius: Fixed,
    pub layer: u32,
    pub mask: u32,
    pub use_gravity: bool,
    /// Sensors report overlaps but never receive collision response.
    pub sensor: bool,
    pub awake: bool,
    /// Consecutive frames under the sleep threshold.
    pub sleep_frames: u8,
    /// Accumulated force, cleared after integration.
    pub force: Vec3F,
    /// Accumulated impulse, cleared after integration.
    pub impulse: Vec3F,
}

impl RigidBody {
    pub fn new(id: u32, kind: BodyKind, position: Vec3F, mass: Fixed, radius: Fixed) -> RigidBody {
        let inverse_mass = match kind {
            BodyKind::Dynamic if mass > Fixed::ZERO => Fixed::ONE / mass,
            _ => Fixed::ZERO,
        };
        RigidBody {
            id,
            kind,
            position,
            velocity: Vec3F::ZERO,
            mass,
            inverse_mass,
            drag: Fixed::from_ratio(98, 100),
            friction: Fixed::from_ratio(40, 100),
            restitution: Fixed::from_ratio(30, 100),
            radius,
            layer: super::layers::ALL,
            mask: super::layers::ALL,
            use_gravity: false,
            sensor: false,
            awake: true,
            sleep_frames: 0,
            force: Vec3F::ZERO,
            impulse: Vec3F::ZERO,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Queue a continuous force for the next integration step. Wakes the
    /// body.
    pub fn add_force(&mut self, force: Vec3F) {
        if !self.is_dynamic() {
            return;
        }
        self.force = self.force.add(force);
        self.wake();
    }

    /// Queue an instantaneous impulse. Wakes the body.
    pub fn add_impulse(&mut self, impulse: Vec3F) {
        if !self.is_dynamic() {
            return;
        }
        self.impulse = self.impulse.add(impulse);
        self.wake();
    }

    pub fn wake(&mut self) {
        self.awake = true;
        self.sleep_frames = 0;
    }

    /// Layer/mask pair test: both directions must agree.
    pub fn collides_with(&self, other: &RigidBody) -> bool {
        (self.layer & other.mask) != 0 && (other.layer & self.mask) != 0
    }

    /// Linear kinetic energy, `m * v² / 2`.
    pub fn kinetic_energy(&self) -> Fixed {
        self.mass * self.velocity.length_sq() * Fixed::HALF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::layers;

    fn body(kind: BodyKind) -> RigidBody {
        RigidBody::new(
            0,
            kind,
            Vec3F::ZERO,
            Fixed::from_int(2),
            Fixed::from_ratio(1, 2),
        )
    }

    #[test]
    fn inverse_mass_zero_iff_not_dynamic() {
        assert_eq!(body(BodyKind::Static).inverse_mass, Fixed::ZERO);
        assert_eq!(body(BodyKind::Kinematic).inverse_mass, Fixed::ZERO);
        assert_eq!(body(BodyKind::Dynamic).inverse_mass, Fixed::HALF);
    }

    #[test]
    fn static_bodies_ignore_impulses() {
        let mut b = body(BodyKind::Static);
        b.add_impulse(Vec3F::new(Fixed::ONE, Fixed::ZERO, Fixed::ZERO));
        assert_eq!(b.impulse, Vec3F::ZERO);
    }

    #[test]
    fn layer_filter_requires_both_directions() {
        let mut a = body(BodyKind::Dynamic);
        let mut b = body(BodyKind::Dynamic);
        a.layer = layers::PLAYER;
        a.mask = layers::ENEMY;
        b.layer = layers::ENEMY;
        b.mask = layers::PLAYER;
        assert!(a.collides_with(&b));
        b.mask = layers::OBSTACLE;
        assert!(!a.collides_with(&b));
    }

    #[test]
    fn impulse_wakes_a_sleeping_body() {
        let mut b = body(BodyKind::Dynamic);
        b.awake = false;
        b.sleep_frames = 10;
        b.add_impulse(Vec3F::new(Fixed::ONE, Fixed::ZERO, Fixed::ZERO));
        assert!(b.awake);
        assert_eq!(b.sleep_frames, 0);
    }
}

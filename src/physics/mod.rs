//! Fixed-point rigid body physics: bodies, the stepping world, and force
//! propagation (explosions, force nodes, slope rolling).

pub mod body;
pub mod forces;
pub mod world;

pub use body::{BodyKind, RigidBody};
pub use forces::{Explosion, ForceNode, ForcePropagator};
pub use world::PhysicsWorld;

/// Collision layer bits.
pub mod layers {
    pub const PLAYER: u32 = 1 << 0;
    pub const ENEMY: u32 = 1 << 1;
    pub const OBSTACLE: u32 = 1 << 2;
    pub const BARREL: u32 = 1 << 3;
    pub const PROJECTILE: u32 = 1 << 4;
    pub const ALL: u32 = u32::MAX;
}

//! Physics end-to-end: explosion impulses through the registry surface, and
//! the kinetic-energy bound on collisions.

mod common;

use common::{dt, idle_frames, make_core};
use lupine_sim::config::INVALID_ID;
use lupine_sim::events::EventQueue;
use lupine_sim::math::{Fixed, Vec3F};
use lupine_sim::physics::{BodyKind, PhysicsWorld};
use lupine_sim::config::PhysicsConfig;

#[test]
fn explosion_pushes_registered_body_away_from_origin() {
    // Dynamic body at normalized (0.5, 0.5); explosion at the same point.
    let mut core = make_core(1, 1, 0);
    let body_id = core.create_enemy_body(5, 0.5, 0.5, 1.0, 0.02);
    assert_ne!(body_id, INVALID_ID);
    let start = core.physics.get(body_id).unwrap().position;

    assert!(core.create_explosion(0.5, 0.5, 0.0, 0.2, 10.0, 5.0));
    idle_frames(&mut core, 2);

    let body = core.physics.get(body_id).unwrap();
    let speed = body.velocity.length();
    assert!(speed > Fixed::ZERO, "explosion imparted velocity");
    let moved = body.position.distance(start);
    assert!(moved > Fixed::ZERO, "body moved away from the origin");
}

#[test]
fn explosion_force_decays_with_distance() {
    let mut core = make_core(1, 1, 0);
    let near = core.create_enemy_body(0, 0.45, 0.2, 1.0, 0.02);
    let far = core.create_enemy_body(1, 0.30, 0.2, 1.0, 0.02);
    assert!(core.create_explosion(0.5, 0.2, 0.0, 0.4, 20.0, 50.0));
    idle_frames(&mut core, 3);
    let near_speed = core.physics.get(near).unwrap().velocity.length();
    let far_speed = core.physics.get(far).unwrap().velocity.length();
    assert!(near_speed > far_speed, "{} <= {}", near_speed, far_speed);
}

#[test]
fn collision_never_gains_kinetic_energy() {
    // Head-on two-body collisions across a spread of restitutions.
    for restitution_pct in [0, 25, 50, 75, 100] {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());
        let a = world.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(8), Fixed::from_int(10), Fixed::ZERO),
            Fixed::ONE,
            Fixed::HALF,
        );
        let b = world.create_body(
            BodyKind::Dynamic,
            Vec3F::new(Fixed::from_int(9), Fixed::from_int(10), Fixed::ZERO),
            Fixed::TWO,
            Fixed::HALF,
        );
        for id in [a, b] {
            let body = world.get_mut(id).unwrap();
            body.restitution = Fixed::from_ratio(restitution_pct, 100);
            body.drag = Fixed::ONE; // isolate the collision itself
        }
        world.get_mut(a).unwrap().velocity =
            Vec3F::new(Fixed::from_int(3), Fixed::ZERO, Fixed::ZERO);
        world.get_mut(b).unwrap().velocity =
            Vec3F::new(-Fixed::from_int(2), Fixed::ZERO, Fixed::ZERO);

        let pre = world.get(a).unwrap().kinetic_energy() + world.get(b).unwrap().kinetic_energy();
        let mut events = EventQueue::new();
        for _ in 0..20 {
            world.step(dt(), &mut events);
        }
        let post = world.get(a).unwrap().kinetic_energy() + world.get(b).unwrap().kinetic_energy();
        assert!(
            post <= pre + Fixed::from_raw(64),
            "restitution {}%: energy {} -> {}",
            restitution_pct,
            pre,
            post
        );
    }
}

#[test]
fn momentum_is_conserved_in_dynamic_pairs() {
    let mut world = PhysicsWorld::new(PhysicsConfig::default());
    let a = world.create_body(
        BodyKind::Dynamic,
        Vec3F::new(Fixed::from_int(8), Fixed::from_int(10), Fixed::ZERO),
        Fixed::ONE,
        Fixed::HALF,
    );
    let b = world.create_body(
        BodyKind::Dynamic,
        Vec3F::new(Fixed::from_int(9), Fixed::from_int(10), Fixed::ZERO),
        Fixed::from_int(3),
        Fixed::HALF,
    );
    for id in [a, b] {
        let body = world.get_mut(id).unwrap();
        body.drag = Fixed::ONE;
        body.friction = Fixed::ZERO;
    }
    world.get_mut(a).unwrap().velocity = Vec3F::new(Fixed::from_int(4), Fixed::ZERO, Fixed::ZERO);

    let momentum_pre = Fixed::from_int(4) * Fixed::ONE;
    let mut events = EventQueue::new();
    for _ in 0..10 {
        world.step(dt(), &mut events);
    }
    let momentum_post = world.get(a).unwrap().velocity.x * Fixed::ONE
        + world.get(b).unwrap().velocity.x * Fixed::from_int(3);
    assert!(
        (momentum_post - momentum_pre).abs() <= Fixed::from_raw(256),
        "momentum {} -> {}",
        momentum_pre,
        momentum_post
    );
}

#[test]
fn registry_capacity_yields_sentinel_not_panic() {
    let mut core = make_core(1, 1, 0);
    let mut created = 0;
    let mut denied = 0;
    for slot in 0..100u32 {
        let id = core.create_enemy_body(slot % 32, 0.3, 0.3, 1.0, 0.01);
        if id == INVALID_ID {
            denied += 1;
        } else {
            created += 1;
        }
    }
    assert!(created > 0);
    assert!(denied > 0, "arena exhaustion surfaces the sentinel");
    assert!(core.diag.capacity_denied > 0);
}

//! Wolf entities and pack AI.
//!
//! The manager owns the wolf arena and the pack records; packs hold member
//! ids only. Each tick runs reactions to last frame's vocalizations, then
//! pack plan evaluation, then the per-wolf pipeline (perception, emotion,
//! state, movement, vocalization) in ascending id order.

pub mod pack;
pub mod vocal;
pub mod wolf;

use serde::{Deserialize, Serialize};

use crate::combat::IncomingAttack;
use crate::config::{INVALID_ID, MAX_PACKS, MAX_WOLVES, PackTuning};
use crate::events::{EventQueue, SimEvent};
use crate::math::{Fixed, Vec2F, Vec3F};
use crate::physics::{BodyKind, PhysicsWorld, layers};
use crate::rng::{RngScope, SimRng};
use crate::terrain::{HazardField, ObstacleField};

pub use pack::{Pack, PackPlan, PackSenses};
pub use vocal::{VocalKind, VocalQueue, Vocalization};
pub use wolf::{Emotion, PackRole, Wolf, WolfMemory, WolfState, WolfType};

/// Base wolf speed in normalized units per second.
fn base_wolf_speed() -> Fixed {
    Fixed::from_ratio(18, 100)
}

fn wolf_radius() -> Fixed {
    Fixed::from_ratio(2, 100)
}

/// An attack a wolf throws at the player this frame; the coordinator runs it
/// through combat resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WolfAttack {
    pub wolf_id: u32,
    pub attack: IncomingAttack,
}

/// Borrowed world context for one AI tick.
pub struct WolfCtx<'a> {
    pub now: Fixed,
    pub dt: Fixed,
    pub player_pos: Vec2F,
    pub player_alive: bool,
    pub obstacles: &'a ObstacleField,
    pub hazards: &'a HazardField,
    pub physics: &'a mut PhysicsWorld,
    pub rng: &'a mut SimRng,
    pub events: &'a mut EventQueue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WolfManager {
    wolves: Vec<Option<Wolf>>,
    packs: Vec<Option<Pack>>,
    vocals: VocalQueue,
    pub tuning: PackTuning,
}

impl WolfManager {
    pub fn new(tuning: PackTuning) -> WolfManager {
        WolfManager {
            wolves: Vec::new(),
            packs: Vec::new(),
            vocals: VocalQueue::new(),
            tuning,
        }
    }

    // -- arena ------------------------------------------------------------

    pub fn wolf(&self, id: u32) -> Option<&Wolf> {
        self.wolves.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn wolf_mut(&mut self, id: u32) -> Option<&mut Wolf> {
        self.wolves.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    pub fn wolves(&self) -> impl Iterator<Item = &Wolf> {
        self.wolves.iter().filter_map(|s| s.as_ref())
    }

    pub fn count(&self) -> usize {
        self.wolves.iter().filter(|s| s.is_some()).count()
    }

    pub fn pack(&self, pack_id: u32) -> Option<&Pack> {
        if pack_id == 0 {
            return None;
        }
        self.packs
            .get((pack_id - 1) as usize)
            .and_then(|s| s.as_ref())
    }

    pub fn pack_mut(&mut self, pack_id: u32) -> Option<&mut Pack> {
        if pack_id == 0 {
            return None;
        }
        self.packs
            .get_mut((pack_id - 1) as usize)
            .and_then(|s| s.as_mut())
    }

    pub fn packs(&self) -> impl Iterator<Item = &Pack> {
        self.packs.iter().filter_map(|s| s.as_ref())
    }

    /// Spawn a wolf, create its physics body, and fold it into a nearby
    /// pack (or a new one). Returns [`INVALID_ID`] when the arena is full.
    pub fn spawn_wolf(
        &mut self,
        wolf_type: WolfType,
        pos: Vec2F,
        physics: &mut PhysicsWorld,
    ) -> u32 {
        let slot = match self.wolves.iter().position(|s| s.is_none()) {
            Some(i) => i,
            None if self.wolves.len() < MAX_WOLVES => {
                self.wolves.push(None);
                self.wolves.len() - 1
            }
            None => {
                log::warn!("wolf arena full ({})", MAX_WOLVES);
                return INVALID_ID;
            }
        };
        let id = slot as u32;
        let mut wolf = Wolf::new(id, wolf_type, pos);

        let cfg = physics.config;
        let body_pos = Vec3F::new(cfg.to_physics_x(pos.x), cfg.to_physics_y(pos.y), Fixed::ZERO);
        let body_radius = wolf_radius() * cfg.span_x();
        let body_id = physics.create_body(BodyKind::Dynamic, body_pos, Fixed::ONE, body_radius);
        if body_id != INVALID_ID {
            if let Some(body) = physics.get_mut(body_id) {
                body.layer = layers::ENEMY;
                body.mask = layers::PLAYER | layers::ENEMY | layers::OBSTACLE | layers::BARREL;
            }
        }
        wolf.body_id = body_id;
        wolf.pack_id = self.join_or_form_pack(id, pos);
        self.wolves[slot] = Some(wolf);
        id
    }

    /// Join the first pack with a member inside join distance, else open a
    /// new pack. Pack ids are 1-based; 0 means packless.
    fn join_or_form_pack(&mut self, wolf_id: u32, pos: Vec2F) -> u32 {
        let join_distance = self.tuning.join_distance;
        let mut joined: Option<usize> = None;
        for (i, slot) in self.packs.iter().enumerate() {
            let Some(pack) = slot else { continue };
            let near = pack.member_ids.iter().any(|&m| {
                self.wolf(m)
                    .map(|w| w.pos.distance(pos) <= join_distance)
                    .unwrap_or(false)
            });
            if near {
                joined = Some(i);
                break;
            }
        }
        if let Some(i) = joined {
            if let Some(pack) = self.packs[i].as_mut() {
                pack.add_member(wolf_id);
            }
            return (i + 1) as u32;
        }
        // Open a new pack.
        let slot = match self.packs.iter().position(|s| s.is_none()) {
            Some(i) => i,
            None if self.packs.len() < MAX_PACKS => {
                self.packs.push(None);
                self.packs.len() - 1
            }
            None => return 0,
        };
        let pack_id = (slot + 1) as u32;
        let mut pack = Pack::new(pack_id);
        pack.add_member(wolf_id);
        self.packs[slot] = Some(pack);
        pack_id
    }

    /// Damage a wolf; knockback goes through its body. Returns the wolf type
    /// when this kills it (loot hooks run off that).
    pub fn apply_damage(
        &mut self,
        wolf_id: u32,
        damage: Fixed,
        knockback_dir: Vec2F,
        knockback: Fixed,
        now: Fixed,
        physics: &mut PhysicsWorld,
        events: &mut EventQueue,
    ) -> Option<WolfType> {
        let Some(wolf) = self.wolf_mut(wolf_id) else {
            return None;
        };
        wolf.hp = (wolf.hp - damage).max(Fixed::ZERO);
        wolf.last_hurt_at = now;
        let body_id = wolf.body_id;
        let dead = wolf.hp.is_zero();
        let wolf_type = wolf.wolf_type;
        let pack_id = wolf.pack_id;
        events.push(SimEvent::WolfDamaged {
            wolf_id,
            amount: damage,
        });

        if body_id != INVALID_ID {
            if let Some(body) = physics.get_mut(body_id) {
                body.add_impulse(Vec3F::from_xy(knockback_dir.normalize_or_x().scale(knockback)));
            }
        }

        if !dead {
            return None;
        }
        self.remove_wolf(wolf_id, physics);
        events.push(SimEvent::WolfDied { wolf_id });

        // Pack fallout: losing a member can break the plan.
        if let Some(pack) = self.pack_mut(pack_id) {
            pack.remove_member(wolf_id);
            let next = if pack.morale < Fixed::from_ratio(25, 100) {
                PackPlan::Retreat
            } else {
                PackPlan::Regroup
            };
            if pack.is_alive() {
                if let Some(plan) = pack.force_plan(next, now) {
                    events.push(SimEvent::PackPlanChanged {
                        pack_id,
                        plan: plan as u8,
                    });
                }
            }
        }
        Some(wolf_type)
    }

    fn remove_wolf(&mut self, wolf_id: u32, physics: &mut PhysicsWorld) {
        if let Some(slot) = self.wolves.get_mut(wolf_id as usize) {
            if let Some(wolf) = slot.take() {
                if wolf.body_id != INVALID_ID {
                    physics.destroy_body(wolf.body_id);
                }
            }
        }
    }

    /// Stun a wolf (parried attacker).
    pub fn stun_wolf(&mut self, wolf_id: u32, until: Fixed) {
        if let Some(wolf) = self.wolf_mut(wolf_id) {
            wolf.stunned_until = until;
        }
    }

    /// Report how the player answered a wolf's attack, feeding the pack's
    /// skill estimate.
    pub fn notify_attack_result(&mut self, wolf_id: u32, defended: bool, now: Fixed) {
        let Some(pack_id) = self.wolf(wolf_id).map(|w| w.pack_id) else {
            return;
        };
        let tuning = self.tuning;
        if let Some(pack) = self.pack_mut(pack_id) {
            pack.record_attack_result(defended, now, &tuning);
        }
    }

    // -- snapshot plumbing ------------------------------------------------

    pub fn wolf_slots(&self) -> &[Option<Wolf>] {
        &self.wolves
    }

    pub fn pack_slots(&self) -> &[Option<Pack>] {
        &self.packs
    }

    pub fn vocal_queue(&self) -> &VocalQueue {
        &self.vocals
    }

    pub fn restore(
        &mut self,
        wolves: Vec<Option<Wolf>>,
        packs: Vec<Option<Pack>>,
        vocals: VocalQueue,
    ) {
        self.wolves = wolves;
        self.packs = packs;
        self.vocals = vocals;
    }

    pub fn clear(&mut self, physics: &mut PhysicsWorld) {
        let ids: Vec<u32> = self.wolves().map(|w| w.id).collect();
        for id in ids {
            self.remove_wolf(id, physics);
        }
        self.packs.clear();
        self.vocals = VocalQueue::new();
    }

    // -- the tick ---------------------------------------------------------

    /// One AI tick. Returns the attacks thrown at the player this frame.
    pub fn tick(&mut self, ctx: &mut WolfCtx<'_>) -> Vec<WolfAttack> {
        self.apply_vocal_reactions(ctx.now);
        self.evaluate_packs(ctx);

        let mut attacks = Vec::new();
        let ids: Vec<u32> = self.wolves().map(|w| w.id).collect();
        for id in ids {
            self.tick_wolf(id, ctx, &mut attacks);
        }
        attacks
    }

    /// React to everything vocalized last frame.
    fn apply_vocal_reactions(&mut self, now: Fixed) {
        let vocals = self.vocals.drain();
        for vocal in vocals {
            match vocal.kind {
                VocalKind::WhineDistress => {
                    // Only the nearest ally responds.
                    let nearest = self
                        .wolves()
                        .filter(|w| w.id != vocal.wolf_id)
                        .filter(|w| w.pos.distance(vocal.source_pos) <= vocal.range)
                        .min_by_key(|w| (w.pos.distance(vocal.source_pos), w.id));
                    if let Some(id) = nearest.map(|w| w.id) {
                        if let Some(wolf) = self.wolf_mut(id) {
                            wolf.memory.last_seen_player_pos = Some(vocal.source_pos);
                            wolf.memory.noticed_at = now;
                            wolf.enter_state(WolfState::Seek, now);
                        }
                    }
                }
                _ => {
                    let ids: Vec<u32> = self
                        .wolves()
                        .filter(|w| w.id != vocal.wolf_id)
                        .filter(|w| w.pos.distance(vocal.source_pos) <= vocal.range)
                        .map(|w| w.id)
                        .collect();
                    for id in ids {
                        let Some(wolf) = self.wolf_mut(id) else { continue };
                        match vocal.kind {
                            VocalKind::HowlRally => {
                                wolf.memory.last_seen_player_pos = Some(vocal.source_pos);
                                wolf.memory.noticed_at = now;
                                if wolf.state != WolfState::Flee {
                                    wolf.enter_state(WolfState::Seek, now);
                                }
                            }
                            VocalKind::HowlHunt => {
                                wolf.aggression =
                                    (wolf.aggression + Fixed::from_ratio(10, 100)).min(Fixed::ONE);
                                wolf.coordination =
                                    (wolf.coordination + Fixed::from_ratio(10, 100)).min(Fixed::ONE);
                            }
                            VocalKind::BarkAlert => {
                                if wolf.state == WolfState::Idle || wolf.state == WolfState::Prowl {
                                    wolf.memory.last_seen_player_pos = Some(vocal.source_pos);
                                    wolf.memory.noticed_at = now;
                                    wolf.enter_state(WolfState::Seek, now);
                                }
                            }
                            VocalKind::GrowlWarn => {
                                wolf.aggression = (wolf.aggression
                                    - Fixed::from_ratio(5, 100))
                                .max(Fixed::ZERO);
                            }
                            VocalKind::YipVictory => {
                                wolf.morale =
                                    (wolf.morale + Fixed::from_ratio(10, 100)).min(Fixed::ONE);
                            }
                            VocalKind::WhineDistress => unreachable!("handled above"),
                        }
                    }
                }
            }
        }
    }

    /// Pack plan evaluation; role assignment and the rally signal fire on a
    /// Commit entry.
    fn evaluate_packs(&mut self, ctx: &mut WolfCtx<'_>) {
        let tuning = self.tuning;
        for pack_index in 0..self.packs.len() {
            let Some(pack) = self.packs[pack_index].as_ref() else {
                continue;
            };
            if !pack.is_alive() {
                continue;
            }
            let pack_id = pack.id;
            // Aggregate member senses in id order.
            let mut count = 0;
            let mut hp_sum = Fixed::ZERO;
            let mut stamina_sum = Fixed::ZERO;
            let mut visible = false;
            let mut candidates: Vec<(u32, Fixed, Fixed)> = Vec::new();
            for &member in &pack.member_ids {
                let Some(wolf) = self.wolf(member) else { continue };
                count += 1;
                hp_sum += wolf.hp / wolf.wolf_type.max_hp();
                stamina_sum += wolf.stamina;
                visible |= wolf.memory.last_seen_player_pos.is_some()
                    && ctx.now - wolf.memory.noticed_at < Fixed::from_int(3);
                candidates.push((wolf.id, wolf.hp, wolf.coordination));
            }
            if count == 0 {
                continue;
            }
            let denom = Fixed::from_int(count);
            let senses = PackSenses {
                member_count: count as usize,
                avg_hp: hp_sum / denom,
                avg_stamina: stamina_sum / denom,
                terrain_pressure: if ctx.hazards.repels_enemies_at(ctx.player_pos) {
                    Fixed::HALF
                } else {
                    Fixed::ZERO
                },
                player_visible: visible && ctx.player_alive,
            };

            let transition = self.packs[pack_index]
                .as_mut()
                .and_then(|p| p.evaluate_plan(ctx.now, &senses, &tuning));
            let Some(new_plan) = transition else { continue };
            ctx.events.push(SimEvent::PackPlanChanged {
                pack_id,
                plan: new_plan as u8,
            });

            if new_plan == PackPlan::Commit {
                let assignments = self.packs[pack_index]
                    .as_mut()
                    .map(|p| p.assign_roles(&candidates))
                    .unwrap_or_default();
                let leader = self.packs[pack_index]
                    .as_ref()
                    .map(|p| p.leader_id)
                    .unwrap_or(INVALID_ID);
                for (wolf_id, role) in assignments {
                    if let Some(wolf) = self.wolf_mut(wolf_id) {
                        wolf.role = role;
                    }
                }
                // The leader announces the commit.
                if let Some(pos) = self.wolf(leader).map(|w| w.pos) {
                    self.emit_vocal(leader, VocalKind::HowlRally, pos, ctx);
                    if let Some(wolf) = self.wolf_mut(leader) {
                        wolf.enter_state(WolfState::Howl, ctx.now);
                    }
                }
            }
        }
    }

    fn emit_vocal(&mut self, wolf_id: u32, kind: VocalKind, pos: Vec2F, ctx: &mut WolfCtx<'_>) {
        let cooldown = self.tuning.vocal_cooldown;
        let Some(wolf) = self.wolf_mut(wolf_id) else { return };
        if ctx.now - wolf.last_vocal_at < cooldown {
            return;
        }
        wolf.last_vocal_at = ctx.now;
        let vocal = Vocalization {
            kind,
            source_pos: pos,
            range: kind.range(),
            intensity: Fixed::ONE,
            timestamp: ctx.now,
            wolf_id,
        };
        if self.vocals.push(vocal) {
            ctx.events.push(SimEvent::Vocalization {
                wolf_id,
                kind: kind as u8,
                position: pos,
            });
        }
    }

    /// Perception, emotion, state transitions, movement, attack emission for
    /// one wolf.
    fn tick_wolf(&mut self, id: u32, ctx: &mut WolfCtx<'_>, attacks: &mut Vec<WolfAttack>) {
        let tuning = self.tuning;
        let (pack_plan, pack_alive) = {
            let pack = self.wolf(id).and_then(|w| self.pack(w.pack_id));
            (
                pack.map(|p| p.plan),
                pack.map(|p| p.member_ids.len() > 1).unwrap_or(false),
            )
        };

        let Some(wolf) = self.wolf_mut(id) else { return };
        let now = ctx.now;

        // Reconcile with physics: the body absorbed knockback/collisions.
        if wolf.body_id != INVALID_ID {
            if let Some(body) = ctx.physics.get(wolf.body_id) {
                let cfg = ctx.physics.config;
                wolf.pos = Vec2F::new(
                    cfg.to_normalized_x(body.position.x),
                    cfg.to_normalized_y(body.position.y),
                );
            }
        }

        // Perception: distance + line of sight into memory.
        let to_player = ctx.player_pos.sub(wolf.pos);
        let dist = to_player.length();
        let sees_player = ctx.player_alive
            && dist <= tuning.notice_distance
            && !ctx.obstacles.blocks_ray(wolf.pos, ctx.player_pos);
        let first_notice = sees_player && wolf.memory.last_seen_player_pos.is_none();
        if sees_player {
            wolf.memory.last_seen_player_pos = Some(ctx.player_pos);
            wolf.memory.noticed_at = now;
        }

        // Emotion.
        let pack_committed =
            matches!(pack_plan, Some(PackPlan::Commit) | Some(PackPlan::Harass));
        wolf.update_emotion(now, pack_alive, pack_committed);

        let stunned = now < wolf.stunned_until;

        // Plan evaluation (state transitions).
        if !stunned {
            let prev_state = wolf.state;
            self.transition_wolf(id, ctx, dist, sees_player, pack_plan);
            if let Some(wolf) = self.wolf(id) {
                if wolf.state != prev_state {
                    ctx.events.push(SimEvent::WolfStateChanged {
                        wolf_id: id,
                        state: wolf.state as u8,
                    });
                }
            }
        }

        // First sighting barks an alert to the rest of the pack.
        if first_notice {
            let pos = self.wolf(id).map(|w| w.pos).unwrap_or(Vec2F::ZERO);
            self.emit_vocal(id, VocalKind::BarkAlert, pos, ctx);
        }

        // Movement + attack.
        self.move_wolf(id, ctx, stunned, attacks);
    }

    /// State edges per the wolf FSM.
    fn transition_wolf(
        &mut self,
        id: u32,
        ctx: &mut WolfCtx<'_>,
        dist: Fixed,
        sees_player: bool,
        pack_plan: Option<PackPlan>,
    ) {
        let tuning = self.tuning;
        let Some(wolf) = self.wolf_mut(id) else { return };
        let now = ctx.now;

        // Terror overrides everything.
        if wolf.terror_triggered() {
            wolf.enter_state(WolfState::Flee, now);
            return;
        }

        match wolf.state {
            WolfState::Idle => {
                if sees_player {
                    wolf.enter_state(WolfState::Seek, now);
                } else if wolf.time_in_state(now) >= Fixed::TWO {
                    // Ambient wandering with a jittered start.
                    if ctx.rng.next_below(RngScope::Ai, 100) < 3 {
                        wolf.enter_state(WolfState::Prowl, now);
                    }
                }
            }
            WolfState::Prowl => {
                if sees_player {
                    wolf.enter_state(WolfState::Seek, now);
                } else if wolf.time_in_state(now) >= Fixed::from_int(4) {
                    wolf.enter_state(WolfState::Idle, now);
                }
            }
            WolfState::Seek => {
                if wolf.should_retreat(&tuning) {
                    wolf.enter_state(WolfState::Retreat, now);
                } else if sees_player && dist <= tuning.circle_distance {
                    wolf.enter_state(WolfState::Circle, now);
                } else if !sees_player
                    && now - wolf.memory.noticed_at > Fixed::from_int(6)
                {
                    wolf.memory.last_seen_player_pos = None;
                    wolf.enter_state(WolfState::Idle, now);
                }
            }
            WolfState::Circle => {
                if wolf.should_retreat(&tuning) {
                    wolf.enter_state(WolfState::Retreat, now);
                } else if dist > tuning.notice_distance {
                    wolf.enter_state(WolfState::Seek, now);
                } else {
                    // Strike when the pack harasses, or alone on an
                    // aggression roll once ready.
                    let pack_go = pack_plan == Some(PackPlan::Harass);
                    let lone_go = pack_plan.is_none()
                        && now >= wolf.attack_ready_at
                        && ctx.rng.next_unit(RngScope::Ai) < wolf.aggression * Fixed::from_ratio(5, 100);
                    if pack_go || lone_go {
                        wolf.enter_state(WolfState::Harass, now);
                    }
                }
            }
            WolfState::Harass => {
                if wolf.should_retreat(&tuning) {
                    wolf.enter_state(WolfState::Retreat, now);
                } else if pack_plan == Some(PackPlan::Retreat)
                    || pack_plan == Some(PackPlan::Regroup)
                {
                    wolf.enter_state(WolfState::Circle, now);
                } else if wolf.time_in_state(now) >= Fixed::from_int(2)
                    && pack_plan != Some(PackPlan::Harass)
                {
                    wolf.enter_state(WolfState::Circle, now);
                }
            }
            WolfState::Retreat => {
                let recovered = wolf.stamina > Fixed::from_ratio(60, 100)
                    && wolf.hp / wolf.wolf_type.max_hp() > tuning.retreat_health;
                if recovered && wolf.time_in_state(now) >= Fixed::TWO {
                    if wolf.memory.last_seen_player_pos.is_some() {
                        wolf.enter_state(WolfState::Seek, now);
                    } else {
                        wolf.enter_state(WolfState::Idle, now);
                    }
                }
            }
            WolfState::Howl => {
                if wolf.time_in_state(now) >= Fixed::ONE {
                    wolf.enter_state(WolfState::Seek, now);
                }
            }
            WolfState::Flee => {
                if !wolf.terror_triggered() && wolf.time_in_state(now) >= Fixed::from_int(5) {
                    wolf.enter_state(WolfState::Idle, now);
                }
            }
        }
    }

    /// Velocity per state, hazard avoidance, obstacle resolution, physics
    /// write-back, and Harass attack emission.
    fn move_wolf(
        &mut self,
        id: u32,
        ctx: &mut WolfCtx<'_>,
        stunned: bool,
        attacks: &mut Vec<WolfAttack>,
    ) {
        let tuning = self.tuning;
        let Some(wolf) = self.wolf_mut(id) else { return };
        let now = ctx.now;
        let dt = ctx.dt;
        let speed = base_wolf_speed() * wolf.wolf_type.speed_mult();
        let to_player = ctx.player_pos.sub(wolf.pos);
        let dist = to_player.length();

        let mut desired = Vec2F::ZERO;
        if !stunned {
            desired = match wolf.state {
                WolfState::Idle | WolfState::Howl => Vec2F::ZERO,
                WolfState::Prowl => {
                    // Wander: re-roll a heading every ~1.5s.
                    if wolf.time_in_state(now).raw() % Fixed::from_ratio(3, 2).raw() < dt.raw() {
                        wolf.circle_phase = ctx.rng.next_unit(RngScope::Ai);
                    }
                    Vec2F::new(
                        wolf.circle_phase.cos_turns(),
                        wolf.circle_phase.sin_turns(),
                    )
                    .scale(speed * Fixed::from_ratio(40, 100))
                }
                WolfState::Seek => {
                    let target = wolf.memory.last_seen_player_pos.unwrap_or(ctx.player_pos);
                    target.sub(wolf.pos).normalize().scale(speed)
                }
                WolfState::Circle => {
                    // Orbit: advance the phase, flankers offset a quarter
                    // turn, direction alternates by id parity.
                    let spin = if wolf.id % 2 == 0 {
                        Fixed::from_ratio(12, 100)
                    } else {
                        -Fixed::from_ratio(12, 100)
                    };
                    wolf.circle_phase += spin * dt;
                    let mut phase = wolf.circle_phase;
                    if wolf.role == PackRole::Flanker {
                        phase += Fixed::from_ratio(25, 100);
                    }
                    let orbit_r = if wolf.role == PackRole::Support {
                        tuning.circle_radius * Fixed::from_ratio(150, 100)
                    } else {
                        tuning.circle_radius
                    };
                    let target = ctx.player_pos.add(Vec2F::new(
                        phase.cos_turns() * orbit_r,
                        phase.sin_turns() * orbit_r,
                    ));
                    target.sub(wolf.pos).normalize().scale(speed)
                }
                WolfState::Harass => {
                    wolf.stamina = (wolf.stamina - Fixed::from_ratio(10, 100) * dt).max(Fixed::ZERO);
                    to_player
                        .normalize()
                        .scale(speed * Fixed::from_ratio(130, 100))
                }
                WolfState::Retreat => {
                    wolf.stamina = (wolf.stamina + Fixed::from_ratio(25, 100) * dt).min(Fixed::ONE);
                    to_player
                        .normalize()
                        .scale(-speed * Fixed::from_ratio(110, 100))
                }
                WolfState::Flee => to_player
                    .normalize()
                    .scale(-speed * Fixed::from_ratio(150, 100)),
            };
            // Stamina drifts back outside of harassment.
            if wolf.state != WolfState::Harass && wolf.state != WolfState::Retreat {
                wolf.stamina = (wolf.stamina + Fixed::from_ratio(15, 100) * dt).min(Fixed::ONE);
            }
        }

        // Hazard avoidance: refuse to walk into repelling ground.
        if !desired.is_zero() {
            let ahead = wolf.pos.add(desired.scale(dt * Fixed::from_int(8)));
            if ctx.hazards.repels_enemies_at(ahead) {
                desired = desired.perp();
            }
        }

        wolf.vel = desired;
        if !desired.is_zero() {
            wolf.facing = desired.normalize_or_x();
        }
        let next = ctx
            .obstacles
            .resolve_circle(wolf.pos.add(wolf.vel.scale(dt)), wolf_radius());
        wolf.pos = Vec2F::new(
            next.x.clamp(Fixed::ZERO, Fixed::ONE),
            next.y.clamp(Fixed::ZERO, Fixed::ONE),
        );

        // Push intent into the body; physics applies it next frame.
        if wolf.body_id != INVALID_ID {
            let cfg = ctx.physics.config;
            let body_pos = Vec3F::new(
                cfg.to_physics_x(wolf.pos.x),
                cfg.to_physics_y(wolf.pos.y),
                Fixed::ZERO,
            );
            let body_vel = Vec3F::new(
                wolf.vel.x * cfg.span_x(),
                wolf.vel.y * cfg.span_y(),
                Fixed::ZERO,
            );
            if let Some(body) = ctx.physics.get_mut(wolf.body_id) {
                body.position = body_pos;
                body.velocity = body_vel;
                if !body_vel.is_zero() {
                    body.wake();
                }
            }
        }

        // Bite when harassing in reach.
        if !stunned
            && wolf.state == WolfState::Harass
            && now >= wolf.attack_ready_at
            && dist <= tuning.attack_range
        {
            wolf.attack_ready_at = now + Fixed::from_ratio(12, 10);
            wolf.stamina = (wolf.stamina - Fixed::from_ratio(8, 100)).max(Fixed::ZERO);
            attacks.push(WolfAttack {
                wolf_id: id,
                attack: IncomingAttack {
                    origin: wolf.pos,
                    dir: to_player.normalize_or_x(),
                    damage: wolf.wolf_type.attack_damage(),
                    poise_damage: Fixed::from_ratio(40, 100),
                    range: tuning.attack_range * Fixed::from_ratio(150, 100),
                },
            });
        }
    }
}

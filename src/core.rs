//! The coordinator: one `Core` aggregate owning every manager, advanced by
//! `update(dt)` in a fixed order.
//!
//! Frame order: input edges -> combat -> player (movement, abilities) ->
//! physics (forces, integrate, resolve) -> stage hazards -> wolves + packs
//! -> game state -> event drain. Nothing else mutates state, so two peers
//! stepping identical inputs from the same seed stay byte-identical.

use std::collections::BTreeMap;

use crate::combat::{AttackType, CombatManager, OUTCOME_HIT, OUTCOME_IGNORE};
use crate::config::{self, INVALID_ID, SimConfig, WeaponType};
use crate::diagnostics::DiagCounters;
use crate::events::{DamageSource, EventQueue, SimEvent};
use crate::input::{BufferedAction, Hand, InputEdges, InputFrame, InputManager};
use crate::math::{Fixed, Vec2F, Vec3F};
use crate::physics::{BodyKind, ForcePropagator, PhysicsWorld, layers};
use crate::player::{CharacterType, PlayerManager};
use crate::rng::{RngScope, SimRng};
use crate::terrain::{HazardField, ObstacleField};
use crate::wolves::{WolfCtx, WolfManager, WolfType};
use crate::game_state::{GameState, Phase};

/// Obstacles rolled per room.
const ROOM_OBSTACLES: usize = 6;
/// Hazards rolled per room.
const ROOM_HAZARDS: usize = 4;

pub struct Core {
    pub config: SimConfig,
    pub(crate) rng: SimRng,
    /// Sim clock, seconds since `init_run`.
    pub(crate) time: Fixed,
    pub(crate) input: InputManager,
    pub combat: CombatManager,
    pub player: PlayerManager,
    pub physics: PhysicsWorld,
    pub forces: ForcePropagator,
    pub obstacles: ObstacleField,
    pub hazards: HazardField,
    pub wolves: WolfManager,
    pub state: GameState,
    pub events: EventQueue,
    pub diag: DiagCounters,
    /// Last-known input per peer, for rollback input prediction.
    pub(crate) last_inputs: BTreeMap<u8, InputFrame>,
    pub(crate) local_player: u8,
    run_seed: u64,
    /// Events drained at the end of the previous frame, for the host.
    frame_events: Vec<SimEvent>,
}

impl Core {
    pub fn new(config: SimConfig) -> Core {
        let physics = PhysicsWorld::new(config.physics);
        let wolves = WolfManager::new(config.pack);
        Core {
            config,
            rng: SimRng::new(0),
            time: Fixed::ZERO,
            input: InputManager::new(),
            combat: CombatManager::new(WeaponType::Fists),
            player: PlayerManager::new(CharacterType::None),
            physics,
            forces: ForcePropagator::new(),
            obstacles: ObstacleField::new(),
            hazards: HazardField::new(),
            wolves,
            state: GameState::new(),
            events: EventQueue::new(),
            diag: DiagCounters::default(),
            last_inputs: BTreeMap::new(),
            local_player: 0,
            run_seed: 0,
            frame_events: Vec::new(),
        }
    }

    /// Initialize a run: seed the RNG, roll the room, spawn the player body.
    /// Phase starts at Explore, frame 0.
    pub fn init_run(&mut self, seed: u64, start_weapon: u32, character: u32) {
        self.run_seed = seed;
        self.rng = SimRng::new(seed);
        self.time = Fixed::ZERO;
        self.input = InputManager::new();
        self.combat = CombatManager::new(WeaponType::from_u32(start_weapon));
        self.player = PlayerManager::new(CharacterType::from_u32(character));
        self.physics = PhysicsWorld::new(self.config.physics);
        self.forces = ForcePropagator::new();
        self.wolves = WolfManager::new(self.config.pack);
        self.state = GameState::new();
        self.events = EventQueue::new();
        self.last_inputs.clear();
        self.frame_events.clear();

        let spawn = self.player.pos;
        self.obstacles.generate(&mut self.rng, ROOM_OBSTACLES, spawn);
        self.hazards.generate(
            &mut self.rng,
            self.state.biome,
            ROOM_HAZARDS,
            spawn,
            &self.obstacles,
            self.time,
        );

        let cfg = self.physics.config;
        let body_pos = Vec3F::new(
            cfg.to_physics_x(spawn.x),
            cfg.to_physics_y(spawn.y),
            Fixed::ZERO,
        );
        let body_radius = config::player_radius() * cfg.span_x();
        let body_id =
            self.physics
                .create_body(BodyKind::Dynamic, body_pos, Fixed::from_int(4), body_radius);
        if let Some(body) = self.physics.get_mut(body_id) {
            body.layer = layers::PLAYER;
            body.mask = layers::ENEMY | layers::OBSTACLE | layers::BARREL;
        }
        self.player.body_id = body_id;
    }

    /// Re-initialize preserving configuration, weapon and character.
    pub fn reset_run(&mut self, seed: u64) {
        let weapon = self.combat.weapon as u32;
        let character = self.player.character as u32;
        self.init_run(seed, weapon, character);
    }

    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    pub(crate) fn set_run_seed(&mut self, seed: u64) {
        self.run_seed = seed;
    }

    pub fn now(&self) -> Fixed {
        self.time
    }

    pub fn frame(&self) -> u32 {
        self.state.frame
    }

    /// Events produced by the most recent frame.
    pub fn frame_events(&self) -> &[SimEvent] {
        &self.frame_events
    }

    // -- input ------------------------------------------------------------

    /// Store the local player's input for the next frame. Floats are
    /// clamped; repairs are counted, never propagated.
    #[allow(clippy::too_many_arguments)]
    pub fn set_player_input(
        &mut self,
        move_x: f32,
        move_y: f32,
        left_hand: bool,
        right_hand: bool,
        special: bool,
        roll: bool,
        jump: bool,
        light_attack: bool,
        heavy_attack: bool,
        block: bool,
    ) {
        let (frame, clamped) = InputFrame::sanitize(
            move_x,
            move_y,
            left_hand,
            right_hand,
            special,
            roll,
            jump,
            light_attack,
            heavy_attack,
            block,
        );
        if clamped > 0 {
            log::debug!("clamped {} input component(s)", clamped);
            self.diag.clamped_inputs += clamped;
        }
        self.input.set_pending(frame);
        self.last_inputs.insert(self.local_player, frame);
    }

    /// Rollback entry point: one update with a per-player input map. Peers
    /// missing from the map replay their last-known input.
    pub fn advance_frame(&mut self, inputs: &[(u8, InputFrame)], dt: Fixed) {
        for &(player, frame) in inputs {
            self.last_inputs.insert(player, frame);
        }
        let local = self
            .last_inputs
            .get(&self.local_player)
            .copied()
            .unwrap_or_default();
        self.input.set_pending(local);
        self.update(dt);
    }

    // -- the frame --------------------------------------------------------

    /// Advance one fixed timestep.
    pub fn update(&mut self, dt: Fixed) {
        self.time += dt;
        let now = self.time;

        // 1. Input edges.
        let shielded = config::weapon_def(self.combat.weapon).shielded;
        let edges = self.input.begin_frame(now, shielded);

        // 2. Combat consumes edges (and the action buffer).
        self.consume_edges(&edges, now);
        self.combat.update(now, self.player.stamina);

        // 3. Player movement and abilities.
        let input = *self.input.current();
        let pre_move_pos = self.player.pos;
        self.player
            .update_movement(now, dt, &input, &self.combat, &mut self.events);
        if let Some(bash) = self
            .player
            .update_abilities(now, dt, &input, &self.combat)
        {
            self.resolve_bash(bash, now);
        }

        // 4. Physics: push player intent in, step, reconcile back. The body
        // integrates from the pre-step position, so it is the one
        // integration that sticks.
        self.sync_player_body_in(pre_move_pos);
        let barrel_ids: Vec<u32> = self
            .state
            .barrels()
            .iter()
            .flatten()
            .map(|b| b.body_id)
            .collect();
        self.forces
            .apply_rolling(&mut self.physics, &barrel_ids, Fixed::from_int(10));
        self.forces
            .step(&mut self.physics, self.obstacles.obstacles(), dt, &mut self.events);
        self.physics.step(dt, &mut self.events);
        self.sync_player_body_out();

        // Player swing hits wolves during Active frames.
        self.resolve_player_swing(now);

        // 5. Stage hazards.
        let invulnerable = self.combat.is_invulnerable() || self.player.dash_invulnerable(now);
        let outcome = self.hazards.update_player(
            now,
            self.player.pos,
            config::player_radius(),
            invulnerable,
            &mut self.events,
        );
        if outcome.damage > Fixed::ZERO {
            self.player
                .apply_damage(outcome.damage, DamageSource::Hazard(0), &mut self.events);
        }
        for status in outcome.statuses.into_iter().flatten() {
            self.player.apply_status(status, now);
        }

        // 6. Wolves and packs.
        let attacks = {
            let mut ctx = WolfCtx {
                now,
                dt,
                player_pos: self.player.pos,
                player_alive: self.player.is_alive(),
                obstacles: &self.obstacles,
                hazards: &self.hazards,
                physics: &mut self.physics,
                rng: &mut self.rng,
                events: &mut self.events,
            };
            self.wolves.tick(&mut ctx)
        };
        for wolf_attack in attacks {
            self.resolve_wolf_attack(wolf_attack, now);
        }

        // 7. Game state and phase auto-transitions.
        self.state.update(
            now,
            self.wolves.count(),
            self.player.is_alive(),
            &mut self.events,
        );

        // 8. Drain the frame's events for the host.
        self.diag.events_dropped += self.events.dropped();
        self.frame_events = self.events.drain();
    }

    /// Route input edges into combat and abilities.
    fn consume_edges(&mut self, edges: &InputEdges, now: Fixed) {
        // Blocking first: it gates feints and parries.
        if edges.block_pressed {
            let ok = self
                .combat
                .set_blocking(true, self.player.facing, now, &mut self.player.stamina);
            if !ok {
                self.diag.rejected_actions += 1;
            }
        }
        if edges.block_released {
            self.combat
                .set_blocking(false, self.player.facing, now, &mut self.player.stamina);
        }
        if edges.shield_tap {
            self.combat.shield_tap(now);
        }

        if edges.jump && !self.player.try_jump(now) {
            self.diag.rejected_actions += 1;
        }

        if let Some(hand) = edges.light {
            self.try_attack(AttackType::Light, hand, now, true);
        }
        if let Some(hand) = edges.heavy {
            self.try_attack(AttackType::Heavy, hand, now, true);
        }
        if edges.special {
            self.dispatch_special(now, true);
        }
        if edges.roll {
            self.try_roll(now, true);
        }

        // Retry one buffered action once combat is free.
        if self.combat.can_attack() {
            if let Some(action) = self.input.take_buffered(now) {
                match action {
                    BufferedAction::Light(hand) => {
                        self.try_attack(AttackType::Light, hand, now, false);
                    }
                    BufferedAction::Heavy(hand) => {
                        self.try_attack(AttackType::Heavy, hand, now, false);
                    }
                    BufferedAction::Special => self.dispatch_special(now, false),
                    BufferedAction::Roll => self.try_roll(now, false),
                }
            }
        }
    }

    fn try_attack(&mut self, attack: AttackType, hand: Hand, now: Fixed, buffer_on_fail: bool) {
        let ok = self.combat.start_attack(
            attack,
            hand,
            now,
            &mut self.player.stamina,
            self.player.facing,
            &mut self.events,
        );
        if !ok {
            if buffer_on_fail && !self.combat.can_attack() {
                let action = match attack {
                    AttackType::Light => BufferedAction::Light(hand),
                    AttackType::Heavy => BufferedAction::Heavy(hand),
                    AttackType::Special => BufferedAction::Special,
                };
                self.input.buffer_action(action, now);
            } else {
                self.diag.rejected_actions += 1;
            }
        }
    }

    fn try_roll(&mut self, now: Fixed, buffer_on_fail: bool) {
        // Kensei turns the roll gesture into a flow dash when available.
        if self.player.character == CharacterType::Kensei {
            let dir = self.roll_direction();
            if self.player.start_flow_dash(dir, now, &self.combat) {
                return;
            }
        }
        let dir = self.roll_direction();
        if !self
            .combat
            .start_roll(dir, now, &mut self.player.stamina)
        {
            if buffer_on_fail && self.combat.is_rolling() {
                self.input.buffer_action(BufferedAction::Roll, now);
            } else {
                self.diag.rejected_actions += 1;
            }
        }
    }

    fn roll_direction(&self) -> Vec2F {
        let move_dir = self.input.current().move_dir();
        if move_dir.is_zero() {
            self.player.facing
        } else {
            move_dir
        }
    }

    /// Character-specific special dispatch; plain special attack otherwise.
    fn dispatch_special(&mut self, now: Fixed, buffer_on_fail: bool) {
        match self.player.character {
            CharacterType::Warden => {
                if !self.player.start_bash_charge(&self.combat) {
                    self.diag.rejected_actions += 1;
                }
            }
            CharacterType::Raider => {
                if self.player.berserker.active {
                    self.player.cancel_berserker();
                } else if !self.player.start_berserker(now, &self.combat) {
                    self.diag.rejected_actions += 1;
                }
            }
            _ => {
                self.try_attack(AttackType::Special, Hand::Right, now, buffer_on_fail);
            }
        }
    }

    // -- combat resolution ------------------------------------------------

    /// Public combat trigger: light attack. Returns 0 on start, -1 when
    /// refused.
    pub fn on_light_attack(&mut self, hand: u32) -> i32 {
        let hand = if hand == 0 { Hand::Left } else { Hand::Right };
        let ok = self.combat.start_attack(
            AttackType::Light,
            hand,
            self.time,
            &mut self.player.stamina,
            self.player.facing,
            &mut self.events,
        );
        if ok { 0 } else { -1 }
    }

    pub fn on_heavy_attack(&mut self, hand: u32) -> i32 {
        let hand = if hand == 0 { Hand::Left } else { Hand::Right };
        let ok = self.combat.start_attack(
            AttackType::Heavy,
            hand,
            self.time,
            &mut self.player.stamina,
            self.player.facing,
            &mut self.events,
        );
        if ok { 0 } else { -1 }
    }

    pub fn on_special_attack(&mut self) -> i32 {
        let ok = self.combat.start_attack(
            AttackType::Special,
            Hand::Right,
            self.time,
            &mut self.player.stamina,
            self.player.facing,
            &mut self.events,
        );
        if ok { 0 } else { -1 }
    }

    pub fn on_roll_start(&mut self) -> i32 {
        let dir = self.roll_direction();
        if self.combat.start_roll(dir, self.time, &mut self.player.stamina) {
            0
        } else {
            -1
        }
    }

    pub fn set_blocking(&mut self, on: bool) -> i32 {
        let ok = self
            .combat
            .set_blocking(on, self.player.facing, self.time, &mut self.player.stamina);
        if ok { 0 } else { -1 }
    }

    /// Resolve an externally-sourced attack against the player. Returns the
    /// wire result code (-1 ignore, 0 hit, 1 block, 2 parry).
    pub fn handle_incoming_attack(
        &mut self,
        origin: Vec2F,
        dir: Vec2F,
        damage: Fixed,
        poise: Fixed,
        range: Fixed,
    ) -> i32 {
        let now = self.time;
        if self.player.dash_invulnerable(now) {
            self.events.push(SimEvent::AttackResolved {
                outcome: OUTCOME_IGNORE,
                damage: Fixed::ZERO,
            });
            return OUTCOME_IGNORE;
        }
        let attack = crate::combat::IncomingAttack {
            origin,
            dir,
            damage,
            poise_damage: poise,
            range,
        };
        let mut hp = self.player.hp;
        let resolution = self.combat.handle_incoming_attack(
            &attack,
            self.player.pos,
            now,
            &mut hp,
            &mut self.player.stamina,
            &mut self.events,
        );
        let lost = self.player.hp - hp;
        self.player.hp = hp;
        if lost > Fixed::ZERO && !self.player.is_alive() {
            self.events.push(SimEvent::PlayerDied);
        }
        if resolution.outcome == OUTCOME_HIT {
            self.knockback_player(resolution.knockback, config::base_knockback());
        }
        resolution.outcome
    }

    fn resolve_wolf_attack(&mut self, wolf_attack: crate::wolves::WolfAttack, now: Fixed) {
        let code = self.handle_incoming_attack(
            wolf_attack.attack.origin,
            wolf_attack.attack.dir,
            wolf_attack.attack.damage,
            wolf_attack.attack.poise_damage,
            wolf_attack.attack.range,
        );
        if code == crate::combat::OUTCOME_PARRY {
            let until = now + Fixed::from_millis(config::PARRY_STUN_MS);
            self.wolves.stun_wolf(wolf_attack.wolf_id, until);
        }
        let defended = code != OUTCOME_HIT;
        self.wolves
            .notify_attack_result(wolf_attack.wolf_id, defended, now);
    }

    /// Apply the player's Active swing to wolves in reach, once per swing
    /// per wolf.
    fn resolve_player_swing(&mut self, now: Fixed) {
        let player_pos = self.player.pos;
        let Some(contract) = self.combat.active_contract() else {
            return;
        };
        let range = contract.range;
        let dir = contract.dir;
        let damage = contract.damage;
        let mut struck_mask = contract.struck_mask;
        let mut landed: Vec<(u32, Vec2F)> = Vec::new();

        let candidates: Vec<(u32, Vec2F)> = self
            .wolves
            .wolves()
            .map(|w| (w.id, w.pos))
            .collect();
        for (wolf_id, wolf_pos) in candidates {
            if wolf_id >= 32 || struck_mask & (1 << wolf_id) != 0 {
                continue;
            }
            let to_wolf = wolf_pos.sub(player_pos);
            if to_wolf.length() > range {
                continue;
            }
            // Front arc only.
            if to_wolf.normalize_or_x().dot(dir) < Fixed::from_ratio(30, 100) {
                continue;
            }
            struck_mask |= 1 << wolf_id;
            landed.push((wolf_id, to_wolf.normalize_or_x()));
        }

        if let Some(contract) = self.combat.active_contract() {
            contract.struck_mask = struck_mask;
        }
        let mut any = false;
        for (wolf_id, knock_dir) in landed {
            if let Some(wolf_type) = self.wolves.apply_damage(
                wolf_id,
                damage,
                knock_dir,
                config::base_knockback(),
                now,
                &mut self.physics,
                &mut self.events,
            ) {
                self.award_kill(wolf_type);
            }
            any = true;
        }
        if any {
            self.combat.notify_hit_landed(now);
        }
    }

    /// Bash hitbox: radial damage and impulse around the player.
    fn resolve_bash(&mut self, bash: crate::player::BashRelease, now: Fixed) {
        let player_pos = self.player.pos;
        let candidates: Vec<(u32, Vec2F)> = self
            .wolves
            .wolves()
            .map(|w| (w.id, w.pos))
            .collect();
        for (wolf_id, wolf_pos) in candidates {
            if wolf_pos.distance(player_pos) > bash.radius {
                continue;
            }
            let dir = wolf_pos.sub(player_pos).normalize_or_x();
            if let Some(wolf_type) = self.wolves.apply_damage(
                wolf_id,
                bash.damage,
                dir,
                bash.impulse,
                now,
                &mut self.physics,
                &mut self.events,
            ) {
                self.award_kill(wolf_type);
            }
        }
    }

    fn award_kill(&mut self, wolf_type: WolfType) {
        // Loot rolls come off their own stream so combat replay never
        // shifts them.
        let bounty = wolf_type.bounty();
        let jitter = self.rng.next_below(RngScope::Loot, bounty.max(1));
        self.state.award_gold(bounty + jitter, &mut self.events);
        if wolf_type == WolfType::Alpha {
            self.state.award_essence(1, &mut self.events);
        }
    }

    fn knockback_player(&mut self, dir: Vec2F, magnitude: Fixed) {
        if self.player.body_id == INVALID_ID {
            return;
        }
        if let Some(body) = self.physics.get_mut(self.player.body_id) {
            body.add_impulse(Vec3F::from_xy(dir.normalize_or_x().scale(magnitude)));
        }
    }

    // -- physics reconciliation -------------------------------------------

    fn sync_player_body_in(&mut self, pre_move_pos: Vec2F) {
        let cfg = self.physics.config;
        let vel = Vec3F::new(
            self.player.vel.x * cfg.span_x(),
            self.player.vel.y * cfg.span_y(),
            Fixed::ZERO,
        );
        let pos = Vec3F::new(
            cfg.to_physics_x(pre_move_pos.x),
            cfg.to_physics_y(pre_move_pos.y),
            Fixed::ZERO,
        );
        if let Some(body) = self.physics.get_mut(self.player.body_id) {
            body.position = pos;
            // Input velocity feeds the body, impulses already queued stay.
            body.velocity = vel;
            if !vel.is_zero() {
                body.wake();
            }
        }
    }

    /// The body is the authority post-collision: pull position and velocity
    /// back into normalized space, then push out of static obstacles.
    fn sync_player_body_out(&mut self) {
        let cfg = self.physics.config;
        if let Some(body) = self.physics.get(self.player.body_id) {
            self.player.pos = Vec2F::new(
                cfg.to_normalized_x(body.position.x),
                cfg.to_normalized_y(body.position.y),
            );
            self.player.vel = Vec2F::new(
                body.velocity.x / cfg.span_x(),
                body.velocity.y / cfg.span_y(),
            );
        }
        let resolved = self
            .obstacles
            .resolve_circle(self.player.pos, config::player_radius());
        if resolved != self.player.pos {
            self.player.pos = resolved;
            // Mirror the correction back so the body agrees.
            let pos = Vec3F::new(
                cfg.to_physics_x(resolved.x),
                cfg.to_physics_y(resolved.y),
                Fixed::ZERO,
            );
            self.physics.set_position(self.player.body_id, pos);
        }
    }

    // -- world management -------------------------------------------------

    /// Spawn a wolf at a normalized position.
    pub fn spawn_wolf(&mut self, wolf_type: u32, x: f32, y: f32) -> u32 {
        let pos = Vec2F::from_f32(x, y);
        let id = self
            .wolves
            .spawn_wolf(WolfType::from_u8(wolf_type as u8), pos, &mut self.physics);
        if id == INVALID_ID {
            self.diag.capacity_denied += 1;
        }
        id
    }

    /// Place a destructible barrel. Returns the barrel index or the
    /// sentinel.
    pub fn spawn_barrel(&mut self, x: f32, y: f32) -> u32 {
        let pos = Vec2F::from_f32(x, y);
        let cfg = self.physics.config;
        let body_pos = Vec3F::new(
            cfg.to_physics_x(pos.x),
            cfg.to_physics_y(pos.y),
            Fixed::ZERO,
        );
        let radius = Fixed::from_ratio(3, 100) * cfg.span_x();
        let body_id = self
            .physics
            .create_body(BodyKind::Dynamic, body_pos, Fixed::TWO, radius);
        if body_id == INVALID_ID {
            self.diag.capacity_denied += 1;
            return INVALID_ID;
        }
        if let Some(body) = self.physics.get_mut(body_id) {
            body.layer = layers::BARREL;
            body.drag = Fixed::from_ratio(90, 100);
        }
        let index = self.state.add_barrel(body_id, Fixed::from_ratio(30, 100));
        if index == INVALID_ID {
            self.physics.destroy_body(body_id);
            self.diag.capacity_denied += 1;
        }
        index
    }

    /// Damage a barrel; a destroyed barrel detonates.
    pub fn damage_barrel(&mut self, index: u32, damage: Fixed) {
        let Some(body_id) = self
            .state
            .damage_barrel(index, damage, &mut self.events)
        else {
            return;
        };
        let origin = self
            .physics
            .get(body_id)
            .map(|b| b.position)
            .unwrap_or(Vec3F::ZERO);
        self.physics.destroy_body(body_id);
        let span = self.physics.config.span_x();
        self.forces.create_explosion(
            origin,
            Fixed::from_ratio(15, 100) * span,
            Fixed::from_int(60),
            Fixed::from_ratio(60, 100) * span,
            &mut self.events,
        );
    }

    /// Start an explosion, coordinates and radius in normalized space.
    pub fn create_explosion(&mut self, x: f32, y: f32, z: f32, radius: f32, force: f32, speed: f32) -> bool {
        let cfg = self.physics.config;
        let origin = Vec3F::new(
            cfg.to_physics_x(Fixed::from_f32(x)),
            cfg.to_physics_y(Fixed::from_f32(y)),
            Fixed::from_f32(z) * cfg.span_x(),
        );
        self.forces.create_explosion(
            origin,
            Fixed::from_f32(radius) * cfg.span_x(),
            Fixed::from_f32(force),
            Fixed::from_f32(speed) * cfg.span_x(),
            &mut self.events,
        )
    }

    // -- enemy registry (external collaborators) ---------------------------

    /// Create a body for an externally-managed enemy slot. Returns the body
    /// id ([`INVALID_ID`] when out of capacity).
    pub fn create_enemy_body(&mut self, slot: u32, x: f32, y: f32, mass: f32, radius: f32) -> u32 {
        let cfg = self.physics.config;
        let pos = Vec3F::new(
            cfg.to_physics_x(Fixed::from_f32(x)),
            cfg.to_physics_y(Fixed::from_f32(y)),
            Fixed::ZERO,
        );
        let body_id = self.physics.create_body(
            BodyKind::Dynamic,
            pos,
            Fixed::from_f32(mass).max(Fixed::EPSILON),
            Fixed::from_f32(radius).max(Fixed::EPSILON) * cfg.span_x(),
        );
        if body_id == INVALID_ID {
            self.diag.capacity_denied += 1;
            return INVALID_ID;
        }
        if let Some(body) = self.physics.get_mut(body_id) {
            body.layer = layers::ENEMY;
        }
        if !self.state.register_enemy(slot, body_id) {
            self.physics.destroy_body(body_id);
            self.diag.capacity_denied += 1;
            return INVALID_ID;
        }
        body_id
    }

    pub fn destroy_enemy_body(&mut self, slot: u32) {
        let body_id = self.state.unregister_enemy(slot);
        if body_id != INVALID_ID {
            self.physics.destroy_body(body_id);
        }
    }

    pub fn set_enemy_body_position(&mut self, slot: u32, x: f32, y: f32) {
        let body_id = self.state.enemy_body(slot);
        if body_id == INVALID_ID {
            return;
        }
        let cfg = self.physics.config;
        let pos = Vec3F::new(
            cfg.to_physics_x(Fixed::from_f32(x)),
            cfg.to_physics_y(Fixed::from_f32(y)),
            Fixed::ZERO,
        );
        self.physics.set_position(body_id, pos);
    }

    pub fn apply_enemy_knockback(&mut self, slot: u32, dx: f32, dy: f32, force: f32) {
        let body_id = self.state.enemy_body(slot);
        if body_id == INVALID_ID {
            return;
        }
        let dir = Vec2F::from_f32(dx, dy).normalize_or_x();
        if let Some(body) = self.physics.get_mut(body_id) {
            body.add_impulse(Vec3F::from_xy(dir.scale(Fixed::from_f32(force))));
        }
    }

    // -- snapshot ----------------------------------------------------------

    pub fn save_state(&self) -> Vec<u8> {
        crate::snapshot::save_state(self)
    }

    /// Restore a snapshot; a rejected blob leaves the state untouched and
    /// bumps the failure counter.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), crate::error::SimError> {
        match crate::snapshot::load_state(self, bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.diag.snapshot_failures += 1;
                log::warn!("snapshot rejected: {}", e);
                Err(e)
            }
        }
    }

    pub fn checksum(&self) -> u64 {
        crate::snapshot::checksum(self)
    }

    pub fn enhanced_checksum(&self) -> u64 {
        crate::snapshot::enhanced_checksum(self)
    }

    // -- phase helpers ----------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Phase transition on behalf of the reconciler; forced transitions
    /// still honor the graph.
    pub fn force_phase(&mut self, phase: Phase) -> bool {
        self.state
            .request_transition(phase, self.time, true, &mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt() -> Fixed {
        Fixed::from_millis(16)
    }

    fn core_with_seed(seed: u64) -> Core {
        let mut core = Core::new(SimConfig::default());
        core.init_run(seed, 1, 0);
        core
    }

    #[test]
    fn init_creates_player_body() {
        let core = core_with_seed(1);
        assert_ne!(core.player.body_id, INVALID_ID);
        assert_eq!(core.phase(), Phase::Explore);
        assert_eq!(core.frame(), 0);
    }

    #[test]
    fn update_increments_frame() {
        let mut core = core_with_seed(1);
        for _ in 0..5 {
            core.update(dt());
        }
        assert_eq!(core.frame(), 5);
    }

    #[test]
    fn reset_preserves_weapon_and_character() {
        let mut core = Core::new(SimConfig::default());
        core.init_run(9, 2, 2);
        core.update(dt());
        core.reset_run(10);
        assert_eq!(core.combat.weapon, WeaponType::Greataxe);
        assert_eq!(core.player.character, CharacterType::Raider);
        assert_eq!(core.frame(), 0);
    }

    #[test]
    fn movement_input_moves_player() {
        let mut core = core_with_seed(1);
        let x0 = core.player.pos.x;
        for _ in 0..30 {
            core.set_player_input(1.0, 0.0, false, false, false, false, false, false, false, false);
            core.update(dt());
        }
        assert!(core.player.pos.x > x0);
    }

    #[test]
    fn nan_input_is_counted_not_propagated() {
        let mut core = core_with_seed(1);
        core.set_player_input(
            f32::NAN,
            2.0,
            false,
            false,
            false,
            false,
            false,
            false,
            false,
            false,
        );
        assert_eq!(core.diag.clamped_inputs, 2);
        core.update(dt());
        // Position stays finite and in range.
        assert!(core.player.pos.x >= Fixed::ZERO && core.player.pos.x <= Fixed::ONE);
    }

    #[test]
    fn spawning_wolves_enters_fight() {
        let mut core = core_with_seed(1);
        core.spawn_wolf(0, 0.3, 0.3);
        core.spawn_wolf(0, 0.35, 0.3);
        // Explore has a minimum dwell before the auto-transition fires.
        for _ in 0..40 {
            core.update(dt());
        }
        assert_eq!(core.phase(), Phase::Fight);
    }

    #[test]
    fn attack_trigger_codes() {
        let mut core = core_with_seed(1);
        assert_eq!(core.on_light_attack(1), 0);
        // Second attack while the first runs is refused.
        assert_eq!(core.on_light_attack(1), -1);
    }

    #[test]
    fn barrel_detonation_spawns_explosion() {
        let mut core = core_with_seed(1);
        let idx = core.spawn_barrel(0.4, 0.4);
        assert_ne!(idx, INVALID_ID);
        core.damage_barrel(idx, Fixed::ONE);
        assert_eq!(core.forces.active_explosions().count(), 1);
    }

    #[test]
    fn enemy_registry_round_trip() {
        let mut core = core_with_seed(1);
        let body = core.create_enemy_body(3, 0.5, 0.5, 1.0, 0.02);
        assert_ne!(body, INVALID_ID);
        assert_eq!(core.state.enemy_body(3), body);
        core.apply_enemy_knockback(3, 1.0, 0.0, 2.0);
        core.destroy_enemy_body(3);
        assert_eq!(core.state.enemy_body(3), INVALID_ID);
    }
}

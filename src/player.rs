//! Player state: movement, stamina, hp, statuses, character abilities.
//!
//! Movement integrates in normalized [0,1] space; after the physics step the
//! coordinator writes the body's position back through the configured
//! mapping, so collision response always wins. Abilities are small FSMs
//! layered over the combat state machine.

use serde::{Deserialize, Serialize};

use crate::combat::CombatManager;
use crate::config::{self, INVALID_ID};
use crate::events::{DamageSource, EventQueue, SimEvent};
use crate::input::InputFrame;
use crate::math::{Fixed, Vec2F};
use crate::terrain::{StatusApply, StatusKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CharacterType {
    None = 0,
    Warden = 1,
    Raider = 2,
    Kensei = 3,
}

impl CharacterType {
    pub fn from_u32(v: u32) -> CharacterType {
        match v {
            1 => CharacterType::Warden,
            2 => CharacterType::Raider,
            3 => CharacterType::Kensei,
            _ => CharacterType::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Status effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveStatus {
    pub kind: StatusKind,
    pub magnitude: Fixed,
    pub until: Fixed,
}

/// One slot per status kind; re-application refreshes in place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSet {
    slots: [Option<ActiveStatus>; 5],
}

impl StatusSet {
    pub fn apply(&mut self, status: StatusApply, now: Fixed) {
        let idx = status.kind as usize;
        self.slots[idx] = Some(ActiveStatus {
            kind: status.kind,
            magnitude: status.magnitude,
            until: now + status.duration,
        });
    }

    pub fn get(&self, kind: StatusKind) -> Option<ActiveStatus> {
        self.slots[kind as usize].filter(|s| s.magnitude > Fixed::ZERO)
    }

    /// Expire old statuses and return damage-over-time for this frame.
    pub fn tick(&mut self, now: Fixed, dt: Fixed) -> Fixed {
        let mut dot = Fixed::ZERO;
        for slot in self.slots.iter_mut() {
            let Some(status) = slot else { continue };
            if now >= status.until {
                *slot = None;
                continue;
            }
            match status.kind {
                StatusKind::Burn | StatusKind::Poison => {
                    dot += status.magnitude * dt;
                }
                _ => {}
            }
        }
        dot
    }

    /// Combined movement multiplier from slows, chills and shocks.
    pub fn speed_multiplier(&self) -> Fixed {
        let mut mult = Fixed::ONE;
        for kind in [StatusKind::Slow, StatusKind::Chill, StatusKind::Shock] {
            if let Some(s) = self.get(kind) {
                mult = mult * (Fixed::ONE - s.magnitude).max(Fixed::ZERO);
            }
        }
        mult
    }

    pub fn slots(&self) -> &[Option<ActiveStatus>; 5] {
        &self.slots
    }

    pub fn restore(&mut self, slots: [Option<ActiveStatus>; 5]) {
        self.slots = slots;
    }

    pub fn clear(&mut self) {
        self.slots = [None; 5];
    }
}

// ---------------------------------------------------------------------------
// Character abilities
// ---------------------------------------------------------------------------

/// Warden shoulder bash: hold to charge, release to fire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BashState {
    pub charging: bool,
    /// Charge level in [0, 1].
    pub charge: Fixed,
}

/// One-shot hitbox produced by a bash release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BashRelease {
    pub radius: Fixed,
    pub impulse: Fixed,
    pub damage: Fixed,
}

/// Raider berserker charge: a bounded sprint with hyperarmor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BerserkerState {
    pub active: bool,
    pub until: Fixed,
    pub dir: Vec2F,
}

/// Kensei flow dash: short i-frame dash with a self-feeding combo.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DashState {
    pub active: bool,
    pub until: Fixed,
    pub dir: Vec2F,
    pub combo_level: u8,
    pub combo_until: Fixed,
    pub cooldown_until: Fixed,
}

const BASH_MIN_CHARGE: (i32, i32) = (30, 100);
const BASH_CHARGE_PER_SEC: (i32, i32) = (80, 100);
const BERSERK_DURATION_MS: u32 = 2500;
const BERSERK_DRAIN_PER_SEC: (i32, i32) = (22, 100);
const DASH_BASE_MS: u32 = 150;
const DASH_EXTEND_PER_LEVEL_MS: u32 = 30;
const DASH_COMBO_WINDOW_MS: u32 = 600;
const DASH_MAX_COMBO: u8 = 4;

fn dash_cooldown(level: u8) -> Fixed {
    let ms = 900u32.saturating_sub(150 * level as u32).max(300);
    Fixed::from_millis(ms)
}

// ---------------------------------------------------------------------------
// Player manager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerManager {
    /// Normalized [0,1] gameplay position.
    pub pos: Vec2F,
    pub vel: Vec2F,
    /// Unit facing; preserved through zero input.
    pub facing: Vec2F,
    pub hp: Fixed,
    pub stamina: Fixed,
    pub grounded: bool,
    pub jump_count: u8,
    pub(crate) jump_until: Fixed,
    pub character: CharacterType,
    pub body_id: u32,
    pub statuses: StatusSet,
    pub bash: BashState,
    pub berserker: BerserkerState,
    pub dash: DashState,
}

impl PlayerManager {
    pub fn new(character: CharacterType) -> PlayerManager {
        PlayerManager {
            pos: Vec2F::new(Fixed::HALF, Fixed::from_ratio(85, 100)),
            vel: Vec2F::ZERO,
            facing: Vec2F::new(Fixed::ZERO, -Fixed::ONE),
            hp: Fixed::ONE,
            stamina: Fixed::ONE,
            grounded: true,
            jump_count: 0,
            jump_until: Fixed::ZERO,
            character,
            body_id: INVALID_ID,
            statuses: StatusSet::default(),
            bash: BashState::default(),
            berserker: BerserkerState::default(),
            dash: DashState::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > Fixed::ZERO
    }

    /// Dash i-frames (Kensei) are separate from roll i-frames.
    pub fn dash_invulnerable(&self, now: Fixed) -> bool {
        self.dash.active && now < self.dash.until
    }

    /// Berserker charge carries hyperarmor for its whole run.
    pub fn ability_hyperarmor(&self, now: Fixed) -> bool {
        self.berserker.active && now < self.berserker.until
    }

    pub fn speed(&self) -> Fixed {
        self.vel.length()
    }

    pub fn apply_damage(&mut self, amount: Fixed, source: DamageSource, events: &mut EventQueue) {
        if amount <= Fixed::ZERO || !self.is_alive() {
            return;
        }
        self.hp = (self.hp - amount).max(Fixed::ZERO);
        events.push(SimEvent::PlayerDamaged { amount, source });
        if !self.is_alive() {
            events.push(SimEvent::PlayerDied);
        }
    }

    pub fn apply_status(&mut self, status: StatusApply, now: Fixed) {
        self.statuses.apply(status, now);
    }

    // -- movement ---------------------------------------------------------

    /// Integrate one frame of movement. Combat state decides whether input
    /// drives velocity (rolls and stuns override it).
    #[allow(clippy::too_many_arguments)]
    pub fn update_movement(
        &mut self,
        now: Fixed,
        dt: Fixed,
        input: &InputFrame,
        combat: &CombatManager,
        events: &mut EventQueue,
    ) {
        // Status upkeep first: expiry plus damage-over-time.
        let dot = self.statuses.tick(now, dt);
        if dot > Fixed::ZERO {
            self.apply_damage(dot, DamageSource::Status, events);
        }

        let weapon_speed = config::weapon_def(combat.weapon).speed_mult;
        let input_dir = input.move_dir();

        if combat.stunned {
            self.vel = self.vel.scale(config::move_decay());
        } else if self.berserker.active {
            // Sprint at roughly double run speed.
            self.vel = self.berserker.dir.scale(config::roll_speed());
        } else if self.dash.active {
            self.vel = self.dash.dir.scale(config::roll_speed() * Fixed::TWO);
        } else {
            match combat.roll_state {
                crate::combat::RollState::Active => {
                    self.vel = combat.roll_dir.scale(config::roll_speed());
                }
                crate::combat::RollState::Sliding => {
                    // Momentum with reduced traction.
                    self.vel = self.vel.scale(
                        Fixed::ONE - (Fixed::ONE - config::slide_traction()) * dt * Fixed::from_int(4),
                    );
                }
                crate::combat::RollState::Idle => {
                    let mut mult = self.statuses.speed_multiplier() * weapon_speed;
                    if self.bash.charging {
                        mult = mult * Fixed::HALF;
                    }
                    if combat.blocking {
                        mult = mult * Fixed::from_ratio(60, 100);
                    }
                    let accel = input_dir.scale(config::base_move_speed() * mult);
                    self.vel = self.vel.scale(config::move_decay()).add(accel);
                }
            }
        }
        self.pos = self.pos.add(self.vel.scale(dt));
        self.pos.x = self.pos.x.clamp(Fixed::ZERO, Fixed::ONE);
        self.pos.y = self.pos.y.clamp(Fixed::ZERO, Fixed::ONE);

        // Facing follows movement intent; blocking pins it.
        if !combat.blocking && !input_dir.is_zero() {
            self.facing = input_dir.normalize_or_x();
        }

        // Cosmetic hop: a short airborne window, two charges.
        if now >= self.jump_until && !self.grounded {
            self.grounded = true;
            self.jump_count = 0;
        }

        // Stamina regen, slowed while blocking, paused mid-action.
        let acting = combat.attack_state != crate::combat::AttackState::Idle
            || combat.roll_state == crate::combat::RollState::Active
            || self.berserker.active;
        if !acting {
            let mut regen = config::stamina_regen_per_sec();
            if combat.blocking {
                regen = regen * config::blocking_regen_mult();
            }
            self.stamina = (self.stamina + regen * dt).min(Fixed::ONE);
        }
    }

    pub fn try_jump(&mut self, now: Fixed) -> bool {
        if self.jump_count >= 2 {
            return false;
        }
        self.jump_count += 1;
        self.grounded = false;
        self.jump_until = now + Fixed::from_millis(400);
        true
    }

    // -- abilities --------------------------------------------------------

    /// Drive ability timers; returns a bash hitbox when a release fires.
    pub fn update_abilities(
        &mut self,
        now: Fixed,
        dt: Fixed,
        input: &InputFrame,
        combat: &CombatManager,
    ) -> Option<BashRelease> {
        let mut released = None;
        match self.character {
            CharacterType::Warden => {
                if self.bash.charging {
                    if combat.stunned {
                        self.bash = BashState::default();
                    } else if input.special {
                        let rate = Fixed::from_ratio(BASH_CHARGE_PER_SEC.0, BASH_CHARGE_PER_SEC.1);
                        self.bash.charge = (self.bash.charge + rate * dt).min(Fixed::ONE);
                    } else {
                        released = self.release_bash();
                    }
                }
            }
            CharacterType::Raider => {
                if self.berserker.active {
                    let drain =
                        Fixed::from_ratio(BERSERK_DRAIN_PER_SEC.0, BERSERK_DRAIN_PER_SEC.1) * dt;
                    self.stamina = (self.stamina - drain).max(Fixed::ZERO);
                    if now >= self.berserker.until || self.stamina.is_zero() || combat.stunned {
                        self.berserker.active = false;
                    }
                }
            }
            CharacterType::Kensei => {
                if self.dash.active && now >= self.dash.until {
                    self.dash.active = false;
                }
                if self.dash.combo_level > 0 && now >= self.dash.combo_until {
                    self.dash.combo_level = 0;
                }
            }
            CharacterType::None => {}
        }
        released
    }

    /// Warden: begin charging the bash.
    pub fn start_bash_charge(&mut self, combat: &CombatManager) -> bool {
        if self.character != CharacterType::Warden || self.bash.charging || !combat.can_attack() {
            return false;
        }
        self.bash.charging = true;
        self.bash.charge = Fixed::ZERO;
        true
    }

    /// Warden: release; `None` when under the minimum charge (the charge is
    /// simply dropped).
    pub fn release_bash(&mut self) -> Option<BashRelease> {
        if !self.bash.charging {
            return None;
        }
        let charge = self.bash.charge;
        self.bash = BashState::default();
        let min_charge = Fixed::from_ratio(BASH_MIN_CHARGE.0, BASH_MIN_CHARGE.1);
        if charge < min_charge {
            return None;
        }
        let cost = config::special_stamina_cost() * charge;
        if self.stamina < cost {
            return None;
        }
        self.stamina -= cost;
        Some(BashRelease {
            radius: Fixed::from_ratio(6, 100) + Fixed::from_ratio(8, 100) * charge,
            impulse: Fixed::from_int(2) + Fixed::from_int(4) * charge,
            damage: Fixed::from_ratio(15, 100) + Fixed::from_ratio(25, 100) * charge,
        })
    }

    /// Raider: kick off the charge along current facing.
    pub fn start_berserker(&mut self, now: Fixed, combat: &CombatManager) -> bool {
        if self.character != CharacterType::Raider || self.berserker.active || combat.stunned {
            return false;
        }
        if self.stamina < config::special_stamina_cost() {
            return false;
        }
        self.berserker.active = true;
        self.berserker.until = now + Fixed::from_millis(BERSERK_DURATION_MS);
        self.berserker.dir = self.facing;
        true
    }

    pub fn cancel_berserker(&mut self) {
        self.berserker.active = false;
    }

    /// Kensei: dash along `dir` if off cooldown. Chained dashes level the
    /// combo, which shortens the cooldown and stretches the i-frame window.
    pub fn start_flow_dash(&mut self, dir: Vec2F, now: Fixed, combat: &CombatManager) -> bool {
        if self.character != CharacterType::Kensei || combat.stunned {
            return false;
        }
        if now < self.dash.cooldown_until {
            return false;
        }
        if now < self.dash.combo_until {
            self.dash.combo_level = (self.dash.combo_level + 1).min(DASH_MAX_COMBO);
        } else {
            self.dash.combo_level = 0;
        }
        let window = Fixed::from_millis(
            DASH_BASE_MS + DASH_EXTEND_PER_LEVEL_MS * self.dash.combo_level as u32,
        );
        self.dash.active = true;
        self.dash.until = now + window;
        self.dash.dir = dir.normalize_or_x();
        self.dash.combo_until = now + Fixed::from_millis(DASH_COMBO_WINDOW_MS);
        self.dash.cooldown_until = now + dash_cooldown(self.dash.combo_level);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeaponType;

    fn ms(v: u32) -> Fixed {
        Fixed::from_millis(v)
    }

    fn dt() -> Fixed {
        Fixed::from_millis(16)
    }

    fn setup(character: CharacterType) -> (PlayerManager, CombatManager, EventQueue) {
        (
            PlayerManager::new(character),
            CombatManager::new(WeaponType::Longsword),
            EventQueue::new(),
        )
    }

    #[test]
    fn movement_accelerates_and_decays() {
        let (mut p, combat, mut events) = setup(CharacterType::None);
        let mut input = InputFrame::default();
        input.move_x = Fixed::ONE;
        p.update_movement(ms(16), dt(), &input, &combat, &mut events);
        assert!(p.vel.x > Fixed::ZERO);
        let peak = p.vel.x;
        let idle = InputFrame::default();
        p.update_movement(ms(32), dt(), &idle, &combat, &mut events);
        assert!(p.vel.x < peak);
    }

    #[test]
    fn facing_stays_unit_and_persists() {
        let (mut p, combat, mut events) = setup(CharacterType::None);
        let mut input = InputFrame::default();
        input.move_x = Fixed::ONE;
        input.move_y = Fixed::ONE;
        p.update_movement(ms(16), dt(), &input, &combat, &mut events);
        let len = p.facing.length();
        assert!((len - Fixed::ONE).abs() <= Fixed::from_raw(4));
        let before = p.facing;
        let idle = InputFrame::default();
        p.update_movement(ms(32), dt(), &idle, &combat, &mut events);
        assert_eq!(p.facing, before);
    }

    #[test]
    fn slow_status_reduces_speed() {
        let (mut p, combat, mut events) = setup(CharacterType::None);
        let mut input = InputFrame::default();
        input.move_x = Fixed::ONE;
        p.update_movement(ms(16), dt(), &input, &combat, &mut events);
        let normal = p.vel.x;

        let (mut slowed, combat2, _) = setup(CharacterType::None);
        slowed.apply_status(
            StatusApply {
                kind: StatusKind::Slow,
                magnitude: Fixed::HALF,
                duration: Fixed::from_int(2),
            },
            ms(0),
        );
        slowed.update_movement(ms(16), dt(), &input, &combat2, &mut events);
        assert!(slowed.vel.x < normal);
    }

    #[test]
    fn poison_ticks_damage() {
        let (mut p, combat, mut events) = setup(CharacterType::None);
        p.apply_status(
            StatusApply {
                kind: StatusKind::Poison,
                magnitude: Fixed::from_ratio(10, 100),
                duration: Fixed::from_int(3),
            },
            ms(0),
        );
        let input = InputFrame::default();
        for i in 1..=10 {
            p.update_movement(ms(16 * i), dt(), &input, &combat, &mut events);
        }
        assert!(p.hp < Fixed::ONE);
    }

    #[test]
    fn stamina_regenerates_when_idle() {
        let (mut p, combat, mut events) = setup(CharacterType::None);
        p.stamina = Fixed::HALF;
        let input = InputFrame::default();
        p.update_movement(ms(16), dt(), &input, &combat, &mut events);
        assert!(p.stamina > Fixed::HALF);
    }

    #[test]
    fn warden_bash_charges_and_releases() {
        let (mut p, combat, _) = setup(CharacterType::Warden);
        assert!(p.start_bash_charge(&combat));
        let mut input = InputFrame::default();
        input.special = true;
        // Charge for ~0.5s.
        for i in 1..=31 {
            p.update_abilities(ms(16 * i), dt(), &input, &combat);
        }
        assert!(p.bash.charge >= Fixed::from_ratio(30, 100));
        input.special = false;
        let release = p.update_abilities(ms(520), dt(), &input, &combat);
        let release = release.expect("charged past minimum");
        assert!(release.radius > Fixed::from_ratio(6, 100));
        assert!(!p.bash.charging);
    }

    #[test]
    fn under_charged_bash_fizzles() {
        let (mut p, combat, _) = setup(CharacterType::Warden);
        p.start_bash_charge(&combat);
        let mut input = InputFrame::default();
        input.special = true;
        p.update_abilities(ms(16), dt(), &input, &combat);
        input.special = false;
        assert!(p.update_abilities(ms(32), dt(), &input, &combat).is_none());
    }

    #[test]
    fn bash_is_warden_only() {
        let (mut p, combat, _) = setup(CharacterType::Raider);
        assert!(!p.start_bash_charge(&combat));
    }

    #[test]
    fn berserker_expires_and_drains() {
        let (mut p, combat, _) = setup(CharacterType::Raider);
        assert!(p.start_berserker(ms(0), &combat));
        let start_stamina = p.stamina;
        let input = InputFrame::default();
        p.update_abilities(ms(16), dt(), &input, &combat);
        assert!(p.stamina < start_stamina);
        assert!(p.ability_hyperarmor(ms(16)));
        p.update_abilities(ms(2600), dt(), &input, &combat);
        assert!(!p.berserker.active);
    }

    #[test]
    fn flow_dash_combo_scales_cooldown() {
        let (mut p, combat, _) = setup(CharacterType::Kensei);
        assert!(p.start_flow_dash(Vec2F::UNIT_X, ms(0), &combat));
        assert!(p.dash_invulnerable(ms(100)));
        assert_eq!(p.dash.combo_level, 0);
        // On cooldown immediately after.
        assert!(!p.start_flow_dash(Vec2F::UNIT_X, ms(100), &combat));

        // Second dash inside the combo window levels up.
        let next = p.dash.cooldown_until;
        assert!(p.start_flow_dash(Vec2F::UNIT_X, next, &combat));
        assert_eq!(p.dash.combo_level, 0); // window expired at 600ms < 900ms cooldown
    }

    #[test]
    fn flow_dash_levels_inside_window() {
        let (mut p, combat, _) = setup(CharacterType::Kensei);
        p.start_flow_dash(Vec2F::UNIT_X, ms(0), &combat);
        // Force the cooldown shorter than the combo window to chain.
        p.dash.cooldown_until = ms(400);
        assert!(p.start_flow_dash(Vec2F::UNIT_X, ms(450), &combat));
        assert_eq!(p.dash.combo_level, 1);
        assert!(p.dash.until - ms(450) > Fixed::from_millis(DASH_BASE_MS));
    }

    #[test]
    fn damage_floors_at_zero_and_emits_death() {
        let (mut p, _combat, mut events) = setup(CharacterType::None);
        p.apply_damage(Fixed::from_int(2), DamageSource::Explosion, &mut events);
        assert_eq!(p.hp, Fixed::ZERO);
        assert!(!p.is_alive());
        assert!(events.iter().any(|e| matches!(e, SimEvent::PlayerDied)));
    }

    #[test]
    fn double_jump_limit() {
        let (mut p, _, _) = setup(CharacterType::None);
        assert!(p.try_jump(ms(0)));
        assert!(p.try_jump(ms(50)));
        assert!(!p.try_jump(ms(100)));
    }
}

//! Combat state machine: attacks, rolls, blocking, parries, stun.
//!
//! The attack FSM is four states (Idle, Windup, Active, Recovery) with
//! orthogonal sub-state for rolls, blocking and stun. Transitions are pure
//! functions of sim time and the edge-detected input, so two peers stepping
//! the same inputs hold identical combat state on every frame.

use serde::{Deserialize, Serialize};

use crate::config::{
    self, COMBO_WINDOW_MS, COUNTER_WINDOW_MS, HEAVY_ACTIVE_MS, HEAVY_RECOVERY_MS, HEAVY_WINDUP_MS,
    HITSTUN_MS, LIGHT_ACTIVE_MS, LIGHT_RECOVERY_MS, LIGHT_WINDUP_MS, MAX_COMBO, PARRY_STUN_MS,
    PARRY_WINDOW_MS, ROLL_IFRAME_MS, ROLL_SLIDE_MS, SPECIAL_ACTIVE_MS, SPECIAL_RECOVERY_MS,
    SPECIAL_WINDUP_MS, WeaponType,
};
use crate::events::{EventQueue, SimEvent};
use crate::input::Hand;
use crate::math::{Fixed, Vec2F};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttackState {
    Idle = 0,
    Windup = 1,
    Active = 2,
    Recovery = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttackType {
    Light = 0,
    Heavy = 1,
    Special = 2,
}

impl AttackType {
    pub fn from_u8(v: u8) -> AttackType {
        match v {
            1 => AttackType::Heavy,
            2 => AttackType::Special,
            _ => AttackType::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RollState {
    Idle = 0,
    Active = 1,
    Sliding = 2,
}

/// Outcome codes for [`CombatManager::handle_incoming_attack`].
pub const OUTCOME_IGNORE: i32 = -1;
pub const OUTCOME_HIT: i32 = 0;
pub const OUTCOME_BLOCK: i32 = 1;
pub const OUTCOME_PARRY: i32 = 2;

/// An attack aimed at the player this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomingAttack {
    pub origin: Vec2F,
    /// Unit direction of travel, attacker toward defender.
    pub dir: Vec2F,
    pub damage: Fixed,
    pub poise_damage: Fixed,
    /// Attacker's effective reach (weapon reach x modifier).
    pub range: Fixed,
}

/// Resolution detail beyond the wire code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackResolution {
    pub outcome: i32,
    /// Damage that actually landed on the defender.
    pub damage_dealt: Fixed,
    /// Stun the attacker must suffer (parry), absolute sim time.
    pub attacker_stun_until: Option<Fixed>,
    /// Knockback to apply to the defender's body, normalized direction.
    pub knockback: Vec2F,
}

/// Live hit window of the player's current swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitContract {
    pub dir: Vec2F,
    pub range: Fixed,
    pub damage: Fixed,
    pub poise_damage: Fixed,
    /// Milliseconds of hitstop the renderer may apply.
    pub hitstop_ms: u32,
    /// Bit per wolf slot already struck by this swing.
    pub struck_mask: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatManager {
    pub weapon: WeaponType,

    pub attack_state: AttackState,
    pub attack_type: AttackType,
    pub attack_hand: Hand,
    /// Facing captured when the attack started; the swing aims here.
    pub(crate) attack_dir: Vec2F,
    /// Sim time the current attack sub-state was entered.
    pub(crate) state_entered: Fixed,
    /// Windup applied to the running attack (combo-scaled).
    pub(crate) windup_duration: Fixed,
    /// The running attack was thrown inside the counter window; its
    /// contract gets the counter damage bonus. Captured at attack start
    /// because starting the attack closes the window.
    pub(crate) contract_counter_bonus: bool,
    pub(crate) contract: Option<HitContract>,

    pub roll_state: RollState,
    pub(crate) roll_entered: Fixed,
    pub roll_dir: Vec2F,

    pub blocking: bool,
    pub block_face: Vec2F,
    pub(crate) block_start: Fixed,
    /// Shielded weapons: parry window opened by a light-hand tap.
    pub(crate) tap_parry_until: Fixed,

    pub stunned: bool,
    pub stun_until: Fixed,

    pub combo_count: u8,
    pub(crate) combo_window_end: Fixed,
    pub last_attack_type: AttackType,

    pub can_counter: bool,
    pub(crate) counter_window_end: Fixed,

    pub armor_value: Fixed,
    pub(crate) hyperarmor_until: Fixed,
}

impl CombatManager {
    pub fn new(weapon: WeaponType) -> CombatManager {
        CombatManager {
            weapon,
            attack_state: AttackState::Idle,
            attack_type: AttackType::Light,
            attack_hand: Hand::Right,
            attack_dir: Vec2F::UNIT_X,
            state_entered: Fixed::ZERO,
            windup_duration: Fixed::ZERO,
            contract_counter_bonus: false,
            contract: None,
            roll_state: RollState::Idle,
            roll_entered: Fixed::ZERO,
            roll_dir: Vec2F::UNIT_X,
            blocking: false,
            block_face: Vec2F::UNIT_X,
            block_start: Fixed::ZERO,
            tap_parry_until: -Fixed::ONE,
            stunned: false,
            stun_until: Fixed::ZERO,
            combo_count: 0,
            combo_window_end: Fixed::ZERO,
            last_attack_type: AttackType::Light,
            can_counter: false,
            counter_window_end: Fixed::ZERO,
            armor_value: Fixed::ZERO,
            hyperarmor_until: -Fixed::ONE,
        }
    }

    // -- queries ----------------------------------------------------------

    /// Roll i-frames are up.
    pub fn is_invulnerable(&self) -> bool {
        self.roll_state == RollState::Active
    }

    pub fn is_rolling(&self) -> bool {
        self.roll_state != RollState::Idle
    }

    pub fn has_hyperarmor(&self, now: Fixed) -> bool {
        now < self.hyperarmor_until
    }

    pub fn can_attack(&self) -> bool {
        self.attack_state == AttackState::Idle
            && self.roll_state == RollState::Idle
            && !self.stunned
            && !self.blocking
    }

    /// The live hit window, if the swing is in Active frames.
    pub fn active_contract(&mut self) -> Option<&mut HitContract> {
        if self.attack_state == AttackState::Active {
            self.contract.as_mut()
        } else {
            None
        }
    }

    fn in_counter_window(&self, now: Fixed) -> bool {
        self.can_counter && now < self.counter_window_end
    }

    fn combo_running(&self, now: Fixed) -> bool {
        self.combo_count > 0 && now < self.combo_window_end
    }

    // -- timings ----------------------------------------------------------

    fn base_windup(&self, attack: AttackType) -> Fixed {
        let ms = match attack {
            AttackType::Light => LIGHT_WINDUP_MS,
            AttackType::Heavy => HEAVY_WINDUP_MS,
            AttackType::Special => SPECIAL_WINDUP_MS,
        };
        let speed = config::weapon_def(self.weapon).speed_mult;
        Fixed::from_millis(ms) / speed
    }

    fn active_duration(&self, attack: AttackType) -> Fixed {
        let ms = match attack {
            AttackType::Light => LIGHT_ACTIVE_MS,
            AttackType::Heavy => HEAVY_ACTIVE_MS,
            AttackType::Special => SPECIAL_ACTIVE_MS,
        };
        Fixed::from_millis(ms)
    }

    fn recovery_duration(&self, attack: AttackType) -> Fixed {
        let ms = match attack {
            AttackType::Light => LIGHT_RECOVERY_MS,
            AttackType::Heavy => HEAVY_RECOVERY_MS,
            AttackType::Special => SPECIAL_RECOVERY_MS,
        };
        Fixed::from_millis(ms) / config::weapon_def(self.weapon).speed_mult
    }

    fn stamina_cost(&self, attack: AttackType, now: Fixed) -> Fixed {
        if self.in_counter_window(now) {
            return Fixed::ZERO;
        }
        let base = match attack {
            AttackType::Light => config::light_stamina_cost(),
            AttackType::Heavy => config::heavy_stamina_cost(),
            AttackType::Special => config::special_stamina_cost(),
        } * config::weapon_def(self.weapon).stamina_mult;
        if self.combo_running(now) {
            let reduction = (config::combo_cost_reduction()
                * Fixed::from_int(self.combo_count as i32))
            .min(config::combo_cost_reduction_cap());
            base * (Fixed::ONE - reduction)
        } else {
            base
        }
    }

    // -- action starts ----------------------------------------------------

    /// Begin an attack. Returns false (and leaves state untouched) when the
    /// combat state forbids it or stamina is short.
    pub fn start_attack(
        &mut self,
        attack: AttackType,
        hand: Hand,
        now: Fixed,
        stamina: &mut Fixed,
        facing: Vec2F,
        events: &mut EventQueue,
    ) -> bool {
        if !self.can_attack() {
            return false;
        }
        let cost = self.stamina_cost(attack, now);
        if *stamina < cost {
            return false;
        }
        *stamina -= cost;
        self.contract_counter_bonus = self.in_counter_window(now);
        if self.contract_counter_bonus {
            self.can_counter = false;
        }

        self.attack_state = AttackState::Windup;
        self.attack_type = attack;
        self.attack_hand = hand;
        self.state_entered = now;
        let mut windup = self.base_windup(attack);
        if self.combo_running(now) {
            windup = windup * (Fixed::ONE - config::combo_windup_reduction());
        }
        self.windup_duration = windup;
        self.contract = None;
        self.attack_dir = facing.normalize_or_x();
        events.push(SimEvent::AttackStarted {
            attack_type: attack as u8,
            hand: hand as u8,
        });
        true
    }

    /// Begin a roll. Direction comes from move input, falling back to
    /// facing.
    pub fn start_roll(
        &mut self,
        dir: Vec2F,
        now: Fixed,
        stamina: &mut Fixed,
    ) -> bool {
        if self.stunned || self.roll_state != RollState::Idle {
            return false;
        }
        if self.attack_state != AttackState::Idle {
            return false;
        }
        let cost = config::roll_stamina_cost();
        if *stamina < cost {
            return false;
        }
        *stamina -= cost;
        self.roll_state = RollState::Active;
        self.roll_entered = now;
        self.roll_dir = dir.normalize_or_x();
        self.blocking = false;
        true
    }

    /// Raise or drop the block. Raising during a heavy windup is the feint:
    /// the attack is cancelled and part of its cost refunded.
    pub fn set_blocking(
        &mut self,
        on: bool,
        facing: Vec2F,
        now: Fixed,
        stamina: &mut Fixed,
    ) -> bool {
        if !on {
            self.blocking = false;
            return true;
        }
        if self.stunned || self.is_rolling() {
            return false;
        }
        if self.attack_state == AttackState::Windup && self.attack_type == AttackType::Heavy {
            // Feint: refund part of the heavy cost.
            let refund = config::heavy_stamina_cost()
                * config::weapon_def(self.weapon).stamina_mult
                * config::feint_refund_fraction();
            *stamina = (*stamina + refund).min(Fixed::ONE);
            self.attack_state = AttackState::Idle;
            self.contract = None;
        } else if self.attack_state != AttackState::Idle {
            return false;
        }
        if *stamina <= Fixed::ZERO {
            return false;
        }
        if !self.blocking {
            self.block_start = now;
        }
        self.blocking = true;
        self.block_face = facing.normalize_or_x();
        true
    }

    /// Shielded-weapon light tap: opens the tap-parry window.
    pub fn shield_tap(&mut self, now: Fixed) {
        if config::weapon_def(self.weapon).shielded {
            self.tap_parry_until = now + Fixed::from_millis(PARRY_WINDOW_MS);
        }
    }

    /// Apply a stun, cancelling whatever is running.
    pub fn apply_stun(&mut self, until: Fixed) {
        self.stunned = true;
        self.stun_until = self.stun_until.max(until);
        self.attack_state = AttackState::Idle;
        self.contract = None;
        self.blocking = false;
    }

    /// The player's own swing connected; extends the combo.
    pub fn notify_hit_landed(&mut self, now: Fixed) {
        self.combo_count = (self.combo_count + 1).min(MAX_COMBO);
        self.combo_window_end = now + Fixed::from_millis(COMBO_WINDOW_MS);
        self.last_attack_type = self.attack_type;
    }

    // -- per-frame update -------------------------------------------------

    /// Advance timers and fire state transitions. `stamina` is read to force
    /// block-drop on exhaustion.
    pub fn update(&mut self, now: Fixed, stamina: Fixed) {
        if self.stunned && now >= self.stun_until {
            self.stunned = false;
        }

        if self.combo_count > 0 && now >= self.combo_window_end {
            self.combo_count = 0;
        }
        if self.can_counter && now >= self.counter_window_end {
            self.can_counter = false;
        }

        // Roll sub-state.
        match self.roll_state {
            RollState::Active => {
                if now - self.roll_entered >= Fixed::from_millis(ROLL_IFRAME_MS) {
                    self.roll_state = RollState::Sliding;
                    self.roll_entered = now;
                }
            }
            RollState::Sliding => {
                if now - self.roll_entered >= Fixed::from_millis(ROLL_SLIDE_MS) {
                    self.roll_state = RollState::Idle;
                }
            }
            RollState::Idle => {}
        }

        // Blocking collapses when stamina is spent.
        if self.blocking && stamina <= Fixed::ZERO {
            self.blocking = false;
        }

        // Attack FSM.
        let elapsed = now - self.state_entered;
        match self.attack_state {
            AttackState::Windup => {
                if elapsed >= self.windup_duration {
                    self.attack_state = AttackState::Active;
                    self.state_entered = now;
                    let def = config::weapon_def(self.weapon);
                    let damage_mult = def.damage_mult;
                    let (damage, poise, hitstop) = match self.attack_type {
                        AttackType::Light => {
                            (Fixed::from_ratio(12, 100), Fixed::from_ratio(30, 100), 40)
                        }
                        AttackType::Heavy => {
                            (Fixed::from_ratio(28, 100), Fixed::from_ratio(80, 100), 90)
                        }
                        AttackType::Special => {
                            (Fixed::from_ratio(35, 100), Fixed::ONE, 120)
                        }
                    };
                    let mut damage = damage * damage_mult;
                    if self.contract_counter_bonus {
                        damage = damage * config::counter_damage_mult();
                    }
                    self.contract = Some(HitContract {
                        dir: self.attack_dir,
                        range: def.reach,
                        damage,
                        poise_damage: poise,
                        hitstop_ms: hitstop,
                        struck_mask: 0,
                    });
                    if self.attack_type == AttackType::Heavy && def.hyperarmor_heavy {
                        self.hyperarmor_until = now + self.active_duration(AttackType::Heavy);
                    }
                }
            }
            AttackState::Active => {
                if elapsed >= self.active_duration(self.attack_type) {
                    self.attack_state = AttackState::Recovery;
                    self.state_entered = now;
                    self.contract = None;
                }
            }
            AttackState::Recovery => {
                if elapsed >= self.recovery_duration(self.attack_type) {
                    self.attack_state = AttackState::Idle;
                    self.state_entered = now;
                }
            }
            AttackState::Idle => {}
        }
    }

    // -- incoming attack resolution ---------------------------------------

    /// Resolve an attack against the player. Checks run in a fixed order:
    /// i-frames, range, block/parry, then a clean hit.
    pub fn handle_incoming_attack(
        &mut self,
        attack: &IncomingAttack,
        defender_pos: Vec2F,
        now: Fixed,
        hp: &mut Fixed,
        stamina: &mut Fixed,
        events: &mut EventQueue,
    ) -> AttackResolution {
        let mut resolution = AttackResolution {
            outcome: OUTCOME_IGNORE,
            damage_dealt: Fixed::ZERO,
            attacker_stun_until: None,
            knockback: Vec2F::ZERO,
        };

        // 1. Roll i-frames.
        if self.is_invulnerable() {
            events.push(SimEvent::AttackResolved {
                outcome: OUTCOME_IGNORE,
                damage: Fixed::ZERO,
            });
            return resolution;
        }

        // 2. Range gate.
        if attack.origin.distance(defender_pos) > attack.range {
            events.push(SimEvent::AttackResolved {
                outcome: OUTCOME_IGNORE,
                damage: Fixed::ZERO,
            });
            return resolution;
        }

        let dir = attack.dir.normalize_or_x();

        // 3. Block / parry.
        let facing_attacker = self.block_face.dot(dir.scale(-Fixed::ONE));
        if self.blocking && facing_attacker >= config::block_facing_threshold() {
            let parry_window = Fixed::from_millis(PARRY_WINDOW_MS);
            let in_block_parry = now - self.block_start <= parry_window;
            let in_tap_parry =
                config::weapon_def(self.weapon).shielded && now <= self.tap_parry_until;
            if in_block_parry || in_tap_parry {
                // Parry: attacker staggers, defender's stamina refills.
                *stamina = Fixed::ONE;
                self.can_counter = true;
                self.counter_window_end = now + Fixed::from_millis(COUNTER_WINDOW_MS);
                resolution.outcome = OUTCOME_PARRY;
                resolution.attacker_stun_until =
                    Some(now + Fixed::from_millis(PARRY_STUN_MS));
                events.push(SimEvent::PlayerParried);
                events.push(SimEvent::AttackResolved {
                    outcome: OUTCOME_PARRY,
                    damage: Fixed::ZERO,
                });
                return resolution;
            }

            let mitigation = config::block_mitigation();
            let damage = attack.damage * (Fixed::ONE - mitigation);
            *hp = (*hp - damage).max(Fixed::ZERO);
            *stamina = (*stamina
                - attack.poise_damage * config::block_stamina_drain())
            .max(Fixed::ZERO);
            if *stamina <= Fixed::ZERO {
                self.blocking = false;
            }
            resolution.outcome = OUTCOME_BLOCK;
            resolution.damage_dealt = damage;
            events.push(SimEvent::AttackResolved {
                outcome: OUTCOME_BLOCK,
                damage,
            });
            return resolution;
        }

        // 4. Clean hit.
        let damage = attack.damage;
        *hp = (*hp - damage).max(Fixed::ZERO);
        resolution.outcome = OUTCOME_HIT;
        resolution.damage_dealt = damage;
        resolution.knockback = dir;
        let interrupted = !(self.has_hyperarmor(now)
            && attack.poise_damage < config::hyperarmor_threshold());
        if interrupted {
            self.apply_stun(now + Fixed::from_millis(HITSTUN_MS));
        }
        events.push(SimEvent::AttackResolved {
            outcome: OUTCOME_HIT,
            damage,
        });
        resolution
    }
}

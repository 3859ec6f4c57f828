//! Per-wolf record and state machine.
//!
//! A wolf ticks in a fixed order: perception, emotion, plan evaluation,
//! movement, vocalization. The state machine is data-driven off distances,
//! health, stamina and the owning pack's plan; every random draw comes from
//! the AI scope of the shared RNG.

use serde::{Deserialize, Serialize};

use crate::config::{INVALID_ID, PackTuning};
use crate::math::{Fixed, Vec2F};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WolfType {
    Normal = 0,
    Alpha = 1,
    Scout = 2,
    Hunter = 3,
    Omega = 4,
}

impl WolfType {
    pub fn from_u8(v: u8) -> WolfType {
        match v {
            1 => WolfType::Alpha,
            2 => WolfType::Scout,
            3 => WolfType::Hunter,
            4 => WolfType::Omega,
            _ => WolfType::Normal,
        }
    }

    /// Movement speed multiplier.
    pub fn speed_mult(self) -> Fixed {
        match self {
            WolfType::Normal => Fixed::ONE,
            WolfType::Alpha => Fixed::from_ratio(110, 100),
            WolfType::Scout => Fixed::from_ratio(130, 100),
            WolfType::Hunter => Fixed::from_ratio(115, 100),
            WolfType::Omega => Fixed::from_ratio(90, 100),
        }
    }

    pub fn max_hp(self) -> Fixed {
        match self {
            WolfType::Normal => Fixed::from_ratio(40, 100),
            WolfType::Alpha => Fixed::from_ratio(80, 100),
            WolfType::Scout => Fixed::from_ratio(30, 100),
            WolfType::Hunter => Fixed::from_ratio(50, 100),
            WolfType::Omega => Fixed::from_ratio(35, 100),
        }
    }

    pub fn base_aggression(self) -> Fixed {
        match self {
            WolfType::Normal => Fixed::from_ratio(50, 100),
            WolfType::Alpha => Fixed::from_ratio(75, 100),
            WolfType::Scout => Fixed::from_ratio(35, 100),
            WolfType::Hunter => Fixed::from_ratio(65, 100),
            WolfType::Omega => Fixed::from_ratio(30, 100),
        }
    }

    pub fn attack_damage(self) -> Fixed {
        match self {
            WolfType::Normal => Fixed::from_ratio(10, 100),
            WolfType::Alpha => Fixed::from_ratio(18, 100),
            WolfType::Scout => Fixed::from_ratio(7, 100),
            WolfType::Hunter => Fixed::from_ratio(13, 100),
            WolfType::Omega => Fixed::from_ratio(8, 100),
        }
    }

    /// Gold dropped on death.
    pub fn bounty(self) -> u32 {
        match self {
            WolfType::Normal => 5,
            WolfType::Alpha => 25,
            WolfType::Scout => 4,
            WolfType::Hunter => 8,
            WolfType::Omega => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WolfState {
    Idle = 0,
    Prowl = 1,
    Seek = 2,
    Circle = 3,
    Harass = 4,
    Retreat = 5,
    Howl = 6,
    Flee = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Emotion {
    Calm = 0,
    Aggressive = 1,
    Fearful = 2,
    Confident = 3,
    Desperate = 4,
    Hurt = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PackRole {
    None = 0,
    Lead = 1,
    Flanker = 2,
    Support = 3,
    Chaser = 4,
}

/// What a wolf remembers about the player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WolfMemory {
    pub last_seen_player_pos: Option<Vec2F>,
    pub noticed_at: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wolf {
    pub id: u32,
    pub pos: Vec2F,
    pub vel: Vec2F,
    pub facing: Vec2F,
    pub hp: Fixed,
    pub wolf_type: WolfType,
    pub state: WolfState,
    /// Sim time the current state was entered.
    pub state_entered: Fixed,
    pub pack_id: u32,
    pub role: PackRole,
    pub emotion: Emotion,
    pub aggression: Fixed,
    pub morale: Fixed,
    pub stamina: Fixed,
    pub coordination: Fixed,
    pub memory: WolfMemory,
    /// Physics body carrying this wolf.
    pub body_id: u32,
    /// Orbit parameter while circling, in turns.
    pub circle_phase: Fixed,
    pub attack_ready_at: Fixed,
    /// Parry stagger; no movement or attacks until this passes.
    pub stunned_until: Fixed,
    pub last_vocal_at: Fixed,
    /// Sim time of the last hit taken, for the Hurt emotion.
    pub last_hurt_at: Fixed,
}

impl Wolf {
    pub fn new(id: u32, wolf_type: WolfType, pos: Vec2F) -> Wolf {
        Wolf {
            id,
            pos,
            vel: Vec2F::ZERO,
            facing: Vec2F::UNIT_X,
            hp: wolf_type.max_hp(),
            wolf_type,
            state: WolfState::Idle,
            state_entered: Fixed::ZERO,
            pack_id: 0,
            role: PackRole::None,
            emotion: Emotion::Calm,
            aggression: wolf_type.base_aggression(),
            morale: Fixed::from_ratio(60, 100),
            stamina: Fixed::ONE,
            coordination: Fixed::from_ratio(50, 100),
            memory: WolfMemory::default(),
            body_id: INVALID_ID,
            circle_phase: Fixed::ZERO,
            attack_ready_at: Fixed::ZERO,
            stunned_until: -Fixed::ONE,
            last_vocal_at: -Fixed::from_int(100),
            last_hurt_at: -Fixed::from_int(100),
        }
    }

    pub fn enter_state(&mut self, state: WolfState, now: Fixed) {
        if self.state != state {
            self.state = state;
            self.state_entered = now;
        }
    }

    pub fn time_in_state(&self, now: Fixed) -> Fixed {
        now - self.state_entered
    }

    /// Update the emotional read from vitals and pack context. Runs after
    /// perception, before plan evaluation.
    pub fn update_emotion(&mut self, now: Fixed, pack_alive: bool, pack_committed: bool) {
        let hp_frac = self.hp / self.wolf_type.max_hp();
        self.emotion = if now - self.last_hurt_at < Fixed::ONE {
            Emotion::Hurt
        } else if !pack_alive && hp_frac < Fixed::from_ratio(40, 100) {
            Emotion::Desperate
        } else if hp_frac < Fixed::from_ratio(30, 100) {
            Emotion::Fearful
        } else if self.morale > Fixed::from_ratio(70, 100) && pack_committed {
            Emotion::Confident
        } else if self.aggression > Fixed::from_ratio(70, 100) {
            Emotion::Aggressive
        } else {
            Emotion::Calm
        };
    }

    /// Terror check: broken morale or a desperate, wounded loner flees.
    pub fn terror_triggered(&self) -> bool {
        self.morale < Fixed::from_ratio(15, 100)
            || (self.emotion == Emotion::Desperate
                && self.hp < self.wolf_type.max_hp() * Fixed::from_ratio(20, 100))
    }

    /// Whether vitals force a retreat.
    pub fn should_retreat(&self, tuning: &PackTuning) -> bool {
        let hp_frac = self.hp / self.wolf_type.max_hp();
        hp_frac < tuning.retreat_health || self.stamina < tuning.retreat_stamina
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wolf_starts_idle_and_full() {
        let w = Wolf::new(3, WolfType::Hunter, Vec2F::ZERO);
        assert_eq!(w.state, WolfState::Idle);
        assert_eq!(w.hp, WolfType::Hunter.max_hp());
        assert_eq!(w.role, PackRole::None);
    }

    #[test]
    fn enter_state_tracks_time() {
        let mut w = Wolf::new(0, WolfType::Normal, Vec2F::ZERO);
        w.enter_state(WolfState::Seek, Fixed::from_int(2));
        assert_eq!(w.time_in_state(Fixed::from_int(5)), Fixed::from_int(3));
        // Re-entering the same state does not reset the clock.
        w.enter_state(WolfState::Seek, Fixed::from_int(4));
        assert_eq!(w.state_entered, Fixed::from_int(2));
    }

    #[test]
    fn low_hp_reads_fearful() {
        let mut w = Wolf::new(0, WolfType::Normal, Vec2F::ZERO);
        w.hp = WolfType::Normal.max_hp() * Fixed::from_ratio(20, 100);
        w.update_emotion(Fixed::from_int(10), true, false);
        assert_eq!(w.emotion, Emotion::Fearful);
    }

    #[test]
    fn recent_hit_reads_hurt() {
        let mut w = Wolf::new(0, WolfType::Normal, Vec2F::ZERO);
        w.last_hurt_at = Fixed::from_int(9);
        w.update_emotion(Fixed::from_ratio(95, 10), true, false);
        assert_eq!(w.emotion, Emotion::Hurt);
    }

    #[test]
    fn broken_morale_triggers_terror() {
        let mut w = Wolf::new(0, WolfType::Normal, Vec2F::ZERO);
        w.morale = Fixed::from_ratio(10, 100);
        assert!(w.terror_triggered());
    }

    #[test]
    fn retreat_on_low_stamina() {
        let tuning = PackTuning::default();
        let mut w = Wolf::new(0, WolfType::Normal, Vec2F::ZERO);
        w.stamina = Fixed::from_ratio(10, 100);
        assert!(w.should_retreat(&tuning));
    }
}

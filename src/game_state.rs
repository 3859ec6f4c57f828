//! Game flow: the phase state machine, currencies, and the registries that
//! map external indices to internal ids.

use serde::{Deserialize, Serialize};

use crate::config::{self, Biome, INVALID_ID, MAX_BARRELS};
use crate::events::{EventQueue, SimEvent};
use crate::math::Fixed;

/// Coarse game-loop mode. Transitions follow a fixed directed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    Explore = 0,
    Fight = 1,
    Choose = 2,
    PowerUp = 3,
    Risk = 4,
    Escalate = 5,
    CashOut = 6,
    Reset = 7,
    GameOver = 8,
}

impl Phase {
    pub fn from_u8(v: u8) -> Option<Phase> {
        Some(match v {
            0 => Phase::Explore,
            1 => Phase::Fight,
            2 => Phase::Choose,
            3 => Phase::PowerUp,
            4 => Phase::Risk,
            5 => Phase::Escalate,
            6 => Phase::CashOut,
            7 => Phase::Reset,
            8 => Phase::GameOver,
            _ => return None,
        })
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// The outgoing edges of the phase graph.
    pub fn can_transition_to(self, to: Phase) -> bool {
        use Phase::*;
        if to == Reset {
            // A run reset is reachable from anywhere.
            return true;
        }
        matches!(
            (self, to),
            (Explore, Fight)
                | (Explore, GameOver)
                | (Fight, Choose)
                | (Fight, GameOver)
                | (Choose, PowerUp)
                | (Choose, Risk)
                | (PowerUp, Risk)
                | (PowerUp, Explore)
                | (Risk, Escalate)
                | (Risk, CashOut)
                | (Risk, GameOver)
                | (Escalate, CashOut)
                | (Escalate, Fight)
                | (Escalate, GameOver)
                | (CashOut, Explore)
                | (Reset, Explore)
                | (GameOver, Reset)
        )
    }
}

/// Destructible barrel: a registry entry wrapping a physics body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Barrel {
    pub body_id: u32,
    pub hp: Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: Phase,
    pub phase_start: Fixed,
    pub frame: u32,
    pub gold: u32,
    pub essence: u32,
    pub room_count: u32,
    pub biome: Biome,
    /// External enemy slot -> body id, [`INVALID_ID`] when empty.
    enemy_bodies: Vec<u32>,
    barrels: [Option<Barrel>; MAX_BARRELS],
}

/// External enemy registry capacity.
pub const MAX_ENEMY_SLOTS: usize = 32;

impl GameState {
    pub fn new() -> GameState {
        GameState {
            phase: Phase::Explore,
            phase_start: Fixed::ZERO,
            frame: 0,
            gold: 0,
            essence: 0,
            room_count: 0,
            biome: Biome::Forest,
            enemy_bodies: vec![INVALID_ID; MAX_ENEMY_SLOTS],
            barrels: [None; MAX_BARRELS],
        }
    }

    // -- phase FSM --------------------------------------------------------

    pub fn time_in_phase(&self, now: Fixed) -> Fixed {
        now - self.phase_start
    }

    /// Attempt a transition. Illegal edges and under-minimum dwell times are
    /// rejected (unless forced, which still honors the graph).
    pub fn request_transition(
        &mut self,
        to: Phase,
        now: Fixed,
        forced: bool,
        events: &mut EventQueue,
    ) -> bool {
        if !self.phase.can_transition_to(to) {
            return false;
        }
        if !forced && self.time_in_phase(now) < config::phase_min_duration(self.phase) {
            return false;
        }
        let from = self.phase;
        self.phase = to;
        self.phase_start = now;
        events.push(SimEvent::PhaseChanged {
            from: from.as_u8(),
            to: to.as_u8(),
        });
        if to == Phase::Explore && from == Phase::CashOut {
            self.room_count += 1;
            // Rooms rotate through the biome ring.
            self.biome = Biome::from_u8(((self.room_count / 3) % 4) as u8);
        }
        true
    }

    /// Auto transitions driven by the world: combat start/end, death,
    /// bounded phases timing out.
    pub fn update(
        &mut self,
        now: Fixed,
        enemies_alive: usize,
        player_alive: bool,
        events: &mut EventQueue,
    ) {
        self.frame = self.frame.wrapping_add(1);

        if !player_alive && self.phase != Phase::GameOver && self.phase != Phase::Reset {
            if self.phase.can_transition_to(Phase::GameOver) {
                self.request_transition(Phase::GameOver, now, true, events);
            }
            return;
        }

        match self.phase {
            Phase::Explore => {
                if enemies_alive > 0 {
                    self.request_transition(Phase::Fight, now, false, events);
                }
            }
            Phase::Fight => {
                // Minimum dwell absorbs death-animation flourishes.
                if enemies_alive == 0 {
                    self.request_transition(Phase::Choose, now, false, events);
                }
            }
            _ => {
                if let Some(max) = config::phase_max_duration(self.phase) {
                    if self.time_in_phase(now) >= max {
                        let fallback = match self.phase {
                            Phase::Risk => Phase::CashOut,
                            Phase::Escalate => Phase::CashOut,
                            Phase::Reset => Phase::Explore,
                            _ => return,
                        };
                        self.request_transition(fallback, now, true, events);
                    }
                }
            }
        }
    }

    // -- currencies -------------------------------------------------------

    pub fn award_gold(&mut self, amount: u32, events: &mut EventQueue) {
        if amount == 0 {
            return;
        }
        self.gold = self.gold.saturating_add(amount);
        events.push(SimEvent::GoldAwarded { amount });
    }

    pub fn award_essence(&mut self, amount: u32, events: &mut EventQueue) {
        if amount == 0 {
            return;
        }
        self.essence = self.essence.saturating_add(amount);
        events.push(SimEvent::EssenceAwarded { amount });
    }

    // -- enemy registry ---------------------------------------------------

    /// Bind an external enemy slot to a body id. Out-of-range slots report
    /// the sentinel.
    pub fn register_enemy(&mut self, slot: u32, body_id: u32) -> bool {
        match self.enemy_bodies.get_mut(slot as usize) {
            Some(entry) => {
                *entry = body_id;
                true
            }
            None => false,
        }
    }

    pub fn enemy_body(&self, slot: u32) -> u32 {
        self.enemy_bodies
            .get(slot as usize)
            .copied()
            .unwrap_or(INVALID_ID)
    }

    pub fn unregister_enemy(&mut self, slot: u32) -> u32 {
        match self.enemy_bodies.get_mut(slot as usize) {
            Some(entry) => std::mem::replace(entry, INVALID_ID),
            None => INVALID_ID,
        }
    }

    pub fn enemy_bodies(&self) -> &[u32] {
        &self.enemy_bodies
    }

    // -- barrels ----------------------------------------------------------

    /// Place a barrel into the first free slot; sentinel when full.
    pub fn add_barrel(&mut self, body_id: u32, hp: Fixed) -> u32 {
        for (i, slot) in self.barrels.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Barrel { body_id, hp });
                return i as u32;
            }
        }
        INVALID_ID
    }

    pub fn barrel(&self, index: u32) -> Option<&Barrel> {
        self.barrels.get(index as usize).and_then(|s| s.as_ref())
    }

    pub fn barrels(&self) -> &[Option<Barrel>; MAX_BARRELS] {
        &self.barrels
    }

    /// Damage a barrel; on destruction the entry is freed and the body id
    /// returned so the coordinator can detonate and clean up.
    pub fn damage_barrel(&mut self, index: u32, damage: Fixed, events: &mut EventQueue) -> Option<u32> {
        let slot = self.barrels.get_mut(index as usize)?;
        let barrel = slot.as_mut()?;
        barrel.hp = (barrel.hp - damage).max(Fixed::ZERO);
        if barrel.hp > Fixed::ZERO {
            return None;
        }
        let body_id = barrel.body_id;
        *slot = None;
        events.push(SimEvent::BarrelDestroyed { index });
        Some(body_id)
    }

    // -- snapshot plumbing ------------------------------------------------

    pub fn restore_registries(&mut self, enemy_bodies: Vec<u32>, barrels: [Option<Barrel>; MAX_BARRELS]) {
        self.enemy_bodies = enemy_bodies;
        self.barrels = barrels;
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sec(v: i32) -> Fixed {
        Fixed::from_int(v)
    }

    #[test]
    fn core_loop_edges_are_legal() {
        assert!(Phase::Explore.can_transition_to(Phase::Fight));
        assert!(Phase::Fight.can_transition_to(Phase::Choose));
        assert!(Phase::Choose.can_transition_to(Phase::PowerUp));
        assert!(Phase::PowerUp.can_transition_to(Phase::Risk));
        assert!(Phase::Risk.can_transition_to(Phase::Escalate));
        assert!(Phase::Escalate.can_transition_to(Phase::CashOut));
        assert!(Phase::CashOut.can_transition_to(Phase::Explore));
    }

    #[test]
    fn illegal_edges_are_rejected() {
        assert!(!Phase::Explore.can_transition_to(Phase::CashOut));
        assert!(!Phase::Choose.can_transition_to(Phase::Fight));
        assert!(!Phase::GameOver.can_transition_to(Phase::Fight));
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        assert!(!gs.request_transition(Phase::CashOut, sec(10), false, &mut events));
        assert_eq!(gs.phase, Phase::Explore);
    }

    #[test]
    fn reset_reachable_from_anywhere() {
        for phase in [Phase::Explore, Phase::Fight, Phase::Risk, Phase::GameOver] {
            assert!(phase.can_transition_to(Phase::Reset));
        }
    }

    #[test]
    fn fight_ends_when_enemies_die_after_min_duration() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        assert!(gs.request_transition(Phase::Fight, sec(1), false, &mut events));
        // Enemies dead immediately: held back by the minimum dwell.
        gs.update(sec(2), 0, true, &mut events);
        assert_eq!(gs.phase, Phase::Fight);
        gs.update(sec(4), 0, true, &mut events);
        assert_eq!(gs.phase, Phase::Choose);
    }

    #[test]
    fn explore_starts_fight_when_enemies_spawn() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        gs.update(sec(1), 3, true, &mut events);
        assert_eq!(gs.phase, Phase::Fight);
    }

    #[test]
    fn player_death_forces_game_over() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        gs.request_transition(Phase::Fight, sec(1), false, &mut events);
        gs.update(sec(2), 4, false, &mut events);
        assert_eq!(gs.phase, Phase::GameOver);
    }

    #[test]
    fn frame_counter_increments_once_per_update() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        for _ in 0..10 {
            gs.update(sec(1), 0, true, &mut events);
        }
        assert_eq!(gs.frame, 10);
    }

    #[test]
    fn cash_out_rolls_the_room() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        gs.phase = Phase::CashOut;
        gs.phase_start = sec(0);
        assert!(gs.request_transition(Phase::Explore, sec(1), false, &mut events));
        assert_eq!(gs.room_count, 1);
    }

    #[test]
    fn barrel_lifecycle() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        let idx = gs.add_barrel(7, Fixed::from_ratio(30, 100));
        assert_ne!(idx, INVALID_ID);
        assert!(gs.damage_barrel(idx, Fixed::from_ratio(10, 100), &mut events).is_none());
        let body = gs.damage_barrel(idx, Fixed::ONE, &mut events);
        assert_eq!(body, Some(7));
        assert!(gs.barrel(idx).is_none());
    }

    #[test]
    fn enemy_registry_bounds() {
        let mut gs = GameState::new();
        assert!(gs.register_enemy(0, 42));
        assert_eq!(gs.enemy_body(0), 42);
        assert!(!gs.register_enemy(MAX_ENEMY_SLOTS as u32, 1));
        assert_eq!(gs.enemy_body(999), INVALID_ID);
        assert_eq!(gs.unregister_enemy(0), 42);
        assert_eq!(gs.enemy_body(0), INVALID_ID);
    }

    #[test]
    fn risk_times_out_to_cash_out() {
        let mut gs = GameState::new();
        let mut events = EventQueue::new();
        gs.phase = Phase::Risk;
        gs.phase_start = sec(0);
        gs.update(sec(31), 0, true, &mut events);
        assert_eq!(gs.phase, Phase::CashOut);
    }
}

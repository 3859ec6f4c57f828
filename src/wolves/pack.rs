//! Pack-level coordination: the plan state machine, role assignment and the
//! rolling player-skill estimate.

use serde::{Deserialize, Serialize};

use crate::config::{INVALID_ID, PackTuning};
use crate::math::Fixed;

use super::wolf::PackRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PackPlan {
    /// Watch the player, gather the pack.
    Observe = 0,
    /// Roles locked, signal sent; the pack is about to strike.
    Commit = 1,
    /// Members execute role maneuvers in parallel.
    Harass = 2,
    /// Break off and recover.
    Retreat = 3,
    /// Re-form after a failed or finished engagement.
    Regroup = 4,
}

impl PackPlan {
    pub fn from_u8(v: u8) -> PackPlan {
        match v {
            1 => PackPlan::Commit,
            2 => PackPlan::Harass,
            3 => PackPlan::Retreat,
            4 => PackPlan::Regroup,
            _ => PackPlan::Observe,
        }
    }
}

/// Aggregate member stats the plan evaluation runs on; computed by the wolf
/// manager each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackSenses {
    pub member_count: usize,
    /// Average hp as a fraction of each wolf's maximum.
    pub avg_hp: Fixed,
    pub avg_stamina: Fixed,
    /// How hostile the ground near the player is (hazard density, 0..1).
    pub terrain_pressure: Fixed,
    /// Any member currently sees the player.
    pub player_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub id: u32,
    pub member_ids: Vec<u32>,
    pub plan: PackPlan,
    pub plan_entered: Fixed,
    pub morale: Fixed,
    /// Seconds the pack has been holding a synchronized maneuver.
    pub sync_timer: Fixed,
    pub coordination_bonus: Fixed,
    pub last_success_time: Fixed,
    pub last_failure_time: Fixed,
    /// Current Lead member, or [`INVALID_ID`].
    pub leader_id: u32,
    /// Rolling window: attacks thrown at the player...
    pub(crate) attacks_thrown: u8,
    /// ...and how many the player defended (parry/dodge/block).
    pub(crate) attacks_defended: u8,
}

impl Pack {
    pub fn new(id: u32) -> Pack {
        Pack {
            id,
            member_ids: Vec::new(),
            plan: PackPlan::Observe,
            plan_entered: Fixed::ZERO,
            morale: Fixed::from_ratio(60, 100),
            sync_timer: Fixed::ZERO,
            coordination_bonus: Fixed::ZERO,
            last_success_time: -Fixed::from_int(100),
            last_failure_time: -Fixed::from_int(100),
            leader_id: INVALID_ID,
            attacks_thrown: 0,
            attacks_defended: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.member_ids.is_empty()
    }

    pub fn add_member(&mut self, wolf_id: u32) {
        if !self.member_ids.contains(&wolf_id) {
            self.member_ids.push(wolf_id);
        }
    }

    /// Drop a dead or fleeing member. Losing a wolf dents morale; losing the
    /// leader clears the Lead slot so the next Commit reassigns it.
    pub fn remove_member(&mut self, wolf_id: u32) {
        let before = self.member_ids.len();
        self.member_ids.retain(|&m| m != wolf_id);
        if self.member_ids.len() != before {
            self.morale = (self.morale - Fixed::from_ratio(15, 100)).max(Fixed::ZERO);
        }
        if self.leader_id == wolf_id {
            self.leader_id = INVALID_ID;
        }
    }

    // -- player skill estimate -------------------------------------------

    /// Record the outcome of one attack against the player.
    pub fn record_attack_result(&mut self, defended: bool, now: Fixed, tuning: &PackTuning) {
        self.attacks_thrown = self.attacks_thrown.saturating_add(1);
        if defended {
            self.attacks_defended = self.attacks_defended.saturating_add(1);
            self.last_failure_time = now;
            self.morale = (self.morale - Fixed::from_ratio(4, 100)).max(Fixed::ZERO);
        } else {
            self.last_success_time = now;
            self.morale = (self.morale + Fixed::from_ratio(6, 100)).min(Fixed::ONE);
            self.coordination_bonus =
                (self.coordination_bonus + Fixed::from_ratio(2, 100)).min(Fixed::HALF);
        }
        // Keep the window rolling: decay both counters together.
        if self.attacks_thrown >= tuning.skill_window {
            self.attacks_thrown /= 2;
            self.attacks_defended /= 2;
        }
    }

    /// Player skill in [0, 1]: fraction of recent attacks they defended.
    pub fn player_skill_estimate(&self) -> Fixed {
        if self.attacks_thrown == 0 {
            return Fixed::HALF;
        }
        Fixed::from_ratio(self.attacks_defended as i32, self.attacks_thrown as i32)
    }

    // -- plan FSM ---------------------------------------------------------

    fn enter_plan(&mut self, plan: PackPlan, now: Fixed) -> Option<PackPlan> {
        if self.plan == plan {
            return None;
        }
        self.plan = plan;
        self.plan_entered = now;
        self.sync_timer = Fixed::ZERO;
        Some(plan)
    }

    /// Willingness to commit: stronger with more healthy members and weaker
    /// against a skilled player or hostile ground.
    fn commit_score(&self, senses: &PackSenses) -> Fixed {
        let member_frac =
            Fixed::from_ratio(senses.member_count.min(6) as i32, 6);
        let skill_penalty = self.player_skill_estimate();
        member_frac * Fixed::from_ratio(30, 100)
            + senses.avg_hp * Fixed::from_ratio(35, 100)
            + (Fixed::ONE - skill_penalty) * Fixed::from_ratio(20, 100)
            + self.coordination_bonus * Fixed::from_ratio(15, 100)
            - senses.terrain_pressure * Fixed::from_ratio(20, 100)
    }

    /// Advance the plan FSM one tick. Returns the new plan on a transition.
    pub fn evaluate_plan(
        &mut self,
        now: Fixed,
        senses: &PackSenses,
        tuning: &PackTuning,
    ) -> Option<PackPlan> {
        if !self.is_alive() {
            return None;
        }
        let in_plan = now - self.plan_entered;
        self.sync_timer = match self.plan {
            PackPlan::Commit | PackPlan::Harass => in_plan,
            _ => Fixed::ZERO,
        };
        match self.plan {
            PackPlan::Observe => {
                if self.morale < tuning.retreat_morale {
                    return self.enter_plan(PackPlan::Retreat, now);
                }
                if senses.player_visible
                    && in_plan >= tuning.observe_time
                    && self.commit_score(senses) > Fixed::HALF
                {
                    return self.enter_plan(PackPlan::Commit, now);
                }
                None
            }
            PackPlan::Commit => {
                // Short synchronization beat between the signal and the rush.
                if in_plan >= Fixed::HALF {
                    return self.enter_plan(PackPlan::Harass, now);
                }
                None
            }
            PackPlan::Harass => {
                if self.morale < tuning.retreat_morale {
                    return self.enter_plan(PackPlan::Retreat, now);
                }
                if in_plan >= tuning.harass_time {
                    // Outcome: recent success keeps spirits up.
                    let succeeded = self.last_success_time > self.last_failure_time;
                    let next = if succeeded {
                        PackPlan::Regroup
                    } else {
                        self.coordination_bonus =
                            (self.coordination_bonus - Fixed::from_ratio(5, 100))
                                .max(Fixed::ZERO);
                        PackPlan::Retreat
                    };
                    return self.enter_plan(next, now);
                }
                None
            }
            PackPlan::Retreat => {
                if in_plan >= tuning.regroup_time + tuning.regroup_time / Fixed::TWO {
                    self.morale = (self.morale + Fixed::from_ratio(20, 100)).min(Fixed::ONE);
                    return self.enter_plan(PackPlan::Observe, now);
                }
                None
            }
            PackPlan::Regroup => {
                if in_plan >= tuning.regroup_time {
                    return self.enter_plan(PackPlan::Observe, now);
                }
                None
            }
        }
    }

    /// Force a plan change from outside (member death fallout).
    pub fn force_plan(&mut self, plan: PackPlan, now: Fixed) -> Option<PackPlan> {
        self.enter_plan(plan, now)
    }

    // -- roles ------------------------------------------------------------

    /// Assign roles for a Commit. `candidates` is `(wolf_id, hp,
    /// coordination)` for each live member; exactly one Lead comes out,
    /// picked by hp x coordination with ties to the smallest id.
    pub fn assign_roles(&mut self, candidates: &[(u32, Fixed, Fixed)]) -> Vec<(u32, PackRole)> {
        let mut scored: Vec<(u32, Fixed)> = candidates
            .iter()
            .map(|&(id, hp, coordination)| (id, hp * coordination))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        const SUPPORT_ROLES: [PackRole; 3] =
            [PackRole::Flanker, PackRole::Support, PackRole::Chaser];
        let mut out = Vec::with_capacity(scored.len());
        for (rank, (id, _)) in scored.iter().enumerate() {
            let role = if rank == 0 {
                self.leader_id = *id;
                PackRole::Lead
            } else {
                SUPPORT_ROLES[(rank - 1) % SUPPORT_ROLES.len()]
            };
            out.push((*id, role));
        }
        if scored.is_empty() {
            self.leader_id = INVALID_ID;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn senses(count: usize) -> PackSenses {
        PackSenses {
            member_count: count,
            avg_hp: Fixed::ONE,
            avg_stamina: Fixed::ONE,
            terrain_pressure: Fixed::ZERO,
            player_visible: true,
        }
    }

    fn tuning() -> PackTuning {
        PackTuning::default()
    }

    #[test]
    fn observe_commits_after_observe_time() {
        let mut pack = Pack::new(1);
        pack.add_member(0);
        pack.add_member(1);
        pack.add_member(2);
        pack.add_member(3);
        assert_eq!(
            pack.evaluate_plan(Fixed::ONE, &senses(4), &tuning()),
            None,
            "too early"
        );
        assert_eq!(
            pack.evaluate_plan(Fixed::from_int(2), &senses(4), &tuning()),
            Some(PackPlan::Commit)
        );
    }

    #[test]
    fn commit_rolls_into_harass() {
        let mut pack = Pack::new(1);
        pack.add_member(0);
        pack.force_plan(PackPlan::Commit, Fixed::ZERO);
        assert_eq!(
            pack.evaluate_plan(Fixed::ONE, &senses(1), &tuning()),
            Some(PackPlan::Harass)
        );
    }

    #[test]
    fn harass_outcome_depends_on_success() {
        let t = tuning();
        let mut pack = Pack::new(1);
        pack.add_member(0);
        pack.force_plan(PackPlan::Harass, Fixed::ZERO);
        pack.record_attack_result(false, Fixed::ONE, &t); // landed
        assert_eq!(
            pack.evaluate_plan(t.harass_time, &senses(1), &t),
            Some(PackPlan::Regroup)
        );

        let mut failed = Pack::new(2);
        failed.add_member(0);
        failed.force_plan(PackPlan::Harass, Fixed::ZERO);
        failed.record_attack_result(true, Fixed::ONE, &t); // defended
        assert_eq!(
            failed.evaluate_plan(t.harass_time, &senses(1), &t),
            Some(PackPlan::Retreat)
        );
    }

    #[test]
    fn lead_is_unique_and_ties_break_to_smallest_id() {
        let mut pack = Pack::new(1);
        let hp = Fixed::from_ratio(40, 100);
        let coord = Fixed::HALF;
        let roles = pack.assign_roles(&[(7, hp, coord), (3, hp, coord), (9, hp, coord), (5, hp, coord)]);
        let leads: Vec<u32> = roles
            .iter()
            .filter(|(_, r)| *r == PackRole::Lead)
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(leads, vec![3], "single Lead, smallest id on tie");
        assert_eq!(pack.leader_id, 3);
        // Remaining three get distinct non-Lead roles.
        let mut others: Vec<PackRole> = roles
            .iter()
            .filter(|(_, r)| *r != PackRole::Lead)
            .map(|(_, r)| *r)
            .collect();
        others.sort_by_key(|r| *r as u8);
        assert_eq!(
            others,
            vec![PackRole::Flanker, PackRole::Support, PackRole::Chaser]
        );
    }

    #[test]
    fn losing_the_leader_clears_the_slot() {
        let mut pack = Pack::new(1);
        pack.add_member(2);
        pack.add_member(4);
        pack.assign_roles(&[
            (2, Fixed::ONE, Fixed::ONE),
            (4, Fixed::HALF, Fixed::HALF),
        ]);
        assert_eq!(pack.leader_id, 2);
        let morale_before = pack.morale;
        pack.remove_member(2);
        assert_eq!(pack.leader_id, INVALID_ID);
        assert!(pack.morale < morale_before);
    }

    #[test]
    fn skill_estimate_tracks_defenses() {
        let t = tuning();
        let mut pack = Pack::new(1);
        for _ in 0..4 {
            pack.record_attack_result(true, Fixed::ONE, &t);
        }
        assert_eq!(pack.player_skill_estimate(), Fixed::ONE);
        for _ in 0..20 {
            pack.record_attack_result(false, Fixed::ONE, &t);
        }
        assert!(pack.player_skill_estimate() < Fixed::HALF);
    }

    #[test]
    fn low_morale_forces_retreat_from_observe() {
        let mut pack = Pack::new(1);
        pack.add_member(0);
        pack.morale = Fixed::from_ratio(10, 100);
        assert_eq!(
            pack.evaluate_plan(Fixed::from_int(5), &senses(1), &tuning()),
            Some(PackPlan::Retreat)
        );
    }
}

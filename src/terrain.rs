//! Static obstacles and environmental hazards.
//!
//! Obstacles are up to sixteen static circles placed by a generator that
//! keeps the spawn clear, forbids pairwise overlap, and verifies the arena
//! stays walkable with a coarse BFS before accepting a layout. Hazards are
//! bounded records with per-type activation rules; damage to the player is
//! suppressed while roll i-frames are up, and wolves route around every
//! hazard type except ice.

use serde::{Deserialize, Serialize};

use crate::config::{MAX_HAZARDS, MAX_OBSTACLES, Biome};
use crate::events::{EventQueue, SimEvent};
use crate::math::{Fixed, Vec2F};
use crate::rng::{RngScope, SimRng};

// ---------------------------------------------------------------------------
// Obstacles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub center: Vec2F,
    pub radius: Fixed,
}

/// BFS grid resolution for the reachability check.
const GRID_W: usize = 41;
const GRID_H: usize = 23;
/// Layout attempts before the generator settles for fewer obstacles.
const MAX_PLACEMENT_ATTEMPTS: u32 = 40;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
}

impl ObstacleField {
    pub fn new() -> ObstacleField {
        ObstacleField::default()
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn restore(&mut self, obstacles: Vec<Obstacle>) {
        self.obstacles = obstacles;
    }

    /// Place up to `count` obstacles in normalized space, keeping a clear
    /// circle around `spawn` and a walkable path from spawn to center.
    /// Falls back to fewer obstacles when a valid layout will not come
    /// together within the attempt budget.
    pub fn generate(&mut self, rng: &mut SimRng, count: usize, spawn: Vec2F) {
        let count = count.min(MAX_OBSTACLES);
        let spawn_clearance = Fixed::from_ratio(12, 100);
        let mut target = count;
        loop {
            self.obstacles.clear();
            let mut attempts = 0;
            while self.obstacles.len() < target && attempts < MAX_PLACEMENT_ATTEMPTS {
                attempts += 1;
                let x = Fixed::from_ratio(10, 100)
                    + rng.next_unit(RngScope::Physics) * Fixed::from_ratio(80, 100);
                let y = Fixed::from_ratio(10, 100)
                    + rng.next_unit(RngScope::Physics) * Fixed::from_ratio(80, 100);
                let radius = Fixed::from_ratio(3, 100)
                    + rng.next_unit(RngScope::Physics) * Fixed::from_ratio(4, 100);
                let candidate = Obstacle {
                    center: Vec2F::new(x, y),
                    radius,
                };
                if candidate.center.distance(spawn) < radius + spawn_clearance {
                    continue;
                }
                let overlaps = self.obstacles.iter().any(|o| {
                    o.center.distance(candidate.center) < o.radius + candidate.radius
                });
                if !overlaps {
                    self.obstacles.push(candidate);
                }
            }
            if self.center_reachable(spawn) || target == 0 {
                break;
            }
            // Layout walled the player in; retry with one fewer obstacle.
            target -= 1;
        }
    }

    /// Coarse BFS from the spawn cell to the arena center.
    fn center_reachable(&self, spawn: Vec2F) -> bool {
        let blocked = |cx: usize, cy: usize| -> bool {
            let pos = Vec2F::new(
                Fixed::from_ratio(cx as i32 * 2 + 1, (GRID_W * 2) as i32),
                Fixed::from_ratio(cy as i32 * 2 + 1, (GRID_H * 2) as i32),
            );
            self.obstacles
                .iter()
                .any(|o| o.center.distance(pos) < o.radius)
        };
        let cell_of = |p: Vec2F| -> (usize, usize) {
            let cx = (p.x * Fixed::from_int(GRID_W as i32)).to_int();
            let cy = (p.y * Fixed::from_int(GRID_H as i32)).to_int();
            (
                (cx.max(0) as usize).min(GRID_W - 1),
                (cy.max(0) as usize).min(GRID_H - 1),
            )
        };
        let start = cell_of(spawn);
        let goal = cell_of(Vec2F::new(Fixed::HALF, Fixed::HALF));
        if blocked(start.0, start.1) || blocked(goal.0, goal.1) {
            return false;
        }

        let mut visited = [[false; GRID_H]; GRID_W];
        let mut queue = std::collections::VecDeque::new();
        visited[start.0][start.1] = true;
        queue.push_back(start);
        while let Some((x, y)) = queue.pop_front() {
            if (x, y) == goal {
                return true;
            }
            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if nx < GRID_W && ny < GRID_H && !visited[nx][ny] && !blocked(nx, ny) {
                    visited[nx][ny] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
        false
    }

    /// Push a circle out of every overlapping obstacle, two passes for
    /// stability, with a small overshoot so the contact does not re-trigger
    /// next frame.
    pub fn resolve_circle(&self, pos: Vec2F, radius: Fixed) -> Vec2F {
        let overshoot = Fixed::from_ratio(1, 1000);
        let mut p = pos;
        for _ in 0..2 {
            for obstacle in &self.obstacles {
                let delta = p.sub(obstacle.center);
                let dist = delta.length();
                let min_dist = obstacle.radius + radius;
                if dist < min_dist {
                    let normal = if dist.is_zero() {
                        Vec2F::UNIT_X
                    } else {
                        delta.scale(Fixed::ONE / dist)
                    };
                    p = obstacle
                        .center
                        .add(normal.scale(min_dist + overshoot));
                }
            }
        }
        p
    }

    /// True when any obstacle blocks the segment `from -> to`.
    pub fn blocks_ray(&self, from: Vec2F, to: Vec2F) -> bool {
        let seg = to.sub(from);
        let len_sq = seg.length_sq();
        self.obstacles.iter().any(|o| {
            let t = if len_sq.is_zero() {
                Fixed::ZERO
            } else {
                (o.center.sub(from).dot(seg) / len_sq).clamp(Fixed::ZERO, Fixed::ONE)
            };
            o.center.distance(from.add(seg.scale(t))) < o.radius
        })
    }
}

// ---------------------------------------------------------------------------
// Status effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusKind {
    Slow = 0,
    Burn = 1,
    Poison = 2,
    Chill = 3,
    Shock = 4,
}

impl StatusKind {
    pub fn from_u8(v: u8) -> StatusKind {
        match v {
            1 => StatusKind::Burn,
            2 => StatusKind::Poison,
            3 => StatusKind::Chill,
            4 => StatusKind::Shock,
            _ => StatusKind::Slow,
        }
    }
}

/// A status application produced by a hazard this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusApply {
    pub kind: StatusKind,
    /// Strength in [0, 1]; for Slow this is the speed reduction.
    pub magnitude: Fixed,
    /// Seconds the effect lingers.
    pub duration: Fixed,
}

// ---------------------------------------------------------------------------
// Hazards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HazardKind {
    SpikeTrap = 0,
    Pit = 1,
    BearTrap = 2,
    PoisonGas = 3,
    FireTrap = 4,
    IcePatch = 5,
    SpikeWall = 6,
    ElectricField = 7,
    // Biome-specific
    Foliage = 8,
    Mud = 9,
    Water = 10,
    Quicksand = 11,
    Rockfall = 12,
    TallGrass = 13,
    Wind = 14,
}

impl HazardKind {
    pub fn from_u8(v: u8) -> Option<HazardKind> {
        Some(match v {
            0 => HazardKind::SpikeTrap,
            1 => HazardKind::Pit,
            2 => HazardKind::BearTrap,
            3 => HazardKind::PoisonGas,
            4 => HazardKind::FireTrap,
            5 => HazardKind::IcePatch,
            6 => HazardKind::SpikeWall,
            7 => HazardKind::ElectricField,
            8 => HazardKind::Foliage,
            9 => HazardKind::Mud,
            10 => HazardKind::Water,
            11 => HazardKind::Quicksand,
            12 => HazardKind::Rockfall,
            13 => HazardKind::TallGrass,
            14 => HazardKind::Wind,
            _ => return None,
        })
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Wolves path around every hazard except ice.
    pub fn enemy_avoids(self) -> bool {
        self != HazardKind::IcePatch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationRule {
    /// Fires on a fixed interval for a short active window.
    Periodic,
    /// Fires once, then stays dead.
    OneShot,
    /// Applies while the player overlaps, rate-limited by cooldown.
    Continuous,
    /// Alternates an on-window (`duration`) and an off-window (`cooldown`).
    Cyclic,
}

/// Static behaviour table for a hazard type: activation rule, contact
/// damage, damage/trigger interval, on-window seconds, status effect.
fn hazard_profile(kind: HazardKind) -> (ActivationRule, Fixed, Fixed, Fixed, Option<StatusApply>) {
    use ActivationRule::*;
    let pct = |n: i32| Fixed::from_ratio(n, 100);
    let status = |kind, magnitude, duration| {
        Some(StatusApply {
            kind,
            magnitude,
            duration,
        })
    };
    match kind {
        HazardKind::SpikeTrap => (Periodic, pct(15), Fixed::from_int(2), pct(40), None),
        HazardKind::Pit => (Continuous, pct(25), Fixed::from_int(1), Fixed::ZERO, None),
        HazardKind::BearTrap => (
            OneShot,
            pct(20),
            Fixed::ZERO,
            Fixed::ZERO,
            status(StatusKind::Slow, pct(80), Fixed::from_int(2)),
        ),
        HazardKind::PoisonGas => (
            Continuous,
            Fixed::ZERO,
            Fixed::HALF,
            Fixed::ZERO,
            status(StatusKind::Poison, pct(5), Fixed::from_int(3)),
        ),
        HazardKind::FireTrap => (
            Cyclic,
            pct(10),
            Fixed::from_int(2),
            Fixed::ONE,
            status(StatusKind::Burn, pct(4), Fixed::from_int(2)),
        ),
        HazardKind::IcePatch => (
            Continuous,
            Fixed::ZERO,
            Fixed::HALF,
            Fixed::ZERO,
            status(StatusKind::Chill, pct(60), Fixed::ONE),
        ),
        HazardKind::SpikeWall => (Periodic, pct(20), Fixed::from_int(3), pct(50), None),
        HazardKind::ElectricField => (
            Cyclic,
            pct(5),
            Fixed::from_ratio(3, 2),
            Fixed::HALF,
            status(StatusKind::Shock, pct(40), Fixed::ONE),
        ),
        HazardKind::Foliage => (
            Continuous,
            Fixed::ZERO,
            Fixed::HALF,
            Fixed::ZERO,
            status(StatusKind::Slow, pct(10), Fixed::HALF),
        ),
        HazardKind::Mud => (
            Continuous,
            Fixed::ZERO,
            Fixed::HALF,
            Fixed::ZERO,
            status(StatusKind::Slow, pct(50), Fixed::HALF),
        ),
        HazardKind::Water => (
            Continuous,
            Fixed::ZERO,
            Fixed::HALF,
            Fixed::ZERO,
            status(StatusKind::Slow, pct(30), Fixed::HALF),
        ),
        HazardKind::Quicksand => (
            Continuous,
            pct(2),
            Fixed::HALF,
            Fixed::ZERO,
            status(StatusKind::Slow, pct(70), Fixed::ONE),
        ),
        HazardKind::Rockfall => (Periodic, pct(30), Fixed::from_int(4), pct(30), None),
        HazardKind::TallGrass => (Continuous, Fixed::ZERO, Fixed::ONE, Fixed::ZERO, None),
        HazardKind::Wind => (
            Cyclic,
            Fixed::ZERO,
            Fixed::from_int(3),
            Fixed::from_int(2),
            status(StatusKind::Slow, pct(20), Fixed::HALF),
        ),
    }
}

/// Hazard types a biome's generator may roll, beyond the core set.
pub fn biome_hazard_table(biome: Biome) -> &'static [HazardKind] {
    match biome {
        Biome::Forest => &[
            HazardKind::SpikeTrap,
            HazardKind::BearTrap,
            HazardKind::PoisonGas,
            HazardKind::Foliage,
            HazardKind::TallGrass,
        ],
        Biome::Swamp => &[
            HazardKind::PoisonGas,
            HazardKind::Pit,
            HazardKind::Mud,
            HazardKind::Water,
            HazardKind::Quicksand,
        ],
        Biome::Mountain => &[
            HazardKind::SpikeTrap,
            HazardKind::IcePatch,
            HazardKind::Rockfall,
            HazardKind::Wind,
        ],
        Biome::Plains => &[
            HazardKind::SpikeTrap,
            HazardKind::BearTrap,
            HazardKind::FireTrap,
            HazardKind::ElectricField,
            HazardKind::SpikeWall,
            HazardKind::TallGrass,
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub kind: HazardKind,
    pub center: Vec2F,
    pub radius: Fixed,
    pub damage: Fixed,
    /// Interval between triggers (rule-dependent meaning).
    pub cooldown: Fixed,
    pub last_trigger: Fixed,
    pub active: bool,
    /// One-shot hazards flip this once spent.
    pub triggered: bool,
    /// Sim time this hazard armed.
    pub activate_time: Fixed,
    /// On-window length for periodic/cyclic rules.
    pub duration: Fixed,
}

impl Hazard {
    pub fn new(kind: HazardKind, center: Vec2F, radius: Fixed, now: Fixed) -> Hazard {
        let (_, damage, cooldown, duration, _) = hazard_profile(kind);
        Hazard {
            kind,
            center,
            radius,
            damage,
            cooldown,
            last_trigger: -Fixed::from_int(100),
            active: true,
            triggered: false,
            activate_time: now,
            duration,
        }
    }

    /// Whether the hazard is in an "on" window at `now`.
    fn window_open(&self, now: Fixed) -> bool {
        let (rule, _, _, _, _) = hazard_profile(self.kind);
        match rule {
            ActivationRule::Continuous => true,
            ActivationRule::OneShot => !self.triggered,
            ActivationRule::Periodic | ActivationRule::Cyclic => {
                let cycle = self.cooldown + self.duration;
                if cycle <= Fixed::ZERO {
                    return true;
                }
                // Phase within the repeating cycle; on-window leads.
                let elapsed = now - self.activate_time;
                if elapsed < Fixed::ZERO {
                    return false;
                }
                Fixed::from_raw(elapsed.raw() % cycle.raw()) < self.duration
            }
        }
    }
}

/// Result of one hazard tick against the player.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HazardOutcome {
    pub damage: Fixed,
    pub statuses: [Option<StatusApply>; 4],
}

impl HazardOutcome {
    fn add_status(&mut self, status: StatusApply) {
        for slot in self.statuses.iter_mut() {
            if slot.is_none() {
                *slot = Some(status);
                return;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HazardField {
    hazards: Vec<Hazard>,
}

impl HazardField {
    pub fn new() -> HazardField {
        HazardField::default()
    }

    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    pub fn restore(&mut self, hazards: Vec<Hazard>) {
        self.hazards = hazards;
    }

    /// Add a hazard; false when the field is full.
    pub fn add(&mut self, hazard: Hazard) -> bool {
        if self.hazards.len() >= MAX_HAZARDS {
            log::warn!("hazard field full ({})", MAX_HAZARDS);
            return false;
        }
        self.hazards.push(hazard);
        true
    }

    /// Roll `count` hazards from the biome table, avoiding the spawn area
    /// and obstacle interiors.
    pub fn generate(
        &mut self,
        rng: &mut SimRng,
        biome: Biome,
        count: usize,
        spawn: Vec2F,
        obstacles: &ObstacleField,
        now: Fixed,
    ) {
        self.hazards.clear();
        let table = biome_hazard_table(biome);
        let count = count.min(MAX_HAZARDS);
        let mut attempts = 0;
        while self.hazards.len() < count && attempts < MAX_PLACEMENT_ATTEMPTS {
            attempts += 1;
            let kind = table[rng.next_below(RngScope::Physics, table.len() as u32) as usize];
            let x = Fixed::from_ratio(10, 100)
                + rng.next_unit(RngScope::Physics) * Fixed::from_ratio(80, 100);
            let y = Fixed::from_ratio(10, 100)
                + rng.next_unit(RngScope::Physics) * Fixed::from_ratio(80, 100);
            let center = Vec2F::new(x, y);
            let radius = Fixed::from_ratio(4, 100)
                + rng.next_unit(RngScope::Physics) * Fixed::from_ratio(4, 100);
            if center.distance(spawn) < radius + Fixed::from_ratio(15, 100) {
                continue;
            }
            if obstacles
                .obstacles()
                .iter()
                .any(|o| o.center.distance(center) < o.radius + radius)
            {
                continue;
            }
            self.hazards.push(Hazard::new(kind, center, radius, now));
        }
    }

    /// Apply hazards to the player for this frame. Roll i-frames suppress
    /// damage entirely (statuses still land: you can dodge spikes, not mud).
    pub fn update_player(
        &mut self,
        now: Fixed,
        player_pos: Vec2F,
        player_radius: Fixed,
        invulnerable: bool,
        events: &mut EventQueue,
    ) -> HazardOutcome {
        let mut outcome = HazardOutcome::default();
        for (index, hazard) in self.hazards.iter_mut().enumerate() {
            if !hazard.active {
                continue;
            }
            let touching =
                hazard.center.distance(player_pos) < hazard.radius + player_radius;
            if !touching || !hazard.window_open(now) {
                continue;
            }
            let rate_gate = hazard.cooldown <= Fixed::ZERO
                || now - hazard.last_trigger >= hazard.cooldown;
            if !rate_gate {
                continue;
            }
            hazard.last_trigger = now;
            hazard.triggered = true;
            let (rule, _, _, _, status) = hazard_profile(hazard.kind);
            if rule == ActivationRule::OneShot {
                hazard.active = false;
            }
            if !invulnerable && hazard.damage > Fixed::ZERO {
                outcome.damage += hazard.damage;
            }
            if let Some(status) = status {
                outcome.add_status(status);
            }
            events.push(SimEvent::HazardTriggered {
                index: index as u32,
                kind: hazard.kind.as_u8(),
            });
        }
        outcome
    }

    /// True when a position is inside any hazard wolves refuse to cross.
    pub fn repels_enemies_at(&self, pos: Vec2F) -> bool {
        self.hazards.iter().any(|h| {
            h.active && h.kind.enemy_avoids() && h.center.distance(pos) < h.radius
        })
    }
}

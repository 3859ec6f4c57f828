//! Tuning tables and run configuration.
//!
//! Everything here is deterministic data: capacities for the bounded arenas,
//! the canonical combat timings, weapon and biome tables, and the physics
//! space mapping. `SimConfig` round-trips through serde so a host can ship a
//! tuning payload at init; the defaults are the canonical values.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2F};

// ---------------------------------------------------------------------------
// Capacities and sentinels
// ---------------------------------------------------------------------------

/// Sentinel id returned when a bounded arena is full or a lookup misses.
pub const INVALID_ID: u32 = 0xFFFF_FFFF;

pub const MAX_BODIES: usize = 64;
pub const MAX_OBSTACLES: usize = 16;
pub const MAX_HAZARDS: usize = 24;
pub const MAX_WOLVES: usize = 16;
pub const MAX_PACKS: usize = 4;
pub const MAX_BARRELS: usize = 8;
pub const MAX_EXPLOSIONS: usize = 8;
pub const MAX_FORCE_NODES: usize = 16;
pub const MAX_EVENTS: usize = 256;
pub const MAX_VOCALIZATIONS: usize = 16;
pub const MAX_PEERS: usize = 8;

// ---------------------------------------------------------------------------
// Canonical combat timings (milliseconds)
// ---------------------------------------------------------------------------

pub const LIGHT_WINDUP_MS: u32 = 50;
pub const LIGHT_ACTIVE_MS: u32 = 80;
pub const LIGHT_RECOVERY_MS: u32 = 150;

pub const HEAVY_WINDUP_MS: u32 = 150;
pub const HEAVY_ACTIVE_MS: u32 = 120;
pub const HEAVY_RECOVERY_MS: u32 = 250;

pub const SPECIAL_WINDUP_MS: u32 = 200;
pub const SPECIAL_ACTIVE_MS: u32 = 150;
pub const SPECIAL_RECOVERY_MS: u32 = 300;

pub const ROLL_IFRAME_MS: u32 = 300;
pub const ROLL_SLIDE_MS: u32 = 200;

pub const PARRY_WINDOW_MS: u32 = 120;
pub const PARRY_STUN_MS: u32 = 300;
pub const COUNTER_WINDOW_MS: u32 = 200;

pub const INPUT_BUFFER_MS: u32 = 120;
/// Tap window for the Special+direction roll gesture.
pub const TAP_WINDOW_MS: u32 = 120;
/// Hand held past this long becomes a heavy attack.
pub const HEAVY_HOLD_MS: u32 = 250;

pub const COMBO_WINDOW_MS: u32 = 500;
pub const MAX_COMBO: u8 = 5;

// ---------------------------------------------------------------------------
// Stamina and damage tuning (unit scale: hp and stamina live in [0, 1])
// ---------------------------------------------------------------------------

pub fn light_stamina_cost() -> Fixed {
    Fixed::from_ratio(10, 100)
}

pub fn heavy_stamina_cost() -> Fixed {
    Fixed::from_ratio(25, 100)
}

pub fn special_stamina_cost() -> Fixed {
    Fixed::from_ratio(30, 100)
}

pub fn roll_stamina_cost() -> Fixed {
    Fixed::from_ratio(15, 100)
}

/// Fraction of the heavy cost returned on a feint-to-block.
pub fn feint_refund_fraction() -> Fixed {
    Fixed::HALF
}

/// Stamina cost reduction per combo step (20%), capped at 40%.
pub fn combo_cost_reduction() -> Fixed {
    Fixed::from_ratio(20, 100)
}

pub fn combo_cost_reduction_cap() -> Fixed {
    Fixed::from_ratio(40, 100)
}

/// Windup reduction while a combo is running (30%).
pub fn combo_windup_reduction() -> Fixed {
    Fixed::from_ratio(30, 100)
}

/// Counter-window attacks multiply damage by 1.5 and cost no stamina.
pub fn counter_damage_mult() -> Fixed {
    Fixed::from_ratio(150, 100)
}

/// Fraction of incoming damage removed by a facing block.
pub fn block_mitigation() -> Fixed {
    Fixed::from_ratio(70, 100)
}

/// Stamina drained per point of poise damage absorbed while blocking.
pub fn block_stamina_drain() -> Fixed {
    Fixed::from_ratio(50, 100)
}

/// Minimum `block_face . toward_attacker` for a block to connect.
pub fn block_facing_threshold() -> Fixed {
    Fixed::from_ratio(30, 100)
}

/// Poise below this never interrupts a hyperarmored defender.
pub fn hyperarmor_threshold() -> Fixed {
    Fixed::from_ratio(60, 100)
}

/// Hitstun applied on an interrupting hit, milliseconds.
pub const HITSTUN_MS: u32 = 250;

/// Base knockback impulse magnitude in physics units.
pub fn base_knockback() -> Fixed {
    Fixed::from_ratio(3, 2)
}

pub fn stamina_regen_per_sec() -> Fixed {
    Fixed::from_ratio(35, 100)
}

/// Regen multiplier while holding a block.
pub fn blocking_regen_mult() -> Fixed {
    Fixed::from_ratio(40, 100)
}

// ---------------------------------------------------------------------------
// Movement tuning (normalized [0,1] gameplay space)
// ---------------------------------------------------------------------------

/// Per-frame velocity contribution; with the frame decay this settles at a
/// run speed of ~0.25 normalized units per second.
pub fn base_move_speed() -> Fixed {
    Fixed::from_ratio(5, 100)
}

/// Per-frame velocity decay at the fixed timestep.
pub fn move_decay() -> Fixed {
    Fixed::from_ratio(80, 100)
}

/// Traction multiplier during the roll slide.
pub fn slide_traction() -> Fixed {
    Fixed::from_ratio(30, 100)
}

pub fn roll_speed() -> Fixed {
    Fixed::from_ratio(60, 100)
}

pub fn player_radius() -> Fixed {
    Fixed::from_ratio(25, 1000)
}

// ---------------------------------------------------------------------------
// Weapons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponType {
    Fists = 0,
    Longsword = 1,
    Greataxe = 2,
    Katana = 3,
    /// Mace and shield; enables the tap-parry variant.
    ShieldMace = 4,
}

impl WeaponType {
    pub fn from_u32(v: u32) -> WeaponType {
        match v {
            1 => WeaponType::Longsword,
            2 => WeaponType::Greataxe,
            3 => WeaponType::Katana,
            4 => WeaponType::ShieldMace,
            _ => WeaponType::Fists,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponDef {
    /// Effective reach in normalized space.
    pub reach: Fixed,
    pub damage_mult: Fixed,
    pub speed_mult: Fixed,
    pub stamina_mult: Fixed,
    /// Heavy Active frames grant hyperarmor.
    pub hyperarmor_heavy: bool,
    /// Shielded weapons parry on a light-hand tap instead of block start.
    pub shielded: bool,
}

pub fn weapon_def(weapon: WeaponType) -> WeaponDef {
    match weapon {
        WeaponType::Fists => WeaponDef {
            reach: Fixed::from_ratio(5, 100),
            damage_mult: Fixed::from_ratio(60, 100),
            speed_mult: Fixed::from_ratio(120, 100),
            stamina_mult: Fixed::from_ratio(80, 100),
            hyperarmor_heavy: false,
            shielded: false,
        },
        WeaponType::Longsword => WeaponDef {
            reach: Fixed::from_ratio(8, 100),
            damage_mult: Fixed::ONE,
            speed_mult: Fixed::ONE,
            stamina_mult: Fixed::ONE,
            hyperarmor_heavy: false,
            shielded: false,
        },
        WeaponType::Greataxe => WeaponDef {
            reach: Fixed::from_ratio(9, 100),
            damage_mult: Fixed::from_ratio(140, 100),
            speed_mult: Fixed::from_ratio(75, 100),
            stamina_mult: Fixed::from_ratio(130, 100),
            hyperarmor_heavy: true,
            shielded: false,
        },
        WeaponType::Katana => WeaponDef {
            reach: Fixed::from_ratio(8, 100),
            damage_mult: Fixed::from_ratio(90, 100),
            speed_mult: Fixed::from_ratio(115, 100),
            stamina_mult: Fixed::from_ratio(90, 100),
            hyperarmor_heavy: false,
            shielded: false,
        },
        WeaponType::ShieldMace => WeaponDef {
            reach: Fixed::from_ratio(6, 100),
            damage_mult: Fixed::from_ratio(85, 100),
            speed_mult: Fixed::from_ratio(90, 100),
            stamina_mult: Fixed::ONE,
            hyperarmor_heavy: false,
            shielded: true,
        },
    }
}

// ---------------------------------------------------------------------------
// Biomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Forest = 0,
    Swamp = 1,
    Mountain = 2,
    Plains = 3,
}

impl Biome {
    pub fn from_u8(v: u8) -> Biome {
        match v {
            1 => Biome::Swamp,
            2 => Biome::Mountain,
            3 => Biome::Plains,
            _ => Biome::Forest,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Physics-space bounds and the linear mapping to normalized [0,1]² space.
/// This mapping is the only scaling allowed between the two spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub min_x: Fixed,
    pub max_x: Fixed,
    pub min_y: Fixed,
    pub max_y: Fixed,
    /// Downward (−z) gravity magnitude; zero for the top-down plane.
    pub gravity: Fixed,
    /// Broad-phase grid cell size in physics units.
    pub cell_size: Fixed,
    /// Linear speed below which a body accumulates sleep frames.
    pub sleep_epsilon: Fixed,
    /// Consecutive calm frames before a body sleeps.
    pub sleep_frames: u8,
    /// Fraction of penetration corrected per resolution pass.
    pub correction: Fixed,
    /// Penetration tolerated before correction kicks in.
    pub slop: Fixed,
    /// Downhill direction scaled by grade, for rolling dynamics; `None` is
    /// flat ground.
    pub slope: Option<Vec2F>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            min_x: Fixed::ZERO,
            max_x: Fixed::from_int(20),
            min_y: Fixed::ZERO,
            max_y: Fixed::from_int(20),
            gravity: Fixed::ZERO,
            cell_size: Fixed::ONE,
            sleep_epsilon: Fixed::from_ratio(1, 100),
            sleep_frames: 30,
            correction: Fixed::from_ratio(80, 100),
            slop: Fixed::from_ratio(1, 100),
            slope: None,
        }
    }
}

impl PhysicsConfig {
    /// Physics-space x for a normalized x.
    pub fn to_physics_x(&self, nx: Fixed) -> Fixed {
        self.min_x + nx * (self.max_x - self.min_x)
    }

    pub fn to_physics_y(&self, ny: Fixed) -> Fixed {
        self.min_y + ny * (self.max_y - self.min_y)
    }

    /// Normalized x for a physics-space x.
    pub fn to_normalized_x(&self, px: Fixed) -> Fixed {
        (px - self.min_x) / (self.max_x - self.min_x)
    }

    pub fn to_normalized_y(&self, py: Fixed) -> Fixed {
        (py - self.min_y) / (self.max_y - self.min_y)
    }

    /// Scale factor from normalized to physics units along x.
    pub fn span_x(&self) -> Fixed {
        self.max_x - self.min_x
    }

    pub fn span_y(&self) -> Fixed {
        self.max_y - self.min_y
    }
}

// ---------------------------------------------------------------------------
// Pack AI tuning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackTuning {
    /// Distance at which a wolf notices the player (normalized space).
    pub notice_distance: Fixed,
    /// Distance below which a seeking wolf starts circling.
    pub circle_distance: Fixed,
    /// Radius of the circling orbit.
    pub circle_radius: Fixed,
    /// Wolf melee reach.
    pub attack_range: Fixed,
    /// Wolves within this distance of each other form a pack.
    pub join_distance: Fixed,
    /// Health fraction under which a wolf retreats.
    pub retreat_health: Fixed,
    /// Stamina fraction under which a wolf retreats.
    pub retreat_stamina: Fixed,
    /// Morale under which the pack plan falls back to Retreat.
    pub retreat_morale: Fixed,
    /// Seconds a pack observes before it may commit.
    pub observe_time: Fixed,
    /// Seconds of coordinated harassment before the outcome is scored.
    pub harass_time: Fixed,
    /// Seconds to regroup after a failed plan.
    pub regroup_time: Fixed,
    /// Per-wolf cooldown between vocalizations, seconds.
    pub vocal_cooldown: Fixed,
    /// Rolling window length for the player-skill estimate.
    pub skill_window: u8,
}

impl Default for PackTuning {
    fn default() -> Self {
        PackTuning {
            notice_distance: Fixed::from_ratio(35, 100),
            circle_distance: Fixed::from_ratio(20, 100),
            circle_radius: Fixed::from_ratio(12, 100),
            attack_range: Fixed::from_ratio(5, 100),
            join_distance: Fixed::from_ratio(25, 100),
            retreat_health: Fixed::from_ratio(30, 100),
            retreat_stamina: Fixed::from_ratio(15, 100),
            retreat_morale: Fixed::from_ratio(25, 100),
            observe_time: Fixed::from_ratio(3, 2),
            harass_time: Fixed::from_int(4),
            regroup_time: Fixed::from_int(3),
            vocal_cooldown: Fixed::from_int(2),
            skill_window: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase durations
// ---------------------------------------------------------------------------

/// Minimum seconds a phase must hold before an auto-transition may fire.
pub fn phase_min_duration(phase: crate::game_state::Phase) -> Fixed {
    use crate::game_state::Phase;
    match phase {
        Phase::Explore => Fixed::from_ratio(1, 2),
        Phase::Fight => Fixed::from_int(2),
        Phase::Choose => Fixed::from_ratio(1, 2),
        Phase::PowerUp => Fixed::from_ratio(1, 2),
        Phase::Risk => Fixed::from_ratio(1, 2),
        Phase::Escalate => Fixed::from_int(1),
        Phase::CashOut => Fixed::from_ratio(1, 2),
        Phase::Reset => Fixed::ZERO,
        Phase::GameOver => Fixed::ZERO,
    }
}

/// Maximum seconds before the manager forces the phase onward; `None` means
/// unbounded (player-driven phases).
pub fn phase_max_duration(phase: crate::game_state::Phase) -> Option<Fixed> {
    use crate::game_state::Phase;
    match phase {
        Phase::Risk => Some(Fixed::from_int(30)),
        Phase::Escalate => Some(Fixed::from_int(45)),
        Phase::Reset => Some(Fixed::from_int(1)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Aggregate run configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub pack: PackTuning,
}

impl SimConfig {
    pub fn from_json(payload: &str) -> Result<SimConfig, crate::error::SimError> {
        serde_json::from_str(payload)
            .map_err(|e| crate::error::SimError::InvalidConfig(e.to_string()))
    }
}

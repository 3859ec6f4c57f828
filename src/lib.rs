pub mod api;
pub mod codec;
pub mod combat;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod game_state;
pub mod input;
pub mod math;
pub mod phase_sync;
pub mod physics;
pub mod player;
pub mod rng;
pub mod snapshot;
pub mod terrain;
pub mod wolves;

// Re-export the types a host or test driver touches most.
pub use crate::combat::{OUTCOME_BLOCK, OUTCOME_HIT, OUTCOME_IGNORE, OUTCOME_PARRY};
pub use crate::config::SimConfig;
pub use crate::core::Core;
pub use crate::error::SimError;
pub use crate::game_state::Phase;
pub use crate::math::{Fixed, Vec2F, Vec3F};
pub use crate::snapshot::{checksum, enhanced_checksum, load_state, save_state};

// Re-export the WASM surface for backward compatibility with hosts that
// import from the crate root.
pub use crate::api::wasm::*;

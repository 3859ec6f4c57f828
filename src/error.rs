//! Boundary error type.
//!
//! Inside the simulation, failures surface as return codes and sentinel ids
//! so the hot path never unwinds. `SimError` exists for the places where a
//! caller genuinely needs a reason: snapshot decode, wire decode, config and
//! DTO parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimError {
    /// Snapshot blob version does not match this build.
    SnapshotVersion { expected: u16, found: u16 },
    /// Snapshot blob is truncated or has trailing bytes.
    SnapshotLength(String),
    /// Snapshot field failed validation before apply.
    SnapshotCorrupt(String),
    /// Peer message preamble version mismatch.
    WireVersion { expected: u16, found: u16 },
    /// Peer message too short or malformed.
    WireMalformed(String),
    /// Unknown enum discriminant on the wire.
    UnknownDiscriminant { what: &'static str, value: u32 },
    /// Config or scenario payload failed to parse.
    InvalidConfig(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::SnapshotVersion { expected, found } => {
                write!(f, "snapshot version {} (expected {})", found, expected)
            }
            SimError::SnapshotLength(msg) => write!(f, "snapshot length: {}", msg),
            SimError::SnapshotCorrupt(msg) => write!(f, "snapshot corrupt: {}", msg),
            SimError::WireVersion { expected, found } => {
                write!(f, "wire version {} (expected {})", found, expected)
            }
            SimError::WireMalformed(msg) => write!(f, "wire malformed: {}", msg),
            SimError::UnknownDiscriminant { what, value } => {
                write!(f, "unknown {} discriminant: {}", what, value)
            }
            SimError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

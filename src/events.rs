//! Simulation event queue.
//!
//! Managers emit events into a single bounded FIFO queue as they run; the
//! coordinator drains it at frame end and hands the batch to the host for
//! rendering, audio and telemetry. Events never feed back into simulation
//! state, so the queue is observability only and is not serialized into
//! snapshots.

use serde::{Deserialize, Serialize};

use crate::config::MAX_EVENTS;
use crate::math::{Fixed, Vec2F, Vec3F};

/// Physics contact classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactKind {
    Contact,
    Trigger,
    Overlap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    // Physics
    Contact {
        kind: ContactKind,
        body_a: u32,
        body_b: u32,
        point: Vec3F,
        normal: Vec3F,
        impulse: Fixed,
    },
    ExplosionSpawned {
        origin: Vec3F,
        max_radius: Fixed,
    },
    ExplosionExpired {
        origin: Vec3F,
    },

    // Combat
    AttackStarted {
        attack_type: u8,
        hand: u8,
    },
    AttackResolved {
        outcome: i32,
        damage: Fixed,
    },
    PlayerDamaged {
        amount: Fixed,
        source: DamageSource,
    },
    PlayerParried,
    PlayerDied,

    // Wolves
    WolfDamaged {
        wolf_id: u32,
        amount: Fixed,
    },
    WolfDied {
        wolf_id: u32,
    },
    WolfStateChanged {
        wolf_id: u32,
        state: u8,
    },
    PackPlanChanged {
        pack_id: u32,
        plan: u8,
    },
    Vocalization {
        wolf_id: u32,
        kind: u8,
        position: Vec2F,
    },

    // Stage
    HazardTriggered {
        index: u32,
        kind: u8,
    },
    BarrelDestroyed {
        index: u32,
    },

    // Game flow
    PhaseChanged {
        from: u8,
        to: u8,
    },
    GoldAwarded {
        amount: u32,
    },
    EssenceAwarded {
        amount: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSource {
    Wolf(u32),
    Hazard(u32),
    Explosion,
    Status,
}

impl SimEvent {
    /// Event type as a string for host-side filtering.
    pub fn kind(&self) -> &'static str {
        match self {
            SimEvent::Contact { .. } => "Contact",
            SimEvent::ExplosionSpawned { .. } => "ExplosionSpawned",
            SimEvent::ExplosionExpired { .. } => "ExplosionExpired",
            SimEvent::AttackStarted { .. } => "AttackStarted",
            SimEvent::AttackResolved { .. } => "AttackResolved",
            SimEvent::PlayerDamaged { .. } => "PlayerDamaged",
            SimEvent::PlayerParried => "PlayerParried",
            SimEvent::PlayerDied => "PlayerDied",
            SimEvent::WolfDamaged { .. } => "WolfDamaged",
            SimEvent::WolfDied { .. } => "WolfDied",
            SimEvent::WolfStateChanged { .. } => "WolfStateChanged",
            SimEvent::PackPlanChanged { .. } => "PackPlanChanged",
            SimEvent::Vocalization { .. } => "Vocalization",
            SimEvent::HazardTriggered { .. } => "HazardTriggered",
            SimEvent::BarrelDestroyed { .. } => "BarrelDestroyed",
            SimEvent::PhaseChanged { .. } => "PhaseChanged",
            SimEvent::GoldAwarded { .. } => "GoldAwarded",
            SimEvent::EssenceAwarded { .. } => "EssenceAwarded",
        }
    }
}

/// Bounded FIFO event queue, drained once per frame.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
    /// Events dropped because the queue was full this frame.
    dropped: u32,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue {
            events: Vec::with_capacity(MAX_EVENTS),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: SimEvent) {
        if self.events.len() >= MAX_EVENTS {
            self.dropped += 1;
            return;
        }
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Take the frame's events in FIFO order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.dropped = 0;
        std::mem::take(&mut self.events)
    }
}

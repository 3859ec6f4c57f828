//! Wolf vocalizations.
//!
//! Vocalizations go into a bounded queue during the wolf tick and are
//! reacted to at the start of the next tick, so every peer processes them in
//! the same order regardless of which wolf spoke first within a frame.

use serde::{Deserialize, Serialize};

use crate::config::MAX_VOCALIZATIONS;
use crate::math::{Fixed, Vec2F};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VocalKind {
    /// Rally the pack to a point.
    HowlRally = 0,
    /// Hunt signal: aggression and coordination rise.
    HowlHunt = 1,
    /// Alert: idle wolves start seeking.
    BarkAlert = 2,
    /// Warning growl: nearby wolves grow cautious.
    GrowlWarn = 3,
    /// Distress: the nearest ally comes to help.
    WhineDistress = 4,
    /// Victory yip: morale bump.
    YipVictory = 5,
}

impl VocalKind {
    pub fn from_u8(v: u8) -> Option<VocalKind> {
        Some(match v {
            0 => VocalKind::HowlRally,
            1 => VocalKind::HowlHunt,
            2 => VocalKind::BarkAlert,
            3 => VocalKind::GrowlWarn,
            4 => VocalKind::WhineDistress,
            5 => VocalKind::YipVictory,
            _ => return None,
        })
    }

    /// Hearing range in normalized space.
    pub fn range(self) -> Fixed {
        match self {
            VocalKind::HowlRally | VocalKind::HowlHunt => Fixed::from_ratio(80, 100),
            VocalKind::BarkAlert => Fixed::from_ratio(40, 100),
            VocalKind::GrowlWarn => Fixed::from_ratio(25, 100),
            VocalKind::WhineDistress => Fixed::from_ratio(50, 100),
            VocalKind::YipVictory => Fixed::from_ratio(60, 100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vocalization {
    pub kind: VocalKind,
    pub source_pos: Vec2F,
    pub range: Fixed,
    pub intensity: Fixed,
    pub timestamp: Fixed,
    pub wolf_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VocalQueue {
    queue: Vec<Vocalization>,
}

impl VocalQueue {
    pub fn new() -> VocalQueue {
        VocalQueue::default()
    }

    /// Enqueue a vocalization; silently dropped when the queue is full.
    pub fn push(&mut self, vocal: Vocalization) -> bool {
        if self.queue.len() >= MAX_VOCALIZATIONS {
            return false;
        }
        self.queue.push(vocal);
        true
    }

    /// Take everything queued, FIFO.
    pub fn drain(&mut self) -> Vec<Vocalization> {
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> &[Vocalization] {
        &self.queue
    }

    pub fn restore(&mut self, queue: Vec<Vocalization>) {
        self.queue = queue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocal(kind: VocalKind) -> Vocalization {
        Vocalization {
            kind,
            source_pos: Vec2F::ZERO,
            range: kind.range(),
            intensity: Fixed::ONE,
            timestamp: Fixed::ZERO,
            wolf_id: 0,
        }
    }

    #[test]
    fn queue_bounded_and_fifo() {
        let mut q = VocalQueue::new();
        for _ in 0..MAX_VOCALIZATIONS {
            assert!(q.push(vocal(VocalKind::BarkAlert)));
        }
        assert!(!q.push(vocal(VocalKind::HowlRally)));
        let drained = q.drain();
        assert_eq!(drained.len(), MAX_VOCALIZATIONS);
        assert!(q.is_empty());
    }

    #[test]
    fn howls_carry_farther_than_growls() {
        assert!(VocalKind::HowlRally.range() > VocalKind::GrowlWarn.range());
    }
}

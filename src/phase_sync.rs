//! Peer phase reconciliation.
//!
//! Each peer periodically broadcasts its phase; divergence is repaired by
//! the strategy chosen at startup (host-authoritative, majority, or
//! latest-timestamp), and explicit phase votes let peers agree on a
//! transition ahead of time. Message handling is pure: a message plus the
//! reconciler state yields a new state and a list of actions for the caller
//! (adopt a phase, send messages). All times on the wire are u32
//! milliseconds since run start.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{ByteReader, ByteWriter};
use crate::error::SimError;
use crate::game_state::Phase;
use crate::math::Fixed;

/// Wire preamble; mismatched versions are rejected.
pub const WIRE_VERSION: u16 = 2;

pub type PeerId = u8;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    PhaseSync {
        phase: Phase,
        previous_phase: Phase,
        timestamp_ms: u32,
        sequence: u32,
        start_time_ms: u32,
        transition_in_progress: bool,
    },
    PhaseTransition {
        from: Phase,
        to: Phase,
        timestamp_ms: u32,
        forced: bool,
    },
    VoteInitiate {
        proposed_phase: Phase,
        duration_ms: u32,
        timestamp_ms: u32,
    },
    VoteCast {
        vote: Phase,
        timestamp_ms: u32,
    },
    PhaseValidate {
        request_id: u32,
        phase: Phase,
        timestamp_ms: u32,
    },
    PhaseValidateResponse {
        request_id: u32,
        phase: Phase,
        is_valid: bool,
        timestamp_ms: u32,
    },
}

const TAG_SYNC: u8 = 0;
const TAG_TRANSITION: u8 = 1;
const TAG_VOTE_INITIATE: u8 = 2;
const TAG_VOTE_CAST: u8 = 3;
const TAG_VALIDATE: u8 = 4;
const TAG_VALIDATE_RESPONSE: u8 = 5;

fn put_phase(w: &mut ByteWriter, phase: Phase) {
    w.put_u8(phase.as_u8());
}

fn get_phase(r: &mut ByteReader<'_>) -> Result<Phase, SimError> {
    let raw = r.get_u8()?;
    Phase::from_u8(raw).ok_or(SimError::UnknownDiscriminant {
        what: "phase",
        value: raw as u32,
    })
}

/// Pack a message with the version preamble and the sender id.
pub fn encode_message(from: PeerId, msg: &PeerMessage) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(24);
    w.put_u16(WIRE_VERSION);
    w.put_u8(from);
    match *msg {
        PeerMessage::PhaseSync {
            phase,
            previous_phase,
            timestamp_ms,
            sequence,
            start_time_ms,
            transition_in_progress,
        } => {
            w.put_u8(TAG_SYNC);
            put_phase(&mut w, phase);
            put_phase(&mut w, previous_phase);
            w.put_u32(timestamp_ms);
            w.put_u32(sequence);
            w.put_u32(start_time_ms);
            w.put_bool(transition_in_progress);
        }
        PeerMessage::PhaseTransition {
            from: from_phase,
            to,
            timestamp_ms,
            forced,
        } => {
            w.put_u8(TAG_TRANSITION);
            put_phase(&mut w, from_phase);
            put_phase(&mut w, to);
            w.put_u32(timestamp_ms);
            w.put_bool(forced);
        }
        PeerMessage::VoteInitiate {
            proposed_phase,
            duration_ms,
            timestamp_ms,
        } => {
            w.put_u8(TAG_VOTE_INITIATE);
            put_phase(&mut w, proposed_phase);
            w.put_u32(duration_ms);
            w.put_u32(timestamp_ms);
        }
        PeerMessage::VoteCast { vote, timestamp_ms } => {
            w.put_u8(TAG_VOTE_CAST);
            put_phase(&mut w, vote);
            w.put_u32(timestamp_ms);
        }
        PeerMessage::PhaseValidate {
            request_id,
            phase,
            timestamp_ms,
        } => {
            w.put_u8(TAG_VALIDATE);
            w.put_u32(request_id);
            put_phase(&mut w, phase);
            w.put_u32(timestamp_ms);
        }
        PeerMessage::PhaseValidateResponse {
            request_id,
            phase,
            is_valid,
            timestamp_ms,
        } => {
            w.put_u8(TAG_VALIDATE_RESPONSE);
            w.put_u32(request_id);
            put_phase(&mut w, phase);
            w.put_bool(is_valid);
            w.put_u32(timestamp_ms);
        }
    }
    w.finish()
}

/// Decode a packed message into `(sender, message)`.
pub fn decode_message(bytes: &[u8]) -> Result<(PeerId, PeerMessage), SimError> {
    let mut r = ByteReader::new(bytes);
    let version = r.get_u16().map_err(|_| SimError::WireMalformed("short preamble".into()))?;
    if version != WIRE_VERSION {
        return Err(SimError::WireVersion {
            expected: WIRE_VERSION,
            found: version,
        });
    }
    let from = r.get_u8()?;
    let tag = r.get_u8()?;
    let msg = match tag {
        TAG_SYNC => PeerMessage::PhaseSync {
            phase: get_phase(&mut r)?,
            previous_phase: get_phase(&mut r)?,
            timestamp_ms: r.get_u32()?,
            sequence: r.get_u32()?,
            start_time_ms: r.get_u32()?,
            transition_in_progress: r.get_bool()?,
        },
        TAG_TRANSITION => PeerMessage::PhaseTransition {
            from: get_phase(&mut r)?,
            to: get_phase(&mut r)?,
            timestamp_ms: r.get_u32()?,
            forced: r.get_bool()?,
        },
        TAG_VOTE_INITIATE => PeerMessage::VoteInitiate {
            proposed_phase: get_phase(&mut r)?,
            duration_ms: r.get_u32()?,
            timestamp_ms: r.get_u32()?,
        },
        TAG_VOTE_CAST => PeerMessage::VoteCast {
            vote: get_phase(&mut r)?,
            timestamp_ms: r.get_u32()?,
        },
        TAG_VALIDATE => PeerMessage::PhaseValidate {
            request_id: r.get_u32()?,
            phase: get_phase(&mut r)?,
            timestamp_ms: r.get_u32()?,
        },
        TAG_VALIDATE_RESPONSE => PeerMessage::PhaseValidateResponse {
            request_id: r.get_u32()?,
            phase: get_phase(&mut r)?,
            is_valid: r.get_bool()?,
            timestamp_ms: r.get_u32()?,
        },
        other => {
            return Err(SimError::UnknownDiscriminant {
                what: "peer message tag",
                value: other as u32,
            });
        }
    };
    r.expect_end()
        .map_err(|_| SimError::WireMalformed("trailing bytes".into()))?;
    Ok((from, msg))
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileStrategy {
    /// Adopt the host's phase; the host is the smallest peer id unless the
    /// session names one.
    HostAuthoritative,
    /// Adopt a phase held by strictly more than `threshold * N` peers.
    Majority,
    /// Adopt the phase with the greatest start time.
    LatestTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub strategy: ReconcileStrategy,
    /// Vote/majority share threshold in [0, 1].
    pub consensus_threshold: Fixed,
    pub explicit_host: Option<PeerId>,
    /// Interval between phase broadcasts, milliseconds.
    pub sync_interval_ms: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            strategy: ReconcileStrategy::HostAuthoritative,
            consensus_threshold: Fixed::HALF,
            explicit_host: None,
            sync_interval_ms: 500,
        }
    }
}

/// What the caller must do after feeding the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    /// Apply this phase at the next frame boundary.
    AdoptPhase { phase: Phase, forced: bool },
    /// Send to every peer.
    Broadcast(PeerMessage),
    /// Send to one peer.
    SendTo(PeerId, PeerMessage),
}

#[derive(Debug, Clone, PartialEq)]
struct PeerPhase {
    phase: Phase,
    previous_phase: Phase,
    sequence: u32,
    start_time_ms: u32,
    timestamp_ms: u32,
    transition_in_progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct VoteState {
    proposed: Phase,
    initiator: PeerId,
    started_ms: u32,
    duration_ms: u32,
    /// One ballot per peer, first cast wins.
    ballots: BTreeMap<PeerId, Phase>,
}

#[derive(Debug)]
pub struct PhaseReconciler {
    pub config: ReconcileConfig,
    local_peer: PeerId,
    local_phase: Phase,
    local_previous: Phase,
    local_start_ms: u32,
    sequence: u32,
    peers: BTreeMap<PeerId, PeerPhase>,
    vote: Option<VoteState>,
    last_broadcast_ms: u32,
    /// Divergences noticed; mirrors the diagnostics counter.
    pub desyncs_detected: u32,
}

impl PhaseReconciler {
    pub fn new(local_peer: PeerId, config: ReconcileConfig) -> PhaseReconciler {
        PhaseReconciler {
            config,
            local_peer,
            local_phase: Phase::Explore,
            local_previous: Phase::Explore,
            local_start_ms: 0,
            sequence: 0,
            peers: BTreeMap::new(),
            vote: None,
            last_broadcast_ms: 0,
            desyncs_detected: 0,
        }
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    pub fn local_phase(&self) -> Phase {
        self.local_phase
    }

    pub fn known_peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.keys().copied()
    }

    /// The authoritative host: explicit if configured, else the smallest
    /// known peer id (including ourselves).
    pub fn host(&self) -> PeerId {
        if let Some(host) = self.config.explicit_host {
            return host;
        }
        self.peers
            .keys()
            .copied()
            .chain(std::iter::once(self.local_peer))
            .min()
            .unwrap_or(self.local_peer)
    }

    /// Record the locally-applied phase (after the game state transitions).
    pub fn set_local_phase(&mut self, phase: Phase, now_ms: u32) {
        if phase != self.local_phase {
            self.local_previous = self.local_phase;
            self.local_phase = phase;
            self.local_start_ms = now_ms;
        }
    }

    /// Build the periodic sync message and bump the sequence.
    pub fn make_sync(&mut self, now_ms: u32) -> PeerMessage {
        self.sequence = self.sequence.wrapping_add(1);
        PeerMessage::PhaseSync {
            phase: self.local_phase,
            previous_phase: self.local_previous,
            timestamp_ms: now_ms,
            sequence: self.sequence,
            start_time_ms: self.local_start_ms,
            transition_in_progress: false,
        }
    }

    /// Open a vote for a phase transition. The initiator's ballot is cast
    /// implicitly. Returns the message to broadcast, or `None` if a vote is
    /// already running.
    pub fn initiate_vote(
        &mut self,
        proposed: Phase,
        duration_ms: u32,
        now_ms: u32,
    ) -> Option<PeerMessage> {
        if self.vote.is_some() {
            return None;
        }
        let mut ballots = BTreeMap::new();
        ballots.insert(self.local_peer, proposed);
        self.vote = Some(VoteState {
            proposed,
            initiator: self.local_peer,
            started_ms: now_ms,
            duration_ms,
            ballots,
        });
        Some(PeerMessage::VoteInitiate {
            proposed_phase: proposed,
            duration_ms,
            timestamp_ms: now_ms,
        })
    }

    /// Cast the local ballot in the running vote.
    pub fn cast_vote(&mut self, vote: Phase, now_ms: u32) -> Option<PeerMessage> {
        let state = self.vote.as_mut()?;
        state.ballots.entry(self.local_peer).or_insert(vote);
        Some(PeerMessage::VoteCast {
            vote,
            timestamp_ms: now_ms,
        })
    }

    /// Feed one peer message; returns the actions the caller must perform.
    pub fn handle_message(
        &mut self,
        from: PeerId,
        msg: PeerMessage,
        now_ms: u32,
    ) -> Vec<ReconcileAction> {
        let mut actions = Vec::new();
        match msg {
            PeerMessage::PhaseSync {
                phase,
                previous_phase,
                timestamp_ms,
                sequence,
                start_time_ms,
                transition_in_progress,
            } => {
                // Drop stale updates.
                if let Some(existing) = self.peers.get(&from) {
                    if sequence <= existing.sequence {
                        return actions;
                    }
                }
                self.peers.insert(
                    from,
                    PeerPhase {
                        phase,
                        previous_phase,
                        sequence,
                        start_time_ms,
                        timestamp_ms,
                        transition_in_progress,
                    },
                );
                if phase != self.local_phase {
                    self.desyncs_detected += 1;
                    log::debug!(
                        "phase desync: peer {} in {:?}, local {:?}",
                        from,
                        phase,
                        self.local_phase
                    );
                    if let Some(repair) = self.repair() {
                        actions.push(repair);
                    }
                }
            }
            PeerMessage::PhaseTransition { to, .. } => {
                // A broadcast transition from the host is authoritative
                // under the host strategy.
                if self.config.strategy == ReconcileStrategy::HostAuthoritative
                    && from == self.host()
                {
                    actions.push(ReconcileAction::AdoptPhase {
                        phase: to,
                        forced: true,
                    });
                }
            }
            PeerMessage::VoteInitiate {
                proposed_phase,
                duration_ms,
                timestamp_ms,
            } => {
                if self.vote.is_none() {
                    let mut ballots = BTreeMap::new();
                    ballots.insert(from, proposed_phase);
                    self.vote = Some(VoteState {
                        proposed: proposed_phase,
                        initiator: from,
                        started_ms: timestamp_ms.min(now_ms),
                        duration_ms,
                        ballots,
                    });
                }
            }
            PeerMessage::VoteCast { vote, .. } => {
                if let Some(state) = self.vote.as_mut() {
                    // One ballot per peer; the first stands.
                    state.ballots.entry(from).or_insert(vote);
                }
            }
            PeerMessage::PhaseValidate {
                request_id, phase, ..
            } => {
                actions.push(ReconcileAction::SendTo(
                    from,
                    PeerMessage::PhaseValidateResponse {
                        request_id,
                        phase: self.local_phase,
                        is_valid: phase == self.local_phase,
                        timestamp_ms: now_ms,
                    },
                ));
            }
            PeerMessage::PhaseValidateResponse { is_valid, .. } => {
                if !is_valid {
                    self.desyncs_detected += 1;
                    if let Some(repair) = self.repair() {
                        actions.push(repair);
                    }
                }
            }
        }
        actions
    }

    /// Periodic work: broadcast on the sync interval, settle expired votes.
    pub fn tick(&mut self, now_ms: u32) -> Vec<ReconcileAction> {
        let mut actions = Vec::new();
        if now_ms.saturating_sub(self.last_broadcast_ms) >= self.config.sync_interval_ms {
            self.last_broadcast_ms = now_ms;
            let sync = self.make_sync(now_ms);
            actions.push(ReconcileAction::Broadcast(sync));
        }

        let expired = self
            .vote
            .as_ref()
            .map(|v| now_ms.saturating_sub(v.started_ms) >= v.duration_ms)
            .unwrap_or(false);
        if expired {
            let vote = match self.vote.take() {
                Some(v) => v,
                None => return actions,
            };
            let electorate = self.electorate();
            let winner_votes = vote
                .ballots
                .values()
                .filter(|&&b| b == vote.proposed)
                .count();
            let share = Fixed::from_ratio(winner_votes as i32, electorate.max(1) as i32);
            if share >= self.config.consensus_threshold {
                actions.push(ReconcileAction::AdoptPhase {
                    phase: vote.proposed,
                    forced: true,
                });
            }
            // Below threshold: the vote simply dies.
        }
        actions
    }

    /// Number of voting peers: everyone we know about, plus ourselves.
    fn electorate(&self) -> usize {
        let mut ids: Vec<PeerId> = self.peers.keys().copied().collect();
        if !ids.contains(&self.local_peer) {
            ids.push(self.local_peer);
        }
        ids.len()
    }

    /// Pick the repair action for a detected divergence.
    fn repair(&self) -> Option<ReconcileAction> {
        match self.config.strategy {
            ReconcileStrategy::HostAuthoritative => {
                let host = self.host();
                if host == self.local_peer {
                    // We are the authority; broadcast our phase instead.
                    return Some(ReconcileAction::Broadcast(PeerMessage::PhaseTransition {
                        from: self.local_previous,
                        to: self.local_phase,
                        timestamp_ms: self.local_start_ms,
                        forced: true,
                    }));
                }
                let host_phase = self.peers.get(&host)?.phase;
                Some(ReconcileAction::AdoptPhase {
                    phase: host_phase,
                    forced: true,
                })
            }
            ReconcileStrategy::Majority => {
                let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
                *counts.entry(self.local_phase.as_u8()).or_default() += 1;
                for peer in self.peers.values() {
                    *counts.entry(peer.phase.as_u8()).or_default() += 1;
                }
                let total = self.electorate();
                let (&phase_raw, &count) = counts
                    .iter()
                    .max_by_key(|(raw, count)| (**count, std::cmp::Reverse(**raw)))?;
                let share = Fixed::from_ratio(count as i32, total.max(1) as i32);
                if share > self.config.consensus_threshold {
                    let phase = Phase::from_u8(phase_raw)?;
                    if phase != self.local_phase {
                        return Some(ReconcileAction::AdoptPhase {
                            phase,
                            forced: true,
                        });
                    }
                }
                None
            }
            ReconcileStrategy::LatestTimestamp => {
                let mut best = (self.local_start_ms, self.local_phase);
                for peer in self.peers.values() {
                    if peer.start_time_ms > best.0 {
                        best = (peer.start_time_ms, peer.phase);
                    }
                }
                if best.1 != self.local_phase {
                    Some(ReconcileAction::AdoptPhase {
                        phase: best.1,
                        forced: true,
                    })
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_msg(phase: Phase, sequence: u32, start: u32) -> PeerMessage {
        PeerMessage::PhaseSync {
            phase,
            previous_phase: Phase::Explore,
            timestamp_ms: start,
            sequence,
            start_time_ms: start,
            transition_in_progress: false,
        }
    }

    #[test]
    fn wire_round_trip() {
        let msgs = [
            sync_msg(Phase::Fight, 3, 1200),
            PeerMessage::PhaseTransition {
                from: Phase::Fight,
                to: Phase::Choose,
                timestamp_ms: 5000,
                forced: false,
            },
            PeerMessage::VoteInitiate {
                proposed_phase: Phase::Choose,
                duration_ms: 1000,
                timestamp_ms: 100,
            },
            PeerMessage::VoteCast {
                vote: Phase::Choose,
                timestamp_ms: 150,
            },
            PeerMessage::PhaseValidate {
                request_id: 9,
                phase: Phase::Risk,
                timestamp_ms: 60,
            },
            PeerMessage::PhaseValidateResponse {
                request_id: 9,
                phase: Phase::Risk,
                is_valid: true,
                timestamp_ms: 61,
            },
        ];
        for msg in msgs {
            let bytes = encode_message(4, &msg);
            let (from, decoded) = decode_message(&bytes).unwrap();
            assert_eq!(from, 4);
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn wrong_wire_version_rejected() {
        let mut bytes = encode_message(0, &sync_msg(Phase::Fight, 1, 0));
        bytes[0] = 0xEE;
        bytes[1] = 0xEE;
        assert!(matches!(
            decode_message(&bytes),
            Err(SimError::WireVersion { .. })
        ));
    }

    #[test]
    fn truncated_message_rejected() {
        let bytes = encode_message(0, &sync_msg(Phase::Fight, 1, 0));
        assert!(decode_message(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn host_is_smallest_peer_unless_explicit() {
        let mut r = PhaseReconciler::new(3, ReconcileConfig::default());
        r.handle_message(5, sync_msg(Phase::Explore, 1, 0), 0);
        r.handle_message(1, sync_msg(Phase::Explore, 1, 0), 0);
        assert_eq!(r.host(), 1);
        r.config.explicit_host = Some(5);
        assert_eq!(r.host(), 5);
    }

    #[test]
    fn host_authoritative_repair_adopts_host_phase() {
        let mut r = PhaseReconciler::new(3, ReconcileConfig::default());
        r.set_local_phase(Phase::Explore, 0);
        let actions = r.handle_message(1, sync_msg(Phase::Fight, 1, 500), 600);
        assert!(actions.contains(&ReconcileAction::AdoptPhase {
            phase: Phase::Fight,
            forced: true
        }));
        assert_eq!(r.desyncs_detected, 1);
    }

    #[test]
    fn stale_sequence_is_ignored() {
        let mut r = PhaseReconciler::new(0, ReconcileConfig::default());
        r.set_local_phase(Phase::Fight, 0);
        r.handle_message(2, sync_msg(Phase::Fight, 5, 0), 0);
        let actions = r.handle_message(2, sync_msg(Phase::Choose, 4, 0), 10);
        assert!(actions.is_empty());
        assert_eq!(r.desyncs_detected, 0);
    }

    #[test]
    fn majority_repair() {
        let mut config = ReconcileConfig::default();
        config.strategy = ReconcileStrategy::Majority;
        config.consensus_threshold = Fixed::HALF;
        let mut r = PhaseReconciler::new(0, config);
        r.set_local_phase(Phase::Explore, 0);
        r.handle_message(1, sync_msg(Phase::Fight, 1, 100), 100);
        // Two of three peers say Fight: strictly more than half.
        let actions = r.handle_message(2, sync_msg(Phase::Fight, 1, 100), 100);
        assert!(actions.contains(&ReconcileAction::AdoptPhase {
            phase: Phase::Fight,
            forced: true
        }));
    }

    #[test]
    fn latest_timestamp_repair() {
        let mut config = ReconcileConfig::default();
        config.strategy = ReconcileStrategy::LatestTimestamp;
        let mut r = PhaseReconciler::new(0, config);
        r.set_local_phase(Phase::Explore, 50);
        let actions = r.handle_message(1, sync_msg(Phase::Choose, 1, 900), 1000);
        assert!(actions.contains(&ReconcileAction::AdoptPhase {
            phase: Phase::Choose,
            forced: true
        }));
    }

    #[test]
    fn vote_passes_at_threshold() {
        // Three peers, threshold 0.75; initiator + two casts = unanimous.
        let mut config = ReconcileConfig::default();
        config.consensus_threshold = Fixed::from_ratio(75, 100);
        let mut r = PhaseReconciler::new(0, config);
        r.handle_message(1, sync_msg(Phase::Fight, 1, 0), 0);
        r.handle_message(2, sync_msg(Phase::Choose, 1, 0), 0);

        let initiate = r.initiate_vote(Phase::Choose, 1000, 0).unwrap();
        assert!(matches!(initiate, PeerMessage::VoteInitiate { .. }));
        r.handle_message(1, PeerMessage::VoteCast { vote: Phase::Choose, timestamp_ms: 100 }, 100);
        r.handle_message(2, PeerMessage::VoteCast { vote: Phase::Choose, timestamp_ms: 150 }, 150);

        // Nothing before expiry (besides the periodic broadcast).
        let early: Vec<_> = r
            .tick(500)
            .into_iter()
            .filter(|a| matches!(a, ReconcileAction::AdoptPhase { .. }))
            .collect();
        assert!(early.is_empty());

        let actions = r.tick(1000);
        assert!(actions.contains(&ReconcileAction::AdoptPhase {
            phase: Phase::Choose,
            forced: true
        }));
        // The vote is settled and gone.
        assert!(r.tick(1100).iter().all(|a| !matches!(a, ReconcileAction::AdoptPhase { .. })));
    }

    #[test]
    fn vote_fails_under_threshold() {
        let mut config = ReconcileConfig::default();
        config.consensus_threshold = Fixed::from_ratio(75, 100);
        let mut r = PhaseReconciler::new(0, config);
        r.handle_message(1, sync_msg(Phase::Fight, 1, 0), 0);
        r.handle_message(2, sync_msg(Phase::Fight, 1, 0), 0);
        r.initiate_vote(Phase::Choose, 1000, 0);
        // Peer 1 votes against; peer 2 abstains: share = 1/3.
        r.handle_message(1, PeerMessage::VoteCast { vote: Phase::Fight, timestamp_ms: 10 }, 10);
        let actions = r.tick(1000);
        assert!(actions.iter().all(|a| !matches!(a, ReconcileAction::AdoptPhase { .. })));
    }

    #[test]
    fn one_ballot_per_peer() {
        let mut r = PhaseReconciler::new(0, ReconcileConfig::default());
        r.handle_message(1, sync_msg(Phase::Fight, 1, 0), 0);
        r.initiate_vote(Phase::Choose, 1000, 0);
        r.handle_message(1, PeerMessage::VoteCast { vote: Phase::Fight, timestamp_ms: 10 }, 10);
        // Second ballot from the same peer is ignored.
        r.handle_message(1, PeerMessage::VoteCast { vote: Phase::Choose, timestamp_ms: 20 }, 20);
        let vote = r.vote.as_ref().unwrap();
        assert_eq!(vote.ballots.get(&1), Some(&Phase::Fight));
    }

    #[test]
    fn validate_round_trip() {
        let mut r = PhaseReconciler::new(0, ReconcileConfig::default());
        r.set_local_phase(Phase::Risk, 0);
        let actions = r.handle_message(
            2,
            PeerMessage::PhaseValidate {
                request_id: 7,
                phase: Phase::Risk,
                timestamp_ms: 10,
            },
            10,
        );
        assert_eq!(
            actions,
            vec![ReconcileAction::SendTo(
                2,
                PeerMessage::PhaseValidateResponse {
                    request_id: 7,
                    phase: Phase::Risk,
                    is_valid: true,
                    timestamp_ms: 10,
                }
            )]
        );
    }
}

//! Multi-peer phase reconciliation: the consensus vote scenario, repair
//! strategies against live cores, and phase-graph legality under load.

mod common;

use common::{dt, make_core, scripted_input};
use lupine_sim::core::Core;
use lupine_sim::math::Fixed;
use lupine_sim::phase_sync::{
    PeerMessage, PhaseReconciler, ReconcileAction, ReconcileConfig, ReconcileStrategy,
    decode_message, encode_message,
};
use lupine_sim::Phase;

/// Deliver a packed message to every other peer.
fn broadcast(
    from: u8,
    msg: &PeerMessage,
    peers: &mut [(PhaseReconciler, Core)],
    now_ms: u32,
) -> Vec<(u8, ReconcileAction)> {
    let bytes = encode_message(from, msg);
    let mut out = Vec::new();
    for (reconciler, _) in peers.iter_mut() {
        if reconciler.local_peer() == from {
            continue;
        }
        let (sender, decoded) = decode_message(&bytes).expect("wire round-trip");
        assert_eq!(sender, from);
        for action in reconciler.handle_message(sender, decoded, now_ms) {
            out.push((reconciler.local_peer(), action));
        }
    }
    out
}

fn exchange_syncs(peers: &mut [(PhaseReconciler, Core)], now_ms: u32) {
    let syncs: Vec<(u8, PeerMessage)> = peers
        .iter_mut()
        .map(|(r, _)| (r.local_peer(), r.make_sync(now_ms)))
        .collect();
    for (from, msg) in syncs {
        broadcast(from, &msg, peers, now_ms);
    }
}

/// Scenario: phases [Fight, Fight, Choose], threshold 0.75; peer 0
/// initiates a vote for Choose, peers 1 and 2 cast Choose; at expiry every
/// peer transitions to Choose on the same frame boundary.
#[test]
fn three_peer_consensus_vote_lands_atomically() {
    let config = ReconcileConfig {
        strategy: ReconcileStrategy::HostAuthoritative,
        consensus_threshold: Fixed::from_ratio(75, 100),
        explicit_host: None,
        sync_interval_ms: 10_000, // keep periodic traffic out of the test
    };
    let mut peers: Vec<(PhaseReconciler, Core)> = (0..3u8)
        .map(|id| {
            let mut core = make_core(1, 1, 0);
            // Drive the peers into their divergent starting phases.
            assert!(core.force_phase(Phase::Fight));
            if id == 2 {
                assert!(core.force_phase(Phase::Choose));
            }
            let mut reconciler = PhaseReconciler::new(id, config);
            reconciler.set_local_phase(core.phase(), 0);
            (reconciler, core)
        })
        .collect();

    // Everyone learns about everyone (electorate of three).
    exchange_syncs(&mut peers, 0);

    // Peer 0 initiates; peers 1 and 2 cast Choose.
    let initiate = peers[0].0.initiate_vote(Phase::Choose, 1000, 0).unwrap();
    broadcast(0, &initiate, &mut peers, 0);
    for caster in [1usize, 2] {
        let msg = peers[caster].0.cast_vote(Phase::Choose, 100).unwrap();
        let from = peers[caster].0.local_peer();
        broadcast(from, &msg, &mut peers, 100);
    }

    // Before the duration elapses nobody moves.
    for (reconciler, _) in peers.iter_mut() {
        assert!(reconciler
            .tick(900)
            .iter()
            .all(|a| !matches!(a, ReconcileAction::AdoptPhase { .. })));
    }

    // At expiry, every peer adopts Choose and applies it at the next frame.
    for (reconciler, core) in peers.iter_mut() {
        let adoptions: Vec<_> = reconciler
            .tick(1000)
            .into_iter()
            .filter_map(|a| match a {
                ReconcileAction::AdoptPhase { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(adoptions, vec![Phase::Choose]);
        core.force_phase(Phase::Choose);
        core.update(dt());
        assert_eq!(core.phase(), Phase::Choose);
    }
    let frames: Vec<u32> = peers.iter().map(|(_, c)| c.frame()).collect();
    assert!(frames.iter().all(|&f| f == frames[0]), "same frame boundary");
}

#[test]
fn host_authoritative_repairs_follower_divergence() {
    let config = ReconcileConfig::default();
    let mut follower = PhaseReconciler::new(3, config);
    follower.set_local_phase(Phase::Explore, 0);

    // Peer 1 (the smallest id, hence host) reports Fight.
    let sync = PeerMessage::PhaseSync {
        phase: Phase::Fight,
        previous_phase: Phase::Explore,
        timestamp_ms: 700,
        sequence: 1,
        start_time_ms: 650,
        transition_in_progress: false,
    };
    let actions = follower.handle_message(1, sync, 700);
    assert!(actions.contains(&ReconcileAction::AdoptPhase {
        phase: Phase::Fight,
        forced: true
    }));

    // Applying the repair to a live core follows the graph.
    let mut core = make_core(1, 1, 0);
    assert!(core.force_phase(Phase::Fight));
    assert_eq!(core.phase(), Phase::Fight);
    assert_eq!(follower.desyncs_detected, 1);
}

#[test]
fn majority_strategy_needs_strict_majority() {
    let config = ReconcileConfig {
        strategy: ReconcileStrategy::Majority,
        consensus_threshold: Fixed::HALF,
        explicit_host: None,
        sync_interval_ms: 500,
    };
    let mut r = PhaseReconciler::new(0, config);
    r.set_local_phase(Phase::Explore, 0);

    let sync = |phase, seq| PeerMessage::PhaseSync {
        phase,
        previous_phase: Phase::Explore,
        timestamp_ms: 100,
        sequence: seq,
        start_time_ms: 100,
        transition_in_progress: false,
    };
    // One dissenting peer is a tie (1 vs 1): no repair.
    let actions = r.handle_message(1, sync(Phase::Fight, 1), 100);
    assert!(actions.is_empty());
    // A second dissenting peer makes it 2 of 3: adopt.
    let actions = r.handle_message(2, sync(Phase::Fight, 1), 120);
    assert!(actions.contains(&ReconcileAction::AdoptPhase {
        phase: Phase::Fight,
        forced: true
    }));
}

#[test]
fn wire_rejects_foreign_version() {
    let msg = PeerMessage::VoteCast {
        vote: Phase::Fight,
        timestamp_ms: 5,
    };
    let mut bytes = encode_message(1, &msg);
    bytes[0] ^= 0xFF;
    assert!(decode_message(&bytes).is_err());
}

#[test]
fn phase_transitions_follow_the_graph_under_load() {
    // Soak a full game loop and check every observed transition edge.
    let mut core = make_core(2024, 1, 0);
    core.spawn_wolf(0, 0.45, 0.7);
    core.spawn_wolf(0, 0.55, 0.7);
    let mut previous = core.phase();
    for frame in 0..3000 {
        core.advance_frame(&[(0, scripted_input(frame))], dt());
        let current = core.phase();
        if current != previous {
            assert!(
                previous.can_transition_to(current),
                "illegal transition {:?} -> {:?} at frame {}",
                previous,
                current,
                frame
            );
            previous = current;
        }
    }
}

//! Snapshot and checksum: byte-exact capture and restore of the whole
//! simulation.
//!
//! The blob is a versioned little-endian record with a fixed field order;
//! writing the same state always yields the same bytes, so the FNV-1a digest
//! over the blob is the cross-peer consistency check. `load_state` decodes
//! and validates the entire blob before touching the core, so a bad payload
//! leaves the running state untouched.

use crate::codec::{ByteReader, ByteWriter, fnv1a64};
use crate::combat::{AttackState, AttackType, CombatManager, HitContract, RollState};
use crate::config::{
    MAX_BARRELS, MAX_BODIES, MAX_EXPLOSIONS, MAX_FORCE_NODES, MAX_HAZARDS, MAX_OBSTACLES,
    MAX_PACKS, MAX_PEERS, MAX_VOCALIZATIONS, MAX_WOLVES, WeaponType,
};
use crate::core::Core;
use crate::error::SimError;
use crate::game_state::{Barrel, GameState, MAX_ENEMY_SLOTS, Phase};
use crate::input::{BufferedAction, Hand, InputFrame, InputManager};
use crate::math::Fixed;
use crate::physics::body::{BodyKind, RigidBody};
use crate::physics::forces::{Explosion, ForceNode};
use crate::physics::world::Aabb;
use crate::player::{
    ActiveStatus, BashState, BerserkerState, CharacterType, DashState, PlayerManager, StatusSet,
};
use crate::terrain::{Hazard, HazardKind, Obstacle, StatusKind};
use crate::wolves::{
    Emotion, Pack, PackPlan, PackRole, VocalKind, VocalQueue, Vocalization, Wolf, WolfMemory,
    WolfState, WolfType,
};

/// Bump on any layout change; mismatched blobs are rejected outright.
pub const SNAPSHOT_VERSION: u16 = 2;

/// Domain salt folded into the enhanced checksum.
const CHECKSUM_SALT: u64 = 0x4C55_5049_4E45_5349;

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize the full simulation state.
pub fn save_state(core: &Core) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(4096);
    w.put_u16(SNAPSHOT_VERSION);
    w.put_u32(core.state.frame);
    w.put_u64(core.run_seed());
    for stream in core.rng.streams() {
        w.put_u64(stream);
    }
    w.put_fixed(core.time);
    w.put_u8(core.local_player);

    write_player(&mut w, &core.player);
    write_combat(&mut w, &core.combat);
    write_input(&mut w, &core.input);

    // Last-known peer inputs, ascending peer id (BTreeMap order).
    w.put_u32(core.last_inputs.len() as u32);
    for (&peer, frame) in core.last_inputs.iter() {
        w.put_u8(peer);
        write_input_frame(&mut w, frame);
    }

    // Physics arena.
    let slots = core.physics.slots();
    w.put_u32(slots.len() as u32);
    for slot in slots {
        match slot {
            Some(body) => {
                w.put_bool(true);
                write_body(&mut w, body);
            }
            None => w.put_bool(false),
        }
    }
    let free = core.physics.free_list();
    w.put_u32(free.len() as u32);
    for &id in free {
        w.put_u32(id);
    }
    let aabbs = core.physics.aabbs();
    w.put_u32(aabbs.len() as u32);
    for aabb in aabbs {
        w.put_vec2(aabb.min);
        w.put_vec2(aabb.max);
    }

    // Force propagation.
    let explosions = core.forces.explosions();
    w.put_u32(explosions.len() as u32);
    for e in explosions {
        w.put_vec3(e.origin);
        w.put_fixed(e.max_radius);
        w.put_fixed(e.current_radius);
        w.put_fixed(e.expansion_speed);
        w.put_fixed(e.max_force);
        w.put_bool(e.active);
    }
    let nodes = core.forces.nodes();
    w.put_u32(nodes.len() as u32);
    for n in nodes {
        w.put_u32(n.body);
        for &c in &n.connections {
            w.put_u32(c);
        }
        w.put_fixed(n.efficiency);
    }

    // Wolves, packs, vocalizations.
    let wolf_slots = core.wolves.wolf_slots();
    w.put_u32(wolf_slots.len() as u32);
    for slot in wolf_slots {
        match slot {
            Some(wolf) => {
                w.put_bool(true);
                write_wolf(&mut w, wolf);
            }
            None => w.put_bool(false),
        }
    }
    let pack_slots = core.wolves.pack_slots();
    w.put_u32(pack_slots.len() as u32);
    for slot in pack_slots {
        match slot {
            Some(pack) => {
                w.put_bool(true);
                write_pack(&mut w, pack);
            }
            None => w.put_bool(false),
        }
    }
    let vocals = core.wolves.vocal_queue().pending();
    w.put_u32(vocals.len() as u32);
    for v in vocals {
        w.put_u8(v.kind as u8);
        w.put_vec2(v.source_pos);
        w.put_fixed(v.range);
        w.put_fixed(v.intensity);
        w.put_fixed(v.timestamp);
        w.put_u32(v.wolf_id);
    }

    // Stage.
    let hazards = core.hazards.hazards();
    w.put_u32(hazards.len() as u32);
    for h in hazards {
        w.put_u8(h.kind.as_u8());
        w.put_vec2(h.center);
        w.put_fixed(h.radius);
        w.put_fixed(h.damage);
        w.put_fixed(h.cooldown);
        w.put_fixed(h.last_trigger);
        w.put_bool(h.active);
        w.put_bool(h.triggered);
        w.put_fixed(h.activate_time);
        w.put_fixed(h.duration);
    }
    let obstacles = core.obstacles.obstacles();
    w.put_u32(obstacles.len() as u32);
    for o in obstacles {
        w.put_vec2(o.center);
        w.put_fixed(o.radius);
    }

    // Game state.
    w.put_u8(core.state.phase.as_u8());
    w.put_fixed(core.state.phase_start);
    w.put_u32(core.state.gold);
    w.put_u32(core.state.essence);
    w.put_u32(core.state.room_count);
    w.put_u8(core.state.biome.as_u8());
    let enemies = core.state.enemy_bodies();
    w.put_u32(enemies.len() as u32);
    for &body in enemies {
        w.put_u32(body);
    }
    for barrel in core.state.barrels() {
        match barrel {
            Some(b) => {
                w.put_bool(true);
                w.put_u32(b.body_id);
                w.put_fixed(b.hp);
            }
            None => w.put_bool(false),
        }
    }

    w.finish()
}

/// 64-bit digest over the snapshot bytes.
pub fn checksum(core: &Core) -> u64 {
    fnv1a64(&save_state(core))
}

/// Enhanced digest: mixes the frame number and a domain salt so colliding
/// states on different frames still diverge.
pub fn enhanced_checksum(core: &Core) -> u64 {
    let base = checksum(core);
    let mut mixed = base ^ CHECKSUM_SALT;
    mixed = mixed.wrapping_mul(0x100000001b3);
    mixed ^= core.frame() as u64;
    mixed.wrapping_mul(0x100000001b3)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Restore a snapshot. The blob is decoded and validated completely before
/// anything is applied; on error the core is untouched and the error is
/// returned (the caller counts it).
pub fn load_state(core: &mut Core, bytes: &[u8]) -> Result<(), SimError> {
    let decoded = decode(bytes)?;
    apply(core, decoded);
    Ok(())
}

/// Everything a blob holds, fully decoded.
struct DecodedState {
    frame: u32,
    run_seed: u64,
    rng_streams: [u64; 3],
    time: Fixed,
    local_player: u8,
    player: PlayerManager,
    combat: CombatManager,
    input: InputManager,
    last_inputs: Vec<(u8, InputFrame)>,
    body_slots: Vec<Option<RigidBody>>,
    free_list: Vec<u32>,
    aabbs: Vec<Aabb>,
    explosions: Vec<Explosion>,
    nodes: Vec<ForceNode>,
    wolf_slots: Vec<Option<Wolf>>,
    pack_slots: Vec<Option<Pack>>,
    vocals: Vec<Vocalization>,
    hazards: Vec<Hazard>,
    obstacles: Vec<Obstacle>,
    game: GameState,
}

fn decode(bytes: &[u8]) -> Result<DecodedState, SimError> {
    let mut r = ByteReader::new(bytes);
    let version = r.get_u16()?;
    if version != SNAPSHOT_VERSION {
        return Err(SimError::SnapshotVersion {
            expected: SNAPSHOT_VERSION,
            found: version,
        });
    }
    let frame = r.get_u32()?;
    let run_seed = r.get_u64()?;
    let rng_streams = [r.get_u64()?, r.get_u64()?, r.get_u64()?];
    let time = r.get_fixed()?;
    let local_player = r.get_u8()?;

    let player = read_player(&mut r)?;
    let combat = read_combat(&mut r)?;
    let input = read_input(&mut r)?;

    let n_inputs = r.get_len(MAX_PEERS)?;
    let mut last_inputs = Vec::with_capacity(n_inputs);
    for _ in 0..n_inputs {
        let peer = r.get_u8()?;
        last_inputs.push((peer, read_input_frame(&mut r)?));
    }

    let n_slots = r.get_len(MAX_BODIES)?;
    let mut body_slots = Vec::with_capacity(n_slots);
    for _ in 0..n_slots {
        if r.get_bool()? {
            body_slots.push(Some(read_body(&mut r)?));
        } else {
            body_slots.push(None);
        }
    }
    let n_free = r.get_len(MAX_BODIES)?;
    let mut free_list = Vec::with_capacity(n_free);
    for _ in 0..n_free {
        free_list.push(r.get_u32()?);
    }
    let n_aabbs = r.get_len(16)?;
    let mut aabbs = Vec::with_capacity(n_aabbs);
    for _ in 0..n_aabbs {
        aabbs.push(Aabb {
            min: r.get_vec2()?,
            max: r.get_vec2()?,
        });
    }

    let n_explosions = r.get_len(MAX_EXPLOSIONS)?;
    let mut explosions = Vec::with_capacity(n_explosions);
    for _ in 0..n_explosions {
        explosions.push(Explosion {
            origin: r.get_vec3()?,
            max_radius: r.get_fixed()?,
            current_radius: r.get_fixed()?,
            expansion_speed: r.get_fixed()?,
            max_force: r.get_fixed()?,
            active: r.get_bool()?,
        });
    }
    let n_nodes = r.get_len(MAX_FORCE_NODES)?;
    let mut nodes = Vec::with_capacity(n_nodes);
    for _ in 0..n_nodes {
        let body = r.get_u32()?;
        let mut connections = [0u32; 8];
        for c in connections.iter_mut() {
            *c = r.get_u32()?;
        }
        nodes.push(ForceNode {
            body,
            connections,
            efficiency: r.get_fixed()?,
        });
    }

    let n_wolves = r.get_len(MAX_WOLVES)?;
    let mut wolf_slots = Vec::with_capacity(n_wolves);
    for _ in 0..n_wolves {
        if r.get_bool()? {
            wolf_slots.push(Some(read_wolf(&mut r)?));
        } else {
            wolf_slots.push(None);
        }
    }
    let n_packs = r.get_len(MAX_PACKS)?;
    let mut pack_slots = Vec::with_capacity(n_packs);
    for _ in 0..n_packs {
        if r.get_bool()? {
            pack_slots.push(Some(read_pack(&mut r)?));
        } else {
            pack_slots.push(None);
        }
    }
    let n_vocals = r.get_len(MAX_VOCALIZATIONS)?;
    let mut vocals = Vec::with_capacity(n_vocals);
    for _ in 0..n_vocals {
        let kind = r.get_u8()?;
        vocals.push(Vocalization {
            kind: VocalKind::from_u8(kind).ok_or(SimError::UnknownDiscriminant {
                what: "vocal kind",
                value: kind as u32,
            })?,
            source_pos: r.get_vec2()?,
            range: r.get_fixed()?,
            intensity: r.get_fixed()?,
            timestamp: r.get_fixed()?,
            wolf_id: r.get_u32()?,
        });
    }

    let n_hazards = r.get_len(MAX_HAZARDS)?;
    let mut hazards = Vec::with_capacity(n_hazards);
    for _ in 0..n_hazards {
        let kind = r.get_u8()?;
        hazards.push(Hazard {
            kind: HazardKind::from_u8(kind).ok_or(SimError::UnknownDiscriminant {
                what: "hazard kind",
                value: kind as u32,
            })?,
            center: r.get_vec2()?,
            radius: r.get_fixed()?,
            damage: r.get_fixed()?,
            cooldown: r.get_fixed()?,
            last_trigger: r.get_fixed()?,
            active: r.get_bool()?,
            triggered: r.get_bool()?,
            activate_time: r.get_fixed()?,
            duration: r.get_fixed()?,
        });
    }
    let n_obstacles = r.get_len(MAX_OBSTACLES)?;
    let mut obstacles = Vec::with_capacity(n_obstacles);
    for _ in 0..n_obstacles {
        obstacles.push(Obstacle {
            center: r.get_vec2()?,
            radius: r.get_fixed()?,
        });
    }

    let mut game = GameState::new();
    let phase_raw = r.get_u8()?;
    game.phase = Phase::from_u8(phase_raw).ok_or(SimError::UnknownDiscriminant {
        what: "phase",
        value: phase_raw as u32,
    })?;
    game.phase_start = r.get_fixed()?;
    game.frame = frame;
    game.gold = r.get_u32()?;
    game.essence = r.get_u32()?;
    game.room_count = r.get_u32()?;
    game.biome = crate::config::Biome::from_u8(r.get_u8()?);
    let n_enemies = r.get_len(MAX_ENEMY_SLOTS)?;
    let mut enemy_bodies = Vec::with_capacity(n_enemies);
    for _ in 0..n_enemies {
        enemy_bodies.push(r.get_u32()?);
    }
    let mut barrels: [Option<Barrel>; MAX_BARRELS] = [None; MAX_BARRELS];
    for slot in barrels.iter_mut() {
        if r.get_bool()? {
            *slot = Some(Barrel {
                body_id: r.get_u32()?,
                hp: r.get_fixed()?,
            });
        }
    }
    game.restore_registries(enemy_bodies, barrels);

    r.expect_end()?;

    Ok(DecodedState {
        frame,
        run_seed,
        rng_streams,
        time,
        local_player,
        player,
        combat,
        input,
        last_inputs,
        body_slots,
        free_list,
        aabbs,
        explosions,
        nodes,
        wolf_slots,
        pack_slots,
        vocals,
        hazards,
        obstacles,
        game,
    })
}

fn apply(core: &mut Core, d: DecodedState) {
    core.set_run_seed(d.run_seed);
    core.rng.restore(d.rng_streams);
    core.time = d.time;
    core.local_player = d.local_player;
    core.player = d.player;
    core.combat = d.combat;
    core.input = d.input;
    core.last_inputs = d.last_inputs.into_iter().collect();
    core.physics.restore(d.body_slots, d.free_list, d.aabbs);
    core.forces.restore(d.explosions, d.nodes);
    let mut vocals = VocalQueue::new();
    vocals.restore(d.vocals);
    core.wolves.restore(d.wolf_slots, d.pack_slots, vocals);
    core.hazards.restore(d.hazards);
    core.obstacles.restore(d.obstacles);
    core.state = d.game;
    core.state.frame = d.frame;
    // The event queue is drained at frame end, never carried across a
    // restore.
    core.events = crate::events::EventQueue::new();
}

// ---------------------------------------------------------------------------
// Field-level helpers
// ---------------------------------------------------------------------------

fn write_input_frame(w: &mut ByteWriter, f: &InputFrame) {
    w.put_fixed(f.move_x);
    w.put_fixed(f.move_y);
    let bits = (f.left_hand as u8)
        | (f.right_hand as u8) << 1
        | (f.special as u8) << 2
        | (f.jump as u8) << 3
        | (f.roll as u8) << 4
        | (f.block as u8) << 5
        | (f.light_attack as u8) << 6
        | (f.heavy_attack as u8) << 7;
    w.put_u8(bits);
}

fn read_input_frame(r: &mut ByteReader<'_>) -> Result<InputFrame, SimError> {
    let move_x = r.get_fixed()?;
    let move_y = r.get_fixed()?;
    let bits = r.get_u8()?;
    Ok(InputFrame {
        move_x,
        move_y,
        left_hand: bits & 1 != 0,
        right_hand: bits & 2 != 0,
        special: bits & 4 != 0,
        jump: bits & 8 != 0,
        roll: bits & 16 != 0,
        block: bits & 32 != 0,
        light_attack: bits & 64 != 0,
        heavy_attack: bits & 128 != 0,
    })
}

fn put_opt_fixed(w: &mut ByteWriter, v: Option<Fixed>) {
    match v {
        Some(v) => {
            w.put_bool(true);
            w.put_fixed(v);
        }
        None => w.put_bool(false),
    }
}

fn get_opt_fixed(r: &mut ByteReader<'_>) -> Result<Option<Fixed>, SimError> {
    Ok(if r.get_bool()? {
        Some(r.get_fixed()?)
    } else {
        None
    })
}

fn write_input(w: &mut ByteWriter, input: &InputManager) {
    write_input_frame(w, input.current());
    write_input_frame(w, &input.previous);
    write_input_frame(w, &input.pending);
    put_opt_fixed(w, input.left_pressed_at);
    put_opt_fixed(w, input.right_pressed_at);
    w.put_bool(input.left_heavy_fired);
    w.put_bool(input.right_heavy_fired);
    put_opt_fixed(w, input.special_pending_since);
    for slot in &input.buffer {
        match slot {
            Some((action, expiry)) => {
                w.put_bool(true);
                let (tag, hand) = match action {
                    BufferedAction::Light(h) => (0u8, *h as u8),
                    BufferedAction::Heavy(h) => (1, *h as u8),
                    BufferedAction::Special => (2, 0),
                    BufferedAction::Roll => (3, 0),
                };
                w.put_u8(tag);
                w.put_u8(hand);
                w.put_fixed(*expiry);
            }
            None => w.put_bool(false),
        }
    }
}

fn read_hand(v: u8) -> Hand {
    if v == 0 { Hand::Left } else { Hand::Right }
}

fn read_input(r: &mut ByteReader<'_>) -> Result<InputManager, SimError> {
    let current = read_input_frame(r)?;
    let previous = read_input_frame(r)?;
    let pending = read_input_frame(r)?;
    let left_pressed_at = get_opt_fixed(r)?;
    let right_pressed_at = get_opt_fixed(r)?;
    let left_heavy_fired = r.get_bool()?;
    let right_heavy_fired = r.get_bool()?;
    let special_pending_since = get_opt_fixed(r)?;
    let mut buffer = [None; 4];
    for slot in buffer.iter_mut() {
        if r.get_bool()? {
            let tag = r.get_u8()?;
            let hand = read_hand(r.get_u8()?);
            let expiry = r.get_fixed()?;
            let action = match tag {
                0 => BufferedAction::Light(hand),
                1 => BufferedAction::Heavy(hand),
                2 => BufferedAction::Special,
                3 => BufferedAction::Roll,
                other => {
                    return Err(SimError::UnknownDiscriminant {
                        what: "buffered action",
                        value: other as u32,
                    });
                }
            };
            *slot = Some((action, expiry));
        }
    }
    let mut input = InputManager::new();
    input.current = current;
    input.previous = previous;
    input.pending = pending;
    input.left_pressed_at = left_pressed_at;
    input.right_pressed_at = right_pressed_at;
    input.left_heavy_fired = left_heavy_fired;
    input.right_heavy_fired = right_heavy_fired;
    input.special_pending_since = special_pending_since;
    input.buffer = buffer;
    Ok(input)
}

fn write_player(w: &mut ByteWriter, p: &PlayerManager) {
    w.put_vec2(p.pos);
    w.put_vec2(p.vel);
    w.put_vec2(p.facing);
    w.put_fixed(p.hp);
    w.put_fixed(p.stamina);
    w.put_bool(p.grounded);
    w.put_u8(p.jump_count);
    w.put_fixed(p.jump_until);
    w.put_u8(p.character as u8);
    w.put_u32(p.body_id);
    for slot in p.statuses.slots() {
        match slot {
            Some(s) => {
                w.put_bool(true);
                w.put_u8(s.kind as u8);
                w.put_fixed(s.magnitude);
                w.put_fixed(s.until);
            }
            None => w.put_bool(false),
        }
    }
    w.put_bool(p.bash.charging);
    w.put_fixed(p.bash.charge);
    w.put_bool(p.berserker.active);
    w.put_fixed(p.berserker.until);
    w.put_vec2(p.berserker.dir);
    w.put_bool(p.dash.active);
    w.put_fixed(p.dash.until);
    w.put_vec2(p.dash.dir);
    w.put_u8(p.dash.combo_level);
    w.put_fixed(p.dash.combo_until);
    w.put_fixed(p.dash.cooldown_until);
}

fn read_player(r: &mut ByteReader<'_>) -> Result<PlayerManager, SimError> {
    let pos = r.get_vec2()?;
    let vel = r.get_vec2()?;
    let facing = r.get_vec2()?;
    let hp = r.get_fixed()?;
    let stamina = r.get_fixed()?;
    let grounded = r.get_bool()?;
    let jump_count = r.get_u8()?;
    let jump_until = r.get_fixed()?;
    let character = CharacterType::from_u32(r.get_u8()? as u32);
    let body_id = r.get_u32()?;
    let mut slots: [Option<ActiveStatus>; 5] = [None; 5];
    for slot in slots.iter_mut() {
        if r.get_bool()? {
            *slot = Some(ActiveStatus {
                kind: StatusKind::from_u8(r.get_u8()?),
                magnitude: r.get_fixed()?,
                until: r.get_fixed()?,
            });
        }
    }
    let mut statuses = StatusSet::default();
    statuses.restore(slots);
    let bash = BashState {
        charging: r.get_bool()?,
        charge: r.get_fixed()?,
    };
    let berserker = BerserkerState {
        active: r.get_bool()?,
        until: r.get_fixed()?,
        dir: r.get_vec2()?,
    };
    let dash = DashState {
        active: r.get_bool()?,
        until: r.get_fixed()?,
        dir: r.get_vec2()?,
        combo_level: r.get_u8()?,
        combo_until: r.get_fixed()?,
        cooldown_until: r.get_fixed()?,
    };
    let mut player = PlayerManager::new(character);
    player.pos = pos;
    player.vel = vel;
    player.facing = facing;
    player.hp = hp;
    player.stamina = stamina;
    player.grounded = grounded;
    player.jump_count = jump_count;
    player.jump_until = jump_until;
    player.body_id = body_id;
    player.statuses = statuses;
    player.bash = bash;
    player.berserker = berserker;
    player.dash = dash;
    Ok(player)
}

fn write_combat(w: &mut ByteWriter, c: &CombatManager) {
    w.put_u8(c.weapon.as_u8());
    w.put_u8(c.attack_state as u8);
    w.put_u8(c.attack_type as u8);
    w.put_u8(c.attack_hand as u8);
    w.put_vec2(c.attack_dir);
    w.put_fixed(c.state_entered);
    w.put_fixed(c.windup_duration);
    w.put_bool(c.contract_counter_bonus);
    match &c.contract {
        Some(hc) => {
            w.put_bool(true);
            w.put_vec2(hc.dir);
            w.put_fixed(hc.range);
            w.put_fixed(hc.damage);
            w.put_fixed(hc.poise_damage);
            w.put_u32(hc.hitstop_ms);
            w.put_u32(hc.struck_mask);
        }
        None => w.put_bool(false),
    }
    w.put_u8(c.roll_state as u8);
    w.put_fixed(c.roll_entered);
    w.put_vec2(c.roll_dir);
    w.put_bool(c.blocking);
    w.put_vec2(c.block_face);
    w.put_fixed(c.block_start);
    w.put_fixed(c.tap_parry_until);
    w.put_bool(c.stunned);
    w.put_fixed(c.stun_until);
    w.put_u8(c.combo_count);
    w.put_fixed(c.combo_window_end);
    w.put_u8(c.last_attack_type as u8);
    w.put_bool(c.can_counter);
    w.put_fixed(c.counter_window_end);
    w.put_fixed(c.armor_value);
    w.put_fixed(c.hyperarmor_until);
}

fn read_attack_state(v: u8) -> Result<AttackState, SimError> {
    Ok(match v {
        0 => AttackState::Idle,
        1 => AttackState::Windup,
        2 => AttackState::Active,
        3 => AttackState::Recovery,
        other => {
            return Err(SimError::UnknownDiscriminant {
                what: "attack state",
                value: other as u32,
            });
        }
    })
}

fn read_roll_state(v: u8) -> Result<RollState, SimError> {
    Ok(match v {
        0 => RollState::Idle,
        1 => RollState::Active,
        2 => RollState::Sliding,
        other => {
            return Err(SimError::UnknownDiscriminant {
                what: "roll state",
                value: other as u32,
            });
        }
    })
}

fn read_combat(r: &mut ByteReader<'_>) -> Result<CombatManager, SimError> {
    let weapon = WeaponType::from_u32(r.get_u8()? as u32);
    let mut c = CombatManager::new(weapon);
    c.attack_state = read_attack_state(r.get_u8()?)?;
    c.attack_type = AttackType::from_u8(r.get_u8()?);
    c.attack_hand = read_hand(r.get_u8()?);
    c.attack_dir = r.get_vec2()?;
    c.state_entered = r.get_fixed()?;
    c.windup_duration = r.get_fixed()?;
    c.contract_counter_bonus = r.get_bool()?;
    c.contract = if r.get_bool()? {
        Some(HitContract {
            dir: r.get_vec2()?,
            range: r.get_fixed()?,
            damage: r.get_fixed()?,
            poise_damage: r.get_fixed()?,
            hitstop_ms: r.get_u32()?,
            struck_mask: r.get_u32()?,
        })
    } else {
        None
    };
    c.roll_state = read_roll_state(r.get_u8()?)?;
    c.roll_entered = r.get_fixed()?;
    c.roll_dir = r.get_vec2()?;
    c.blocking = r.get_bool()?;
    c.block_face = r.get_vec2()?;
    c.block_start = r.get_fixed()?;
    c.tap_parry_until = r.get_fixed()?;
    c.stunned = r.get_bool()?;
    c.stun_until = r.get_fixed()?;
    c.combo_count = r.get_u8()?;
    c.combo_window_end = r.get_fixed()?;
    c.last_attack_type = AttackType::from_u8(r.get_u8()?);
    c.can_counter = r.get_bool()?;
    c.counter_window_end = r.get_fixed()?;
    c.armor_value = r.get_fixed()?;
    c.hyperarmor_until = r.get_fixed()?;
    Ok(c)
}

fn write_body(w: &mut ByteWriter, b: &RigidBody) {
    w.put_u32(b.id);
    w.put_u8(b.kind as u8);
    w.put_vec3(b.position);
    w.put_vec3(b.velocity);
    w.put_fixed(b.mass);
    w.put_fixed(b.inverse_mass);
    w.put_fixed(b.drag);
    w.put_fixed(b.friction);
    w.put_fixed(b.restitution);
    w.put_fixed(b.radius);
    w.put_u32(b.layer);
    w.put_u32(b.mask);
    w.put_bool(b.use_gravity);
    w.put_bool(b.sensor);
    w.put_bool(b.awake);
    w.put_u8(b.sleep_frames);
    w.put_vec3(b.force);
    w.put_vec3(b.impulse);
}

fn read_body(r: &mut ByteReader<'_>) -> Result<RigidBody, SimError> {
    Ok(RigidBody {
        id: r.get_u32()?,
        kind: BodyKind::from_u8(r.get_u8()?),
        position: r.get_vec3()?,
        velocity: r.get_vec3()?,
        mass: r.get_fixed()?,
        inverse_mass: r.get_fixed()?,
        drag: r.get_fixed()?,
        friction: r.get_fixed()?,
        restitution: r.get_fixed()?,
        radius: r.get_fixed()?,
        layer: r.get_u32()?,
        mask: r.get_u32()?,
        use_gravity: r.get_bool()?,
        sensor: r.get_bool()?,
        awake: r.get_bool()?,
        sleep_frames: r.get_u8()?,
        force: r.get_vec3()?,
        impulse: r.get_vec3()?,
    })
}

fn read_wolf_state(v: u8) -> Result<WolfState, SimError> {
    Ok(match v {
        0 => WolfState::Idle,
        1 => WolfState::Prowl,
        2 => WolfState::Seek,
        3 => WolfState::Circle,
        4 => WolfState::Harass,
        5 => WolfState::Retreat,
        6 => WolfState::Howl,
        7 => WolfState::Flee,
        other => {
            return Err(SimError::UnknownDiscriminant {
                what: "wolf state",
                value: other as u32,
            });
        }
    })
}

fn read_emotion(v: u8) -> Emotion {
    match v {
        1 => Emotion::Aggressive,
        2 => Emotion::Fearful,
        3 => Emotion::Confident,
        4 => Emotion::Desperate,
        5 => Emotion::Hurt,
        _ => Emotion::Calm,
    }
}

fn read_role(v: u8) -> PackRole {
    match v {
        1 => PackRole::Lead,
        2 => PackRole::Flanker,
        3 => PackRole::Support,
        4 => PackRole::Chaser,
        _ => PackRole::None,
    }
}

fn write_wolf(w: &mut ByteWriter, wolf: &Wolf) {
    w.put_u32(wolf.id);
    w.put_vec2(wolf.pos);
    w.put_vec2(wolf.vel);
    w.put_vec2(wolf.facing);
    w.put_fixed(wolf.hp);
    w.put_u8(wolf.wolf_type as u8);
    w.put_u8(wolf.state as u8);
    w.put_fixed(wolf.state_entered);
    w.put_u32(wolf.pack_id);
    w.put_u8(wolf.role as u8);
    w.put_u8(wolf.emotion as u8);
    w.put_fixed(wolf.aggression);
    w.put_fixed(wolf.morale);
    w.put_fixed(wolf.stamina);
    w.put_fixed(wolf.coordination);
    match wolf.memory.last_seen_player_pos {
        Some(pos) => {
            w.put_bool(true);
            w.put_vec2(pos);
        }
        None => w.put_bool(false),
    }
    w.put_fixed(wolf.memory.noticed_at);
    w.put_u32(wolf.body_id);
    w.put_fixed(wolf.circle_phase);
    w.put_fixed(wolf.attack_ready_at);
    w.put_fixed(wolf.stunned_until);
    w.put_fixed(wolf.last_vocal_at);
    w.put_fixed(wolf.last_hurt_at);
}

fn read_wolf(r: &mut ByteReader<'_>) -> Result<Wolf, SimError> {
    let id = r.get_u32()?;
    let pos = r.get_vec2()?;
    let vel = r.get_vec2()?;
    let facing = r.get_vec2()?;
    let hp = r.get_fixed()?;
    let wolf_type = WolfType::from_u8(r.get_u8()?);
    let state = read_wolf_state(r.get_u8()?)?;
    let state_entered = r.get_fixed()?;
    let pack_id = r.get_u32()?;
    let role = read_role(r.get_u8()?);
    let emotion = read_emotion(r.get_u8()?);
    let aggression = r.get_fixed()?;
    let morale = r.get_fixed()?;
    let stamina = r.get_fixed()?;
    let coordination = r.get_fixed()?;
    let last_seen = if r.get_bool()? {
        Some(r.get_vec2()?)
    } else {
        None
    };
    let noticed_at = r.get_fixed()?;
    let mut wolf = Wolf::new(id, wolf_type, pos);
    wolf.vel = vel;
    wolf.facing = facing;
    wolf.hp = hp;
    wolf.state = state;
    wolf.state_entered = state_entered;
    wolf.pack_id = pack_id;
    wolf.role = role;
    wolf.emotion = emotion;
    wolf.aggression = aggression;
    wolf.morale = morale;
    wolf.stamina = stamina;
    wolf.coordination = coordination;
    wolf.memory = WolfMemory {
        last_seen_player_pos: last_seen,
        noticed_at,
    };
    wolf.body_id = r.get_u32()?;
    wolf.circle_phase = r.get_fixed()?;
    wolf.attack_ready_at = r.get_fixed()?;
    wolf.stunned_until = r.get_fixed()?;
    wolf.last_vocal_at = r.get_fixed()?;
    wolf.last_hurt_at = r.get_fixed()?;
    Ok(wolf)
}

fn write_pack(w: &mut ByteWriter, pack: &Pack) {
    w.put_u32(pack.id);
    w.put_u32(pack.member_ids.len() as u32);
    for &m in &pack.member_ids {
        w.put_u32(m);
    }
    w.put_u8(pack.plan as u8);
    w.put_fixed(pack.plan_entered);
    w.put_fixed(pack.morale);
    w.put_fixed(pack.sync_timer);
    w.put_fixed(pack.coordination_bonus);
    w.put_fixed(pack.last_success_time);
    w.put_fixed(pack.last_failure_time);
    w.put_u32(pack.leader_id);
    w.put_u8(pack.attacks_thrown);
    w.put_u8(pack.attacks_defended);
}

fn read_pack(r: &mut ByteReader<'_>) -> Result<Pack, SimError> {
    let id = r.get_u32()?;
    let n_members = r.get_len(MAX_WOLVES)?;
    let mut member_ids = Vec::with_capacity(n_members);
    for _ in 0..n_members {
        member_ids.push(r.get_u32()?);
    }
    let mut pack = Pack::new(id);
    pack.member_ids = member_ids;
    pack.plan = PackPlan::from_u8(r.get_u8()?);
    pack.plan_entered = r.get_fixed()?;
    pack.morale = r.get_fixed()?;
    pack.sync_timer = r.get_fixed()?;
    pack.coordination_bonus = r.get_fixed()?;
    pack.last_success_time = r.get_fixed()?;
    pack.last_failure_time = r.get_fixed()?;
    pack.leader_id = r.get_u32()?;
    pack.attacks_thrown = r.get_u8()?;
    pack.attacks_defended = r.get_u8()?;
    Ok(pack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn dt() -> Fixed {
        Fixed::from_millis(16)
    }

    fn busy_core() -> Core {
        let mut core = Core::new(SimConfig::default());
        core.init_run(77, 2, 1);
        core.spawn_wolf(0, 0.4, 0.4);
        core.spawn_wolf(1, 0.45, 0.4);
        core.spawn_barrel(0.6, 0.6);
        for i in 0..30 {
            core.set_player_input(
                if i % 2 == 0 { 1.0 } else { 0.0 },
                0.3,
                false,
                false,
                false,
                false,
                false,
                i % 7 == 0,
                false,
                i % 11 == 0,
            );
            core.update(dt());
        }
        core
    }

    #[test]
    fn save_is_stable_for_identical_state() {
        let a = busy_core();
        let b = busy_core();
        assert_eq!(save_state(&a), save_state(&b));
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn round_trip_restores_checksum() {
        let mut core = busy_core();
        let blob = save_state(&core);
        let digest = checksum(&core);

        // Wreck the state, then restore.
        core.update(dt());
        core.update(dt());
        assert_ne!(checksum(&core), digest);

        load_state(&mut core, &blob).unwrap();
        assert_eq!(checksum(&core), digest);
        assert_eq!(save_state(&core), blob);
    }

    #[test]
    fn version_mismatch_is_rejected_and_state_kept() {
        let mut core = busy_core();
        let before = checksum(&core);
        let mut blob = save_state(&core);
        blob[0] = 0xFF;
        let err = load_state(&mut core, &blob).unwrap_err();
        assert!(matches!(err, SimError::SnapshotVersion { .. }));
        assert_eq!(checksum(&core), before);
    }

    #[test]
    fn truncated_blob_is_rejected_and_state_kept() {
        let mut core = busy_core();
        let before = checksum(&core);
        let blob = save_state(&core);
        let err = load_state(&mut core, &blob[..blob.len() / 2]).unwrap_err();
        assert!(matches!(
            err,
            SimError::SnapshotLength(_) | SimError::SnapshotCorrupt(_)
        ));
        assert_eq!(checksum(&core), before);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut core = busy_core();
        let mut blob = save_state(&core);
        blob.push(0);
        assert!(load_state(&mut core, &blob).is_err());
    }

    #[test]
    fn rejected_blob_bumps_the_failure_counter() {
        let mut core = busy_core();
        assert!(core.load_state(&[1, 2, 3]).is_err());
        assert_eq!(core.diag.snapshot_failures, 1);
    }

    #[test]
    fn enhanced_checksum_differs_from_plain() {
        let core = busy_core();
        assert_ne!(checksum(&core), enhanced_checksum(&core));
    }

    #[test]
    fn restored_core_steps_identically() {
        let mut original = busy_core();
        let blob = save_state(&original);

        let mut replica = Core::new(SimConfig::default());
        replica.init_run(1, 1, 0);
        load_state(&mut replica, &blob).unwrap();

        for _ in 0..20 {
            original.advance_frame(&[], dt());
            replica.advance_frame(&[], dt());
            assert_eq!(checksum(&original), checksum(&replica));
        }
    }
}

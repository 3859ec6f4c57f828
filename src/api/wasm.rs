//! WASM bindings - the thin boundary the JavaScript host drives.
//!
//! All business logic lives in the core; this file converts floats in,
//! floats out, and shuttles snapshot/wire payloads as byte arrays.

use wasm_bindgen::prelude::*;

use crate::config::SimConfig;
use crate::core::Core;
use crate::game_state::Phase;
use crate::math::Fixed;
use crate::phase_sync::{PhaseReconciler, ReconcileAction, ReconcileConfig, ReconcileStrategy};
use crate::snapshot;

use super::dto;

/// One-time wasm setup: route `log` to the browser console.
#[wasm_bindgen(start)]
pub fn wasm_start() {
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
pub struct SimHandle {
    core: Core,
    reconciler: PhaseReconciler,
}

#[wasm_bindgen]
impl SimHandle {
    /// Build a simulation with the default configuration and start a run.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64, start_weapon: u32, character: u32, peer_id: u8) -> SimHandle {
        // Debug: surface the run parameters in the browser console.
        #[cfg(target_arch = "wasm32")]
        web_sys::console::log_1(&JsValue::from_str(&format!(
            "lupine-sim: seed={} weapon={} character={} peer={}",
            seed, start_weapon, character, peer_id
        )));

        let mut core = Core::new(SimConfig::default());
        core.init_run(seed, start_weapon, character);
        SimHandle {
            core,
            reconciler: PhaseReconciler::new(peer_id, ReconcileConfig::default()),
        }
    }

    /// Override the default configuration with a JSON tuning payload.
    pub fn with_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config = SimConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.core.config = config;
        Ok(())
    }

    pub fn init_run(&mut self, seed: u64, start_weapon: u32, character: u32) {
        self.core.init_run(seed, start_weapon, character);
    }

    pub fn reset_run(&mut self, seed: u64) {
        self.core.reset_run(seed);
    }

    /// Advance one frame; `dt` in seconds (use the host's fixed timestep).
    pub fn update(&mut self, dt: f32) {
        self.core.update(Fixed::from_f32(dt));
        let now_ms = self.now_ms();
        let phase = self.core.phase();
        self.reconciler.set_local_phase(phase, now_ms);
    }

    /// Rollback step: one frame with a per-player input array (JSON-shaped
    /// `[{playerId, moveX, ...}]`). Peers absent from the array replay
    /// their last-known input.
    pub fn advance_frame(&mut self, inputs: JsValue, dt: f32) -> Result<(), JsValue> {
        let dtos: Vec<dto::PeerInputDto> = serde_wasm_bindgen::from_value(inputs)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let mut frames = Vec::with_capacity(dtos.len());
        for entry in &dtos {
            let (frame, clamped) = entry.sanitize();
            self.core.diag.clamped_inputs += clamped;
            frames.push((entry.player_id, frame));
        }
        self.core.advance_frame(&frames, Fixed::from_f32(dt));
        let now_ms = self.now_ms();
        let phase = self.core.phase();
        self.reconciler.set_local_phase(phase, now_ms);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_player_input(
        &mut self,
        move_x: f32,
        move_y: f32,
        left_hand: bool,
        right_hand: bool,
        special: bool,
        roll: bool,
        jump: bool,
        light_attack: bool,
        heavy_attack: bool,
        block: bool,
    ) {
        self.core.set_player_input(
            move_x,
            move_y,
            left_hand,
            right_hand,
            special,
            roll,
            jump,
            light_attack,
            heavy_attack,
            block,
        );
    }

    // -- readers (floats for rendering) -----------------------------------

    pub fn get_x(&self) -> f32 {
        self.core.player.pos.x.to_f32()
    }

    pub fn get_y(&self) -> f32 {
        self.core.player.pos.y.to_f32()
    }

    pub fn get_vel_x(&self) -> f32 {
        self.core.player.vel.x.to_f32()
    }

    pub fn get_vel_y(&self) -> f32 {
        self.core.player.vel.y.to_f32()
    }

    pub fn get_hp(&self) -> f32 {
        self.core.player.hp.to_f32()
    }

    pub fn get_stamina(&self) -> f32 {
        self.core.player.stamina.to_f32()
    }

    pub fn get_phase(&self) -> u8 {
        self.core.phase().as_u8()
    }

    pub fn get_frame(&self) -> u32 {
        self.core.frame()
    }

    pub fn get_gold(&self) -> u32 {
        self.core.state.gold
    }

    pub fn get_essence(&self) -> u32 {
        self.core.state.essence
    }

    pub fn wolf_count(&self) -> u32 {
        self.core.wolves.count() as u32
    }

    /// Full render view: player, wolves, packs, counters.
    pub fn frame_view(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&dto::frame_view(&self.core))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Static stage geometry (obstacles, hazards).
    pub fn stage_view(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&dto::stage_view(&self.core))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Events emitted by the most recent frame.
    pub fn frame_events(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.core.frame_events())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    // -- combat triggers ---------------------------------------------------

    pub fn on_light_attack(&mut self, hand: u32) -> i32 {
        self.core.on_light_attack(hand)
    }

    pub fn on_heavy_attack(&mut self, hand: u32) -> i32 {
        self.core.on_heavy_attack(hand)
    }

    pub fn on_special_attack(&mut self) -> i32 {
        self.core.on_special_attack()
    }

    pub fn on_roll_start(&mut self) -> i32 {
        self.core.on_roll_start()
    }

    pub fn set_blocking(&mut self, on: bool) -> i32 {
        self.core.set_blocking(on)
    }

    /// Resolve an attack against the player: -1 ignore, 0 hit, 1 block,
    /// 2 parry.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_incoming_attack(
        &mut self,
        origin_x: f32,
        origin_y: f32,
        dir_x: f32,
        dir_y: f32,
        damage: f32,
        poise: f32,
        range: f32,
    ) -> i32 {
        self.core.handle_incoming_attack(
            crate::math::Vec2F::from_f32(origin_x, origin_y),
            crate::math::Vec2F::from_f32(dir_x, dir_y),
            Fixed::from_f32(damage),
            Fixed::from_f32(poise),
            Fixed::from_f32(range),
        )
    }

    // -- world management --------------------------------------------------

    pub fn spawn_wolf(&mut self, wolf_type: u32, x: f32, y: f32) -> u32 {
        self.core.spawn_wolf(wolf_type, x, y)
    }

    pub fn spawn_barrel(&mut self, x: f32, y: f32) -> u32 {
        self.core.spawn_barrel(x, y)
    }

    pub fn create_explosion(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        radius: f32,
        force: f32,
        speed: f32,
    ) -> bool {
        self.core.create_explosion(x, y, z, radius, force, speed)
    }

    pub fn create_enemy_body(&mut self, slot: u32, x: f32, y: f32, mass: f32, radius: f32) -> u32 {
        self.core.create_enemy_body(slot, x, y, mass, radius)
    }

    pub fn destroy_enemy_body(&mut self, slot: u32) {
        self.core.destroy_enemy_body(slot);
    }

    pub fn set_enemy_body_position(&mut self, slot: u32, x: f32, y: f32) {
        self.core.set_enemy_body_position(slot, x, y);
    }

    pub fn apply_enemy_knockback(&mut self, slot: u32, dx: f32, dy: f32, force: f32) {
        self.core.apply_enemy_knockback(slot, dx, dy, force);
    }

    // -- snapshot / rollback -----------------------------------------------

    pub fn save_state(&self) -> Vec<u8> {
        snapshot::save_state(&self.core)
    }

    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.core
            .load_state(bytes)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn checksum(&self) -> u64 {
        snapshot::checksum(&self.core)
    }

    pub fn enhanced_checksum(&self) -> u64 {
        snapshot::enhanced_checksum(&self.core)
    }

    // -- phase reconciliation ----------------------------------------------

    /// Choose the repair strategy: 0 host-authoritative, 1 majority,
    /// 2 latest-timestamp.
    pub fn set_reconcile_strategy(&mut self, strategy: u8, consensus_threshold: f32) {
        self.reconciler.config.strategy = match strategy {
            1 => ReconcileStrategy::Majority,
            2 => ReconcileStrategy::LatestTimestamp,
            _ => ReconcileStrategy::HostAuthoritative,
        };
        self.reconciler.config.consensus_threshold = Fixed::from_f32(consensus_threshold);
    }

    /// Feed one packed peer message; returns the action list (adoptions are
    /// already applied to the core).
    pub fn handle_peer_message(&mut self, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let now_ms = self.now_ms();
        let (from, msg) = match crate::phase_sync::decode_message(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.core.diag.wire_rejected += 1;
                return Err(JsValue::from_str(&e.to_string()));
            }
        };
        let actions = self.reconciler.handle_message(from, msg, now_ms);
        self.apply_and_convert(actions)
    }

    /// Periodic reconciler work (broadcasts, vote expiry).
    pub fn reconcile_tick(&mut self) -> Result<JsValue, JsValue> {
        let now_ms = self.now_ms();
        let actions = self.reconciler.tick(now_ms);
        self.apply_and_convert(actions)
    }

    /// Open a phase vote; returns the packed initiate message to broadcast.
    pub fn initiate_phase_vote(&mut self, phase: u8, duration_ms: u32) -> Option<Vec<u8>> {
        let phase = Phase::from_u8(phase)?;
        let now_ms = self.now_ms();
        let msg = self.reconciler.initiate_vote(phase, duration_ms, now_ms)?;
        Some(crate::phase_sync::encode_message(
            self.reconciler.local_peer(),
            &msg,
        ))
    }

    /// Cast the local ballot; returns the packed vote message.
    pub fn cast_phase_vote(&mut self, phase: u8) -> Option<Vec<u8>> {
        let phase = Phase::from_u8(phase)?;
        let now_ms = self.now_ms();
        let msg = self.reconciler.cast_vote(phase, now_ms)?;
        Some(crate::phase_sync::encode_message(
            self.reconciler.local_peer(),
            &msg,
        ))
    }

    pub fn desyncs_detected(&self) -> u32 {
        self.reconciler.desyncs_detected
    }

    fn now_ms(&self) -> u32 {
        ((self.core.now().raw() as i64 * 1000) >> 16) as u32
    }

    fn apply_and_convert(&mut self, actions: Vec<ReconcileAction>) -> Result<JsValue, JsValue> {
        for action in &actions {
            if let ReconcileAction::AdoptPhase { phase, .. } = action {
                self.core.force_phase(*phase);
                self.core.diag.desync_events += 1;
                let now_ms = self.now_ms();
                self.reconciler.set_local_phase(self.core.phase(), now_ms);
            }
        }
        let local = self.reconciler.local_peer();
        serde_wasm_bindgen::to_value(&dto::outbound_actions(local, actions))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

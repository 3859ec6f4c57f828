//! Data transfer objects for the WASM/JavaScript boundary.
//!
//! Everything crossing to the host is f32/bool/ints with camelCase names;
//! fixed-point never leaks out of the core.

use serde::{Deserialize, Serialize};

use crate::core::Core;
use crate::diagnostics::DiagCounters;
use crate::phase_sync::{PeerId, PeerMessage, ReconcileAction};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub face_x: f32,
    pub face_y: f32,
    pub hp: f32,
    pub stamina: f32,
    pub blocking: bool,
    pub rolling: bool,
    pub stunned: bool,
    pub attack_state: u8,
    pub attack_type: u8,
    pub combo_count: u8,
    pub character: u8,
    pub weapon: u8,
    pub bash_charge: f32,
    pub berserker_active: bool,
    pub dash_combo_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WolfView {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub face_x: f32,
    pub face_y: f32,
    pub hp: f32,
    pub wolf_type: u8,
    pub state: u8,
    pub pack_id: u32,
    pub role: u8,
    pub emotion: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackView {
    pub id: u32,
    pub plan: u8,
    pub morale: f32,
    pub member_count: usize,
    pub leader_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HazardView {
    pub kind: u8,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub obstacles: Vec<ObstacleView>,
    pub hazards: Vec<HazardView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObstacleView {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameView {
    pub frame: u32,
    pub phase: u8,
    pub gold: u32,
    pub essence: u32,
    pub room_count: u32,
    pub biome: u8,
    pub player: PlayerView,
    pub wolves: Vec<WolfView>,
    pub packs: Vec<PackView>,
    pub diagnostics: DiagCounters,
}

/// One peer's input record for a rollback step; missing fields default to
/// released.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerInputDto {
    pub player_id: u8,
    #[serde(default)]
    pub move_x: f32,
    #[serde(default)]
    pub move_y: f32,
    #[serde(default)]
    pub left_hand: bool,
    #[serde(default)]
    pub right_hand: bool,
    #[serde(default)]
    pub special: bool,
    #[serde(default)]
    pub roll: bool,
    #[serde(default)]
    pub jump: bool,
    #[serde(default)]
    pub light_attack: bool,
    #[serde(default)]
    pub heavy_attack: bool,
    #[serde(default)]
    pub block: bool,
}

impl PeerInputDto {
    /// Clamp into the internal record; returns the repaired-component count
    /// alongside.
    pub fn sanitize(&self) -> (crate::input::InputFrame, u32) {
        crate::input::InputFrame::sanitize(
            self.move_x,
            self.move_y,
            self.left_hand,
            self.right_hand,
            self.special,
            self.roll,
            self.jump,
            self.light_attack,
            self.heavy_attack,
            self.block,
        )
    }
}

/// Outcome of feeding a peer message or ticking the reconciler; mirrors
/// [`ReconcileAction`] in a host-friendly shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum OutboundAction {
    AdoptPhase { phase: u8, forced: bool },
    Broadcast { bytes: Vec<u8> },
    SendTo { to: PeerId, bytes: Vec<u8> },
}

pub fn player_view(core: &Core) -> PlayerView {
    let p = &core.player;
    let c = &core.combat;
    PlayerView {
        x: p.pos.x.to_f32(),
        y: p.pos.y.to_f32(),
        vel_x: p.vel.x.to_f32(),
        vel_y: p.vel.y.to_f32(),
        face_x: p.facing.x.to_f32(),
        face_y: p.facing.y.to_f32(),
        hp: p.hp.to_f32(),
        stamina: p.stamina.to_f32(),
        blocking: c.blocking,
        rolling: c.is_rolling(),
        stunned: c.stunned,
        attack_state: c.attack_state as u8,
        attack_type: c.attack_type as u8,
        combo_count: c.combo_count,
        character: p.character as u8,
        weapon: c.weapon.as_u8(),
        bash_charge: p.bash.charge.to_f32(),
        berserker_active: p.berserker.active,
        dash_combo_level: p.dash.combo_level,
    }
}

pub fn wolf_views(core: &Core) -> Vec<WolfView> {
    core.wolves
        .wolves()
        .map(|w| WolfView {
            id: w.id,
            x: w.pos.x.to_f32(),
            y: w.pos.y.to_f32(),
            face_x: w.facing.x.to_f32(),
            face_y: w.facing.y.to_f32(),
            hp: w.hp.to_f32(),
            wolf_type: w.wolf_type as u8,
            state: w.state as u8,
            pack_id: w.pack_id,
            role: w.role as u8,
            emotion: w.emotion as u8,
        })
        .collect()
}

pub fn pack_views(core: &Core) -> Vec<PackView> {
    core.wolves
        .packs()
        .map(|p| PackView {
            id: p.id,
            plan: p.plan as u8,
            morale: p.morale.to_f32(),
            member_count: p.member_ids.len(),
            leader_id: p.leader_id,
        })
        .collect()
}

pub fn stage_view(core: &Core) -> StageView {
    StageView {
        obstacles: core
            .obstacles
            .obstacles()
            .iter()
            .map(|o| ObstacleView {
                x: o.center.x.to_f32(),
                y: o.center.y.to_f32(),
                radius: o.radius.to_f32(),
            })
            .collect(),
        hazards: core
            .hazards
            .hazards()
            .iter()
            .map(|h| HazardView {
                kind: h.kind.as_u8(),
                x: h.center.x.to_f32(),
                y: h.center.y.to_f32(),
                radius: h.radius.to_f32(),
                active: h.active,
            })
            .collect(),
    }
}

pub fn frame_view(core: &Core) -> FrameView {
    FrameView {
        frame: core.frame(),
        phase: core.phase().as_u8(),
        gold: core.state.gold,
        essence: core.state.essence,
        room_count: core.state.room_count,
        biome: core.state.biome.as_u8(),
        player: player_view(core),
        wolves: wolf_views(core),
        packs: pack_views(core),
        diagnostics: core.diag,
    }
}

/// Flatten reconcile actions: encode outgoing messages, keep adoptions.
pub fn outbound_actions(local: PeerId, actions: Vec<ReconcileAction>) -> Vec<OutboundAction> {
    actions
        .into_iter()
        .map(|action| match action {
            ReconcileAction::AdoptPhase { phase, forced } => OutboundAction::AdoptPhase {
                phase: phase.as_u8(),
                forced,
            },
            ReconcileAction::Broadcast(msg) => OutboundAction::Broadcast {
                bytes: encode(local, &msg),
            },
            ReconcileAction::SendTo(to, msg) => OutboundAction::SendTo {
                to,
                bytes: encode(local, &msg),
            },
        })
        .collect()
}

fn encode(local: PeerId, msg: &PeerMessage) -> Vec<u8> {
    crate::phase_sync::encode_message(local, msg)
}

//! Input validation, edge detection and buffering.
//!
//! The host hands us one raw record per frame (floats and button bits); we
//! clamp it into a deterministic [`InputFrame`], derive edges by comparing
//! against the previous frame, infer light-vs-heavy from hand hold
//! durations, and resolve the Special+direction roll gesture. Actions that
//! arrive while combat is busy sit in a short buffer so a press a few frames
//! early is not lost.

use serde::{Deserialize, Serialize};

use crate::config::{HEAVY_HOLD_MS, INPUT_BUFFER_MS, TAP_WINDOW_MS};
use crate::math::{Fixed, Vec2F};

/// Which hand an attack comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Hand {
    Left = 0,
    Right = 1,
}

/// Normalized per-frame input record. All fields are already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputFrame {
    pub move_x: Fixed,
    pub move_y: Fixed,
    pub left_hand: bool,
    pub right_hand: bool,
    pub special: bool,
    pub jump: bool,
    pub roll: bool,
    pub block: bool,
    pub light_attack: bool,
    pub heavy_attack: bool,
}

impl InputFrame {
    /// Clamp a raw host record. Returns the frame plus the number of
    /// components that had to be repaired (NaN, ±∞, out of range).
    #[allow(clippy::too_many_arguments)]
    pub fn sanitize(
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
    ) -> (InputFrame, u32) {
        let mut clamped = 0;
        let mut axis = |v: f32| -> Fixed {
            if !v.is_finite() {
                clamped += 1;
                return Fixed::ZERO;
            }
            if !(-1.0..=1.0).contains(&v) {
                clamped += 1;
            }
            Fixed::from_f32(v).clamp(Fixed::NEG_ONE, Fixed::ONE)
        };
        let frame = InputFrame {
            move_x: axis(move_x),
            move_y: axis(move_y),
            left_hand,
            right_hand,
            special,
            jump,
            roll,
            block,
            light_attack,
            heavy_attack,
        };
        (frame, clamped)
    }

    /// Map the legacy 5-button layout onto the canonical record. Discrete
    /// light/heavy/special buttons become the corresponding edge bits; the
    /// hands stay unpressed so hold inference never fires.
    pub fn from_legacy_buttons(
        move_x: f32,
        move_y: f32,
        light: bool,
        heavy: bool,
        special: bool,
        roll: bool,
        block: bool,
    ) -> (InputFrame, u32) {
        InputFrame::sanitize(
            move_x, move_y, false, false, special, roll, false, light, heavy, block,
        )
    }

    pub fn move_dir(&self) -> Vec2F {
        Vec2F::new(self.move_x, self.move_y)
    }

    /// True when the stick is meaningfully deflected.
    pub fn direction_active(&self) -> bool {
        self.move_dir().length_sq() > Fixed::from_ratio(9, 100)
    }
}

/// Edges derived for the current frame, consumed by combat and the player
/// manager in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEdges {
    /// Hand tap released under the heavy threshold.
    pub light: Option<Hand>,
    /// Hand held past the heavy threshold this frame.
    pub heavy: Option<Hand>,
    /// Special resolved as an attack (no direction within the tap window).
    pub special: bool,
    /// Special+direction gesture or the explicit roll bit.
    pub roll: bool,
    pub jump: bool,
    pub block_pressed: bool,
    pub block_released: bool,
    /// Light-hand tap while shielded, for the tap-parry variant.
    pub shield_tap: bool,
}

/// Action that can wait in the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferedAction {
    Light(Hand),
    Heavy(Hand),
    Special,
    Roll,
}

const BUFFER_SLOTS: usize = 4;

/// Per-frame input state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputManager {
    pub(crate) current: InputFrame,
    pub(crate) previous: InputFrame,
    pub(crate) pending: InputFrame,
    /// Sim time each hand was pressed, while held.
    pub(crate) left_pressed_at: Option<Fixed>,
    pub(crate) right_pressed_at: Option<Fixed>,
    /// Heavy already fired for the current hold.
    pub(crate) left_heavy_fired: bool,
    pub(crate) right_heavy_fired: bool,
    /// Special press waiting on the tap-window decision.
    pub(crate) special_pending_since: Option<Fixed>,
    pub(crate) buffer: [Option<(BufferedAction, Fixed)>; BUFFER_SLOTS],
}

impl Default for InputManager {
    fn default() -> Self {
        InputManager::new()
    }
}

impl InputManager {
    pub fn new() -> InputManager {
        InputManager {
            current: InputFrame::default(),
            previous: InputFrame::default(),
            pending: InputFrame::default(),
            left_pressed_at: None,
            right_pressed_at: None,
            left_heavy_fired: false,
            right_heavy_fired: false,
            special_pending_since: None,
            buffer: [None; BUFFER_SLOTS],
        }
    }

    /// Store the record the next `begin_frame` will consume.
    pub fn set_pending(&mut self, frame: InputFrame) {
        self.pending = frame;
    }

    pub fn pending(&self) -> InputFrame {
        self.pending
    }

    pub fn current(&self) -> &InputFrame {
        &self.current
    }

    /// Promote the pending record and derive this frame's edges.
    pub fn begin_frame(&mut self, now: Fixed, shielded_weapon: bool) -> InputEdges {
        self.previous = self.current;
        self.current = self.pending;

        let cur = self.current;
        let prev = self.previous;
        let mut edges = InputEdges::default();

        // Hand press/release tracking with hold-duration inference.
        let heavy_hold = Fixed::from_millis(HEAVY_HOLD_MS);
        let mut track_hand = |held: bool,
                              was_held: bool,
                              pressed_at: &mut Option<Fixed>,
                              heavy_fired: &mut bool,
                              hand: Hand,
                              edges: &mut InputEdges| {
            if held && !was_held {
                *pressed_at = Some(now);
                *heavy_fired = false;
            }
            if held {
                if let Some(t0) = *pressed_at {
                    if !*heavy_fired && now - t0 >= heavy_hold {
                        edges.heavy = Some(hand);
                        *heavy_fired = true;
                    }
                }
            } else if was_held {
                if let Some(t0) = pressed_at.take() {
                    if !*heavy_fired && now - t0 < heavy_hold {
                        if shielded_weapon && hand == Hand::Left {
                            edges.shield_tap = true;
                        } else {
                            edges.light = Some(hand);
                        }
                    }
                }
                *heavy_fired = false;
            }
        };
        track_hand(
            cur.left_hand,
            prev.left_hand,
            &mut self.left_pressed_at,
            &mut self.left_heavy_fired,
            Hand::Left,
            &mut edges,
        );
        track_hand(
            cur.right_hand,
            prev.right_hand,
            &mut self.right_pressed_at,
            &mut self.right_heavy_fired,
            Hand::Right,
            &mut edges,
        );

        // Explicit edge bits from the record win over inference.
        if cur.light_attack && !prev.light_attack {
            edges.light = Some(Hand::Right);
        }
        if cur.heavy_attack && !prev.heavy_attack {
            edges.heavy = Some(Hand::Right);
        }

        // Special vs. roll gesture: a direction within the tap window turns
        // the press into a roll.
        let tap_window = Fixed::from_millis(TAP_WINDOW_MS);
        if cur.special && !prev.special {
            self.special_pending_since = Some(now);
        }
        if let Some(t0) = self.special_pending_since {
            if cur.direction_active() {
                edges.roll = true;
                self.special_pending_since = None;
            } else if now - t0 >= tap_window || (!cur.special && prev.special) {
                edges.special = true;
                self.special_pending_since = None;
            }
        }

        if cur.roll && !prev.roll {
            edges.roll = true;
        }
        edges.jump = cur.jump && !prev.jump;
        edges.block_pressed = cur.block && !prev.block;
        edges.block_released = !cur.block && prev.block;

        self.expire_buffer(now);
        edges
    }

    /// Queue an action that could not run this frame.
    pub fn buffer_action(&mut self, action: BufferedAction, now: Fixed) {
        let expiry = now + Fixed::from_millis(INPUT_BUFFER_MS);
        for slot in self.buffer.iter_mut() {
            if slot.is_none() {
                *slot = Some((action, expiry));
                return;
            }
        }
        // Full buffer: drop the oldest.
        self.buffer.rotate_left(1);
        self.buffer[BUFFER_SLOTS - 1] = Some((action, expiry));
    }

    /// Pop the oldest still-valid buffered action.
    pub fn take_buffered(&mut self, now: Fixed) -> Option<BufferedAction> {
        self.expire_buffer(now);
        for slot in self.buffer.iter_mut() {
            if let Some((action, _)) = slot.take() {
                return Some(action);
            }
        }
        None
    }

    fn expire_buffer(&mut self, now: Fixed) {
        for slot in self.buffer.iter_mut() {
            if let Some((_, expiry)) = slot {
                if now >= *expiry {
                    *slot = None;
                }
            }
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.iter().filter(|s| s.is_some()).count()
    }
}

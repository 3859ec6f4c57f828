//! Shared helpers for the integration suite.

#![allow(dead_code)]

use lupine_sim::core::Core;
use lupine_sim::input::InputFrame;
use lupine_sim::math::Fixed;
use lupine_sim::SimConfig;

pub const DT_MS: u32 = 16;

pub fn dt() -> Fixed {
    Fixed::from_millis(DT_MS)
}

pub fn ms(v: u32) -> Fixed {
    Fixed::from_millis(v)
}

/// A fresh core with a started run.
pub fn make_core(seed: u64, weapon: u32, character: u32) -> Core {
    let mut core = Core::new(SimConfig::default());
    core.init_run(seed, weapon, character);
    core
}

/// Step `frames` frames with no input.
pub fn idle_frames(core: &mut Core, frames: u32) {
    for _ in 0..frames {
        core.update(dt());
    }
}

/// Step until the sim clock reaches at least `target_ms`.
pub fn run_until_ms(core: &mut Core, target_ms: u32) {
    while core.now() < ms(target_ms) {
        core.update(dt());
    }
}

/// Builder for one frame of input.
#[derive(Default, Clone, Copy)]
pub struct InputBuilder {
    frame: InputFrame,
}

impl InputBuilder {
    pub fn new() -> InputBuilder {
        InputBuilder::default()
    }

    pub fn moving(mut self, x: f32, y: f32) -> InputBuilder {
        self.frame.move_x = Fixed::from_f32(x);
        self.frame.move_y = Fixed::from_f32(y);
        self
    }

    pub fn right_hand(mut self) -> InputBuilder {
        self.frame.right_hand = true;
        self
    }

    pub fn left_hand(mut self) -> InputBuilder {
        self.frame.left_hand = true;
        self
    }

    pub fn block(mut self) -> InputBuilder {
        self.frame.block = true;
        self
    }

    pub fn roll(mut self) -> InputBuilder {
        self.frame.roll = true;
        self
    }

    pub fn special(mut self) -> InputBuilder {
        self.frame.special = true;
        self
    }

    pub fn build(self) -> InputFrame {
        self.frame
    }
}

/// Apply one input frame and step once.
pub fn step_with(core: &mut Core, input: InputFrame) {
    core.advance_frame(&[(0, input)], dt());
}

/// Deterministic pseudo-input for soak runs: exercises movement, attacks,
/// blocks and rolls without any host randomness.
pub fn scripted_input(frame: u32) -> InputFrame {
    let (input, _) = InputFrame::sanitize(
        if frame % 120 < 60 { 1.0 } else { -0.6 },
        if frame % 200 < 100 { 0.4 } else { -0.4 },
        false,
        frame % 90 < 6,
        false,
        frame % 250 == 40,
        false,
        frame % 70 == 10,
        false,
        frame % 160 > 120,
    );
    input
}

/// Core with a small wolf population for state-rich runs.
pub fn busy_core(seed: u64) -> Core {
    let mut core = make_core(seed, 1, 0);
    core.spawn_wolf(0, 0.35, 0.35);
    core.spawn_wolf(0, 0.4, 0.35);
    core.spawn_wolf(1, 0.38, 0.3);
    core.spawn_barrel(0.6, 0.55);
    core
}

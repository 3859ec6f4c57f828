use clap::{Parser, Subcommand};
use lupine_sim::core::Core;
use lupine_sim::input::InputFrame;
use lupine_sim::math::Fixed;
use lupine_sim::snapshot;
use lupine_sim::SimConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sim_cli")]
#[command(about = "Headless tools for the deterministic combat simulation core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the same seed twice and compare per-frame checksums
    Determinism {
        /// Run seed
        #[arg(short, long, default_value_t = 1)]
        seed: u64,
        /// Frames to simulate
        #[arg(short, long, default_value_t = 600)]
        frames: u32,
    },
    /// Dump a per-frame checksum trace as CSV
    Checksums {
        #[arg(short, long, default_value_t = 1)]
        seed: u64,
        #[arg(short, long, default_value_t = 600)]
        frames: u32,
        /// Print every Nth frame
        #[arg(short, long, default_value_t = 1)]
        every: u32,
        /// Output file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay an input script and print the final digest
    Replay {
        /// Path to the script JSON file
        script: PathBuf,
    },
    /// Save at a mid-run frame, keep going, roll back, and verify the
    /// re-simulated timeline matches
    Rollback {
        #[arg(short, long, default_value_t = 1)]
        seed: u64,
        #[arg(short, long, default_value_t = 300)]
        frames: u32,
        /// Frame to roll back to
        #[arg(short, long, default_value_t = 120)]
        rollback_at: u32,
    },
}

/// Input script: seed, timestep, and sparse per-frame input records.
#[derive(Debug, Serialize, Deserialize)]
struct ReplayScript {
    seed: u64,
    #[serde(default = "default_dt_ms")]
    dt_ms: u32,
    #[serde(default)]
    weapon: u32,
    #[serde(default)]
    character: u32,
    inputs: Vec<ScriptInput>,
}

fn default_dt_ms() -> u32 {
    16
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptInput {
    frame: u32,
    #[serde(default)]
    move_x: f32,
    #[serde(default)]
    move_y: f32,
    #[serde(default)]
    left_hand: bool,
    #[serde(default)]
    right_hand: bool,
    #[serde(default)]
    special: bool,
    #[serde(default)]
    roll: bool,
    #[serde(default)]
    jump: bool,
    #[serde(default)]
    light_attack: bool,
    #[serde(default)]
    heavy_attack: bool,
    #[serde(default)]
    block: bool,
}

fn dt() -> Fixed {
    Fixed::from_millis(16)
}

fn new_core(seed: u64, weapon: u32, character: u32) -> Core {
    let mut core = Core::new(SimConfig::default());
    core.init_run(seed, weapon, character);
    // A small fixed population makes the trace non-trivial.
    core.spawn_wolf(0, 0.35, 0.35);
    core.spawn_wolf(0, 0.4, 0.35);
    core.spawn_wolf(1, 0.38, 0.3);
    core.spawn_barrel(0.6, 0.55);
    core
}

/// Deterministic synthetic input so headless traces exercise combat.
fn scripted_input(frame: u32) -> InputFrame {
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

fn run_determinism(seed: u64, frames: u32) -> bool {
    let mut a = new_core(seed, 1, 0);
    let mut b = new_core(seed, 1, 0);
    for frame in 0..frames {
        let input = scripted_input(frame);
        a.advance_frame(&[(0, input)], dt());
        b.advance_frame(&[(0, input)], dt());
        let (ca, cb) = (snapshot::checksum(&a), snapshot::checksum(&b));
        if ca != cb {
            println!("DIVERGED at frame {}: {:#018x} vs {:#018x}", frame, ca, cb);
            return false;
        }
    }
    println!(
        "OK: {} frames bit-identical (final checksum {:#018x})",
        frames,
        snapshot::checksum(&a)
    );
    true
}

fn run_checksums(seed: u64, frames: u32, every: u32, output: Option<PathBuf>) {
    let mut core = new_core(seed, 1, 0);
    let mut lines = String::from("frame,checksum,enhanced\n");
    for frame in 0..frames {
        core.advance_frame(&[(0, scripted_input(frame))], dt());
        if frame % every.max(1) == 0 {
            lines.push_str(&format!(
                "{},{:#018x},{:#018x}\n",
                frame,
                snapshot::checksum(&core),
                snapshot::enhanced_checksum(&core)
            ));
        }
    }
    match output {
        Some(path) => {
            fs::write(&path, lines).expect("failed to write output file");
            println!("wrote {} frames to {:?}", frames, path);
        }
        None => print!("{}", lines),
    }
}

fn run_replay(script_path: PathBuf) {
    let content = fs::read_to_string(&script_path).expect("failed to read script file");
    let script: ReplayScript = serde_json::from_str(&content).expect("failed to parse script");

    let mut core = new_core(script.seed, script.weapon, script.character);
    let step = Fixed::from_millis(script.dt_ms);
    let last_frame = script.inputs.iter().map(|i| i.frame).max().unwrap_or(0);

    let mut inputs_by_frame = std::collections::BTreeMap::new();
    for entry in &script.inputs {
        let (frame, clamped) = InputFrame::sanitize(
            entry.move_x,
            entry.move_y,
            entry.left_hand,
            entry.right_hand,
            entry.special,
            entry.roll,
            entry.jump,
            entry.light_attack,
            entry.heavy_attack,
            entry.block,
        );
        if clamped > 0 {
            eprintln!("warning: clamped {} component(s) at frame {}", clamped, entry.frame);
        }
        inputs_by_frame.insert(entry.frame, frame);
    }

    for frame in 0..=last_frame {
        match inputs_by_frame.get(&frame) {
            Some(input) => core.advance_frame(&[(0, *input)], step),
            // Missing frames replay the last-known input (prediction).
            None => core.advance_frame(&[], step),
        }
        for event in core.frame_events() {
            println!("[{}] {}", frame, event.kind());
        }
    }
    println!(
        "replayed {} frames: phase={:?} hp={:.3} checksum={:#018x}",
        last_frame + 1,
        core.phase(),
        core.player.hp.to_f32(),
        snapshot::checksum(&core)
    );
}

fn run_rollback(seed: u64, frames: u32, rollback_at: u32) -> bool {
    let rollback_at = rollback_at.min(frames.saturating_sub(1));
    let mut core = new_core(seed, 1, 0);
    let mut saved = None;
    let mut checkpoint_checksums = Vec::new();

    for frame in 0..frames {
        core.advance_frame(&[(0, scripted_input(frame))], dt());
        if frame == rollback_at {
            saved = Some(snapshot::save_state(&core));
        }
        checkpoint_checksums.push(snapshot::checksum(&core));
    }
    let final_original = snapshot::checksum(&core);

    // Roll back and re-simulate the tail with identical inputs.
    let blob = saved.expect("rollback frame inside the run");
    snapshot::load_state(&mut core, &blob).expect("snapshot restores");
    assert_eq!(
        snapshot::checksum(&core),
        checkpoint_checksums[rollback_at as usize],
        "restore lands on the checkpoint digest"
    );
    for frame in rollback_at + 1..frames {
        core.advance_frame(&[(0, scripted_input(frame))], dt());
        if snapshot::checksum(&core) != checkpoint_checksums[frame as usize] {
            println!("REPLAY DIVERGED at frame {}", frame);
            return false;
        }
    }
    let replayed = snapshot::checksum(&core);
    if replayed == final_original {
        println!(
            "OK: rollback to frame {} re-simulated {} frames bit-identically",
            rollback_at,
            frames - rollback_at - 1
        );
        true
    } else {
        println!(
            "MISMATCH: original {:#018x}, replayed {:#018x}",
            final_original, replayed
        );
        false
    }
}

fn main() {
    let cli = Cli::parse();
    let ok = match cli.command {
        Commands::Determinism { seed, frames } => run_determinism(seed, frames),
        Commands::Checksums {
            seed,
            frames,
            every,
            output,
        } => {
            run_checksums(seed, frames, every, output);
            true
        }
        Commands::Replay { script } => {
            run_replay(script);
            true
        }
        Commands::Rollback {
            seed,
            frames,
            rollback_at,
        } => run_rollback(seed, frames, rollback_at),
    };
    if !ok {
        std::process::exit(1);
    }
}

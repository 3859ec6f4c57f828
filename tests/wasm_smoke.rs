//! Wasm-target smoke test: the bound surface drives a short deterministic
//! run inside the browser harness. Compiles to nothing on native targets.

#![cfg(target_arch = "wasm32")]

use lupine_sim::SimHandle;
use wasm_bindgen_test::wasm_bindgen_test;

#[wasm_bindgen_test]
fn handle_runs_and_checksums_deterministically() {
    let mut a = SimHandle::new(7, 1, 0, 0);
    let mut b = SimHandle::new(7, 1, 0, 1);
    for i in 0..120u32 {
        let x = if i % 40 < 20 { 1.0 } else { -1.0 };
        a.set_player_input(x, 0.0, false, false, false, false, false, i % 30 == 0, false, false);
        b.set_player_input(x, 0.0, false, false, false, false, false, i % 30 == 0, false, false);
        a.update(0.016);
        b.update(0.016);
        assert_eq!(a.checksum(), b.checksum());
    }
}

#[wasm_bindgen_test]
fn snapshot_round_trips_through_the_boundary() {
    let mut handle = SimHandle::new(3, 2, 2, 0);
    for _ in 0..30 {
        handle.update(0.016);
    }
    let blob = handle.save_state();
    let digest = handle.checksum();
    handle.update(0.016);
    assert_ne!(handle.checksum(), digest);
    handle.load_state(&blob).unwrap();
    assert_eq!(handle.checksum(), digest);
}

//! Coarse timing gates over compilation and dispatch.

mod common;

use std::sync::Arc;
use std::time::Instant;

use pfx_vm::{Buffer, Machine};

#[test]
fn inline_heavy_compiles_stay_fast() {
    let source = r#"
        float shade0(float x) { return x * 1.5 + 0.25; }
        float shade1(float x) { return shade0(x) + shade0(x * 0.5); }
        float shade2(float x) { return shade1(x) + shade1(x * 0.5); }
        float shade3(float x) { return shade2(x) + shade2(x * 0.5); }
        float shade4(float x) { return shade3(x) + shade3(x * 0.5); }
        float shade5(float x) { return shade4(x) + shade4(x * 0.5); }

        [pixel] float main(float x) {
            return shade5(x);
        }
    "#;

    let start = Instant::now();
    for _ in 0..50 {
        let program = common::compile(source, "main");
        assert!(!program.code.is_empty());
    }
    let elapsed = start.elapsed();

    eprintln!("50 inline-heavy compiles: {elapsed:?}");
    assert!(elapsed.as_secs() < 5, "compilation took too long: {elapsed:?}");
}

#[test]
fn wide_dispatches_stay_fast() {
    let source = r#"
        [compute] void main(out int hits[]) {
            int slot = incrementCounter(hits);
            hits[slot] = slot;
        }
    "#;
    let mut machine = Machine::new(common::compile(source, "main"));
    let hits = Arc::new(Buffer::with_len(16384));
    machine.set_input(0, Arc::clone(&hits));

    let start = Instant::now();
    machine.dispatch(64, 256).expect("dispatch faulted");
    let elapsed = start.elapsed();

    eprintln!("16384 invocations: {elapsed:?}");
    assert_eq!(hits.read_counter(), 16384);
    assert!(elapsed.as_secs() < 5, "dispatch took too long: {elapsed:?}");
}

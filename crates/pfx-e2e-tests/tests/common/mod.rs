use std::sync::Arc;

use pfx_analysis::Analysis;
use pfx_bytecode::{Program, TranslateError};
use pfx_vm::{Buffer, Machine};

/// Parse and analyze, keeping the diagnostic report inspectable.
#[allow(dead_code)]
pub fn analyze(source: &str) -> Analysis {
    let unit = pfx_parser::parse(source).expect("parse failed");
    pfx_analysis::analyze(unit).expect("analysis failed")
}

/// Full front half of the pipeline: source to a compiled program.
///
/// Panics if analysis reports any error.
#[allow(dead_code)]
pub fn compile(source: &str, entry: &str) -> Program {
    let analysis = analyze(source);
    assert!(
        analysis.success(),
        "analysis reported errors: {:?}",
        analysis.report
    );
    pfx_bytecode::compile(&analysis.module, entry).expect("translation failed")
}

/// Like `compile` but hands the translator's verdict back to the caller.
#[allow(dead_code)]
pub fn try_compile(source: &str, entry: &str) -> Result<Program, TranslateError> {
    let analysis = analyze(source);
    assert!(
        analysis.success(),
        "analysis reported errors: {:?}",
        analysis.report
    );
    pfx_bytecode::compile(&analysis.module, entry)
}

/// Compile and run one invocation, with one input slot per word slice.
#[allow(dead_code)]
pub fn evaluate(source: &str, entry: &str, inputs: &[&[u32]]) -> u32 {
    let mut machine = Machine::new(compile(source, entry));
    for (slot, words) in inputs.iter().enumerate() {
        machine.set_input(slot as u32, Arc::new(Buffer::from_words(words)));
    }
    machine.evaluate().expect("execution faulted")
}

/// Compile and run one invocation, reading back the whole return window.
#[allow(dead_code)]
pub fn evaluate_window(source: &str, entry: &str, inputs: &[&[u32]]) -> Vec<u32> {
    let mut machine = Machine::new(compile(source, entry));
    for (slot, words) in inputs.iter().enumerate() {
        machine.set_input(slot as u32, Arc::new(Buffer::from_words(words)));
    }
    machine.evaluate_window().expect("execution faulted")
}

/// `evaluate` with float plumbing on both sides, one scalar input per slot.
#[allow(dead_code)]
pub fn evaluate_f32(source: &str, entry: &str, inputs: &[f32]) -> f32 {
    let words: Vec<[u32; 1]> = inputs.iter().map(|x| [x.to_bits()]).collect();
    let slices: Vec<&[u32]> = words.iter().map(|w| w.as_slice()).collect();
    f32::from_bits(evaluate(source, entry, &slices))
}

/// Count of diagnostics carrying one code.
#[allow(dead_code)]
pub fn errors_with(analysis: &Analysis, code: u32) -> usize {
    analysis.report.with_code(code).count()
}

//! Whole-program analysis passes.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] with fixed-point iteration,
//! and the passes the analyzer runs after every function body has been
//! type-checked: recursion rejection, vertex/pixel stage-usage closure, and
//! constant folding.

mod const_fold;
mod recursion;
mod stage_usage;

pub use const_fold::ConstantFolding;
pub use recursion::RecursionCheck;
pub use stage_usage::StageUsage;

use std::fmt::Debug;

use pfx_ir::{DiagnosticReport, Module};

/// A pass over a typed module. Passes may flip declaration flags, rewrite
/// expressions, and emit diagnostics; they never add or remove declarations.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Runs the pass. Returns `true` if anything was modified.
    fn run(&self, module: &mut Module, report: &mut DiagnosticReport) -> bool;
}

/// Maximum number of fixed-point iterations before giving up.
const MAX_ITERATIONS: usize = 10;

/// Runs passes in sequence with fixed-point iteration.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The pipeline the analyzer runs after resuming all function bodies.
    pub fn analysis() -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(RecursionCheck));
        pm.add_pass(Box::new(StageUsage));
        pm.add_pass(Box::new(ConstantFolding));
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Runs all passes until a fixed point is reached or the iteration limit.
    pub fn run(&self, module: &mut Module, report: &mut DiagnosticReport) {
        for _ in 0..MAX_ITERATIONS {
            let mut changed = false;
            for pass in &self.passes {
                let modified = pass.run(module, report);
                tracing::debug!(pass = pass.name(), modified, "pass finished");
                changed |= modified;
            }
            if !changed {
                break;
            }
        }
    }
}

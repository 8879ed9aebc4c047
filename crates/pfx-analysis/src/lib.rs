//! Semantic analysis for PFX source.
//!
//! [`analyze`] turns a parsed [`SourceUnit`](pfx_parser::ast::SourceUnit)
//! into a typed [`Module`] plus everything the later stages want: the scope
//! tree (kept for reflection), annotation frames, and a diagnostic report.
//! Recoverable problems land in the report; only an unresolvable type name
//! makes analysis bail out with an [`AnalysisError`].

mod analyzer;
mod env;
mod scope;

use std::collections::HashMap;

use pfx_ir::{DiagnosticReport, Handle, Module, Span, VariableDecl};
use thiserror::Error;

pub use analyzer::Analyzer;
pub use env::{BuiltinFunction, Environment, Lowering, ParamRule};
pub use scope::{DeclareError, ScopeId, ScopeKind, ScopeTree};

/// Unrecoverable analysis failures. Ordinary type errors accumulate in the
/// report instead of surfacing here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unknown type '{name}'")]
    UnknownType { name: String, span: Span },
}

impl AnalysisError {
    /// Source location of the failure.
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownType { span, .. } => *span,
        }
    }
}

/// Everything analysis produced.
#[derive(Debug)]
pub struct Analysis {
    /// The typed module, ready for the bytecode translator.
    pub module: Module,
    /// The scope tree the module was analyzed under.
    pub scopes: ScopeTree,
    /// Annotation frames keyed by the declaration they annotate.
    pub annotations: HashMap<Handle<VariableDecl>, ScopeId>,
    /// Errors and warnings, sorted by source position.
    pub report: DiagnosticReport,
}

impl Analysis {
    /// Whether the module is clean enough to compile.
    pub fn success(&self) -> bool {
        !self.report.has_errors()
    }
}

/// Analyzes a parsed source unit under lax shadowing rules.
pub fn analyze(unit: pfx_parser::ast::SourceUnit) -> Result<Analysis, AnalysisError> {
    Analyzer::new(false).analyze(unit)
}

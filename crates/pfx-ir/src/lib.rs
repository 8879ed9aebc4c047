//! PFX intermediate representation.
//!
//! An arena-based typed tree for effect programs: a structural type system
//! with qualifier tracking, expression and statement nodes, and the
//! per-function flags driven by whole-program analysis.

pub mod arena;
mod check;
mod decl;
mod diag;
mod display;
mod expr;
mod span;
mod stmt;
mod types;

pub use arena::{Arena, Handle, UniqueArena};
pub use check::{BinaryOp, UnaryOp, check_binary, check_unary};
pub use decl::{EntryPoint, FunctionBody, FunctionDecl, Stage, VarKind, VariableDecl};
pub use diag::{Diagnostic, DiagnosticReport, Severity, code};
pub use display::{dump_module, format_type};
pub use expr::{ExprKind, Expression, Literal, MathFunction};
pub use span::Span;
pub use stmt::Statement;
pub use types::{
    ArraySize, FieldAccess, Qualifiers, ScalarKind, StructMember, SystemTypes, Type, TypeInner,
    TypeRef, VectorSize, base_scalar, byte_size, contains_opaque, field_access, is_base,
    types_equal, weak_signature,
};

/// A typed effect module.
#[derive(Clone, Debug)]
pub struct Module {
    /// Deduplicated type arena.
    pub types: UniqueArena<Type>,
    /// Handles to the interned built-in scalar, vector, and matrix types.
    pub sys: SystemTypes,
    /// Every declared variable: globals, parameters, and locals.
    pub variables: Arena<VariableDecl>,
    /// Initializer expressions for module-scope variables.
    pub global_expressions: Arena<Expression>,
    /// Module-scope variables, in declaration order.
    pub globals: Vec<Handle<VariableDecl>>,
    /// Declared functions, in declaration order.
    pub functions: Arena<FunctionDecl>,
    /// Functions marked as invocation targets.
    pub entry_points: Vec<EntryPoint>,
}

impl Module {
    /// Creates an empty module with the built-in types interned.
    pub fn new() -> Self {
        let mut types = UniqueArena::new();
        let sys = SystemTypes::register(&mut types);
        Self {
            types,
            sys,
            variables: Arena::new(),
            global_expressions: Arena::new(),
            globals: Vec::new(),
            functions: Arena::new(),
            entry_points: Vec::new(),
        }
    }

    /// Looks up an entry point by name.
    pub fn entry_point(&self, name: &str) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|ep| ep.name == name)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

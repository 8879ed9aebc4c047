//! Variable and function declarations, entry points.

use crate::arena::{Arena, Handle};
use crate::expr::Expression;
use crate::span::Span;
use crate::stmt::Statement;
use crate::types::TypeRef;

/// Where a variable was declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    /// Module-scope variable (including `uniform` and `const` globals).
    Global,
    /// Function parameter, with its zero-based position in the signature.
    Param { index: u32 },
    /// Function-local variable.
    Local,
    /// Struct member, collected in a struct scope frame. Never reaches the
    /// translator; member reads resolve to offsets instead.
    Member,
    /// Annotation metadata entry. Reflection-only, never compiled.
    Annotation,
}

/// A declared variable. All variables of a module live in one arena;
/// `kind` records where the declaration appeared.
#[derive(Clone, Debug)]
pub struct VariableDecl {
    /// Declared name.
    pub name: String,
    /// Declared type, including qualifiers and readability overrides.
    pub ty: TypeRef,
    /// Declaration site.
    pub kind: VarKind,
    /// Optional initializer. For globals this indexes
    /// [`Module::global_expressions`](crate::Module::global_expressions);
    /// for locals it indexes the owning function's expression arena.
    pub init: Option<Handle<Expression>>,
    /// Source range of the declaration.
    pub span: Span,
}

/// The body of a function that has an implementation: its own expression
/// arena plus the statement block.
#[derive(Clone, Debug, Default)]
pub struct FunctionBody {
    /// Expression arena for this function.
    pub expressions: Arena<Expression>,
    /// The statement block.
    pub block: Vec<Statement>,
}

/// A declared function.
///
/// The capability and usage flags start at their declaration defaults and
/// are only mutated by the whole-program passes; declarations are never
/// removed once created.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    /// Declared name. Overloads share a name and are told apart by their
    /// parameter lists.
    pub name: String,
    /// Return type. `None` until an `auto` return type has been inferred
    /// from the body's first `return` statement.
    pub result: Option<TypeRef>,
    /// Formal parameters, in declaration order.
    pub params: Vec<Handle<VariableDecl>>,
    /// The body, once resumed. `None` between signature registration and
    /// body analysis.
    pub body: Option<FunctionBody>,
    /// Source range of the declaration.
    pub span: Span,
    /// May participate in a vertex program. Cleared by usage inference.
    pub valid_for_vertex: bool,
    /// May participate in a pixel program. Cleared by usage inference.
    pub valid_for_pixel: bool,
    /// Reachable from a vertex entry point.
    pub used_as_vertex: bool,
    /// Reachable from a pixel entry point.
    pub used_as_pixel: bool,
    /// Disqualified by recursion or a stage violation; calling it is an
    /// error.
    pub blacklisted: bool,
    /// Direct callees, recorded while the body is analyzed. Whole-program
    /// passes compute reachability over these edges without mutating them.
    pub used_functions: Vec<Handle<FunctionDecl>>,
}

impl FunctionDecl {
    /// Creates a declaration with no parameters, no body, and the default
    /// capability flags.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            result: None,
            params: Vec::new(),
            body: None,
            span,
            valid_for_vertex: true,
            valid_for_pixel: true,
            used_as_vertex: false,
            used_as_pixel: false,
            blacklisted: false,
            used_functions: Vec::new(),
        }
    }

    /// Records a call-graph edge, once per callee.
    pub fn add_used(&mut self, callee: Handle<FunctionDecl>) {
        if !self.used_functions.contains(&callee) {
            self.used_functions.push(callee);
        }
    }
}

/// The pipeline stage an entry point is declared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Pixel,
    Compute,
}

impl Stage {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
            Self::Compute => "compute",
        }
    }
}

/// A function marked as an invocation target.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    /// The entry function's name, for lookup by the driver.
    pub name: String,
    /// Declared stage.
    pub stage: Stage,
    /// The entry function.
    pub function: Handle<FunctionDecl>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::UniqueArena;
    use crate::types::{ScalarKind, SystemTypes};

    #[test]
    fn new_function_defaults() {
        let f = FunctionDecl::new("claim", Span::NONE);
        assert!(f.valid_for_vertex && f.valid_for_pixel);
        assert!(!f.used_as_vertex && !f.used_as_pixel && !f.blacklisted);
        assert!(f.result.is_none());
        assert!(f.body.is_none());
        assert!(f.used_functions.is_empty());
    }

    #[test]
    fn call_edges_are_deduplicated() {
        let mut functions = Arena::new();
        let callee = functions.append(FunctionDecl::new("helper", Span::NONE));
        let mut f = FunctionDecl::new("main", Span::NONE);
        f.add_used(callee);
        f.add_used(callee);
        assert_eq!(f.used_functions.len(), 1);
    }

    #[test]
    fn variable_decl_kinds() {
        let mut types = UniqueArena::new();
        let sys = SystemTypes::register(&mut types);
        let var = VariableDecl {
            name: "pos".into(),
            ty: TypeRef::new(sys.scalar(ScalarKind::Float)),
            kind: VarKind::Param { index: 2 },
            init: None,
            span: Span::NONE,
        };
        assert_eq!(var.kind, VarKind::Param { index: 2 });
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Vertex.name(), "vertex");
        assert_eq!(Stage::Compute.name(), "compute");
    }
}

//! Untyped syntax tree.
//!
//! Names are unresolved strings; the analyzer binds them against scopes and
//! decides which calls are constructors, which member accesses are swizzles,
//! and so on.

use pfx_ir::{BinaryOp, Literal, Qualifiers, Span, UnaryOp};

/// A parsed source file.
#[derive(Clone, Debug, Default)]
pub struct SourceUnit {
    pub items: Vec<Item>,
}

/// A top-level declaration.
#[derive(Clone, Debug)]
pub enum Item {
    Struct(StructDef),
    /// One global declarator group (`float a = 1, b;` yields two defs).
    Vars(Vec<VarDef>),
    Function(FunctionDef),
}

/// An unresolved type spelling.
#[derive(Clone, Debug)]
pub struct TypeName {
    pub name: String,
    pub span: Span,
}

/// `[len]` or `[]` on a declarator.
#[derive(Clone, Debug)]
pub struct ArraySuffix {
    /// `None` leaves the length undefined.
    pub len: Option<Expr>,
    pub span: Span,
}

/// A variable-shaped declaration: globals, locals, parameters, struct
/// members, and annotation entries all share this form.
#[derive(Clone, Debug)]
pub struct VarDef {
    pub quals: Qualifiers,
    pub ty: TypeName,
    pub name: String,
    pub array: Option<ArraySuffix>,
    pub annotation: Option<Annotation>,
    pub init: Option<Expr>,
    pub span: Span,
}

/// A `<...>` metadata block attached to a global.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub entries: Vec<VarDef>,
    pub span: Span,
}

/// A `struct` declaration.
#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<VarDef>,
    pub span: Span,
}

/// A `[name]` marker before a function.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub span: Span,
}

/// A function declaration, with or without a body.
#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub attr: Option<Attribute>,
    /// Return type spelling; `auto` defers to inference.
    pub result: TypeName,
    pub name: String,
    pub params: Vec<VarDef>,
    /// `None` for a bare prototype.
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

/// An expression with its source range.
#[derive(Clone, Debug)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// Function call or constructor; resolved by name later.
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// Field access or swizzle; resolved by name later.
    Member {
        base: Box<Expr>,
        name: String,
        span: Span,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::Literal { span, .. }
            | Self::Ident { span, .. }
            | Self::Unary { span, .. }
            | Self::Binary { span, .. }
            | Self::Call { span, .. }
            | Self::Member { span, .. }
            | Self::Index { span, .. } => *span,
        }
    }
}

/// A statement.
#[derive(Clone, Debug)]
pub enum Stmt {
    Decl {
        vars: Vec<VarDef>,
        span: Span,
    },
    Assign {
        op: BinaryOp,
        target: Expr,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    If {
        cond: Expr,
        accept: Vec<Stmt>,
        reject: Vec<Stmt>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
}

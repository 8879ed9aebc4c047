//! Typed expression nodes.
//!
//! Expressions live in a per-function [`Arena`](crate::arena::Arena) (the
//! module holds a separate arena for global initialisers). Every node
//! carries its resolved [`TypeRef`] and source span; children are handles
//! into the same arena, declaration references point into the module's
//! declaration arena and are non-owning.

use crate::arena::Handle;
use crate::check::{BinaryOp, UnaryOp};
use crate::decl::{FunctionDecl, VariableDecl};
use crate::span::Span;
use crate::types::TypeRef;

/// A literal constant value.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl Literal {
    /// The raw 32-bit word this literal occupies in constant memory.
    /// Strings never reach memory; they exist for annotations only.
    pub fn to_bits(&self) -> Option<u32> {
        match self {
            Literal::Int(v) => Some(*v as u32),
            Literal::Float(v) => Some(v.to_bits()),
            Literal::Bool(v) => Some(u32::from(*v)),
            Literal::Str(_) => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// Built-in math functions with direct or composed register lowerings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Abs,
    Floor,
    Ceil,
    Frac,
    Sin,
    Cos,
    Sqrt,
    Min,
    Max,
    Lerp,
    Dot,
}

impl MathFunction {
    /// Source-level builtin name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Frac => "frac",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Sqrt => "sqrt",
            Self::Min => "min",
            Self::Max => "max",
            Self::Lerp => "lerp",
            Self::Dot => "dot",
        }
    }
}

/// A typed expression node.
#[derive(Clone, Debug)]
pub struct Expression {
    pub kind: ExprKind,
    pub ty: TypeRef,
    pub span: Span,
}

/// The expression variants.
#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Literal),
    /// A reference to a declared variable or parameter.
    Variable(Handle<VariableDecl>),
    /// Vector component selection; `components` are source indices in
    /// result order.
    Swizzle {
        base: Handle<Expression>,
        components: Vec<u8>,
    },
    /// Struct member access at a resolved byte offset.
    Member {
        base: Handle<Expression>,
        index: u32,
        offset: u32,
    },
    /// Array element access.
    Index {
        base: Handle<Expression>,
        index: Handle<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Handle<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
    /// A call to a user function, resolved to its declaration. Inlined away
    /// by the bytecode translator.
    Call {
        function: Handle<FunctionDecl>,
        arguments: Vec<Handle<Expression>>,
    },
    /// Vector/matrix construction. One scalar argument broadcasts; several
    /// arguments concatenate by component count. The node type is the
    /// constructed type.
    Construct {
        components: Vec<Handle<Expression>>,
    },
    /// Scalar conversion to the node type.
    Cast {
        expr: Handle<Expression>,
    },
    /// Builtin math call.
    Math {
        fun: MathFunction,
        args: Vec<Handle<Expression>>,
    },
    /// Atomic increment-and-fetch of an external buffer's counter word.
    CounterIncrement {
        buffer: Handle<VariableDecl>,
    },
    /// The flat invocation index inside a dispatch.
    ThreadIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_bit_patterns() {
        assert_eq!(Literal::Int(-1).to_bits(), Some(u32::MAX));
        assert_eq!(Literal::Float(1.0).to_bits(), Some(0x3f80_0000));
        assert_eq!(Literal::Bool(true).to_bits(), Some(1));
        assert_eq!(Literal::Bool(false).to_bits(), Some(0));
        assert_eq!(Literal::Str("hi".into()).to_bits(), None);
    }

    #[test]
    fn math_function_names_match_builtin_spellings() {
        assert_eq!(MathFunction::Frac.name(), "frac");
        assert_eq!(MathFunction::Lerp.name(), "lerp");
    }
}

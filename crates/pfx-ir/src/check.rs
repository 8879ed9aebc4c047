//! Operator/type compatibility.
//!
//! [`check_binary`] and [`check_unary`] are pure classifiers: given an
//! operator and resolved operand types they either produce the result type
//! or `None`. They never report; the analyzer turns `None` into a
//! diagnostic at the call site.

use crate::arena::UniqueArena;
use crate::types::{
    base_scalar, contains_opaque, is_base, ScalarKind, SystemTypes, Type, TypeInner, TypeRef,
};

/// Binary operators, including the assignment family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LogicalAnd,
    LogicalOr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    /// Source spelling of the operator.
    pub fn token(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AddAssign
                | Self::SubAssign
                | Self::MulAssign
                | Self::DivAssign
                | Self::ModAssign
        )
    }

    /// The arithmetic operator a compound assignment applies, if any.
    pub fn arithmetic_part(self) -> Option<BinaryOp> {
        match self {
            Self::AddAssign => Some(Self::Add),
            Self::SubAssign => Some(Self::Sub),
            Self::MulAssign => Some(Self::Mul),
            Self::DivAssign => Some(Self::Div),
            Self::ModAssign => Some(Self::Mod),
            _ => None,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr)
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Plus,
    LogicalNot,
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Plus => "+",
            Self::LogicalNot => "!",
        }
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Computes the result type of `left op right`, or `None` when the
/// combination is not legal.
///
/// Rule order: arrays of non-base elements and resource types are rejected
/// outright; `%`/`%=` never succeeds; assignments require a writable left
/// and readable right; struct types allow only exact `=` and (opaque-free)
/// equality; identical base types allow arithmetic (never `/` on matrices),
/// scalar relational and equality; a scalar broadcasts against a
/// vector/matrix of the same base; matrix×vector multiplication needs
/// matching dimensions and yields the vector operand's type.
pub fn check_binary(
    types: &UniqueArena<Type>,
    sys: &SystemTypes,
    op: BinaryOp,
    left: &TypeRef,
    right: &TypeRef,
) -> Option<TypeRef> {
    if rejected_operand(types, left) || rejected_operand(types, right) {
        return None;
    }
    if matches!(op, BinaryOp::Mod | BinaryOp::ModAssign) {
        return None;
    }

    let bool_ty = TypeRef::new(sys.scalar(ScalarKind::Bool));

    if op.is_assignment() {
        if !left.writable(types) || !right.readable() {
            return None;
        }
        return match op.arithmetic_part() {
            // Plain `=` requires structural equality (arrays may still carry
            // a wildcard length here).
            None => left.is_equal(right, types).then(|| TypeRef::new(left.ty)),
            Some(arith) => {
                let result = check_binary(types, sys, arith, left, right)?;
                result.is_equal(left, types).then(|| TypeRef::new(left.ty))
            }
        };
    }

    let left_struct = matches!(types[left.ty].inner, TypeInner::Struct { .. });
    let right_struct = matches!(types[right.ty].inner, TypeInner::Struct { .. });
    if left_struct || right_struct {
        if op.is_equality()
            && left_struct
            && right_struct
            && left.is_equal(right, types)
            && !contains_opaque(types, left.ty)
            && !contains_opaque(types, right.ty)
        {
            return Some(bool_ty);
        }
        return None;
    }

    // Whole-array operations stop at assignment, handled above.
    if matches!(types[left.ty].inner, TypeInner::Array { .. })
        || matches!(types[right.ty].inner, TypeInner::Array { .. })
    {
        return None;
    }

    if op.is_logical() {
        let both_bool = types[left.ty].inner == TypeInner::Scalar(ScalarKind::Bool)
            && types[right.ty].inner == TypeInner::Scalar(ScalarKind::Bool);
        return both_bool.then_some(bool_ty);
    }

    if op.is_equality() {
        return left.is_equal(right, types).then_some(bool_ty);
    }

    if op.is_relational() {
        let lk = scalar_kind(types, left.ty)?;
        let rk = scalar_kind(types, right.ty)?;
        return (lk == rk && lk.is_numeric()).then_some(bool_ty);
    }

    debug_assert!(op.is_arithmetic());

    // Division never applies to matrices, in any operand position.
    let involves_matrix = matches!(types[left.ty].inner, TypeInner::Matrix { .. })
        || matches!(types[right.ty].inner, TypeInner::Matrix { .. });
    if op == BinaryOp::Div && involves_matrix {
        return None;
    }

    if left.is_equal(right, types) {
        let kind = base_scalar(types, left.ty)?;
        return kind.is_numeric().then(|| TypeRef::new(left.ty));
    }

    // Scalar broadcast against a vector or matrix of the same base kind.
    if let Some(result) = broadcast(types, left, right).or_else(|| broadcast(types, right, left)) {
        return Some(result);
    }

    // Linear products: matrix × vector and vector × matrix yield the vector.
    if op == BinaryOp::Mul {
        match (&types[left.ty].inner, &types[right.ty].inner) {
            (TypeInner::Matrix { row, .. }, TypeInner::Vector { .. }) => {
                if vector_arity(types, *row) == vector_arity(types, right.ty)
                    && same_base(types, *row, right.ty)
                {
                    return Some(TypeRef::new(right.ty));
                }
            }
            (TypeInner::Vector { .. }, TypeInner::Matrix { row, rows }) => {
                if vector_arity(types, left.ty) == Some(rows.count())
                    && same_base(types, *row, left.ty)
                {
                    return Some(TypeRef::new(left.ty));
                }
            }
            _ => {}
        }
    }

    None
}

/// Computes the result type of a unary operator application.
pub fn check_unary(
    types: &UniqueArena<Type>,
    sys: &SystemTypes,
    op: UnaryOp,
    operand: &TypeRef,
) -> Option<TypeRef> {
    if rejected_operand(types, operand) {
        return None;
    }
    match op {
        UnaryOp::LogicalNot => {
            let is_bool = types[operand.ty].inner == TypeInner::Scalar(ScalarKind::Bool);
            is_bool.then(|| TypeRef::new(sys.scalar(ScalarKind::Bool)))
        }
        UnaryOp::Negate | UnaryOp::Plus => {
            if !is_base(types, operand.ty) {
                return None;
            }
            let kind = base_scalar(types, operand.ty)?;
            kind.is_numeric().then(|| TypeRef::new(operand.ty))
        }
    }
}

/// Arrays of non-base elements and resource scalars never appear in
/// operator expressions.
fn rejected_operand(types: &UniqueArena<Type>, operand: &TypeRef) -> bool {
    match &types[operand.ty].inner {
        TypeInner::Scalar(kind) => kind.is_resource() || *kind == ScalarKind::Void,
        TypeInner::Array { base, .. } => !is_base(types, *base),
        _ => false,
    }
}

fn scalar_kind(types: &UniqueArena<Type>, ty: crate::arena::Handle<Type>) -> Option<ScalarKind> {
    match types[ty].inner {
        TypeInner::Scalar(kind) => Some(kind),
        _ => None,
    }
}

fn vector_arity(types: &UniqueArena<Type>, ty: crate::arena::Handle<Type>) -> Option<u32> {
    match types[ty].inner {
        TypeInner::Vector { size, .. } => Some(size.count()),
        _ => None,
    }
}

fn same_base(
    types: &UniqueArena<Type>,
    a: crate::arena::Handle<Type>,
    b: crate::arena::Handle<Type>,
) -> bool {
    match (base_scalar(types, a), base_scalar(types, b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn broadcast(types: &UniqueArena<Type>, scalar: &TypeRef, wide: &TypeRef) -> Option<TypeRef> {
    let kind = scalar_kind(types, scalar.ty)?;
    if !kind.is_numeric() {
        return None;
    }
    match types[wide.ty].inner {
        TypeInner::Vector { .. } | TypeInner::Matrix { .. } => {
            (base_scalar(types, wide.ty) == Some(kind)).then(|| TypeRef::new(wide.ty))
        }
        _ => None,
    }
}

//! Literal expression folding.
//!
//! Collapses operators, casts, and intrinsic calls whose operands are
//! already literals. Operands always precede their users in an expression
//! arena, so one in-order sweep cascades through nested subtrees. Folding
//! never touches a node's type, only its kind.

use pfx_ir::{
    Arena, BinaryOp, DiagnosticReport, ExprKind, Expression, Handle, Literal, MathFunction,
    Module, ScalarKind, Type, UnaryOp, UniqueArena, base_scalar,
};

use crate::Pass;

/// Replaces literal-operand expressions with their value.
#[derive(Debug)]
pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &str {
        "constant-folding"
    }

    fn run(&self, module: &mut Module, _report: &mut DiagnosticReport) -> bool {
        let Module {
            types,
            functions,
            global_expressions,
            ..
        } = module;

        let mut changed = fold_expressions(global_expressions, types);
        for (_, func) in functions.iter_mut() {
            if let Some(body) = func.body.as_mut() {
                changed |= fold_expressions(&mut body.expressions, types);
            }
        }
        changed
    }
}

fn fold_expressions(exprs: &mut Arena<Expression>, types: &UniqueArena<Type>) -> bool {
    let handles: Vec<Handle<Expression>> = exprs.iter().map(|(h, _)| h).collect();
    let mut changed = false;
    for handle in handles {
        if let Some(lit) = fold_expr(exprs, types, handle) {
            exprs[handle].kind = ExprKind::Literal(lit);
            changed = true;
        }
    }
    changed
}

fn fold_expr(
    exprs: &Arena<Expression>,
    types: &UniqueArena<Type>,
    handle: Handle<Expression>,
) -> Option<Literal> {
    match &exprs[handle].kind {
        ExprKind::Binary { op, left, right } => {
            let left = literal(exprs, *left)?;
            let right = literal(exprs, *right)?;
            fold_binary(*op, &left, &right)
        }
        ExprKind::Unary { op, expr } => fold_unary(*op, &literal(exprs, *expr)?),
        ExprKind::Math { fun, args } => {
            let mut folded = Vec::with_capacity(args.len());
            for &arg in args {
                folded.push(literal(exprs, arg)?);
            }
            fold_math(*fun, &folded)
        }
        ExprKind::Cast { expr } => {
            let value = literal(exprs, *expr)?;
            fold_cast(base_scalar(types, exprs[handle].ty.ty)?, value)
        }
        _ => None,
    }
}

fn literal(exprs: &Arena<Expression>, handle: Handle<Expression>) -> Option<Literal> {
    match &exprs[handle].kind {
        ExprKind::Literal(lit) => Some(lit.clone()),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, left: &Literal, right: &Literal) -> Option<Literal> {
    use Literal::{Bool, Float, Int};
    match (left, right) {
        (Int(a), Int(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                BinaryOp::Add => Int(a.wrapping_add(b)),
                BinaryOp::Sub => Int(a.wrapping_sub(b)),
                BinaryOp::Mul => Int(a.wrapping_mul(b)),
                // Division faults stay a runtime matter.
                BinaryOp::Div if b != 0 => Int(a.wrapping_div(b)),
                BinaryOp::Equal => Bool(a == b),
                BinaryOp::NotEqual => Bool(a != b),
                BinaryOp::Less => Bool(a < b),
                BinaryOp::LessEqual => Bool(a <= b),
                BinaryOp::Greater => Bool(a > b),
                BinaryOp::GreaterEqual => Bool(a >= b),
                _ => return None,
            })
        }
        (Float(a), Float(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                BinaryOp::Add => Float(a + b),
                BinaryOp::Sub => Float(a - b),
                BinaryOp::Mul => Float(a * b),
                BinaryOp::Div if b != 0.0 => Float(a / b),
                BinaryOp::Equal => Bool(a == b),
                BinaryOp::NotEqual => Bool(a != b),
                BinaryOp::Less => Bool(a < b),
                BinaryOp::LessEqual => Bool(a <= b),
                BinaryOp::Greater => Bool(a > b),
                BinaryOp::GreaterEqual => Bool(a >= b),
                _ => return None,
            })
        }
        (Bool(a), Bool(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                BinaryOp::LogicalAnd => Bool(a && b),
                BinaryOp::LogicalOr => Bool(a || b),
                BinaryOp::Equal => Bool(a == b),
                BinaryOp::NotEqual => Bool(a != b),
                _ => return None,
            })
        }
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, value: &Literal) -> Option<Literal> {
    use Literal::{Bool, Float, Int};
    match (op, value) {
        (UnaryOp::Negate, Int(v)) => Some(Int(v.wrapping_neg())),
        (UnaryOp::Negate, Float(v)) => Some(Float(-v)),
        (UnaryOp::Plus, Int(_) | Float(_)) => Some(value.clone()),
        (UnaryOp::LogicalNot, Bool(v)) => Some(Bool(!v)),
        _ => None,
    }
}

fn fold_math(fun: MathFunction, args: &[Literal]) -> Option<Literal> {
    let float = |index: usize| match args.get(index) {
        Some(Literal::Float(v)) => Some(*v),
        _ => None,
    };
    let value = match fun {
        MathFunction::Abs => float(0)?.abs(),
        MathFunction::Floor => float(0)?.floor(),
        MathFunction::Ceil => float(0)?.ceil(),
        // frac(x) = x - floor(x), so frac(-0.25) is 0.75.
        MathFunction::Frac => {
            let a = float(0)?;
            a - a.floor()
        }
        MathFunction::Sin => float(0)?.sin(),
        MathFunction::Cos => float(0)?.cos(),
        MathFunction::Sqrt => float(0)?.sqrt(),
        MathFunction::Min => float(0)?.min(float(1)?),
        MathFunction::Max => float(0)?.max(float(1)?),
        MathFunction::Lerp => {
            let (a, b, t) = (float(0)?, float(1)?, float(2)?);
            a * (1.0 - t) + b * t
        }
        MathFunction::Dot => return None,
    };
    Some(Literal::Float(value))
}

fn fold_cast(target: ScalarKind, value: Literal) -> Option<Literal> {
    use Literal::{Float, Int};
    match (target, value) {
        (ScalarKind::Int, Int(v)) => Some(Int(v)),
        (ScalarKind::Int, Float(v)) => Some(Int(v as i32)),
        (ScalarKind::Float, Int(v)) => Some(Float(v as f32)),
        (ScalarKind::Float, Float(v)) => Some(Float(v)),
        _ => None,
    }
}

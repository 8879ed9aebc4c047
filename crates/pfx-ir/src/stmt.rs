//! Typed statement nodes.

use crate::arena::Handle;
use crate::check::BinaryOp;
use crate::decl::VariableDecl;
use crate::expr::Expression;
use crate::span::Span;

/// A typed statement. Blocks are plain vectors; expression children are
/// handles into the owning function's expression arena.
#[derive(Clone, Debug)]
pub enum Statement {
    Block(Vec<Statement>),
    /// A local declaration; the initializer, if any, lives on the
    /// [`VariableDecl`].
    Decl { var: Handle<VariableDecl> },
    /// `target op value` where `op` is `=` or a compound assignment.
    Assign {
        op: BinaryOp,
        target: Handle<Expression>,
        value: Handle<Expression>,
        span: Span,
    },
    If {
        condition: Handle<Expression>,
        accept: Vec<Statement>,
        reject: Vec<Statement>,
    },
    While {
        condition: Handle<Expression>,
        body: Vec<Statement>,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Handle<Expression>>,
        step: Option<Box<Statement>>,
        body: Vec<Statement>,
    },
    Return {
        value: Option<Handle<Expression>>,
        span: Span,
    },
    /// An expression evaluated for its effects.
    Expr(Handle<Expression>),
}

impl Statement {
    /// Whether every control path through `block` reaches a `return`.
    ///
    /// Loops are not assumed to run; an `if` covers all paths only when
    /// both arms do.
    pub fn block_always_returns(block: &[Statement]) -> bool {
        block.iter().any(|stmt| match stmt {
            Statement::Return { .. } => true,
            Statement::Block(inner) => Self::block_always_returns(inner),
            Statement::If { accept, reject, .. } => {
                Self::block_always_returns(accept) && Self::block_always_returns(reject)
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, UniqueArena};
    use crate::expr::{ExprKind, Literal};
    use crate::types::{ScalarKind, SystemTypes, TypeRef};

    fn ret() -> Statement {
        Statement::Return {
            value: None,
            span: Span::NONE,
        }
    }

    fn bool_expr() -> Handle<Expression> {
        let mut types = UniqueArena::new();
        let sys = SystemTypes::register(&mut types);
        let mut exprs = Arena::new();
        exprs.append(Expression {
            kind: ExprKind::Literal(Literal::Bool(true)),
            ty: TypeRef::new(sys.scalar(ScalarKind::Bool)),
            span: Span::NONE,
        })
    }

    #[test]
    fn straight_line_return_is_detected() {
        assert!(Statement::block_always_returns(&[ret()]));
        assert!(!Statement::block_always_returns(&[]));
    }

    #[test]
    fn if_covers_all_paths_only_with_both_arms() {
        let cond = bool_expr();
        let half = Statement::If {
            condition: cond,
            accept: vec![ret()],
            reject: vec![],
        };
        assert!(!Statement::block_always_returns(std::slice::from_ref(&half)));
        let full = Statement::If {
            condition: cond,
            accept: vec![ret()],
            reject: vec![ret()],
        };
        assert!(Statement::block_always_returns(std::slice::from_ref(&full)));
        // A loop body is never assumed to run.
        let looped = Statement::While {
            condition: cond,
            body: vec![ret()],
        };
        assert!(!Statement::block_always_returns(std::slice::from_ref(
            &looped
        )));
    }
}

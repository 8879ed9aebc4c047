//! PFX frontend.
//!
//! Tokenizes effect source text with [logos](https://crates.io/crates/logos)
//! and parses it by recursive descent into the untyped [`ast`] tree consumed
//! by semantic analysis.

pub mod ast;
mod parser;
mod token;

pub use token::{Token, lex};

use pfx_ir::Span;

/// Parse PFX source into an untyped syntax tree.
pub fn parse(source: &str) -> Result<ast::SourceUnit, ParseError> {
    let tokens = token::lex(source)?;
    parser::Parser::new(&tokens).source_unit()
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized character at {span}")]
    Lexical { span: Span },
    #[error("{message} at {span}")]
    Unexpected { message: String, span: Span },
}

impl ParseError {
    /// Source range the error points at.
    pub fn span(&self) -> Span {
        match self {
            Self::Lexical { span } | Self::Unexpected { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Item, Stmt};
    use pfx_ir::{BinaryOp, Literal, Qualifiers};

    #[test]
    fn parses_global_declarator_group() {
        let unit = parse("uniform float speed = 1.0, drag;").unwrap();
        assert_eq!(unit.items.len(), 1);
        let Item::Vars(vars) = &unit.items[0] else {
            panic!("expected globals");
        };
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "speed");
        assert!(vars[0].quals.contains(Qualifiers::UNIFORM));
        assert!(vars[0].init.is_some());
        assert_eq!(vars[1].name, "drag");
        assert!(vars[1].init.is_none());
    }

    #[test]
    fn parses_annotation_block() {
        let unit = parse(r#"uniform float power <string ui = "slider"; int max = 10;>;"#).unwrap();
        let Item::Vars(vars) = &unit.items[0] else {
            panic!("expected globals");
        };
        let annotation = vars[0].annotation.as_ref().unwrap();
        assert_eq!(annotation.entries.len(), 2);
        assert_eq!(annotation.entries[0].ty.name, "string");
        assert_eq!(annotation.entries[1].name, "max");
    }

    #[test]
    fn parses_struct_and_arrays() {
        let unit = parse("struct Particle { float3 pos; float age; int tags[4]; };").unwrap();
        let Item::Struct(def) = &unit.items[0] else {
            panic!("expected struct");
        };
        assert_eq!(def.name, "Particle");
        assert_eq!(def.members.len(), 3);
        assert!(def.members[2].array.is_some());
    }

    #[test]
    fn parses_function_with_attribute_and_qualified_params() {
        let unit = parse(
            "[compute] void claim(out int slot, inout float budget) { slot = 1; }",
        )
        .unwrap();
        let Item::Function(func) = &unit.items[0] else {
            panic!("expected function");
        };
        assert_eq!(func.attr.as_ref().unwrap().name, "compute");
        assert_eq!(func.result.name, "void");
        assert_eq!(func.params.len(), 2);
        assert!(func.params[0].quals.contains(Qualifiers::OUT));
        assert!(!func.params[0].quals.contains(Qualifiers::INOUT));
        assert!(func.params[1].quals.contains(Qualifiers::INOUT));
        assert_eq!(func.body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn parses_prototype_without_body() {
        let unit = parse("float ease(float t);").unwrap();
        let Item::Function(func) = &unit.items[0] else {
            panic!("expected function");
        };
        assert!(func.body.is_none());
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let unit = parse("auto f() { return 2 + 3 * 4; }").unwrap();
        let Item::Function(func) = &unit.items[0] else {
            panic!("expected function");
        };
        let body = func.body.as_ref().unwrap();
        let Stmt::Return {
            value: Some(Expr::Binary { op, right, .. }),
            ..
        } = &body[0]
        else {
            panic!("expected return of a binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        let Expr::Binary { op: inner, .. } = right.as_ref() else {
            panic!("expected nested multiply");
        };
        assert_eq!(*inner, BinaryOp::Mul);
    }

    #[test]
    fn postfix_chains_and_calls() {
        let unit = parse("void f() { points[i].pos.xy = lerp(a, b, 0.5).xy; }").unwrap();
        let Item::Function(func) = &unit.items[0] else {
            panic!("expected function");
        };
        let Stmt::Assign { op, target, .. } = &func.body.as_ref().unwrap()[0] else {
            panic!("expected assignment");
        };
        assert_eq!(*op, BinaryOp::Assign);
        let Expr::Member { base, name, .. } = target else {
            panic!("expected member target");
        };
        assert_eq!(name, "xy");
        assert!(matches!(base.as_ref(), Expr::Member { .. }));
    }

    #[test]
    fn parses_for_loop_with_compound_step() {
        let unit = parse("void f() { for (int i = 0; i < 8; i += 1) total += i; }").unwrap();
        let Item::Function(func) = &unit.items[0] else {
            panic!("expected function");
        };
        let Stmt::For {
            init, cond, step, ..
        } = &func.body.as_ref().unwrap()[0]
        else {
            panic!("expected for");
        };
        assert!(matches!(init.as_deref(), Some(Stmt::Decl { .. })));
        assert!(cond.is_some());
        assert!(matches!(
            step.as_deref(),
            Some(Stmt::Assign {
                op: BinaryOp::AddAssign,
                ..
            })
        ));
    }

    #[test]
    fn string_literals_reach_the_tree() {
        let unit = parse(r#"string author = "fxc";"#).unwrap();
        let Item::Vars(vars) = &unit.items[0] else {
            panic!("expected globals");
        };
        assert!(matches!(
            vars[0].init,
            Some(Expr::Literal {
                value: Literal::Str(_),
                ..
            })
        ));
    }

    #[test]
    fn missing_semicolon_is_reported_with_a_span() {
        let err = parse("float x = 1.0").unwrap_err();
        let span = err.span();
        assert!(span.end as usize <= "float x = 1.0".len());
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn empty_source_parses_to_empty_unit() {
        let unit = parse("").unwrap();
        assert!(unit.items.is_empty());
    }
}

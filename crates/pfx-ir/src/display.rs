//! Text dump of a typed module for debugging.

use crate::Module;
use crate::arena::{Arena, Handle, UniqueArena};
use crate::decl::FunctionDecl;
use crate::expr::{ExprKind, Expression};
use crate::stmt::Statement;
use crate::types::{Type, weak_signature};

fn format_expr(handle: Handle<Expression>, exprs: &Arena<Expression>) -> String {
    match &exprs[handle].kind {
        ExprKind::Literal(lit) => format!("{lit}"),
        ExprKind::Variable(var) => format!("Variable({var:?})"),
        ExprKind::Swizzle { base, components } => {
            let letters: String = components
                .iter()
                .map(|&c| ['x', 'y', 'z', 'w'][c as usize])
                .collect();
            format!("Swizzle({base:?}).{letters}")
        }
        ExprKind::Member { base, index, .. } => format!("Member({base:?}, {index})"),
        ExprKind::Index { base, index } => format!("Index({base:?}, {index:?})"),
        ExprKind::Unary { op, expr } => format!("{}{expr:?}", op.token()),
        ExprKind::Binary { op, left, right } => {
            format!("{left:?} {} {right:?}", op.token())
        }
        ExprKind::Call {
            function,
            arguments,
        } => {
            let args: Vec<_> = arguments.iter().map(|h| format!("{h:?}")).collect();
            format!("Call({function:?}, [{}])", args.join(", "))
        }
        ExprKind::Construct { components } => {
            let args: Vec<_> = components.iter().map(|h| format!("{h:?}")).collect();
            format!("Construct([{}])", args.join(", "))
        }
        ExprKind::Cast { expr } => format!("Cast({expr:?})"),
        ExprKind::Math { fun, args } => {
            let args: Vec<_> = args.iter().map(|h| format!("{h:?}")).collect();
            format!("{}({})", fun.name(), args.join(", "))
        }
        ExprKind::CounterIncrement { buffer } => {
            format!("CounterIncrement({buffer:?})")
        }
        ExprKind::ThreadIndex => "ThreadIndex".into(),
    }
}

fn write_stmt(out: &mut String, stmt: &Statement, indent: usize) {
    let pad = " ".repeat(indent);
    match stmt {
        Statement::Block(body) => {
            out.push_str(&format!("{pad}{{\n"));
            for s in body {
                write_stmt(out, s, indent + 4);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Statement::Decl { var } => {
            out.push_str(&format!("{pad}Decl {var:?}\n"));
        }
        Statement::Assign {
            op, target, value, ..
        } => {
            out.push_str(&format!("{pad}{target:?} {} {value:?}\n", op.token()));
        }
        Statement::If {
            condition,
            accept,
            reject,
        } => {
            out.push_str(&format!("{pad}If ({condition:?}) {{\n"));
            for s in accept {
                write_stmt(out, s, indent + 4);
            }
            if !reject.is_empty() {
                out.push_str(&format!("{pad}}} else {{\n"));
                for s in reject {
                    write_stmt(out, s, indent + 4);
                }
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Statement::While { condition, body } => {
            out.push_str(&format!("{pad}While ({condition:?}) {{\n"));
            for s in body {
                write_stmt(out, s, indent + 4);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Statement::For {
            init,
            condition,
            step,
            body,
        } => {
            out.push_str(&format!("{pad}For {{\n"));
            if let Some(init) = init {
                write_stmt(out, init, indent + 4);
            }
            if let Some(cond) = condition {
                out.push_str(&format!("{pad}    Cond {cond:?}\n"));
            }
            if let Some(step) = step {
                write_stmt(out, step, indent + 4);
            }
            out.push_str(&format!("{pad}  Body {{\n"));
            for s in body {
                write_stmt(out, s, indent + 4);
            }
            out.push_str(&format!("{pad}  }}\n{pad}}}\n"));
        }
        Statement::Return { value, .. } => match value {
            Some(v) => out.push_str(&format!("{pad}Return {v:?}\n")),
            None => out.push_str(&format!("{pad}Return\n")),
        },
        Statement::Expr(handle) => {
            out.push_str(&format!("{pad}Expr {handle:?}\n"));
        }
    }
}

fn dump_function(out: &mut String, module: &Module, func: &FunctionDecl) {
    let params: Vec<_> = func
        .params
        .iter()
        .map(|&p| {
            let var = &module.variables[p];
            format!("{}: {}", var.name, var.ty.weak_signature(&module.types))
        })
        .collect();
    let ret = match &func.result {
        Some(r) => format!(" -> {}", r.weak_signature(&module.types)),
        None => " -> ?".into(),
    };
    let mut flags = Vec::new();
    if !func.valid_for_vertex {
        flags.push("!vertex");
    }
    if !func.valid_for_pixel {
        flags.push("!pixel");
    }
    if func.used_as_vertex {
        flags.push("used:vertex");
    }
    if func.used_as_pixel {
        flags.push("used:pixel");
    }
    if func.blacklisted {
        flags.push("blacklisted");
    }
    let flag_str = if flags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", flags.join(", "))
    };
    out.push_str(&format!(
        "  fn {}({}){ret}{flag_str} {{\n",
        func.name,
        params.join(", ")
    ));

    if let Some(body) = &func.body {
        if !body.expressions.is_empty() {
            out.push_str("    Expressions:\n");
            for (handle, _) in body.expressions.iter() {
                let formatted = format_expr(handle, &body.expressions);
                out.push_str(&format!("      {handle:?} {formatted}\n"));
            }
        }
        if !body.block.is_empty() {
            out.push_str("    Body:\n");
            for stmt in &body.block {
                write_stmt(out, stmt, 6);
            }
        }
    }

    out.push_str("  }\n");
}

/// Formats a type, preferring its declared name over the structural
/// signature.
pub fn format_type(ty: Handle<Type>, types: &UniqueArena<Type>) -> String {
    if let Some(name) = &types[ty].name {
        return name.clone();
    }
    weak_signature(types, ty)
}

/// Produces a human-readable text dump of a [`Module`] for debugging.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();

    out.push_str("Types:\n");
    for (handle, _) in module.types.iter() {
        out.push_str(&format!(
            "  {handle:?} {}\n",
            format_type(handle, &module.types)
        ));
    }

    if !module.globals.is_empty() {
        out.push_str("\nGlobals:\n");
        for &handle in &module.globals {
            let var = &module.variables[handle];
            let init = match var.init {
                Some(h) => format!(" = {}", format_expr(h, &module.global_expressions)),
                None => String::new(),
            };
            out.push_str(&format!(
                "  {handle:?} {}: {}{init}\n",
                var.name,
                var.ty.weak_signature(&module.types)
            ));
        }
    }

    if !module.functions.is_empty() {
        out.push_str("\nFunctions:\n");
        for (_, func) in module.functions.iter() {
            dump_function(&mut out, module, func);
        }
    }

    if !module.entry_points.is_empty() {
        out.push_str("\nEntry Points:\n");
        for ep in &module.entry_points {
            out.push_str(&format!("  [{}] {}\n", ep.stage.name(), ep.name));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Stage, VariableDecl};
    use crate::span::Span;
    use crate::types::{ScalarKind, TypeRef};

    #[test]
    fn dump_empty_module() {
        let module = Module::new();
        let dump = dump_module(&module);
        assert!(dump.contains("Types:"));
        assert!(dump.contains("float4"));
    }

    #[test]
    fn dump_shows_globals_and_entries() {
        let mut module = Module::new();
        let ty = TypeRef::new(module.sys.scalar(ScalarKind::Float));
        let var = module.variables.append(VariableDecl {
            name: "speed".into(),
            ty,
            kind: VarKind::Global,
            init: None,
            span: Span::NONE,
        });
        module.globals.push(var);
        let func = module
            .functions
            .append(FunctionDecl::new("update", Span::NONE));
        module.entry_points.push(crate::decl::EntryPoint {
            name: "update".into(),
            stage: Stage::Compute,
            function: func,
        });

        let dump = dump_module(&module);
        assert!(dump.contains("speed: float"));
        assert!(dump.contains("[compute] update"));
    }
}

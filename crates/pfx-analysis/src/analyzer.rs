//! The semantic analyzer.
//!
//! Analysis runs in two phases over a parsed source unit. The first phase
//! walks the items in order: it interns struct types, declares globals and
//! annotation blocks, registers function signatures, and queues function
//! bodies together with the scope frame their parameters were declared in.
//! The second phase resumes the queued bodies in declaration order and
//! type-checks them, which is also when `auto` return types are pinned by
//! their first `return`. Afterwards the whole-program passes run and entry
//! points are collected from `[stage]` attributes.
//!
//! Ordinary type errors accumulate in the report and analysis keeps going
//! on a placeholder type; only an unresolvable type name aborts, since
//! nothing sensible can be declared without it.

use std::collections::HashMap;

use pfx_ir::{
    byte_size, check_binary, check_unary, code, field_access, format_type, Arena, ArraySize,
    BinaryOp, DiagnosticReport, EntryPoint, Expression, ExprKind, FieldAccess, FunctionBody,
    FunctionDecl, Handle, Literal, Module, Qualifiers, ScalarKind, Span, Stage, Statement,
    StructMember, Type, TypeInner, TypeRef, VarKind, VariableDecl,
};
use pfx_parser::ast;
use pfx_passes::PassManager;

use crate::env::{BuiltinFunction, Environment, Lowering};
use crate::scope::{DeclareError, ScopeId, ScopeKind, ScopeTree};
use crate::{Analysis, AnalysisError};

/// A function body waiting for the resume phase, with the frame its
/// parameters live in.
struct PendingBody {
    function: Handle<FunctionDecl>,
    frame: ScopeId,
    body: Vec<ast::Stmt>,
}

/// The expression arena being appended to, plus the function that owns it.
/// Global and annotation initializers analyze with `function: None`, which
/// forbids user calls and stage-limited intrinsics.
struct BodyCtx<'a> {
    exprs: &'a mut Arena<Expression>,
    function: Option<Handle<FunctionDecl>>,
}

/// Where a declaration appears, for qualifier filtering.
#[derive(Clone, Copy, PartialEq, Eq)]
enum DeclSite {
    Global,
    Local,
    Param,
}

impl DeclSite {
    fn allowed(self) -> Qualifiers {
        match self {
            Self::Global => Qualifiers::UNIFORM | Qualifiers::CONST,
            Self::Local => Qualifiers::CONST,
            Self::Param => {
                Qualifiers::IN | Qualifiers::OUT | Qualifiers::INOUT | Qualifiers::CONST
            }
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Global => "a global variable",
            Self::Local => "a local variable",
            Self::Param => "a parameter",
        }
    }
}

const ALL_QUALIFIERS: [(Qualifiers, &str); 5] = [
    (Qualifiers::UNIFORM, "uniform"),
    (Qualifiers::CONST, "const"),
    (Qualifiers::IN, "in"),
    (Qualifiers::OUT, "out"),
    (Qualifiers::INOUT, "inout"),
];

/// Follows a chain of member, swizzle, and index nodes down to the declared
/// variable it stores into, if the expression is a storage place at all.
fn lvalue_root(
    exprs: &Arena<Expression>,
    mut handle: Handle<Expression>,
) -> Option<Handle<VariableDecl>> {
    loop {
        match &exprs[handle].kind {
            ExprKind::Variable(var) => return Some(*var),
            ExprKind::Swizzle { base, .. }
            | ExprKind::Member { base, .. }
            | ExprKind::Index { base, .. } => handle = *base,
            _ => return None,
        }
    }
}

pub struct Analyzer {
    module: Module,
    scopes: ScopeTree,
    env: Environment,
    report: DiagnosticReport,
    pending: Vec<PendingBody>,
    annotations: HashMap<Handle<VariableDecl>, ScopeId>,
    /// `[stage]` attributes seen so far, validated after the passes.
    entries: Vec<(Handle<FunctionDecl>, Stage, Span)>,
}

impl Analyzer {
    /// An analyzer over a fresh module. `strict` upgrades shadowing from
    /// allowed to an error.
    pub fn new(strict: bool) -> Self {
        let module = Module::new();
        let mut scopes = ScopeTree::new(strict);
        let root = scopes.root();
        for (name, handle) in module.sys.names() {
            // Builtin type names cannot clash in an empty tree.
            let _ = scopes.declare_type(root, name, handle);
        }
        let env = Environment::bootstrap(&module.sys);
        Self {
            module,
            scopes,
            env,
            report: DiagnosticReport::default(),
            pending: Vec::new(),
            annotations: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Runs the whole pipeline and hands back everything it produced.
    pub fn analyze(mut self, unit: ast::SourceUnit) -> Result<Analysis, AnalysisError> {
        for item in unit.items {
            match item {
                ast::Item::Struct(def) => self.struct_item(def)?,
                ast::Item::Vars(defs) => self.global_group(defs)?,
                ast::Item::Function(def) => self.function_item(def)?,
            }
        }
        self.resume_pending()?;
        self.seed_entry_usage();

        let manager = PassManager::analysis();
        manager.run(&mut self.module, &mut self.report);

        self.collect_entry_points();
        self.report.sort_by_position();

        tracing::debug!(
            functions = self.module.functions.len(),
            entry_points = self.module.entry_points.len(),
            errors = self.report.error_count(),
            "analysis finished"
        );

        Ok(Analysis {
            module: self.module,
            scopes: self.scopes,
            annotations: self.annotations,
            report: self.report,
        })
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    fn struct_item(&mut self, def: ast::StructDef) -> Result<(), AnalysisError> {
        let root = self.scopes.root();
        let frame = self.scopes.push(root, ScopeKind::Struct);
        let mut members = Vec::with_capacity(def.members.len());
        let mut offset = 0;
        for member in &def.members {
            let ty = self.vardef_type(root, member)?;
            self.refuse_void(ty, member.span);
            let var = self.module.variables.append(VariableDecl {
                name: member.name.clone(),
                ty: TypeRef::new(ty),
                kind: VarKind::Member,
                init: None,
                span: member.span,
            });
            if self.scopes.declare_variable(frame, &member.name, var).is_err() {
                self.report.error(
                    code::REDEFINITION,
                    member.span,
                    format!("duplicate member '{}'", member.name),
                );
                continue;
            }
            members.push(StructMember {
                name: member.name.clone(),
                ty,
                offset,
            });
            // Unsized members leave later offsets meaningless; the bytecode
            // translator refuses such structs before offsets matter.
            offset += byte_size(&self.module.types, ty).unwrap_or(0);
        }
        let handle = self.module.types.insert(Type {
            name: Some(def.name.clone()),
            inner: TypeInner::Struct { members },
        });
        if self.scopes.declare_type(root, &def.name, handle).is_err() {
            self.report.error(
                code::REDEFINITION,
                def.span,
                format!("type '{}' is already defined", def.name),
            );
        }
        Ok(())
    }

    fn global_group(&mut self, defs: Vec<ast::VarDef>) -> Result<(), AnalysisError> {
        let root = self.scopes.root();
        for def in defs {
            let ty = self.vardef_type(root, &def)?;
            self.refuse_void(ty, def.span);
            let quals = self.filter_quals(def.quals, DeclSite::Global, def.span);
            let ty_ref = TypeRef::with_quals(ty, quals);

            let init = match def.init {
                Some(expr) => self.global_init(&def.name, &ty_ref, expr)?,
                None => {
                    if quals.contains(Qualifiers::CONST) {
                        self.report.error(
                            code::INVALID_INITIALIZER,
                            def.span,
                            format!("const variable '{}' needs an initializer", def.name),
                        );
                    }
                    None
                }
            };

            let var = self.module.variables.append(VariableDecl {
                name: def.name.clone(),
                ty: ty_ref,
                kind: VarKind::Global,
                init,
                span: def.span,
            });
            if self.scopes.declare_variable(root, &def.name, var).is_err() {
                self.report.error(
                    code::REDEFINITION,
                    def.span,
                    format!("'{}' is already declared in this scope", def.name),
                );
            }
            self.module.globals.push(var);

            if let Some(annotation) = def.annotation {
                self.annotation_block(var, annotation)?;
            }
        }
        Ok(())
    }

    /// Analyzes a module-scope initializer into the global expression arena
    /// and checks it against the declared type.
    fn global_init(
        &mut self,
        name: &str,
        declared: &TypeRef,
        expr: ast::Expr,
    ) -> Result<Option<Handle<Expression>>, AnalysisError> {
        let span = expr.span();
        let mut exprs = std::mem::take(&mut self.module.global_expressions);
        let result = {
            let mut ctx = BodyCtx {
                exprs: &mut exprs,
                function: None,
            };
            self.expr(&mut ctx, self.scopes.root(), expr)
        };
        self.module.global_expressions = exprs;
        let handle = result?;

        let init_ty = self.module.global_expressions[handle].ty.clone();
        if self.require_readable(&init_ty, span)
            && !init_ty.is_equal(declared, &self.module.types)
        {
            self.report.error(
                code::INVALID_INITIALIZER,
                span,
                format!(
                    "cannot initialize '{}' of type {} from {}",
                    name,
                    self.type_name(declared),
                    self.type_name(&init_ty)
                ),
            );
        }
        Ok(Some(handle))
    }

    fn annotation_block(
        &mut self,
        owner: Handle<VariableDecl>,
        annotation: ast::Annotation,
    ) -> Result<(), AnalysisError> {
        let root = self.scopes.root();
        let frame = self.scopes.push(root, ScopeKind::Annotation);
        for entry in annotation.entries {
            // The parser already refuses qualifiers, arrays, and nested
            // annotations on entries.
            let ty = self.resolve_type(root, &entry.ty)?;
            self.refuse_void(ty, entry.span);
            let ty_ref = TypeRef::new(ty);
            let init = match entry.init {
                Some(expr) => self.global_init(&entry.name, &ty_ref, expr)?,
                None => None,
            };
            let var = self.module.variables.append(VariableDecl {
                name: entry.name.clone(),
                ty: ty_ref,
                kind: VarKind::Annotation,
                init,
                span: entry.span,
            });
            if self.scopes.declare_variable(frame, &entry.name, var).is_err() {
                self.report.error(
                    code::REDEFINITION,
                    entry.span,
                    format!("duplicate annotation entry '{}'", entry.name),
                );
            }
        }
        self.annotations.insert(owner, frame);
        Ok(())
    }

    fn function_item(&mut self, def: ast::FunctionDef) -> Result<(), AnalysisError> {
        let root = self.scopes.root();

        let result = if def.result.name == "auto" {
            None
        } else {
            Some(TypeRef::new(self.resolve_type(root, &def.result)?))
        };

        // Resolve parameter types up front so this declaration can be
        // compared against existing overloads.
        let mut param_tys = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = self.vardef_type(root, param)?;
            let quals = self.filter_quals(param.quals, DeclSite::Param, param.span);
            param_tys.push(TypeRef::with_quals(ty, quals));
        }

        let existing = self
            .scopes
            .find_functions(root, &def.name)
            .map(|list| list.to_vec())
            .unwrap_or_default()
            .into_iter()
            .find(|&f| self.signature_matches(f, &param_tys));

        let function = match existing {
            Some(func) => {
                let has_body = self.module.functions[func].body.is_some()
                    || self.pending.iter().any(|p| p.function == func);
                if def.body.is_some() && has_body {
                    self.report.error(
                        code::REDEFINITION,
                        def.span,
                        format!("function '{}' is already defined", def.name),
                    );
                    return Ok(());
                }
                if def.body.is_none() {
                    // A repeated prototype adds nothing but may still carry
                    // an entry attribute.
                    if let Some(attr) = def.attr {
                        self.entry_attr(func, attr);
                    }
                    return Ok(());
                }
                // The definition takes over a prototype's slot. Return types
                // must agree, with `auto` counting as its own spelling.
                let declared = self.module.functions[func].result.clone();
                let agree = match (&declared, &result) {
                    (Some(a), Some(b)) => a.is_equal(b, &self.module.types),
                    (None, None) => true,
                    _ => false,
                };
                if !agree {
                    self.report.error(
                        code::RETURN_TYPE_MISMATCH,
                        def.span,
                        format!(
                            "definition of '{}' disagrees with its prototype's return type",
                            def.name
                        ),
                    );
                    return Ok(());
                }
                func
            }
            None => {
                let decl = FunctionDecl::new(def.name.clone(), def.span);
                let func = self.module.functions.append(decl);
                self.scopes.declare_function(root, &def.name, func);
                func
            }
        };

        // Fresh parameter declarations; a definition's names win over a
        // prototype's.
        let frame = self.scopes.push(root, ScopeKind::Default);
        let mut params = Vec::with_capacity(def.params.len());
        for (index, (param, ty)) in def.params.iter().zip(param_tys).enumerate() {
            self.refuse_void(ty.ty, param.span);
            let var = self.module.variables.append(VariableDecl {
                name: param.name.clone(),
                ty,
                kind: VarKind::Param {
                    index: index as u32,
                },
                init: None,
                span: param.span,
            });
            match self.scopes.declare_variable(frame, &param.name, var) {
                Ok(()) => {}
                Err(DeclareError::Redeclared) => self.report.error(
                    code::REDEFINITION,
                    param.span,
                    format!("duplicate parameter '{}'", param.name),
                ),
                Err(DeclareError::Shadows) => self.report.error(
                    code::SHADOWED_NAME,
                    param.span,
                    format!("parameter '{}' shadows an outer declaration", param.name),
                ),
            }
            params.push(var);
        }
        self.module.functions[function].params = params;
        self.module.functions[function].result = result;

        if let Some(attr) = def.attr {
            self.entry_attr(function, attr);
        }
        if let Some(body) = def.body {
            self.pending.push(PendingBody {
                function,
                frame,
                body,
            });
        }
        Ok(())
    }

    fn entry_attr(&mut self, function: Handle<FunctionDecl>, attr: ast::Attribute) {
        let stage = match attr.name.as_str() {
            "vertex" => Stage::Vertex,
            "pixel" => Stage::Pixel,
            "compute" => Stage::Compute,
            other => {
                self.report.error(
                    code::UNKNOWN_ATTRIBUTE,
                    attr.span,
                    format!("unknown attribute '{other}'"),
                );
                return;
            }
        };
        if !self
            .entries
            .iter()
            .any(|&(f, s, _)| f == function && s == stage)
        {
            self.entries.push((function, stage, attr.span));
        }
    }

    // -----------------------------------------------------------------------
    // Body resumption
    // -----------------------------------------------------------------------

    fn resume_pending(&mut self) -> Result<(), AnalysisError> {
        let pending = std::mem::take(&mut self.pending);
        tracing::debug!(bodies = pending.len(), "resuming queued bodies");
        for p in pending {
            let mut body = FunctionBody::default();
            {
                let mut ctx = BodyCtx {
                    exprs: &mut body.expressions,
                    function: Some(p.function),
                };
                for stmt in p.body {
                    let lowered = self.stmt(&mut ctx, p.frame, stmt)?;
                    body.block.push(lowered);
                }
            }

            // An `auto` function without a single `return` is void.
            if self.module.functions[p.function].result.is_none() {
                let void = self.module.sys.scalar(ScalarKind::Void);
                self.module.functions[p.function].result = Some(TypeRef::new(void));
            }

            let func = &self.module.functions[p.function];
            let returns_value = func.result.as_ref().is_some_and(|r| {
                self.module.types[r.ty].inner != TypeInner::Scalar(ScalarKind::Void)
            });
            if returns_value && !Statement::block_always_returns(&body.block) {
                self.report.error(
                    code::MISSING_RETURN,
                    func.span,
                    format!("function '{}' does not return on every path", func.name),
                );
            }

            self.module.functions[p.function].body = Some(body);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn stmt(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        stmt: ast::Stmt,
    ) -> Result<Statement, AnalysisError> {
        match stmt {
            ast::Stmt::Decl { vars, .. } => {
                let mut decls = Vec::with_capacity(vars.len());
                for def in vars {
                    let var = self.local_decl(ctx, scope, def)?;
                    decls.push(Statement::Decl { var });
                }
                Ok(if decls.len() == 1 {
                    decls.pop().unwrap_or(Statement::Block(Vec::new()))
                } else {
                    Statement::Block(decls)
                })
            }
            ast::Stmt::Assign {
                op,
                target,
                value,
                span,
            } => self.assign(ctx, scope, op, target, value, span),
            ast::Stmt::Expr(expr) => {
                let handle = self.expr(ctx, scope, expr)?;
                Ok(Statement::Expr(handle))
            }
            ast::Stmt::If {
                cond,
                accept,
                reject,
                ..
            } => {
                let condition = self.condition(ctx, scope, cond)?;
                let accept = self.child_block(ctx, scope, accept)?;
                let reject = self.child_block(ctx, scope, reject)?;
                Ok(Statement::If {
                    condition,
                    accept,
                    reject,
                })
            }
            ast::Stmt::While { cond, body, .. } => {
                let condition = self.condition(ctx, scope, cond)?;
                let body = self.child_block(ctx, scope, body)?;
                Ok(Statement::While { condition, body })
            }
            ast::Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                // The header gets its own frame so an `int i` there does not
                // clash with a sibling loop's.
                let frame = self.scopes.push(scope, ScopeKind::Default);
                let init = match init {
                    Some(s) => Some(Box::new(self.stmt(ctx, frame, *s)?)),
                    None => None,
                };
                let condition = match cond {
                    Some(c) => Some(self.condition(ctx, frame, c)?),
                    None => None,
                };
                let step = match step {
                    Some(s) => Some(Box::new(self.stmt(ctx, frame, *s)?)),
                    None => None,
                };
                let body = self.child_block(ctx, frame, body)?;
                Ok(Statement::For {
                    init,
                    condition,
                    step,
                    body,
                })
            }
            ast::Stmt::Return { value, span } => self.return_stmt(ctx, scope, value, span),
            ast::Stmt::Block { body, .. } => {
                let block = self.child_block(ctx, scope, body)?;
                Ok(Statement::Block(block))
            }
        }
    }

    /// Analyzes a statement list in a fresh child frame.
    fn child_block(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        body: Vec<ast::Stmt>,
    ) -> Result<Vec<Statement>, AnalysisError> {
        let frame = self.scopes.push(scope, ScopeKind::Default);
        let mut block = Vec::with_capacity(body.len());
        for stmt in body {
            block.push(self.stmt(ctx, frame, stmt)?);
        }
        Ok(block)
    }

    fn local_decl(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        def: ast::VarDef,
    ) -> Result<Handle<VariableDecl>, AnalysisError> {
        let ty = self.vardef_type(scope, &def)?;
        self.refuse_void(ty, def.span);
        let quals = self.filter_quals(def.quals, DeclSite::Local, def.span);
        let ty_ref = TypeRef::with_quals(ty, quals);

        let init = match def.init {
            Some(expr) => {
                let span = expr.span();
                let handle = self.expr(ctx, scope, expr)?;
                let init_ty = ctx.exprs[handle].ty.clone();
                if self.require_readable(&init_ty, span)
                    && !init_ty.is_equal(&ty_ref, &self.module.types)
                {
                    self.report.error(
                        code::INVALID_INITIALIZER,
                        span,
                        format!(
                            "cannot initialize '{}' of type {} from {}",
                            def.name,
                            self.type_name(&ty_ref),
                            self.type_name(&init_ty)
                        ),
                    );
                }
                Some(handle)
            }
            None => {
                if quals.contains(Qualifiers::CONST) {
                    self.report.error(
                        code::INVALID_INITIALIZER,
                        def.span,
                        format!("const variable '{}' needs an initializer", def.name),
                    );
                }
                None
            }
        };

        let var = self.module.variables.append(VariableDecl {
            name: def.name.clone(),
            ty: ty_ref,
            kind: VarKind::Local,
            init,
            span: def.span,
        });
        match self.scopes.declare_variable(scope, &def.name, var) {
            Ok(()) => {}
            Err(DeclareError::Redeclared) => self.report.error(
                code::REDEFINITION,
                def.span,
                format!("'{}' is already declared in this scope", def.name),
            ),
            Err(DeclareError::Shadows) => self.report.error(
                code::SHADOWED_NAME,
                def.span,
                format!("'{}' shadows an outer declaration", def.name),
            ),
        }
        Ok(var)
    }

    fn assign(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        op: BinaryOp,
        target: ast::Expr,
        value: ast::Expr,
        span: Span,
    ) -> Result<Statement, AnalysisError> {
        let target_span = target.span();
        let value_span = value.span();
        let target_h = self.expr(ctx, scope, target)?;
        let value_h = self.expr(ctx, scope, value)?;

        let target_ty = ctx.exprs[target_h].ty.clone();
        let value_ty = ctx.exprs[value_h].ty.clone();
        let value_ok = self.require_readable(&value_ty, value_span);
        let target_ok = if op.arithmetic_part().is_some() {
            // Compound assignment reads the target too.
            self.require_readable(&target_ty, target_span)
        } else {
            true
        };

        if lvalue_root(ctx.exprs, target_h).is_none() {
            self.report.error(
                code::NOT_WRITABLE,
                target_span,
                "assignment target is not a variable or a part of one",
            );
        } else if value_ok
            && target_ok
            && check_binary(&self.module.types, &self.module.sys, op, &target_ty, &value_ty)
                .is_none()
        {
            if !target_ty.writable(&self.module.types) {
                self.report.error(
                    code::NOT_WRITABLE,
                    target_span,
                    format!(
                        "cannot assign to a read-only value of type {}",
                        self.type_name(&target_ty)
                    ),
                );
            } else {
                self.report.error(
                    code::INVALID_BINARY_OPERANDS,
                    span,
                    format!(
                        "operator `{}` is not defined for {} and {}",
                        op.token(),
                        self.type_name(&target_ty),
                        self.type_name(&value_ty)
                    ),
                );
            }
        }

        self.flip_out_param(ctx, target_h);
        Ok(Statement::Assign {
            op,
            target: target_h,
            value: value_h,
            span,
        })
    }

    fn return_stmt(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        value: Option<ast::Expr>,
        span: Span,
    ) -> Result<Statement, AnalysisError> {
        let value = match value {
            Some(expr) => {
                let value_span = expr.span();
                let handle = self.expr(ctx, scope, expr)?;
                let ty = ctx.exprs[handle].ty.clone();
                self.require_readable(&ty, value_span);
                Some((handle, ty, value_span))
            }
            None => None,
        };

        if let Some(function) = ctx.function {
            let declared = self.module.functions[function].result.clone();
            let void = self.module.sys.scalar(ScalarKind::Void);
            match (declared, &value) {
                (None, Some((_, ty, value_span))) => {
                    if self.module.types[ty.ty].inner == TypeInner::Scalar(ScalarKind::Void) {
                        self.report.error(
                            code::VOID_VALUE,
                            *value_span,
                            "cannot return a void value",
                        );
                    } else {
                        // First return pins the auto type, qualifiers
                        // stripped.
                        self.module.functions[function].result = Some(TypeRef::new(ty.ty));
                    }
                }
                (None, None) => {
                    self.module.functions[function].result = Some(TypeRef::new(void));
                }
                (Some(declared), Some((_, ty, value_span))) => {
                    if self.module.types[declared.ty].inner == TypeInner::Scalar(ScalarKind::Void)
                    {
                        self.report.error(
                            code::RETURN_TYPE_MISMATCH,
                            *value_span,
                            "a void function cannot return a value",
                        );
                    } else if !ty.is_equal(&declared, &self.module.types) {
                        self.report.error(
                            code::RETURN_TYPE_MISMATCH,
                            *value_span,
                            format!(
                                "returning {}, expected {}",
                                self.type_name(ty),
                                self.type_name(&declared)
                            ),
                        );
                    }
                }
                (Some(declared), None) => {
                    if self.module.types[declared.ty].inner != TypeInner::Scalar(ScalarKind::Void)
                    {
                        self.report.error(
                            code::RETURN_TYPE_MISMATCH,
                            span,
                            format!("must return a value of type {}", self.type_name(&declared)),
                        );
                    }
                }
            }
        }

        Ok(Statement::Return {
            value: value.map(|(handle, ..)| handle),
            span,
        })
    }

    fn condition(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        expr: ast::Expr,
    ) -> Result<Handle<Expression>, AnalysisError> {
        let span = expr.span();
        let handle = self.expr(ctx, scope, expr)?;
        let ty = ctx.exprs[handle].ty.clone();
        if self.require_readable(&ty, span)
            && self.module.types[ty.ty].inner != TypeInner::Scalar(ScalarKind::Bool)
        {
            self.report.error(
                code::NON_BOOL_CONDITION,
                span,
                format!("condition has type {}, expected bool", self.type_name(&ty)),
            );
        }
        Ok(handle)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expr(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        expr: ast::Expr,
    ) -> Result<Handle<Expression>, AnalysisError> {
        match expr {
            ast::Expr::Literal { value, span } => {
                let kind = match &value {
                    Literal::Int(_) => ScalarKind::Int,
                    Literal::Float(_) => ScalarKind::Float,
                    Literal::Bool(_) => ScalarKind::Bool,
                    Literal::Str(_) => ScalarKind::String,
                };
                let ty = TypeRef::new(self.module.sys.scalar(kind));
                Ok(ctx.exprs.append(Expression {
                    kind: ExprKind::Literal(value),
                    ty,
                    span,
                }))
            }
            ast::Expr::Ident { name, span } => match self.scopes.find_variable(scope, &name) {
                Some(var) => {
                    let ty = self.module.variables[var].ty.clone();
                    Ok(ctx.exprs.append(Expression {
                        kind: ExprKind::Variable(var),
                        ty,
                        span,
                    }))
                }
                None => {
                    self.report.error(
                        code::UNKNOWN_VARIABLE,
                        span,
                        format!("unknown variable '{name}'"),
                    );
                    Ok(self.poison(ctx, span))
                }
            },
            ast::Expr::Unary { op, expr, span } => {
                let operand = self.expr(ctx, scope, *expr)?;
                let operand_ty = ctx.exprs[operand].ty.clone();
                if !self.require_readable(&operand_ty, span) {
                    return Ok(self.poison(ctx, span));
                }
                match check_unary(&self.module.types, &self.module.sys, op, &operand_ty) {
                    Some(ty) => Ok(ctx.exprs.append(Expression {
                        kind: ExprKind::Unary { op, expr: operand },
                        ty,
                        span,
                    })),
                    None => {
                        self.report.error(
                            code::INVALID_UNARY_OPERAND,
                            span,
                            format!(
                                "operator `{}` is not defined for {}",
                                op.token(),
                                self.type_name(&operand_ty)
                            ),
                        );
                        Ok(self.poison(ctx, span))
                    }
                }
            }
            ast::Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let left_span = left.span();
                let right_span = right.span();
                let left_h = self.expr(ctx, scope, *left)?;
                let right_h = self.expr(ctx, scope, *right)?;
                let left_ty = ctx.exprs[left_h].ty.clone();
                let right_ty = ctx.exprs[right_h].ty.clone();
                let left_ok = self.require_readable(&left_ty, left_span);
                let right_ok = self.require_readable(&right_ty, right_span);
                if !left_ok || !right_ok {
                    return Ok(self.poison(ctx, span));
                }
                match check_binary(&self.module.types, &self.module.sys, op, &left_ty, &right_ty)
                {
                    Some(ty) => Ok(ctx.exprs.append(Expression {
                        kind: ExprKind::Binary {
                            op,
                            left: left_h,
                            right: right_h,
                        },
                        ty,
                        span,
                    })),
                    None => {
                        self.report.error(
                            code::INVALID_BINARY_OPERANDS,
                            span,
                            format!(
                                "operator `{}` is not defined for {} and {}",
                                op.token(),
                                self.type_name(&left_ty),
                                self.type_name(&right_ty)
                            ),
                        );
                        Ok(self.poison(ctx, span))
                    }
                }
            }
            ast::Expr::Member { base, name, span } => {
                let base_h = self.expr(ctx, scope, *base)?;
                let base_ty = ctx.exprs[base_h].ty.clone();
                match field_access(&self.module.types, &self.module.sys, base_ty.ty, &name) {
                    Some(FieldAccess::Member { index, ty, offset }) => {
                        let mut ref_ty = TypeRef::with_quals(ty, base_ty.quals);
                        ref_ty.readable_override = base_ty.readable_override;
                        ref_ty.writable_override = base_ty.writable_override;
                        Ok(ctx.exprs.append(Expression {
                            kind: ExprKind::Member {
                                base: base_h,
                                index,
                                offset,
                            },
                            ty: ref_ty,
                            span,
                        }))
                    }
                    Some(FieldAccess::Swizzle {
                        components,
                        ty,
                        writable,
                    }) => {
                        let mut ref_ty = TypeRef::with_quals(ty, base_ty.quals);
                        ref_ty.readable_override = base_ty.readable_override;
                        // A repeated component ruins the swizzle as a store
                        // target no matter what it is read from.
                        ref_ty.writable_override = if writable {
                            base_ty.writable_override
                        } else {
                            Some(false)
                        };
                        Ok(ctx.exprs.append(Expression {
                            kind: ExprKind::Swizzle {
                                base: base_h,
                                components,
                            },
                            ty: ref_ty,
                            span,
                        }))
                    }
                    None => {
                        self.report.error(
                            code::UNKNOWN_FIELD,
                            span,
                            format!(
                                "type {} has no field '{}'",
                                self.type_name(&base_ty),
                                name
                            ),
                        );
                        Ok(self.poison(ctx, span))
                    }
                }
            }
            ast::Expr::Index { base, index, span } => {
                let index_span = index.span();
                let base_h = self.expr(ctx, scope, *base)?;
                let index_h = self.expr(ctx, scope, *index)?;
                let index_ty = ctx.exprs[index_h].ty.clone();
                if self.require_readable(&index_ty, index_span)
                    && self.module.types[index_ty.ty].inner != TypeInner::Scalar(ScalarKind::Int)
                {
                    self.report.error(
                        code::INVALID_INDEX,
                        index_span,
                        format!("index has type {}, expected int", self.type_name(&index_ty)),
                    );
                }

                let base_ty = ctx.exprs[base_h].ty.clone();
                let element = match &self.module.types[base_ty.ty].inner {
                    TypeInner::Array { base, .. } => Some(*base),
                    TypeInner::Vector { base, .. } => Some(*base),
                    TypeInner::Matrix { row, .. } => Some(*row),
                    _ => None,
                };
                match element {
                    Some(element) => {
                        let mut ref_ty = TypeRef::with_quals(element, base_ty.quals);
                        ref_ty.readable_override = base_ty.readable_override;
                        ref_ty.writable_override = base_ty.writable_override;
                        Ok(ctx.exprs.append(Expression {
                            kind: ExprKind::Index {
                                base: base_h,
                                index: index_h,
                            },
                            ty: ref_ty,
                            span,
                        }))
                    }
                    None => {
                        self.report.error(
                            code::INVALID_INDEX,
                            span,
                            format!("type {} cannot be indexed", self.type_name(&base_ty)),
                        );
                        Ok(self.poison(ctx, span))
                    }
                }
            }
            ast::Expr::Call { name, args, span } => self.call(ctx, scope, name, args, span),
        }
    }

    /// Resolves a call: constructor if the name is a type, then user
    /// overloads innermost-first, then the builtin table.
    fn call(
        &mut self,
        ctx: &mut BodyCtx,
        scope: ScopeId,
        name: String,
        args: Vec<ast::Expr>,
        span: Span,
    ) -> Result<Handle<Expression>, AnalysisError> {
        let arg_spans: Vec<Span> = args.iter().map(|a| a.span()).collect();
        let mut arg_handles = Vec::with_capacity(args.len());
        for arg in args {
            arg_handles.push(self.expr(ctx, scope, arg)?);
        }
        let arg_tys: Vec<TypeRef> = arg_handles
            .iter()
            .map(|&h| ctx.exprs[h].ty.clone())
            .collect();

        if let Some(target) = self.scopes.find_type(scope, &name) {
            return Ok(self.construct(ctx, target, &arg_handles, &arg_tys, &arg_spans, span));
        }

        let candidates: Vec<Handle<FunctionDecl>> = self
            .scopes
            .find_functions(scope, &name)
            .map(|list| list.to_vec())
            .unwrap_or_default();
        if let Some(&chosen) = candidates
            .iter()
            .find(|&&f| self.signature_matches(f, &arg_tys))
        {
            return Ok(self.user_call(ctx, chosen, arg_handles, &arg_tys, &arg_spans, span));
        }

        if let Some(builtin) = self.env.resolve(&self.module.types, &name, &arg_tys) {
            let builtin = builtin.clone();
            return Ok(self.builtin_call(ctx, builtin, arg_handles, &arg_spans, span));
        }

        if candidates.is_empty() && !self.env.knows(&name) {
            self.report.error(
                code::UNKNOWN_FUNCTION,
                span,
                format!("unknown function '{name}'"),
            );
        } else {
            let given = arg_tys
                .iter()
                .map(|ty| self.type_name(ty))
                .collect::<Vec<_>>()
                .join(", ");
            self.report.error(
                code::UNKNOWN_FUNCTION,
                span,
                format!("no overload of '{name}' accepts ({given})"),
            );
        }
        Ok(self.poison(ctx, span))
    }

    fn construct(
        &mut self,
        ctx: &mut BodyCtx,
        target: Handle<Type>,
        args: &[Handle<Expression>],
        arg_tys: &[TypeRef],
        arg_spans: &[Span],
        span: Span,
    ) -> Handle<Expression> {
        for (ty, &arg_span) in arg_tys.iter().zip(arg_spans) {
            self.require_readable(ty, arg_span);
        }
        let target_ref = TypeRef::new(target);
        match self.module.types[target].inner.clone() {
            TypeInner::Scalar(kind @ (ScalarKind::Int | ScalarKind::Float)) => {
                if args.len() != 1 {
                    self.report.error(
                        code::INVALID_CONSTRUCTOR,
                        span,
                        format!("a {} cast takes exactly one argument", kind.name()),
                    );
                    return self.poison(ctx, span);
                }
                let source = &self.module.types[arg_tys[0].ty].inner;
                if !matches!(
                    source,
                    TypeInner::Scalar(ScalarKind::Int | ScalarKind::Float)
                ) {
                    self.report.error(
                        code::INVALID_CONSTRUCTOR,
                        arg_spans[0],
                        format!(
                            "cannot convert {} to {}",
                            self.type_name(&arg_tys[0]),
                            kind.name()
                        ),
                    );
                    return self.poison(ctx, span);
                }
                ctx.exprs.append(Expression {
                    kind: ExprKind::Cast { expr: args[0] },
                    ty: target_ref,
                    span,
                })
            }
            TypeInner::Vector { base, size } => {
                let filled = self.component_count(base, arg_tys, arg_spans);
                let want = size.count();
                match filled {
                    Some(total) if total == want || (args.len() == 1 && total == 1) => {
                        ctx.exprs.append(Expression {
                            kind: ExprKind::Construct {
                                components: args.to_vec(),
                            },
                            ty: target_ref,
                            span,
                        })
                    }
                    Some(total) => {
                        self.report.error(
                            code::INVALID_CONSTRUCTOR,
                            span,
                            format!(
                                "constructor for {} needs {} components, got {}",
                                self.type_name(&target_ref),
                                want,
                                total
                            ),
                        );
                        self.poison(ctx, span)
                    }
                    None => self.poison(ctx, span),
                }
            }
            TypeInner::Matrix { row, rows } => {
                let (base, cols) = match &self.module.types[row].inner {
                    TypeInner::Vector { base, size } => (*base, size.count()),
                    _ => {
                        self.report.error(
                            code::INVALID_CONSTRUCTOR,
                            span,
                            format!("cannot construct {}", self.type_name(&target_ref)),
                        );
                        return self.poison(ctx, span);
                    }
                };
                let want = rows.count() * cols;
                match self.component_count(base, arg_tys, arg_spans) {
                    Some(total) if total == want => ctx.exprs.append(Expression {
                        kind: ExprKind::Construct {
                            components: args.to_vec(),
                        },
                        ty: target_ref,
                        span,
                    }),
                    Some(total) => {
                        self.report.error(
                            code::INVALID_CONSTRUCTOR,
                            span,
                            format!(
                                "constructor for {} needs {} components, got {}",
                                self.type_name(&target_ref),
                                want,
                                total
                            ),
                        );
                        self.poison(ctx, span)
                    }
                    None => self.poison(ctx, span),
                }
            }
            _ => {
                self.report.error(
                    code::INVALID_CONSTRUCTOR,
                    span,
                    format!("values of type {} cannot be constructed", self.type_name(&target_ref)),
                );
                self.poison(ctx, span)
            }
        }
    }

    /// Sums the scalar components the arguments contribute to a constructor
    /// of base type `base`, or `None` after reporting a mismatched argument.
    fn component_count(
        &mut self,
        base: Handle<Type>,
        arg_tys: &[TypeRef],
        arg_spans: &[Span],
    ) -> Option<u32> {
        let mut total = 0;
        let mut ok = true;
        for (ty, &arg_span) in arg_tys.iter().zip(arg_spans) {
            match &self.module.types[ty.ty].inner {
                TypeInner::Scalar(_) if ty.ty == base => total += 1,
                TypeInner::Vector { base: b, size } if *b == base => total += size.count(),
                _ => {
                    self.report.error(
                        code::INVALID_CONSTRUCTOR,
                        arg_span,
                        format!(
                            "component of type {} does not fit a {} constructor",
                            self.type_name(ty),
                            format_type(base, &self.module.types)
                        ),
                    );
                    ok = false;
                }
            }
        }
        ok.then_some(total)
    }

    fn user_call(
        &mut self,
        ctx: &mut BodyCtx,
        function: Handle<FunctionDecl>,
        arguments: Vec<Handle<Expression>>,
        arg_tys: &[TypeRef],
        arg_spans: &[Span],
        span: Span,
    ) -> Handle<Expression> {
        let Some(caller) = ctx.function else {
            self.report.error(
                code::INVALID_INITIALIZER,
                span,
                "global initializers cannot call functions",
            );
            return self.poison(ctx, span);
        };

        let params = self.module.functions[function].params.clone();
        for (index, &param) in params.iter().enumerate() {
            let param_quals = self.module.variables[param].ty.quals;
            let arg = arguments[index];
            let by_ref = param_quals.contains(Qualifiers::OUT)
                || param_quals.contains(Qualifiers::INOUT);
            if by_ref {
                let direction = if param_quals.contains(Qualifiers::INOUT) {
                    "inout"
                } else {
                    "out"
                };
                if lvalue_root(ctx.exprs, arg).is_none()
                    || !arg_tys[index].writable(&self.module.types)
                {
                    self.report.error(
                        code::NOT_WRITABLE,
                        arg_spans[index],
                        format!(
                            "argument {} must be assignable to bind an {direction} parameter",
                            index + 1
                        ),
                    );
                }
                if param_quals.contains(Qualifiers::INOUT) {
                    self.require_readable(&arg_tys[index], arg_spans[index]);
                } else {
                    // Binding an out argument writes it, same as an
                    // assignment would.
                    self.flip_out_param(ctx, arg);
                }
            } else {
                self.require_readable(&arg_tys[index], arg_spans[index]);
            }
        }

        self.module.functions[caller].add_used(function);

        let result = match self.module.functions[function].result.clone() {
            Some(result) => TypeRef::new(result.ty),
            None => {
                let callee = self.module.functions[function].name.clone();
                self.report.error(
                    code::AUTO_UNRESOLVED,
                    span,
                    format!("the return type of '{callee}' is not known yet at this call"),
                );
                TypeRef::new(self.module.sys.scalar(ScalarKind::Void))
            }
        };
        ctx.exprs.append(Expression {
            kind: ExprKind::Call {
                function,
                arguments,
            },
            ty: result,
            span,
        })
    }

    fn builtin_call(
        &mut self,
        ctx: &mut BodyCtx,
        builtin: BuiltinFunction,
        arguments: Vec<Handle<Expression>>,
        arg_spans: &[Span],
        span: Span,
    ) -> Handle<Expression> {
        // Calling a stage-limited intrinsic limits the caller the same way.
        if let Some(caller) = ctx.function {
            let func = &mut self.module.functions[caller];
            if !builtin.valid_for_vertex {
                func.valid_for_vertex = false;
            }
            if !builtin.valid_for_pixel {
                func.valid_for_pixel = false;
            }
        } else if !builtin.valid_for_vertex && !builtin.valid_for_pixel {
            self.report.error(
                code::INVALID_INITIALIZER,
                span,
                format!("global initializers cannot call '{}'", builtin.name),
            );
            return self.poison(ctx, span);
        }

        match builtin.lowering {
            Lowering::Math(fun) => {
                for (&arg, &arg_span) in arguments.iter().zip(arg_spans) {
                    let ty = ctx.exprs[arg].ty.clone();
                    self.require_readable(&ty, arg_span);
                }
                ctx.exprs.append(Expression {
                    kind: ExprKind::Math {
                        fun,
                        args: arguments,
                    },
                    ty: TypeRef::new(builtin.result),
                    span,
                })
            }
            Lowering::CounterIncrement => {
                let buffer = arguments.first().and_then(|&h| match ctx.exprs[h].kind {
                    ExprKind::Variable(var) => Some(var),
                    _ => None,
                });
                match buffer {
                    Some(buffer) => ctx.exprs.append(Expression {
                        kind: ExprKind::CounterIncrement { buffer },
                        ty: TypeRef::new(builtin.result),
                        span,
                    }),
                    None => {
                        self.report.error(
                            code::NOT_WRITABLE,
                            span,
                            "incrementCounter needs a buffer variable, not a computed value",
                        );
                        self.poison(ctx, span)
                    }
                }
            }
            Lowering::ThreadIndex => ctx.exprs.append(Expression {
                kind: ExprKind::ThreadIndex,
                ty: TypeRef::new(builtin.result),
                span,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    fn seed_entry_usage(&mut self) {
        for &(function, stage, _) in &self.entries {
            let func = &mut self.module.functions[function];
            match stage {
                Stage::Vertex => func.used_as_vertex = true,
                Stage::Pixel => func.used_as_pixel = true,
                // Compute dispatch has no vertex/pixel restrictions to seed.
                Stage::Compute => {}
            }
        }
    }

    fn collect_entry_points(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        for (function, stage, span) in entries {
            let func = &self.module.functions[function];
            let name = func.name.clone();
            if func.body.is_none() {
                self.report.error(
                    code::ENTRY_NOT_COMPILABLE,
                    span,
                    format!("entry point '{name}' has no body"),
                );
                continue;
            }
            if func.blacklisted {
                self.report.error(
                    code::ENTRY_NOT_COMPILABLE,
                    span,
                    format!("entry point '{name}' cannot be compiled"),
                );
                continue;
            }
            let mismatch = match stage {
                Stage::Vertex if !func.valid_for_vertex => Some(code::VERTEX_STAGE_MISMATCH),
                Stage::Pixel if !func.valid_for_pixel => Some(code::PIXEL_STAGE_MISMATCH),
                _ => None,
            };
            if let Some(code) = mismatch {
                self.report.error(
                    code,
                    span,
                    format!("'{name}' cannot serve as a {} entry point", stage.name()),
                );
                continue;
            }
            self.module.entry_points.push(EntryPoint {
                name,
                stage,
                function,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    fn resolve_type(
        &mut self,
        scope: ScopeId,
        name: &ast::TypeName,
    ) -> Result<Handle<Type>, AnalysisError> {
        self.scopes
            .find_type(scope, &name.name)
            .ok_or_else(|| AnalysisError::UnknownType {
                name: name.name.clone(),
                span: name.span,
            })
    }

    /// The declared type of a variable-shaped definition, with any array
    /// suffix applied.
    fn vardef_type(
        &mut self,
        scope: ScopeId,
        def: &ast::VarDef,
    ) -> Result<Handle<Type>, AnalysisError> {
        let base = self.resolve_type(scope, &def.ty)?;
        let Some(suffix) = &def.array else {
            return Ok(base);
        };
        let size = match &suffix.len {
            None => ArraySize::Undefined,
            Some(ast::Expr::Literal {
                value: Literal::Int(n),
                ..
            }) if *n > 0 => ArraySize::Constant(*n as u32),
            Some(other) => {
                self.report.error(
                    code::ARRAY_LENGTH_NOT_CONST,
                    other.span(),
                    "array length must be a positive integer literal",
                );
                ArraySize::Undefined
            }
        };
        Ok(self.module.types.insert(Type {
            name: None,
            inner: TypeInner::Array { base, size },
        }))
    }

    fn refuse_void(&mut self, ty: Handle<Type>, span: Span) {
        if self.module.types[ty].inner == TypeInner::Scalar(ScalarKind::Void) {
            self.report
                .error(code::VOID_VALUE, span, "variables cannot have type void");
        }
    }

    /// Keeps the qualifiers a declaration site allows and reports the rest.
    fn filter_quals(&mut self, quals: Qualifiers, site: DeclSite, span: Span) -> Qualifiers {
        let allowed = site.allowed();
        let mut kept = Qualifiers::NONE;
        let mut rejected = Vec::new();
        for (flag, name) in ALL_QUALIFIERS {
            if !quals.contains(flag) {
                continue;
            }
            if allowed.contains(flag) {
                kept = kept | flag;
            } else {
                rejected.push(name);
            }
        }
        if !rejected.is_empty() {
            self.report.error(
                code::INVALID_QUALIFIER,
                span,
                format!(
                    "qualifier `{}` is not allowed on {}",
                    rejected.join("` `"),
                    site.describe()
                ),
            );
        }
        kept
    }

    fn require_readable(&mut self, ty: &TypeRef, span: Span) -> bool {
        if ty.readable() {
            return true;
        }
        self.report.error(
            code::NOT_READABLE,
            span,
            "an out parameter cannot be read before it is assigned",
        );
        false
    }

    /// Marks the out parameter behind an assignment target readable from
    /// here on.
    fn flip_out_param(&mut self, ctx: &BodyCtx, target: Handle<Expression>) {
        if let Some(var) = lvalue_root(ctx.exprs, target) {
            let decl = &mut self.module.variables[var];
            if decl.ty.quals.contains(Qualifiers::OUT)
                && !decl.ty.quals.contains(Qualifiers::INOUT)
                && decl.ty.readable_override.is_none()
            {
                decl.ty.readable_override = Some(true);
            }
        }
    }

    /// Whether a declared function's parameters match these types exactly,
    /// position by position. Used both for overload picking and for spotting
    /// redefinitions.
    fn signature_matches(&self, function: Handle<FunctionDecl>, types: &[TypeRef]) -> bool {
        let decl = &self.module.functions[function];
        decl.params.len() == types.len()
            && decl
                .params
                .iter()
                .zip(types)
                .all(|(&param, ty)| {
                    self.module.variables[param]
                        .ty
                        .is_equal(ty, &self.module.types)
                })
    }

    fn type_name(&self, ty: &TypeRef) -> String {
        format_type(ty.ty, &self.module.types)
    }

    /// A placeholder expression standing in for something that failed to
    /// analyze; its void type keeps downstream checks failing quietly.
    fn poison(&mut self, ctx: &mut BodyCtx, span: Span) -> Handle<Expression> {
        let ty = TypeRef::new(self.module.sys.scalar(ScalarKind::Void));
        ctx.exprs.append(Expression {
            kind: ExprKind::Literal(Literal::Int(0)),
            ty,
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze;

    fn run(source: &str) -> Analysis {
        let unit = pfx_parser::parse(source).expect("source should parse");
        analyze(unit).expect("analysis should not abort")
    }

    fn errors_with(analysis: &Analysis, code: u32) -> usize {
        analysis.report.iter().filter(|d| d.code == code).count()
    }

    #[test]
    fn minimal_function_analyzes_cleanly() {
        let analysis = run("int main() { return 4; }");
        assert!(analysis.success(), "{:?}", analysis.report);
        let func = analysis
            .module
            .functions
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.name == "main")
            .unwrap();
        assert!(func.body.is_some());
        let result = func.result.as_ref().unwrap();
        assert_eq!(result.ty, analysis.module.sys.scalar(ScalarKind::Int));
    }

    #[test]
    fn auto_return_type_is_pinned_by_the_first_return() {
        let analysis = run("auto f() { return 2.5; }");
        assert!(analysis.success(), "{:?}", analysis.report);
        let func = analysis.module.functions.iter().map(|(_, f)| f).next().unwrap();
        assert_eq!(
            func.result.as_ref().unwrap().ty,
            analysis.module.sys.scalar(ScalarKind::Float)
        );

        let analysis = run("auto g() { if (true) { return 1; } return 2.0; }");
        assert_eq!(errors_with(&analysis, code::RETURN_TYPE_MISMATCH), 1);
    }

    #[test]
    fn auto_function_without_returns_is_void() {
        let analysis = run("auto quiet() { int x = 1; }");
        assert!(analysis.success(), "{:?}", analysis.report);
        let func = analysis.module.functions.iter().map(|(_, f)| f).next().unwrap();
        assert_eq!(
            func.result.as_ref().unwrap().ty,
            analysis.module.sys.scalar(ScalarKind::Void)
        );
    }

    #[test]
    fn missing_return_on_one_path_is_reported() {
        let analysis = run("int f(bool c) { if (c) { return 1; } }");
        assert_eq!(errors_with(&analysis, code::MISSING_RETURN), 1);
    }

    #[test]
    fn analysis_continues_past_unknown_names() {
        let analysis = run("void f() { x = 1; y = 2; }");
        assert_eq!(errors_with(&analysis, code::UNKNOWN_VARIABLE), 2);
    }

    #[test]
    fn unknown_type_aborts_analysis() {
        let unit = pfx_parser::parse("foo f() { return 1; }").unwrap();
        let err = analyze(unit).unwrap_err();
        match err {
            AnalysisError::UnknownType { name, .. } => assert_eq!(name, "foo"),
        }
    }

    #[test]
    fn out_parameters_are_unreadable_until_assigned() {
        let analysis = run(
            "void f(out float y) {\n\
             \tfloat a = y;\n\
             \ty = 1.0;\n\
             \tfloat b = y;\n\
             }",
        );
        assert_eq!(errors_with(&analysis, code::NOT_READABLE), 1);
    }

    #[test]
    fn struct_members_resolve_with_offsets_and_swizzles() {
        let analysis = run(
            "struct Vertex { float3 pos; float w; };\n\
             float peek(Vertex v) { return v.pos.y + v.w; }",
        );
        assert!(analysis.success(), "{:?}", analysis.report);
        let (_, ty) = analysis
            .module
            .types
            .iter()
            .find(|(_, t)| t.name.as_deref() == Some("Vertex"))
            .unwrap();
        let TypeInner::Struct { members } = &ty.inner else {
            panic!("expected a struct");
        };
        assert_eq!(members[0].offset, 0);
        assert_eq!(members[1].offset, 12);
    }

    #[test]
    fn constructors_check_component_counts() {
        let analysis = run("float3 v() { return float3(1.0, 2.0, 3.0); }");
        assert!(analysis.success(), "{:?}", analysis.report);

        let analysis = run("float3 v() { return float3(1.0, 2.0); }");
        assert_eq!(errors_with(&analysis, code::INVALID_CONSTRUCTOR), 1);
    }

    #[test]
    fn a_single_scalar_broadcasts_across_a_vector() {
        let analysis = run("float4 fill() { return float4(0.5); }");
        assert!(analysis.success(), "{:?}", analysis.report);
    }

    #[test]
    fn overloads_resolve_first_match_in_declaration_order() {
        let analysis = run(
            "int f(int x) { return 1; }\n\
             int f(float x) { return 2; }\n\
             int main() { return f(3) + f(2.5); }",
        );
        assert!(analysis.success(), "{:?}", analysis.report);

        let analysis = run(
            "int f(int x) { return 1; }\n\
             int main() { return f(true); }",
        );
        assert_eq!(errors_with(&analysis, code::UNKNOWN_FUNCTION), 1);
    }

    #[test]
    fn user_declarations_take_over_builtin_names() {
        let analysis = run(
            "float abs(float v) { return v; }\n\
             float main() { return abs(-2.0); }",
        );
        assert!(analysis.success(), "{:?}", analysis.report);
        let main = analysis
            .module
            .functions
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.name == "main")
            .unwrap();
        // The call resolved to the user function, so an edge was recorded.
        assert_eq!(main.used_functions.len(), 1);
    }

    #[test]
    fn builtin_math_lowers_to_a_math_node() {
        let analysis = run("float k() { return sqrt(4.0); }");
        assert!(analysis.success(), "{:?}", analysis.report);
        let func = analysis.module.functions.iter().map(|(_, f)| f).next().unwrap();
        let body = func.body.as_ref().unwrap();
        assert!(body
            .expressions
            .iter()
            .any(|(_, e)| matches!(e.kind, ExprKind::Math { .. })));
    }

    #[test]
    fn mutual_recursion_disqualifies_both_functions() {
        let analysis = run(
            "int f();\n\
             int g() { return f(); }\n\
             int f() { return g(); }",
        );
        assert_eq!(errors_with(&analysis, code::RECURSIVE_FUNCTION), 2);
        for (_, func) in analysis.module.functions.iter() {
            assert!(func.blacklisted);
        }
    }

    #[test]
    fn thread_index_disqualifies_vertex_entries() {
        let analysis = run("[vertex]\nvoid main() { int i = threadIndex(); }");
        assert_eq!(errors_with(&analysis, code::VERTEX_STAGE_MISMATCH), 1);
        assert!(analysis.module.entry_points.is_empty());
    }

    #[test]
    fn compute_entries_collect_after_the_passes() {
        let analysis = run(
            "int out_data[];\n\
             [compute]\n\
             void main() { out_data[threadIndex()] = incrementCounter(out_data); }",
        );
        assert!(analysis.success(), "{:?}", analysis.report);
        let entry = analysis.module.entry_point("main").unwrap();
        assert_eq!(entry.stage, Stage::Compute);
    }

    #[test]
    fn strict_mode_reports_shadowing() {
        let unit = pfx_parser::parse("float x; void f() { float x = 1.0; }").unwrap();
        let analysis = Analyzer::new(true).analyze(unit).unwrap();
        assert_eq!(errors_with(&analysis, code::SHADOWED_NAME), 1);

        let unit = pfx_parser::parse("float x; void f() { float x = 1.0; }").unwrap();
        let analysis = Analyzer::new(false).analyze(unit).unwrap();
        assert!(analysis.success(), "{:?}", analysis.report);
    }

    #[test]
    fn global_initializers_fold_to_literals() {
        let analysis = run("float x = 1.0 + 2.0;");
        assert!(analysis.success(), "{:?}", analysis.report);
        let var = analysis.module.globals[0];
        let init = analysis.module.variables[var].init.unwrap();
        match &analysis.module.global_expressions[init].kind {
            ExprKind::Literal(Literal::Float(v)) => assert_eq!(*v, 3.0),
            other => panic!("expected a folded literal, got {other:?}"),
        }
    }

    #[test]
    fn global_initializers_cannot_call_user_functions() {
        let analysis = run(
            "float f() { return 1.0; }\n\
             float x = f();",
        );
        assert_eq!(errors_with(&analysis, code::INVALID_INITIALIZER), 1);
    }

    #[test]
    fn annotations_live_in_their_own_frame() {
        let analysis = run(
            "uniform float speed <string ui = \"slider\"; float top = 10.0;> = 1.0;",
        );
        assert!(analysis.success(), "{:?}", analysis.report);
        let var = analysis.module.globals[0];
        let frame = analysis.annotations[&var];
        let names: Vec<_> = analysis
            .scopes
            .frame_variables(frame)
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"ui".to_string()));
        // Entries do not leak into the global scope.
        let analysis2 = run(
            "uniform float speed <float top = 10.0;> = 1.0;\n\
             float peek() { return top; }",
        );
        assert_eq!(errors_with(&analysis2, code::UNKNOWN_VARIABLE), 1);
    }

    #[test]
    fn uniforms_reject_assignment() {
        let analysis = run("uniform float u; void f() { u = 1.0; }");
        assert_eq!(errors_with(&analysis, code::NOT_WRITABLE), 1);
    }

    #[test]
    fn repeated_swizzle_components_reject_assignment() {
        let analysis = run("void f() { float2 v = float2(0.0, 0.0); v.xx = v; }");
        assert_eq!(errors_with(&analysis, code::NOT_WRITABLE), 1);
    }

    #[test]
    fn prototype_then_definition_share_one_declaration() {
        let analysis = run(
            "int twice(int v);\n\
             int main() { return twice(4); }\n\
             int twice(int v) { return v + v; }",
        );
        assert!(analysis.success(), "{:?}", analysis.report);
        let count = analysis
            .module
            .functions
            .iter()
            .filter(|(_, f)| f.name == "twice")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn redefinition_with_matching_signature_is_an_error() {
        let analysis = run(
            "int f(int x) { return 1; }\n\
             int f(int y) { return 2; }",
        );
        assert_eq!(errors_with(&analysis, code::REDEFINITION), 1);
    }

    #[test]
    fn out_arguments_must_be_assignable() {
        let analysis = run(
            "void fill(out float v) { v = 1.0; }\n\
             void main() { fill(2.0); }",
        );
        assert_eq!(errors_with(&analysis, code::NOT_WRITABLE), 1);
    }

    #[test]
    fn calling_an_auto_function_before_its_body_is_an_error() {
        let analysis = run(
            "int main() { return later(); }\n\
             auto later() { return 1; }",
        );
        assert_eq!(errors_with(&analysis, code::AUTO_UNRESOLVED), 1);
    }

    #[test]
    fn qualifier_misuse_is_reported_per_site() {
        let analysis = run("void f(uniform float v) { float x = v; }");
        assert_eq!(errors_with(&analysis, code::INVALID_QUALIFIER), 1);

        let analysis = run("void f() { uniform float v = 1.0; }");
        assert_eq!(errors_with(&analysis, code::INVALID_QUALIFIER), 1);
    }

    #[test]
    fn array_lengths_must_be_literal() {
        let analysis = run("void f() { int n = 4; float data[n]; }");
        assert_eq!(errors_with(&analysis, code::ARRAY_LENGTH_NOT_CONST), 1);
    }

    #[test]
    fn conditions_must_be_bool() {
        let analysis = run("void f() { if (1) { } }");
        assert_eq!(errors_with(&analysis, code::NON_BOOL_CONDITION), 1);
    }
}

//! Lowering from the typed tree to the instruction stream.
//!
//! Translation expands every call at compile time: the callee's body is
//! emitted at the call site against a fresh frame, `out`/`inout`
//! parameters alias the caller's storage, and `return` jumps are patched
//! to the end of the inlined body. One entry point therefore becomes one
//! linear program with a single trailing `ret`.
//!
//! Addressing is structural: an expression resolves to a register, a
//! constant-memory offset, or an external buffer slot, and aggregates are
//! moved word by word. Member access and in-order swizzles are free
//! reinterpretations of the base address; permuted swizzles and casts
//! emit code.
//!
//! The translator expects a module the analyzer has already checked.
//! Shape invariants of the typed tree (operand arity, operator legality)
//! are assumed here, not re-verified.

use pfx_ir::{
    Arena, ArraySize, BinaryOp, EntryPoint, ExprKind, Expression, FunctionDecl, Handle, Literal,
    MathFunction, Module, Qualifiers, ScalarKind, Span, Statement, Type, TypeInner, TypeRef,
    UnaryOp, UniqueArena, VariableDecl, base_scalar, byte_size,
};
use thiserror::Error;

use crate::const_pool::{ConstClass, ConstPool};
use crate::debug::{DebugLayout, InputBinding, UniformWindow};
use crate::frame::{Addr, CallFrames, ExtIndex, SymbolKey};
use crate::op::{Instruction, Opcode};
use crate::program::Program;

/// A terminal translation failure. Translation never partially succeeds;
/// the first unsupported construct abandons the whole compile.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no entry point named '{0}'")]
    NoSuchEntry(String),
    #[error("'{0}' has no body to compile")]
    MissingBody(String),
    #[error("'{0}' has no size known at compile time")]
    UnresolvedLength(String),
    #[error("'{0}' cannot live in register memory")]
    Unrepresentable(String),
    #[error("uniform '{0}' needs a constant initializer")]
    NonConstUniform(String),
    #[error("string values cannot be compiled")]
    UnsupportedLiteral,
    #[error("cannot compile {0}")]
    Unsupported(&'static str),
}

/// Compiles one entry point of an analyzed module.
pub fn compile(module: &Module, entry: &str) -> Result<Program, TranslateError> {
    let ep = module
        .entry_point(entry)
        .ok_or_else(|| TranslateError::NoSuchEntry(entry.to_owned()))?;
    Translator::new(module).run(ep)
}

struct Translator<'m> {
    module: &'m Module,
    pool: ConstPool,
    code: Vec<Instruction>,
    frames: CallFrames,
    layout: DebugLayout,
    /// Functions currently being inlined, to stop a recursive module that
    /// somehow slipped past analysis from expanding forever.
    inlining: Vec<Handle<FunctionDecl>>,
}

impl<'m> Translator<'m> {
    fn new(module: &'m Module) -> Self {
        Self {
            module,
            pool: ConstPool::new(),
            code: Vec::new(),
            frames: CallFrames::new(),
            layout: DebugLayout::default(),
            inlining: Vec::new(),
        }
    }

    fn run(mut self, ep: &EntryPoint) -> Result<Program, TranslateError> {
        let module = self.module;
        let function = &module.functions[ep.function];
        let body = function
            .body
            .as_ref()
            .ok_or_else(|| TranslateError::MissingBody(function.name.clone()))?;

        // The entry frame goes first so its return window lands at
        // register offset zero, where the host reads the result.
        let ret_bytes = function
            .result
            .as_ref()
            .and_then(|result| byte_size(&module.types, result.ty))
            .unwrap_or(0);
        self.frames.push(ret_bytes);
        self.bind_globals()?;
        self.bind_entry_params(function);

        for statement in &body.block {
            self.stmt(&body.expressions, statement)?;
        }
        let exit = self.here();
        let frame = self.frames.pop();
        for jump in frame.ret_jumps {
            self.code[jump as usize].a = exit;
        }
        self.emit(Instruction::new(Opcode::Ret, 0, 0, 0));

        tracing::debug!(
            entry = %ep.name,
            instructions = self.code.len(),
            constant_bytes = self.pool.byte_len(),
            register_bytes = self.frames.register_bytes(),
            "translated entry point"
        );
        let register_bytes = self.frames.register_bytes();
        let Self {
            pool, code, layout, ..
        } = self;
        Ok(Program {
            entry: ep.name.clone(),
            constants: pool.into_words(),
            code,
            register_bytes,
            return_offset: frame.ret_window,
            return_bytes: frame.ret_bytes,
            layout,
        })
    }

    /// Places every module-scope variable. Uniforms get private windows in
    /// constant memory so the host can patch them between dispatches;
    /// everything else gets registers, initialized by the preamble. A
    /// global with no compile-time size is left unbound and faults only
    /// when something refers to it.
    fn bind_globals(&mut self) -> Result<(), TranslateError> {
        let module = self.module;
        let exprs = &module.global_expressions;
        for &var in &module.globals {
            let decl = &module.variables[var];
            let Some(bytes) = byte_size(&module.types, decl.ty.ty) else {
                continue;
            };
            if decl.ty.quals.contains(Qualifiers::UNIFORM) {
                let want = (bytes / 4) as usize;
                let mut words = Vec::with_capacity(want);
                if let Some(init) = decl.init {
                    if !const_words(exprs, init, &mut words) {
                        return Err(TranslateError::NonConstUniform(decl.name.clone()));
                    }
                    if words.len() == 1 && want > 1 {
                        words = vec![words[0]; want];
                    }
                    if words.len() != want {
                        return Err(TranslateError::NonConstUniform(decl.name.clone()));
                    }
                } else {
                    words.resize(want, 0);
                }
                let offset = self.pool.reserve(&words);
                self.layout.uniforms.push(UniformWindow {
                    name: decl.name.clone(),
                    offset,
                    bytes,
                });
                self.frames.bind(SymbolKey::Var(var), Addr::Const(offset));
            } else {
                let reg = self.frames.alloca(bytes);
                self.frames.bind(SymbolKey::Var(var), Addr::Reg(reg));
                if let Some(init) = decl.init {
                    let src = self.resolve(exprs, init)?;
                    self.copy(Addr::Reg(reg), src, bytes)?;
                }
            }
        }
        Ok(())
    }

    /// Entry parameters are external input memory, one slot per declared
    /// position. `out`/`inout` slots are what a dispatch leaves behind.
    fn bind_entry_params(&mut self, function: &FunctionDecl) {
        let module = self.module;
        for (slot, &param) in function.params.iter().enumerate() {
            let slot = slot as u32;
            let decl = &module.variables[param];
            self.frames.bind(
                SymbolKey::Var(param),
                Addr::External {
                    slot,
                    index: ExtIndex::Static(0),
                },
            );
            let element_bytes = match &module.types[decl.ty.ty].inner {
                TypeInner::Array { base, .. } => byte_size(&module.types, *base).unwrap_or(4),
                _ => byte_size(&module.types, decl.ty.ty).unwrap_or(4),
            };
            self.layout.inputs.push(InputBinding {
                name: decl.name.clone(),
                slot,
                element_bytes,
            });
        }
    }

    fn stmt(&mut self, exprs: &Arena<Expression>, statement: &Statement) -> Result<(), TranslateError> {
        let module = self.module;
        match statement {
            Statement::Block(stmts) => {
                for statement in stmts {
                    self.stmt(exprs, statement)?;
                }
            }
            Statement::Decl { var } => {
                let first = self.here();
                let decl = &module.variables[*var];
                let bytes = byte_size(&module.types, decl.ty.ty)
                    .ok_or_else(|| TranslateError::UnresolvedLength(decl.name.clone()))?;
                let reg = self.frames.alloca(bytes);
                self.frames.bind(SymbolKey::Var(*var), Addr::Reg(reg));
                if let Some(init) = decl.init {
                    let src = self.resolve(exprs, init)?;
                    self.copy(Addr::Reg(reg), src, bytes)?;
                }
                self.note(first, decl.span);
            }
            Statement::Assign {
                op,
                target,
                value,
                span,
            } => {
                let first = self.here();
                self.assign(exprs, *op, *target, *value)?;
                self.note(first, *span);
            }
            Statement::If {
                condition,
                accept,
                reject,
            } => {
                let first = self.here();
                let cond = self.value_in_reg(exprs, *condition)?;
                self.note(first, exprs[*condition].span);
                let miss = self.branch_unless(cond);
                for statement in accept {
                    self.stmt(exprs, statement)?;
                }
                if reject.is_empty() {
                    let after = self.here();
                    self.patch(miss, after);
                } else {
                    let done = self.jump_placeholder();
                    let other = self.here();
                    self.patch(miss, other);
                    for statement in reject {
                        self.stmt(exprs, statement)?;
                    }
                    let after = self.here();
                    self.patch(done, after);
                }
            }
            Statement::While { condition, body } => {
                let top = self.here();
                let cond = self.value_in_reg(exprs, *condition)?;
                self.note(top, exprs[*condition].span);
                let exit = self.branch_unless(cond);
                for statement in body {
                    self.stmt(exprs, statement)?;
                }
                self.jump_to(top);
                let after = self.here();
                self.patch(exit, after);
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(exprs, init)?;
                }
                let top = self.here();
                let exit = match condition {
                    Some(condition) => {
                        let cond = self.value_in_reg(exprs, *condition)?;
                        self.note(top, exprs[*condition].span);
                        Some(self.branch_unless(cond))
                    }
                    None => None,
                };
                for statement in body {
                    self.stmt(exprs, statement)?;
                }
                if let Some(step) = step {
                    self.stmt(exprs, step)?;
                }
                self.jump_to(top);
                if let Some(exit) = exit {
                    let after = self.here();
                    self.patch(exit, after);
                }
            }
            Statement::Return { value, span } => {
                let first = self.here();
                let (window, bytes) = self.frames.ret_window();
                if let Some(value) = value {
                    if bytes > 0 {
                        let src = self.resolve(exprs, *value)?;
                        self.copy(Addr::Reg(window), src, bytes)?;
                    }
                }
                let jump = self.jump_placeholder();
                self.frames.note_ret_jump(jump);
                self.note(first, *span);
            }
            Statement::Expr(expr) => {
                let first = self.here();
                self.resolve(exprs, *expr)?;
                self.note(first, exprs[*expr].span);
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        exprs: &Arena<Expression>,
        op: BinaryOp,
        target: Handle<Expression>,
        value: Handle<Expression>,
    ) -> Result<(), TranslateError> {
        let bytes = byte_size(&self.module.types, exprs[target].ty.ty)
            .ok_or(TranslateError::Unsupported("assignment without a sized target"))?;
        let src = match op.arithmetic_part() {
            None => self.resolve(exprs, value)?,
            Some(arith) => {
                let target_addr = self.resolve(exprs, target)?;
                let value_addr = self.resolve(exprs, value)?;
                self.binary_values(
                    arith,
                    target_addr,
                    &exprs[target].ty,
                    value_addr,
                    &exprs[value].ty,
                    &exprs[target].ty,
                )?
            }
        };
        self.write_place(exprs, target, src, bytes)
    }

    /// Stores a value into the location a target expression names.
    /// Permuted swizzle targets scatter component by component; everything
    /// else is a straight copy into the resolved address.
    fn write_place(
        &mut self,
        exprs: &Arena<Expression>,
        target: Handle<Expression>,
        src: Addr,
        bytes: u32,
    ) -> Result<(), TranslateError> {
        if let ExprKind::Swizzle { base, components } = &exprs[target].kind {
            if !is_contiguous(components) {
                let place = self.resolve(exprs, *base)?;
                for (i, &component) in components.iter().enumerate() {
                    let word = self.word_in_reg(src, i as u32 * 4)?;
                    self.store_word(place, u32::from(component) * 4, word)?;
                }
                return Ok(());
            }
        }
        let place = self.resolve(exprs, target)?;
        self.copy(place, src, bytes)
    }

    /// Resolves an expression to the address of its value, emitting
    /// whatever instructions the value needs.
    fn resolve(
        &mut self,
        exprs: &Arena<Expression>,
        expr: Handle<Expression>,
    ) -> Result<Addr, TranslateError> {
        let module = self.module;
        match &exprs[expr].kind {
            ExprKind::Literal(lit) => {
                let bits = lit.to_bits().ok_or(TranslateError::UnsupportedLiteral)?;
                let class = match lit {
                    Literal::Float(_) => ConstClass::F32,
                    _ => ConstClass::I32,
                };
                Ok(Addr::Reg(self.load_const(class, bits)))
            }
            ExprKind::Variable(var) => self
                .frames
                .lookup(SymbolKey::Var(*var))
                .ok_or_else(|| self.unbound(*var)),
            ExprKind::Swizzle { base, components } => {
                let base_addr = self.resolve(exprs, *base)?;
                if is_contiguous(components) {
                    return self.offset_addr(base_addr, u32::from(components[0]) * 4);
                }
                let dst = self.frames.alloca(components.len() as u32 * 4);
                for (i, &component) in components.iter().enumerate() {
                    self.load_word_into(dst + i as u32 * 4, base_addr, u32::from(component) * 4)?;
                }
                Ok(Addr::Reg(dst))
            }
            ExprKind::Member { base, offset, .. } => {
                let base_addr = self.resolve(exprs, *base)?;
                self.offset_addr(base_addr, *offset)
            }
            ExprKind::Index { base, index } => {
                let elem_bytes = byte_size(&module.types, exprs[expr].ty.ty)
                    .ok_or(TranslateError::Unsupported("indexing into unsized elements"))?;
                let base_addr = self.resolve(exprs, *base)?;
                if let ExprKind::Literal(Literal::Int(at)) = &exprs[*index].kind {
                    let at = u32::try_from(*at)
                        .map_err(|_| TranslateError::Unsupported("a negative index"))?;
                    return self.offset_addr(base_addr, at * elem_bytes);
                }
                // A runtime index only works against external memory;
                // registers have no indirect addressing.
                let idx = self.value_in_reg(exprs, *index)?;
                let Addr::External { slot, index: ext } = base_addr else {
                    return Err(TranslateError::Unsupported(
                        "runtime indexing outside buffer storage",
                    ));
                };
                let elem_words = elem_bytes / 4;
                let scaled = if elem_words == 1 {
                    idx
                } else {
                    let factor = self.load_const(ConstClass::I32, elem_words);
                    let dst = self.frames.alloca(4);
                    self.emit(Instruction::new(Opcode::I32Mul, dst, idx, factor));
                    dst
                };
                let biased = match ext {
                    ExtIndex::Static(0) => scaled,
                    ExtIndex::Static(words) => {
                        let bias = self.load_const(ConstClass::I32, words);
                        let dst = self.frames.alloca(4);
                        self.emit(Instruction::new(Opcode::I32Add, dst, scaled, bias));
                        dst
                    }
                    ExtIndex::Dynamic(reg) => {
                        let dst = self.frames.alloca(4);
                        self.emit(Instruction::new(Opcode::I32Add, dst, scaled, reg));
                        dst
                    }
                };
                Ok(Addr::External {
                    slot,
                    index: ExtIndex::Dynamic(biased),
                })
            }
            ExprKind::Unary { op, expr: inner } => match op {
                UnaryOp::Plus => self.resolve(exprs, *inner),
                UnaryOp::LogicalNot => {
                    let src = self.resolve(exprs, *inner)?;
                    let word = self.word_in_reg(src, 0)?;
                    let dst = self.frames.alloca(4);
                    self.emit(Instruction::new(Opcode::LogicalNot, dst, word, 0));
                    Ok(Addr::Reg(dst))
                }
                // There is no negate opcode; negation is a subtraction
                // from zero, lane by lane.
                UnaryOp::Negate => {
                    let kind = base_scalar(&module.types, exprs[expr].ty.ty)
                        .ok_or(TranslateError::Unsupported("negating this type"))?;
                    let opcode = arith_op(kind, BinaryOp::Sub)
                        .ok_or(TranslateError::Unsupported("negating this type"))?;
                    let out_bytes = byte_size(&module.types, exprs[expr].ty.ty)
                        .ok_or(TranslateError::Unsupported("negating this type"))?;
                    let src = self.resolve(exprs, *inner)?;
                    let zero = self.load_const(const_class(kind), 0);
                    let dst = self.frames.alloca(out_bytes);
                    for lane in 0..out_bytes / 4 {
                        let byte = lane * 4;
                        let word = self.word_in_reg(src, byte)?;
                        self.emit(Instruction::new(opcode, dst + byte, zero, word));
                    }
                    Ok(Addr::Reg(dst))
                }
            },
            ExprKind::Binary { op, left, right } => {
                let left_addr = self.resolve(exprs, *left)?;
                let right_addr = self.resolve(exprs, *right)?;
                self.binary_values(
                    *op,
                    left_addr,
                    &exprs[*left].ty,
                    right_addr,
                    &exprs[*right].ty,
                    &exprs[expr].ty,
                )
            }
            ExprKind::Call {
                function,
                arguments,
            } => self.inline_call(exprs, *function, arguments),
            ExprKind::Construct { components } => {
                let out_bytes = byte_size(&module.types, exprs[expr].ty.ty)
                    .ok_or(TranslateError::Unsupported("constructing an unsized type"))?;
                let single_scalar = components.len() == 1
                    && byte_size(&module.types, exprs[components[0]].ty.ty) == Some(4);
                let dst = self.frames.alloca(out_bytes);
                if single_scalar && out_bytes > 4 {
                    let src = self.resolve(exprs, components[0])?;
                    let word = self.word_in_reg(src, 0)?;
                    for lane in 0..out_bytes / 4 {
                        self.emit(Instruction::new(Opcode::Move, dst + lane * 4, word, 0));
                    }
                } else {
                    let mut cursor = 0;
                    for &component in components {
                        let bytes = byte_size(&module.types, exprs[component].ty.ty)
                            .ok_or(TranslateError::Unsupported("constructing an unsized type"))?;
                        let src = self.resolve(exprs, component)?;
                        self.copy(Addr::Reg(dst + cursor), src, bytes)?;
                        cursor += bytes;
                    }
                }
                Ok(Addr::Reg(dst))
            }
            ExprKind::Cast { expr: inner } => {
                let from = base_scalar(&module.types, exprs[*inner].ty.ty);
                let to = base_scalar(&module.types, exprs[expr].ty.ty);
                let src = self.resolve(exprs, *inner)?;
                if from == to {
                    // A useless cast costs nothing.
                    return Ok(src);
                }
                let opcode = match (from, to) {
                    (Some(ScalarKind::Float), Some(ScalarKind::Int)) => Opcode::F32ToI32,
                    (Some(ScalarKind::Int), Some(ScalarKind::Float)) => Opcode::I32ToF32,
                    _ => return Err(TranslateError::Unsupported("this conversion")),
                };
                let word = self.word_in_reg(src, 0)?;
                let dst = self.frames.alloca(4);
                self.emit(Instruction::new(opcode, dst, word, 0));
                Ok(Addr::Reg(dst))
            }
            ExprKind::Math { fun, args } => self.math(exprs, *fun, args, expr),
            ExprKind::CounterIncrement { buffer } => {
                let addr = self
                    .frames
                    .lookup(SymbolKey::Var(*buffer))
                    .ok_or_else(|| self.unbound(*buffer))?;
                let Addr::External { slot, .. } = addr else {
                    return Err(TranslateError::Unsupported(
                        "a counter outside buffer storage",
                    ));
                };
                let dst = self.frames.alloca(4);
                self.emit(Instruction::new(Opcode::CounterIncrement, dst, slot, 0));
                Ok(Addr::Reg(dst))
            }
            ExprKind::ThreadIndex => {
                let dst = self.frames.alloca(4);
                self.emit(Instruction::new(Opcode::ThreadIndex, dst, 0, 0));
                Ok(Addr::Reg(dst))
            }
        }
    }

    fn binary_values(
        &mut self,
        op: BinaryOp,
        left: Addr,
        left_ty: &TypeRef,
        right: Addr,
        right_ty: &TypeRef,
        out_ty: &TypeRef,
    ) -> Result<Addr, TranslateError> {
        debug_assert!(!op.is_assignment(), "assignments lower as statements");
        let module = self.module;
        let types = &module.types;

        if op.is_logical() {
            let opcode = if op == BinaryOp::LogicalAnd {
                Opcode::LogicalAnd
            } else {
                Opcode::LogicalOr
            };
            let left_word = self.word_in_reg(left, 0)?;
            let right_word = self.word_in_reg(right, 0)?;
            let dst = self.frames.alloca(4);
            self.emit(Instruction::new(opcode, dst, left_word, right_word));
            return Ok(Addr::Reg(dst));
        }
        if op.is_equality() {
            return self.equality(op, left, left_ty, right);
        }
        if op.is_relational() {
            let kind = base_scalar(types, left_ty.ty)
                .ok_or(TranslateError::Unsupported("comparing this type"))?;
            let opcode =
                compare_op(kind, op).ok_or(TranslateError::Unsupported("comparing this type"))?;
            let left_word = self.word_in_reg(left, 0)?;
            let right_word = self.word_in_reg(right, 0)?;
            let dst = self.frames.alloca(4);
            self.emit(Instruction::new(opcode, dst, left_word, right_word));
            return Ok(Addr::Reg(dst));
        }

        if op == BinaryOp::Mul {
            if let (TypeInner::Matrix { rows, .. }, TypeInner::Vector { size, .. }) =
                (&types[left_ty.ty].inner, &types[right_ty.ty].inner)
            {
                let kind = base_scalar(types, out_ty.ty)
                    .ok_or(TranslateError::Unsupported("this matrix product"))?;
                let (rows, lanes) = (rows.count(), size.count());
                return self.mat_vec_product(left, right, kind, rows, lanes);
            }
            if let (TypeInner::Vector { size, .. }, TypeInner::Matrix { row, .. }) =
                (&types[left_ty.ty].inner, &types[right_ty.ty].inner)
            {
                let kind = base_scalar(types, out_ty.ty)
                    .ok_or(TranslateError::Unsupported("this matrix product"))?;
                let cols = match &types[*row].inner {
                    TypeInner::Vector { size, .. } => size.count(),
                    _ => 1,
                };
                let lanes = size.count();
                return self.vec_mat_product(left, right, kind, cols, lanes);
            }
        }

        // Elementwise arithmetic; a 4-byte side repeats its one word
        // across every result lane.
        let kind = base_scalar(types, out_ty.ty)
            .ok_or(TranslateError::Unsupported("arithmetic on this type"))?;
        let opcode =
            arith_op(kind, op).ok_or(TranslateError::Unsupported("arithmetic on this type"))?;
        let out_bytes = byte_size(types, out_ty.ty)
            .ok_or(TranslateError::Unsupported("arithmetic on this type"))?;
        let left_bytes = byte_size(types, left_ty.ty).unwrap_or(4);
        let right_bytes = byte_size(types, right_ty.ty).unwrap_or(4);
        let left_one = if left_bytes == 4 {
            Some(self.word_in_reg(left, 0)?)
        } else {
            None
        };
        let right_one = if right_bytes == 4 {
            Some(self.word_in_reg(right, 0)?)
        } else {
            None
        };
        let dst = self.frames.alloca(out_bytes);
        for lane in 0..out_bytes / 4 {
            let byte = lane * 4;
            let left_word = match left_one {
                Some(reg) => reg,
                None => self.word_in_reg(left, byte)?,
            };
            let right_word = match right_one {
                Some(reg) => reg,
                None => self.word_in_reg(right, byte)?,
            };
            self.emit(Instruction::new(opcode, dst + byte, left_word, right_word));
        }
        Ok(Addr::Reg(dst))
    }

    /// Aggregate equality is a conjunction of per-word compares; a
    /// one-word operand collapses to a single typed compare.
    fn equality(
        &mut self,
        op: BinaryOp,
        left: Addr,
        left_ty: &TypeRef,
        right: Addr,
    ) -> Result<Addr, TranslateError> {
        let module = self.module;
        let mut kinds = Vec::new();
        word_kinds(&module.types, left_ty.ty, &mut kinds);
        debug_assert!(!kinds.is_empty(), "equality operands have words");
        let dst = self.frames.alloca(4);
        if kinds.len() == 1 {
            let opcode = compare_op(kinds[0], op)
                .ok_or(TranslateError::Unsupported("comparing this type"))?;
            let left_word = self.word_in_reg(left, 0)?;
            let right_word = self.word_in_reg(right, 0)?;
            self.emit(Instruction::new(opcode, dst, left_word, right_word));
            return Ok(Addr::Reg(dst));
        }
        for (i, &kind) in kinds.iter().enumerate() {
            let opcode = compare_op(kind, BinaryOp::Equal)
                .ok_or(TranslateError::Unsupported("comparing this type"))?;
            let byte = i as u32 * 4;
            let left_word = self.word_in_reg(left, byte)?;
            let right_word = self.word_in_reg(right, byte)?;
            if i == 0 {
                self.emit(Instruction::new(opcode, dst, left_word, right_word));
            } else {
                let part = self.frames.alloca(4);
                self.emit(Instruction::new(opcode, part, left_word, right_word));
                self.emit(Instruction::new(Opcode::LogicalAnd, dst, dst, part));
            }
        }
        if op == BinaryOp::NotEqual {
            self.emit(Instruction::new(Opcode::LogicalNot, dst, dst, 0));
        }
        Ok(Addr::Reg(dst))
    }

    /// `out[i] = Σ_j m[i][j] · v[j]`. The checker types the product with
    /// the vector operand, so the matrix must offer at least that many
    /// rows, and its row width already matches the vector.
    fn mat_vec_product(
        &mut self,
        m: Addr,
        v: Addr,
        kind: ScalarKind,
        rows: u32,
        lanes: u32,
    ) -> Result<Addr, TranslateError> {
        if rows < lanes {
            return Err(TranslateError::Unsupported("this matrix product's shape"));
        }
        let mul = arith_op(kind, BinaryOp::Mul)
            .ok_or(TranslateError::Unsupported("this matrix product"))?;
        let add = arith_op(kind, BinaryOp::Add)
            .ok_or(TranslateError::Unsupported("this matrix product"))?;
        let dst = self.frames.alloca(lanes * 4);
        for i in 0..lanes {
            for j in 0..lanes {
                let a = self.word_in_reg(m, (i * lanes + j) * 4)?;
                let b = self.word_in_reg(v, j * 4)?;
                if j == 0 {
                    self.emit(Instruction::new(mul, dst + i * 4, a, b));
                } else {
                    let part = self.frames.alloca(4);
                    self.emit(Instruction::new(mul, part, a, b));
                    self.emit(Instruction::new(add, dst + i * 4, dst + i * 4, part));
                }
            }
        }
        Ok(Addr::Reg(dst))
    }

    /// `out[j] = Σ_i v[i] · m[i][j]`, with `cols` the matrix row stride.
    fn vec_mat_product(
        &mut self,
        v: Addr,
        m: Addr,
        kind: ScalarKind,
        cols: u32,
        lanes: u32,
    ) -> Result<Addr, TranslateError> {
        if cols < lanes {
            return Err(TranslateError::Unsupported("this matrix product's shape"));
        }
        let mul = arith_op(kind, BinaryOp::Mul)
            .ok_or(TranslateError::Unsupported("this matrix product"))?;
        let add = arith_op(kind, BinaryOp::Add)
            .ok_or(TranslateError::Unsupported("this matrix product"))?;
        let dst = self.frames.alloca(lanes * 4);
        for j in 0..lanes {
            for i in 0..lanes {
                let a = self.word_in_reg(v, i * 4)?;
                let b = self.word_in_reg(m, (i * cols + j) * 4)?;
                if i == 0 {
                    self.emit(Instruction::new(mul, dst + j * 4, a, b));
                } else {
                    let part = self.frames.alloca(4);
                    self.emit(Instruction::new(mul, part, a, b));
                    self.emit(Instruction::new(add, dst + j * 4, dst + j * 4, part));
                }
            }
        }
        Ok(Addr::Reg(dst))
    }

    fn math(
        &mut self,
        exprs: &Arena<Expression>,
        fun: MathFunction,
        args: &[Handle<Expression>],
        expr: Handle<Expression>,
    ) -> Result<Addr, TranslateError> {
        let module = self.module;
        let out_bytes = byte_size(&module.types, exprs[expr].ty.ty)
            .ok_or(TranslateError::Unsupported("this intrinsic"))?;
        match fun {
            MathFunction::Abs
            | MathFunction::Floor
            | MathFunction::Ceil
            | MathFunction::Frac
            | MathFunction::Sin
            | MathFunction::Cos
            | MathFunction::Sqrt => {
                let opcode = match fun {
                    MathFunction::Abs => Opcode::F32Abs,
                    MathFunction::Floor => Opcode::F32Floor,
                    MathFunction::Ceil => Opcode::F32Ceil,
                    MathFunction::Frac => Opcode::F32Frac,
                    MathFunction::Sin => Opcode::F32Sin,
                    MathFunction::Cos => Opcode::F32Cos,
                    _ => Opcode::F32Sqrt,
                };
                let src = self.resolve(exprs, args[0])?;
                let dst = self.frames.alloca(out_bytes);
                for lane in 0..out_bytes / 4 {
                    let byte = lane * 4;
                    let word = self.word_in_reg(src, byte)?;
                    self.emit(Instruction::new(opcode, dst + byte, word, 0));
                }
                Ok(Addr::Reg(dst))
            }
            MathFunction::Min | MathFunction::Max => {
                let opcode = if fun == MathFunction::Min {
                    Opcode::F32Min
                } else {
                    Opcode::F32Max
                };
                let a = self.resolve(exprs, args[0])?;
                let b = self.resolve(exprs, args[1])?;
                let dst = self.frames.alloca(out_bytes);
                for lane in 0..out_bytes / 4 {
                    let byte = lane * 4;
                    let a_word = self.word_in_reg(a, byte)?;
                    let b_word = self.word_in_reg(b, byte)?;
                    self.emit(Instruction::new(opcode, dst + byte, a_word, b_word));
                }
                Ok(Addr::Reg(dst))
            }
            // lerp(a, b, t) = a·(1-t) + b·t, matching the folded form.
            MathFunction::Lerp => {
                let a = self.resolve(exprs, args[0])?;
                let b = self.resolve(exprs, args[1])?;
                let t = self.resolve(exprs, args[2])?;
                let one = self.load_const(ConstClass::F32, 1.0f32.to_bits());
                let dst = self.frames.alloca(out_bytes);
                for lane in 0..out_bytes / 4 {
                    let byte = lane * 4;
                    let a_word = self.word_in_reg(a, byte)?;
                    let b_word = self.word_in_reg(b, byte)?;
                    let t_word = self.word_in_reg(t, byte)?;
                    let keep = self.frames.alloca(4);
                    self.emit(Instruction::new(Opcode::F32Sub, keep, one, t_word));
                    let from = self.frames.alloca(4);
                    self.emit(Instruction::new(Opcode::F32Mul, from, a_word, keep));
                    let to = self.frames.alloca(4);
                    self.emit(Instruction::new(Opcode::F32Mul, to, b_word, t_word));
                    self.emit(Instruction::new(Opcode::F32Add, dst + byte, from, to));
                }
                Ok(Addr::Reg(dst))
            }
            MathFunction::Dot => {
                let a = self.resolve(exprs, args[0])?;
                let b = self.resolve(exprs, args[1])?;
                let arg_bytes = byte_size(&module.types, exprs[args[0]].ty.ty).unwrap_or(4);
                let dst = self.frames.alloca(4);
                for lane in 0..arg_bytes / 4 {
                    let byte = lane * 4;
                    let a_word = self.word_in_reg(a, byte)?;
                    let b_word = self.word_in_reg(b, byte)?;
                    if lane == 0 {
                        self.emit(Instruction::new(Opcode::F32Mul, dst, a_word, b_word));
                    } else {
                        let part = self.frames.alloca(4);
                        self.emit(Instruction::new(Opcode::F32Mul, part, a_word, b_word));
                        self.emit(Instruction::new(Opcode::F32Add, dst, dst, part));
                    }
                }
                Ok(Addr::Reg(dst))
            }
        }
    }

    /// Expands a user call in place. Arguments are resolved in the caller
    /// frame first, so expressions like `f(x, x + 1)` read consistent
    /// values; `out`/`inout` parameters bind to the caller's own storage.
    fn inline_call(
        &mut self,
        exprs: &Arena<Expression>,
        function: Handle<FunctionDecl>,
        arguments: &[Handle<Expression>],
    ) -> Result<Addr, TranslateError> {
        let module = self.module;
        let callee = &module.functions[function];
        let body = callee
            .body
            .as_ref()
            .ok_or_else(|| TranslateError::MissingBody(callee.name.clone()))?;
        if self.inlining.contains(&function) {
            return Err(TranslateError::Unsupported("a recursive call"));
        }

        let mut args = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            args.push(self.resolve(exprs, argument)?);
        }

        let ret_bytes = callee
            .result
            .as_ref()
            .and_then(|result| byte_size(&module.types, result.ty))
            .unwrap_or(0);
        self.frames.push(ret_bytes);
        self.inlining.push(function);
        for (&param, &addr) in callee.params.iter().zip(&args) {
            let decl = &module.variables[param];
            let byref = decl.ty.quals.contains(Qualifiers::OUT)
                || decl.ty.quals.contains(Qualifiers::INOUT);
            if byref {
                self.frames.bind(SymbolKey::Var(param), addr);
            } else {
                let bytes = byte_size(&module.types, decl.ty.ty)
                    .ok_or_else(|| TranslateError::UnresolvedLength(decl.name.clone()))?;
                let dst = self.frames.alloca(bytes);
                self.frames.bind(SymbolKey::Var(param), Addr::Reg(dst));
                self.copy(Addr::Reg(dst), addr, bytes)?;
            }
        }
        for statement in &body.block {
            self.stmt(&body.expressions, statement)?;
        }
        let exit = self.here();
        self.inlining.pop();
        let frame = self.frames.pop();
        for jump in frame.ret_jumps {
            self.patch(jump, exit);
        }
        Ok(Addr::Reg(frame.ret_window))
    }

    /// Loads an interned constant into a register, reusing an earlier
    /// load when one still dominates this point.
    fn load_const(&mut self, class: ConstClass, bits: u32) -> u32 {
        if let Some(Addr::Reg(reg)) = self.frames.lookup(SymbolKey::Loaded(class, bits)) {
            return reg;
        }
        let offset = self.pool.intern(class, bits);
        let reg = self.frames.alloca(4);
        self.emit(Instruction::new(Opcode::LoadConst, reg, offset, 0));
        self.frames.bind(SymbolKey::Loaded(class, bits), Addr::Reg(reg));
        reg
    }

    /// Shifts an address by a static byte offset, emitting index
    /// arithmetic when the base is dynamically indexed external memory.
    fn offset_addr(&mut self, addr: Addr, bytes: u32) -> Result<Addr, TranslateError> {
        if bytes == 0 {
            return Ok(addr);
        }
        match addr {
            Addr::External {
                slot,
                index: ExtIndex::Dynamic(reg),
            } => {
                let idx = self.ext_index(ExtIndex::Dynamic(reg), bytes);
                Ok(Addr::External {
                    slot,
                    index: ExtIndex::Dynamic(idx),
                })
            }
            other => match other.offset(bytes) {
                Addr::Invalid => Err(TranslateError::Unsupported("an unaddressable value")),
                moved => Ok(moved),
            },
        }
    }

    /// A register holding the word index for an external access.
    fn ext_index(&mut self, index: ExtIndex, byte: u32) -> u32 {
        match index {
            ExtIndex::Static(words) => self.load_const(ConstClass::I32, words + byte / 4),
            ExtIndex::Dynamic(reg) => {
                if byte == 0 {
                    return reg;
                }
                let bias = self.load_const(ConstClass::I32, byte / 4);
                let dst = self.frames.alloca(4);
                self.emit(Instruction::new(Opcode::I32Add, dst, reg, bias));
                dst
            }
        }
    }

    /// The register holding one word of `addr`, loading it if the word
    /// does not already live in the register file.
    fn word_in_reg(&mut self, addr: Addr, byte: u32) -> Result<u32, TranslateError> {
        if let Addr::Reg(reg) = addr {
            return Ok(reg + byte);
        }
        let dst = self.frames.alloca(4);
        self.load_word_into(dst, addr, byte)?;
        Ok(dst)
    }

    fn value_in_reg(
        &mut self,
        exprs: &Arena<Expression>,
        expr: Handle<Expression>,
    ) -> Result<u32, TranslateError> {
        let addr = self.resolve(exprs, expr)?;
        self.word_in_reg(addr, 0)
    }

    fn load_word_into(&mut self, dst: u32, src: Addr, byte: u32) -> Result<(), TranslateError> {
        match src {
            Addr::Reg(reg) => {
                if reg + byte != dst {
                    self.emit(Instruction::new(Opcode::Move, dst, reg + byte, 0));
                }
            }
            Addr::Const(offset) => {
                self.emit(Instruction::new(Opcode::LoadConst, dst, offset + byte, 0));
            }
            Addr::External { slot, index } => {
                let idx = self.ext_index(index, byte);
                self.emit(Instruction::new(Opcode::LoadElement, dst, slot, idx));
            }
            Addr::Invalid => {
                debug_assert!(false, "invalid address reached the emitter");
                return Err(TranslateError::Unsupported("an unaddressable value"));
            }
        }
        Ok(())
    }

    fn store_word(&mut self, dst: Addr, byte: u32, src: u32) -> Result<(), TranslateError> {
        match dst {
            Addr::Reg(reg) => {
                if reg + byte != src {
                    self.emit(Instruction::new(Opcode::Move, reg + byte, src, 0));
                }
                Ok(())
            }
            Addr::External { slot, index } => {
                let idx = self.ext_index(index, byte);
                self.emit(Instruction::new(Opcode::StoreElement, slot, idx, src));
                Ok(())
            }
            Addr::Const(_) => {
                debug_assert!(false, "stores never target constant memory");
                Err(TranslateError::Unsupported("a store into constant memory"))
            }
            Addr::Invalid => {
                debug_assert!(false, "invalid address reached the emitter");
                Err(TranslateError::Unsupported("an unaddressable value"))
            }
        }
    }

    /// Word-by-word memcopy between any two addresses.
    fn copy(&mut self, dst: Addr, src: Addr, bytes: u32) -> Result<(), TranslateError> {
        debug_assert_eq!(bytes % 4, 0, "copies move whole words");
        if dst == src {
            return Ok(());
        }
        for word in 0..bytes / 4 {
            let byte = word * 4;
            match dst {
                Addr::Reg(reg) => self.load_word_into(reg + byte, src, byte)?,
                Addr::External { .. } => {
                    let value = self.word_in_reg(src, byte)?;
                    self.store_word(dst, byte, value)?;
                }
                Addr::Const(_) => {
                    debug_assert!(false, "stores never target constant memory");
                    return Err(TranslateError::Unsupported("a store into constant memory"));
                }
                Addr::Invalid => {
                    debug_assert!(false, "invalid address reached the emitter");
                    return Err(TranslateError::Unsupported("an unaddressable value"));
                }
            }
        }
        Ok(())
    }

    /// Emits a `jump.if`/`jump` pair: execution continues past the pair
    /// when the condition holds and takes the returned jump otherwise.
    fn branch_unless(&mut self, cond: u32) -> u32 {
        self.emit(Instruction::new(Opcode::JumpIf, cond, 0, 0));
        let jump = self.emit(Instruction::new(Opcode::Jump, 0, 0, 0));
        self.frames.clear_loaded();
        jump
    }

    fn jump_placeholder(&mut self) -> u32 {
        let jump = self.emit(Instruction::new(Opcode::Jump, 0, 0, 0));
        self.frames.clear_loaded();
        jump
    }

    fn jump_to(&mut self, target: u32) {
        self.emit(Instruction::new(Opcode::Jump, target, 0, 0));
        self.frames.clear_loaded();
    }

    /// Points an emitted jump at `target`, which becomes a label.
    fn patch(&mut self, jump: u32, target: u32) {
        self.code[jump as usize].a = target;
        self.frames.clear_loaded();
    }

    fn emit(&mut self, instruction: Instruction) -> u32 {
        let at = self.code.len() as u32;
        self.code.push(instruction);
        at
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn note(&mut self, first: u32, span: Span) {
        let limit = self.here();
        self.layout.note(first, limit, span);
    }

    fn unbound(&self, var: Handle<VariableDecl>) -> TranslateError {
        let decl = &self.module.variables[var];
        match &self.module.types[decl.ty.ty].inner {
            TypeInner::Array {
                size: ArraySize::Undefined,
                ..
            } => TranslateError::UnresolvedLength(decl.name.clone()),
            _ => TranslateError::Unrepresentable(decl.name.clone()),
        }
    }
}

fn const_class(kind: ScalarKind) -> ConstClass {
    if kind == ScalarKind::Float {
        ConstClass::F32
    } else {
        ConstClass::I32
    }
}

fn is_contiguous(components: &[u8]) -> bool {
    components.windows(2).all(|pair| pair[1] == pair[0] + 1)
}

/// Collects the words of a literal-only initializer tree.
fn const_words(exprs: &Arena<Expression>, expr: Handle<Expression>, out: &mut Vec<u32>) -> bool {
    match &exprs[expr].kind {
        ExprKind::Literal(lit) => match lit.to_bits() {
            Some(bits) => {
                out.push(bits);
                true
            }
            None => false,
        },
        ExprKind::Construct { components } => {
            components.iter().all(|&c| const_words(exprs, c, out))
        }
        _ => false,
    }
}

/// Flattens a type into the scalar kind of each of its words, in memory
/// order.
fn word_kinds(types: &UniqueArena<Type>, ty: Handle<Type>, out: &mut Vec<ScalarKind>) {
    match &types[ty].inner {
        TypeInner::Scalar(kind) => out.push(*kind),
        TypeInner::Vector { base, size } => {
            for _ in 0..size.count() {
                word_kinds(types, *base, out);
            }
        }
        TypeInner::Matrix { row, rows } => {
            for _ in 0..rows.count() {
                word_kinds(types, *row, out);
            }
        }
        TypeInner::Struct { members } => {
            for member in members {
                word_kinds(types, member.ty, out);
            }
        }
        TypeInner::Array { base, size } => {
            if let ArraySize::Constant(n) = size {
                for _ in 0..*n {
                    word_kinds(types, *base, out);
                }
            }
        }
    }
}

fn arith_op(kind: ScalarKind, op: BinaryOp) -> Option<Opcode> {
    use Opcode::*;
    Some(match (kind, op) {
        (ScalarKind::Int, BinaryOp::Add) => I32Add,
        (ScalarKind::Int, BinaryOp::Sub) => I32Sub,
        (ScalarKind::Int, BinaryOp::Mul) => I32Mul,
        (ScalarKind::Int, BinaryOp::Div) => I32Div,
        (ScalarKind::Float, BinaryOp::Add) => F32Add,
        (ScalarKind::Float, BinaryOp::Sub) => F32Sub,
        (ScalarKind::Float, BinaryOp::Mul) => F32Mul,
        (ScalarKind::Float, BinaryOp::Div) => F32Div,
        _ => return None,
    })
}

fn compare_op(kind: ScalarKind, op: BinaryOp) -> Option<Opcode> {
    use Opcode::*;
    let int = matches!(kind, ScalarKind::Int | ScalarKind::Bool);
    let float = kind == ScalarKind::Float;
    Some(match op {
        BinaryOp::Equal if int => I32Equal,
        BinaryOp::Equal if float => F32Equal,
        BinaryOp::NotEqual if int => I32NotEqual,
        BinaryOp::NotEqual if float => F32NotEqual,
        BinaryOp::Less if int => I32Less,
        BinaryOp::Less if float => F32Less,
        BinaryOp::LessEqual if int => I32LessEqual,
        BinaryOp::LessEqual if float => F32LessEqual,
        BinaryOp::Greater if int => I32Greater,
        BinaryOp::Greater if float => F32Greater,
        BinaryOp::GreaterEqual if int => I32GreaterEqual,
        BinaryOp::GreaterEqual if float => F32GreaterEqual,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str, entry: &str) -> Program {
        let unit = pfx_parser::parse(source).expect("source parses");
        let analysis = pfx_analysis::analyze(unit).expect("analysis runs");
        assert!(analysis.success(), "clean analysis: {:?}", analysis.report);
        compile(&analysis.module, entry).expect("translates")
    }

    fn build_err(source: &str, entry: &str) -> TranslateError {
        let unit = pfx_parser::parse(source).expect("source parses");
        let analysis = pfx_analysis::analyze(unit).expect("analysis runs");
        assert!(analysis.success(), "clean analysis: {:?}", analysis.report);
        compile(&analysis.module, entry).expect_err("translation fails")
    }

    fn count_op(program: &Program, opcode: Opcode) -> usize {
        program
            .code
            .iter()
            .filter(|i| i.op() == Ok(opcode))
            .count()
    }

    fn assert_jumps_bounded(program: &Program) {
        for (i, instruction) in program.code.iter().enumerate() {
            if instruction.op() == Ok(Opcode::Jump) {
                assert!(
                    (instruction.a as usize) < program.code.len(),
                    "jump at {i} escapes the program"
                );
            }
        }
    }

    #[test]
    fn folded_constant_returns_are_one_load() {
        let program = build("[pixel] float main() { return 2.0 + 3.0 * 4.0; }", "main");
        assert_eq!(program.constants, vec![14.0f32.to_bits()]);
        assert_eq!(program.code.len(), 4);
        assert_eq!(program.code[0], Instruction::new(Opcode::LoadConst, 4, 0, 0));
        assert_eq!(program.code[1], Instruction::new(Opcode::Move, 0, 4, 0));
        assert_eq!(program.code[2], Instruction::new(Opcode::Jump, 3, 0, 0));
        assert_eq!(program.code[3], Instruction::new(Opcode::Ret, 0, 0, 0));
        assert_eq!(program.return_offset, 0);
        assert_eq!(program.return_bytes, 4);
        assert_eq!(program.register_bytes, 8);
    }

    #[test]
    fn parameter_arithmetic_emits_typed_float_ops() {
        let program = build("[pixel] float main(float x) { return x * 2.0 + 1.0; }", "main");
        // 2.0, the slot index 0, and 1.0.
        assert_eq!(program.constants.len(), 3);
        assert_eq!(count_op(&program, Opcode::LoadElement), 1);
        assert_eq!(count_op(&program, Opcode::F32Mul), 1);
        assert_eq!(count_op(&program, Opcode::F32Add), 1);
        assert_eq!(program.code.len(), 9);
        let input = &program.layout.inputs[0];
        assert_eq!((input.name.as_str(), input.slot, input.element_bytes), ("x", 0, 4));
        assert!(!program.layout.spans.is_empty());
    }

    #[test]
    fn repeated_literals_share_a_pool_slot_and_register() {
        let program = build(
            "[pixel] float main(float x) {
                float a = x + 1.0;
                float b = x - 1.0;
                return a + b;
            }",
            "main",
        );
        // One float 1.0 plus the int index 0, each loaded once.
        assert_eq!(program.constants.len(), 2);
        assert_eq!(count_op(&program, Opcode::LoadConst), 2);
        assert_eq!(count_op(&program, Opcode::LoadElement), 2);
    }

    #[test]
    fn out_arguments_alias_the_callers_register() {
        let program = build(
            "void fill(out float x) { x = 3.0; }
             [pixel] float main() {
                float v = 0.0;
                fill(v);
                return v;
             }",
            "main",
        );
        assert_eq!(program.code.len(), 7);
        // The initializer and the inlined body write the same register.
        assert_eq!(program.code[1].op(), Ok(Opcode::Move));
        assert_eq!(program.code[3].op(), Ok(Opcode::Move));
        assert_eq!(program.code[1].a, program.code[3].a);
        assert_eq!(
            program.constants,
            vec![0.0f32.to_bits(), 3.0f32.to_bits()]
        );
    }

    #[test]
    fn every_return_patches_to_the_single_exit() {
        let program = build(
            "[pixel] float main(float x) {
                if (x > 1.0) {
                    return 2.0;
                }
                return 0.5;
            }",
            "main",
        );
        assert_eq!(count_op(&program, Opcode::Ret), 1);
        assert_eq!(count_op(&program, Opcode::JumpIf), 1);
        let exit = (program.code.len() - 1) as u32;
        assert_eq!(program.code[exit as usize].op(), Ok(Opcode::Ret));
        let to_exit = program
            .code
            .iter()
            .filter(|i| i.op() == Ok(Opcode::Jump) && i.a == exit)
            .count();
        assert_eq!(to_exit, 2);
        assert_jumps_bounded(&program);
    }

    #[test]
    fn uniform_globals_reserve_patchable_windows() {
        let program = build(
            "uniform float4 tint = float4(1.0, 0.5, 0.25, 1.0);
             [pixel] float4 main() { return tint; }",
            "main",
        );
        let window = program.layout.uniform("tint").expect("window exists");
        assert_eq!((window.offset, window.bytes), (0, 16));
        assert_eq!(
            program.constants,
            vec![
                1.0f32.to_bits(),
                0.5f32.to_bits(),
                0.25f32.to_bits(),
                1.0f32.to_bits(),
            ]
        );
        // Four loads into the return window, the return jump, and ret.
        assert_eq!(program.code.len(), 6);
        assert_eq!(count_op(&program, Opcode::LoadConst), 4);
        assert_eq!(program.register_bytes, 16);
    }

    #[test]
    fn buffer_element_stores_hit_the_bound_slot() {
        let program = build(
            "[compute] void main(out int data[]) { data[threadIndex()] = 7; }",
            "main",
        );
        assert_eq!(count_op(&program, Opcode::ThreadIndex), 1);
        assert!(
            program
                .code
                .iter()
                .any(|i| i.op() == Ok(Opcode::StoreElement) && i.a == 0),
            "a store addresses slot 0"
        );
        let input = &program.layout.inputs[0];
        assert_eq!((input.name.as_str(), input.element_bytes), ("data", 4));
    }

    #[test]
    fn counter_increment_addresses_the_buffer_slot() {
        let program = build(
            "[compute] void main(out int used[]) {
                int t = incrementCounter(used);
                used[t] = t;
            }",
            "main",
        );
        assert!(
            program
                .code
                .iter()
                .any(|i| i.op() == Ok(Opcode::CounterIncrement) && i.b == 0),
            "the counter targets slot 0"
        );
        assert_eq!(count_op(&program, Opcode::StoreElement), 1);
    }

    #[test]
    fn unsized_globals_fault_when_referenced() {
        let err = build_err(
            "int free_list[];
             [compute] void main() { free_list[0] = 1; }",
            "main",
        );
        assert!(matches!(err, TranslateError::UnresolvedLength(name) if name == "free_list"));
    }

    #[test]
    fn dynamic_register_indexing_is_rejected() {
        let err = build_err(
            "[pixel] float main(int i) {
                float a[2];
                a[0] = 1.0;
                a[1] = 2.0;
                return a[i];
            }",
            "main",
        );
        assert!(matches!(err, TranslateError::Unsupported(_)));
    }

    #[test]
    fn permuted_swizzles_cost_extra_moves() {
        let straight = build(
            "[pixel] float2 main() { float3 v = float3(1.0, 2.0, 3.0); return v.yz; }",
            "main",
        );
        let permuted = build(
            "[pixel] float2 main() { float3 v = float3(1.0, 2.0, 3.0); return v.zy; }",
            "main",
        );
        // The in-order pair reads straight off the base; the reversed one
        // gathers each component first.
        assert_eq!(
            count_op(&permuted, Opcode::Move),
            count_op(&straight, Opcode::Move) + 2
        );
    }

    #[test]
    fn nested_calls_inline_into_one_stream() {
        let program = build(
            "float twice(float v) { return v + v; }
             [pixel] float main(float x) { return twice(twice(x)); }",
            "main",
        );
        assert_eq!(count_op(&program, Opcode::F32Add), 2);
        assert_eq!(count_op(&program, Opcode::Ret), 1);
        assert_jumps_bounded(&program);
    }

    #[test]
    fn unknown_entry_points_are_an_error() {
        let unit = pfx_parser::parse("[pixel] float main() { return 1.0; }").expect("parses");
        let analysis = pfx_analysis::analyze(unit).expect("analysis runs");
        let err = compile(&analysis.module, "missing").expect_err("no such entry");
        assert!(matches!(err, TranslateError::NoSuchEntry(name) if name == "missing"));
    }
}

//! AST to linear bytecode: a single `Vec<u8>` instruction stream plus a
//! number pool and a string pool, grounded on `spec.md` §4.5's opcode
//! table and on the calling convention pinned down by
//! `original_source/src/vm.c`.
//!
//! All multi-byte operands are big-endian. `CONST`/`STR`/`GET_GLOBAL`/
//! `SET_GLOBAL`/`DEEPGET`/`DEEPSET`/`GETATTR`/`SETATTR` take a `u32`
//! pool or frame index; `JZ`/`JMP` take an `i16` offset relative to the
//! byte just past the operand; `FUNC`/`INVOKE`/`STRUCT`/`STRUCT_INIT`/
//! `STRUCT_INIT_FINALIZE`/`PROP` take one or more `u8` operands, same as
//! the original's hand-rolled encoding.
//!
//! Locals only exist inside a function body: a `let` at top level (or
//! inside a bare `if`/`while`/`for` body outside any `fn`) compiles to
//! `GET_GLOBAL`/`SET_GLOBAL`; a `let` anywhere within a function body
//! (including nested blocks) gets a frame-relative slot and compiles to
//! `DEEPGET`/`DEEPSET`. This is the natural reading of `Block`'s `depth`
//! field and mirrors how the `clox`-lineage of bytecode VMs (which this
//! one descends from) splits locals from globals at function boundaries.

use crate::ast::{
    BinOp, Block, Expr, ExprKind, Literal, LogicalOp, Program, Stmt, StmtKind, UnOp,
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("'{construct}' is not yet supported")]
    NotYetSupported { construct: &'static str },
    #[error("struct '{name}' expects {expected} field(s), got {found}")]
    StructFieldCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("too many constants in one chunk")]
    TooManyConstants,
    #[error("function body too large to jump over (location {location} does not fit in a byte)")]
    LocationOverflow { location: usize },
    #[error("jump offset {offset} does not fit in 16 bits")]
    JumpTooFar { offset: i64 },
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Const = 0,
    Str,
    True,
    Null,
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Eq,
    Neg,
    Not,
    GetGlobal,
    SetGlobal,
    DeepGet,
    DeepSet,
    GetAttr,
    SetAttr,
    Jz,
    Jmp,
    Struct,
    StructInit,
    StructInitFinalize,
    Prop,
    IncFpCount,
    Func,
    Invoke,
    Ret,
    Print,
}

impl Op {
    pub fn from_byte(byte: u8) -> Option<Op> {
        use Op::*;
        const TABLE: &[Op] = &[
            Const,
            Str,
            True,
            Null,
            Pop,
            Add,
            Sub,
            Mul,
            Div,
            Mod,
            Gt,
            Lt,
            Eq,
            Neg,
            Not,
            GetGlobal,
            SetGlobal,
            DeepGet,
            DeepSet,
            GetAttr,
            SetAttr,
            Jz,
            Jmp,
            Struct,
            StructInit,
            StructInitFinalize,
            Prop,
            IncFpCount,
            Func,
            Invoke,
            Ret,
            Print,
        ];
        TABLE.get(byte as usize).copied()
    }
}

/// A compiled program: linear bytecode plus its two constant pools.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub cp: Vec<f64>,
    pub sp: Vec<String>,
}

impl Chunk {
    fn write_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    fn write_op(&mut self, op: Op) {
        self.write_u8(op as u8);
    }

    fn write_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    fn write_i16_placeholder(&mut self) -> usize {
        let at = self.code.len();
        self.code.extend_from_slice(&[0, 0]);
        at
    }

    fn patch_i16(&mut self, at: usize, value: i16) {
        let bytes = value.to_be_bytes();
        self.code[at] = bytes[0];
        self.code[at + 1] = bytes[1];
    }

    fn offset(&self) -> usize {
        self.code.len()
    }
}

/// Local-variable tracking for the function currently being compiled.
/// Slots are positions in the frame, starting at 0 for the first
/// parameter; `locals[i]` is the name bound to slot `i`.
struct Locals {
    names: Vec<String>,
}

impl Locals {
    fn new() -> Locals {
        Locals { names: Vec::new() }
    }

    fn declare(&mut self, name: String) -> u32 {
        let slot = self.names.len() as u32;
        self.names.push(name);
        slot
    }

    fn resolve(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .rposition(|n| n == name)
            .map(|i| i as u32)
    }
}

/// Pending `break`/`continue` jump sites for one loop, keyed by the
/// loop's label from the labeling pass so patch lists line up 1:1 with
/// loop labels the way `spec.md` §4.5 describes.
struct LoopCtx {
    label: String,
    break_patches: Vec<usize>,
    /// `continue` jump sites, patched once the loop knows where its
    /// "next iteration" point is (the condition re-check for `while`,
    /// the advance clause for `for` — `for (;;i+=1) { continue; }`
    /// must still run the advance clause before looping).
    continue_patches: Vec<usize>,
}

struct Compiler {
    chunk: Chunk,
    num_index: HashMap<u64, u32>,
    str_index: HashMap<String, u32>,
    blueprints: HashMap<String, Vec<String>>,
    locals: Option<Locals>,
    loops: Vec<LoopCtx>,
}

impl Compiler {
    fn new() -> Compiler {
        Compiler {
            chunk: Chunk::default(),
            num_index: HashMap::new(),
            str_index: HashMap::new(),
            blueprints: HashMap::new(),
            locals: None,
            loops: Vec::new(),
        }
    }

    fn number_index(&mut self, n: f64) -> Result<u32, Error> {
        let bits = n.to_bits();
        if let Some(&idx) = self.num_index.get(&bits) {
            return Ok(idx);
        }
        let idx = self.chunk.cp.len() as u32;
        self.chunk.cp.push(n);
        self.num_index.insert(bits, idx);
        Ok(idx)
    }

    fn string_index(&mut self, s: &str) -> Result<u32, Error> {
        if let Some(&idx) = self.str_index.get(s) {
            return Ok(idx);
        }
        let idx = self.chunk.sp.len() as u32;
        self.chunk.sp.push(s.to_string());
        self.str_index.insert(s.to_string(), idx);
        Ok(idx)
    }

    // ---- statements ----

    fn compile_program(&mut self, program: &Program) -> Result<(), Error> {
        for stmt in &program.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                self.compile_expr(value)?;
                self.compile_binding(name)?;
            }
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                self.chunk.write_op(Op::Pop);
            }
            StmtKind::Print(expr) => {
                self.compile_expr(expr)?;
                self.chunk.write_op(Op::Print);
            }
            StmtKind::Block(block) => self.compile_block(block)?,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.compile_if(cond, then_branch, else_branch.as_deref())?,
            StmtKind::While { cond, body, label } => self.compile_while(cond, body, label)?,
            StmtKind::For {
                init,
                cond,
                advance,
                body,
                label,
            } => self.compile_for(init.as_deref(), cond.as_deref(), advance.as_deref(), body, label)?,
            StmtKind::Break { label } => self.compile_break(label)?,
            StmtKind::Continue { label } => self.compile_continue(label)?,
            StmtKind::Fn { name, params, body } => self.compile_fn(name, params, body)?,
            StmtKind::Return { value } => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => self.chunk.write_op(Op::Null),
                }
                self.chunk.write_op(Op::Ret);
            }
            StmtKind::Struct { name, properties } => self.compile_struct(name, properties)?,
            StmtKind::DoWhile { .. } => {
                return Err(Error::NotYetSupported {
                    construct: "do-while",
                })
            }
            StmtKind::Goto { .. } => {
                return Err(Error::NotYetSupported { construct: "goto" })
            }
            StmtKind::Labeled { .. } => {
                return Err(Error::NotYetSupported {
                    construct: "labeled statement",
                })
            }
            StmtKind::Decorator { .. } => {
                return Err(Error::NotYetSupported { construct: "decorator" })
            }
            StmtKind::Impl { .. } => {
                return Err(Error::NotYetSupported { construct: "impl" })
            }
            StmtKind::Use { .. } => return Err(Error::NotYetSupported { construct: "use" }),
            StmtKind::Yield { .. } => {
                return Err(Error::NotYetSupported { construct: "yield" })
            }
            StmtKind::Assert { .. } => {
                return Err(Error::NotYetSupported { construct: "assert" })
            }
        }
        Ok(())
    }

    /// Binds the value already sitting on top of the stack to `name` as
    /// a `let` statement: a new local slot inside a function body (the
    /// value stays in its slot, which *is* the stack cell), a global
    /// otherwise. Unlike [`Compiler::compile_assign`], this is a
    /// statement: it leaves the stack exactly as it found it, so no
    /// trailing `Pop` is needed by the caller for the local case, and
    /// one is emitted here for the global case since `SET_GLOBAL`
    /// itself does not consume its operand (see `compile_assign`).
    fn compile_binding(&mut self, name: &str) -> Result<(), Error> {
        if let Some(locals) = &mut self.locals {
            locals.declare(name.to_string());
        } else {
            let idx = self.string_index(name)?;
            self.chunk.write_op(Op::SetGlobal);
            self.chunk.write_u32(idx);
            self.chunk.write_op(Op::Pop);
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), Error> {
        let locals_mark = self.locals.as_ref().map(|l| l.names.len());
        for stmt in &block.stmts {
            self.compile_stmt(stmt)?;
        }
        if let (Some(mark), Some(locals)) = (locals_mark, &mut self.locals) {
            let declared = locals.names.len() - mark;
            locals.names.truncate(mark);
            for _ in 0..declared {
                self.chunk.write_op(Op::Pop);
            }
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), Error> {
        self.compile_expr(cond)?;
        self.chunk.write_op(Op::Jz);
        let jz_at = self.chunk.write_i16_placeholder();
        self.compile_stmt(then_branch)?;
        self.chunk.write_op(Op::Jmp);
        let jmp_at = self.chunk.write_i16_placeholder();
        let else_start = self.chunk.offset();
        self.patch_jump(jz_at, else_start)?;
        if let Some(else_branch) = else_branch {
            self.compile_stmt(else_branch)?;
        }
        let end = self.chunk.offset();
        self.patch_jump(jmp_at, end)?;
        Ok(())
    }

    fn patch_jump(&mut self, operand_at: usize, target: usize) -> Result<(), Error> {
        let from = operand_at + 2;
        let offset = target as i64 - from as i64;
        if offset < i16::MIN as i64 || offset > i16::MAX as i64 {
            return Err(Error::JumpTooFar { offset });
        }
        self.chunk.patch_i16(operand_at, offset as i16);
        Ok(())
    }

    fn compile_while(&mut self, cond: &Expr, body: &Stmt, label: &str) -> Result<(), Error> {
        let loop_start = self.chunk.offset();
        self.compile_expr(cond)?;
        self.chunk.write_op(Op::Jz);
        let jz_at = self.chunk.write_i16_placeholder();
        self.loops.push(LoopCtx {
            label: label.to_string(),
            break_patches: Vec::new(),
            continue_patches: Vec::new(),
        });
        self.compile_stmt(body)?;
        self.chunk.write_op(Op::Jmp);
        let back_at = self.chunk.write_i16_placeholder();
        self.patch_jump(back_at, loop_start)?;
        let end = self.chunk.offset();
        self.patch_jump(jz_at, end)?;
        let ctx = self.loops.pop().expect("pushed above");
        for patch in ctx.continue_patches {
            self.patch_jump(patch, loop_start)?;
        }
        for patch in ctx.break_patches {
            self.patch_jump(patch, end)?;
        }
        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&Expr>,
        cond: Option<&Expr>,
        advance: Option<&Expr>,
        body: &Stmt,
        label: &str,
    ) -> Result<(), Error> {
        if let Some(init) = init {
            self.compile_expr(init)?;
            self.chunk.write_op(Op::Pop);
        }
        let loop_start = self.chunk.offset();
        let jz_at = if let Some(cond) = cond {
            self.compile_expr(cond)?;
            self.chunk.write_op(Op::Jz);
            Some(self.chunk.write_i16_placeholder())
        } else {
            None
        };
        self.loops.push(LoopCtx {
            label: label.to_string(),
            break_patches: Vec::new(),
            continue_patches: Vec::new(),
        });
        self.compile_stmt(body)?;
        let advance_start = self.chunk.offset();
        if let Some(advance) = advance {
            self.compile_expr(advance)?;
            self.chunk.write_op(Op::Pop);
        }
        self.chunk.write_op(Op::Jmp);
        let back_at = self.chunk.write_i16_placeholder();
        self.patch_jump(back_at, loop_start)?;
        let end = self.chunk.offset();
        if let Some(jz_at) = jz_at {
            self.patch_jump(jz_at, end)?;
        }
        let ctx = self.loops.pop().expect("pushed above");
        for patch in ctx.continue_patches {
            self.patch_jump(patch, advance_start)?;
        }
        for patch in ctx.break_patches {
            self.patch_jump(patch, end)?;
        }
        Ok(())
    }

    fn find_loop(&self, label: &str) -> Option<usize> {
        self.loops.iter().rposition(|l| l.label == label)
    }

    fn compile_break(&mut self, label: &str) -> Result<(), Error> {
        self.chunk.write_op(Op::Jmp);
        let at = self.chunk.write_i16_placeholder();
        let idx = self
            .find_loop(label)
            .expect("labeling pass guarantees a matching enclosing loop");
        self.loops[idx].break_patches.push(at);
        Ok(())
    }

    fn compile_continue(&mut self, label: &str) -> Result<(), Error> {
        self.chunk.write_op(Op::Jmp);
        let at = self.chunk.write_i16_placeholder();
        let idx = self
            .find_loop(label)
            .expect("labeling pass guarantees a matching enclosing loop");
        self.loops[idx].continue_patches.push(at);
        Ok(())
    }

    fn compile_fn(&mut self, name: &str, params: &[String], body: &Block) -> Result<(), Error> {
        self.chunk.write_op(Op::Jmp);
        let skip_at = self.chunk.write_i16_placeholder();
        let location = self.chunk.offset();
        if location > u8::MAX as usize {
            return Err(Error::LocationOverflow { location });
        }

        let previous_locals = self.locals.replace(Locals::new());
        {
            let locals = self.locals.as_mut().expect("just set");
            for param in params {
                locals.declare(param.clone());
            }
        }
        for stmt in &body.stmts {
            self.compile_stmt(stmt)?;
        }
        // Implicit `return null;` if control falls off the end.
        self.chunk.write_op(Op::Null);
        self.chunk.write_op(Op::Ret);
        self.locals = previous_locals;

        let end = self.chunk.offset();
        self.patch_jump(skip_at, end)?;

        let name_idx = self.string_index(name)?;
        self.chunk.write_op(Op::Func);
        self.chunk.write_u8(name_idx as u8);
        self.chunk.write_u8(params.len() as u8);
        self.chunk.write_u8(location as u8);
        Ok(())
    }

    fn compile_struct(&mut self, name: &str, properties: &[String]) -> Result<(), Error> {
        self.blueprints
            .insert(name.to_string(), properties.to_vec());
        let name_idx = self.string_index(name)?;
        let mut prop_indices = Vec::with_capacity(properties.len());
        for prop in properties {
            prop_indices.push(self.string_index(prop)?);
        }
        self.chunk.write_op(Op::Struct);
        self.chunk.write_u8(name_idx as u8);
        self.chunk.write_u8(properties.len() as u8);
        for idx in prop_indices {
            self.chunk.write_u8(idx as u8);
        }
        Ok(())
    }

    // ---- expressions ----

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.compile_literal(lit)?,
            ExprKind::Variable(name) => self.compile_variable_read(name)?,
            ExprKind::Unary { op, operand } => {
                self.compile_expr(operand)?;
                self.chunk.write_op(match op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                });
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.compile_binop(*op);
            }
            ExprKind::Logical { op, lhs, rhs } => self.compile_logical(*op, lhs, rhs)?,
            ExprKind::Assign { target, value } => self.compile_assign(target, value)?,
            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let name_idx = self.string_index(callee)?;
                self.chunk.write_op(Op::Invoke);
                self.chunk.write_u8(name_idx as u8);
                self.chunk.write_u8(args.len() as u8);
            }
            ExprKind::Get { object, name } => {
                self.compile_expr(object)?;
                let idx = self.string_index(name)?;
                self.chunk.write_op(Op::GetAttr);
                self.chunk.write_u32(idx);
            }
            ExprKind::StructLiteral { name, fields } => {
                self.compile_struct_literal(name, fields)?
            }
            ExprKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                self.compile_expr(cond)?;
                self.chunk.write_op(Op::Jz);
                let jz_at = self.chunk.write_i16_placeholder();
                self.compile_expr(then_branch)?;
                self.chunk.write_op(Op::Jmp);
                let jmp_at = self.chunk.write_i16_placeholder();
                let else_start = self.chunk.offset();
                self.patch_jump(jz_at, else_start)?;
                self.compile_expr(else_branch)?;
                let end = self.chunk.offset();
                self.patch_jump(jmp_at, end)?;
            }
            ExprKind::ArrayLiteral(_) => {
                return Err(Error::NotYetSupported {
                    construct: "array literal",
                })
            }
            ExprKind::Subscript { .. } => {
                return Err(Error::NotYetSupported { construct: "subscript" })
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, lit: &Literal) -> Result<(), Error> {
        match lit {
            Literal::Number(n) => {
                let idx = self.number_index(*n)?;
                self.chunk.write_op(Op::Const);
                self.chunk.write_u32(idx);
            }
            Literal::String(s) => {
                let idx = self.string_index(s)?;
                self.chunk.write_op(Op::Str);
                self.chunk.write_u32(idx);
            }
            Literal::Bool(true) => self.chunk.write_op(Op::True),
            Literal::Bool(false) => {
                // No dedicated FALSE opcode in the spec's instruction
                // set; `true` folded through NOT is the idiom it
                // implies (see the `Not` opcode's role as the sole
                // boolean-producing unary besides literal `true`).
                self.chunk.write_op(Op::True);
                self.chunk.write_op(Op::Not);
            }
            Literal::Null => self.chunk.write_op(Op::Null),
        }
        Ok(())
    }

    fn compile_variable_read(&mut self, name: &str) -> Result<(), Error> {
        if let Some(locals) = &self.locals {
            if let Some(slot) = locals.resolve(name) {
                self.chunk.write_op(Op::DeepGet);
                self.chunk.write_u32(slot);
                return Ok(());
            }
        }
        let idx = self.string_index(name)?;
        self.chunk.write_op(Op::GetGlobal);
        self.chunk.write_u32(idx);
        Ok(())
    }

    fn compile_binop(&mut self, op: BinOp) {
        match op {
            BinOp::Add => self.chunk.write_op(Op::Add),
            BinOp::Sub => self.chunk.write_op(Op::Sub),
            BinOp::Mul => self.chunk.write_op(Op::Mul),
            BinOp::Div => self.chunk.write_op(Op::Div),
            BinOp::Mod => self.chunk.write_op(Op::Mod),
            BinOp::Gt => self.chunk.write_op(Op::Gt),
            BinOp::Lt => self.chunk.write_op(Op::Lt),
            BinOp::Eq => self.chunk.write_op(Op::Eq),
            // `>=`/`<=`/`!=` have no dedicated opcode: compile as the
            // complement of the opposite strict comparison.
            BinOp::Ge => {
                self.chunk.write_op(Op::Lt);
                self.chunk.write_op(Op::Not);
            }
            BinOp::Le => {
                self.chunk.write_op(Op::Gt);
                self.chunk.write_op(Op::Not);
            }
            BinOp::Neq => {
                self.chunk.write_op(Op::Eq);
                self.chunk.write_op(Op::Not);
            }
        }
    }

    fn compile_logical(&mut self, op: LogicalOp, lhs: &Expr, rhs: &Expr) -> Result<(), Error> {
        // `JZ` pops its operand (spec §4.5), so neither branch can rely
        // on the condition value surviving the jump: each path must
        // push its own single result. There's no dedicated FALSE
        // opcode, so "push false" is `TRUE; NOT` (same idiom as a
        // folded `false` literal, see `compile_literal`), and "coerce
        // to bool" is a double `NOT` (`!!x`).
        match op {
            LogicalOp::And => {
                // lhs falsy -> result false; lhs truthy -> result is
                // rhs's truthiness.
                self.compile_expr(lhs)?;
                self.chunk.write_op(Op::Jz);
                let to_false = self.chunk.write_i16_placeholder();
                self.compile_expr(rhs)?;
                self.chunk.write_op(Op::Not);
                self.chunk.write_op(Op::Not);
                self.chunk.write_op(Op::Jmp);
                let end_jump = self.chunk.write_i16_placeholder();
                let false_branch = self.chunk.offset();
                self.patch_jump(to_false, false_branch)?;
                self.chunk.write_op(Op::True);
                self.chunk.write_op(Op::Not);
                let end = self.chunk.offset();
                self.patch_jump(end_jump, end)?;
            }
            LogicalOp::Or => {
                // lhs truthy -> result true; lhs falsy -> result is
                // rhs's truthiness.
                self.compile_expr(lhs)?;
                self.chunk.write_op(Op::Not);
                self.chunk.write_op(Op::Jz);
                let to_true = self.chunk.write_i16_placeholder();
                self.compile_expr(rhs)?;
                self.chunk.write_op(Op::Not);
                self.chunk.write_op(Op::Not);
                self.chunk.write_op(Op::Jmp);
                let end_jump = self.chunk.write_i16_placeholder();
                let true_branch = self.chunk.offset();
                self.patch_jump(to_true, true_branch)?;
                self.chunk.write_op(Op::True);
                let end = self.chunk.offset();
                self.patch_jump(end_jump, end)?;
            }
        }
        Ok(())
    }

    /// Compiles an assignment expression. `SET_GLOBAL`/`DEEPSET`/
    /// `SETATTR` all *peek* rather than pop — they store the top of the
    /// stack into the target without consuming it — so an assignment's
    /// own value is left behind for whatever compiled it as a
    /// subexpression (e.g. `print x = 1;`). Statement-position
    /// assignments drop that value via the ordinary `Expr` statement's
    /// trailing `Pop` in `compile_stmt`.
    fn compile_assign(&mut self, target: &Expr, value: &Expr) -> Result<(), Error> {
        match &target.kind {
            ExprKind::Variable(name) => {
                self.compile_expr(value)?;
                if let Some(locals) = &self.locals {
                    if let Some(slot) = locals.resolve(name) {
                        self.chunk.write_op(Op::DeepSet);
                        self.chunk.write_u32(slot);
                        return Ok(());
                    }
                }
                let idx = self.string_index(name)?;
                self.chunk.write_op(Op::SetGlobal);
                self.chunk.write_u32(idx);
                Ok(())
            }
            ExprKind::Get { object, name } => {
                self.compile_expr(object)?;
                self.compile_expr(value)?;
                let idx = self.string_index(name)?;
                self.chunk.write_op(Op::SetAttr);
                self.chunk.write_u32(idx);
                Ok(())
            }
            _ => Err(Error::NotYetSupported {
                construct: "assignment to this kind of expression",
            }),
        }
    }

    fn compile_struct_literal(
        &mut self,
        name: &str,
        fields: &[crate::ast::StructFieldInit],
    ) -> Result<(), Error> {
        if let Some(expected) = self.blueprints.get(name) {
            if expected.len() != fields.len() {
                return Err(Error::StructFieldCountMismatch {
                    name: name.to_string(),
                    expected: expected.len(),
                    found: fields.len(),
                });
            }
        }
        let name_idx = self.string_index(name)?;
        self.chunk.write_op(Op::StructInit);
        self.chunk.write_u8(name_idx as u8);
        self.chunk.write_u8(fields.len() as u8);
        for field in fields {
            self.compile_expr(&field.value)?;
            let prop_idx = self.string_index(&field.name)?;
            self.chunk.write_op(Op::Prop);
            self.chunk.write_u8(prop_idx as u8);
        }
        self.chunk.write_op(Op::StructInitFinalize);
        self.chunk.write_u8(fields.len() as u8);
        Ok(())
    }
}

/// Compiles a labeled (and optionally optimized) [`Program`] into a
/// [`Chunk`].
pub fn compile(program: &Program) -> Result<Chunk, Error> {
    let mut compiler = Compiler::new();
    compiler.compile_program(program)?;
    log::trace!(
        "compiled {} bytes, {} number constant(s), {} string constant(s)",
        compiler.chunk.code.len(),
        compiler.chunk.cp.len(),
        compiler.chunk.sp.len()
    );
    Ok(compiler.chunk)
}

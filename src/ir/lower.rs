//! AST to IR lowering
//!
//! Lowers the AST to SSA form in two passes over the translation unit:
//! pass 1 installs every function signature so forward references and
//! mutual recursion resolve, pass 2 emits function bodies and global
//! variables. Short-circuit logical operators are materialised as control
//! flow with a join phi; `&&`/`||` never become bitwise instructions.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    self, BinaryOp, Decl, Expr, ExprKind, FunctionDecl, Stmt, StmtKind, TranslationUnit, UnaryOp,
    VarDecl,
};

use super::builder::IrBuilder;
use super::instr::CmpOp;
use super::types::{BlockId, IrType, Module, VReg};
use super::verify::{verify_module, VerifyError};
use thiserror::Error;

/// IR generation errors
#[derive(Error, Debug)]
pub enum IrError {
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },

    #[error("invalid assignment target")]
    InvalidAssignTarget,

    #[error("cannot dereference a non-pointer value")]
    InvalidDereference,

    #[error("break outside of a loop")]
    BreakOutsideLoop,

    #[error("continue outside of a loop")]
    ContinueOutsideLoop,

    #[error("called object is not a function name")]
    CalleeNotIdentifier,

    #[error("call to unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("conditional expression arms have mismatched types")]
    TernaryTypeMismatch,

    #[error("no signature recorded for function '{name}'")]
    MissingSignature { name: String },

    #[error("unsupported expression: {what}")]
    UnsupportedExpr { what: &'static str },

    #[error("module verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("internal lowering error: {what}")]
    Internal { what: &'static str },
}

/// A function signature recorded in pass 1.
#[derive(Debug, Clone)]
struct FnSig {
    params: Vec<IrType>,
    ret: IrType,
    /// Pointer depth of the return value
    ret_depth: u32,
    /// Pointer depth of each parameter
    param_depths: Vec<u32>,
}

/// How a name in scope maps to IR.
#[derive(Debug, Clone)]
enum VarBinding {
    /// A stack slot plus the type stored in it
    Slot { slot: VReg, ty: IrType },
    /// A value used directly (function parameters)
    Value(VReg),
}

/// Targets for break/continue in the innermost loop.
#[derive(Debug, Clone, Copy)]
struct LoopFrame {
    continue_block: BlockId,
    break_block: BlockId,
}

/// Lowers the AST to IR.
pub struct IrGenerator {
    builder: IrBuilder,
    /// Function signatures from pass 1, in source order
    fn_sigs: HashMap<String, FnSig>,
    fn_order: Vec<String>,
    defined_fns: HashSet<String>,
    /// Names of lowered global variables
    globals: HashSet<String>,
    /// Per-function: name -> binding
    vars: HashMap<String, VarBinding>,
    /// Per-function: name -> declared pointer depth
    var_depths: HashMap<String, u32>,
    /// Types of SSA values
    vreg_types: HashMap<VReg, IrType>,
    /// Pointer depths of SSA values
    vreg_depths: HashMap<VReg, u32>,
    /// Stack of loop contexts for break/continue
    loop_stack: Vec<LoopFrame>,
    /// Return type of the function currently being emitted
    current_ret: IrType,
}

impl IrGenerator {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            builder: IrBuilder::new(module_name),
            fn_sigs: HashMap::new(),
            fn_order: Vec::new(),
            defined_fns: HashSet::new(),
            globals: HashSet::new(),
            vars: HashMap::new(),
            var_depths: HashMap::new(),
            vreg_types: HashMap::new(),
            vreg_depths: HashMap::new(),
            loop_stack: Vec::new(),
            current_ret: IrType::Void,
        }
    }

    /// Lower a translation unit to a verified module.
    pub fn lower_translation_unit(mut self, tu: &TranslationUnit) -> Result<Module, IrError> {
        // Pass 1: install every function signature so forward references
        // and mutual recursion are valid.
        for decl in &tu.decls {
            if let Decl::Function(func) = decl {
                self.register_signature(func);
            }
        }

        // Pass 2: emit bodies and global definitions.
        for decl in &tu.decls {
            match decl {
                Decl::Function(func) if func.is_definition() => self.emit_function(func)?,
                Decl::Function(_) => {}
                Decl::Var(var) => self.emit_global(var),
            }
        }

        // Signatures that never got a body become declarations.
        for name in &self.fn_order {
            if self.defined_fns.contains(name) {
                continue;
            }
            let sig = &self.fn_sigs[name];
            self.builder
                .declare_function(name.clone(), sig.params.clone(), sig.ret.clone());
        }

        let module = self.builder.finish();
        verify_module(&module)?;
        Ok(module)
    }

    fn register_signature(&mut self, func: &FunctionDecl) {
        let sig = FnSig {
            params: func.params.iter().map(|p| map_type(&p.ty)).collect(),
            ret: map_type(&func.return_type),
            ret_depth: ast::pointer_depth(&func.return_type),
            param_depths: func.params.iter().map(|p| ast::pointer_depth(&p.ty)).collect(),
        };
        // A definition wins over an earlier prototype
        if func.is_definition() || !self.fn_sigs.contains_key(&func.name) {
            if !self.fn_sigs.contains_key(&func.name) {
                self.fn_order.push(func.name.clone());
            }
            self.fn_sigs.insert(func.name.clone(), sig);
        }
    }

    // ============ Declarations ============

    fn emit_function(&mut self, func: &FunctionDecl) -> Result<(), IrError> {
        let sig = self
            .fn_sigs
            .get(&func.name)
            .cloned()
            .ok_or(IrError::MissingSignature {
                name: func.name.clone(),
            })?;

        let param_vregs =
            self.builder
                .start_function(func.name.as_str(), sig.params.clone(), sig.ret.clone());
        self.defined_fns.insert(func.name.clone());

        // Clear per-function state
        self.vars.clear();
        self.var_depths.clear();
        self.loop_stack.clear();
        self.current_ret = sig.ret.clone();

        // Parameters are used directly, not slot-allocated
        for ((param, vreg), depth) in func
            .params
            .iter()
            .zip(param_vregs.iter())
            .zip(sig.param_depths.iter())
        {
            let ty = map_type(&param.ty);
            self.set_type(*vreg, ty);
            self.set_depth(*vreg, *depth);
            if !param.name.is_empty() {
                self.vars.insert(param.name.clone(), VarBinding::Value(*vreg));
                self.var_depths.insert(param.name.clone(), *depth);
            }
        }

        if let Some(body) = &func.body {
            self.lower_stmt(body)?;
        }

        // Finalise: every path must end in a return
        if !self.builder.has_terminator() {
            if self.current_ret == IrType::Void {
                self.builder.ret(None);
            } else {
                let zero = self.zero_value(&sig.ret);
                self.builder.ret(Some(zero));
            }
        }

        self.builder.finish_function();
        Ok(())
    }

    /// Global variables take constant initializers only: an integer literal
    /// becomes the declared constant, anything else becomes the zero value.
    fn emit_global(&mut self, var: &VarDecl) {
        let ty = map_type(&var.ty);
        let init = match &var.init {
            Some(Expr {
                kind: ExprKind::IntLiteral(v),
                ..
            }) => super::types::Constant::Int(*v),
            _ if ty.is_float() => super::types::Constant::Float(0.0),
            _ => super::types::Constant::Int(0),
        };
        self.globals.insert(var.name.clone());
        self.builder.add_global(var.name.clone(), ty, init, false);
    }

    /// Local variables get a stack slot typed by the declared type; the
    /// declared pointer depth is recorded for dereference typing.
    fn lower_var_decl(&mut self, var: &VarDecl) -> Result<(), IrError> {
        let ty = map_type(&var.ty);
        let depth = ast::pointer_depth(&var.ty);
        let slot = self.builder.alloca(ty.clone());
        self.set_type(slot, IrType::Ptr);
        self.set_depth(slot, depth + 1);

        self.vars
            .insert(var.name.clone(), VarBinding::Slot { slot, ty });
        self.var_depths.insert(var.name.clone(), depth);

        if let Some(init) = &var.init {
            let value = self.lower_expr(init)?;
            self.builder.store(slot, value);
        }
        Ok(())
    }

    // ============ Statements ============

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), IrError> {
        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                for stmt in stmts {
                    // statements after a terminator are unreachable
                    if self.builder.has_terminator() {
                        break;
                    }
                    self.lower_stmt(stmt)?;
                }
                Ok(())
            }

            StmtKind::Expr(expr) => {
                if let Some(expr) = expr {
                    self.lower_expr(expr)?;
                }
                Ok(())
            }

            StmtKind::Return(expr) => {
                match expr {
                    Some(expr) => {
                        let value = self.lower_expr(expr)?;
                        self.builder.ret(Some(value));
                    }
                    None => self.builder.ret(None),
                }
                Ok(())
            }

            StmtKind::VarDecl(var) => self.lower_var_decl(var),

            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.lower_if(cond, then_stmt, else_stmt.as_deref()),

            StmtKind::While { cond, body } => self.lower_while(cond, body),

            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.lower_for(init.as_deref(), cond.as_ref(), step.as_ref(), body),

            StmtKind::Break => {
                let frame = self.loop_stack.last().ok_or(IrError::BreakOutsideLoop)?;
                self.builder.br(frame.break_block);
                Ok(())
            }

            StmtKind::Continue => {
                let frame = self
                    .loop_stack
                    .last()
                    .ok_or(IrError::ContinueOutsideLoop)?;
                self.builder.br(frame.continue_block);
                Ok(())
            }
        }
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_stmt: &Stmt,
        else_stmt: Option<&Stmt>,
    ) -> Result<(), IrError> {
        let cond_value = self.lower_expr(cond)?;
        let cond_bool = self.bool_norm(cond_value);

        let then_block = self.builder.create_block();
        let else_block = else_stmt.map(|_| self.builder.create_block());
        let merge_block = self.builder.create_block();

        self.builder
            .cond_br(cond_bool, then_block, else_block.unwrap_or(merge_block));

        self.builder.start_block(then_block);
        self.lower_stmt(then_stmt)?;
        if !self.builder.has_terminator() {
            self.builder.br(merge_block);
        }

        if let (Some(else_block), Some(else_stmt)) = (else_block, else_stmt) {
            self.builder.start_block(else_block);
            self.lower_stmt(else_stmt)?;
            if !self.builder.has_terminator() {
                self.builder.br(merge_block);
            }
        }

        self.builder.start_block(merge_block);
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<(), IrError> {
        let loop_block = self.builder.create_block();
        let body_block = self.builder.create_block();
        let after_block = self.builder.create_block();

        self.loop_stack.push(LoopFrame {
            continue_block: loop_block,
            break_block: after_block,
        });

        self.builder.br(loop_block);

        self.builder.start_block(loop_block);
        let cond_value = self.lower_expr(cond)?;
        let cond_bool = self.bool_norm(cond_value);
        self.builder.cond_br(cond_bool, body_block, after_block);

        self.builder.start_block(body_block);
        self.lower_stmt(body)?;
        if !self.builder.has_terminator() {
            self.builder.br(loop_block);
        }

        self.loop_stack.pop();
        self.builder.start_block(after_block);
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> Result<(), IrError> {
        let loop_block = self.builder.create_block();
        let body_block = self.builder.create_block();
        let inc_block = self.builder.create_block();
        let end_block = self.builder.create_block();

        self.loop_stack.push(LoopFrame {
            continue_block: inc_block,
            break_block: end_block,
        });

        // The init statement runs outside the loop
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }
        self.builder.br(loop_block);

        self.builder.start_block(loop_block);
        match cond {
            Some(cond) => {
                let value = self.lower_expr(cond)?;
                let cond_bool = self.bool_norm(value);
                self.builder.cond_br(cond_bool, body_block, end_block);
            }
            None => self.builder.br(body_block),
        }

        self.builder.start_block(body_block);
        self.lower_stmt(body)?;
        if !self.builder.has_terminator() {
            self.builder.br(inc_block);
        }

        self.builder.start_block(inc_block);
        if let Some(step) = step {
            self.lower_expr(step)?;
        }
        self.builder.br(loop_block);

        self.loop_stack.pop();
        self.builder.start_block(end_block);
        Ok(())
    }

    // ============ Expressions ============

    fn lower_expr(&mut self, expr: &Expr) -> Result<VReg, IrError> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => {
                let reg = self.builder.const_int(*v);
                self.set_type(reg, IrType::I32);
                Ok(reg)
            }
            ExprKind::FloatLiteral(v) => {
                let reg = self.builder.const_float(*v);
                self.set_type(reg, IrType::F64);
                Ok(reg)
            }
            ExprKind::CharLiteral(v) => {
                let reg = self.builder.const_int(*v as i64);
                self.set_type(reg, IrType::I8);
                Ok(reg)
            }
            ExprKind::StringLiteral(s) => {
                // a global constant byte array; the value is a pointer to
                // its first element
                let name = self.builder.add_string_constant(s);
                let reg = self.builder.global_ref(&name);
                self.set_type(reg, IrType::Ptr);
                self.set_depth(reg, 1);
                Ok(reg)
            }

            ExprKind::Identifier(name) => self.lower_identifier(name),

            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),

            ExprKind::Unary {
                op,
                operand,
                is_prefix,
            } => self.lower_unary(*op, operand, *is_prefix),

            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.lower_conditional(cond, then_expr, else_expr),

            ExprKind::Call { callee, args } => self.lower_call(callee, args),

            ExprKind::ArraySubscript { .. } => Err(IrError::UnsupportedExpr {
                what: "array subscript",
            }),
            ExprKind::Member { .. } => Err(IrError::UnsupportedExpr {
                what: "member access",
            }),
        }
    }

    fn lower_identifier(&mut self, name: &str) -> Result<VReg, IrError> {
        match self.vars.get(name).cloned() {
            Some(VarBinding::Slot { slot, ty }) => {
                let depth = self.var_depths.get(name).copied().unwrap_or(0);
                let reg = self.builder.load(slot, ty.clone());
                self.set_type(reg, ty);
                self.set_depth(reg, depth);
                Ok(reg)
            }
            Some(VarBinding::Value(reg)) => Ok(reg),
            None => {
                if self.globals.contains(name) {
                    let reg = self.builder.global_ref(name);
                    self.set_type(reg, IrType::Ptr);
                    self.set_depth(reg, 1);
                    return Ok(reg);
                }
                // fall back to a function value, usable as a call target
                if self.fn_sigs.contains_key(name) {
                    let reg = self.builder.func_ref(name);
                    self.set_type(reg, IrType::Ptr);
                    return Ok(reg);
                }
                Err(IrError::UnknownIdentifier {
                    name: name.to_string(),
                })
            }
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<VReg, IrError> {
        match op {
            BinaryOp::LogicalAnd => return self.lower_logical_and(lhs, rhs),
            BinaryOp::LogicalOr => return self.lower_logical_or(lhs, rhs),
            BinaryOp::Assign => {
                // the assignment's value is the right-hand side
                let value = self.lower_expr(rhs)?;
                let (addr, _, _) = self.lower_lvalue(lhs)?;
                self.builder.store(addr, value);
                return Ok(value);
            }
            _ => {}
        }

        if let Some(base) = op.compound_base() {
            // load, apply, store back; yields the new value
            let (addr, ty, depth) = self.lower_lvalue(lhs)?;
            let old = self.builder.load(addr, ty.clone());
            self.set_type(old, ty);
            self.set_depth(old, depth);
            let rhs_value = self.lower_expr(rhs)?;
            let new = self.arith(base, old, rhs_value)?;
            self.builder.store(addr, new);
            return Ok(new);
        }

        let lhs_value = self.lower_expr(lhs)?;
        let rhs_value = self.lower_expr(rhs)?;
        self.arith(op, lhs_value, rhs_value)
    }

    /// Non-assigning, non-logical binary operators.
    fn arith(&mut self, op: BinaryOp, lhs: VReg, rhs: VReg) -> Result<VReg, IrError> {
        let reg = match op {
            BinaryOp::Add => self.builder.add(lhs, rhs),
            BinaryOp::Sub => self.builder.sub(lhs, rhs),
            BinaryOp::Mul => self.builder.mul(lhs, rhs),
            BinaryOp::Div => self.builder.sdiv(lhs, rhs),
            BinaryOp::Mod => self.builder.srem(lhs, rhs),
            BinaryOp::BitAnd => self.builder.and(lhs, rhs),
            BinaryOp::BitOr => self.builder.or(lhs, rhs),
            BinaryOp::BitXor => self.builder.xor(lhs, rhs),
            BinaryOp::Shl => self.builder.shl(lhs, rhs),
            BinaryOp::Shr => self.builder.ashr(lhs, rhs),

            BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => {
                let cmp_op = match op {
                    BinaryOp::Lt => CmpOp::Slt,
                    BinaryOp::Gt => CmpOp::Sgt,
                    BinaryOp::Le => CmpOp::Sle,
                    BinaryOp::Ge => CmpOp::Sge,
                    BinaryOp::Eq => CmpOp::Eq,
                    _ => CmpOp::Ne,
                };
                let bit = self.builder.icmp(cmp_op, lhs, rhs);
                self.set_type(bit, IrType::Bool);
                // comparisons have integer type identical to arithmetic
                let reg = self.builder.zext(bit, IrType::I32);
                self.set_type(reg, IrType::I32);
                return Ok(reg);
            }

            BinaryOp::LogicalAnd
            | BinaryOp::LogicalOr
            | BinaryOp::Assign
            | BinaryOp::AddAssign
            | BinaryOp::SubAssign
            | BinaryOp::MulAssign
            | BinaryOp::DivAssign
            | BinaryOp::ModAssign => {
                return Err(IrError::Internal {
                    what: "operator handled before arithmetic dispatch",
                })
            }
        };
        self.set_type(reg, IrType::I32);
        Ok(reg)
    }

    /// `a && b`: control flow with a join phi. The right operand is not
    /// evaluated when the left is false.
    fn lower_logical_and(&mut self, lhs: &Expr, rhs: &Expr) -> Result<VReg, IrError> {
        let lhs_value = self.lower_expr(lhs)?;
        let lhs_bool = self.bool_norm(lhs_value);
        let short_value = self.builder.const_bool(false);
        self.set_type(short_value, IrType::Bool);
        let lhs_exit = self.cur_block()?;

        let rhs_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        self.builder.cond_br(lhs_bool, rhs_block, merge_block);

        self.builder.start_block(rhs_block);
        let rhs_value = self.lower_expr(rhs)?;
        let rhs_bool = self.bool_norm(rhs_value);
        let rhs_exit = self.cur_block()?;
        self.builder.br(merge_block);

        self.builder.start_block(merge_block);
        let phi = self.builder.phi(
            IrType::Bool,
            vec![(rhs_bool, rhs_exit), (short_value, lhs_exit)],
        );
        self.set_type(phi, IrType::Bool);
        let reg = self.builder.zext(phi, IrType::I32);
        self.set_type(reg, IrType::I32);
        Ok(reg)
    }

    /// `a || b`, symmetric with the branches swapped and constant true on
    /// the short-circuit edge.
    fn lower_logical_or(&mut self, lhs: &Expr, rhs: &Expr) -> Result<VReg, IrError> {
        let lhs_value = self.lower_expr(lhs)?;
        let lhs_bool = self.bool_norm(lhs_value);
        let short_value = self.builder.const_bool(true);
        self.set_type(short_value, IrType::Bool);
        let lhs_exit = self.cur_block()?;

        let rhs_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        self.builder.cond_br(lhs_bool, merge_block, rhs_block);

        self.builder.start_block(rhs_block);
        let rhs_value = self.lower_expr(rhs)?;
        let rhs_bool = self.bool_norm(rhs_value);
        let rhs_exit = self.cur_block()?;
        self.builder.br(merge_block);

        self.builder.start_block(merge_block);
        let phi = self.builder.phi(
            IrType::Bool,
            vec![(rhs_bool, rhs_exit), (short_value, lhs_exit)],
        );
        self.set_type(phi, IrType::Bool);
        let reg = self.builder.zext(phi, IrType::I32);
        self.set_type(reg, IrType::I32);
        Ok(reg)
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        is_prefix: bool,
    ) -> Result<VReg, IrError> {
        match op {
            UnaryOp::Plus => self.lower_expr(operand),

            UnaryOp::Minus => {
                let value = self.lower_expr(operand)?;
                let reg = self.builder.neg(value);
                self.set_type(reg, IrType::I32);
                Ok(reg)
            }

            // `!` and `~` share an instruction; they differ only at the
            // source-language level
            UnaryOp::Not | UnaryOp::BitNot => {
                let value = self.lower_expr(operand)?;
                let reg = self.builder.not(value);
                self.set_type(reg, IrType::I32);
                Ok(reg)
            }

            UnaryOp::AddressOf => {
                let (addr, _, depth) = self.lower_lvalue(operand)?;
                self.set_type(addr, IrType::Ptr);
                self.set_depth(addr, depth + 1);
                Ok(addr)
            }

            UnaryOp::Dereference => {
                let value = self.lower_expr(operand)?;
                let depth = self.depth_of(value);
                if depth == 0 {
                    return Err(IrError::InvalidDereference);
                }
                let result_depth = depth - 1;
                let ty = if result_depth >= 1 {
                    IrType::Ptr
                } else {
                    IrType::I32
                };
                let reg = self.builder.load(value, ty.clone());
                self.set_type(reg, ty);
                self.set_depth(reg, result_depth);
                Ok(reg)
            }

            UnaryOp::Increment | UnaryOp::Decrement => {
                let (addr, ty, depth) = self.lower_lvalue(operand)?;
                let old = self.builder.load(addr, ty.clone());
                self.set_type(old, ty);
                self.set_depth(old, depth);
                let one = self.builder.const_int(1);
                self.set_type(one, IrType::I32);
                let new = if op == UnaryOp::Increment {
                    self.builder.add(old, one)
                } else {
                    self.builder.sub(old, one)
                };
                self.set_type(new, IrType::I32);
                self.builder.store(addr, new);
                // pre yields the new value, post the old
                Ok(if is_prefix { new } else { old })
            }
        }
    }

    fn lower_conditional(
        &mut self,
        cond: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
    ) -> Result<VReg, IrError> {
        let cond_value = self.lower_expr(cond)?;
        let cond_bool = self.bool_norm(cond_value);

        let then_block = self.builder.create_block();
        let else_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        self.builder.cond_br(cond_bool, then_block, else_block);

        self.builder.start_block(then_block);
        let then_value = self.lower_expr(then_expr)?;
        let then_exit = self.cur_block()?;
        self.builder.br(merge_block);

        self.builder.start_block(else_block);
        let else_value = self.lower_expr(else_expr)?;
        let else_exit = self.cur_block()?;
        self.builder.br(merge_block);

        let then_ty = self.type_of(then_value);
        let else_ty = self.type_of(else_value);
        if then_ty != else_ty {
            return Err(IrError::TernaryTypeMismatch);
        }

        self.builder.start_block(merge_block);
        let phi = self.builder.phi(
            then_ty.clone(),
            vec![(then_value, then_exit), (else_value, else_exit)],
        );
        self.set_type(phi, then_ty);
        let then_depth = self.depth_of(then_value);
        if then_depth == self.depth_of(else_value) {
            self.set_depth(phi, then_depth);
        }
        Ok(phi)
    }

    /// Only an identifier naming a function in the module is a valid
    /// callee; arguments are evaluated left-to-right.
    fn lower_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<VReg, IrError> {
        let ExprKind::Identifier(name) = &callee.kind else {
            return Err(IrError::CalleeNotIdentifier);
        };
        let sig = self
            .fn_sigs
            .get(name)
            .cloned()
            .ok_or_else(|| IrError::UnknownFunction {
                name: name.clone(),
            })?;

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.lower_expr(arg)?);
        }

        if arg_values.len() != sig.params.len() {
            return Err(IrError::ArgumentCountMismatch {
                name: name.clone(),
                expected: sig.params.len(),
                found: arg_values.len(),
            });
        }

        let reg = self.builder.call(name.clone(), arg_values);
        self.set_type(reg, sig.ret.clone());
        self.set_depth(reg, sig.ret_depth);
        Ok(reg)
    }

    // ============ Lvalues ============

    /// Resolve an expression to a storage address. Returns the address,
    /// the type held at that address, and the pointer depth of the value.
    fn lower_lvalue(&mut self, expr: &Expr) -> Result<(VReg, IrType, u32), IrError> {
        match &expr.kind {
            ExprKind::Identifier(name) => match self.vars.get(name).cloned() {
                Some(VarBinding::Slot { slot, ty }) => {
                    let depth = self.var_depths.get(name).copied().unwrap_or(0);
                    Ok((slot, ty, depth))
                }
                Some(VarBinding::Value(_)) => Err(IrError::InvalidAssignTarget),
                None => Err(IrError::UnknownIdentifier {
                    name: name.clone(),
                }),
            },
            ExprKind::Unary {
                op: UnaryOp::Dereference,
                operand,
                ..
            } => {
                // the address is the value of the pointed-to expression
                let value = self.lower_expr(operand)?;
                let depth = self.depth_of(value);
                if depth == 0 {
                    return Err(IrError::InvalidDereference);
                }
                let value_depth = depth - 1;
                let ty = if value_depth >= 1 {
                    IrType::Ptr
                } else {
                    IrType::I32
                };
                Ok((value, ty, value_depth))
            }
            _ => Err(IrError::InvalidAssignTarget),
        }
    }

    // ============ Helpers ============

    /// Normalise a value to 1 bit: values whose width is not already 1 are
    /// compared not-equal against zero.
    fn bool_norm(&mut self, value: VReg) -> VReg {
        if self.type_of(value) == IrType::Bool {
            return value;
        }
        let zero = self.builder.const_int(0);
        self.set_type(zero, IrType::I32);
        let reg = self.builder.icmp(CmpOp::Ne, value, zero);
        self.set_type(reg, IrType::Bool);
        reg
    }

    fn zero_value(&mut self, ty: &IrType) -> VReg {
        let reg = if ty.is_float() {
            self.builder.const_float(0.0)
        } else {
            self.builder.const_int(0)
        };
        self.set_type(reg, ty.clone());
        reg
    }

    fn cur_block(&self) -> Result<BlockId, IrError> {
        self.builder.current_block_id().ok_or(IrError::Internal {
            what: "no current block",
        })
    }

    fn set_type(&mut self, reg: VReg, ty: IrType) {
        self.vreg_types.insert(reg, ty);
    }

    fn type_of(&self, reg: VReg) -> IrType {
        self.vreg_types.get(&reg).cloned().unwrap_or(IrType::I32)
    }

    fn set_depth(&mut self, reg: VReg, depth: u32) {
        self.vreg_depths.insert(reg, depth);
    }

    fn depth_of(&self, reg: VReg) -> u32 {
        self.vreg_depths.get(&reg).copied().unwrap_or(0)
    }
}

/// Map a declared type string to an IR type. A trailing `*` is an opaque
/// pointer regardless of pointee; unknown bases default to i32.
fn map_type(ty: &str) -> IrType {
    if ty.ends_with('*') {
        return IrType::Ptr;
    }
    match ty {
        "int" => IrType::I32,
        "char" => IrType::I8,
        "float" => IrType::F32,
        "double" => IrType::F64,
        "void" => IrType::Void,
        _ => IrType::I32,
    }
}

/// Lower a translation unit to a verified module.
pub fn lower_translation_unit(tu: &TranslationUnit) -> Result<Module, IrError> {
    IrGenerator::new("main").lower_translation_unit(tu)
}

/// Lower a translation unit and render the textual IR document.
pub fn generate_ir(tu: &TranslationUnit) -> Result<String, IrError> {
    let module = lower_translation_unit(tu)?;
    Ok(print_module(&module))
}

/// Print a module in its textual form.
pub fn print_module(module: &Module) -> String {
    let mut output = String::new();
    output.push_str(&format!("module {}\n", module.name));
    output.push_str(&format!("target triple = \"{}\"\n\n", module.target_triple));

    for global in &module.globals {
        output.push_str(&format!(
            "global @{} : {} = {}\n",
            global.name, global.ty, global.init
        ));
    }
    if !module.globals.is_empty() {
        output.push('\n');
    }

    for func in &module.functions {
        if func.is_declaration {
            output.push_str(&format!("declare {} ", func.name));
        } else {
            output.push_str(&format!("define {} ", func.name));
        }

        output.push('(');
        for (i, (vreg, ty)) in func.params.iter().enumerate() {
            if i > 0 {
                output.push_str(", ");
            }
            if func.is_declaration {
                output.push_str(&format!("{}", ty));
            } else {
                output.push_str(&format!("{} {}", ty, vreg));
            }
        }
        output.push_str(&format!(") -> {} ", func.ret_type));

        if func.is_declaration {
            output.push('\n');
            continue;
        }

        output.push_str("{\n");
        for block in &func.blocks {
            output.push_str(&format!("  {}:\n", block.id));
            for instr in &block.instructions {
                output.push_str(&format!("    {}\n", instr));
            }
            if let Some(ref term) = block.terminator {
                output.push_str(&format!("    {}\n", term));
            }
        }
        output.push_str("}\n\n");
    }

    output
}

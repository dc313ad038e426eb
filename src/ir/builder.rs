//! IR builder
//!
//! Helper for constructing IR instructions and basic blocks. The builder
//! owns the module being built and a cursor for the current function and
//! block; terminators are never overwritten, so each block ends up with at
//! most one.

use super::instr::{CmpOp, Instruction, InstrKind, Terminator};
use super::types::{BasicBlock, BlockId, Constant, Function, Global, IrType, Module, VReg};

/// Builder for constructing IR
pub struct IrBuilder {
    /// Next virtual register ID
    next_vreg: u32,
    /// Next block ID
    next_block: u32,
    /// Next string constant ID
    next_string: u32,
    /// Current module being built
    module: Module,
    /// Current function being built
    current_fn: Option<Function>,
    /// Current block being built
    current_block: Option<BasicBlock>,
}

impl IrBuilder {
    /// Create a new IR builder
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            next_vreg: 0,
            next_block: 0,
            next_string: 0,
            module: Module::new(module_name),
            current_fn: None,
            current_block: None,
        }
    }

    /// Finish building and return the module
    pub fn finish(mut self) -> Module {
        self.finish_function();
        self.module
    }

    /// Create a fresh virtual register
    pub fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    /// Create a fresh block ID
    pub fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    // ============ Function building ============

    /// Start building a new function; creates its entry block and returns
    /// the parameter registers.
    pub fn start_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret_type: IrType,
    ) -> Vec<VReg> {
        self.finish_function();

        let param_vregs: Vec<(VReg, IrType)> = params
            .into_iter()
            .map(|ty| (self.fresh_vreg(), ty))
            .collect();
        let vregs: Vec<VReg> = param_vregs.iter().map(|(v, _)| *v).collect();

        self.current_fn = Some(Function::new(name, param_vregs, ret_type));

        let entry = self.fresh_block();
        self.current_block = Some(BasicBlock::new(entry));

        vregs
    }

    /// Finish the current function
    pub fn finish_function(&mut self) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        if let Some(func) = self.current_fn.take() {
            self.module.functions.push(func);
        }
    }

    /// Is the builder positioned inside a function?
    pub fn in_function(&self) -> bool {
        self.current_fn.is_some()
    }

    /// Install a bodyless signature (printed as `declare`)
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret_type: IrType,
    ) {
        let mut func = Function::new(name, vec![], ret_type);
        func.is_declaration = true;
        func.params = params.into_iter().map(|ty| (VReg(0), ty)).collect();
        self.module.functions.push(func);
    }

    // ============ Globals ============

    /// Add a global variable to the module
    pub fn add_global(&mut self, name: impl Into<String>, ty: IrType, init: Constant, is_const: bool) {
        self.module.globals.push(Global {
            name: name.into(),
            ty,
            init,
            is_const,
        });
    }

    /// Materialise a string as a constant global byte array; returns its name
    pub fn add_string_constant(&mut self, value: &str) -> String {
        let name = format!(".str.{}", self.next_string);
        self.next_string += 1;

        self.module.globals.push(Global {
            name: name.clone(),
            ty: IrType::array(IrType::I8, value.len() + 1), // trailing NUL
            init: Constant::Str(value.to_string()),
            is_const: true,
        });

        name
    }

    /// Pointer to a global's storage
    pub fn global_ref(&mut self, name: &str) -> VReg {
        self.emit_with_result(InstrKind::GlobalRef(name.to_string()))
    }

    /// A function used as a value
    pub fn func_ref(&mut self, name: &str) -> VReg {
        self.emit_with_result(InstrKind::FuncRef(name.to_string()))
    }

    // ============ Block building ============

    /// Create a new block and return its ID
    pub fn create_block(&mut self) -> BlockId {
        self.fresh_block()
    }

    /// Start building a block (finishes the current block first)
    pub fn start_block(&mut self, id: BlockId) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        self.current_block = Some(BasicBlock::new(id));
    }

    /// Get the current block ID
    pub fn current_block_id(&self) -> Option<BlockId> {
        self.current_block.as_ref().map(|b| b.id)
    }

    /// Does the current block already end in a terminator?
    pub fn has_terminator(&self) -> bool {
        self.current_block
            .as_ref()
            .map(|b| b.terminator.is_some())
            .unwrap_or(false)
    }

    // ============ Instruction emission ============

    fn emit(&mut self, result: Option<VReg>, kind: InstrKind) -> Option<VReg> {
        if let Some(ref mut block) = self.current_block {
            if block.terminator.is_none() {
                block.instructions.push(Instruction::new(result, kind));
            }
        }
        result
    }

    fn emit_with_result(&mut self, kind: InstrKind) -> VReg {
        let result = self.fresh_vreg();
        self.emit(Some(result), kind);
        result
    }

    // ============ Constants ============

    pub fn const_int(&mut self, value: i64) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Int(value)))
    }

    pub fn const_float(&mut self, value: f64) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Float(value)))
    }

    pub fn const_bool(&mut self, value: bool) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Bool(value)))
    }

    // ============ Arithmetic ============

    pub fn add(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Add(a, b))
    }

    pub fn sub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Sub(a, b))
    }

    pub fn mul(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Mul(a, b))
    }

    pub fn sdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::SDiv(a, b))
    }

    pub fn srem(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::SRem(a, b))
    }

    pub fn neg(&mut self, v: VReg) -> VReg {
        self.emit_with_result(InstrKind::Neg(v))
    }

    // ============ Bitwise ============

    pub fn and(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::And(a, b))
    }

    pub fn or(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Or(a, b))
    }

    pub fn xor(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Xor(a, b))
    }

    pub fn shl(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Shl(a, b))
    }

    pub fn ashr(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::AShr(a, b))
    }

    pub fn not(&mut self, v: VReg) -> VReg {
        self.emit_with_result(InstrKind::Not(v))
    }

    // ============ Comparison & conversion ============

    pub fn icmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::ICmp(op, a, b))
    }

    pub fn zext(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::ZExt(v, ty))
    }

    // ============ Memory ============

    pub fn alloca(&mut self, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Alloca(ty))
    }

    pub fn load(&mut self, ptr: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Load(ptr, ty))
    }

    pub fn store(&mut self, ptr: VReg, value: VReg) {
        self.emit(None, InstrKind::Store(ptr, value));
    }

    // ============ Calls ============

    pub fn call(&mut self, func: impl Into<String>, args: Vec<VReg>) -> VReg {
        self.emit_with_result(InstrKind::Call {
            func: func.into(),
            args,
        })
    }

    // ============ SSA ============

    pub fn phi(&mut self, ty: IrType, preds: Vec<(VReg, BlockId)>) -> VReg {
        self.emit_with_result(InstrKind::Phi(ty, preds))
    }

    // ============ Terminators ============

    pub fn ret(&mut self, value: Option<VReg>) {
        if let Some(ref mut block) = self.current_block {
            if block.terminator.is_none() {
                block.terminator = Some(Terminator::Ret(value));
            }
        }
    }

    pub fn br(&mut self, target: BlockId) {
        if let Some(ref mut block) = self.current_block {
            if block.terminator.is_none() {
                block.terminator = Some(Terminator::Br(target));
            }
        }
    }

    pub fn cond_br(&mut self, cond: VReg, then_block: BlockId, else_block: BlockId) {
        if let Some(ref mut block) = self.current_block {
            if block.terminator.is_none() {
                block.terminator = Some(Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                });
            }
        }
    }
}

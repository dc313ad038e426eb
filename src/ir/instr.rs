//! IR instructions
//!
//! Instruction definitions for the SSA IR.

use super::types::{BlockId, Constant, IrType, VReg};
use std::fmt;

/// An instruction in the IR
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Result register (None for void instructions)
    pub result: Option<VReg>,
    /// The instruction kind
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: Option<VReg>, kind: InstrKind) -> Self {
        Self { result, kind }
    }
}

/// Kinds of instructions
#[derive(Debug, Clone)]
pub enum InstrKind {
    /// Load a constant value
    Const(Constant),

    // ============ Arithmetic ============
    /// Integer addition
    Add(VReg, VReg),
    /// Integer subtraction
    Sub(VReg, VReg),
    /// Integer multiplication
    Mul(VReg, VReg),
    /// Signed integer division
    SDiv(VReg, VReg),
    /// Signed integer remainder
    SRem(VReg, VReg),
    /// Integer negation
    Neg(VReg),

    // ============ Bitwise ============
    /// Bitwise AND
    And(VReg, VReg),
    /// Bitwise OR
    Or(VReg, VReg),
    /// Bitwise XOR
    Xor(VReg, VReg),
    /// Shift left
    Shl(VReg, VReg),
    /// Arithmetic shift right (sign-extending)
    AShr(VReg, VReg),
    /// Bitwise NOT
    Not(VReg),

    // ============ Comparison ============
    /// Integer comparison, yields a 1-bit value
    ICmp(CmpOp, VReg, VReg),
    /// Zero extend
    ZExt(VReg, IrType),

    // ============ Memory ============
    /// Allocate a stack slot of the given type
    Alloca(IrType),
    /// Load from a pointer; the loaded type is supplied here
    Load(VReg, IrType),
    /// Store to memory (ptr, value)
    Store(VReg, VReg),

    // ============ Calls & references ============
    /// Call a function in the module
    Call { func: String, args: Vec<VReg> },
    /// Address of a global (pointer to its storage)
    GlobalRef(String),
    /// A function used as a value (call target only)
    FuncRef(String),

    // ============ SSA ============
    /// Phi node: selects among values by predecessor block
    Phi(IrType, Vec<(VReg, BlockId)>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Signed less than
    Slt,
    /// Signed less than or equal
    Sle,
    /// Signed greater than
    Sgt,
    /// Signed greater than or equal
    Sge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "eq"),
            CmpOp::Ne => write!(f, "ne"),
            CmpOp::Slt => write!(f, "slt"),
            CmpOp::Sle => write!(f, "sle"),
            CmpOp::Sgt => write!(f, "sgt"),
            CmpOp::Sge => write!(f, "sge"),
        }
    }
}

/// Block terminators
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Return from function
    Ret(Option<VReg>),
    /// Unconditional branch
    Br(BlockId),
    /// Conditional branch
    CondBr {
        cond: VReg,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{} = ", result)?;
        }
        match &self.kind {
            InstrKind::Const(c) => write!(f, "const {}", c),
            InstrKind::Add(a, b) => write!(f, "add {}, {}", a, b),
            InstrKind::Sub(a, b) => write!(f, "sub {}, {}", a, b),
            InstrKind::Mul(a, b) => write!(f, "mul {}, {}", a, b),
            InstrKind::SDiv(a, b) => write!(f, "sdiv {}, {}", a, b),
            InstrKind::SRem(a, b) => write!(f, "srem {}, {}", a, b),
            InstrKind::Neg(v) => write!(f, "neg {}", v),
            InstrKind::And(a, b) => write!(f, "and {}, {}", a, b),
            InstrKind::Or(a, b) => write!(f, "or {}, {}", a, b),
            InstrKind::Xor(a, b) => write!(f, "xor {}, {}", a, b),
            InstrKind::Shl(a, b) => write!(f, "shl {}, {}", a, b),
            InstrKind::AShr(a, b) => write!(f, "ashr {}, {}", a, b),
            InstrKind::Not(v) => write!(f, "not {}", v),
            InstrKind::ICmp(op, a, b) => write!(f, "icmp {} {}, {}", op, a, b),
            InstrKind::ZExt(v, ty) => write!(f, "zext {} to {}", v, ty),
            InstrKind::Alloca(ty) => write!(f, "alloca {}", ty),
            InstrKind::Load(ptr, ty) => write!(f, "load {}, {}", ty, ptr),
            InstrKind::Store(ptr, val) => write!(f, "store {}, {}", ptr, val),
            InstrKind::Call { func, args } => {
                write!(f, "call @{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::GlobalRef(name) => write!(f, "globalref @{}", name),
            InstrKind::FuncRef(name) => write!(f, "funcref @{}", name),
            InstrKind::Phi(ty, preds) => {
                write!(f, "phi {} ", ty)?;
                for (i, (val, block)) in preds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}, {}]", val, block)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(v)) => write!(f, "ret {}", v),
            Terminator::Br(block) => write!(f, "br {}", block),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "br {}, {}, {}", cond, then_block, else_block)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_display() {
        let instr = Instruction::new(Some(VReg(3)), InstrKind::Add(VReg(1), VReg(2)));
        assert_eq!(instr.to_string(), "%3 = add %1, %2");

        let load = Instruction::new(Some(VReg(5)), InstrKind::Load(VReg(4), IrType::I32));
        assert_eq!(load.to_string(), "%5 = load i32, %4");

        let store = Instruction::new(None, InstrKind::Store(VReg(4), VReg(5)));
        assert_eq!(store.to_string(), "store %4, %5");
    }

    #[test]
    fn test_phi_display() {
        let phi = Instruction::new(
            Some(VReg(7)),
            InstrKind::Phi(
                IrType::Bool,
                vec![(VReg(5), BlockId(2)), (VReg(6), BlockId(0))],
            ),
        );
        assert_eq!(phi.to_string(), "%7 = phi i1 [%5, bb2], [%6, bb0]");
    }

    #[test]
    fn test_terminator_display() {
        assert_eq!(Terminator::Ret(None).to_string(), "ret void");
        assert_eq!(Terminator::Br(BlockId(4)).to_string(), "br bb4");
        let cond = Terminator::CondBr {
            cond: VReg(1),
            then_block: BlockId(2),
            else_block: BlockId(3),
        };
        assert_eq!(cond.to_string(), "br %1, bb2, bb3");
    }
}

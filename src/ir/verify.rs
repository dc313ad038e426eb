//! Module verification
//!
//! Structural soundness checks run after lowering, before the textual form
//! is emitted: every block of every defined function must end in exactly
//! one terminator, every branch must target a block of the same function,
//! phi inputs must name existing predecessor blocks, and returns must agree
//! with the function's return type.

use super::instr::{InstrKind, Terminator};
use super::types::{IrType, Module};
use std::collections::HashSet;
use thiserror::Error;

/// Verification failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("function '{function}' has no blocks")]
    EmptyFunction { function: String },

    #[error("block {block} of function '{function}' has no terminator")]
    MissingTerminator { function: String, block: String },

    #[error("block {block} of function '{function}' branches to unknown block {target}")]
    UnknownBranchTarget {
        function: String,
        block: String,
        target: String,
    },

    #[error("phi in block {block} of function '{function}' names unknown block {target}")]
    UnknownPhiPredecessor {
        function: String,
        block: String,
        target: String,
    },

    #[error("return in block {block} of function '{function}' disagrees with return type")]
    ReturnMismatch { function: String, block: String },
}

/// Verify the structural invariants of a module.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    for func in &module.functions {
        if func.is_declaration {
            continue;
        }
        if func.blocks.is_empty() {
            return Err(VerifyError::EmptyFunction {
                function: func.name.clone(),
            });
        }

        let block_ids: HashSet<_> = func.blocks.iter().map(|b| b.id).collect();

        for block in &func.blocks {
            let check_target = |target| {
                if block_ids.contains(&target) {
                    Ok(())
                } else {
                    Err(VerifyError::UnknownBranchTarget {
                        function: func.name.clone(),
                        block: block.id.to_string(),
                        target: target.to_string(),
                    })
                }
            };

            match &block.terminator {
                None => {
                    return Err(VerifyError::MissingTerminator {
                        function: func.name.clone(),
                        block: block.id.to_string(),
                    })
                }
                Some(Terminator::Br(target)) => check_target(*target)?,
                Some(Terminator::CondBr {
                    then_block,
                    else_block,
                    ..
                }) => {
                    check_target(*then_block)?;
                    check_target(*else_block)?;
                }
                Some(Terminator::Ret(value)) => {
                    let returns_void = value.is_none();
                    let is_void_fn = func.ret_type == IrType::Void;
                    if returns_void != is_void_fn {
                        return Err(VerifyError::ReturnMismatch {
                            function: func.name.clone(),
                            block: block.id.to_string(),
                        });
                    }
                }
            }

            for instr in &block.instructions {
                if let InstrKind::Phi(_, preds) = &instr.kind {
                    for (_, pred) in preds {
                        if !block_ids.contains(pred) {
                            return Err(VerifyError::UnknownPhiPredecessor {
                                function: func.name.clone(),
                                block: block.id.to_string(),
                                target: pred.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

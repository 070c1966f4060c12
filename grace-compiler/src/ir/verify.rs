//! Structural checks over a lowered [`Module`].

use thiserror::Error;

use super::module::{Function, Module};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("block '{block}' in '{function}' has no terminator")]
    MissingTerminator { function: String, block: String },

    #[error("block '{block}' in '{function}' has a terminator before its last instruction")]
    EarlyTerminator { function: String, block: String },

    #[error("block '{block}' in '{function}' branches outside its function")]
    ForeignTarget { function: String, block: String },

    #[error("function '{function}' has no blocks")]
    EmptyFunction { function: String },
}

/// Check every defined function: each block ends in exactly one terminator
/// and branches stay inside the function.
pub fn verify_module(module: &Module) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();
    for (index, func) in module.functions.iter().enumerate() {
        if !func.is_declaration {
            verify_function(index, func, &mut errors);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn verify_function(index: usize, func: &Function, errors: &mut Vec<VerifyError>) {
    if func.blocks.is_empty() {
        errors.push(VerifyError::EmptyFunction {
            function: func.name.clone(),
        });
        return;
    }

    for block in &func.blocks {
        let (function, name) = (func.name.clone(), block.name.clone());

        if !block.is_terminated() {
            errors.push(VerifyError::MissingTerminator {
                function: function.clone(),
                block: name.clone(),
            });
        }
        let body = block.instrs.len().saturating_sub(1);
        if block.instrs[..body].iter().any(|i| i.is_terminator()) {
            errors.push(VerifyError::EarlyTerminator {
                function: function.clone(),
                block: name.clone(),
            });
        }
        let foreign = block
            .instrs
            .iter()
            .flat_map(|i| i.successors())
            .any(|t| t.func.0 != index || t.index >= func.blocks.len());
        if foreign {
            errors.push(VerifyError::ForeignTarget {
                function,
                block: name,
            });
        }
    }
}

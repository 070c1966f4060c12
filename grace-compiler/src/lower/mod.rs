//! Semantic checks and lowering of the syntax tree into basic-block IR.
//!
//! [`Gen`] walks the tree depth-first, resolving names through the
//! [`symbol_table::SymbolTable`], checking types and emitting instructions
//! through an [`crate::ir::IrBuilder`]. Problems are recorded as
//! diagnostics; the offending statement is dropped and lowering continues.

pub mod context;
pub mod expr;
pub mod stmt;
pub mod symbol_table;

pub use context::{Gen, LoopTargets, Operand};
pub use expr::CallOutcome;
pub use symbol_table::{Symbol, SymbolTable};

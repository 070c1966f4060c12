//! Intermediate Representation (IR) module.
//!
//! This module contains the backend contract used by the lowering pass,
//! the in-memory basic-block module that implements it, and a verifier.

pub mod builder;
pub mod module;
pub mod verify;

pub use builder::IrBuilder;
pub use module::*;
pub use verify::{verify_module, VerifyError};

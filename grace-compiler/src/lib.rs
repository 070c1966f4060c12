//! Semantic analysis and lowering for the Grace language.
//!
//! The pass consumes a parsed [`ast::Program`] and produces basic-block
//! structured IR through the [`ir::IrBuilder`] contract, collecting
//! diagnostics instead of stopping at the first error.

pub mod ast;
pub mod config;
pub mod ir;
pub mod lower;
pub mod types;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ast::Pos;
pub use config::{ConfigError, LowerOptions};
pub use types::Type;

/// A problem found while lowering, reported with the position of the
/// offending node.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{severity}[{kind}] ({}:{}) - {message}", .pos.line, .pos.column)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub pos: Pos,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            pos,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            pos,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    DuplicateDefinition,
    UndefinedSymbol,
    TypeMismatch,
    ArityMismatch,
    InvalidBreakContinue,
    MissingReturn,
    ReturnOutsideFunction,
    IndexOutOfBounds,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::DuplicateDefinition => write!(f, "DuplicateDefinition"),
            DiagnosticKind::UndefinedSymbol => write!(f, "UndefinedSymbol"),
            DiagnosticKind::TypeMismatch => write!(f, "TypeMismatch"),
            DiagnosticKind::ArityMismatch => write!(f, "ArityMismatch"),
            DiagnosticKind::InvalidBreakContinue => write!(f, "InvalidBreakContinue"),
            DiagnosticKind::MissingReturn => write!(f, "MissingReturn"),
            DiagnosticKind::ReturnOutsideFunction => write!(f, "ReturnOutsideFunction"),
            DiagnosticKind::IndexOutOfBounds => write!(f, "IndexOutOfBounds"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Result of lowering a program into the in-memory module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowerOutput {
    pub module: ir::Module,
    pub diagnostics: Vec<Diagnostic>,
}

impl LowerOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Lower a program with default options.
pub fn lower(program: &ast::Program) -> LowerOutput {
    lower_with_options(program, &LowerOptions::default())
}

/// Lower a program into an [`ir::Module`].
pub fn lower_with_options(program: &ast::Program, options: &LowerOptions) -> LowerOutput {
    let builder = ir::ModuleBuilder::new(&options.module_name);
    let (builder, diagnostics) = lower_with_builder(program, builder, options);
    LowerOutput {
        module: builder.finish(),
        diagnostics,
    }
}

/// Lower a program against any backend implementing [`ir::IrBuilder`].
pub fn lower_with_builder<B: ir::IrBuilder>(
    program: &ast::Program,
    builder: B,
    options: &LowerOptions,
) -> (B, Vec<Diagnostic>) {
    let mut g = lower::Gen::new(builder, options.clone());
    g.lower_program(program);
    g.finish()
}

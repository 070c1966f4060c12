use crate::ast::Pos;
use crate::config::LowerOptions;
use crate::ir::{BlockId, FuncId, IrBuilder, IrType, Signature, Value};
use crate::lower::symbol_table::{Symbol, SymbolTable};
use crate::types::{self, Type};
use crate::{Diagnostic, DiagnosticKind, Severity};

/// Per-function lowering state, reset on entry to each function body.
#[derive(Debug, Clone)]
pub struct FunctionCtx {
    pub func: FuncId,
    pub name: String,
    pub return_type: Option<Type>,
    pub expect_return: bool,
    pub return_found: bool,
}

/// Targets of `skip` and `stop` for one enclosing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTargets {
    pub continue_to: BlockId,
    pub break_to: BlockId,
}

/// A lowered expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub value: Value,
    pub ty: Type,
}

/// Generation context shared across the whole pass.
pub struct Gen<B: IrBuilder> {
    pub builder: B,
    pub options: LowerOptions,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
    pub fn_ctx: Option<FunctionCtx>,
    /// Innermost loop last
    pub loops: Vec<LoopTargets>,
    /// First scope that belongs to the function being lowered
    pub scope_floor: usize,
    /// Function holding top-level statements, once created
    pub entry_fn: Option<FuncId>,
    /// Name given to `entry_fn`
    pub entry_name: String,
    pub print_fn: Option<FuncId>,
}

impl<B: IrBuilder> Gen<B> {
    pub fn new(builder: B, options: LowerOptions) -> Self {
        Self {
            builder,
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
            fn_ctx: None,
            loops: Vec::new(),
            scope_floor: 1,
            entry_name: options.entry_function.clone(),
            options,
            entry_fn: None,
            print_fn: None,
        }
    }

    pub fn finish(self) -> (B, Vec<Diagnostic>) {
        (self.builder, self.diagnostics)
    }

    pub fn report(&mut self, kind: DiagnosticKind, pos: Pos, message: impl Into<String>) {
        let diag = Diagnostic::error(kind, pos, message);
        tracing::debug!(%diag, "diagnostic");
        self.diagnostics.push(diag);
    }

    pub fn warn(&mut self, kind: DiagnosticKind, pos: Pos, message: impl Into<String>) {
        let mut diag = Diagnostic::warning(kind, pos, message);
        if self.options.warnings_as_errors {
            diag.severity = Severity::Error;
        }
        tracing::warn!(%diag, "diagnostic");
        self.diagnostics.push(diag);
    }

    /// Report a `TypeMismatch` unless `found` may be stored where `expected`
    /// is declared.
    pub fn expect_assignable(
        &mut self,
        pos: Pos,
        expected: &Type,
        found: &Type,
        context: impl FnOnce() -> String,
    ) -> Option<()> {
        if types::is_assignable(expected, found) {
            return Some(());
        }
        let message = format!("expected {expected}, found {found} in {}", context());
        self.report(DiagnosticKind::TypeMismatch, pos, message);
        None
    }

    /// Symbol visible under `name` from the function being lowered.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.symbols.lookup_from(name, self.scope_floor).cloned()
    }

    /// Address of a variable's value; array parameters hold it indirectly.
    pub fn variable_address(&mut self, storage: Value, by_ref: bool) -> Value {
        if by_ref {
            self.builder.build_load(&IrType::Ptr, storage)
        } else {
            storage
        }
    }

    /// Function whose body is currently being emitted (user function or the
    /// synthesized entry function).
    pub fn current_function(&self) -> Option<FuncId> {
        self.builder.insert_block().map(|b| b.func)
    }

    /// Storage declared here lives for the whole program.
    pub fn at_module_scope(&self) -> bool {
        self.fn_ctx.is_none() && self.symbols.is_global_scope()
    }

    pub fn new_block(&mut self, name: &str) -> BlockId {
        let Some(func) = self.current_function() else {
            unreachable!("block '{name}' requested outside of any function");
        };
        let block = self.builder.append_block(func, name);
        tracing::trace!(?block, name, "new block");
        block
    }

    pub fn position_at(&mut self, block: BlockId) {
        self.builder.position_at_end(block);
    }

    pub fn is_current_terminated(&self) -> bool {
        self.builder
            .insert_block()
            .is_some_and(|b| self.builder.is_terminated(b))
    }

    /// Statements following a `return`, `skip` or `stop` land in a fresh
    /// block without predecessors.
    pub fn ensure_open_block(&mut self) {
        if self.is_current_terminated() {
            let dead = self.new_block("dead");
            self.position_at(dead);
        }
    }

    /// Branch to `target` unless the current block already has a terminator.
    pub fn branch_to(&mut self, target: BlockId) {
        if !self.is_current_terminated() {
            self.builder.build_br(target);
        }
    }

    /// Create the entry function on first use and position at its first
    /// block.
    pub fn open_entry_function(&mut self) -> FuncId {
        if let Some(func) = self.entry_fn {
            return func;
        }
        let sig = Signature {
            ret: Type::Int.render(),
            params: Vec::new(),
            variadic: false,
        };
        let func = self.builder.declare_function(&self.entry_name, &sig);
        let entry = self.builder.append_block(func, "entry");
        self.builder.position_at_end(entry);
        self.entry_fn = Some(func);
        tracing::debug!(name = %self.entry_name, "opened entry function");
        func
    }

    /// Close the entry function with `ret 0`.
    pub fn close_entry_function(&mut self) {
        let Some(func) = self.entry_fn else {
            return;
        };
        if !self.is_current_terminated() {
            self.builder
                .build_return(Some(Value::int(types::INT_BITS, 0)));
        }
        self.builder.finish_function(func);
    }

    /// The external print primitive, declared on first use.
    pub fn print_function(&mut self) -> FuncId {
        if let Some(func) = self.print_fn {
            return func;
        }
        let sig = Signature {
            ret: IrType::Int(types::INT_BITS),
            params: vec![IrType::Ptr],
            variadic: true,
        };
        let func = self
            .builder
            .declare_external(&self.options.print_function, &sig);
        self.print_fn = Some(func);
        func
    }
}

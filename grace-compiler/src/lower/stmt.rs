use std::collections::HashSet;

use super::context::{FunctionCtx, Gen, LoopTargets};
use super::expr::{map_arith, CallOutcome};
use super::symbol_table::Symbol;
use crate::ast::{Block, CompoundOp, Expr, Literal, Param, Pos, Program, Stmt};
use crate::ir::{BlockId, FuncId, IrBuilder, IrType, Signature, Value};
use crate::types::{Type, INT_BITS};
use crate::DiagnosticKind;

impl<B: IrBuilder> Gen<B> {
    pub fn lower_program(&mut self, program: &Program) {
        let mut defined = HashSet::new();
        collect_function_names(&program.body.stmts, &mut defined);
        if defined.contains(self.options.entry_function.as_str()) {
            // Grace identifiers cannot contain '.', so this name is free.
            self.entry_name = format!("{}.toplevel", self.options.entry_function);
            tracing::debug!(name = %self.entry_name, "entry function name is user-defined");
        }

        for stmt in &program.body.stmts {
            self.lower_stmt(stmt);
        }

        self.close_entry_function();
        debug_assert!(
            self.symbols.is_global_scope(),
            "unbalanced scopes after lowering"
        );
    }

    /// Lower one statement. A statement that fails a check is dropped after
    /// its diagnostic is recorded; its siblings are still lowered.
    pub fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FuncDecl { .. } => {}
            Stmt::VarDecl { init: None, .. } if self.at_module_scope() => {}
            _ => {
                if self.fn_ctx.is_none() {
                    self.open_entry_function();
                }
                self.ensure_open_block();
            }
        }

        let lowered = match stmt {
            Stmt::Block { body, .. } => {
                self.lower_block(body);
                Some(())
            }
            Stmt::VarDecl {
                pos,
                name,
                ty,
                init,
            } => self.lower_var_decl(*pos, name, ty, init.as_ref()),
            Stmt::Assign { pos, name, value } => self.lower_assign(*pos, name, value),
            Stmt::CompoundAssign {
                pos,
                name,
                op,
                value,
            } => self.lower_compound_assign(*pos, name, *op, value),
            Stmt::ArrayAssign {
                pos,
                name,
                elements,
            } => self.lower_array_assign(*pos, name, elements),
            Stmt::IndexAssign {
                pos,
                name,
                index,
                value,
            } => self.lower_index_assign(*pos, name, index, value),
            Stmt::FuncDecl {
                pos,
                name,
                return_type,
                params,
                body,
            } => self.lower_function(*pos, name, return_type.as_ref(), params, body),
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.lower_if(condition, then_block, else_block.as_ref());
                Some(())
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.lower_while(condition, body);
                Some(())
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                self.lower_for(init, condition, step, body);
                Some(())
            }
            Stmt::Return { pos, value } => self.lower_return(*pos, value.as_ref()),
            Stmt::Skip { pos } => self.lower_loop_jump(*pos, "skip", |t| t.continue_to),
            Stmt::Stop { pos } => self.lower_loop_jump(*pos, "stop", |t| t.break_to),
            Stmt::Write { format, args, .. } => self.lower_write(format, args),
            Stmt::Expr { expr, .. } => match expr {
                Expr::Call { pos, callee, args } => match self.lower_call(*pos, callee, args) {
                    CallOutcome::Rejected => None,
                    CallOutcome::Value(_) | CallOutcome::Void => Some(()),
                },
                other => self.lower_expr(other).map(|_| ()),
            },
        };

        if lowered.is_none() {
            tracing::trace!(pos = ?stmt.pos(), "statement dropped");
        }
    }

    /// Lower a statement block in its own scope.
    pub fn lower_block(&mut self, block: &Block) {
        self.symbols.enter_scope();
        for stmt in &block.stmts {
            self.lower_stmt(stmt);
        }
        self.symbols.leave_scope();
    }

    fn lower_var_decl(
        &mut self,
        pos: Pos,
        name: &str,
        ty: &Type,
        init: Option<&Expr>,
    ) -> Option<()> {
        if let Some(existing) = self.symbols.lookup_current(name) {
            let what = existing.kind_name();
            self.report(
                DiagnosticKind::DuplicateDefinition,
                pos,
                format!("'{name}' is already defined as a {what} in this scope"),
            );
            return None;
        }

        let storage = if self.at_module_scope() {
            self.builder.declare_global(name, &ty.render())
        } else {
            self.builder.build_alloca(&ty.render(), name)
        };

        // The name is bound only after the initializer, which therefore
        // cannot refer to it.
        if let Some(init) = init {
            if let Some(value) = self.lower_expr(init) {
                let accepted = self.expect_assignable(init.pos(), ty, &value.ty, || {
                    format!("initializer of '{name}'")
                });
                if accepted.is_some() {
                    self.builder.build_store(storage, value.value);
                }
            }
        }

        let symbol = Symbol::Variable {
            storage,
            ty: ty.clone(),
            by_ref: false,
        };
        let declared = self.symbols.declare(name, symbol);
        debug_assert!(declared.is_ok(), "'{name}' bound twice in one scope");
        Some(())
    }

    fn lower_assign(&mut self, pos: Pos, name: &str, value: &Expr) -> Option<()> {
        let (storage, ty, by_ref) = self.variable(pos, name)?;
        let rhs = self.lower_expr(value)?;
        self.expect_assignable(value.pos(), &ty, &rhs.ty, || {
            format!("assignment to '{name}'")
        })?;
        let ptr = self.variable_address(storage, by_ref);
        self.builder.build_store(ptr, rhs.value);
        Some(())
    }

    fn lower_compound_assign(
        &mut self,
        pos: Pos,
        name: &str,
        op: CompoundOp,
        value: &Expr,
    ) -> Option<()> {
        let (storage, ty, by_ref) = self.variable(pos, name)?;
        if ty != Type::Int {
            self.report(
                DiagnosticKind::TypeMismatch,
                pos,
                format!("'{}=' needs an int target, '{name}' is {ty}", op.bin_op()),
            );
            return None;
        }

        let ptr = self.variable_address(storage, by_ref);
        let current = self.builder.build_load(&ty.render(), ptr);
        let rhs = self.lower_expr(value)?;
        self.expect_assignable(value.pos(), &ty, &rhs.ty, || {
            format!("'{}=' on '{name}'", op.bin_op())
        })?;
        let Some(opcode) = map_arith(op.bin_op()) else {
            unreachable!("compound operator '{}' has no arithmetic opcode", op.bin_op());
        };
        let result = self.builder.build_binary(opcode, current, rhs.value);
        self.builder.build_store(ptr, result);
        Some(())
    }

    fn lower_array_assign(&mut self, pos: Pos, name: &str, elements: &[Literal]) -> Option<()> {
        let (storage, ty, by_ref) = self.variable(pos, name)?;
        let Some((element, size)) = ty.element() else {
            self.report(
                DiagnosticKind::TypeMismatch,
                pos,
                format!("'{name}' is {ty}, not an array"),
            );
            return None;
        };
        let element = element.clone();

        if elements.len() != size as usize {
            self.report(
                DiagnosticKind::ArityMismatch,
                pos,
                format!(
                    "'{name}' holds {size} elements, initializer has {}",
                    elements.len()
                ),
            );
            return None;
        }

        // Check every element before emitting anything so a bad list leaves
        // the array untouched.
        let mut well_typed = true;
        for (i, lit) in elements.iter().enumerate() {
            let found = lit.ty();
            if found != element {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    pos,
                    format!("element {i} of the initializer for '{name}': expected {element}, found {found}"),
                );
                well_typed = false;
            }
        }
        if !well_typed {
            return None;
        }

        let array_ty = ty.render();
        let base = self.variable_address(storage, by_ref);
        for (i, lit) in elements.iter().enumerate() {
            let value = self.lower_literal(lit).value;
            let slot =
                self.builder
                    .build_element_ptr(&array_ty, base, Value::int(INT_BITS, i as i64));
            self.builder.build_store(slot, value);
        }
        Some(())
    }

    fn lower_index_assign(
        &mut self,
        pos: Pos,
        name: &str,
        index: &Expr,
        value: &Expr,
    ) -> Option<()> {
        let target = self.element_address(pos, name, index);
        let rhs = self.lower_expr(value);
        let (ptr, element) = target?;
        let rhs = rhs?;
        self.expect_assignable(value.pos(), &element, &rhs.ty, || {
            format!("assignment to an element of '{name}'")
        })?;
        self.builder.build_store(ptr, rhs.value);
        Some(())
    }

    fn lower_function(
        &mut self,
        pos: Pos,
        name: &str,
        return_type: Option<&Type>,
        params: &[Param],
        body: &Block,
    ) -> Option<()> {
        if name == self.options.print_function {
            self.report(
                DiagnosticKind::DuplicateDefinition,
                pos,
                format!("'{name}' is reserved for the print primitive behind write"),
            );
            return None;
        }
        if self.symbols.lookup_global(name).is_some() {
            self.report(
                DiagnosticKind::DuplicateDefinition,
                pos,
                format!("'{name}' is already defined at module scope"),
            );
            return None;
        }
        tracing::debug!(name, params = params.len(), "lowering function");

        let sig = Signature {
            ret: return_type.map_or(IrType::Void, Type::render),
            params: params.iter().map(|p| p.ty.render_param()).collect(),
            variadic: false,
        };
        let func = self.builder.declare_function(name, &sig);

        // Bound before the body so the function can call itself.
        let symbol = Symbol::Function {
            func,
            return_type: return_type.cloned(),
            params: params.iter().map(|p| p.ty.clone()).collect(),
        };
        let declared = self.symbols.declare_global(name, symbol);
        debug_assert!(declared.is_ok(), "function '{name}' bound twice");

        let saved_cursor = self.builder.insert_block();
        let saved_ctx = self.fn_ctx.replace(FunctionCtx {
            func,
            name: name.to_string(),
            return_type: return_type.cloned(),
            expect_return: return_type.is_some(),
            return_found: false,
        });
        let saved_loops = std::mem::take(&mut self.loops);
        self.symbols.enter_scope();
        let saved_floor = std::mem::replace(&mut self.scope_floor, self.symbols.depth() - 1);

        let entry = self.builder.append_block(func, "entry");
        self.position_at(entry);
        for (index, param) in params.iter().enumerate() {
            self.lower_param(pos, func, index, param);
        }
        for stmt in &body.stmts {
            self.lower_stmt(stmt);
        }

        self.symbols.leave_scope();
        self.scope_floor = saved_floor;
        self.loops = saved_loops;
        let ctx = std::mem::replace(&mut self.fn_ctx, saved_ctx);

        if let (Some(ctx), Some(ty)) = (ctx, return_type) {
            if ctx.expect_return && !ctx.return_found {
                self.warn(
                    DiagnosticKind::MissingReturn,
                    pos,
                    format!("function '{name}' returns {ty} but has no return statement"),
                );
            }
        }
        if return_type.is_none() && !self.is_current_terminated() {
            self.builder.build_return(None);
        }
        self.builder.finish_function(func);

        if let Some(block) = saved_cursor {
            self.position_at(block);
        }
        Some(())
    }

    fn lower_param(&mut self, pos: Pos, func: FuncId, index: usize, param: &Param) {
        if self.symbols.lookup_current(&param.name).is_some() {
            self.report(
                DiagnosticKind::DuplicateDefinition,
                pos,
                format!("parameter '{}' is declared more than once", param.name),
            );
            return;
        }

        let slot = self.builder.build_alloca(&param.ty.render_param(), &param.name);
        let incoming = self.builder.param(func, index);
        self.builder.build_store(slot, incoming);

        let symbol = Symbol::Variable {
            storage: slot,
            ty: param.ty.clone(),
            by_ref: param.ty.is_array(),
        };
        let declared = self.symbols.declare(&param.name, symbol);
        debug_assert!(declared.is_ok(), "parameter '{}' bound twice", param.name);
    }

    fn lower_return(&mut self, pos: Pos, value: Option<&Expr>) -> Option<()> {
        let Some(ctx) = self.fn_ctx.as_mut() else {
            self.report(
                DiagnosticKind::ReturnOutsideFunction,
                pos,
                "return outside of a function",
            );
            return None;
        };
        ctx.return_found = true;
        let name = ctx.name.clone();
        let expected = ctx.return_type.clone();

        match (value, expected) {
            (None, None) => self.builder.build_return(None),
            (Some(value), Some(expected)) => {
                let v = self.lower_expr(value)?;
                self.expect_assignable(value.pos(), &expected, &v.ty, || {
                    format!("return from '{name}'")
                })?;
                self.builder.build_return(Some(v.value));
            }
            (Some(value), None) => {
                self.lower_expr(value);
                self.report(
                    DiagnosticKind::TypeMismatch,
                    pos,
                    format!("procedure '{name}' cannot return a value"),
                );
                return None;
            }
            (None, Some(expected)) => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    pos,
                    format!("function '{name}' must return a value of type {expected}"),
                );
                return None;
            }
        }
        Some(())
    }

    fn lower_if(&mut self, condition: &Expr, then_block: &Block, else_block: Option<&Block>) {
        let cond = self.lower_condition(condition);

        let then_bb = self.new_block("then");
        let else_bb = else_block.map(|_| self.new_block("else"));
        let merge = self.new_block("merge");
        let otherwise = else_bb.unwrap_or(merge);

        match cond {
            Some(c) => self.builder.build_cond_br(c, then_bb, otherwise),
            None => self.builder.build_br(otherwise),
        }

        self.position_at(then_bb);
        self.lower_block(then_block);
        self.branch_to(merge);

        if let (Some(else_bb), Some(body)) = (else_bb, else_block) {
            self.position_at(else_bb);
            self.lower_block(body);
            self.branch_to(merge);
        }

        self.position_at(merge);
    }

    fn lower_while(&mut self, condition: &Expr, body: &Block) {
        tracing::debug!("lowering while loop");
        let cond_bb = self.new_block("while.cond");
        let body_bb = self.new_block("while.body");
        let end = self.new_block("while.end");

        self.branch_to(cond_bb);
        self.position_at(cond_bb);
        self.branch_on(condition, body_bb, end);

        self.position_at(body_bb);
        self.lower_loop_body(
            body,
            LoopTargets {
                continue_to: cond_bb,
                break_to: end,
            },
        );
        self.branch_to(cond_bb);

        self.position_at(end);
    }

    fn lower_for(&mut self, init: &Stmt, condition: &Expr, step: &Stmt, body: &Block) {
        tracing::debug!("lowering for loop");
        // Variables declared by the initializer live for the whole loop.
        self.symbols.enter_scope();
        self.lower_stmt(init);

        let cond_bb = self.new_block("for.cond");
        let body_bb = self.new_block("for.body");
        let step_bb = self.new_block("for.step");
        let end = self.new_block("for.end");

        self.branch_to(cond_bb);
        self.position_at(cond_bb);
        self.branch_on(condition, body_bb, end);

        self.position_at(body_bb);
        self.lower_loop_body(
            body,
            LoopTargets {
                continue_to: step_bb,
                break_to: end,
            },
        );
        self.branch_to(step_bb);

        self.position_at(step_bb);
        self.lower_stmt(step);
        self.branch_to(cond_bb);

        self.position_at(end);
        self.symbols.leave_scope();
    }

    fn lower_loop_body(&mut self, body: &Block, targets: LoopTargets) {
        self.loops.push(targets);
        self.lower_block(body);
        self.loops.pop();
    }

    /// Test `condition` and leave the current block. A condition that fails
    /// to lower exits through `otherwise`.
    fn branch_on(&mut self, condition: &Expr, then_bb: BlockId, otherwise: BlockId) {
        match self.lower_condition(condition) {
            Some(c) => self.builder.build_cond_br(c, then_bb, otherwise),
            None => self.builder.build_br(otherwise),
        }
    }

    fn lower_loop_jump(
        &mut self,
        pos: Pos,
        keyword: &str,
        target: fn(&LoopTargets) -> BlockId,
    ) -> Option<()> {
        let Some(targets) = self.loops.last().copied() else {
            self.report(
                DiagnosticKind::InvalidBreakContinue,
                pos,
                format!("'{keyword}' outside of a loop"),
            );
            return None;
        };
        self.builder.build_br(target(&targets));
        Some(())
    }

    fn lower_write(&mut self, format: &str, args: &[Expr]) -> Option<()> {
        let mut values = Vec::with_capacity(args.len() + 1);
        let mut complete = true;
        for arg in args {
            match self.lower_expr(arg) {
                Some(op) if op.ty.is_array() => {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        arg.pos(),
                        format!("cannot write a value of type {}", op.ty),
                    );
                    complete = false;
                }
                Some(op) => values.push(op.value),
                None => complete = false,
            }
        }
        if !complete {
            return None;
        }

        let print = self.print_function();
        let format = self.builder.global_string(format);
        values.insert(0, format);
        self.builder.build_call(print, values);
        Some(())
    }
}

/// Names of every function declared anywhere in `stmts`, nested ones
/// included.
fn collect_function_names<'a>(stmts: &'a [Stmt], names: &mut HashSet<&'a str>) {
    for stmt in stmts {
        match stmt {
            Stmt::FuncDecl { name, body, .. } => {
                names.insert(name.as_str());
                collect_function_names(&body.stmts, names);
            }
            Stmt::Block { body, .. } | Stmt::While { body, .. } => {
                collect_function_names(&body.stmts, names);
            }
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                collect_function_names(&then_block.stmts, names);
                if let Some(else_block) = else_block {
                    collect_function_names(&else_block.stmts, names);
                }
            }
            Stmt::For { body, .. } => collect_function_names(&body.stmts, names),
            _ => {}
        }
    }
}

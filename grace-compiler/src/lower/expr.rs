use super::context::{Gen, Operand};
use super::symbol_table::Symbol;
use crate::ast::{BinOp, Expr, Literal, Pos, UnOp};
use crate::ir::{BinaryOp, IntPredicate, IrBuilder, UnaryOp, Value};
use crate::types::{self, Type, INT_BITS};
use crate::DiagnosticKind;

/// Result of lowering a call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Value(Operand),
    /// Call to a procedure; emitted, but there is no value
    Void,
    /// Diagnostics were reported and no call was emitted
    Rejected,
}

impl<B: IrBuilder> Gen<B> {
    /// Lower an expression, returning `None` once a diagnostic has been
    /// recorded for it.
    pub fn lower_expr(&mut self, expr: &Expr) -> Option<Operand> {
        match expr {
            Expr::Literal(_, lit) => Some(self.lower_literal(lit)),
            Expr::Ident(pos, name) => self.lower_ident(*pos, name),
            Expr::Index { pos, name, index } => {
                let (ptr, element) = self.element_address(*pos, name, index)?;
                let value = self.builder.build_load(&element.render(), ptr);
                Some(Operand { value, ty: element })
            }
            Expr::Unary { pos, op, operand } => self.lower_unary(*pos, *op, operand),
            Expr::Binary { pos, op, lhs, rhs } => self.lower_binary(*pos, *op, lhs, rhs),
            Expr::Call { pos, callee, args } => match self.lower_call(*pos, callee, args) {
                CallOutcome::Value(op) => Some(op),
                CallOutcome::Void => {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        *pos,
                        format!("procedure '{callee}' has no value"),
                    );
                    None
                }
                CallOutcome::Rejected => None,
            },
        }
    }

    pub fn lower_literal(&mut self, lit: &Literal) -> Operand {
        let value = match lit {
            Literal::Int(n) => Value::int(INT_BITS, i64::from(*n)),
            Literal::Bool(b) => Value::bool(*b),
            Literal::Str(s) => self.builder.global_string(s),
        };
        Operand {
            value,
            ty: lit.ty(),
        }
    }

    /// Lower a branch condition, which must be `bool`.
    pub fn lower_condition(&mut self, cond: &Expr) -> Option<Value> {
        let op = self.lower_expr(cond)?;
        if op.ty != Type::Bool {
            self.report(
                DiagnosticKind::TypeMismatch,
                cond.pos(),
                format!("condition must be bool, found {}", op.ty),
            );
            return None;
        }
        Some(op.value)
    }

    /// Resolve `name` to a variable: its storage, declared type and whether
    /// the storage holds the value's address.
    pub fn variable(&mut self, pos: Pos, name: &str) -> Option<(Value, Type, bool)> {
        match self.resolve(name) {
            Some(Symbol::Variable {
                storage,
                ty,
                by_ref,
            }) => Some((storage, ty, by_ref)),
            Some(other) => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    pos,
                    format!("'{name}' is a {}, not a variable", other.kind_name()),
                );
                None
            }
            None => {
                self.report(
                    DiagnosticKind::UndefinedSymbol,
                    pos,
                    format!("undefined variable '{name}'"),
                );
                None
            }
        }
    }

    fn lower_ident(&mut self, pos: Pos, name: &str) -> Option<Operand> {
        let (storage, ty, by_ref) = self.variable(pos, name)?;
        let ptr = self.variable_address(storage, by_ref);
        let value = self.builder.build_load(&ty.render(), ptr);
        Some(Operand { value, ty })
    }

    /// Address of `name[index]` and the element type.
    pub fn element_address(&mut self, pos: Pos, name: &str, index: &Expr) -> Option<(Value, Type)> {
        let (storage, ty, by_ref) = self.variable(pos, name)?;
        let Some((element, size)) = ty.element() else {
            self.report(
                DiagnosticKind::TypeMismatch,
                pos,
                format!("'{name}' is {ty} and cannot be indexed"),
            );
            return None;
        };
        let element = element.clone();

        let idx = self.lower_expr(index)?;
        if idx.ty != Type::Int {
            self.report(
                DiagnosticKind::TypeMismatch,
                index.pos(),
                format!("array index must be int, found {}", idx.ty),
            );
            return None;
        }
        if let Some(n) = constant_index(index) {
            if n < 0 || n >= i64::from(size) {
                self.report(
                    DiagnosticKind::IndexOutOfBounds,
                    index.pos(),
                    format!("index {n} is out of bounds for '{name}' of type {ty}"),
                );
                return None;
            }
        }

        let base = self.variable_address(storage, by_ref);
        let ptr = self.builder.build_element_ptr(&ty.render(), base, idx.value);
        Some((ptr, element))
    }

    fn lower_unary(&mut self, pos: Pos, op: UnOp, operand: &Expr) -> Option<Operand> {
        let v = self.lower_expr(operand)?;
        let (expected, ir_op) = match op {
            UnOp::Neg => (Type::Int, UnaryOp::Neg),
            UnOp::Not => (Type::Bool, UnaryOp::Not),
        };
        if v.ty != expected {
            let sym = if op == UnOp::Neg { "-" } else { "!" };
            self.report(
                DiagnosticKind::TypeMismatch,
                pos,
                format!("unary '{sym}' needs {expected}, found {}", v.ty),
            );
            return None;
        }
        let value = self.builder.build_unary(ir_op, v.value);
        Some(Operand {
            value,
            ty: expected,
        })
    }

    fn lower_binary(&mut self, pos: Pos, op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Operand> {
        // Both sides are lowered, left first, even if the left one failed.
        let l = self.lower_expr(lhs);
        let r = self.lower_expr(rhs);
        let (l, r) = (l?, r?);

        let operands_ok = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                l.ty == Type::Int && r.ty == Type::Int
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => l.ty == Type::Int && r.ty == Type::Int,
            BinOp::Eq | BinOp::Ne => types::equals(&l.ty, &r.ty) && l.ty.is_scalar(),
            BinOp::And | BinOp::Or => l.ty == Type::Bool && r.ty == Type::Bool,
        };
        if !operands_ok {
            self.report(
                DiagnosticKind::TypeMismatch,
                pos,
                format!("operator '{op}' cannot be applied to {} and {}", l.ty, r.ty),
            );
            return None;
        }

        if let Some(arith) = map_arith(op) {
            let value = self.builder.build_binary(arith, l.value, r.value);
            let ty = l.ty;
            return Some(Operand { value, ty });
        }
        if let Some(pred) = map_rel(op) {
            let value = self.builder.build_compare(pred, l.value, r.value);
            return Some(Operand {
                value,
                ty: Type::Bool,
            });
        }
        unreachable!("operator '{op}' has no lowering")
    }

    /// Check and emit a call. Arguments are only lowered once the arity is
    /// known to match; the call is emitted only if every argument checks.
    pub fn lower_call(&mut self, pos: Pos, callee: &str, args: &[Expr]) -> CallOutcome {
        let (func, return_type, params) = match self.resolve(callee) {
            Some(Symbol::Function {
                func,
                return_type,
                params,
            }) => (func, return_type, params),
            Some(other) => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    pos,
                    format!("'{callee}' is a {}, not a function", other.kind_name()),
                );
                return CallOutcome::Rejected;
            }
            None => {
                self.report(
                    DiagnosticKind::UndefinedSymbol,
                    pos,
                    format!("undefined function '{callee}'"),
                );
                return CallOutcome::Rejected;
            }
        };

        if args.len() != params.len() {
            self.report(
                DiagnosticKind::ArityMismatch,
                pos,
                format!(
                    "'{callee}' takes {} argument(s), {} given",
                    params.len(),
                    args.len()
                ),
            );
            return CallOutcome::Rejected;
        }

        let mut values = Vec::with_capacity(args.len());
        let mut accepted = true;
        for (i, (arg, param)) in args.iter().zip(&params).enumerate() {
            let value = if param.is_array() {
                self.array_argument(arg, param, callee, i)
            } else {
                self.lower_expr(arg).and_then(|v| {
                    self.expect_assignable(arg.pos(), param, &v.ty, || {
                        format!("argument {} of '{callee}'", i + 1)
                    })
                    .map(|()| v.value)
                })
            };
            match value {
                Some(v) => values.push(v),
                None => accepted = false,
            }
        }
        if !accepted {
            return CallOutcome::Rejected;
        }

        tracing::trace!(callee, args = values.len(), "call");
        match (self.builder.build_call(func, values), return_type) {
            (Some(value), Some(ty)) => CallOutcome::Value(Operand { value, ty }),
            _ => CallOutcome::Void,
        }
    }

    /// Arrays are passed by address, so the argument must name an array
    /// variable of exactly the parameter's type.
    fn array_argument(&mut self, arg: &Expr, param: &Type, callee: &str, i: usize) -> Option<Value> {
        let Expr::Ident(pos, name) = arg else {
            let found = self.lower_expr(arg)?.ty;
            self.report(
                DiagnosticKind::TypeMismatch,
                arg.pos(),
                format!(
                    "argument {} of '{callee}': expected {param} variable, found {found} expression",
                    i + 1
                ),
            );
            return None;
        };
        let (storage, ty, by_ref) = self.variable(*pos, name)?;
        self.expect_assignable(*pos, param, &ty, || {
            format!("argument {} of '{callee}'", i + 1)
        })?;
        Some(self.variable_address(storage, by_ref))
    }
}

/// Integer literal index, possibly negated, known before run time.
fn constant_index(index: &Expr) -> Option<i64> {
    match index {
        Expr::Literal(_, Literal::Int(n)) => Some(i64::from(*n)),
        Expr::Unary {
            op: UnOp::Neg,
            operand,
            ..
        } => constant_index(operand).map(|n| -n),
        _ => None,
    }
}

pub fn map_arith(op: BinOp) -> Option<BinaryOp> {
    Some(match op {
        BinOp::Add => BinaryOp::Add,
        BinOp::Sub => BinaryOp::Sub,
        BinOp::Mul => BinaryOp::Mul,
        BinOp::Div => BinaryOp::SDiv,
        BinOp::Mod => BinaryOp::SRem,
        BinOp::And => BinaryOp::And,
        BinOp::Or => BinaryOp::Or,
        _ => return None,
    })
}

pub fn map_rel(op: BinOp) -> Option<IntPredicate> {
    Some(match op {
        BinOp::Lt => IntPredicate::Slt,
        BinOp::Le => IntPredicate::Sle,
        BinOp::Gt => IntPredicate::Sgt,
        BinOp::Ge => IntPredicate::Sge,
        BinOp::Eq => IntPredicate::Eq,
        BinOp::Ne => IntPredicate::Ne,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_indices() {
        let p = Pos::default();
        let lit = |n| Expr::Literal(p, Literal::Int(n));
        assert_eq!(constant_index(&lit(3)), Some(3));
        let neg = Expr::Unary {
            pos: p,
            op: UnOp::Neg,
            operand: Box::new(lit(1)),
        };
        assert_eq!(constant_index(&neg), Some(-1));
        assert_eq!(constant_index(&Expr::Ident(p, "i".into())), None);
    }

    #[test]
    fn division_is_signed() {
        assert_eq!(map_arith(BinOp::Div), Some(BinaryOp::SDiv));
        assert_eq!(map_arith(BinOp::Mod), Some(BinaryOp::SRem));
        assert_eq!(map_arith(BinOp::Lt), None);
        assert_eq!(map_rel(BinOp::Ge), Some(IntPredicate::Sge));
        assert_eq!(map_rel(BinOp::Add), None);
    }
}

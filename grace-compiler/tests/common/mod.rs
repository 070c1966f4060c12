// Tree-building shorthands shared by the integration tests. There is no
// parser in this crate, so programs are assembled by hand.
#![allow(dead_code)]

use grace_compiler::ast::*;
use grace_compiler::ir::{Function, Instr, Module};
use grace_compiler::{lower, Diagnostic, DiagnosticKind, LowerOutput, Type};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn p() -> Pos {
    Pos::default()
}

pub fn at(line: usize, column: usize) -> Pos {
    Pos::new(line, column)
}

pub fn program(stmts: Vec<Stmt>) -> Program {
    Program {
        body: Block::new(stmts),
    }
}

pub fn run(stmts: Vec<Stmt>) -> LowerOutput {
    init_tracing();
    lower(&program(stmts))
}

// ── expressions ──────────────────────────────────────────────────────────

pub fn int(n: i32) -> Expr {
    Expr::Literal(p(), Literal::Int(n))
}

pub fn boolean(b: bool) -> Expr {
    Expr::Literal(p(), Literal::Bool(b))
}

pub fn string(s: &str) -> Expr {
    Expr::Literal(p(), Literal::Str(s.to_string()))
}

pub fn ident(name: &str) -> Expr {
    Expr::Ident(p(), name.to_string())
}

pub fn index(name: &str, i: Expr) -> Expr {
    Expr::Index {
        pos: p(),
        name: name.to_string(),
        index: Box::new(i),
    }
}

pub fn neg(e: Expr) -> Expr {
    Expr::Unary {
        pos: p(),
        op: UnOp::Neg,
        operand: Box::new(e),
    }
}

pub fn not(e: Expr) -> Expr {
    Expr::Unary {
        pos: p(),
        op: UnOp::Not,
        operand: Box::new(e),
    }
}

pub fn bin(lhs: Expr, op: BinOp, rhs: Expr) -> Expr {
    Expr::Binary {
        pos: p(),
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn call(callee: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        pos: p(),
        callee: callee.to_string(),
        args,
    }
}

// ── statements ───────────────────────────────────────────────────────────

pub fn var(name: &str, ty: Type, init: Option<Expr>) -> Stmt {
    Stmt::VarDecl {
        pos: p(),
        name: name.to_string(),
        ty,
        init,
    }
}

pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        pos: p(),
        name: name.to_string(),
        value,
    }
}

pub fn compound(name: &str, op: CompoundOp, value: Expr) -> Stmt {
    Stmt::CompoundAssign {
        pos: p(),
        name: name.to_string(),
        op,
        value,
    }
}

pub fn array_assign(name: &str, elements: Vec<Literal>) -> Stmt {
    Stmt::ArrayAssign {
        pos: p(),
        name: name.to_string(),
        elements,
    }
}

pub fn index_assign(name: &str, i: Expr, value: Expr) -> Stmt {
    Stmt::IndexAssign {
        pos: p(),
        name: name.to_string(),
        index: i,
        value,
    }
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block {
        pos: p(),
        body: Block::new(stmts),
    }
}

pub fn func(name: &str, ret: Option<Type>, params: Vec<(&str, Type)>, body: Vec<Stmt>) -> Stmt {
    Stmt::FuncDecl {
        pos: p(),
        name: name.to_string(),
        return_type: ret,
        params: params
            .into_iter()
            .map(|(name, ty)| Param {
                name: name.to_string(),
                ty,
            })
            .collect(),
        body: Block::new(body),
    }
}

pub fn if_(condition: Expr, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If {
        pos: p(),
        condition,
        then_block: Block::new(then_body),
        else_block: else_body.map(Block::new),
    }
}

pub fn while_(condition: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        pos: p(),
        condition,
        body: Block::new(body),
    }
}

pub fn for_(init: Stmt, condition: Expr, step: Stmt, body: Vec<Stmt>) -> Stmt {
    Stmt::For {
        pos: p(),
        init: Box::new(init),
        condition,
        step: Box::new(step),
        body: Block::new(body),
    }
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return { pos: p(), value }
}

pub fn skip() -> Stmt {
    Stmt::Skip { pos: p() }
}

pub fn stop() -> Stmt {
    Stmt::Stop { pos: p() }
}

pub fn write(format: &str, args: Vec<Expr>) -> Stmt {
    Stmt::Write {
        pos: p(),
        format: format.to_string(),
        args,
    }
}

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr { pos: p(), expr: e }
}

// ── assertions ───────────────────────────────────────────────────────────

pub fn kinds(out: &LowerOutput) -> Vec<DiagnosticKind> {
    out.diagnostics.iter().map(|d| d.kind).collect()
}

/// The output holds exactly one diagnostic, an error of `kind`.
pub fn assert_single_error(out: &LowerOutput, kind: DiagnosticKind) -> &Diagnostic {
    assert_eq!(
        kinds(out),
        vec![kind],
        "unexpected diagnostics: {:#?}",
        out.diagnostics
    );
    let diag = &out.diagnostics[0];
    assert!(diag.is_error(), "expected error severity: {diag}");
    diag
}

pub fn assert_clean(out: &LowerOutput) {
    assert!(
        out.diagnostics.is_empty(),
        "unexpected diagnostics: {:#?}",
        out.diagnostics
    );
}

pub fn function<'m>(module: &'m Module, name: &str) -> &'m Function {
    module
        .function(name)
        .unwrap_or_else(|| panic!("no function '{name}' in:\n{module}"))
}

pub fn stores(f: &Function) -> usize {
    f.count_instrs(|i| matches!(i, Instr::Store { .. }))
}

pub fn calls(f: &Function) -> usize {
    f.count_instrs(|i| matches!(i, Instr::Call { .. }))
}

pub fn block_names(f: &Function) -> Vec<&str> {
    f.blocks.iter().map(|b| b.name.as_str()).collect()
}

/// Names of the blocks the terminator of `block` can jump to.
pub fn successors<'f>(f: &'f Function, block: &str) -> Vec<&'f str> {
    let b = f
        .block_named(block)
        .unwrap_or_else(|| panic!("no block '{block}' in '{}'", f.name));
    b.terminator()
        .map(|t| t.successors())
        .unwrap_or_default()
        .into_iter()
        .map(|id| f.blocks[id.index].name.as_str())
        .collect()
}

/// Blocks whose terminator can jump to `block`.
pub fn predecessors<'f>(f: &'f Function, block: &str) -> Vec<&'f str> {
    f.blocks
        .iter()
        .filter(|b| successors(f, &b.name).contains(&block))
        .map(|b| b.name.as_str())
        .collect()
}

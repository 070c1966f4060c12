mod common;

use common::*;
use grace_compiler::ast::{BinOp, CompoundOp};
use grace_compiler::ir::{verify_module, Instr, ModuleBuilder, Value};
use grace_compiler::lower::Gen;
use grace_compiler::{DiagnosticKind, LowerOptions, Type};

// ── Block structure ──────────────────────────────────────────────────────
// Every construct must leave each block it created with exactly one
// terminator; `verify_module` checks that for the whole module.

#[test]
fn if_else_makes_three_blocks() {
    let out = run(vec![
        var("c", Type::Bool, Some(boolean(true))),
        if_(
            ident("c"),
            vec![write("yes\n", vec![])],
            Some(vec![write("no\n", vec![])]),
        ),
    ]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));

    let main = function(&out.module, "main");
    assert_eq!(block_names(main), vec!["entry", "then", "else", "merge"]);
    assert_eq!(successors(main, "entry"), vec!["then", "else"]);
    assert_eq!(successors(main, "then"), vec!["merge"]);
    assert_eq!(successors(main, "else"), vec!["merge"]);
}

#[test]
fn if_without_else_falls_to_merge() {
    let out = run(vec![if_(boolean(false), vec![write("x", vec![])], None)]);
    assert_clean(&out);
    let main = function(&out.module, "main");
    assert_eq!(block_names(main), vec!["entry", "then", "merge"]);
    assert_eq!(successors(main, "entry"), vec!["then", "merge"]);
    assert_eq!(predecessors(main, "merge"), vec!["entry", "then"]);
}

#[test]
fn arms_that_return_do_not_branch_to_merge() {
    let out = run(vec![func(
        "sign",
        Some(Type::Int),
        vec![("n", Type::Int)],
        vec![if_(
            bin(ident("n"), BinOp::Lt, int(0)),
            vec![ret(Some(neg(int(1))))],
            Some(vec![ret(Some(int(1)))]),
        )],
    )]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));

    let f = function(&out.module, "sign");
    assert!(predecessors(f, "merge").is_empty());
    assert_eq!(
        f.block_named("merge").unwrap().terminator(),
        Some(&Instr::Unreachable)
    );
}

#[test]
fn while_loop_shape() {
    let out = run(vec![
        var("i", Type::Int, Some(int(0))),
        while_(
            bin(ident("i"), BinOp::Lt, int(10)),
            vec![compound("i", CompoundOp::Add, int(1))],
        ),
    ]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));

    let main = function(&out.module, "main");
    assert_eq!(
        block_names(main),
        vec!["entry", "while.cond", "while.body", "while.end"]
    );
    assert_eq!(successors(main, "entry"), vec!["while.cond"]);
    assert_eq!(successors(main, "while.cond"), vec!["while.body", "while.end"]);
    assert_eq!(successors(main, "while.body"), vec!["while.cond"]);
}

#[test]
fn for_loop_tests_before_first_iteration() {
    let out = run(vec![for_(
        var("i", Type::Int, Some(int(0))),
        boolean(false),
        compound("i", CompoundOp::Add, int(1)),
        vec![write("never\n", vec![])],
    )]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));

    let main = function(&out.module, "main");
    assert_eq!(
        block_names(main),
        vec!["entry", "for.cond", "for.body", "for.step", "for.end"]
    );
    // Entry goes straight to the test; body and step are reachable only
    // through it.
    assert_eq!(successors(main, "entry"), vec!["for.cond"]);
    assert_eq!(predecessors(main, "for.body"), vec!["for.cond"]);
    assert_eq!(predecessors(main, "for.step"), vec!["for.body"]);
    assert_eq!(
        main.block_named("for.cond").unwrap().terminator(),
        Some(&Instr::CondBr {
            cond: Value::bool(false),
            then_block: grace_compiler::ir::BlockId {
                func: grace_compiler::ir::FuncId(0),
                index: 2
            },
            else_block: grace_compiler::ir::BlockId {
                func: grace_compiler::ir::FuncId(0),
                index: 4
            },
        })
    );

    // The loop variable is local to the loop.
    assert!(out.module.globals.iter().all(|g| g.name != "i"));
}

#[test]
fn for_variable_is_not_visible_after_loop() {
    let out = run(vec![
        for_(
            var("i", Type::Int, Some(int(0))),
            bin(ident("i"), BinOp::Lt, int(3)),
            compound("i", CompoundOp::Add, int(1)),
            vec![],
        ),
        assign("i", int(0)),
    ]);
    assert_single_error(&out, DiagnosticKind::UndefinedSymbol);
}

#[test]
fn skip_in_for_goes_to_step() {
    let out = run(vec![for_(
        var("i", Type::Int, Some(int(0))),
        bin(ident("i"), BinOp::Lt, int(3)),
        compound("i", CompoundOp::Add, int(1)),
        vec![skip()],
    )]);
    assert_clean(&out);
    let main = function(&out.module, "main");
    assert_eq!(successors(main, "for.body"), vec!["for.step"]);
    assert_eq!(successors(main, "for.step"), vec!["for.cond"]);
}

#[test]
fn nested_loops_resolve_to_innermost() {
    let out = run(vec![
        var("a", Type::Bool, Some(boolean(true))),
        while_(
            ident("a"),
            vec![
                while_(ident("a"), vec![skip()]),
                while_(ident("a"), vec![block(vec![block(vec![stop()])])]),
                stop(),
            ],
        ),
    ]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));

    let main = function(&out.module, "main");
    assert_eq!(successors(main, "while.body1"), vec!["while.cond1"]);
    assert_eq!(successors(main, "while.body2"), vec!["while.end2"]);
    // The outer `stop` runs after the second inner loop.
    assert_eq!(successors(main, "while.end2"), vec!["while.end"]);
}

#[test]
fn statements_after_return_are_isolated() {
    let out = run(vec![func(
        "f",
        Some(Type::Int),
        vec![],
        vec![ret(Some(int(1))), write("dead\n", vec![])],
    )]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));

    let f = function(&out.module, "f");
    assert_eq!(block_names(f), vec!["entry", "dead"]);
    assert!(predecessors(f, "dead").is_empty());
    assert_eq!(calls(f), 1);
}

#[test]
fn statements_after_skip_are_isolated() {
    let out = run(vec![while_(
        boolean(true),
        vec![skip(), write("dead\n", vec![]), stop()],
    )]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));
    let main = function(&out.module, "main");
    assert_eq!(successors(main, "while.body"), vec!["while.cond"]);
    assert_eq!(successors(main, "dead"), vec!["while.end"]);
}

#[test]
fn loop_context_does_not_leak_into_functions() {
    let out = run(vec![while_(
        boolean(true),
        vec![func("f", None, vec![], vec![skip()]), stop()],
    )]);
    assert_single_error(&out, DiagnosticKind::InvalidBreakContinue);
    assert_eq!(verify_module(&out.module), Ok(()));
}

#[test]
fn missing_return_path_is_trapped() {
    let out = run(vec![func(
        "f",
        Some(Type::Int),
        vec![("x", Type::Int)],
        vec![compound("x", CompoundOp::Add, int(1))],
    )]);
    assert_eq!(kinds(&out), vec![DiagnosticKind::MissingReturn]);
    let f = function(&out.module, "f");
    assert_eq!(stores(f), 2);
    assert_eq!(f.blocks[0].terminator(), Some(&Instr::Unreachable));
    assert_eq!(verify_module(&out.module), Ok(()));
}

// ── Invariants under errors ──────────────────────────────────────────────

#[test]
fn scopes_and_loops_balance_despite_errors() {
    init_tracing();
    let prog = program(vec![
        var("x", Type::Int, None),
        block(vec![var("x", Type::Bool, Some(int(1))), assign("nope", int(1))]),
        while_(
            int(3),
            vec![
                for_(
                    var("i", Type::Bool, Some(int(0))),
                    ident("i"),
                    assign("i", ident("missing")),
                    vec![skip(), ret(None), var("i", Type::Int, None)],
                ),
                expr(call("undefined", vec![])),
            ],
        ),
        func(
            "f",
            Some(Type::Int),
            vec![("a", Type::Int), ("a", Type::Bool)],
            vec![if_(ident("a"), vec![stop()], Some(vec![skip()]))],
        ),
        stop(),
    ]);

    let mut g = Gen::new(ModuleBuilder::new("t"), LowerOptions::default());
    g.lower_program(&prog);
    assert_eq!(g.symbols.depth(), 1);
    assert!(g.loops.is_empty());
    assert!(g.fn_ctx.is_none());

    let (builder, diagnostics) = g.finish();
    assert!(diagnostics.iter().any(|d| d.is_error()));
    assert_eq!(verify_module(&builder.finish()), Ok(()));
}

#[test]
fn every_block_terminated_in_a_larger_program() {
    let out = run(vec![
        func(
            "gcd",
            Some(Type::Int),
            vec![("a", Type::Int), ("b", Type::Int)],
            vec![
                while_(
                    bin(ident("b"), BinOp::Ne, int(0)),
                    vec![
                        var("t", Type::Int, Some(bin(ident("a"), BinOp::Mod, ident("b")))),
                        assign("a", ident("b")),
                        assign("b", ident("t")),
                    ],
                ),
                ret(Some(ident("a"))),
            ],
        ),
        var("n", Type::Int, Some(int(0))),
        for_(
            var("i", Type::Int, Some(int(1))),
            bin(ident("i"), BinOp::Le, int(20)),
            compound("i", CompoundOp::Add, int(1)),
            vec![
                if_(
                    bin(call("gcd", vec![ident("i"), int(6)]), BinOp::Eq, int(1)),
                    vec![skip()],
                    None,
                ),
                if_(
                    bin(ident("n"), BinOp::Gt, int(5)),
                    vec![stop()],
                    Some(vec![compound("n", CompoundOp::Add, int(1))]),
                ),
                write("%d\n", vec![ident("i")]),
            ],
        ),
    ]);
    assert_clean(&out);
    assert_eq!(verify_module(&out.module), Ok(()));
}

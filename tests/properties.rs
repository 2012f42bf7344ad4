//! Property-based tests for the invariants `spec.md` §8 calls out
//! explicitly: round-trip, fold soundness, and loop-labeling coverage.
//! Styled after `proptest!` blocks in the retrieved `vrtbl-passerine`
//! lexer/reader tests — small recursive string strategies, `prop_assert_eq!`
//! against a second run of the same pipeline stage.

use proptest::prelude::*;
use venom::ast::{Program, Stmt, StmtKind};
use venom::{lexer, parser, printer, semantics};

/// Small parenthesized arithmetic expressions over single-digit number
/// literals, recursively combined with `+ - * /`. Kept shallow (depth 4,
/// up to 32 nodes) so generated programs stay fast to lex/parse/run.
fn expr_strategy() -> impl Strategy<Value = String> {
    let leaf = (0i32..20).prop_map(|n| n.to_string());
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            inner.clone(),
            prop_oneof![Just("+"), Just("-"), Just("*"), Just("/")],
            inner,
        )
            .prop_map(|(lhs, op, rhs)| format!("({lhs} {op} {rhs})"))
    })
}

proptest! {
    /// Printing a parsed program then re-parsing and re-printing it
    /// yields the same text: the printer is a faithful, idempotent
    /// serialization of the tree the parser built.
    #[test]
    fn round_trip_is_structurally_stable(expr in expr_strategy()) {
        let source = format!("print {expr};");

        let tokens = lexer::lex(&source).expect("lex");
        let program = parser::parse(&tokens).expect("parse");
        let once = printer::print_program(&program);

        let tokens2 = lexer::lex(&once).expect("lex printed output");
        let program2 = parser::parse(&tokens2).expect("parse printed output");
        let twice = printer::print_program(&program2);

        prop_assert_eq!(once, twice);
    }

    /// Folding a binary-of-literals node must not change what the
    /// program prints: running the same source with the optimizer off
    /// and on produces identical stdout.
    #[test]
    fn constant_folding_preserves_output(expr in expr_strategy()) {
        let source = format!("print {expr};");

        let mut unoptimized = Vec::new();
        let mut optimized = Vec::new();
        venom::run(&source, &mut unoptimized, false).expect("unoptimized run");
        venom::run(&source, &mut optimized, true).expect("optimized run");

        prop_assert_eq!(unoptimized, optimized);
    }

    /// After the loop-labeling pass, every `while` in an arbitrarily
    /// deep nest has a non-empty, unique label, and a `break` sitting
    /// directly in the innermost loop's body resolves to that loop's
    /// label (not an outer one).
    #[test]
    fn loop_labeling_covers_arbitrary_nesting(depth in 1u32..6) {
        let mut body = "break;".to_string();
        for _ in 0..depth {
            body = format!("while (1 < 2) {{ {body} }}");
        }

        let tokens = lexer::lex(&body).expect("lex");
        let mut program = parser::parse(&tokens).expect("parse");
        semantics::label_program(&mut program, None).expect("labeling");

        let (while_labels, break_label) = collect_labels(&program);
        prop_assert_eq!(while_labels.len() as u32, depth);
        prop_assert!(while_labels.iter().all(|l| !l.is_empty()));
        let unique: std::collections::HashSet<_> = while_labels.iter().collect();
        prop_assert_eq!(unique.len(), while_labels.len());
        prop_assert_eq!(break_label.as_deref(), while_labels.last().map(|s| s.as_str()));
    }
}

/// Walks a single-statement program of nested `while`s down to a
/// `break`, returning the `while` labels outer-to-inner and the
/// `break`'s resolved label.
fn collect_labels(program: &Program) -> (Vec<String>, Option<String>) {
    let mut labels = Vec::new();
    let mut break_label = None;
    let mut stmt = program.stmts.first();
    while let Some(s) = stmt {
        match &s.kind {
            StmtKind::While { label, body, .. } => {
                labels.push(label.clone());
                stmt = body_first(body);
            }
            StmtKind::Break { label } => {
                break_label = Some(label.clone());
                stmt = None;
            }
            _ => stmt = None,
        }
    }
    (labels, break_label)
}

fn body_first(stmt: &Stmt) -> Option<&Stmt> {
    match &stmt.kind {
        StmtKind::Block(block) => block.stmts.first(),
        _ => Some(stmt),
    }
}

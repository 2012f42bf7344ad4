//! Loop-labeling pass: gives every loop a unique synthetic label and
//! binds each `break`/`continue` to its textually enclosing loop.
//!
//! Grounded on `loop_label_program`/`loop_label_stmt` in the original
//! implementation's semantics pass, with one deliberate deviation: a
//! `fn` body resets the current label to `None` rather than inheriting
//! it from its enclosing context, so `break`/`continue` inside a
//! function body can never resolve to a loop the function is nested
//! in lexically but not dynamically. The original inherits the label,
//! which would let such a `break` compile; that is flagged as "almost
//! certainly a bug" and deliberately not reproduced here.

use crate::ast::{Program, Stmt, StmtKind};
use crate::token::Span;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("'break' statement outside the loop")]
    BreakOutsideLoop { span: Span },
    #[error("'continue' statement outside the loop")]
    ContinueOutsideLoop { span: Span },
}

impl Error {
    /// The source range this error covers, for [`crate::diagnostics::render`].
    pub fn span(&self) -> Span {
        match self {
            Error::BreakOutsideLoop { span } => *span,
            Error::ContinueOutsideLoop { span } => *span,
        }
    }
}

/// Monotonic label counter, process-wide within one compilation.
struct Labeler {
    counter: usize,
}

impl Labeler {
    fn new() -> Labeler {
        Labeler { counter: 0 }
    }

    fn fresh(&mut self, prefix: &str) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("{prefix}_{n}")
    }
}

/// Labels every loop in `program` and binds its `break`/`continue`
/// statements. `current` is the enclosing loop label to start from —
/// always `None` for a top-level program.
pub fn label_program(program: &mut Program, current: Option<String>) -> Result<(), Error> {
    let mut labeler = Labeler::new();
    for stmt in &mut program.stmts {
        label_stmt(stmt, current.clone(), &mut labeler)?;
    }
    Ok(())
}

fn label_stmt(stmt: &mut Stmt, current: Option<String>, labeler: &mut Labeler) -> Result<(), Error> {
    match &mut stmt.kind {
        StmtKind::While { body, label, .. } => {
            let fresh = labeler.fresh("while");
            label_stmt(body, Some(fresh.clone()), labeler)?;
            *label = fresh;
        }
        StmtKind::DoWhile { body, label, .. } => {
            let fresh = labeler.fresh("dowhile");
            label_stmt(body, Some(fresh.clone()), labeler)?;
            *label = fresh;
        }
        StmtKind::For { body, label, .. } => {
            let fresh = labeler.fresh("for");
            label_stmt(body, Some(fresh.clone()), labeler)?;
            *label = fresh;
        }
        StmtKind::Break { label } => match current {
            Some(current) => *label = current,
            None => return Err(Error::BreakOutsideLoop { span: stmt.span }),
        },
        StmtKind::Continue { label } => match current {
            Some(current) => *label = current,
            None => return Err(Error::ContinueOutsideLoop { span: stmt.span }),
        },
        StmtKind::Fn { body, .. } => {
            for inner in &mut body.stmts {
                label_stmt(inner, None, labeler)?;
            }
        }
        StmtKind::Block(block) => {
            for inner in &mut block.stmts {
                label_stmt(inner, current.clone(), labeler)?;
            }
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            label_stmt(then_branch, current.clone(), labeler)?;
            if let Some(else_branch) = else_branch {
                label_stmt(else_branch, current, labeler)?;
            }
        }
        StmtKind::Impl { methods, .. } => {
            for method in methods {
                label_stmt(method, None, labeler)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn label(source: &str) -> Result<Program, Error> {
        let tokens = lex(source).unwrap();
        let mut program = parse(&tokens).unwrap();
        label_program(&mut program, None)?;
        Ok(program)
    }

    fn find_while_label(stmt: &Stmt) -> Option<&str> {
        match &stmt.kind {
            StmtKind::While { label, .. } => Some(label),
            _ => None,
        }
    }

    #[test]
    fn test_labels_distinct_loops() {
        let program = label("while (true) { break; } while (true) { break; }").unwrap();
        let a = find_while_label(&program.stmts[0]).unwrap().to_string();
        let b = find_while_label(&program.stmts[1]).unwrap().to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_break_binds_to_enclosing_loop() {
        let program = label("while (true) { break; }").unwrap();
        let label_name = find_while_label(&program.stmts[0]).unwrap().to_string();
        match &program.stmts[0].kind {
            StmtKind::While { body, .. } => match &body.kind {
                StmtKind::Block(block) => match &block.stmts[0].kind {
                    StmtKind::Break { label } => assert_eq!(label, &label_name),
                    other => panic!("expected break, got {:?}", other),
                },
                other => panic!("expected block, got {:?}", other),
            },
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn test_break_outside_loop_is_error() {
        let err = label("break;").unwrap_err();
        assert!(matches!(err, Error::BreakOutsideLoop { .. }));
    }

    #[test]
    fn test_continue_outside_loop_is_error() {
        let err = label("continue;").unwrap_err();
        assert!(matches!(err, Error::ContinueOutsideLoop { .. }));
    }

    #[test]
    fn test_fn_body_resets_loop_context() {
        // deviates from the original: a `break` inside a function body
        // never resolves to a loop the function is lexically nested in
        let err = label("while (true) { fn f() { break; } }").unwrap_err();
        assert!(matches!(err, Error::BreakOutsideLoop { .. }));
    }

    #[test]
    fn test_nested_loops_each_get_their_own_label() {
        let program = label("while (true) { while (true) { break; } }").unwrap();
        let outer_label = find_while_label(&program.stmts[0]).unwrap().to_string();
        match &program.stmts[0].kind {
            StmtKind::While { body, .. } => match &body.kind {
                StmtKind::Block(block) => {
                    let inner_label = find_while_label(&block.stmts[0]).unwrap().to_string();
                    assert_ne!(outer_label, inner_label);
                }
                other => panic!("expected block, got {:?}", other),
            },
            other => panic!("expected while, got {:?}", other),
        }
    }
}

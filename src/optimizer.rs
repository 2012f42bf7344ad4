//! Constant-folding optimizer: a bottom-up pass that rewrites binary
//! and logical expressions whose operands are both literals after
//! recursion into a single literal. Idempotent — a second pass over
//! already-folded output makes no further changes.
//!
//! Grounded on `optimize_expr`/`optimize_stmt` in the original
//! implementation's optimizer pass (the `HANDLE_OPER`/`APPLY_NUMERIC`/
//! `APPLY_BOOLEAN` macros there fold the same operator sets this module
//! folds explicitly per match arm).

use crate::ast::{BinOp, Expr, ExprKind, Literal, LogicalOp, Program, Stmt, StmtKind};

/// Runs the pass over every top-level statement, in place.
pub fn optimize_program(program: &mut Program) {
    for stmt in &mut program.stmts {
        optimize_stmt(stmt);
    }
}

fn optimize_stmt(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Let { value, .. } => optimize_expr(value),
        StmtKind::Expr(expr) | StmtKind::Print(expr) => optimize_expr(expr),
        StmtKind::Block(block) => {
            for inner in &mut block.stmts {
                optimize_stmt(inner);
            }
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            optimize_expr(cond);
            optimize_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                optimize_stmt(else_branch);
            }
        }
        StmtKind::While { cond, body, .. } | StmtKind::DoWhile { cond, body, .. } => {
            optimize_expr(cond);
            optimize_stmt(body);
        }
        StmtKind::For {
            init,
            cond,
            advance,
            body,
            ..
        } => {
            if let Some(init) = init {
                optimize_expr(init);
            }
            if let Some(cond) = cond {
                optimize_expr(cond);
            }
            if let Some(advance) = advance {
                optimize_expr(advance);
            }
            optimize_stmt(body);
        }
        StmtKind::Fn { body, .. } => {
            for inner in &mut body.stmts {
                optimize_stmt(inner);
            }
        }
        StmtKind::Decorator { wrapped, .. } => optimize_stmt(wrapped),
        StmtKind::Return { value } | StmtKind::Yield { value } => {
            if let Some(value) = value {
                optimize_expr(value);
            }
        }
        StmtKind::Assert { cond } => optimize_expr(cond),
        StmtKind::Impl { methods, .. } => {
            for method in methods {
                optimize_stmt(method);
            }
        }
        StmtKind::Labeled { stmt, .. } => optimize_stmt(stmt),
        StmtKind::Break { .. }
        | StmtKind::Continue { .. }
        | StmtKind::Goto { .. }
        | StmtKind::Struct { .. }
        | StmtKind::Use { .. } => {}
    }
}

fn optimize_expr(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Unary { operand, .. } => optimize_expr(operand),
        ExprKind::Binary { op, lhs, rhs } => {
            optimize_expr(lhs);
            optimize_expr(rhs);
            if let (ExprKind::Literal(l), ExprKind::Literal(r)) = (&lhs.kind, &rhs.kind) {
                if let Some(folded) = fold_binary(*op, l, r) {
                    expr.kind = ExprKind::Literal(folded);
                }
            }
        }
        ExprKind::Logical { op, lhs, rhs } => {
            optimize_expr(lhs);
            optimize_expr(rhs);
            if let (ExprKind::Literal(Literal::Bool(l)), ExprKind::Literal(Literal::Bool(r))) =
                (&lhs.kind, &rhs.kind)
            {
                let folded = match op {
                    LogicalOp::And => *l && *r,
                    LogicalOp::Or => *l || *r,
                };
                expr.kind = ExprKind::Literal(Literal::Bool(folded));
            }
        }
        ExprKind::Assign { value, .. } => optimize_expr(value),
        ExprKind::Call { args, .. } => {
            for arg in args {
                optimize_expr(arg);
            }
        }
        ExprKind::Get { object, .. } => optimize_expr(object),
        ExprKind::Subscript { object, index } => {
            optimize_expr(object);
            optimize_expr(index);
        }
        ExprKind::ArrayLiteral(items) => {
            for item in items {
                optimize_expr(item);
            }
        }
        ExprKind::StructLiteral { fields, .. } => {
            for field in fields {
                optimize_expr(&mut field.value);
            }
        }
        ExprKind::Conditional {
            cond,
            then_branch,
            else_branch,
        } => {
            optimize_expr(cond);
            optimize_expr(then_branch);
            optimize_expr(else_branch);
        }
        ExprKind::Literal(_) | ExprKind::Variable(_) => {}
    }
}

/// Folds a binary node whose operands are already literals, or returns
/// `None` if the operator/operand-kind combination isn't foldable.
/// Division follows IEEE 754: no early divide-by-zero rejection, a
/// folded `1.0 / 0.0` is `inf` just like the VM would produce at
/// runtime.
fn fold_binary(op: BinOp, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
    match (lhs, rhs) {
        (Literal::Number(l), Literal::Number(r)) => match op {
            BinOp::Add => Some(Literal::Number(l + r)),
            BinOp::Sub => Some(Literal::Number(l - r)),
            BinOp::Mul => Some(Literal::Number(l * r)),
            BinOp::Div => Some(Literal::Number(l / r)),
            BinOp::Mod => Some(Literal::Number(l % r)),
            BinOp::Gt => Some(Literal::Bool(l > r)),
            BinOp::Ge => Some(Literal::Bool(l >= r)),
            BinOp::Lt => Some(Literal::Bool(l < r)),
            BinOp::Le => Some(Literal::Bool(l <= r)),
            BinOp::Eq => Some(Literal::Bool(l == r)),
            BinOp::Neq => Some(Literal::Bool(l != r)),
        },
        (Literal::Bool(l), Literal::Bool(r)) => match op {
            BinOp::Eq => Some(Literal::Bool(l == r)),
            BinOp::Neq => Some(Literal::Bool(l != r)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn optimize(source: &str) -> Program {
        let tokens = lex(source).unwrap();
        let mut program = parse(&tokens).unwrap();
        optimize_program(&mut program);
        program
    }

    fn literal(stmt: &Stmt) -> &Literal {
        match &stmt.kind {
            StmtKind::Print(Expr {
                kind: ExprKind::Literal(l),
                ..
            }) => l,
            other => panic!("expected a folded print literal, got {:?}", other),
        }
    }

    #[test]
    fn test_folds_arithmetic() {
        let program = optimize("print 1 + 2 * 3;");
        assert_eq!(literal(&program.stmts[0]), &Literal::Number(7.0));
    }

    #[test]
    fn test_folds_comparison_to_bool() {
        let program = optimize("print 1 < 2;");
        assert_eq!(literal(&program.stmts[0]), &Literal::Bool(true));
    }

    #[test]
    fn test_folds_logical_and_or() {
        let program = optimize("print true && false;");
        assert_eq!(literal(&program.stmts[0]), &Literal::Bool(false));
        let program = optimize("print true || false;");
        assert_eq!(literal(&program.stmts[0]), &Literal::Bool(true));
    }

    #[test]
    fn test_does_not_fold_variable_operands() {
        let program = optimize("let x = 1; print x + 1;");
        match &program.stmts[1].kind {
            StmtKind::Print(Expr {
                kind: ExprKind::Binary { .. },
                ..
            }) => {}
            other => panic!("expected unfolded binary, got {:?}", other),
        }
    }

    #[test]
    fn test_division_by_zero_folds_to_infinity_not_error() {
        let program = optimize("print 1 / 0;");
        match literal(&program.stmts[0]) {
            Literal::Number(n) => assert!(n.is_infinite()),
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_idempotent() {
        let mut program = optimize("print 1 + 2 * 3;");
        optimize_program(&mut program);
        assert_eq!(literal(&program.stmts[0]), &Literal::Number(7.0));
    }

    #[test]
    fn test_folds_only_rhs_of_assignment() {
        let program = optimize("let x = 0; x = 1 + 1;");
        match &program.stmts[1].kind {
            StmtKind::Expr(Expr {
                kind:
                    ExprKind::Assign {
                        value,
                        ..
                    },
                ..
            }) => {
                assert!(matches!(value.kind, ExprKind::Literal(Literal::Number(n)) if n == 2.0));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }
}

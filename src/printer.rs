//! AST-to-source printer, used by the CLI's `--parse` stage and by the
//! round-trip property test: pretty-printing then re-parsing a program
//! must yield a structurally equivalent tree (`spec.md` §8).
//!
//! Every sub-expression is fully parenthesized rather than reproducing
//! the original precedence-aware spacing — correctness of round-trip
//! matters here, not readability of the dump.

use crate::ast::{
    BinOp, Block, Expr, ExprKind, Literal, LogicalOp, Program, Stmt, StmtKind, UnOp,
};
use std::fmt::Write as _;

pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.stmts {
        print_stmt(stmt, &mut out);
        out.push('\n');
    }
    out
}

fn print_stmt(stmt: &Stmt, out: &mut String) {
    match &stmt.kind {
        StmtKind::Let { name, value } => {
            let _ = write!(out, "let {name} = {};", print_expr(value));
        }
        StmtKind::Expr(expr) => {
            let _ = write!(out, "{};", print_expr(expr));
        }
        StmtKind::Print(expr) => {
            let _ = write!(out, "print {};", print_expr(expr));
        }
        StmtKind::Block(block) => print_block(block, out),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let _ = write!(out, "if ({}) ", print_expr(cond));
            print_stmt(then_branch, out);
            if let Some(else_branch) = else_branch {
                out.push_str(" else ");
                print_stmt(else_branch, out);
            }
        }
        StmtKind::While { cond, body, .. } => {
            let _ = write!(out, "while ({}) ", print_expr(cond));
            print_stmt(body, out);
        }
        StmtKind::DoWhile { cond, body, .. } => {
            out.push_str("do ");
            print_stmt(body, out);
            let _ = write!(out, " while ({});", print_expr(cond));
        }
        StmtKind::For {
            init,
            cond,
            advance,
            body,
            ..
        } => {
            out.push_str("for (");
            if let Some(init) = init {
                out.push_str(&print_expr(init));
            }
            out.push(';');
            if let Some(cond) = cond {
                let _ = write!(out, " {}", print_expr(cond));
            }
            out.push(';');
            if let Some(advance) = advance {
                let _ = write!(out, " {}", print_expr(advance));
            }
            out.push_str(") ");
            print_stmt(body, out);
        }
        StmtKind::Break { .. } => out.push_str("break;"),
        StmtKind::Continue { .. } => out.push_str("continue;"),
        StmtKind::Goto { label } => {
            let _ = write!(out, "goto {label};");
        }
        StmtKind::Labeled { label, stmt } => {
            let _ = write!(out, "{label}: ");
            print_stmt(stmt, out);
        }
        StmtKind::Fn { name, params, body } => {
            let _ = write!(out, "fn {name}({}) ", params.join(", "));
            print_block(body, out);
        }
        StmtKind::Decorator { name, wrapped } => {
            let _ = write!(out, "@{name}\n");
            print_stmt(wrapped, out);
        }
        StmtKind::Return { value } => match value {
            Some(expr) => {
                let _ = write!(out, "return {};", print_expr(expr));
            }
            None => out.push_str("return;"),
        },
        StmtKind::Struct { name, properties } => {
            let _ = write!(out, "struct {name} {{ {} }}", properties.join(", "));
        }
        StmtKind::Impl { type_name, methods } => {
            let _ = write!(out, "impl {type_name} {{ ");
            for method in methods {
                print_stmt(method, out);
                out.push(' ');
            }
            out.push('}');
        }
        StmtKind::Use { path } => {
            let _ = write!(out, "use {path};");
        }
        StmtKind::Yield { value } => match value {
            Some(expr) => {
                let _ = write!(out, "yield {};", print_expr(expr));
            }
            None => out.push_str("yield;"),
        },
        StmtKind::Assert { cond } => {
            let _ = write!(out, "assert {};", print_expr(cond));
        }
    }
}

fn print_block(block: &Block, out: &mut String) {
    out.push_str("{ ");
    for stmt in &block.stmts {
        print_stmt(stmt, out);
        out.push(' ');
    }
    out.push('}');
}

fn print_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(lit) => print_literal(lit),
        ExprKind::Variable(name) => name.clone(),
        ExprKind::Unary { op, operand } => {
            let sym = match op {
                UnOp::Neg => "-",
                UnOp::Not => "!",
            };
            format!("({sym}{})", print_expr(operand))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            format!("({} {} {})", print_expr(lhs), binop_sym(*op), print_expr(rhs))
        }
        ExprKind::Logical { op, lhs, rhs } => {
            let sym = match op {
                LogicalOp::And => "&&",
                LogicalOp::Or => "||",
            };
            format!("({} {sym} {})", print_expr(lhs), print_expr(rhs))
        }
        ExprKind::Assign { target, value } => {
            format!("({} = {})", print_expr(target), print_expr(value))
        }
        ExprKind::Call { callee, args } => {
            let rendered: Vec<String> = args.iter().map(print_expr).collect();
            format!("{callee}({})", rendered.join(", "))
        }
        ExprKind::Get { object, name } => format!("{}.{name}", print_expr(object)),
        ExprKind::Subscript { object, index } => {
            format!("{}[{}]", print_expr(object), print_expr(index))
        }
        ExprKind::ArrayLiteral(items) => {
            let rendered: Vec<String> = items.iter().map(print_expr).collect();
            format!("[{}]", rendered.join(", "))
        }
        ExprKind::StructLiteral { name, fields } => {
            let rendered: Vec<String> = fields
                .iter()
                .map(|f| format!("{}: {}", f.name, print_expr(&f.value)))
                .collect();
            format!("{name} {{ {} }}", rendered.join(", "))
        }
        ExprKind::Conditional {
            cond,
            then_branch,
            else_branch,
        } => format!(
            "({} ? {} : {})",
            print_expr(cond),
            print_expr(then_branch),
            print_expr(else_branch)
        ),
    }
}

fn print_literal(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => format!("{n}"),
        Literal::String(s) => format!("{s:?}"),
        Literal::Bool(b) => b.to_string(),
        Literal::Null => "null".to_string(),
    }
}

fn binop_sym(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Eq => "==",
        BinOp::Neq => "!=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn roundtrip(source: &str) -> (Program, Program) {
        let tokens = lex(source).unwrap();
        let original = parse(&tokens).unwrap();
        let printed = print_program(&original);
        let reparsed_tokens = lex(&printed).unwrap();
        let reparsed = parse(&reparsed_tokens).unwrap();
        (original, reparsed)
    }

    fn strip_spans_eq(a: &Program, b: &Program) -> bool {
        // `Span`s differ between the original and reprinted source, so
        // compare everything except spans by re-serializing both and
        // diffing the printer's own (span-free) output.
        print_program(a) == print_program(b)
    }

    #[test]
    fn test_arithmetic_round_trips() {
        let (a, b) = roundtrip("print 1 + 2 * 3;");
        assert!(strip_spans_eq(&a, &b));
    }

    #[test]
    fn test_control_flow_round_trips() {
        let (a, b) = roundtrip(
            "let i = 0; while (i < 3) { if (i == 1) { continue; } print i; i = i + 1; }",
        );
        assert!(strip_spans_eq(&a, &b));
    }

    #[test]
    fn test_struct_round_trips() {
        let (a, b) = roundtrip("struct P { x, y } let p = P { x: 1, y: 2 }; print p.x;");
        assert!(strip_spans_eq(&a, &b));
    }

    #[test]
    fn test_function_round_trips() {
        let (a, b) = roundtrip("fn add(a, b) { return a + b; } print add(1, 2);");
        assert!(strip_spans_eq(&a, &b));
    }
}

//! `venom`: lexer, parser, loop-labeling pass, constant-folding optimizer,
//! bytecode compiler, and stack-based virtual machine for a small
//! dynamically-typed scripting language.
//!
//! The pipeline is strictly sequential and mirrors the module layout:
//! [`token`] and [`lexer`] turn source text into a token stream,
//! [`ast`] and [`parser`] turn tokens into a tree, [`semantics`] labels
//! loops and binds `break`/`continue`, [`optimizer`] folds constant
//! expressions, [`bytecode`] lowers the tree to a linear instruction
//! stream, and [`vm`] executes it.

pub mod ast;
pub mod bytecode;
pub mod clock;
pub mod diagnostics;
pub mod disassembler;
pub mod lexer;
pub mod object;
pub mod optimizer;
pub mod parser;
pub mod printer;
pub mod semantics;
pub mod token;
pub mod vm;

use std::fmt;

/// Stages the CLI can stop after or time independently; also used as the
/// keys for `--measure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Lex,
    Parse,
    LoopLabel,
    Optimize,
    Disassemble,
    Compile,
    Exec,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::LoopLabel => "loop-label",
            Stage::Optimize => "optimize",
            Stage::Disassemble => "disassemble",
            Stage::Compile => "compile",
            Stage::Exec => "exec",
        };
        f.write_str(s)
    }
}

/// Runs the whole pipeline over `source`, writing `print` output through
/// `out`. `optimize` toggles the constant-folding pass. Returns the
/// compiled chunk so callers (the CLI, tests) can also disassemble it.
pub fn run(
    source: &str,
    out: &mut dyn std::io::Write,
    optimize: bool,
) -> Result<bytecode::Chunk, anyhow::Error> {
    let tokens = lexer::lex(source)?;
    let mut program = parser::parse(&tokens)?;
    semantics::label_program(&mut program, None)?;
    if optimize {
        optimizer::optimize_program(&mut program);
    }
    let chunk = bytecode::compile(&program)?;
    let mut machine = vm::Vm::new(&chunk);
    machine.run(out)?;
    Ok(chunk)
}

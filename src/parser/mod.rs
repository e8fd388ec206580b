//! Front-End Parsers
//!
//! The word parser assembles word parts across lexer modes; the Pratt
//! parser handles arithmetic; the conditional parser handles `[[ ]]`;
//! the command parser ties the grammar together. `parse` is the one-call
//! entry point.

pub mod arith_parser;
pub mod bool_parser;
pub mod command_parser;
pub mod word_parser;

use crate::arena::Arena;
use crate::ast::types::Command;
use crate::errors::ShellError;
use crate::lexer::LexerDriver;

/// A parsed program: the command tree plus the arena its spans point
/// into (needed for verbatim printing and diagnostics).
#[derive(Debug, Clone)]
pub struct Program {
    pub root: Command,
    pub arena: Arena,
}

/// Parse shell source with a placeholder path.
pub fn parse(src: &str) -> Result<Program, ShellError> {
    parse_with_path(src, "<input>")
}

/// Parse shell source; `path` appears in diagnostics.
pub fn parse_with_path(src: &str, path: &str) -> Result<Program, ShellError> {
    let mut lx = LexerDriver::new(src, path);
    let root = command_parser::CommandParser::new(&mut lx).parse_whole()?;
    Ok(Program {
        root,
        arena: lx.into_arena(),
    })
}

//! marsh - a POSIX shell front end
//!
//! A mode-switched lexer, a lossless recursive-descent parser, and a
//! word expansion engine. Parsing produces a fully typed AST whose
//! tokens point into a source arena, so the tree pretty-prints back to
//! the original bytes; expansion evaluates word nodes against a variable
//! environment under the POSIX quoting, substitution, and splitting
//! rules.
//!
//! Process execution, job control, and builtins are collaborators
//! behind traits (`CommandSubHandler`, `GlobFs`), not part of this
//! crate.

pub mod arena;
pub mod ast;
pub mod errors;
pub mod expand;
pub mod ids;
pub mod lexer;
pub mod parser;

pub use arena::{Arena, LineSpan};
pub use ast::printer;
pub use ast::types::{Command, Word, WordPart};
pub use errors::{ArithError, ExpandError, GlobError, LexError, ParseError, ShellError};
pub use expand::{
    CancelToken, CommandSubHandler, Env, ExpandOptions, MemFs, StdFs, VarValue, WordEvaluator,
};
pub use parser::{parse, parse_with_path, Program};

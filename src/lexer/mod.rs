//! Mode-Switched Lexer
//!
//! `core` holds the longest-match tables, one per lexical mode; `driver`
//! manages the mode stack, here-doc scheduling, look-ahead, and
//! checkpoints; `token` is the `(id, value, span)` triple everything
//! exchanges.

pub mod core;
pub mod driver;
pub mod modes;
pub mod token;

pub use driver::{Checkpoint, LexerDriver, PendingHeredoc};
pub use modes::LexMode;
pub use token::Token;

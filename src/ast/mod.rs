//! AST schema and the lossless pretty-printer.

pub mod printer;
pub mod types;

pub use types::*;

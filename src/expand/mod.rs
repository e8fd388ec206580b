//! Word Expansion
//!
//! The expansion engine and its collaborators: the scoped variable
//! store, IFS splitting, the shared glob matcher, pathname expansion
//! over a filesystem trait, tilde lookup, and arithmetic evaluation.

pub mod arith_eval;
pub mod env;
pub mod glob;
pub mod param_ops;
pub mod pattern;
pub mod split;
pub mod tilde;
pub mod word_eval;

pub use env::{Env, VarValue};
pub use glob::{GlobEntry, GlobFs, MemFs, StdFs};
pub use word_eval::{CancelToken, CommandSubHandler, ExpandOptions, WordEvaluator};

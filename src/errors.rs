//! Error Taxonomy
//!
//! One enum per failure family, all fail-fast: the lexer and parsers
//! surface at most one error per invocation, the expansion engine
//! short-circuits on the first error in a word. Every variant carries
//! enough provenance to render a `path:line:col:` diagnostic.

use crate::arena::LineSpan;
use thiserror::Error;

/// Lexing failures: unterminated quotes and here-docs, invalid escapes,
/// malformed number literals.
#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("unterminated single-quoted string")]
    UnterminatedSingleQuote { span: Option<LineSpan> },
    #[error("unterminated double-quoted string")]
    UnterminatedDoubleQuote { span: Option<LineSpan> },
    #[error("unterminated backquoted substitution")]
    UnterminatedBacktick { span: Option<LineSpan> },
    #[error("here-document delimited by end-of-file (wanted `{delimiter}`)")]
    UnterminatedHeredoc {
        delimiter: String,
        span: Option<LineSpan>,
    },
    #[error("invalid escape sequence `{text}`")]
    InvalidEscape {
        text: String,
        span: Option<LineSpan>,
    },
    #[error("invalid number literal `{text}`")]
    BadNumberLiteral {
        text: String,
        span: Option<LineSpan>,
    },
}

impl LexError {
    pub fn span(&self) -> Option<LineSpan> {
        match self {
            Self::UnterminatedSingleQuote { span }
            | Self::UnterminatedDoubleQuote { span }
            | Self::UnterminatedBacktick { span }
            | Self::UnterminatedHeredoc { span, .. }
            | Self::InvalidEscape { span, .. }
            | Self::BadNumberLiteral { span, .. } => *span,
        }
    }
}

/// Parse failures: unexpected tokens, missing terminators, malformed
/// redirections and names.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("unexpected token `{got}`{}", expecting_suffix(.expected))]
    UnexpectedToken {
        got: String,
        expected: Option<&'static str>,
        span: Option<LineSpan>,
    },
    #[error("missing `{terminator}`")]
    MissingTerminator {
        terminator: &'static str,
        span: Option<LineSpan>,
    },
    #[error("redirection target must be a word")]
    BadRedirTarget { span: Option<LineSpan> },
    #[error("`{name}` is not a valid assignment target")]
    BadAssignmentLhs {
        name: String,
        span: Option<LineSpan>,
    },
    #[error("`{name}` is not a valid for-loop variable name")]
    BadLoopName {
        name: String,
        span: Option<LineSpan>,
    },
    #[error("`{name}` is not a valid function name")]
    BadFunctionName {
        name: String,
        span: Option<LineSpan>,
    },
    #[error("{message}")]
    Message {
        message: String,
        span: Option<LineSpan>,
    },
}

fn expecting_suffix(expected: &Option<&'static str>) -> String {
    match expected {
        Some(e) => format!(" (expecting `{}`)", e),
        None => String::new(),
    }
}

impl ParseError {
    pub fn span(&self) -> Option<LineSpan> {
        match self {
            Self::Lex(e) => e.span(),
            Self::UnexpectedToken { span, .. }
            | Self::MissingTerminator { span, .. }
            | Self::BadRedirTarget { span }
            | Self::BadAssignmentLhs { span, .. }
            | Self::BadLoopName { span, .. }
            | Self::BadFunctionName { span, .. }
            | Self::Message { span, .. } => *span,
        }
    }

    /// Syntax errors exit a CLI driver with status 2.
    pub fn exit_status(&self) -> i32 {
        2
    }
}

/// Arithmetic evaluation failures.
#[derive(Debug, Clone, Error)]
pub enum ArithError {
    #[error("division by 0")]
    DivideByZero,
    #[error("exponent less than 0")]
    NegativeExponent,
    #[error("invalid arithmetic base (must be 2..64): {base}")]
    BadBase { base: i64 },
    #[error("value too great for base: {digit}")]
    BadBaseDigit { digit: char },
    #[error("invalid number literal `{text}`")]
    BadNumber { text: String },
    #[error("undefined function `{name}`")]
    UndefinedFunction { name: String },
    #[error("assignment target is not a variable")]
    BadLValue,
    #[error("expression recursion limit exceeded")]
    RecursionLimit,
}

/// Expansion failures. Command-substitution failures from the execution
/// layer propagate through `CommandSubFailed`.
#[derive(Debug, Clone, Error)]
pub enum ExpandError {
    #[error("{name}: {message}")]
    ParameterNullOrUnset { name: String, message: String },
    #[error("{name}: unbound variable")]
    UnboundVariable { name: String },
    #[error("{0}")]
    Arith(#[from] ArithError),
    #[error("command substitution failed: {message}")]
    CommandSubFailed { message: String },
    #[error("command substitution is not available in this context")]
    CommandSubUnsupported,
    #[error("{0}")]
    Glob(#[from] GlobError),
    #[error("expansion cancelled")]
    Cancelled,
    #[error("cannot assign to `{name}` here")]
    BadAssignment { name: String },
    #[error("{name}: bad indirect expansion")]
    BadIndirection { name: String },
    #[error("array literal is only valid on the right-hand side of an assignment")]
    ArrayLiteralContext,
}

impl ExpandError {
    pub fn exit_status(&self) -> i32 {
        1
    }
}

/// Pathname-expansion failures (strict mode only; the default policy
/// treats unreadable directories as empty).
#[derive(Debug, Clone, Error)]
pub enum GlobError {
    #[error("cannot read directory `{path}`: {message}")]
    UnreadableDir { path: String, message: String },
}

/// Umbrella error for embedders that drive the whole front end.
#[derive(Debug, Clone, Error)]
pub enum ShellError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Arith(#[from] ArithError),
    #[error("{0}")]
    Expand(#[from] ExpandError),
    #[error("{0}")]
    Glob(#[from] GlobError),
}

impl ShellError {
    /// 2 for syntax errors, 1 for runtime failures.
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Lex(_) | Self::Parse(_) => 2,
            Self::Arith(_) | Self::Expand(_) | Self::Glob(_) => 1,
        }
    }

    pub fn span(&self) -> Option<LineSpan> {
        match self {
            Self::Lex(e) => e.span(),
            Self::Parse(e) => e.span(),
            _ => None,
        }
    }
}

//! Lexical Modes
//!
//! Shell tokenization is context-sensitive: the same characters lex
//! differently in command position, inside double quotes, inside
//! `$((...))`, inside `${...}`, and so on. Each mode names one sub-lexer
//! with its own longest-match rule table in `core.rs`. The driver keeps
//! a stack of these; parsers push and pop at quote and substitution
//! boundaries.

/// The lexical mode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexMode {
    /// Default: command and argument position.
    Outer,
    /// Inside double quotes.
    DQ,
    /// Inside single quotes (only `'` terminates).
    SQ,
    /// Inside `$'...'` (backslash escapes are active).
    DollarSQ,
    /// Inside backticks.
    Backtick,
    /// Inside `$((...))` or `((...))`.
    Arith,
    /// Immediately after `${`, expecting a name or special parameter.
    VS1,
    /// After the name, expecting `}`, a subscript, or a suffix operator.
    VS2,
    /// The argument of `${x:-...}` in unquoted context.
    VSArgUnq,
    /// The argument of `${x:-...}` inside double quotes
    /// (single quotes are literal here).
    VSArgDq,
    /// Right-hand side of `=~` inside `[[ ]]`.
    BashRegex,
    /// Raw here-doc body lines, terminated by the delimiter line.
    HeredocBody,
    /// `#` up to end of line.
    Comment,
}

impl LexMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outer => "OUTER",
            Self::DQ => "DQ",
            Self::SQ => "SQ",
            Self::DollarSQ => "DOLLAR_SQ",
            Self::Backtick => "BACKTICK",
            Self::Arith => "ARITH",
            Self::VS1 => "VS_1",
            Self::VS2 => "VS_2",
            Self::VSArgUnq => "VS_ARG_UNQ",
            Self::VSArgDq => "VS_ARG_DQ",
            Self::BashRegex => "BASH_REGEX",
            Self::HeredocBody => "HEREDOC_BODY",
            Self::Comment => "COMMENT",
        }
    }
}

//! Token Id Registry
//!
//! Every lexical mode emits tokens drawn from this single enumeration.
//! Ids are grouped by family: literals, statement operators, redirections,
//! quote/substitution delimiters, `${...}` operators, and arithmetic
//! operators. The same ids are stored in AST nodes (redirection ops,
//! and-or ops, case-arm terminators) so the lexer and the tree speak one
//! vocabulary.

use std::collections::HashMap;

/// Token identifier. The discriminant set is closed; parsers match
/// exhaustively on the families they admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Id {
    // Sentinels
    Eof,
    Unknown,

    // Emitted but discarded by parsers (kept for provenance)
    WsSpace,
    IgnoredComment,
    IgnoredLineCont, // backslash-newline

    // Literal families (assembled into word parts)
    LitChars,
    LitOther,       // a single char that is literal in the current mode
    LitEscapedChar, // \c
    LitTilde,       // ~
    LitSlash,       // / (kept separate so ~user/path can be split)

    // Statement operators
    OpNewline,
    OpSemi,
    OpAmp,
    OpDSemi,     // ;;
    OpSemiAmp,   // ;&
    OpDSemiAmp,  // ;;&
    OpPipe,
    OpPipeAmp,   // |&
    OpAndIf,     // &&
    OpOrIf,      // ||
    OpBang,
    OpLParen,
    OpRParen,
    OpDLParen,   // ((

    // Redirection operators
    RedirLess,      // <
    RedirGreat,     // >
    RedirDLess,     // <<
    RedirDGreat,    // >>
    RedirDLessDash, // <<-
    RedirLessAnd,   // <&
    RedirGreatAnd,  // >&
    RedirLessGreat, // <>
    RedirClobber,   // >|
    RedirTLess,     // <<<
    RedirAndGreat,  // &>
    RedirAndDGreat, // &>>

    // Quote and substitution delimiters
    LeftSQuote,
    RightSQuote,
    LeftDollarSQuote, // $'
    LeftDQuote,
    RightDQuote,
    LeftBacktick,
    RightBacktick,
    LeftDollarParen,  // $(
    LeftDollarDParen, // $((
    LeftDollarBrace,  // ${
    RightDollarBrace, // }

    // Simple variable substitutions ($name, $1, $?, ...)
    VsubName,
    VsubNumber,
    VsubAt,     // $@
    VsubStar,   // $*
    VsubPound,  // $#
    VsubQMark,  // $?
    VsubDollar, // $$
    VsubBang,   // $!
    VsubHyphen, // $-

    // ${...} prefix operators
    VopPrefixPound, // ${#x} length
    VopPrefixBang,  // ${!x} indirection

    // ${...} suffix operators
    VopColonHyphen, // :-
    VopHyphen,      // -
    VopColonEquals, // :=
    VopEquals,      // =
    VopColonQMark,  // :?
    VopQMark,       // ?
    VopColonPlus,   // :+
    VopPlus,        // +
    VopPercent,     // %
    VopDPercent,    // %%
    VopPound,       // #
    VopDPound,      // ##
    VopSlash,       // /
    VopDSlash,      // //
    VopColon,       // : (slice)
    VopLBracket,    // [

    // Arithmetic operators (ARITH mode)
    ArithComma,
    ArithEqual,
    ArithPlusEqual,
    ArithMinusEqual,
    ArithStarEqual,
    ArithSlashEqual,
    ArithPercentEqual,
    ArithAmpEqual,
    ArithPipeEqual,
    ArithCaretEqual,
    ArithDLessEqual,  // <<=
    ArithDGreatEqual, // >>=
    ArithQMark,
    ArithColon,
    ArithDPipe,
    ArithDAmp,
    ArithPipe,
    ArithCaret,
    ArithAmp,
    ArithDEqual,  // ==
    ArithNEqual,  // !=
    ArithLess,
    ArithLessEqual,
    ArithGreat,
    ArithGreatEqual,
    ArithDLess,  // <<
    ArithDGreat, // >>
    ArithPlus,
    ArithMinus,
    ArithStar,
    ArithSlash,
    ArithPercent,
    ArithDStar, // **
    ArithBang,
    ArithTilde,
    ArithDPlus,  // ++
    ArithDMinus, // --
    ArithLParen,
    ArithRParen,
    ArithSemi,     // ; inside for (( ... ))
    ArithRBracket, // ] closing an array subscript
    ArithRBrace,   // } closing ${x:off}

    // Here-document body line (value is the raw line)
    HeredocLine,
}

impl Id {
    /// Canonical spelling used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Unknown => "UNKNOWN",
            Self::WsSpace => "WHITESPACE",
            Self::IgnoredComment => "COMMENT",
            Self::IgnoredLineCont => "\\<newline>",
            Self::LitChars => "WORD",
            Self::LitOther => "CHAR",
            Self::LitEscapedChar => "ESCAPED",
            Self::LitTilde => "~",
            Self::LitSlash => "/",
            Self::OpNewline => "NEWLINE",
            Self::OpSemi => ";",
            Self::OpAmp => "&",
            Self::OpDSemi => ";;",
            Self::OpSemiAmp => ";&",
            Self::OpDSemiAmp => ";;&",
            Self::OpPipe => "|",
            Self::OpPipeAmp => "|&",
            Self::OpAndIf => "&&",
            Self::OpOrIf => "||",
            Self::OpBang => "!",
            Self::OpLParen => "(",
            Self::OpRParen => ")",
            Self::OpDLParen => "((",
            Self::RedirLess => "<",
            Self::RedirGreat => ">",
            Self::RedirDLess => "<<",
            Self::RedirDGreat => ">>",
            Self::RedirDLessDash => "<<-",
            Self::RedirLessAnd => "<&",
            Self::RedirGreatAnd => ">&",
            Self::RedirLessGreat => "<>",
            Self::RedirClobber => ">|",
            Self::RedirTLess => "<<<",
            Self::RedirAndGreat => "&>",
            Self::RedirAndDGreat => "&>>",
            Self::LeftSQuote => "'",
            Self::RightSQuote => "'",
            Self::LeftDollarSQuote => "$'",
            Self::LeftDQuote => "\"",
            Self::RightDQuote => "\"",
            Self::LeftBacktick => "`",
            Self::RightBacktick => "`",
            Self::LeftDollarParen => "$(",
            Self::LeftDollarDParen => "$((",
            Self::LeftDollarBrace => "${",
            Self::RightDollarBrace => "}",
            Self::VsubName => "$NAME",
            Self::VsubNumber => "$N",
            Self::VsubAt => "$@",
            Self::VsubStar => "$*",
            Self::VsubPound => "$#",
            Self::VsubQMark => "$?",
            Self::VsubDollar => "$$",
            Self::VsubBang => "$!",
            Self::VsubHyphen => "$-",
            Self::VopPrefixPound => "#",
            Self::VopPrefixBang => "!",
            Self::VopColonHyphen => ":-",
            Self::VopHyphen => "-",
            Self::VopColonEquals => ":=",
            Self::VopEquals => "=",
            Self::VopColonQMark => ":?",
            Self::VopQMark => "?",
            Self::VopColonPlus => ":+",
            Self::VopPlus => "+",
            Self::VopPercent => "%",
            Self::VopDPercent => "%%",
            Self::VopPound => "#",
            Self::VopDPound => "##",
            Self::VopSlash => "/",
            Self::VopDSlash => "//",
            Self::VopColon => ":",
            Self::VopLBracket => "[",
            Self::ArithComma => ",",
            Self::ArithEqual => "=",
            Self::ArithPlusEqual => "+=",
            Self::ArithMinusEqual => "-=",
            Self::ArithStarEqual => "*=",
            Self::ArithSlashEqual => "/=",
            Self::ArithPercentEqual => "%=",
            Self::ArithAmpEqual => "&=",
            Self::ArithPipeEqual => "|=",
            Self::ArithCaretEqual => "^=",
            Self::ArithDLessEqual => "<<=",
            Self::ArithDGreatEqual => ">>=",
            Self::ArithQMark => "?",
            Self::ArithColon => ":",
            Self::ArithDPipe => "||",
            Self::ArithDAmp => "&&",
            Self::ArithPipe => "|",
            Self::ArithCaret => "^",
            Self::ArithAmp => "&",
            Self::ArithDEqual => "==",
            Self::ArithNEqual => "!=",
            Self::ArithLess => "<",
            Self::ArithLessEqual => "<=",
            Self::ArithGreat => ">",
            Self::ArithGreatEqual => ">=",
            Self::ArithDLess => "<<",
            Self::ArithDGreat => ">>",
            Self::ArithPlus => "+",
            Self::ArithMinus => "-",
            Self::ArithStar => "*",
            Self::ArithSlash => "/",
            Self::ArithPercent => "%",
            Self::ArithDStar => "**",
            Self::ArithBang => "!",
            Self::ArithTilde => "~",
            Self::ArithDPlus => "++",
            Self::ArithDMinus => "--",
            Self::ArithLParen => "(",
            Self::ArithRParen => ")",
            Self::ArithSemi => ";",
            Self::ArithRBracket => "]",
            Self::ArithRBrace => "}",
            Self::HeredocLine => "HEREDOC_LINE",
        }
    }

    /// Statement operators that terminate a word in command position.
    pub fn is_word_terminator(&self) -> bool {
        matches!(
            self,
            Self::Eof
                | Self::WsSpace
                | Self::OpNewline
                | Self::OpSemi
                | Self::OpAmp
                | Self::OpDSemi
                | Self::OpSemiAmp
                | Self::OpDSemiAmp
                | Self::OpPipe
                | Self::OpPipeAmp
                | Self::OpAndIf
                | Self::OpOrIf
                | Self::OpLParen
                | Self::OpRParen
                | Self::OpDLParen
                | Self::IgnoredComment
        ) || self.is_redir_op()
    }

    /// All redirection opener ids.
    pub fn is_redir_op(&self) -> bool {
        matches!(
            self,
            Self::RedirLess
                | Self::RedirGreat
                | Self::RedirDLess
                | Self::RedirDGreat
                | Self::RedirDLessDash
                | Self::RedirLessAnd
                | Self::RedirGreatAnd
                | Self::RedirLessGreat
                | Self::RedirClobber
                | Self::RedirTLess
                | Self::RedirAndGreat
                | Self::RedirAndDGreat
        )
    }

    /// Here-doc openers, which schedule a pending body read.
    pub fn is_heredoc_op(&self) -> bool {
        matches!(self, Self::RedirDLess | Self::RedirDLessDash)
    }

    /// Case-arm terminators.
    pub fn is_case_arm_terminator(&self) -> bool {
        matches!(self, Self::OpDSemi | Self::OpSemiAmp | Self::OpDSemiAmp)
    }

    /// `${...}` suffix operators that take a default/alternative word.
    pub fn is_vop_default_family(&self) -> bool {
        matches!(
            self,
            Self::VopColonHyphen
                | Self::VopHyphen
                | Self::VopColonEquals
                | Self::VopEquals
                | Self::VopColonQMark
                | Self::VopQMark
                | Self::VopColonPlus
                | Self::VopPlus
        )
    }
}

lazy_static::lazy_static! {
    /// Reserved words, recognized by the command parser when a bare
    /// literal word appears in command position.
    pub static ref KEYWORDS: HashMap<&'static str, Kw> = {
        let mut m = HashMap::new();
        m.insert("if", Kw::If);
        m.insert("then", Kw::Then);
        m.insert("else", Kw::Else);
        m.insert("elif", Kw::Elif);
        m.insert("fi", Kw::Fi);
        m.insert("for", Kw::For);
        m.insert("while", Kw::While);
        m.insert("until", Kw::Until);
        m.insert("do", Kw::Do);
        m.insert("done", Kw::Done);
        m.insert("case", Kw::Case);
        m.insert("esac", Kw::Esac);
        m.insert("in", Kw::In);
        m.insert("function", Kw::Function);
        m.insert("{", Kw::LBrace);
        m.insert("}", Kw::RBrace);
        m.insert("[[", Kw::DLBracket);
        m.insert("]]", Kw::DRBracket);
        m
    };
}

/// Reserved-word discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kw {
    If,
    Then,
    Else,
    Elif,
    Fi,
    For,
    While,
    Until,
    Do,
    Done,
    Case,
    Esac,
    In,
    Function,
    LBrace,
    RBrace,
    DLBracket,
    DRBracket,
}

/// Look up a reserved word.
pub fn keyword(text: &str) -> Option<Kw> {
    KEYWORDS.get(text).copied()
}

/// Check if a string is a valid variable/function name.
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword("if"), Some(Kw::If));
        assert_eq!(keyword("esac"), Some(Kw::Esac));
        assert_eq!(keyword("{"), Some(Kw::LBrace));
        assert_eq!(keyword("echo"), None);
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("x"));
        assert!(is_valid_name("_foo2"));
        assert!(!is_valid_name("2x"));
        assert!(!is_valid_name("-"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_word_terminators() {
        assert!(Id::OpSemi.is_word_terminator());
        assert!(Id::RedirDLess.is_word_terminator());
        assert!(!Id::LitChars.is_word_terminator());
    }
}

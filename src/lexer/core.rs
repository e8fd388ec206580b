//! Lexer Core
//!
//! One longest-match rule table per lexical mode. `match_token` inspects
//! the characters of a single source line at a position and returns
//! `(Id, length)`; it never consumes input itself. Ties are broken by
//! rule order, which is the order the tables are written in.

use crate::ids::Id;
use crate::lexer::modes::LexMode;

/// Three-character operators in OUTER mode.
const THREE_CHAR_OPS: &[(&str, Id)] = &[
    (";;&", Id::OpDSemiAmp),
    ("<<<", Id::RedirTLess),
    ("<<-", Id::RedirDLessDash),
    ("&>>", Id::RedirAndDGreat),
];

/// Two-character operators in OUTER mode.
const TWO_CHAR_OPS: &[(&str, Id)] = &[
    ("&&", Id::OpAndIf),
    ("||", Id::OpOrIf),
    (";;", Id::OpDSemi),
    (";&", Id::OpSemiAmp),
    ("|&", Id::OpPipeAmp),
    ("<<", Id::RedirDLess),
    (">>", Id::RedirDGreat),
    ("<&", Id::RedirLessAnd),
    (">&", Id::RedirGreatAnd),
    ("<>", Id::RedirLessGreat),
    (">|", Id::RedirClobber),
    ("&>", Id::RedirAndGreat),
    ("((", Id::OpDLParen),
];

/// Single-character operators in OUTER mode.
const ONE_CHAR_OPS: &[(char, Id)] = &[
    (';', Id::OpSemi),
    ('&', Id::OpAmp),
    ('|', Id::OpPipe),
    ('(', Id::OpLParen),
    (')', Id::OpRParen),
    ('<', Id::RedirLess),
    ('>', Id::RedirGreat),
];

/// Three-character operators in ARITH mode.
const ARITH_THREE_CHAR_OPS: &[(&str, Id)] = &[
    ("<<=", Id::ArithDLessEqual),
    (">>=", Id::ArithDGreatEqual),
];

/// Two-character operators in ARITH mode.
const ARITH_TWO_CHAR_OPS: &[(&str, Id)] = &[
    ("**", Id::ArithDStar),
    ("<<", Id::ArithDLess),
    (">>", Id::ArithDGreat),
    ("<=", Id::ArithLessEqual),
    (">=", Id::ArithGreatEqual),
    ("==", Id::ArithDEqual),
    ("!=", Id::ArithNEqual),
    ("&&", Id::ArithDAmp),
    ("||", Id::ArithDPipe),
    ("++", Id::ArithDPlus),
    ("--", Id::ArithDMinus),
    ("+=", Id::ArithPlusEqual),
    ("-=", Id::ArithMinusEqual),
    ("*=", Id::ArithStarEqual),
    ("/=", Id::ArithSlashEqual),
    ("%=", Id::ArithPercentEqual),
    ("&=", Id::ArithAmpEqual),
    ("|=", Id::ArithPipeEqual),
    ("^=", Id::ArithCaretEqual),
];

/// Single-character operators in ARITH mode.
const ARITH_ONE_CHAR_OPS: &[(char, Id)] = &[
    (',', Id::ArithComma),
    ('=', Id::ArithEqual),
    ('?', Id::ArithQMark),
    (':', Id::ArithColon),
    ('|', Id::ArithPipe),
    ('^', Id::ArithCaret),
    ('&', Id::ArithAmp),
    ('<', Id::ArithLess),
    ('>', Id::ArithGreat),
    ('+', Id::ArithPlus),
    ('-', Id::ArithMinus),
    ('*', Id::ArithStar),
    ('/', Id::ArithSlash),
    ('%', Id::ArithPercent),
    ('!', Id::ArithBang),
    ('~', Id::ArithTilde),
    ('(', Id::ArithLParen),
    (')', Id::ArithRParen),
    (';', Id::ArithSemi),
    (']', Id::ArithRBracket),
    ('}', Id::ArithRBrace),
];

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length of a run of chars satisfying `pred`, starting at `pos`.
fn run_len(chars: &[char], pos: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut i = pos;
    while i < chars.len() && pred(chars[i]) {
        i += 1;
    }
    i - pos
}

fn match_prefix(chars: &[char], pos: usize, s: &str) -> bool {
    s.chars()
        .enumerate()
        .all(|(i, c)| chars.get(pos + i) == Some(&c))
}

/// Match a `$`-introduced substitution opener common to OUTER, DQ,
/// ARITH, and the VS argument modes. `allow_ansi_quote` enables `$'`.
fn match_dollar(chars: &[char], pos: usize, allow_ansi_quote: bool) -> Option<(Id, usize)> {
    debug_assert_eq!(chars[pos], '$');
    let next = chars.get(pos + 1).copied();
    match next {
        Some('\'') if allow_ansi_quote => Some((Id::LeftDollarSQuote, 2)),
        Some('(') => {
            if chars.get(pos + 2) == Some(&'(') {
                Some((Id::LeftDollarDParen, 3))
            } else {
                Some((Id::LeftDollarParen, 2))
            }
        }
        Some('{') => Some((Id::LeftDollarBrace, 2)),
        Some(c) if is_name_start(c) => {
            let len = run_len(chars, pos + 1, is_name_char);
            Some((Id::VsubName, 1 + len))
        }
        Some(c) if c.is_ascii_digit() => Some((Id::VsubNumber, 2)),
        Some('@') => Some((Id::VsubAt, 2)),
        Some('*') => Some((Id::VsubStar, 2)),
        Some('#') => Some((Id::VsubPound, 2)),
        Some('?') => Some((Id::VsubQMark, 2)),
        Some('$') => Some((Id::VsubDollar, 2)),
        Some('!') => Some((Id::VsubBang, 2)),
        Some('-') => Some((Id::VsubHyphen, 2)),
        // A bare `$` with nothing expandable after it is literal.
        _ => Some((Id::LitOther, 1)),
    }
}

/// Match the longest token at `chars[pos..]` in the given mode.
///
/// `word_adjacent` is true when the previous token on this line ended a
/// word immediately before `pos`; it controls whether `#` starts a
/// comment (only meaningful in OUTER mode). Callers guarantee
/// `pos < chars.len()`.
pub fn match_token(mode: LexMode, chars: &[char], pos: usize, word_adjacent: bool) -> (Id, usize) {
    match mode {
        LexMode::Outer => match_outer(chars, pos, word_adjacent),
        LexMode::DQ => match_dq(chars, pos),
        LexMode::SQ => match_sq(chars, pos),
        LexMode::DollarSQ => match_dollar_sq(chars, pos),
        LexMode::Backtick => match_backtick(chars, pos),
        LexMode::Arith => match_arith(chars, pos),
        LexMode::VS1 => match_vs1(chars, pos),
        LexMode::VS2 => match_vs2(chars, pos),
        LexMode::VSArgUnq => match_vs_arg(chars, pos, false),
        LexMode::VSArgDq => match_vs_arg(chars, pos, true),
        LexMode::BashRegex => match_bash_regex(chars, pos),
        LexMode::HeredocBody => match_heredoc_body(chars, pos),
        // COMMENT is handled inline by the OUTER table; the driver never
        // lexes in it.
        LexMode::Comment => (Id::Unknown, 1),
    }
}

/// Characters that end a LitChars run in OUTER mode.
fn is_outer_special(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>' | '\'' | '"' | '`' | '$'
            | '~' | '/' | '\\'
    )
}

fn match_outer(chars: &[char], pos: usize, word_adjacent: bool) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();

    if c0 == '\\' {
        return match c1 {
            Some('\n') => (Id::IgnoredLineCont, 2),
            Some(_) => (Id::LitEscapedChar, 2),
            None => (Id::LitOther, 1),
        };
    }
    if c0 == ' ' || c0 == '\t' {
        return (Id::WsSpace, run_len(chars, pos, |c| c == ' ' || c == '\t'));
    }
    if c0 == '\n' {
        return (Id::OpNewline, 1);
    }
    if c0 == '#' && !word_adjacent {
        return (Id::IgnoredComment, run_len(chars, pos, |c| c != '\n'));
    }
    for (op, id) in THREE_CHAR_OPS {
        if match_prefix(chars, pos, op) {
            return (*id, 3);
        }
    }
    for (op, id) in TWO_CHAR_OPS {
        if match_prefix(chars, pos, op) {
            return (*id, 2);
        }
    }
    if c0 == '$' {
        if let Some(m) = match_dollar(chars, pos, true) {
            return m;
        }
    }
    for (op, id) in ONE_CHAR_OPS {
        if c0 == *op {
            return (*id, 1);
        }
    }
    match c0 {
        '\'' => (Id::LeftSQuote, 1),
        '"' => (Id::LeftDQuote, 1),
        '`' => (Id::LeftBacktick, 1),
        '~' => (Id::LitTilde, 1),
        '/' => (Id::LitSlash, 1),
        _ => (Id::LitChars, run_len(chars, pos, |c| !is_outer_special(c))),
    }
}

fn match_dq(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();
    match c0 {
        '\\' => match c1 {
            Some('\n') => (Id::IgnoredLineCont, 2),
            Some('$') | Some('`') | Some('"') | Some('\\') => (Id::LitEscapedChar, 2),
            // Backslash before anything else is a literal backslash.
            _ => (Id::LitOther, 1),
        },
        '"' => (Id::RightDQuote, 1),
        '$' => match_dollar(chars, pos, false).unwrap_or((Id::LitOther, 1)),
        '`' => (Id::LeftBacktick, 1),
        _ => (
            Id::LitChars,
            run_len(chars, pos, |c| !matches!(c, '"' | '\\' | '$' | '`')),
        ),
    }
}

fn match_sq(chars: &[char], pos: usize) -> (Id, usize) {
    if chars[pos] == '\'' {
        (Id::RightSQuote, 1)
    } else {
        (Id::LitChars, run_len(chars, pos, |c| c != '\''))
    }
}

fn match_dollar_sq(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    match c0 {
        '\\' if pos + 1 < chars.len() => (Id::LitEscapedChar, 2),
        '\\' => (Id::LitOther, 1),
        '\'' => (Id::RightSQuote, 1),
        _ => (
            Id::LitChars,
            run_len(chars, pos, |c| c != '\'' && c != '\\'),
        ),
    }
}

fn match_backtick(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    match c0 {
        '\\' if pos + 1 < chars.len() => (Id::LitEscapedChar, 2),
        '\\' => (Id::LitOther, 1),
        '`' => (Id::RightBacktick, 1),
        _ => (
            Id::LitChars,
            run_len(chars, pos, |c| c != '`' && c != '\\'),
        ),
    }
}

/// Identifier, number, and base-literal characters in ARITH mode. `#`
/// belongs to `N#digits` literals; `@` only appears in `${a[@]}`
/// subscripts.
fn is_arith_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '@')
}

fn match_arith(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();

    if c0 == '\\' && c1 == Some('\n') {
        return (Id::IgnoredLineCont, 2);
    }
    if c0 == ' ' || c0 == '\t' || c0 == '\n' {
        return (
            Id::WsSpace,
            run_len(chars, pos, |c| c == ' ' || c == '\t' || c == '\n'),
        );
    }
    for (op, id) in ARITH_THREE_CHAR_OPS {
        if match_prefix(chars, pos, op) {
            return (*id, 3);
        }
    }
    for (op, id) in ARITH_TWO_CHAR_OPS {
        if match_prefix(chars, pos, op) {
            return (*id, 2);
        }
    }
    if c0 == '$' {
        if let Some(m) = match_dollar(chars, pos, false) {
            return m;
        }
    }
    if c0 == '"' {
        return (Id::LeftDQuote, 1);
    }
    if c0 == '`' {
        return (Id::LeftBacktick, 1);
    }
    for (op, id) in ARITH_ONE_CHAR_OPS {
        if c0 == *op {
            return (*id, 1);
        }
    }
    if is_arith_word_char(c0) {
        return (Id::LitChars, run_len(chars, pos, is_arith_word_char));
    }
    (Id::Unknown, 1)
}

fn match_vs1(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();
    if is_name_start(c0) {
        return (Id::VsubName, run_len(chars, pos, is_name_char));
    }
    if c0.is_ascii_digit() {
        return (Id::VsubNumber, run_len(chars, pos, |c| c.is_ascii_digit()));
    }
    match c0 {
        '@' => (Id::VsubAt, 1),
        '*' => (Id::VsubStar, 1),
        '?' => (Id::VsubQMark, 1),
        '$' => (Id::VsubDollar, 1),
        '-' => (Id::VsubHyphen, 1),
        // `${#}` is $#, `${#x}` is a length prefix; same split for `!`.
        '#' if c1 == Some('}') => (Id::VsubPound, 1),
        '#' => (Id::VopPrefixPound, 1),
        '!' if c1 == Some('}') => (Id::VsubBang, 1),
        '!' => (Id::VopPrefixBang, 1),
        '}' => (Id::RightDollarBrace, 1),
        _ => (Id::Unknown, 1),
    }
}

fn match_vs2(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();
    match c0 {
        '}' => (Id::RightDollarBrace, 1),
        '[' => (Id::VopLBracket, 1),
        ':' => match c1 {
            Some('-') => (Id::VopColonHyphen, 2),
            Some('=') => (Id::VopColonEquals, 2),
            Some('?') => (Id::VopColonQMark, 2),
            Some('+') => (Id::VopColonPlus, 2),
            _ => (Id::VopColon, 1),
        },
        '-' => (Id::VopHyphen, 1),
        '=' => (Id::VopEquals, 1),
        '?' => (Id::VopQMark, 1),
        '+' => (Id::VopPlus, 1),
        '%' if c1 == Some('%') => (Id::VopDPercent, 2),
        '%' => (Id::VopPercent, 1),
        '#' if c1 == Some('#') => (Id::VopDPound, 2),
        '#' => (Id::VopPound, 1),
        '/' if c1 == Some('/') => (Id::VopDSlash, 2),
        '/' => (Id::VopSlash, 1),
        _ => (Id::Unknown, 1),
    }
}

fn match_vs_arg(chars: &[char], pos: usize, dq: bool) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();

    if c0 == '\\' {
        return match c1 {
            Some('\n') => (Id::IgnoredLineCont, 2),
            // In DQ context the escapes are the double-quote set plus
            // the operator delimiters `}` and `/`.
            Some('$') | Some('`') | Some('"') | Some('\\') | Some('}') | Some('/') if dq => {
                (Id::LitEscapedChar, 2)
            }
            Some(_) if !dq => (Id::LitEscapedChar, 2),
            _ => (Id::LitOther, 1),
        };
    }
    match c0 {
        '}' => (Id::RightDollarBrace, 1),
        '/' => (Id::LitSlash, 1),
        '$' => match_dollar(chars, pos, !dq).unwrap_or((Id::LitOther, 1)),
        '`' => (Id::LeftBacktick, 1),
        '"' => (Id::LeftDQuote, 1),
        // In DQ context single quotes are literal characters; the run
        // rule below picks them up.
        '\'' if !dq => (Id::LeftSQuote, 1),
        _ => (
            Id::LitChars,
            run_len(chars, pos, move |c| {
                !matches!(c, '}' | '/' | '$' | '`' | '"' | '\\') && (dq || c != '\'')
            }),
        ),
    }
}

/// Expanding here-doc bodies: like DQ, except quotes are literal and
/// only `\$`, `` \` ``, `\\`, and `\<newline>` are escapes.
fn match_heredoc_body(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();
    match c0 {
        '\\' => match c1 {
            Some('\n') => (Id::IgnoredLineCont, 2),
            Some('$') | Some('`') | Some('\\') => (Id::LitEscapedChar, 2),
            _ => (Id::LitOther, 1),
        },
        '$' => match_dollar(chars, pos, false).unwrap_or((Id::LitOther, 1)),
        '`' => (Id::LeftBacktick, 1),
        _ => (
            Id::LitChars,
            run_len(chars, pos, |c| !matches!(c, '\\' | '$' | '`')),
        ),
    }
}

fn match_bash_regex(chars: &[char], pos: usize) -> (Id, usize) {
    let c0 = chars[pos];
    let c1 = chars.get(pos + 1).copied();
    if c0 == ' ' || c0 == '\t' {
        return (Id::WsSpace, run_len(chars, pos, |c| c == ' ' || c == '\t'));
    }
    if c0 == '\n' {
        return (Id::OpNewline, 1);
    }
    if c0 == '\\' {
        return match c1 {
            Some('\n') => (Id::IgnoredLineCont, 2),
            Some(_) => (Id::LitEscapedChar, 2),
            None => (Id::LitOther, 1),
        };
    }
    match c0 {
        '\'' => (Id::LeftSQuote, 1),
        '"' => (Id::LeftDQuote, 1),
        '$' => match_dollar(chars, pos, false).unwrap_or((Id::LitOther, 1)),
        '`' => (Id::LeftBacktick, 1),
        _ => (
            Id::LitChars,
            run_len(chars, pos, |c| {
                !matches!(c, ' ' | '\t' | '\n' | '\\' | '\'' | '"' | '$' | '`')
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(mode: LexMode, s: &str) -> Vec<(Id, String)> {
        let chars: Vec<char> = s.chars().collect();
        let mut pos = 0;
        let mut out = Vec::new();
        let mut word_adjacent = false;
        while pos < chars.len() {
            let (id, len) = match_token(mode, &chars, pos, word_adjacent);
            out.push((id, chars[pos..pos + len].iter().collect()));
            word_adjacent = !matches!(
                id,
                Id::WsSpace | Id::OpNewline | Id::OpSemi | Id::OpAmp | Id::OpPipe
            );
            pos += len;
        }
        out
    }

    #[test]
    fn test_outer_operators_longest_match() {
        let toks = lex(LexMode::Outer, "a;;&b");
        assert_eq!(toks[1].0, Id::OpDSemiAmp);
        let toks = lex(LexMode::Outer, "x<<-y");
        assert_eq!(toks[1].0, Id::RedirDLessDash);
        let toks = lex(LexMode::Outer, "a&&b");
        assert_eq!(toks[1].0, Id::OpAndIf);
    }

    #[test]
    fn test_outer_dollar_subs() {
        let toks = lex(LexMode::Outer, "$foo $1 $? ${x} $(ls) $((1))");
        assert_eq!(toks[0], (Id::VsubName, "$foo".into()));
        assert_eq!(toks[2], (Id::VsubNumber, "$1".into()));
        assert_eq!(toks[4], (Id::VsubQMark, "$?".into()));
        assert_eq!(toks[6], (Id::LeftDollarBrace, "${".into()));
        assert!(toks.iter().any(|t| t.0 == Id::LeftDollarParen));
        assert!(toks.iter().any(|t| t.0 == Id::LeftDollarDParen));
    }

    #[test]
    fn test_outer_comment_only_at_word_start() {
        let toks = lex(LexMode::Outer, "echo a#b #c");
        assert_eq!(toks[2], (Id::LitChars, "a#b".into()));
        assert_eq!(toks.last().unwrap().0, Id::IgnoredComment);
    }

    #[test]
    fn test_dq_escapes() {
        let toks = lex(LexMode::DQ, r#"a\$b\nc""#);
        assert_eq!(toks[0], (Id::LitChars, "a".into()));
        assert_eq!(toks[1], (Id::LitEscapedChar, "\\$".into()));
        // \n is not special in double quotes: backslash stays literal
        assert_eq!(toks[3], (Id::LitOther, "\\".into()));
        assert_eq!(toks.last().unwrap().0, Id::RightDQuote);
    }

    #[test]
    fn test_sq_is_inert() {
        let toks = lex(LexMode::SQ, "a$b\\n'");
        assert_eq!(toks[0], (Id::LitChars, "a$b\\n".into()));
        assert_eq!(toks[1].0, Id::RightSQuote);
    }

    #[test]
    fn test_arith_two_char_before_one_char() {
        let toks = lex(LexMode::Arith, "1<<2 ** x<=y");
        assert!(toks.iter().any(|t| t.0 == Id::ArithDLess));
        assert!(toks.iter().any(|t| t.0 == Id::ArithDStar));
        assert!(toks.iter().any(|t| t.0 == Id::ArithLessEqual));
    }

    #[test]
    fn test_arith_base_literal_is_one_token() {
        let toks = lex(LexMode::Arith, "64#aZ@_+1");
        assert_eq!(toks[0], (Id::LitChars, "64#aZ@_".into()));
        assert_eq!(toks[1].0, Id::ArithPlus);
    }

    #[test]
    fn test_vs1_length_vs_param() {
        // ${#} -> $# but ${#x} -> length of x
        let toks = lex(LexMode::VS1, "#}");
        assert_eq!(toks[0].0, Id::VsubPound);
        let toks = lex(LexMode::VS1, "#x}");
        assert_eq!(toks[0].0, Id::VopPrefixPound);
        assert_eq!(toks[1], (Id::VsubName, "x".into()));
    }

    #[test]
    fn test_vs2_colon_ops() {
        let toks = lex(LexMode::VS2, ":-");
        assert_eq!(toks[0].0, Id::VopColonHyphen);
        let toks = lex(LexMode::VS2, ":1");
        assert_eq!(toks[0].0, Id::VopColon);
        let toks = lex(LexMode::VS2, "%%");
        assert_eq!(toks[0].0, Id::VopDPercent);
    }

    #[test]
    fn test_vs_arg_dq_single_quote_is_literal() {
        // The "weird" rule: inside "${x:-'a b'}" the quotes are literal.
        let toks = lex(LexMode::VSArgDq, "'a b'}");
        assert_eq!(toks[0], (Id::LitChars, "'a b'".into()));
        assert_eq!(toks[1].0, Id::RightDollarBrace);
    }

    #[test]
    fn test_vs_arg_unq_single_quote_opens() {
        let toks = lex(LexMode::VSArgUnq, "'a b'}");
        assert_eq!(toks[0].0, Id::LeftSQuote);
    }

    #[test]
    fn test_vs_arg_unq_spaces_are_literal() {
        let toks = lex(LexMode::VSArgUnq, "a b c}");
        assert_eq!(toks[0], (Id::LitChars, "a b c".into()));
    }
}

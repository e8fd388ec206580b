//! Arithmetic Expression Parser
//!
//! Top-down operator-precedence (Pratt) parsing over ARITH-mode tokens.
//! Each operator id has a left binding power; null denotations handle
//! operands, prefix operators, and grouping, left denotations handle
//! infix/postfix operators. Precedence follows the C-like ladder from
//! comma (lowest) through assignment, ternary, logical, bitwise,
//! equality, relational, shift, additive, multiplicative, `**`, and
//! unary (highest). Assignment, ternary, and `**` are right-associative.
//!
//! Assignment targets and `++`/`--` operands are validated as l-values
//! at parse time.

use crate::ast::types::{ArithExpr, Word, WordPart};
use crate::errors::{ArithError, LexError, ParseError};
use crate::ids::Id;
use crate::lexer::{LexerDriver, Token};

const COMMA_BP: u8 = 2;
const ASSIGN_BP: u8 = 4;
const TERNARY_BP: u8 = 6;
const POW_BP: u8 = 28;
const UNARY_BP: u8 = 29;
const POSTFIX_BP: u8 = 32;
const CALL_BP: u8 = 34;

/// Left binding power. Zero means "stops the parse": `)`, `]`, `}`, `;`,
/// `:`, and everything that is not an infix operator.
fn lbp(id: Id) -> u8 {
    match id {
        Id::ArithComma => COMMA_BP,
        Id::ArithEqual
        | Id::ArithPlusEqual
        | Id::ArithMinusEqual
        | Id::ArithStarEqual
        | Id::ArithSlashEqual
        | Id::ArithPercentEqual
        | Id::ArithAmpEqual
        | Id::ArithPipeEqual
        | Id::ArithCaretEqual
        | Id::ArithDLessEqual
        | Id::ArithDGreatEqual => ASSIGN_BP,
        Id::ArithQMark => TERNARY_BP,
        Id::ArithDPipe => 8,
        Id::ArithDAmp => 10,
        Id::ArithPipe => 12,
        Id::ArithCaret => 14,
        Id::ArithAmp => 16,
        Id::ArithDEqual | Id::ArithNEqual => 18,
        Id::ArithLess | Id::ArithLessEqual | Id::ArithGreat | Id::ArithGreatEqual => 20,
        Id::ArithDLess | Id::ArithDGreat => 22,
        Id::ArithPlus | Id::ArithMinus => 24,
        Id::ArithStar | Id::ArithSlash | Id::ArithPercent => 26,
        Id::ArithDStar => POW_BP,
        Id::ArithDPlus | Id::ArithDMinus => POSTFIX_BP,
        Id::ArithLParen => CALL_BP,
        _ => 0,
    }
}

/// Parse one arithmetic expression in the current ARITH mode, stopping
/// at any token with zero binding power.
pub fn parse_expr(lx: &mut LexerDriver) -> Result<ArithExpr, ParseError> {
    parse_until(lx, 0)
}

fn parse_until(lx: &mut LexerDriver, rbp: u8) -> Result<ArithExpr, ParseError> {
    lx.skip_space()?;
    let mut left = nud(lx)?;
    loop {
        lx.skip_space()?;
        let tok = lx.peek()?;
        let power = lbp(tok.id);
        if power <= rbp {
            break;
        }
        lx.next()?;
        left = led(lx, tok, left)?;
    }
    Ok(left)
}

fn nud(lx: &mut LexerDriver) -> Result<ArithExpr, ParseError> {
    let tok = lx.peek()?;
    match tok.id {
        Id::ArithLParen => {
            lx.next()?;
            let inner = parse_until(lx, 0)?;
            lx.skip_space()?;
            let close = lx.next()?;
            if close.id != Id::ArithRParen {
                return Err(missing(lx, ")", &close));
            }
            Ok(inner)
        }
        Id::ArithPlus | Id::ArithMinus | Id::ArithBang | Id::ArithTilde => {
            lx.next()?;
            let child = parse_until(lx, UNARY_BP)?;
            Ok(ArithExpr::Unary {
                op: tok.id,
                child: Box::new(child),
                postfix: false,
            })
        }
        Id::ArithDPlus | Id::ArithDMinus => {
            lx.next()?;
            let child = parse_until(lx, UNARY_BP)?;
            require_lvalue(lx, &child, &tok)?;
            Ok(ArithExpr::Unary {
                op: tok.id,
                child: Box::new(child),
                postfix: false,
            })
        }
        Id::LitChars
        | Id::VsubName
        | Id::VsubNumber
        | Id::VsubAt
        | Id::VsubStar
        | Id::VsubPound
        | Id::VsubQMark
        | Id::VsubDollar
        | Id::VsubBang
        | Id::VsubHyphen
        | Id::LeftDollarBrace
        | Id::LeftDollarParen
        | Id::LeftDollarDParen
        | Id::LeftDQuote
        | Id::LeftBacktick
        | Id::LitOther => read_operand(lx),
        _ => Err(ParseError::UnexpectedToken {
            got: tok.value.clone(),
            expected: None,
            span: tok.span_id.map(|id| lx.arena().span(id)),
        }),
    }
}

fn led(lx: &mut LexerDriver, tok: Token, left: ArithExpr) -> Result<ArithExpr, ParseError> {
    match tok.id {
        // Right-associative assignment.
        Id::ArithEqual
        | Id::ArithPlusEqual
        | Id::ArithMinusEqual
        | Id::ArithStarEqual
        | Id::ArithSlashEqual
        | Id::ArithPercentEqual
        | Id::ArithAmpEqual
        | Id::ArithPipeEqual
        | Id::ArithCaretEqual
        | Id::ArithDLessEqual
        | Id::ArithDGreatEqual => {
            require_lvalue(lx, &left, &tok)?;
            let name = match left {
                ArithExpr::VarRef(t) => t,
                _ => unreachable!("validated above"),
            };
            let rhs = parse_until(lx, ASSIGN_BP - 1)?;
            Ok(ArithExpr::Assign {
                op: tok.id,
                name,
                rhs: Box::new(rhs),
            })
        }
        Id::ArithQMark => {
            let then_expr = parse_until(lx, 0)?;
            lx.skip_space()?;
            let colon = lx.next()?;
            if colon.id != Id::ArithColon {
                return Err(missing(lx, ":", &colon));
            }
            let else_expr = parse_until(lx, TERNARY_BP - 1)?;
            Ok(ArithExpr::Ternary {
                cond: Box::new(left),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            })
        }
        Id::ArithDPlus | Id::ArithDMinus => {
            require_lvalue(lx, &left, &tok)?;
            Ok(ArithExpr::Unary {
                op: tok.id,
                child: Box::new(left),
                postfix: true,
            })
        }
        Id::ArithLParen => {
            let name = match left {
                ArithExpr::VarRef(t) => t,
                _ => {
                    return Err(ParseError::Message {
                        message: "only a name can be called as a function".into(),
                        span: tok.span_id.map(|id| lx.arena().span(id)),
                    })
                }
            };
            let mut args = Vec::new();
            lx.skip_space()?;
            if lx.peek_id()? != Id::ArithRParen {
                loop {
                    args.push(parse_until(lx, COMMA_BP)?);
                    lx.skip_space()?;
                    if lx.peek_id()? == Id::ArithComma {
                        lx.next()?;
                    } else {
                        break;
                    }
                }
            }
            let close = lx.next()?;
            if close.id != Id::ArithRParen {
                return Err(missing(lx, ")", &close));
            }
            Ok(ArithExpr::FuncCall { name, args })
        }
        // `**` is right-associative; everything else is left.
        Id::ArithDStar => {
            let right = parse_until(lx, POW_BP - 1)?;
            Ok(ArithExpr::Binary {
                op: tok.id,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        _ => {
            let right = parse_until(lx, lbp(tok.id))?;
            Ok(ArithExpr::Binary {
                op: tok.id,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

fn require_lvalue(lx: &LexerDriver, e: &ArithExpr, at: &Token) -> Result<(), ParseError> {
    match e {
        ArithExpr::VarRef(_) => Ok(()),
        _ => Err(ParseError::Message {
            message: format!("`{}` needs a variable on its target side", at.value),
            span: at.span_id.map(|id| lx.arena().span(id)),
        }),
    }
}

fn missing(lx: &LexerDriver, what: &'static str, got: &Token) -> ParseError {
    ParseError::MissingTerminator {
        terminator: what,
        span: got.span_id.map(|id| lx.arena().span(id)),
    }
}

/// An operand: adjacent literal and substitution tokens form one word.
/// A lone valid name becomes a `VarRef`; a leading digit makes the
/// token a number literal, validated here.
fn read_operand(lx: &mut LexerDriver) -> Result<ArithExpr, ParseError> {
    let mut parts: Vec<WordPart> = Vec::new();
    loop {
        let tok = lx.peek()?;
        match tok.id {
            Id::LitChars | Id::LitOther => {
                lx.next()?;
                parts.push(WordPart::Literal(tok));
            }
            _ => match crate::parser::word_parser::read_sub_part(lx, &tok)? {
                Some(part) => parts.push(part),
                None => break,
            },
        }
    }
    if parts.len() == 1 {
        if let WordPart::Literal(tok) = &parts[0] {
            if crate::ids::is_valid_name(&tok.value) {
                return Ok(ArithExpr::VarRef(tok.clone()));
            }
            if tok.value.starts_with(|c: char| c.is_ascii_digit()) {
                if let Err(_e) = parse_number(&tok.value) {
                    return Err(LexError::BadNumberLiteral {
                        text: tok.value.clone(),
                        span: tok.span_id.map(|id| lx.arena().span(id)),
                    }
                    .into());
                }
            }
        }
    }
    if parts.is_empty() {
        let tok = lx.peek()?;
        return Err(ParseError::UnexpectedToken {
            got: tok.value,
            expected: None,
            span: None,
        });
    }
    Ok(ArithExpr::Word(Word::Compound(parts)))
}

/// Parse an integer literal: decimal, `0x` hex, `0` octal, or
/// `base#digits` with base 2..64. Shared with the evaluator.
pub fn parse_number(text: &str) -> Result<i64, ArithError> {
    let bad = || ArithError::BadNumber { text: text.into() };
    if let Some((base_str, digits)) = text.split_once('#') {
        let base: i64 = base_str.parse().map_err(|_| bad())?;
        if !(2..=64).contains(&base) {
            return Err(ArithError::BadBase { base });
        }
        if digits.is_empty() {
            return Err(bad());
        }
        let mut value: i64 = 0;
        for c in digits.chars() {
            let digit = digit_value(c, base).ok_or(ArithError::BadBaseDigit { digit: c })?;
            if digit >= base {
                return Err(ArithError::BadBaseDigit { digit: c });
            }
            value = value.wrapping_mul(base).wrapping_add(digit);
        }
        return Ok(value);
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_err(|_| bad());
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8)
            .map_err(|_| ArithError::BadBaseDigit {
                digit: text.chars().find(|c| !('0'..='7').contains(c)).unwrap_or('8'),
            });
    }
    text.parse().map_err(|_| bad())
}

/// Digit values for `base#digits`: 0-9, a-z, A-Z, `@`, `_`. Letters are
/// case-insensitive for bases up to 36.
fn digit_value(c: char, base: i64) -> Option<i64> {
    match c {
        '0'..='9' => Some(c as i64 - '0' as i64),
        'a'..='z' => Some(c as i64 - 'a' as i64 + 10),
        'A'..='Z' => {
            if base <= 36 {
                Some(c as i64 - 'A' as i64 + 10)
            } else {
                Some(c as i64 - 'A' as i64 + 36)
            }
        }
        '@' => Some(62),
        '_' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexMode;

    fn parse(src: &str) -> ArithExpr {
        let mut lx = LexerDriver::new(src, "t.sh");
        lx.push_mode(LexMode::Arith);
        parse_expr(&mut lx).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        let mut lx = LexerDriver::new(src, "t.sh");
        lx.push_mode(LexMode::Arith);
        parse_expr(&mut lx).unwrap_err()
    }

    #[test]
    fn test_precedence_mul_over_add() {
        match parse("1 + 2 * 3") {
            ArithExpr::Binary { op, right, .. } => {
                assert_eq!(op, Id::ArithPlus);
                assert!(matches!(
                    *right,
                    ArithExpr::Binary {
                        op: Id::ArithStar,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pow_right_assoc() {
        // 2 ** 3 ** 2 == 2 ** (3 ** 2)
        match parse("2 ** 3 ** 2") {
            ArithExpr::Binary { op, right, .. } => {
                assert_eq!(op, Id::ArithDStar);
                assert!(matches!(
                    *right,
                    ArithExpr::Binary {
                        op: Id::ArithDStar,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_right_assoc() {
        match parse("a = b = 1") {
            ArithExpr::Assign { name, rhs, .. } => {
                assert_eq!(name.value, "a");
                assert!(matches!(*rhs, ArithExpr::Assign { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_requires_lvalue() {
        let err = parse_err("1 = 2");
        assert!(err.to_string().contains("variable"));
    }

    #[test]
    fn test_ternary() {
        match parse("a ? 1 : 2") {
            ArithExpr::Ternary { .. } => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prefix_and_postfix_inc() {
        match parse("++x") {
            ArithExpr::Unary {
                op: Id::ArithDPlus,
                postfix: false,
                ..
            } => {}
            other => panic!("unexpected {:?}", other),
        }
        match parse("x--") {
            ArithExpr::Unary {
                op: Id::ArithDMinus,
                postfix: true,
                ..
            } => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_grouping() {
        match parse("(1 + 2) * 3") {
            ArithExpr::Binary { op, left, .. } => {
                assert_eq!(op, Id::ArithStar);
                assert!(matches!(
                    *left,
                    ArithExpr::Binary {
                        op: Id::ArithPlus,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_func_call() {
        match parse("f(1, 2)") {
            ArithExpr::FuncCall { name, args } => {
                assert_eq!(name.value, "f");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_comma_lowest() {
        match parse("a = 1, b = 2") {
            ArithExpr::Binary {
                op: Id::ArithComma, ..
            } => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_number_literal() {
        let err = parse_err("0xzz + 1");
        assert!(matches!(
            err,
            ParseError::Lex(LexError::BadNumberLiteral { .. })
        ));
    }

    #[test]
    fn test_parse_number_bases() {
        assert_eq!(parse_number("42").unwrap(), 42);
        assert_eq!(parse_number("0x10").unwrap(), 16);
        assert_eq!(parse_number("010").unwrap(), 8);
        assert_eq!(parse_number("2#101").unwrap(), 5);
        assert_eq!(parse_number("16#ff").unwrap(), 255);
        assert_eq!(parse_number("64#@").unwrap(), 62);
        assert!(matches!(
            parse_number("1#0"),
            Err(ArithError::BadBase { .. })
        ));
        assert!(matches!(
            parse_number("2#9"),
            Err(ArithError::BadBaseDigit { .. })
        ));
        assert!(matches!(
            parse_number("08"),
            Err(ArithError::BadBaseDigit { .. })
        ));
    }

    #[test]
    fn test_unary_binds_tighter_than_pow() {
        // -2 ** 2 parses as (-2) ** 2
        match parse("-2 ** 2") {
            ArithExpr::Binary { op, left, .. } => {
                assert_eq!(op, Id::ArithDStar);
                assert!(matches!(*left, ArithExpr::Unary { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

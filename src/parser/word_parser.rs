//! Word Parser
//!
//! Assembles `WordPart` sequences into `Word` nodes, switching lexer
//! modes at quote and substitution boundaries:
//!
//! - `"` pushes DQ and nests parts recursively
//! - `'` / `$'` push SQ / DOLLAR_SQ
//! - `$(` pushes OUTER and recursively parses a command list
//! - `$((` pushes ARITH and hands off to the Pratt parser
//! - `${` pushes VS_1, then VS_2, then an argument mode for suffix ops
//!
//! The argument mode is VS_ARG_DQ when the `${...}` sits inside double
//! quotes, which is what makes the single quotes in `"${x:-'a b'}"`
//! literal.

use crate::ast::types::{BracedVarSub, BracketOp, VsPrefixOp, VsSuffixOp, Word, WordPart};
use crate::errors::{LexError, ParseError};
use crate::ids::Id;
use crate::lexer::{LexMode, LexerDriver, Token};
use crate::parser::arith_parser;

/// What the command parser gets back when it asks for the next item.
#[derive(Debug, Clone, PartialEq)]
pub enum WordItem {
    Word(Word),
    Operator(Token),
    Newline(Token),
    Eof,
}

/// Read the next word or operator in OUTER mode, skipping leading
/// spaces and comments.
pub fn read_word_or_op(lx: &mut LexerDriver) -> Result<WordItem, ParseError> {
    lx.skip_space()?;
    let tok = lx.peek()?;
    match tok.id {
        Id::Eof => Ok(WordItem::Eof),
        Id::OpNewline => {
            lx.next()?;
            Ok(WordItem::Newline(tok))
        }
        id if is_operator(id) => {
            lx.next()?;
            Ok(WordItem::Operator(tok))
        }
        Id::Unknown => Err(unexpected(lx, &tok)),
        _ => Ok(WordItem::Word(read_compound_word(lx)?)),
    }
}

fn is_operator(id: Id) -> bool {
    id.is_redir_op()
        || matches!(
            id,
            Id::OpSemi
                | Id::OpAmp
                | Id::OpDSemi
                | Id::OpSemiAmp
                | Id::OpDSemiAmp
                | Id::OpPipe
                | Id::OpPipeAmp
                | Id::OpAndIf
                | Id::OpOrIf
                | Id::OpLParen
                | Id::OpRParen
                | Id::OpDLParen
        )
}

fn unexpected(lx: &LexerDriver, tok: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        got: tok.value.clone(),
        expected: None,
        span: tok.span_id.map(|id| lx.arena().span(id)),
    }
}

/// Assemble a compound word in the current (OUTER-like) mode until a
/// terminator. The caller guarantees the next token begins a word.
pub fn read_compound_word(lx: &mut LexerDriver) -> Result<Word, ParseError> {
    let mut parts: Vec<WordPart> = Vec::new();
    loop {
        let tok = lx.peek()?;
        match tok.id {
            Id::LitChars | Id::LitOther | Id::LitSlash => {
                lx.next()?;
                parts.push(WordPart::Literal(tok));
            }
            Id::LitEscapedChar => {
                lx.next()?;
                parts.push(WordPart::EscapedLiteral(tok));
            }
            Id::LitTilde => {
                lx.next()?;
                if parts.is_empty() {
                    parts.push(read_tilde(lx)?);
                } else {
                    parts.push(WordPart::Literal(tok));
                }
            }
            Id::IgnoredLineCont => {
                lx.next()?;
            }
            _ => {
                if let Some(part) = read_sub_part(lx, &tok)? {
                    parts.push(part);
                } else {
                    break;
                }
            }
        }
    }
    Ok(Word::Compound(parts))
}

/// Tilde at the start of a word: an immediately following literal run is
/// the user name; a slash or word end leaves it bare.
fn read_tilde(lx: &mut LexerDriver) -> Result<WordPart, ParseError> {
    let next = lx.peek()?;
    match next.id {
        Id::LitChars => {
            lx.next()?;
            Ok(WordPart::TildeSub {
                prefix: Some(next.value),
            })
        }
        _ => Ok(WordPart::TildeSub { prefix: None }),
    }
}

/// Quote and substitution parts shared by every word context. Returns
/// `None` when the peeked token does not begin a part (a terminator in
/// the caller's mode).
pub(crate) fn read_sub_part(
    lx: &mut LexerDriver,
    tok: &Token,
) -> Result<Option<WordPart>, ParseError> {
    let part = match tok.id {
        Id::LeftSQuote => {
            lx.next()?;
            Some(read_single_quoted(lx, false)?)
        }
        Id::LeftDollarSQuote => {
            lx.next()?;
            Some(read_single_quoted(lx, true)?)
        }
        Id::LeftDQuote => {
            lx.next()?;
            Some(read_double_quoted(lx)?)
        }
        Id::VsubName
        | Id::VsubNumber
        | Id::VsubAt
        | Id::VsubStar
        | Id::VsubPound
        | Id::VsubQMark
        | Id::VsubDollar
        | Id::VsubBang
        | Id::VsubHyphen => {
            lx.next()?;
            Some(WordPart::SimpleVarSub(tok.clone()))
        }
        Id::LeftDollarBrace => Some(read_braced_var_sub(lx, false)?),
        Id::LeftDollarParen => {
            lx.next()?;
            Some(read_command_sub(lx)?)
        }
        Id::LeftDollarDParen => {
            lx.next()?;
            Some(read_arith_sub(lx)?)
        }
        Id::LeftBacktick => {
            lx.next()?;
            Some(read_backtick_sub(lx)?)
        }
        _ => None,
    };
    Ok(part)
}

fn read_single_quoted(lx: &mut LexerDriver, ansi_c: bool) -> Result<WordPart, ParseError> {
    lx.push_mode(if ansi_c {
        LexMode::DollarSQ
    } else {
        LexMode::SQ
    });
    let mut toks = Vec::new();
    loop {
        let tok = lx.next()?;
        match tok.id {
            Id::RightSQuote => break,
            Id::Eof => {
                return Err(LexError::UnterminatedSingleQuote {
                    span: toks
                        .first()
                        .and_then(|t: &Token| t.span_id)
                        .map(|id| lx.arena().span(id)),
                }
                .into())
            }
            _ => toks.push(tok),
        }
    }
    lx.pop_mode();
    Ok(WordPart::SingleQuoted { toks, ansi_c })
}

fn read_double_quoted(lx: &mut LexerDriver) -> Result<WordPart, ParseError> {
    lx.push_mode(LexMode::DQ);
    let parts = read_quoted_parts(lx, Id::RightDQuote)?;
    lx.pop_mode();
    Ok(WordPart::DoubleQuoted { parts })
}

/// Parts of a double-quoted string or expanding here-doc body,
/// terminated by `end` (Eof for here-doc bodies, which run to the end
/// of their mini-driver).
pub fn read_quoted_parts(lx: &mut LexerDriver, end: Id) -> Result<Vec<WordPart>, ParseError> {
    let mut parts = Vec::new();
    loop {
        let tok = lx.peek()?;
        if tok.id == end {
            lx.next()?;
            break;
        }
        match tok.id {
            Id::Eof => {
                if end == Id::Eof {
                    break;
                }
                return Err(LexError::UnterminatedDoubleQuote { span: None }.into());
            }
            Id::LitChars | Id::LitOther => {
                lx.next()?;
                parts.push(WordPart::Literal(tok));
            }
            Id::LitEscapedChar => {
                lx.next()?;
                parts.push(WordPart::EscapedLiteral(tok));
            }
            Id::IgnoredLineCont => {
                lx.next()?;
            }
            Id::LeftDollarBrace => {
                parts.push(read_braced_var_sub(lx, true)?);
            }
            _ => match read_sub_part(lx, &tok)? {
                Some(part) => parts.push(part),
                None => return Err(unexpected(lx, &tok)),
            },
        }
    }
    Ok(parts)
}

fn read_command_sub(lx: &mut LexerDriver) -> Result<WordPart, ParseError> {
    lx.push_mode(LexMode::Outer);
    let command = crate::parser::command_parser::parse_nested_list(lx)?;
    let close = lx.next()?;
    if close.id != Id::OpRParen {
        return Err(ParseError::MissingTerminator {
            terminator: ")",
            span: close.span_id.map(|id| lx.arena().span(id)),
        });
    }
    lx.pop_mode();
    Ok(WordPart::CommandSub {
        command: Box::new(command),
    })
}

fn read_arith_sub(lx: &mut LexerDriver) -> Result<WordPart, ParseError> {
    lx.push_mode(LexMode::Arith);
    lx.skip_space()?;
    let expr = if lx.peek_id()? == Id::ArithRParen {
        // $(( )) evaluates to 0
        crate::ast::types::ArithExpr::Word(Word::Compound(Vec::new()))
    } else {
        arith_parser::parse_expr(lx)?
    };
    expect_arith_close(lx)?;
    lx.pop_mode();
    Ok(WordPart::ArithSub { expr })
}

/// The two `)` that close `$((...))` / `((...))`.
pub fn expect_arith_close(lx: &mut LexerDriver) -> Result<(), ParseError> {
    for _ in 0..2 {
        lx.skip_space()?;
        let tok = lx.next()?;
        if tok.id != Id::ArithRParen {
            return Err(ParseError::MissingTerminator {
                terminator: "))",
                span: tok.span_id.map(|id| lx.arena().span(id)),
            });
        }
    }
    Ok(())
}

/// Backticks collect raw text, unescape the three backtick escapes, and
/// re-parse as a nested program.
fn read_backtick_sub(lx: &mut LexerDriver) -> Result<WordPart, ParseError> {
    lx.push_mode(LexMode::Backtick);
    let mut raw = String::new();
    loop {
        let tok = lx.next()?;
        match tok.id {
            Id::RightBacktick => break,
            Id::Eof => return Err(LexError::UnterminatedBacktick { span: None }.into()),
            Id::LitEscapedChar => {
                // `\$`, `` \` ``, and `\\` lose the backslash; anything
                // else keeps it.
                let c = tok.value.chars().nth(1);
                match c {
                    Some('$') | Some('`') | Some('\\') => raw.push(c.unwrap()),
                    _ => raw.push_str(&tok.value),
                }
            }
            _ => raw.push_str(&tok.value),
        }
    }
    lx.pop_mode();
    let command = crate::parser::command_parser::parse_str_for_sub(&raw, lx.arena().path())?;
    Ok(WordPart::CommandSub {
        command: Box::new(command),
    })
}

// =============================================================================
// ${...}
// =============================================================================

fn read_braced_var_sub(lx: &mut LexerDriver, in_dq: bool) -> Result<WordPart, ParseError> {
    let open = lx.next()?;
    debug_assert_eq!(open.id, Id::LeftDollarBrace);
    lx.push_mode(LexMode::VS1);

    let mut tok = lx.next()?;
    let prefix_op = match tok.id {
        Id::VopPrefixPound => {
            tok = lx.next()?;
            Some(VsPrefixOp::Length)
        }
        Id::VopPrefixBang => {
            tok = lx.next()?;
            Some(VsPrefixOp::Indirect)
        }
        _ => None,
    };
    if !is_vsub_name(tok.id) {
        lx.pop_mode();
        return Err(ParseError::Message {
            message: format!("bad substitution: `{}`", tok.value),
            span: tok.span_id.map(|id| lx.arena().span(id)),
        });
    }
    let name = tok;
    lx.set_mode(LexMode::VS2);

    let mut bracket_op = None;
    if lx.peek_id()? == Id::VopLBracket {
        lx.next()?;
        bracket_op = Some(read_bracket_op(lx)?);
    }

    let next = lx.peek()?;
    let suffix_op = match next.id {
        Id::RightDollarBrace => None,
        id if id.is_vop_default_family() => {
            lx.next()?;
            let (test_empty, kind) = classify_default_op(id);
            let arg = read_vs_arg_word(lx, in_dq, false)?;
            Some(Box::new(match kind {
                DefaultKind::UseDefault => VsSuffixOp::UseDefault { test_empty, arg },
                DefaultKind::AssignDefault => VsSuffixOp::AssignDefault { test_empty, arg },
                DefaultKind::ErrorIfUnset => VsSuffixOp::ErrorIfUnset { test_empty, arg },
                DefaultKind::UseAlternative => VsSuffixOp::UseAlternative { test_empty, arg },
            }))
        }
        Id::VopPound | Id::VopDPound => {
            lx.next()?;
            let pattern = read_vs_arg_word(lx, in_dq, false)?;
            Some(Box::new(VsSuffixOp::RemovePrefix {
                longest: next.id == Id::VopDPound,
                pattern,
            }))
        }
        Id::VopPercent | Id::VopDPercent => {
            lx.next()?;
            let pattern = read_vs_arg_word(lx, in_dq, false)?;
            Some(Box::new(VsSuffixOp::RemoveSuffix {
                longest: next.id == Id::VopDPercent,
                pattern,
            }))
        }
        Id::VopSlash | Id::VopDSlash => {
            lx.next()?;
            let pattern = read_vs_arg_word(lx, in_dq, true)?;
            // The pattern stops at `}` or the `/` separator; the
            // separator only lexes as LitSlash in the argument mode.
            lx.push_mode(if in_dq {
                LexMode::VSArgDq
            } else {
                LexMode::VSArgUnq
            });
            let at_slash = lx.peek_id()? == Id::LitSlash;
            if at_slash {
                lx.next()?;
            }
            lx.pop_mode();
            let replacement = if at_slash {
                read_vs_arg_word(lx, in_dq, false)?
            } else {
                None
            };
            Some(Box::new(VsSuffixOp::Replace {
                all: next.id == Id::VopDSlash,
                pattern,
                replacement,
            }))
        }
        Id::VopColon => {
            lx.next()?;
            lx.push_mode(LexMode::Arith);
            lx.skip_space()?;
            let offset = arith_parser::parse_expr(lx)?;
            lx.skip_space()?;
            let length = if lx.peek_id()? == Id::ArithColon {
                lx.next()?;
                lx.skip_space()?;
                Some(arith_parser::parse_expr(lx)?)
            } else {
                None
            };
            lx.pop_mode();
            Some(Box::new(VsSuffixOp::Slice { offset, length }))
        }
        _ => {
            lx.pop_mode();
            return Err(unexpected(lx, &next));
        }
    };

    let close = lx.next()?;
    if close.id != Id::RightDollarBrace {
        lx.pop_mode();
        return Err(ParseError::MissingTerminator {
            terminator: "}",
            span: close.span_id.map(|id| lx.arena().span(id)),
        });
    }
    lx.pop_mode();
    Ok(WordPart::BracedVarSub(BracedVarSub {
        name,
        prefix_op,
        bracket_op,
        suffix_op,
    }))
}

fn is_vsub_name(id: Id) -> bool {
    matches!(
        id,
        Id::VsubName
            | Id::VsubNumber
            | Id::VsubAt
            | Id::VsubStar
            | Id::VsubPound
            | Id::VsubQMark
            | Id::VsubDollar
            | Id::VsubBang
            | Id::VsubHyphen
    )
}

enum DefaultKind {
    UseDefault,
    AssignDefault,
    ErrorIfUnset,
    UseAlternative,
}

fn classify_default_op(id: Id) -> (bool, DefaultKind) {
    match id {
        Id::VopColonHyphen => (true, DefaultKind::UseDefault),
        Id::VopHyphen => (false, DefaultKind::UseDefault),
        Id::VopColonEquals => (true, DefaultKind::AssignDefault),
        Id::VopEquals => (false, DefaultKind::AssignDefault),
        Id::VopColonQMark => (true, DefaultKind::ErrorIfUnset),
        Id::VopQMark => (false, DefaultKind::ErrorIfUnset),
        Id::VopColonPlus => (true, DefaultKind::UseAlternative),
        _ => (false, DefaultKind::UseAlternative),
    }
}

/// `${a[...]}` subscript: `@`, `*`, or an arithmetic index.
fn read_bracket_op(lx: &mut LexerDriver) -> Result<BracketOp, ParseError> {
    lx.push_mode(LexMode::Arith);
    lx.skip_space()?;
    let tok = lx.peek()?;
    let op = if tok.id == Id::ArithStar {
        lx.next()?;
        BracketOp::WholeStar
    } else if tok.id == Id::LitChars && tok.value == "@" {
        lx.next()?;
        BracketOp::WholeAt
    } else {
        BracketOp::Index(arith_parser::parse_expr(lx)?)
    };
    lx.skip_space()?;
    let close = lx.next()?;
    if close.id != Id::ArithRBracket {
        lx.pop_mode();
        return Err(ParseError::MissingTerminator {
            terminator: "]",
            span: close.span_id.map(|id| lx.arena().span(id)),
        });
    }
    lx.pop_mode();
    Ok(op)
}

/// The argument word of a `${x<op>...}` suffix operator, read in
/// VS_ARG_UNQ or VS_ARG_DQ. Stops before the closing `}` (and before a
/// top-level `/` when `stop_at_slash` is set, for replace patterns).
fn read_vs_arg_word(
    lx: &mut LexerDriver,
    in_dq: bool,
    stop_at_slash: bool,
) -> Result<Option<Word>, ParseError> {
    lx.push_mode(if in_dq {
        LexMode::VSArgDq
    } else {
        LexMode::VSArgUnq
    });
    let mut parts: Vec<WordPart> = Vec::new();
    loop {
        let tok = lx.peek()?;
        match tok.id {
            Id::RightDollarBrace => break,
            Id::LitSlash if stop_at_slash => break,
            Id::LitSlash | Id::LitChars | Id::LitOther => {
                lx.next()?;
                parts.push(WordPart::Literal(tok));
            }
            Id::LitEscapedChar => {
                lx.next()?;
                parts.push(WordPart::EscapedLiteral(tok));
            }
            Id::IgnoredLineCont => {
                lx.next()?;
            }
            Id::LeftDollarBrace => {
                parts.push(read_braced_var_sub(lx, in_dq)?);
            }
            Id::Eof => {
                lx.pop_mode();
                return Err(ParseError::MissingTerminator {
                    terminator: "}",
                    span: None,
                });
            }
            _ => match read_sub_part(lx, &tok)? {
                Some(part) => parts.push(part),
                None => {
                    lx.pop_mode();
                    return Err(unexpected(lx, &tok));
                }
            },
        }
    }
    lx.pop_mode();
    Ok(if parts.is_empty() {
        None
    } else {
        Some(Word::Compound(parts))
    })
}

// =============================================================================
// HERE-DOC BODIES
// =============================================================================

/// Parse a drained here-doc body into its word. Quoted delimiters make
/// the body one literal part; unquoted delimiters enable `$`-expansion
/// with DQ-like escape rules.
pub fn parse_heredoc_word(text: &str, do_expansion: bool, path: &str) -> Result<Word, ParseError> {
    if !do_expansion {
        return Ok(Word::Compound(vec![WordPart::Literal(Token::new(
            Id::LitChars,
            text,
            None,
        ))]));
    }
    let mut lx = LexerDriver::new(text, path);
    lx.push_mode(LexMode::HeredocBody);
    let parts = read_quoted_parts(&mut lx, Id::Eof)?;
    Ok(Word::Compound(parts))
}

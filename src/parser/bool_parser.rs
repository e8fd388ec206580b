//! Conditional Expression Parser
//!
//! Recursive descent for the contents of `[[ ... ]]`: `||` over `&&`
//! over `!` over primaries, where a primary is a parenthesized group, a
//! unary test, a binary test, or a bare word tested for non-emptiness.
//! The command parser collects the items (words and operator tokens) and
//! hands them over; the `=~` right-hand side was lexed in BASH_REGEX
//! mode during collection.

use crate::ast::types::{BoolBinaryOp, BoolExpr, Word};
use crate::errors::ParseError;
use crate::lexer::Token;

/// Unary test operators recognized inside `[[ ]]`.
pub const UNARY_OPS: &[&str] = &[
    "-a", "-b", "-c", "-d", "-e", "-f", "-g", "-h", "-k", "-p", "-r", "-s", "-t", "-u", "-w",
    "-x", "-G", "-L", "-N", "-O", "-S", "-z", "-n", "-o", "-v", "-R",
];

/// One collected item of a `[[ ]]` body.
#[derive(Debug, Clone, PartialEq)]
pub enum BoolTok {
    Word(Word),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

pub fn parse_bool_expr(items: &[BoolTok]) -> Result<BoolExpr, ParseError> {
    let mut p = BoolParser { items, pos: 0 };
    let expr = p.parse_or()?;
    if p.pos != items.len() {
        return Err(p.error("trailing tokens in conditional expression"));
    }
    Ok(expr)
}

struct BoolParser<'a> {
    items: &'a [BoolTok],
    pos: usize,
}

impl<'a> BoolParser<'a> {
    fn peek(&self) -> Option<&BoolTok> {
        self.items.get(self.pos)
    }

    fn advance(&mut self) -> Option<BoolTok> {
        let item = self.items.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Message {
            message: message.to_string(),
            span: None,
        }
    }

    fn parse_or(&mut self) -> Result<BoolExpr, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&BoolTok::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = BoolExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<BoolExpr, ParseError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&BoolTok::And) {
            self.advance();
            let right = self.parse_not()?;
            left = BoolExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<BoolExpr, ParseError> {
        if self.peek() == Some(&BoolTok::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(BoolExpr::Not(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<BoolExpr, ParseError> {
        match self.advance() {
            Some(BoolTok::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(BoolTok::RParen) => Ok(inner),
                    _ => Err(self.error("missing `)` in conditional expression")),
                }
            }
            Some(BoolTok::Word(w)) => {
                // Unary test: a bare `-x`-style operator followed by its
                // operand.
                if let Some(text) = w.as_bare_literal() {
                    if UNARY_OPS.contains(&text.as_str()) {
                        let operand = match self.advance() {
                            Some(BoolTok::Word(operand)) => operand,
                            _ => {
                                return Err(
                                    self.error(&format!("`{}` expects an operand", text))
                                )
                            }
                        };
                        let op = unary_token(&w, &text);
                        return Ok(BoolExpr::Unary { op, operand });
                    }
                }
                // Binary test if the next word is an operator.
                let next_op = match self.peek() {
                    Some(BoolTok::Word(next)) => next
                        .as_bare_literal()
                        .and_then(|t| BoolBinaryOp::from_str(&t)),
                    _ => None,
                };
                if let Some(op) = next_op {
                    self.advance();
                    let right = match self.advance() {
                        Some(BoolTok::Word(right)) => right,
                        _ => {
                            return Err(self.error(&format!(
                                "`{}` expects a right operand",
                                op.as_str()
                            )))
                        }
                    };
                    return Ok(BoolExpr::Binary { op, left: w, right });
                }
                Ok(BoolExpr::WordTest(w))
            }
            _ => Err(self.error("expected a word in conditional expression")),
        }
    }
}

fn unary_token(w: &Word, text: &str) -> Token {
    match w {
        Word::Token(t) => t.clone(),
        Word::Compound(parts) => match parts.first() {
            Some(crate::ast::types::WordPart::Literal(t)) if t.value == text => t.clone(),
            _ => Token::new(crate::ids::Id::LitChars, text, None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::WordPart;
    use crate::ids::Id;

    fn w(s: &str) -> BoolTok {
        BoolTok::Word(Word::Compound(vec![WordPart::Literal(Token::new(
            Id::LitChars,
            s,
            None,
        ))]))
    }

    #[test]
    fn test_binary_eq() {
        let e = parse_bool_expr(&[w("a"), w("=="), w("b")]).unwrap();
        assert!(matches!(
            e,
            BoolExpr::Binary {
                op: BoolBinaryOp::StrEq,
                ..
            }
        ));
    }

    #[test]
    fn test_single_eq_is_streq() {
        let e = parse_bool_expr(&[w("a"), w("="), w("b")]).unwrap();
        assert!(matches!(
            e,
            BoolExpr::Binary {
                op: BoolBinaryOp::StrEq,
                ..
            }
        ));
    }

    #[test]
    fn test_unary_file_test() {
        let e = parse_bool_expr(&[w("-f"), w("/etc/passwd")]).unwrap();
        match e {
            BoolExpr::Unary { op, .. } => assert_eq!(op.value, "-f"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_and_or_precedence() {
        // ! a && b || c => ((!a) && b) || c
        let e = parse_bool_expr(&[BoolTok::Not, w("a"), BoolTok::And, w("b"), BoolTok::Or, w("c")])
            .unwrap();
        match e {
            BoolExpr::Or(l, _) => assert!(matches!(*l, BoolExpr::And(..))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parens_group() {
        let e = parse_bool_expr(&[
            w("a"),
            BoolTok::And,
            BoolTok::LParen,
            w("b"),
            BoolTok::Or,
            w("c"),
            BoolTok::RParen,
        ])
        .unwrap();
        match e {
            BoolExpr::And(_, r) => assert!(matches!(*r, BoolExpr::Or(..))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_numeric_compare() {
        let e = parse_bool_expr(&[w("1"), w("-lt"), w("2")]).unwrap();
        assert!(matches!(
            e,
            BoolExpr::Binary {
                op: BoolBinaryOp::NumLt,
                ..
            }
        ));
    }

    #[test]
    fn test_word_test() {
        let e = parse_bool_expr(&[w("x")]).unwrap();
        assert!(matches!(e, BoolExpr::WordTest(_)));
    }

    #[test]
    fn test_missing_operand_is_error() {
        assert!(parse_bool_expr(&[w("-f")]).is_err());
        assert!(parse_bool_expr(&[w("a"), w("=="), BoolTok::RParen]).is_err());
    }
}

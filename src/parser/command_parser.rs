//! Command Parser
//!
//! Recursive descent over the word stream: command lists, and-or chains,
//! pipelines, simple commands with assignment prefixes and redirections,
//! and every compound form. Keywords are recognized from bare literal
//! words in command position, so `echo done` and `for done in ...` never
//! confuse the grammar.
//!
//! Here-docs parse in two steps: the opener registers a pending body
//! with the driver, and once the whole program is parsed a back-fill
//! pass walks the tree, attaches each drained body under its handle, and
//! flips `was_filled`.

use crate::ast::types::*;
use crate::errors::{LexError, ParseError};
use crate::ids::{self, Id, Kw};
use crate::lexer::{LexMode, LexerDriver, Token};
use crate::parser::word_parser::{self, WordItem};
use crate::parser::{arith_parser, bool_parser};
use tracing::debug;

/// Keywords that may introduce an `Assignment` node.
const ASSIGN_KEYWORDS: &[&str] = &["local", "export", "readonly", "declare", "typeset"];

pub struct CommandParser<'a> {
    lx: &'a mut LexerDriver,
}

/// Parse a whole nested program for a substitution body (backticks).
pub fn parse_str_for_sub(src: &str, path: &str) -> Result<Command, ParseError> {
    let mut lx = LexerDriver::new(src, path);
    CommandParser::new(&mut lx).parse_whole()
}

/// Parse a command list for `$( ... )`; the caller consumes the `)`.
pub fn parse_nested_list(lx: &mut LexerDriver) -> Result<Command, ParseError> {
    CommandParser::new(lx).parse_list()
}

impl<'a> CommandParser<'a> {
    pub fn new(lx: &'a mut LexerDriver) -> Self {
        Self { lx }
    }

    /// Parse a complete program: a list of top-level commands, EOF, and
    /// the here-doc back-fill pass.
    pub fn parse_whole(&mut self) -> Result<Command, ParseError> {
        debug!(path = self.lx.arena().path(), "parse start");
        let list = self.parse_list()?;
        self.skip_newlines()?;
        let tok = self.lx.peek()?;
        if tok.id != Id::Eof {
            return Err(self.unexpected(&tok, None));
        }
        if self.lx.has_pending_heredocs() {
            return Err(LexError::UnterminatedHeredoc {
                delimiter: String::new(),
                span: None,
            }
            .into());
        }
        let mut root = match list {
            Command::List { ref children } if children.is_empty() => Command::NoOp,
            list => list,
        };
        self.fill_heredocs(&mut root)?;
        Ok(root)
    }

    // ------------------------------------------------------------------
    // Lists, and-or, pipelines
    // ------------------------------------------------------------------

    fn parse_list(&mut self) -> Result<Command, ParseError> {
        let mut children = Vec::new();
        loop {
            self.skip_newlines()?;
            let Some(cmd) = self.parse_and_or()? else {
                break;
            };
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            match tok.id {
                Id::OpSemi | Id::OpAmp => {
                    self.lx.next()?;
                    children.push(Command::Sentence {
                        child: Box::new(cmd),
                        terminator: tok,
                    });
                }
                Id::OpNewline => children.push(cmd),
                _ => {
                    children.push(cmd);
                    break;
                }
            }
        }
        Ok(Command::List { children })
    }

    /// A list that must contain at least one command (loop and branch
    /// bodies).
    fn parse_block_list(&mut self, what: &'static str) -> Result<Command, ParseError> {
        let list = self.parse_list()?;
        if matches!(&list, Command::List { children } if children.is_empty()) {
            let tok = self.lx.peek()?;
            return Err(self.unexpected(&tok, Some(what)));
        }
        Ok(list)
    }

    fn parse_and_or(&mut self) -> Result<Option<Command>, ParseError> {
        let Some(first) = self.parse_pipeline()? else {
            return Ok(None);
        };
        let mut children = vec![first];
        let mut ops = Vec::new();
        loop {
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            match tok.id {
                Id::OpAndIf | Id::OpOrIf => {
                    self.lx.next()?;
                    ops.push(tok.id);
                    self.skip_newlines()?;
                    match self.parse_pipeline()? {
                        Some(next) => children.push(next),
                        None => {
                            let tok = self.lx.peek()?;
                            return Err(self.unexpected(&tok, Some("command")));
                        }
                    }
                }
                _ => break,
            }
        }
        if children.len() == 1 {
            Ok(children.pop())
        } else {
            Ok(Some(Command::AndOr { children, ops }))
        }
    }

    fn parse_pipeline(&mut self) -> Result<Option<Command>, ParseError> {
        self.lx.skip_space()?;
        let negated = self.eat_bang()?;
        let Some(first) = self.parse_command()? else {
            if negated {
                let tok = self.lx.peek()?;
                return Err(self.unexpected(&tok, Some("command")));
            }
            return Ok(None);
        };
        let mut children = vec![first];
        let mut stderr_indices = Vec::new();
        loop {
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            match tok.id {
                Id::OpPipe | Id::OpPipeAmp => {
                    self.lx.next()?;
                    if tok.id == Id::OpPipeAmp {
                        stderr_indices.push(children.len() - 1);
                    }
                    self.skip_newlines()?;
                    match self.parse_command()? {
                        Some(next) => children.push(next),
                        None => {
                            let tok = self.lx.peek()?;
                            return Err(self.unexpected(&tok, Some("command")));
                        }
                    }
                }
                _ => break,
            }
        }
        if children.len() == 1 && !negated {
            Ok(children.pop())
        } else {
            Ok(Some(Command::Pipeline {
                children,
                negated,
                stderr_indices,
            }))
        }
    }

    /// `!` negates the pipeline when it stands alone as a word.
    fn eat_bang(&mut self) -> Result<bool, ParseError> {
        let tok = self.lx.peek()?;
        if tok.id != Id::LitChars || tok.value != "!" {
            return Ok(false);
        }
        let cp = self.lx.checkpoint();
        self.lx.next()?;
        let after = self.lx.peek()?;
        match after.id {
            Id::WsSpace | Id::OpNewline | Id::Eof | Id::OpLParen | Id::OpDLParen => Ok(true),
            _ => {
                self.lx.rewind(cp);
                Ok(false)
            }
        }
    }

    // ------------------------------------------------------------------
    // Single commands
    // ------------------------------------------------------------------

    fn parse_command(&mut self) -> Result<Option<Command>, ParseError> {
        self.lx.skip_space()?;
        let tok = self.lx.peek()?;
        match tok.id {
            Id::Eof
            | Id::OpNewline
            | Id::OpRParen
            | Id::OpSemi
            | Id::OpAmp
            | Id::OpDSemi
            | Id::OpSemiAmp
            | Id::OpDSemiAmp
            | Id::OpPipe
            | Id::OpPipeAmp
            | Id::OpAndIf
            | Id::OpOrIf => return Ok(None),
            Id::OpLParen => return Ok(Some(self.parse_subshell()?)),
            Id::OpDLParen => return Ok(Some(self.parse_dparen_or_subshell()?)),
            _ => {}
        }
        if tok.id.is_redir_op() {
            self.lx.next()?;
            let mut redirs = Vec::new();
            self.finish_redir(tok, None, &mut redirs)?;
            return Ok(Some(self.parse_simple(None, redirs)?));
        }

        let cp = self.lx.checkpoint();
        let item = word_parser::read_word_or_op(self.lx)?;
        let word = match item {
            WordItem::Word(w) => w,
            WordItem::Eof | WordItem::Newline(_) => return Ok(None),
            WordItem::Operator(op) => return Err(self.unexpected(&op, None)),
        };

        if let Some(text) = word.as_bare_literal() {
            match ids::keyword(&text) {
                Some(Kw::If) => return Ok(Some(self.parse_if()?)),
                Some(Kw::While) => return Ok(Some(self.parse_loop(false)?)),
                Some(Kw::Until) => return Ok(Some(self.parse_loop(true)?)),
                Some(Kw::For) => return Ok(Some(self.parse_for()?)),
                Some(Kw::Case) => return Ok(Some(self.parse_case()?)),
                Some(Kw::LBrace) => return Ok(Some(self.parse_brace_group()?)),
                Some(Kw::DLBracket) => return Ok(Some(self.parse_dbracket()?)),
                Some(Kw::Function) => return Ok(Some(self.parse_function_keyword()?)),
                Some(
                    Kw::Then
                    | Kw::Else
                    | Kw::Elif
                    | Kw::Fi
                    | Kw::Do
                    | Kw::Done
                    | Kw::Esac
                    | Kw::In
                    | Kw::RBrace
                    | Kw::DRBracket,
                ) => {
                    self.lx.rewind(cp);
                    return Ok(None);
                }
                None => {}
            }
            if ASSIGN_KEYWORDS.contains(&text.as_str()) {
                if let Some(cmd) = self.try_parse_keyword_assignment(&word)? {
                    return Ok(Some(cmd));
                }
                self.lx.rewind(cp);
                let item = word_parser::read_word_or_op(self.lx)?;
                let word = match item {
                    WordItem::Word(w) => w,
                    _ => unreachable!("rewound to a word"),
                };
                return Ok(Some(self.parse_simple(Some(word), Vec::new())?));
            }
            if ids::is_valid_name(&text) {
                if let Some(def) = self.try_parse_funcdef(&word)? {
                    return Ok(Some(def));
                }
            }
        }
        Ok(Some(self.parse_simple(Some(word), Vec::new())?))
    }

    fn parse_simple(
        &mut self,
        mut first: Option<Word>,
        mut redirs: Vec<Redir>,
    ) -> Result<Command, ParseError> {
        let mut pairs: Vec<AssignPair> = Vec::new();
        let mut words: Vec<Word> = Vec::new();
        loop {
            let word = match first.take() {
                Some(w) => w,
                None => {
                    self.lx.skip_space()?;
                    let tok = self.lx.peek()?;
                    if tok.id.is_redir_op() {
                        self.lx.next()?;
                        self.finish_redir(tok, None, &mut redirs)?;
                        continue;
                    }
                    match tok.id {
                        Id::Eof
                        | Id::OpNewline
                        | Id::OpSemi
                        | Id::OpAmp
                        | Id::OpPipe
                        | Id::OpPipeAmp
                        | Id::OpAndIf
                        | Id::OpOrIf
                        | Id::OpRParen
                        | Id::OpDSemi
                        | Id::OpSemiAmp
                        | Id::OpDSemiAmp => break,
                        Id::OpLParen | Id::OpDLParen => {
                            return Err(self.unexpected(&tok, None));
                        }
                        _ => word_parser::read_compound_word(self.lx)?,
                    }
                }
            };
            // `2>file`: a digits word glued to a redirection operator is
            // its file descriptor.
            if let Some(fd) = word_as_fd(&word) {
                let tok = self.lx.peek()?;
                if tok.id.is_redir_op() && self.adjacent(&word, &tok) {
                    self.lx.next()?;
                    self.finish_redir(tok, Some(fd), &mut redirs)?;
                    continue;
                }
            }
            if words.is_empty() {
                if let Some(pair) = self.detect_assign_pair(&word)? {
                    pairs.push(pair);
                    continue;
                }
            }
            words.push(word);
        }
        if words.is_empty() && !pairs.is_empty() && redirs.is_empty() {
            return Ok(Command::Assignment {
                keyword: None,
                pairs,
            });
        }
        Ok(Command::Simple {
            words,
            redirs,
            more_env: pairs,
        })
    }

    /// `local x=1 y=2` and friends become an `Assignment` only when
    /// every operand is assignment-shaped.
    fn try_parse_keyword_assignment(
        &mut self,
        keyword: &Word,
    ) -> Result<Option<Command>, ParseError> {
        let cp = self.lx.checkpoint();
        let mut pairs = Vec::new();
        loop {
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            match tok.id {
                Id::Eof
                | Id::OpNewline
                | Id::OpSemi
                | Id::OpAmp
                | Id::OpPipe
                | Id::OpPipeAmp
                | Id::OpAndIf
                | Id::OpOrIf
                | Id::OpRParen
                | Id::OpDSemi
                | Id::OpSemiAmp
                | Id::OpDSemiAmp => break,
                _ => {}
            }
            if tok.id.is_redir_op() || matches!(tok.id, Id::OpLParen | Id::OpDLParen) {
                self.lx.rewind(cp);
                return Ok(None);
            }
            let word = word_parser::read_compound_word(self.lx)?;
            match self.detect_assign_pair(&word)? {
                Some(pair) => pairs.push(pair),
                None => {
                    self.lx.rewind(cp);
                    return Ok(None);
                }
            }
        }
        if pairs.is_empty() {
            self.lx.rewind(cp);
            return Ok(None);
        }
        let kw_tok = match keyword {
            Word::Compound(parts) => match parts.first() {
                Some(WordPart::Literal(t)) => t.clone(),
                _ => return Ok(None),
            },
            Word::Token(t) => t.clone(),
        };
        Ok(Some(Command::Assignment {
            keyword: Some(kw_tok),
            pairs,
        }))
    }

    /// `NAME=value` detection for a word in assignment position.
    fn detect_assign_pair(&mut self, word: &Word) -> Result<Option<AssignPair>, ParseError> {
        let parts = word.parts();
        let first_tok = match parts.first() {
            Some(WordPart::Literal(t)) => t.clone(),
            _ => return Ok(None),
        };
        let chars: Vec<char> = first_tok.value.chars().collect();
        let Some(eq) = chars.iter().position(|&c| c == '=') else {
            return Ok(None);
        };
        let (name_len, append) = if eq > 0 && chars[eq - 1] == '+' {
            (eq - 1, true)
        } else {
            (eq, false)
        };
        let name: String = chars[..name_len].iter().collect();
        if !ids::is_valid_name(&name) {
            return Ok(None);
        }
        let name_tok = match first_tok.span_id {
            Some(span_id) => {
                let sub = self.lx.arena_mut().sub_span(span_id, 0, name_len);
                Token::new(Id::LitChars, &name, Some(sub))
            }
            None => Token::new(Id::LitChars, &name, None),
        };
        let mut value_parts: Vec<WordPart> = Vec::new();
        if eq + 1 < chars.len() {
            let rest: String = chars[eq + 1..].iter().collect();
            let rest_tok = match first_tok.span_id {
                Some(span_id) => {
                    let sub =
                        self.lx
                            .arena_mut()
                            .sub_span(span_id, eq + 1, chars.len() - eq - 1);
                    Token::new(Id::LitChars, &rest, Some(sub))
                }
                None => Token::new(Id::LitChars, &rest, None),
            };
            value_parts.push(WordPart::Literal(rest_tok));
        }
        value_parts.extend(parts[1..].iter().cloned());

        if value_parts.is_empty() {
            // `x=(a b c)`: an adjacent `(` opens an array literal.
            let tok = self.lx.peek()?;
            if tok.id == Id::OpLParen && self.adjacent(word, &tok) {
                self.lx.next()?;
                let words = self.parse_array_words()?;
                return Ok(Some(AssignPair {
                    name: name_tok,
                    append,
                    value: Some(Word::Compound(vec![WordPart::ArrayLiteral { words }])),
                }));
            }
            return Ok(Some(AssignPair {
                name: name_tok,
                append,
                value: None,
            }));
        }
        Ok(Some(AssignPair {
            name: name_tok,
            append,
            value: Some(Word::Compound(value_parts)),
        }))
    }

    fn parse_array_words(&mut self) -> Result<Vec<Word>, ParseError> {
        let mut words = Vec::new();
        loop {
            match word_parser::read_word_or_op(self.lx)? {
                WordItem::Word(w) => words.push(w),
                WordItem::Newline(_) => {}
                WordItem::Operator(op) if op.id == Id::OpRParen => break,
                WordItem::Operator(op) => return Err(self.unexpected(&op, Some(")"))),
                WordItem::Eof => {
                    return Err(ParseError::MissingTerminator {
                        terminator: ")",
                        span: None,
                    })
                }
            }
        }
        Ok(words)
    }

    // ------------------------------------------------------------------
    // Redirections
    // ------------------------------------------------------------------

    fn finish_redir(
        &mut self,
        op: Token,
        fd: Option<i32>,
        redirs: &mut Vec<Redir>,
    ) -> Result<(), ParseError> {
        self.lx.skip_space()?;
        let tok = self.lx.peek()?;
        if tok.id.is_word_terminator() || tok.id == Id::Eof {
            return Err(ParseError::BadRedirTarget {
                span: op.span_id.map(|id| self.lx.arena().span(id)),
            });
        }
        let target = word_parser::read_compound_word(self.lx)?;
        if op.id.is_heredoc_op() {
            let (here_end, quoted) = delimiter_text(&target);
            let strip_tabs = op.id == Id::RedirDLessDash;
            let handle = self.lx.register_heredoc(here_end.clone(), strip_tabs, quoted);
            redirs.push(Redir::HereDoc(HereDoc {
                op: op.id,
                fd,
                here_end,
                do_expansion: !quoted,
                body: None,
                was_filled: false,
                handle,
            }));
        } else {
            redirs.push(Redir::File {
                op: op.id,
                fd,
                target,
            });
        }
        Ok(())
    }

    fn parse_trailing_redirs(&mut self) -> Result<Vec<Redir>, ParseError> {
        let mut redirs = Vec::new();
        loop {
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            if tok.id.is_redir_op() {
                self.lx.next()?;
                self.finish_redir(tok, None, &mut redirs)?;
                continue;
            }
            if tok.id == Id::LitChars && tok.value.chars().all(|c| c.is_ascii_digit()) {
                let cp = self.lx.checkpoint();
                let word = word_parser::read_compound_word(self.lx)?;
                if let Some(fd) = word_as_fd(&word) {
                    let next = self.lx.peek()?;
                    if next.id.is_redir_op() && self.adjacent(&word, &next) {
                        self.lx.next()?;
                        self.finish_redir(next, Some(fd), &mut redirs)?;
                        continue;
                    }
                }
                self.lx.rewind(cp);
            }
            break;
        }
        Ok(redirs)
    }

    // ------------------------------------------------------------------
    // Compound commands
    // ------------------------------------------------------------------

    fn parse_subshell(&mut self) -> Result<Command, ParseError> {
        self.lx.next()?; // (
        let body = self.parse_block_list("command")?;
        let close = self.lx.next()?;
        if close.id != Id::OpRParen {
            return Err(ParseError::MissingTerminator {
                terminator: ")",
                span: close.span_id.map(|id| self.lx.arena().span(id)),
            });
        }
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::Subshell {
            body: Box::new(body),
            redirs,
        })
    }

    /// `((` is an arithmetic command unless the speculative parse fails,
    /// in which case it was two nested subshells.
    fn parse_dparen_or_subshell(&mut self) -> Result<Command, ParseError> {
        let cp = self.lx.checkpoint();
        self.lx.next()?; // ((
        self.lx.push_mode(LexMode::Arith);
        match self.try_parse_dparen_body() {
            Ok(expr) => {
                self.lx.pop_mode();
                let redirs = self.parse_trailing_redirs()?;
                Ok(Command::DParen { expr, redirs })
            }
            Err(_) => {
                self.lx.rewind(cp);
                self.lx.split_next_dlparen();
                self.parse_subshell()
            }
        }
    }

    fn try_parse_dparen_body(&mut self) -> Result<ArithExpr, ParseError> {
        self.lx.skip_space()?;
        let expr = arith_parser::parse_expr(self.lx)?;
        word_parser::expect_arith_close(self.lx)?;
        Ok(expr)
    }

    fn parse_brace_group(&mut self) -> Result<Command, ParseError> {
        let body = self.parse_block_list("command")?;
        self.expect_keyword("}")?;
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::BraceGroup {
            body: Box::new(body),
            redirs,
        })
    }

    fn parse_if(&mut self) -> Result<Command, ParseError> {
        let mut arms = Vec::new();
        let mut else_body = None;
        loop {
            let cond = self.parse_block_list("condition")?;
            self.expect_keyword("then")?;
            let body = self.parse_block_list("command")?;
            arms.push(IfArm {
                cond: Box::new(cond),
                body: Box::new(body),
            });
            match self.next_keyword_of(&["elif", "else", "fi"], "fi")? {
                "elif" => continue,
                "else" => {
                    else_body = Some(Box::new(self.parse_block_list("command")?));
                    self.expect_keyword("fi")?;
                    break;
                }
                _ => break,
            }
        }
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::If {
            arms,
            else_body,
            redirs,
        })
    }

    fn parse_loop(&mut self, until: bool) -> Result<Command, ParseError> {
        let cond = self.parse_block_list("condition")?;
        let body = self.parse_do_group()?;
        let redirs = self.parse_trailing_redirs()?;
        Ok(if until {
            Command::Until {
                cond: Box::new(cond),
                body: Box::new(body),
                redirs,
            }
        } else {
            Command::While {
                cond: Box::new(cond),
                body: Box::new(body),
                redirs,
            }
        })
    }

    fn parse_do_group(&mut self) -> Result<Command, ParseError> {
        self.expect_keyword("do")?;
        let body = self.parse_block_list("command")?;
        self.expect_keyword("done")?;
        Ok(Command::DoGroup {
            body: Box::new(body),
        })
    }

    fn parse_for(&mut self) -> Result<Command, ParseError> {
        self.lx.skip_space()?;
        if self.lx.peek_id()? == Id::OpDLParen {
            return self.parse_for_expr();
        }
        let item = word_parser::read_word_or_op(self.lx)?;
        let name_word = match item {
            WordItem::Word(w) => w,
            WordItem::Operator(op) => return Err(self.unexpected(&op, Some("name"))),
            _ => {
                return Err(ParseError::BadLoopName {
                    name: String::new(),
                    span: None,
                })
            }
        };
        let name_text = name_word.as_bare_literal().unwrap_or_default();
        if !ids::is_valid_name(&name_text) {
            return Err(ParseError::BadLoopName {
                name: name_word
                    .as_bare_literal()
                    .unwrap_or_else(|| "<word>".into()),
                span: self.word_span(&name_word),
            });
        }
        let iter_name = match &name_word {
            Word::Compound(parts) => match parts.first() {
                Some(WordPart::Literal(t)) => t.clone(),
                _ => Token::new(Id::LitChars, &name_text, None),
            },
            Word::Token(t) => t.clone(),
        };

        let mut iter_words = Vec::new();
        let mut do_arg_iter = true;
        self.lx.skip_space()?;
        let tok = self.lx.peek()?;
        match tok.id {
            Id::OpSemi => {
                self.lx.next()?;
            }
            Id::OpNewline => {}
            _ => {
                let cp = self.lx.checkpoint();
                let item = word_parser::read_word_or_op(self.lx)?;
                match item {
                    WordItem::Word(w) if w.as_bare_literal().as_deref() == Some("in") => {
                        do_arg_iter = false;
                        loop {
                            self.lx.skip_space()?;
                            let tok = self.lx.peek()?;
                            match tok.id {
                                Id::OpSemi => {
                                    self.lx.next()?;
                                    break;
                                }
                                Id::OpNewline | Id::Eof => break,
                                id if id.is_word_terminator() => {
                                    return Err(self.unexpected(&tok, Some(";")))
                                }
                                _ => iter_words.push(word_parser::read_compound_word(self.lx)?),
                            }
                        }
                    }
                    WordItem::Word(w) if w.as_bare_literal().as_deref() == Some("do") => {
                        self.lx.rewind(cp);
                    }
                    WordItem::Word(_) | WordItem::Operator(_) => {
                        return Err(self.unexpected(&tok, Some("in")));
                    }
                    _ => {}
                }
            }
        }
        let body = self.parse_do_group()?;
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::ForEach {
            iter_name,
            iter_words,
            do_arg_iter,
            body: Box::new(body),
            redirs,
        })
    }

    fn parse_for_expr(&mut self) -> Result<Command, ParseError> {
        self.lx.next()?; // ((
        self.lx.push_mode(LexMode::Arith);
        let init = self.opt_arith_until(Id::ArithSemi)?;
        self.expect_arith_token(Id::ArithSemi, ";")?;
        let cond = self.opt_arith_until(Id::ArithSemi)?;
        self.expect_arith_token(Id::ArithSemi, ";")?;
        let update = self.opt_arith_until(Id::ArithRParen)?;
        word_parser::expect_arith_close(self.lx)?;
        self.lx.pop_mode();
        self.lx.skip_space()?;
        if self.lx.peek_id()? == Id::OpSemi {
            self.lx.next()?;
        }
        let body = self.parse_do_group()?;
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::ForExpr {
            init,
            cond,
            update,
            body: Some(Box::new(body)),
            redirs,
        })
    }

    fn opt_arith_until(&mut self, stop: Id) -> Result<Option<ArithExpr>, ParseError> {
        self.lx.skip_space()?;
        if self.lx.peek_id()? == stop {
            return Ok(None);
        }
        Ok(Some(arith_parser::parse_expr(self.lx)?))
    }

    fn expect_arith_token(&mut self, id: Id, text: &'static str) -> Result<(), ParseError> {
        self.lx.skip_space()?;
        let tok = self.lx.next()?;
        if tok.id != id {
            return Err(ParseError::MissingTerminator {
                terminator: text,
                span: tok.span_id.map(|s| self.lx.arena().span(s)),
            });
        }
        Ok(())
    }

    fn parse_case(&mut self) -> Result<Command, ParseError> {
        self.lx.skip_space()?;
        let to_match = match word_parser::read_word_or_op(self.lx)? {
            WordItem::Word(w) => w,
            _ => {
                return Err(ParseError::Message {
                    message: "`case` expects a word to match".into(),
                    span: None,
                })
            }
        };
        self.expect_keyword("in")?;
        let mut arms = Vec::new();
        loop {
            self.skip_newlines()?;
            let cp = self.lx.checkpoint();
            let first = match word_parser::read_word_or_op(self.lx)? {
                WordItem::Word(w) => {
                    if w.as_bare_literal().as_deref() == Some("esac") {
                        break;
                    }
                    w
                }
                WordItem::Operator(op) if op.id == Id::OpLParen => {
                    // Optional `(` before the pattern list.
                    match word_parser::read_word_or_op(self.lx)? {
                        WordItem::Word(w) => w,
                        other => {
                            return Err(ParseError::Message {
                                message: format!("expected a case pattern, got {:?}", other),
                                span: None,
                            })
                        }
                    }
                }
                WordItem::Eof => {
                    return Err(ParseError::MissingTerminator {
                        terminator: "esac",
                        span: None,
                    })
                }
                WordItem::Operator(op) => return Err(self.unexpected(&op, Some("pattern"))),
                WordItem::Newline(_) => {
                    self.lx.rewind(cp);
                    continue;
                }
            };
            let mut patterns = vec![first];
            loop {
                self.lx.skip_space()?;
                if self.lx.peek_id()? == Id::OpPipe {
                    self.lx.next()?;
                    match word_parser::read_word_or_op(self.lx)? {
                        WordItem::Word(w) => patterns.push(w),
                        other => {
                            return Err(ParseError::Message {
                                message: format!("expected a case pattern, got {:?}", other),
                                span: None,
                            })
                        }
                    }
                } else {
                    break;
                }
            }
            self.lx.skip_space()?;
            let close = self.lx.next()?;
            if close.id != Id::OpRParen {
                return Err(ParseError::MissingTerminator {
                    terminator: ")",
                    span: close.span_id.map(|s| self.lx.arena().span(s)),
                });
            }
            let body = self.parse_list()?;
            let body = match body {
                Command::List { ref children } if children.is_empty() => None,
                list => Some(Box::new(list)),
            };
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            let terminator = if tok.id.is_case_arm_terminator() {
                self.lx.next()?;
                tok.id
            } else {
                Id::OpDSemi
            };
            arms.push(CaseArm {
                patterns,
                body,
                terminator,
            });
        }
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::Case {
            to_match,
            arms,
            redirs,
        })
    }

    fn parse_dbracket(&mut self) -> Result<Command, ParseError> {
        let mut items: Vec<bool_parser::BoolTok> = Vec::new();
        loop {
            self.lx.skip_space()?;
            let tok = self.lx.peek()?;
            match tok.id {
                Id::OpNewline => {
                    self.lx.next()?;
                }
                Id::OpAndIf => {
                    self.lx.next()?;
                    items.push(bool_parser::BoolTok::And);
                }
                Id::OpOrIf => {
                    self.lx.next()?;
                    items.push(bool_parser::BoolTok::Or);
                }
                Id::OpLParen => {
                    self.lx.next()?;
                    items.push(bool_parser::BoolTok::LParen);
                }
                Id::OpRParen => {
                    self.lx.next()?;
                    items.push(bool_parser::BoolTok::RParen);
                }
                Id::Eof => {
                    return Err(ParseError::MissingTerminator {
                        terminator: "]]",
                        span: None,
                    })
                }
                _ => {
                    let word = word_parser::read_compound_word(self.lx)?;
                    let text = word.as_bare_literal();
                    match text.as_deref() {
                        Some("]]") => break,
                        Some("!") => items.push(bool_parser::BoolTok::Not),
                        Some("=~") => {
                            items.push(bool_parser::BoolTok::Word(word));
                            // The regex RHS lexes in its own mode.
                            self.lx.skip_space()?;
                            self.lx.push_mode(LexMode::BashRegex);
                            let rhs = word_parser::read_compound_word(self.lx)?;
                            self.lx.pop_mode();
                            items.push(bool_parser::BoolTok::Word(rhs));
                        }
                        _ => items.push(bool_parser::BoolTok::Word(word)),
                    }
                }
            }
        }
        let expr = bool_parser::parse_bool_expr(&items)?;
        let redirs = self.parse_trailing_redirs()?;
        Ok(Command::DBracket { expr, redirs })
    }

    fn parse_function_keyword(&mut self) -> Result<Command, ParseError> {
        self.lx.skip_space()?;
        let name_word = match word_parser::read_word_or_op(self.lx)? {
            WordItem::Word(w) => w,
            _ => {
                return Err(ParseError::BadFunctionName {
                    name: String::new(),
                    span: None,
                })
            }
        };
        let text = name_word.as_bare_literal().unwrap_or_default();
        if !ids::is_valid_name(&text) {
            return Err(ParseError::BadFunctionName {
                name: text,
                span: self.word_span(&name_word),
            });
        }
        let name = match &name_word {
            Word::Compound(parts) => match parts.first() {
                Some(WordPart::Literal(t)) => t.clone(),
                _ => Token::new(Id::LitChars, &text, None),
            },
            Word::Token(t) => t.clone(),
        };
        self.lx.skip_space()?;
        if self.lx.peek_id()? == Id::OpLParen {
            self.lx.next()?;
            self.lx.skip_space()?;
            let close = self.lx.next()?;
            if close.id != Id::OpRParen {
                return Err(ParseError::MissingTerminator {
                    terminator: ")",
                    span: close.span_id.map(|s| self.lx.arena().span(s)),
                });
            }
        }
        self.finish_funcdef(name)
    }

    /// `name () compound`, tried speculatively after an ordinary word.
    fn try_parse_funcdef(&mut self, name_word: &Word) -> Result<Option<Command>, ParseError> {
        let cp = self.lx.checkpoint();
        self.lx.skip_space()?;
        if self.lx.peek_id()? != Id::OpLParen {
            return Ok(None);
        }
        self.lx.next()?;
        self.lx.skip_space()?;
        if self.lx.peek_id()? != Id::OpRParen {
            self.lx.rewind(cp);
            return Ok(None);
        }
        self.lx.next()?;
        let text = name_word.as_bare_literal().unwrap_or_default();
        let name = match name_word {
            Word::Compound(parts) => match parts.first() {
                Some(WordPart::Literal(t)) => t.clone(),
                _ => Token::new(Id::LitChars, &text, None),
            },
            Word::Token(t) => t.clone(),
        };
        Ok(Some(self.finish_funcdef(name)?))
    }

    fn finish_funcdef(&mut self, name: Token) -> Result<Command, ParseError> {
        self.skip_newlines()?;
        let body = match self.parse_command()? {
            Some(body) => body,
            None => {
                let tok = self.lx.peek()?;
                return Err(self.unexpected(&tok, Some("function body")));
            }
        };
        Ok(Command::FuncDef {
            name,
            body: Box::new(body),
            redirs: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Here-doc back-fill
    // ------------------------------------------------------------------

    fn fill_heredocs(&mut self, cmd: &mut Command) -> Result<(), ParseError> {
        let path = self.lx.arena().path().to_string();
        fill_command(cmd, self.lx, &path)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        loop {
            self.lx.skip_space()?;
            if self.lx.peek_id()? == Id::OpNewline {
                self.lx.next()?;
            } else {
                return Ok(());
            }
        }
    }

    fn expect_keyword(&mut self, expected: &'static str) -> Result<(), ParseError> {
        self.skip_newlines()?;
        match word_parser::read_word_or_op(self.lx)? {
            WordItem::Word(w) if w.as_bare_literal().as_deref() == Some(expected) => Ok(()),
            _ => Err(ParseError::MissingTerminator {
                terminator: expected,
                span: None,
            }),
        }
    }

    fn next_keyword_of(
        &mut self,
        choices: &[&'static str],
        fallback: &'static str,
    ) -> Result<&'static str, ParseError> {
        self.skip_newlines()?;
        match word_parser::read_word_or_op(self.lx)? {
            WordItem::Word(w) => {
                let text = w.as_bare_literal().unwrap_or_default();
                for choice in choices {
                    if text == *choice {
                        return Ok(*choice);
                    }
                }
                Err(ParseError::MissingTerminator {
                    terminator: fallback,
                    span: self.word_span(&w),
                })
            }
            _ => Err(ParseError::MissingTerminator {
                terminator: fallback,
                span: None,
            }),
        }
    }

    /// Do the word's last token and the following token touch?
    fn adjacent(&self, word: &Word, tok: &Token) -> bool {
        let Some(span_id) = tok.span_id else {
            return false;
        };
        let tok_span = self.lx.arena().span(span_id);
        let Some(end) = word_end(self.lx, word) else {
            return false;
        };
        end == (tok_span.line_id, tok_span.col)
    }

    fn word_span(&self, word: &Word) -> Option<crate::arena::LineSpan> {
        let tok = match word {
            Word::Token(t) => Some(t),
            Word::Compound(parts) => parts.iter().find_map(|p| match p {
                WordPart::Literal(t) | WordPart::EscapedLiteral(t) => Some(t),
                _ => None,
            }),
        }?;
        tok.span_id.map(|id| self.lx.arena().span(id))
    }

    fn unexpected(&self, tok: &Token, expected: Option<&'static str>) -> ParseError {
        ParseError::UnexpectedToken {
            got: if tok.id == Id::Eof {
                "end of input".to_string()
            } else {
                tok.value.clone()
            },
            expected,
            span: tok.span_id.map(|id| self.lx.arena().span(id)),
        }
    }
}

fn word_as_fd(word: &Word) -> Option<i32> {
    let parts = word.parts();
    if parts.len() != 1 {
        return None;
    }
    match &parts[0] {
        WordPart::Literal(t)
            if !t.value.is_empty() && t.value.chars().all(|c| c.is_ascii_digit()) =>
        {
            t.value.parse().ok()
        }
        _ => None,
    }
}

fn word_end(lx: &LexerDriver, word: &Word) -> Option<(usize, usize)> {
    let tok = match word {
        Word::Token(t) => Some(t),
        Word::Compound(parts) => parts.iter().rev().find_map(|p| match p {
            WordPart::Literal(t) | WordPart::EscapedLiteral(t) => Some(t),
            _ => None,
        }),
    }?;
    let span = lx.arena().span(tok.span_id?);
    Some((span.line_id, span.col + span.length))
}

/// Delimiter word of a here-doc: the unquoted text plus whether any
/// quoting was present (quoting disables body expansion).
fn delimiter_text(word: &Word) -> (String, bool) {
    let mut text = String::new();
    let mut quoted = false;
    for part in word.parts() {
        match part {
            WordPart::Literal(t) => text.push_str(&t.value),
            WordPart::EscapedLiteral(t) => {
                quoted = true;
                text.push_str(t.value.trim_start_matches('\\'));
            }
            WordPart::SingleQuoted { toks, .. } => {
                quoted = true;
                for t in toks {
                    text.push_str(&t.value);
                }
            }
            WordPart::DoubleQuoted { parts } => {
                quoted = true;
                for p in parts {
                    if let WordPart::Literal(t) = p {
                        text.push_str(&t.value);
                    }
                }
            }
            _ => {}
        }
    }
    (text, quoted)
}

// =============================================================================
// Here-doc back-fill walkers
// =============================================================================

fn fill_command(cmd: &mut Command, lx: &mut LexerDriver, path: &str) -> Result<(), ParseError> {
    match cmd {
        Command::NoOp => {}
        Command::Simple {
            words,
            redirs,
            more_env,
        } => {
            for w in words {
                fill_word(w, lx, path)?;
            }
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
            for pair in more_env {
                if let Some(w) = &mut pair.value {
                    fill_word(w, lx, path)?;
                }
            }
        }
        Command::Sentence { child, .. } => fill_command(child, lx, path)?,
        Command::Assignment { pairs, .. } => {
            for pair in pairs {
                if let Some(w) = &mut pair.value {
                    fill_word(w, lx, path)?;
                }
            }
        }
        Command::Pipeline { children, .. } | Command::AndOr { children, .. } => {
            for c in children {
                fill_command(c, lx, path)?;
            }
        }
        Command::List { children } => {
            for c in children {
                fill_command(c, lx, path)?;
            }
        }
        Command::DoGroup { body } => fill_command(body, lx, path)?,
        Command::BraceGroup { body, redirs } | Command::Subshell { body, redirs } => {
            fill_command(body, lx, path)?;
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::DParen { expr, redirs } => {
            fill_arith(expr, lx, path)?;
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::DBracket { expr, redirs } => {
            fill_bool(expr, lx, path)?;
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::ForEach {
            iter_words,
            body,
            redirs,
            ..
        } => {
            for w in iter_words {
                fill_word(w, lx, path)?;
            }
            fill_command(body, lx, path)?;
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::ForExpr {
            init,
            cond,
            update,
            body,
            redirs,
        } => {
            for e in [init, cond, update].into_iter().flatten() {
                fill_arith(e, lx, path)?;
            }
            if let Some(body) = body {
                fill_command(body, lx, path)?;
            }
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::While { cond, body, redirs } | Command::Until { cond, body, redirs } => {
            fill_command(cond, lx, path)?;
            fill_command(body, lx, path)?;
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::If {
            arms,
            else_body,
            redirs,
        } => {
            for arm in arms {
                fill_command(&mut arm.cond, lx, path)?;
                fill_command(&mut arm.body, lx, path)?;
            }
            if let Some(else_body) = else_body {
                fill_command(else_body, lx, path)?;
            }
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::Case {
            to_match,
            arms,
            redirs,
        } => {
            fill_word(to_match, lx, path)?;
            for arm in arms {
                for p in &mut arm.patterns {
                    fill_word(p, lx, path)?;
                }
                if let Some(body) = &mut arm.body {
                    fill_command(body, lx, path)?;
                }
            }
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
        Command::FuncDef { body, redirs, .. } => {
            fill_command(body, lx, path)?;
            for r in redirs {
                fill_redir(r, lx, path)?;
            }
        }
    }
    Ok(())
}

fn fill_redir(redir: &mut Redir, lx: &mut LexerDriver, path: &str) -> Result<(), ParseError> {
    match redir {
        Redir::File { target, .. } => fill_word(target, lx, path),
        Redir::HereDoc(hd) => {
            if !hd.was_filled {
                let text = lx.take_heredoc_body(hd.handle).unwrap_or_default();
                let word = word_parser::parse_heredoc_word(&text, hd.do_expansion, path)?;
                hd.body = Some(word);
                hd.was_filled = true;
            }
            Ok(())
        }
    }
}

fn fill_word(word: &mut Word, lx: &mut LexerDriver, path: &str) -> Result<(), ParseError> {
    if let Word::Compound(parts) = word {
        for p in parts {
            fill_part(p, lx, path)?;
        }
    }
    Ok(())
}

fn fill_part(part: &mut WordPart, lx: &mut LexerDriver, path: &str) -> Result<(), ParseError> {
    match part {
        WordPart::DoubleQuoted { parts } => {
            for p in parts {
                fill_part(p, lx, path)?;
            }
        }
        WordPart::CommandSub { command } => fill_command(command, lx, path)?,
        WordPart::ArithSub { expr } => fill_arith(expr, lx, path)?,
        WordPart::ArrayLiteral { words } => {
            for w in words {
                fill_word(w, lx, path)?;
            }
        }
        WordPart::BracedVarSub(sub) => {
            if let Some(op) = &mut sub.suffix_op {
                match op.as_mut() {
                    VsSuffixOp::UseDefault { arg, .. }
                    | VsSuffixOp::AssignDefault { arg, .. }
                    | VsSuffixOp::ErrorIfUnset { arg, .. }
                    | VsSuffixOp::UseAlternative { arg, .. } => {
                        if let Some(w) = arg {
                            fill_word(w, lx, path)?;
                        }
                    }
                    VsSuffixOp::RemovePrefix { pattern, .. }
                    | VsSuffixOp::RemoveSuffix { pattern, .. } => {
                        if let Some(w) = pattern {
                            fill_word(w, lx, path)?;
                        }
                    }
                    VsSuffixOp::Replace {
                        pattern,
                        replacement,
                        ..
                    } => {
                        if let Some(w) = pattern {
                            fill_word(w, lx, path)?;
                        }
                        if let Some(w) = replacement {
                            fill_word(w, lx, path)?;
                        }
                    }
                    VsSuffixOp::Slice { offset, length } => {
                        fill_arith(offset, lx, path)?;
                        if let Some(len) = length {
                            fill_arith(len, lx, path)?;
                        }
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn fill_arith(expr: &mut ArithExpr, lx: &mut LexerDriver, path: &str) -> Result<(), ParseError> {
    match expr {
        ArithExpr::VarRef(_) => Ok(()),
        ArithExpr::Word(w) => fill_word(w, lx, path),
        ArithExpr::Unary { child, .. } => fill_arith(child, lx, path),
        ArithExpr::Binary { left, right, .. } => {
            fill_arith(left, lx, path)?;
            fill_arith(right, lx, path)
        }
        ArithExpr::Assign { rhs, .. } => fill_arith(rhs, lx, path),
        ArithExpr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            fill_arith(cond, lx, path)?;
            fill_arith(then_expr, lx, path)?;
            fill_arith(else_expr, lx, path)
        }
        ArithExpr::FuncCall { args, .. } => {
            for a in args {
                fill_arith(a, lx, path)?;
            }
            Ok(())
        }
    }
}

fn fill_bool(expr: &mut BoolExpr, lx: &mut LexerDriver, path: &str) -> Result<(), ParseError> {
    match expr {
        BoolExpr::WordTest(w) => fill_word(w, lx, path),
        BoolExpr::Binary { left, right, .. } => {
            fill_word(left, lx, path)?;
            fill_word(right, lx, path)
        }
        BoolExpr::Unary { operand, .. } => fill_word(operand, lx, path),
        BoolExpr::Not(inner) => fill_bool(inner, lx, path),
        BoolExpr::And(l, r) | BoolExpr::Or(l, r) => {
            fill_bool(l, lx, path)?;
            fill_bool(r, lx, path)
        }
    }
}

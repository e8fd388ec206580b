//! Lexer Driver
//!
//! Owns the arena, the mode stack, and the pending-here-doc queue, and
//! hands tokens to the parsers on demand. Supports one-token look-ahead
//! (cached per mode and position) and a checkpoint/rewind primitive that
//! restores both the input position and the mode stack.
//!
//! Here-docs: redirection parsing registers `(delimiter, strip_tabs,
//! quoted)` under a stable integer handle. When a newline is consumed at
//! OUTER level the driver drains the queue, reading raw body lines until
//! the delimiter line, and parks each body under its handle for the
//! command parser to collect.

use crate::arena::{Arena, LineSpan};
use crate::errors::LexError;
use crate::ids::Id;
use crate::lexer::core::match_token;
use crate::lexer::modes::LexMode;
use crate::lexer::token::Token;
use tracing::trace;

/// A here-doc whose body has not been read yet.
#[derive(Debug, Clone)]
pub struct PendingHeredoc {
    pub handle: usize,
    pub delimiter: String,
    pub strip_tabs: bool,
    pub quoted: bool,
}

/// Saved driver state for speculative parsing.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    line_idx: usize,
    col: usize,
    mode_stack: Vec<LexMode>,
    pending: Vec<PendingHeredoc>,
    bodies_len: usize,
    word_adjacent: bool,
    split_dlparen_once: bool,
}

#[derive(Debug, Clone)]
struct Peeked {
    mode: LexMode,
    line_idx: usize,
    col: usize,
    token: Token,
    next_line: usize,
    next_col: usize,
    word_adjacent_after: bool,
}

pub struct LexerDriver {
    arena: Arena,
    lines: Vec<Vec<char>>,
    line_idx: usize,
    col: usize,
    mode_stack: Vec<LexMode>,
    peeked: Option<Peeked>,
    pending_heredocs: Vec<PendingHeredoc>,
    heredoc_bodies: Vec<Option<String>>,
    word_adjacent: bool,
    /// One-shot hint: lex the next `((` as a single `(`. Set by the
    /// command parser when a speculative arithmetic parse fails and the
    /// text is really two nested subshells.
    split_dlparen_once: bool,
}

impl LexerDriver {
    pub fn new(src: &str, path: &str) -> Self {
        let arena = Arena::from_source(path, src);
        let lines = (0..arena.line_count())
            .map(|i| arena.line(i).chars().collect())
            .collect();
        Self {
            arena,
            lines,
            line_idx: 0,
            col: 0,
            mode_stack: vec![LexMode::Outer],
            peeked: None,
            pending_heredocs: Vec::new(),
            heredoc_bodies: Vec::new(),
            word_adjacent: false,
            split_dlparen_once: false,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn into_arena(self) -> Arena {
        self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    // ------------------------------------------------------------------
    // Mode stack
    // ------------------------------------------------------------------

    pub fn mode(&self) -> LexMode {
        *self.mode_stack.last().unwrap_or(&LexMode::Outer)
    }

    pub fn push_mode(&mut self, mode: LexMode) {
        self.mode_stack.push(mode);
    }

    pub fn pop_mode(&mut self) {
        debug_assert!(self.mode_stack.len() > 1, "cannot pop the outer mode");
        self.mode_stack.pop();
    }

    /// Replace the top of the mode stack (VS_1 -> VS_2 transitions).
    pub fn set_mode(&mut self, mode: LexMode) {
        if let Some(top) = self.mode_stack.last_mut() {
            *top = mode;
        }
    }

    pub fn mode_depth(&self) -> usize {
        self.mode_stack.len()
    }

    pub fn split_next_dlparen(&mut self) {
        self.split_dlparen_once = true;
        // A stale look-ahead would bypass the hint.
        self.peeked = None;
    }

    // ------------------------------------------------------------------
    // Token stream
    // ------------------------------------------------------------------

    /// Consume and return the next token in the current mode.
    pub fn next(&mut self) -> Result<Token, LexError> {
        let mode = self.mode();
        if let Some(p) = self.peeked.take() {
            if p.mode == mode && p.line_idx == self.line_idx && p.col == self.col {
                self.line_idx = p.next_line;
                self.col = p.next_col;
                self.word_adjacent = p.word_adjacent_after;
                if p.token.id == Id::OpNewline && mode == LexMode::Outer {
                    self.drain_heredocs()?;
                }
                return Ok(p.token);
            }
        }
        let tok = self.lex_raw(mode)?;
        if tok.id == Id::OpNewline && mode == LexMode::Outer {
            self.drain_heredocs()?;
        }
        Ok(tok)
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Token, LexError> {
        let mode = self.mode();
        if let Some(p) = &self.peeked {
            if p.mode == mode && p.line_idx == self.line_idx && p.col == self.col {
                return Ok(p.token.clone());
            }
        }
        let line_idx = self.line_idx;
        let col = self.col;
        let word_adjacent = self.word_adjacent;
        let tok = self.lex_raw(mode)?;
        self.peeked = Some(Peeked {
            mode,
            line_idx,
            col,
            token: tok.clone(),
            next_line: self.line_idx,
            next_col: self.col,
            word_adjacent_after: self.word_adjacent,
        });
        // Restore: peek must not move the cursor.
        self.line_idx = line_idx;
        self.col = col;
        self.word_adjacent = word_adjacent;
        Ok(tok)
    }

    pub fn peek_id(&mut self) -> Result<Id, LexError> {
        Ok(self.peek()?.id)
    }

    /// Consume spaces, line continuations, and comments (not newlines).
    pub fn skip_space(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_id()? {
                Id::WsSpace | Id::IgnoredLineCont | Id::IgnoredComment => {
                    self.next()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_raw(&mut self, mode: LexMode) -> Result<Token, LexError> {
        loop {
            if self.line_idx >= self.lines.len() {
                return Ok(Token::eof());
            }
            if self.col >= self.lines[self.line_idx].len() {
                self.line_idx += 1;
                self.col = 0;
                self.word_adjacent = false;
                continue;
            }
            break;
        }
        let line = &self.lines[self.line_idx];
        let (mut id, mut len) = match_token(mode, line, self.col, self.word_adjacent);
        if id == Id::OpDLParen && self.split_dlparen_once {
            self.split_dlparen_once = false;
            id = Id::OpLParen;
            len = 1;
        }
        let value: String = line[self.col..self.col + len].iter().collect();
        let span = LineSpan {
            line_id: self.line_idx,
            col: self.col,
            length: len,
        };
        let span_id = self.arena.add_span(span);
        self.col += len;
        self.word_adjacent = token_ends_word(id);
        Ok(Token::new(id, value, Some(span_id)))
    }

    // ------------------------------------------------------------------
    // Here-docs
    // ------------------------------------------------------------------

    /// Register a pending here-doc; returns its stable handle.
    pub fn register_heredoc(&mut self, delimiter: String, strip_tabs: bool, quoted: bool) -> usize {
        let handle = self.heredoc_bodies.len();
        self.heredoc_bodies.push(None);
        trace!(handle, %delimiter, strip_tabs, quoted, "here-doc scheduled");
        self.pending_heredocs.push(PendingHeredoc {
            handle,
            delimiter,
            strip_tabs,
            quoted,
        });
        handle
    }

    pub fn has_pending_heredocs(&self) -> bool {
        !self.pending_heredocs.is_empty()
    }

    /// Collect a drained here-doc body by handle.
    pub fn take_heredoc_body(&mut self, handle: usize) -> Option<String> {
        self.heredoc_bodies.get_mut(handle).and_then(|b| b.take())
    }

    /// Read here-doc bodies for everything queued, in order, starting at
    /// the current line. Called right after a newline is consumed at
    /// OUTER level.
    fn drain_heredocs(&mut self) -> Result<(), LexError> {
        if self.pending_heredocs.is_empty() {
            return Ok(());
        }
        self.peeked = None;
        let pending = std::mem::take(&mut self.pending_heredocs);
        for hd in pending {
            let mut body = String::new();
            let mut terminated = false;
            while self.line_idx < self.lines.len() {
                let raw: String = self.lines[self.line_idx].iter().collect();
                let line = raw.strip_suffix('\n').unwrap_or(&raw);
                let compare = if hd.strip_tabs {
                    line.trim_start_matches('\t')
                } else {
                    line
                };
                self.line_idx += 1;
                self.col = 0;
                if compare == hd.delimiter {
                    terminated = true;
                    break;
                }
                if hd.strip_tabs {
                    body.push_str(line.trim_start_matches('\t'));
                    body.push('\n');
                } else {
                    body.push_str(&raw);
                    if !raw.ends_with('\n') {
                        body.push('\n');
                    }
                }
            }
            if !terminated {
                return Err(LexError::UnterminatedHeredoc {
                    delimiter: hd.delimiter,
                    span: None,
                });
            }
            trace!(handle = hd.handle, bytes = body.len(), "here-doc body read");
            self.heredoc_bodies[hd.handle] = Some(body);
        }
        self.word_adjacent = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            line_idx: self.line_idx,
            col: self.col,
            mode_stack: self.mode_stack.clone(),
            pending: self.pending_heredocs.clone(),
            bodies_len: self.heredoc_bodies.len(),
            word_adjacent: self.word_adjacent,
            split_dlparen_once: self.split_dlparen_once,
        }
    }

    /// Restore a checkpoint: input position, mode stack, and the
    /// here-doc queue all rewind together.
    pub fn rewind(&mut self, cp: Checkpoint) {
        trace!(
            from_line = self.line_idx,
            to_line = cp.line_idx,
            "checkpoint rewind"
        );
        self.line_idx = cp.line_idx;
        self.col = cp.col;
        self.mode_stack = cp.mode_stack;
        self.pending_heredocs = cp.pending;
        self.heredoc_bodies.truncate(cp.bodies_len);
        self.word_adjacent = cp.word_adjacent;
        self.split_dlparen_once = cp.split_dlparen_once;
        self.peeked = None;
    }

}

/// True when a token can end a word: the next `#` is then literal rather
/// than a comment opener.
fn token_ends_word(id: Id) -> bool {
    matches!(
        id,
        Id::LitChars
            | Id::LitOther
            | Id::LitEscapedChar
            | Id::LitTilde
            | Id::LitSlash
            | Id::RightSQuote
            | Id::RightDQuote
            | Id::RightBacktick
            | Id::RightDollarBrace
            | Id::VsubName
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

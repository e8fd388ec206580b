//! Word Expansion Engine
//!
//! Evaluates a `Word` against an environment, producing argv fields
//! through the POSIX stage order: tilde expansion, parameter and
//! command and arithmetic substitution, field splitting, pathname
//! expansion, quote removal.
//!
//! Every part evaluates to tagged segments `(value, splittable, quoted)`
//! with hard separators for `"$@"`. Splitting then walks the segments:
//! the first field of a split glues onto the running field, the last
//! starts the next one, middles stand alone. Quoted text is
//! backslash-protected when it is produced, so one final unescape pass
//! is the quote-removal stage.

use crate::ast::types::{Command, Word, WordPart};
use crate::errors::ExpandError;
use crate::expand::env::Env;
use crate::expand::env::VarValue;
use crate::expand::glob::{self, GlobFs};
use crate::expand::split::{self, split_fields};
use crate::expand::{arith_eval, param_ops, pattern, tilde};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Expansion policy knobs.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Drop fields whose glob matches nothing (default keeps the
    /// literal pattern).
    pub nullglob: bool,
    /// Disable pathname expansion entirely.
    pub noglob: bool,
    /// Unset variables are errors (`set -u`).
    pub strict_unset: bool,
    /// Unreadable directories fail pathname expansion instead of
    /// matching nothing.
    pub strict_glob: bool,
    /// `~user` lookups; the core never reads the passwd database.
    pub user_homes: HashMap<String, String>,
}

/// Cooperative cancellation, polled between expansion stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The execution layer's half of `$(...)`: run the command, give back
/// its stdout. The core never spawns processes.
pub trait CommandSubHandler {
    fn run(&mut self, command: &Command) -> Result<String, ExpandError>;
}

/// One evaluated piece of a word.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Seg {
    Str {
        val: String,
        splittable: bool,
        quoted: bool,
    },
    /// Hard field boundary between `"$@"` elements.
    Sep,
}

/// Where in the word a part sits: inside double quotes, whether bare
/// literal text splits (true inside `${x:-...}` default words), and
/// whether the word is a pattern (source backslashes stay active
/// escapes there).
#[derive(Debug, Clone, Copy)]
pub(crate) struct QuoteCtx {
    pub in_dq: bool,
    pub split_literals: bool,
    pub for_pattern: bool,
}

impl QuoteCtx {
    pub(crate) fn field() -> Self {
        Self {
            in_dq: false,
            split_literals: false,
            for_pattern: false,
        }
    }

    pub(crate) fn pattern() -> Self {
        Self {
            in_dq: false,
            split_literals: false,
            for_pattern: true,
        }
    }
}

pub struct WordEvaluator<'a> {
    pub(crate) env: &'a mut Env,
    pub(crate) opts: &'a ExpandOptions,
    cancel: CancelToken,
    cmd_sub: Option<&'a mut dyn CommandSubHandler>,
    fs: &'a dyn GlobFs,
}

impl<'a> WordEvaluator<'a> {
    pub fn new(env: &'a mut Env, opts: &'a ExpandOptions, fs: &'a dyn GlobFs) -> Self {
        Self {
            env,
            opts,
            cancel: CancelToken::default(),
            cmd_sub: None,
            fs,
        }
    }

    pub fn with_command_sub(mut self, handler: &'a mut dyn CommandSubHandler) -> Self {
        self.cmd_sub = Some(handler);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub(crate) fn check_cancel(&self) -> Result<(), ExpandError> {
        if self.cancel.is_cancelled() {
            Err(ExpandError::Cancelled)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Public entry points
    // ------------------------------------------------------------------

    /// Expand a command's words into argv fields.
    pub fn eval_words(&mut self, words: &[Word]) -> Result<Vec<String>, ExpandError> {
        let mut argv = Vec::new();
        for w in words {
            argv.extend(self.eval_word_to_fields(w)?);
        }
        Ok(argv)
    }

    /// Expand one word into 0..N fields.
    pub fn eval_word_to_fields(&mut self, word: &Word) -> Result<Vec<String>, ExpandError> {
        self.check_cancel()?;
        let segs = self.eval_parts(word.parts(), QuoteCtx::field())?;
        let ifs = self.env.ifs();
        let fields = assemble_fields(segs, &ifs);
        trace!(?fields, "fields before pathname expansion");
        self.check_cancel()?;
        let mut out = Vec::new();
        for field in fields {
            if self.opts.noglob {
                out.push(pattern::unescape(&field));
                continue;
            }
            match glob::expand_glob(&field, self.fs, self.opts.strict_glob)? {
                Some(matches) if !matches.is_empty() => out.extend(matches),
                Some(_) if self.opts.nullglob => {}
                _ => out.push(pattern::unescape(&field)),
            }
        }
        Ok(out)
    }

    /// Expand without splitting or globbing: redirect targets, `case`
    /// subjects, assignment values.
    pub fn eval_word_to_string(&mut self, word: &Word) -> Result<String, ExpandError> {
        let segs = self.eval_parts(word.parts(), QuoteCtx::field())?;
        Ok(pattern::unescape(&concat_segs(&segs)))
    }

    /// Expand without splitting, keeping backslash protection, the form
    /// pattern contexts consume.
    pub fn eval_word_to_pattern(&mut self, word: &Word) -> Result<String, ExpandError> {
        let segs = self.eval_parts(word.parts(), QuoteCtx::pattern())?;
        Ok(concat_segs(&segs))
    }

    /// An assignment's right-hand side: array literals build arrays,
    /// everything else is a scalar.
    pub fn eval_rhs(&mut self, word: &Word) -> Result<VarValue, ExpandError> {
        if let [WordPart::ArrayLiteral { words }] = word.parts() {
            let mut items = Vec::new();
            for w in words {
                items.extend(self.eval_word_to_fields(w)?);
            }
            return Ok(VarValue::Indexed(items));
        }
        Ok(VarValue::Str(self.eval_word_to_string(word)?))
    }

    // ------------------------------------------------------------------
    // Part evaluation
    // ------------------------------------------------------------------

    pub(crate) fn eval_parts(
        &mut self,
        parts: &[WordPart],
        ctx: QuoteCtx,
    ) -> Result<Vec<Seg>, ExpandError> {
        let mut out = Vec::new();
        for part in parts {
            self.eval_part(part, ctx, &mut out)?;
        }
        Ok(out)
    }

    fn eval_part(
        &mut self,
        part: &WordPart,
        ctx: QuoteCtx,
        out: &mut Vec<Seg>,
    ) -> Result<(), ExpandError> {
        match part {
            WordPart::Literal(t) => {
                if ctx.in_dq {
                    let val = if ctx.for_pattern {
                        pattern::glob_escape_pattern(&t.value)
                    } else {
                        pattern::glob_escape(&t.value)
                    };
                    out.push(Seg::Str {
                        val,
                        splittable: false,
                        quoted: true,
                    });
                } else {
                    out.push(Seg::Str {
                        val: t.value.clone(),
                        splittable: ctx.split_literals,
                        quoted: false,
                    });
                }
            }
            WordPart::EscapedLiteral(t) => {
                out.push(Seg::Str {
                    val: t.value.clone(),
                    splittable: false,
                    quoted: true,
                });
            }
            WordPart::SingleQuoted { toks, ansi_c } => {
                let mut text: String = toks.iter().map(|t| t.value.as_str()).collect();
                if *ansi_c {
                    text = ansi_c_decode(&text);
                }
                out.push(Seg::Str {
                    val: pattern::glob_escape(&text),
                    splittable: false,
                    quoted: true,
                });
            }
            WordPart::DoubleQuoted { parts } => {
                let inner = self.eval_parts(
                    parts,
                    QuoteCtx {
                        in_dq: true,
                        split_literals: false,
                        for_pattern: ctx.for_pattern,
                    },
                )?;
                if inner.is_empty() {
                    // "" anchors an empty field.
                    out.push(Seg::Str {
                        val: String::new(),
                        splittable: false,
                        quoted: true,
                    });
                }
                out.extend(inner);
            }
            WordPart::SimpleVarSub(t) => {
                let name = t.value.strip_prefix('$').unwrap_or(&t.value).to_string();
                self.eval_simple_var(&name, ctx, out)?;
            }
            WordPart::BracedVarSub(sub) => {
                param_ops::eval_braced(self, sub, ctx, out)?;
            }
            WordPart::TildeSub { prefix } => {
                let val = tilde::expand_tilde(prefix.as_deref(), self.env, &self.opts.user_homes);
                out.push(Seg::Str {
                    val: pattern::glob_escape(&val),
                    splittable: false,
                    quoted: true,
                });
            }
            WordPart::CommandSub { command } => {
                let val = self.run_command_sub(command)?;
                out.push(self.value_seg(val, ctx));
            }
            WordPart::ArithSub { expr } => {
                let n = arith_eval::eval_arith(self, expr)?;
                out.push(self.value_seg(n.to_string(), ctx));
            }
            WordPart::ArrayLiteral { .. } => return Err(ExpandError::ArrayLiteralContext),
        }
        Ok(())
    }

    fn eval_simple_var(
        &mut self,
        name: &str,
        ctx: QuoteCtx,
        out: &mut Vec<Seg>,
    ) -> Result<(), ExpandError> {
        match name {
            "@" | "*" => {
                let params: Vec<String> = self.env.positional().to_vec();
                self.push_params(&params, name == "*", ctx.in_dq, out);
            }
            "#" => out.push(self.value_seg(self.env.positional().len().to_string(), ctx)),
            "?" => out.push(self.value_seg(self.env.last_status().to_string(), ctx)),
            "$" => out.push(self.value_seg(self.env.shell_pid().to_string(), ctx)),
            "!" => {
                let val = self
                    .env
                    .last_bg_pid()
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                out.push(self.value_seg(val, ctx));
            }
            "-" => out.push(self.value_seg(self.env.flags().to_string(), ctx)),
            _ if name.chars().all(|c| c.is_ascii_digit()) => {
                let n: usize = name.parse().unwrap_or(0);
                let val = self.env.positional_nth(n).unwrap_or("").to_string();
                out.push(self.value_seg(val, ctx));
            }
            _ => match self.env.get_str(name) {
                Some(val) => out.push(self.value_seg(val, ctx)),
                None => {
                    if self.opts.strict_unset {
                        return Err(ExpandError::UnboundVariable {
                            name: name.to_string(),
                        });
                    }
                    out.push(self.value_seg(String::new(), ctx));
                }
            },
        }
        Ok(())
    }

    /// Positional parameters or array elements as segments. `"$@"` keeps
    /// one field per element; `"$*"` joins on the first IFS character;
    /// unquoted forms split per element.
    pub(crate) fn push_params(
        &self,
        items: &[String],
        star: bool,
        in_dq: bool,
        out: &mut Vec<Seg>,
    ) {
        if in_dq && star {
            let sep = split::join_separator(&self.env.ifs());
            out.push(Seg::Str {
                val: pattern::glob_escape(&items.join(&sep)),
                splittable: false,
                quoted: true,
            });
            return;
        }
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push(Seg::Sep);
            }
            if in_dq {
                out.push(Seg::Str {
                    val: pattern::glob_escape(item),
                    splittable: false,
                    quoted: true,
                });
            } else {
                out.push(Seg::Str {
                    val: pattern::escape_backslashes(item),
                    splittable: true,
                    quoted: false,
                });
            }
        }
    }

    /// A substitution result as one segment: quoted context protects it
    /// entirely, unquoted context leaves glob characters active but
    /// protects literal backslashes as data. In pattern context the
    /// result is taken verbatim, where a backslash keeps escaping.
    pub(crate) fn value_seg(&self, val: String, ctx: QuoteCtx) -> Seg {
        if ctx.in_dq {
            let val = if ctx.for_pattern {
                pattern::glob_escape_pattern(&val)
            } else {
                pattern::glob_escape(&val)
            };
            Seg::Str {
                val,
                splittable: false,
                quoted: true,
            }
        } else {
            Seg::Str {
                val: if ctx.for_pattern {
                    val
                } else {
                    pattern::escape_backslashes(&val)
                },
                splittable: !ctx.for_pattern,
                quoted: false,
            }
        }
    }

    pub(crate) fn run_command_sub(&mut self, command: &Command) -> Result<String, ExpandError> {
        self.check_cancel()?;
        match self.cmd_sub.as_deref_mut() {
            Some(handler) => {
                let out = handler.run(command)?;
                Ok(out.trim_end_matches('\n').to_string())
            }
            None => Err(ExpandError::CommandSubUnsupported),
        }
    }

    /// Plain-string view of a word (no splitting, quotes removed).
    pub(crate) fn plain_text(&mut self, word: &Word) -> Result<String, ExpandError> {
        self.eval_word_to_string(word)
    }

    /// Pattern view of a word (no splitting, protection kept).
    pub(crate) fn pattern_text(&mut self, word: &Word) -> Result<String, ExpandError> {
        self.eval_word_to_pattern(word)
    }
}

fn concat_segs(segs: &[Seg]) -> String {
    let mut out = String::new();
    for seg in segs {
        match seg {
            Seg::Str { val, .. } => out.push_str(val),
            Seg::Sep => out.push(' '),
        }
    }
    out
}

/// Field assembly: walk segments, splitting the splittable ones on IFS
/// and gluing boundary fields onto their neighbors.
pub(crate) fn assemble_fields(segs: Vec<Seg>, ifs: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut pending_break = false;

    for seg in segs {
        match seg {
            Seg::Sep => {
                if let Some(f) = current.take() {
                    fields.push(f);
                }
                pending_break = false;
            }
            Seg::Str {
                val,
                splittable: false,
                quoted,
            } => {
                if val.is_empty() && !quoted {
                    continue;
                }
                if pending_break {
                    if let Some(f) = current.take() {
                        fields.push(f);
                    }
                    pending_break = false;
                }
                let mut cur = current.take().unwrap_or_default();
                cur.push_str(&val);
                current = Some(cur);
            }
            Seg::Str {
                val,
                splittable: true,
                ..
            } => {
                let split = split_fields(&val, ifs);
                if split.fields.is_empty() {
                    if split.had_leading_delim || split.had_trailing_delim {
                        pending_break = true;
                    }
                    continue;
                }
                if split.had_leading_delim || pending_break {
                    if let Some(f) = current.take() {
                        fields.push(f);
                    }
                    pending_break = false;
                }
                let n = split.fields.len();
                let mut parts = split.fields.into_iter();
                let first = parts.next().expect("checked non-empty");
                let mut cur = current.take().unwrap_or_default();
                cur.push_str(&first);
                if n == 1 {
                    current = Some(cur);
                } else {
                    fields.push(cur);
                    for (i, p) in parts.enumerate() {
                        if i + 2 == n {
                            current = Some(p);
                        } else {
                            fields.push(p);
                        }
                    }
                }
                if split.had_trailing_delim {
                    pending_break = true;
                }
            }
        }
    }
    if let Some(f) = current {
        fields.push(f);
    }
    fields
}

/// `$'...'` escape decoding.
fn ansi_c_decode(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let c = chars[i + 1];
        match c {
            'n' => {
                out.push('\n');
                i += 2;
            }
            't' => {
                out.push('\t');
                i += 2;
            }
            'r' => {
                out.push('\r');
                i += 2;
            }
            'a' => {
                out.push('\x07');
                i += 2;
            }
            'b' => {
                out.push('\x08');
                i += 2;
            }
            'e' | 'E' => {
                out.push('\x1b');
                i += 2;
            }
            'f' => {
                out.push('\x0c');
                i += 2;
            }
            'v' => {
                out.push('\x0b');
                i += 2;
            }
            '\\' | '\'' | '"' => {
                out.push(c);
                i += 2;
            }
            'x' => {
                let hex: String = chars[i + 2..].iter().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(code) if !hex.is_empty() => {
                        out.push(code as char);
                        i += 2 + hex.len();
                    }
                    _ => {
                        out.push_str("\\x");
                        i += 2;
                    }
                }
            }
            '0'..='7' => {
                let mut octal = String::new();
                let mut j = i + 1;
                while j < chars.len() && octal.len() < 3 && ('0'..='7').contains(&chars[j]) {
                    octal.push(chars[j]);
                    j += 1;
                }
                if let Ok(code) = u8::from_str_radix(&octal, 8) {
                    out.push(code as char);
                }
                i = j;
            }
            _ => {
                out.push('\\');
                out.push(c);
                i += 2;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(val: &str, splittable: bool, quoted: bool) -> Seg {
        Seg::Str {
            val: val.into(),
            splittable,
            quoted,
        }
    }

    #[test]
    fn test_assemble_no_splittable_joins() {
        let fields = assemble_fields(vec![seg("hello", false, false), seg(" world", false, true)], " \t\n");
        assert_eq!(fields, vec!["hello world"]);
    }

    #[test]
    fn test_assemble_glue_rule() {
        // A$var with var="a b c": first field glues, last stands ready.
        let fields = assemble_fields(
            vec![seg("A", false, false), seg("a b c", true, false)],
            " \t\n",
        );
        assert_eq!(fields, vec!["Aa", "b", "c"]);
    }

    #[test]
    fn test_assemble_quoted_joins_last_field() {
        // $a"$b" with a="1 2" b="3 4" -> ["1", "23 4"]
        let fields = assemble_fields(
            vec![seg("1 2", true, false), seg("3 4", false, true)],
            " \t\n",
        );
        assert_eq!(fields, vec!["1", "23 4"]);
    }

    #[test]
    fn test_assemble_empty_unquoted_disappears() {
        let fields = assemble_fields(vec![seg("", true, false)], " \t\n");
        assert!(fields.is_empty());
    }

    #[test]
    fn test_assemble_quoted_empty_is_a_field() {
        let fields = assemble_fields(vec![seg("", false, true)], " \t\n");
        assert_eq!(fields, vec![""]);
    }

    #[test]
    fn test_assemble_sep_is_hard_boundary() {
        let fields = assemble_fields(
            vec![
                seg("x", false, false),
                seg("", true, false),
                Seg::Sep,
                seg("", true, false),
                seg("y", false, false),
            ],
            " \t\n",
        );
        assert_eq!(fields, vec!["x", "y"]);
    }

    #[test]
    fn test_assemble_trailing_delim_breaks_next() {
        // "a " then literal "b" -> two fields.
        let fields = assemble_fields(
            vec![seg("a ", true, false), seg("b", false, false)],
            " \t\n",
        );
        assert_eq!(fields, vec!["a", "b"]);
    }

    #[test]
    fn test_ansi_c_decode() {
        assert_eq!(ansi_c_decode("a\\nb"), "a\nb");
        assert_eq!(ansi_c_decode("\\x41\\t"), "A\t");
        assert_eq!(ansi_c_decode("\\101"), "A");
        assert_eq!(ansi_c_decode("\\q"), "\\q");
    }
}

//! Pretty-Printer
//!
//! Dual to the parser. Verbatim mode re-emits the arena lines, which is
//! the original input byte-for-byte when the tree has not been
//! transformed. Canonical mode walks the tree and prints a normalized
//! form whose token boundaries preserve every quote and whitespace
//! distinction the AST records; re-parsing the canonical form yields a
//! structurally equal tree.

use crate::arena::Arena;
use crate::ast::types::*;
use crate::ids::Id;

/// The original source, reassembled from the arena.
pub fn verbatim(arena: &Arena) -> String {
    arena.source()
}

/// Canonical form of a parsed program.
pub fn canonical(cmd: &Command) -> String {
    let mut p = Printer::new();
    p.command_list(cmd, true);
    p.finish()
}

struct Printer {
    out: String,
    /// Here-doc bodies waiting for the next emitted newline:
    /// (body text, delimiter).
    pending_heredocs: Vec<(String, String)>,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            pending_heredocs: Vec::new(),
        }
    }

    fn finish(mut self) -> String {
        if !self.pending_heredocs.is_empty() {
            self.nl();
        } else if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Emit a statement newline, flushing any pending here-doc bodies.
    fn nl(&mut self) {
        self.out.push('\n');
        for (body, delim) in std::mem::take(&mut self.pending_heredocs) {
            self.out.push_str(&body);
            if !body.is_empty() && !body.ends_with('\n') {
                self.out.push('\n');
            }
            self.out.push_str(&delim);
            self.out.push('\n');
        }
    }

    /// Print the children of a list-like command. Each child is followed
    /// by its separator: a `Sentence` carries its own `;`/`&`, everything
    /// else gets a newline. With `terminated` false the final separator
    /// is omitted (inline contexts like `$( ... )`).
    fn command_list(&mut self, cmd: &Command, terminated: bool) {
        let children: Vec<&Command> = match cmd {
            Command::List { children } => children.iter().collect(),
            other => vec![other],
        };
        let n = children.len();
        for (i, child) in children.iter().enumerate() {
            self.command(child);
            let is_sentence = matches!(child, Command::Sentence { .. });
            let last = i + 1 == n;
            if is_sentence {
                if !last || terminated {
                    self.push(" ");
                }
            } else if !last || terminated {
                self.nl();
            }
        }
        if n == 0 && terminated && !self.pending_heredocs.is_empty() {
            self.nl();
        }
    }

    fn command(&mut self, cmd: &Command) {
        match cmd {
            Command::NoOp => {}
            Command::Simple {
                words,
                redirs,
                more_env,
            } => {
                let mut first = true;
                for pair in more_env {
                    if !first {
                        self.push(" ");
                    }
                    first = false;
                    self.assign_pair(pair);
                }
                for w in words {
                    if !first {
                        self.push(" ");
                    }
                    first = false;
                    self.word(w);
                }
                for r in redirs {
                    if !first {
                        self.push(" ");
                    }
                    first = false;
                    self.redir(r);
                }
            }
            Command::Sentence { child, terminator } => {
                self.command(child);
                self.push(&terminator.value);
            }
            Command::Assignment { keyword, pairs } => {
                if let Some(kw) = keyword {
                    self.push(&kw.value);
                    self.push(" ");
                }
                for (i, pair) in pairs.iter().enumerate() {
                    if i > 0 {
                        self.push(" ");
                    }
                    self.assign_pair(pair);
                }
            }
            Command::Pipeline {
                children,
                negated,
                stderr_indices,
            } => {
                if *negated {
                    self.push("! ");
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        if stderr_indices.contains(&(i - 1)) {
                            self.push(" |& ");
                        } else {
                            self.push(" | ");
                        }
                    }
                    self.command(child);
                }
            }
            Command::AndOr { children, ops } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        match ops[i - 1] {
                            Id::OpAndIf => self.push(" && "),
                            _ => self.push(" || "),
                        }
                    }
                    self.command(child);
                }
            }
            Command::List { .. } => self.command_list(cmd, false),
            Command::DoGroup { body } => {
                self.push("do");
                self.nl();
                self.command_list(body, true);
                self.push("done");
            }
            Command::BraceGroup { body, redirs } => {
                self.push("{ ");
                self.command_list(body, true);
                self.push("}");
                self.redirs_suffix(redirs);
            }
            Command::Subshell { body, redirs } => {
                self.push("(");
                self.command_list(body, false);
                self.push(")");
                self.redirs_suffix(redirs);
            }
            Command::DParen { expr, redirs } => {
                self.push("((");
                self.push(&arith_to_text(expr));
                self.push("))");
                self.redirs_suffix(redirs);
            }
            Command::DBracket { expr, redirs } => {
                self.push("[[ ");
                self.bool_expr(expr);
                self.push(" ]]");
                self.redirs_suffix(redirs);
            }
            Command::ForEach {
                iter_name,
                iter_words,
                do_arg_iter,
                body,
                redirs,
            } => {
                self.push("for ");
                self.push(&iter_name.value);
                if !*do_arg_iter {
                    self.push(" in");
                    for w in iter_words {
                        self.push(" ");
                        self.word(w);
                    }
                }
                self.push("; ");
                self.command(body);
                self.redirs_suffix(redirs);
            }
            Command::ForExpr {
                init,
                cond,
                update,
                body,
                redirs,
            } => {
                self.push("for ((");
                if let Some(e) = init {
                    self.push(&arith_to_text(e));
                }
                self.push("; ");
                if let Some(e) = cond {
                    self.push(&arith_to_text(e));
                }
                self.push("; ");
                if let Some(e) = update {
                    self.push(&arith_to_text(e));
                }
                self.push(")); ");
                match body {
                    Some(b) => self.command(b),
                    None => self.push("do\ndone"),
                }
                self.redirs_suffix(redirs);
            }
            Command::While { cond, body, redirs } => {
                self.push("while ");
                self.command_list(cond, true);
                self.command(body);
                self.redirs_suffix(redirs);
            }
            Command::Until { cond, body, redirs } => {
                self.push("until ");
                self.command_list(cond, true);
                self.command(body);
                self.redirs_suffix(redirs);
            }
            Command::If {
                arms,
                else_body,
                redirs,
            } => {
                for (i, arm) in arms.iter().enumerate() {
                    self.push(if i == 0 { "if " } else { "elif " });
                    self.command_list(&arm.cond, true);
                    self.push("then");
                    self.nl();
                    self.command_list(&arm.body, true);
                }
                if let Some(else_body) = else_body {
                    self.push("else");
                    self.nl();
                    self.command_list(else_body, true);
                }
                self.push("fi");
                self.redirs_suffix(redirs);
            }
            Command::Case {
                to_match,
                arms,
                redirs,
            } => {
                self.push("case ");
                self.word(to_match);
                self.push(" in");
                self.nl();
                for arm in arms {
                    for (i, pat) in arm.patterns.iter().enumerate() {
                        if i > 0 {
                            self.push("|");
                        }
                        self.word(pat);
                    }
                    self.push(") ");
                    if let Some(body) = &arm.body {
                        self.command_list(body, false);
                        self.push(" ");
                    }
                    self.push(match arm.terminator {
                        Id::OpSemiAmp => ";&",
                        Id::OpDSemiAmp => ";;&",
                        _ => ";;",
                    });
                    self.nl();
                }
                self.push("esac");
                self.redirs_suffix(redirs);
            }
            Command::FuncDef { name, body, redirs } => {
                self.push(&name.value);
                self.push("() ");
                self.command(body);
                self.redirs_suffix(redirs);
            }
        }
    }

    fn redirs_suffix(&mut self, redirs: &[Redir]) {
        for r in redirs {
            self.push(" ");
            self.redir(r);
        }
    }

    fn assign_pair(&mut self, pair: &AssignPair) {
        self.push(&pair.name.value);
        self.push(if pair.append { "+=" } else { "=" });
        if let Some(w) = &pair.value {
            self.word(w);
        }
    }

    fn redir(&mut self, redir: &Redir) {
        match redir {
            Redir::File { op, fd, target } => {
                if let Some(fd) = fd {
                    self.push(&fd.to_string());
                }
                self.push(op.as_str());
                self.word(target);
            }
            Redir::HereDoc(hd) => {
                if let Some(fd) = hd.fd {
                    self.push(&fd.to_string());
                }
                self.push(hd.op.as_str());
                if hd.do_expansion {
                    self.push(&hd.here_end);
                } else {
                    self.push(&format!("'{}'", hd.here_end));
                }
                let body = hd
                    .body
                    .as_ref()
                    .map(|w| word_to_text(w))
                    .unwrap_or_default();
                self.pending_heredocs.push((body, hd.here_end.clone()));
            }
        }
    }

    fn word(&mut self, w: &Word) {
        let text = word_to_text(w);
        self.push(&text);
    }

    fn bool_expr(&mut self, e: &BoolExpr) {
        self.push(&bool_to_text(e));
    }
}

/// A word's canonical source text.
pub fn word_to_text(w: &Word) -> String {
    match w {
        Word::Token(t) => t.value.clone(),
        Word::Compound(parts) => parts.iter().map(part_to_text).collect(),
    }
}

fn part_to_text(p: &WordPart) -> String {
    match p {
        WordPart::Literal(t) | WordPart::EscapedLiteral(t) => t.value.clone(),
        WordPart::SingleQuoted { toks, ansi_c } => {
            let inner: String = toks.iter().map(|t| t.value.as_str()).collect();
            if *ansi_c {
                format!("$'{}'", inner)
            } else {
                format!("'{}'", inner)
            }
        }
        WordPart::DoubleQuoted { parts } => {
            let inner: String = parts.iter().map(part_to_text).collect();
            format!("\"{}\"", inner)
        }
        WordPart::SimpleVarSub(t) => t.value.clone(),
        WordPart::BracedVarSub(sub) => braced_to_text(sub),
        WordPart::TildeSub { prefix } => match prefix {
            Some(user) => format!("~{}", user),
            None => "~".to_string(),
        },
        WordPart::CommandSub { command } => {
            let mut p = Printer::new();
            p.command_list(command, false);
            if !p.pending_heredocs.is_empty() {
                p.nl();
            }
            format!("$({})", p.out)
        }
        WordPart::ArithSub { expr } => format!("$(({}))", arith_to_text(expr)),
        WordPart::ArrayLiteral { words } => {
            let inner: Vec<String> = words.iter().map(word_to_text).collect();
            format!("({})", inner.join(" "))
        }
    }
}

fn braced_to_text(sub: &BracedVarSub) -> String {
    let mut out = String::from("${");
    match sub.prefix_op {
        Some(VsPrefixOp::Length) => out.push('#'),
        Some(VsPrefixOp::Indirect) => out.push('!'),
        None => {}
    }
    out.push_str(&sub.name.value);
    match &sub.bracket_op {
        Some(BracketOp::WholeAt) => out.push_str("[@]"),
        Some(BracketOp::WholeStar) => out.push_str("[*]"),
        Some(BracketOp::Index(e)) => {
            out.push('[');
            out.push_str(&arith_to_text(e));
            out.push(']');
        }
        None => {}
    }
    if let Some(op) = &sub.suffix_op {
        match op.as_ref() {
            VsSuffixOp::UseDefault { test_empty, arg } => {
                out.push_str(if *test_empty { ":-" } else { "-" });
                push_opt_word(&mut out, arg);
            }
            VsSuffixOp::AssignDefault { test_empty, arg } => {
                out.push_str(if *test_empty { ":=" } else { "=" });
                push_opt_word(&mut out, arg);
            }
            VsSuffixOp::ErrorIfUnset { test_empty, arg } => {
                out.push_str(if *test_empty { ":?" } else { "?" });
                push_opt_word(&mut out, arg);
            }
            VsSuffixOp::UseAlternative { test_empty, arg } => {
                out.push_str(if *test_empty { ":+" } else { "+" });
                push_opt_word(&mut out, arg);
            }
            VsSuffixOp::RemovePrefix { longest, pattern } => {
                out.push_str(if *longest { "##" } else { "#" });
                push_opt_word(&mut out, pattern);
            }
            VsSuffixOp::RemoveSuffix { longest, pattern } => {
                out.push_str(if *longest { "%%" } else { "%" });
                push_opt_word(&mut out, pattern);
            }
            VsSuffixOp::Replace {
                all,
                pattern,
                replacement,
            } => {
                out.push_str(if *all { "//" } else { "/" });
                push_opt_word(&mut out, pattern);
                if let Some(r) = replacement {
                    out.push('/');
                    out.push_str(&word_to_text(r));
                }
            }
            VsSuffixOp::Slice { offset, length } => {
                out.push(':');
                out.push_str(&arith_to_text(offset));
                if let Some(len) = length {
                    out.push(':');
                    out.push_str(&arith_to_text(len));
                }
            }
        }
    }
    out.push('}');
    out
}

fn push_opt_word(out: &mut String, w: &Option<Word>) {
    if let Some(w) = w {
        out.push_str(&word_to_text(w));
    }
}

/// Canonical arithmetic text. Compound operands are parenthesized so the
/// re-parse reproduces the same shape regardless of precedence.
pub fn arith_to_text(e: &ArithExpr) -> String {
    match e {
        ArithExpr::VarRef(t) => t.value.clone(),
        ArithExpr::Word(w) => word_to_text(w),
        ArithExpr::Unary { op, child, postfix } => {
            if *postfix {
                format!("{}{}", arith_atom(child), op.as_str())
            } else {
                format!("{}{}", op.as_str(), arith_atom(child))
            }
        }
        ArithExpr::Binary { op, left, right } => format!(
            "{} {} {}",
            arith_atom(left),
            op.as_str(),
            arith_atom(right)
        ),
        ArithExpr::Assign { op, name, rhs } => {
            format!("{} {} {}", name.value, op.as_str(), arith_atom(rhs))
        }
        ArithExpr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => format!(
            "{} ? {} : {}",
            arith_atom(cond),
            arith_atom(then_expr),
            arith_atom(else_expr)
        ),
        ArithExpr::FuncCall { name, args } => {
            let args: Vec<String> = args.iter().map(arith_to_text).collect();
            format!("{}({})", name.value, args.join(", "))
        }
    }
}

fn arith_atom(e: &ArithExpr) -> String {
    match e {
        ArithExpr::VarRef(_) | ArithExpr::Word(_) | ArithExpr::FuncCall { .. } => arith_to_text(e),
        _ => format!("({})", arith_to_text(e)),
    }
}

pub fn bool_to_text(e: &BoolExpr) -> String {
    match e {
        BoolExpr::WordTest(w) => word_to_text(w),
        BoolExpr::Binary { op, left, right } => format!(
            "{} {} {}",
            word_to_text(left),
            op.as_str(),
            word_to_text(right)
        ),
        BoolExpr::Unary { op, operand } => format!("{} {}", op.value, word_to_text(operand)),
        BoolExpr::Not(inner) => format!("! {}", bool_atom(inner)),
        BoolExpr::And(l, r) => format!("{} && {}", bool_atom(l), bool_atom(r)),
        BoolExpr::Or(l, r) => format!("{} || {}", bool_atom(l), bool_atom(r)),
    }
}

fn bool_atom(e: &BoolExpr) -> String {
    match e {
        BoolExpr::And(..) | BoolExpr::Or(..) => format!("( {} )", bool_to_text(e)),
        _ => bool_to_text(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Token;

    fn lit_word(s: &str) -> Word {
        Word::Compound(vec![WordPart::Literal(Token::new(Id::LitChars, s, None))])
    }

    #[test]
    fn test_simple_command_text() {
        let cmd = Command::Simple {
            words: vec![lit_word("echo"), lit_word("hi")],
            redirs: vec![],
            more_env: vec![],
        };
        assert_eq!(canonical(&cmd), "echo hi\n");
    }

    #[test]
    fn test_pipeline_text() {
        let cmd = Command::Pipeline {
            children: vec![
                Command::Simple {
                    words: vec![lit_word("ls")],
                    redirs: vec![],
                    more_env: vec![],
                },
                Command::Simple {
                    words: vec![lit_word("wc")],
                    redirs: vec![],
                    more_env: vec![],
                },
            ],
            negated: true,
            stderr_indices: vec![],
        };
        assert_eq!(canonical(&cmd), "! ls | wc\n");
    }

    #[test]
    fn test_braced_var_sub_text() {
        let sub = BracedVarSub {
            name: Token::new(Id::VsubName, "x", None),
            prefix_op: None,
            bracket_op: None,
            suffix_op: Some(Box::new(VsSuffixOp::UseDefault {
                test_empty: true,
                arg: Some(lit_word("d")),
            })),
        };
        assert_eq!(braced_to_text(&sub), "${x:-d}");
    }

    #[test]
    fn test_arith_parenthesization() {
        let e = ArithExpr::Binary {
            op: Id::ArithPlus,
            left: Box::new(ArithExpr::Word(lit_word("1"))),
            right: Box::new(ArithExpr::Binary {
                op: Id::ArithStar,
                left: Box::new(ArithExpr::Word(lit_word("2"))),
                right: Box::new(ArithExpr::Word(lit_word("3"))),
            }),
        };
        assert_eq!(arith_to_text(&e), "1 + (2 * 3)");
    }

    #[test]
    fn test_heredoc_flush_on_newline() {
        let cmd = Command::Simple {
            words: vec![lit_word("cat")],
            redirs: vec![Redir::HereDoc(HereDoc {
                op: Id::RedirDLess,
                fd: None,
                here_end: "EOF".into(),
                do_expansion: true,
                body: Some(lit_word("hello\n")),
                was_filled: true,
                handle: 0,
            })],
            more_env: vec![],
        };
        assert_eq!(canonical(&cmd), "cat <<EOF\nhello\nEOF\n");
    }
}

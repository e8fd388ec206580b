//! End-to-end expansion scenarios: parse a command line, expand its
//! argument words against a prepared environment, and check the argv.

use marsh::ast::types::Command;
use marsh::expand::{Env, ExpandOptions, MemFs, VarValue, WordEvaluator};
use marsh::parse;

/// Parse `argv ...` and expand everything after the command name.
fn argv_with(env: &mut Env, opts: &ExpandOptions, src: &str) -> Vec<String> {
    let program = parse(src).unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let cmd = match cmd {
        Command::Sentence { child, .. } => *child,
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("expected a simple command, got {:?}", other),
    };
    let fs = MemFs::new(&[]);
    let mut ev = WordEvaluator::new(env, opts, &fs);
    ev.eval_words(&words[1..]).unwrap()
}

fn argv(env: &mut Env, src: &str) -> Vec<String> {
    argv_with(env, &ExpandOptions::default(), src)
}

#[test]
fn default_applies_for_empty_and_unset_with_colon() {
    let mut env = Env::new();
    env.set_str("empty", "");
    assert_eq!(
        argv(&mut env, "argv ${empty:-a} ${Unset:-b}\n"),
        vec!["a", "b"]
    );
}

#[test]
fn default_without_colon_keeps_set_empty() {
    let mut env = Env::new();
    env.set_str("empty", "");
    // empty is set, so ${empty-a} expands to "" and the field is elided.
    assert_eq!(argv(&mut env, "argv ${empty-a} ${Unset-b}\n"), vec!["b"]);
}

#[test]
fn single_quotes_are_literal_inside_quoted_default() {
    let mut env = Env::new();
    assert_eq!(argv(&mut env, "argv \"${Unset:-'b'}\"\n"), vec!["'b'"]);
}

#[test]
fn unquoted_default_splits_quoted_default_does_not() {
    let mut env = Env::new();
    assert_eq!(
        argv(&mut env, "argv ${Unset:-a b c}\n"),
        vec!["a", "b", "c"]
    );
    assert_eq!(argv(&mut env, "argv \"${Unset:-a b c}\"\n"), vec!["a b c"]);
}

#[test]
fn default_fields_glue_to_neighbors() {
    let mut env = Env::new();
    env.set_str("var", "a b c");
    assert_eq!(
        argv(&mut env, "argv ${Unset:-A$var \" $var\"D E F}\n"),
        vec!["Aa", "b", "c", " a b cD", "E", "F"]
    );
}

#[test]
fn suffix_removal_with_escaped_quote() {
    let mut env = Env::new();
    env.set_str("foo", "'a b c d'");
    assert_eq!(argv(&mut env, "argv \"${foo%d\\'}\"\n"), vec!["'a b c "]);
}

#[test]
fn case_rescan_terminators_are_recorded() {
    // case a in a) echo A;;& *) echo star;;& *) echo star2;; esac
    let program = parse("case a in a) echo A;;& *) echo star;;& *) echo star2;; esac\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    match cmd {
        Command::Case { arms, .. } => {
            assert_eq!(arms.len(), 3);
            assert_eq!(arms[0].terminator, marsh::ids::Id::OpDSemiAmp);
            assert_eq!(arms[1].terminator, marsh::ids::Id::OpDSemiAmp);
            assert_eq!(arms[2].terminator, marsh::ids::Id::OpDSemi);
        }
        other => panic!("expected case, got {:?}", other),
    }
}

#[test]
fn case_fallthrough_terminators_are_recorded() {
    let program = parse("case a in a) echo A;& XX) echo two;& YY) echo three;; esac\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    match cmd {
        Command::Case { arms, .. } => {
            assert_eq!(arms[0].terminator, marsh::ids::Id::OpSemiAmp);
            assert_eq!(arms[1].terminator, marsh::ids::Id::OpSemiAmp);
            assert_eq!(arms[2].terminator, marsh::ids::Id::OpDSemi);
        }
        other => panic!("expected case, got {:?}", other),
    }
}

#[test]
fn bad_for_loop_name_fails_parse_with_status_2() {
    let err = parse("for - in a b c; do echo hi; done\n").unwrap_err();
    assert_eq!(err.exit_status(), 2);
}

#[test]
fn until_loop_parses_with_breakable_body() {
    let program = parse("until false; do echo hi; break; done\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    assert!(matches!(cmd, Command::Until { .. }));
}

#[test]
fn quoted_at_keeps_one_field_per_parameter() {
    let mut env = Env::new();
    env.set_positional(vec!["a b".into(), "".into(), "c".into()]);
    assert_eq!(argv(&mut env, "argv \"$@\"\n"), vec!["a b", "", "c"]);
}

#[test]
fn unquoted_at_splits_and_drops_empties() {
    let mut env = Env::new();
    env.set_positional(vec!["a b".into(), "".into(), "c".into()]);
    assert_eq!(argv(&mut env, "argv $@\n"), vec!["a", "b", "c"]);
    assert_eq!(argv(&mut env, "argv $*\n"), vec!["a", "b", "c"]);
}

#[test]
fn quoted_star_joins_on_first_ifs_char() {
    let mut env = Env::new();
    env.set_positional(vec!["a".into(), "b".into()]);
    env.set_str("IFS", ":,");
    assert_eq!(argv(&mut env, "argv \"$*\"\n"), vec!["a:b"]);
}

#[test]
fn empty_ifs_disables_splitting() {
    let mut env = Env::new();
    env.set_str("IFS", "");
    env.set_str("v", "a b c");
    assert_eq!(argv(&mut env, "argv $v\n"), vec!["a b c"]);
}

#[test]
fn non_whitespace_ifs_makes_empty_fields() {
    let mut env = Env::new();
    env.set_str("IFS", ",");
    env.set_str("v", "a,,b");
    assert_eq!(argv(&mut env, "argv $v\n"), vec!["a", "", "b"]);
}

#[test]
fn assign_default_writes_back() {
    let mut env = Env::new();
    assert_eq!(argv(&mut env, "argv ${x:=seeded}\n"), vec!["seeded"]);
    assert_eq!(env.get_str("x"), Some("seeded".into()));
}

#[test]
fn error_if_unset_reports_message() {
    let mut env = Env::new();
    let program = parse("argv ${x:?custom message}\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("unexpected {:?}", other),
    };
    let opts = ExpandOptions::default();
    let fs = MemFs::new(&[]);
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs);
    let err = ev.eval_words(&words[1..]).unwrap_err();
    assert!(err.to_string().contains("custom message"));
    assert_eq!(err.exit_status(), 1);
}

#[test]
fn alternative_value_respects_colon() {
    let mut env = Env::new();
    env.set_str("empty", "");
    env.set_str("full", "x");
    assert_eq!(argv(&mut env, "argv ${empty:+alt}1\n"), vec!["1"]);
    assert_eq!(argv(&mut env, "argv ${empty+alt}\n"), vec!["alt"]);
    assert_eq!(argv(&mut env, "argv ${full:+alt}\n"), vec!["alt"]);
}

#[test]
fn pattern_replacement_ops() {
    let mut env = Env::new();
    env.set_str("path", "/usr/local/bin");
    assert_eq!(argv(&mut env, "argv ${path#*/}\n"), vec!["usr/local/bin"]);
    assert_eq!(argv(&mut env, "argv ${path##*/}\n"), vec!["bin"]);
    assert_eq!(argv(&mut env, "argv ${path%/*}\n"), vec!["/usr/local"]);
    assert_eq!(argv(&mut env, "argv \"${path//\\//_}\"\n"), vec!["_usr_local_bin"]);
}

#[test]
fn slice_and_length_ops() {
    let mut env = Env::new();
    env.set_str("v", "abcdef");
    assert_eq!(argv(&mut env, "argv ${#v}\n"), vec!["6"]);
    assert_eq!(argv(&mut env, "argv ${v:1:3}\n"), vec!["bcd"]);
    assert_eq!(argv(&mut env, "argv ${v:4}\n"), vec!["ef"]);
}

#[test]
fn indirect_expansion() {
    let mut env = Env::new();
    env.set_str("name", "target");
    env.set_str("target", "hit");
    assert_eq!(argv(&mut env, "argv ${!name}\n"), vec!["hit"]);
}

#[test]
fn array_subscripts() {
    let mut env = Env::new();
    env.set_var(
        "arr",
        VarValue::Indexed(vec!["one".into(), "two three".into()]),
    );
    assert_eq!(argv(&mut env, "argv ${arr[0]}\n"), vec!["one"]);
    assert_eq!(argv(&mut env, "argv \"${arr[1]}\"\n"), vec!["two three"]);
    assert_eq!(
        argv(&mut env, "argv \"${arr[@]}\"\n"),
        vec!["one", "two three"]
    );
    assert_eq!(argv(&mut env, "argv ${#arr[@]}\n"), vec!["2"]);
}

#[test]
fn arith_substitution_in_words() {
    let mut env = Env::new();
    env.set_str("n", "6");
    assert_eq!(argv(&mut env, "argv $((n * 7))x\n"), vec!["42x"]);
}

#[test]
fn tilde_expansion_uses_home() {
    let mut env = Env::new();
    env.set_str("HOME", "/home/me");
    assert_eq!(argv(&mut env, "argv ~/notes\n"), vec!["/home/me/notes"]);
}

#[test]
fn glob_expansion_against_memfs() {
    let mut env = Env::new();
    let fs = MemFs::new(&["src/a.rs", "src/b.rs", "doc.md"]);
    let program = parse("argv src/*.rs missing* \"li*\"\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("unexpected {:?}", other),
    };
    let opts = ExpandOptions::default();
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs);
    let fields = ev.eval_words(&words[1..]).unwrap();
    // Matches expand and sort; a no-match keeps its literal text; quoted
    // glob characters never match.
    assert_eq!(fields, vec!["src/a.rs", "src/b.rs", "missing*", "li*"]);
}

#[test]
fn strict_unset_errors_on_unbound() {
    let mut env = Env::new();
    let opts = ExpandOptions {
        strict_unset: true,
        ..Default::default()
    };
    let program = parse("argv $nope\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("unexpected {:?}", other),
    };
    let fs = MemFs::new(&[]);
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs);
    assert!(ev.eval_words(&words[1..]).is_err());
}

#[test]
fn array_literal_rhs_builds_indexed_value() {
    let mut env = Env::new();
    env.set_str("v", "b c");
    let program = parse("arr=(a $v 'd e')\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let pairs = match cmd {
        Command::Assignment { pairs, .. } => pairs,
        other => panic!("expected assignment, got {:?}", other),
    };
    let fs = MemFs::new(&[]);
    let opts = ExpandOptions::default();
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs);
    let value = ev.eval_rhs(pairs[0].value.as_ref().unwrap()).unwrap();
    assert_eq!(
        value,
        VarValue::Indexed(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d e".to_string()
        ])
    );
}

struct FixedOutput(&'static str);

impl marsh::CommandSubHandler for FixedOutput {
    fn run(&mut self, _command: &Command) -> Result<String, marsh::ExpandError> {
        Ok(self.0.to_string())
    }
}

#[test]
fn command_substitution_trims_and_splits() {
    let mut env = Env::new();
    let program = parse("argv $(list) \"$(list)\"\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("unexpected {:?}", other),
    };
    let fs = MemFs::new(&[]);
    let opts = ExpandOptions::default();
    let mut handler = FixedOutput("a b\n\n");
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs).with_command_sub(&mut handler);
    let fields = ev.eval_words(&words[1..]).unwrap();
    assert_eq!(fields, vec!["a", "b", "a b"]);
}

#[test]
fn command_substitution_without_handler_is_an_error() {
    let mut env = Env::new();
    let program = parse("argv $(ls)\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("unexpected {:?}", other),
    };
    let fs = MemFs::new(&[]);
    let opts = ExpandOptions::default();
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs);
    assert!(matches!(
        ev.eval_words(&words[1..]),
        Err(marsh::ExpandError::CommandSubUnsupported)
    ));
}

#[test]
fn cancelled_expansion_short_circuits() {
    let mut env = Env::new();
    let program = parse("argv $x\n").unwrap();
    let cmd = match program.root {
        Command::List { mut children } => children.remove(0),
        other => other,
    };
    let words = match cmd {
        Command::Simple { words, .. } => words,
        other => panic!("unexpected {:?}", other),
    };
    let fs = MemFs::new(&[]);
    let opts = ExpandOptions::default();
    let token = marsh::CancelToken::new();
    token.cancel();
    let mut ev = WordEvaluator::new(&mut env, &opts, &fs).with_cancel(token);
    assert!(matches!(
        ev.eval_words(&words),
        Err(marsh::ExpandError::Cancelled)
    ));
}

#[test]
fn expansion_is_deterministic() {
    let mut env = Env::new();
    env.set_str("v", "a b");
    let first = argv(&mut env, "argv x$v\"y\"\n");
    let second = argv(&mut env, "argv x$v\"y\"\n");
    assert_eq!(first, second);
    assert_eq!(first, vec!["xa", "by"]);
}

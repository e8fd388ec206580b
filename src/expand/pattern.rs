//! Pattern Matching
//!
//! Shell glob patterns (`*`, `?`, `[...]`, backslash escapes) compiled to
//! anchored regexes. One matcher serves pathname expansion, `case`
//! patterns, and the `%` `%%` `#` `##` `/` `//` parameter operators.
//!
//! Invalid character ranges fail regex compilation and are reported as a
//! non-match; an unclosed `[` is a literal bracket.

use regex_lite::Regex;
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// POSIX character class names.
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("ascii", "\\x00-\\x7F");
        m.insert("blank", " \\t");
        m.insert("cntrl", "\\x00-\\x1F\\x7F");
        m.insert("digit", "0-9");
        m.insert("graph", "!-~");
        m.insert("lower", "a-z");
        m.insert("print", " -~");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r\\x0b\\x0c");
        m.insert("upper", "A-Z");
        m.insert("word", "a-zA-Z0-9_");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

fn is_regex_special(c: char) -> bool {
    "\\^$.|?*+()[]{}".contains(c)
}

/// Convert a shell glob pattern to an (unanchored) regex string.
pub fn pattern_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            // Shell escape: the next character is literal.
            if i + 1 < chars.len() {
                let next = chars[i + 1];
                if is_regex_special(next) {
                    regex.push('\\');
                }
                regex.push(next);
                i += 2;
            } else {
                regex.push_str("\\\\");
                i += 1;
            }
        } else if c == '*' {
            regex.push_str(".*");
            i += 1;
        } else if c == '?' {
            regex.push('.');
            i += 1;
        } else if c == '[' {
            match find_char_class_end(&chars, i) {
                Some(end) => {
                    let content: String = chars[i + 1..end].iter().collect();
                    regex.push_str(&convert_char_class(&content));
                    i = end + 1;
                }
                None => {
                    regex.push_str("\\[");
                    i += 1;
                }
            }
        } else if is_regex_special(c) {
            regex.push('\\');
            regex.push(c);
            i += 1;
        } else {
            regex.push(c);
            i += 1;
        }
    }
    regex
}

/// Find the `]` that closes a character class opened at `start`. A `]`
/// first in the class (after optional negation) is literal.
fn find_char_class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if i < chars.len() && (chars[i] == '^' || chars[i] == '!') {
        i += 1;
    }
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            ']' => return Some(i),
            '[' if chars.get(i + 1) == Some(&':') => {
                // POSIX class [:name:] nests inside the class.
                let rest: String = chars[i + 2..].iter().collect();
                match rest.find(":]") {
                    Some(pos) => i += 2 + pos + 2,
                    None => i += 1,
                }
            }
            '\\' if i + 1 < chars.len() => i += 2,
            _ => i += 1,
        }
    }
    None
}

fn convert_char_class(content: &str) -> String {
    let mut out = String::from("[");
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;
    if i < chars.len() && (chars[i] == '^' || chars[i] == '!') {
        out.push('^');
        i += 1;
    }
    while i < chars.len() {
        let c = chars[i];
        if c == '[' && chars.get(i + 1) == Some(&':') {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(pos) = rest.find(":]") {
                let name = &rest[..pos];
                if let Some(expansion) = POSIX_CLASSES.get(name) {
                    out.push_str(expansion);
                }
                i += 2 + pos + 2;
                continue;
            }
        }
        match c {
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                if is_regex_special(next) || next == '-' {
                    out.push('\\');
                }
                out.push(next);
                i += 2;
            }
            ']' | '^' | '\\' => {
                out.push('\\');
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push(']');
    out
}

/// Does the pattern match the whole text?
pub fn matches_full(pattern: &str, text: &str) -> bool {
    let regex = format!("^(?:{})$", pattern_to_regex(pattern));
    match Regex::new(&regex) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// `${v#p}` / `${v##p}`: strip the shortest/longest matching prefix.
/// `None` when nothing matches.
pub fn remove_prefix(value: &str, pattern: &str, longest: bool) -> Option<String> {
    let chars: Vec<char> = value.chars().collect();
    let indices: Vec<usize> = (0..=chars.len()).collect();
    let order: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(indices.iter().rev())
    } else {
        Box::new(indices.iter())
    };
    for &i in order {
        let prefix: String = chars[..i].iter().collect();
        if matches_full(pattern, &prefix) {
            return Some(chars[i..].iter().collect());
        }
    }
    None
}

/// `${v%p}` / `${v%%p}`: strip the shortest/longest matching suffix.
pub fn remove_suffix(value: &str, pattern: &str, longest: bool) -> Option<String> {
    let chars: Vec<char> = value.chars().collect();
    let indices: Vec<usize> = (0..=chars.len()).collect();
    let order: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(indices.iter())
    } else {
        Box::new(indices.iter().rev())
    };
    for &i in order {
        let suffix: String = chars[i..].iter().collect();
        if matches_full(pattern, &suffix) {
            return Some(chars[..i].iter().collect());
        }
    }
    None
}

/// `${v/p/r}` / `${v//p/r}`: replace the first (or every) match.
pub fn replace(value: &str, pattern: &str, replacement: &str, all: bool) -> String {
    let regex = pattern_to_regex(pattern);
    if regex.is_empty() {
        return value.to_string();
    }
    let Ok(re) = Regex::new(&regex) else {
        return value.to_string();
    };
    // `$` is a capture reference to the regex engine, not to us.
    let literal = replacement.replace('$', "$$");
    if all {
        re.replace_all(value, literal.as_str()).to_string()
    } else {
        re.replace(value, literal.as_str()).to_string()
    }
}

/// Does the field contain an unquoted glob character? Backslash escapes
/// protect the next character.
pub fn has_unquoted_glob(field: &str) -> bool {
    let chars: Vec<char> = field.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '*' | '?' | '[' => return true,
            _ => i += 1,
        }
    }
    false
}

/// Quote-removal: strip every backslash escape (`\x` becomes `x`).
pub fn unescape(field: &str) -> String {
    let chars: Vec<char> = field.chars().collect();
    let mut out = String::with_capacity(field.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Protect every glob-significant character (and backslash) of quoted
/// text so later stages treat it as literal data.
pub fn glob_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Protect only literal backslashes of unquoted substitution results;
/// their glob characters stay active.
pub fn escape_backslashes(text: &str) -> String {
    text.replace('\\', "\\\\")
}

/// Protect glob characters of quoted text in PATTERN context, where a
/// source backslash must stay an active escape.
pub fn glob_escape_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        assert!(matches_full("a*c", "abc"));
        assert!(matches_full("a*c", "ac"));
        assert!(matches_full("a?c", "abc"));
        assert!(!matches_full("a?c", "ac"));
    }

    #[test]
    fn test_char_class() {
        assert!(matches_full("[ab]x", "ax"));
        assert!(!matches_full("[ab]x", "cx"));
        assert!(matches_full("[!ab]x", "cx"));
        assert!(matches_full("[a-c]x", "bx"));
    }

    #[test]
    fn test_posix_class() {
        assert!(matches_full("[[:digit:]]*", "42abc"));
        assert!(!matches_full("[[:digit:]]*", "x42"));
    }

    #[test]
    fn test_escaped_star_is_literal() {
        assert!(matches_full("a\\*c", "a*c"));
        assert!(!matches_full("a\\*c", "abc"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        assert!(matches_full("a[bc", "a[bc"));
    }

    #[test]
    fn test_remove_suffix_shortest_vs_longest() {
        let v = "a.tar.gz";
        assert_eq!(remove_suffix(v, ".*", false), Some("a.tar".into()));
        assert_eq!(remove_suffix(v, ".*", true), Some("a".into()));
        assert_eq!(remove_suffix(v, "xyz", false), None);
    }

    #[test]
    fn test_remove_prefix_shortest_vs_longest() {
        let v = "a/b/c";
        assert_eq!(remove_prefix(v, "*/", false), Some("b/c".into()));
        assert_eq!(remove_prefix(v, "*/", true), Some("c".into()));
    }

    #[test]
    fn test_suffix_with_escaped_quote() {
        // ${foo%d\'} with foo="'a b c d'"
        assert_eq!(
            remove_suffix("'a b c d'", "d\\'", false),
            Some("'a b c ".into())
        );
    }

    #[test]
    fn test_replace_first_and_all() {
        assert_eq!(replace("aaa", "a", "b", false), "baa");
        assert_eq!(replace("aaa", "a", "b", true), "bbb");
        assert_eq!(replace("hello", "l*o", "_", false), "he_");
    }

    #[test]
    fn test_has_unquoted_glob() {
        assert!(has_unquoted_glob("*.rs"));
        assert!(!has_unquoted_glob("\\*.rs"));
        assert!(!has_unquoted_glob("plain"));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\*b\\\\c"), "a*b\\c");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_glob_escape_round_trip() {
        let original = "a*b?c[d]\\e";
        assert_eq!(unescape(&glob_escape(original)), original);
        assert!(!has_unquoted_glob(&glob_escape(original)));
    }
}

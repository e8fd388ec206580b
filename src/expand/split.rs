//! Field Splitting
//!
//! IFS-driven splitting of substitution results. IFS whitespace
//! collapses: any run of whitespace, optionally around one non-whitespace
//! separator, is a single delimiter. Non-whitespace separators delimit
//! fields on their own, so doubled separators produce empty fields and a
//! leading separator produces a leading empty field. Trailing delimiters
//! never produce a trailing empty field, but the caller needs to know
//! about them to break words correctly.

use std::collections::HashSet;

/// One split: the fields plus whether the value started or ended with a
/// delimiter (used when gluing adjacent word parts).
#[derive(Debug, Clone, PartialEq)]
pub struct IfsSplit {
    pub fields: Vec<String>,
    pub had_leading_delim: bool,
    pub had_trailing_delim: bool,
}

fn is_ifs_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\n'
}

fn categorize(ifs: &str) -> (HashSet<char>, HashSet<char>) {
    let mut ws = HashSet::new();
    let mut non_ws = HashSet::new();
    for c in ifs.chars() {
        if is_ifs_whitespace(c) {
            ws.insert(c);
        } else {
            non_ws.insert(c);
        }
    }
    (ws, non_ws)
}

/// Split `value` on the characters of `ifs`. With an empty IFS the value
/// is one field (or none when empty).
pub fn split_fields(value: &str, ifs: &str) -> IfsSplit {
    if value.is_empty() {
        return IfsSplit {
            fields: Vec::new(),
            had_leading_delim: false,
            had_trailing_delim: false,
        };
    }
    if ifs.is_empty() {
        return IfsSplit {
            fields: vec![value.to_string()],
            had_leading_delim: false,
            had_trailing_delim: false,
        };
    }
    let (ws, non_ws) = categorize(ifs);
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len();
    let mut fields = Vec::new();
    let mut i = 0;
    let mut had_leading = false;
    let mut had_trailing = false;

    while i < n && ws.contains(&chars[i]) {
        i += 1;
        had_leading = true;
    }
    while i < n {
        let mut field = String::new();
        while i < n && !ws.contains(&chars[i]) && !non_ws.contains(&chars[i]) {
            field.push(chars[i]);
            i += 1;
        }
        fields.push(field);
        if i >= n {
            break;
        }
        // One delimiter: ws*, optionally one non-ws separator, ws*.
        let mut advanced = false;
        while i < n && ws.contains(&chars[i]) {
            i += 1;
            advanced = true;
        }
        if i < n && non_ws.contains(&chars[i]) {
            i += 1;
            advanced = true;
            while i < n && ws.contains(&chars[i]) {
                i += 1;
            }
        }
        debug_assert!(advanced);
        if i >= n {
            had_trailing = true;
        }
    }
    IfsSplit {
        fields,
        had_leading_delim: had_leading,
        had_trailing_delim: had_trailing,
    }
}

/// The `$*` join separator: the first IFS character, a space when IFS is
/// unset, nothing when IFS is empty.
pub fn join_separator(ifs: &str) -> String {
    ifs.chars().next().map(String::from).unwrap_or_default()
}

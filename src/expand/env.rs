//! Variable Environment
//!
//! A stack of scopes: one global frame plus a frame per active function
//! call. Lookup walks innermost-out; assignment writes to the innermost
//! frame that already holds the name, else to the global frame.
//! Positional parameters are shared copy-on-write across subshell forks.

use indexmap::IndexMap;
use std::rc::Rc;

pub const DEFAULT_IFS: &str = " \t\n";

/// A shell variable: a plain string or an indexed array.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Str(String),
    Indexed(Vec<String>),
}

impl VarValue {
    /// The scalar view: arrays read as their first element, like `$arr`.
    pub fn as_scalar(&self) -> &str {
        match self {
            VarValue::Str(s) => s,
            VarValue::Indexed(items) => items.first().map(|s| s.as_str()).unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    vars: IndexMap<String, VarValue>,
}

#[derive(Debug, Clone)]
pub struct Env {
    scopes: Vec<Scope>,
    positional: Rc<Vec<String>>,
    arg0: String,
    last_status: i32,
    last_bg_pid: Option<u32>,
    shell_pid: u32,
    flags: String,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            positional: Rc::new(Vec::new()),
            arg0: "marsh".to_string(),
            last_status: 0,
            last_bg_pid: None,
            shell_pid: std::process::id(),
            flags: String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name))
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| v.as_scalar().to_string())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign into the innermost scope that already defines the name,
    /// else the global scope.
    pub fn set_var(&mut self, name: &str, value: VarValue) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.vars.contains_key(name) {
                scope.vars.insert(name.to_string(), value);
                return;
            }
        }
        self.scopes[0].vars.insert(name.to_string(), value);
    }

    pub fn set_str(&mut self, name: &str, value: impl Into<String>) {
        self.set_var(name, VarValue::Str(value.into()));
    }

    /// Define a name in the current (innermost) scope.
    pub fn declare_local(&mut self, name: &str, value: VarValue) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .vars
            .insert(name.to_string(), value);
    }

    pub fn unset(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.vars.shift_remove(name).is_some() {
                return;
            }
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    // ------------------------------------------------------------------
    // Positional and special parameters
    // ------------------------------------------------------------------

    pub fn set_positional(&mut self, params: Vec<String>) {
        self.positional = Rc::new(params);
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn positional_nth(&self, n: usize) -> Option<&str> {
        if n == 0 {
            return Some(&self.arg0);
        }
        self.positional.get(n - 1).map(|s| s.as_str())
    }

    pub fn arg0(&self) -> &str {
        &self.arg0
    }

    pub fn set_arg0(&mut self, arg0: impl Into<String>) {
        self.arg0 = arg0.into();
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    pub fn set_last_status(&mut self, status: i32) {
        self.last_status = status;
    }

    pub fn last_bg_pid(&self) -> Option<u32> {
        self.last_bg_pid
    }

    pub fn set_last_bg_pid(&mut self, pid: u32) {
        self.last_bg_pid = Some(pid);
    }

    pub fn shell_pid(&self) -> u32 {
        self.shell_pid
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn set_flags(&mut self, flags: impl Into<String>) {
        self.flags = flags.into();
    }

    // ------------------------------------------------------------------
    // Derived lookups
    // ------------------------------------------------------------------

    /// Effective IFS: the variable when set (even empty), the default
    /// otherwise.
    pub fn ifs(&self) -> String {
        self.get_str("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
    }

    pub fn home(&self) -> Option<String> {
        self.get_str("HOME")
    }

    /// A subshell view: same variables, copy-on-write positionals.
    pub fn fork(&self) -> Env {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_lookup_and_set() {
        let mut env = Env::new();
        env.set_str("x", "global");
        env.push_scope();
        env.declare_local("x", VarValue::Str("local".into()));
        assert_eq!(env.get_str("x"), Some("local".into()));
        env.set_str("x", "updated");
        env.pop_scope();
        assert_eq!(env.get_str("x"), Some("global".into()));
    }

    #[test]
    fn test_set_without_local_goes_global() {
        let mut env = Env::new();
        env.push_scope();
        env.set_str("y", "v");
        env.pop_scope();
        assert_eq!(env.get_str("y"), Some("v".into()));
    }

    #[test]
    fn test_unset() {
        let mut env = Env::new();
        env.set_str("x", "1");
        env.unset("x");
        assert!(!env.is_set("x"));
    }

    #[test]
    fn test_positional_params() {
        let mut env = Env::new();
        env.set_positional(vec!["a".into(), "b".into()]);
        assert_eq!(env.positional_nth(1), Some("a"));
        assert_eq!(env.positional_nth(2), Some("b"));
        assert_eq!(env.positional_nth(3), None);
    }

    #[test]
    fn test_fork_shares_positionals_until_write() {
        let mut env = Env::new();
        env.set_positional(vec!["a".into()]);
        let mut child = env.fork();
        child.set_positional(vec!["b".into()]);
        assert_eq!(env.positional(), &["a".to_string()]);
        assert_eq!(child.positional(), &["b".to_string()]);
    }

    #[test]
    fn test_ifs_default_and_override() {
        let mut env = Env::new();
        assert_eq!(env.ifs(), " \t\n");
        env.set_str("IFS", ":");
        assert_eq!(env.ifs(), ":");
        env.set_str("IFS", "");
        assert_eq!(env.ifs(), "");
    }

    #[test]
    fn test_array_scalar_view() {
        let mut env = Env::new();
        env.set_var(
            "arr",
            VarValue::Indexed(vec!["first".into(), "second".into()]),
        );
        assert_eq!(env.get_str("arr"), Some("first".into()));
    }
}

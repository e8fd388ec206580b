//! Tilde Expansion
//!
//! `~` expands to `$HOME`; `~user` resolves through the caller-supplied
//! user table (the core does not read the passwd database). An
//! unresolvable tilde stays literal, as shells do.

use crate::expand::env::Env;
use std::collections::HashMap;

pub fn expand_tilde(
    prefix: Option<&str>,
    env: &Env,
    user_homes: &HashMap<String, String>,
) -> String {
    match prefix {
        None => env.home().unwrap_or_else(|| "~".to_string()),
        Some(user) => match user_homes.get(user) {
            Some(home) => home.clone(),
            None => format!("~{}", user),
        },
    }
}

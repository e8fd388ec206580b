//! Arithmetic Evaluation
//!
//! Evaluates `ArithExpr` trees during expansion: 64-bit signed
//! arithmetic, short-circuit `&&`/`||`, assignment write-back into the
//! environment, and recursive interpretation of variable values that are
//! themselves expressions (`x="y + 1"`). Division by zero and malformed
//! bases surface as `ArithError`s, never panics.

use crate::ast::types::ArithExpr;
use crate::errors::{ArithError, ExpandError};
use crate::expand::word_eval::WordEvaluator;
use crate::ids::{self, Id};
use crate::lexer::{LexMode, LexerDriver};
use crate::parser::arith_parser;

const MAX_RECURSION: u32 = 64;

pub(crate) fn eval_arith(ev: &mut WordEvaluator, expr: &ArithExpr) -> Result<i64, ExpandError> {
    eval_depth(ev, expr, 0)
}

fn eval_depth(ev: &mut WordEvaluator, expr: &ArithExpr, depth: u32) -> Result<i64, ExpandError> {
    if depth > MAX_RECURSION {
        return Err(ArithError::RecursionLimit.into());
    }
    match expr {
        ArithExpr::VarRef(t) => var_value(ev, &t.value, depth),
        ArithExpr::Word(w) => {
            let text = ev.plain_text(w)?;
            text_value(ev, &text, depth)
        }
        ArithExpr::Unary { op, child, postfix } => match op {
            Id::ArithDPlus | Id::ArithDMinus => {
                let name = match child.as_ref() {
                    ArithExpr::VarRef(t) => t.value.clone(),
                    _ => return Err(ArithError::BadLValue.into()),
                };
                let old = var_value(ev, &name, depth)?;
                let new = if *op == Id::ArithDPlus {
                    old.wrapping_add(1)
                } else {
                    old.wrapping_sub(1)
                };
                ev.env.set_str(&name, new.to_string());
                Ok(if *postfix { old } else { new })
            }
            Id::ArithMinus => Ok(eval_depth(ev, child, depth + 1)?.wrapping_neg()),
            Id::ArithPlus => eval_depth(ev, child, depth + 1),
            Id::ArithBang => Ok((eval_depth(ev, child, depth + 1)? == 0) as i64),
            Id::ArithTilde => Ok(!eval_depth(ev, child, depth + 1)?),
            _ => Err(ArithError::BadNumber {
                text: op.as_str().to_string(),
            }
            .into()),
        },
        ArithExpr::Binary { op, left, right } => match op {
            Id::ArithDAmp => {
                if eval_depth(ev, left, depth + 1)? == 0 {
                    Ok(0)
                } else {
                    Ok((eval_depth(ev, right, depth + 1)? != 0) as i64)
                }
            }
            Id::ArithDPipe => {
                if eval_depth(ev, left, depth + 1)? != 0 {
                    Ok(1)
                } else {
                    Ok((eval_depth(ev, right, depth + 1)? != 0) as i64)
                }
            }
            Id::ArithComma => {
                eval_depth(ev, left, depth + 1)?;
                eval_depth(ev, right, depth + 1)
            }
            _ => {
                let l = eval_depth(ev, left, depth + 1)?;
                let r = eval_depth(ev, right, depth + 1)?;
                apply_binary(*op, l, r).map_err(ExpandError::from)
            }
        },
        ArithExpr::Assign { op, name, rhs } => {
            let r = eval_depth(ev, rhs, depth + 1)?;
            let new = if *op == Id::ArithEqual {
                r
            } else {
                let current = var_value(ev, &name.value, depth)?;
                let binary = match op {
                    Id::ArithPlusEqual => Id::ArithPlus,
                    Id::ArithMinusEqual => Id::ArithMinus,
                    Id::ArithStarEqual => Id::ArithStar,
                    Id::ArithSlashEqual => Id::ArithSlash,
                    Id::ArithPercentEqual => Id::ArithPercent,
                    Id::ArithAmpEqual => Id::ArithAmp,
                    Id::ArithPipeEqual => Id::ArithPipe,
                    Id::ArithCaretEqual => Id::ArithCaret,
                    Id::ArithDLessEqual => Id::ArithDLess,
                    _ => Id::ArithDGreat,
                };
                apply_binary(binary, current, r)?
            };
            ev.env.set_str(&name.value, new.to_string());
            Ok(new)
        }
        ArithExpr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if eval_depth(ev, cond, depth + 1)? != 0 {
                eval_depth(ev, then_expr, depth + 1)
            } else {
                eval_depth(ev, else_expr, depth + 1)
            }
        }
        ArithExpr::FuncCall { name, .. } => Err(ArithError::UndefinedFunction {
            name: name.value.clone(),
        }
        .into()),
    }
}

fn apply_binary(op: Id, left: i64, right: i64) -> Result<i64, ArithError> {
    Ok(match op {
        Id::ArithPlus => left.wrapping_add(right),
        Id::ArithMinus => left.wrapping_sub(right),
        Id::ArithStar => left.wrapping_mul(right),
        Id::ArithSlash => {
            if right == 0 {
                return Err(ArithError::DivideByZero);
            }
            left.wrapping_div(right)
        }
        Id::ArithPercent => {
            if right == 0 {
                return Err(ArithError::DivideByZero);
            }
            left.wrapping_rem(right)
        }
        Id::ArithDStar => {
            if right < 0 {
                return Err(ArithError::NegativeExponent);
            }
            left.saturating_pow(right.min(u32::MAX as i64) as u32)
        }
        Id::ArithDLess => left.wrapping_shl(right as u32),
        Id::ArithDGreat => left.wrapping_shr(right as u32),
        Id::ArithLess => (left < right) as i64,
        Id::ArithLessEqual => (left <= right) as i64,
        Id::ArithGreat => (left > right) as i64,
        Id::ArithGreatEqual => (left >= right) as i64,
        Id::ArithDEqual => (left == right) as i64,
        Id::ArithNEqual => (left != right) as i64,
        Id::ArithAmp => left & right,
        Id::ArithPipe => left | right,
        Id::ArithCaret => left ^ right,
        _ => {
            return Err(ArithError::BadNumber {
                text: op.as_str().to_string(),
            })
        }
    })
}

fn var_value(ev: &mut WordEvaluator, name: &str, depth: u32) -> Result<i64, ExpandError> {
    match ev.env.get_str(name) {
        Some(value) => text_value(ev, &value, depth + 1),
        None => {
            if ev.opts.strict_unset {
                Err(ExpandError::UnboundVariable {
                    name: name.to_string(),
                })
            } else {
                Ok(0)
            }
        }
    }
}

/// A string interpreted numerically: empty is 0, a literal parses
/// directly, a name chases the variable, anything else is re-parsed as
/// an expression (how `x="y + 1"; $((x))` works).
fn text_value(ev: &mut WordEvaluator, text: &str, depth: u32) -> Result<i64, ExpandError> {
    if depth > MAX_RECURSION {
        return Err(ArithError::RecursionLimit.into());
    }
    let t = text.trim();
    if t.is_empty() {
        return Ok(0);
    }
    if ids::is_valid_name(t) {
        return var_value(ev, t, depth + 1);
    }
    if let Ok(v) = arith_parser::parse_number(t) {
        return Ok(v);
    }
    let mut lx = LexerDriver::new(t, "<arith>");
    lx.push_mode(LexMode::Arith);
    let expr = arith_parser::parse_expr(&mut lx).map_err(|_| ArithError::BadNumber {
        text: t.to_string(),
    })?;
    eval_depth(ev, &expr, depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::env::Env;
    use crate::expand::glob::MemFs;
    use crate::expand::word_eval::ExpandOptions;

    fn eval_src(src: &str, env: &mut Env) -> Result<i64, ExpandError> {
        let mut lx = LexerDriver::new(src, "t.sh");
        lx.push_mode(LexMode::Arith);
        let expr = arith_parser::parse_expr(&mut lx).unwrap();
        let opts = ExpandOptions::default();
        let fs = MemFs::new(&[]);
        let mut ev = WordEvaluator::new(env, &opts, &fs);
        eval_arith(&mut ev, &expr)
    }

    #[test]
    fn test_basic_arithmetic() {
        let mut env = Env::new();
        assert_eq!(eval_src("1 + 2 * 3", &mut env).unwrap(), 7);
        assert_eq!(eval_src("(1 + 2) * 3", &mut env).unwrap(), 9);
        assert_eq!(eval_src("7 % 3", &mut env).unwrap(), 1);
        assert_eq!(eval_src("2 ** 10", &mut env).unwrap(), 1024);
    }

    #[test]
    fn test_division_by_zero() {
        let mut env = Env::new();
        assert!(matches!(
            eval_src("1 / 0", &mut env),
            Err(ExpandError::Arith(ArithError::DivideByZero))
        ));
        assert!(matches!(
            eval_src("1 % 0", &mut env),
            Err(ExpandError::Arith(ArithError::DivideByZero))
        ));
    }

    #[test]
    fn test_variables_and_assignment() {
        let mut env = Env::new();
        env.set_str("x", "5");
        assert_eq!(eval_src("x + 1", &mut env).unwrap(), 6);
        assert_eq!(eval_src("x = 10", &mut env).unwrap(), 10);
        assert_eq!(env.get_str("x"), Some("10".into()));
        assert_eq!(eval_src("x += 5", &mut env).unwrap(), 15);
    }

    #[test]
    fn test_increment_decrement() {
        let mut env = Env::new();
        env.set_str("i", "3");
        assert_eq!(eval_src("i++", &mut env).unwrap(), 3);
        assert_eq!(env.get_str("i"), Some("4".into()));
        assert_eq!(eval_src("++i", &mut env).unwrap(), 5);
        assert_eq!(eval_src("--i", &mut env).unwrap(), 4);
    }

    #[test]
    fn test_short_circuit() {
        let mut env = Env::new();
        // The right side would divide by zero; && must not evaluate it.
        assert_eq!(eval_src("0 && 1 / 0", &mut env).unwrap(), 0);
        assert_eq!(eval_src("1 || 1 / 0", &mut env).unwrap(), 1);
    }

    #[test]
    fn test_ternary_and_comparisons() {
        let mut env = Env::new();
        assert_eq!(eval_src("3 > 2 ? 10 : 20", &mut env).unwrap(), 10);
        assert_eq!(eval_src("3 < 2 ? 10 : 20", &mut env).unwrap(), 20);
    }

    #[test]
    fn test_unset_variable_is_zero() {
        let mut env = Env::new();
        assert_eq!(eval_src("missing + 1", &mut env).unwrap(), 1);
    }

    #[test]
    fn test_recursive_variable_expression() {
        let mut env = Env::new();
        env.set_str("y", "2");
        env.set_str("x", "y + 1");
        assert_eq!(eval_src("x * 2", &mut env).unwrap(), 6);
    }

    #[test]
    fn test_recursion_limit() {
        let mut env = Env::new();
        env.set_str("a", "a + 1");
        assert!(matches!(
            eval_src("a", &mut env),
            Err(ExpandError::Arith(ArithError::RecursionLimit))
        ));
    }

    #[test]
    fn test_base_literals() {
        let mut env = Env::new();
        assert_eq!(eval_src("0x10 + 010", &mut env).unwrap(), 24);
        assert_eq!(eval_src("2#101", &mut env).unwrap(), 5);
    }

    #[test]
    fn test_undefined_function() {
        let mut env = Env::new();
        assert!(matches!(
            eval_src("f(1)", &mut env),
            Err(ExpandError::Arith(ArithError::UndefinedFunction { .. }))
        ));
    }

    #[test]
    fn test_comma_sequencing() {
        let mut env = Env::new();
        assert_eq!(eval_src("x = 1, x + 1", &mut env).unwrap(), 2);
    }
}

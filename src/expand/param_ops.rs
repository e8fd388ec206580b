//! Parameter Expansion Operators
//!
//! Evaluates `${...}` forms: the set/empty tests of `:-` `-` `:=` `=`
//! `:?` `?` `:+` `+` (a colon adds the emptiness test), pattern removal
//! and replacement, slices, length, and `!` indirection. Default words
//! expand in the quote context of the `${}` itself, which is why
//! `"${x:-'a b'}"` keeps its single quotes and `${x:-a b c}` splits.

use crate::ast::types::{BracedVarSub, BracketOp, VsPrefixOp, VsSuffixOp, Word};
use crate::errors::ExpandError;
use crate::expand::word_eval::{QuoteCtx, Seg, WordEvaluator};
use crate::expand::{arith_eval, env::VarValue, pattern};
use crate::ids::{self, Id};

/// A resolved parameter before suffix operators apply.
#[derive(Debug, Clone)]
enum Param {
    Unset,
    Str(String),
    Fields { items: Vec<String>, star: bool },
}

impl Param {
    fn is_empty(&self) -> bool {
        match self {
            Param::Unset => true,
            Param::Str(s) => s.is_empty(),
            Param::Fields { items, .. } => items.is_empty(),
        }
    }
}

pub(crate) fn eval_braced(
    ev: &mut WordEvaluator,
    sub: &BracedVarSub,
    ctx: QuoteCtx,
    out: &mut Vec<Seg>,
) -> Result<(), ExpandError> {
    let mut param = resolve(ev, sub)?;

    if sub.prefix_op == Some(VsPrefixOp::Indirect) {
        param = indirect(ev, param, &sub.name.value)?;
    }
    if sub.prefix_op == Some(VsPrefixOp::Length) {
        let n = match &param {
            Param::Unset => 0,
            Param::Str(s) => s.chars().count(),
            Param::Fields { items, .. } => items.len(),
        };
        param = Param::Str(n.to_string());
    }

    if let Some(op) = &sub.suffix_op {
        match op.as_ref() {
            VsSuffixOp::UseDefault { test_empty, arg } => {
                if triggers_default(&param, *test_empty) {
                    push_default(ev, arg, ctx, out)?;
                    return Ok(());
                }
            }
            VsSuffixOp::AssignDefault { test_empty, arg } => {
                if triggers_default(&param, *test_empty) {
                    if sub.name.id != Id::VsubName {
                        return Err(ExpandError::BadAssignment {
                            name: sub.name.value.clone(),
                        });
                    }
                    let value = default_string(ev, arg)?;
                    ev.env.set_str(&sub.name.value, value.clone());
                    param = Param::Str(value);
                }
            }
            VsSuffixOp::ErrorIfUnset { test_empty, arg } => {
                if triggers_default(&param, *test_empty) {
                    let message = match arg {
                        Some(w) => ev.plain_text(w)?,
                        None => "parameter null or not set".to_string(),
                    };
                    return Err(ExpandError::ParameterNullOrUnset {
                        name: sub.name.value.clone(),
                        message,
                    });
                }
            }
            VsSuffixOp::UseAlternative { test_empty, arg } => {
                let set_enough = if *test_empty {
                    !param.is_empty()
                } else {
                    !matches!(param, Param::Unset)
                };
                if set_enough {
                    push_default(ev, arg, ctx, out)?;
                }
                return Ok(());
            }
            VsSuffixOp::RemovePrefix { longest, pattern } => {
                let pat = pattern_string(ev, pattern)?;
                param = map_param(param, |s| {
                    pattern::remove_prefix(&s, &pat, *longest).unwrap_or(s)
                });
            }
            VsSuffixOp::RemoveSuffix { longest, pattern } => {
                let pat = pattern_string(ev, pattern)?;
                param = map_param(param, |s| {
                    pattern::remove_suffix(&s, &pat, *longest).unwrap_or(s)
                });
            }
            VsSuffixOp::Replace {
                all,
                pattern: pat_word,
                replacement,
            } => {
                let pat = pattern_string(ev, pat_word)?;
                let repl = match replacement {
                    Some(w) => ev.plain_text(w)?,
                    None => String::new(),
                };
                param = map_param(param, |s| pattern::replace(&s, &pat, &repl, *all));
            }
            VsSuffixOp::Slice { offset, length } => {
                let off = arith_eval::eval_arith(ev, offset)?;
                let len = match length {
                    Some(e) => Some(arith_eval::eval_arith(ev, e)?),
                    None => None,
                };
                param = slice_param(param, off, len);
            }
        }
    }

    match param {
        Param::Unset => {
            if ev.opts.strict_unset {
                return Err(ExpandError::UnboundVariable {
                    name: sub.name.value.clone(),
                });
            }
            out.push(ev.value_seg(String::new(), ctx));
        }
        Param::Str(s) => out.push(ev.value_seg(s, ctx)),
        Param::Fields { items, star } => ev.push_params(&items, star, ctx.in_dq, out),
    }
    Ok(())
}

/// `:-`-family trigger: unset always counts, emptiness counts when the
/// operator has the colon.
fn triggers_default(param: &Param, test_empty: bool) -> bool {
    match param {
        Param::Unset => true,
        _ => test_empty && param.is_empty(),
    }
}

/// Expand a default/alternative word in the quote context of the
/// surrounding `${}`: unquoted defaults split even their literal text.
fn push_default(
    ev: &mut WordEvaluator,
    arg: &Option<Word>,
    ctx: QuoteCtx,
    out: &mut Vec<Seg>,
) -> Result<(), ExpandError> {
    if let Some(w) = arg {
        let segs = ev.eval_parts(
            w.parts(),
            QuoteCtx {
                in_dq: ctx.in_dq,
                split_literals: !ctx.in_dq,
                for_pattern: ctx.for_pattern,
            },
        )?;
        out.extend(segs);
    }
    Ok(())
}

fn default_string(ev: &mut WordEvaluator, arg: &Option<Word>) -> Result<String, ExpandError> {
    match arg {
        Some(w) => ev.plain_text(w),
        None => Ok(String::new()),
    }
}

fn pattern_string(ev: &mut WordEvaluator, word: &Option<Word>) -> Result<String, ExpandError> {
    match word {
        Some(w) => ev.pattern_text(w),
        None => Ok(String::new()),
    }
}

fn map_param(param: Param, f: impl Fn(String) -> String) -> Param {
    match param {
        Param::Unset => Param::Unset,
        Param::Str(s) => Param::Str(f(s)),
        Param::Fields { items, star } => Param::Fields {
            items: items.into_iter().map(f).collect(),
            star,
        },
    }
}

fn slice_param(param: Param, offset: i64, length: Option<i64>) -> Param {
    match param {
        Param::Unset => Param::Unset,
        Param::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let n = chars.len() as i64;
            let start = if offset < 0 { n + offset } else { offset };
            if start < 0 || start > n {
                return Param::Str(String::new());
            }
            let end = match length {
                None => n,
                Some(len) if len < 0 => n + len,
                Some(len) => (start + len).min(n),
            };
            if end <= start {
                return Param::Str(String::new());
            }
            Param::Str(chars[start as usize..end as usize].iter().collect())
        }
        Param::Fields { items, star } => {
            let n = items.len() as i64;
            // Positional slices are 1-based: ${@:2} starts at $2.
            let start = if offset <= 0 { 0 } else { (offset - 1).min(n) };
            let take = match length {
                None => n - start,
                Some(len) => len.clamp(0, n - start),
            };
            Param::Fields {
                items: items
                    .into_iter()
                    .skip(start as usize)
                    .take(take as usize)
                    .collect(),
                star,
            }
        }
    }
}

fn resolve(ev: &mut WordEvaluator, sub: &BracedVarSub) -> Result<Param, ExpandError> {
    let name = &sub.name;
    match name.id {
        Id::VsubName => match &sub.bracket_op {
            None => Ok(match ev.env.get_str(&name.value) {
                Some(v) => Param::Str(v),
                None => Param::Unset,
            }),
            Some(BracketOp::WholeAt) | Some(BracketOp::WholeStar) => {
                let star = matches!(sub.bracket_op, Some(BracketOp::WholeStar));
                Ok(match ev.env.get(&name.value).cloned() {
                    Some(VarValue::Indexed(items)) => Param::Fields { items, star },
                    Some(VarValue::Str(s)) => Param::Fields {
                        items: vec![s],
                        star,
                    },
                    None => Param::Unset,
                })
            }
            Some(BracketOp::Index(expr)) => {
                let expr = expr.clone();
                let idx = arith_eval::eval_arith(ev, &expr)?;
                Ok(match ev.env.get(&name.value).cloned() {
                    Some(VarValue::Indexed(items)) => {
                        let n = items.len() as i64;
                        let i = if idx < 0 { n + idx } else { idx };
                        if i >= 0 && i < n {
                            Param::Str(items[i as usize].clone())
                        } else {
                            Param::Unset
                        }
                    }
                    Some(VarValue::Str(s)) => {
                        if idx == 0 {
                            Param::Str(s)
                        } else {
                            Param::Unset
                        }
                    }
                    None => Param::Unset,
                })
            }
        },
        Id::VsubNumber => {
            let n: usize = name.value.parse().unwrap_or(0);
            Ok(match ev.env.positional_nth(n) {
                Some(v) => Param::Str(v.to_string()),
                None => Param::Unset,
            })
        }
        Id::VsubAt | Id::VsubStar => {
            let items: Vec<String> = ev.env.positional().to_vec();
            if items.is_empty() {
                Ok(Param::Unset)
            } else {
                Ok(Param::Fields {
                    items,
                    star: name.id == Id::VsubStar,
                })
            }
        }
        Id::VsubPound => Ok(Param::Str(ev.env.positional().len().to_string())),
        Id::VsubQMark => Ok(Param::Str(ev.env.last_status().to_string())),
        Id::VsubDollar => Ok(Param::Str(ev.env.shell_pid().to_string())),
        Id::VsubBang => Ok(Param::Str(
            ev.env
                .last_bg_pid()
                .map(|p| p.to_string())
                .unwrap_or_default(),
        )),
        Id::VsubHyphen => Ok(Param::Str(ev.env.flags().to_string())),
        _ => Ok(Param::Unset),
    }
}

fn indirect(ev: &mut WordEvaluator, param: Param, via: &str) -> Result<Param, ExpandError> {
    match param {
        Param::Str(target) if !target.is_empty() => {
            if !ids::is_valid_name(&target) && !target.chars().all(|c| c.is_ascii_digit()) {
                return Err(ExpandError::BadIndirection {
                    name: target.clone(),
                });
            }
            if target.chars().all(|c| c.is_ascii_digit()) {
                let n: usize = target.parse().unwrap_or(0);
                return Ok(match ev.env.positional_nth(n) {
                    Some(v) => Param::Str(v.to_string()),
                    None => Param::Unset,
                });
            }
            Ok(match ev.env.get_str(&target) {
                Some(v) => Param::Str(v),
                None => Param::Unset,
            })
        }
        Param::Str(_) | Param::Unset => Ok(Param::Unset),
        Param::Fields { .. } => Err(ExpandError::BadIndirection {
            name: via.to_string(),
        }),
    }
}

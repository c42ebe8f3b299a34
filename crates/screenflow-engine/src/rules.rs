//! Rule evaluation with SQL-null-like three-valued semantics.
//!
//! A rule's condition is a set of per-field constraints; all must hold.
//! Rules are checked in array order and the first match short-circuits.
//! A null or absent context field compares false under every operator
//! except `ltn` (less-than-or-null), which exists precisely so "client
//! version below X, or version unknown" is expressible as one rule.
//!
//! Null handling is encoded in an explicit [`Comparable`] sum type
//! rather than leaning on `Option` propagation, so the semantics stay
//! identical across ports of this engine.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{FieldConstraint, FlowRule, RuleEffect, RuleOperator};

/// The context a rule condition is evaluated against: a flat map of
/// field name → JSON value. Absent fields compare as null.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    fields: BTreeMap<String, Value>,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Evaluate rules in order; the first rule whose every constraint holds
/// returns its effect. No match → `None` (caller keeps default behavior).
pub fn evaluate<'a>(rules: &'a [FlowRule], ctx: &RuleContext) -> Option<&'a RuleEffect> {
    for (idx, rule) in rules.iter().enumerate() {
        if rule.condition.iter().all(|c| constraint_holds(c, ctx)) {
            tracing::debug!(rule = idx, "rule condition matched");
            return Some(&rule.effect);
        }
    }
    None
}

fn constraint_holds(constraint: &FieldConstraint, ctx: &RuleContext) -> bool {
    let lhs = Comparable::from_json(ctx.get(&constraint.field));
    let rhs = Comparable::from_json(Some(&constraint.value));
    compare(&lhs, constraint.op, &rhs)
}

/// A context or constraint value lifted into comparison space. Objects
/// and arrays are not comparable and behave like null.
#[derive(Debug, Clone, PartialEq)]
enum Comparable {
    Null,
    Num(f64),
    Text(String),
    Bool(bool),
}

impl Comparable {
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(Value::Number(n)) => n.as_f64().map(Self::Num).unwrap_or(Self::Null),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(Value::Bool(b)) => Self::Bool(*b),
            Some(_) => Self::Null,
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn compare(lhs: &Comparable, op: RuleOperator, rhs: &Comparable) -> bool {
    // Null on either side: false for everything except ltn on a null
    // context value.
    if lhs.is_null() {
        return op == RuleOperator::Ltn;
    }
    if rhs.is_null() {
        return false;
    }

    match (lhs, rhs) {
        (Comparable::Num(l), Comparable::Num(r)) => match op {
            RuleOperator::Eq => l == r,
            RuleOperator::Neq => l != r,
            RuleOperator::Gt => l > r,
            RuleOperator::Gte => l >= r,
            RuleOperator::Lt | RuleOperator::Ltn => l < r,
            RuleOperator::Lte => l <= r,
            RuleOperator::Like => false,
        },
        (Comparable::Text(l), Comparable::Text(r)) => match op {
            RuleOperator::Eq => l == r,
            RuleOperator::Neq => l != r,
            RuleOperator::Gt => l > r,
            RuleOperator::Gte => l >= r,
            RuleOperator::Lt | RuleOperator::Ltn => l < r,
            RuleOperator::Lte => l <= r,
            RuleOperator::Like => like_matches(r, l),
        },
        (Comparable::Bool(l), Comparable::Bool(r)) => match op {
            RuleOperator::Eq => l == r,
            RuleOperator::Neq => l != r,
            _ => false,
        },
        // Type mismatch: false under every operator.
        _ => false,
    }
}

/// Case-insensitive SQL LIKE. `%` matches any run (including empty),
/// `_` matches exactly one character. No escape syntax.
fn like_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();
    like_inner(&p, &t)
}

fn like_inner(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('%') => {
            // Collapse consecutive %; try every split point.
            let rest = &p[1..];
            (0..=t.len()).any(|i| like_inner(rest, &t[i..]))
        }
        Some('_') => !t.is_empty() && like_inner(&p[1..], &t[1..]),
        Some(&c) => t.first() == Some(&c) && like_inner(&p[1..], &t[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamPolicy;
    use serde_json::json;

    fn rule(field: &str, op: RuleOperator, value: Value, slug: &str) -> FlowRule {
        FlowRule {
            condition: vec![FieldConstraint {
                field: field.into(),
                op,
                value,
            }],
            effect: RuleEffect::Replace {
                slug: slug.into(),
                client_parameters: ParamPolicy::Omit,
                server_parameters: ParamPolicy::Omit,
            },
        }
    }

    fn effect_slug(effect: Option<&RuleEffect>) -> Option<&str> {
        match effect {
            Some(RuleEffect::Replace { slug, .. }) => Some(slug.as_str()),
            Some(RuleEffect::Skip) => Some("skip"),
            None => None,
        }
    }

    #[test]
    fn first_match_short_circuits() {
        let rules = vec![
            rule("version", RuleOperator::Lt, json!(100), "first"),
            rule("version", RuleOperator::Lt, json!(200), "second"),
        ];
        let ctx = RuleContext::new().with("version", json!(50));
        assert_eq!(effect_slug(evaluate(&rules, &ctx)), Some("first"));
    }

    #[test]
    fn no_match_yields_none() {
        let rules = vec![rule("version", RuleOperator::Lt, json!(100), "old")];
        let ctx = RuleContext::new().with("version", json!(150));
        assert!(evaluate(&rules, &ctx).is_none());
    }

    #[test]
    fn null_context_fails_strict_operators() {
        let ctx = RuleContext::new(); // version absent
        for op in [
            RuleOperator::Eq,
            RuleOperator::Neq,
            RuleOperator::Gt,
            RuleOperator::Gte,
            RuleOperator::Lt,
            RuleOperator::Lte,
            RuleOperator::Like,
        ] {
            let rules = vec![rule("version", op, json!(100), "x")];
            assert!(evaluate(&rules, &ctx).is_none(), "op {op:?} matched null");
        }
    }

    #[test]
    fn ltn_matches_null_and_lesser() {
        let rules = vec![rule("version", RuleOperator::Ltn, json!(100), "old")];

        let absent = RuleContext::new();
        assert!(evaluate(&rules, &absent).is_some());

        let lesser = RuleContext::new().with("version", json!(50));
        assert!(evaluate(&rules, &lesser).is_some());

        let greater = RuleContext::new().with("version", json!(150));
        assert!(evaluate(&rules, &greater).is_none());
    }

    #[test]
    fn all_constraints_must_hold() {
        let rules = vec![FlowRule {
            condition: vec![
                FieldConstraint {
                    field: "platform".into(),
                    op: RuleOperator::Eq,
                    value: json!("ios"),
                },
                FieldConstraint {
                    field: "version".into(),
                    op: RuleOperator::Lt,
                    value: json!(100),
                },
            ],
            effect: RuleEffect::Skip,
        }];

        let both = RuleContext::new()
            .with("platform", json!("ios"))
            .with("version", json!(50));
        assert!(evaluate(&rules, &both).is_some());

        let one = RuleContext::new()
            .with("platform", json!("ios"))
            .with("version", json!(150));
        assert!(evaluate(&rules, &one).is_none());
    }

    #[test]
    fn like_is_case_insensitive_with_wildcards() {
        assert!(like_matches("hello%", "Hello, world"));
        assert!(like_matches("%world", "hello, WORLD"));
        assert!(like_matches("h_llo", "hallo"));
        assert!(!like_matches("h_llo", "heello"));
        assert!(like_matches("%", ""));
        assert!(!like_matches("abc", "abd"));
    }

    #[test]
    fn type_mismatch_never_matches() {
        let rules = vec![rule("version", RuleOperator::Eq, json!("100"), "x")];
        let ctx = RuleContext::new().with("version", json!(100));
        assert!(evaluate(&rules, &ctx).is_none());
    }
}

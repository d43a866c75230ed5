//! Recursive evaluation of normalized expressions against live model values.

use super::{Expression, Operator, Predicate};
use crate::path::Path;
use ahash::AHashMap;
use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;

/// A host-supplied comparison operator. A custom operator registered under the
/// same name as a built-in takes precedence over it.
pub trait CustomOperator: Send + Sync {
    /// The raw expression key this operator answers to.
    fn name(&self) -> &str;

    /// Applies the operator to the current model value at `path` against the
    /// expression literal. `model` reads any other model value, so an operator
    /// can compare against sibling fields.
    fn apply(
        &self,
        current: &Value,
        literal: &Value,
        path: &Path,
        model: &dyn Fn(&Path) -> Value,
    ) -> bool;
}

/// Registry of host-supplied operators, keyed by expression key.
#[derive(Default)]
pub struct OperatorRegistry {
    operators: AHashMap<String, Box<dyn CustomOperator>>,
}

impl OperatorRegistry {
    pub fn new() -> OperatorRegistry {
        OperatorRegistry::default()
    }

    pub fn register(&mut self, operator: Box<dyn CustomOperator>) {
        self.operators.insert(operator.name().to_string(), operator);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CustomOperator> {
        self.operators.get(name).map(Box::as_ref)
    }
}

/// Evaluates an expression. `get_value` reads the current model value for a
/// comparison path. Predicates with an operator that is neither built-in nor
/// registered evaluate to `false` (the condition fails closed), never panic.
pub fn evaluate<F>(expr: &Expression, get_value: &F, custom: &OperatorRegistry) -> bool
where
    F: Fn(&Path) -> Value + ?Sized,
{
    match expr {
        Expression::And(subs) => subs.iter().all(|s| evaluate(s, get_value, custom)),
        Expression::Or(subs) => subs.iter().any(|s| evaluate(s, get_value, custom)),
        Expression::Nor(subs) => !subs.iter().any(|s| evaluate(s, get_value, custom)),
        Expression::Not(sub) => !evaluate(sub, get_value, custom),
        Expression::Predicate(predicate) => {
            let current = get_value(&predicate.path);
            if let Some(op) = custom.get(predicate.op.as_str()) {
                return op.apply(&current, &predicate.literal, &predicate.path, &|p| {
                    get_value(p)
                });
            }
            apply_builtin(predicate, &current)
        }
    }
}

fn apply_builtin(predicate: &Predicate, current: &Value) -> bool {
    let literal = &predicate.literal;
    match &predicate.op {
        Operator::Eq => loose_eq(current, literal),
        Operator::Ne => !loose_eq(current, literal),
        Operator::Equal => current == literal,
        Operator::Regex => regex_test(current, literal),
        Operator::Text => text_search(current, literal),
        Operator::Lt => ordered(current, literal, Ordering::is_lt),
        Operator::Lte => ordered(current, literal, Ordering::is_le),
        Operator::Gt => ordered(current, literal, Ordering::is_gt),
        Operator::Gte => ordered(current, literal, Ordering::is_ge),
        Operator::In => literal
            .as_array()
            .is_some_and(|items| items.contains(current)),
        Operator::Nin => literal
            .as_array()
            .is_some_and(|items| !items.contains(current)),
        Operator::Custom(_) => false,
    }
}

/// String form used for regex and substring operators: bare strings are taken
/// as-is, everything else renders as JSON, `null` as the empty string.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Loose, coercing equality: structural equality, or numeric equality after
/// coercion when at least one side is not a string. Two strings never compare
/// numerically ("1" and "01" stay different).
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_string() && b.is_string() {
        return false;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Ordered comparison: numeric when both sides coerce to numbers, otherwise
/// lexicographic on the stringified forms. `null` on either side never
/// satisfies an ordering.
fn ordered(a: &Value, b: &Value, accept: fn(Ordering) -> bool) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).is_some_and(accept),
        _ => accept(stringify(a).cmp(&stringify(b))),
    }
}

fn regex_test(current: &Value, literal: &Value) -> bool {
    let Some(pattern) = literal.as_str() else {
        return false;
    };
    // Patterns are validated at parse time; a host-constructed expression with
    // a broken pattern still fails closed here.
    RegexBuilder::new(pattern)
        .build()
        .is_ok_and(|re| re.is_match(&stringify(current)))
}

/// Case-insensitive substring search of the literal within the stringified
/// value. An empty or falsy literal always matches.
fn text_search(current: &Value, literal: &Value) -> bool {
    let needle = match literal {
        Value::Null | Value::Bool(false) => return true,
        other => stringify(other),
    };
    if needle.is_empty() {
        return true;
    }
    stringify(current)
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

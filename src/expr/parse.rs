//! One-time normalization of raw JSON expressions into the typed tree.
//!
//! A raw expression is a JSON object. Keys drawn from `{and, or, nor, not}`
//! form composite nodes; any other key is treated as an operator whose operand
//! maps comparison paths to literals. `otherwise` and `dependencies` are
//! metadata and never evaluated. An object carrying several operator keys, or
//! an operand carrying several comparison paths, is an implicit `and`.

use super::{Expression, Operator, Otherwise, Predicate, WhenClause};
use crate::error::SchemaError;
use crate::path::Path;
use regex::Regex;
use serde_json::Value;

const COMPOSITE_KEYS: [&str; 4] = ["and", "or", "nor", "not"];
const META_KEYS: [&str; 2] = ["otherwise", "dependencies"];

/// True iff the expression's top-level keys (metadata aside) are all composite
/// connectives.
pub fn is_composite(raw: &Value) -> bool {
    operator_keys(raw).is_some_and(|mut keys| keys.all(|k| COMPOSITE_KEYS.contains(&k.as_str())))
}

/// True iff the expression's top-level keys (metadata aside) are all operator
/// keys. Unrecognized names count as (possibly host-registered) operators;
/// unregistered ones simply evaluate to `false`.
pub fn is_primitive(raw: &Value) -> bool {
    operator_keys(raw).is_some_and(|mut keys| keys.all(|k| !COMPOSITE_KEYS.contains(&k.as_str())))
}

fn operator_keys(raw: &Value) -> Option<impl Iterator<Item = &String>> {
    let object = raw.as_object()?;
    let mut keys = object.keys().filter(|k| !META_KEYS.contains(&k.as_str()));
    keys.next().is_some().then(|| {
        object
            .keys()
            .filter(|k| !META_KEYS.contains(&k.as_str()))
    })
}

/// Parses a full `when` clause: the expression body plus `otherwise` and
/// `dependencies` metadata. `at` names the owning field for error reporting.
pub fn parse_when(raw: &Value, at: &Path) -> Result<WhenClause, SchemaError> {
    let object = raw.as_object().ok_or_else(|| invalid(at, "expression must be a JSON object"))?;

    let otherwise = match object.get("otherwise") {
        None => Otherwise::default(),
        Some(directives) => {
            let map = directives
                .as_object()
                .ok_or_else(|| invalid(at, "'otherwise' must be an object"))?;
            Otherwise {
                unset: map.get("unset").and_then(Value::as_bool).unwrap_or(false),
            }
        }
    };

    let extra_dependencies = match object.get("dependencies") {
        None => Vec::new(),
        Some(deps) => deps
            .as_array()
            .ok_or_else(|| invalid(at, "'dependencies' must be an array of paths"))?
            .iter()
            .map(|d| {
                d.as_str()
                    .map(Path::parse)
                    .ok_or_else(|| invalid(at, "'dependencies' entries must be strings"))
            })
            .collect::<Result<_, _>>()?,
    };

    Ok(WhenClause {
        expr: parse_expression(raw, at)?,
        otherwise,
        extra_dependencies,
    })
}

/// Parses an expression body, ignoring metadata keys.
pub fn parse_expression(raw: &Value, at: &Path) -> Result<Expression, SchemaError> {
    let object = raw.as_object().ok_or_else(|| invalid(at, "expression must be a JSON object"))?;

    let mut clauses = Vec::new();
    for (key, operand) in object {
        if META_KEYS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            "and" => clauses.push(Expression::And(parse_list(operand, at, "and")?)),
            "or" => clauses.push(Expression::Or(parse_list(operand, at, "or")?)),
            "nor" => clauses.push(Expression::Nor(parse_list(operand, at, "nor")?)),
            "not" => clauses.push(Expression::Not(Box::new(parse_expression(operand, at)?))),
            op_key => parse_predicates(op_key, operand, at, &mut clauses)?,
        }
    }

    match clauses.len() {
        0 => Err(invalid(at, "expression has no operator keys")),
        1 => Ok(clauses.remove(0)),
        _ => Ok(Expression::And(clauses)),
    }
}

fn parse_list(operand: &Value, at: &Path, key: &str) -> Result<Vec<Expression>, SchemaError> {
    let items = operand
        .as_array()
        .ok_or_else(|| invalid(at, &format!("'{}' requires an array of sub-expressions", key)))?;
    if items.is_empty() {
        return Err(invalid(at, &format!("'{}' requires at least one sub-expression", key)));
    }
    items.iter().map(|item| parse_expression(item, at)).collect()
}

fn parse_predicates(
    op_key: &str,
    operand: &Value,
    at: &Path,
    clauses: &mut Vec<Expression>,
) -> Result<(), SchemaError> {
    let op = Operator::from_key(op_key).unwrap_or_else(|| Operator::Custom(op_key.to_string()));

    let comparisons = operand.as_object().ok_or_else(|| {
        invalid(
            at,
            &format!("operand of '{}' must map comparison paths to literals", op_key),
        )
    })?;
    if comparisons.is_empty() {
        return Err(invalid(at, &format!("operand of '{}' names no comparison path", op_key)));
    }

    for (raw_path, literal) in comparisons {
        validate_literal(&op, literal, at)?;
        clauses.push(Expression::Predicate(Predicate {
            op: op.clone(),
            path: Path::parse(raw_path),
            literal: literal.clone(),
        }));
    }
    Ok(())
}

/// Shape checks that fail fast at configuration time instead of silently at
/// evaluation time.
fn validate_literal(op: &Operator, literal: &Value, at: &Path) -> Result<(), SchemaError> {
    match op {
        Operator::In | Operator::Nin if !literal.is_array() => Err(invalid(
            at,
            &format!("'{}' requires an array literal, found {}", op, literal),
        )),
        Operator::Regex => {
            let pattern = literal
                .as_str()
                .ok_or_else(|| invalid(at, "'regex' requires a string literal"))?;
            Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| invalid(at, &format!("'regex' pattern does not compile: {}", e)))
        }
        _ => Ok(()),
    }
}

fn invalid(at: &Path, message: &str) -> SchemaError {
    SchemaError::InvalidExpression {
        path: at.clone(),
        message: message.to_string(),
    }
}

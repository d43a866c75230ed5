//! Boolean `when` expressions.
//!
//! Raw expressions arrive as JSON and are normalized exactly once into the
//! typed tree in this module; evaluation never re-discovers operator keys.
//! See [`parse`] for the normalization pass and [`eval`] for evaluation.

use crate::path::{Path, Segment};
use itertools::Itertools;
use serde_json::Value;
use std::fmt;

pub mod eval;
pub mod parse;

pub use eval::{CustomOperator, OperatorRegistry, evaluate};

/// A comparison operator applied by a [`Predicate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Loose (coercing) equality.
    Eq,
    /// Loose (coercing) inequality.
    Ne,
    /// Deep structural equality.
    Equal,
    /// Regular expression test against the stringified value.
    Regex,
    /// Case-insensitive substring search; an empty literal always matches.
    Text,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Membership in an array literal.
    In,
    /// Absence from an array literal.
    Nin,
    /// A host-registered operator. Unregistered names evaluate to `false`.
    Custom(String),
}

impl Operator {
    /// Maps a raw expression key to a built-in operator.
    pub fn from_key(key: &str) -> Option<Operator> {
        match key {
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "equal" => Some(Operator::Equal),
            "regex" => Some(Operator::Regex),
            "text" => Some(Operator::Text),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "in" => Some(Operator::In),
            "nin" => Some(Operator::Nin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Equal => "equal",
            Operator::Regex => "regex",
            Operator::Text => "text",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Custom(name) => name,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single normalized comparison: `value at path <op> literal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub op: Operator,
    pub path: Path,
    pub literal: Value,
}

/// The normalized boolean expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Nor(Vec<Expression>),
    Not(Box<Expression>),
    Predicate(Predicate),
}

impl Expression {
    /// Collects every comparison path referenced by a predicate, in first-seen
    /// order without duplicates.
    pub fn dependency_paths(&self) -> Vec<Path> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths.into_iter().unique().collect()
    }

    fn collect_paths(&self, paths: &mut Vec<Path>) {
        match self {
            Expression::And(subs) | Expression::Or(subs) | Expression::Nor(subs) => {
                for sub in subs {
                    sub.collect_paths(paths);
                }
            }
            Expression::Not(sub) => sub.collect_paths(paths),
            Expression::Predicate(predicate) => paths.push(predicate.path.clone()),
        }
    }

    /// Rewrites every predicate's comparison path, replacing wildcard segments
    /// left-to-right with the given captures.
    pub fn substitute(&self, captures: &[Segment]) -> Expression {
        match self {
            Expression::And(subs) => {
                Expression::And(subs.iter().map(|s| s.substitute(captures)).collect())
            }
            Expression::Or(subs) => {
                Expression::Or(subs.iter().map(|s| s.substitute(captures)).collect())
            }
            Expression::Nor(subs) => {
                Expression::Nor(subs.iter().map(|s| s.substitute(captures)).collect())
            }
            Expression::Not(sub) => Expression::Not(Box::new(sub.substitute(captures))),
            Expression::Predicate(predicate) => Expression::Predicate(Predicate {
                op: predicate.op.clone(),
                path: predicate.path.substitute(captures),
                literal: predicate.literal.clone(),
            }),
        }
    }
}

/// Side-effect directives attached to a `when` expression, applied when the
/// expression stops holding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Otherwise {
    /// Clear the underlying model value when the field becomes hidden.
    pub unset: bool,
}

/// A `when` expression together with its non-evaluated metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub expr: Expression,
    pub otherwise: Otherwise,
    /// Extra paths to watch beyond those referenced by the expression body.
    pub extra_dependencies: Vec<Path>,
}

impl WhenClause {
    /// All watched paths: predicate paths plus explicit extras, deduplicated
    /// in first-seen order.
    pub fn dependency_paths(&self) -> Vec<Path> {
        self.expr
            .dependency_paths()
            .into_iter()
            .chain(self.extra_dependencies.iter().cloned())
            .unique()
            .collect()
    }
}

//! Boolean filter expressions produced for query-time evaluation
//!
//! A filter is a tree of `eq`/`in` predicates over record fields, combined
//! with `and`/`or`. Predicate values are the caller's claim values, bound
//! when the filter is compiled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter expression tree
///
/// Field comparison semantics against a JSON record:
/// - `Eq`: a scalar field equals `value`; a list field contains `value`
/// - `In`: a scalar field is one of `values`; a list field shares at least
///   one element with `values`
/// - missing and `null` fields never match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpr {
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
    And { operands: Vec<FilterExpr> },
    Or { operands: Vec<FilterExpr> },
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn in_list<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterExpr::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `or` over the operands; `None` when there are none, the operand itself
    /// when there is exactly one
    pub fn any_of(mut operands: Vec<FilterExpr>) -> Option<Self> {
        match operands.len() {
            0 => None,
            1 => operands.pop(),
            _ => Some(FilterExpr::Or { operands }),
        }
    }

    /// `and` over the operands, collapsing like [`FilterExpr::any_of`]
    pub fn all_of(mut operands: Vec<FilterExpr>) -> Option<Self> {
        match operands.len() {
            0 => None,
            1 => operands.pop(),
            _ => Some(FilterExpr::And { operands }),
        }
    }

    /// Narrows `caller_filter` by `auth_filter`
    ///
    /// The result accepts a record only when both inputs accept it.
    pub fn intersect(caller_filter: Option<FilterExpr>, auth_filter: FilterExpr) -> FilterExpr {
        match caller_filter {
            Some(caller) => FilterExpr::And {
                operands: vec![caller, auth_filter],
            },
            None => auth_filter,
        }
    }

    /// Number of leaf predicates
    pub fn clause_count(&self) -> usize {
        match self {
            FilterExpr::Eq { .. } | FilterExpr::In { .. } => 1,
            FilterExpr::And { operands } | FilterExpr::Or { operands } => {
                operands.iter().map(FilterExpr::clause_count).sum()
            }
        }
    }

    /// Evaluates the filter against a JSON record
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        match self {
            FilterExpr::Eq { field, value } => field_values(record, field)
                .iter()
                .any(|candidate| candidate == value),
            FilterExpr::In { field, values } => field_values(record, field)
                .iter()
                .any(|candidate| values.contains(candidate)),
            FilterExpr::And { operands } => operands.iter().all(|op| op.matches(record)),
            FilterExpr::Or { operands } => operands.iter().any(|op| op.matches(record)),
        }
    }
}

/// String forms of a record field: one entry for a scalar, one per element
/// for a list
fn field_values(record: &serde_json::Value, field: &str) -> Vec<String> {
    match record.get(field) {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(value) => scalar_string(value).into_iter().collect(),
    }
}

fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Eq { field, value } => write!(f, "{} eq {:?}", field, value),
            FilterExpr::In { field, values } => write!(f, "{} in {:?}", field, values),
            FilterExpr::And { operands } => write_joined(f, operands, " and "),
            FilterExpr::Or { operands } => write_joined(f, operands, " or "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[FilterExpr], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", operand)?;
    }
    write!(f, ")")
}

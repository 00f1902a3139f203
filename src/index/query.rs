//! Structured field queries
//!
//! Field strategies describe how a value should be matched; the index adapter
//! turns these into engine queries. There is deliberately no text grammar here.

use serde::Serialize;

/// A structured query against materialized fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "query", rename_all = "snake_case")]
pub enum FieldQuery {
    /// Exact term match on an untokenized field
    Term { field: String, value: String },
    /// Full-text match on an analyzed field
    Text { field: String, text: String },
    /// Inclusive integer range; `None` leaves the side open
    Int64Range {
        field: String,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Inclusive float range; `None` leaves the side open
    Float64Range {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// At least one clause must match
    Any(Vec<FieldQuery>),
    /// Every clause must match
    All(Vec<FieldQuery>),
    /// Matches nothing (field excluded from the index)
    MatchNone,
}

impl FieldQuery {
    #[must_use]
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        FieldQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn text(field: impl Into<String>, text: impl Into<String>) -> Self {
        FieldQuery::Text {
            field: field.into(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn int64_eq(field: impl Into<String>, value: i64) -> Self {
        FieldQuery::Int64Range {
            field: field.into(),
            min: Some(value),
            max: Some(value),
        }
    }

    #[must_use]
    pub fn float64_eq(field: impl Into<String>, value: f64) -> Self {
        FieldQuery::Float64Range {
            field: field.into(),
            min: Some(value),
            max: Some(value),
        }
    }

    /// Collapse single-clause and empty combinators
    #[must_use]
    pub fn simplify(self) -> Self {
        match self {
            FieldQuery::Any(mut clauses) | FieldQuery::All(mut clauses) if clauses.len() == 1 => {
                clauses.remove(0).simplify()
            }
            FieldQuery::Any(clauses) if clauses.is_empty() => FieldQuery::MatchNone,
            FieldQuery::Any(clauses) => {
                FieldQuery::Any(clauses.into_iter().map(FieldQuery::simplify).collect())
            }
            FieldQuery::All(clauses) => {
                FieldQuery::All(clauses.into_iter().map(FieldQuery::simplify).collect())
            }
            other => other,
        }
    }
}

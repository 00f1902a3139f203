//! Field strategies: how a value becomes index fields and queries
//!
//! A small closed set of strategies is selected per (content type, field path)
//! through [`StrategyRegistry`]. Anything not configured uses [`DefaultStrategy`].

use ahash::AHashMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::{JsonValue, date_ticks, format_timespan, timespan_ticks};
use crate::index::FieldQuery;
use crate::schema::{FieldEncoding, ValueKind};

/// Term indexed for null values
pub const NULL_SENTINEL: &str = "$$NULL$$";

/// Sub-field suffix holding array element counts
pub const COUNT_SUFFIX: &str = "@count";

/// Sub-field suffix holding date and time span ticks
pub const TICKS_SUFFIX: &str = "@ticks";

/// Value carried by an index field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    I64(i64),
    F64(f64),
}

/// A single index-native field produced from a JSON value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexField {
    pub name: String,
    pub kind: ValueKind,
    pub encoding: FieldEncoding,
    pub value: FieldValue,
}

impl IndexField {
    #[must_use]
    pub fn exact(name: impl Into<String>, kind: ValueKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            encoding: FieldEncoding::Exact,
            value: FieldValue::Text(value.into()),
        }
    }

    #[must_use]
    pub fn analyzed(name: impl Into<String>, kind: ValueKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            encoding: FieldEncoding::Analyzed,
            value: FieldValue::Text(value.into()),
        }
    }

    #[must_use]
    pub fn int64(name: impl Into<String>, kind: ValueKind, value: i64) -> Self {
        Self {
            name: name.into(),
            kind,
            encoding: FieldEncoding::Int64,
            value: FieldValue::I64(value),
        }
    }

    #[must_use]
    pub fn float64(name: impl Into<String>, kind: ValueKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            encoding: FieldEncoding::Float64,
            value: FieldValue::F64(value),
        }
    }
}

#[inline]
fn sub_field(name: &str, suffix: &str) -> String {
    format!("{name}.{suffix}")
}

/// Canonical exact-match text for a leaf value, if it has one
#[must_use]
pub fn canonical_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Integer(i) => Some(i.to_string()),
        JsonValue::Float(f) => Some(f.to_string()),
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Date(date) => Some(date.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
        JsonValue::TimeSpan(span) => Some(format_timespan(span)),
        JsonValue::Null => Some(NULL_SENTINEL.to_string()),
        JsonValue::Guid(guid) => Some(guid.hyphenated().to_string()),
        JsonValue::Uri(uri) => Some(uri.as_str().to_string()),
        JsonValue::Bytes(bytes) => Some(BASE64.encode(bytes)),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Converts values into index fields and matching queries
pub trait FieldStrategy: Send + Sync + fmt::Debug {
    /// Name recorded as the materializer type of every shape this strategy emits
    fn name(&self) -> &'static str;

    /// Fields for the value at `name`; containers are walked by the caller
    fn create_fields(&self, name: &str, value: &JsonValue) -> Vec<IndexField>;

    /// Query matching documents whose `name` holds `value`
    fn build_query(&self, name: &str, value: &JsonValue) -> FieldQuery;

    /// When true, neither the value nor anything nested below it is indexed
    fn excludes_subtree(&self) -> bool {
        false
    }
}

/// Picks encodings by value kind
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStrategy;

impl FieldStrategy for DefaultStrategy {
    fn name(&self) -> &'static str {
        "default"
    }

    fn create_fields(&self, name: &str, value: &JsonValue) -> Vec<IndexField> {
        let kind = value.kind();
        match value {
            JsonValue::Integer(i) => vec![IndexField::int64(name, kind, *i)],
            JsonValue::Float(f) => vec![IndexField::float64(name, kind, *f)],
            JsonValue::String(s) => vec![
                IndexField::exact(name, kind, s.as_str()),
                IndexField::analyzed(name, kind, s.as_str()),
            ],
            JsonValue::Uri(uri) => vec![
                IndexField::exact(name, kind, uri.as_str()),
                IndexField::analyzed(name, kind, uri.as_str()),
            ],
            JsonValue::Bool(b) => vec![IndexField::exact(name, kind, b.to_string())],
            JsonValue::Guid(guid) => {
                vec![IndexField::exact(name, kind, guid.hyphenated().to_string())]
            }
            JsonValue::Date(date) => {
                let mut fields = Vec::with_capacity(7);
                if let Some(text) = canonical_text(value) {
                    fields.push(IndexField::exact(name, kind, text));
                }
                fields.extend([
                    IndexField::int64(sub_field(name, "@year"), kind, i64::from(date.year())),
                    IndexField::int64(sub_field(name, "@month"), kind, i64::from(date.month())),
                    IndexField::int64(sub_field(name, "@day"), kind, i64::from(date.day())),
                    IndexField::int64(sub_field(name, "@hour"), kind, i64::from(date.hour())),
                    IndexField::int64(sub_field(name, "@minute"), kind, i64::from(date.minute())),
                    IndexField::int64(sub_field(name, TICKS_SUFFIX), kind, date_ticks(date)),
                ]);
                fields
            }
            JsonValue::TimeSpan(span) => vec![
                IndexField::exact(name, kind, format_timespan(span)),
                IndexField::int64(sub_field(name, TICKS_SUFFIX), kind, timespan_ticks(span)),
                IndexField::int64(sub_field(name, "@days"), kind, span.num_days()),
                IndexField::int64(sub_field(name, "@hours"), kind, span.num_hours() % 24),
                IndexField::int64(sub_field(name, "@minutes"), kind, span.num_minutes() % 60),
            ],
            JsonValue::Null => vec![IndexField::exact(name, kind, NULL_SENTINEL)],
            JsonValue::Bytes(bytes) => vec![IndexField::exact(name, kind, BASE64.encode(bytes))],
            JsonValue::Array(items) => vec![IndexField::int64(
                sub_field(name, COUNT_SUFFIX),
                kind,
                items.len() as i64,
            )],
            JsonValue::Object(_) => Vec::new(),
        }
    }

    fn build_query(&self, name: &str, value: &JsonValue) -> FieldQuery {
        match value {
            JsonValue::Integer(i) => FieldQuery::int64_eq(name, *i),
            JsonValue::Float(f) => FieldQuery::float64_eq(name, *f),
            JsonValue::String(s) => FieldQuery::Any(vec![
                FieldQuery::term(name, s.as_str()),
                FieldQuery::text(name, s.as_str()),
            ]),
            JsonValue::Uri(uri) => FieldQuery::term(name, uri.as_str()),
            JsonValue::Date(date) => FieldQuery::int64_eq(sub_field(name, TICKS_SUFFIX), date_ticks(date)),
            JsonValue::TimeSpan(span) => {
                FieldQuery::int64_eq(sub_field(name, TICKS_SUFFIX), timespan_ticks(span))
            }
            JsonValue::Bool(_) | JsonValue::Guid(_) | JsonValue::Null | JsonValue::Bytes(_) => {
                match canonical_text(value) {
                    Some(text) => FieldQuery::term(name, text),
                    None => FieldQuery::MatchNone,
                }
            }
            JsonValue::Array(items) => FieldQuery::Any(
                items
                    .iter()
                    .map(|item| self.build_query(name, item))
                    .collect(),
            )
            .simplify(),
            JsonValue::Object(props) => FieldQuery::All(
                props
                    .iter()
                    .map(|(key, item)| self.build_query(&sub_field(name, key), item))
                    .collect(),
            )
            .simplify(),
        }
    }
}

/// Indexes every leaf as a single exact term
#[derive(Debug, Default, Clone, Copy)]
pub struct TermStrategy;

impl FieldStrategy for TermStrategy {
    fn name(&self) -> &'static str {
        "term"
    }

    fn create_fields(&self, name: &str, value: &JsonValue) -> Vec<IndexField> {
        match canonical_text(value) {
            Some(text) => vec![IndexField::exact(name, value.kind(), text)],
            None => DefaultStrategy.create_fields(name, value),
        }
    }

    fn build_query(&self, name: &str, value: &JsonValue) -> FieldQuery {
        match canonical_text(value) {
            Some(text) => FieldQuery::term(name, text),
            None => DefaultStrategy.build_query(name, value),
        }
    }
}

/// Indexes leaves as numbers, parsing numeric strings and reducing
/// dates and time spans to their ticks
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericStrategy;

impl NumericStrategy {
    fn numeric(value: &JsonValue) -> Option<FieldValue> {
        match value {
            JsonValue::Integer(i) => Some(FieldValue::I64(*i)),
            JsonValue::Float(f) => Some(FieldValue::F64(*f)),
            JsonValue::Bool(b) => Some(FieldValue::I64(i64::from(*b))),
            JsonValue::Date(date) => Some(FieldValue::I64(date_ticks(date))),
            JsonValue::TimeSpan(span) => Some(FieldValue::I64(timespan_ticks(span))),
            JsonValue::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .map(FieldValue::I64)
                    .or_else(|_| trimmed.parse::<f64>().map(FieldValue::F64))
                    .ok()
            }
            JsonValue::Null
            | JsonValue::Guid(_)
            | JsonValue::Uri(_)
            | JsonValue::Bytes(_)
            | JsonValue::Array(_)
            | JsonValue::Object(_) => None,
        }
    }
}

impl FieldStrategy for NumericStrategy {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn create_fields(&self, name: &str, value: &JsonValue) -> Vec<IndexField> {
        match Self::numeric(value) {
            Some(FieldValue::I64(i)) => vec![IndexField::int64(name, value.kind(), i)],
            Some(FieldValue::F64(f)) => vec![IndexField::float64(name, value.kind(), f)],
            Some(FieldValue::Text(_)) | None => DefaultStrategy.create_fields(name, value),
        }
    }

    fn build_query(&self, name: &str, value: &JsonValue) -> FieldQuery {
        match Self::numeric(value) {
            Some(FieldValue::I64(i)) => FieldQuery::int64_eq(name, i),
            Some(FieldValue::F64(f)) => FieldQuery::float64_eq(name, f),
            Some(FieldValue::Text(_)) | None => DefaultStrategy.build_query(name, value),
        }
    }
}

/// Excludes a field and everything nested below it from the index
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStrategy;

impl FieldStrategy for NullStrategy {
    fn name(&self) -> &'static str {
        "null"
    }

    fn create_fields(&self, _name: &str, _value: &JsonValue) -> Vec<IndexField> {
        Vec::new()
    }

    fn build_query(&self, _name: &str, _value: &JsonValue) -> FieldQuery {
        FieldQuery::MatchNone
    }

    fn excludes_subtree(&self) -> bool {
        true
    }
}

static DEFAULT_STRATEGY: DefaultStrategy = DefaultStrategy;
static TERM_STRATEGY: TermStrategy = TermStrategy;
static NUMERIC_STRATEGY: NumericStrategy = NumericStrategy;
static NULL_STRATEGY: NullStrategy = NullStrategy;

/// Configurable strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Default,
    Term,
    Numeric,
    Null,
}

impl StrategyKind {
    #[must_use]
    pub fn strategy(self) -> &'static dyn FieldStrategy {
        match self {
            StrategyKind::Default => &DEFAULT_STRATEGY,
            StrategyKind::Term => &TERM_STRATEGY,
            StrategyKind::Numeric => &NUMERIC_STRATEGY,
            StrategyKind::Null => &NULL_STRATEGY,
        }
    }
}

/// Configuration rule binding a field path to a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRule {
    /// Restrict the rule to one content type; `None` applies to all
    #[serde(default)]
    pub content_type: Option<String>,
    pub field: String,
    pub strategy: StrategyKind,
}

/// Resolves the strategy for a field path
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    scoped: AHashMap<(String, String), StrategyKind>,
    global: AHashMap<String, StrategyKind>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_rules(rules: &[StrategyRule]) -> Self {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule.content_type.as_deref(), &rule.field, rule.strategy);
        }
        registry
    }

    pub fn register(&mut self, content_type: Option<&str>, field: &str, strategy: StrategyKind) {
        match content_type {
            Some(content_type) => {
                self.scoped
                    .insert((content_type.to_string(), field.to_string()), strategy);
            }
            None => {
                self.global.insert(field.to_string(), strategy);
            }
        }
    }

    /// Content-type scoped rules win over global rules
    #[must_use]
    pub fn kind_for(&self, content_type: &str, field: &str) -> StrategyKind {
        if !self.scoped.is_empty()
            && let Some(kind) = self
                .scoped
                .get(&(content_type.to_string(), field.to_string()))
        {
            return *kind;
        }
        self.global.get(field).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn resolve(&self, content_type: &str, field: &str) -> &'static dyn FieldStrategy {
        self.kind_for(content_type, field).strategy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::value::parse_timespan;
    use chrono::{TimeZone, Utc};

    #[test]
    fn strings_get_exact_and_analyzed_fields() {
        let fields = DefaultStrategy.create_fields("title", &JsonValue::String("Hello World".into()));
        let encodings: Vec<_> = fields.iter().map(|f| f.encoding).collect();
        assert_eq!(encodings, vec![FieldEncoding::Exact, FieldEncoding::Analyzed]);
    }

    #[test]
    fn dates_get_derived_numeric_fields() {
        let date = Utc.with_ymd_and_hms(2023, 7, 14, 9, 30, 0).single().expect("date");
        let fields = DefaultStrategy.create_fields("created", &JsonValue::Date(date));
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "created",
                "created.@year",
                "created.@month",
                "created.@day",
                "created.@hour",
                "created.@minute",
                "created.@ticks"
            ]
        );
        assert_eq!(fields[1].value, FieldValue::I64(2023));
        assert!(fields.iter().all(|f| f.kind == ValueKind::Date));
    }

    #[test]
    fn timespans_get_ticks() {
        let span = parse_timespan("01:00:00").expect("span");
        let fields = DefaultStrategy.create_fields("duration", &JsonValue::TimeSpan(span));
        assert!(fields.contains(&IndexField::int64(
            "duration.@ticks",
            ValueKind::TimeSpan,
            36_000_000_000
        )));
    }

    #[test]
    fn nulls_use_sentinel() {
        let fields = DefaultStrategy.create_fields("owner", &JsonValue::Null);
        assert_eq!(fields, vec![IndexField::exact("owner", ValueKind::Null, NULL_SENTINEL)]);
    }

    #[test]
    fn numeric_strategy_parses_strings() {
        let fields = NumericStrategy.create_fields("amount", &JsonValue::String(" 42 ".into()));
        assert_eq!(fields, vec![IndexField::int64("amount", ValueKind::String, 42)]);
        assert_eq!(
            NumericStrategy.build_query("amount", &JsonValue::String("2.5".into())),
            FieldQuery::float64_eq("amount", 2.5)
        );
    }

    #[test]
    fn registry_prefers_scoped_rules() {
        let registry = StrategyRegistry::from_rules(&[
            StrategyRule {
                content_type: None,
                field: "code".into(),
                strategy: StrategyKind::Term,
            },
            StrategyRule {
                content_type: Some("order".into()),
                field: "code".into(),
                strategy: StrategyKind::Numeric,
            },
        ]);

        assert_eq!(registry.resolve("order", "code").name(), "numeric");
        assert_eq!(registry.resolve("invoice", "code").name(), "term");
        assert_eq!(registry.resolve("invoice", "other").name(), "default");
    }

    #[test]
    fn object_queries_combine_children() {
        let value = JsonValue::Object(vec![
            ("a".into(), JsonValue::Integer(1)),
            ("b".into(), JsonValue::Bool(true)),
        ]);
        assert_eq!(
            DefaultStrategy.build_query("root", &value),
            FieldQuery::All(vec![
                FieldQuery::int64_eq("root.a", 1),
                FieldQuery::term("root.b", "true"),
            ])
        );
    }
}

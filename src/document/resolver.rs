//! Identity and content-type resolution
//!
//! Deployments decide where a document keeps its identity and content type.
//! The path is either dotted (walks nested objects) or a direct property name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;

use crate::errors::{IndexError, IndexResult};

/// Identity key of a document: the identity field name plus its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityTerm {
    pub field: String,
    pub value: String,
}

impl IdentityTerm {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for IdentityTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.value)
    }
}

/// How field paths are looked up in a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// `a.b.c` walks nested objects
    #[default]
    Dotted,
    /// The path is a single property name, dots included
    Direct,
}

/// Derives the content type and identity of a JSON document
pub trait FieldResolver: Send + Sync + fmt::Debug {
    fn content_type(&self, document: &Map<String, Value>) -> IndexResult<String>;

    fn identity(&self, document: &Map<String, Value>) -> IndexResult<IdentityTerm>;
}

/// Path-based resolver driven by configuration
#[derive(Debug, Clone)]
pub struct PathFieldResolver {
    identity_field: String,
    content_type_field: String,
    default_content_type: Option<String>,
    mode: ResolutionMode,
}

impl PathFieldResolver {
    #[must_use]
    pub fn new(
        identity_field: impl Into<String>,
        content_type_field: impl Into<String>,
        mode: ResolutionMode,
    ) -> Self {
        Self {
            identity_field: identity_field.into(),
            content_type_field: content_type_field.into(),
            default_content_type: None,
            mode,
        }
    }

    /// Content type used when a document does not carry one
    #[must_use]
    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    #[must_use]
    pub fn content_type_field(&self) -> &str {
        &self.content_type_field
    }

    fn find<'a>(&self, document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
        match self.mode {
            ResolutionMode::Direct => document.get(path),
            ResolutionMode::Dotted => {
                let segments: SmallVec<[&str; 4]> = path.split('.').collect();
                let (last, parents) = segments.split_last()?;
                let mut current = document;
                for segment in parents {
                    current = current.get(*segment)?.as_object()?;
                }
                current.get(*last)
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl FieldResolver for PathFieldResolver {
    fn content_type(&self, document: &Map<String, Value>) -> IndexResult<String> {
        let found = self
            .find(document, &self.content_type_field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        found
            .or_else(|| self.default_content_type.clone())
            .ok_or_else(|| IndexError::ContentTypeMissing {
                field: self.content_type_field.clone(),
            })
    }

    fn identity(&self, document: &Map<String, Value>) -> IndexResult<IdentityTerm> {
        self.find(document, &self.identity_field)
            .and_then(scalar_text)
            .map(|value| IdentityTerm::new(self.identity_field.as_str(), value))
            .ok_or_else(|| IndexError::IdentityMissing {
                field: self.identity_field.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn dotted_paths_walk_nested_objects() {
        let resolver = PathFieldResolver::new("meta.id", "meta.type", ResolutionMode::Dotted);
        let doc = object(json!({ "meta": { "id": 7, "type": "order" } }));

        assert_eq!(resolver.identity(&doc).ok(), Some(IdentityTerm::new("meta.id", "7")));
        assert_eq!(resolver.content_type(&doc).ok().as_deref(), Some("order"));
    }

    #[test]
    fn direct_paths_use_the_literal_key() {
        let resolver = PathFieldResolver::new("$id", "$type", ResolutionMode::Direct);
        let doc = object(json!({ "$id": "abc", "$type": "note" }));
        assert_eq!(resolver.identity(&doc).ok(), Some(IdentityTerm::new("$id", "abc")));

        let dotted = PathFieldResolver::new("a.b", "t", ResolutionMode::Direct);
        let doc = object(json!({ "a.b": "x", "t": "y" }));
        assert_eq!(dotted.identity(&doc).ok().map(|t| t.value), Some("x".to_string()));
    }

    #[test]
    fn missing_values_are_reported() {
        let resolver = PathFieldResolver::new("id", "contentType", ResolutionMode::Dotted);
        let doc = object(json!({ "id": "  " }));

        assert!(matches!(resolver.identity(&doc), Err(IndexError::IdentityMissing { .. })));
        assert!(matches!(
            resolver.content_type(&doc),
            Err(IndexError::ContentTypeMissing { .. })
        ));

        let with_default = resolver.with_default_content_type("document");
        assert_eq!(with_default.content_type(&doc).ok().as_deref(), Some("document"));
    }
}

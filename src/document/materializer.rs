//! JSON document to index field materialization
//!
//! Walks every value of a document, asks the configured strategy for the
//! fields of each node, records the resulting shapes in the schema tracker
//! and produces an immutable [`DocumentEntry`].

use serde::Serialize;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::collector::BlockingCollector;
use super::resolver::{FieldResolver, IdentityTerm};
use super::strategy::{IndexField, StrategyRegistry};
use super::value::{ClassifyOptions, JsonValue};
use crate::errors::{IndexError, IndexResult, panic_message};
use crate::reporting::ErrorCollector;
use crate::schema::{FieldEncoding, FieldInfoCollection, FieldInfoEntry, SchemaTracker};

/// Index-ready output of materializing one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentEntry {
    identity: IdentityTerm,
    content_type: String,
    fields: Vec<IndexField>,
    #[serde(skip)]
    source: Arc<Value>,
}

impl DocumentEntry {
    #[must_use]
    pub fn new(
        identity: IdentityTerm,
        content_type: impl Into<String>,
        fields: Vec<IndexField>,
        source: Arc<Value>,
    ) -> Self {
        Self {
            identity,
            content_type: content_type.into(),
            fields,
            source,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityTerm {
        &self.identity
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    /// The original document, kept for storage alongside the fields
    #[must_use]
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Fields with the given path
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IndexField> + 'a {
        self.fields.iter().filter(move |field| field.name == name)
    }
}

/// Finishes a batch unit on every exit path of its task
struct UnitGuard<'a, T>(&'a BlockingCollector<T>);

impl<T> Drop for UnitGuard<'_, T> {
    fn drop(&mut self) {
        self.0.finish_unit();
    }
}

/// Per-document walk state
struct Walk<'a> {
    content_type: &'a str,
    identity: &'a str,
    fields: Vec<IndexField>,
    shapes: FieldInfoCollection,
}

/// Converts JSON documents into [`DocumentEntry`] values
#[derive(Debug)]
pub struct DocumentMaterializer {
    resolver: Arc<dyn FieldResolver>,
    strategies: StrategyRegistry,
    classify: ClassifyOptions,
    schema: Arc<SchemaTracker>,
    errors: Arc<ErrorCollector>,
}

impl DocumentMaterializer {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn FieldResolver>,
        strategies: StrategyRegistry,
        classify: ClassifyOptions,
        schema: Arc<SchemaTracker>,
        errors: Arc<ErrorCollector>,
    ) -> Self {
        Self {
            resolver,
            strategies,
            classify,
            schema,
            errors,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaTracker> {
        &self.schema
    }

    #[must_use]
    pub fn errors(&self) -> &Arc<ErrorCollector> {
        &self.errors
    }

    /// Materialize a single document
    pub fn create(&self, json: &Value) -> IndexResult<DocumentEntry> {
        self.materialize(Arc::new(json.clone()))
    }

    /// Parse and materialize a single document
    pub fn create_from_str(&self, json: &str) -> IndexResult<DocumentEntry> {
        let value: Value = serde_json::from_str(json)?;
        self.materialize(Arc::new(value))
    }

    /// Materialize a batch concurrently, one unit of work per document
    ///
    /// Entries arrive in completion order. Failed or panicking documents are
    /// reported to the error collector and simply produce no entry.
    pub fn create_batch(self: &Arc<Self>, documents: Vec<Value>) -> Arc<BlockingCollector<DocumentEntry>> {
        let collector = Arc::new(BlockingCollector::new());

        for (position, document) in documents.into_iter().enumerate() {
            collector.begin_unit();
            let materializer = Arc::clone(self);
            let sink = Arc::clone(&collector);
            rayon::spawn(move || {
                let _unit = UnitGuard(&sink);
                let outcome = catch_unwind(AssertUnwindSafe(|| materializer.materialize(Arc::new(document))));
                let error = match outcome {
                    Ok(Ok(entry)) => {
                        sink.push(entry);
                        return;
                    }
                    Ok(Err(error)) => error,
                    Err(panic) => IndexError::JobPanicked {
                        job: "materialize",
                        message: panic_message(panic.as_ref()),
                    },
                };
                materializer
                    .errors
                    .report(format!("document #{position}"), &error);
            });
        }

        collector.seal();
        collector
    }

    fn materialize(&self, source: Arc<Value>) -> IndexResult<DocumentEntry> {
        let Some(object) = source.as_object() else {
            return Err(IndexError::NotAnObject {
                found: json_type_name(&source),
            });
        };

        let content_type = self.resolver.content_type(object)?;
        let identity = self.resolver.identity(object)?;
        let root = JsonValue::from_object(object, &self.classify);

        let mut walk = Walk {
            content_type: &content_type,
            identity: &identity.value,
            fields: Vec::with_capacity(object.len() * 2),
            shapes: FieldInfoCollection::new(),
        };
        self.visit(&mut walk, "", &root)?;

        let Walk { fields, shapes, .. } = walk;
        self.schema.merge(&content_type, &shapes);

        tracing::trace!(
            identity = %identity,
            content_type = %content_type,
            fields = fields.len(),
            "Document materialized"
        );

        Ok(DocumentEntry::new(identity, content_type, fields, source))
    }

    fn visit(&self, walk: &mut Walk<'_>, path: &str, value: &JsonValue) -> IndexResult<()> {
        let strategy = self.strategies.resolve(walk.content_type, path);
        if strategy.excludes_subtree() {
            return Ok(());
        }

        for field in strategy.create_fields(path, value) {
            let mut shape = FieldInfoEntry::new(field.name.as_str(), field.kind, field.encoding, strategy.name())
                .with_metadata("first_seen", walk.identity);
            if let Some(tokenizer) = tokenizer_for(field.encoding) {
                shape = shape.with_metadata("tokenizer", tokenizer);
            }
            walk.shapes.add(shape);
            walk.fields.push(field);
        }

        match value {
            JsonValue::Array(items) => {
                for item in items {
                    self.visit(walk, path, item)?;
                }
            }
            JsonValue::Object(properties) => {
                for (key, child) in properties {
                    if key.is_empty() {
                        return Err(IndexError::Materialize {
                            field: path.to_string(),
                            message: "empty property name".to_string(),
                        });
                    }
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.visit(walk, &child_path, child)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Tantivy tokenizer backing a text encoding
fn tokenizer_for(encoding: FieldEncoding) -> Option<&'static str> {
    match encoding {
        FieldEncoding::Exact => Some("raw"),
        FieldEncoding::Analyzed => Some("default"),
        FieldEncoding::Int64 | FieldEncoding::Float64 => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Tantivy-backed index
//!
//! Materialized fields have dynamic, dotted names, so they are stored in two
//! JSON object fields instead of one tantivy field per path:
//! - `terms` holds exact, integer and float fields (raw tokenizer, fast)
//! - `text` holds analyzed fields (default tokenizer, positions)
//!
//! Identity, content type and the original document sit in fixed fields.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, Query, QueryParser, RangeQuery, TermQuery,
};
use tantivy::schema::{
    Field, IndexRecordOption, JsonObjectOptions, OwnedValue, STORED, STRING, Schema,
    TextFieldIndexing, Value as _,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter as TantivyWriter, ReloadPolicy,
    TantivyDocument, Term,
};

use super::query::FieldQuery;
use super::writer::IndexWriter;
use crate::config::IndexConfig;
use crate::document::{DocumentEntry, FieldValue, IdentityTerm};
use crate::errors::{IndexError, IndexResult};
use crate::schema::FieldEncoding;

pub const ID_FIELD: &str = "_id";
pub const CONTENT_TYPE_FIELD: &str = "_type";
pub const SOURCE_FIELD: &str = "_source";
pub const TERMS_FIELD: &str = "terms";
pub const TEXT_FIELD: &str = "text";

const RAW_TOKENIZER: &str = "raw";
const TEXT_TOKENIZER: &str = "default";

#[derive(Debug, Clone, Copy)]
struct Fields {
    id: Field,
    content_type: Field,
    source: Field,
    terms: Field,
    text: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();

    let id = builder.add_text_field(ID_FIELD, STRING | STORED);
    let content_type = builder.add_text_field(CONTENT_TYPE_FIELD, STRING | STORED);
    let source = builder.add_text_field(SOURCE_FIELD, STORED);

    let terms_options = JsonObjectOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(RAW_TOKENIZER)
                .set_index_option(IndexRecordOption::Basic),
        )
        .set_fast(None)
        .set_expand_dots_enabled();
    let terms = builder.add_json_field(TERMS_FIELD, terms_options);

    let text_options = JsonObjectOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TEXT_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_expand_dots_enabled();
    let text = builder.add_json_field(TEXT_FIELD, text_options);

    (
        builder.build(),
        Fields {
            id,
            content_type,
            source,
            terms,
            text,
        },
    )
}

/// A document returned by a search
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub identity: String,
    pub content_type: String,
    pub score: f32,
    pub source: Value,
}

/// Tantivy index implementing [`IndexWriter`]
pub struct TantivyIndex {
    index: Index,
    fields: Fields,
    writer: Mutex<TantivyWriter>,
    reader: IndexReader,
}

impl std::fmt::Debug for TantivyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyIndex")
            .field("num_docs", &self.num_docs())
            .finish_non_exhaustive()
    }
}

impl TantivyIndex {
    /// Open the index described by `config`, in RAM when it has no directory
    pub fn open(config: &IndexConfig) -> IndexResult<Self> {
        let memory_limit = config.writer_memory_limit();
        match config.index_dir() {
            Some(dir) => Self::open_in_dir(dir, memory_limit),
            None => Self::open_in_ram(memory_limit),
        }
    }

    pub fn open_in_ram(memory_limit: usize) -> IndexResult<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        tracing::debug!("Created in-memory index");
        Self::from_index(index, fields, memory_limit)
    }

    /// Open an existing index in `dir` or create one
    pub fn open_in_dir(dir: &Path, memory_limit: usize) -> IndexResult<Self> {
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = build_schema();

        let index = if dir.join("meta.json").exists() {
            let existing = Index::open_in_dir(dir)?;
            if existing.schema().num_fields() != schema.num_fields() {
                return Err(IndexError::Other(format!(
                    "index at {} was created with an incompatible schema",
                    dir.display()
                )));
            }
            tracing::info!(path = %dir.display(), "Opened existing index");
            existing
        } else {
            let directory = MmapDirectory::open(dir)
                .map_err(|e| IndexError::Other(format!("failed to open {}: {e}", dir.display())))?;
            tracing::info!(path = %dir.display(), "Created new index");
            Index::create(directory, schema, IndexSettings::default())?
        };

        Self::from_index(index, fields, memory_limit)
    }

    fn from_index(index: Index, fields: Fields, memory_limit: usize) -> IndexResult<Self> {
        let writer: TantivyWriter = index.writer(memory_limit)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            fields,
            writer: Mutex::new(writer),
            reader,
        })
    }

    /// Committed documents visible to searches
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Run a structured query
    pub fn search(&self, query: &FieldQuery, limit: usize) -> IndexResult<Vec<SearchHit>> {
        let query = self.to_tantivy(query);
        self.collect_hits(query.as_ref(), limit)
    }

    /// Run a query string through tantivy's query parser
    ///
    /// Materialized fields are addressed as `terms.<path>:value` for exact
    /// and numeric values or `text.<path>:word` for analyzed text.
    pub fn search_str(&self, query: &str, limit: usize) -> IndexResult<Vec<SearchHit>> {
        let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| IndexError::Other(format!("failed to parse query '{query}': {e}")))?;
        self.collect_hits(parsed.as_ref(), limit)
    }

    /// Every committed document, up to `limit`
    pub fn all(&self, limit: usize) -> IndexResult<Vec<SearchHit>> {
        self.collect_hits(&AllQuery, limit)
    }

    fn collect_hits(&self, query: &dyn Query, limit: usize) -> IndexResult<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let text = |field: Field| {
                doc.get_first(field)
                    .and_then(|value| value.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let source = serde_json::from_str(&text(self.fields.source)).unwrap_or(Value::Null);
            hits.push(SearchHit {
                identity: text(self.fields.id),
                content_type: text(self.fields.content_type),
                score,
                source,
            });
        }
        Ok(hits)
    }

    fn to_tantivy(&self, query: &FieldQuery) -> Box<dyn Query> {
        match query {
            FieldQuery::Term { field, value } => {
                let mut term = Term::from_field_json_path(self.fields.terms, field, true);
                term.append_type_and_str(value);
                Box::new(TermQuery::new(term, IndexRecordOption::Basic))
            }
            FieldQuery::Text { field, text } => self.text_query(field, text),
            FieldQuery::Int64Range { field, min, max } => {
                if let (Some(low), Some(high)) = (min, max)
                    && low == high
                {
                    return Box::new(TermQuery::new(
                        self.fast_term(field, *low),
                        IndexRecordOption::Basic,
                    ));
                }
                // Open sides are closed at the type extremes so the range
                // stays within this path's i64 terms.
                let low = self.fast_term(field, min.unwrap_or(i64::MIN));
                let high = self.fast_term(field, max.unwrap_or(i64::MAX));
                Box::new(RangeQuery::new(Bound::Included(low), Bound::Included(high)))
            }
            FieldQuery::Float64Range { field, min, max } => {
                if let (Some(low), Some(high)) = (min, max)
                    && low == high
                {
                    return Box::new(TermQuery::new(
                        self.fast_term(field, *low),
                        IndexRecordOption::Basic,
                    ));
                }
                let low = self.fast_term(field, min.unwrap_or(f64::MIN));
                let high = self.fast_term(field, max.unwrap_or(f64::MAX));
                Box::new(RangeQuery::new(Bound::Included(low), Bound::Included(high)))
            }
            FieldQuery::Any(clauses) => self.boolean(Occur::Should, clauses),
            FieldQuery::All(clauses) => self.boolean(Occur::Must, clauses),
            FieldQuery::MatchNone => Box::new(EmptyQuery),
        }
    }

    fn boolean(&self, occur: Occur, clauses: &[FieldQuery]) -> Box<dyn Query> {
        if clauses.is_empty() {
            return Box::new(EmptyQuery);
        }
        let subqueries = clauses
            .iter()
            .map(|clause| (occur, self.to_tantivy(clause)))
            .collect();
        Box::new(BooleanQuery::new(subqueries))
    }

    fn fast_term<T: tantivy::fastfield::FastValue>(&self, field: &str, value: T) -> Term {
        let mut term = Term::from_field_json_path(self.fields.terms, field, true);
        term.append_type_and_fast_value(value);
        term
    }

    /// Every token of `text` must occur at `field`
    fn text_query(&self, field: &str, text: &str) -> Box<dyn Query> {
        let Some(mut analyzer) = self.index.tokenizers().get(TEXT_TOKENIZER) else {
            return Box::new(EmptyQuery);
        };

        let mut terms = Vec::new();
        let mut stream = analyzer.token_stream(text);
        stream.process(&mut |token| {
            let mut term = Term::from_field_json_path(self.fields.text, field, true);
            term.append_type_and_str(&token.text);
            terms.push(term);
        });

        match terms.len() {
            0 => Box::new(EmptyQuery),
            1 => Box::new(TermQuery::new(terms.remove(0), IndexRecordOption::WithFreqs)),
            _ => Box::new(BooleanQuery::new(
                terms
                    .into_iter()
                    .map(|term| {
                        let query: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                        (Occur::Must, query)
                    })
                    .collect(),
            )),
        }
    }

    fn to_document(&self, entry: &DocumentEntry) -> IndexResult<TantivyDocument> {
        let mut terms: BTreeMap<String, OwnedValue> = BTreeMap::new();
        let mut text: BTreeMap<String, OwnedValue> = BTreeMap::new();

        for field in entry.fields() {
            let target = match field.encoding {
                FieldEncoding::Analyzed => &mut text,
                FieldEncoding::Exact | FieldEncoding::Int64 | FieldEncoding::Float64 => &mut terms,
            };
            let value = match &field.value {
                FieldValue::Text(s) => OwnedValue::Str(s.clone()),
                FieldValue::I64(i) => OwnedValue::I64(*i),
                FieldValue::F64(f) => OwnedValue::F64(*f),
            };
            push_value(target, &field.name, value);
        }

        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.id, &entry.identity().value);
        doc.add_text(self.fields.content_type, entry.content_type());
        doc.add_text(self.fields.source, serde_json::to_string(entry.source())?);
        doc.add_object(self.fields.terms, terms);
        doc.add_object(self.fields.text, text);
        Ok(doc)
    }

    fn identity_term(&self, identity: &IdentityTerm) -> Term {
        Term::from_field_text(self.fields.id, &identity.value)
    }
}

/// Repeated paths become arrays
fn push_value(target: &mut BTreeMap<String, OwnedValue>, name: &str, value: OwnedValue) {
    match target.get_mut(name) {
        None => {
            target.insert(name.to_string(), value);
        }
        Some(OwnedValue::Array(values)) => values.push(value),
        Some(existing) => {
            let first = std::mem::replace(existing, OwnedValue::Null);
            *existing = OwnedValue::Array(vec![first, value]);
        }
    }
}

impl IndexWriter for TantivyIndex {
    fn upsert(&self, entry: &DocumentEntry) -> IndexResult<()> {
        let doc = self.to_document(entry)?;
        let writer = self.writer.lock();
        writer.delete_term(self.identity_term(entry.identity()));
        writer.add_document(doc)?;
        Ok(())
    }

    fn delete(&self, identity: &IdentityTerm) -> IndexResult<()> {
        self.writer.lock().delete_term(self.identity_term(identity));
        Ok(())
    }

    fn commit(&self) -> IndexResult<()> {
        let opstamp = self.writer.lock().commit()?;
        self.reader.reload()?;
        tracing::debug!(opstamp, docs = self.num_docs(), "Index committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        ClassifyOptions, DocumentMaterializer, PathFieldResolver, ResolutionMode, StrategyRegistry,
    };
    use crate::reporting::ErrorCollector;
    use crate::schema::SchemaTracker;
    use serde_json::json;
    use std::sync::Arc;

    const MEMORY: usize = 15_000_000;

    fn materializer() -> DocumentMaterializer {
        DocumentMaterializer::new(
            Arc::new(PathFieldResolver::new("id", "contentType", ResolutionMode::Dotted)),
            StrategyRegistry::new(),
            ClassifyOptions::default(),
            Arc::new(SchemaTracker::new()),
            Arc::new(ErrorCollector::default()),
        )
    }

    fn index_docs(index: &TantivyIndex, docs: &[Value]) {
        let m = materializer();
        for doc in docs {
            index.upsert(&m.create(doc).expect("materialized")).expect("upsert");
        }
        index.commit().expect("commit");
    }

    #[test]
    fn term_and_text_queries_find_documents() {
        let index = TantivyIndex::open_in_ram(MEMORY).expect("index");
        index_docs(
            &index,
            &[
                json!({ "id": "1", "contentType": "note", "status": "open", "body": "Quick brown fox" }),
                json!({ "id": "2", "contentType": "note", "status": "closed", "body": "Lazy dog" }),
            ],
        );
        assert_eq!(index.num_docs(), 2);

        let hits = index.search(&FieldQuery::term("status", "open"), 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].identity, "1");
        assert_eq!(hits[0].source["body"], "Quick brown fox");

        let hits = index.search(&FieldQuery::text("body", "lazy"), 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content_type, "note");

        let none = index.search(&FieldQuery::MatchNone, 10).expect("search");
        assert!(none.is_empty());
    }

    #[test]
    fn upsert_replaces_by_identity_and_delete_removes() {
        let index = TantivyIndex::open_in_ram(MEMORY).expect("index");
        index_docs(
            &index,
            &[
                json!({ "id": "1", "contentType": "note", "status": "open" }),
                json!({ "id": "1", "contentType": "note", "status": "closed" }),
            ],
        );
        assert_eq!(index.num_docs(), 1);
        assert!(index.search(&FieldQuery::term("status", "open"), 10).expect("search").is_empty());

        index.delete(&IdentityTerm::new("id", "1")).expect("delete");
        index.commit().expect("commit");
        assert_eq!(index.num_docs(), 0);
    }

    #[test]
    fn reopens_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let index = TantivyIndex::open_in_dir(dir.path(), MEMORY).expect("index");
            index_docs(&index, &[json!({ "id": "a", "contentType": "t", "tag": "x" })]);
        }
        let index = TantivyIndex::open_in_dir(dir.path(), MEMORY).expect("reopen");
        assert_eq!(index.num_docs(), 1);
        assert_eq!(index.all(10).expect("all")[0].identity, "a");
    }
}

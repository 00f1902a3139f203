use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use jsonindex::{IndexConfig, TantivyIndex};

/// Search an index with tantivy's query syntax
#[derive(Parser)]
pub struct SearchArgs {
    /// Index directory
    #[arg(long, env = "JSONINDEX_DIR")]
    index: PathBuf,

    /// Maximum number of hits
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Query, e.g. `text.body:fox` or `terms.status:open`
    query: String,
}

impl SearchArgs {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = IndexConfig::builder()
            .index_dir(Some(self.index.clone()))
            .build()?;

        let hits = tokio::task::spawn_blocking(move || {
            let index = TantivyIndex::open(&config)?;
            index.search_str(&self.query, self.limit)
        })
        .await
        .context("search task failed")??;

        for hit in &hits {
            println!("{}", serde_json::to_string(hit)?);
        }
        tracing::info!(hits = hits.len(), "Search finished");
        Ok(())
    }
}

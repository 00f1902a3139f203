use anyhow::{Context, bail};
use clap::Parser;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonindex::{IndexConfig, IndexConfigBuilder, InflowManager, TantivyIndex};

/// Ingest JSON documents into an index
#[derive(Parser)]
pub struct IngestArgs {
    /// Index directory, created if missing
    #[arg(long, env = "JSONINDEX_DIR")]
    index: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Documents per submitted batch
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Print the observed field schema after ingesting
    #[arg(long)]
    schema: bool,

    /// NDJSON files or files holding one JSON array
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl IngestArgs {
    pub async fn run(self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }

        let base = match &self.config {
            Some(path) => IndexConfig::from_json_file(path)?,
            None => IndexConfig::default(),
        };
        let config = IndexConfigBuilder::from(base)
            .index_dir(Some(self.index.clone()))
            .build()?;

        let index = Arc::new(TantivyIndex::open(&config)?);
        let manager = Arc::new(InflowManager::start(config, index.clone())?);

        let mut completions = Vec::new();
        for path in &self.files {
            let documents = read_documents(path).await?;
            tracing::info!(file = %path.display(), documents = documents.len(), "Read input");

            for chunk in documents.chunks(self.batch_size) {
                let manager = Arc::clone(&manager);
                let batch = chunk.to_vec();
                // Submission blocks while the capacity gate is full.
                let slot = tokio::task::spawn_blocking(move || manager.submit(batch))
                    .await
                    .context("submit task failed")??;
                completions.push(slot.completion());
            }
        }

        for result in futures::future::join_all(completions).await {
            result.context("slot dropped before completion")?;
        }

        let finisher = Arc::clone(&manager);
        tokio::task::spawn_blocking(move || finisher.shutdown())
            .await
            .context("shutdown task failed")??;

        let stats = manager.stats().snapshot();
        println!("{}", serde_json::to_string_pretty(&stats)?);
        println!("documents in index: {}", index.num_docs());
        if self.schema {
            println!("{}", serde_json::to_string_pretty(manager.schema().view().as_ref())?);
        }

        let errors = manager.errors();
        if !errors.is_empty() {
            for (category, count) in errors.counts() {
                println!("{category}: {count}");
            }
            for record in errors.snapshot() {
                println!("  {} [{}] {}", record.source, record.category, record.message);
            }
            if errors.overflow() > 0 {
                println!("  ... {} more not retained", errors.overflow());
            }
        }
        Ok(())
    }
}

/// A JSON array file, or one JSON document per line
async fn read_documents(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    if text.trim_start().starts_with('[') {
        return serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array", path.display()));
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", path.display(), number + 1))
        })
        .collect()
}

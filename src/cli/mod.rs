mod ingest;
mod search;

pub use ingest::IngestArgs;
pub use search::SearchArgs;

//! Bar storage: the store trait, in-memory and Parquet stores, CSV ingestion

pub mod canonicalize;
pub mod ingest;
pub mod parquet;
pub mod schema;
pub mod store;

pub use canonicalize::Canonicalizer;
pub use ingest::{parse_timestamp, DataIngestor, IngestReport};
pub use parquet::{
    DuplicateReport, ParquetStore, SeriesInventory, SeriesMeta, SymbolInventory, WriteSummary,
};
pub use schema::{BarSchema, SchemaError};
pub use store::{BarStore, InMemoryStore, StoreError};

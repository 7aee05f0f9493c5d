// YGO Library - Core Library
// Card inventory reconciliation: CSV rows → catalog lookups → local library.
// Exposes all modules for use in the CLI and tests.

pub mod error;
pub mod rarity;     // Rarity aliases + preference ranking
pub mod ingest;     // CSV bytes → NormalizedRows
pub mod catalog;    // CatalogSource contract + YGOPRODeck client
pub mod resolver;   // Rarity candidates and exact-printing prices
pub mod images;     // Local image cache
pub mod db;         // Record store (SQLite + WAL)
pub mod events;     // Structured progress/failure events
pub mod chooser;    // Ambiguous rarity strategy
pub mod reconcile;  // Reconciliation engine: single, batch, refresh
pub mod export;     // CSV export
pub mod config;

// Re-export commonly used types
pub use error::{CatalogError, ImageError, IngestError, ReconcileError, RowError};
pub use ingest::{ingest, ingest_file, NormalizedRow, ParsedCsv};
pub use catalog::{CatalogSource, RarityPrice, SetInfo, YgoProClient};
pub use resolver::RarityResolver;
pub use images::ImageCache;
pub use db::{
    CardRecord, collection_total,
    open_database, setup_database, upsert_card, set_quantity, update_price,
    get_card, get_all_cards, verify_count,
};
pub use events::{EventSink, ImportEvent, LogSink, MemorySink, NullSink};
pub use chooser::{AutoPick, PromptChooser, RarityChooser};
pub use reconcile::{
    spawn_refresh, CancelFlag, ImportSummary, ReconciliationEngine,
    RefreshHandle, RefreshSummary,
};
pub use export::{export_csv, write_export};
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

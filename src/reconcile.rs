// ⚖️ Reconciliation Engine - CSV rows → catalog lookups → card records
//
// Per row:
//   normalize → resolve rarity (auto or via RarityChooser) → price → images → upsert
//
// Failures are contained at the smallest scope: one image, one row, one
// refreshed record. Rows run strictly in input order, one at a time.

use crate::catalog::CatalogSource;
use crate::chooser::{settle_choice, RarityChooser};
use crate::db::{self, CardRecord};
use crate::error::{IngestError, ReconcileError};
use crate::events::{EventSink, ImportEvent};
use crate::images::{ImageCache, MAX_IMAGES_PER_CARD};
use crate::ingest::{self, ParsedCsv};
use crate::rarity;
use crate::resolver::RarityResolver;
use anyhow::Result;
use chrono::{SubsecRound, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Only this many error messages are kept in a summary; all failures are counted
pub const MAX_REPORTED_ERRORS: usize = 20;

/// A progress event is emitted every this many successful rows
const PROGRESS_EVERY: usize = 25;

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative cancel signal, checked between rows.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: String,
    pub total_rows: usize,
    pub imported: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// First MAX_REPORTED_ERRORS messages
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn new(run_id: String, total_rows: usize) -> Self {
        ImportSummary {
            run_id,
            total_rows,
            imported: 0,
            failed: 0,
            cancelled: false,
            errors: Vec::new(),
        }
    }

    fn record_failure(&mut self, message: String) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }

    pub fn summary(&self) -> String {
        let mut text = format!("Imported: {}\nFailed: {}", self.imported, self.failed);
        if self.cancelled {
            text.push_str("\n(cancelled before the end of the file)");
        }
        if !self.errors.is_empty() {
            text.push_str(&format!(
                "\n\nIssues (first {}):\n- {}",
                MAX_REPORTED_ERRORS,
                self.errors.join("\n- ")
            ));
        }
        text
    }
}

/// Completion signal of the refresh-price flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub updated: usize,
    pub failed: usize,
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine<'a> {
    conn: &'a Connection,
    catalog: &'a dyn CatalogSource,
    /// None: records are written without images (price refresh)
    images: Option<&'a ImageCache>,
    sink: &'a dyn EventSink,
    /// Pause between rows/records to keep the catalog request rate predictable
    row_delay: Duration,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(
        conn: &'a Connection,
        catalog: &'a dyn CatalogSource,
        images: &'a ImageCache,
        sink: &'a dyn EventSink,
    ) -> Self {
        ReconciliationEngine {
            conn,
            catalog,
            images: Some(images),
            sink,
            row_delay: Duration::ZERO,
        }
    }

    /// Engine with no image cache, for flows that only touch prices
    pub fn without_images(conn: &'a Connection, catalog: &'a dyn CatalogSource, sink: &'a dyn EventSink) -> Self {
        ReconciliationEngine {
            conn,
            catalog,
            images: None,
            sink,
            row_delay: Duration::ZERO,
        }
    }

    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = delay;
        self
    }

    fn pause(&self) {
        if !self.row_delay.is_zero() {
            thread::sleep(self.row_delay);
        }
    }

    /// Resolve one printed set code against the catalog and store the result.
    ///
    /// # Arguments
    /// * `set_code` - printed code, case-sensitive as printed
    /// * `rarity_override` - rarity from the caller (aliases are normalized); None = catalog default
    /// * `quantity` - replaces any previous quantity; negatives store as 0 (None = 1)
    /// * `chooser` - asked when several rarities are possible
    ///
    /// # Returns
    /// * `Ok(CardRecord)` - the record as written
    /// * `Err(ReconcileError::Catalog)` - set info lookup failed (the only hard dependency)
    /// * `Err(ReconcileError::Storage)` - the upsert failed
    pub fn reconcile(
        &self,
        set_code: &str,
        rarity_override: Option<&str>,
        quantity: Option<i64>,
        chooser: &dyn RarityChooser,
    ) -> Result<CardRecord, ReconcileError> {
        let info = self.catalog.get_set_info(set_code)?;
        let resolver = RarityResolver::new(self.catalog);

        // 1. Rarity: caller's choice, else the catalog's default
        let override_norm = rarity_override.map(rarity::normalize);
        let mut rarity = override_norm
            .clone()
            .unwrap_or_else(|| info.default_rarity.trim().to_string());
        let mut look_up_price = override_norm.is_some();

        if rarity::is_missing(&rarity) {
            let candidates = resolver.resolve_candidates(set_code);
            match candidates.len() {
                0 => {
                    rarity = String::new();
                    look_up_price = false;
                }
                1 => {
                    rarity = candidates[0].clone();
                    look_up_price = true;
                }
                _ => {
                    rarity = settle_choice(chooser, set_code, &candidates).unwrap_or_default();
                    look_up_price = true;
                    self.sink.emit(ImportEvent::RarityAmbiguous {
                        set_code: set_code.to_string(),
                        candidates,
                        chosen: rarity.clone(),
                    });
                }
            }
        }

        // 2. Price: exact printing when the rarity did not come from the catalog default
        let price = if look_up_price {
            resolver
                .resolve_price(set_code, &rarity)
                .unwrap_or(info.default_price)
        } else {
            info.default_price
        };

        // 3. Images: best effort, one at a time
        let image_paths = self.download_images(set_code, info.catalog_id);

        // 4. Full merge
        let card = CardRecord {
            set_code: set_code.to_string(),
            name: info.name,
            set_name: info.set_name,
            rarity,
            price: db::sanitize_price(price),
            quantity: quantity.unwrap_or(1).max(0),
            image_paths,
            catalog_id: info.catalog_id,
            // Stored with second precision; keep the returned record identical
            last_updated: Utc::now().trunc_subsecs(0),
        };

        db::upsert_card(self.conn, &card).map_err(ReconcileError::storage)?;
        Ok(card)
    }

    fn download_images(&self, set_code: &str, catalog_id: i64) -> Vec<String> {
        let Some(cache) = self.images else {
            return Vec::new();
        };
        let urls = match self.catalog.get_images(catalog_id) {
            Ok(urls) => urls,
            Err(e) => {
                self.sink.emit(ImportEvent::ImageFailed {
                    set_code: set_code.to_string(),
                    url: String::new(),
                    message: e.to_string(),
                });
                return Vec::new();
            }
        };

        let mut paths = Vec::new();
        for (idx, url) in urls.iter().take(MAX_IMAGES_PER_CARD).enumerate() {
            match cache.fetch(self.catalog, set_code, idx, url) {
                Ok(path) => paths.push(path),
                Err(e) => self.sink.emit(ImportEvent::ImageFailed {
                    set_code: set_code.to_string(),
                    url: url.clone(),
                    message: e.to_string(),
                }),
            }
        }
        paths
    }

    // ========================================================================
    // BATCH IMPORT
    // ========================================================================

    /// Reconcile every row of an ingested CSV, in order.
    ///
    /// Row errors and reconcile failures are counted and reported; they never
    /// stop the batch. Cancellation stops before the next row; rows already
    /// written stay written. Duplicate set codes overwrite earlier rows.
    pub fn import_csv(&self, parsed: &ParsedCsv, chooser: &dyn RarityChooser, cancel: &CancelFlag) -> ImportSummary {
        let run_id: String = uuid::Uuid::new_v4().to_string().chars().take(8).collect();
        let mut summary = ImportSummary::new(run_id.clone(), parsed.total_rows());

        self.sink.emit(ImportEvent::ImportStarted {
            run_id: run_id.clone(),
            total_rows: parsed.total_rows(),
        });

        for (processed, row) in parsed.rows.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                self.sink.emit(ImportEvent::ImportCancelled { processed });
                break;
            }

            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    summary.record_failure(err.message.clone());
                    self.sink.emit(ImportEvent::RowSkipped {
                        row: err.row,
                        message: err.message.clone(),
                    });
                    continue;
                }
            };

            match self.reconcile(&row.set_code, row.rarity_raw.as_deref(), Some(row.quantity), chooser) {
                Ok(card) => {
                    summary.imported += 1;
                    self.sink.emit(ImportEvent::RowReconciled {
                        row: row.row_number,
                        set_code: card.set_code,
                        rarity: card.rarity,
                        price: card.price,
                    });
                    if summary.imported % PROGRESS_EVERY == 0 {
                        self.sink.emit(ImportEvent::Progress {
                            imported: summary.imported,
                            failed: summary.failed,
                            row: row.row_number,
                        });
                    }
                }
                Err(e) => {
                    summary.record_failure(format!("Row {} ({}): {}", row.row_number, row.set_code, e));
                    self.sink.emit(ImportEvent::RowFailed {
                        row: row.row_number,
                        set_code: row.set_code.clone(),
                        message: e.to_string(),
                    });
                }
            }

            self.pause();
        }

        self.sink.emit(ImportEvent::ImportFinished {
            run_id,
            imported: summary.imported,
            failed: summary.failed,
            total_rows: summary.total_rows,
        });
        summary
    }

    /// Read, ingest and import a CSV file.
    ///
    /// Fails only when the file itself is unusable (unreadable, undecodable, empty).
    pub fn import_file(
        &self,
        path: &Path,
        chooser: &dyn RarityChooser,
        cancel: &CancelFlag,
    ) -> Result<ImportSummary, IngestError> {
        let parsed = ingest::ingest_file(path)?;
        Ok(self.import_csv(&parsed, chooser, cancel))
    }

    // ========================================================================
    // PRICE REFRESH
    // ========================================================================

    /// Re-query the catalog for every stored card and update prices in place.
    ///
    /// A card with a rarity keeps it and gets that printing's price (else the set
    /// default). A card without one takes both price and rarity from the set default.
    /// Failures are counted per card; the loop always runs to the end.
    pub fn refresh_prices(&self) -> Result<RefreshSummary> {
        let cards = db::get_all_cards(self.conn)?;
        self.sink.emit(ImportEvent::RefreshStarted { records: cards.len() });

        let mut summary = RefreshSummary { updated: 0, failed: 0 };

        for card in &cards {
            match self.refresh_one(card) {
                Ok(()) => summary.updated += 1,
                Err(message) => {
                    summary.failed += 1;
                    self.sink.emit(ImportEvent::RefreshFailed {
                        set_code: card.set_code.clone(),
                        message,
                    });
                }
            }
            self.pause();
        }

        self.sink.emit(ImportEvent::RefreshFinished {
            updated: summary.updated,
            failed: summary.failed,
        });
        Ok(summary)
    }

    fn refresh_one(&self, card: &CardRecord) -> Result<(), String> {
        let info = self
            .catalog
            .get_set_info(&card.set_code)
            .map_err(|e| e.to_string())?;

        let existing = card.rarity.trim();
        let written = if existing.is_empty() {
            db::update_price(
                self.conn,
                &card.set_code,
                info.default_price,
                Some(info.default_rarity.as_str()),
            )
        } else {
            let price = RarityResolver::new(self.catalog)
                .resolve_price(&card.set_code, existing)
                .unwrap_or(info.default_price);
            db::update_price(self.conn, &card.set_code, price, None)
        };

        match written {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("{} no longer in the library", card.set_code)),
            Err(e) => Err(format!("{:#}", e)),
        }
    }
}

// ============================================================================
// BACKGROUND REFRESH
// ============================================================================

/// Handle to a refresh running on its own thread.
pub struct RefreshHandle {
    done: Receiver<Result<RefreshSummary>>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Block until the refresh finishes
    pub fn wait(mut self) -> Result<RefreshSummary> {
        let result = self
            .done
            .recv()
            .map_err(|_| anyhow::anyhow!("refresh worker exited without reporting"))?;
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        result
    }

    /// Non-blocking poll; None while the refresh is still running
    pub fn try_result(&self) -> Option<Result<RefreshSummary>> {
        match self.done.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(anyhow::anyhow!("refresh worker exited without reporting")))
            }
        }
    }
}

/// Run the refresh-price flow on a worker thread with its own database connection.
///
/// The caller's thread is not blocked; the outcome arrives on the handle's channel.
pub fn spawn_refresh(
    db_path: PathBuf,
    catalog: Arc<dyn CatalogSource>,
    sink: Arc<dyn EventSink>,
    row_delay: Duration,
) -> RefreshHandle {
    let (tx, rx) = mpsc::channel();

    let thread = thread::spawn(move || {
        let result = db::open_database(&db_path).and_then(|conn| {
            ReconciliationEngine::without_images(&conn, catalog.as_ref(), sink.as_ref())
                .with_row_delay(row_delay)
                .refresh_prices()
        });
        // Receiver may already be gone; nothing left to tell anyone
        let _ = tx.send(result);
    });

    RefreshHandle {
        done: rx,
        thread: Some(thread),
    }
}

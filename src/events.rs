// 📣 Structured events - what the reconciliation core reports while it works
//
// The engine never writes logs itself. It emits ImportEvents to an EventSink;
// the CLI plugs in LogSink, tests plug in MemorySink.

use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    ImportStarted {
        run_id: String,
        total_rows: usize,
    },
    /// Row could not be parsed into a NormalizedRow
    RowSkipped {
        row: usize,
        message: String,
    },
    RarityAmbiguous {
        set_code: String,
        candidates: Vec<String>,
        chosen: String,
    },
    RowReconciled {
        row: usize,
        set_code: String,
        rarity: String,
        price: f64,
    },
    RowFailed {
        row: usize,
        set_code: String,
        message: String,
    },
    ImageFailed {
        set_code: String,
        url: String,
        message: String,
    },
    Progress {
        imported: usize,
        failed: usize,
        row: usize,
    },
    ImportCancelled {
        processed: usize,
    },
    ImportFinished {
        run_id: String,
        imported: usize,
        failed: usize,
        total_rows: usize,
    },
    RefreshStarted {
        records: usize,
    },
    RefreshFailed {
        set_code: String,
        message: String,
    },
    RefreshFinished {
        updated: usize,
        failed: usize,
    },
}

/// Receiver of engine events. Shared with the refresh worker, hence Send + Sync.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ImportEvent);
}

/// Drops everything
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ImportEvent) {}
}

/// Forwards events to the `log` facade
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: ImportEvent) {
        use ImportEvent::*;
        match event {
            ImportStarted { run_id, total_rows } => {
                log::info!("[{}] Starting CSV import ({} rows)", run_id, total_rows)
            }
            RowSkipped { message, .. } => log::warn!("{}", message),
            RarityAmbiguous {
                set_code,
                candidates,
                chosen,
            } => log::info!(
                "{}: {} rarities available ({}), using {}",
                set_code,
                candidates.len(),
                candidates.join(", "),
                chosen
            ),
            RowReconciled {
                row,
                set_code,
                rarity,
                price,
            } => log::debug!("Row {}: {} [{}] ${:.2}", row, set_code, rarity, price),
            RowFailed {
                row,
                set_code,
                message,
            } => log::error!("Row {} ({}) failed: {}", row, set_code, message),
            ImageFailed {
                set_code,
                url,
                message,
            } => log::warn!("Image download failed for {} ({}): {}", set_code, url, message),
            Progress {
                imported,
                failed,
                row,
            } => log::info!("Progress: {} ok, {} failed, at row {}", imported, failed, row),
            ImportCancelled { processed } => {
                log::info!("Import cancelled after {} rows", processed)
            }
            ImportFinished {
                run_id,
                imported,
                failed,
                total_rows,
            } => log::info!(
                "[{}] IMPORT_SUMMARY ok={} err={} total={}",
                run_id,
                imported,
                failed,
                total_rows
            ),
            RefreshStarted { records } => log::info!("Refreshing prices for {} cards", records),
            RefreshFailed { set_code, message } => {
                log::error!("Refresh failed for {}: {}", set_code, message)
            }
            RefreshFinished { updated, failed } => {
                log::info!("Prices refreshed: {} updated, {} failed", updated, failed)
            }
        }
    }
}

/// Keeps every event in memory; for tests and callers that want to inspect a run.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<ImportEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ImportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count_where(&self, pred: impl Fn(&ImportEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ImportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(ImportEvent::RefreshStarted { records: 2 });
        sink.emit(ImportEvent::RefreshFinished { updated: 1, failed: 1 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ImportEvent::RefreshStarted { records: 2 });
        assert_eq!(
            sink.count_where(|e| matches!(e, ImportEvent::RefreshFinished { .. })),
            1
        );
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_value(ImportEvent::RowSkipped {
            row: 3,
            message: "Row 3: missing set code".to_string(),
        })
        .unwrap();

        assert_eq!(json["event"], "row_skipped");
        assert_eq!(json["row"], 3);
    }
}

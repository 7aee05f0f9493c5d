// ⚠️ Error taxonomy
//
// Each error is recovered at the smallest scope it affects:
//   ImageError     -> one image (reported, never propagated)
//   RowError       -> one CSV row (accumulated, batch continues)
//   CatalogError   -> one reconciliation (row fails, batch continues)
//   ReconcileError -> one reconciliation
//   IngestError    -> the whole import

use thiserror::Error;

// ============================================================================
// INGESTION
// ============================================================================

/// Import-fatal failures: nothing usable came out of the input.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Input had bytes but none of them decoded to text
    #[error("could not decode the file as UTF-8")]
    Decode,

    /// No data rows after parsing
    #[error("CSV appears empty or unreadable")]
    EmptyInput,

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single CSV row that could not be turned into a NormalizedRow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RowError {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        RowError {
            row,
            message: message.into(),
        }
    }
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// The catalog answered but has no entry for the query
    #[error("no catalog data for {0}")]
    NotFound(String),

    /// Transport failure or non-success HTTP status
    #[error("network error: {0}")]
    Network(String),

    /// Response body was not the JSON shape we expect
    #[error("unexpected catalog response: {0}")]
    Parse(String),
}

// ============================================================================
// IMAGES
// ============================================================================

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image download failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// RECONCILIATION
// ============================================================================

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The record could not be written; the message carries the storage context chain
    #[error("storage error: {0}")]
    Storage(String),
}

impl ReconcileError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        ReconcileError::Storage(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_displays_message_only() {
        let err = RowError::new(3, "Row 3: missing set code (columns found: Name)");
        assert_eq!(err.to_string(), "Row 3: missing set code (columns found: Name)");
        assert_eq!(err.row, 3);
    }

    #[test]
    fn test_reconcile_error_is_transparent_for_catalog() {
        let err: ReconcileError = CatalogError::NotFound("SOI-EN001".to_string()).into();
        assert_eq!(err.to_string(), "no catalog data for SOI-EN001");
    }

    #[test]
    fn test_storage_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("Failed to upsert card SOI-EN001");
        let err = ReconcileError::storage(inner);
        assert_eq!(
            err.to_string(),
            "storage error: Failed to upsert card SOI-EN001: disk full"
        );
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One owned card printing. `set_code` is the sole identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub set_code: String,
    pub name: String,
    pub set_name: String,
    /// Canonical rarity, or empty when unknown
    pub rarity: String,
    pub price: f64,
    pub quantity: i64,
    /// Local image files, at most 3, in catalog order
    pub image_paths: Vec<String>,
    pub catalog_id: i64,
    pub last_updated: DateTime<Utc>,
}

impl CardRecord {
    /// Value of every copy owned
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }

    /// Comma-joined form used by the `image_paths` column and CSV export
    pub fn image_paths_joined(&self) -> String {
        self.image_paths.join(",")
    }
}

/// Sum of line totals across a collection
pub fn collection_total(cards: &[CardRecord]) -> f64 {
    cards.iter().map(CardRecord::line_total).sum()
}

/// Stored prices are finite and non-negative; anything else is stored as 0.0
pub fn sanitize_price(price: f64) -> f64 {
    if price.is_finite() && price > 0.0 {
        price
    } else {
        0.0
    }
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// Stored as RFC 3339 with second precision ("2024-03-20T14:05:09Z")
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Accepts RFC 3339 and naive ISO-8601 ("2024-03-20T14:05:09", assumed UTC)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn split_image_paths(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn open_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL keeps the refresh worker's writes from blocking readers
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            set_code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            set_name TEXT NOT NULL DEFAULT '',
            rarity TEXT NOT NULL DEFAULT '',
            price REAL NOT NULL DEFAULT 0.0,
            quantity INTEGER NOT NULL DEFAULT 1,
            image_paths TEXT NOT NULL DEFAULT '',
            catalog_id INTEGER,
            last_updated TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create cards table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert or fully replace the record for `card.set_code`.
///
/// Every non-key column is overwritten, quantity included.
pub fn upsert_card(conn: &Connection, card: &CardRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO cards (
            set_code, name, set_name, rarity, price, quantity, image_paths, catalog_id, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(set_code) DO UPDATE SET
            name = excluded.name,
            set_name = excluded.set_name,
            rarity = excluded.rarity,
            price = excluded.price,
            quantity = excluded.quantity,
            image_paths = excluded.image_paths,
            catalog_id = excluded.catalog_id,
            last_updated = excluded.last_updated",
        params![
            card.set_code,
            card.name,
            card.set_name,
            card.rarity,
            sanitize_price(card.price),
            card.quantity.max(0),
            card.image_paths_joined(),
            card.catalog_id,
            format_timestamp(&card.last_updated),
        ],
    )
    .with_context(|| format!("Failed to upsert card {}", card.set_code))?;

    Ok(())
}

/// Quantity-only edit. Negative quantities are stored as 0.
///
/// Returns false when no record has this set code.
pub fn set_quantity(conn: &Connection, set_code: &str, quantity: i64) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE cards SET quantity = ?1, last_updated = ?2 WHERE set_code = ?3",
            params![quantity.max(0), format_timestamp(&Utc::now()), set_code],
        )
        .with_context(|| format!("Failed to update quantity for {}", set_code))?;

    Ok(changed > 0)
}

/// Price-only edit, or price + rarity when `rarity` is given.
pub fn update_price(conn: &Connection, set_code: &str, price: f64, rarity: Option<&str>) -> Result<bool> {
    let price = sanitize_price(price);
    let now = format_timestamp(&Utc::now());
    let changed = match rarity {
        None => conn.execute(
            "UPDATE cards SET price = ?1, last_updated = ?2 WHERE set_code = ?3",
            params![price, now, set_code],
        ),
        Some(r) => conn.execute(
            "UPDATE cards SET price = ?1, rarity = ?2, last_updated = ?3 WHERE set_code = ?4",
            params![price, r, now, set_code],
        ),
    }
    .with_context(|| format!("Failed to update price for {}", set_code))?;

    Ok(changed > 0)
}

// ============================================================================
// READS
// ============================================================================

const CARD_COLUMNS: &str =
    "set_code, name, set_name, rarity, price, quantity, image_paths, catalog_id, last_updated";

fn card_from_row(row: &Row) -> rusqlite::Result<CardRecord> {
    let image_paths: Option<String> = row.get(6)?;
    let catalog_id: Option<i64> = row.get(7)?;
    let last_updated: Option<String> = row.get(8)?;

    Ok(CardRecord {
        set_code: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        set_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        rarity: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        price: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        quantity: row.get::<_, Option<i64>>(5)?.unwrap_or(1),
        image_paths: image_paths.as_deref().map(split_image_paths).unwrap_or_default(),
        catalog_id: catalog_id.unwrap_or(0),
        // Unreadable timestamps sort as "never updated" rather than failing the read
        last_updated: last_updated
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

pub fn get_card(conn: &Connection, set_code: &str) -> Result<Option<CardRecord>> {
    let sql = format!("SELECT {} FROM cards WHERE set_code = ?1", CARD_COLUMNS);
    let card = conn
        .query_row(&sql, [set_code], card_from_row)
        .optional()
        .with_context(|| format!("Failed to read card {}", set_code))?;

    Ok(card)
}

pub fn get_all_cards(conn: &Connection) -> Result<Vec<CardRecord>> {
    let sql = format!("SELECT {} FROM cards ORDER BY name ASC, set_code ASC", CARD_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;

    let cards = stmt
        .query_map([], card_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read cards")?;

    Ok(cards)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Helper function to create test cards with all required fields
    fn create_test_card(set_code: &str, name: &str, rarity: &str, price: f64, quantity: i64) -> CardRecord {
        CardRecord {
            set_code: set_code.to_string(),
            name: name.to_string(),
            set_name: "Test Set".to_string(),
            rarity: rarity.to_string(),
            price,
            quantity,
            image_paths: vec!["images/a_0.jpg".to_string(), "images/a_1.jpg".to_string()],
            catalog_id: 1234,
            last_updated: Utc.with_ymd_and_hms(2024, 3, 20, 14, 5, 9).unwrap(),
        }
    }

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_twice_keeps_one_record() {
        let conn = test_db();

        upsert_card(&conn, &create_test_card("LOB-001", "Blue-Eyes", "Ultra Rare", 40.0, 1)).unwrap();
        upsert_card(&conn, &create_test_card("LOB-001", "Blue-Eyes White Dragon", "Secret Rare", 55.5, 3)).unwrap();

        assert_eq!(verify_count(&conn).unwrap(), 1);

        let card = get_card(&conn, "LOB-001").unwrap().unwrap();
        assert_eq!(card.name, "Blue-Eyes White Dragon");
        assert_eq!(card.rarity, "Secret Rare");
        assert_eq!(card.price, 55.5);
        assert_eq!(card.quantity, 3, "full upsert overwrites quantity");
    }

    #[test]
    fn test_round_trip_all_fields() {
        let conn = test_db();
        let card = create_test_card("SDK/EN-001", "Kaiba", "", 0.0, 2);
        upsert_card(&conn, &card).unwrap();

        let loaded = get_card(&conn, "SDK/EN-001").unwrap().unwrap();
        assert_eq!(loaded, card);
    }

    #[test]
    fn test_set_code_is_case_sensitive() {
        let conn = test_db();
        upsert_card(&conn, &create_test_card("lob-001", "a", "", 1.0, 1)).unwrap();
        upsert_card(&conn, &create_test_card("LOB-001", "b", "", 1.0, 1)).unwrap();

        assert_eq!(verify_count(&conn).unwrap(), 2);
        assert!(get_card(&conn, "Lob-001").unwrap().is_none());
    }

    #[test]
    fn test_set_quantity_partial_update() {
        let conn = test_db();
        upsert_card(&conn, &create_test_card("LOB-001", "Blue-Eyes", "Ultra Rare", 40.0, 1)).unwrap();

        assert!(set_quantity(&conn, "LOB-001", 4).unwrap());
        let card = get_card(&conn, "LOB-001").unwrap().unwrap();
        assert_eq!(card.quantity, 4);
        assert_eq!(card.price, 40.0);
        assert_eq!(card.rarity, "Ultra Rare");
        assert!(card.last_updated.timestamp() > Utc.with_ymd_and_hms(2024, 3, 20, 14, 5, 9).unwrap().timestamp());

        assert!(set_quantity(&conn, "LOB-001", -2).unwrap());
        assert_eq!(get_card(&conn, "LOB-001").unwrap().unwrap().quantity, 0);

        assert!(!set_quantity(&conn, "MISSING-1", 2).unwrap());
    }

    #[test]
    fn test_update_price_with_and_without_rarity() {
        let conn = test_db();
        upsert_card(&conn, &create_test_card("LOB-001", "Blue-Eyes", "Ultra Rare", 40.0, 2)).unwrap();

        update_price(&conn, "LOB-001", 42.0, None).unwrap();
        let card = get_card(&conn, "LOB-001").unwrap().unwrap();
        assert_eq!(card.price, 42.0);
        assert_eq!(card.rarity, "Ultra Rare");
        assert_eq!(card.quantity, 2);

        update_price(&conn, "LOB-001", 12.0, Some("Rare")).unwrap();
        let card = get_card(&conn, "LOB-001").unwrap().unwrap();
        assert_eq!(card.price, 12.0);
        assert_eq!(card.rarity, "Rare");
    }

    #[test]
    fn test_writes_never_store_negative_or_nan_values() {
        let conn = test_db();
        upsert_card(&conn, &create_test_card("LOB-001", "Blue-Eyes", "Ultra Rare", -4.0, -2)).unwrap();
        let card = get_card(&conn, "LOB-001").unwrap().unwrap();
        assert_eq!(card.price, 0.0);
        assert_eq!(card.quantity, 0);

        update_price(&conn, "LOB-001", f64::NAN, None).unwrap();
        assert_eq!(get_card(&conn, "LOB-001").unwrap().unwrap().price, 0.0);

        update_price(&conn, "LOB-001", -1.5, Some("Rare")).unwrap();
        assert_eq!(get_card(&conn, "LOB-001").unwrap().unwrap().price, 0.0);

        assert_eq!(sanitize_price(f64::INFINITY), 0.0);
        assert_eq!(sanitize_price(3.25), 3.25);
    }

    #[test]
    fn test_get_all_cards_ordered_by_name() {
        let conn = test_db();
        upsert_card(&conn, &create_test_card("B-1", "Zombie", "", 1.0, 1)).unwrap();
        upsert_card(&conn, &create_test_card("A-1", "Aqua", "", 1.0, 1)).unwrap();

        let names: Vec<String> = get_all_cards(&conn).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Aqua", "Zombie"]);
    }

    #[test]
    fn test_collection_total() {
        let cards = vec![
            create_test_card("A-1", "a", "", 2.5, 2),
            create_test_card("A-2", "b", "", 1.0, 3),
        ];
        assert_eq!(cards[0].line_total(), 5.0);
        assert_eq!(collection_total(&cards), 8.0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 20, 14, 5, 9).unwrap();
        assert_eq!(parse_timestamp("2024-03-20T14:05:09Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-20T14:05:09+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-20T14:05:09"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(format_timestamp(&expected), "2024-03-20T14:05:09Z");
    }

    #[test]
    fn test_image_paths_split_ignores_blanks() {
        assert_eq!(split_image_paths(""), Vec::<String>::new());
        assert_eq!(split_image_paths("a.jpg, b.jpg,"), vec!["a.jpg", "b.jpg"]);
    }
}

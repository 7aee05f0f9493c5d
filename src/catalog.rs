// 🌐 Catalog Client - remote card metadata by printed set code
//
// The catalog is an external collaborator reached through a narrow query
// contract (CatalogSource). YgoProClient speaks the YGOPRODeck v7 HTTP API
// with a blocking reqwest client: no async runtime, no retries.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_CATALOG_URL: &str = "https://db.ygoprodeck.com/api/v7";

// ============================================================================
// CORE TYPES
// ============================================================================

/// Catalog entry for one printed set code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInfo {
    pub catalog_id: i64,
    pub name: String,
    pub set_name: String,
    pub set_code: String,
    /// Rarity the catalog reports for this code (may be empty)
    pub default_rarity: String,
    /// 0.0 when the catalog has no price
    pub default_price: f64,
}

/// One (rarity, price) printing of a set code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityPrice {
    pub rarity: String,
    /// None when the catalog's price field could not be read as a number
    pub price: Option<f64>,
}

// ============================================================================
// QUERY CONTRACT
// ============================================================================

/// CatalogSource - everything reconciliation needs from the remote catalog.
///
/// Implementations must be shareable with the background refresh worker.
pub trait CatalogSource: Send + Sync {
    /// Set metadata for a printed code (e.g. "SOI-EN001")
    fn get_set_info(&self, set_code: &str) -> Result<SetInfo, CatalogError>;

    /// Ordered image URLs for a card; empty is not an error
    fn get_images(&self, catalog_id: i64) -> Result<Vec<String>, CatalogError>;

    /// Every (rarity, price) printed under this exact code.
    ///
    /// Fail-soft: an unreachable catalog and "no match" both return an empty Vec.
    fn get_rarities_for_set_code(&self, set_code: &str) -> Vec<RarityPrice>;

    /// Raw bytes behind an image URL
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

// ============================================================================
// JSON DECODING (pure, shared by the HTTP client and tests)
// ============================================================================

/// Read a price that may be a JSON number or a numeric string.
///
/// Missing/null/empty → Some(0.0); present but unreadable, non-finite or negative → None.
fn price_value(value: Option<&Value>) -> Option<f64> {
    let price = match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    price.filter(|p| p.is_finite() && *p >= 0.0)
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn id_field(value: &Value) -> Option<i64> {
    let id = value.get("id")?;
    id.as_i64()
        .or_else(|| id.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Decode a `cardsetsinfo.php` response.
///
/// A list response uses its first element; an object response is used when it
/// carries a `set_code`. Anything else means the catalog has no entry.
pub fn parse_set_info(set_code: &str, payload: &Value) -> Result<SetInfo, CatalogError> {
    let entry = match payload {
        Value::Array(items) => items.first(),
        Value::Object(_) if payload.get("set_code").is_some() => Some(payload),
        _ => None,
    }
    .ok_or_else(|| CatalogError::NotFound(set_code.to_string()))?;

    let catalog_id = id_field(entry)
        .ok_or_else(|| CatalogError::Parse(format!("missing card id for {}", set_code)))?;

    Ok(SetInfo {
        catalog_id,
        name: str_field(entry, "name"),
        set_name: str_field(entry, "set_name"),
        set_code: str_field(entry, "set_code"),
        default_rarity: str_field(entry, "set_rarity"),
        default_price: price_value(entry.get("set_price")).unwrap_or(0.0),
    })
}

/// Decode image URLs from a `cardinfo.php?id=` response (full size, else small).
pub fn parse_image_urls(payload: &Value) -> Vec<String> {
    let first_card = match payload.get("data").and_then(|d| d.as_array()) {
        Some(cards) if !cards.is_empty() => &cards[0],
        _ => return Vec::new(),
    };

    first_card
        .get("card_images")
        .and_then(|imgs| imgs.as_array())
        .map(|imgs| {
            imgs.iter()
                .filter_map(|im| {
                    im.get("image_url")
                        .or_else(|| im.get("image_url_small"))
                        .and_then(|u| u.as_str())
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Decode every `card_sets` entry printed under exactly `set_code`.
///
/// Matching is trimmed and case-insensitive; entries without a rarity are skipped.
pub fn parse_rarity_pairs(set_code: &str, payload: &Value) -> Vec<RarityPrice> {
    let wanted = set_code.trim().to_uppercase();
    let mut pairs = Vec::new();

    let cards = match payload.get("data").and_then(|d| d.as_array()) {
        Some(cards) => cards,
        None => return pairs,
    };

    for card in cards {
        let sets = match card.get("card_sets").and_then(|s| s.as_array()) {
            Some(sets) => sets,
            None => continue,
        };
        for cs in sets {
            if str_field(cs, "set_code").to_uppercase() != wanted {
                continue;
            }
            let rarity = str_field(cs, "set_rarity");
            if rarity.is_empty() {
                continue;
            }
            pairs.push(RarityPrice {
                rarity,
                price: price_value(cs.get("set_price")),
            });
        }
    }

    pairs
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

/// YGOPRODeck v7 client (blocking).
#[derive(Clone)]
pub struct YgoProClient {
    http: reqwest::blocking::Client,
    api_base: String,
    metadata_timeout: Duration,
    image_timeout: Duration,
}

impl YgoProClient {
    pub fn new(api_base: &str, metadata_timeout: Duration, image_timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("ygo-library/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::Network(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            metadata_timeout,
            image_timeout,
        })
    }

    /// Client against the public catalog with default timeouts (20s metadata, 30s images)
    pub fn with_defaults() -> Result<Self, CatalogError> {
        Self::new(DEFAULT_CATALOG_URL, Duration::from_secs(20), Duration::from_secs(30))
    }

    pub fn set_info_url(&self, set_code: &str) -> String {
        format!("{}/cardsetsinfo.php?setcode={}", self.api_base, urlencoding::encode(set_code))
    }

    pub fn card_by_id_url(&self, catalog_id: i64) -> String {
        format!("{}/cardinfo.php?id={}", self.api_base, catalog_id)
    }

    pub fn cards_by_set_code_url(&self, set_code: &str) -> String {
        format!("{}/cardinfo.php?setcode={}", self.api_base, urlencoding::encode(set_code))
    }

    /// Strict variant of the rarity-pairs query: transport failures are errors.
    pub fn try_rarity_pairs(&self, set_code: &str) -> Result<Vec<RarityPrice>, CatalogError> {
        let payload = self.get_json(&self.cards_by_set_code_url(set_code))?;
        Ok(parse_rarity_pairs(set_code, &payload))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::blocking::Response, CatalogError> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CatalogError::Network(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response)
    }

    fn get_json(&self, url: &str) -> Result<Value, CatalogError> {
        let response = self.get(url, self.metadata_timeout)?;
        response
            .json::<Value>()
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

impl CatalogSource for YgoProClient {
    fn get_set_info(&self, set_code: &str) -> Result<SetInfo, CatalogError> {
        let url = self.set_info_url(set_code);
        let payload = self.get_json(&url).map_err(|e| {
            log::error!("Set info lookup failed for {} ({}): {}", set_code, url, e);
            e
        })?;
        parse_set_info(set_code, &payload)
    }

    fn get_images(&self, catalog_id: i64) -> Result<Vec<String>, CatalogError> {
        let url = self.card_by_id_url(catalog_id);
        let payload = self.get_json(&url).map_err(|e| {
            log::error!("Image list lookup failed for id {} ({}): {}", catalog_id, url, e);
            e
        })?;
        Ok(parse_image_urls(&payload))
    }

    fn get_rarities_for_set_code(&self, set_code: &str) -> Vec<RarityPrice> {
        if set_code.trim().is_empty() {
            return Vec::new();
        }
        // Unreachable and "no match" look the same to callers; keep the difference in the log
        match self.try_rarity_pairs(set_code) {
            Ok(pairs) => {
                if pairs.is_empty() {
                    log::debug!("No rarity printings found for {}", set_code);
                }
                pairs
            }
            Err(e) => {
                log::warn!("Rarity lookup for {} failed, treating as no data: {}", set_code, e);
                Vec::new()
            }
        }
    }

    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = self.get(url, self.image_timeout)?;
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| CatalogError::Network(e.to_string()))
    }
}

// ============================================================================
// IN-MEMORY CATALOG (tests)
// ============================================================================

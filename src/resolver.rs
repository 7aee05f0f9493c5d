// 🔎 Rarity Resolver - which printings exist for a set code, and what they cost
//
// Built on the catalog's fail-soft rarity-pairs query, so nothing here fails:
// an unreachable catalog simply looks like "no candidates" / "no price".

use crate::catalog::CatalogSource;
use crate::rarity::{rank_candidates, RankedRarity};

pub struct RarityResolver<'a, C: CatalogSource + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: CatalogSource + ?Sized> RarityResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        RarityResolver { catalog }
    }

    /// Distinct rarities printed under `set_code`, with their ranking scores
    pub fn ranked_candidates(&self, set_code: &str) -> Vec<RankedRarity> {
        if set_code.trim().is_empty() {
            return Vec::new();
        }
        let pairs = self.catalog.get_rarities_for_set_code(set_code);
        rank_candidates(pairs.iter().map(|p| p.rarity.as_str()))
    }

    /// Distinct rarity names, most preferred first
    pub fn resolve_candidates(&self, set_code: &str) -> Vec<String> {
        self.ranked_candidates(set_code)
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    /// Price of the exact (set_code, rarity) printing.
    ///
    /// `None` means "unknown", never "free": callers fall back to the set's default price.
    pub fn resolve_price(&self, set_code: &str, rarity: &str) -> Option<f64> {
        let wanted = rarity.trim().to_lowercase();
        if set_code.trim().is_empty() || wanted.is_empty() {
            return None;
        }

        self.catalog
            .get_rarities_for_set_code(set_code)
            .into_iter()
            .find(|p| p.rarity.trim().to_lowercase() == wanted)
            .and_then(|p| p.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::FakeCatalog;

    fn catalog() -> FakeCatalog {
        FakeCatalog::new()
            .with_rarity("RA01-EN001", "Secret Rare", Some(4.0))
            .with_rarity("RA01-EN001", "Common", Some(0.2))
            .with_rarity("RA01-EN001", "Ghost Rare", Some(80.0))
            .with_rarity("RA01-EN001", "Common", Some(0.3))
            .with_rarity("RA01-EN001", "Quarter Century Secret Rare", Some(35.0))
            .with_rarity("BAD-EN001", "Ultra Rare", None)
    }

    #[test]
    fn test_candidates_ranked_and_distinct() {
        let cat = catalog();
        let resolver = RarityResolver::new(&cat);

        assert_eq!(
            resolver.resolve_candidates("RA01-EN001"),
            vec!["Common", "Secret Rare", "Ghost Rare", "Quarter Century Secret Rare"]
        );
    }

    #[test]
    fn test_candidates_empty_when_unknown_or_offline() {
        let mut cat = catalog();
        {
            let resolver = RarityResolver::new(&cat);
            assert!(resolver.resolve_candidates("NOPE-EN001").is_empty());
            assert!(resolver.resolve_candidates("  ").is_empty());
        }

        cat.offline = true;
        let resolver = RarityResolver::new(&cat);
        assert!(resolver.resolve_candidates("RA01-EN001").is_empty());
    }

    #[test]
    fn test_price_exact_case_insensitive_match() {
        let cat = catalog();
        let resolver = RarityResolver::new(&cat);

        assert_eq!(resolver.resolve_price("RA01-EN001", "ghost rare"), Some(80.0));
        assert_eq!(resolver.resolve_price("ra01-en001", " Secret Rare "), Some(4.0));
        // First printing wins on duplicates
        assert_eq!(resolver.resolve_price("RA01-EN001", "Common"), Some(0.2));
    }

    #[test]
    fn test_price_absent_is_none_not_zero() {
        let cat = catalog();
        let resolver = RarityResolver::new(&cat);

        assert_eq!(resolver.resolve_price("RA01-EN001", "Starlight Rare"), None);
        assert_eq!(resolver.resolve_price("RA01-EN001", ""), None);
        assert_eq!(resolver.resolve_price("", "Common"), None);
        // Unreadable catalog price is unknown too
        assert_eq!(resolver.resolve_price("BAD-EN001", "Ultra Rare"), None);
    }
}

// 💎 Rarity vocabulary - aliases, missing-value sentinels, preference ranking
//
// CSV exports from other tools spell rarities loosely ("QCSE", "Collectors Rare").
// Everything here is pure: no I/O, no failure modes.

use std::cmp::Reverse;

// ============================================================================
// ALIASES
// ============================================================================

/// Loose spelling (lowercase, straight apostrophe) → canonical rarity name
const RARITY_ALIASES: &[(&str, &str)] = &[
    ("qcse", "Quarter Century Secret Rare"),
    ("quarter century secret rare", "Quarter Century Secret Rare"),
    ("platinum secret", "Platinum Secret Rare"),
    ("psr", "Platinum Secret Rare"),
    ("collectors rare", "Collector's Rare"),
    ("collector's rare", "Collector's Rare"),
    ("prismatic secret", "Prismatic Secret Rare"),
];

/// Map a loose rarity spelling to its canonical name.
///
/// Input is trimmed; lookup is case-insensitive and treats `’` as `'`.
/// Anything not in the alias table comes back trimmed but otherwise untouched.
///
/// ```
/// use ygo_library::rarity::normalize;
/// assert_eq!(normalize("  QCSE "), "Quarter Century Secret Rare");
/// assert_eq!(normalize("Ultra Rare"), "Ultra Rare");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let key = trimmed.to_lowercase().replace('\u{2019}', "'");
    RARITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

// ============================================================================
// MISSING-VALUE SENTINELS
// ============================================================================

const MISSING_TOKENS: &[&str] = &["", "unknown", "n/a", "na", "none", "null"];

/// True when a rarity value carries no information ("", "Unknown", "N/A", ...)
pub fn is_missing(rarity: &str) -> bool {
    let r = rarity.trim().to_lowercase();
    MISSING_TOKENS.contains(&r.as_str())
}

// ============================================================================
// PREFERENCE RANKING
// ============================================================================

/// Default-selection preference: higher score = more common, offered first.
const RARITY_PREFERENCE: &[(&str, u32)] = &[
    ("Common", 100),
    ("Rare", 90),
    ("Super Rare", 80),
    ("Ultra Rare", 70),
    ("Ultimate Rare", 60),
    ("Secret Rare", 50),
    ("Prismatic Secret Rare", 40),
    ("Collector's Rare", 30),
    ("Starlight Rare", 20),
    ("Ghost Rare", 10),
];

/// Preference score of a rarity, `None` for rarities outside the table
pub fn preference_score(rarity: &str) -> Option<u32> {
    RARITY_PREFERENCE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(rarity.trim()))
        .map(|(_, score)| *score)
}

/// A distinct rarity name with its ranking score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRarity {
    pub name: String,
    pub score: Option<u32>,
}

/// Deduplicate and order rarity names for presentation and default selection.
///
/// Ranked rarities come first, most common first. Unranked rarities follow.
/// Ties (including among unranked names) break lexicographically.
pub fn rank_candidates<I, S>(rarities: I) -> Vec<RankedRarity>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ranked: Vec<RankedRarity> = Vec::new();
    for r in rarities {
        let name = r.as_ref().trim();
        if name.is_empty() || ranked.iter().any(|c| c.name == name) {
            continue;
        }
        ranked.push(RankedRarity {
            name: name.to_string(),
            score: preference_score(name),
        });
    }

    // Unranked (None) must land after every ranked entry
    ranked.sort_by(|a, b| {
        let key_a = (a.score.is_none(), Reverse(a.score));
        let key_b = (b.score.is_none(), Reverse(b.score));
        key_a.cmp(&key_b).then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ranked: &[RankedRarity]) -> Vec<&str> {
        ranked.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_aliases_are_case_insensitive() {
        for (alias, canonical) in RARITY_ALIASES {
            assert_eq!(normalize(alias), *canonical, "alias {}", alias);
            assert_eq!(normalize(&alias.to_uppercase()), *canonical, "alias {}", alias);
        }
    }

    #[test]
    fn test_curly_apostrophe_is_folded() {
        assert_eq!(normalize("Collector\u{2019}s Rare"), "Collector's Rare");
        assert_eq!(normalize("COLLECTORS RARE"), "Collector's Rare");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_unmapped_input_passes_through() {
        for s in ["Ultra Rare", "ghost rare", "Starlight Rare", "weird-Thing"] {
            assert_eq!(normalize(s), s);
        }
        // Only surrounding whitespace is touched
        assert_eq!(normalize("  Super Rare "), "Super Rare");
    }

    #[test]
    fn test_missing_rarity_detection() {
        for s in ["", "Unknown", "N/A", "null", "NONE", "na", "  none  "] {
            assert!(is_missing(s), "{:?} should be missing", s);
        }
        assert!(!is_missing("Rare"));
        assert!(!is_missing("Common"));
    }

    #[test]
    fn test_rank_candidates_orders_by_preference() {
        let ranked = rank_candidates(["Secret Rare", "Common", "Ghost Rare"]);
        assert_eq!(names(&ranked), vec!["Common", "Secret Rare", "Ghost Rare"]);
        assert_eq!(ranked[0].score, Some(100));
    }

    #[test]
    fn test_rank_candidates_unranked_last_and_sorted() {
        let ranked = rank_candidates([
            "Quarter Century Secret Rare",
            "Ultra Rare",
            "Platinum Secret Rare",
            "Rare",
        ]);
        assert_eq!(
            names(&ranked),
            vec![
                "Rare",
                "Ultra Rare",
                "Platinum Secret Rare",
                "Quarter Century Secret Rare",
            ]
        );
        assert_eq!(ranked[3].score, None);
    }

    #[test]
    fn test_rank_candidates_deduplicates() {
        let ranked = rank_candidates(["Rare", "Rare", " Rare ", "Common", ""]);
        assert_eq!(names(&ranked), vec!["Common", "Rare"]);
    }
}

//! Rule-based categorization fallback and amount heuristics
//!
//! These rules answer categorization requests whenever the classifier is
//! untrained, and supply the amount-based override applied on top of model
//! predictions. They are deterministic: identical input always produces
//! identical output.

/// Category labels (the original system is Indonesian-language)
pub const CATEGORY_FOOD: &str = "Makanan";
pub const CATEGORY_TRANSPORT: &str = "Transportasi";
pub const CATEGORY_ENTERTAINMENT: &str = "Hiburan";
pub const CATEGORY_SHOPPING: &str = "Belanja";
pub const CATEGORY_HEALTH: &str = "Kesehatan";
pub const CATEGORY_INVESTMENT: &str = "Investasi";
/// Catch-all category
pub const CATEGORY_OTHER: &str = "Lainnya";

/// Amounts above this are assumed to be big-ticket purchases/investments
/// rather than miscellaneous spend. Tunable; no derivation beyond the
/// original system's choice.
pub const LARGE_AMOUNT_THRESHOLD: f64 = 5_000_000.0;

/// Confidence reported for rule-based answers
pub const RULE_CONFIDENCE: f64 = 0.6;

const FOOD_KEYWORDS: &[&str] = &[
    "makan", "restoran", "warung", "kafe", "minum", "kopi", "makanan", "warteg", "nasi",
];
const TRANSPORT_KEYWORDS: &[&str] = &[
    "bensin", "transport", "gojek", "grab", "taxi", "angkot", "bus", "ojek", "perjalanan",
];
const ENTERTAINMENT_KEYWORDS: &[&str] = &[
    "nonton", "film", "hiburan", "game", "hobi", "travel", "liburan", "hotel",
];
const SHOPPING_KEYWORDS: &[&str] = &[
    "belanja", "mall", "supermarket", "tokopedia", "shopee", "online", "pakaian",
];
const HEALTH_KEYWORDS: &[&str] = &[
    "kesehatan", "dokter", "rumah sakit", "obat", "apotik", "medical",
];

/// Keyword lists checked in fixed priority order; first match wins.
const KEYWORD_RULES: &[(&str, &[&str])] = &[
    (CATEGORY_FOOD, FOOD_KEYWORDS),
    (CATEGORY_TRANSPORT, TRANSPORT_KEYWORDS),
    (CATEGORY_ENTERTAINMENT, ENTERTAINMENT_KEYWORDS),
    (CATEGORY_SHOPPING, SHOPPING_KEYWORDS),
    (CATEGORY_HEALTH, HEALTH_KEYWORDS),
];

/// Categorize a description by keyword matching.
///
/// Falls back to the large-amount investment rule, then the catch-all.
pub fn categorize_by_rules(description: &str, amount: f64) -> &'static str {
    let description_lower = description.to_lowercase();

    for (category, keywords) in KEYWORD_RULES {
        if keywords.iter().any(|kw| description_lower.contains(kw)) {
            return category;
        }
    }

    if amount > LARGE_AMOUNT_THRESHOLD {
        CATEGORY_INVESTMENT
    } else {
        CATEGORY_OTHER
    }
}

/// Override a catch-all prediction for large amounts.
///
/// Large uncategorized amounts are empirically more likely to be big-ticket
/// purchases than miscellaneous spend, so a "Lainnya" prediction above the
/// threshold becomes "Belanja" with at least `confidence_floor` confidence.
/// A deliberate heuristic, not a learned rule.
pub fn override_large_uncategorized(
    category: String,
    confidence: f64,
    amount: f64,
    threshold: f64,
    confidence_floor: f64,
) -> (String, f64) {
    if category == CATEGORY_OTHER && amount > threshold {
        (CATEGORY_SHOPPING.to_string(), confidence.max(confidence_floor))
    } else {
        (category, confidence)
    }
}

/// Fixed numeric encoding used by the anomaly feature vector.
///
/// Unknown or missing categories land in the catch-all bucket.
pub fn category_code(category: Option<&str>) -> u32 {
    match category {
        Some(CATEGORY_FOOD) => 1,
        Some(CATEGORY_TRANSPORT) => 2,
        Some(CATEGORY_SHOPPING) => 3,
        Some(CATEGORY_ENTERTAINMENT) => 4,
        Some(CATEGORY_HEALTH) => 5,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_ignores_amount() {
        assert_eq!(categorize_by_rules("Isi bensin motor", 20_000.0), CATEGORY_TRANSPORT);
        assert_eq!(
            categorize_by_rules("Isi bensin motor", 10_000_000.0),
            CATEGORY_TRANSPORT
        );
        assert_eq!(categorize_by_rules("Makan siang warung", 25_000.0), CATEGORY_FOOD);
        assert_eq!(categorize_by_rules("NONTON FILM", 50_000.0), CATEGORY_ENTERTAINMENT);
        assert_eq!(categorize_by_rules("belanja di mall", 250_000.0), CATEGORY_SHOPPING);
        assert_eq!(categorize_by_rules("beli obat di apotik", 75_000.0), CATEGORY_HEALTH);
    }

    #[test]
    fn test_priority_order() {
        // "makan" (food) wins over "belanja" (shopping) because food is
        // checked first.
        assert_eq!(
            categorize_by_rules("makan setelah belanja", 50_000.0),
            CATEGORY_FOOD
        );
    }

    #[test]
    fn test_large_amount_maps_to_investment() {
        assert_eq!(categorize_by_rules("transfer dana", 6_000_000.0), CATEGORY_INVESTMENT);
        assert_eq!(categorize_by_rules("transfer dana", 4_999_999.0), CATEGORY_OTHER);
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert_eq!(categorize_by_rules("gojek ke kantor", 15_000.0), CATEGORY_TRANSPORT);
        }
    }

    #[test]
    fn test_override_large_uncategorized() {
        let (cat, conf) = override_large_uncategorized(
            CATEGORY_OTHER.to_string(),
            0.4,
            6_000_000.0,
            LARGE_AMOUNT_THRESHOLD,
            0.7,
        );
        assert_eq!(cat, CATEGORY_SHOPPING);
        assert!((conf - 0.7).abs() < 1e-9);

        // Below threshold: untouched
        let (cat, conf) = override_large_uncategorized(
            CATEGORY_OTHER.to_string(),
            0.4,
            100_000.0,
            LARGE_AMOUNT_THRESHOLD,
            0.7,
        );
        assert_eq!(cat, CATEGORY_OTHER);
        assert!((conf - 0.4).abs() < 1e-9);

        // Non catch-all prediction: untouched even for large amounts
        let (cat, conf) = override_large_uncategorized(
            CATEGORY_FOOD.to_string(),
            0.9,
            6_000_000.0,
            LARGE_AMOUNT_THRESHOLD,
            0.7,
        );
        assert_eq!(cat, CATEGORY_FOOD);
        assert!((conf - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_category_code_buckets() {
        assert_eq!(category_code(Some(CATEGORY_FOOD)), 1);
        assert_eq!(category_code(Some(CATEGORY_HEALTH)), 5);
        assert_eq!(category_code(Some("Pendidikan")), 6);
        assert_eq!(category_code(None), 6);
    }
}

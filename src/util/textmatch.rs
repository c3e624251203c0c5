//! Fuzzy string similarity for owner / port / vessel name matching.
//!
//! Implements the ratio family used across identity resolution: plain
//! Levenshtein ratio and token-sort ratio on normalized names. Scores are
//! 0-100 like the conventional fuzz scale.

use std::sync::OnceLock;

use regex::Regex;

// ============================================================================
// Normalization
// ============================================================================

fn suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(LLC|LTD|LIMITED|INC|CORP|CORPORATION|CO|COMPANY|SA|AG|GMBH|OOO|OAO|ZAO|PAO)\b",
        )
        .unwrap_or_else(|_| unreachable!())
    })
}

/// Normalize a company / port / vessel name for comparison.
///
/// Uppercases, strips corporate suffixes, folds non-ASCII letters to their
/// closest ASCII form (covering the Cyrillic names that dominate the data),
/// drops punctuation, and collapses whitespace.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name.chars().map(fold_char).collect();
    let stripped = suffix_regex().replace_all(&folded, " ");
    let mut out = String::with_capacity(stripped.len());
    let mut last_space = true;
    for ch in stripped.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Fold one character to ASCII. Cyrillic letters get standard GOST-style
/// transliteration; Latin letters with diacritics fold to their base form;
/// anything else unmappable becomes a space.
fn fold_char(ch: char) -> char {
    if ch.is_ascii() {
        return ch;
    }
    // Single-char transliterations only; multi-char ones (Ж→ZH etc.) fold to
    // their leading letter, which is adequate for similarity scoring.
    match ch.to_lowercase().next().unwrap_or(ch) {
        'а' => 'a', 'б' => 'b', 'в' => 'v', 'г' => 'g', 'д' => 'd',
        'е' | 'ё' | 'э' => 'e', 'ж' => 'z', 'з' => 'z', 'и' | 'й' => 'i',
        'к' => 'k', 'л' => 'l', 'м' => 'm', 'н' => 'n', 'о' => 'o',
        'п' => 'p', 'р' => 'r', 'с' => 's', 'т' => 't', 'у' => 'u',
        'ф' => 'f', 'х' => 'h', 'ц' => 'c', 'ч' => 'c', 'ш' | 'щ' => 's',
        'ы' => 'y', 'ю' => 'u', 'я' => 'a',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c', 'ñ' => 'n', 'ß' => 's',
        _ => ' ',
    }
}

// ============================================================================
// Ratios
// ============================================================================

/// Levenshtein edit distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity ratio 0-100 based on edit distance over combined length.
pub fn ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100.0;
    }
    let dist = levenshtein(a, b);
    100.0 * (total as f64 - 2.0 * dist as f64).max(0.0) / total as f64
}

/// Token-sort ratio: tokens are sorted before comparison so word order
/// does not matter ("OCEAN STAR SHIPPING" vs "SHIPPING OCEAN STAR").
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_are_100() {
        assert!((ratio("SOVCOMFLOT", "SOVCOMFLOT") - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_sort_handles_word_order() {
        let a = normalize_name("Ocean Star Shipping Ltd");
        let b = normalize_name("Shipping Ocean Star LLC");
        assert!(token_sort_ratio(&a, &b) > 95.0);
    }

    #[test]
    fn test_normalize_strips_suffixes_and_punctuation() {
        assert_eq!(normalize_name("Gazprom-Neft, OOO"), "GAZPROM NEFT");
        assert_eq!(normalize_name("  Sun  Ship Co. "), "SUN SHIP");
    }

    #[test]
    fn test_cyrillic_folding() {
        let a = normalize_name("Совкомфлот");
        assert_eq!(a, "SOVKOMFLOT");
    }

    #[test]
    fn test_dissimilar_names_score_low() {
        assert!(token_sort_ratio("ALPHA MARINE", "ZENITH TANKERS") < 40.0);
    }

    #[test]
    fn test_near_miss_scores_high() {
        // One substitution in a long name.
        assert!(ratio("NOVATEK SHIPPING", "NOVATEC SHIPPING") > 90.0);
    }
}

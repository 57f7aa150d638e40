//! Fuzzy contact-name matching using strsim.
//!
//! Used by `thread <contact>` so "madison", "Madison C" and "Clarke Madison"
//! all find "Madison Clarke".
//!
//! CHANGELOG:
//! - 10/16/2026 - Added first-token strategy, char-based Levenshtein ratio
//! - 01/10/2026 - Initial stub

use strsim::{jaro_winkler, levenshtein, sorensen_dice};

/// Default threshold for fuzzy matching (0.0 - 1.0).
pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Fuzzy match result.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub score: f64,
    pub strategy: &'static str,
}

/// Best score across several strategies, case-insensitive.
pub fn multi_match(query: &str, target: &str) -> FuzzyMatch {
    let query = query.trim().to_lowercase();
    let target = target.trim().to_lowercase();

    let strategies = [
        ("jaro_winkler", jaro_winkler(&query, &target)),
        ("sorensen_dice", sorensen_dice(&query, &target)),
        ("levenshtein", levenshtein_ratio(&query, &target)),
        ("token_sort", token_sort_ratio(&query, &target)),
        ("first_token", first_token_ratio(&query, &target)),
    ];

    strategies
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(strategy, score)| FuzzyMatch { score, strategy })
        .unwrap_or(FuzzyMatch {
            score: 0.0,
            strategy: "none",
        })
}

/// Levenshtein ratio over chars (0.0 - 1.0).
fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Jaro-Winkler after sorting words, so word order does not matter.
fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let mut a_tokens: Vec<&str> = a.split_whitespace().collect();
    let mut b_tokens: Vec<&str> = b.split_whitespace().collect();
    a_tokens.sort_unstable();
    b_tokens.sort_unstable();
    jaro_winkler(&a_tokens.join(" "), &b_tokens.join(" "))
}

/// A single-word query compared against the target's first word only.
fn first_token_ratio(query: &str, target: &str) -> f64 {
    if query.split_whitespace().count() != 1 {
        return 0.0;
    }
    match target.split_whitespace().next() {
        Some(first) => jaro_winkler(query, first),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(multi_match("Madison Clarke", "Madison Clarke").score > 0.99);
    }

    #[test]
    fn test_case_insensitive() {
        assert!(multi_match("madison clarke", "Madison Clarke").score > 0.99);
    }

    #[test]
    fn test_word_order() {
        let result = multi_match("Clarke Madison", "Madison Clarke");
        assert!(result.score >= DEFAULT_THRESHOLD, "Score was {}", result.score);
    }

    #[test]
    fn test_first_name_only() {
        let result = multi_match("madison", "Madison Clarke");
        assert_eq!(result.strategy, "first_token");
        assert!(result.score > 0.99);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        let result = multi_match("Oliver", "Madison Clarke");
        assert!(result.score < DEFAULT_THRESHOLD, "Score was {}", result.score);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(levenshtein_ratio("", ""), 1.0);
        assert_eq!(first_token_ratio("x", ""), 0.0);
    }
}

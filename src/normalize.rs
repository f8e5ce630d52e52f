//! Title normalization shared by every scorer.
//!
//! Both sides of a comparison go through `normalize_title` so that case,
//! punctuation and spacing never count as differences.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize a free-text title for comparison.
///
/// Compatibility-decomposes (NFKD), lower-cases, drops everything that is not
/// alphanumeric or whitespace, then collapses whitespace runs and trims.
/// Combining marks are not alphanumeric, so accents fold away:
/// "Pokémon: Let's Go!" → "pokemon lets go".
pub fn normalize_title(title: &str) -> String {
    let kept: String = title
        .nfkd()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    collapse_whitespace(&kept)
}

/// Collapse whitespace runs into single spaces and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================

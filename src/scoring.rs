//! Scoring functions for picking the best provider result.
//!
//! This module contains:
//! - Popularity normalization relative to the candidate pool
//! - Date proximity scoring with a capped horizon
//! - The weighted best-result selector

use crate::dates::date_distance;
use crate::models::{Candidate, PopularitySignal, ScoredCandidate, Target};
use crate::similarity::title_similarity;

// ============================================================================
// Policy
// ============================================================================

/// Relative weight of each signal in the final score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub title: f64,
    pub date: f64,
    pub popularity: f64,
}

impl ScoringWeights {
    pub const DEFAULT: ScoringWeights = ScoringWeights {
        title: 0.5,
        date: 0.3,
        popularity: 0.2,
    };
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Day distance beyond which date proximity stops mattering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateCap {
    /// 365 days.
    #[default]
    OneYear,
    /// 1095 days, for providers with year-granular dates.
    ThreeYears,
}

impl DateCap {
    pub const fn days(self) -> u64 {
        match self {
            DateCap::OneYear => 365,
            DateCap::ThreeYears => 1095,
        }
    }
}

/// Weights plus date horizon. Fixed per provider integration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoringPolicy {
    pub weights: ScoringWeights,
    pub date_cap: DateCap,
}

impl ScoringPolicy {
    pub fn with_date_cap(date_cap: DateCap) -> Self {
        Self {
            weights: ScoringWeights::DEFAULT,
            date_cap,
        }
    }
}

// ============================================================================
// Popularity
// ============================================================================

/// Denominator for popularity normalization.
///
/// The largest `RatingCount` in the pool when any candidate has one,
/// otherwise 1 (popularity floats are already on a 0..100 scale).
pub fn pool_max(candidates: &[Candidate]) -> f64 {
    candidates
        .iter()
        .filter_map(|c| match c.popularity {
            Some(PopularitySignal::RatingCount(n)) => Some(n),
            _ => None,
        })
        .max()
        .filter(|&n| n > 0)
        .map_or(1.0, |n| n as f64)
}

/// Candidate popularity in [0, 1] relative to `pool_max`.
pub fn popularity_score(candidate: &Candidate, pool_max: f64) -> f64 {
    let raw = match candidate.popularity {
        Some(PopularitySignal::Popularity(p)) => p / 100.0,
        Some(PopularitySignal::RatingCount(n)) => n as f64,
        None => 0.0,
    };
    let max = if pool_max > 0.0 { pool_max } else { 1.0 };
    let score = raw / max;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Date Proximity
// ============================================================================

/// 1 for a same-day match, falling linearly to 0 at the cap.
/// No target date, or no usable candidate date, scores 0.
pub fn date_score(target_date: Option<&str>, candidate_date: Option<&str>, cap: DateCap) -> f64 {
    let Some(target_date) = target_date else {
        return 0.0;
    };
    let cap_days = cap.days();
    match date_distance(target_date, candidate_date) {
        Some(days) => 1.0 - days.min(cap_days) as f64 / cap_days as f64,
        None => 0.0,
    }
}

// ============================================================================
// Combined Scoring
// ============================================================================

/// Score one candidate against the target.
pub fn score_candidate<'a>(
    candidate: &'a Candidate,
    target: &Target,
    policy: &ScoringPolicy,
    pool_max: f64,
) -> ScoredCandidate<'a> {
    let title_score = title_similarity(&target.title, &candidate.title);
    let date_score = date_score(
        target.date.as_deref(),
        candidate.release_date.as_deref(),
        policy.date_cap,
    );
    let popularity_score = popularity_score(candidate, pool_max);

    let w = policy.weights;
    let final_score =
        w.title * title_score + w.date * date_score + w.popularity * popularity_score;

    ScoredCandidate {
        candidate,
        title_score,
        date_score,
        popularity_score,
        final_score,
    }
}

/// Score every candidate in input order.
pub fn score_all<'a>(
    candidates: &'a [Candidate],
    target: &Target,
    policy: &ScoringPolicy,
) -> Vec<ScoredCandidate<'a>> {
    let max = pool_max(candidates);
    candidates
        .iter()
        .map(|c| score_candidate(c, target, policy, max))
        .collect()
}

/// Pick the single best candidate for `target`.
///
/// - Empty pool → `None` (nothing found).
/// - One candidate → returned as is, however poorly it matches.
/// - Otherwise the strictly highest finite score wins; ties keep the earlier
///   candidate. If no score is finite the first candidate is returned.
pub fn select_best<'a>(
    candidates: &'a [Candidate],
    target: &Target,
    policy: &ScoringPolicy,
) -> Option<&'a Candidate> {
    match candidates {
        [] => return None,
        [only] => return Some(only),
        _ => {}
    }

    let mut best: Option<ScoredCandidate<'a>> = None;
    for scored in score_all(candidates, target, policy) {
        if !scored.final_score.is_finite() {
            continue;
        }
        if best.map_or(true, |b| scored.final_score > b.final_score) {
            best = Some(scored);
        }
    }

    best.map(|b| b.candidate).or_else(|| candidates.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ScoringPolicy {
        ScoringPolicy::default()
    }

    #[test]
    fn test_default_policy_constants() {
        let p = policy();
        assert_eq!(p.weights, ScoringWeights { title: 0.5, date: 0.3, popularity: 0.2 });
        assert_eq!(p.date_cap.days(), 365);
        assert_eq!(DateCap::ThreeYears.days(), 1095);
    }

    #[test]
    fn test_empty_pool_is_none() {
        assert!(select_best(&[], &Target::new("Dune", Some("2021-10-22")), &policy()).is_none());
    }

    #[test]
    fn test_single_candidate_short_circuits() {
        let only = vec![Candidate::new("Completely Unrelated").with_id("7")];
        let picked = select_best(&only, &Target::new("Dune", Some("1999-01-01")), &policy());
        assert_eq!(picked.and_then(|c| c.id.as_deref()), Some("7"));

        let untitled = vec![Candidate::new("")];
        assert!(select_best(&untitled, &Target::new("", None), &policy()).is_some());
    }

    #[test]
    fn test_exact_title_wins() {
        let pool = vec![
            Candidate::new("Dune Part Two").with_id("sequel"),
            Candidate::new("Dune").with_id("exact"),
        ];
        let picked = select_best(&pool, &Target::new("Dune", None), &policy()).unwrap();
        assert_eq!(picked.id.as_deref(), Some("exact"));
    }

    #[test]
    fn test_tie_keeps_first() {
        let pool = vec![
            Candidate::new("Dune").with_id("first"),
            Candidate::new("Dune").with_id("second"),
        ];
        let picked = select_best(&pool, &Target::new("Dune", None), &policy()).unwrap();
        assert_eq!(picked.id.as_deref(), Some("first"));
    }

    #[test]
    fn test_closer_date_wins() {
        let pool = vec![
            Candidate::new("Halo").with_id("later").with_release_date("2021-01-01"),
            Candidate::new("Halo").with_id("closer").with_release_date("2020-01-01"),
        ];
        let target = Target::new("Halo", Some("2020-01-10"));
        let picked = select_best(&pool, &target, &policy()).unwrap();
        assert_eq!(picked.id.as_deref(), Some("closer"));
    }

    #[test]
    fn test_popularity_breaks_equal_titles() {
        let pool = vec![
            Candidate::new("It").with_id("obscure").with_popularity(PopularitySignal::Popularity(3.0)),
            Candidate::new("It").with_id("famous").with_popularity(PopularitySignal::Popularity(80.0)),
        ];
        let picked = select_best(&pool, &Target::new("It", None), &policy()).unwrap();
        assert_eq!(picked.id.as_deref(), Some("famous"));
    }

    #[test]
    fn test_pool_max_prefers_rating_counts() {
        let pool = vec![
            Candidate::new("a").with_popularity(PopularitySignal::RatingCount(40)),
            Candidate::new("b").with_popularity(PopularitySignal::RatingCount(200)),
            Candidate::new("c").with_popularity(PopularitySignal::Popularity(55.0)),
        ];
        assert_eq!(pool_max(&pool), 200.0);
        assert!((popularity_score(&pool[0], 200.0) - 0.2).abs() < 1e-9);
        assert_eq!(popularity_score(&pool[1], 200.0), 1.0);
    }

    #[test]
    fn test_pool_max_defaults_to_one() {
        let pool = vec![
            Candidate::new("a"),
            Candidate::new("b").with_popularity(PopularitySignal::Popularity(12.0)),
            Candidate::new("c").with_popularity(PopularitySignal::RatingCount(0)),
        ];
        assert_eq!(pool_max(&pool), 1.0);
        assert!((popularity_score(&pool[1], 1.0) - 0.12).abs() < 1e-9);
        assert_eq!(popularity_score(&pool[0], 1.0), 0.0);
    }

    #[test]
    fn test_popularity_score_bounded() {
        let loud = Candidate::new("x").with_popularity(PopularitySignal::Popularity(5000.0));
        let negative = Candidate::new("y").with_popularity(PopularitySignal::Popularity(-4.0));
        let nan = Candidate::new("z").with_popularity(PopularitySignal::Popularity(f64::NAN));
        assert_eq!(popularity_score(&loud, 1.0), 1.0);
        assert_eq!(popularity_score(&negative, 1.0), 0.0);
        assert_eq!(popularity_score(&nan, 1.0), 0.0);
        assert_eq!(popularity_score(&loud, 0.0), 1.0);
    }

    #[test]
    fn test_date_score_cap() {
        assert_eq!(date_score(None, Some("2020-01-01"), DateCap::OneYear), 0.0);
        assert_eq!(date_score(Some("2020-01-01"), Some("2020-01-01"), DateCap::OneYear), 1.0);
        assert_eq!(date_score(Some("2020-01-01"), Some("2025-01-01"), DateCap::OneYear), 0.0);
        assert_eq!(date_score(Some("2020-01-01"), None, DateCap::OneYear), 0.0);

        let two_years = date_score(Some("2020-01-01"), Some("2022-01-01"), DateCap::ThreeYears);
        assert!(two_years > 0.3 && two_years < 0.4);
    }

    #[test]
    fn test_unparseable_fields_degrade_gracefully() {
        let pool = vec![
            Candidate::new("").with_release_date("not a date"),
            Candidate::new("???").with_release_date("20xx"),
        ];
        let picked = select_best(&pool, &Target::new("Anything", Some("garbage")), &policy());
        assert!(picked.is_some());
    }

    #[test]
    fn test_candidates_unchanged_by_selection() {
        let pool = vec![
            Candidate::new("Dune").with_release_date("2021-10-22"),
            Candidate::new("Dune").with_release_date("1984-12-14"),
        ];
        let before = format!("{pool:?}");
        let _ = select_best(&pool, &Target::new("Dune", Some("1984-12-01")), &policy());
        assert_eq!(format!("{pool:?}"), before);
    }

    #[test]
    fn test_score_all_breakdown() {
        let pool = vec![
            Candidate::new("Dune").with_release_date("2021-10-22"),
            Candidate::new("Dune Part Two").with_release_date("2024-03-01"),
        ];
        let scored = score_all(&pool, &Target::new("Dune", Some("2021-10-22")), &policy());
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].title_score, 1.0);
        assert_eq!(scored[0].date_score, 1.0);
        assert!((scored[0].final_score - 0.8).abs() < 1e-9);
        assert!(scored[1].final_score < scored[0].final_score);
    }
}

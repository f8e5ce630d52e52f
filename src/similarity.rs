//! Title similarity: Ratcliff/Obershelp sequence matching plus a
//! containment bonus for titles that embed one another.

use crate::normalize::normalize_title;

/// Weight of the substring-containment bonus in `title_similarity`.
pub const CONTAINMENT_BONUS: f64 = 0.3;

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
///
/// Among blocks of equal length the one ending first in `a` (then in `b`)
/// wins, so results are deterministic for a given argument order.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let jj = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[jj - 1] + 1;
                cur[jj] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[jj] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

/// Total number of characters covered by the recursive matching blocks.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        pending.push((alo, i, blo, j));
        pending.push((i + k, ahi, j + k, bhi));
    }

    total
}

/// Ratcliff/Obershelp similarity `2*M / T` in [0, 1].
///
/// Two empty strings are identical (1.0); one empty string matches nothing.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Similarity between two free-text titles in [0, 1].
///
/// Identical normalized forms score exactly 1.0. Otherwise the sequence
/// ratio is taken over the pair in lexicographic order (block choice is
/// order-dependent, the score must not be), and a title that literally
/// contains the other is pulled toward 1 by `CONTAINMENT_BONUS`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_title(a);
    let b = normalize_title(b);

    if a == b {
        return 1.0;
    }

    let (first, second) = if a <= b { (&a, &b) } else { (&b, &a) };
    let ratio = sequence_ratio(first, second);

    let contained = !first.is_empty()
        && !second.is_empty()
        && (first.contains(second.as_str()) || second.contains(first.as_str()));

    if contained {
        (ratio + CONTAINMENT_BONUS) / (1.0 + CONTAINMENT_BONUS)
    } else {
        ratio
    }
}

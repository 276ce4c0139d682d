//! Fuzzy string similarity.
//!
//! `similarity(a, b) = 2 * LCS(a, b) / (|a| + |b|)` over case-folded
//! characters, where LCS is the longest common subsequence. The score is
//! symmetric, lies in `[0.0, 1.0]`, is `1.0` for equal strings (and for two
//! empty strings), and degrades gently for one or two dropped or swapped
//! characters: `"ENOENT"` vs `"ENOETN"` scores `0.83`.

/// Scores below this are not considered a match.
///
/// Dropping two characters from a six letter errno name scores 0.8, and an
/// unrelated pair of errno names sharing only the leading `E` scores under
/// 0.4, so 0.6 separates typos from different names with room on each side.
pub const FUZZY_THRESHOLD: f64 = 0.6;

/// Similarity of two strings, ignoring ASCII case.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().map(|c| c.to_ascii_lowercase()).collect();
    let b: Vec<char> = b.chars().map(|c| c.to_ascii_lowercase()).collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Length of the longest common subsequence, two-row dynamic program.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Best candidate scoring at least `threshold`.
///
/// Ties keep the earliest candidate, so table order decides.
pub fn best_match<'a, T, I, F>(needle: &str, candidates: I, key: F, threshold: f64) -> Option<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> &str,
    T: 'a,
{
    let mut best: Option<(&'a T, f64)> = None;
    for cand in candidates {
        let score = similarity(needle, key(cand));
        if score < threshold {
            continue;
        }
        match best {
            Some((_, s)) if s >= score => {}
            _ => best = Some((cand, score)),
        }
    }
    best.map(|(c, _)| c)
}

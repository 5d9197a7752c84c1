// Edit-distance similarity between two messages, as a whole percentage.

/// Score `a` against `b` on a 0-100 scale.
///
/// Equal strings score 100. Strings whose lengths differ by more than 30% of
/// the longer one are rejected with 0 before any distance is computed.
/// Otherwise the score is `round(100 * (max_len - distance) / max_len)`.
pub fn similarity(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    let len_diff = a.len().abs_diff(b.len());

    // len_diff > 0.3 * max_len, kept in integers
    if len_diff * 10 > max_len * 3 {
        return 0;
    }

    let distance = levenshtein(&a, &b);
    let kept = (max_len - distance) as f64;
    (100.0 * kept / max_len as f64).round() as u8
}

/// Unit-cost insert/delete/substitute distance, two rows at a time.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

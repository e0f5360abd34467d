//! Maximal marginal relevance

/// Simple cosine similarity calculation
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Pick `k` candidate indices balancing similarity to the query against
/// similarity to already picked candidates.
///
/// `lambda = 1.0` is plain similarity ranking, `lambda = 0.0` maximises diversity.
/// The most similar candidate is always picked first.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let query_similarity: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k.min(candidates.len()) {
        let mut best: Option<(usize, f32)> = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            if selected.contains(&idx) {
                continue;
            }

            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(candidate, &candidates[s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if redundancy.is_finite() { redundancy } else { 0.0 };

            let score = lambda * query_similarity[idx] - (1.0 - lambda) * redundancy;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, _)) => selected.push(idx),
            None => break,
        }
    }

    selected
}

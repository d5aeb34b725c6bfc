//! Maximal marginal relevance selection.
//!
//! MMR greedily picks the candidate that maximises
//! `lambda * sim(query, c) - (1 - lambda) * max_{s in selected} sim(c, s)`,
//! trading relevance to the query against redundancy with earlier picks.

use tracing::debug;

use crate::error::Result;
use crate::math::cosine_similarity;

/// Select up to `k` indices into `candidates` using maximal marginal relevance.
///
/// The first pick is always the candidate most similar to the query. Ties are
/// broken in favour of the lowest index. The returned order is selection order.
///
/// * `lambda_mult = 1.0` is plain relevance ranking.
/// * `lambda_mult = 0.0` picks the best match first, then minimises redundancy.
///
/// # Errors
///
/// Returns [`DimensionMismatch`](crate::WeaviateError::DimensionMismatch) if
/// any candidate's length differs from the query's.
///
/// # Example
///
/// ```rust
/// use adk_weaviate::maximal_marginal_relevance;
///
/// let query = [1.0, 0.0];
/// let candidates = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![-1.0, 0.0]];
/// let selected = maximal_marginal_relevance(&query, &candidates, 2, 0.5).unwrap();
/// assert_eq!(selected, vec![0, 1]);
/// ```
pub fn maximal_marginal_relevance(
    query_embedding: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda_mult: f32,
) -> Result<Vec<usize>> {
    if candidates.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let similarity_to_query = candidates
        .iter()
        .map(|candidate| cosine_similarity(query_embedding, candidate))
        .collect::<Result<Vec<f32>>>()?;

    let Some(first) = argmax(similarity_to_query.iter().copied().enumerate()) else {
        return Ok(Vec::new());
    };

    let mut selected = Vec::with_capacity(k.min(candidates.len()));
    selected.push(first);

    let mut remaining: Vec<usize> = (0..candidates.len()).filter(|&i| i != first).collect();
    // Running max similarity of each candidate to anything selected so far.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut newest = first;

    while selected.len() < k && !remaining.is_empty() {
        for &i in &remaining {
            let sim = cosine_similarity(&candidates[i], &candidates[newest])?;
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }

        let scored = remaining.iter().map(|&i| {
            let score =
                lambda_mult * similarity_to_query[i] - (1.0 - lambda_mult) * redundancy[i];
            (i, score)
        });
        let Some(best) = argmax(scored) else {
            break;
        };

        remaining.retain(|&i| i != best);
        selected.push(best);
        newest = best;
    }

    debug!(pool = candidates.len(), k, lambda_mult, selected = selected.len(), "mmr selection");
    Ok(selected)
}

/// Index of the largest score. Earlier entries win ties; NaN ranks lowest.
fn argmax(scores: impl Iterator<Item = (usize, f32)>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, score) in scores {
        let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

use crate::document::Chunk;
use crate::index::Index;
use crate::vectorizer::SparseVector;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub score: f64,
    /// Position of the chunk in the index.
    pub position: usize,
    pub chunk: &'a Chunk,
}

fn max_abs<'a>(weights: impl Iterator<Item = &'a f64>) -> f64 {
    weights.fold(0.0, |m, w| m.max(w.abs()))
}

/// `dot / (|a| * |b|)` over values already divided by each vector's largest magnitude, so
/// squaring can neither overflow nor underflow to zero.
fn scaled_cosine(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_finite() { score.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Cosine similarity of two sparse vectors; 0.0 when either has zero norm.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let (sa, sb) = (max_abs(a.values()), max_abs(b.values()));
    if sa == 0.0 || sb == 0.0 || !sa.is_finite() || !sb.is_finite() {
        return 0.0;
    }
    // rounding would otherwise leave self-similarity a hair under 1.0
    if std::ptr::eq(a, b) || a == b {
        return 1.0;
    }
    let norm_a: f64 = a.values().map(|w| (w / sa) * (w / sa)).sum();
    let norm_b: f64 = b.values().map(|w| (w / sb) * (w / sb)).sum();
    let (small, large, s_small, s_large) = if a.len() <= b.len() { (a, b, sa, sb) } else { (b, a, sb, sa) };
    let dot: f64 = small
        .iter()
        .filter_map(|(t, w)| large.get(t).map(|o| (w / s_small) * (o / s_large)))
        .sum();
    scaled_cosine(dot, norm_a, norm_b)
}

/// Dense counterpart of [`cosine_similarity`] with the same zero-norm rule. Accumulates in f64.
pub fn dense_cosine(a: &[f32], b: &[f32]) -> f32 {
    let sa = a.iter().fold(0.0f64, |m, x| m.max((*x as f64).abs()));
    let sb = b.iter().fold(0.0f64, |m, x| m.max((*x as f64).abs()));
    if sa == 0.0 || sb == 0.0 || !sa.is_finite() || !sb.is_finite() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let norm_a: f64 = a.iter().map(|x| (*x as f64 / sa).powi(2)).sum();
    let norm_b: f64 = b.iter().map(|x| (*x as f64 / sb).powi(2)).sum();
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64 / sa) * (*y as f64 / sb)).sum();
    scaled_cosine(dot, norm_a, norm_b) as f32
}

/// Sort `(position, score)` pairs by descending score. The sort is stable, so equal
/// scores stay in position order.
fn top_k_by_score(mut scored: Vec<(usize, f64)>, top_k: usize) -> Vec<(usize, f64)> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

/// Score `query` against every chunk of `index` and keep the best `top_k`.
pub fn rank<'a>(query: &SparseVector, index: &'a Index, top_k: usize) -> Vec<ScoredChunk<'a>> {
    let scored = index
        .vectors()
        .iter()
        .enumerate()
        .map(|(pos, v)| (pos, cosine_similarity(query, v)))
        .collect();
    top_k_by_score(scored, top_k)
        .into_iter()
        .map(|(position, score)| ScoredChunk { score, position, chunk: &index.chunks()[position] })
        .collect()
}

/// Rank dense vectors; returns `(position, score)` pairs.
pub fn rank_dense(query: &[f32], vectors: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let scored = vectors.iter().enumerate().map(|(pos, v)| (pos, dense_cosine(query, v) as f64)).collect();
    top_k_by_score(scored, top_k).into_iter().map(|(pos, score)| (pos, score as f32)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::TermStats;

    fn sv(pairs: &[(&str, f64)]) -> SparseVector {
        pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    fn index_of(vectors: Vec<SparseVector>) -> Index {
        let chunks = (0..vectors.len())
            .map(|i| Chunk { document_id: format!("d{i}"), ordinal: 0, text: String::new() })
            .collect();
        Index::new(chunks, vectors, TermStats::default()).unwrap()
    }

    #[test]
    fn zero_vectors_score_zero() {
        let a = sv(&[("x", 1.0)]);
        assert_eq!(cosine_similarity(&a, &SparseVector::new()), 0.0);
        assert_eq!(cosine_similarity(&SparseVector::new(), &SparseVector::new()), 0.0);
        assert_eq!(dense_cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn self_similarity_is_exactly_one() {
        let a = sv(&[("x", 0.3), ("y", 0.7), ("z", 1e-3)]);
        assert_eq!(cosine_similarity(&a, &a), 1.0);
        assert_eq!(cosine_similarity(&a, &a.clone()), 1.0);
    }

    #[test]
    fn orthogonal_and_partial_overlap() {
        let a = sv(&[("x", 1.0)]);
        let b = sv(&[("y", 1.0)]);
        let c = sv(&[("x", 1.0), ("y", 1.0)]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert!((cosine_similarity(&a, &c) - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_index_order() {
        let idx = index_of(vec![sv(&[("y", 1.0)]), sv(&[("x", 1.0)]), sv(&[("x", 2.0)]), sv(&[("z", 1.0)])]);
        let ranked = rank(&sv(&[("x", 1.0)]), &idx, 10);
        let positions: Vec<usize> = ranked.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2, 0, 3]);
    }

    #[test]
    fn top_k_truncates_and_tolerates_large_k() {
        let idx = index_of(vec![sv(&[("x", 1.0)]), sv(&[("y", 1.0)])]);
        assert_eq!(rank(&sv(&[("y", 1.0)]), &idx, 1)[0].position, 1);
        assert_eq!(rank(&sv(&[("y", 1.0)]), &idx, 50).len(), 2);
        assert!(rank(&sv(&[("y", 1.0)]), &idx, 0).is_empty());
    }

    #[test]
    fn huge_weights_stay_in_range() {
        let a = sv(&[("a", 1e200)]);
        let b = sv(&[("a", 1e200), ("b", 1.0)]);
        let s = cosine_similarity(&a, &b);
        assert!((s - 1.0).abs() < 1e-12 && s <= 1.0);
        let tiny = cosine_similarity(&sv(&[("a", 1e-300)]), &sv(&[("a", 2e-300), ("b", 2e-300)]));
        assert!((tiny - 1.0 / 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(cosine_similarity(&sv(&[("a", f64::INFINITY)]), &a), 0.0);

        assert_eq!(dense_cosine(&[1e20, 0.0], &[1e20, 0.0]), 1.0);
        assert!((dense_cosine(&[1e20, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(dense_cosine(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn huge_dense_vectors_rank_by_direction() {
        let vectors = vec![vec![0.0, 1.0], vec![1e20, 0.0], vec![1.0, 0.0]];
        let ranked = rank_dense(&[1e20, 0.0], &vectors, 3);
        assert_eq!(ranked.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert!(ranked.iter().all(|r| r.1.is_finite()));
        assert_eq!(ranked[0].1, 1.0);
    }

    #[test]
    fn dense_ranking_orders_by_score() {
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let ranked = rank_dense(&[1.0, 0.0], &vectors, 3);
        assert_eq!(ranked.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2, 0]);
    }
}

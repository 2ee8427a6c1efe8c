use factgraph_core::model::FeatureMatrix;
use std::cmp::Ordering;

/// Neighbor node index and its cosine similarity to the query row.
pub type Neighbor = (usize, f32);

/// Exact top-k over a materialized `n x n` similarity matrix. Only call this
/// below the configured node-count threshold.
pub fn dense_top_k(normalized: &FeatureMatrix, k: usize) -> Vec<Vec<Neighbor>> {
    let n = normalized.rows();
    let mut sims = vec![0.0f32; n * n];
    for i in 0..n {
        sims[i * n + i] = f32::NEG_INFINITY;
        for j in (i + 1)..n {
            let s = dot(normalized.row(i), normalized.row(j));
            sims[i * n + j] = s;
            sims[j * n + i] = s;
        }
    }

    sims.chunks_exact(n.max(1))
        .take(n)
        .map(|row| {
            let candidates = row.iter().copied().enumerate().collect();
            select_top_k(candidates, k)
        })
        .collect()
}

/// Exact top-k scoring one row at a time; memory stays `O(n)` per row.
pub fn streaming_top_k(normalized: &FeatureMatrix, k: usize) -> Vec<Vec<Neighbor>> {
    let n = normalized.rows();
    (0..n)
        .map(|i| {
            let query = normalized.row(i);
            let candidates = (0..n)
                .filter(|j| *j != i)
                .map(|j| (j, dot(query, normalized.row(j))))
                .collect();
            select_top_k(candidates, k)
        })
        .collect()
}

/// Higher similarity first; equal similarity resolves to the lower index.
pub fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

fn select_top_k(mut candidates: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    if k == 0 {
        return Vec::new();
    }
    if k < candidates.len() {
        candidates.select_nth_unstable_by(k - 1, rank);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(rank);
    candidates
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    // `+ 0.0` folds -0.0 into +0.0 so total_cmp sees zero similarities as ties.
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() + 0.0
}

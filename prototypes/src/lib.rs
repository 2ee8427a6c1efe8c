//! Synthetic inputs shared by the benchmarks.

use factgraph_core::embedding::deterministic_embedding;
use factgraph_core::model::FeatureMatrix;
use factgraph_core::record::PostRecord;
use std::env;

const LABELS: [&str; 6] = ["TRUE", "MOSTLY_TRUE", "HALF_TRUE", "BARELY_TRUE", "FALSE", "PANTS_ON_FIRE"];
const SPLITS: [&str; 3] = ["train", "val", "test"];

pub fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// `n` hash-derived rows of width `dim`; the same arguments give the same matrix.
pub fn synthetic_embeddings(n: usize, dim: usize) -> FeatureMatrix {
    let rows = (0..n)
        .map(|i| deterministic_embedding(&format!("bench-node-{i}"), "bench", dim))
        .collect();
    FeatureMatrix::from_rows(dim, rows).expect("synthetic rows are generated at the requested width")
}

/// Labeled posts cycling through every label and an 8/1/1 split.
pub fn synthetic_corpus(n: usize) -> Vec<PostRecord> {
    (0..n)
        .map(|i| {
            let split = match i % 10 {
                8 => SPLITS[1],
                9 => SPLITS[2],
                _ => SPLITS[0],
            };
            PostRecord::new(format!("post-{i}"), format!("synthetic claim {i} about topic {}", i % 17))
                .with_label(LABELS[i % LABELS.len()])
                .with_split(split)
        })
        .collect()
}

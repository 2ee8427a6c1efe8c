//! Approximate nearest-neighbor search over L2-normalized rows.
//!
//! Backed by usearch's HNSW index with inner-product distance when the `hnsw`
//! feature is enabled on a supported target. Without it, [`is_available`]
//! reports false and callers fall back to exact search.

use crate::index::exact::Neighbor;
use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::model::FeatureMatrix;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnError {
    #[error("approximate index backend is not compiled in")]
    Unavailable,
    #[error("approximate index backend failed: {0}")]
    Backend(String),
}

impl FactgraphError for AnnError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::Internal
    }
}

pub fn is_available() -> bool {
    cfg!(all(feature = "hnsw", not(target_os = "macos")))
}

/// Queries every row for its `count` nearest rows, self included. Each result
/// list is ordered by similarity, highest first.
pub fn search_all(normalized: &FeatureMatrix, count: usize) -> Result<Vec<Vec<Neighbor>>, AnnError> {
    backend::search_all(normalized, count)
}

#[cfg(all(feature = "hnsw", not(target_os = "macos")))]
mod backend {
    use super::AnnError;
    use crate::index::exact::{rank, Neighbor};
    use factgraph_core::model::FeatureMatrix;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    pub fn search_all(
        normalized: &FeatureMatrix,
        count: usize,
    ) -> Result<Vec<Vec<Neighbor>>, AnnError> {
        let options = IndexOptions {
            dimensions: normalized.dim(),
            metric: MetricKind::IP,
            quantization: ScalarKind::F32,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(backend_error)?;
        index.reserve(normalized.rows()).map_err(backend_error)?;
        for (key, row) in normalized.iter_rows().enumerate() {
            index.add(key as u64, row).map_err(backend_error)?;
        }

        normalized
            .iter_rows()
            .map(|row| {
                let matches = index.search(row, count).map_err(backend_error)?;
                // Inner-product distance is `1 - dot`.
                let mut neighbors: Vec<Neighbor> = matches
                    .keys
                    .iter()
                    .zip(matches.distances.iter())
                    .map(|(key, distance)| (*key as usize, 1.0 - *distance + 0.0))
                    .collect();
                neighbors.sort_by(rank);
                Ok(neighbors)
            })
            .collect()
    }

    fn backend_error(e: impl std::fmt::Display) -> AnnError {
        AnnError::Backend(e.to_string())
    }
}

#[cfg(not(all(feature = "hnsw", not(target_os = "macos"))))]
mod backend {
    use super::AnnError;
    use crate::index::exact::Neighbor;
    use factgraph_core::model::FeatureMatrix;

    pub fn search_all(
        _normalized: &FeatureMatrix,
        _count: usize,
    ) -> Result<Vec<Vec<Neighbor>>, AnnError> {
        Err(AnnError::Unavailable)
    }
}

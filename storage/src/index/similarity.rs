use crate::index::ann::{self, AnnError};
use crate::index::exact::{self, Neighbor};
use factgraph_core::config::{SimilarityConfig, SimilarityMode};
use factgraph_core::model::{EdgeIndex, EdgeType, FeatureMatrix};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Full similarity matrix; only below the node-count threshold.
    DenseExact,
    /// Exact search one row at a time.
    StreamingExact,
    /// ANN index queried for `k + 1` results, first result dropped.
    Approximate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InducedEdges {
    pub edge_index: EdgeIndex,
    pub edge_types: Vec<EdgeType>,
    /// Cosine similarity of each edge, parallel to `edge_index`.
    pub scores: Vec<f32>,
    pub strategy: Option<SearchStrategy>,
}

impl InducedEdges {
    fn empty() -> Self {
        Self {
            edge_index: EdgeIndex::new(),
            edge_types: Vec::new(),
            scores: Vec::new(),
            strategy: None,
        }
    }

    pub fn len(&self) -> usize {
        self.edge_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_index.is_empty()
    }
}

/// Derives directed top-K cosine-similarity edges from an embedding matrix.
#[derive(Debug, Clone)]
pub struct SimilarityEdgeInducer {
    exact_threshold: usize,
    mode: SimilarityMode,
}

impl SimilarityEdgeInducer {
    pub fn new(exact_threshold: usize, mode: SimilarityMode) -> Self {
        Self {
            exact_threshold,
            mode,
        }
    }

    pub fn from_config(config: &SimilarityConfig) -> Self {
        Self::new(config.exact_threshold, config.mode)
    }

    /// Strategy for `n` nodes, before any backend fallback.
    pub fn select_strategy(&self, n: usize) -> SearchStrategy {
        let below_threshold = n < self.exact_threshold;
        match self.mode {
            SimilarityMode::Auto if below_threshold => SearchStrategy::DenseExact,
            SimilarityMode::Auto => SearchStrategy::Approximate,
            SimilarityMode::Exact if below_threshold => SearchStrategy::DenseExact,
            SimilarityMode::Exact => SearchStrategy::StreamingExact,
            SimilarityMode::Approximate => SearchStrategy::Approximate,
        }
    }

    fn exact_strategy(&self, n: usize) -> SearchStrategy {
        if n < self.exact_threshold {
            SearchStrategy::DenseExact
        } else {
            SearchStrategy::StreamingExact
        }
    }

    pub fn induce(&self, embeddings: &FeatureMatrix, k: usize, edge_type: EdgeType) -> InducedEdges {
        self.induce_with(embeddings, k, edge_type, ann::search_all)
    }

    /// `approximate` answers the ANN query; any error from it falls back to exact search.
    fn induce_with<F>(
        &self,
        embeddings: &FeatureMatrix,
        k: usize,
        edge_type: EdgeType,
        approximate: F,
    ) -> InducedEdges
    where
        F: FnOnce(&FeatureMatrix, usize) -> Result<Vec<Vec<Neighbor>>, AnnError>,
    {
        let n = embeddings.rows();
        let k = k.min(n.saturating_sub(1));
        if k == 0 {
            return InducedEdges::empty();
        }

        let normalized = embeddings.l2_normalized();
        let mut strategy = self.select_strategy(n);

        let neighbors = match strategy {
            SearchStrategy::DenseExact => exact::dense_top_k(&normalized, k),
            SearchStrategy::StreamingExact => exact::streaming_top_k(&normalized, k),
            SearchStrategy::Approximate => match approximate(&normalized, k + 1) {
                Ok(rows) => drop_first_result(rows, k),
                Err(e) => {
                    strategy = self.exact_strategy(n);
                    warn!(error = %e, ?strategy, nodes = n, "approximate search unavailable, falling back to exact");
                    match strategy {
                        SearchStrategy::DenseExact => exact::dense_top_k(&normalized, k),
                        _ => exact::streaming_top_k(&normalized, k),
                    }
                }
            },
        };

        let mut induced = InducedEdges {
            edge_index: EdgeIndex::with_capacity(n * k),
            edge_types: Vec::with_capacity(n * k),
            scores: Vec::with_capacity(n * k),
            strategy: Some(strategy),
        };
        for (source, row) in neighbors.into_iter().enumerate() {
            if row.len() < k {
                debug!(source, found = row.len(), k, "fewer neighbors than requested");
            }
            for (target, score) in row {
                induced.edge_index.push(source, target);
                induced.edge_types.push(edge_type);
                induced.scores.push(score);
            }
        }

        info!(
            ?edge_type,
            ?strategy,
            nodes = n,
            k,
            edges = induced.len(),
            "induced similarity edges"
        );
        induced
    }
}

impl Default for SimilarityEdgeInducer {
    fn default() -> Self {
        Self::from_config(&SimilarityConfig::default())
    }
}

/// Drops exactly one leading result per row, assumed to be the query itself.
/// If the index ranked another node above the self-match, that node is lost
/// and the self-match may survive as a self-loop.
fn drop_first_result(rows: Vec<Vec<Neighbor>>, k: usize) -> Vec<Vec<Neighbor>> {
    rows.into_iter()
        .map(|row| row.into_iter().skip(1).take(k).collect())
        .collect()
}

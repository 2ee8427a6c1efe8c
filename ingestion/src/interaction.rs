use crate::embedding::{embed_images, embed_texts, EmbeddingError, EmbeddingService};
use crate::reader::{read_posts, ReadError, ReadReport};
use factgraph_core::config::SimilarityConfig;
use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::model::{EdgeType, GraphArtifact, ModelError, NodeRecord, NodeRole};
use factgraph_core::record::PostRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::index::SimilarityEdgeInducer;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Corpus is empty")]
    EmptyCorpus,
    #[error("{modality} embeddings have {actual} rows for {expected} posts")]
    RowCountMismatch {
        modality: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Invalid interaction graph: {0}")]
    Invalid(#[from] ModelError),
    #[error(transparent)]
    Read(#[from] ReadError),
}

impl FactgraphError for InteractionError {
    fn error_code(&self) -> ErrorCode {
        match self {
            InteractionError::EmptyCorpus => ErrorCode::InvalidInput,
            InteractionError::RowCountMismatch { .. } | InteractionError::Invalid(_) => {
                ErrorCode::InvariantViolation
            }
            InteractionError::Embedding(e) => e.error_code(),
            InteractionError::Read(e) => e.error_code(),
        }
    }
}

/// Builds the corpus-wide graph: one node per post, fused text and image
/// features, top-K text and image similarity edges, labels and split masks.
pub struct InteractionGraphBuilder {
    embedder: Arc<dyn EmbeddingService>,
    inducer: SimilarityEdgeInducer,
    k_text: usize,
    k_image: usize,
    project_root: PathBuf,
}

impl InteractionGraphBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        similarity: &SimilarityConfig,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            inducer: SimilarityEdgeInducer::from_config(similarity),
            k_text: similarity.k_text,
            k_image: similarity.k_image,
            project_root: project_root.into(),
        }
    }

    pub async fn build(&self, posts: &[PostRecord]) -> Result<GraphArtifact, InteractionError> {
        let n = posts.len();
        if n == 0 {
            return Err(InteractionError::EmptyCorpus);
        }
        info!(posts = n, "building interaction graph");

        let texts: Vec<String> = posts.iter().map(|p| p.embedding_text().to_string()).collect();
        let image_paths: Vec<Option<PathBuf>> = posts
            .iter()
            .map(|p| p.resolve_image_path(&self.project_root))
            .collect();
        let labels: Vec<_> = posts.iter().map(PostRecord::truth_label).collect();
        let splits: Vec<_> = posts.iter().map(PostRecord::split_tag).collect();

        let text_x = embed_texts(self.embedder.as_ref(), &texts).await?;
        check_rows("text", n, text_x.rows())?;
        let image_x = embed_images(self.embedder.as_ref(), &image_paths).await?;
        check_rows("image", n, image_x.rows())?;

        let x = text_x.hconcat(&image_x)?;
        info!(
            nodes = n,
            feature_dim = x.dim(),
            with_image = image_paths.iter().filter(|p| p.is_some()).count(),
            "node features fused"
        );

        let mut edges = self.inducer.induce(&text_x, self.k_text, EdgeType::TextSim);
        let image_edges = self.inducer.induce(&image_x, self.k_image, EdgeType::ImageSim);
        edges.edge_index.extend(&image_edges.edge_index);
        edges.edge_types.extend_from_slice(&image_edges.edge_types);

        let nodes = posts.iter().map(post_node).collect();
        let graph = GraphArtifact::interaction(
            nodes,
            x,
            edges.edge_index,
            edges.edge_types,
            &labels,
            &splits,
        )?;

        let summary = graph.summary();
        info!(
            edges = summary.edge_count,
            text_sim = summary.text_sim_edges,
            image_sim = summary.image_sim_edges,
            train = summary.train_count,
            val = summary.val_count,
            test = summary.test_count,
            "interaction graph built"
        );
        Ok(graph)
    }

    /// Reads a JSONL corpus, then builds. Malformed lines are skipped and
    /// reported alongside the graph.
    pub async fn build_from_jsonl(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(GraphArtifact, ReadReport), InteractionError> {
        let (posts, report) = read_posts(path).await?;
        let graph = self.build(&posts).await?;
        Ok((graph, report))
    }
}

fn check_rows(modality: &'static str, expected: usize, actual: usize) -> Result<(), InteractionError> {
    if expected != actual {
        return Err(InteractionError::RowCountMismatch {
            modality,
            expected,
            actual,
        });
    }
    Ok(())
}

fn post_node(post: &PostRecord) -> NodeRecord {
    let mut node = NodeRecord::new(post.id.clone(), NodeRole::Post);
    node.author = post.user_id.clone();
    node.timestamp = post.timestamp;
    node
}

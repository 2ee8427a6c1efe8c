use factgraph_core::config::EmbeddingConfig;
use factgraph_core::embedding::{deterministic_embedding, deterministic_embedding_bytes, zero_embedding};
use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::model::FeatureMatrix;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use storage::index::IdRegistry;
use thiserror::Error;
use tracing::{debug, warn};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Embedding backend failed: {0}")]
    Backend(String),
    #[error("Embedding width mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding batch returned {actual} rows for {expected} inputs")]
    RowCountMismatch { expected: usize, actual: usize },
}

impl FactgraphError for EmbeddingError {
    fn error_code(&self) -> ErrorCode {
        match self {
            EmbeddingError::Backend(_) => ErrorCode::EmbeddingBackend,
            EmbeddingError::DimensionMismatch { .. } | EmbeddingError::RowCountMismatch { .. } => {
                ErrorCode::InvariantViolation
            }
        }
    }
}

/// Text and image encoder consumed by the graph builders.
///
/// `extract_image` returns a zero vector for a missing or unreadable file
/// instead of an error. Batch methods return one row per input, in order.
pub trait EmbeddingService: Send + Sync {
    fn text_dim(&self) -> usize;
    fn image_dim(&self) -> usize;

    fn extract_text<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>>;

    fn extract_image<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>>;

    fn extract_text_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<FeatureMatrix, EmbeddingError>> {
        Box::pin(async move {
            let mut matrix = FeatureMatrix::with_capacity(self.text_dim(), texts.len());
            for text in texts {
                let row = self.extract_text(text).await?;
                push_checked(&mut matrix, &row)?;
            }
            Ok(matrix)
        })
    }

    fn extract_image_batch<'a>(
        &'a self,
        paths: &'a [PathBuf],
    ) -> BoxFuture<'a, Result<FeatureMatrix, EmbeddingError>> {
        Box::pin(async move {
            let mut matrix = FeatureMatrix::with_capacity(self.image_dim(), paths.len());
            for path in paths {
                let row = self.extract_image(path).await?;
                push_checked(&mut matrix, &row)?;
            }
            Ok(matrix)
        })
    }
}

fn push_checked(matrix: &mut FeatureMatrix, row: &[f32]) -> Result<(), EmbeddingError> {
    let expected = matrix.dim();
    matrix
        .push_row(row)
        .map_err(|_| EmbeddingError::DimensionMismatch {
            expected,
            actual: row.len(),
        })
}

fn check_shape(matrix: &FeatureMatrix, rows: usize, dim: usize) -> Result<(), EmbeddingError> {
    if matrix.rows() != rows {
        return Err(EmbeddingError::RowCountMismatch {
            expected: rows,
            actual: matrix.rows(),
        });
    }
    if matrix.dim() != dim {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dim,
            actual: matrix.dim(),
        });
    }
    Ok(())
}

/// Embeds `texts` through one batch call, sending each distinct text once.
pub async fn embed_texts(
    service: &dyn EmbeddingService,
    texts: &[String],
) -> Result<FeatureMatrix, EmbeddingError> {
    let mut unique: IdRegistry<&str> = IdRegistry::new();
    let slots: Vec<usize> = texts.iter().map(|t| unique.register(t.as_str())).collect();
    let distinct: Vec<String> = unique.keys().iter().map(|t| t.to_string()).collect();

    let embedded = service.extract_text_batch(&distinct).await?;
    check_shape(&embedded, distinct.len(), service.text_dim())?;
    debug!(inputs = texts.len(), distinct = distinct.len(), "embedded text batch");

    gather(&embedded, &slots)
}

/// Embeds images through one batch call. `None` entries get a zero row
/// without reaching the service; repeated paths are sent once.
pub async fn embed_images(
    service: &dyn EmbeddingService,
    paths: &[Option<PathBuf>],
) -> Result<FeatureMatrix, EmbeddingError> {
    let dim = service.image_dim();
    let mut unique: IdRegistry<&Path> = IdRegistry::new();
    let slots: Vec<Option<usize>> = paths
        .iter()
        .map(|p| p.as_deref().map(|p| unique.register(p)))
        .collect();
    let distinct: Vec<PathBuf> = unique.keys().iter().map(|p| p.to_path_buf()).collect();

    let embedded = service.extract_image_batch(&distinct).await?;
    check_shape(&embedded, distinct.len(), dim)?;
    debug!(
        inputs = paths.len(),
        distinct = distinct.len(),
        missing = paths.len() - slots.iter().flatten().count(),
        "embedded image batch"
    );

    let zeros = zero_embedding(dim);
    let mut matrix = FeatureMatrix::with_capacity(dim, paths.len());
    for slot in slots {
        let row = match slot {
            Some(index) => embedded.row(index),
            None => zeros.as_slice(),
        };
        push_checked(&mut matrix, row)?;
    }
    Ok(matrix)
}

fn gather(embedded: &FeatureMatrix, slots: &[usize]) -> Result<FeatureMatrix, EmbeddingError> {
    let mut matrix = FeatureMatrix::with_capacity(embedded.dim(), slots.len());
    for slot in slots {
        push_checked(&mut matrix, embedded.row(*slot))?;
    }
    Ok(matrix)
}

/// Hash-derived embeddings: identical inputs always give identical vectors.
pub struct DeterministicEmbeddingService {
    text_model: String,
    image_model: String,
    text_dim: usize,
    image_dim: usize,
    text_batch_size: usize,
    image_batch_size: usize,
}

impl DeterministicEmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            text_dim: config.text_dim.max(1),
            image_dim: config.image_dim.max(1),
            text_batch_size: config.text_batch_size.max(1),
            image_batch_size: config.image_batch_size.max(1),
        }
    }

    fn embed_text_now(&self, text: &str) -> Vec<f32> {
        if text.is_empty() {
            zero_embedding(self.text_dim)
        } else {
            deterministic_embedding(text, &self.text_model, self.text_dim)
        }
    }

    async fn embed_image_now(&self, path: &Path) -> Vec<f32> {
        match tokio::fs::read(path).await {
            Ok(bytes) => deterministic_embedding_bytes(&bytes, &self.image_model, self.image_dim),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "image unreadable, using zero vector");
                zero_embedding(self.image_dim)
            }
        }
    }
}

impl Default for DeterministicEmbeddingService {
    fn default() -> Self {
        Self::new(&EmbeddingConfig::default())
    }
}

impl EmbeddingService for DeterministicEmbeddingService {
    fn text_dim(&self) -> usize {
        self.text_dim
    }

    fn image_dim(&self) -> usize {
        self.image_dim
    }

    fn extract_text<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(async move { Ok(self.embed_text_now(text)) })
    }

    fn extract_image<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(async move { Ok(self.embed_image_now(path).await) })
    }

    fn extract_text_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<FeatureMatrix, EmbeddingError>> {
        Box::pin(async move {
            let mut matrix = FeatureMatrix::with_capacity(self.text_dim, texts.len());
            for (chunk_no, chunk) in texts.chunks(self.text_batch_size).enumerate() {
                for text in chunk {
                    push_checked(&mut matrix, &self.embed_text_now(text))?;
                }
                debug!(chunk = chunk_no, size = chunk.len(), model = %self.text_model, "text chunk");
            }
            Ok(matrix)
        })
    }

    fn extract_image_batch<'a>(
        &'a self,
        paths: &'a [PathBuf],
    ) -> BoxFuture<'a, Result<FeatureMatrix, EmbeddingError>> {
        Box::pin(async move {
            let mut matrix = FeatureMatrix::with_capacity(self.image_dim, paths.len());
            for (chunk_no, chunk) in paths.chunks(self.image_batch_size).enumerate() {
                for path in chunk {
                    push_checked(&mut matrix, &self.embed_image_now(path).await)?;
                }
                debug!(chunk = chunk_no, size = chunk.len(), model = %self.image_model, "image chunk");
            }
            Ok(matrix)
        })
    }
}

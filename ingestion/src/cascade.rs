use crate::embedding::{embed_texts, EmbeddingError, EmbeddingService};
use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::model::{EdgeIndex, GraphArtifact, ModelError, NodeRecord, NodeRole};
use factgraph_core::record::{CommentRecord, PostRecord};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use storage::index::IdRegistry;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Embedding failed for post {post_id}: {source}")]
    Embedding {
        post_id: String,
        #[source]
        source: EmbeddingError,
    },
    #[error("Invalid cascade graph for post {post_id}: {source}")]
    Invalid {
        post_id: String,
        #[source]
        source: ModelError,
    },
}

impl FactgraphError for CascadeError {
    fn error_code(&self) -> ErrorCode {
        match self {
            CascadeError::Embedding { source, .. } => source.error_code(),
            CascadeError::Invalid { .. } => ErrorCode::InvariantViolation,
        }
    }
}

/// Registry key for cascade nodes. The root has its own variant so that no
/// comment id can collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CascadeKey {
    Root,
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFailure {
    pub post_id: String,
    pub code: ErrorCode,
    pub cause: String,
}

/// Outcome of a batch run. Every input post is counted exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Posts rejected before building (empty id).
    pub skipped: usize,
    pub failures: Vec<PostFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Per-build scratch state: the id registry plus the node arena it indexes.
struct CascadeArena {
    registry: IdRegistry<CascadeKey>,
    nodes: Vec<NodeRecord>,
    texts: Vec<String>,
    edges: EdgeIndex,
    seen_edges: HashSet<(usize, usize)>,
}

impl CascadeArena {
    fn with_root(post: &PostRecord) -> Self {
        let mut registry = IdRegistry::new();
        registry.register(CascadeKey::Root);

        let mut root = NodeRecord::new(post.id.clone(), NodeRole::Root);
        root.author = post.user_id.clone();
        root.timestamp = post.timestamp;
        root.level = Some(0);

        Self {
            registry,
            nodes: vec![root],
            texts: vec![post.raw_text().to_string()],
            edges: EdgeIndex::new(),
            seen_edges: HashSet::new(),
        }
    }

    fn link(&mut self, parent: usize, child: usize) {
        if self.seen_edges.insert((parent, child)) {
            self.edges.push(parent, child);
        }
    }
}

/// Builds one reply-tree graph per post.
pub struct CascadeGraphBuilder {
    embedder: Arc<dyn EmbeddingService>,
}

impl CascadeGraphBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { embedder }
    }

    pub async fn build(&self, post: &PostRecord) -> Result<GraphArtifact, CascadeError> {
        let mut arena = CascadeArena::with_root(post);
        let mut worklist: VecDeque<&CommentRecord> = post.cascade.iter().collect();
        let mut orphans = 0usize;
        let mut dropped = 0usize;

        while let Some(comment) = worklist.pop_front() {
            let id = match comment.id.as_deref() {
                Some(id) if !id.is_empty() && comment.has_text() => id,
                _ => {
                    dropped += 1;
                    continue;
                }
            };

            // Parent must already be known; a comment naming itself is not.
            let parent = match comment.parent_id.as_deref() {
                Some(parent) if parent == post.id => Some(0),
                Some(parent) => arena.registry.get(&CascadeKey::Comment(parent.to_string())),
                None => None,
            };

            let (index, is_new) = arena.registry.register_new(CascadeKey::Comment(id.to_string()));
            let mut node = NodeRecord::new(id, NodeRole::Comment);
            node.author = comment.user_id.clone();
            node.timestamp = comment.timestamp;
            node.level = comment.level;
            let text = comment.text.clone().unwrap_or_default();
            if is_new {
                arena.nodes.push(node);
                arena.texts.push(text);
            } else {
                // A repeated id keeps its index; the latest occurrence supplies text and metadata.
                debug!(post_id = %post.id, comment_id = id, "duplicate comment id, replacing earlier text");
                arena.nodes[index] = node;
                arena.texts[index] = text;
            }

            match parent {
                Some(parent) => arena.link(parent, index),
                None => {
                    orphans += 1;
                    debug!(
                        post_id = %post.id,
                        comment_id = id,
                        parent_id = comment.parent_id.as_deref().unwrap_or(""),
                        "parent not yet known, keeping comment without an edge"
                    );
                }
            }
        }

        let x = embed_texts(self.embedder.as_ref(), &arena.texts)
            .await
            .map_err(|source| CascadeError::Embedding {
                post_id: post.id.clone(),
                source,
            })?;

        let node_count = arena.nodes.len();
        let edge_count = arena.edges.len();
        let graph = GraphArtifact::cascade(post.id.clone(), arena.nodes, x, arena.edges).map_err(
            |source| CascadeError::Invalid {
                post_id: post.id.clone(),
                source,
            },
        )?;

        debug!(
            post_id = %post.id,
            nodes = node_count,
            edges = edge_count,
            orphans,
            dropped,
            "cascade graph built"
        );
        Ok(graph)
    }

    /// Builds every post independently. A post failing with a recoverable
    /// error (bad input, embedding backend) is recorded in the report and the
    /// batch continues; any other error aborts the batch.
    pub async fn build_batch(
        &self,
        posts: &[PostRecord],
    ) -> Result<(Vec<GraphArtifact>, BatchReport), CascadeError> {
        info!(posts = posts.len(), "building cascade graphs");
        let mut graphs = Vec::with_capacity(posts.len());
        let mut report = BatchReport::default();

        for post in posts {
            if post.id.is_empty() {
                report.skipped += 1;
                continue;
            }
            match self.build(post).await {
                Ok(graph) => {
                    report.succeeded += 1;
                    graphs.push(graph);
                }
                Err(e) if e.error_code().is_item_recoverable() => {
                    error!(post_id = %post.id, error = %e, "skipping post");
                    report.failed += 1;
                    report.failures.push(PostFailure {
                        post_id: post.id.clone(),
                        code: e.error_code(),
                        cause: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(post_id = %post.id, error = %e, code = %e.error_code(), "aborting cascade batch");
                    return Err(e);
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "cascade batch finished"
        );
        Ok((graphs, report))
    }
}

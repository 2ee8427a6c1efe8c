use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::model::{GraphKind, NodeRole};
use factgraph_core::record::{CommentRecord, PostRecord};
use ingestion::cascade::CascadeGraphBuilder;
use ingestion::embedding::{
    BoxFuture, DeterministicEmbeddingService, EmbeddingError, EmbeddingService,
};
use std::path::Path;
use std::sync::Arc;

fn builder() -> CascadeGraphBuilder {
    CascadeGraphBuilder::new(Arc::new(DeterministicEmbeddingService::default()))
}

/// Fails any batch containing a text with the marker.
struct FlakyEmbedder {
    inner: DeterministicEmbeddingService,
    marker: &'static str,
}

impl EmbeddingService for FlakyEmbedder {
    fn text_dim(&self) -> usize {
        self.inner.text_dim()
    }

    fn image_dim(&self) -> usize {
        self.inner.image_dim()
    }

    fn extract_text<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        if text.contains(self.marker) {
            Box::pin(async { Err(EmbeddingError::Backend("model unavailable".to_string())) })
        } else {
            self.inner.extract_text(text)
        }
    }

    fn extract_image<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        self.inner.extract_image(path)
    }
}

#[tokio::test]
async fn test_post_without_comments_is_a_single_root() {
    let post = PostRecord::new("t3_solo", "nobody replied");
    let graph = builder().build(&post).await.unwrap();

    assert_eq!(graph.kind(), GraphKind::Cascade);
    assert_eq!(graph.post_id(), Some("t3_solo"));
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.x().rows(), 1);
    assert_eq!(graph.x().dim(), 768);
    assert!(graph.edge_index().is_empty());
    assert_eq!(graph.nodes()[0].role, NodeRole::Root);
    assert_eq!(graph.nodes()[0].external_id, "t3_solo");

    let json = serde_json::to_value(graph.edge_index()).unwrap();
    assert_eq!(json, serde_json::json!({"sources": [], "targets": []}));
}

#[tokio::test]
async fn test_reply_chain_links_parent_to_child() {
    let post = PostRecord::new("post", "root text")
        .with_comment(CommentRecord::new("c1", "post", "first reply"))
        .with_comment(CommentRecord::new("c2", "c1", "reply to the reply"));
    let graph = builder().build(&post).await.unwrap();

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.x().rows(), 3);
    assert_eq!(
        graph.edge_index().iter().collect::<Vec<_>>(),
        vec![(0, 1), (1, 2)]
    );
    let ids: Vec<&str> = graph.nodes().iter().map(|n| n.external_id.as_str()).collect();
    assert_eq!(ids, vec!["post", "c1", "c2"]);
}

#[tokio::test]
async fn test_empty_comments_are_dropped() {
    let mut no_text = CommentRecord::new("c2", "post", "");
    no_text.text = None;
    let mut no_id = CommentRecord::new("c4", "post", "anonymous");
    no_id.id = None;

    let post = PostRecord::new("post", "root")
        .with_comment(CommentRecord::new("c1", "post", "kept"))
        .with_comment(no_text)
        .with_comment(CommentRecord::new("c3", "post", ""))
        .with_comment(no_id)
        .with_comment(CommentRecord::new("c5", "c3", "child of a dropped comment"));
    let graph = builder().build(&post).await.unwrap();

    let ids: Vec<&str> = graph.nodes().iter().map(|n| n.external_id.as_str()).collect();
    assert_eq!(ids, vec!["post", "c1", "c5"]);
    assert_eq!(graph.edge_index().iter().collect::<Vec<_>>(), vec![(0, 1)]);
    assert!(graph.edge_index().iter().all(|(s, t)| s < 3 && t < 3));
}

#[tokio::test]
async fn test_reply_before_parent_is_kept_without_edge() {
    let post = PostRecord::new("post", "root")
        .with_comment(CommentRecord::new("c2", "c1", "arrived early"))
        .with_comment(CommentRecord::new("c1", "post", "the parent"));
    let graph = builder().build(&post).await.unwrap();

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_index().iter().collect::<Vec<_>>(), vec![(0, 2)]);
}

#[tokio::test]
async fn test_comment_metadata_is_carried_on_nodes() {
    let mut comment = CommentRecord::new("c1", "post", "hello");
    comment.user_id = Some("bob".to_string());
    comment.timestamp = Some(1_700_000_123.0);
    comment.level = Some(1);
    let mut post = PostRecord::new("post", "root").with_comment(comment);
    post.user_id = Some("alice".to_string());

    let graph = builder().build(&post).await.unwrap();
    assert_eq!(graph.nodes()[0].author.as_deref(), Some("alice"));
    assert_eq!(graph.nodes()[1].author.as_deref(), Some("bob"));
    assert_eq!(graph.nodes()[1].timestamp, Some(1_700_000_123.0));
    assert_eq!(graph.nodes()[1].level, Some(1));
}

#[tokio::test]
async fn test_batch_skips_failing_posts_and_continues() {
    let builder = CascadeGraphBuilder::new(Arc::new(FlakyEmbedder {
        inner: DeterministicEmbeddingService::default(),
        marker: "boom",
    }));
    let posts = vec![
        PostRecord::new("p1", "fine"),
        PostRecord::new("p2", "root").with_comment(CommentRecord::new("c1", "p2", "boom")),
        PostRecord::new("", "no id"),
        PostRecord::new("p3", "also fine"),
    ];

    let (graphs, report) = builder.build_batch(&posts).await.unwrap();
    assert_eq!(
        graphs.iter().filter_map(|g| g.post_id()).collect::<Vec<_>>(),
        vec!["p1", "p3"]
    );
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.total(), posts.len());
    assert_eq!(report.failures[0].post_id, "p2");
    assert_eq!(report.failures[0].code, ErrorCode::EmbeddingBackend);
}

/// Returns vectors narrower than the advertised text width.
struct NarrowEmbedder;

impl EmbeddingService for NarrowEmbedder {
    fn text_dim(&self) -> usize {
        768
    }

    fn image_dim(&self) -> usize {
        512
    }

    fn extract_text<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(async { Ok(vec![0.5; 3]) })
    }

    fn extract_image<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(async { Ok(vec![0.5; 3]) })
    }
}

#[tokio::test]
async fn test_batch_aborts_on_invariant_violation() {
    let builder = CascadeGraphBuilder::new(Arc::new(NarrowEmbedder));
    let posts = vec![
        PostRecord::new("p1", "first"),
        PostRecord::new("p2", "second"),
    ];

    let err = builder.build_batch(&posts).await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvariantViolation);
    assert!(err.to_string().contains("p1"));
}

#[tokio::test]
async fn test_duplicate_comment_id_takes_latest_text() {
    let post = PostRecord::new("post", "root")
        .with_comment(CommentRecord::new("c1", "post", "first"))
        .with_comment(CommentRecord::new("c1", "post", "second"));
    let graph = builder().build(&post).await.unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_index().iter().collect::<Vec<_>>(), vec![(0, 1)]);
    let second = DeterministicEmbeddingService::default()
        .extract_text("second")
        .await
        .unwrap();
    assert_eq!(graph.x().row(1), second.as_slice());
}

#[tokio::test]
async fn test_single_build_surfaces_embedding_failure() {
    let builder = CascadeGraphBuilder::new(Arc::new(FlakyEmbedder {
        inner: DeterministicEmbeddingService::default(),
        marker: "boom",
    }));
    let err = builder.build(&PostRecord::new("p", "boom")).await.unwrap_err();
    assert!(err.to_string().contains("model unavailable"));
}

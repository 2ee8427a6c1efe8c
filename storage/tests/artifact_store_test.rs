use factgraph_core::config::ArtifactFormat;
use factgraph_core::label::{Split, TruthLabel};
use factgraph_core::model::{
    EdgeIndex, EdgeType, FeatureMatrix, GraphArtifact, NodeRecord, NodeRole,
};
use storage::artifact::{ArtifactError, ArtifactStore};
use tempfile::tempdir;

fn sample_cascade() -> GraphArtifact {
    let mut root = NodeRecord::new("t3_post", NodeRole::Root);
    root.author = Some("alice".to_string());
    let mut reply = NodeRecord::new("c1", NodeRole::Comment);
    reply.level = Some(1);
    reply.timestamp = Some(1_700_000_000.0);

    let x = FeatureMatrix::from_rows(3, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]).unwrap();
    let mut edges = EdgeIndex::new();
    edges.push(0, 1);
    GraphArtifact::cascade("t3_post", vec![root, reply], x, edges).unwrap()
}

fn sample_interaction() -> GraphArtifact {
    let nodes = (0..3)
        .map(|i| NodeRecord::new(format!("p{i}"), NodeRole::Post))
        .collect();
    let x = FeatureMatrix::zeros(3, 4);
    let mut edges = EdgeIndex::new();
    edges.push(0, 1);
    edges.push(0, 1);
    edges.push(2, 0);
    GraphArtifact::interaction(
        nodes,
        x,
        edges,
        vec![EdgeType::TextSim, EdgeType::ImageSim, EdgeType::ImageSim],
        &[TruthLabel::HalfTrue, TruthLabel::BarelyTrue, TruthLabel::False],
        &[Some(Split::Train), Some(Split::Val), None],
    )
    .unwrap()
}

#[tokio::test]
async fn test_artifacts_survive_both_formats() {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("graphs"));

    for format in [ArtifactFormat::Json, ArtifactFormat::Rkyv] {
        for (name, artifact) in [("cascade", sample_cascade()), ("interaction", sample_interaction())] {
            let path = store.write(name, &artifact, format).await.unwrap();
            let restored = store.read(&path).await.unwrap();
            assert_eq!(restored, artifact);
        }
    }

    let written = std::fs::read_dir(dir.path().join("graphs")).unwrap().count();
    assert_eq!(written, 4);
}

#[tokio::test]
async fn test_write_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write("t3_post", &sample_cascade(), ArtifactFormat::Rkyv)
        .await
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["t3_post.rkyv".to_string()]);
}

#[tokio::test]
async fn test_corrupted_binary_artifact_is_rejected() {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let path = store
        .write("interaction", &sample_interaction(), ArtifactFormat::Rkyv)
        .await
        .unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        store.read(&path).await,
        Err(ArtifactError::CrcMismatch)
    ));
}

#[tokio::test]
async fn test_json_with_inconsistent_binary_labels_is_rejected() {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let path = store
        .write("interaction", &sample_interaction(), ArtifactFormat::Json)
        .await
        .unwrap();

    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    value["y_binary"] = serde_json::json!([1, 1, 1]);
    std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    assert!(matches!(
        store.read(&path).await,
        Err(ArtifactError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_unknown_extension_is_refused() {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let path = dir.path().join("graph.pt");
    std::fs::write(&path, b"").unwrap();
    assert!(matches!(
        store.read(&path).await,
        Err(ArtifactError::UnknownFormat(_))
    ));
}

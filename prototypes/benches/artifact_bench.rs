use criterion::{criterion_group, criterion_main, Criterion};
use factgraph_core::config::{ArtifactFormat, EmbeddingConfig, SimilarityConfig};
use ingestion::embedding::DeterministicEmbeddingService;
use ingestion::interaction::InteractionGraphBuilder;
use prototypes::{env_usize, synthetic_corpus};
use std::sync::Arc;
use storage::artifact::{decode, encode};

fn bench_artifact_codec(c: &mut Criterion) {
    let posts = synthetic_corpus(env_usize("FACTGRAPH_BENCH_POSTS", 500));
    let embedder = DeterministicEmbeddingService::new(&EmbeddingConfig::default());
    let builder = InteractionGraphBuilder::new(Arc::new(embedder), &SimilarityConfig::default(), ".");

    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let graph = rt.block_on(builder.build(&posts)).expect("interaction graph");

    let mut group = c.benchmark_group("artifact_codec");
    for (label, format) in [("json", ArtifactFormat::Json), ("rkyv", ArtifactFormat::Rkyv)] {
        let bytes = encode(&graph, format).expect("encode");
        group.bench_function(format!("encode_{label}"), |b| b.iter(|| encode(&graph, format)));
        group.bench_function(format!("decode_{label}"), |b| b.iter(|| decode(&bytes, format)));
    }
    group.finish();
}

criterion_group!(benches, bench_artifact_codec);
criterion_main!(benches);

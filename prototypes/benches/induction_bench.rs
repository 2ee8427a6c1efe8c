use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use factgraph_core::config::SimilarityMode;
use factgraph_core::model::EdgeType;
use prototypes::{env_usize, synthetic_embeddings};
use storage::index::SimilarityEdgeInducer;

const K: usize = 5;

fn bench_induction(c: &mut Criterion) {
    let dim = env_usize("FACTGRAPH_BENCH_DIM", 64);
    let max_nodes = env_usize("FACTGRAPH_BENCH_NODES", 2000);

    let mut group = c.benchmark_group("edge_induction");
    group.sample_size(10);

    let mut n = 250;
    while n <= max_nodes {
        let embeddings = synthetic_embeddings(n, dim);
        let dense = SimilarityEdgeInducer::new(usize::MAX, SimilarityMode::Exact);
        let streaming = SimilarityEdgeInducer::new(0, SimilarityMode::Exact);
        let approximate = SimilarityEdgeInducer::new(0, SimilarityMode::Approximate);

        group.bench_with_input(BenchmarkId::new("dense_exact", n), &embeddings, |b, m| {
            b.iter(|| dense.induce(m, K, EdgeType::TextSim))
        });
        group.bench_with_input(BenchmarkId::new("streaming_exact", n), &embeddings, |b, m| {
            b.iter(|| streaming.induce(m, K, EdgeType::TextSim))
        });
        if storage::index::ann::is_available() {
            group.bench_with_input(BenchmarkId::new("approximate", n), &embeddings, |b, m| {
                b.iter(|| approximate.induce(m, K, EdgeType::TextSim))
            });
        }
        n *= 2;
    }
    group.finish();
}

criterion_group!(benches, bench_induction);
criterion_main!(benches);

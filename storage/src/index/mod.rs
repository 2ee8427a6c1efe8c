pub mod ann;
pub mod exact;
pub mod registry;
pub mod similarity;

pub use registry::IdRegistry;
pub use similarity::{InducedEdges, SearchStrategy, SimilarityEdgeInducer};

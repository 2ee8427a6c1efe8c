use crate::error::{ErrorCode, FactgraphError};
use crate::label::{binary_label, Split, TruthLabel, NUM_CLASSES};
use rkyv::Archive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("edge {edge} references node {index} but graph has {node_count} nodes")]
    EdgeOutOfRange {
        edge: usize,
        index: usize,
        node_count: usize,
    },
    #[error("label class {0} is outside the taxonomy")]
    InvalidLabel(u8),
    #[error("y_binary disagrees with y at node {0}")]
    BinaryLabelMismatch(usize),
    #[error("node {0} belongs to more than one split")]
    OverlappingMasks(usize),
    #[error("{kind:?} graph is missing field {field}")]
    MissingField { kind: GraphKind, field: &'static str },
    #[error("{kind:?} graph must not carry field {field}")]
    UnexpectedField { kind: GraphKind, field: &'static str },
    #[error("cascade graph must have exactly one root at index 0")]
    InvalidRoot,
}

impl FactgraphError for ModelError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvariantViolation
    }
}

#[derive(
    Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[archive(check_bytes)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    Cascade,
    Interaction,
}

#[derive(
    Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[archive(check_bytes)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    Root,
    Comment,
    Post,
}

#[derive(
    Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[archive(check_bytes)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    TextSim,
    ImageSim,
}

#[derive(Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct NodeRecord {
    pub external_id: String,
    pub role: NodeRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl NodeRecord {
    pub fn new(external_id: impl Into<String>, role: NodeRole) -> Self {
        Self {
            external_id: external_id.into(),
            role,
            author: None,
            timestamp: None,
            level: None,
        }
    }
}

/// Dense row-major `rows x dim` matrix of node features.
#[derive(Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct FeatureMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn with_dim(dim: usize) -> Self {
        Self::with_capacity(dim, 0)
    }

    pub fn with_capacity(dim: usize, rows: usize) -> Self {
        Self {
            rows: 0,
            dim,
            data: Vec::with_capacity(dim * rows),
        }
    }

    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            rows,
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    pub fn from_rows(dim: usize, rows: Vec<Vec<f32>>) -> Result<Self, ModelError> {
        let mut matrix = Self::with_capacity(dim, rows.len());
        for row in &rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    pub fn push_row(&mut self, row: &[f32]) -> Result<(), ModelError> {
        if row.len() != self.dim {
            return Err(ModelError::ShapeMismatch {
                what: "feature row width",
                expected: self.dim,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics; a zero-width matrix still has `rows` empty rows.
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Column-wise concatenation: row `i` of the result is `self[i] ‖ other[i]`.
    pub fn hconcat(&self, other: &FeatureMatrix) -> Result<Self, ModelError> {
        if self.rows != other.rows {
            return Err(ModelError::ShapeMismatch {
                what: "concatenated row count",
                expected: self.rows,
                actual: other.rows,
            });
        }
        let dim = self.dim + other.dim;
        let mut data = Vec::with_capacity(self.rows * dim);
        for (left, right) in self.iter_rows().zip(other.iter_rows()) {
            data.extend_from_slice(left);
            data.extend_from_slice(right);
        }
        Ok(Self {
            rows: self.rows,
            dim,
            data,
        })
    }

    /// L2-normalizes every row. Zero and non-finite rows become zero rows.
    pub fn l2_normalized(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.iter_rows() {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 && norm.is_finite() {
                data.extend(row.iter().map(|v| v / norm));
            } else {
                data.extend(std::iter::repeat(0.0).take(row.len()));
            }
        }
        Self {
            rows: self.rows,
            dim: self.dim,
            data,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        // Shape fields come from untrusted artifacts; an overflowing product can never match.
        let expected = self.rows.checked_mul(self.dim).unwrap_or(usize::MAX);
        if self.data.len() != expected {
            return Err(ModelError::ShapeMismatch {
                what: "feature buffer length",
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Directed edges as two parallel rows (`2 x E`). Duplicates are kept.
#[derive(
    Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq,
)]
#[archive(check_bytes)]
pub struct EdgeIndex {
    sources: Vec<usize>,
    targets: Vec<usize>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(edges: usize) -> Self {
        Self {
            sources: Vec::with_capacity(edges),
            targets: Vec::with_capacity(edges),
        }
    }

    pub fn push(&mut self, source: usize, target: usize) {
        self.sources.push(source);
        self.targets.push(target);
    }

    pub fn extend(&mut self, other: &EdgeIndex) {
        self.sources.extend_from_slice(&other.sources);
        self.targets.extend_from_slice(&other.targets);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sources.iter().copied().zip(self.targets.iter().copied())
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.sources.iter().filter(|s| **s == node).count()
    }

    fn validate(&self, node_count: usize) -> Result<(), ModelError> {
        if self.sources.len() != self.targets.len() {
            return Err(ModelError::ShapeMismatch {
                what: "edge_index target row",
                expected: self.sources.len(),
                actual: self.targets.len(),
            });
        }
        for (edge, (source, target)) in self.iter().enumerate() {
            for index in [source, target] {
                if index >= node_count {
                    return Err(ModelError::EdgeOutOfRange {
                        edge,
                        index,
                        node_count,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Graph artifact shared by cascade and interaction graphs.
///
/// Instances are only produced through [`GraphArtifact::cascade`],
/// [`GraphArtifact::interaction`] or a validated read, so every accessor can
/// rely on the shape invariants checked by [`GraphArtifact::validate`].
#[derive(Archive, rkyv::Serialize, rkyv::Deserialize, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct GraphArtifact {
    kind: GraphKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_id: Option<String>,
    nodes: Vec<NodeRecord>,
    x: FeatureMatrix,
    edge_index: EdgeIndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edge_attr: Option<Vec<EdgeType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y_binary: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    train_mask: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    val_mask: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test_mask: Option<Vec<bool>>,
}

impl GraphArtifact {
    pub fn cascade(
        post_id: impl Into<String>,
        nodes: Vec<NodeRecord>,
        x: FeatureMatrix,
        edge_index: EdgeIndex,
    ) -> Result<Self, ModelError> {
        let artifact = Self {
            kind: GraphKind::Cascade,
            post_id: Some(post_id.into()),
            nodes,
            x,
            edge_index,
            edge_attr: None,
            y: None,
            y_binary: None,
            train_mask: None,
            val_mask: None,
            test_mask: None,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// `y_binary` and the three masks are derived here from `labels` and
    /// `splits`; they cannot be supplied independently.
    pub fn interaction(
        nodes: Vec<NodeRecord>,
        x: FeatureMatrix,
        edge_index: EdgeIndex,
        edge_attr: Vec<EdgeType>,
        labels: &[TruthLabel],
        splits: &[Option<Split>],
    ) -> Result<Self, ModelError> {
        if splits.len() != labels.len() {
            return Err(ModelError::ShapeMismatch {
                what: "split tag count",
                expected: labels.len(),
                actual: splits.len(),
            });
        }
        let y: Vec<u8> = labels.iter().map(|label| label.class_index()).collect();
        let y_binary = y.iter().map(|class| binary_label(*class)).collect();
        let mask_for = |split: Split| -> Vec<bool> {
            splits.iter().map(|tag| *tag == Some(split)).collect()
        };

        let artifact = Self {
            kind: GraphKind::Interaction,
            post_id: None,
            nodes,
            x,
            edge_index,
            edge_attr: Some(edge_attr),
            y: Some(y),
            y_binary: Some(y_binary),
            train_mask: Some(mask_for(Split::Train)),
            val_mask: Some(mask_for(Split::Val)),
            test_mask: Some(mask_for(Split::Test)),
        };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.nodes.len();
        self.x.validate()?;
        if self.x.rows() != n {
            return Err(ModelError::ShapeMismatch {
                what: "feature rows",
                expected: n,
                actual: self.x.rows(),
            });
        }
        self.edge_index.validate(n)?;

        match self.kind {
            GraphKind::Cascade => self.validate_cascade(),
            GraphKind::Interaction => self.validate_interaction(),
        }
    }

    fn validate_cascade(&self) -> Result<(), ModelError> {
        let kind = GraphKind::Cascade;
        if self.post_id.is_none() {
            return Err(ModelError::MissingField { kind, field: "post_id" });
        }
        let roots = self.nodes.iter().filter(|n| n.role == NodeRole::Root).count();
        if roots != 1 || self.nodes.first().map(|n| n.role) != Some(NodeRole::Root) {
            return Err(ModelError::InvalidRoot);
        }
        let unexpected = [
            ("edge_attr", self.edge_attr.is_some()),
            ("y", self.y.is_some()),
            ("y_binary", self.y_binary.is_some()),
            ("train_mask", self.train_mask.is_some()),
            ("val_mask", self.val_mask.is_some()),
            ("test_mask", self.test_mask.is_some()),
        ];
        if let Some((field, _)) = unexpected.iter().find(|(_, present)| *present) {
            return Err(ModelError::UnexpectedField {
                kind,
                field: *field,
            });
        }
        Ok(())
    }

    fn validate_interaction(&self) -> Result<(), ModelError> {
        let kind = GraphKind::Interaction;
        let n = self.nodes.len();
        let require_len = |what: &'static str, len: Option<usize>| match len {
            None => Err(ModelError::MissingField { kind, field: what }),
            Some(len) if len != n => Err(ModelError::ShapeMismatch {
                what,
                expected: n,
                actual: len,
            }),
            Some(_) => Ok(()),
        };

        match &self.edge_attr {
            None => return Err(ModelError::MissingField { kind, field: "edge_attr" }),
            Some(attr) if attr.len() != self.edge_index.len() => {
                return Err(ModelError::ShapeMismatch {
                    what: "edge_attr",
                    expected: self.edge_index.len(),
                    actual: attr.len(),
                })
            }
            Some(_) => {}
        }
        require_len("y", self.y.as_ref().map(Vec::len))?;
        require_len("y_binary", self.y_binary.as_ref().map(Vec::len))?;
        require_len("train_mask", self.train_mask.as_ref().map(Vec::len))?;
        require_len("val_mask", self.val_mask.as_ref().map(Vec::len))?;
        require_len("test_mask", self.test_mask.as_ref().map(Vec::len))?;

        let y = self.y();
        let y_binary = self.y_binary();
        for (node, (class, binary)) in y.iter().zip(y_binary).enumerate() {
            if *class as usize >= NUM_CLASSES {
                return Err(ModelError::InvalidLabel(*class));
            }
            if *binary != binary_label(*class) {
                return Err(ModelError::BinaryLabelMismatch(node));
            }
        }
        for node in 0..n {
            let memberships = Split::ALL
                .iter()
                .filter(|split| self.mask(**split)[node])
                .count();
            if memberships > 1 {
                return Err(ModelError::OverlappingMasks(node));
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    pub fn post_id(&self) -> Option<&str> {
        self.post_id.as_deref()
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn x(&self) -> &FeatureMatrix {
        &self.x
    }

    pub fn edge_index(&self) -> &EdgeIndex {
        &self.edge_index
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    pub fn edge_attr(&self) -> &[EdgeType] {
        self.edge_attr.as_deref().unwrap_or_default()
    }

    pub fn y(&self) -> &[u8] {
        self.y.as_deref().unwrap_or_default()
    }

    pub fn y_binary(&self) -> &[u8] {
        self.y_binary.as_deref().unwrap_or_default()
    }

    /// Empty for cascade graphs, which carry no split.
    pub fn mask(&self, split: Split) -> &[bool] {
        let mask = match split {
            Split::Train => &self.train_mask,
            Split::Val => &self.val_mask,
            Split::Test => &self.test_mask,
        };
        mask.as_deref().unwrap_or_default()
    }

    pub fn split_indices(&self, split: Split) -> Vec<usize> {
        self.mask(split)
            .iter()
            .enumerate()
            .filter_map(|(i, member)| member.then_some(i))
            .collect()
    }

    pub fn summary(&self) -> GraphSummary {
        let mut label_histogram = vec![0usize; NUM_CLASSES];
        for class in self.y() {
            if let Some(slot) = label_histogram.get_mut(*class as usize) {
                *slot += 1;
            }
        }
        let count_type = |edge_type: EdgeType| {
            self.edge_attr().iter().filter(|t| **t == edge_type).count()
        };
        let count_split = |split: Split| self.mask(split).iter().filter(|m| **m).count();

        GraphSummary {
            kind: self.kind,
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            feature_dim: self.x.dim(),
            text_sim_edges: count_type(EdgeType::TextSim),
            image_sim_edges: count_type(EdgeType::ImageSim),
            label_histogram,
            fake_count: self.y_binary().iter().filter(|b| **b == 1).count(),
            train_count: count_split(Split::Train),
            val_count: count_split(Split::Val),
            test_count: count_split(Split::Test),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub kind: GraphKind,
    pub node_count: usize,
    pub edge_count: usize,
    pub feature_dim: usize,
    pub text_sim_edges: usize,
    pub image_sim_edges: usize,
    pub label_histogram: Vec<usize>,
    pub fake_count: usize,
    pub train_count: usize,
    pub val_count: usize,
    pub test_count: usize,
}

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const NUM_CLASSES: usize = 6;

/// Classes at or above this index collapse to the Fake binary label.
pub const FAKE_CLASS_THRESHOLD: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruthLabel {
    True,
    MostlyTrue,
    HalfTrue,
    BarelyTrue,
    False,
    PantsOnFire,
}

impl TruthLabel {
    pub const ALL: [TruthLabel; NUM_CLASSES] = [
        TruthLabel::True,
        TruthLabel::MostlyTrue,
        TruthLabel::HalfTrue,
        TruthLabel::BarelyTrue,
        TruthLabel::False,
        TruthLabel::PantsOnFire,
    ];

    pub fn class_index(self) -> u8 {
        match self {
            TruthLabel::True => 0,
            TruthLabel::MostlyTrue => 1,
            TruthLabel::HalfTrue => 2,
            TruthLabel::BarelyTrue => 3,
            TruthLabel::False => 4,
            TruthLabel::PantsOnFire => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TruthLabel::True => "TRUE",
            TruthLabel::MostlyTrue => "MOSTLY_TRUE",
            TruthLabel::HalfTrue => "HALF_TRUE",
            TruthLabel::BarelyTrue => "BARELY_TRUE",
            TruthLabel::False => "FALSE",
            TruthLabel::PantsOnFire => "PANTS_ON_FIRE",
        }
    }

    /// Parses a taxonomy name, defaulting to `TRUE` when the label is missing
    /// or not one of the six names. The default skews unlabeled data toward
    /// the True class; callers that care must check the raw label first.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(label = raw, "unrecognized label, defaulting to TRUE");
                TruthLabel::True
            }),
            None => {
                tracing::warn!("missing label, defaulting to TRUE");
                TruthLabel::True
            }
        }
    }
}

impl std::fmt::Display for TruthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown truth label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for TruthLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

pub fn binary_label(class_index: u8) -> u8 {
    u8::from(class_index >= FAKE_CLASS_THRESHOLD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// Exact, case-sensitive match against the three split names. Any other
    /// tag places the node outside every split.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|split| split.as_str() == tag)
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

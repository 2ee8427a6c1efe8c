use crate::label::{Split, TruthLabel};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// One upstream JSONL post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub clean_text: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub split: Option<String>,
    #[serde(default)]
    pub image_info: Option<ImageInfo>,
    #[serde(default)]
    pub cascade: Vec<CommentRecord>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub processed_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub level: Option<u32>,
}

impl PostRecord {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: Some(raw_text.into()),
            clean_text: None,
            label: None,
            split: None,
            image_info: None,
            cascade: Vec::new(),
            user_id: None,
            timestamp: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_split(mut self, split: impl Into<String>) -> Self {
        self.split = Some(split.into());
        self
    }

    pub fn with_image(mut self, processed_path: impl Into<String>) -> Self {
        self.image_info = Some(ImageInfo {
            processed_path: Some(processed_path.into()),
        });
        self
    }

    pub fn with_comment(mut self, comment: CommentRecord) -> Self {
        self.cascade.push(comment);
        self
    }

    pub fn raw_text(&self) -> &str {
        self.raw_text.as_deref().unwrap_or_default()
    }

    /// Cleaned text, falling back to raw text, then to the empty string.
    pub fn embedding_text(&self) -> &str {
        [self.clean_text.as_deref(), self.raw_text.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
            .unwrap_or_default()
    }

    pub fn image_path(&self) -> Option<&str> {
        self.image_info
            .as_ref()
            .and_then(|info| info.processed_path.as_deref())
            .filter(|path| !path.is_empty())
    }

    /// Relative image paths are resolved against `project_root`. Whether the
    /// file exists is left to the embedding backend.
    pub fn resolve_image_path(&self, project_root: &Path) -> Option<PathBuf> {
        let path = Path::new(self.image_path()?);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(project_root.join(path))
        }
    }

    pub fn truth_label(&self) -> TruthLabel {
        TruthLabel::parse_lenient(self.label.as_deref())
    }

    /// Missing split tags count as `train`; unknown tags map to no split.
    pub fn split_tag(&self) -> Option<Split> {
        Split::from_tag(self.split.as_deref().unwrap_or(Split::Train.as_str()))
    }
}

impl CommentRecord {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            parent_id: Some(parent_id.into()),
            text: Some(text.into()),
            user_id: None,
            timestamp: None,
            level: None,
        }
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|text| !text.is_empty())
    }
}

/// Crawled timestamps arrive as integers, floats or numeric strings.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_record() {
        let record: PostRecord = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(record.id, "abc");
        assert!(record.cascade.is_empty());
        assert_eq!(record.embedding_text(), "");
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(serde_json::from_str::<PostRecord>(r#"{"raw_text":"x"}"#).is_err());
    }

    #[test]
    fn embedding_text_prefers_clean_text() {
        let mut record = PostRecord::new("1", "RAW");
        assert_eq!(record.embedding_text(), "RAW");
        record.clean_text = Some(String::new());
        assert_eq!(record.embedding_text(), "RAW");
        record.clean_text = Some("clean".to_string());
        assert_eq!(record.embedding_text(), "clean");
    }

    #[test]
    fn relative_image_paths_resolve_against_root() {
        let record = PostRecord::new("1", "t").with_image("data/images/1.jpg");
        assert_eq!(
            record.resolve_image_path(Path::new("/project")),
            Some(PathBuf::from("/project/data/images/1.jpg"))
        );

        let absolute = PostRecord::new("2", "t").with_image("/abs/2.jpg");
        assert_eq!(
            absolute.resolve_image_path(Path::new("/project")),
            Some(PathBuf::from("/abs/2.jpg"))
        );

        let empty = PostRecord::new("3", "t").with_image("");
        assert_eq!(empty.resolve_image_path(Path::new("/project")), None);
    }

    #[test]
    fn timestamps_accept_numbers_and_strings() {
        let json = r#"{"id":"p","timestamp":1700000000.5,"cascade":[
            {"id":"c1","parent_id":"p","text":"hi","timestamp":"1700000001"},
            {"id":"c2","parent_id":"p","text":"yo","timestamp":"soon"}
        ]}"#;
        let record: PostRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.timestamp, Some(1700000000.5));
        assert_eq!(record.cascade[0].timestamp, Some(1700000001.0));
        assert_eq!(record.cascade[1].timestamp, None);
    }

    #[test]
    fn missing_split_defaults_to_train() {
        let record = PostRecord::new("1", "t");
        assert_eq!(record.split_tag(), Some(Split::Train));
        assert_eq!(record.clone().with_split("holdout").split_tag(), None);
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub text_model: String,
    pub image_model: String,
    pub text_dim: usize,
    pub image_dim: usize,
    pub text_batch_size: usize,
    pub image_batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text_model: "xlm-roberta-base".to_string(),
            image_model: "openai/clip-vit-base-patch32".to_string(),
            text_dim: 768,
            image_dim: 512,
            text_batch_size: 32,
            image_batch_size: 16,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMode {
    /// Exact below `exact_threshold`, approximate at or above it.
    #[default]
    Auto,
    Exact,
    Approximate,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimilarityConfig {
    pub k_text: usize,
    pub k_image: usize,
    pub exact_threshold: usize,
    pub mode: SimilarityMode,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            k_text: 5,
            k_image: 5,
            exact_threshold: 5000,
            mode: SimilarityMode::Auto,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            output_dir: PathBuf::from("data/processed_graphs"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Json,
    Rkyv,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Rkyv => "rkyv",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ArtifactConfig {
    pub format: ArtifactFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub embedding: EmbeddingConfig,
    pub similarity: SimilarityConfig,
    pub paths: PathsConfig,
    pub artifact: ArtifactConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Layers `default`, `$RUN_MODE` and `FACTGRAPH__*` environment
    /// variables. Missing files fall back to built-in defaults.
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join(&run_mode).to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("FACTGRAPH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

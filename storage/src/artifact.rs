use crc32fast::Hasher;
use factgraph_core::config::ArtifactFormat;
use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::model::{GraphArtifact, ModelError};
use rkyv::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Binary envelope: [magic: 4][crc32: 4 LE][len: 8 LE][rkyv archive: len]
const RKYV_MAGIC: &[u8; 4] = b"FGA1";
const RKYV_HEADER_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Corrupt artifact")]
    Corrupt,
    #[error("Data integrity error (CRC mismatch)")]
    CrcMismatch,
    #[error("Invalid artifact: {0}")]
    Invalid(#[from] ModelError),
    #[error("Unknown artifact format for {0}")]
    UnknownFormat(PathBuf),
}

impl FactgraphError for ArtifactError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ArtifactError::Io(_) => ErrorCode::Io,
            ArtifactError::Invalid(_) => ErrorCode::InvariantViolation,
            ArtifactError::Json(_)
            | ArtifactError::Encode(_)
            | ArtifactError::Corrupt
            | ArtifactError::CrcMismatch
            | ArtifactError::UnknownFormat(_) => ErrorCode::Internal,
        }
    }
}

pub fn encode(artifact: &GraphArtifact, format: ArtifactFormat) -> Result<Vec<u8>, ArtifactError> {
    match format {
        ArtifactFormat::Json => Ok(serde_json::to_vec(artifact)?),
        ArtifactFormat::Rkyv => {
            let archive = rkyv::to_bytes::<_, 4096>(artifact)
                .map_err(|e| ArtifactError::Encode(e.to_string()))?;

            let mut hasher = Hasher::new();
            hasher.update(&archive);

            let mut out = Vec::with_capacity(RKYV_HEADER_LEN + archive.len());
            out.extend_from_slice(RKYV_MAGIC);
            out.extend_from_slice(&hasher.finalize().to_le_bytes());
            out.extend_from_slice(&(archive.len() as u64).to_le_bytes());
            out.extend_from_slice(&archive);
            Ok(out)
        }
    }
}

/// Decodes and validates an artifact; invariant violations are rejected.
pub fn decode(bytes: &[u8], format: ArtifactFormat) -> Result<GraphArtifact, ArtifactError> {
    let artifact: GraphArtifact = match format {
        ArtifactFormat::Json => serde_json::from_slice(bytes)?,
        ArtifactFormat::Rkyv => {
            if bytes.len() < RKYV_HEADER_LEN || &bytes[0..4] != RKYV_MAGIC {
                return Err(ArtifactError::Corrupt);
            }
            let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            let mut len_bytes = [0u8; 8];
            len_bytes.copy_from_slice(&bytes[8..16]);
            let len = u64::from_le_bytes(len_bytes) as usize;

            let payload = &bytes[RKYV_HEADER_LEN..];
            if payload.len() != len {
                return Err(ArtifactError::Corrupt);
            }
            let mut hasher = Hasher::new();
            hasher.update(payload);
            if hasher.finalize() != crc {
                return Err(ArtifactError::CrcMismatch);
            }

            // rkyv needs an aligned buffer; the header offset does not guarantee one.
            let mut aligned = rkyv::AlignedVec::with_capacity(len);
            aligned.extend_from_slice(payload);
            let archived = rkyv::check_archived_root::<GraphArtifact>(&aligned[..])
                .map_err(|_| ArtifactError::Corrupt)?;
            archived
                .deserialize(&mut rkyv::Infallible)
                .map_err(|_| ArtifactError::Corrupt)?
        }
    };
    artifact.validate()?;
    Ok(artifact)
}

pub fn format_for_path(path: &Path) -> Option<ArtifactFormat> {
    match path.extension()?.to_str()? {
        "json" => Some(ArtifactFormat::Json),
        "rkyv" => Some(ArtifactFormat::Rkyv),
        _ => None,
    }
}

/// File stem for an artifact named by an external id. Characters outside
/// `[A-Za-z0-9._-]` become `_`, and leading dots are replaced.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.starts_with('.') {
        out.insert(0, '_');
    }
    out
}

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str, format: ArtifactFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_name(name), format.extension()))
    }

    /// Writes to a temp file then renames, so readers never observe a
    /// partially written artifact.
    pub async fn write(
        &self,
        name: &str,
        artifact: &GraphArtifact,
        format: ArtifactFormat,
    ) -> Result<PathBuf, ArtifactError> {
        artifact.validate()?;
        let bytes = encode(artifact, format)?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let path = self.path_for(name, format);
        let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));

        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, &path).await?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(path)
    }

    pub async fn read(&self, path: impl AsRef<Path>) -> Result<GraphArtifact, ArtifactError> {
        let path = path.as_ref();
        let format =
            format_for_path(path).ok_or_else(|| ArtifactError::UnknownFormat(path.to_path_buf()))?;
        let bytes = fs::read(path).await?;
        decode(&bytes, format)
    }
}

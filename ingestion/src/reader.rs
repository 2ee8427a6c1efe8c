//! Line-delimited JSON corpus reader.
//!
//! Blank lines are ignored. A line that fails to parse as a post record is
//! logged and counted, never fatal; only I/O failures abort a read.

use factgraph_core::error::{ErrorCode, FactgraphError};
use factgraph_core::record::PostRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FactgraphError for ReadError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::Io
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReport {
    pub lines: usize,
    pub records: usize,
    pub blank: usize,
    /// 1-based line numbers of records that failed to parse.
    pub malformed: Vec<usize>,
}

pub async fn read_posts(path: impl AsRef<Path>) -> Result<(Vec<PostRecord>, ReadReport), ReadError> {
    let path = path.as_ref();
    let io_err = |source: std::io::Error| ReadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut posts = Vec::new();
    let mut report = ReadReport::default();

    // Raw bytes per line: a line that is not UTF-8 is a malformed record, not a read failure.
    while reader.read_until(b'\n', &mut line).await.map_err(io_err)? > 0 {
        report.lines += 1;
        match parse_line(&line) {
            Ok(Some(post)) => {
                report.records += 1;
                posts.push(post);
            }
            Ok(None) => report.blank += 1,
            Err(e) => {
                warn!(path = %path.display(), line = report.lines, error = %e, "skipping malformed record");
                report.malformed.push(report.lines);
            }
        }
        line.clear();
    }

    info!(
        path = %path.display(),
        records = report.records,
        malformed = report.malformed.len(),
        "corpus loaded"
    );
    Ok((posts, report))
}

pub fn parse_line(line: &[u8]) -> Result<Option<PostRecord>, serde_json::Error> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(line).map(Some)
}

//! Where a table comes from: a remote CSV endpoint or a local file

use crate::error::{LiftError, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Location of a CSV table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Fetched over HTTP(S), no authentication, no retry, no caching
    Url(String),
    /// Read from the local filesystem
    Path(PathBuf),
}

impl DataSource {
    /// Interpret a location string: `http://` and `https://` are URLs, anything else a path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            DataSource::Url(trimmed.to_string())
        } else {
            DataSource::Path(PathBuf::from(trimmed))
        }
    }

    /// Fetch the raw bytes of the table
    pub async fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            DataSource::Url(url) => {
                info!(url = %url, "Downloading table");
                let response = reqwest::get(url.as_str()).await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(LiftError::Download(format!("{} returned {}", url, status)));
                }
                let bytes = response.bytes().await?;
                info!(url = %url, bytes = bytes.len(), "Download complete");
                Ok(bytes.to_vec())
            }
            DataSource::Path(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    LiftError::Data(format!("cannot read {}: {}", path.display(), e))
                })?;
                info!(path = %path.display(), bytes = bytes.len(), "Read table");
                Ok(bytes)
            }
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{}", url),
            DataSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            DataSource::parse("https://example.org/a.csv"),
            DataSource::Url("https://example.org/a.csv".to_string())
        );
        assert_eq!(
            DataSource::parse("data/pml-training.csv"),
            DataSource::Path(PathBuf::from("data/pml-training.csv"))
        );
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2").unwrap();

        let source = DataSource::Path(file.path().to_path_buf());
        let bytes = source.fetch().await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fatal() {
        let source = DataSource::Path(PathBuf::from("/nonexistent/pml-training.csv"));
        assert!(matches!(source.fetch().await, Err(LiftError::Data(_))));
    }
}

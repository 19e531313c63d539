//! FileSink - appends to a file on disk

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use contracts::{Sink, SinkError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Sink that appends every write to one file
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed
    #[instrument(name = "file_sink_open", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                SinkError::dial("file", path.display().to_string(), e.to_string())
            })?;

        debug!("FileSink opened");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        let file = self.file.as_mut().ok_or_else(|| SinkError::closed("file"))?;
        file.write_all(buf).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Write failed");
            SinkError::write("file", e.to_string())
        })?;
        Ok(buf.len())
    }

    #[instrument(name = "file_sink_close", skip(self), fields(path = %self.path.display()))]
    async fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush().await?;
        file.sync_all().await?;
        debug!("FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, b"old\n").unwrap();

        let mut sink = FileSink::open(&path).await.unwrap();
        sink.write(b"a\n").await.unwrap();
        sink.write(b"bb\n").await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"old\na\nbb\n");
        assert!(sink.write(b"x").await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_file_sink_missing_directory() {
        let dir = tempdir().unwrap();
        let err = FileSink::open(dir.path().join("nope/out.log"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SinkError::Dial { .. }));
    }
}

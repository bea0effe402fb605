// ABOUTME: Output writers delivering formatted content to a destination
// ABOUTME: Supports standard output and local files

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::config::Destination;
use super::error::{OutputError, Result};

#[async_trait]
pub trait OutputWriter: Send + Sync {
    async fn write(&self, content: &str, destination: &Destination) -> Result<()>;
}

pub struct StdoutWriter;

#[async_trait]
impl OutputWriter for StdoutWriter {
    async fn write(&self, content: &str, _destination: &Destination) -> Result<()> {
        if content.ends_with('\n') {
            print!("{content}");
        } else {
            println!("{content}");
        }
        Ok(())
    }
}

pub struct FileWriter {
    create_dirs: bool,
}

impl FileWriter {
    pub fn new(create_dirs: bool) -> Self {
        Self { create_dirs }
    }
}

#[async_trait]
impl OutputWriter for FileWriter {
    async fn write(&self, content: &str, destination: &Destination) -> Result<()> {
        let Destination::File(path) = destination else {
            return Err(OutputError::WriteError {
                message: format!("file writer cannot write to {}", destination.writer_type()),
            });
        };

        if self.create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| OutputError::WriteError {
                        message: format!("failed to create {}: {e}", parent.display()),
                    })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| OutputError::WriteError {
                message: format!("failed to write {}: {e}", path.display()),
            })?;
        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_writer_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/report.json");
        let destination = Destination::File(path.clone());

        FileWriter::new(true)
            .write("{\"ok\": true}", &destination)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_file_writer_errors() {
        let dir = TempDir::new().unwrap();
        let missing_parent = Destination::File(dir.path().join("absent/report.json"));

        let err = FileWriter::new(false)
            .write("x", &missing_parent)
            .await
            .unwrap_err();
        assert!(matches!(err, OutputError::WriteError { .. }));

        let err = FileWriter::new(true)
            .write("x", &Destination::Stdout)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("stdout"));
    }
}

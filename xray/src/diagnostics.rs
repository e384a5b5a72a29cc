use crate::client::Operation;
use crate::network::Failure;
use log::{error, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes one artifact per failed operation so the exact wire-level failure
/// can be inspected without re-running.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    directory: PathBuf,
}

impl Diagnostics {
    pub fn new(directory: impl Into<PathBuf>) -> Diagnostics {
        Diagnostics {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `<operation>Error.json` for failures carrying a response,
    /// `<operation>Error.log` otherwise.
    pub fn artifact_path(&self, operation: Operation, failure: &Failure) -> PathBuf {
        let extension = if failure.is_structured() { "json" } else { "log" };
        self.directory
            .join(format!("{}Error.{}", operation.name(), extension))
    }

    /// Returns the artifact path, or `None` if it could not be written.
    pub fn write(&self, operation: Operation, failure: &Failure) -> Option<PathBuf> {
        let path = self.artifact_path(operation, failure);
        match self.write_file(&path, failure) {
            Ok(()) => {
                error!(
                    "Complete error logs have been written to: {}",
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                warn!("Failed to write error logs to {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_file(&self, path: &Path, failure: &Failure) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        let content = serde_json::to_vec_pretty(&failure.to_json())?;
        fs::write(path, content)
    }
}

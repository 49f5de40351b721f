//! Generated script store
//!
//! Scripts live as plain files under a single root directory, named
//! `<test id><extension>`. A write replaces any previous content for the same
//! name. Writes to the same id from independent callers are not serialized
//! here; the last writer wins.

use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Logical kind of a stored script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Runnable Playwright spec
    Spec,
}

impl ScriptKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptKind::Spec => ".spec.ts",
        }
    }
}

/// File store for generated scripts
#[derive(Debug, Clone)]
pub struct ScriptStore {
    root: PathBuf,
}

impl ScriptStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root path of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name used for a test id
    pub fn file_name(id: i64, kind: ScriptKind) -> String {
        format!("{}{}", id, kind.extension())
    }

    /// Write a script, replacing prior content. Returns the file location.
    pub async fn write(&self, id: i64, content: &str, kind: ScriptKind) -> Result<PathBuf> {
        let path = self.path_for(&Self::file_name(id, kind))?;

        fs::create_dir_all(&self.root).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        info!(test_id = id, "Stored script at {:?} ({} bytes)", path, content.len());
        Ok(path)
    }

    /// Read a script by file name.
    ///
    /// Returns `Error::NotFound` when nothing was written under that name,
    /// and `Error::Io` for any other failure.
    pub async fn read(&self, file_name: &str) -> Result<String> {
        let path = self.path_for(file_name)?;

        match fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("Read script {:?}", path);
                Ok(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found("script", file_name)),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Check whether a script exists
    pub async fn exists(&self, file_name: &str) -> Result<bool> {
        let path = self.path_for(file_name)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Resolve a file name inside the store root
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        Ok(self.root.join(file_name))
    }
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0')
    {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

//! Host-side workspace shared with sandboxed scripts.
//!
//! The workspace is the only channel for structured data to move between
//! pipeline stages: each stage's container gets the same host directory
//! bind-mounted read-write at [`MOUNT_POINT`], so files written by one
//! stage's script are visible to the next stage's mount. Stdout is reserved
//! for the final single-line JSON signal.

use std::io;
use std::path::{Path, PathBuf};

/// Fixed path at which the workspace is mounted inside every container.
///
/// This is the agreed contract between the runner and every generated
/// script; the prompt templates embed it verbatim.
pub const MOUNT_POINT: &str = "/workspace";

/// Raw HTML table saved by the scrape stage.
pub const SCRAPED_TABLE_FILE: &str = "scraped_table.html";

/// Cleaned tabular data saved by the clean stage.
pub const CLEAN_CSV_FILE: &str = "films.csv";

/// A validated host-side workspace directory.
///
/// Resolved once at startup: the directory is created if missing and
/// canonicalized to an absolute path, since the Docker bind-mount contract
/// requires an absolute host path.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates (if needed) and validates the workspace directory.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created or resolved
    /// to an absolute path.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// Returns the absolute host path of the workspace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the host path of a named artifact inside the workspace.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns true if the named artifact exists.
    pub fn has_artifact(&self, name: &str) -> bool {
        self.artifact_path(name).is_file()
    }

    /// Deletes the named artifacts if they exist.
    ///
    /// Called before each pipeline run so that a stage's success check can
    /// never be satisfied by a file left behind by a previous run.
    pub fn clear_artifacts(&self, names: &[&str]) -> io::Result<()> {
        for name in names {
            match std::fs::remove_file(self.artifact_path(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ws");
        let workspace = Workspace::new(&nested).unwrap();

        assert!(nested.is_dir());
        assert!(workspace.root().is_absolute());
    }

    #[test]
    fn test_artifact_paths() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path()).unwrap();

        assert!(!workspace.has_artifact(SCRAPED_TABLE_FILE));
        std::fs::write(workspace.artifact_path(SCRAPED_TABLE_FILE), "<table/>").unwrap();
        assert!(workspace.has_artifact(SCRAPED_TABLE_FILE));
    }

    #[test]
    fn test_clear_artifacts_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path()).unwrap();

        std::fs::write(workspace.artifact_path(CLEAN_CSV_FILE), "a,b").unwrap();

        workspace
            .clear_artifacts(&[SCRAPED_TABLE_FILE, CLEAN_CSV_FILE])
            .unwrap();
        assert!(!workspace.has_artifact(CLEAN_CSV_FILE));

        // Clearing again with nothing present is not an error.
        workspace
            .clear_artifacts(&[SCRAPED_TABLE_FILE, CLEAN_CSV_FILE])
            .unwrap();
    }
}

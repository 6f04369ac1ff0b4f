//! Directory-backed bundle storage.
//!
//! A bundle lives in its own directory:
//!
//! ```text
//! recipe_index/
//! ├── vectorizer.json
//! ├── neighbors.json
//! └── recipes.json
//! ```
//!
//! Saving writes all three files into a staging directory next to the target
//! and then renames it into place, so readers see either the old bundle or the
//! new one, never a mix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    snapshot_of, Artifact, BundleStorage, IndexBundle, LoadError, StorageError, StorageResult,
    BUNDLE_FORMAT_VERSION, NEIGHBORS_FILE, RECIPES_FILE, VECTORIZER_FILE,
};
use crate::index::BruteForceIndex;
use crate::models::RecipeRow;
use crate::vectorize::TfidfVectorizer;

/// Bundle storage rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Create a storage handle for the bundle directory at `root`.
    ///
    /// Nothing is touched on disk until `save` or `load` is called.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sibling path used while a save is in progress or being swapped in.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        let sibling = format!(".{}.{}-{}", name, suffix, std::process::id());
        match self.root.parent() {
            Some(parent) => parent.join(sibling),
            None => PathBuf::from(sibling),
        }
    }

    async fn write_artifact<T: Serialize>(
        dir: &Path,
        file: &str,
        artifact: &Artifact<T>,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(artifact)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", file, e)))?;
        tokio::fs::write(dir.join(file), bytes).await?;
        Ok(())
    }

    async fn read_artifact<T: DeserializeOwned>(&self, file: &str) -> Result<Artifact<T>, LoadError> {
        let path = self.root.join(file);
        let shown = path.display().to_string();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(LoadError::Missing(shown)),
            Err(e) => {
                return Err(LoadError::Unreadable {
                    path: shown,
                    reason: e.to_string(),
                })
            }
        };

        let artifact: Artifact<T> =
            serde_json::from_slice(&bytes).map_err(|e| LoadError::Corrupt {
                path: shown.clone(),
                reason: e.to_string(),
            })?;

        if artifact.format_version != BUNDLE_FORMAT_VERSION {
            return Err(LoadError::VersionMismatch {
                path: shown,
                found: artifact.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }

        debug!(path = %shown, snapshot = %artifact.snapshot, "Read bundle artifact");
        Ok(artifact)
    }

    async fn write_staged(&self, staging: &Path, bundle: &IndexBundle) -> StorageResult<()> {
        let created_at = Utc::now();
        let snapshot = bundle.snapshot.as_str();
        Self::write_artifact(
            staging,
            VECTORIZER_FILE,
            &Artifact::new(snapshot, created_at, &bundle.vectorizer),
        )
        .await?;
        Self::write_artifact(
            staging,
            NEIGHBORS_FILE,
            &Artifact::new(snapshot, created_at, &bundle.index),
        )
        .await?;
        Self::write_artifact(
            staging,
            RECIPES_FILE,
            &Artifact::new(snapshot, created_at, &bundle.recipes),
        )
        .await?;
        self.swap_into_place(staging).await
    }

    async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Replace the bundle directory with `staging` by renames only.
    async fn swap_into_place(&self, staging: &Path) -> StorageResult<()> {
        let backup = self.sibling("previous");
        Self::remove_dir_if_exists(&backup).await?;

        let had_previous = tokio::fs::try_exists(&self.root).await?;
        if had_previous {
            tokio::fs::rename(&self.root, &backup).await?;
        }

        if let Err(e) = tokio::fs::rename(staging, &self.root).await {
            if had_previous {
                if let Err(restore) = tokio::fs::rename(&backup, &self.root).await {
                    warn!(error = %restore, backup = %backup.display(), "Failed to restore previous bundle");
                }
            }
            return Err(e.into());
        }

        if had_previous {
            if let Err(e) = Self::remove_dir_if_exists(&backup).await {
                warn!(error = %e, backup = %backup.display(), "Failed to remove previous bundle");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BundleStorage for DirectoryStorage {
    async fn save(&self, bundle: &IndexBundle) -> StorageResult<()> {
        bundle
            .validate()
            .map_err(|e| StorageError::InvalidBundle(e.to_string()))?;

        let staging = self.sibling("staging");
        Self::remove_dir_if_exists(&staging).await?;
        tokio::fs::create_dir_all(&staging).await?;

        if let Err(e) = self.write_staged(&staging, bundle).await {
            if let Err(cleanup) = Self::remove_dir_if_exists(&staging).await {
                warn!(error = %cleanup, "Failed to remove staging directory");
            }
            return Err(e);
        }

        info!(
            location = %self.root.display(),
            snapshot = %bundle.snapshot,
            recipes = bundle.recipes.len(),
            "Saved index bundle"
        );
        Ok(())
    }

    async fn load(&self) -> Result<IndexBundle, LoadError> {
        let vectorizer: Artifact<TfidfVectorizer> = self.read_artifact(VECTORIZER_FILE).await?;
        let index: Artifact<BruteForceIndex> = self.read_artifact(NEIGHBORS_FILE).await?;
        let recipes: Artifact<Vec<RecipeRow>> = self.read_artifact(RECIPES_FILE).await?;

        if vectorizer.snapshot != recipes.snapshot || index.snapshot != recipes.snapshot {
            return Err(LoadError::SnapshotMismatch(format!(
                "vectorizer={}, neighbors={}, recipes={}",
                vectorizer.snapshot, index.snapshot, recipes.snapshot
            )));
        }

        let actual = snapshot_of(&recipes.payload).map_err(|e| LoadError::Corrupt {
            path: self.root.join(RECIPES_FILE).display().to_string(),
            reason: e.to_string(),
        })?;
        if actual != recipes.snapshot {
            return Err(LoadError::SnapshotMismatch(format!(
                "recipe table content hashes to {}, artifacts claim {}",
                actual, recipes.snapshot
            )));
        }

        let bundle = IndexBundle {
            vectorizer: vectorizer.payload,
            index: index.payload,
            recipes: recipes.payload,
            snapshot: recipes.snapshot,
        };
        bundle.validate()?;

        info!(
            location = %self.root.display(),
            snapshot = %bundle.snapshot,
            recipes = bundle.recipes.len(),
            "Loaded index bundle"
        );
        Ok(bundle)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

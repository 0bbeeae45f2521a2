//! Container root materialization

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use burrow_core::{ContainerId, Error, Result, RuntimeConfig};

/// Produces a private, fully populated root filesystem for a container
///
/// Implementations:
/// - [`TarballMaterializer`] - Extracts the base image with `tar`
/// - [`MockMaterializer`] - Empty directory, for tests
#[async_trait]
pub trait RootfsMaterializer: Send + Sync {
    /// Create the root filesystem for `id` and return its absolute path
    ///
    /// # Errors
    /// Returns error if the directory already exists, the base image is
    /// missing, or extraction fails
    async fn materialize(&self, id: &ContainerId) -> Result<PathBuf>;
}

/// Creates `{containers_root}/{id}` with owner-only permissions
///
/// Creation is exclusive: an existing directory means two containers were
/// handed the same identity.
async fn create_container_root(containers_root: &Path, id: &ContainerId) -> Result<PathBuf> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(containers_root)
        .await?;

    debug!(containers_root = %containers_root.display(), "Creating container root");
    let root = containers_root.join(id.as_str());

    fs::DirBuilder::new()
        .mode(0o700)
        .create(&root)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::Materialize {
                message: format!("Container root {} already exists", root.display()),
            },
            _ => Error::Materialize {
                message: format!("Failed to create {}: {e}", root.display()),
            },
        })?;

    Ok(fs::canonicalize(&root).await?)
}

/// Extracts a gzipped base image tarball into each new container root
#[derive(Debug, Clone)]
pub struct TarballMaterializer {
    containers_root: PathBuf,
    image: PathBuf,
}

impl TarballMaterializer {
    /// Create a materializer for the given containers root and base image
    #[must_use]
    pub fn new(containers_root: impl Into<PathBuf>, image: impl Into<PathBuf>) -> Self {
        Self {
            containers_root: containers_root.into(),
            image: image.into(),
        }
    }

    /// Create a materializer from the runtime configuration
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(&config.containers_root, &config.base_image)
    }
}

#[async_trait]
impl RootfsMaterializer for TarballMaterializer {
    async fn materialize(&self, id: &ContainerId) -> Result<PathBuf> {
        if !fs::try_exists(&self.image).await.unwrap_or(false) {
            return Err(Error::Materialize {
                message: format!("Base image {} not found", self.image.display()),
            });
        }

        let root = create_container_root(&self.containers_root, id).await?;

        // Root path omitted: it names the container before its hostname is set
        info!(image = %self.image.display(), "Extracting root filesystem");

        let status = Command::new("tar")
            .arg("-xzf")
            .arg(&self.image)
            .arg("-C")
            .arg(&root)
            .status()
            .await
            .map_err(|e| Error::Materialize {
                message: format!("Failed to run tar: {e}"),
            })?;

        if !status.success() {
            return Err(Error::Materialize {
                message: format!(
                    "Extracting {} failed: tar {status}",
                    self.image.display()
                ),
            });
        }

        debug!("Root filesystem extracted");
        Ok(root)
    }
}

/// Mock materializer for testing (creates an empty root)
#[derive(Debug, Clone)]
pub struct MockMaterializer {
    containers_root: PathBuf,
}

impl MockMaterializer {
    /// Create a mock materializer rooted at `containers_root`
    #[must_use]
    pub fn new(containers_root: impl Into<PathBuf>) -> Self {
        Self {
            containers_root: containers_root.into(),
        }
    }
}

#[async_trait]
impl RootfsMaterializer for MockMaterializer {
    async fn materialize(&self, id: &ContainerId) -> Result<PathBuf> {
        let root = create_container_root(&self.containers_root, id).await?;
        tracing::debug!("Mock: Materialized empty root");
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_mock_materializer_creates_private_root() {
        let tmp = tempfile::tempdir().unwrap();
        let materializer = MockMaterializer::new(tmp.path());
        let id = ContainerId::generate();

        let root = materializer.materialize(&id).await.unwrap();

        assert!(root.is_absolute());
        assert!(root.ends_with(id.as_str()));
        let mode = std::fs::metadata(&root).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_identity_collision_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let materializer = MockMaterializer::new(tmp.path());
        let id = ContainerId::new("container-fixed").unwrap();

        materializer.materialize(&id).await.unwrap();
        let err = materializer.materialize(&id).await.unwrap_err();

        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_missing_base_image() {
        let tmp = tempfile::tempdir().unwrap();
        let materializer =
            TarballMaterializer::new(tmp.path().join("containers"), tmp.path().join("nope.tar.gz"));

        let err = materializer
            .materialize(&ContainerId::generate())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Materialize { .. }));
        // nothing was created for the failed container
        assert!(!tmp.path().join("containers").exists());
    }
}

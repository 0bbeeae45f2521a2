//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use crate::Result;

/// Default directory holding one root filesystem per container
pub const DEFAULT_CONTAINERS_ROOT: &str = "./containers";

/// Default base image every container is extracted from
pub const DEFAULT_BASE_IMAGE: &str = "./ubuntu-base-22.04-base-amd64.tar.gz";

/// Name of the directory inside the new root that receives the old root
pub const OLD_ROOT_DIR: &str = ".old_root";

/// What the isolated process releases before it exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownPolicy {
    /// Unmount `/proc` and every volume, newest first
    pub unmount: bool,

    /// Lazily detach the old root left behind by the pivot
    pub detach_old_root: bool,
}

impl Default for TeardownPolicy {
    fn default() -> Self {
        Self {
            unmount: true,
            detach_old_root: false,
        }
    }
}

/// Runtime configuration shared by the orchestrating and isolated roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding container root filesystems
    pub containers_root: PathBuf,

    /// Gzipped tarball every container root is extracted from
    pub base_image: PathBuf,

    /// Teardown behaviour of the isolated process
    pub teardown: TeardownPolicy,

    /// Debug logging
    pub verbose: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            containers_root: PathBuf::from(DEFAULT_CONTAINERS_ROOT),
            base_image: PathBuf::from(DEFAULT_BASE_IMAGE),
            teardown: TeardownPolicy::default(),
            verbose: false,
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration with default paths
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the containers root
    #[must_use]
    pub fn with_containers_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.containers_root = path.into();
        self
    }

    /// Set the base image tarball
    #[must_use]
    pub fn with_base_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_image = path.into();
        self
    }

    /// Set the teardown policy
    #[must_use]
    pub const fn with_teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.teardown = teardown;
        self
    }

    /// Enable debug logging
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Create the containers root (owner-only) if it does not exist
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn ensure_containers_root(&self) -> Result<&Path> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.containers_root)?;

        Ok(&self.containers_root)
    }

    /// Global command-line flags that reproduce this configuration in a
    /// re-executed process
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--containers-root={}", self.containers_root.display()),
            format!("--image={}", self.base_image.display()),
        ];

        if !self.teardown.unmount {
            args.push("--keep-mounts".to_string());
        }
        if self.teardown.detach_old_root {
            args.push("--detach-old-root".to_string());
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }

        args
    }
}

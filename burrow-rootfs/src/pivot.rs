//! Root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually changes the root mount
//! rather than just the process's view of `/`.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use burrow_core::config::OLD_ROOT_DIR;
use burrow_core::{Error, Result};

use crate::{MountRecord, SystemBackend};

/// Mount point of the process information filesystem, relative to the root
const PROC_DIR: &str = "proc";

/// Makes a materialized container root the process root
pub struct RootSwitcher {
    backend: Arc<dyn SystemBackend>,
}

impl RootSwitcher {
    /// Create a root switcher using the given backend
    #[must_use]
    pub fn new(backend: Arc<dyn SystemBackend>) -> Self {
        Self { backend }
    }

    /// Where the old root is reachable once the pivot is done
    #[must_use]
    pub fn old_root() -> PathBuf {
        Path::new("/").join(OLD_ROOT_DIR)
    }

    /// Switch the process root to `new_root`
    ///
    /// 1. Bind `new_root` onto itself so it becomes a mount point
    /// 2. Create `new_root/.old_root`
    /// 3. `pivot_root(new_root, new_root/.old_root)`
    /// 4. `chdir("/")`
    ///
    /// A failure at any step leaves the process in an unknown state, the
    /// caller must abort.
    pub fn switch_root(&self, new_root: &Path) -> Result<()> {
        info!(new_root = %new_root.display(), "Switching root filesystem");

        self.backend.bind_mount(new_root, new_root)?;
        debug!("New root bound to itself");

        let put_old = new_root.join(OLD_ROOT_DIR);
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&put_old)
            .map_err(|e| Error::Pivot {
                message: format!("Failed to create {}: {e}", put_old.display()),
            })?;

        self.backend.pivot_root(new_root, &put_old)?;
        self.backend.chdir(Path::new("/"))?;

        info!("Root filesystem switched");
        Ok(())
    }

    /// Mount `proc` at `/proc` of the new root and record it
    ///
    /// Refuses to run before the record has been rebased onto `/`: mounting
    /// then would cover the host's `/proc` instead.
    pub fn mount_proc(&self, record: &mut MountRecord) -> Result<()> {
        if !record.is_rooted() {
            return Err(Error::Pivot {
                message: format!(
                    "Refusing to mount proc below {} before the root switch",
                    record.base().display()
                ),
            });
        }

        self.backend.mount_proc(&record.base().join(PROC_DIR))?;
        record.push(PROC_DIR);

        debug!("Proc filesystem mounted");
        Ok(())
    }

    /// Lazily detach the old root so the host tree is no longer reachable
    pub fn detach_old_root(&self) -> Result<()> {
        let old_root = Self::old_root();
        debug!(old_root = %old_root.display(), "Detaching old root");
        self.backend.unmount(&old_root)
    }
}

impl std::fmt::Debug for RootSwitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSwitcher").finish_non_exhaustive()
    }
}

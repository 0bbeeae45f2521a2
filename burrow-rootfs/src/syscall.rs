//! Linux implementation of [`SystemBackend`]

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::unistd::{pivot_root, sethostname};
use std::path::Path;
use tracing::{debug, error};

use burrow_core::{Error, Result};

use crate::SystemBackend;

/// Backend issuing the real system calls
///
/// Only meaningful inside fresh mount and UTS namespaces: every call here
/// changes the calling process's view of the system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxBackend;

impl LinuxBackend {
    /// Create a new Linux backend
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SystemBackend for LinuxBackend {
    fn make_private(&self, target: &Path) -> Result<()> {
        debug!(target = %target.display(), "Making mounts private");

        mount(
            None::<&str>,
            target,
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )
        .map_err(|e| Error::Mount {
            message: format!("Failed to make {} private: {e}", target.display()),
        })
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        debug!(
            source = %source.display(),
            target = %target.display(),
            "Bind mounting"
        );

        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| {
            error!(
                source = %source.display(),
                target = %target.display(),
                error = %e,
                "Bind mount failed"
            );
            Error::Mount {
                message: format!(
                    "Failed to bind {} onto {}: {e}",
                    source.display(),
                    target.display()
                ),
            }
        })
    }

    fn mount_proc(&self, target: &Path) -> Result<()> {
        debug!(target = %target.display(), "Mounting proc");

        std::fs::create_dir_all(target)?;

        // MS_NOSUID | MS_NODEV | MS_NOEXEC for security
        let flags = MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC;

        mount(Some("proc"), target, Some("proc"), flags, None::<&str>).map_err(|e| {
            Error::Mount {
                message: format!("Failed to mount proc at {}: {e}", target.display()),
            }
        })
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        debug!(target = %target.display(), "Unmounting");

        // Lazy detach: recursive binds may carry submounts
        umount2(target, MntFlags::MNT_DETACH).map_err(|e| Error::Mount {
            message: format!("Failed to unmount {}: {e}", target.display()),
        })
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()> {
        debug!(
            new_root = %new_root.display(),
            put_old = %put_old.display(),
            "Pivoting root"
        );

        pivot_root(new_root, put_old).map_err(|e| {
            error!(new_root = %new_root.display(), error = %e, "pivot_root failed");
            Error::Pivot {
                message: format!("pivot_root to {} failed: {e}", new_root.display()),
            }
        })
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        std::env::set_current_dir(path).map_err(|e| Error::Pivot {
            message: format!("Failed to change directory to {}: {e}", path.display()),
        })
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        debug!(hostname = %hostname, "Setting hostname");

        sethostname(hostname).map_err(|e| {
            error!(hostname = %hostname, error = %e, "Failed to set hostname");
            Error::Namespace {
                message: format!("Failed to set hostname: {e}"),
            }
        })
    }
}

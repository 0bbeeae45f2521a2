//! Namespace setup performed from inside the new namespaces

use std::path::Path;

use burrow_core::{ContainerId, Error, Result};
use burrow_rootfs::SystemBackend;

use crate::config::NamespaceConfig;

/// Applies the per-namespace setup the kernel does not do for us
#[derive(Debug)]
pub struct NamespaceManager {
    config: NamespaceConfig,
}

impl NamespaceManager {
    /// Create a new namespace manager
    #[must_use]
    pub const fn new(config: NamespaceConfig) -> Self {
        Self { config }
    }

    /// Create a new namespace manager with default config
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(NamespaceConfig::default())
    }

    /// Stop mount events from propagating back to the host
    ///
    /// A fresh mount namespace inherits the host's shared propagation, so
    /// without this every bind mount made for the container would also show
    /// up on the host.
    ///
    /// # Errors
    /// Returns error if the propagation change fails
    pub fn isolate_mounts(&self, backend: &dyn SystemBackend) -> Result<()> {
        if !(self.config.mount && self.config.private_mounts) {
            tracing::debug!("Mount propagation left unchanged");
            return Ok(());
        }

        backend.make_private(Path::new("/"))
    }

    /// Set the hostname of the UTS namespace to the container ID
    ///
    /// # Errors
    /// Returns error if `sethostname(2)` fails
    pub fn set_hostname(&self, backend: &dyn SystemBackend, id: &ContainerId) -> Result<()> {
        if !self.config.uts {
            tracing::warn!(
                container_id = %id,
                "UTS namespace disabled, keeping host hostname"
            );
            return Ok(());
        }

        backend.set_hostname(id.as_str())?;
        tracing::info!(hostname = %id, "Hostname set");
        Ok(())
    }

    /// Get current namespace IDs
    ///
    /// # Errors
    /// Returns error if the process has no readable namespace directory
    pub fn current_namespaces() -> Result<NamespaceInfo> {
        use std::fs;

        let base_path = "/proc/self/ns";

        if !Path::new(base_path).is_dir() {
            return Err(Error::Namespace {
                message: format!("No namespace information at {base_path}"),
            });
        }

        let read_ns = |name: &str| -> Option<String> {
            fs::read_link(format!("{base_path}/{name}"))
                .map(|p| p.to_string_lossy().into_owned())
                .ok()
        };

        Ok(NamespaceInfo {
            pid: read_ns("pid"),
            mnt: read_ns("mnt"),
            uts: read_ns("uts"),
        })
    }
}

/// Information about current namespaces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// PID namespace ID
    pub pid: Option<String>,
    /// Mount namespace ID
    pub mnt: Option<String>,
    /// UTS namespace ID
    pub uts: Option<String>,
}

impl std::fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Namespace Info:")?;
        if let Some(ref pid) = self.pid {
            writeln!(f, "  PID:    {pid}")?;
        }
        if let Some(ref mnt) = self.mnt {
            writeln!(f, "  MNT:    {mnt}")?;
        }
        if let Some(ref uts) = self.uts {
            writeln!(f, "  UTS:    {uts}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_rootfs::{BackendCall, MockBackend};

    #[test]
    fn test_isolate_mounts() {
        let backend = MockBackend::new();
        NamespaceManager::with_defaults()
            .isolate_mounts(&backend)
            .unwrap();
        assert_eq!(backend.calls(), vec![BackendCall::MakePrivate("/".into())]);

        let backend = MockBackend::new();
        NamespaceManager::new(NamespaceConfig::default().with_private_mounts(false))
            .isolate_mounts(&backend)
            .unwrap();
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_set_hostname_uses_container_id() {
        let backend = MockBackend::new();
        let id = ContainerId::new("container-abc").unwrap();

        NamespaceManager::with_defaults()
            .set_hostname(&backend, &id)
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![BackendCall::SetHostname("container-abc".into())]
        );
    }

    #[test]
    fn test_current_namespaces() {
        let info = NamespaceManager::current_namespaces().unwrap();

        assert!(info.pid.is_some());
    }

    #[test]
    fn test_namespace_info_display() {
        let info = NamespaceInfo {
            pid: Some("pid:[4026531836]".to_string()),
            uts: Some("uts:[4026531838]".to_string()),
            ..Default::default()
        };

        let display = format!("{info}");
        assert!(display.contains("PID:"));
        assert!(display.contains("UTS:"));
        assert!(!display.contains("MNT:"));
    }
}

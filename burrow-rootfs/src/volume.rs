//! Volume bind mounts and the record used to release them

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use burrow_core::{Error, Result, VolumeMapping};

use crate::SystemBackend;

/// Mounts made inside a container root, oldest first
///
/// Entries are stored relative to the container root. `base` is the
/// directory they currently resolve against: the container root on the host
/// until the pivot, `/` afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    base: PathBuf,
    entries: Vec<PathBuf>,
}

impl MountRecord {
    /// Empty record resolving against `base`
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            entries: Vec::new(),
        }
    }

    /// Directory entries currently resolve against
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// True once the record resolves against the process root
    #[must_use]
    pub fn is_rooted(&self) -> bool {
        self.base == Path::new("/")
    }

    /// Resolve entries against a new base (after the root switch)
    pub fn rebase(&mut self, base: impl Into<PathBuf>) {
        self.base = base.into();
    }

    /// Record a successful mount
    pub fn push(&mut self, relative: impl Into<PathBuf>) {
        self.entries.push(relative.into());
    }

    /// Recorded relative paths, oldest first
    #[must_use]
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Number of live mounts
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is left to release
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and resolve the newest entry
    fn pop(&mut self) -> Option<PathBuf> {
        self.entries.pop().map(|relative| self.base.join(relative))
    }
}

/// Creates mount points and bind-mounts host directories into a container root
pub struct VolumeManager {
    backend: Arc<dyn SystemBackend>,
}

impl VolumeManager {
    /// Create a volume manager using the given backend
    #[must_use]
    pub fn new(backend: Arc<dyn SystemBackend>) -> Self {
        Self { backend }
    }

    /// Parse every `host:container` mapping, rejecting the whole list if any
    /// entry is malformed
    ///
    /// # Errors
    /// Returns the first [`Error::InvalidVolume`] found
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<VolumeMapping>> {
        raw.iter().map(|s| s.as_ref().parse()).collect()
    }

    /// Mount `mappings` in order below the record's base
    ///
    /// Each successful mount is pushed onto `record` before the next one is
    /// attempted, so a failure part-way leaves the record describing exactly
    /// what has to be released.
    ///
    /// # Errors
    /// Returns error if a mount point cannot be created or a bind mount fails
    pub fn mount(&self, mappings: &[VolumeMapping], record: &mut MountRecord) -> Result<()> {
        for (index, mapping) in mappings.iter().enumerate() {
            let relative = mapping.relative_target();
            let target = record.base().join(&relative);

            debug!(
                index = index + 1,
                volume = %mapping,
                target = %target.display(),
                "Preparing volume"
            );

            DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&target)
                .map_err(|e| Error::Mount {
                    message: format!("Failed to create mount point {}: {e}", target.display()),
                })?;

            self.backend.bind_mount(mapping.host(), &target)?;
            record.push(relative);

            debug!(volume = %mapping, "Volume mounted");
        }

        Ok(())
    }

    /// Unmount everything in `record`, newest first
    ///
    /// Failures do not stop the walk; each one is logged and returned with the
    /// path that stayed mounted.
    pub fn unmount(&self, record: &mut MountRecord) -> Vec<(PathBuf, Error)> {
        let mut warnings = Vec::new();

        while let Some(target) = record.pop() {
            match self.backend.unmount(&target) {
                Ok(()) => debug!(target = %target.display(), "Unmounted"),
                Err(e) => {
                    warn!(target = %target.display(), error = %e, "Failed to unmount");
                    warnings.push((target, e));
                }
            }
        }

        warnings
    }
}

impl std::fmt::Debug for VolumeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendCall, MockBackend};

    fn manager() -> (VolumeManager, MockBackend) {
        let backend = MockBackend::new();
        (VolumeManager::new(Arc::new(backend.clone())), backend)
    }

    #[test]
    fn test_parse_all_is_all_or_nothing() {
        let ok = VolumeManager::parse_all(&["/a:/x", "/b:/y"]).unwrap();
        assert_eq!(ok.len(), 2);

        assert!(VolumeManager::parse_all(&["/a:/x", "broken", "/b:/y"]).is_err());
        assert!(VolumeManager::parse_all(&["/a:/x:/z"]).is_err());
    }

    #[test]
    fn test_mount_creates_targets_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let (manager, backend) = manager();
        let mappings = VolumeManager::parse_all(&["/srv:/data", "/srv/cache:/data/cache"]).unwrap();

        let mut record = MountRecord::new(tmp.path());
        manager.mount(&mappings, &mut record).unwrap();

        assert!(tmp.path().join("data/cache").is_dir());
        assert_eq!(
            record.entries(),
            &[PathBuf::from("data"), PathBuf::from("data/cache")]
        );
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::BindMount {
                    source: "/srv".into(),
                    target: tmp.path().join("data"),
                },
                BackendCall::BindMount {
                    source: "/srv/cache".into(),
                    target: tmp.path().join("data/cache"),
                },
            ]
        );
    }

    #[test]
    fn test_unmount_is_reverse_and_tolerates_failures() {
        let (manager, backend) = manager();
        backend.fail_on(BackendCall::Unmount("/b".into()));

        let mut record = MountRecord::new("/");
        record.push("a");
        record.push("b");
        record.push("c");

        let warnings = manager.unmount(&mut record);

        assert!(record.is_empty());
        assert_eq!(
            backend.unmounted(),
            vec![
                PathBuf::from("/c"),
                PathBuf::from("/b"),
                PathBuf::from("/a")
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].0, PathBuf::from("/b"));
    }

    #[test]
    fn test_failed_mount_keeps_partial_record() {
        let tmp = tempfile::tempdir().unwrap();
        let (manager, backend) = manager();
        backend.fail_on(BackendCall::BindMount {
            source: "/two".into(),
            target: tmp.path().join("two"),
        });

        let mappings =
            VolumeManager::parse_all(&["/one:/one", "/two:/two", "/three:/three"]).unwrap();
        let mut record = MountRecord::new(tmp.path());

        assert!(manager.mount(&mappings, &mut record).is_err());
        assert_eq!(record.entries(), &[PathBuf::from("one")]);
        // never attempted
        assert!(!tmp.path().join("three").exists());
    }
}

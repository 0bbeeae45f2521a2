//! System backend trait for pluggable implementations

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use burrow_core::{Error, Result};

/// Trait for the privileged operations the isolation pipeline performs
///
/// This allows for different implementations:
/// - [`LinuxBackend`](crate::LinuxBackend) - Real `mount(2)`, `pivot_root(2)`, `sethostname(2)`
/// - [`MockBackend`] - Records calls, touches nothing
///
/// # Thread Safety
/// All implementations must be `Send + Sync` so they can be shared behind an `Arc`.
pub trait SystemBackend: Send + Sync {
    /// Recursively mark every mount below `target` private
    ///
    /// # Errors
    /// Returns error if the propagation change fails
    fn make_private(&self, target: &Path) -> Result<()>;

    /// Recursive bind mount of `source` onto `target`
    ///
    /// # Errors
    /// Returns error if the mount fails
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;

    /// Mount a fresh `proc` filesystem at `target`
    ///
    /// # Errors
    /// Returns error if the mount fails
    fn mount_proc(&self, target: &Path) -> Result<()>;

    /// Detach whatever is mounted at `target`
    ///
    /// # Errors
    /// Returns error if the unmount fails
    fn unmount(&self, target: &Path) -> Result<()>;

    /// Make `new_root` the process root, moving the old root to `put_old`
    ///
    /// # Errors
    /// Returns error if `pivot_root(2)` fails
    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()>;

    /// Change the working directory
    ///
    /// # Errors
    /// Returns error if the directory cannot be entered
    fn chdir(&self, path: &Path) -> Result<()>;

    /// Set the hostname of the current UTS namespace
    ///
    /// # Errors
    /// Returns error if `sethostname(2)` fails
    fn set_hostname(&self, hostname: &str) -> Result<()>;
}

/// A call observed by [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// [`SystemBackend::make_private`]
    MakePrivate(PathBuf),
    /// [`SystemBackend::bind_mount`]
    BindMount {
        /// Source directory
        source: PathBuf,
        /// Mount point
        target: PathBuf,
    },
    /// [`SystemBackend::mount_proc`]
    MountProc(PathBuf),
    /// [`SystemBackend::unmount`]
    Unmount(PathBuf),
    /// [`SystemBackend::pivot_root`]
    PivotRoot {
        /// New root
        new_root: PathBuf,
        /// Where the old root lands
        put_old: PathBuf,
    },
    /// [`SystemBackend::chdir`]
    Chdir(PathBuf),
    /// [`SystemBackend::set_hostname`]
    SetHostname(String),
}

impl BackendCall {
    /// True for calls that add an entry to the mount table
    #[must_use]
    pub const fn is_mount(&self) -> bool {
        matches!(self, Self::BindMount { .. } | Self::MountProc(_))
    }
}

/// Mock backend for testing (doesn't touch the system)
///
/// # Example
/// ```
/// use burrow_rootfs::{BackendCall, MockBackend, SystemBackend};
/// use std::path::Path;
///
/// let backend = MockBackend::new();
/// backend.fail_on(BackendCall::Unmount("/data".into()));
///
/// backend.bind_mount(Path::new("/srv"), Path::new("/data")).unwrap();
/// assert!(backend.unmount(Path::new("/data")).is_err());
/// assert_eq!(backend.call_count(), 2);
/// ```
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<BackendCall>,
    failures: Vec<BackendCall>,
}

impl MockBackend {
    /// Create a new mock backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a specific call fail (it is still recorded)
    pub fn fail_on(&self, call: BackendCall) {
        self.state().failures.push(call);
    }

    /// All calls made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    /// Get the number of backend calls made (for testing)
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Targets passed to `unmount`, in order
    #[must_use]
    pub fn unmounted(&self) -> Vec<PathBuf> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Unmount(target) => Some(target.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) -> Result<()> {
        let mut state = self.state();
        let fail = state.failures.contains(&call);

        tracing::debug!(call = ?call, fail, "Mock: backend call");
        state.calls.push(call.clone());

        if fail {
            return Err(Error::Mount {
                message: format!("Mock: injected failure for {call:?}"),
            });
        }

        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend").finish_non_exhaustive()
    }
}

impl SystemBackend for MockBackend {
    fn make_private(&self, target: &Path) -> Result<()> {
        self.record(BackendCall::MakePrivate(target.to_path_buf()))
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        self.record(BackendCall::BindMount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        })
    }

    fn mount_proc(&self, target: &Path) -> Result<()> {
        self.record(BackendCall::MountProc(target.to_path_buf()))
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        self.record(BackendCall::Unmount(target.to_path_buf()))
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()> {
        self.record(BackendCall::PivotRoot {
            new_root: new_root.to_path_buf(),
            put_old: put_old.to_path_buf(),
        })
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        self.record(BackendCall::Chdir(path.to_path_buf()))
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        self.record(BackendCall::SetHostname(hostname.to_string()))
    }
}

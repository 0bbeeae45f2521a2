//! Namespace configuration

use nix::sched::CloneFlags;

/// Namespace configuration
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Enable PID namespace
    pub pid: bool,

    /// Enable mount namespace
    pub mount: bool,

    /// Enable UTS namespace (hostname)
    pub uts: bool,

    /// Mark every mount private on entry so nothing propagates to the host
    pub private_mounts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            uts: true,
            private_mounts: true,
        }
    }
}

impl NamespaceConfig {
    /// No isolation at all
    #[must_use]
    pub const fn none() -> Self {
        Self {
            pid: false,
            mount: false,
            uts: false,
            private_mounts: false,
        }
    }

    /// Enable PID namespace
    #[must_use]
    pub const fn with_pid(mut self, enable: bool) -> Self {
        self.pid = enable;
        self
    }

    /// Enable UTS namespace
    #[must_use]
    pub const fn with_uts(mut self, enable: bool) -> Self {
        self.uts = enable;
        self
    }

    /// Make mounts private on entry
    #[must_use]
    pub const fn with_private_mounts(mut self, enable: bool) -> Self {
        self.private_mounts = enable;
        self
    }

    /// Convert to clone flags for clone(2)
    #[must_use]
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();

        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }

        flags
    }

    /// Get list of enabled namespace names
    #[must_use]
    pub fn enabled_namespaces(&self) -> Vec<&'static str> {
        let mut namespaces = Vec::new();

        if self.pid {
            namespaces.push("pid");
        }
        if self.mount {
            namespaces.push("mnt");
        }
        if self.uts {
            namespaces.push("uts");
        }

        namespaces
    }
}

//! Two-role container launcher
//!
//! The orchestrating role runs on the host. It re-executes the current
//! binary as the first process of fresh PID, mount and UTS namespaces and
//! reports that process's exit code.
//!
//! The isolated role runs inside those namespaces and builds the container:
//!
//! 1. Mark all mounts private
//! 2. Materialize a root filesystem under a fresh container ID
//! 3. Set the hostname to the container ID, before anything logs that ID
//! 4. Bind-mount the volumes into the container root
//! 5. Pivot into the container root and mount `/proc`
//! 6. Run the user command and wait for it
//! 7. Release the mounts, newest first
//!
//! Step 7 runs whether or not the earlier steps succeeded.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use burrow_core::{
    ContainerEvent, ContainerId, Error, ProcessId, Result, RuntimeConfig, VolumeMapping,
};
use burrow_rootfs::{
    LinuxBackend, MountRecord, RootSwitcher, RootfsMaterializer, SystemBackend,
    TarballMaterializer, VolumeManager,
};

use crate::config::NamespaceConfig;
use crate::executor::NamespaceExecutor;
use crate::manager::NamespaceManager;
use crate::role::{LaunchSpec, Role};

/// Launches containers in either role
pub struct Launcher {
    config: RuntimeConfig,
    namespaces: NamespaceConfig,
    materializer: Arc<dyn RootfsMaterializer>,
    backend: Arc<dyn SystemBackend>,
}

impl Launcher {
    /// Launcher backed by the real kernel and the configured base image
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let materializer = Arc::new(TarballMaterializer::from_config(&config));
        Self::with_backends(config, materializer, Arc::new(LinuxBackend::new()))
    }

    /// Launcher with explicit materializer and system backend
    #[must_use]
    pub fn with_backends(
        config: RuntimeConfig,
        materializer: Arc<dyn RootfsMaterializer>,
        backend: Arc<dyn SystemBackend>,
    ) -> Self {
        Self {
            config,
            namespaces: NamespaceConfig::default(),
            materializer,
            backend,
        }
    }

    /// Override the namespaces that are created
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: NamespaceConfig) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Launch `command` with `volumes` in the given role
    ///
    /// Returns the exit code of the user command: its status, `128 + signal`
    /// if it was killed.
    ///
    /// # Errors
    /// - [`Error::InvalidConfig`] if `command` is empty; nothing is attempted
    /// - A setup error if the container cannot be built
    /// - [`Error::CommandStart`] if the user command cannot be started
    pub async fn launch(
        &self,
        command: &[String],
        volumes: &[VolumeMapping],
        role: Role,
    ) -> Result<i32> {
        let user = LaunchSpec::user_command(command)?;
        debug!(role = %role, volumes = volumes.len(), "Launching");

        match role {
            Role::Orchestrating => self.orchestrate(command, volumes),
            Role::Isolated => self.run_isolated(&user, volumes).await,
        }
    }

    fn orchestrate(&self, command: &[String], volumes: &[VolumeMapping]) -> Result<i32> {
        if !nix::unistd::geteuid().is_root() {
            return Err(Error::PermissionDenied {
                operation: "creating namespaces requires root".to_string(),
            });
        }

        let self_exe = std::env::current_exe()?;
        let spec = LaunchSpec::reexec(self_exe, &self.config, volumes, command);

        NamespaceExecutor::new(self.namespaces.clone()).spawn_isolated(&spec)
    }

    async fn run_isolated(&self, user: &LaunchSpec, volumes: &[VolumeMapping]) -> Result<i32> {
        info!(pid = %ProcessId::current(), "Entered isolated role");

        let manager = NamespaceManager::new(self.namespaces.clone());
        manager.isolate_mounts(self.backend.as_ref())?;
        if let Ok(info) = NamespaceManager::current_namespaces() {
            debug!("{info}");
        }

        let id = ContainerId::generate();
        let root = self.materializer.materialize(&id).await?;
        // Nothing naming the container is logged before its hostname is set
        manager.set_hostname(self.backend.as_ref(), &id)?;
        ContainerEvent::Created {
            id: id.clone(),
            root: root.clone(),
        }
        .emit_trace();

        let switcher = RootSwitcher::new(Arc::clone(&self.backend));
        let mut record = MountRecord::new(&root);

        let outcome = self
            .run_in_container(&switcher, &id, &root, &mut record, user, volumes)
            .await;

        self.teardown(&switcher, &id, &mut record);

        match outcome {
            Ok(exit_code) => {
                ContainerEvent::Exiting { id, exit_code }.emit_trace();
                Ok(exit_code)
            }
            Err(e) => {
                ContainerEvent::Error {
                    id,
                    message: e.to_string(),
                }
                .emit_trace();
                Err(e)
            }
        }
    }

    async fn run_in_container(
        &self,
        switcher: &RootSwitcher,
        id: &ContainerId,
        root: &Path,
        record: &mut MountRecord,
        user: &LaunchSpec,
        volumes: &[VolumeMapping],
    ) -> Result<i32> {
        VolumeManager::new(Arc::clone(&self.backend)).mount(volumes, record)?;
        for mapping in volumes {
            ContainerEvent::VolumeMounted {
                id: id.clone(),
                mapping: mapping.clone(),
            }
            .emit_trace();
        }

        switcher.switch_root(root)?;
        record.rebase("/");
        ContainerEvent::RootSwitched { id: id.clone() }.emit_trace();

        switcher.mount_proc(record)?;

        ContainerEvent::CommandStarted {
            id: id.clone(),
            program: user.program_name(),
        }
        .emit_trace();

        NamespaceExecutor::new(self.namespaces.clone()).run(user).await
    }

    fn teardown(&self, switcher: &RootSwitcher, id: &ContainerId, record: &mut MountRecord) {
        let policy = self.config.teardown;
        // Only meaningful once the pivot happened
        let switched = record.is_rooted();

        if policy.unmount {
            for (target, e) in VolumeManager::new(Arc::clone(&self.backend)).unmount(record) {
                ContainerEvent::TeardownWarning {
                    id: id.clone(),
                    target,
                    message: e.to_string(),
                }
                .emit_trace();
            }
        } else if !record.is_empty() {
            debug!(mounts = record.len(), "Keeping mounts");
        }

        if policy.detach_old_root && switched {
            if let Err(e) = switcher.detach_old_root() {
                ContainerEvent::TeardownWarning {
                    id: id.clone(),
                    target: RootSwitcher::old_root(),
                    message: e.to_string(),
                }
                .emit_trace();
            }
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("config", &self.config)
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}

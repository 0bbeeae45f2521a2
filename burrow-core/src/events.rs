//! Container lifecycle events with structured tracing

use std::fmt;
use std::path::PathBuf;

use crate::{ContainerId, VolumeMapping};

/// Events emitted while an isolated container runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    /// Root filesystem materialized
    Created {
        /// Container ID
        id: ContainerId,
        /// Container root on the host
        root: PathBuf,
    },

    /// Volume bind-mounted into the container root
    VolumeMounted {
        /// Container ID
        id: ContainerId,
        /// Mapping that was mounted
        mapping: VolumeMapping,
    },

    /// Process root switched to the container root
    RootSwitched {
        /// Container ID
        id: ContainerId,
    },

    /// User command launched
    CommandStarted {
        /// Container ID
        id: ContainerId,
        /// Program being run
        program: String,
    },

    /// Container exiting
    Exiting {
        /// Container ID
        id: ContainerId,
        /// Exit code
        exit_code: i32,
    },

    /// A mount could not be released during teardown
    TeardownWarning {
        /// Container ID
        id: ContainerId,
        /// Mount target that stayed behind
        target: PathBuf,
        /// Error message
        message: String,
    },

    /// Error occurred
    Error {
        /// Container ID
        id: ContainerId,
        /// Error message
        message: String,
    },
}

impl ContainerEvent {
    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::Created { id, root } => {
                tracing::info!(
                    container_id = %id,
                    root = %root.display(),
                    event = "created",
                    "{self}"
                );
            }
            Self::VolumeMounted { id, mapping } => {
                tracing::info!(
                    container_id = %id,
                    volume = %mapping,
                    event = "volume_mounted",
                    "{self}"
                );
            }
            Self::RootSwitched { id } => {
                tracing::info!(container_id = %id, event = "root_switched", "{self}");
            }
            Self::CommandStarted { id, program } => {
                tracing::info!(
                    container_id = %id,
                    program = %program,
                    event = "command_started",
                    "{self}"
                );
            }
            Self::Exiting { id, exit_code } => {
                tracing::info!(container_id = %id, exit_code, event = "exiting", "{self}");
            }
            Self::TeardownWarning { id, target, .. } => {
                tracing::warn!(
                    container_id = %id,
                    target = %target.display(),
                    event = "teardown_warning",
                    "{self}"
                );
            }
            Self::Error { id, .. } => {
                tracing::error!(container_id = %id, event = "error", "{self}");
            }
        }
    }
}

impl fmt::Display for ContainerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { id, root } => {
                write!(f, "Container {} created at {}", id, root.display())
            }
            Self::VolumeMounted { id, mapping } => {
                write!(f, "Container {id} mounted {mapping}")
            }
            Self::RootSwitched { id } => write!(f, "Container {id} switched root"),
            Self::CommandStarted { id, program } => {
                write!(f, "Container {id} running {program}")
            }
            Self::Exiting { id, exit_code } => {
                write!(f, "Container {id} exiting with code {exit_code}")
            }
            Self::TeardownWarning {
                id,
                target,
                message,
            } => {
                write!(
                    f,
                    "Container {} left {} mounted: {}",
                    id,
                    target.display(),
                    message
                )
            }
            Self::Error { id, message } => {
                write!(f, "Container {id} error: {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_warning_display() {
        let event = ContainerEvent::TeardownWarning {
            id: ContainerId::new("test").unwrap(),
            target: PathBuf::from("/data"),
            message: "busy".to_string(),
        };

        assert_eq!(event.to_string(), "Container test left /data mounted: busy");
    }

    #[test]
    fn test_volume_mounted_display() {
        let event = ContainerEvent::VolumeMounted {
            id: ContainerId::new("test").unwrap(),
            mapping: "/srv:/data".parse().unwrap(),
        };

        assert_eq!(event.to_string(), "Container test mounted /srv:/data");
    }
}

//! Namespace isolation and the two-role container launcher
//!
//! This crate provides the Linux namespace side of a container:
//! - UTS namespace - Hostname isolation
//! - PID namespace - Process isolation
//! - Mount namespace - Filesystem isolation, with private propagation
//!
//! The [`Launcher`] re-executes the current binary inside fresh namespaces
//! (orchestrating role) and, once there, builds the container and runs the
//! user command (isolated role).

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod executor;
pub mod launcher;
pub mod manager;
pub mod role;

pub use config::NamespaceConfig;
pub use executor::NamespaceExecutor;
pub use launcher::Launcher;
pub use manager::{NamespaceInfo, NamespaceManager};
pub use role::{ISOLATED_SUBCOMMAND, LaunchSpec, Role};

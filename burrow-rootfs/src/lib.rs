//! Root filesystem management with pluggable system backends
//!
//! This crate turns a base image into a private container root and prepares
//! it for use as the process root:
//! - Materializing a container root from a tarball
//! - Bind-mounting host volumes and releasing them in reverse order
//! - Switching the process root with `pivot_root(2)`
//! - Listing existing container roots
//!
//! Every mount-table or hostname change goes through [`SystemBackend`], so the
//! whole pipeline can be exercised against [`MockBackend`] without root.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod inventory;
pub mod materializer;
pub mod pivot;
pub mod syscall;
pub mod volume;

pub use backend::{BackendCall, MockBackend, SystemBackend};
pub use inventory::{ContainerEntry, list_containers};
pub use materializer::{MockMaterializer, RootfsMaterializer, TarballMaterializer};
pub use pivot::RootSwitcher;
pub use syscall::LinuxBackend;
pub use volume::{MountRecord, VolumeManager};

// Re-export commonly used types
pub use burrow_core::{ContainerId, VolumeMapping};

//! Burrow Core - Foundation types, events, and configuration
//!
//! This crate provides the core abstractions shared by the launcher, the
//! root filesystem tooling and the CLI.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{RuntimeConfig, TeardownPolicy};
pub use error::{Error, ErrorKind, Result};
pub use events::ContainerEvent;
pub use types::{ContainerId, ProcessId, VolumeMapping};

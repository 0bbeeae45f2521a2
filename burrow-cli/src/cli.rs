//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use burrow_core::config::{DEFAULT_BASE_IMAGE, DEFAULT_CONTAINERS_ROOT};
use burrow_core::{RuntimeConfig, TeardownPolicy, VolumeMapping};
use burrow_namespace::ISOLATED_SUBCOMMAND;

#[derive(Parser)]
#[command(name = "burrow")]
#[command(about = "Minimal namespace-isolated container launcher", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding one root filesystem per container
    #[arg(long, global = true, value_name = "DIR", default_value = DEFAULT_CONTAINERS_ROOT)]
    pub containers_root: PathBuf,

    /// Gzipped tarball every container root is extracted from
    #[arg(long, global = true, value_name = "TARBALL", default_value = DEFAULT_BASE_IMAGE)]
    pub image: PathBuf,

    /// Leave /proc and the volumes mounted when the command exits
    #[arg(long, global = true)]
    pub keep_mounts: bool,

    /// Lazily detach the host root from the container when the command exits
    #[arg(long, global = true)]
    pub detach_old_root: bool,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Runtime configuration described by the global flags
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::new()
            .with_containers_root(&self.containers_root)
            .with_base_image(&self.image)
            .with_teardown(TeardownPolicy {
                unmount: !self.keep_mounts,
                detach_old_root: self.detach_old_root,
            })
            .with_verbose(self.verbose)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command in a new container
    Run(ContainerArgs),

    /// Re-entry point inside the new namespaces
    #[command(name = ISOLATED_SUBCOMMAND, hide = true)]
    Isolated(ContainerArgs),

    /// List containers
    Ps,
}

#[derive(Args)]
pub struct ContainerArgs {
    /// Bind-mount a host directory into the container (repeatable)
    #[arg(short = 'v', long = "volume", value_name = "HOST:CONTAINER")]
    pub volumes: Vec<VolumeMapping>,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

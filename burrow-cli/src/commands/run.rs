//! Run command implementation

use anyhow::Result;
use burrow_core::RuntimeConfig;
use burrow_namespace::{Launcher, Role};

use crate::cli::ContainerArgs;

pub async fn execute(config: &RuntimeConfig, args: &ContainerArgs, role: Role) -> Result<i32> {
    tracing::debug!(
        role = %role,
        command = ?args.command,
        volumes = args.volumes.len(),
        "Starting container"
    );

    let launcher = Launcher::new(config.clone());
    let exit_code = launcher.launch(&args.command, &args.volumes, role).await?;

    Ok(exit_code)
}

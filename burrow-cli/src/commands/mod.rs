use crate::cli::Commands;
use anyhow::Result;
use burrow_core::RuntimeConfig;
use burrow_namespace::Role;

pub mod ps;
pub mod run;

/// Dispatch command to appropriate handler, returning the process exit code
pub async fn dispatch(command: Commands, config: &RuntimeConfig) -> Result<i32> {
    config.ensure_containers_root()?;

    match command {
        Commands::Run(args) => run::execute(config, &args, Role::Orchestrating).await,
        Commands::Isolated(args) => run::execute(config, &args, Role::Isolated).await,
        Commands::Ps => ps::execute(config).await,
    }
}

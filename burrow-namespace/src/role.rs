//! Launcher roles and launch specifications

use std::fmt;
use std::path::PathBuf;

use burrow_core::{Error, Result, RuntimeConfig, VolumeMapping};

/// Hidden subcommand the orchestrating role re-executes itself with
///
/// Leading underscores keep it out of the way of any user-facing subcommand.
pub const ISOLATED_SUBCOMMAND: &str = "__isolated";

/// Which side of the namespace boundary the launcher runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// On the host, about to create namespaces
    Orchestrating,
    /// Inside the new namespaces, about to build the container
    Isolated,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orchestrating => write!(f, "orchestrating"),
            Self::Isolated => write!(f, "isolated"),
        }
    }
}

/// Resolved program, arguments and the role that spawns them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments, excluding the program itself
    pub args: Vec<String>,
    /// Role of the process doing the spawning
    pub role: Role,
}

impl LaunchSpec {
    /// Re-execution of `self_exe` into the isolated role
    ///
    /// Produces `[config flags…] __isolated [-v=host:container…] -- command…`.
    #[must_use]
    pub fn reexec(
        self_exe: impl Into<PathBuf>,
        config: &RuntimeConfig,
        volumes: &[VolumeMapping],
        command: &[String],
    ) -> Self {
        let mut args = config.to_args();
        args.push(ISOLATED_SUBCOMMAND.to_string());
        args.extend(volumes.iter().map(VolumeMapping::to_arg));
        args.push("--".to_string());
        args.extend_from_slice(command);

        Self {
            program: self_exe.into(),
            args,
            role: Role::Orchestrating,
        }
    }

    /// The user command, run from inside the container
    ///
    /// # Errors
    /// Returns a configuration error if `command` is empty
    pub fn user_command(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::config("You must specify a command to run in the container"))?;

        Ok(Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
            role: Role::Isolated,
        })
    }

    /// Program as a display string
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

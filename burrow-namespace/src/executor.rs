//! Process execution in isolated namespaces
//!
//! [`NamespaceExecutor::spawn_isolated`] clones the re-executed launcher into
//! new namespaces and waits for it. [`NamespaceExecutor::run`] runs the user
//! command inside them.

#![allow(unsafe_code)]

use nix::sched::clone;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, execv};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tracing::{debug, error, info, warn};

use burrow_core::{Error, ProcessId, Result};

use crate::config::NamespaceConfig;
use crate::role::LaunchSpec;

/// Stack handed to the cloned child, which only needs enough room to exec
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Exit code of a cloned child whose exec failed
const EXEC_FAILED: isize = 127;

/// Spawns launch specs and waits for them
#[derive(Debug, Clone, Default)]
pub struct NamespaceExecutor {
    config: NamespaceConfig,
}

impl NamespaceExecutor {
    /// Create an executor creating the namespaces in `config`
    #[must_use]
    pub const fn new(config: NamespaceConfig) -> Self {
        Self { config }
    }

    /// Run `spec` as the first process of fresh namespaces and wait for it
    ///
    /// The child is created with clone(2) and immediately execs
    /// `spec.program`, so it becomes PID 1 of the new PID namespace.
    pub fn spawn_isolated(&self, spec: &LaunchSpec) -> Result<i32> {
        let program = to_cstring(spec.program.as_os_str().as_bytes())?;
        let mut argv = Vec::with_capacity(spec.args.len() + 1);
        argv.push(program.clone());
        for arg in &spec.args {
            argv.push(to_cstring(arg.as_bytes())?);
        }

        let flags = self.config.to_clone_flags();
        info!(
            program = %spec.program_name(),
            role = %spec.role,
            namespaces = ?self.config.enabled_namespaces(),
            "Creating namespaces"
        );

        let mut stack = vec![0u8; CHILD_STACK_SIZE];
        let child_fn = Box::new(|| -> isize {
            // Only returns on failure
            let err = execv(&program, &argv).err();
            eprintln!("Failed to re-execute {}: {err:?}", program.to_string_lossy());
            EXEC_FAILED
        });

        let child = unsafe { clone(child_fn, &mut stack, flags, Some(Signal::SIGCHLD as i32)) }
            .map_err(|e| Error::Namespace {
                message: format!("clone failed: {e}"),
            })?;

        info!(pid = %ProcessId::from(child), "Isolated process started");
        ignore_terminal_signals();

        wait_for(child)
    }

    /// Run `spec` in the current namespaces with inherited stdio
    ///
    /// Returns the command's exit code, or `128 + signal` if it was killed.
    pub async fn run(&self, spec: &LaunchSpec) -> Result<i32> {
        debug!(program = %spec.program_name(), args = ?spec.args, "Executing command");

        let mut child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::CommandStart {
                program: spec.program_name(),
                source,
            })?;

        if let Some(pid) = child.id() {
            debug!(pid, "Command running");
        }

        let status = child.wait().await?;
        Ok(exit_code(status))
    }
}

fn to_cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|e| Error::config(format!("Argument contains a NUL byte: {e}")))
}

/// Leave interrupts from the terminal to the container
///
/// The terminal delivers them to the whole foreground group; the parent has to
/// outlive the child to report its exit status.
fn ignore_terminal_signals() {
    for sig in [Signal::SIGINT, Signal::SIGQUIT] {
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            warn!(signal = ?sig, error = %e, "Could not ignore signal");
        }
    }
}

/// Wait for child to exit
fn wait_for(child: Pid) -> Result<i32> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, exit_code)) => {
                info!(exit_code, "Isolated process exited");
                return Ok(exit_code);
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                warn!(signal = ?sig, "Isolated process terminated by signal");
                return Ok(128 + sig as i32);
            }
            Ok(status) => {
                debug!(status = ?status, "Isolated process status changed");
            }
            Err(nix::errno::Errno::EINTR) => {
                debug!("Wait interrupted by signal, continuing");
            }
            Err(e) => {
                error!(error = %e, "Wait failed");
                return Err(Error::Namespace {
                    message: format!("Wait failed: {e}"),
                });
            }
        }
    }
}

/// Map an exit status to a shell-style exit code
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

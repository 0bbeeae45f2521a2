use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burrow_core::{ContainerId, ErrorKind, Result, RuntimeConfig, TeardownPolicy, VolumeMapping};
use burrow_namespace::*;
use burrow_rootfs::{
    BackendCall, MockBackend, MockMaterializer, RootfsMaterializer, list_containers,
};

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

/// Always hands out the same, known root
struct FixedRoot(PathBuf);

#[async_trait]
impl RootfsMaterializer for FixedRoot {
    async fn materialize(&self, _id: &ContainerId) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.0)?;
        Ok(self.0.clone())
    }
}

/// Formatted log output kept in memory
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(ToString::to_string)
            .collect()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's debug logs into `logs`
fn capture_logs(logs: &LogBuffer) -> tracing::subscriber::DefaultGuard {
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

fn volumes(raw: &[&str]) -> Vec<VolumeMapping> {
    raw.iter().map(|v| v.parse().unwrap()).collect()
}

fn config(root: &Path) -> RuntimeConfig {
    RuntimeConfig::new().with_containers_root(root.join("containers"))
}

fn fixed_launcher(root: &Path, policy: TeardownPolicy, backend: &MockBackend) -> Launcher {
    Launcher::with_backends(
        config(root).with_teardown(policy),
        Arc::new(FixedRoot(root.join("rootfs"))),
        Arc::new(backend.clone()),
    )
}

#[tokio::test]
async fn test_isolated_call_order() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let containers = tmp.path().join("containers");
    let launcher = Launcher::with_backends(
        config(tmp.path()),
        Arc::new(MockMaterializer::new(&containers)),
        Arc::new(backend.clone()),
    );
    let logs = LogBuffer::default();
    let guard = capture_logs(&logs);

    let code = launcher
        .launch(&command(&["true"]), &volumes(&["/srv/data:/data"]), Role::Isolated)
        .await
        .unwrap();
    drop(guard);
    assert_eq!(code, 0);

    let calls = backend.calls();
    let BackendCall::SetHostname(hostname) = &calls[1] else {
        panic!("expected hostname to be set second, got {calls:?}");
    };
    let id = ContainerId::new(hostname.clone()).unwrap();
    let root = std::fs::canonicalize(&containers).unwrap().join(id.as_str());

    assert_eq!(
        calls,
        vec![
            BackendCall::MakePrivate("/".into()),
            BackendCall::SetHostname(id.to_string()),
            BackendCall::BindMount {
                source: "/srv/data".into(),
                target: root.join("data"),
            },
            BackendCall::BindMount {
                source: root.clone(),
                target: root.clone(),
            },
            BackendCall::PivotRoot {
                new_root: root.clone(),
                put_old: root.join(".old_root"),
            },
            BackendCall::Chdir("/".into()),
            BackendCall::MountProc("/proc".into()),
            BackendCall::Unmount("/proc".into()),
            BackendCall::Unmount("/data".into()),
        ]
    );

    // The ID first shows up in the logs when it becomes the hostname
    let lines = logs.lines();
    let mentions: Vec<_> = lines
        .iter()
        .filter(|line| line.contains(id.as_str()))
        .collect();
    assert!(mentions[0].contains("SetHostname"), "{mentions:?}");
    let hostname_set = lines.iter().position(|l| l.contains("Hostname set")).unwrap();
    let created = lines.iter().position(|l| l.contains("created at")).unwrap();
    assert!(hostname_set < created, "{lines:?}");
}

#[tokio::test]
async fn test_container_root_is_retained() {
    let tmp = tempfile::tempdir().unwrap();
    let containers = tmp.path().join("containers");
    let launcher = Launcher::with_backends(
        config(tmp.path()),
        Arc::new(MockMaterializer::new(&containers)),
        Arc::new(MockBackend::new()),
    );

    launcher
        .launch(&command(&["true"]), &[], Role::Isolated)
        .await
        .unwrap();
    launcher
        .launch(&command(&["true"]), &[], Role::Isolated)
        .await
        .unwrap();

    let listed = list_containers(&containers).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|c| c.name.starts_with("container-")));
}

#[tokio::test]
async fn test_exit_code_is_propagated() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend);

    let code = launcher
        .launch(&command(&["sh", "-c", "exit 1"]), &[], Role::Isolated)
        .await
        .unwrap();
    assert_eq!(code, 1);

    let code = launcher
        .launch(&command(&["sh", "-c", "exit 7"]), &[], Role::Isolated)
        .await
        .unwrap();
    assert_eq!(code, 7);
}

#[tokio::test]
async fn test_missing_program_still_tears_down() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend);

    let err = launcher
        .launch(
            &command(&["/no/such/program"]),
            &volumes(&["/srv/a:/a"]),
            Role::Isolated,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.exit_code(), 127);
    assert_eq!(
        backend.unmounted(),
        vec![PathBuf::from("/proc"), PathBuf::from("/a")]
    );
}

#[tokio::test]
async fn test_volume_failure_releases_earlier_mounts() {
    let tmp = tempfile::tempdir().unwrap();
    let rootfs = tmp.path().join("rootfs");
    let backend = MockBackend::new();
    backend.fail_on(BackendCall::BindMount {
        source: "/srv/b".into(),
        target: rootfs.join("b"),
    });
    let policy = TeardownPolicy {
        unmount: true,
        detach_old_root: true,
    };
    let launcher = fixed_launcher(tmp.path(), policy, &backend);

    let err = launcher
        .launch(
            &command(&["true"]),
            &volumes(&["/srv/a:/a", "/srv/b:/b", "/srv/c:/c"]),
            Role::Isolated,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Setup);
    assert_eq!(err.exit_code(), 126);

    // Nothing past the failed volume ran
    let calls = backend.calls();
    assert!(!calls.iter().any(|c| matches!(c, BackendCall::PivotRoot { .. })));
    assert!(!calls.contains(&BackendCall::BindMount {
        source: "/srv/c".into(),
        target: rootfs.join("c"),
    }));

    // Only the mount that succeeded is released, and the host root is not detached
    assert_eq!(backend.unmounted(), vec![rootfs.join("a")]);
}

#[tokio::test]
async fn test_pivot_failure_unmounts_volumes_on_host_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let rootfs = tmp.path().join("rootfs");
    let backend = MockBackend::new();
    backend.fail_on(BackendCall::PivotRoot {
        new_root: rootfs.clone(),
        put_old: rootfs.join(".old_root"),
    });
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend);

    let err = launcher
        .launch(&command(&["true"]), &volumes(&["/srv/a:/a"]), Role::Isolated)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Setup);
    assert!(!backend.calls().iter().any(|c| matches!(c, BackendCall::MountProc(_))));
    assert_eq!(backend.unmounted(), vec![rootfs.join("a")]);
}

#[tokio::test]
async fn test_unmount_failure_is_only_a_warning() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    backend.fail_on(BackendCall::Unmount("/proc".into()));
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend);

    let code = launcher
        .launch(&command(&["true"]), &volumes(&["/srv/a:/a"]), Role::Isolated)
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(
        backend.unmounted(),
        vec![PathBuf::from("/proc"), PathBuf::from("/a")]
    );
}

#[tokio::test]
async fn test_keep_mounts_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let policy = TeardownPolicy {
        unmount: false,
        detach_old_root: false,
    };
    let launcher = fixed_launcher(tmp.path(), policy, &backend);

    launcher
        .launch(&command(&["true"]), &volumes(&["/srv/a:/a"]), Role::Isolated)
        .await
        .unwrap();

    assert!(backend.unmounted().is_empty());
}

#[tokio::test]
async fn test_detach_old_root_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let policy = TeardownPolicy {
        unmount: true,
        detach_old_root: true,
    };
    let launcher = fixed_launcher(tmp.path(), policy, &backend);

    launcher
        .launch(&command(&["true"]), &[], Role::Isolated)
        .await
        .unwrap();

    assert_eq!(
        backend.unmounted(),
        vec![PathBuf::from("/proc"), PathBuf::from("/.old_root")]
    );
}

#[tokio::test]
async fn test_empty_command_does_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend);

    for role in [Role::Orchestrating, Role::Isolated] {
        let err = launcher.launch(&[], &[], role).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    assert_eq!(backend.call_count(), 0);
    assert!(!tmp.path().join("rootfs").exists());
}

#[tokio::test]
async fn test_uts_disabled_keeps_hostname() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend)
        .with_namespaces(NamespaceConfig::default().with_uts(false));

    launcher
        .launch(&command(&["true"]), &[], Role::Isolated)
        .await
        .unwrap();

    assert!(!backend
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::SetHostname(_))));
}

#[tokio::test]
async fn test_orchestrating_requires_root() {
    if is_root() {
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let launcher = fixed_launcher(tmp.path(), TeardownPolicy::default(), &backend);

    let err = launcher
        .launch(&command(&["true"]), &[], Role::Orchestrating)
        .await
        .unwrap_err();

    assert!(matches!(err, burrow_core::Error::PermissionDenied { .. }));
    assert_eq!(backend.call_count(), 0);
}

#[test]
#[ignore] // Requires root
fn test_spawn_isolated_gets_its_own_pid_namespace() {
    if !is_root() {
        return;
    }

    let executor = NamespaceExecutor::new(NamespaceConfig::none().with_pid(true));
    let spec = LaunchSpec {
        program: PathBuf::from("/bin/sh"),
        args: command(&["-c", "test $$ -eq 1"]),
        role: Role::Orchestrating,
    };

    assert_eq!(executor.spawn_isolated(&spec).unwrap(), 0);
}

#[test]
#[ignore] // Requires root
fn test_spawn_isolated_reports_exit_code() {
    if !is_root() {
        return;
    }

    let executor = NamespaceExecutor::new(NamespaceConfig::default());
    let spec = LaunchSpec {
        program: PathBuf::from("/bin/sh"),
        args: command(&["-c", "exit 5"]),
        role: Role::Orchestrating,
    };

    assert_eq!(executor.spawn_isolated(&spec).unwrap(), 5);
}

use convoy::session::{run_local, RemoteSession, SessionError};
use convoy::types::Host;
use tokio::sync::Mutex;

fn local_session() -> RemoteSession {
    RemoteSession::new(Host::synthetic(), "app", false)
}

#[tokio::test]
async fn synthetic_host_runs_commands_locally() {
    let session = local_session();
    assert_eq!(session.run("echo test").await.unwrap(), "test");
}

#[tokio::test]
async fn nonzero_exit_with_stderr_is_a_typed_failure() {
    let err = run_local("echo boom >&2; exit 3", false).await.unwrap_err();
    match err {
        SessionError::CommandFailed {
            command,
            code,
            stderr,
        } => {
            assert!(command.contains("exit 3"));
            assert_eq!(code, 3);
            assert_eq!(stderr, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn nonzero_exit_with_empty_stderr_is_a_soft_success() {
    assert_eq!(run_local("exit 3", false).await.unwrap(), "");
}

#[tokio::test]
async fn impersonation_is_restored_even_when_the_operation_fails() {
    let mut session = local_session();
    let result = {
        let root = session.become_user("root");
        assert_eq!(root.user(), "root");
        root.run("echo broken >&2; exit 1").await
    };
    assert!(result.is_err());
    assert_eq!(session.user(), "app");
}

#[tokio::test]
async fn sudo_runs_one_command_as_root_and_restores_the_user() {
    let mut session = local_session();
    assert_eq!(session.sudo("echo elevated").await.unwrap(), "elevated");
    assert_eq!(session.user(), "app");
}

#[tokio::test]
async fn interactive_commands_report_no_captured_output() {
    let session = local_session();
    assert_eq!(session.run_interactive("true").await.unwrap(), "");
}

#[tokio::test]
async fn wait_returns_after_the_delay() {
    let session = local_session();
    let started = std::time::Instant::now();
    session.wait(0).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn change_dir_prefixes_commands_for_the_scope_only() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().canonicalize().unwrap();

    let mut session = local_session();
    {
        let scoped = session.change_dir(&canonical);
        assert_eq!(
            std::path::PathBuf::from(scoped.run("pwd").await.unwrap()),
            canonical
        );
    }
    // prefix restored: pwd now reports the process working directory again
    let outside = session.run("pwd").await.unwrap();
    assert_ne!(std::path::PathBuf::from(outside), canonical);
}

#[tokio::test]
async fn append_line_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("sysctl.conf");

    let session = local_session();
    session
        .append_line("vm.overcommit_memory=1", &target)
        .await
        .unwrap();
    session
        .append_line("vm.overcommit_memory=1", &target)
        .await
        .unwrap();

    let text = std::fs::read_to_string(&target).unwrap();
    assert_eq!(text.matches("vm.overcommit_memory=1").count(), 1);
}

#[tokio::test]
async fn mkdir_and_rm_rf_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a/b/c");

    let session = local_session();
    session.mkdir(&nested, false).await.unwrap();
    assert!(nested.is_dir());
    session.rm_rf(&dir.path().join("a")).await.unwrap();
    assert!(!nested.exists());
}

#[tokio::test]
async fn fixed_instance_count_passes_through() {
    let session = local_session();
    assert_eq!(session.instances_count(3, 0).await.unwrap(), 3);
    assert_eq!(session.instances_count(0, 0).await.unwrap(), 1);
}

#[tokio::test]
async fn missing_template_is_a_typed_error() {
    let session = local_session();
    let lock = Mutex::new(());
    let err = session
        .upload_template(
            &lock,
            std::path::Path::new("/nonexistent/unit.service"),
            std::path::Path::new("/etc/unit.service"),
            &serde_json::json!({}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::MissingTemplate { .. }));
}

#[tokio::test]
async fn rendered_file_is_cleaned_up_when_the_upload_fails() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("unit.service");
    std::fs::write(&template, "ExecStart=/bin/app {{instance}}").unwrap();

    // synthetic host has no address, so the upload itself must fail
    let session = local_session();
    let lock = Mutex::new(());
    let err = session
        .upload_template(
            &lock,
            &template,
            std::path::Path::new("/etc/systemd/system/unit.service"),
            &serde_json::json!({"instance": 1}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoAddress { .. }));

    let leftover: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("render"))
        .collect();
    assert!(leftover.is_empty(), "render file must be removed");
}

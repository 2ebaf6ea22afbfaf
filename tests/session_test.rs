#![cfg(unix)]

//! End-to-end behaviour of a session against a scripted engine.

mod common;

use std::collections::HashMap;

use common::{FakeEngine, Sink};
use tfexec::{shared_writer, Context, EngineErrorKind, Error, Opt, Session, Version};

#[test]
fn test_missing_paths_are_rejected() {
    let engine = FakeEngine::new("1.5.7", "exit 0");

    let err = Session::new(engine.path("nope"), &engine.bin).unwrap_err();
    assert!(matches!(err, Error::NoWorkingDir { .. }));

    let err = Session::new(engine.dir.path(), engine.path("bin/terraform")).unwrap_err();
    assert!(matches!(err, Error::NoSuitableBinary { .. }));
}

#[tokio::test]
async fn test_relative_binary_is_resolved_against_current_dir() {
    let engine = FakeEngine::new_in(".", "1.5.7", "exit 0");
    assert!(engine.bin.is_relative());
    let working = tempfile::tempdir().unwrap();

    let session = Session::builder(working.path(), &engine.bin)
        .environment_source(std::sync::Arc::new(tfexec::FixedEnvironment::new([(
            "PATH",
            common::PATH,
        )])))
        .build()
        .unwrap();
    assert!(session.exec_path().is_absolute());
    assert_eq!(
        session.exec_path(),
        std::env::current_dir().unwrap().join(&engine.bin)
    );

    let info = session.version(&Context::new(), false).await.unwrap();
    assert_eq!(info.core, Version::new(1, 5, 7));
}

#[test]
fn test_engines_installed_concurrently_are_executable() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                let engine = FakeEngine::new("1.5.7", "exit 0");
                let out = std::process::Command::new(&engine.bin)
                    .arg("version")
                    .output()
                    .unwrap();
                assert!(out.status.success());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[tokio::test]
async fn test_large_apply_output_is_forwarded() {
    let engine = FakeEngine::new("1.5.7", "head -c 100000 /dev/zero | tr '\\0' z; echo");
    let stdout = Sink::default();
    let session = engine
        .builder()
        .stdout(shared_writer(stdout.clone()))
        .build()
        .unwrap();

    session.apply(&Context::new(), []).await.unwrap();
    assert_eq!(stdout.contents().len(), 100_001);
}

#[test]
fn test_reserved_variables_cannot_be_overridden() {
    let engine = FakeEngine::new("1.5.7", "exit 0");
    let mut session = engine.session();
    let err = session
        .set_env(HashMap::from([("TF_LOG".to_string(), "DEBUG".to_string())]))
        .unwrap_err();
    assert!(matches!(err, Error::ManualEnvVar { name } if name == "TF_LOG"));
}

#[tokio::test]
async fn test_version_is_parsed_and_cached() {
    let engine = FakeEngine::new("1.5.7", "exit 0");
    let session = engine.session();
    let ctx = Context::new();

    let info = session.version(&ctx, false).await.unwrap();
    assert_eq!(info.core, Version::new(1, 5, 7));

    std::fs::remove_file(&engine.bin).unwrap();
    let cached = session.version(&ctx, false).await.unwrap();
    assert_eq!(cached.core, Version::new(1, 5, 7));
}

#[tokio::test]
async fn test_child_environment_is_controlled() {
    let engine = FakeEngine::new(
        "1.5.7",
        r#"echo "$TF_IN_AUTOMATION|$TF_WORKSPACE|$TF_APPEND_USER_AGENT|$HOME""#,
    );
    let session = engine
        .builder()
        .environment_source(std::sync::Arc::new(tfexec::FixedEnvironment::new([
            ("PATH", common::PATH),
            ("HOME", "/home/ops"),
            ("TF_WORKSPACE", "prod"),
        ])))
        .append_user_agent("deployer/2.1")
        .build()
        .unwrap();

    let line = session.state_pull(&Context::new(), []).await.unwrap();
    let fields: Vec<&str> = line.trim_end().split('|').collect();
    assert_eq!(fields[0], "1");
    assert_eq!(fields[1], "");
    assert!(fields[2].contains("deployer/2.1"));
    assert!(fields[2].contains(&tfexec::driver_identifier()));
    assert_eq!(fields[3], "/home/ops");
}

#[tokio::test]
async fn test_forwarders_see_output_and_errors_keep_stderr() {
    let engine = FakeEngine::new("1.5.7", "echo applying; echo 'Error: boom' >&2; exit 1");
    let stdout = Sink::default();
    let stderr = Sink::default();
    let session = engine
        .builder()
        .stdout(shared_writer(stdout.clone()))
        .stderr(shared_writer(stderr.clone()))
        .build()
        .unwrap();

    let err = session.apply(&Context::new(), []).await.unwrap_err();
    assert_eq!(stdout.contents(), "applying\n");
    assert_eq!(stderr.contents(), "Error: boom\n");

    let exit = err.exit_error().unwrap();
    assert_eq!(exit.code(), Some(1));
    assert!(exit.stderr.contains("Error: boom"));
    assert_eq!(exit.args[1], "apply");
    assert_eq!(err.engine_kind(), Some(&EngineErrorKind::Unparsed));
}

#[tokio::test]
async fn test_missing_configuration_is_classified() {
    let engine = FakeEngine::new(
        "1.5.7",
        "echo 'Error: No configuration files' >&2; exit 1",
    );
    let err = engine.session().plan(&Context::new(), []).await.unwrap_err();
    assert_eq!(err.engine_kind(), Some(&EngineErrorKind::NoConfig));
}

#[tokio::test]
async fn test_outputs_keep_integer_precision() {
    let engine = FakeEngine::new(
        "1.5.7",
        r#"echo '{"big":{"sensitive":false,"type":"number","value":123456789012345678901234567890},"name":{"sensitive":true,"type":"string","value":"db"}}'"#,
    );
    let outputs = engine.session().output(&Context::new(), []).await.unwrap();

    assert_eq!(
        outputs["big"].value.to_string(),
        "123456789012345678901234567890"
    );
    assert!(outputs["name"].sensitive);
    assert_eq!(outputs["name"].value, "db");
}

#[tokio::test]
async fn test_undecodable_output_keeps_raw_text() {
    let engine = FakeEngine::new("1.5.7", "echo 'not json'");
    let err = engine.session().show(&Context::new(), []).await.unwrap_err();
    match err {
        Error::Decode { raw, .. } => assert_eq!(raw, "not json\n"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_old_engine_rejects_newer_features() {
    let engine = FakeEngine::new("0.11.14", "exit 0");
    let session = engine.session();
    let ctx = Context::new();

    let err = session.show(&ctx, []).await.unwrap_err();
    assert!(matches!(err, Error::VersionMismatch { ref actual, .. } if actual == "0.11.14"));

    let err = session
        .plan(&ctx, [Opt::Chdir("infra".into())])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VersionMismatch { .. }));

    // Ungated commands still run.
    assert!(!session.plan(&ctx, []).await.unwrap());
}

#[tokio::test]
async fn test_config_file_settings_apply() {
    let engine = FakeEngine::new("1.5.7", r#"echo "$TF_LOG|$TF_LOG_PATH""#);
    let config: tfexec::SessionConfig = serde_json::from_value(serde_json::json!({
        "working_dir": engine.dir.path(),
        "exec_path": engine.bin,
        "log": "DEBUG",
        "log_path": "/tmp/tf.log",
    }))
    .unwrap();
    let mut session = Session::from_config(config).unwrap();
    session.set_environment_source(std::sync::Arc::new(tfexec::FixedEnvironment::new([(
        "PATH",
        common::PATH,
    )])));

    let line = session.state_pull(&Context::new(), []).await.unwrap();
    assert_eq!(line.trim_end(), "DEBUG|/tmp/tf.log");
}

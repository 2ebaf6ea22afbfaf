//! Shared fixtures for unit tests.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use crate::core::env::FixedEnvironment;
use crate::core::version::parse_version_output;
use crate::runtime::session::Session;

/// A session over a throwaway directory whose engine binary is a shell
/// script. `terraform version` reports `version`; any other subcommand runs
/// `body`. The version cache is pre-seeded.
pub(crate) fn script_session(version: &str, body: &str) -> (Session, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let bin = dir.path().join("terraform");
    let staged = dir.path().join("terraform.tmp");
    std::fs::write(
        &staged,
        format!(
            "#!/bin/sh\nif [ \"$1\" = version ]; then echo 'Terraform v{version}'; exit 0; fi\n{body}\n"
        ),
    )
    .expect("write fake engine");
    make_executable(&staged);
    std::fs::rename(&staged, &bin).expect("install fake engine");
    wait_until_executable(&bin);

    let mut session = Session::new(dir.path(), &bin).expect("create session");
    session.set_environment_source(Arc::new(FixedEnvironment::new([(
        "PATH",
        "/usr/local/bin:/usr/bin:/bin",
    )])));
    let info = parse_version_output(&format!("Terraform v{version}")).expect("valid version");
    session.store_version(info);
    (session, dir)
}

/// A session whose engine succeeds without output.
pub(crate) fn fake_session(version: &str) -> (Session, TempDir) {
    script_session(version, "exit 0")
}

/// Arguments a builder would pass after the binary, space separated.
pub(crate) fn args_line(cmd: &crate::runtime::command::CommandBuilder) -> String {
    cmd.args().join(" ")
}

/// Retry while exec reports ETXTBSY, which happens when a child forked by a
/// parallel test still holds an inherited write descriptor to the script.
#[cfg(unix)]
fn wait_until_executable(bin: &Path) {
    for _ in 0..100 {
        match std::process::Command::new(bin).arg("version").output() {
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) => {
                std::thread::sleep(std::time::Duration::from_millis(10))
            }
            _ => return,
        }
    }
}

#[cfg(not(unix))]
fn wait_until_executable(_bin: &Path) {}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake engine");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

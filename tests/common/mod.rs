//! Fake engine binaries for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use tfexec::{FixedEnvironment, Session, SessionBuilder};

pub const PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// A working directory holding an executable `terraform` shell script.
///
/// `terraform version` prints `version`; every other subcommand runs `body`.
pub struct FakeEngine {
    pub dir: TempDir,
    pub bin: PathBuf,
}

impl FakeEngine {
    pub fn new(version: &str, body: &str) -> Self {
        Self::with_dir(tempfile::tempdir().unwrap(), version, body)
    }

    /// Like [`FakeEngine::new`], with the directory created under `parent`.
    pub fn new_in(parent: impl AsRef<Path>, version: &str, body: &str) -> Self {
        Self::with_dir(tempfile::tempdir_in(parent).unwrap(), version, body)
    }

    fn with_dir(dir: TempDir, version: &str, body: &str) -> Self {
        let bin = dir.path().join("terraform");
        let staged = dir.path().join("terraform.tmp");
        std::fs::write(
            &staged,
            format!(
                "#!/bin/sh\nif [ \"$1\" = version ]; then echo 'Terraform v{version}'; exit 0; fi\n{body}\n"
            ),
        )
        .unwrap();
        std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::rename(&staged, &bin).unwrap();
        wait_until_executable(&bin);
        Self { dir, bin }
    }

    /// Builder with a fixed, minimal host environment.
    pub fn builder(&self) -> SessionBuilder {
        Session::builder(self.dir.path(), &self.bin)
            .environment_source(Arc::new(FixedEnvironment::new([("PATH", PATH)])))
    }

    pub fn session(&self) -> Session {
        self.builder().build().unwrap()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Exec fails with ETXTBSY while a child forked by a parallel test still
/// holds an inherited write descriptor to the script.
fn wait_until_executable(bin: &Path) {
    for _ in 0..100 {
        match std::process::Command::new(bin).arg("version").output() {
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) => {
                std::thread::sleep(Duration::from_millis(10))
            }
            _ => return,
        }
    }
}

/// In-memory sink usable as a session forwarder.
#[derive(Clone, Default)]
pub struct Sink(Arc<Mutex<Vec<u8>>>);

impl Sink {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

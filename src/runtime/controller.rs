//! Platform process control.
//!
//! On Unix the engine is started in its own process group so that signals also
//! reach provider plugins it spawns. On Linux the kernel additionally kills the
//! child if the driver dies first.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::process::Command;

pub trait ProcessController: Send + Sync + fmt::Debug {
    /// Adjust the command before it is spawned.
    fn configure(&self, cmd: &mut Command);

    /// Ask the process (group) to stop.
    fn interrupt(&self, pid: u32) -> io::Result<()>;

    /// Stop the process (group) now.
    fn kill(&self, pid: u32) -> io::Result<()>;
}

/// Controller for the current platform.
pub fn platform_controller() -> Arc<dyn ProcessController> {
    #[cfg(unix)]
    {
        Arc::new(unix::ProcessGroupController)
    }
    #[cfg(not(unix))]
    {
        Arc::new(fallback::TaskKillController)
    }
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct ProcessGroupController;

    impl ProcessGroupController {
        fn signal_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
            let pgid = libc::pid_t::try_from(pid)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
            // SAFETY: killpg has no memory-safety preconditions.
            let rc = unsafe { libc::killpg(pgid, signal) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                // already gone
                return Ok(());
            }
            Err(err)
        }
    }

    impl ProcessController for ProcessGroupController {
        fn configure(&self, cmd: &mut Command) {
            #[cfg(target_os = "linux")]
            // SAFETY: getpid is async-signal-safe and called before fork.
            let parent = unsafe { libc::getpid() };

            // SAFETY: the closure runs between fork and exec and only calls
            // async-signal-safe functions.
            unsafe {
                cmd.pre_exec(move || {
                    if libc::setpgid(0, 0) != 0 {
                        return Err(io::Error::last_os_error());
                    }
                    #[cfg(target_os = "linux")]
                    {
                        if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) != 0 {
                            return Err(io::Error::last_os_error());
                        }
                        // the parent may have exited before prctl took effect
                        if libc::getppid() != parent {
                            return Err(io::Error::from_raw_os_error(libc::ESRCH));
                        }
                    }
                    Ok(())
                });
            }
        }

        fn interrupt(&self, pid: u32) -> io::Result<()> {
            Self::signal_group(pid, libc::SIGINT)
        }

        fn kill(&self, pid: u32) -> io::Result<()> {
            Self::signal_group(pid, libc::SIGKILL)
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use super::*;

    /// No cooperative stop signal exists; both operations kill the tree.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TaskKillController;

    impl ProcessController for TaskKillController {
        fn configure(&self, _cmd: &mut Command) {}

        fn interrupt(&self, pid: u32) -> io::Result<()> {
            self.kill(pid)
        }

        fn kill(&self, pid: u32) -> io::Result<()> {
            let status = std::process::Command::new("taskkill")
                .args(["/T", "/F", "/PID", &pid.to_string()])
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()?;
            if status.success() {
                Ok(())
            } else {
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("taskkill exited with {status}"),
                ))
            }
        }
    }
}

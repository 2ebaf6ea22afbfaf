//! Runs one [`Invocation`] to completion under a [`Context`].
//!
//! Both pipes are drained concurrently with the child inside the call itself,
//! so nothing outlives a return (or a dropped future). Cancellation follows the
//! invocation's [`InterruptPolicy`]:
//!
//! ```text
//! Running --ctx (Kill)--------------------------------> Terminating
//! Running --ctx (Graceful) / interrupt--> InterruptRequested --timeout--> Terminating
//! any state --child exits--> done
//! ```

use std::io::{self, Write};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::classify::classify_exit;
use crate::core::config::DEFAULT_STDERR_LIMIT;
use crate::core::context::Context;
use crate::core::env::split_env_lines;
use crate::core::error::{Error, ExitError, Result};
use crate::runtime::command::{InterruptPolicy, Invocation};
use crate::runtime::controller::ProcessController;
use crate::runtime::session::SharedWriter;

/// Bytes read from a pipe per wakeup.
const CHUNK_SIZE: usize = 8 * 1024;

/// A forwarded line longer than this is flushed in pieces.
const MAX_PENDING_LINE: usize = 64 * 1024;

/// Outcome of a child that ran to exit, successful or not.
#[derive(Debug)]
pub struct Completed {
    /// Argument vector, binary first.
    pub args: Vec<String>,
    pub pid: Option<u32>,
    pub status: ExitStatus,
    /// Empty unless the invocation asked for its output to be captured.
    pub stdout: Vec<u8>,
    /// Tail of standard error, bounded by the session's limit.
    pub stderr: String,
}

impl Completed {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn exit_error(&self) -> ExitError {
        ExitError {
            args: self.args.clone(),
            pid: self.pid,
            status: self.status,
            stderr: self.stderr.clone(),
        }
    }

    /// Standard output of a successful run; a failed run is classified.
    pub fn into_stdout(self) -> Result<Vec<u8>> {
        if self.status.success() {
            Ok(self.stdout)
        } else {
            Err(classify_exit(self.exit_error()))
        }
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Decode captured standard output, keeping the raw bytes on failure.
pub fn decode_json<T: serde::de::DeserializeOwned>(stdout: &[u8]) -> Result<T> {
    serde_json::from_slice(stdout).map_err(|e| Error::decode(stdout, e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Running,
    InterruptRequested { escalate_at: Instant },
    Terminating,
}

/// Executes invocations with the session's forwarders and process controller.
#[derive(Clone)]
pub struct Runner {
    controller: Arc<dyn ProcessController>,
    stdout: Option<SharedWriter>,
    stderr: Option<SharedWriter>,
    stderr_limit: usize,
}

impl Runner {
    pub fn new(controller: Arc<dyn ProcessController>) -> Self {
        Self {
            controller,
            stdout: None,
            stderr: None,
            stderr_limit: DEFAULT_STDERR_LIMIT,
        }
    }

    pub fn with_forwarders(
        mut self,
        stdout: Option<SharedWriter>,
        stderr: Option<SharedWriter>,
    ) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    /// Run the child and wait for it.
    ///
    /// A non-zero exit is returned as [`Completed`] so callers can interpret
    /// exit codes; only a non-zero exit under a cancelled scope is turned into
    /// [`Error::Cancelled`] here.
    pub async fn execute(&self, ctx: &Context, inv: &Invocation) -> Result<Completed> {
        if let Some(kind) = ctx.err() {
            return Err(Error::Context(kind));
        }

        let args = inv.argv();
        let mut cmd = Command::new(&inv.binary);
        cmd.args(&inv.args)
            .env_clear()
            .envs(split_env_lines(&inv.env))
            .current_dir(&inv.working_dir)
            .stdin(if inv.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.controller.configure(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = Error::Spawn {
                    binary: inv.binary.clone(),
                    source,
                };
                return Err(match ctx.err() {
                    Some(kind) => Error::Cancelled {
                        kind,
                        source: Box::new(err),
                    },
                    None => err,
                });
            }
        };
        let pid = child.id();
        debug!(pid, "started {}", inv.command_line());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        // Under a graceful policy the drains must see the engine's final lines,
        // so only the kill policy lets the scope cut them short.
        let abort = match inv.interrupt {
            InterruptPolicy::Kill => Some(ctx),
            InterruptPolicy::Graceful { .. } => None,
        };

        let work = async {
            let stdout_capture = if inv.capture_stdout {
                Capture::All
            } else {
                Capture::Discard
            };
            let (out, err, fed) = tokio::join!(
                drain(stdout, self.stdout.as_ref(), stdout_capture, abort),
                drain(stderr, self.stderr.as_ref(), Capture::Tail(self.stderr_limit), abort),
                feed(stdin, inv.stdin.as_deref()),
            );
            let status = child.wait().await;
            (out, err, fed, status)
        };
        tokio::pin!(work);

        let interrupt = inv.interrupt_signal.clone().unwrap_or_default();
        let mut state = Shutdown::Running;
        let mut scope_ended = false;

        let (out, err, fed, status) = loop {
            let escalate_at = match state {
                Shutdown::InterruptRequested { escalate_at } => Some(escalate_at),
                _ => None,
            };
            tokio::select! {
                outcome = &mut work => break outcome,
                kind = ctx.done(), if !scope_ended && state != Shutdown::Terminating => {
                    scope_ended = true;
                    debug!(pid, %kind, "scope ended while engine running");
                    state = match (inv.interrupt, state) {
                        (InterruptPolicy::Kill, _) => self.terminate(pid),
                        (InterruptPolicy::Graceful { timeout }, Shutdown::Running) => {
                            self.request_interrupt(pid, timeout)
                        }
                        (_, current) => current,
                    };
                }
                _ = interrupt.cancelled(), if state == Shutdown::Running => {
                    debug!(pid, "graceful interrupt requested");
                    state = self.request_interrupt(pid, inv.interrupt.interrupt_timeout());
                }
                _ = tokio::time::sleep_until(escalate_at.unwrap_or_else(Instant::now)), if escalate_at.is_some() => {
                    warn!(pid, "engine did not stop within its grace period, killing");
                    state = self.terminate(pid);
                }
            }
        };

        let completed = Completed {
            args,
            pid,
            status: status?,
            stdout: out.captured,
            stderr: String::from_utf8_lossy(&err.captured).into_owned(),
        };

        if !completed.status.success() {
            if let Some(kind) = ctx.err() {
                return Err(Error::Cancelled {
                    kind,
                    source: Box::new(Error::Exit(completed.exit_error())),
                });
            }
        }

        if let Some(e) = out.read_error.or(err.read_error) {
            return Err(Error::Io(e));
        }
        if let Err(e) = fed {
            return Err(Error::Io(e));
        }
        if let Some(e) = out.forward_error.or(err.forward_error) {
            return Err(Error::Io(e));
        }

        debug!(pid, status = %completed.status, "engine exited");
        Ok(completed)
    }

    fn request_interrupt(&self, pid: Option<u32>, timeout: std::time::Duration) -> Shutdown {
        if let Some(pid) = pid {
            if let Err(e) = self.controller.interrupt(pid) {
                warn!(pid, error = %e, "failed to interrupt engine");
            }
        }
        Shutdown::InterruptRequested {
            escalate_at: Instant::now() + timeout,
        }
    }

    fn terminate(&self, pid: Option<u32>) -> Shutdown {
        if let Some(pid) = pid {
            if let Err(e) = self.controller.kill(pid) {
                warn!(pid, error = %e, "failed to kill engine");
            }
        }
        Shutdown::Terminating
    }
}

/// How much of a stream the runner keeps after forwarding it.
#[derive(Debug, Clone, Copy)]
enum Capture {
    All,
    /// Only the last `n` bytes.
    Tail(usize),
    Discard,
}

impl Capture {
    fn keep(self, buf: &mut Vec<u8>, bytes: &[u8]) {
        match self {
            Self::All => buf.extend_from_slice(bytes),
            Self::Tail(limit) if bytes.len() >= limit => {
                buf.clear();
                buf.extend_from_slice(&bytes[bytes.len() - limit..]);
            }
            Self::Tail(limit) => {
                buf.extend_from_slice(bytes);
                let excess = buf.len().saturating_sub(limit);
                if excess > 0 {
                    buf.drain(..excess);
                }
            }
            Self::Discard => {}
        }
    }
}

#[derive(Debug, Default)]
struct Drained {
    captured: Vec<u8>,
    read_error: Option<io::Error>,
    forward_error: Option<io::Error>,
}

/// Line-buffered writes to an optional forwarder.
///
/// A failure stops forwarding but not draining.
struct Forwarder<'a> {
    writer: Option<&'a SharedWriter>,
    pending: Vec<u8>,
    error: Option<io::Error>,
}

impl<'a> Forwarder<'a> {
    fn new(writer: Option<&'a SharedWriter>) -> Self {
        Self {
            writer,
            pending: Vec::new(),
            error: None,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.writer.is_none() || self.error.is_some() {
            return;
        }
        self.pending.extend_from_slice(bytes);
        if self.pending.len() >= MAX_PENDING_LINE {
            self.flush_pending(self.pending.len());
        } else if let Some(pos) = self.pending.iter().rposition(|&b| b == b'\n') {
            self.flush_pending(pos + 1);
        }
    }

    fn finish(mut self) -> Option<io::Error> {
        if !self.pending.is_empty() {
            self.flush_pending(self.pending.len());
        }
        self.error
    }

    fn flush_pending(&mut self, len: usize) {
        let Some(writer) = self.writer else {
            return;
        };
        if self.error.is_none() {
            let mut writer = writer.lock();
            if let Err(e) = writer
                .write_all(&self.pending[..len])
                .and_then(|()| writer.flush())
            {
                warn!(error = %e, "output forwarder failed, forwarding disabled");
                self.error = Some(e);
            }
        }
        self.pending.drain(..len);
    }
}

/// Read `pipe` in fixed-size chunks into the forwarder and the capture buffer.
///
/// Memory held per stream is bounded by the capture mode plus one pending
/// forwarded line, whatever the child writes.
async fn drain<R>(
    pipe: Option<R>,
    forward: Option<&SharedWriter>,
    capture: Capture,
    abort: Option<&Context>,
) -> Drained
where
    R: AsyncRead + Unpin,
{
    let mut drained = Drained::default();
    let Some(mut pipe) = pipe else {
        return drained;
    };
    let mut forwarder = Forwarder::new(forward);
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match abort {
            Some(ctx) => tokio::select! {
                biased;
                read = pipe.read(&mut chunk) => Some(read),
                _ = ctx.done() => None,
            },
            None => Some(pipe.read(&mut chunk).await),
        };
        let n = match read {
            None | Some(Ok(0)) => break,
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                drained.read_error = Some(e);
                break;
            }
        };
        forwarder.push(&chunk[..n]);
        capture.keep(&mut drained.captured, &chunk[..n]);
    }
    drained.forward_error = forwarder.finish();
    drained
}

async fn feed(stdin: Option<ChildStdin>, data: Option<&[u8]>) -> io::Result<()> {
    let (Some(mut stdin), Some(data)) = (stdin, data) else {
        return Ok(());
    };
    let written = stdin.write_all(data).await;
    drop(stdin);
    match written {
        // the engine is free to exit without reading its input
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::context::CancelKind;
    use crate::runtime::controller::platform_controller;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sh(script: &str) -> Invocation {
        Invocation {
            binary: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            env: vec!["PATH=/usr/bin:/bin".into()],
            working_dir: std::env::temp_dir(),
            stdin: None,
            capture_stdout: true,
            interrupt: InterruptPolicy::Kill,
            interrupt_signal: None,
        }
    }

    fn runner() -> Runner {
        Runner::new(platform_controller())
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "sink closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn shared(w: impl Write + Send + 'static) -> SharedWriter {
        Arc::new(Mutex::new(Box::new(w)))
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let done = runner()
            .execute(&Context::new(), &sh("echo out; echo err >&2; exit 0"))
            .await
            .unwrap();
        assert!(done.status.success());
        assert_eq!(done.stdout, b"out\n");
        assert_eq!(done.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_returned_for_interpretation() {
        let done = runner()
            .execute(&Context::new(), &sh("echo nope >&2; exit 2"))
            .await
            .unwrap();
        assert_eq!(done.code(), Some(2));
        let err = done.into_stdout().unwrap_err();
        assert_eq!(err.exit_error().and_then(ExitError::code), Some(2));
    }

    #[tokio::test]
    async fn test_stdin_is_fed() {
        let mut inv = sh("cat");
        inv.stdin = Some(b"var.x\n".to_vec());
        let done = runner().execute(&Context::new(), &inv).await.unwrap();
        assert_eq!(done.stdout, b"var.x\n");
    }

    #[tokio::test]
    async fn test_stderr_keeps_tail_within_limit() {
        let done = runner()
            .with_stderr_limit(8)
            .execute(&Context::new(), &sh("echo 0123456789 >&2; echo tail >&2"))
            .await
            .unwrap();
        assert_eq!(done.stderr, "89\ntail\n");
    }

    #[tokio::test]
    async fn test_forwarders_receive_lines() {
        let out = Sink::default();
        let err = Sink::default();
        runner()
            .with_forwarders(Some(shared(out.clone())), Some(shared(err.clone())))
            .execute(&Context::new(), &sh("echo a; echo b >&2; echo c"))
            .await
            .unwrap();
        assert_eq!(&*out.0.lock(), b"a\nc\n");
        assert_eq!(&*err.0.lock(), b"b\n");
    }

    #[tokio::test]
    async fn test_forwarder_failure_surfaces_after_drain() {
        let err = runner()
            .with_forwarders(Some(shared(Broken)), None)
            .execute(&Context::new(), &sh("echo a; echo b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_pre_cancelled_scope_spawns_nothing() {
        let ctx = Context::new();
        ctx.cancel();
        let marker = tempfile::tempdir().unwrap();
        let path = marker.path().join("ran");
        let err = runner()
            .execute(&ctx, &sh(&format!("touch {}", path.display())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context(CancelKind::Cancelled)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_kill_policy_on_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = runner().execute(&ctx, &sh("sleep 10")).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(err.cancel_kind(), Some(CancelKind::DeadlineExceeded));
        assert!(err.exit_error().is_some());
    }

    #[tokio::test]
    async fn test_graceful_policy_lets_engine_finish_output() {
        let mut inv = sh("trap 'echo shutting down >&2; exit 130' INT; while :; do sleep 0.1; done");
        inv.interrupt = InterruptPolicy::Graceful {
            timeout: Duration::from_secs(5),
        };
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });
        let err = runner().execute(&ctx, &inv).await.unwrap_err();
        assert_eq!(err.cancel_kind(), Some(CancelKind::Cancelled));
        let exit = err.exit_error().unwrap();
        assert!(exit.stderr.contains("shutting down"), "{:?}", exit.stderr);
    }

    #[tokio::test]
    async fn test_graceful_policy_escalates_to_kill() {
        let mut inv = sh("trap '' INT; sleep 10");
        inv.interrupt = InterruptPolicy::Graceful {
            timeout: Duration::from_millis(300),
        };
        let ctx = Context::new().with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = runner().execute(&ctx, &inv).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_interrupt_signal_without_cancelling_scope() {
        let token = tokio_util::sync::CancellationToken::new();
        let mut inv = sh("trap 'echo saved state; exit 1' INT; while :; do sleep 0.1; done");
        inv.interrupt_signal = Some(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            token.cancel();
        });
        let done = runner().execute(&Context::new(), &inv).await.unwrap();
        assert_eq!(done.code(), Some(1));
        assert_eq!(done.stdout, b"saved state\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let mut inv = sh("true");
        inv.binary = PathBuf::from("/nonexistent/terraform");
        let err = runner().execute(&Context::new(), &inv).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_unterminated_stderr_stays_within_limit() {
        let err = Sink::default();
        let done = runner()
            .with_stderr_limit(64)
            .with_forwarders(None, Some(shared(err.clone())))
            .execute(
                &Context::new(),
                &sh("head -c 4000000 /dev/zero | tr '\\0' x >&2; printf END >&2; exit 1"),
            )
            .await
            .unwrap();
        assert_eq!(done.stderr.len(), 64);
        assert!(done.stderr.ends_with("xxxEND"), "{:?}", done.stderr);
        assert_eq!(err.0.lock().len(), 4_000_003);
    }

    #[test]
    fn test_tail_capture_keeps_only_the_last_bytes() {
        let mut buf = Vec::new();
        Capture::Tail(4).keep(&mut buf, b"ab");
        Capture::Tail(4).keep(&mut buf, b"cdef");
        assert_eq!(buf, b"cdef");
        Capture::Tail(4).keep(&mut buf, b"0123456789");
        assert_eq!(buf, b"6789");
        Capture::Tail(4).keep(&mut buf, b"!");
        assert_eq!(buf, b"789!");
    }

    #[tokio::test]
    async fn test_long_line_is_forwarded_in_pieces() {
        let out = Sink::default();
        let done = runner()
            .with_forwarders(Some(shared(out.clone())), None)
            .execute(
                &Context::new(),
                &sh("head -c 200000 /dev/zero | tr '\\0' y; echo"),
            )
            .await
            .unwrap();
        assert_eq!(out.0.lock().len(), 200_001);
        assert_eq!(done.stdout.len(), 200_001);
    }

    #[tokio::test]
    async fn test_discarded_stdout_is_still_forwarded() {
        let out = Sink::default();
        let mut inv = sh("echo applying; echo done");
        inv.capture_stdout = false;
        let done = runner()
            .with_forwarders(Some(shared(out.clone())), None)
            .execute(&Context::new(), &inv)
            .await
            .unwrap();
        assert!(done.stdout.is_empty());
        assert_eq!(&*out.0.lock(), b"applying\ndone\n");
    }

    #[test]
    fn test_decode_keeps_raw_output() {
        let err = decode_json::<serde_json::Value>(b"not json").unwrap_err();
        match err {
            Error::Decode { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Invocation descriptors and the builder that produces them.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::env::{EnvPolicy, EnvironmentSource};

/// Grace period used when an interrupt is requested on a session that would
/// otherwise kill immediately.
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// What the runner does to the child when the call is cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// Kill the process group right away.
    Kill,
    /// Interrupt the process group, then kill it once `timeout` has passed.
    Graceful { timeout: Duration },
}

impl InterruptPolicy {
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) if !timeout.is_zero() => Self::Graceful { timeout },
            _ => Self::Kill,
        }
    }

    /// Timeout applied to an explicit interrupt request.
    pub fn interrupt_timeout(&self) -> Duration {
        match self {
            Self::Kill => DEFAULT_GRACEFUL_TIMEOUT,
            Self::Graceful { timeout } => *timeout,
        }
    }
}

/// A fully specified engine process. Immutable once built.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub binary: PathBuf,
    /// Arguments after the binary.
    pub args: Vec<String>,
    /// Complete child environment as `KEY=VALUE` lines.
    pub env: Vec<String>,
    pub working_dir: PathBuf,
    pub stdin: Option<Vec<u8>>,
    /// Keep standard output in the result. Forwarding happens either way.
    pub capture_stdout: bool,
    pub interrupt: InterruptPolicy,
    /// Cancelled by the caller to request a graceful stop.
    pub interrupt_signal: Option<CancellationToken>,
}

impl Invocation {
    /// Argument vector with the binary first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.binary.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Printable command line, for logs.
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// Accumulates the pieces of one subcommand call.
///
/// Flags follow the subcommand words and positional arguments come last; a
/// `-chdir` global flag is placed before the words.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    chdir: Option<String>,
    words: Vec<String>,
    flags: Vec<String>,
    positional: Vec<String>,
    env: BTreeMap<String, String>,
    stdin: Option<Vec<u8>>,
    discard_stdout: bool,
    interrupt_signal: Option<CancellationToken>,
}

impl CommandBuilder {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A bare flag such as `-no-color`.
    pub fn arg(&mut self, flag: impl Into<String>) -> &mut Self {
        self.flags.push(flag.into());
        self
    }

    /// `-name=value`, always emitted.
    pub fn flag(&mut self, name: &str, value: impl Display) -> &mut Self {
        self.flags.push(format!("-{name}={value}"));
        self
    }

    /// `-name=value`, emitted only for a non-empty value.
    pub fn string_flag(&mut self, name: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.flag(name, value);
        }
        self
    }

    /// `-name`, emitted only when `on`.
    pub fn switch(&mut self, name: &str, on: bool) -> &mut Self {
        if on {
            self.flags.push(format!("-{name}"));
        }
        self
    }

    /// One `-name=value` per value.
    pub fn repeated(&mut self, name: &str, values: &[String]) -> &mut Self {
        for value in values {
            self.flag(name, value);
        }
        self
    }

    /// `-var NAME=VALUE` pairs.
    pub fn vars(&mut self, vars: &[String]) -> &mut Self {
        for var in vars {
            self.flags.push("-var".to_string());
            self.flags.push(var.clone());
        }
        self
    }

    /// Positional argument, skipped when empty.
    pub fn positional(&mut self, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.positional.push(value.to_string());
        }
        self
    }

    pub fn chdir(&mut self, dir: impl Into<String>) -> &mut Self {
        self.chdir = Some(dir.into());
        self
    }

    /// Per-call environment entry, applied over the session environment.
    pub fn env(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn stdin(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.stdin = Some(data.into());
        self
    }

    /// Forward standard output without keeping it.
    pub fn discard_stdout(&mut self) -> &mut Self {
        self.discard_stdout = true;
        self
    }

    pub fn interrupt_signal(&mut self, token: CancellationToken) -> &mut Self {
        self.interrupt_signal = Some(token);
        self
    }

    /// Arguments after the binary, in emission order.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(
            self.words.len() + self.flags.len() + self.positional.len() + 1,
        );
        if let Some(dir) = &self.chdir {
            args.push(format!("-chdir={dir}"));
        }
        args.extend(self.words.iter().cloned());
        args.extend(self.flags.iter().cloned());
        args.extend(self.positional.iter().cloned());
        args
    }

    /// Freeze into an [`Invocation`].
    pub fn build(
        self,
        binary: PathBuf,
        working_dir: PathBuf,
        policy: &EnvPolicy,
        host: &dyn EnvironmentSource,
        interrupt: InterruptPolicy,
    ) -> Invocation {
        let args = self.args();
        let env = policy.compose(host, &self.env);
        Invocation {
            binary,
            args,
            env,
            working_dir,
            stdin: self.stdin,
            capture_stdout: !self.discard_stdout,
            interrupt,
            interrupt_signal: self.interrupt_signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::FixedEnvironment;

    #[test]
    fn test_argument_layout() {
        let mut cmd = CommandBuilder::new(["state", "mv"]);
        cmd.arg("-no-color")
            .string_flag("backup", "")
            .string_flag("state", "s.tfstate")
            .flag("lock", true)
            .switch("dry-run", false)
            .positional("a.b")
            .positional("")
            .positional("c.d")
            .chdir("infra");
        assert_eq!(
            cmd.args(),
            vec![
                "-chdir=infra",
                "state",
                "mv",
                "-no-color",
                "-state=s.tfstate",
                "-lock=true",
                "a.b",
                "c.d"
            ]
        );
    }

    #[test]
    fn test_repeated_and_vars() {
        let mut cmd = CommandBuilder::new(["plan"]);
        cmd.repeated("target", &["a".into(), "b".into()])
            .vars(&["x=1".into()]);
        assert_eq!(cmd.args(), vec!["plan", "-target=a", "-target=b", "-var", "x=1"]);
    }

    #[test]
    fn test_build_composes_environment() {
        let mut cmd = CommandBuilder::new(["version"]);
        cmd.env("EXTRA", "1").stdin(b"1 + 1".to_vec());
        let inv = cmd.build(
            PathBuf::from("/usr/bin/terraform"),
            PathBuf::from("/srv"),
            &EnvPolicy::default(),
            &FixedEnvironment::new([("HOME", "/root")]),
            InterruptPolicy::Kill,
        );
        assert_eq!(inv.argv(), vec!["/usr/bin/terraform", "version"]);
        assert!(inv.env.contains(&"EXTRA=1".to_string()));
        assert!(inv.env.contains(&"HOME=/root".to_string()));
        assert!(inv.env.contains(&"TF_IN_AUTOMATION=1".to_string()));
        assert_eq!(inv.stdin.as_deref(), Some(&b"1 + 1"[..]));
        assert!(inv.capture_stdout);
    }

    #[test]
    fn test_discard_stdout_turns_capture_off() {
        let mut cmd = CommandBuilder::new(["apply"]);
        cmd.discard_stdout();
        let inv = cmd.build(
            PathBuf::from("terraform"),
            PathBuf::from("/srv"),
            &EnvPolicy::default(),
            &FixedEnvironment::new([("HOME", "/root")]),
            InterruptPolicy::Kill,
        );
        assert!(!inv.capture_stdout);
    }

    #[test]
    fn test_interrupt_policy_from_timeout() {
        assert_eq!(InterruptPolicy::from_timeout(None), InterruptPolicy::Kill);
        assert_eq!(
            InterruptPolicy::from_timeout(Some(Duration::ZERO)),
            InterruptPolicy::Kill
        );
        let graceful = InterruptPolicy::from_timeout(Some(Duration::from_secs(5)));
        assert_eq!(graceful.interrupt_timeout(), Duration::from_secs(5));
        assert_eq!(InterruptPolicy::Kill.interrupt_timeout(), DEFAULT_GRACEFUL_TIMEOUT);
    }
}

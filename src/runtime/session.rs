use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use semver::Version;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::config::{SessionConfig, DEFAULT_GRACEFUL_TIMEOUT_SECS, DEFAULT_STDERR_LIMIT};
use crate::core::context::Context;
use crate::core::env::{EnvPolicy, EnvironmentSource, HostEnvironment};
use crate::core::error::{Error, Result};
use crate::core::version::{check_range, VersionCache};
use crate::runtime::command::{CommandBuilder, InterruptPolicy, Invocation};
use crate::runtime::controller::{platform_controller, ProcessController};
use crate::runtime::process::{decode_json, Completed, Runner};

/// A writer shared between the session and the caller, receiving engine
/// output line by line as it is produced.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Wrap a writer for use as an output forwarder.
pub fn shared_writer<W: Write + Send + 'static>(writer: W) -> SharedWriter {
    Arc::new(Mutex::new(Box::new(writer)))
}

/// Sink for the session's own diagnostic lines (command lines being run).
pub trait Logger: Send + Sync + fmt::Debug {
    fn log(&self, args: fmt::Arguments<'_>);
}

/// Discards everything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn log(&self, _args: fmt::Arguments<'_>) {}
}

/// Forwards to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "tfexec", "{}", args);
    }
}

/// Handle on one engine binary and one working directory.
///
/// Setters must not be called while an invocation is in flight; the `&mut`
/// receivers enforce that within a single owner. Calls on one session should be
/// serialised by the caller, since the engine itself locks the working
/// directory.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tfexec::{Context, Session};
///
/// # #[tokio::main]
/// # async fn main() -> tfexec::Result<()> {
/// let mut session = Session::new("/srv/infra", "/usr/local/bin/terraform")?;
/// session.set_graceful_shutdown(Some(Duration::from_secs(60)));
/// session.set_log_path("/var/log/terraform.log");
///
/// let info = session.version(&Context::new(), false).await?;
/// println!("terraform {}", info.core);
/// # Ok(())
/// # }
/// ```
pub struct Session {
    exec_path: PathBuf,
    working_dir: PathBuf,
    env: EnvPolicy,
    host_env: Arc<dyn EnvironmentSource>,
    logger: Arc<dyn Logger>,
    stdout: Option<SharedWriter>,
    stderr: Option<SharedWriter>,
    graceful_timeout: Option<Duration>,
    stderr_limit: usize,
    controller: Arc<dyn ProcessController>,
    versions: Mutex<VersionCache>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("exec_path", &self.exec_path)
            .field("working_dir", &self.working_dir)
            .field("env", &self.env)
            .field("graceful_timeout", &self.graceful_timeout)
            .field("stderr_limit", &self.stderr_limit)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session, validating both paths.
    ///
    /// A bare executable name such as `terraform` is looked up on `PATH`.
    pub fn new(working_dir: impl AsRef<Path>, exec_path: impl AsRef<Path>) -> Result<Self> {
        let working_dir = working_dir.as_ref().to_path_buf();
        match std::fs::metadata(&working_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::NoWorkingDir {
                    path: working_dir,
                    reason: "not a directory".into(),
                })
            }
            Err(e) => {
                return Err(Error::NoWorkingDir {
                    path: working_dir,
                    reason: e.to_string(),
                })
            }
        }

        let exec_path = resolve_executable(exec_path.as_ref())?;

        Ok(Self {
            exec_path,
            working_dir,
            env: EnvPolicy::default(),
            host_env: Arc::new(HostEnvironment),
            logger: Arc::new(NopLogger),
            stdout: None,
            stderr: None,
            graceful_timeout: Some(Duration::from_secs(DEFAULT_GRACEFUL_TIMEOUT_SECS)),
            stderr_limit: DEFAULT_STDERR_LIMIT,
            controller: platform_controller(),
            versions: Mutex::new(VersionCache::default()),
        })
    }

    pub fn builder(working_dir: impl Into<PathBuf>, exec_path: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder::new(working_dir, exec_path)
    }

    /// Create a session from serialisable settings.
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        let mut session = Self::new(&config.working_dir, &config.exec_path)?;
        if let Some(env) = config.env {
            session.set_env(env)?;
        }
        session.set_append_user_agent(config.append_user_agent);
        session.set_log(config.log);
        session.set_log_core(config.log_core);
        session.set_log_provider(config.log_provider);
        if !config.log_path.is_empty() {
            session.set_log_path(config.log_path);
        }
        session.set_disable_plugin_tls(config.disable_plugin_tls);
        session.set_skip_provider_verify(config.skip_provider_verify);
        session.set_graceful_shutdown(Some(Duration::from_secs(config.graceful_timeout_secs)));
        session.set_stderr_limit(config.stderr_limit);
        Ok(session)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    /// Replace the inherited environment. Reserved `TF_*` names are rejected.
    pub fn set_env(&mut self, env: HashMap<String, String>) -> Result<()> {
        self.env.set_override(env)
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    /// Have the engine write its log to `path`. Enables `TRACE` unless a level
    /// has already been chosen.
    pub fn set_log_path(&mut self, path: impl Into<String>) {
        self.env.log.path = path.into();
        if self.env.log.level.is_empty() {
            self.env.log.level = "TRACE".into();
        }
    }

    pub fn set_log(&mut self, level: impl Into<String>) {
        self.env.log.level = level.into();
    }

    pub fn set_log_core(&mut self, level: impl Into<String>) {
        self.env.log.core = level.into();
    }

    pub fn set_log_provider(&mut self, level: impl Into<String>) {
        self.env.log.provider = level.into();
    }

    pub fn set_stdout(&mut self, writer: Option<SharedWriter>) {
        self.stdout = writer;
    }

    pub fn set_stderr(&mut self, writer: Option<SharedWriter>) {
        self.stderr = writer;
    }

    pub fn set_append_user_agent(&mut self, ua: impl Into<String>) {
        self.env.append_user_agent = ua.into();
    }

    /// Grace period between interrupting the engine and killing it when a
    /// call's scope ends. `None` (or zero) kills immediately.
    pub fn set_graceful_shutdown(&mut self, timeout: Option<Duration>) {
        self.graceful_timeout = timeout;
    }

    pub fn set_disable_plugin_tls(&mut self, disable: bool) {
        self.env.disable_plugin_tls = disable;
    }

    pub fn set_skip_provider_verify(&mut self, skip: bool) {
        self.env.skip_provider_verify = skip;
    }

    pub fn set_environment_source(&mut self, source: Arc<dyn EnvironmentSource>) {
        self.host_env = source;
    }

    pub fn set_process_controller(&mut self, controller: Arc<dyn ProcessController>) {
        self.controller = controller;
    }

    /// Bytes of standard error kept per call for error reporting.
    pub fn set_stderr_limit(&mut self, limit: usize) {
        self.stderr_limit = limit;
    }

    /// Fail unless the engine version is within `[min, max)`.
    pub(crate) async fn require_range(
        &self,
        ctx: &Context,
        min: Option<&Version>,
        max: Option<&Version>,
        feature: &str,
    ) -> Result<()> {
        let info = self.version(ctx, false).await?;
        check_range(feature, &info.core, min, max)
    }

    pub(crate) fn cached_version(&self) -> Option<crate::core::version::VersionInfo> {
        self.versions.lock().info.clone()
    }

    pub(crate) fn store_version(&self, info: crate::core::version::VersionInfo) {
        self.versions.lock().info = Some(info);
    }

    pub(crate) fn invocation(&self, cmd: CommandBuilder) -> Invocation {
        cmd.build(
            self.exec_path.clone(),
            self.working_dir.clone(),
            &self.env,
            self.host_env.as_ref(),
            InterruptPolicy::from_timeout(self.graceful_timeout),
        )
    }

    fn runner(&self) -> Runner {
        Runner::new(Arc::clone(&self.controller))
            .with_forwarders(self.stdout.clone(), self.stderr.clone())
            .with_stderr_limit(self.stderr_limit)
    }

    /// Run the command and return the raw outcome, whatever the exit code.
    pub(crate) async fn execute(&self, ctx: &Context, cmd: CommandBuilder) -> Result<Completed> {
        let inv = self.invocation(cmd);
        let line = inv.command_line();
        self.logger.log(format_args!("[INFO] running Terraform command: {line}"));
        debug!(command = %line, "running terraform");
        self.runner().execute(ctx, &inv).await
    }

    /// Run the command, failing on a non-zero exit. Standard output is only
    /// forwarded.
    pub(crate) async fn run(&self, ctx: &Context, mut cmd: CommandBuilder) -> Result<()> {
        cmd.discard_stdout();
        self.execute(ctx, cmd).await?.into_stdout().map(drop)
    }

    /// Run the command and return its standard output as text.
    pub(crate) async fn run_output(&self, ctx: &Context, cmd: CommandBuilder) -> Result<String> {
        let stdout = self.execute(ctx, cmd).await?.into_stdout()?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// Run the command and decode its standard output as JSON.
    pub(crate) async fn run_json<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        cmd: CommandBuilder,
    ) -> Result<T> {
        let stdout = self.execute(ctx, cmd).await?.into_stdout()?;
        decode_json(&stdout)
    }
}

fn resolve_executable(path: &Path) -> Result<PathBuf> {
    let bare = path.components().count() == 1 && !path.exists();
    let resolved = if bare {
        which::which(path).map_err(|e| Error::NoSuitableBinary {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    } else {
        path.to_path_buf()
    };
    let resolved = if resolved.is_relative() {
        std::env::current_dir()
            .map_err(|e| Error::NoSuitableBinary {
                path: path.to_path_buf(),
                reason: format!("resolving against the current directory: {e}"),
            })?
            .join(resolved)
    } else {
        resolved
    };

    match std::fs::metadata(&resolved) {
        Ok(meta) if meta.is_file() => Ok(resolved),
        Ok(_) => Err(Error::NoSuitableBinary {
            path: resolved,
            reason: "not a regular file".into(),
        }),
        Err(e) => Err(Error::NoSuitableBinary {
            path: resolved,
            reason: e.to_string(),
        }),
    }
}

/// Builder for creating [`Session`] instances with fluent configuration
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tfexec::{Session, TracingLogger};
///
/// # fn main() -> tfexec::Result<()> {
/// let session = Session::builder("/srv/infra", "terraform")
///     .logger(Arc::new(TracingLogger))
///     .append_user_agent("deployer/2.1")
///     .graceful_timeout_secs(120)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
    logger: Option<Arc<dyn Logger>>,
    stdout: Option<SharedWriter>,
    stderr: Option<SharedWriter>,
    host_env: Option<Arc<dyn EnvironmentSource>>,
    controller: Option<Arc<dyn ProcessController>>,
}

impl SessionBuilder {
    pub fn new(working_dir: impl Into<PathBuf>, exec_path: impl Into<PathBuf>) -> Self {
        Self {
            config: SessionConfig {
                working_dir: working_dir.into(),
                exec_path: exec_path.into(),
                ..SessionConfig::default()
            },
            logger: None,
            stdout: None,
            stderr: None,
            host_env: None,
            controller: None,
        }
    }

    /// Start from a loaded configuration. Paths in `config` win over the
    /// ones given to [`Session::builder`].
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.config.env = Some(env);
        self
    }

    pub fn append_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.append_user_agent = ua.into();
        self
    }

    pub fn log_path(mut self, path: impl Into<String>) -> Self {
        self.config.log_path = path.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log = level.into();
        self
    }

    pub fn disable_plugin_tls(mut self, disable: bool) -> Self {
        self.config.disable_plugin_tls = disable;
        self
    }

    pub fn skip_provider_verify(mut self, skip: bool) -> Self {
        self.config.skip_provider_verify = skip;
        self
    }

    /// Zero kills the engine as soon as a call's scope ends.
    pub fn graceful_timeout_secs(mut self, secs: u64) -> Self {
        self.config.graceful_timeout_secs = secs;
        self
    }

    pub fn stderr_limit(mut self, limit: usize) -> Self {
        self.config.stderr_limit = limit;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn stdout(mut self, writer: SharedWriter) -> Self {
        self.stdout = Some(writer);
        self
    }

    pub fn stderr(mut self, writer: SharedWriter) -> Self {
        self.stderr = Some(writer);
        self
    }

    pub fn environment_source(mut self, source: Arc<dyn EnvironmentSource>) -> Self {
        self.host_env = Some(source);
        self
    }

    pub fn process_controller(mut self, controller: Arc<dyn ProcessController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn build(self) -> Result<Session> {
        let mut session = Session::from_config(self.config)?;
        if let Some(logger) = self.logger {
            session.set_logger(logger);
        }
        session.set_stdout(self.stdout);
        session.set_stderr(self.stderr);
        if let Some(source) = self.host_env {
            session.set_environment_source(source);
        }
        if let Some(controller) = self.controller {
            session.set_process_controller(controller);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::FixedEnvironment;
    use crate::testing::fake_session;

    #[test]
    fn test_missing_working_dir() {
        let err = Session::new("/nonexistent/tfexec/dir", "/bin/sh").unwrap_err();
        assert!(matches!(err, Error::NoWorkingDir { .. }));
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::new(dir.path(), dir.path().join("terraform")).unwrap_err();
        assert!(matches!(err, Error::NoSuitableBinary { .. }));

        let err = Session::new(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::NoSuitableBinary { .. }));
    }

    #[test]
    fn test_unknown_bare_name_is_not_suitable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::new(dir.path(), "terraform-does-not-exist-anywhere").unwrap_err();
        assert!(matches!(err, Error::NoSuitableBinary { .. }));
    }

    #[test]
    fn test_log_path_defaults_level_to_trace() {
        let (mut session, _dir) = fake_session("1.5.7");
        session.set_log_path("/tmp/tf.log");
        assert_eq!(session.env.log.level, "TRACE");

        let (mut session, _dir) = fake_session("1.5.7");
        session.set_log("DEBUG");
        session.set_log_path("/tmp/tf.log");
        assert_eq!(session.env.log.level, "DEBUG");
    }

    #[test]
    fn test_invocation_uses_session_settings() {
        let (mut session, _dir) = fake_session("1.5.7");
        session.set_environment_source(Arc::new(FixedEnvironment::new([("HOME", "/home/ci")])));
        session.set_append_user_agent("deployer/2.1");
        session.set_graceful_shutdown(None);

        let inv = session.invocation(CommandBuilder::new(["plan"]));
        assert_eq!(inv.working_dir, session.working_dir());
        assert_eq!(inv.interrupt, InterruptPolicy::Kill);
        assert!(inv.env.contains(&"HOME=/home/ci".to_string()));
        let ua = format!("TF_APPEND_USER_AGENT=deployer/2.1 {}", crate::driver_identifier());
        assert!(inv.env.contains(&ua));
    }

    #[test]
    fn test_from_config_rejects_reserved_env() {
        let (session, dir) = fake_session("1.5.7");
        let config = SessionConfig {
            working_dir: dir.path().to_path_buf(),
            exec_path: session.exec_path().to_path_buf(),
            env: Some(HashMap::from([("TF_WORKSPACE".to_string(), "prod".to_string())])),
            ..SessionConfig::default()
        };
        let err = Session::from_config(config).unwrap_err();
        assert!(matches!(err, Error::ManualEnvVar { name } if name == "TF_WORKSPACE"));
    }

    #[test]
    fn test_builder_applies_config() {
        let (session, dir) = fake_session("1.5.7");
        let built = Session::builder(dir.path(), session.exec_path())
            .graceful_timeout_secs(0)
            .stderr_limit(1024)
            .log_path("/tmp/tf.log")
            .build()
            .unwrap();
        assert_eq!(built.graceful_timeout, Some(Duration::ZERO));
        assert_eq!(built.stderr_limit, 1024);
        assert_eq!(built.env.log.level, "TRACE");
        assert_eq!(
            built.invocation(CommandBuilder::new(["plan"])).interrupt,
            InterruptPolicy::Kill
        );
    }
}

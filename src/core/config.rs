use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default cap on retained standard error, in bytes
pub const DEFAULT_STDERR_LIMIT: usize = 64 * 1024;

/// Default grace period between interrupt and kill, in seconds
pub const DEFAULT_GRACEFUL_TIMEOUT_SECS: u64 = 30;

/// Serializable session settings, e.g. loaded from a TOML file
///
/// Every field is optional; anything left unset keeps the session default.
/// See [`Session::from_config`](crate::Session::from_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory the engine runs in
    pub working_dir: PathBuf,

    /// Path to the engine executable
    pub exec_path: PathBuf,

    /// Replacement for the inherited host environment
    pub env: Option<HashMap<String, String>>,

    /// Extra user agent fragment
    pub append_user_agent: String,

    /// Engine log file; empty disables engine logging
    pub log_path: String,

    /// Overall engine log level
    pub log: String,

    /// Core log level
    pub log_core: String,

    /// Provider log level
    pub log_provider: String,

    /// Set `TF_DISABLE_PLUGIN_TLS` for children
    pub disable_plugin_tls: bool,

    /// Set `TF_SKIP_PROVIDER_VERIFY` for children
    pub skip_provider_verify: bool,

    /// Grace period between interrupt and kill; `0` kills immediately
    pub graceful_timeout_secs: u64,

    /// Retained standard error per call, in bytes
    pub stderr_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            exec_path: PathBuf::from("terraform"),
            env: None,
            append_user_agent: String::new(),
            log_path: String::new(),
            log: String::new(),
            log_core: String::new(),
            log_provider: String::new(),
            disable_plugin_tls: false,
            skip_provider_verify: false,
            graceful_timeout_secs: DEFAULT_GRACEFUL_TIMEOUT_SECS,
            stderr_limit: DEFAULT_STDERR_LIMIT,
        }
    }
}

//! Child environment composition.
//!
//! The engine reads a number of `TF_*` variables that would change its behaviour
//! behind the driver's back (extra CLI args, workspace selection, logging). Those
//! are reserved: callers may not set them through an override, and they are
//! stripped when the host environment is inherited.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::core::error::{Error, Result};

pub const APPEND_USER_AGENT: &str = "TF_APPEND_USER_AGENT";
pub const AUTOMATION: &str = "TF_IN_AUTOMATION";
pub const CLI_ARGS: &str = "TF_CLI_ARGS";
pub const DISABLE_PLUGIN_TLS: &str = "TF_DISABLE_PLUGIN_TLS";
pub const INPUT: &str = "TF_INPUT";
pub const LOG: &str = "TF_LOG";
pub const LOG_CORE: &str = "TF_LOG_CORE";
pub const LOG_PATH: &str = "TF_LOG_PATH";
pub const LOG_PROVIDER: &str = "TF_LOG_PROVIDER";
pub const REATTACH_PROVIDERS: &str = "TF_REATTACH_PROVIDERS";
pub const SKIP_PROVIDER_VERIFY: &str = "TF_SKIP_PROVIDER_VERIFY";
pub const WORKSPACE: &str = "TF_WORKSPACE";

pub const CHECKPOINT_DISABLE: &str = "CHECKPOINT_DISABLE";

pub const VAR_PREFIX: &str = "TF_VAR_";
pub const CLI_ARGS_PREFIX: &str = "TF_CLI_ARGS_";

const RESERVED: &[&str] = &[
    APPEND_USER_AGENT,
    AUTOMATION,
    CLI_ARGS,
    DISABLE_PLUGIN_TLS,
    INPUT,
    LOG,
    LOG_CORE,
    LOG_PATH,
    LOG_PROVIDER,
    REATTACH_PROVIDERS,
    SKIP_PROVIDER_VERIFY,
    WORKSPACE,
];

const RESERVED_PREFIXES: &[&str] = &[VAR_PREFIX, CLI_ARGS_PREFIX];

/// True for names the driver controls itself.
pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || RESERVED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Reserved names present in `env`, sorted.
pub fn reserved_in<'a>(env: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut found: Vec<String> = env
        .into_iter()
        .filter(|name| is_reserved(name))
        .cloned()
        .collect();
    found.sort();
    found
}

/// Read access to the host process environment.
///
/// The driver never calls `std::env` directly; everything goes through this
/// capability so tests can pin the environment.
pub trait EnvironmentSource: Send + Sync + fmt::Debug {
    fn vars(&self) -> Vec<(String, String)>;

    fn var(&self, name: &str) -> Option<String> {
        self.vars()
            .into_iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }
}

/// The real process environment. Non UTF-8 entries are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEnvironment;

impl EnvironmentSource for HostEnvironment {
    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed environment, mostly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment(pub HashMap<String, String>);

impl FixedEnvironment {
    pub fn new<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl EnvironmentSource for FixedEnvironment {
    fn vars(&self) -> Vec<(String, String)> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// Engine log-file settings. An empty `path` suppresses engine logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub path: String,
    pub level: String,
    pub core: String,
    pub provider: String,
}

/// Everything on the session that shapes the child environment.
#[derive(Debug, Clone, Default)]
pub struct EnvPolicy {
    /// `None` inherits the (filtered) host environment.
    pub override_env: Option<HashMap<String, String>>,
    pub append_user_agent: String,
    pub log: LogSettings,
    pub disable_plugin_tls: bool,
    pub skip_provider_verify: bool,
}

impl EnvPolicy {
    /// Replace the inherited environment. Fails on the first reserved name.
    pub fn set_override(&mut self, env: HashMap<String, String>) -> Result<()> {
        if let Some(name) = reserved_in(env.keys()).into_iter().next() {
            return Err(Error::ManualEnvVar { name });
        }
        self.override_env = Some(env);
        Ok(())
    }

    /// Compose the complete child environment as `KEY=VALUE` lines, sorted by key.
    pub fn compose(
        &self,
        host: &dyn EnvironmentSource,
        delta: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut env: BTreeMap<String, String> = match &self.override_env {
            Some(env) => env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => host
                .vars()
                .into_iter()
                .filter(|(k, _)| !is_reserved(k))
                .collect(),
        };

        for (k, v) in delta {
            env.insert(k.clone(), v.clone());
        }

        if !env.contains_key(CHECKPOINT_DISABLE) {
            if let Some(value) = host.var(CHECKPOINT_DISABLE).filter(|v| !v.is_empty()) {
                env.insert(CHECKPOINT_DISABLE.to_string(), value);
            }
        }

        let user_agent = merge_user_agent([
            host.var(APPEND_USER_AGENT).unwrap_or_default().as_str(),
            self.append_user_agent.as_str(),
            crate::driver_identifier().as_str(),
        ]);
        env.insert(APPEND_USER_AGENT.to_string(), user_agent);

        let log = &self.log;
        let (level, core, path, provider) = if log.path.is_empty() {
            ("", "", "", "")
        } else {
            (
                log.level.as_str(),
                log.core.as_str(),
                log.path.as_str(),
                log.provider.as_str(),
            )
        };
        env.insert(LOG.to_string(), level.to_string());
        env.insert(LOG_CORE.to_string(), core.to_string());
        env.insert(LOG_PATH.to_string(), path.to_string());
        env.insert(LOG_PROVIDER.to_string(), provider.to_string());

        env.insert(AUTOMATION.to_string(), "1".to_string());

        // workspaces are switched through the workspace subcommands only
        env.remove(WORKSPACE);

        if self.disable_plugin_tls {
            env.insert(DISABLE_PLUGIN_TLS.to_string(), "1".to_string());
        }
        if self.skip_provider_verify {
            env.insert(SKIP_PROVIDER_VERIFY.to_string(), "1".to_string());
        }

        env.into_iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Join user agent fragments, dropping blanks and repeats.
pub fn merge_user_agent<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let mut merged: Vec<&str> = Vec::new();
    for fragment in fragments {
        let fragment = fragment.trim();
        if fragment.is_empty() || merged.contains(&fragment) {
            continue;
        }
        merged.push(fragment);
    }
    merged.join(" ")
}

/// Split `KEY=VALUE` lines back into pairs.
pub fn split_env_lines(lines: &[String]) -> impl Iterator<Item = (&str, &str)> {
    lines
        .iter()
        .filter_map(|line| line.split_once('='))
}

//! Tagged options accepted by the subcommand methods.
//!
//! Every subcommand takes a list of [`Opt`] values. Each adapter picks out the
//! tags it understands and rejects the rest with [`Error::InvalidOption`], so a
//! misplaced option is an error rather than silently ignored.
//!
//! [`Error::InvalidOption`]: crate::Error::InvalidOption

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub enum Opt {
    /// `-allow-missing` for taint/untaint.
    AllowMissing(bool),
    /// `-allow-missing-config` for import.
    AllowMissingConfig(bool),
    Backend(bool),
    BackendConfig(String),
    Backup(String),
    BackupOut(String),
    /// Global `-chdir=PATH`, emitted before the subcommand. Requires 0.14.0.
    Chdir(String),
    Config(String),
    /// Source state for `workspace new -state=`.
    CopyState(String),
    Destroy(bool),
    Dir(String),
    DirOrPlan(String),
    DrawCycles(bool),
    DryRun(bool),
    Force(bool),
    FromModule(String),
    FsMirror(String),
    Get(bool),
    GetPlugins(bool),
    GraphPlan(String),
    GraphType(String),
    Id(String),
    /// Closing (cancelling) the token asks the engine to stop gracefully,
    /// independently of the call's [`Context`](crate::Context).
    Interrupt(CancellationToken),
    Lock(bool),
    LockTimeout(String),
    Lockfile(String),
    NetMirror(String),
    Out(String),
    Parallelism(u32),
    Platform(String),
    PluginDir(String),
    Provider(String),
    Reattach(ReattachInfo),
    Reconfigure(bool),
    Recursive(bool),
    Refresh(bool),
    RefreshOnly(bool),
    Replace(String),
    State(String),
    StateOut(String),
    Target(String),
    TestsDirectory(String),
    Update(bool),
    Upgrade(bool),
    Var(String),
    VarFile(String),
    VerifyPlugins(bool),
}

impl Opt {
    /// Flag-style name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllowMissing(_) => "allow-missing",
            Self::AllowMissingConfig(_) => "allow-missing-config",
            Self::Backend(_) => "backend",
            Self::BackendConfig(_) => "backend-config",
            Self::Backup(_) => "backup",
            Self::BackupOut(_) => "backup-out",
            Self::Chdir(_) => "chdir",
            Self::Config(_) => "config",
            Self::CopyState(_) => "state",
            Self::Destroy(_) => "destroy",
            Self::Dir(_) => "dir",
            Self::DirOrPlan(_) => "dir-or-plan",
            Self::DrawCycles(_) => "draw-cycles",
            Self::DryRun(_) => "dry-run",
            Self::Force(_) => "force",
            Self::FromModule(_) => "from-module",
            Self::FsMirror(_) => "fs-mirror",
            Self::Get(_) => "get",
            Self::GetPlugins(_) => "get-plugins",
            Self::GraphPlan(_) => "plan",
            Self::GraphType(_) => "type",
            Self::Id(_) => "id",
            Self::Interrupt(_) => "interrupt",
            Self::Lock(_) => "lock",
            Self::LockTimeout(_) => "lock-timeout",
            Self::Lockfile(_) => "lockfile",
            Self::NetMirror(_) => "net-mirror",
            Self::Out(_) => "out",
            Self::Parallelism(_) => "parallelism",
            Self::Platform(_) => "platform",
            Self::PluginDir(_) => "plugin-dir",
            Self::Provider(_) => "provider",
            Self::Reattach(_) => "reattach",
            Self::Reconfigure(_) => "reconfigure",
            Self::Recursive(_) => "recursive",
            Self::Refresh(_) => "refresh",
            Self::RefreshOnly(_) => "refresh-only",
            Self::Replace(_) => "replace",
            Self::State(_) => "state",
            Self::StateOut(_) => "state-out",
            Self::Target(_) => "target",
            Self::TestsDirectory(_) => "tests-directory",
            Self::Update(_) => "update",
            Self::Upgrade(_) => "upgrade",
            Self::Var(_) => "var",
            Self::VarFile(_) => "var-file",
            Self::VerifyPlugins(_) => "verify-plugins",
        }
    }
}

/// Providers already running out of process, keyed by provider address.
/// Serialised into `TF_REATTACH_PROVIDERS`.
pub type ReattachInfo = BTreeMap<String, ReattachConfig>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReattachConfig {
    #[serde(rename = "Protocol")]
    pub protocol: String,
    #[serde(rename = "ProtocolVersion")]
    pub protocol_version: u32,
    #[serde(rename = "Pid")]
    pub pid: u32,
    #[serde(rename = "Test")]
    pub test: bool,
    #[serde(rename = "Addr")]
    pub addr: ReattachAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReattachAddr {
    #[serde(rename = "Network")]
    pub network: String,
    #[serde(rename = "String")]
    pub string: String,
}

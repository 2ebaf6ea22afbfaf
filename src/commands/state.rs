//! The `state` subcommand family.

use crate::commands::{common_only, Common};
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::V0_13_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

/// Options shared by `state mv`, `state rm` and `state replace-provider`.
#[derive(Debug)]
struct StateEditConfig {
    backup: String,
    backup_out: String,
    dry_run: bool,
    lock: bool,
    lock_timeout: String,
    state: String,
    state_out: String,
    common: Common,
}

impl Default for StateEditConfig {
    fn default() -> Self {
        Self {
            backup: String::new(),
            backup_out: String::new(),
            dry_run: false,
            lock: true,
            lock_timeout: "0s".into(),
            state: String::new(),
            state_out: String::new(),
            common: Common::default(),
        }
    }
}

impl StateEditConfig {
    fn collect(opts: impl IntoIterator<Item = Opt>, command: &'static str) -> Result<Self> {
        let mut c = Self::default();
        for opt in opts {
            match opt {
                Opt::Backup(v) => c.backup = v,
                Opt::BackupOut(v) => c.backup_out = v,
                Opt::DryRun(v) => c.dry_run = v,
                Opt::Lock(v) => c.lock = v,
                Opt::LockTimeout(v) => c.lock_timeout = v,
                Opt::State(v) => c.state = v,
                Opt::StateOut(v) => c.state_out = v,
                other => c.common.absorb(other, command)?,
            }
        }
        Ok(c)
    }

    fn edit_flags(&self, cmd: &mut CommandBuilder) {
        cmd.arg("-no-color")
            .string_flag("backup", &self.backup)
            .string_flag("backup-out", &self.backup_out)
            .string_flag("lock-timeout", &self.lock_timeout)
            .string_flag("state", &self.state)
            .string_flag("state-out", &self.state_out)
            .switch("dry-run", self.dry_run)
            .flag("lock", self.lock);
    }
}

/// Addresses printed by `state list`, one per line.
pub(crate) fn parse_state_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl Session {
    /// Resource addresses in the state, optionally filtered by `addresses`.
    pub async fn state_list(
        &self,
        ctx: &Context,
        addresses: &[&str],
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<Vec<String>> {
        let cmd = self.state_list_cmd(ctx, addresses, opts).await?;
        let stdout = self.run_output(ctx, cmd).await?;
        Ok(parse_state_list(&stdout))
    }

    pub(crate) async fn state_list_cmd(
        &self,
        ctx: &Context,
        addresses: &[&str],
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut state = String::new();
        let mut id = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::State(v) => state = v,
                Opt::Id(v) => id = v,
                other => common.absorb(other, "state list")?,
            }
        }

        let mut cmd = CommandBuilder::new(["state", "list"]);
        cmd.string_flag("state", &state).string_flag("id", &id);
        for address in addresses {
            cmd.positional(address);
        }
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    /// Attributes of a single resource, as the engine renders them.
    pub async fn state_show(
        &self,
        ctx: &Context,
        address: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<String> {
        let mut state = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::State(v) => state = v,
                other => common.absorb(other, "state show")?,
            }
        }

        let mut cmd = CommandBuilder::new(["state", "show"]);
        cmd.arg("-no-color")
            .string_flag("state", &state)
            .positional(address);
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run_output(ctx, cmd).await
    }

    pub async fn state_mv(
        &self,
        ctx: &Context,
        source: &str,
        destination: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.state_mv_cmd(ctx, source, destination, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn state_mv_cmd(
        &self,
        ctx: &Context,
        source: &str,
        destination: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let c = StateEditConfig::collect(opts, "state mv")?;
        let mut cmd = CommandBuilder::new(["state", "mv"]);
        c.edit_flags(&mut cmd);
        cmd.positional(source).positional(destination);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    pub async fn state_rm(
        &self,
        ctx: &Context,
        address: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let c = StateEditConfig::collect(opts, "state rm")?;
        let mut cmd = CommandBuilder::new(["state", "rm"]);
        c.edit_flags(&mut cmd);
        cmd.positional(address);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        self.run(ctx, cmd).await
    }

    /// Raw state document from the configured backend.
    pub async fn state_pull(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<String> {
        let common = common_only(opts, "state pull")?;
        let mut cmd = CommandBuilder::new(["state", "pull"]);
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run_output(ctx, cmd).await
    }

    /// Upload a local state file to the configured backend.
    pub async fn state_push(
        &self,
        ctx: &Context,
        path: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let mut force = false;
        let mut lock = true;
        let mut lock_timeout = "0s".to_string();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::Force(v) => force = v,
                Opt::Lock(v) => lock = v,
                Opt::LockTimeout(v) => lock_timeout = v,
                other => common.absorb(other, "state push")?,
            }
        }

        let mut cmd = CommandBuilder::new(["state", "push"]);
        cmd.switch("force", force)
            .flag("lock", lock)
            .string_flag("lock-timeout", &lock_timeout)
            .positional(path);
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run(ctx, cmd).await
    }

    /// Rewrite provider addresses recorded in the state.
    pub async fn state_replace_provider(
        &self,
        ctx: &Context,
        from: &str,
        to: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.state_replace_provider_cmd(ctx, from, to, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn state_replace_provider_cmd(
        &self,
        ctx: &Context,
        from: &str,
        to: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V0_13_0), None, "state replace-provider")
            .await?;
        let c = StateEditConfig::collect(opts, "state replace-provider")?;

        let mut cmd = CommandBuilder::new(["state", "replace-provider"]);
        cmd.arg("-no-color")
            .arg("-auto-approve")
            .string_flag("backup", &c.backup)
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("state", &c.state)
            .flag("lock", c.lock)
            .positional(from)
            .positional(to);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

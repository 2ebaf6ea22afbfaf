//! The `workspace` subcommand family.

use crate::commands::{common_only, Common};
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::V0_10_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

/// Result of `workspace list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspaces {
    pub all: Vec<String>,
    pub current: String,
}

/// Parse `workspace list` output; the current workspace is marked with `* `.
pub(crate) fn parse_workspace_list(stdout: &str) -> Workspaces {
    let mut workspaces = Workspaces::default();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let name = match line.strip_prefix("* ") {
            Some(name) => {
                let name = name.trim();
                workspaces.current = name.to_string();
                name
            }
            None => line,
        };
        workspaces.all.push(name.to_string());
    }
    workspaces
}

impl Session {
    pub async fn workspace_list(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<Workspaces> {
        let common = common_only(opts, "workspace list")?;
        let mut cmd = CommandBuilder::new(["workspace", "list"]);
        cmd.arg("-no-color");
        common.apply_to(self, ctx, &mut cmd).await?;
        let stdout = self.run_output(ctx, cmd).await?;
        Ok(parse_workspace_list(&stdout))
    }

    pub async fn workspace_new(
        &self,
        ctx: &Context,
        name: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.workspace_new_cmd(ctx, name, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn workspace_new_cmd(
        &self,
        ctx: &Context,
        name: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut lock = true;
        let mut lock_timeout = "0s".to_string();
        let mut copy_state = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::Lock(v) => lock = v,
                Opt::LockTimeout(v) => lock_timeout = v,
                Opt::CopyState(v) => copy_state = v,
                other => common.absorb(other, "workspace new")?,
            }
        }

        let mut cmd = CommandBuilder::new(["workspace", "new"]);
        cmd.arg("-no-color");
        // older engines reject these flags, so only non-defaults are passed
        if lock_timeout != "0s" {
            cmd.flag("lock-timeout", &lock_timeout);
        }
        if !lock {
            cmd.flag("lock", lock);
        }
        cmd.string_flag("state", &copy_state).positional(name);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    pub async fn workspace_select(
        &self,
        ctx: &Context,
        name: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let common = common_only(opts, "workspace select")?;
        let mut cmd = CommandBuilder::new(["workspace", "select"]);
        cmd.arg("-no-color").positional(name);
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run(ctx, cmd).await
    }

    pub async fn workspace_delete(
        &self,
        ctx: &Context,
        name: &str,
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
                other => common.absorb(other, "workspace delete")?,
            }
        }

        let mut cmd = CommandBuilder::new(["workspace", "delete"]);
        cmd.arg("-no-color");
        if lock_timeout != "0s" {
            cmd.flag("lock-timeout", &lock_timeout);
        }
        if !lock {
            cmd.flag("lock", lock);
        }
        cmd.switch("force", force).positional(name);
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run(ctx, cmd).await
    }

    /// Name of the selected workspace.
    pub async fn workspace_show(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<String> {
        self.require_range(ctx, Some(&V0_10_0), None, "workspace show")
            .await?;
        let common = common_only(opts, "workspace show")?;
        let mut cmd = CommandBuilder::new(["workspace", "show"]);
        cmd.arg("-no-color");
        common.apply_to(self, ctx, &mut cmd).await?;
        let stdout = self.run_output(ctx, cmd).await?;
        Ok(stdout.trim().to_string())
    }
}

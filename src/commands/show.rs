use crate::commands::common_only;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::types::{Plan, State};
use crate::core::version::V0_12_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// Current state as JSON.
    pub async fn show(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<State> {
        let cmd = self.show_cmd(ctx, opts, "").await?;
        self.run_json(ctx, cmd).await
    }

    /// A specific state file as JSON.
    pub async fn show_state_file(
        &self,
        ctx: &Context,
        path: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<State> {
        let cmd = self.show_cmd(ctx, opts, path).await?;
        self.run_json(ctx, cmd).await
    }

    /// A saved plan file as JSON.
    pub async fn show_plan_file(
        &self,
        ctx: &Context,
        path: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<Plan> {
        let cmd = self.show_cmd(ctx, opts, path).await?;
        self.run_json(ctx, cmd).await
    }

    /// A saved plan file in its human-readable form.
    pub async fn show_plan_file_raw(
        &self,
        ctx: &Context,
        path: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<String> {
        self.require_range(ctx, Some(&V0_12_0), None, "show").await?;
        let common = common_only(opts, "show")?;
        let mut cmd = CommandBuilder::new(["show"]);
        cmd.arg("-no-color").positional(path);
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run_output(ctx, cmd).await
    }

    pub(crate) async fn show_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
        path: &str,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V0_12_0), None, "show").await?;
        let common = common_only(opts, "show")?;
        let mut cmd = CommandBuilder::new(["show"]);
        cmd.arg("-json").arg("-no-color").positional(path);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

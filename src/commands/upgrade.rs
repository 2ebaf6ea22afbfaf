//! The one-off configuration upgrade commands shipped with 0.12 and 0.13.

use semver::Version;

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::{V0_12_0, V0_13_0, V0_14_0};
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// `terraform 0.12upgrade`, only available on 0.12.x.
    pub async fn upgrade012(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self
            .upgrade_cmd(ctx, "0.12upgrade", &V0_12_0, &V0_13_0, true, opts)
            .await?;
        self.run(ctx, cmd).await
    }

    /// `terraform 0.13upgrade`, only available on 0.13.x.
    pub async fn upgrade013(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self
            .upgrade_cmd(ctx, "0.13upgrade", &V0_13_0, &V0_14_0, false, opts)
            .await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn upgrade_cmd(
        &self,
        ctx: &Context,
        command: &'static str,
        min: &Version,
        max: &Version,
        accepts_force: bool,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(min), Some(max), command).await?;

        let mut force = false;
        let mut dir = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::Force(v) if accepts_force => force = v,
                Opt::Dir(v) => dir = v,
                other => common.absorb(other, command)?,
            }
        }

        let mut cmd = CommandBuilder::new([command]);
        cmd.arg("-no-color")
            .arg("-yes")
            .switch("force", force)
            .positional(&dir);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// `terraform get`: download the modules referenced by the configuration.
    pub async fn get(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self.get_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn get_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut update = false;
        let mut dir = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::Update(v) => update = v,
                Opt::Dir(v) => dir = v,
                other => common.absorb(other, "get")?,
            }
        }

        let mut cmd = CommandBuilder::new(["get"]);
        cmd.arg("-no-color").flag("update", update).positional(&dir);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

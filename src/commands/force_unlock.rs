use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// Release a stuck state lock by its ID.
    pub async fn force_unlock(
        &self,
        ctx: &Context,
        lock_id: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.force_unlock_cmd(ctx, lock_id, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn force_unlock_cmd(
        &self,
        ctx: &Context,
        lock_id: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut dir = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::Dir(v) => dir = v,
                other => common.absorb(other, "force-unlock")?,
            }
        }

        let mut cmd = CommandBuilder::new(["force-unlock"]);
        cmd.arg("-no-color")
            .arg("-force")
            .positional(lock_id)
            .positional(&dir);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::V1_6_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// Run the configuration's `.tftest.hcl` files. Progress goes to the
    /// stdout forwarder; a failing test is an error.
    pub async fn test(&self, ctx: &Context, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
        let cmd = self.test_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn test_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V1_6_0), None, "test").await?;
        let mut tests_directory = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::TestsDirectory(v) => tests_directory = v,
                other => common.absorb(other, "test")?,
            }
        }

        let mut cmd = CommandBuilder::new(["test"]);
        cmd.arg("-no-color")
            .string_flag("tests-directory", &tests_directory);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

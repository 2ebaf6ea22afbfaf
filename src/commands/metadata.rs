use crate::commands::common_only;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::types::MetadataFunctions;
use crate::core::version::V1_4_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// Signatures of the functions available to configurations.
    pub async fn metadata_functions(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<MetadataFunctions> {
        self.require_range(ctx, Some(&V1_4_0), None, "metadata functions")
            .await?;
        let common = common_only(opts, "metadata functions")?;
        let mut cmd = CommandBuilder::new(["metadata", "functions"]);
        cmd.arg("-json");
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run_json(ctx, cmd).await
    }
}

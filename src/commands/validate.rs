use crate::commands::common_only;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::types::ValidateOutput;
use crate::core::version::V0_12_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::process::decode_json;
use crate::runtime::session::Session;

impl Session {
    /// `terraform validate -json`.
    ///
    /// An invalid configuration is not an error here: the diagnostics are
    /// returned with `valid == false`.
    pub async fn validate(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<ValidateOutput> {
        let cmd = self.validate_cmd(ctx, opts).await?;
        let done = self.execute(ctx, cmd).await?;
        match done.code() {
            Some(0) | Some(1) => decode_json(&done.stdout),
            _ => done.into_stdout().and_then(|stdout| decode_json(&stdout)),
        }
    }

    pub(crate) async fn validate_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V0_12_0), None, "validate -json")
            .await?;
        let common = common_only(opts, "validate")?;
        let mut cmd = CommandBuilder::new(["validate"]);
        cmd.arg("-no-color").arg("-json");
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

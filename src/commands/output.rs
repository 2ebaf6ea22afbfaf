use std::collections::BTreeMap;

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::types::OutputMeta;
use crate::runtime::command::CommandBuilder;
use crate::runtime::process::decode_json;
use crate::runtime::session::Session;

impl Session {
    /// All root module outputs.
    pub async fn output(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<BTreeMap<String, OutputMeta>> {
        let cmd = self.output_cmd(ctx, opts, "").await?;
        self.run_json(ctx, cmd).await
    }

    /// One named output, returned as a single-entry map.
    ///
    /// The engine prints only the bare value for a named output, so type and
    /// sensitivity are not available.
    pub async fn output_named(
        &self,
        ctx: &Context,
        name: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<BTreeMap<String, OutputMeta>> {
        let cmd = self.output_cmd(ctx, opts, name).await?;
        let stdout = self.execute(ctx, cmd).await?.into_stdout()?;
        let value = decode_json(&stdout)?;
        Ok(BTreeMap::from([(
            name.to_string(),
            OutputMeta {
                value,
                ..Default::default()
            },
        )]))
    }

    pub(crate) async fn output_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
        name: &str,
    ) -> Result<CommandBuilder> {
        let mut state = String::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::State(v) => state = v,
                other => common.absorb(other, "output")?,
            }
        }

        let mut cmd = CommandBuilder::new(["output"]);
        cmd.arg("-no-color")
            .arg("-json")
            .string_flag("state", &state)
            .positional(name);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

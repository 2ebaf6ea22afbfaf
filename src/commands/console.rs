use serde::de::DeserializeOwned;

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::runtime::command::CommandBuilder;
use crate::runtime::process::decode_json;
use crate::runtime::session::Session;

impl Session {
    /// Evaluate `expression` with `terraform console` and return the printed value.
    pub async fn console(
        &self,
        ctx: &Context,
        expression: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<String> {
        let cmd = self.console_cmd(ctx, expression, opts).await?;
        let stdout = self.run_output(ctx, cmd).await?;
        Ok(stdout.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Evaluate `expression` and decode its value as JSON.
    ///
    /// The expression is wrapped in `jsonencode(...)`; the engine prints the
    /// result as a quoted string literal, which is unquoted before decoding.
    pub async fn console_json<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        expression: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<T> {
        let printed = self
            .console(ctx, &format!("jsonencode({expression})"), opts)
            .await?;
        decode_console_json(&printed)
    }

    pub(crate) async fn console_cmd(
        &self,
        ctx: &Context,
        expression: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut state = String::new();
        let mut vars = Vec::new();
        let mut var_files = Vec::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::State(v) => state = v,
                Opt::Var(v) => vars.push(v),
                Opt::VarFile(v) => var_files.push(v),
                other => common.absorb(other, "console")?,
            }
        }

        let mut cmd = CommandBuilder::new(["console"]);
        cmd.string_flag("state", &state)
            .repeated("var-file", &var_files)
            .vars(&vars)
            .stdin(format!("{expression}\n"));
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

pub(crate) fn decode_console_json<T: DeserializeOwned>(printed: &str) -> Result<T> {
    let printed = printed.trim();
    if printed.starts_with('"') {
        let inner: String = decode_json(printed.as_bytes())?;
        decode_json(inner.as_bytes())
    } else {
        decode_json(printed.as_bytes())
    }
}

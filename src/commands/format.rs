//! `terraform fmt` in its three modes: filter, check and rewrite.

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::version::V0_7_7;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

/// Outcome of `fmt -check`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatCheck {
    pub formatted: bool,
    /// Files that would be rewritten, as listed by the engine.
    pub unformatted_files: Vec<String>,
}

#[derive(Debug, Default)]
struct FormatConfig {
    recursive: bool,
    dir: String,
    common: Common,
}

impl FormatConfig {
    fn collect(opts: impl IntoIterator<Item = Opt>) -> Result<Self> {
        let mut c = Self::default();
        for opt in opts {
            match opt {
                Opt::Recursive(v) => c.recursive = v,
                Opt::Dir(v) => c.dir = v,
                other => c.common.absorb(other, "fmt")?,
            }
        }
        Ok(c)
    }
}

impl Session {
    /// Canonically format configuration source passed in memory.
    pub async fn format_string(&self, ctx: &Context, content: &str) -> Result<String> {
        self.require_range(ctx, Some(&V0_7_7), None, "fmt").await?;
        let mut cmd = CommandBuilder::new(["fmt"]);
        cmd.arg("-no-color").arg("-").stdin(content.as_bytes().to_vec());
        self.run_output(ctx, cmd).await
    }

    /// Report files that are not canonically formatted, without changing them.
    pub async fn format_check(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<FormatCheck> {
        let cmd = self.format_check_cmd(ctx, opts).await?;
        let done = self.execute(ctx, cmd).await?;
        if done.code() == Some(3) {
            let unformatted_files = done
                .stdout_string()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(FormatCheck {
                formatted: false,
                unformatted_files,
            });
        }
        done.into_stdout()?;
        Ok(FormatCheck {
            formatted: true,
            unformatted_files: Vec::new(),
        })
    }

    pub(crate) async fn format_check_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V0_7_7), None, "fmt").await?;
        let c = FormatConfig::collect(opts)?;
        let mut cmd = CommandBuilder::new(["fmt"]);
        cmd.arg("-no-color")
            .flag("write", false)
            .flag("list", true)
            .flag("diff", false)
            .flag("check", true)
            .switch("recursive", c.recursive)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    /// Rewrite configuration files in place.
    pub async fn format_write(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        self.require_range(ctx, Some(&V0_7_7), None, "fmt").await?;
        let c = FormatConfig::collect(opts)?;
        let mut cmd = CommandBuilder::new(["fmt"]);
        cmd.arg("-no-color")
            .flag("write", true)
            .flag("list", false)
            .flag("diff", false)
            .switch("recursive", c.recursive)
            .positional(&c.dir);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        self.run(ctx, cmd).await
    }
}

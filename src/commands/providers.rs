//! The `providers` subcommand family.

use crate::commands::{common_only, Common};
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::core::types::ProviderSchemas;
use crate::core::version::{V0_12_0, V0_13_0, V0_14_0};
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    pub async fn providers_schema(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<ProviderSchemas> {
        self.require_range(ctx, Some(&V0_12_0), None, "providers schema")
            .await?;
        let common = common_only(opts, "providers schema")?;
        let mut cmd = CommandBuilder::new(["providers", "schema"]);
        cmd.arg("-json").arg("-no-color");
        common.apply_to(self, ctx, &mut cmd).await?;
        self.run_json(ctx, cmd).await
    }

    /// Copy the required providers into a local mirror directory.
    pub async fn providers_mirror(
        &self,
        ctx: &Context,
        target_dir: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.providers_mirror_cmd(ctx, target_dir, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn providers_mirror_cmd(
        &self,
        ctx: &Context,
        target_dir: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V0_13_0), None, "providers mirror")
            .await?;
        let mut platforms = Vec::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::Platform(v) => platforms.push(v),
                other => common.absorb(other, "providers mirror")?,
            }
        }

        let mut cmd = CommandBuilder::new(["providers", "mirror"]);
        cmd.repeated("platform", &platforms).positional(target_dir);
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }

    /// Update the dependency lock file.
    pub async fn providers_lock(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.providers_lock_cmd(ctx, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn providers_lock_cmd(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        self.require_range(ctx, Some(&V0_14_0), None, "providers lock")
            .await?;
        let mut fs_mirror = String::new();
        let mut net_mirror = String::new();
        let mut platforms = Vec::new();
        let mut providers = Vec::new();
        let mut common = Common::default();
        for opt in opts {
            match opt {
                Opt::FsMirror(v) => fs_mirror = v,
                Opt::NetMirror(v) => net_mirror = v,
                Opt::Platform(v) => platforms.push(v),
                Opt::Provider(v) => providers.push(v),
                other => common.absorb(other, "providers lock")?,
            }
        }

        let mut cmd = CommandBuilder::new(["providers", "lock"]);
        cmd.string_flag("fs-mirror", &fs_mirror)
            .string_flag("net-mirror", &net_mirror)
            .repeated("platform", &platforms);
        for provider in &providers {
            cmd.positional(provider);
        }
        common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

use tracing::debug;

use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::version::{parse_version_output, VersionInfo};
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

impl Session {
    /// Engine and provider versions.
    ///
    /// The first successful answer is cached for the life of the session;
    /// `skip_cache` forces a fresh query and refreshes the cache.
    pub async fn version(&self, ctx: &Context, skip_cache: bool) -> Result<VersionInfo> {
        if !skip_cache {
            if let Some(info) = self.cached_version() {
                return Ok(info);
            }
        }

        let stdout = self
            .run_output(ctx, CommandBuilder::new(["version"]))
            .await?;
        let info = parse_version_output(&stdout)?;
        debug!(core = %info.core, providers = info.providers.len(), "engine version resolved");
        self.store_version(info.clone());
        Ok(info)
    }
}

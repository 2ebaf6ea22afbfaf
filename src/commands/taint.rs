//! `taint` and `untaint`.

use crate::commands::Common;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::options::Opt;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

#[derive(Debug)]
struct TaintConfig {
    allow_missing: bool,
    lock: bool,
    lock_timeout: String,
    state: String,
    state_out: String,
    common: Common,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            allow_missing: false,
            lock: true,
            lock_timeout: "0s".into(),
            state: String::new(),
            state_out: String::new(),
            common: Common::default(),
        }
    }
}

impl Session {
    /// Mark a resource for replacement on the next apply.
    pub async fn taint(
        &self,
        ctx: &Context,
        address: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.taint_cmd(ctx, "taint", address, opts).await?;
        self.run(ctx, cmd).await
    }

    pub async fn untaint(
        &self,
        ctx: &Context,
        address: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<()> {
        let cmd = self.taint_cmd(ctx, "untaint", address, opts).await?;
        self.run(ctx, cmd).await
    }

    pub(crate) async fn taint_cmd(
        &self,
        ctx: &Context,
        command: &'static str,
        address: &str,
        opts: impl IntoIterator<Item = Opt>,
    ) -> Result<CommandBuilder> {
        let mut c = TaintConfig::default();
        for opt in opts {
            match opt {
                Opt::AllowMissing(v) => c.allow_missing = v,
                Opt::Lock(v) => c.lock = v,
                Opt::LockTimeout(v) => c.lock_timeout = v,
                Opt::State(v) => c.state = v,
                Opt::StateOut(v) => c.state_out = v,
                other => c.common.absorb(other, command)?,
            }
        }

        let mut cmd = CommandBuilder::new([command]);
        cmd.arg("-no-color")
            .switch("allow-missing", c.allow_missing)
            .string_flag("lock-timeout", &c.lock_timeout)
            .string_flag("state", &c.state)
            .string_flag("state-out", &c.state_out)
            .flag("lock", c.lock)
            .positional(address);
        c.common.apply_to(self, ctx, &mut cmd).await?;
        Ok(cmd)
    }
}

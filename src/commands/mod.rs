//! One module per engine subcommand family.
//!
//! Every adapter follows the same shape: start from defaults, fold in the
//! caller's [`Opt`] values, check the engine version, build the arguments and
//! run. The `*_cmd` builders are kept separate from the runners so the exact
//! argument vector can be checked without starting a process.

use tokio_util::sync::CancellationToken;

use crate::core::context::Context;
use crate::core::env::REATTACH_PROVIDERS;
use crate::core::error::{Error, Result};
use crate::core::options::{Opt, ReattachInfo};
use crate::core::version::V0_14_0;
use crate::runtime::command::CommandBuilder;
use crate::runtime::session::Session;

mod apply;
mod console;
mod force_unlock;
mod format;
mod get;
mod graph;
mod import;
mod init;
mod metadata;
mod output;
mod providers;
mod show;
mod state;
mod taint;
mod test;
mod upgrade;
mod validate;
mod version;
mod workspace;


pub use format::FormatCheck;
pub use workspace::Workspaces;

/// Options every subcommand accepts.
#[derive(Debug, Default)]
pub(crate) struct Common {
    chdir: Option<String>,
    reattach: Option<ReattachInfo>,
    interrupt: Option<CancellationToken>,
}

impl Common {
    /// Take a shared option, or reject `opt` as unsupported by `command`.
    pub(crate) fn absorb(&mut self, opt: Opt, command: &'static str) -> Result<()> {
        match opt {
            Opt::Chdir(dir) => self.chdir = Some(dir),
            Opt::Reattach(info) => self.reattach = Some(info),
            Opt::Interrupt(token) => self.interrupt = Some(token),
            other => {
                return Err(Error::InvalidOption {
                    option: other.name(),
                    command,
                })
            }
        }
        Ok(())
    }

    pub(crate) async fn apply_to(
        self,
        session: &Session,
        ctx: &Context,
        cmd: &mut CommandBuilder,
    ) -> Result<()> {
        if let Some(dir) = self.chdir {
            session
                .require_range(ctx, Some(&V0_14_0), None, "-chdir")
                .await?;
            cmd.chdir(dir);
        }
        if let Some(info) = self.reattach {
            let encoded = serde_json::to_string(&info).map_err(std::io::Error::from)?;
            cmd.env(REATTACH_PROVIDERS, encoded);
        }
        if let Some(token) = self.interrupt {
            cmd.interrupt_signal(token);
        }
        Ok(())
    }
}

/// Only the shared options are accepted.
pub(crate) fn common_only(
    opts: impl IntoIterator<Item = Opt>,
    command: &'static str,
) -> Result<Common> {
    let mut common = Common::default();
    for opt in opts {
        common.absorb(opt, command)?;
    }
    Ok(common)
}

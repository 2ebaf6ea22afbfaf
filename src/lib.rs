//! # tfexec
//!
//! A type-safe, async driver for the Terraform command-line tool.
//!
//! Each engine subcommand is exposed as a method on [`Session`] that takes a list of
//! tagged [`Opt`] values, builds a fully specified child invocation, runs it under a
//! cancellable [`Context`] and decodes the result into typed values.
//!
//! ```rust,no_run
//! use tfexec::{Context, Opt, Session};
//!
//! # #[tokio::main]
//! # async fn main() -> tfexec::Result<()> {
//! let session = Session::new("/srv/infra", "/usr/local/bin/terraform")?;
//! let ctx = Context::new();
//!
//! session.init(&ctx, [Opt::Upgrade(true)]).await?;
//! let changed = session.plan(&ctx, [Opt::Out("plan.tfplan".into())]).await?;
//! if changed {
//!     session.apply(&ctx, [Opt::DirOrPlan("plan.tfplan".into())]).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod core;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::{
    classify::classify_exit,
    config::SessionConfig,
    context::{CancelKind, Context},
    env::{EnvironmentSource, FixedEnvironment, HostEnvironment},
    error::{EngineError, EngineErrorKind, Error, ExitError, LockInfo, Result},
    options::{Opt, ReattachConfig, ReattachInfo},
    types,
    version::{parse_version_output, VersionInfo},
};
pub use crate::commands::{FormatCheck, Workspaces};
pub use crate::runtime::{
    command::{InterruptPolicy, Invocation},
    controller::{platform_controller, ProcessController},
    process::Completed,
    session::{
        shared_writer, Logger, NopLogger, Session, SessionBuilder, SharedWriter, TracingLogger,
    },
};
pub use semver::Version;
pub use tokio_util::sync::CancellationToken;

/// Version of this crate, reported in the engine's user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifier appended to the engine's outbound user agent.
pub fn driver_identifier() -> String {
    format!("tfexec-rs/{VERSION}")
}

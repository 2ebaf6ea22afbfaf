//! Process plumbing: building invocations, spawning and supervising the
//! engine, and the [`Session`](session::Session) that ties them together.

pub mod command;
pub mod controller;
pub mod process;
pub mod session;

pub use command::{CommandBuilder, InterruptPolicy, Invocation, DEFAULT_GRACEFUL_TIMEOUT};
pub use process::{Completed, Runner};
pub use session::{shared_writer, Session, SessionBuilder, SharedWriter};

//! Engine-independent building blocks: errors, cancellation, environment
//! composition, version gating, failure classification and option types.

pub mod classify;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod options;
pub mod types;
pub mod version;

pub use context::{CancelKind, Context};
pub use error::{Error, Result};

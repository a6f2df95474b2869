//! ferry-core — shared types for the ferry dataset router.
//! All other ferry crates depend on this one.

pub mod config;
pub mod error;
pub mod frame;
pub mod timing;

pub use error::RequestError;
pub use frame::{Command, CommandFrame, PushFrame};
pub use timing::RequestTimings;

//! Common types for the access token workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;

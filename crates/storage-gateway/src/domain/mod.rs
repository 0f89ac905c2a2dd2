//! Domain layer for the storage gateway.

pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::*;
pub use error::*;
pub use session::*;
pub use types::*;

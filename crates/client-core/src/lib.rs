//! Core configuration and utilities for the Liftlog client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_API_URL, DEFAULT_LOG_LEVEL, DEFAULT_PUSH_APP_ID};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;

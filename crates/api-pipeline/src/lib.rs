//! Authorized HTTP pipeline for the Liftlog client.
//!
//! This crate is the single choke point for API calls:
//! - Attaches the current bearer token to every authorized request
//! - Detects authorization-expired responses and coordinates a
//!   single-flight token refresh that concurrent callers attach to
//! - Replays expiry victims once with the rotated token
//! - Translates every failure into a typed [`ApiError`] decided centrally

mod bridge;
mod error;
mod pipeline;
mod transport;

pub use bridge::SessionBridge;
pub use error::{ApiError, ApiResult, GENERIC_ERROR_MESSAGE};
pub use pipeline::{ApiPipeline, RefreshConfig};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport, TransportError};

//! Error types for the framework
//!
//! Startup errors abort `listen` synchronously; request-level errors are
//! confined to the request that raised them.

pub mod http_error;
pub mod server_error;

pub use http_error::{HttpError, HttpResult, ParseError};
pub use server_error::{ServerError, ServerResult};

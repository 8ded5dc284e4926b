//! Router error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    /// Serving a pattern path, or no route for a dispatched address
    #[error("routing error: {0}")]
    Route(String),

    /// A message that cannot be addressed on the wire
    #[error("send error: {0}")]
    Send(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("core error: {0}")]
    Core(#[from] oscroute_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] oscroute_transport::TransportError),
}

use thiserror::Error;

/// Failure to turn an accumulated endpoint path into a callable operation.
///
/// Always raised at invocation time, never while the path is being built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("path `{path}` is too short: expected at least a namespace, a method and a mode, got {segments} segment(s) before the mode")]
    TooShort { path: String, segments: usize },

    #[error("unknown mode selector `{0}` (expected `$now` or `$later`)")]
    UnknownMode(String),

    #[error("segment `{segment}` does not exist in `{path}`")]
    MissingSegment { segment: String, path: String },

    #[error("segment `{segment}` in `{path}` is an operation, not a namespace")]
    NotANamespace { segment: String, path: String },

    #[error("`{path}` resolves to a namespace, not an operation")]
    NotAnOperation { path: String },
}

#[derive(Error, Debug)]
pub enum StoreRpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No routes have been set; call `hook(router)` or `set_routes(router)` first")]
    MissingRoutes,
}

impl From<hyper::Error> for StoreRpcError {
    fn from(err: hyper::Error) -> Self {
        StoreRpcError::Transport(err.to_string())
    }
}

impl From<http::Error> for StoreRpcError {
    fn from(err: http::Error) -> Self {
        StoreRpcError::InvalidRequest(err.to_string())
    }
}

impl From<http::uri::InvalidUri> for StoreRpcError {
    fn from(err: http::uri::InvalidUri) -> Self {
        StoreRpcError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreRpcError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("INVALID_PATTERN: Invalid test filter '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("MALFORMED_HOOK: Suite '{suite}' registers '{name}' as a test method, but that name is reserved for a lifecycle hook. Register it through Hooks instead.")]
    MalformedHook { suite: String, name: String },

    #[error("SOURCE_UNAVAILABLE: Could not locate declaring source file '{file}'.")]
    SourceUnavailable { file: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

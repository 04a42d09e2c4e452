use thiserror::Error;

/// Failure categories for every fallible flow in the app.
///
/// None of these ever take the process down: commands surface them as an
/// inline message and leave the stored data as it was before the action.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid user input. Blocks the action; the user fixes
    /// the input and retries.
    #[error("{0}")]
    Validation(String),

    /// Malformed import source (bad header, too few rows). Aborts the
    /// current import step only.
    #[error("{0}")]
    Parse(String),

    /// Payment API or sheet fetch failure. No automatic retry; the user
    /// may re-trigger the action.
    #[error("{0}")]
    ExternalService(String),

    /// Serialization or filesystem failure. Fatal to the triggering
    /// action only; in-memory edits are not rolled back.
    #[error("storage: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ExternalService(e.to_string())
    }
}

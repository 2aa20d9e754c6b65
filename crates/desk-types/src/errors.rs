//! Error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("State storage error: {0}")]
    Storage(String),

    #[error("Authorization flow error: {0}")]
    Flow(String),

    #[error("Authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    #[error("State mismatch: {0}")]
    StateMismatch(String),

    #[error("Redirect did not include an authorization code")]
    MissingCode,

    #[error("No in-flight authorization matches the returned state; run the URL step again")]
    MissingState,

    #[error("Redirect did not include a state parameter, but state was required")]
    StateRequired,

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Provider did not return a refresh token; retry with forced consent")]
    NoRefreshToken,

    #[error("Authorization cancelled")]
    Cancelled,

    #[error("Authorization timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

//! Shared types and error types for deskcli

pub mod errors;
pub mod tokens;

pub use errors::{AppError, AppResult};
pub use tokens::{ClientCredentials, ExchangedTokens};

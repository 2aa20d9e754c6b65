//! OAuth2 authorization engine for deskcli
//!
//! Obtains a user-authorized refresh token from the provider, either through
//! a temporary loopback callback server or through a fully manual
//! copy/paste flow whose in-flight state survives process restarts.
//!
//! # Usage Example
//! ```no_run
//! use desk_auth::{AuthorizeRequest, Authorizer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(authorizer: Authorizer) -> desk_types::AppResult<()> {
//! let req = AuthorizeRequest::new("default", vec!["drive.readonly".to_string()]);
//! let refresh_token = authorizer.authorize(&req, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth_url;
pub mod authorize;
pub mod exchange;
pub mod manual_flow;
mod pages;
pub mod redirect;
pub mod server_flow;
pub mod state;
pub mod state_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_url::build_authorization_url;
pub use authorize::{
    AuthorizeRequest, Authorizer, BrowserOpener, Collaborators, CredentialReader, LinePrompt,
};
pub use exchange::{HttpTokenExchanger, TokenExchange};
pub use manual_flow::ManualAuthUrl;
pub use redirect::allocate_redirect_uri;
pub use state::generate_state_token;
pub use state_store::{ManualAuthState, ManualStateStore};

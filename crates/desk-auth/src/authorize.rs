//! Authorization orchestrator
//!
//! Single entry point for obtaining a refresh token: validates the request,
//! loads client credentials, applies the overall deadline, and dispatches to
//! the local-server or manual flow. All external collaborators (credential
//! reader, token exchanger, browser opener, line prompt) are injected here
//! so tests can substitute them without global state.

use crate::exchange::TokenExchange;
use crate::manual_flow::{self, ManualAuthUrl};
use crate::server_flow;
use crate::state_store::ManualStateStore;
use async_trait::async_trait;
use desk_types::{AppError, AppResult, ClientCredentials};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default overall flow timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Caller-supplied authorization request
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    /// Target client identifier (credentials are looked up by this name)
    pub client: String,

    /// Requested scopes; must be non-empty
    pub scopes: Vec<String>,

    /// Always show the consent screen, guaranteeing a fresh refresh token
    pub force_consent: bool,

    /// Use the manual copy/paste flow instead of the loopback server
    pub manual: bool,

    /// Pre-supplied authorization code (mutually exclusive with
    /// `redirect_url`, incompatible with `require_state`)
    pub code: Option<String>,

    /// Pre-supplied full redirect URL to extract code and state from
    pub redirect_url: Option<String>,

    /// Fail unless the provider round-trips a state that matches a stored
    /// in-flight attempt
    pub require_state: bool,

    /// Overall flow deadline
    pub timeout: Duration,
}

impl AuthorizeRequest {
    pub fn new(client: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            client: client.into(),
            scopes,
            force_consent: false,
            manual: false,
            code: None,
            redirect_url: None,
            require_state: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Reads OAuth client credentials by client identifier
#[async_trait]
pub trait CredentialReader: Send + Sync {
    async fn read(&self, client: &str) -> AppResult<ClientCredentials>;
}

/// Opens a URL in the user's browser; failures are non-fatal to the flow
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> AppResult<()>;
}

/// Reads one line of interactive input
#[async_trait]
pub trait LinePrompt: Send + Sync {
    /// Returns `Ok(None)` on end of input, which flows treat as cancellation.
    async fn prompt_line(&self, message: &str) -> AppResult<Option<String>>;
}

/// Injected collaborator bundle
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialReader>,
    pub exchanger: Arc<dyn TokenExchange>,
    pub browser: Arc<dyn BrowserOpener>,
    pub prompt: Arc<dyn LinePrompt>,
}

/// Top-level authorization engine
pub struct Authorizer {
    collaborators: Collaborators,
    store: ManualStateStore,
}

impl Authorizer {
    pub fn new(collaborators: Collaborators, store: ManualStateStore) -> Self {
        Self {
            collaborators,
            store,
        }
    }

    /// Run an authorization flow to completion and return the refresh token
    ///
    /// The request timeout bounds everything downstream; `cancel` lets the
    /// caller abort early (both tear down any callback server).
    pub async fn authorize(
        &self,
        req: &AuthorizeRequest,
        cancel: CancellationToken,
    ) -> AppResult<String> {
        validate_request(req)?;

        let credentials = self.collaborators.credentials.read(&req.client).await?;

        info!(
            client = %req.client,
            manual = req.manual,
            "Starting authorization flow"
        );

        // Pre-supplied inputs only make sense in the manual flow
        let manual = req.manual || req.code.is_some() || req.redirect_url.is_some();

        let flow = async {
            if manual {
                manual_flow::run(
                    req,
                    &credentials,
                    &self.store,
                    &self.collaborators,
                    cancel.clone(),
                )
                .await
            } else {
                server_flow::run(req, &credentials, &self.collaborators, cancel.clone()).await
            }
        };

        match tokio::time::timeout(req.timeout, flow).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout),
        }
    }

    /// Compute the manual authorization URL without prompting or blocking
    ///
    /// Reuses an in-flight attempt when one matches, otherwise creates and
    /// persists a fresh one; `reused` reports which happened.
    pub async fn manual_auth_url(
        &self,
        client: &str,
        scopes: &[String],
        force_consent: bool,
    ) -> AppResult<ManualAuthUrl> {
        if scopes.is_empty() {
            return Err(AppError::InvalidParams(
                "at least one scope is required".to_string(),
            ));
        }

        let credentials = self.collaborators.credentials.read(client).await?;
        manual_flow::auth_url(&credentials, &self.store, client, scopes, force_consent).await
    }
}

fn validate_request(req: &AuthorizeRequest) -> AppResult<()> {
    if req.scopes.is_empty() {
        return Err(AppError::InvalidParams(
            "at least one scope is required".to_string(),
        ));
    }
    if req.code.is_some() && req.redirect_url.is_some() {
        return Err(AppError::InvalidParams(
            "an authorization code and a redirect URL are mutually exclusive".to_string(),
        ));
    }
    if req.code.is_some() && req.require_state {
        return Err(AppError::InvalidParams(
            "a bare authorization code carries no state; drop the state requirement or pass the full redirect URL"
                .to_string(),
        ));
    }
    Ok(())
}

//! Code-for-token exchange against the provider's token endpoint

use async_trait::async_trait;
use desk_types::{AppError, AppResult, ClientCredentials, ExchangedTokens};
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, error};

/// Provider token endpoint
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Exchanges an authorization code for tokens
///
/// The exchange must use the exact redirect URI that produced the code;
/// the provider rejects the code otherwise.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(
        &self,
        credentials: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<ExchangedTokens>;
}

/// HTTP token exchanger speaking standard OAuth2 code-exchange semantics
pub struct HttpTokenExchanger {
    client: Client,
    token_url: String,
}

impl HttpTokenExchanger {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            token_url: TOKEN_ENDPOINT.to_string(),
        }
    }

    /// Point the exchanger at a different token endpoint (used in tests)
    pub fn with_token_url(token_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token_url: token_url.into(),
        }
    }
}

impl Default for HttpTokenExchanger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchanger {
    async fn exchange(
        &self,
        credentials: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<ExchangedTokens> {
        debug!("Exchanging authorization code at {}", self.token_url);

        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), "authorization_code".to_string());
        params.insert("code".to_string(), code.to_string());
        params.insert("redirect_uri".to_string(), redirect_uri.to_string());
        params.insert("client_id".to_string(), credentials.client_id.clone());
        if !credentials.client_secret.is_empty() {
            params.insert(
                "client_secret".to_string(),
                credentials.client_secret.clone(),
            );
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Exchange(format!("Failed to send token request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(AppError::Exchange(format!(
                "provider returned status {}: {}",
                status, body
            )));
        }

        let tokens: ExchangedTokens = response
            .json()
            .await
            .map_err(|e| AppError::Exchange(format!("Failed to parse token response: {}", e)))?;

        debug!("Token exchange succeeded");

        Ok(tokens)
    }
}

/// Pull the refresh token out of an exchange result
///
/// An empty or absent refresh token is a hard failure: the provider
/// withheld offline access, which usually means the user must re-consent.
pub fn require_refresh_token(tokens: ExchangedTokens) -> AppResult<String> {
    tokens
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or(AppError::NoRefreshToken)
}

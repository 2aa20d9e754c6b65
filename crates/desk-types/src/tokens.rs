//! Shared credential and token types

use serde::{Deserialize, Serialize};

/// OAuth client credentials registered with the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// Client identifier issued by the provider
    pub client_id: String,

    /// Client secret (empty for public clients)
    #[serde(default)]
    pub client_secret: String,
}

/// Tokens returned by a successful code-for-token exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangedTokens {
    /// Short-lived access token
    pub access_token: String,

    /// Long-lived refresh token (absent when the provider withheld
    /// offline access)
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Granted scope, space-joined
    #[serde(default)]
    pub scope: Option<String>,
}

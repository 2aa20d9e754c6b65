//! Settings file with named OAuth client credential entries
//!
//! The settings file is YAML at `<config>/settings.yaml`:
//!
//! ```yaml
//! clients:
//!   default:
//!     client_id: "1234.apps.example.com"
//!     client_secret: "shhh"
//!   work:
//!     client_id: "5678.apps.example.com"
//! ```
//!
//! For the `default` client the `DESKCLI_CLIENT_ID` / `DESKCLI_CLIENT_SECRET`
//! environment variables take precedence over the file.

use desk_types::{AppError, AppResult, ClientCredentials};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Top-level settings file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Named OAuth client credential entries
    #[serde(default)]
    pub clients: HashMap<String, ClientCredentials>,
}

impl Settings {
    /// Load settings from a YAML file; a missing file yields empty settings
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Read credentials for a named client
///
/// Environment variables win for the `default` client so scripted use never
/// needs a settings file.
pub fn read_client_credentials(settings: &Settings, client: &str) -> AppResult<ClientCredentials> {
    if client == "default" {
        if let Ok(client_id) = std::env::var("DESKCLI_CLIENT_ID") {
            return Ok(ClientCredentials {
                client_id,
                client_secret: std::env::var("DESKCLI_CLIENT_SECRET").unwrap_or_default(),
            });
        }
    }

    settings.clients.get(client).cloned().ok_or_else(|| {
        AppError::Credentials(format!(
            "No credentials configured for client '{}'; add it to settings.yaml",
            client
        ))
    })
}

//! Production collaborators wired into the authorization engine

use async_trait::async_trait;
use desk_auth::{BrowserOpener, CredentialReader, LinePrompt};
use desk_config::settings::{read_client_credentials, Settings};
use desk_types::{AppError, AppResult, ClientCredentials};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Reads credentials from the settings file (with env override for the
/// `default` client)
pub struct SettingsCredentialReader {
    settings_path: PathBuf,
}

impl SettingsCredentialReader {
    pub fn new(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }
}

#[async_trait]
impl CredentialReader for SettingsCredentialReader {
    async fn read(&self, client: &str) -> AppResult<ClientCredentials> {
        // Re-read on every call so edits to settings.yaml take effect
        // without restarting.
        let settings = Settings::load(&self.settings_path)?;
        read_client_credentials(&settings, client)
    }
}

/// Opens URLs with the platform's default browser
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> AppResult<()> {
        open::that(url).map_err(|e| AppError::Flow(format!("Failed to open browser: {}", e)))
    }
}

/// Prompts on stderr and reads one line from stdin
pub struct StdinPrompt;

#[async_trait]
impl LinePrompt for StdinPrompt {
    async fn prompt_line(&self, message: &str) -> AppResult<Option<String>> {
        let message = message.to_string();
        // Blocking stdin read off the async runtime
        tokio::task::spawn_blocking(move || -> AppResult<Option<String>> {
            let mut stderr = std::io::stderr();
            write!(stderr, "{}", message)?;
            stderr.flush()?;

            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            if read == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        })
        .await
        .map_err(|e| AppError::Flow(format!("Prompt task failed: {}", e)))?
    }
}

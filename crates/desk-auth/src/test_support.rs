//! Shared test doubles for the flow tests

use crate::authorize::{
    Authorizer, BrowserOpener, Collaborators, CredentialReader, LinePrompt,
};
use crate::exchange::TokenExchange;
use crate::state_store::ManualStateStore;
use async_trait::async_trait;
use desk_types::{AppResult, ClientCredentials, ExchangedTokens};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Always returns credentials derived from the client name
pub struct StaticCredentials;

#[async_trait]
impl CredentialReader for StaticCredentials {
    async fn read(&self, client: &str) -> AppResult<ClientCredentials> {
        Ok(ClientCredentials {
            client_id: format!("{}-client-id", client),
            client_secret: "secret".to_string(),
        })
    }
}

/// One recorded call into [`MockExchanger`]
#[derive(Debug, Clone)]
pub struct ExchangeCall {
    pub code: String,
    pub redirect_uri: String,
}

/// Canned token exchanger that records every call
#[derive(Clone)]
pub struct MockExchanger {
    refresh_token: Option<String>,
    calls: Arc<Mutex<Vec<ExchangeCall>>>,
}

impl MockExchanger {
    pub fn with_refresh_token(token: &str) -> Self {
        Self {
            refresh_token: Some(token.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_refresh_token() -> Self {
        Self {
            refresh_token: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<ExchangeCall>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl TokenExchange for MockExchanger {
    async fn exchange(
        &self,
        _credentials: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<ExchangedTokens> {
        self.calls.lock().unwrap().push(ExchangeCall {
            code: code.to_string(),
            redirect_uri: redirect_uri.to_string(),
        });
        Ok(ExchangedTokens {
            access_token: "test-access-token".to_string(),
            refresh_token: self.refresh_token.clone(),
            expires_in: Some(3599),
            scope: None,
        })
    }
}

/// Captures the URL a flow would have opened instead of opening it
#[derive(Default)]
pub struct CaptureBrowser {
    pub url: Arc<Mutex<Option<String>>>,
}

impl BrowserOpener for CaptureBrowser {
    fn open(&self, url: &str) -> AppResult<()> {
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }
}

/// Browser opener for tests that never reach the browser
struct NoBrowser;

impl BrowserOpener for NoBrowser {
    fn open(&self, _url: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Serves pre-scripted lines; `None` entries and exhaustion mean end of input
pub struct ScriptedPrompt {
    lines: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedPrompt {
    pub fn with_lines(lines: Vec<Option<String>>) -> Self {
        Self {
            lines: Mutex::new(lines.into()),
        }
    }

    pub fn eof() -> Self {
        Self::with_lines(vec![])
    }
}

#[async_trait]
impl LinePrompt for ScriptedPrompt {
    async fn prompt_line(&self, _message: &str) -> AppResult<Option<String>> {
        Ok(self.lines.lock().unwrap().pop_front().flatten())
    }
}

/// Prompt that never resolves, like a user who walked away mid-flow
pub struct PendingPrompt;

#[async_trait]
impl LinePrompt for PendingPrompt {
    async fn prompt_line(&self, _message: &str) -> AppResult<Option<String>> {
        std::future::pending().await
    }
}

pub fn store_for(dir: &TempDir) -> ManualStateStore {
    ManualStateStore::new(dir.path().to_path_buf())
}

fn build_authorizer(
    exchanger: MockExchanger,
    browser: Arc<dyn BrowserOpener>,
    prompt: Arc<dyn LinePrompt>,
    dir: TempDir,
) -> (Authorizer, TempDir) {
    let collaborators = Collaborators {
        credentials: Arc::new(StaticCredentials),
        exchanger: Arc::new(exchanger),
        browser,
        prompt,
    };
    let authorizer = Authorizer::new(collaborators, store_for(&dir));
    (authorizer, dir)
}

/// Authorizer over a fresh temp store with inert browser and prompt
pub fn test_authorizer(exchanger: MockExchanger) -> (Authorizer, TempDir) {
    build_authorizer(
        exchanger,
        Arc::new(NoBrowser),
        Arc::new(ScriptedPrompt::eof()),
        tempfile::tempdir().unwrap(),
    )
}

/// Authorizer whose browser opens are captured for inspection
pub fn test_authorizer_with_browser(
    exchanger: MockExchanger,
    browser: Arc<CaptureBrowser>,
) -> (Authorizer, TempDir) {
    build_authorizer(
        exchanger,
        browser,
        Arc::new(ScriptedPrompt::eof()),
        tempfile::tempdir().unwrap(),
    )
}

/// Authorizer with a caller-supplied prompt, over a caller-provided store
/// directory
pub fn test_authorizer_with_prompt(
    exchanger: MockExchanger,
    prompt: Arc<dyn LinePrompt>,
    dir: TempDir,
) -> (Authorizer, TempDir) {
    build_authorizer(exchanger, Arc::new(NoBrowser), prompt, dir)
}

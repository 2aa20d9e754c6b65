//! Local-server authorization flow
//!
//! Spins up a temporary HTTP server on a loopback port, sends the user to
//! the authorization URL, and races three outcome sources: the callback
//! delivering a code, the callback delivering a fatal error, and external
//! cancellation. Each signal channel has capacity one and drops later
//! sends; only one callback hit is expected, and only the first signal per
//! source can matter.

use crate::auth_url::{auth_url_banner, build_authorization_url};
use crate::authorize::{AuthorizeRequest, Collaborators};
use crate::exchange::require_refresh_token;
use crate::pages;
use crate::redirect::CALLBACK_PATH;
use crate::state::generate_state_token;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use desk_types::{AppError, AppResult, ClientCredentials};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long the success page stays reachable after the code is captured,
/// so the browser is not left on a dead connection. The caller proceeds to
/// the token exchange immediately; a detached task does the shutdown.
const SUCCESS_PAGE_GRACE: Duration = Duration::from_secs(30);

/// Shared state for the callback handler
#[derive(Clone)]
struct CallbackContext {
    expected_state: String,
    code_tx: mpsc::Sender<String>,
    error_tx: mpsc::Sender<AppError>,
}

/// Run the local-server flow to completion and return the refresh token
pub async fn run(
    req: &AuthorizeRequest,
    credentials: &ClientCredentials,
    collaborators: &Collaborators,
    cancel: CancellationToken,
) -> AppResult<String> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| AppError::Flow(format!("Failed to bind loopback listener: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| AppError::Flow(format!("Failed to read listener address: {}", e)))?
        .port();
    let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);

    // Fresh state on every invocation; local-server state is never reused.
    let state = generate_state_token();

    let (code_tx, mut code_rx) = mpsc::channel::<String>(1);
    let (error_tx, mut error_rx) = mpsc::channel::<AppError>(1);

    // Any path other than CALLBACK_PATH gets axum's default 404.
    let router = Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .with_state(CallbackContext {
            expected_state: state.clone(),
            code_tx,
            error_tx,
        });

    let server_cancel = CancellationToken::new();
    // If the orchestrator deadline drops this future mid-wait, the guard
    // still tears the server down.
    let guard = server_cancel.clone().drop_guard();

    let shutdown = server_cancel.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        {
            warn!("Callback server error: {}", e);
        }
    });

    let auth_url = build_authorization_url(
        &credentials.client_id,
        &req.scopes,
        &redirect_uri,
        &state,
        req.force_consent,
    );

    // Stdout is reserved for the refresh token; user guidance goes to stderr.
    eprintln!("{}", auth_url_banner(&auth_url));
    if let Err(e) = collaborators.browser.open(&auth_url) {
        warn!("Could not open browser automatically: {}", e);
    }

    info!("Waiting for authorization callback on {}", redirect_uri);

    // First outcome wins.
    let outcome = tokio::select! {
        code = code_rx.recv() => {
            code.ok_or_else(|| AppError::Flow("Callback channel closed".to_string()))
        }
        err = error_rx.recv() => {
            Err(err.unwrap_or_else(|| AppError::Flow("Callback channel closed".to_string())))
        }
        _ = cancel.cancelled() => Err(AppError::Cancelled),
    };

    match outcome {
        Ok(code) => {
            let server_cancel = guard.disarm();
            tokio::spawn(async move {
                tokio::time::sleep(SUCCESS_PAGE_GRACE).await;
                server_cancel.cancel();
                let _ = server.await;
            });

            debug!("Authorization code received, exchanging for tokens");
            let tokens = collaborators
                .exchanger
                .exchange(credentials, &code, &redirect_uri)
                .await?;
            require_refresh_token(tokens)
        }
        Err(e) => {
            drop(guard);
            let _ = server.await;
            Err(e)
        }
    }
}

/// Handle the provider's redirect back to the loopback endpoint
async fn handle_callback(
    State(ctx): State<CallbackContext>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    if let Some(provider_error) = params.get("error") {
        let _ = ctx
            .error_tx
            .try_send(AppError::AuthorizationDenied(provider_error.clone()));
        return (StatusCode::OK, Html(pages::CANCELLED_PAGE));
    }

    match params.get("state") {
        Some(state) if *state == ctx.expected_state => {}
        returned => {
            // Possible CSRF; never exchange a code from a mismatched state.
            let _ = ctx.error_tx.try_send(AppError::StateMismatch(format!(
                "callback state {:?} does not match the issued state",
                returned
            )));
            return (StatusCode::BAD_REQUEST, Html(pages::ERROR_PAGE));
        }
    }

    match params.get("code") {
        Some(code) if !code.is_empty() => {
            // Capacity-one channel: only the first code is recorded, later
            // hits are dropped on the floor.
            let _ = ctx.code_tx.try_send(code.clone());
            (StatusCode::OK, Html(pages::SUCCESS_PAGE))
        }
        _ => {
            let _ = ctx.error_tx.try_send(AppError::MissingCode);
            (StatusCode::BAD_REQUEST, Html(pages::ERROR_PAGE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        test_authorizer, test_authorizer_with_browser, CaptureBrowser, MockExchanger,
    };
    use std::sync::Arc;

    fn context() -> (CallbackContext, mpsc::Receiver<String>, mpsc::Receiver<AppError>) {
        let (code_tx, code_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        (
            CallbackContext {
                expected_state: "expected".to_string(),
                code_tx,
                error_tx,
            },
            code_rx,
            error_rx,
        )
    }

    fn query(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_callback_captures_code_once() {
        let (ctx, mut code_rx, _error_rx) = context();

        let (status, _) = handle_callback(
            State(ctx.clone()),
            query(&[("state", "expected"), ("code", "first")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Second hit: the slot is full, the later code is discarded
        let (status, _) = handle_callback(
            State(ctx),
            query(&[("state", "expected"), ("code", "second")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(code_rx.recv().await.unwrap(), "first");
        assert!(code_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_never_captures_code() {
        let (ctx, mut code_rx, mut error_rx) = context();

        let (status, _) = handle_callback(
            State(ctx),
            query(&[("state", "forged"), ("code", "abc")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(code_rx.try_recv().is_err());
        assert!(matches!(
            error_rx.recv().await.unwrap(),
            AppError::StateMismatch(_)
        ));
    }

    #[tokio::test]
    async fn test_callback_missing_code() {
        let (ctx, _code_rx, mut error_rx) = context();

        let (status, _) = handle_callback(State(ctx), query(&[("state", "expected")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(matches!(
            error_rx.recv().await.unwrap(),
            AppError::MissingCode
        ));
    }

    #[tokio::test]
    async fn test_callback_provider_error() {
        let (ctx, _code_rx, mut error_rx) = context();

        let (status, _) =
            handle_callback(State(ctx), query(&[("error", "access_denied")])).await;
        assert_eq!(status, StatusCode::OK);

        match error_rx.recv().await.unwrap() {
            AppError::AuthorizationDenied(msg) => assert_eq!(msg, "access_denied"),
            other => panic!("unexpected error: {other}"),
        }
    }

    async fn captured_auth_url(browser: &CaptureBrowser) -> String {
        for _ in 0..200 {
            if let Some(url) = browser.url.lock().unwrap().clone() {
                return url;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("browser was never opened");
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let parsed = reqwest::Url::parse(url).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn test_full_flow_over_loopback() {
        let exchanger = MockExchanger::with_refresh_token("rt");
        let calls = exchanger.calls();
        let browser = Arc::new(CaptureBrowser::default());
        let (authorizer, _dir) = test_authorizer_with_browser(exchanger, browser.clone());

        let req = AuthorizeRequest::new("default", vec!["drive.readonly".to_string()]);
        let handle: tokio::task::JoinHandle<desk_types::AppResult<String>> =
            tokio::spawn(async move {
                authorizer
                    .authorize(&req, CancellationToken::new())
                    .await
            });

        let auth_url = captured_auth_url(&browser).await;
        let redirect_uri = query_param(&auth_url, "redirect_uri").unwrap();
        let state = query_param(&auth_url, "state").unwrap();

        let resp = reqwest::get(format!("{}?state={}&code=abc123", redirect_uri, state))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        let token = handle.await.unwrap().unwrap();
        assert_eq!(token, "rt");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].code, "abc123");
        assert_eq!(calls[0].redirect_uri, redirect_uri);
    }

    #[tokio::test]
    async fn test_forged_state_fails_without_exchange() {
        let exchanger = MockExchanger::with_refresh_token("rt");
        let calls = exchanger.calls();
        let browser = Arc::new(CaptureBrowser::default());
        let (authorizer, _dir) = test_authorizer_with_browser(exchanger, browser.clone());

        let req = AuthorizeRequest::new("default", vec!["drive.readonly".to_string()]);
        let handle = tokio::spawn(async move {
            authorizer.authorize(&req, CancellationToken::new()).await
        });

        let auth_url = captured_auth_url(&browser).await;
        let redirect_uri = query_param(&auth_url, "redirect_uri").unwrap();

        let resp = reqwest::get(format!("{}?state=forged&code=abc123", redirect_uri))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::StateMismatch(_)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_tears_down_flow() {
        let (authorizer, _dir) = test_authorizer(MockExchanger::with_refresh_token("rt"));
        let req = AuthorizeRequest::new("default", vec!["drive.readonly".to_string()]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = authorizer.authorize(&req, cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }

    #[tokio::test]
    async fn test_flow_timeout() {
        let (authorizer, _dir) = test_authorizer(MockExchanger::with_refresh_token("rt"));
        let mut req = AuthorizeRequest::new("default", vec!["drive.readonly".to_string()]);
        req.timeout = Duration::from_millis(50);

        let err = authorizer
            .authorize(&req, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_distinct() {
        let exchanger = MockExchanger::without_refresh_token();
        let browser = Arc::new(CaptureBrowser::default());
        let (authorizer, _dir) = test_authorizer_with_browser(exchanger, browser.clone());

        let req = AuthorizeRequest::new("default", vec!["drive.readonly".to_string()]);
        let handle = tokio::spawn(async move {
            authorizer.authorize(&req, CancellationToken::new()).await
        });

        let auth_url = captured_auth_url(&browser).await;
        let redirect_uri = query_param(&auth_url, "redirect_uri").unwrap();
        let state = query_param(&auth_url, "state").unwrap();

        reqwest::get(format!("{}?state={}&code=abc", redirect_uri, state))
            .await
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::NoRefreshToken));
    }
}

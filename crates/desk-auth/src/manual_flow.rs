//! Manual authorization flow
//!
//! For environments without a reachable loopback endpoint: the user visits
//! the authorization URL out-of-band and pastes the resulting redirect URL
//! back, or supplies a code/redirect URL up front. In-flight attempts are
//! persisted so a retry reuses the same state token and redirect URI
//! instead of invalidating a previous authorization URL.

use crate::auth_url::{auth_url_banner, build_authorization_url};
use crate::authorize::{AuthorizeRequest, Collaborators};
use crate::exchange::require_refresh_token;
use crate::redirect::allocate_redirect_uri;
use crate::state::generate_state_token;
use crate::state_store::{sorted_scopes, ManualAuthState, ManualStateStore};
use desk_types::{AppError, AppResult, ClientCredentials};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Best-effort default when no redirect URI can be determined from any
/// source. The exchange fails if this guess does not match what actually
/// produced the code.
pub const FALLBACK_REDIRECT_URI: &str = "http://127.0.0.1:8080/oauth2/callback";

/// Authorization URL for a manual attempt, without prompting
#[derive(Debug, Clone)]
pub struct ManualAuthUrl {
    /// URL the user must visit
    pub auth_url: String,

    /// State token of the attempt backing this URL
    pub state: String,

    /// Redirect URI issued for the attempt
    pub redirect_uri: String,

    /// Whether an existing in-flight attempt was reused
    pub reused: bool,
}

/// Run the manual flow to completion and return the refresh token
pub async fn run(
    req: &AuthorizeRequest,
    credentials: &ClientCredentials,
    store: &ManualStateStore,
    collaborators: &Collaborators,
    cancel: CancellationToken,
) -> AppResult<String> {
    if req.code.is_some() || req.redirect_url.is_some() {
        run_presupplied(req, credentials, store, collaborators, cancel).await
    } else {
        run_interactive(req, credentials, store, collaborators, cancel).await
    }
}

/// Sub-mode A: the caller already holds a redirect URL or a bare code
async fn run_presupplied(
    req: &AuthorizeRequest,
    credentials: &ClientCredentials,
    store: &ManualStateStore,
    collaborators: &Collaborators,
    cancel: CancellationToken,
) -> AppResult<String> {
    let (code, returned_state, inbound_redirect) = match &req.redirect_url {
        Some(raw) => {
            let parsed = parse_redirect_url(raw)?;
            let code = parsed.code.ok_or(AppError::MissingCode)?;
            (code, parsed.state, Some(parsed.base))
        }
        None => {
            // Validation upstream guarantees the code is present here and
            // that require_state was not combined with a bare code.
            let code = req
                .code
                .clone()
                .ok_or_else(|| AppError::InvalidParams("missing authorization code".to_string()))?;
            (code, None, None)
        }
    };

    let stored = match &returned_state {
        Some(state) => {
            Some(validate_returned_state(store, req, state, inbound_redirect.as_deref()).await?)
        }
        None if req.require_state => return Err(AppError::StateRequired),
        None => None,
    };

    // The provider requires the exchange to use the exact redirect URI that
    // produced the code; prefer the stored one, then the inbound URL.
    let redirect_uri = stored
        .as_ref()
        .map(|record| record.redirect_uri.clone())
        .filter(|uri| !uri.is_empty())
        .or(inbound_redirect)
        .unwrap_or_else(|| {
            warn!(
                "No redirect URI known for this code; falling back to {}",
                FALLBACK_REDIRECT_URI
            );
            FALLBACK_REDIRECT_URI.to_string()
        });

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let tokens = collaborators
        .exchanger
        .exchange(credentials, &code, &redirect_uri)
        .await?;
    let refresh_token = require_refresh_token(tokens)?;

    if let Some(record) = stored {
        // One-shot: a state cannot be replayed after a successful exchange.
        store.clear(&record.state).await?;
    }

    info!("Manual authorization complete for client {}", req.client);

    Ok(refresh_token)
}

/// Sub-mode B: fully interactive paste-back flow
async fn run_interactive(
    req: &AuthorizeRequest,
    credentials: &ClientCredentials,
    store: &ManualStateStore,
    collaborators: &Collaborators,
    cancel: CancellationToken,
) -> AppResult<String> {
    let (state, redirect_uri, reused) =
        obtain_or_create_state(store, &req.client, &req.scopes, req.force_consent).await?;
    if reused {
        info!("Reusing in-flight authorization attempt {}", state);
    }

    let auth_url = build_authorization_url(
        &credentials.client_id,
        &req.scopes,
        &redirect_uri,
        &state,
        req.force_consent,
    );

    // Stdout is reserved for the refresh token; user guidance goes to stderr.
    eprintln!("{}", auth_url_banner(&auth_url));

    // Race the read against external cancellation so a Ctrl-C is not stuck
    // behind a prompt nobody will answer.
    let line = tokio::select! {
        line = collaborators.prompt.prompt_line("Paste the full redirect URL here: ") => line?,
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
    };
    // End of input is a cancellation signal, not a crash.
    let line = line.ok_or(AppError::Cancelled)?;

    let parsed = parse_redirect_url(line.trim())?;
    let code = parsed.code.ok_or(AppError::MissingCode)?;

    match &parsed.state {
        Some(returned) if *returned == state => {}
        Some(_) => {
            return Err(AppError::StateMismatch(
                "returned state does not match the state issued for this attempt".to_string(),
            ))
        }
        None if req.require_state => return Err(AppError::StateRequired),
        None => warn!("Redirect URL carried no state parameter"),
    }

    if let Some(returned) = &parsed.state {
        validate_returned_state(store, req, returned, Some(&parsed.base)).await?;
    }

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let tokens = collaborators
        .exchanger
        .exchange(credentials, &code, &redirect_uri)
        .await?;
    let refresh_token = require_refresh_token(tokens)?;

    store.clear(&state).await?;

    info!("Manual authorization complete for client {}", req.client);

    Ok(refresh_token)
}

/// Compute the authorization URL for a manual attempt
///
/// Pure projection over the same reuse-or-create logic as the interactive
/// flow; never prompts or blocks on input.
pub async fn auth_url(
    credentials: &ClientCredentials,
    store: &ManualStateStore,
    client: &str,
    scopes: &[String],
    force_consent: bool,
) -> AppResult<ManualAuthUrl> {
    let (state, redirect_uri, reused) =
        obtain_or_create_state(store, client, scopes, force_consent).await?;

    let auth_url = build_authorization_url(
        &credentials.client_id,
        scopes,
        &redirect_uri,
        &state,
        force_consent,
    );

    Ok(ManualAuthUrl {
        auth_url,
        state,
        redirect_uri,
        reused,
    })
}

/// Reuse a live in-flight attempt for this key, or create and persist one
async fn obtain_or_create_state(
    store: &ManualStateStore,
    client: &str,
    scopes: &[String],
    force_consent: bool,
) -> AppResult<(String, String, bool)> {
    if let Some(existing) = store.find(client, scopes, force_consent).await? {
        debug!("Found reusable manual auth state {}", existing.state);
        return Ok((existing.state, existing.redirect_uri, true));
    }

    let redirect_uri = allocate_redirect_uri().await?;
    let state = generate_state_token();
    let record = ManualAuthState::new(
        state.clone(),
        client,
        scopes,
        force_consent,
        redirect_uri.clone(),
    );
    store.save(&record).await?;

    Ok((state, redirect_uri, false))
}

/// Check a returned state against the stored in-flight attempts
///
/// The matching record must agree on (client, scopes, force_consent), and
/// on the redirect URI when both sides know one. A missing match is the
/// actionable "run the URL step again" error when state is required, and a
/// generic mismatch otherwise.
async fn validate_returned_state(
    store: &ManualStateStore,
    req: &AuthorizeRequest,
    returned_state: &str,
    inbound_redirect: Option<&str>,
) -> AppResult<ManualAuthState> {
    let wanted = sorted_scopes(&req.scopes);

    let record = match store.load_by_token(returned_state).await? {
        Some(record)
            if record.client == req.client
                && record.scopes == wanted
                && record.force_consent == req.force_consent =>
        {
            record
        }
        _ => {
            return Err(if req.require_state {
                AppError::MissingState
            } else {
                AppError::StateMismatch(
                    "returned state does not match any in-flight authorization".to_string(),
                )
            });
        }
    };

    if let Some(inbound) = inbound_redirect {
        if !record.redirect_uri.is_empty() && record.redirect_uri != inbound {
            return Err(AppError::StateMismatch(format!(
                "redirect URI {} does not match the one issued for this state",
                inbound
            )));
        }
    }

    Ok(record)
}

struct ParsedRedirect {
    code: Option<String>,
    state: Option<String>,
    /// The redirect URL with query and fragment stripped
    base: String,
}

fn parse_redirect_url(raw: &str) -> AppResult<ParsedRedirect> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| AppError::InvalidParams(format!("Invalid redirect URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "state" if !value.is_empty() => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let mut base = url;
    base.set_query(None);
    base.set_fragment(None);

    Ok(ParsedRedirect {
        code,
        state,
        base: base.to_string(),
    })
}

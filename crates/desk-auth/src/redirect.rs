//! Loopback redirect endpoint allocation

use desk_types::{AppError, AppResult};
use tokio::net::TcpListener;

/// Callback path served by the loopback redirect endpoint
pub const CALLBACK_PATH: &str = "/oauth2/callback";

/// Allocate a fresh loopback redirect URI
///
/// Binds an ephemeral port on the loopback interface and immediately
/// releases the listener; the port number, not the connection, is what gets
/// reused. Used to pick the redirect URI for a new manual attempt and by
/// the local-server flow to host the actual callback.
pub async fn allocate_redirect_uri() -> AppResult<String> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| AppError::Flow(format!("Failed to bind loopback listener: {}", e)))?;

    let port = listener
        .local_addr()
        .map_err(|e| AppError::Flow(format!("Failed to read listener address: {}", e)))?
        .port();

    drop(listener);

    Ok(format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH))
}

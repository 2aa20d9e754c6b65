//! Persistent store for in-flight manual authorization attempts
//!
//! Each record lives in its own JSON file named after its state token, so
//! concurrent attempts for distinct keys never conflict. Lookup is a linear
//! directory scan (O(n)); at the expected scale of single-digit concurrent
//! attempts that is fine, and the store API is the seam where an indexed
//! backend could be swapped in.

use chrono::{DateTime, Duration, Utc};
use desk_types::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// How long an in-flight record stays usable. Kept shorter than provider
/// authorization-code expiry so a stale record never produces a
/// believable-but-wrong exchange.
const STATE_TTL_MINUTES: i64 = 10;

/// One in-flight manual authorization attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualAuthState {
    /// Opaque state token, also the record's filename stem
    pub state: String,

    /// Target client identifier
    pub client: String,

    /// Requested scopes, stored sorted for deterministic comparison
    pub scopes: Vec<String>,

    /// Whether the consent screen was forced for this attempt
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_consent: bool,

    /// Redirect URI chosen for this attempt
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub redirect_uri: String,

    /// When the attempt was created
    pub created_at: DateTime<Utc>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl ManualAuthState {
    pub fn new(
        state: impl Into<String>,
        client: impl Into<String>,
        scopes: &[String],
        force_consent: bool,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            client: client.into(),
            scopes: sorted_scopes(scopes),
            force_consent,
            redirect_uri: redirect_uri.into(),
            created_at: Utc::now(),
        }
    }
}

/// Return a sorted copy of a scope set, for order-insensitive comparison
pub fn sorted_scopes(scopes: &[String]) -> Vec<String> {
    let mut sorted = scopes.to_vec();
    sorted.sort();
    sorted
}

/// Pure liveness predicate: a record is live while its age is under the TTL
pub fn is_live(record: &ManualAuthState, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(record.created_at) < Duration::minutes(STATE_TTL_MINUTES)
}

/// File-backed store of manual authorization records
///
/// The store is the sole owner of the record files; callers go through
/// `find` / `save` / `load_by_token` / `clear`.
pub struct ManualStateStore {
    dir: PathBuf,
}

impl ManualStateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{}.json", token))
    }

    /// Find the newest live record matching (client, scopes, force_consent)
    ///
    /// Scans every persisted record; entries with an empty redirect URI or
    /// past their TTL never match. Absence of a match is not an error.
    pub async fn find(
        &self,
        client: &str,
        scopes: &[String],
        force_consent: bool,
    ) -> AppResult<Option<ManualAuthState>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let wanted = sorted_scopes(scopes);
        let now = Utc::now();
        let mut best: Option<ManualAuthState> = None;

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to scan state directory: {}", e)))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to scan state directory: {}", e)))?
        {
            let path = entry.path();
            let Some(token) = token_from_path(&path) else {
                continue;
            };
            let Some(record) = self.load_record(&path, &token, now).await? else {
                continue;
            };

            if record.client == client
                && record.scopes == wanted
                && record.force_consent == force_consent
                && !record.redirect_uri.is_empty()
            {
                let newer = best
                    .as_ref()
                    .map(|b| record.created_at > b.created_at)
                    .unwrap_or(true);
                if newer {
                    best = Some(record);
                }
            }
        }

        Ok(best)
    }

    /// Persist a record keyed by its state token
    ///
    /// Writes atomically (temp file, then rename) with owner-only
    /// permissions, so a crash never leaves a partial record behind.
    pub async fn save(&self, record: &ManualAuthState) -> AppResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create state directory: {}", e)))?;

        let mut normalized = record.clone();
        normalized.scopes = sorted_scopes(&record.scopes);

        let mut content = serde_json::to_string_pretty(&normalized)
            .map_err(|e| AppError::Storage(format!("Failed to serialize state record: {}", e)))?;
        content.push('\n');

        let path = self.record_path(&record.state);
        let tmp = self.dir.join(format!(".{}.json.tmp", record.state));

        fs::write(&tmp, content)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write state record: {}", e)))?;

        // Set file permissions to 0600 (owner read/write only) on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&tmp)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to get file metadata: {}", e)))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&tmp, perms)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to set file permissions: {}", e)))?;
        }

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to commit state record: {}", e)))?;

        debug!("Saved manual auth state {}", record.state);

        Ok(())
    }

    /// Direct lookup by state token
    ///
    /// Corrupt or expired records are deleted and reported as "not found";
    /// only I/O failures unrelated to record validity propagate.
    pub async fn load_by_token(&self, token: &str) -> AppResult<Option<ManualAuthState>> {
        if !is_token_shaped(token) {
            return Ok(None);
        }
        self.load_record(&self.record_path(token), token, Utc::now())
            .await
    }

    /// Delete a record by token; deleting a nonexistent record is not an error
    pub async fn clear(&self, token: &str) -> AppResult<()> {
        match fs::remove_file(self.record_path(token)).await {
            Ok(()) => {
                debug!("Cleared manual auth state {}", token);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete state record: {}",
                e
            ))),
        }
    }

    async fn load_record(
        &self,
        path: &Path,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ManualAuthState>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read state record {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let record: ManualAuthState = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Removing corrupt state record {}: {}", path.display(), e);
                self.remove_quietly(path).await;
                return Ok(None);
            }
        };

        if record.state != token {
            warn!(
                "Removing state record {} whose token does not match its filename",
                path.display()
            );
            self.remove_quietly(path).await;
            return Ok(None);
        }

        if !is_live(&record, now) {
            debug!("Purging expired state record {}", token);
            self.remove_quietly(path).await;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn remove_quietly(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove state record {}: {}", path.display(), e);
            }
        }
    }
}

/// Extract a state token from a record filename, rejecting anything that is
/// not a plain `<token>.json` entry (temp files, strays)
fn token_from_path(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if !is_token_shaped(stem) {
        return None;
    }
    Some(stem.to_string())
}

/// Tokens are base64url: ASCII alphanumerics plus `-` and `_`
fn is_token_shaped(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

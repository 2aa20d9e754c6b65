//! Authorization URL construction

/// Provider authorization endpoint
pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Build the authorization URL the user must visit
///
/// Always requests offline access and incremental scope granting; adds
/// `prompt=consent` only when the caller forces the consent screen (needed
/// to guarantee a fresh refresh token).
pub fn build_authorization_url(
    client_id: &str,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
    force_consent: bool,
) -> String {
    let scope = scopes.join(" ");
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code&access_type=offline&include_granted_scopes=true",
        AUTH_ENDPOINT,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scope),
        urlencoding::encode(state),
    );

    if force_consent {
        url.push_str("&prompt=consent");
    }

    url
}

/// Banner pointing the user at the authorization URL
///
/// Printed to stderr by the flows; stdout is reserved for the refresh
/// token so scripted capture stays clean.
pub(crate) fn auth_url_banner(url: &str) -> String {
    format!("Open this URL in your browser to authorize:\n\n  {}\n", url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_authorization_url() {
        let url = build_authorization_url(
            "test_client",
            &["drive.readonly".to_string(), "slides".to_string()],
            "http://127.0.0.1:9004/oauth2/callback",
            "test_state",
            false,
        );

        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("client_id=test_client"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A9004%2Foauth2%2Fcallback"));
        assert!(url.contains("scope=drive.readonly%20slides"));
        assert!(url.contains("state=test_state"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("include_granted_scopes=true"));
        assert!(!url.contains("prompt=consent"));
    }

    #[test]
    fn test_build_authorization_url_force_consent() {
        let url = build_authorization_url(
            "test_client",
            &["drive.readonly".to_string()],
            "http://127.0.0.1:9004/oauth2/callback",
            "test_state",
            true,
        );

        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn test_auth_url_banner_carries_the_url() {
        let banner = auth_url_banner("https://example.com/auth?state=abc");
        assert!(banner.contains("https://example.com/auth?state=abc"));
        assert!(banner.contains("Open this URL"));
    }
}

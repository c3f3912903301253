//! Authentication: the fixed three-step cookie exchange.
//!
//! 1. GET the site root and pick the `luid` cookie out of the Set-Cookie
//!    headers.
//! 2. POST the credentials to the login endpoint with that cookie attached.
//! 3. Pick `ljloggedin` and `ljmastersession` out of the login response;
//!    their absence almost always means wrong credentials.
//!
//! Each individual request retries through the transport (non-2xx statuses
//! included), but the flow itself never restarts: a failed step aborts the
//! login.

use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};

use crate::config::{inbox_url, login_url, Config};
use crate::error::{ExporterError, Result};
use crate::http::Session;

/// Perform login and return an authenticated session.
pub fn login(config: &Config, username: &str, password: &str) -> Result<Session> {
    tracing::info!(username, "Authenticating");
    let session = Session::new(config)?;

    // Step 1: acquire the luid cookie from the site root.
    let response = session.get(&format!("{}/", config.base_url), &[])?;
    let luid = extract_cookie(response.headers(), "luid").ok_or_else(|| {
        ExporterError::Authentication("failed to acquire luid cookie".to_string())
    })?;
    session.set_cookie("luid", &luid);
    tracing::debug!("luid cookie acquired");

    // Step 2: post credentials.
    let response = session.post_form(
        &login_url(&config.base_url),
        &[("user", username), ("password", password)],
    )?;

    // Step 3: extract the session cookies.
    let ljloggedin = extract_cookie(response.headers(), "ljloggedin");
    let ljmastersession = extract_cookie(response.headers(), "ljmastersession");
    let (Some(ljloggedin), Some(ljmastersession)) = (ljloggedin, ljmastersession) else {
        tracing::error!("Session cookies not found in login response");
        return Err(ExporterError::InvalidCredentials);
    };
    session.set_cookie("ljloggedin", &ljloggedin);
    session.set_cookie("ljmastersession", &ljmastersession);

    tracing::info!(username, "Authentication successful");
    Ok(session)
}

/// Check whether a session is still live with one authenticated GET.
///
/// Never raises; any failure reads as "not valid".
#[must_use]
pub fn validate_session(session: &Session, config: &Config) -> bool {
    session.get(&inbox_url(&config.base_url), &[]).is_ok()
}

/// Extract a cookie value from Set-Cookie headers.
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let pattern = Regex::new(&format!("{name}=([^;]+)")).ok()?;
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| {
            pattern
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

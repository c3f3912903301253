//! Rate-limited HTTP transport with retry logic.
//!
//! All outbound requests funnel through a single [`Session`], which owns the
//! pacing clock: every attempt waits until at least the configured delay has
//! passed since the previous attempt started. Each logical call gets a
//! bounded retry budget with exponential backoff; a non-2xx status counts as
//! a failure exactly like a network error.

use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::cookie::Jar;
use reqwest::Url;

use crate::config::Config;
use crate::error::{ExporterError, Result};

/// Backoff before the second attempt (seconds); doubles per attempt.
const RETRY_BASE_DELAY_SECS: u64 = 1;

/// Cap on the backoff delay between attempts (seconds).
const RETRY_MAX_DELAY_SECS: u64 = 10;

/// HTTP session holding the cookie jar and the global pacing clock.
///
/// The session is deliberately single-threaded: the pacing clock is a plain
/// `Cell`, and only the session itself ever writes it. A concurrent fetcher
/// would have to replace this with a synchronized clock.
#[derive(Debug)]
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    request_delay: Duration,
    retry_attempts: u32,
    last_request: Cell<Option<Instant>>,
}

impl Session {
    /// Create a session from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| ExporterError::InvalidValue {
            field: "base_url",
            value: format!("{} ({e})", config.base_url),
        })?;

        Ok(Self {
            client,
            jar,
            base_url,
            request_delay: Duration::from_secs_f64(config.request_delay_secs),
            retry_attempts: config.retry_attempts.max(1),
            last_request: Cell::new(None),
        })
    }

    /// Make a GET request with rate limiting and retries.
    ///
    /// # Arguments
    /// * `url` - URL to request
    /// * `params` - Query parameters
    pub fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        self.execute("GET", url, || {
            let mut request = self.client.get(url);
            if !params.is_empty() {
                request = request.query(params);
            }
            request
        })
    }

    /// Make a POST request with a form-encoded body, rate limited and retried.
    pub fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response> {
        self.execute("POST", url, || self.client.post(url).form(form))
    }

    /// Add a cookie to the jar, scoped to the base URL's host.
    pub fn set_cookie(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{name}={value}; Path=/"), &self.base_url);
    }

    /// Run one logical request through the pacing clock and retry budget.
    fn execute<F>(&self, method: &'static str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = String::from("no attempt made");

        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                tracing::debug!(attempt, delay_secs = delay.as_secs(), url, "Retrying after delay");
                thread::sleep(delay);
            }

            self.pace();

            match build().send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    tracing::warn!(
                        status = %status,
                        attempt = attempt + 1,
                        max_attempts = self.retry_attempts,
                        url,
                        "Request returned non-success status"
                    );
                    last_error = format!("HTTP status {status}");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.retry_attempts,
                        url,
                        "Request failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(ExporterError::RetriesExhausted {
            method,
            url: url.to_string(),
            attempts: self.retry_attempts,
            message: last_error,
        })
    }

    /// Block until the configured delay has elapsed since the previous
    /// attempt's start, then mark this attempt's start.
    fn pace(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                thread::sleep(self.request_delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }
}

/// Backoff delay before the given (1-based retry) attempt: 1s, 2s, 4s, 8s,
/// capped at 10s.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = (attempt - 1).min(4);
    Duration::from_secs((RETRY_BASE_DELAY_SECS << exponent).min(RETRY_MAX_DELAY_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session() {
        let config = Config::default();
        assert!(Session::new(&config).is_ok());
    }

    #[test]
    fn test_create_session_bad_base_url() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(Session::new(&config).is_err());
    }

    #[test]
    fn test_backoff_delay_caps_at_ten_seconds() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(10));
        assert_eq!(backoff_delay(20), Duration::from_secs(10));
    }

    #[test]
    fn test_pace_with_zero_delay_does_not_block() {
        let config = Config {
            request_delay_secs: 0.0,
            ..Config::default()
        };
        let session = Session::new(&config).expect("session");

        let start = Instant::now();
        session.pace();
        session.pace();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_pace_enforces_minimum_gap() {
        let config = Config {
            request_delay_secs: 0.05,
            ..Config::default()
        };
        let session = Session::new(&config).expect("session");

        let start = Instant::now();
        session.pace();
        session.pace();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}

//! HTTP transport for the JSON-API sources, with exponential backoff retry.
//!
//! Each API scraper owns one [`HttpTransport`]. The transport owns a pooled
//! `reqwest::Client` carrying the source's fixed header set and maps every
//! failure onto the crate's error taxonomy:
//!
//! - timeout → [`NewsError::Timeout`] carrying the configured deadline
//! - non-2xx status or undecodable body → [`NewsError::Api`]
//! - anything else below HTTP → [`NewsError::Network`]
//!
//! # Retry Strategy
//!
//! [`retry_with_backoff`] retries only retryable errors (network and
//! timeout). The delay before retry `n` (0-based) is
//!
//! ```text
//! delay = min(base_delay * 2^n, max_delay) + random_jitter(0..=jitter)
//! ```
//!
//! With the default zero jitter, three failures followed by a success wait
//! exactly `base`, `2 * base` and `4 * base`.

use super::SessionPhase;
use crate::config::{RetryPolicy, ScraperConfig};
use crate::error::{NewsError, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method};
use serde_json::Value;
use std::fmt;
use std::future::Future;
#[cfg(test)]
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

enum SessionState {
    Uninitialized,
    Active(Client),
    Closed,
}

/// A JSON-over-HTTP session for one upstream source.
///
/// The underlying client is created lazily on the first request (or by
/// [`HttpTransport::init_session`]) and released by [`HttpTransport::close`].
/// Requests after `close` fail with [`NewsError::SessionClosed`] until the
/// session is initialised again.
pub struct HttpTransport {
    source: &'static str,
    headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
    state: Mutex<SessionState>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("phase", &self.phase())
            .finish()
    }
}

impl HttpTransport {
    /// Transport with the shared default headers (user agent, JSON accept,
    /// Korean-first accept-language). Add per-source headers with
    /// [`HttpTransport::with_header`].
    pub fn new(source: &'static str, config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(USER_AGENT.as_str(), &config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.8"),
        );

        Ok(Self {
            source,
            headers,
            timeout: config.request_timeout,
            retry: config.retry.clone(),
            state: Mutex::new(SessionState::Uninitialized),
        })
    }

    /// Add or replace one default header (e.g. `referer`, `origin`).
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NewsError::Validation(format!("invalid header name {name:?}: {e}")))?;
        self.headers.insert(header, header_value(name, value)?);
        Ok(self)
    }

    pub fn phase(&self) -> SessionPhase {
        match &*self.lock_state() {
            SessionState::Uninitialized => SessionPhase::Uninitialized,
            SessionState::Active(_) => SessionPhase::Active,
            SessionState::Closed => SessionPhase::Closed,
        }
    }

    /// Create the client. A no-op while active; re-opens a closed session.
    pub fn init_session(&self) -> Result<()> {
        let mut state = self.lock_state();
        if matches!(*state, SessionState::Active(_)) {
            return Ok(());
        }
        *state = SessionState::Active(self.build_client()?);
        debug!(source = self.source, "http session initialised");
        Ok(())
    }

    /// Drop the client and refuse further requests. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if matches!(*state, SessionState::Active(_)) {
            info!(source = self.source, "http session closed");
        }
        *state = SessionState::Closed;
    }

    /// Scoped use of the session: initialised now, closed when the guard drops,
    /// including on early returns and `?` paths. Scrapers keep their session
    /// open across calls and close it through the registry instead.
    #[cfg(test)]
    pub fn session(&self) -> Result<SessionGuard<'_>> {
        self.init_session()?;
        Ok(SessionGuard { transport: self })
    }

    /// Issue one request and decode the body as JSON.
    #[instrument(level = "debug", skip(self, params), fields(source = self.source))]
    pub async fn request(
        &self,
        url: &str,
        method: Method,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let client = self.client()?;
        let t0 = Instant::now();

        let response = client
            .request(method, url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                truncate_for_log(body.trim(), 200)
            };
            return Err(NewsError::Api {
                endpoint: url.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| self.classify(url, e))?;

        debug!(
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "request ok"
        );
        Ok(payload)
    }

    /// GET `url` with the transport's retry policy.
    pub async fn request_with_retry(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        retry_with_backoff(&self.retry, url, || self.request(url, Method::GET, params)).await
    }

    fn client(&self) -> Result<Client> {
        let mut state = self.lock_state();
        match &*state {
            SessionState::Active(client) => return Ok(client.clone()),
            SessionState::Closed => return Err(NewsError::SessionClosed(self.source.to_string())),
            SessionState::Uninitialized => {}
        }

        let client = self.build_client()?;
        *state = SessionState::Active(client.clone());
        debug!(source = self.source, "http session initialised on first request");
        Ok(client)
    }

    fn build_client(&self) -> Result<Client> {
        Client::builder()
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .build()
            .map_err(|e| NewsError::Network {
                url: self.source.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> NewsError {
        if err.is_timeout() {
            NewsError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else if err.is_decode() {
            NewsError::Api {
                endpoint: url.to_string(),
                status: None,
                message: format!("invalid JSON body: {err}"),
            }
        } else {
            NewsError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Borrow of an active [`HttpTransport`] that closes it on drop.
#[cfg(test)]
pub struct SessionGuard<'a> {
    transport: &'a HttpTransport,
}

#[cfg(test)]
impl Deref for SessionGuard<'_> {
    type Target = HttpTransport;

    fn deref(&self) -> &HttpTransport {
        self.transport
    }
}

#[cfg(test)]
impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// Delay before retry `attempt` (0-based), without jitter.
pub fn backoff_delay(policy: &RetryPolicy, attempt: usize) -> Duration {
    let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
    policy.base_delay.saturating_mul(factor).min(policy.max_delay)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `policy.max_retries` retries are used up. The last error is returned.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        let attempt_t0 = Instant::now();
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                let attempt_dt = attempt_t0.elapsed();
                let total_dt = total_t0.elapsed();

                if attempt >= policy.max_retries {
                    error!(
                        label,
                        attempt = attempt + 1,
                        max = policy.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        kind = e.kind(),
                        error = %e,
                        "request exhausted retries"
                    );
                    return Err(e);
                }

                let mut delay = backoff_delay(policy, attempt);
                let jitter_ms = policy.jitter.as_millis() as u64;
                if jitter_ms > 0 {
                    delay += Duration::from_millis(rng().random_range(0..=jitter_ms));
                }

                warn!(
                    label,
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                    elapsed_ms_total = total_dt.as_millis() as u64,
                    ?delay,
                    kind = e.kind(),
                    error = %e,
                    "request failed; backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// `true` when `payload` is a JSON object holding every key in `required_keys`.
pub fn validate_shape(payload: &Value, required_keys: &[&str]) -> bool {
    payload
        .as_object()
        .is_some_and(|map| required_keys.iter().all(|key| map.contains_key(*key)))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| NewsError::Validation(format!("invalid value for header {name}: {e}")))
}

//! Backend endpoints and the credentialed HTTP client.
//!
//! The session credentials are a cookie jar shared by every request the
//! client makes: the probe and trigger calls go through the jar-backed
//! `reqwest::Client`, and the channel handshake copies the jar's `Cookie`
//! header. Cookies the backend sets on responses are picked up the same way.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

use crate::config::Config;
use crate::constants::CHANNEL_PATH;

/// Base URL plus the HTTP client that carries the session cookie.
#[derive(Debug, Clone)]
pub struct Backend {
    base: Url,
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl Backend {
    /// Build a backend for `base_url`, optionally seeding the cookie jar
    /// with a `name=value` session cookie.
    pub fn new(base_url: &str, session_cookie: Option<&str>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("invalid backend URL: {base_url}"))?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = session_cookie.filter(|c| !c.trim().is_empty()) {
            jar.add_cookie_str(cookie.trim(), &base);
        }

        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { base, client, jar })
    }

    /// Build a backend from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cookie = config
            .has_session_cookie()
            .then_some(config.session_cookie.as_str());
        Self::new(&config.backend_url, cookie, config.request_timeout())
    }

    /// Absolute URL for an HTTP endpoint path such as `/api/status`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// `ws(s)://` URL of the realtime channel.
    pub fn channel_url(&self) -> String {
        crate::ws::http_to_ws_scheme(&self.endpoint(CHANNEL_PATH))
    }

    /// The credentialed HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `Cookie` header value the jar would send to the backend, if any.
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str, cookie: Option<&str>) -> Backend {
        Backend::new(url, cookie, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let b = backend("https://feed.example.com/", None);
        assert_eq!(b.endpoint("/api/status"), "https://feed.example.com/api/status");

        let b = backend("http://localhost:8000", None);
        assert_eq!(b.endpoint("/api/get-data"), "http://localhost:8000/api/get-data");
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let b = backend("https://example.com/app", None);
        assert_eq!(b.endpoint("/login"), "https://example.com/app/login");
    }

    #[test]
    fn test_channel_url_uses_ws_scheme() {
        assert_eq!(
            backend("https://feed.example.com", None).channel_url(),
            "wss://feed.example.com/ws"
        );
        assert_eq!(
            backend("http://127.0.0.1:9000", None).channel_url(),
            "ws://127.0.0.1:9000/ws"
        );
    }

    #[test]
    fn test_cookie_header_from_seeded_cookie() {
        let b = backend("http://localhost:8000", Some("session=abc123"));
        assert_eq!(b.cookie_header().as_deref(), Some("session=abc123"));

        let b = backend("http://localhost:8000", Some("   "));
        assert_eq!(b.cookie_header(), None);
    }

    #[test]
    fn test_invalid_backend_url() {
        assert!(Backend::new("not a url", None, Duration::from_secs(1)).is_err());
    }
}

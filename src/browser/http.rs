//! Static HTTP backend
//!
//! This backend fetches the feed page with a plain GET request and serves the
//! response body as the rendered snapshot. It runs no JavaScript and cannot
//! scroll, so a walk over it sees one window of items and ends through stall
//! detection. It is useful for server-rendered feeds, mirrors, and tests.

use crate::browser::{
    select_all, BrowseError, BrowsingSession, HtmlElement, LaunchOptions, LoadState,
    SessionLauncher,
};
use crate::config::ProxyConfig;
use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = concat!("tagpulse/", env!("CARGO_PKG_VERSION"));

/// Builds an HTTP client for the static backend
///
/// # Arguments
///
/// * `options` - Launch options (user agent, proxy, request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. malformed proxy)
pub fn build_http_client(options: &LaunchOptions) -> Result<Client, reqwest::Error> {
    let user_agent = options
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(options.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &options.proxy {
        builder = builder.proxy(build_proxy(proxy)?);
    }

    builder.build()
}

fn build_proxy(config: &ProxyConfig) -> Result<Proxy, reqwest::Error> {
    let proxy = Proxy::all(config.server.as_str())?;
    Ok(match (&config.username, &config.password) {
        (Some(user), Some(pass)) => proxy.basic_auth(user, pass),
        (Some(user), None) => proxy.basic_auth(user, ""),
        _ => proxy,
    })
}

/// Launches [`StaticSession`]s
#[derive(Debug, Default, Clone)]
pub struct StaticLauncher;

#[async_trait]
impl SessionLauncher for StaticLauncher {
    type Session = StaticSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<StaticSession, BrowseError> {
        if !options.headless {
            tracing::debug!("Static backend has no window; ignoring headed mode");
        }
        let client = build_http_client(options)
            .map_err(|e| BrowseError::Session(format!("failed to build HTTP client: {}", e)))?;
        Ok(StaticSession::new(client))
    }
}

/// A browsing session backed by plain HTTP requests
pub struct StaticSession {
    client: Client,
    current_url: Option<String>,
    body: String,
    closed: bool,
}

impl StaticSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            current_url: None,
            body: String::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), BrowseError> {
        if self.closed {
            return Err(BrowseError::Session("session already closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowsingSession for StaticSession {
    type Element = HtmlElement;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowseError> {
        self.ensure_open()?;
        // A failed navigation leaves an empty page, like a browser would
        self.body.clear();
        self.current_url = Some(url.to_string());

        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(BrowseError::Timeout(timeout)),
            Err(e) if e.is_connect() => {
                return Err(BrowseError::Navigation(format!("connection failed: {}", e)))
            }
            Err(e) => return Err(BrowseError::Navigation(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BrowseError::Navigation(format!(
                "rate limited (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(BrowseError::Navigation(format!("HTTP {}", status.as_u16())));
        }

        self.body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                BrowseError::Timeout(timeout)
            } else {
                BrowseError::Navigation(format!("failed to read body: {}", e))
            }
        })?;

        tracing::trace!("Fetched {} bytes from {}", self.body.len(), url);
        Ok(())
    }

    async fn wait_for_state(
        &mut self,
        _state: LoadState,
        _timeout: Duration,
    ) -> Result<(), BrowseError> {
        // The body is complete once navigate returns
        self.ensure_open()
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<HtmlElement>, BrowseError> {
        self.ensure_open()?;
        select_all(&self.body, selector)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError> {
        self.ensure_open()?;
        tracing::trace!(
            "Scroll requested on static page {:?}; nothing more to load",
            self.current_url
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowseError> {
        self.closed = true;
        self.body.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&LaunchOptions::default()).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let options = LaunchOptions {
            proxy: Some(ProxyConfig {
                server: "http://proxy.local:3128".to_string(),
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
            }),
            ..LaunchOptions::default()
        };
        assert!(build_http_client(&options).is_ok());
    }

    #[tokio::test]
    async fn test_navigate_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><article>a</article><article>b</article></body></html>",
            ))
            .mount(&server)
            .await;

        let mut session = StaticLauncher
            .launch(&LaunchOptions::default())
            .await
            .unwrap();
        session
            .navigate(&format!("{}/feed", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        let items = session.query_all("article").await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(session.query("article").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rate_limited_navigation_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let mut session = StaticSession::new(Client::new());
        let err = session
            .navigate(&server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowseError::Navigation(_)));
        assert!(!err.is_fatal());
        assert!(session.query_all("article").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html></html>")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut session = StaticSession::new(Client::new());
        let err = session
            .navigate(&server.uri(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowseError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let mut session = StaticSession::new(Client::new());
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(matches!(
            session.query_all("article").await,
            Err(BrowseError::Session(_))
        ));
    }
}

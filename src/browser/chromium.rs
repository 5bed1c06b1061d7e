//! Headless Chromium backend
//!
//! Drives a real Chromium instance over the DevTools protocol using
//! `chromiumoxide`. One session owns one browser process and one page.
//! The CDP event handler runs on its own tokio task for the lifetime of the
//! session; if that task ends, the browser is gone and every further call is
//! reported as a session failure.
//!
//! Chromium takes no proxy credentials on its command line. When the proxy
//! has a username, the session turns on request interception and answers
//! proxy authentication challenges itself.

use crate::browser::{
    select_all, BrowseError, BrowsingSession, HtmlElement, LaunchOptions, LoadState,
    SessionLauncher,
};
use crate::config::ProxyConfig;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, AuthChallengeSource,
    ContinueRequestParams, ContinueWithAuthParams, EnableParams, EventAuthRequired,
    EventRequestPaused,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinHandle;

const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";
const READY_STATE_JS: &str = "document.readyState";
const READY_STATE_POLL: Duration = Duration::from_millis(100);

/// Answers authentication challenges with the proxy credentials
///
/// Each request gets the credentials once. A second challenge for the same
/// request means the proxy rejected them, and the request is cancelled.
#[derive(Debug, Clone)]
struct ProxyAuth {
    username: String,
    password: String,
    answered: HashSet<String>,
}

impl ProxyAuth {
    fn from_proxy(proxy: &ProxyConfig) -> Option<Self> {
        let username = proxy.username.clone()?;
        Some(Self {
            username,
            password: proxy.password.clone().unwrap_or_default(),
            answered: HashSet::new(),
        })
    }

    fn respond(
        &mut self,
        request_id: &str,
        source: Option<&AuthChallengeSource>,
    ) -> AuthChallengeResponse {
        if !matches!(source, Some(AuthChallengeSource::Proxy)) {
            return AuthChallengeResponse {
                response: AuthChallengeResponseResponse::Default,
                username: None,
                password: None,
            };
        }

        if !self.answered.insert(request_id.to_string()) {
            tracing::warn!("Proxy rejected the configured credentials");
            return AuthChallengeResponse {
                response: AuthChallengeResponseResponse::CancelAuth,
                username: None,
                password: None,
            };
        }

        AuthChallengeResponse {
            response: AuthChallengeResponseResponse::ProvideCredentials,
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
        }
    }
}

/// Intercepts the page's requests so proxy challenges can be answered
///
/// Paused requests are resumed unchanged. The returned task runs until the
/// page's event streams end or it is aborted.
async fn enable_proxy_auth(page: &Page, mut auth: ProxyAuth) -> Result<JoinHandle<()>, CdpError> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    let mut challenges = page.event_listener::<EventAuthRequired>().await?;
    page.execute(EnableParams {
        patterns: None,
        handle_auth_requests: Some(true),
    })
    .await?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = paused.next() => {
                    let params = ContinueRequestParams::new(event.request_id.clone());
                    if let Err(e) = page.execute(params).await {
                        tracing::trace!("Could not resume intercepted request: {}", e);
                    }
                }
                Some(event) = challenges.next() => {
                    let response = auth.respond(
                        event.request_id.as_ref(),
                        event.auth_challenge.source.as_ref(),
                    );
                    let params = ContinueWithAuthParams {
                        request_id: event.request_id.clone(),
                        auth_challenge_response: response,
                    };
                    if let Err(e) = page.execute(params).await {
                        tracing::debug!("Could not answer auth challenge: {}", e);
                    }
                }
                else => break,
            }
        }
    }))
}

/// Shuts down a browser whose session could not be set up
async fn abandon(mut browser: Browser, handler_task: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close Chromium after launch error: {}", e);
    }
    let _ = browser.wait().await;
    handler_task.abort();
}

/// Launches [`ChromiumSession`]s
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    fn browser_config(options: &LaunchOptions) -> Result<BrowserConfig, BrowseError> {
        let mut builder = BrowserConfig::builder().request_timeout(options.request_timeout);

        if !options.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
        }

        if let Some(agent) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={}", agent));
        }

        builder.build().map_err(BrowseError::Session)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<ChromiumSession, BrowseError> {
        let config = Self::browser_config(options)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowseError::Session(format!("failed to launch Chromium: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                abandon(browser, handler_task).await;
                return Err(BrowseError::Session(format!("failed to open page: {}", e)));
            }
        };

        let auth_task = match options.proxy.as_ref().and_then(ProxyAuth::from_proxy) {
            Some(auth) => match enable_proxy_auth(&page, auth).await {
                Ok(task) => Some(task),
                Err(e) => {
                    abandon(browser, handler_task).await;
                    return Err(BrowseError::Session(format!(
                        "failed to enable proxy authentication: {}",
                        e
                    )));
                }
            },
            None => None,
        };

        tracing::info!(
            "Chromium session started ({}{})",
            if options.headless { "headless" } else { "headed" },
            if auth_task.is_some() { ", proxy auth" } else { "" }
        );

        Ok(ChromiumSession {
            browser,
            page,
            handler_task,
            auth_task,
            closed: false,
        })
    }
}

/// A browsing session on one Chromium page
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    auth_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChromiumSession {
    fn ensure_alive(&self) -> Result<(), BrowseError> {
        if self.closed {
            return Err(BrowseError::Session("session already closed".to_string()));
        }
        if self.handler_task.is_finished() {
            return Err(BrowseError::Session(
                "browser connection lost".to_string(),
            ));
        }
        Ok(())
    }

    /// Maps a CDP error, promoting it to a session failure if the browser died
    fn classify(&self, err: CdpError, timeout: Option<Duration>) -> BrowseError {
        if self.handler_task.is_finished() {
            return BrowseError::Session(format!("browser connection lost: {}", err));
        }
        match (err, timeout) {
            (CdpError::Timeout, Some(limit)) => BrowseError::Timeout(limit),
            (other, _) => BrowseError::Navigation(other.to_string()),
        }
    }

    async fn ready_state(&self) -> Result<String, BrowseError> {
        let result = self
            .page
            .evaluate(READY_STATE_JS)
            .await
            .map_err(|e| self.classify(e, None))?;
        result
            .into_value::<String>()
            .map_err(|e| BrowseError::Navigation(format!("unreadable readyState: {}", e)))
    }

    async fn poll_until(&self, state: LoadState) -> Result<(), BrowseError> {
        loop {
            if state.is_reached(&self.ready_state().await?) {
                return Ok(());
            }
            tokio::time::sleep(READY_STATE_POLL).await;
        }
    }
}

#[async_trait]
impl BrowsingSession for ChromiumSession {
    type Element = HtmlElement;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowseError> {
        self.ensure_alive()?;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(self.classify(e, Some(timeout))),
            Err(_) => Err(BrowseError::Timeout(timeout)),
        }
    }

    async fn wait_for_state(
        &mut self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), BrowseError> {
        self.ensure_alive()?;
        tracing::trace!("Waiting for {:?}", state);
        match tokio::time::timeout(timeout, self.poll_until(state)).await {
            Ok(result) => result,
            Err(_) => Err(BrowseError::Timeout(timeout)),
        }
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<HtmlElement>, BrowseError> {
        self.ensure_alive()?;
        let html = self
            .page
            .content()
            .await
            .map_err(|e| self.classify(e, None))?;
        select_all(&html, selector)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError> {
        self.ensure_alive()?;
        self.page
            .evaluate(SCROLL_TO_BOTTOM_JS)
            .await
            .map(|_| ())
            .map_err(|e| self.classify(e, None))
    }

    async fn close(&mut self) -> Result<(), BrowseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowseError::Session(format!("failed to close Chromium: {}", e)));
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Waiting for Chromium to exit failed: {}", e);
        }
        if let Some(task) = self.auth_task.take() {
            task.abort();
        }
        self.handler_task.abort();
        tracing::info!("Chromium session closed");
        result
    }
}

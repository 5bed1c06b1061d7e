//! Browsing capability used by the crawler
//!
//! The crawler never talks to a browser directly. It drives a
//! [`BrowsingSession`] obtained from a [`SessionLauncher`], and reads items
//! through [`ElementHandle`]s taken from one rendered snapshot of the page.
//!
//! Two backends are provided:
//! - [`chromium`]: headless Chromium over CDP, with real scrolling
//! - [`http`]: plain HTTP GET of the feed page, no JavaScript, no scrolling

pub mod chromium;
pub mod http;
pub mod snapshot;

pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use http::{build_http_client, StaticLauncher, StaticSession};
pub use snapshot::{select_all, HtmlElement};

use crate::config::ProxyConfig;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a browsing backend
///
/// Only [`BrowseError::Session`] is fatal to a crawl; everything else is
/// absorbed by the walker or the extractor.
#[derive(Debug, Clone, Error)]
pub enum BrowseError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element access failed: {0}")]
    Element(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Session failure: {0}")]
    Session(String),
}

impl BrowseError {
    /// Returns true if the session can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

/// Page lifecycle states a session can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
}

impl LoadState {
    /// Returns true if a page whose `document.readyState` is `ready_state`
    /// has reached this state
    pub fn is_reached(self, ready_state: &str) -> bool {
        match self {
            Self::DomContentLoaded => matches!(ready_state, "interactive" | "complete"),
        }
    }
}

/// Options used when a session is created
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub proxy: Option<ProxyConfig>,
    pub user_agent: Option<String>,
    /// Upper bound for a single backend request
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            user_agent: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to one rendered element
///
/// Handles are read from a snapshot, so access is synchronous. Every accessor
/// is fallible; callers decide whether a failure matters.
pub trait ElementHandle: Sized + Send {
    /// Visible text of the element and its descendants
    fn text(&self) -> Result<String, BrowseError>;

    /// Value of an attribute, or `None` if absent
    fn attribute(&self, name: &str) -> Result<Option<String>, BrowseError>;

    /// First descendant matching the selector
    fn query(&self, selector: &str) -> Result<Option<Self>, BrowseError> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    /// All descendants matching the selector, in document order
    fn query_all(&self, selector: &str) -> Result<Vec<Self>, BrowseError>;
}

/// One live browsing context
#[async_trait]
pub trait BrowsingSession: Send {
    type Element: ElementHandle;

    /// Navigates the page to `url`, failing with [`BrowseError::Timeout`]
    /// if it does not commit within `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowseError>;

    /// Waits for the page to reach `state`
    async fn wait_for_state(
        &mut self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), BrowseError>;

    /// All elements matching the selector in the current rendering
    async fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Element>, BrowseError>;

    /// First element matching the selector in the current rendering
    async fn query(&mut self, selector: &str) -> Result<Option<Self::Element>, BrowseError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    /// Scrolls the page to the bottom to trigger loading more content
    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError>;

    /// Releases the session. Safe to call more than once.
    async fn close(&mut self) -> Result<(), BrowseError>;
}

/// Creates browsing sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowsingSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<Self::Session, BrowseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_errors_are_fatal() {
        assert!(BrowseError::Session("crashed".into()).is_fatal());
        assert!(!BrowseError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!BrowseError::Navigation("dns".into()).is_fatal());
        assert!(!BrowseError::Element("detached".into()).is_fatal());
        assert!(!BrowseError::Selector("[[".into()).is_fatal());
    }

    #[test]
    fn test_dom_content_loaded_reached_once_parsed() {
        assert!(!LoadState::DomContentLoaded.is_reached("loading"));
        assert!(LoadState::DomContentLoaded.is_reached("interactive"));
        assert!(LoadState::DomContentLoaded.is_reached("complete"));
        assert!(!LoadState::DomContentLoaded.is_reached(""));
    }
}

//! Scripted browsing fakes for crawler tests
//!
//! A [`ScriptedSession`] serves a fixed list of item batches per feed URL.
//! The batch shown is picked by how many times the page has been scrolled;
//! once the script runs out, the last batch keeps being shown.

use crate::browser::{
    BrowseError, BrowsingSession, ElementHandle, HtmlElement, LaunchOptions, LoadState,
    SessionLauncher,
};
use crate::config::{SourceConfig, TimingConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_ORIGIN: &str = "https://feed.test";

pub fn test_source() -> SourceConfig {
    SourceConfig {
        origin: TEST_ORIGIN.to_string(),
        search_path: "/search?q={tag}".to_string(),
        ..SourceConfig::default()
    }
}

pub fn feed_url(tag: &str) -> String {
    test_source().feed_url(tag)
}

pub fn test_timing() -> TimingConfig {
    TimingConfig::default()
}

/// Markup for one feed item in the shape the default selectors expect
pub fn tweet_html(body: &str, posted_at: Option<&str>) -> String {
    let time = posted_at
        .map(|ts| format!(r#"<time datetime="{}">t</time>"#, ts))
        .unwrap_or_default();
    format!(
        r#"<article><div dir="ltr"><span>author</span></div><div lang="en">{}</div>{}<div data-testid="like" aria-label="3 Likes"></div></article>"#,
        body, time
    )
}

/// Item in a scripted feed
#[derive(Debug, Clone)]
pub enum ScriptedItem {
    Html(HtmlElement),
    /// Every access fails
    Broken,
}

impl ScriptedItem {
    pub fn tweet(body: &str, posted_at: Option<&str>) -> Self {
        Self::Html(HtmlElement::parse(&tweet_html(body, posted_at)).unwrap())
    }
}

impl ElementHandle for ScriptedItem {
    fn text(&self) -> Result<String, BrowseError> {
        match self {
            Self::Html(element) => element.text(),
            Self::Broken => Err(BrowseError::Element("node detached".to_string())),
        }
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, BrowseError> {
        match self {
            Self::Html(element) => element.attribute(name),
            Self::Broken => Err(BrowseError::Element("node detached".to_string())),
        }
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Self>, BrowseError> {
        match self {
            Self::Html(element) => Ok(element
                .query_all(selector)?
                .into_iter()
                .map(Self::Html)
                .collect()),
            Self::Broken => Err(BrowseError::Element("node detached".to_string())),
        }
    }
}

/// Everything a scripted session was asked to do
#[derive(Debug, Default, Clone)]
pub struct SessionLog {
    pub launches: usize,
    pub navigations: Vec<String>,
    pub waits: usize,
    pub queries: usize,
    pub scrolls: usize,
    pub closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    feeds: HashMap<String, Vec<Vec<ScriptedItem>>>,
    navigation_error: Option<BrowseError>,
    wait_error: Option<BrowseError>,
    /// Fail every query from this (1-based) query onward with a session error
    crash_on_query: Option<usize>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batches shown for `tag`, one per scroll position
    pub fn feed(mut self, tag: &str, batches: Vec<Vec<ScriptedItem>>) -> Self {
        self.feeds.insert(feed_url(tag), batches);
        self
    }

    pub fn navigation_error(mut self, err: BrowseError) -> Self {
        self.navigation_error = Some(err);
        self
    }

    pub fn wait_error(mut self, err: BrowseError) -> Self {
        self.wait_error = Some(err);
        self
    }

    pub fn crash_on_query(mut self, query: usize) -> Self {
        self.crash_on_query = Some(query);
        self
    }
}

pub struct ScriptedSession {
    script: Script,
    current: Option<String>,
    scroll_position: usize,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    pub fn new(script: Script) -> Self {
        Self::with_log(script, Arc::new(Mutex::new(SessionLog::default())))
    }

    fn with_log(script: Script, log: Arc<Mutex<SessionLog>>) -> Self {
        Self {
            script,
            current: None,
            scroll_position: 0,
            log,
        }
    }

    pub fn log(&self) -> SessionLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowsingSession for ScriptedSession {
    type Element = ScriptedItem;

    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), BrowseError> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        self.current = Some(url.to_string());
        self.scroll_position = 0;
        match &self.script.navigation_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn wait_for_state(
        &mut self,
        _state: LoadState,
        _timeout: Duration,
    ) -> Result<(), BrowseError> {
        self.log.lock().unwrap().waits += 1;
        match &self.script.wait_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn query_all(&mut self, _selector: &str) -> Result<Vec<ScriptedItem>, BrowseError> {
        let queries = {
            let mut log = self.log.lock().unwrap();
            log.queries += 1;
            log.queries
        };
        if let Some(crash) = self.script.crash_on_query {
            if queries >= crash {
                return Err(BrowseError::Session("browser crashed".to_string()));
            }
        }

        let batches = self
            .current
            .as_ref()
            .and_then(|url| self.script.feeds.get(url));
        Ok(match batches {
            Some(batches) if !batches.is_empty() => {
                let index = self.scroll_position.min(batches.len() - 1);
                batches[index].clone()
            }
            _ => Vec::new(),
        })
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowseError> {
        self.log.lock().unwrap().scrolls += 1;
        self.scroll_position += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowseError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Launches scripted sessions that all write to one shared log
pub struct ScriptedLauncher {
    script: Script,
    fail_launch: bool,
    log: Arc<Mutex<SessionLog>>,
    last_options: Mutex<Option<LaunchOptions>>,
}

impl ScriptedLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            fail_launch: false,
            log: Arc::new(Mutex::new(SessionLog::default())),
            last_options: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(Script::new())
        }
    }

    pub fn log(&self) -> SessionLog {
        self.log.lock().unwrap().clone()
    }

    pub fn last_options(&self) -> Option<LaunchOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    type Session = ScriptedSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<ScriptedSession, BrowseError> {
        *self.last_options.lock().unwrap() = Some(options.clone());
        if self.fail_launch {
            return Err(BrowseError::Session("no browser binary".to_string()));
        }
        self.log.lock().unwrap().launches += 1;
        Ok(ScriptedSession::with_log(
            self.script.clone(),
            Arc::clone(&self.log),
        ))
    }
}

//! In-memory stand-ins for the browser, used by the service tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{SchemeRecord, SearchCriteria};

use super::{
    droid::{BrowserSession, SessionError, SessionProvider},
    page::{SchemePage, Target},
    scheme_scraper::DetailExtractor,
    scheme_searcher::SearchExecutor,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Goto(String),
    WaitFor(Target),
    Click(Target),
    ForceClick(Target),
    Fill(Target, String),
    TypeKeys(Target, String),
    PressEnter(Target),
    Execute(String, Vec<Value>),
    Close,
}

impl PageCall {
    /// Whether any value sent to the page contains `needle`. Script bodies are ignored.
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            PageCall::Goto(text) | PageCall::Fill(_, text) | PageCall::TypeKeys(_, text) => {
                text.contains(needle)
            }
            PageCall::Execute(_, args) => args
                .iter()
                .filter_map(Value::as_str)
                .any(|arg| arg.contains(needle)),
            _ => false,
        }
    }
}

/// A page whose DOM is a fixed list of visible targets and links.
/// Clones share the call log.
#[derive(Clone, Default)]
pub struct ScriptedPage {
    visible: Vec<Target>,
    links: Vec<String>,
    html: String,
    title: String,
    failing_goto: bool,
    script_results: HashMap<String, Value>,
    calls: Arc<Mutex<Vec<PageCall>>>,
    pub closed: Arc<AtomicUsize>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        ScriptedPage::default()
    }

    pub fn with_visible(mut self, target: Target) -> Self {
        self.visible.push(target);
        self
    }

    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn failing_goto(mut self) -> Self {
        self.failing_goto = true;
        self
    }

    /// Overrides what `script` evaluates to. Other scripts return `true`.
    pub fn with_script_result(mut self, script: &str, result: Value) -> Self {
        self.script_results.insert(script.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PageCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn present(&self, target: &Target) -> anyhow::Result<()> {
        if self.visible.contains(target) {
            Ok(())
        } else {
            Err(anyhow!("{:?} not on page", target))
        }
    }
}

#[async_trait]
impl SchemePage for ScriptedPage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.record(PageCall::Goto(url.to_string()));
        if self.failing_goto {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {}", url));
        }
        Ok(())
    }

    async fn title(&self) -> anyhow::Result<String> {
        Ok(self.title.clone())
    }

    async fn source(&self) -> anyhow::Result<String> {
        Ok(self.html.clone())
    }

    async fn is_visible(&self, target: &Target) -> anyhow::Result<bool> {
        Ok(self.visible.contains(target))
    }

    async fn wait_for(&self, target: &Target, _timeout: Duration) -> anyhow::Result<()> {
        self.record(PageCall::WaitFor(target.clone()));
        self.present(target)
    }

    async fn click(&self, target: &Target) -> anyhow::Result<()> {
        self.record(PageCall::Click(target.clone()));
        self.present(target)
    }

    async fn force_click(&self, target: &Target) -> anyhow::Result<()> {
        self.record(PageCall::ForceClick(target.clone()));
        self.present(target)
    }

    async fn fill(&self, target: &Target, value: &str) -> anyhow::Result<()> {
        self.record(PageCall::Fill(target.clone(), value.to_string()));
        self.present(target)
    }

    async fn type_keys(
        &self,
        target: &Target,
        text: &str,
        _delay: Duration,
    ) -> anyhow::Result<()> {
        self.record(PageCall::TypeKeys(target.clone(), text.to_string()));
        self.present(target)
    }

    async fn press_enter(&self, target: &Target) -> anyhow::Result<()> {
        self.record(PageCall::PressEnter(target.clone()));
        self.present(target)
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> anyhow::Result<Value> {
        self.record(PageCall::Execute(script.to_string(), args));
        Ok(self
            .script_results
            .get(script)
            .cloned()
            .unwrap_or(Value::Bool(true)))
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.record(PageCall::Close);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn collect_links(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.links.clone())
    }

    async fn ready_state(&self) -> anyhow::Result<String> {
        Ok("complete".to_string())
    }

    async fn resource_count(&self) -> anyhow::Result<u64> {
        Ok(0)
    }
}

/// Session over a [`ScriptedPage`]. Counts a release when dropped, so an
/// abandoned session is counted the same as a closed one.
#[derive(Default)]
pub struct StubSession {
    page: ScriptedPage,
    tab: ScriptedPage,
    failing_tabs: bool,
    released: Option<Arc<AtomicUsize>>,
}

impl StubSession {
    pub fn new() -> Self {
        StubSession::default()
    }

    pub fn with_tab(tab: ScriptedPage) -> Self {
        StubSession {
            page: ScriptedPage::new(),
            tab,
            failing_tabs: false,
            released: None,
        }
    }

    pub fn failing_tabs(mut self) -> Self {
        self.failing_tabs = true;
        self
    }
}

#[async_trait]
impl BrowserSession for StubSession {
    fn page(&self) -> &dyn SchemePage {
        &self.page
    }

    async fn open_page(&self) -> anyhow::Result<Box<dyn SchemePage>> {
        if self.failing_tabs {
            return Err(anyhow!("Failed to open a new tab"));
        }
        Ok(Box::new(self.tab.clone()))
    }

    async fn close(self: Box<Self>) {}
}

impl Drop for StubSession {
    fn drop(&mut self) {
        if let Some(released) = &self.released {
            released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct StubProvider {
    pub page: ScriptedPage,
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    unavailable: bool,
}

impl StubProvider {
    pub fn new() -> Self {
        StubProvider::with_page(ScriptedPage::new())
    }

    pub fn with_page(page: ScriptedPage) -> Self {
        StubProvider {
            page,
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        StubProvider {
            unavailable: true,
            ..StubProvider::new()
        }
    }
}

#[async_trait]
impl SessionProvider for StubProvider {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        if self.unavailable {
            return Err(SessionError::Unavailable(
                "webdriver not reachable at http://localhost:9515".into(),
            ));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            page: self.page.clone(),
            tab: ScriptedPage::new(),
            failing_tabs: false,
            released: Some(self.released.clone()),
        }))
    }
}

/// Returns the same locators for every criteria and remembers what it was asked.
pub struct FixedSearch {
    locators: Vec<String>,
    seen: Mutex<Vec<SearchCriteria>>,
}

impl FixedSearch {
    pub fn new(locators: Vec<&str>) -> Self {
        FixedSearch {
            locators: locators.into_iter().map(str::to_string).collect(),
            seen: Mutex::new(vec![]),
        }
    }

    pub fn seen(&self) -> Vec<SearchCriteria> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchExecutor for FixedSearch {
    async fn search(&self, _page: &dyn SchemePage, criteria: &SearchCriteria) -> Vec<String> {
        self.seen.lock().unwrap().push(criteria.clone());
        self.locators.clone()
    }
}

/// A search that never finishes.
pub struct StalledSearch;

#[async_trait]
impl SearchExecutor for StalledSearch {
    async fn search(&self, _page: &dyn SchemePage, _criteria: &SearchCriteria) -> Vec<String> {
        std::future::pending::<()>().await;
        vec![]
    }
}

#[derive(Default)]
pub struct CountingExtractor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DetailExtractor for CountingExtractor {
    async fn extract(&self, _session: &dyn BrowserSession, locator: &str) -> SchemeRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SchemeRecord {
            title: format!("Scheme {}", locator),
            url: locator.to_string(),
            description: None,
            eligibility: None,
            benefits: None,
            application_process: None,
            documents_required: None,
        }
    }
}

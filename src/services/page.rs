use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

pub const COLLECT_LINKS_SCRIPT: &str =
    "return Array.from(document.querySelectorAll('a')).map(a => a.href);";
pub const READY_STATE_SCRIPT: &str = "return document.readyState;";
pub const RESOURCE_COUNT_SCRIPT: &str =
    "return performance.getEntriesByType('resource').length;";

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Css(&'static str),
    /// Any element whose own text contains the given string.
    Text(&'static str),
}

/// Everything the searcher and scraper need from a browser page.
///
/// Failures are plain `anyhow` errors; callers decide whether they degrade
/// to empty results or sentinel records.
#[async_trait]
pub trait SchemePage: Send + Sync {
    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    async fn title(&self) -> anyhow::Result<String>;

    async fn source(&self) -> anyhow::Result<String>;

    /// `false` when the element is missing or hidden.
    async fn is_visible(&self, target: &Target) -> anyhow::Result<bool>;

    async fn wait_for(&self, target: &Target, timeout: Duration) -> anyhow::Result<()>;

    async fn click(&self, target: &Target) -> anyhow::Result<()>;

    /// Clicks through a script, bypassing overlays that intercept pointer events.
    async fn force_click(&self, target: &Target) -> anyhow::Result<()>;

    /// Replaces the element's value in one go.
    async fn fill(&self, target: &Target, value: &str) -> anyhow::Result<()>;

    /// Sends `text` one key at a time so input listeners fire per character.
    async fn type_keys(&self, target: &Target, text: &str, delay: Duration)
        -> anyhow::Result<()>;

    async fn press_enter(&self, target: &Target) -> anyhow::Result<()>;

    async fn execute(&self, script: &str, args: Vec<Value>) -> anyhow::Result<Value>;

    async fn close(self: Box<Self>) -> anyhow::Result<()>;

    async fn collect_links(&self) -> anyhow::Result<Vec<String>> {
        let links = self.execute(COLLECT_LINKS_SCRIPT, vec![]).await?;
        serde_json::from_value(links).context("Link collection returned non-string values")
    }

    async fn ready_state(&self) -> anyhow::Result<String> {
        let state = self.execute(READY_STATE_SCRIPT, vec![]).await?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn resource_count(&self) -> anyhow::Result<u64> {
        let count = self.execute(RESOURCE_COUNT_SCRIPT, vec![]).await?;
        Ok(count.as_u64().unwrap_or_default())
    }

    async fn scroll_by(&self, pixels: i64) -> anyhow::Result<()> {
        self.execute(
            "window.scrollBy(0, arguments[0]);",
            vec![Value::from(pixels)],
        )
        .await?;
        Ok(())
    }
}

//! Settling delays and bounded waits for the host site.
//!
//! myscheme.gov.in updates its UI asynchronously without any completion
//! signal, so most synchronisation is a fixed pause. All of them live here.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::time::{sleep, Instant};

use super::page::SchemePage;

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub const PAGE_LOAD_TIMEOUT: Duration = ms(60_000);
pub const NETWORK_IDLE_TIMEOUT: Duration = ms(30_000);
pub const POLL_INTERVAL: Duration = ms(250);

pub const MODAL_TIMEOUT: Duration = ms(10_000);
pub const MODAL_INPUT_TIMEOUT: Duration = ms(8_000);
pub const SIDEBAR_TIMEOUT: Duration = ms(15_000);
pub const FACET_INPUT_TIMEOUT: Duration = ms(5_000);
pub const CATEGORY_CHECKBOX_TIMEOUT: Duration = ms(3_000);

pub const AFTER_PLACEHOLDER_CLICK: Duration = ms(1_000);
pub const BEFORE_TYPING: Duration = ms(300);
pub const KEYSTROKE: Duration = ms(75);
pub const AFTER_TYPING: Duration = ms(1_000);
pub const AFTER_SUBMIT: Duration = ms(4_000);

pub const SEARCH_PAGE_SETTLE: Duration = ms(2_000);
pub const SIDEBAR_SCROLL_SETTLE: Duration = ms(2_000);
pub const SCROLL_SETTLE: Duration = ms(1_000);
pub const OVERLAY_SETTLE: Duration = ms(300);
pub const INPUT_FOCUS_SETTLE: Duration = ms(500);
pub const FACET_COMMIT_SETTLE: Duration = ms(1_000);
pub const CATEGORY_SETTLE: Duration = ms(1_000);
pub const AGE_DROPDOWN_SETTLE: Duration = ms(500);
pub const AGE_SETTLE: Duration = ms(3_000);
pub const RESULTS_SETTLE: Duration = ms(5_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub page_load_timeout: Duration,
    pub network_idle_timeout: Duration,
    pub poll_interval: Duration,

    pub modal_timeout: Duration,
    pub modal_input_timeout: Duration,
    pub sidebar_timeout: Duration,
    pub facet_input_timeout: Duration,
    pub category_checkbox_timeout: Duration,

    pub after_placeholder_click: Duration,
    pub before_typing: Duration,
    pub keystroke: Duration,
    pub after_typing: Duration,
    pub after_submit: Duration,

    pub search_page_settle: Duration,
    pub sidebar_scroll_settle: Duration,
    pub scroll_settle: Duration,
    pub overlay_settle: Duration,
    pub input_focus_settle: Duration,
    pub facet_commit_settle: Duration,
    pub category_settle: Duration,
    pub age_dropdown_settle: Duration,
    pub age_settle: Duration,
    pub results_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            page_load_timeout: PAGE_LOAD_TIMEOUT,
            network_idle_timeout: NETWORK_IDLE_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            modal_timeout: MODAL_TIMEOUT,
            modal_input_timeout: MODAL_INPUT_TIMEOUT,
            sidebar_timeout: SIDEBAR_TIMEOUT,
            facet_input_timeout: FACET_INPUT_TIMEOUT,
            category_checkbox_timeout: CATEGORY_CHECKBOX_TIMEOUT,
            after_placeholder_click: AFTER_PLACEHOLDER_CLICK,
            before_typing: BEFORE_TYPING,
            keystroke: KEYSTROKE,
            after_typing: AFTER_TYPING,
            after_submit: AFTER_SUBMIT,
            search_page_settle: SEARCH_PAGE_SETTLE,
            sidebar_scroll_settle: SIDEBAR_SCROLL_SETTLE,
            scroll_settle: SCROLL_SETTLE,
            overlay_settle: OVERLAY_SETTLE,
            input_focus_settle: INPUT_FOCUS_SETTLE,
            facet_commit_settle: FACET_COMMIT_SETTLE,
            category_settle: CATEGORY_SETTLE,
            age_dropdown_settle: AGE_DROPDOWN_SETTLE,
            age_settle: AGE_SETTLE,
            results_settle: RESULTS_SETTLE,
        }
    }
}

impl Timings {
    /// No pauses at all; waits check their condition once.
    pub fn instant() -> Self {
        Timings {
            page_load_timeout: PAGE_LOAD_TIMEOUT,
            network_idle_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            modal_timeout: Duration::ZERO,
            modal_input_timeout: Duration::ZERO,
            sidebar_timeout: Duration::ZERO,
            facet_input_timeout: Duration::ZERO,
            category_checkbox_timeout: Duration::ZERO,
            after_placeholder_click: Duration::ZERO,
            before_typing: Duration::ZERO,
            keystroke: Duration::ZERO,
            after_typing: Duration::ZERO,
            after_submit: Duration::ZERO,
            search_page_settle: Duration::ZERO,
            sidebar_scroll_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            overlay_settle: Duration::ZERO,
            input_focus_settle: Duration::ZERO,
            facet_commit_settle: Duration::ZERO,
            category_settle: Duration::ZERO,
            age_dropdown_settle: Duration::ZERO,
            age_settle: Duration::ZERO,
            results_settle: Duration::ZERO,
        }
    }
}

pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

/// Polls `condition` until it holds or `timeout` elapses. Checks at least once.
pub async fn wait_until<F, Fut>(timeout: Duration, poll: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        settle(poll).await;
    }
}

pub async fn navigate(page: &dyn SchemePage, url: &str, timeout: Duration) -> anyhow::Result<()> {
    tokio::time::timeout(timeout, page.goto(url))
        .await
        .map_err(|_| anyhow::anyhow!("Navigation to {} timed out after {:?}", url, timeout))?
}

/// Waits until the document has been parsed (`DOMContentLoaded`).
pub async fn wait_for_dom(page: &dyn SchemePage, timings: &Timings) {
    let parsed = wait_until(timings.network_idle_timeout, timings.poll_interval, || async move {
        matches!(
            page.ready_state().await.as_deref(),
            Ok("interactive") | Ok("complete")
        )
    })
    .await;
    if !parsed {
        log::warn!("Document still loading after {:?}", timings.network_idle_timeout);
    }
}

/// Stand-in for a network-idle event: document complete and no new
/// resource entries between two polls. Expiry only gets logged.
pub async fn wait_for_network_idle(page: &dyn SchemePage, timings: &Timings) {
    let deadline = Instant::now() + timings.network_idle_timeout;

    let loaded = wait_until(timings.network_idle_timeout, timings.poll_interval, || async move {
        matches!(page.ready_state().await.as_deref(), Ok("complete"))
    })
    .await;
    if !loaded {
        log::warn!(
            "Document not complete after {:?}, continuing",
            timings.network_idle_timeout
        );
        return;
    }

    // u64::MAX marks "nothing seen yet".
    let seen = AtomicU64::new(u64::MAX);
    let last_count = &seen;
    let remaining = deadline.saturating_duration_since(Instant::now());
    let quiet = wait_until(remaining, timings.poll_interval, || async move {
        match page.resource_count().await {
            Ok(current) => last_count.swap(current, Ordering::Relaxed) == current,
            Err(_) => false,
        }
    })
    .await;
    if !quiet {
        log::debug!("Network still busy at deadline, continuing");
    }
}

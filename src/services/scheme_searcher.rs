use async_trait::async_trait;
use itertools::Itertools;
use serde_json::Value;
use url::Url;

use crate::domain::{FacetSelection, SearchCriteria};

use super::{
    page::{SchemePage, Target},
    timing::{navigate, settle, wait_for_dom, wait_for_network_idle, wait_until, Timings},
};

pub const ROOT_URL: &str = "https://www.myscheme.gov.in/";
pub const SEARCH_URL: &str = "https://www.myscheme.gov.in/search?query=a";
pub const SCHEME_PATH_MARKER: &str = "/schemes/";
/// Keyword results are cut to this many locators. Not configurable.
pub const KEYWORD_RESULT_CAP: usize = 4;

pub const SEARCH_PLACEHOLDER: Target = Target::Text("Enter scheme name to search...");
pub const SEARCH_MODAL: Target = Target::Css("form.w-full");
pub const SEARCH_INPUT: Target = Target::Css("form.w-full input[name='query']");
pub const FILTER_SIDEBAR: Target = Target::Css("div.rounded-md.shadow-sm");
pub const STATE_FACET_INPUT: Target = Target::Css("input#react-select-7-input");
pub const CATEGORY_SECTION_LABEL: &str = "Scheme Category";

pub const HIDE_FACET_PLACEHOLDER_SCRIPT: &str = r#"
const placeholder = document.querySelector('.facet__placeholder');
if (placeholder) placeholder.style.display = 'none';
return placeholder !== null;
"#;

pub const EXPAND_SECTION_SCRIPT: &str = r#"
for (const span of document.querySelectorAll('span.text-base.font-semibold')) {
    if (span.textContent.includes(arguments[0])) {
        span.click();
        return true;
    }
}
return false;
"#;

pub const TOGGLE_CATEGORY_SCRIPT: &str = r#"
const box = Array.from(document.querySelectorAll('input[aria-labelledby]'))
    .find(input => input.getAttribute('aria-labelledby') === arguments[0]);
if (!box) return false;
box.click();
return true;
"#;

pub const OPEN_AGE_DROPDOWN_SCRIPT: &str = r#"
const controls = document.querySelectorAll('div.facet__control');
if (controls.length < 2) return false;
controls[1].click();
return true;
"#;

pub const FILL_AGE_SCRIPT: &str = r#"
const control = document.querySelectorAll('div.facet__control')[1];
const input = control && control.querySelector('input');
if (!input) return false;
const setValue = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
setValue.call(input, arguments[0]);
input.dispatchEvent(new Event('input', { bubbles: true }));
return true;
"#;

pub const COMMIT_AGE_SCRIPT: &str = r#"
const control = document.querySelectorAll('div.facet__control')[1];
const input = control && control.querySelector('input');
if (!input) return false;
input.dispatchEvent(new KeyboardEvent('keydown', { key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true }));
return true;
"#;

/// Finds scheme detail locators for a criteria. Never fails; problems
/// with the host page yield an empty list.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    async fn search(&self, page: &dyn SchemePage, criteria: &SearchCriteria) -> Vec<String>;
}

pub struct SchemeSearcher {
    timings: Timings,
}

impl SchemeSearcher {
    pub fn new(timings: Timings) -> Self {
        SchemeSearcher { timings }
    }

    pub async fn keyword_search(&self, page: &dyn SchemePage, query: &str) -> Vec<String> {
        log::info!("Keyword search for: {}", query);
        match self.try_keyword_search(page, query).await {
            Ok(urls) => {
                log::info!("Keyword search found {} scheme urls", urls.len());
                urls
            }
            Err(e) => {
                log::error!("Keyword search failed for '{}'. Error: {:?}", query, e);
                vec![]
            }
        }
    }

    pub async fn filter_search(
        &self,
        page: &dyn SchemePage,
        selection: &FacetSelection,
    ) -> Vec<String> {
        log::info!(
            "Filter search: state={}, category={}, age={}",
            selection.region,
            selection.category,
            selection.age
        );
        match self.try_filter_search(page, selection).await {
            Ok(urls) => {
                log::info!("Filter search found {} scheme urls", urls.len());
                urls
            }
            Err(e) => {
                log::error!("Filter search failed. Error: {:?}", e);
                vec![]
            }
        }
    }

    async fn try_keyword_search(
        &self,
        page: &dyn SchemePage,
        query: &str,
    ) -> anyhow::Result<Vec<String>> {
        let t = &self.timings;

        navigate(page, ROOT_URL, t.page_load_timeout).await?;
        wait_for_dom(page, t).await;

        // The visible box is a fake; clicking it mounts the real search modal.
        if !page.is_visible(&SEARCH_PLACEHOLDER).await? {
            log::warn!("Search placeholder not visible, treating search as unreachable");
            return Ok(vec![]);
        }
        page.click(&SEARCH_PLACEHOLDER).await?;
        settle(t.after_placeholder_click).await;

        page.wait_for(&SEARCH_MODAL, t.modal_timeout).await?;
        page.wait_for(&SEARCH_INPUT, t.modal_input_timeout).await?;
        page.click(&SEARCH_INPUT).await?;
        settle(t.before_typing).await;

        page.type_keys(&SEARCH_INPUT, query, t.keystroke).await?;
        settle(t.after_typing).await;

        page.press_enter(&SEARCH_INPUT).await?;
        settle(t.after_submit).await;
        wait_for_network_idle(page, t).await;

        let links = page.collect_links().await?;
        Ok(filter_scheme_links(links, Some(KEYWORD_RESULT_CAP)))
    }

    async fn try_filter_search(
        &self,
        page: &dyn SchemePage,
        selection: &FacetSelection,
    ) -> anyhow::Result<Vec<String>> {
        let t = &self.timings;

        navigate(page, SEARCH_URL, t.page_load_timeout).await?;
        wait_for_dom(page, t).await;
        settle(t.search_page_settle).await;

        // The sidebar is lazily rendered on scroll.
        page.scroll_by(600).await?;
        settle(t.sidebar_scroll_settle).await;
        page.wait_for(&FILTER_SIDEBAR, t.sidebar_timeout).await?;

        self.select_facets(page, selection).await?;

        settle(t.results_settle).await;
        let links = page.collect_links().await?;
        Ok(filter_scheme_links(links, None))
    }

    /// Applies state, category and age facets in that order.
    pub async fn select_facets(
        &self,
        page: &dyn SchemePage,
        selection: &FacetSelection,
    ) -> anyhow::Result<()> {
        self.select_region(page, selection.region.as_str()).await?;
        self.select_category(page, &selection.category).await?;
        self.select_age(page, selection.age.label()).await
    }

    async fn select_region(&self, page: &dyn SchemePage, region: &str) -> anyhow::Result<()> {
        let t = &self.timings;

        page.scroll_by(300).await?;
        settle(t.scroll_settle).await;

        page.execute(HIDE_FACET_PLACEHOLDER_SCRIPT, vec![]).await?;
        settle(t.overlay_settle).await;

        page.wait_for(&STATE_FACET_INPUT, t.facet_input_timeout).await?;
        page.force_click(&STATE_FACET_INPUT).await?;
        settle(t.input_focus_settle).await;

        page.fill(&STATE_FACET_INPUT, region).await?;
        settle(t.input_focus_settle).await;
        page.press_enter(&STATE_FACET_INPUT).await?;
        settle(t.facet_commit_settle).await;
        Ok(())
    }

    /// Races the page's own rendering; a missing checkbox is only logged.
    async fn select_category(&self, page: &dyn SchemePage, category: &str) -> anyhow::Result<()> {
        let t = &self.timings;

        page.scroll_by(-200).await?;
        settle(t.scroll_settle).await;

        let expanded = page
            .execute(
                EXPAND_SECTION_SCRIPT,
                vec![Value::from(CATEGORY_SECTION_LABEL)],
            )
            .await?;
        if expanded != Value::Bool(true) {
            log::warn!("'{}' section not found", CATEGORY_SECTION_LABEL);
        }
        settle(t.category_settle).await;

        let toggled = wait_until(t.category_checkbox_timeout, t.poll_interval, || async move {
            matches!(
                page.execute(TOGGLE_CATEGORY_SCRIPT, vec![Value::from(category)])
                    .await,
                Ok(Value::Bool(true))
            )
        })
        .await;
        if !toggled {
            log::warn!("Category checkbox '{}' not found, skipping", category);
        }
        settle(t.category_settle).await;
        Ok(())
    }

    async fn select_age(&self, page: &dyn SchemePage, label: &str) -> anyhow::Result<()> {
        let t = &self.timings;

        let opened = page.execute(OPEN_AGE_DROPDOWN_SCRIPT, vec![]).await?;
        if opened != Value::Bool(true) {
            log::warn!("Age dropdown not found, skipping age {}", label);
            return Ok(());
        }
        settle(t.age_dropdown_settle).await;

        page.execute(FILL_AGE_SCRIPT, vec![Value::from(label)]).await?;
        settle(t.age_dropdown_settle).await;
        page.execute(COMMIT_AGE_SCRIPT, vec![]).await?;
        settle(t.age_settle).await;
        Ok(())
    }
}

#[async_trait]
impl SearchExecutor for SchemeSearcher {
    async fn search(&self, page: &dyn SchemePage, criteria: &SearchCriteria) -> Vec<String> {
        match criteria {
            SearchCriteria::Keyword { text } => self.keyword_search(page, text).await,
            SearchCriteria::Filter {
                region,
                category,
                age_years,
            } => {
                let selection = FacetSelection::new(region, category, *age_years);
                self.filter_search(page, &selection).await
            }
        }
    }
}

/// Keeps absolute links to scheme detail pages, first occurrence wins.
///
/// Duplicates are dropped on both search paths, including the uncapped
/// filter path. Earlier versions returned filter-path repeats as separate
/// schemes.
pub fn filter_scheme_links(links: Vec<String>, cap: Option<usize>) -> Vec<String> {
    let schemes = links
        .into_iter()
        .filter(|link| match Url::parse(link) {
            Ok(url) => url.path().contains(SCHEME_PATH_MARKER),
            Err(_) => false,
        })
        .unique();

    match cap {
        Some(cap) => schemes.take(cap).collect(),
        None => schemes.collect(),
    }
}

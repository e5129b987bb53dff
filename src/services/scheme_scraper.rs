use async_trait::async_trait;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

use crate::domain::SchemeRecord;

use super::{
    droid::BrowserSession,
    page::SchemePage,
    timing::{navigate, wait_for_network_idle, Timings},
};

pub const TITLE_SELECTOR: &str = "h1.font-bold";
pub const FORMATTED_BLOCK_SELECTOR: &str = ".markdown-options";

pub const DETAILS_SECTION: &str = "details";
pub const ELIGIBILITY_SECTION: &str = "eligibility";
pub const BENEFITS_SECTION: &str = "benefits";
pub const APPLICATION_PROCESS_SECTION: &str = "application-process";
pub const DOCUMENTS_REQUIRED_SECTION: &str = "documents-required";

/// Turns one scheme locator into a record. Never fails: errors become a
/// sentinel record (see [`SchemeRecord::failed`]).
#[async_trait]
pub trait DetailExtractor: Send + Sync {
    async fn extract(&self, session: &dyn BrowserSession, locator: &str) -> SchemeRecord;
}

pub struct SchemeScraper {
    timings: Timings,
}

impl SchemeScraper {
    pub fn new(timings: Timings) -> Self {
        SchemeScraper { timings }
    }

    async fn scrape(&self, page: &dyn SchemePage, locator: &str) -> anyhow::Result<SchemeRecord> {
        navigate(page, locator, self.timings.page_load_timeout).await?;
        wait_for_network_idle(page, &self.timings).await;

        let html = page.source().await?;
        let mut sections = parse_scheme_page(&html);

        let title = match sections.title.take() {
            Some(title) => title,
            None => page.title().await?,
        };

        Ok(SchemeRecord {
            title,
            url: locator.to_string(),
            description: sections.description,
            eligibility: sections.eligibility,
            benefits: sections.benefits,
            application_process: sections.application_process,
            documents_required: sections.documents_required,
        })
    }
}

#[async_trait]
impl DetailExtractor for SchemeScraper {
    async fn extract(&self, session: &dyn BrowserSession, locator: &str) -> SchemeRecord {
        log::info!("Scraping: {}", locator);

        let page = match session.open_page().await {
            Ok(page) => page,
            Err(e) => {
                log::error!("Could not open page for {}. Error: {:?}", locator, e);
                return SchemeRecord::failed(locator, e);
            }
        };

        let record = match self.scrape(page.as_ref(), locator).await {
            Ok(record) => record,
            Err(e) => {
                log::error!("Error scraping {}. Error: {:?}", locator, e);
                SchemeRecord::failed(locator, e)
            }
        };

        if let Err(e) = page.close().await {
            log::warn!("Failed to close page for {}. Error: {:?}", locator, e);
        }

        record
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SchemeSections {
    pub title: Option<String>,
    pub description: Option<String>,
    pub eligibility: Option<String>,
    pub benefits: Option<String>,
    pub application_process: Option<String>,
    pub documents_required: Option<String>,
}

pub fn parse_scheme_page(html: &str) -> SchemeSections {
    let document = Html::parse_document(html);

    let title = Selector::parse(TITLE_SELECTOR)
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|heading| inner_text(&heading));

    SchemeSections {
        title,
        description: section_text(&document, DETAILS_SECTION),
        eligibility: section_text(&document, ELIGIBILITY_SECTION),
        benefits: section_text(&document, BENEFITS_SECTION),
        application_process: section_text(&document, APPLICATION_PROCESS_SECTION),
        documents_required: section_text(&document, DOCUMENTS_REQUIRED_SECTION),
    }
}

/// Text of `#id`, preferring its formatted-content block when there is one.
fn section_text(document: &Html, id: &str) -> Option<String> {
    let section_selector = Selector::parse(&format!("#{}", id)).ok()?;
    let section = document.select(&section_selector).next()?;

    let block = Selector::parse(FORMATTED_BLOCK_SELECTOR)
        .ok()
        .and_then(|selector| section.select(&selector).next());

    Some(inner_text(&block.unwrap_or(section)))
}

/// Elements that start a new line in rendered text.
const BLOCK_TAGS: [&str; 30] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "tr", "ul",
];

/// Rendered-style text: inline runs stay on one line with whitespace
/// collapsed, block elements break lines, blank lines are dropped.
fn inner_text(element: &ElementRef) -> String {
    let mut lines = vec![String::new()];
    push_text(*element, &mut lines);
    lines
        .iter()
        .map(|line| line.split_whitespace().join(" "))
        .filter(|line| !line.is_empty())
        .join("\n")
}

fn push_text(element: ElementRef, lines: &mut Vec<String>) {
    let block = BLOCK_TAGS.contains(&element.value().name());
    if block {
        lines.push(String::new());
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            if let Some(line) = lines.last_mut() {
                line.push_str(text);
            }
        } else if let Some(child) = ElementRef::wrap(child) {
            push_text(child, lines);
        }
    }
    if block {
        lines.push(String::new());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::services::testing::{PageCall, ScriptedPage, StubSession};
    use crate::services::timing::Timings;

    use super::{parse_scheme_page, DetailExtractor, SchemeScraper};

    const SCHEME_HTML: &str = r#"
        <html>
          <head><title>PM-KISAN | myScheme</title></head>
          <body>
            <h1 class="font-bold text-xl">Pradhan Mantri Kisan Samman Nidhi</h1>
            <div id="details">
              <span>Details</span>
              <div class="markdown-options"><p>Income support of <b>6,000</b> per year.</p></div>
            </div>
            <div id="eligibility">
              <ul><li>Landholding farmer families</li><li>Indian citizen</li></ul>
            </div>
            <div id="benefits"><div class="markdown-options">Three equal instalments</div></div>
            <div id="documents-required"></div>
          </body>
        </html>
    "#;

    #[test]
    fn parse_scheme_page_extracts_sections() {
        let sections = parse_scheme_page(SCHEME_HTML);

        assert_eq!(
            sections.title.as_deref(),
            Some("Pradhan Mantri Kisan Samman Nidhi")
        );
        assert_eq!(
            sections.description.as_deref(),
            Some("Income support of 6,000 per year.")
        );
        assert_eq!(
            sections.eligibility.as_deref(),
            Some("Landholding farmer families\nIndian citizen")
        );
        assert_eq!(sections.benefits.as_deref(), Some("Three equal instalments"));
        assert_eq!(sections.application_process, None);
        assert_eq!(sections.documents_required.as_deref(), Some(""));
    }

    #[test]
    fn parse_scheme_page_keeps_inline_markup_on_one_line() {
        let sections = parse_scheme_page(
            r#"<h1 class="font-bold">PM <span>Kisan</span></h1>
            <div id="details"><div class="markdown-options">
              <p>Income support of <b>6,000</b>
                 per   year.</p>
              <p>Paid in <a href="/x">three</a> instalments.</p>
            </div></div>
            <div id="benefits">Cash<br>Insurance</div>"#,
        );

        assert_eq!(sections.title.as_deref(), Some("PM Kisan"));
        assert_eq!(
            sections.description.as_deref(),
            Some("Income support of 6,000 per year.\nPaid in three instalments.")
        );
        assert_eq!(sections.benefits.as_deref(), Some("Cash\nInsurance"));
    }

    #[test]
    fn parse_scheme_page_without_heading() {
        let sections = parse_scheme_page("<html><body><p>nothing here</p></body></html>");

        assert_eq!(sections.title, None);
        assert_eq!(sections.description, None);
    }

    #[tokio::test]
    async fn extract_builds_record_and_closes_page() {
        let tab = ScriptedPage::new().with_html(SCHEME_HTML);
        let session = StubSession::with_tab(tab.clone());
        let scraper = SchemeScraper::new(Timings::instant());
        let url = "https://www.myscheme.gov.in/schemes/pm-kisan";

        let record = scraper.extract(&session, url).await;

        assert_eq!(record.title, "Pradhan Mantri Kisan Samman Nidhi");
        assert_eq!(record.url, url);
        assert_eq!(
            record.benefits.as_deref(),
            Some("Three equal instalments")
        );
        assert_eq!(tab.calls().first(), Some(&PageCall::Goto(url.to_string())));
        assert_eq!(tab.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extract_falls_back_to_document_title() {
        let tab = ScriptedPage::new()
            .with_html("<html><body><div id='benefits'>Cash</div></body></html>")
            .with_title("Some Scheme | myScheme");
        let session = StubSession::with_tab(tab);
        let scraper = SchemeScraper::new(Timings::instant());

        let record = scraper
            .extract(&session, "https://www.myscheme.gov.in/schemes/x")
            .await;

        assert_eq!(record.title, "Some Scheme | myScheme");
        assert_eq!(record.benefits.as_deref(), Some("Cash"));
        assert!(!record.is_failed());
    }

    #[tokio::test]
    async fn extract_failure_yields_sentinel_and_still_closes_page() {
        let tab = ScriptedPage::new().failing_goto();
        let session = StubSession::with_tab(tab.clone());
        let scraper = SchemeScraper::new(Timings::instant());

        let record = scraper.extract(&session, "not a url").await;

        assert!(record.is_failed());
        assert_eq!(record.title, "Error");
        assert_eq!(record.url, "not a url");
        assert!(record.description.unwrap().contains("not a url"));
        assert_eq!(tab.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extract_when_tab_cannot_open_yields_sentinel() {
        let session = StubSession::new().failing_tabs();
        let scraper = SchemeScraper::new(Timings::instant());

        let record = scraper
            .extract(&session, "https://www.myscheme.gov.in/schemes/y")
            .await;

        assert!(record.is_failed());
        assert_eq!(record.url, "https://www.myscheme.gov.in/schemes/y");
    }
}

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    configuration::Settings,
    domain::{CriteriaError, SchemeRecord, ScrapeResult, SearchCriteria},
};

use super::{
    droid::{DroidFactory, SessionError, SessionProvider},
    scheme_scraper::{DetailExtractor, SchemeScraper},
    scheme_searcher::{SchemeSearcher, SearchExecutor},
    timing::Timings,
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),
    #[error(transparent)]
    BrowserUnavailable(#[from] SessionError),
    #[error("scrape run exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

/// Search, then scrape every locator found. Each phase gets its own
/// browser session; sessions are never shared between runs.
pub struct Pipeline {
    sessions: Arc<dyn SessionProvider>,
    searcher: Arc<dyn SearchExecutor>,
    extractor: Arc<dyn DetailExtractor>,
    run_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        searcher: Arc<dyn SearchExecutor>,
        extractor: Arc<dyn DetailExtractor>,
        run_timeout: Duration,
    ) -> Self {
        Pipeline {
            sessions,
            searcher,
            extractor,
            run_timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Pipeline::new(
            Arc::new(DroidFactory::new(settings.browser.clone())),
            Arc::new(SchemeSearcher::new(Timings::default())),
            Arc::new(SchemeScraper::new(Timings::default())),
            Duration::from_secs(settings.pipeline.run_timeout_secs),
        )
    }

    pub async fn run(&self, criteria: SearchCriteria) -> Result<ScrapeResult, PipelineError> {
        criteria.validate()?;

        let run_id = Uuid::new_v4();
        log::info!("[{}] Starting scrape run for {:?}", run_id, criteria);

        let records = tokio::time::timeout(self.run_timeout, self.run_phases(run_id, &criteria))
            .await
            .map_err(|_| {
                log::error!("[{}] Run exceeded {:?}, abandoning", run_id, self.run_timeout);
                PipelineError::DeadlineExceeded(self.run_timeout)
            })??;

        log::info!("[{}] Finished with {} records", run_id, records.len());
        Ok(ScrapeResult { criteria, records })
    }

    async fn run_phases(
        &self,
        run_id: Uuid,
        criteria: &SearchCriteria,
    ) -> Result<Vec<SchemeRecord>, PipelineError> {
        let session = self.sessions.acquire().await?;
        let locators = self.searcher.search(session.page(), criteria).await;
        session.close().await;

        if locators.is_empty() {
            log::info!("[{}] Search found nothing, skipping scrape phase", run_id);
            return Ok(vec![]);
        }
        log::info!("[{}] Scraping {} schemes", run_id, locators.len());

        let session = self.sessions.acquire().await?;
        let mut records = Vec::with_capacity(locators.len());
        for locator in &locators {
            records.push(self.extractor.extract(session.as_ref(), locator).await);
        }
        session.close().await;

        Ok(records)
    }
}

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::criteria::SearchCriteria;

pub const ERROR_TITLE: &str = "Error";

/// One scheme detail page. `None` sections were absent on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeRecord {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub eligibility: Option<String>,
    pub benefits: Option<String>,
    pub application_process: Option<String>,
    pub documents_required: Option<String>,
}

impl SchemeRecord {
    /// Sentinel for a page that could not be scraped.
    pub fn failed(url: &str, error: impl Display) -> Self {
        SchemeRecord {
            title: ERROR_TITLE.to_string(),
            url: url.to_string(),
            description: Some(error.to_string()),
            eligibility: None,
            benefits: None,
            application_process: None,
            documents_required: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.title == ERROR_TITLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeResult {
    pub criteria: SearchCriteria,
    pub records: Vec<SchemeRecord>,
}

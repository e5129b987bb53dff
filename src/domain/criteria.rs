use std::fmt;

use serde::{Deserialize, Serialize};

use super::region::{normalize, RegionName};

pub const DEFAULT_AGE_YEARS: u32 = 18;
pub const DEFAULT_CATEGORY: &str = "Education & Learning";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchCriteria {
    Keyword {
        text: String,
    },
    Filter {
        region: String,
        category: String,
        age_years: u32,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("either a query or a state filter is required")]
    Missing,
    #[error("query and state filter are mutually exclusive")]
    Ambiguous,
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

impl SearchCriteria {
    pub fn validate(&self) -> Result<(), CriteriaError> {
        match self {
            SearchCriteria::Keyword { text } if text.trim().is_empty() => {
                Err(CriteriaError::Blank("query"))
            }
            SearchCriteria::Filter { region, .. } if region.trim().is_empty() => {
                Err(CriteriaError::Blank("state"))
            }
            SearchCriteria::Filter { category, .. } if category.trim().is_empty() => {
                Err(CriteriaError::Blank("category"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBracket {
    UpTo5,
    From6To18,
    From19To25,
    From26To40,
    From41To60,
}

impl AgeBracket {
    pub fn from_age(age_years: u32) -> Self {
        match age_years {
            0..=5 => AgeBracket::UpTo5,
            6..=18 => AgeBracket::From6To18,
            19..=25 => AgeBracket::From19To25,
            26..=40 => AgeBracket::From26To40,
            _ => AgeBracket::From41To60,
        }
    }

    /// Label as shown in the site's age dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            AgeBracket::UpTo5 => "0-5",
            AgeBracket::From6To18 => "6-18",
            AgeBracket::From19To25 => "19-25",
            AgeBracket::From26To40 => "26-40",
            AgeBracket::From41To60 => "41-60",
        }
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values actually typed into the filter sidebar, derived from a `Filter` criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSelection {
    pub region: RegionName,
    pub category: String,
    pub age: AgeBracket,
}

impl FacetSelection {
    pub fn new(region: &str, category: &str, age_years: u32) -> Self {
        FacetSelection {
            region: normalize(region),
            category: category.trim().to_string(),
            age: AgeBracket::from_age(age_years),
        }
    }
}

/// Inbound scrape request as posted to `/scrape`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub query: Option<String>,
    #[serde(alias = "region")]
    pub filter_state: Option<String>,
    #[serde(alias = "category")]
    pub filter_category: Option<String>,
    #[serde(alias = "age_years", alias = "ageYears")]
    pub filter_age: Option<u32>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl TryFrom<&ScrapeRequest> for SearchCriteria {
    type Error = CriteriaError;

    fn try_from(request: &ScrapeRequest) -> Result<Self, Self::Error> {
        let criteria = match (present(&request.query), present(&request.filter_state)) {
            (Some(_), Some(_)) => return Err(CriteriaError::Ambiguous),
            (None, None) => return Err(CriteriaError::Missing),
            (Some(text), None) => SearchCriteria::Keyword {
                text: text.to_string(),
            },
            (None, Some(region)) => SearchCriteria::Filter {
                region: region.to_string(),
                category: present(&request.filter_category)
                    .unwrap_or(DEFAULT_CATEGORY)
                    .to_string(),
                age_years: request.filter_age.unwrap_or(DEFAULT_AGE_YEARS),
            },
        };
        criteria.validate()?;
        Ok(criteria)
    }
}

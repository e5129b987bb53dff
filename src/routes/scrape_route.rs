use actix_web::{post, web, HttpResponse};
use serde::Serialize;

use crate::{
    domain::{SchemeRecord, ScrapeRequest, SearchCriteria},
    services::{Pipeline, PipelineError},
};

#[derive(Serialize)]
struct ScrapeResponse {
    #[serde(flatten)]
    request: ScrapeRequest,
    schemes: Vec<SchemeRecord>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[post("/scrape")]
pub async fn scrape(
    body: web::Json<ScrapeRequest>,
    pipeline: web::Data<Pipeline>,
) -> HttpResponse {
    let request = body.into_inner();

    let criteria = match SearchCriteria::try_from(&request) {
        Ok(criteria) => criteria,
        Err(e) => {
            log::warn!("Rejected scrape request {:?}: {}", request, e);
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            });
        }
    };

    let schemes = match pipeline.run(criteria).await {
        Ok(result) => result.records,
        Err(PipelineError::BrowserUnavailable(e)) => {
            log::error!("No browser for scrape request. Error: {:?}", e);
            vec![]
        }
        Err(PipelineError::InvalidCriteria(e)) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            });
        }
        Err(e @ PipelineError::DeadlineExceeded(_)) => {
            log::error!("Scrape request failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to scrape schemes".to_string(),
            });
        }
    };

    HttpResponse::Ok().json(ScrapeResponse { request, schemes })
}

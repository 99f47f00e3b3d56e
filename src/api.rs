// src/api.rs
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ScrapeError;
use crate::metrics::Metrics;
use crate::pipeline::Scraper;
use crate::store::ConferenceStore;
use crate::types::Conference;

#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
    pub conferences: Arc<dyn ConferenceStore>,
}

impl AppState {
    pub fn new(scraper: Arc<Scraper>) -> Self {
        let conferences = scraper.store();
        Self {
            scraper,
            conferences,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/scrape-conferences", any(scrape_conferences))
        .route("/conferences", get(list_conferences))
        .layer(cors)
        .with_state(state)
}

/// Router plus `/metrics`.
pub fn router_with_metrics(state: AppState, metrics: &Metrics) -> Router {
    create_router(state).merge(metrics.router())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ScrapeResp {
    success: bool,
    scraped: usize,
    sources: usize,
    message: String,
    conferences: Vec<Conference>,
}

async fn scrape_conferences(method: Method, State(state): State<AppState>) -> Response {
    // Bare pre-flight (no CORS request headers) still must not trigger a pass.
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    match state.scraper.run_pass().await {
        Ok(report) => Json(ScrapeResp {
            success: true,
            scraped: report.scraped,
            sources: report.sources,
            message: format!(
                "Scraped {} conferences from {} sources",
                report.scraped, report.sources
            ),
            conferences: report.conferences,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_conferences(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let from = match q.get("from") {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody {
                        error: format!("invalid 'from' date '{raw}', expected YYYY-MM-DD"),
                    }),
                )
                    .into_response()
            }
        },
        None => Utc::now().date_naive(),
    };

    match state.conferences.upcoming(from).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => e.into_response(),
    }
}

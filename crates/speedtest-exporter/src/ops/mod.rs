//! HTTP endpoints.
//!
//! - `/`        : welcome page
//! - `/metrics` : runs one measurement, then Prometheus text format
//! - `/healthz` : liveness (never measures)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::app_state::AppState;

pub const WELCOME_HTML: &str =
    "<h1>Welcome to Speedtest-Exporter.</h1>Click <a href='/metrics'>here</a> to see metrics.";

pub async fn index() -> Html<&'static str> {
    Html(WELCOME_HTML)
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Always 200: a failed measurement is reported as `speedtest_up 0`.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.scraper().scrape_and_render().await;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

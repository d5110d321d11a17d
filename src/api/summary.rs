use crate::api::{error_response, AppState};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let from = match parse_bound(query.from.as_deref(), "from") {
        Ok(bound) => bound,
        Err(response) => return response,
    };
    let to = match parse_bound(query.to.as_deref(), "to") {
        Ok(bound) => bound,
        Err(response) => return response,
    };

    match state.audit.summary(from, to).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to read payments summary");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn parse_bound(value: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>, Response> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid '{}' timestamp, expected RFC3339 UTC", name),
                )
            }),
    }
}

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::intake::IntakeViolation;
use super::listing::{ResponseQuery, ResponseSort, DEFAULT_PAGE_SIZE};
use super::repository::{RepositoryError, ResponseRepository, ResponseStatus, SurveyCatalog};
use super::schema::ResponseId;
use super::service::{ResponseServiceError, ReviewUpdate, SurveyResponseService};
use super::throttle::{SubmissionThrottle, ThrottleError};

const UNKNOWN_SOURCE: &str = "unknown";

/// Router builder exposing public submission and reviewer endpoints.
pub fn survey_router<C, R, T>(service: Arc<SurveyResponseService<C, R, T>>) -> Router
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    Router::new()
        .route(
            "/api/v1/surveys/:slug/responses",
            post(submit_handler::<C, R, T>).get(list_handler::<C, R, T>),
        )
        .route("/api/v1/surveys/:slug/stats", get(stats_handler::<C, R, T>))
        .route(
            "/api/v1/surveys/:slug/export",
            get(export_handler::<C, R, T>),
        )
        .route(
            "/api/v1/responses/:response_id",
            get(status_handler::<C, R, T>).patch(review_handler::<C, R, T>),
        )
        .with_state(service)
}

/// Client address as forwarded by the edge proxy.
pub(crate) fn submission_source(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}

pub(crate) async fn submit_handler<C, R, T>(
    State(service): State<Arc<SurveyResponseService<C, R, T>>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    let Some(answers) = body.get("answers").and_then(Value::as_object) else {
        let payload = json!({
            "error": "answers object required",
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    let source = submission_source(&headers);
    match service.submit(&slug, &source, answers) {
        Ok(record) => {
            let payload = json!({
                "id": record.id,
                "score": record.score.total_score,
                "percentage": record.score.score_percentage,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

/// Raw listing parameters as sent in the query string; a blank status means "any".
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    status: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

impl ListParams {
    pub(crate) fn into_query(self) -> Result<ResponseQuery, String> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                serde_json::from_value::<ResponseStatus>(Value::String(raw.to_string()))
                    .map_err(|_| format!("unknown status '{raw}'"))?,
            ),
        };

        Ok(ResponseQuery {
            status,
            search: self.search,
            sort: self
                .sort
                .as_deref()
                .map(ResponseSort::parse)
                .unwrap_or_default(),
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

pub(crate) async fn list_handler<C, R, T>(
    State(service): State<Arc<SurveyResponseService<C, R, T>>>,
    Path(slug): Path<String>,
    Query(params): Query<ListParams>,
) -> Response
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    let query = match params.into_query() {
        Ok(query) => query,
        Err(message) => {
            let payload = json!({ "error": message });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match service.list(&slug, &query) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<C, R, T>(
    State(service): State<Arc<SurveyResponseService<C, R, T>>>,
    Path(response_id): Path<String>,
) -> Response
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    match service.status_view(&ResponseId(response_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_handler<C, R, T>(
    State(service): State<Arc<SurveyResponseService<C, R, T>>>,
    Path(response_id): Path<String>,
    axum::Json(update): axum::Json<ReviewUpdate>,
) -> Response
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    let id = ResponseId(response_id);
    let reviewed = service
        .review(&id, update)
        .and_then(|_| service.status_view(&id));
    match reviewed {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stats_handler<C, R, T>(
    State(service): State<Arc<SurveyResponseService<C, R, T>>>,
    Path(slug): Path<String>,
) -> Response
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    match service.stats(&slug, Utc::now()) {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn export_handler<C, R, T>(
    State(service): State<Arc<SurveyResponseService<C, R, T>>>,
    Path(slug): Path<String>,
) -> Response
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    match service.export_csv(&slug) {
        Ok(body) => {
            let disposition = format!("attachment; filename=\"{slug}-responses.csv\"");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: ResponseServiceError) -> Response {
    let status = match &error {
        ResponseServiceError::Intake(IntakeViolation::MissingRequired { .. }) => {
            StatusCode::BAD_REQUEST
        }
        ResponseServiceError::SurveyNotFound(_)
        | ResponseServiceError::Intake(IntakeViolation::SurveyClosed(_))
        | ResponseServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ResponseServiceError::Duplicate { .. }
        | ResponseServiceError::Repository(
            RepositoryError::Conflict | RepositoryError::DuplicateKey,
        ) => StatusCode::CONFLICT,
        ResponseServiceError::Throttled(ThrottleError::Limited { retry_after_secs }) => {
            let payload = json!({
                "error": error.to_string(),
                "retry_after_secs": retry_after_secs,
            });
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                axum::Json(payload),
            )
                .into_response();
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

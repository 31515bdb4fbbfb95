//! Matching HTTP handlers.
//!
//! The caller identifies themselves with the `X-User-Id` header. Responses
//! use a `{success, message, data}` envelope so clients can branch on
//! `success` without inspecting status codes.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::common::MatchError;
use crate::domains::matching::models::MatchId;
use crate::domains::matching::service::{StartMatching, TimeoutChoice};
use crate::server::app::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: &str, data: Option<T>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            data,
        })
    }
}

fn error_response(error: MatchError) -> Response {
    let status = error.status_code();
    let body = ApiResponse::<()> {
        success: false,
        message: error.to_string(),
        data: None,
    };
    (status, Json(body)).into_response()
}

fn user_id_from(headers: &HeaderMap) -> Result<String, MatchError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MatchError::InvalidRequest("missing X-User-Id header".into()))
}

pub async fn start_matching_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<StartMatching>,
) -> Response {
    let user_id = match user_id_from(&headers) {
        Ok(user_id) => user_id,
        Err(error) => return error_response(error),
    };
    match state.service.start_matching(&user_id, request).await {
        Ok(()) => ApiResponse::<()>::ok("matching started", None).into_response(),
        Err(error) => error_response(error),
    }
}

pub async fn cancel_matching_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Response {
    let user_id = match user_id_from(&headers) {
        Ok(user_id) => user_id,
        Err(error) => return error_response(error),
    };
    match state.service.cancel_matching(&user_id).await {
        Ok(()) => ApiResponse::<()>::ok("matching cancelled", None).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimeData {
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub async fn start_time_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Response {
    let user_id = match user_id_from(&headers) {
        Ok(user_id) => user_id,
        Err(error) => return error_response(error),
    };
    match state.service.start_time(&user_id).await {
        Ok(start_time) => {
            ApiResponse::ok("start time", Some(StartTimeData { start_time })).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponseBody {
    pub match_id: MatchId,
    pub accepted: bool,
}

pub async fn match_response_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(body): Json<MatchResponseBody>,
) -> Response {
    let user_id = match user_id_from(&headers) {
        Ok(user_id) => user_id,
        Err(error) => return error_response(error),
    };
    match state
        .service
        .match_response(&user_id, body.match_id, body.accepted)
        .await
    {
        Ok(()) => ApiResponse::<()>::ok("response recorded", None).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Deserialize)]
pub struct TimeoutChoiceBody {
    pub choice: TimeoutChoice,
}

pub async fn timeout_choice_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(body): Json<TimeoutChoiceBody>,
) -> Response {
    let user_id = match user_id_from(&headers) {
        Ok(user_id) => user_id,
        Err(error) => return error_response(error),
    };
    match state.service.timeout_choice(&user_id, body.choice).await {
        Ok(()) => ApiResponse::<()>::ok("choice applied", None).into_response(),
        Err(error) => error_response(error),
    }
}

//! JSON API consumed by the messaging gateway.
//!
//! - `POST /api/ai/respond` runs one inbound lead message through the
//!   qualification runtime and returns the reply with its analysis.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use propbot_agent::{ProcessMessageRequest, ProcessMessageResponse, QualificationRuntime};
use propbot_core::domain::lead::{BusinessId, LeadId};
use propbot_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<QualificationRuntime>,
}

impl ApiState {
    pub fn new(runtime: Arc<QualificationRuntime>) -> Self {
        Self { runtime }
    }
}

/// Missing strings deserialize as empty so validation can name them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RespondRequest {
    pub lead_id: String,
    pub message: String,
    pub channel: String,
    pub business_id: Option<String>,
    pub voice_transcript: Option<String>,
    pub voice_recording_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

type ApiResult<T> = Result<Json<ApiSuccess<T>>, (StatusCode, Json<ApiError>)>;

pub fn router(state: ApiState) -> Router {
    Router::new().route("/api/ai/respond", post(respond)).with_state(state)
}

pub async fn respond(
    State(state): State<ApiState>,
    Json(body): Json<RespondRequest>,
) -> ApiResult<ProcessMessageResponse> {
    let correlation_id = format!("req-{}", Uuid::new_v4());
    let request = validate(body, &correlation_id).map_err(error_response)?;
    let lead_id = request.lead_id.clone();

    info!(
        event_name = "api.respond.received",
        correlation_id = %correlation_id,
        lead_id = %lead_id,
        channel = %request.channel,
        "lead message received"
    );

    match state.runtime.process_message(request).await {
        Ok(data) => Ok(Json(ApiSuccess { success: true, data, correlation_id })),
        Err(error) => {
            warn!(
                event_name = "api.respond.failed",
                correlation_id = %correlation_id,
                lead_id = %lead_id,
                error = %error,
                "lead message could not be processed"
            );
            Err(error_response(error.into_interface(correlation_id)))
        }
    }
}

fn validate(
    body: RespondRequest,
    correlation_id: &str,
) -> Result<ProcessMessageRequest, InterfaceError> {
    let missing: Vec<&str> = [
        ("leadId", body.lead_id.trim().is_empty()),
        ("message", body.message.trim().is_empty()),
        ("channel", body.channel.trim().is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, empty)| empty.then_some(field))
    .collect();

    if !missing.is_empty() {
        return Err(InterfaceError::BadRequest {
            message: format!("missing required fields: {}", missing.join(", ")),
            correlation_id: correlation_id.to_string(),
        });
    }

    Ok(ProcessMessageRequest {
        lead_id: LeadId(body.lead_id.trim().to_string()),
        business_id: body
            .business_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| BusinessId(id.trim().to_string())),
        channel: body.channel.trim().to_string(),
        message: body.message,
        voice_transcript: body.voice_transcript,
        voice_recording_url: body.voice_recording_url,
        correlation_id: correlation_id.to_string(),
    })
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let (status, retryable) = match &error {
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, None),
        InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
        InterfaceError::ServiceUnavailable { retryable, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, Some(*retryable))
        }
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    // Only validation messages are echoed verbatim.
    let message = match &error {
        InterfaceError::BadRequest { message, .. } => message.clone(),
        other => other.user_message().to_string(),
    };

    (
        status,
        Json(ApiError {
            success: false,
            error: message,
            correlation_id: error.correlation_id().to_string(),
            retryable,
        }),
    )
}

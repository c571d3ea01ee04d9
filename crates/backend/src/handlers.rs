use axum::{
    extract::{rejection::FormRejection, Form, Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use shared_types::{CalendarSummary, WebhookReply};

use crate::error::{ApiError, ApiResult};
use crate::registration::{IncomingMessage, RegistrationOutcome};
use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "poll_running": state.poller.is_running(),
    }))
}

/// Outgoing webhook from the chat platform.
///
/// Always answers 200. Only a successful registration gets a body, which the
/// platform posts back to the channel. A registration that is already under
/// way completes even if the client disconnects.
pub async fn receive_webhook(
    State(state): State<AppState>,
    form: Result<Form<IncomingMessage>, FormRejection>,
) -> Response {
    let Form(message) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::warn!("Ignoring malformed webhook payload: {}", rejection);
            return StatusCode::OK.into_response();
        }
    };

    // The registration may wait for a running poll cycle to release the
    // store. Run it in its own task so a client that gives up first does not
    // cancel the commit.
    let registrar = state.registrar.clone();
    let registration = tokio::spawn(async move { registrar.handle(&message).await });

    match registration.await {
        Ok(RegistrationOutcome::Registered(_)) => Json(WebhookReply {
            text: "OK".to_string(),
        })
        .into_response(),
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!("Registration task failed: {}", e);
            StatusCode::OK.into_response()
        }
    }
}

pub async fn list_calendars(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CalendarSummary>>> {
    let store = state.store.snapshot().await?;

    let summaries = store
        .calendars
        .iter()
        .map(|calendar| CalendarSummary::from_calendar(calendar, store.last_updated))
        .collect();

    Ok(Json(summaries))
}

/// Start a poll cycle now instead of waiting for the next tick.
pub async fn trigger_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let token = extract_token_from_header(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing authentication".to_string()))?;

    if !state.registrar.token_matches(&token) {
        return Err(ApiError::Unauthorized("Invalid token".to_string()));
    }

    state.poller.trigger()?;
    tracing::info!("Manual poll cycle started");

    Ok(StatusCode::ACCEPTED)
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::MessageEventRequest;
use crate::AppState;
use crate::error::FaucetError;
use crate::faucet::IntakeOutcome;
use crate::utils::success_to_api_response;

#[axum::debug_handler]
pub async fn receive_message(
    State(state): State<AppState>,
    Json(req): Json<MessageEventRequest>,
) -> Result<impl IntoResponse, FaucetError> {
    let event = req.into_event()?;

    match state.intake.handle(&event).await {
        IntakeOutcome::Unavailable => Err(FaucetError::Unavailable),
        outcome => Ok((StatusCode::OK, success_to_api_response(outcome))),
    }
}

use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::AppState;
use crate::utils::success_to_api_response;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channels: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut channels: Vec<String> = state.config.channel_coins.keys().cloned().collect();
    channels.sort();
    success_to_api_response(HealthResponse {
        status: "ok",
        channels,
    })
}

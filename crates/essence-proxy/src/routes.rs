use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use essence_core::{RecipeError, webhook};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::forward::Forwarder;

#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<dyn Forwarder>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/create-recipe` and `POST /api/recipe-wizard`.
pub async fn create_recipe(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ProxyError> {
    let Json(body) = payload.map_err(|rejection| {
        RecipeError::validation("body", rejection.body_text())
    })?;
    let step = webhook::validate_request_body(&body)?;
    info!(%step, "forwarding recipe request");

    let forwarder = Arc::clone(&state.forwarder);
    let answer = tokio::task::spawn_blocking(move || forwarder.forward(&body))
        .await
        .map_err(|e| RecipeError::Network(format!("forwarding task failed: {e}")))??;
    debug!(%step, "upstream answered");
    Ok(Json(answer))
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health endpoints.

use axum::extract::State;
use axum::response::Response;
use serde_json::json;

use crate::api::AppState;
use crate::api_response::success;
use crate::error::Result;

/// GET /health - liveness.
pub async fn health() -> Response {
	success(json!({"status": "ok"}))
}

/// GET /health/db - database reachability through a read scope.
pub async fn health_db(State(state): State<AppState>) -> Result<Response> {
	state.kernel.ping().await.map_err(crate::error::ServerError::from)?;
	Ok(success(json!({"status": "ok", "database": "reachable"})))
}

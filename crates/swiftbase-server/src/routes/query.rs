// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The document query endpoint.

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use swiftbase_server_auth::CurrentPrincipal;
use swiftbase_server_query::QueryRequest;

use crate::api::AppState;
use crate::api_response::success;
use crate::error::Result;

/// POST /api/query - execute one query request.
pub async fn execute(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Json(request): Json<QueryRequest>,
) -> Result<Response> {
	let outcome = state
		.query
		.execute(&request, Some(principal.id()))
		.await?;
	Ok(success(outcome))
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Admin-only inspection routes.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use swiftbase_server_db::AuditFilter;

use crate::api::AppState;
use crate::api_response::success;
use crate::error::Result;

/// GET /api/admin/queries - registered custom queries.
pub async fn list_queries(State(state): State<AppState>) -> Result<Response> {
	let registered = state.registry.names();
	Ok(success(serde_json::json!({"queries": registered})))
}

/// GET /api/admin/realtime/stats
pub async fn realtime_stats(State(state): State<AppState>) -> Result<Response> {
	let stats = state.hub.stats().await;
	Ok(success(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditParams {
	#[serde(default)]
	pub event_type: Option<String>,
	#[serde(default)]
	pub entity_type: Option<String>,
	#[serde(default)]
	pub entity_id: Option<String>,
	#[serde(default)]
	pub limit: Option<i64>,
	#[serde(default)]
	pub offset: Option<i64>,
}

/// GET /api/admin/audit - filtered audit trail.
pub async fn audit_log(
	State(state): State<AppState>,
	Query(params): Query<AuditParams>,
) -> Result<Response> {
	let (entries, total) = state
		.audit
		.query(AuditFilter {
			event_type: params.event_type,
			entity_type: params.entity_type,
			entity_id: params.entity_id,
			limit: params.limit,
			offset: params.offset,
		})
		.await?;
	Ok(success(serde_json::json!({
		"entries": entries,
		"total": total,
	})))
}

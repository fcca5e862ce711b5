// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collection management and the bulk endpoint.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use swiftbase_server_auth::CurrentPrincipal;
use swiftbase_server_db::NewAuditEntry;
use swiftbase_server_query::{validate_collection_name, Action, QueryRequest, QuerySpec};

use super::{audit_actor, record_audit, request_origin};
use crate::api::AppState;
use crate::api_response::success;
use crate::error::{Result, ServerError};

#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
	pub name: String,
	#[serde(default)]
	pub schema: Option<serde_json::Value>,
	#[serde(default)]
	pub indexes: Option<serde_json::Value>,
	#[serde(default)]
	pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollectionRequest {
	#[serde(default)]
	pub schema: Option<serde_json::Value>,
	#[serde(default)]
	pub indexes: Option<serde_json::Value>,
	#[serde(default)]
	pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
	#[serde(default)]
	pub cascade: Option<bool>,
}

/// GET /api/admin/collections
pub async fn list(State(state): State<AppState>) -> Result<Response> {
	let collections = state.collections.list_with_counts().await?;
	Ok(success(collections))
}

/// GET /api/admin/collections/{name}
pub async fn get_one(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Response> {
	let collection = state
		.collections
		.get_by_name(&name)
		.await?
		.ok_or_else(|| ServerError::NotFound(format!("collection '{name}' not found")))?;
	Ok(success(collection))
}

/// GET /api/admin/collections/{name}/stats
pub async fn stats(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
	let stats = state.collections.stats(&name).await?;
	Ok(success(stats))
}

/// POST /api/admin/collections (admin)
pub async fn create(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	headers: HeaderMap,
	Json(body): Json<CreateCollectionRequest>,
) -> Result<Response> {
	validate_collection_name(&body.name)
		.map_err(|e| ServerError::Validation(e.to_string()))?;
	let collection = state
		.collections
		.create(&body.name, body.schema, body.indexes, body.metadata)
		.await?;

	let (ip, user_agent) = request_origin(&headers);
	let mut entry = NewAuditEntry {
		event_type: "collection.create".to_string(),
		entity_type: "collection".to_string(),
		entity_id: collection.id.clone(),
		data: Some(serde_json::json!({"name": collection.name})),
		ip,
		user_agent,
		..Default::default()
	};
	audit_actor(&mut entry, &principal);
	record_audit(&state.audit, entry);

	Ok(success(collection))
}

/// PUT /api/admin/collections/{name} (admin)
pub async fn update(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	headers: HeaderMap,
	Path(name): Path<String>,
	Json(body): Json<UpdateCollectionRequest>,
) -> Result<Response> {
	let collection = state
		.collections
		.update(&name, body.schema, body.indexes, body.metadata)
		.await?;

	let (ip, user_agent) = request_origin(&headers);
	let mut entry = NewAuditEntry {
		event_type: "collection.update".to_string(),
		entity_type: "collection".to_string(),
		entity_id: collection.id.clone(),
		data: Some(serde_json::json!({"name": collection.name})),
		ip,
		user_agent,
		..Default::default()
	};
	audit_actor(&mut entry, &principal);
	record_audit(&state.audit, entry);

	Ok(success(collection))
}

/// DELETE /api/admin/collections/{name}?cascade=true (admin)
pub async fn remove(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	headers: HeaderMap,
	Path(name): Path<String>,
	Query(params): Query<DeleteParams>,
) -> Result<Response> {
	let cascade = params.cascade.unwrap_or(false);
	let removed_documents = state.collections.delete(&name, cascade).await?;

	let (ip, user_agent) = request_origin(&headers);
	let mut entry = NewAuditEntry {
		event_type: "collection.delete".to_string(),
		entity_type: "collection".to_string(),
		entity_id: name.clone(),
		data: Some(serde_json::json!({"cascade": cascade, "documents": removed_documents})),
		ip,
		user_agent,
		..Default::default()
	};
	audit_actor(&mut entry, &principal);
	record_audit(&state.audit, entry);

	Ok(success(serde_json::json!({
		"deleted": true,
		"documents": removed_documents,
	})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperationType {
	Create,
	Update,
	Delete,
}

#[derive(Debug, Deserialize)]
pub struct BulkOperation {
	#[serde(rename = "type")]
	pub operation: BulkOperationType,
	pub collection: String,
	#[serde(default)]
	pub data: Option<serde_json::Value>,
	#[serde(default, rename = "where")]
	pub r#where: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BulkItemResult {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// POST /api/bulk - run each operation; one failure never aborts the rest.
pub async fn bulk(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Json(operations): Json<Vec<BulkOperation>>,
) -> Result<Response> {
	let mut results = Vec::with_capacity(operations.len());
	let mut all_ok = true;

	for operation in operations {
		let request = QueryRequest {
			action: match operation.operation {
				BulkOperationType::Create => Action::Create,
				BulkOperationType::Update => Action::Update,
				BulkOperationType::Delete => Action::Delete,
			},
			collection: operation.collection,
			query: operation.r#where.map(|w| QuerySpec {
				r#where: Some(w),
				..Default::default()
			}),
			data: operation.data,
			options: None,
			custom: None,
			params: None,
		};

		match state.query.execute(&request, Some(principal.id())).await {
			Ok(outcome) => results.push(BulkItemResult {
				success: true,
				data: serde_json::to_value(outcome).ok(),
				error: None,
			}),
			Err(e) => {
				all_ok = false;
				results.push(BulkItemResult {
					success: false,
					data: None,
					error: Some(e.to_string()),
				});
			}
		}
	}

	Ok(success(serde_json::json!({
		"success": all_ok,
		"results": results,
	})))
}

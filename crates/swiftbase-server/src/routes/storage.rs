// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File storage routes. Byte responses bypass the JSON envelope.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;
use swiftbase_server_auth::CurrentPrincipal;
use swiftbase_server_db::NewAuditEntry;
use swiftbase_server_storage::{FilePrincipal, ListOptions};

use super::{audit_actor, record_audit, request_origin};
use crate::api::AppState;
use crate::api_response::success;
use crate::error::{Result, ServerError};

fn file_principal(principal: &CurrentPrincipal) -> FilePrincipal {
	FilePrincipal {
		id: principal.id().to_string(),
		is_admin: principal.is_admin(),
	}
}

/// POST /api/storage/upload with `X-Filename` and optional `X-Metadata`.
pub async fn upload(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response> {
	let original_name = headers
		.get("x-filename")
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.unwrap_or("upload.bin")
		.to_string();

	let metadata = match headers.get("x-metadata").and_then(|v| v.to_str().ok()) {
		Some(raw) => Some(serde_json::from_str(raw).map_err(|e| {
			ServerError::BadRequest(format!("X-Metadata must be valid JSON: {e}"))
		})?),
		None => None,
	};

	let content_type = headers
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.filter(|v| !v.is_empty() && *v != "application/octet-stream")
		.map(str::to_string);

	let file = state
		.files
		.upload(
			body.to_vec(),
			&original_name,
			content_type.as_deref(),
			metadata,
			&file_principal(&principal),
		)
		.await?;

	let (ip, user_agent) = request_origin(&headers);
	let mut entry = NewAuditEntry {
		event_type: "file.upload".to_string(),
		entity_type: "file".to_string(),
		entity_id: file.id.clone(),
		data: Some(serde_json::json!({"name": file.original_name, "size": file.size_bytes})),
		ip,
		user_agent,
		..Default::default()
	};
	audit_actor(&mut entry, &principal);
	record_audit(&state.audit, entry);

	Ok(success(file))
}

/// GET /api/storage/files/{id} - payload bytes, honoring a single `Range`.
pub async fn download(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Result<Response> {
	let range = match headers.get(header::RANGE) {
		Some(value) => Some(parse_range(value.to_str().unwrap_or_default())?),
		None => None,
	};

	let content = state
		.files
		.read_bytes(&id, &file_principal(&principal), range)
		.await?;

	let mut response_headers = HeaderMap::new();
	response_headers.insert(
		header::CONTENT_TYPE,
		content
			.metadata
			.content_type
			.parse()
			.unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
	);
	response_headers.insert(header::ACCEPT_RANGES, header::HeaderValue::from_static("bytes"));

	match content.range {
		Some(range) => {
			let content_range = format!(
				"bytes {}-{}/{}",
				range.start,
				range.end - 1,
				range.total
			);
			response_headers.insert(
				header::CONTENT_RANGE,
				content_range
					.parse()
					.map_err(|_| ServerError::Internal("invalid content range".to_string()))?,
			);
			Ok((StatusCode::PARTIAL_CONTENT, response_headers, content.bytes).into_response())
		}
		None => Ok((StatusCode::OK, response_headers, content.bytes).into_response()),
	}
}

/// GET /api/storage/files/{id}/info
pub async fn info(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Path(id): Path<String>,
) -> Result<Response> {
	let metadata = state
		.files
		.get_metadata(&id, &file_principal(&principal))
		.await?;
	Ok(success(metadata))
}

/// DELETE /api/storage/files/{id}
pub async fn remove(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Result<Response> {
	state.files.delete(&id, &file_principal(&principal)).await?;

	let (ip, user_agent) = request_origin(&headers);
	let mut entry = NewAuditEntry {
		event_type: "file.delete".to_string(),
		entity_type: "file".to_string(),
		entity_id: id,
		ip,
		user_agent,
		..Default::default()
	};
	audit_actor(&mut entry, &principal);
	record_audit(&state.audit, entry);

	Ok(success(serde_json::json!({"deleted": true})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
	#[serde(default)]
	pub content_type: Option<String>,
	#[serde(default)]
	pub limit: Option<i64>,
	#[serde(default)]
	pub offset: Option<i64>,
}

/// GET /api/storage/files
pub async fn list(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Query(params): Query<ListParams>,
) -> Result<Response> {
	let files = state
		.files
		.list(
			&file_principal(&principal),
			ListOptions {
				content_type: params.content_type,
				search: None,
				limit: params.limit,
				offset: params.offset,
			},
		)
		.await?;
	Ok(success(files))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
	pub q: String,
	#[serde(default)]
	pub limit: Option<i64>,
	#[serde(default)]
	pub offset: Option<i64>,
}

/// GET /api/storage/search?q=
pub async fn search(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
	Query(params): Query<SearchParams>,
) -> Result<Response> {
	let files = state
		.files
		.list(
			&file_principal(&principal),
			ListOptions {
				content_type: None,
				search: Some(params.q),
				limit: params.limit,
				offset: params.offset,
			},
		)
		.await?;
	Ok(success(files))
}

/// GET /api/storage/stats - own totals, instance-wide for admins.
pub async fn stats(
	State(state): State<AppState>,
	Extension(principal): Extension<CurrentPrincipal>,
) -> Result<Response> {
	let scope = if principal.is_admin() {
		None
	} else {
		Some(file_principal(&principal))
	};
	let stats = state.files.stats(scope.as_ref()).await?;
	Ok(success(stats))
}

/// POST /api/admin/storage/cleanup (admin) - run the sweep now.
pub async fn cleanup(State(state): State<AppState>) -> Result<Response> {
	let report = state.files.sweep().await?;
	Ok(success(report))
}

/// Parse a single `bytes=start-end` range header.
fn parse_range(raw: &str) -> Result<(u64, Option<u64>)> {
	let spec = raw
		.strip_prefix("bytes=")
		.ok_or_else(|| ServerError::BadRequest("unsupported range unit".to_string()))?;
	if spec.contains(',') {
		return Err(ServerError::BadRequest(
			"multiple byte ranges are not supported".to_string(),
		));
	}
	let (start, end) = spec
		.split_once('-')
		.ok_or_else(|| ServerError::BadRequest("malformed range".to_string()))?;
	let start: u64 = start
		.parse()
		.map_err(|_| ServerError::BadRequest("malformed range start".to_string()))?;
	let end = if end.is_empty() {
		None
	} else {
		Some(
			end.parse::<u64>()
				.map_err(|_| ServerError::BadRequest("malformed range end".to_string()))?,
		)
	};
	if let Some(end) = end {
		if end < start {
			return Err(ServerError::BadRequest("malformed range".to_string()));
		}
	}
	Ok((start, end))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_range() {
		assert_eq!(parse_range("bytes=0-99").unwrap(), (0, Some(99)));
		assert_eq!(parse_range("bytes=100-").unwrap(), (100, None));
		assert!(parse_range("items=0-99").is_err());
		assert!(parse_range("bytes=0-99,200-299").is_err());
		assert!(parse_range("bytes=99-0").is_err());
		assert!(parse_range("bytes=abc-").is_err());
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The standardized response envelope.
//!
//! Every JSON response is
//! `{ success, data?, error?, metadata }` with the error carrying a stable
//! code from the translation table and the metadata carrying timestamp,
//! request id and API version.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The one supported API version.
pub const API_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
	pub code: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<serde_json::Value>,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
	pub timestamp: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
	pub version: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pagination: Option<serde_json::Value>,
}

impl ResponseMetadata {
	fn new(request_id: Option<String>) -> Self {
		Self {
			timestamp: Utc::now(),
			request_id,
			version: API_VERSION,
			pagination: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ApiErrorBody>,
	pub metadata: ResponseMetadata,
}

/// 200 envelope around `data`.
pub fn success<T: Serialize>(data: T) -> Response {
	success_with_request_id(data, None)
}

pub fn success_with_request_id<T: Serialize>(data: T, request_id: Option<String>) -> Response {
	(
		StatusCode::OK,
		Json(ApiEnvelope {
			success: true,
			data: Some(data),
			error: None,
			metadata: ResponseMetadata::new(request_id),
		}),
	)
		.into_response()
}

/// Error envelope with the given status and stable code.
pub fn failure(
	status: StatusCode,
	code: impl Into<String>,
	message: impl Into<String>,
) -> Response {
	(
		status,
		Json(ApiEnvelope::<()> {
			success: false,
			data: None,
			error: Some(ApiErrorBody {
				code: code.into(),
				message: message.into(),
				metadata: None,
				timestamp: Utc::now(),
			}),
			metadata: ResponseMetadata::new(None),
		}),
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_success_envelope_shape() {
		let envelope = ApiEnvelope {
			success: true,
			data: Some(serde_json::json!({"x": 1})),
			error: None,
			metadata: ResponseMetadata::new(Some("req-1".to_string())),
		};
		let json = serde_json::to_value(&envelope).unwrap();
		assert_eq!(json["success"], true);
		assert_eq!(json["data"]["x"], 1);
		assert!(json.get("error").is_none());
		assert_eq!(json["metadata"]["version"], "1.0");
		assert_eq!(json["metadata"]["requestId"], "req-1");
	}

	#[test]
	fn test_error_envelope_shape() {
		let envelope = ApiEnvelope::<()> {
			success: false,
			data: None,
			error: Some(ApiErrorBody {
				code: "NOT_FOUND".to_string(),
				message: "collection 'ghost'".to_string(),
				metadata: None,
				timestamp: Utc::now(),
			}),
			metadata: ResponseMetadata::new(None),
		};
		let json = serde_json::to_value(&envelope).unwrap();
		assert_eq!(json["success"], false);
		assert_eq!(json["error"]["code"], "NOT_FOUND");
		assert!(json.get("data").is_none());
	}
}

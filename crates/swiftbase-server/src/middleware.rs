// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request middleware: request ids, API versioning, validation, auth guards.
//!
//! The stack order is CORS -> logging -> panic translation -> request id ->
//! versioning -> validation -> route-level auth, matching how the layers are
//! applied in `main`.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use swiftbase_server_auth::{extract_bearer_token, PrincipalType};
use uuid::Uuid;

use crate::api::AppState;
use crate::api_response::{failure, API_VERSION};
use crate::error::ServerError;

/// Maximum JSON request body, enforced ahead of the handlers.
pub const MAX_JSON_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Upload endpoint exempt from the JSON content-type and body-size rules.
pub const UPLOAD_PATH: &str = "/api/storage/upload";

/// Request id assigned to every request, echoed in the envelope and logs.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn request_id(mut request: Request, next: Next) -> Response {
	let id = Uuid::new_v4().to_string();
	request.extensions_mut().insert(RequestId(id.clone()));

	let mut response = next.run(request).await;
	if let Ok(value) = HeaderValue::from_str(&id) {
		response.headers_mut().insert("X-Request-Id", value);
	}
	response
}

/// Reject unsupported `API-Version` requests and stamp the version headers
/// on every response. Path-based versioning is not used.
pub async fn versioning(request: Request, next: Next) -> Response {
	if let Some(requested) = request.headers().get("API-Version") {
		match requested.to_str() {
			Ok(version) if version == API_VERSION => {}
			_ => {
				return stamp_version_headers(failure(
					StatusCode::BAD_REQUEST,
					"BAD_REQUEST",
					format!("unsupported API version; supported: {API_VERSION}"),
				));
			}
		}
	}

	stamp_version_headers(next.run(request).await)
}

fn stamp_version_headers(mut response: Response) -> Response {
	let version = HeaderValue::from_static(API_VERSION);
	response.headers_mut().insert("API-Version", version.clone());
	response
		.headers_mut()
		.insert("API-Supported-Versions", version);
	response
}

/// Method allow-list, JSON content-type enforcement and body-size cap.
pub async fn validation(request: Request, next: Next) -> Response {
	const ALLOWED: &[Method] = &[
		Method::GET,
		Method::POST,
		Method::PUT,
		Method::PATCH,
		Method::DELETE,
		Method::OPTIONS,
		Method::HEAD,
	];
	if !ALLOWED.contains(request.method()) {
		return failure(
			StatusCode::METHOD_NOT_ALLOWED,
			"BAD_REQUEST",
			format!("method {} is not supported", request.method()),
		);
	}

	let is_upload = request.uri().path() == UPLOAD_PATH;
	let has_body_method = matches!(
		*request.method(),
		Method::POST | Method::PUT | Method::PATCH
	);

	if has_body_method && !is_upload {
		if let Some(content_type) = request
			.headers()
			.get(http::header::CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
		{
			if !content_type.starts_with("application/json") {
				return failure(
					StatusCode::UNSUPPORTED_MEDIA_TYPE,
					"UNSUPPORTED_MEDIA_TYPE",
					"request body must be application/json",
				);
			}
		}

		if let Some(length) = request
			.headers()
			.get(http::header::CONTENT_LENGTH)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse::<u64>().ok())
		{
			if length > MAX_JSON_BODY_BYTES {
				return failure(
					StatusCode::PAYLOAD_TOO_LARGE,
					"CONTENT_TOO_LARGE",
					format!("request body exceeds {MAX_JSON_BODY_BYTES} bytes"),
				);
			}
		}
	}

	next.run(request).await
}

/// Bearer auth for user-or-admin routes. Installs [`CurrentPrincipal`] and
/// the access claims as request extensions.
pub async fn require_user(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	let Some(token) = extract_bearer_token(request.headers()).map(str::to_string) else {
		return ServerError::Unauthorized("missing bearer token".to_string()).into_response();
	};
	match state.auth.authenticate(&token, None).await {
		Ok((claims, principal)) => {
			request.extensions_mut().insert(claims);
			request.extensions_mut().insert(principal);
			next.run(request).await
		}
		Err(e) => ServerError::from(e).into_response(),
	}
}

/// Bearer auth for admin-only routes.
pub async fn require_admin(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	let Some(token) = extract_bearer_token(request.headers()).map(str::to_string) else {
		return ServerError::Unauthorized("missing bearer token".to_string()).into_response();
	};
	match state
		.auth
		.authenticate(&token, Some(PrincipalType::Admin))
		.await
	{
		Ok((claims, principal)) => {
			request.extensions_mut().insert(claims);
			request.extensions_mut().insert(principal);
			next.run(request).await
		}
		Err(e) => ServerError::from(e).into_response(),
	}
}

/// Panic-to-500 translation used by the catch-panic layer.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
	let detail = panic
		.downcast_ref::<String>()
		.map(String::as_str)
		.or_else(|| panic.downcast_ref::<&str>().copied())
		.unwrap_or("panic");
	tracing::error!(detail, "request handler panicked");
	failure(
		StatusCode::INTERNAL_SERVER_ERROR,
		"INTERNAL_SERVER_ERROR",
		"internal server error",
	)
}


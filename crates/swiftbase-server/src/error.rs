// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-level error translation.
//!
//! Services surface their own error kinds; only this layer maps them onto
//! HTTP statuses and envelope codes. Kinds are never mapped into each other
//! below this point.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use swiftbase_server_auth::AuthError;
use swiftbase_server_db::DbError;
use swiftbase_server_query::QueryError;
use swiftbase_server_storage::StorageError;

use crate::api_response::failure;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	Validation(String),

	#[error("{0}")]
	Unauthorized(String),

	#[error("{0}")]
	Forbidden(String),

	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	PayloadTooLarge(String),

	#[error("{0}")]
	UnsupportedMediaType(String),

	#[error("{0}")]
	Database(String),

	#[error("{0}")]
	Internal(String),
}

impl ServerError {
	pub fn status(&self) -> StatusCode {
		match self {
			ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
			ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
			ServerError::NotFound(_) => StatusCode::NOT_FOUND,
			ServerError::Conflict(_) => StatusCode::CONFLICT,
			ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
			ServerError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
			ServerError::Database(_) | ServerError::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			ServerError::BadRequest(_) => "BAD_REQUEST",
			ServerError::Validation(_) => "VALIDATION_ERROR",
			ServerError::Unauthorized(_) => "UNAUTHORIZED",
			ServerError::Forbidden(_) => "FORBIDDEN",
			ServerError::NotFound(_) => "NOT_FOUND",
			ServerError::Conflict(_) => "CONFLICT",
			ServerError::PayloadTooLarge(_) => "CONTENT_TOO_LARGE",
			ServerError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
			ServerError::Database(_) => "DATABASE_ERROR",
			ServerError::Internal(_) => "INTERNAL_SERVER_ERROR",
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			tracing::error!(code = self.code(), error = %self, "request failed");
		}
		failure(status, self.code(), self.to_string())
	}
}

impl From<DbError> for ServerError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(message) => ServerError::NotFound(message),
			DbError::Conflict(message) => ServerError::Conflict(message),
			DbError::Sqlx(e) => ServerError::Database(e.to_string()),
			DbError::Internal(message) => ServerError::Database(message),
			DbError::Serialization(e) => ServerError::Database(e.to_string()),
		}
	}
}

impl From<AuthError> for ServerError {
	fn from(e: AuthError) -> Self {
		match e {
			AuthError::InvalidEmail => ServerError::Validation("invalid email address".to_string()),
			AuthError::WeakPassword(min) => {
				ServerError::Validation(format!("password must be at least {min} characters"))
			}
			AuthError::EmailTaken => ServerError::Conflict("email already registered".to_string()),
			AuthError::InvalidCredentials => {
				ServerError::Unauthorized("invalid credentials".to_string())
			}
			AuthError::InvalidRefresh => {
				ServerError::Unauthorized("invalid refresh token".to_string())
			}
			AuthError::Unauthorized => ServerError::Unauthorized("unauthorized".to_string()),
			AuthError::Hash(message) => ServerError::Internal(message),
			AuthError::Db(e) => e.into(),
		}
	}
}

impl From<QueryError> for ServerError {
	fn from(e: QueryError) -> Self {
		match e {
			QueryError::InvalidQuery(message) => ServerError::BadRequest(message),
			QueryError::CollectionNotFound(name) => {
				ServerError::NotFound(format!("collection '{name}' not found"))
			}
			QueryError::DocumentNotFound => ServerError::NotFound("document not found".to_string()),
			QueryError::CustomQueryNotFound(name) => {
				ServerError::NotFound(format!("custom query '{name}' not found"))
			}
			QueryError::NotImplemented(action) => {
				ServerError::BadRequest(format!("action '{action}' is not implemented"))
			}
			QueryError::Db(e) => e.into(),
		}
	}
}

impl From<StorageError> for ServerError {
	fn from(e: StorageError) -> Self {
		match e {
			StorageError::PayloadTooLarge { size, limit } => ServerError::PayloadTooLarge(format!(
				"payload of {size} bytes exceeds the {limit} byte limit"
			)),
			StorageError::NotFound => ServerError::NotFound("file not found".to_string()),
			StorageError::Forbidden => ServerError::Forbidden("forbidden".to_string()),
			StorageError::InvalidRange => {
				ServerError::BadRequest("unsatisfiable byte range".to_string())
			}
			StorageError::Io(e) => ServerError::Internal(e.to_string()),
			StorageError::Db(e) => e.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_and_code_table() {
		let cases: Vec<(ServerError, StatusCode, &str)> = vec![
			(
				ServerError::BadRequest(String::new()),
				StatusCode::BAD_REQUEST,
				"BAD_REQUEST",
			),
			(
				ServerError::Validation(String::new()),
				StatusCode::UNPROCESSABLE_ENTITY,
				"VALIDATION_ERROR",
			),
			(
				ServerError::Unauthorized(String::new()),
				StatusCode::UNAUTHORIZED,
				"UNAUTHORIZED",
			),
			(
				ServerError::Forbidden(String::new()),
				StatusCode::FORBIDDEN,
				"FORBIDDEN",
			),
			(
				ServerError::NotFound(String::new()),
				StatusCode::NOT_FOUND,
				"NOT_FOUND",
			),
			(
				ServerError::Conflict(String::new()),
				StatusCode::CONFLICT,
				"CONFLICT",
			),
			(
				ServerError::PayloadTooLarge(String::new()),
				StatusCode::PAYLOAD_TOO_LARGE,
				"CONTENT_TOO_LARGE",
			),
			(
				ServerError::UnsupportedMediaType(String::new()),
				StatusCode::UNSUPPORTED_MEDIA_TYPE,
				"UNSUPPORTED_MEDIA_TYPE",
			),
			(
				ServerError::Database(String::new()),
				StatusCode::INTERNAL_SERVER_ERROR,
				"DATABASE_ERROR",
			),
			(
				ServerError::Internal(String::new()),
				StatusCode::INTERNAL_SERVER_ERROR,
				"INTERNAL_SERVER_ERROR",
			),
		];
		for (error, status, code) in cases {
			assert_eq!(error.status(), status);
			assert_eq!(error.code(), code);
		}
	}

	#[test]
	fn test_auth_errors_do_not_disclose_principal_existence() {
		let missing: ServerError = AuthError::InvalidCredentials.into();
		assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(missing.to_string(), "invalid credentials");
	}
}

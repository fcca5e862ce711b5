// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication routes.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use swiftbase_server_auth::{AccessClaims, CurrentPrincipal};
use swiftbase_server_db::NewAuditEntry;

use super::{record_audit, request_origin};
use crate::api::AppState;
use crate::api_response::success;
use crate::error::{Result, ServerError};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
	pub email: String,
	pub password: String,
	#[serde(default)]
	pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
	pub username: String,
	pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
	pub refresh_token: String,
}

/// POST /api/auth/register
pub async fn register(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(body): Json<RegisterRequest>,
) -> Result<Response> {
	let session = state
		.auth
		.register(&body.email, &body.password, body.metadata)
		.await?;

	let (ip, user_agent) = request_origin(&headers);
	record_audit(
		&state.audit,
		NewAuditEntry {
			event_type: "user.register".to_string(),
			entity_type: "user".to_string(),
			entity_id: session.user.id.clone(),
			user_id: Some(session.user.id.clone()),
			ip,
			user_agent,
			..Default::default()
		},
	);
	Ok(success(session))
}

/// POST /api/auth/login
pub async fn login(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(body): Json<LoginRequest>,
) -> Result<Response> {
	let session = state.auth.login_user(&body.email, &body.password).await?;

	let (ip, user_agent) = request_origin(&headers);
	record_audit(
		&state.audit,
		NewAuditEntry {
			event_type: "user.login".to_string(),
			entity_type: "user".to_string(),
			entity_id: session.user.id.clone(),
			user_id: Some(session.user.id.clone()),
			ip,
			user_agent,
			..Default::default()
		},
	);
	Ok(success(session))
}

/// POST /api/auth/refresh
pub async fn refresh(
	State(state): State<AppState>,
	Json(body): Json<RefreshRequest>,
) -> Result<Response> {
	let tokens = state.auth.refresh(&body.refresh_token).await?;
	Ok(success(tokens))
}

/// POST /api/auth/logout - revokes every session of the caller.
pub async fn logout(
	State(state): State<AppState>,
	Extension(claims): Extension<AccessClaims>,
	Extension(principal): Extension<CurrentPrincipal>,
	headers: HeaderMap,
) -> Result<Response> {
	state.auth.logout(&claims).await?;

	let (ip, user_agent) = request_origin(&headers);
	let mut entry = NewAuditEntry {
		event_type: "auth.logout".to_string(),
		entity_type: principal_entity(&principal).to_string(),
		entity_id: principal.id().to_string(),
		ip,
		user_agent,
		..Default::default()
	};
	super::audit_actor(&mut entry, &principal);
	record_audit(&state.audit, entry);

	Ok(success(serde_json::json!({"loggedOut": true})))
}

/// GET /api/auth/me
pub async fn me(Extension(principal): Extension<CurrentPrincipal>) -> Result<Response> {
	match principal {
		CurrentPrincipal::User(user) => Ok(success(serde_json::json!({"user": user}))),
		CurrentPrincipal::Admin(admin) => Ok(success(serde_json::json!({"admin": admin}))),
	}
}

/// POST /api/admin/login
pub async fn admin_login(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(body): Json<AdminLoginRequest>,
) -> Result<Response> {
	let session = state
		.auth
		.login_admin(&body.username, &body.password)
		.await?;

	let (ip, user_agent) = request_origin(&headers);
	record_audit(
		&state.audit,
		NewAuditEntry {
			event_type: "admin.login".to_string(),
			entity_type: "admin".to_string(),
			entity_id: session.admin.id.clone(),
			admin_id: Some(session.admin.id.clone()),
			ip,
			user_agent,
			..Default::default()
		},
	);
	Ok(success(session))
}

/// GET /api/admin/me
pub async fn admin_me(Extension(principal): Extension<CurrentPrincipal>) -> Result<Response> {
	match principal {
		CurrentPrincipal::Admin(admin) => Ok(success(serde_json::json!({"admin": admin}))),
		CurrentPrincipal::User(_) => {
			Err(ServerError::Forbidden("admin access required".to_string()))
		}
	}
}

fn principal_entity(principal: &CurrentPrincipal) -> &'static str {
	match principal {
		CurrentPrincipal::User(_) => "user",
		CurrentPrincipal::Admin(_) => "admin",
	}
}

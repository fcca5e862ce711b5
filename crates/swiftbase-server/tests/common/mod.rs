// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared integration-test harness: isolated on-disk database, bootstrap
//! admin, and request helpers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use swiftbase_server::{bootstrap_admin, create_app, create_app_state, AppState, ServerConfig};
use swiftbase_server_db::StorageKernel;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "AdminPass123!";

pub async fn setup() -> (Router, AppState, tempfile::TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let db_path = dir.path().join("test.db");
	let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

	let kernel = Arc::new(StorageKernel::open(&db_url).await.unwrap());
	swiftbase_server_db::run_migrations(&kernel).await.unwrap();

	let mut config = ServerConfig::default();
	config.auth.jwt_secret = "integration-test-secret-0123456789ab".to_string();
	config.auth.bootstrap_admin_username = ADMIN_USERNAME.to_string();
	config.auth.bootstrap_admin_password = ADMIN_PASSWORD.to_string();
	config.storage.files_dir = dir.path().join("storage").display().to_string();

	let state = create_app_state(kernel, &config).await;
	bootstrap_admin(&state).await.unwrap();

	(create_app(state.clone()), state, dir)
}

pub async fn send_json(
	app: &Router,
	method: &str,
	path: &str,
	token: Option<&str>,
	body: Option<Value>,
) -> (StatusCode, Value) {
	let mut builder = Request::builder().method(method).uri(path);
	if let Some(token) = token {
		builder = builder.header("Authorization", format!("Bearer {token}"));
	}
	let request = match body {
		Some(body) => builder
			.header("Content-Type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap(),
		None => builder.body(Body::empty()).unwrap(),
	};

	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	let value = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).unwrap_or(Value::Null)
	};
	(status, value)
}

pub async fn post(
	app: &Router,
	path: &str,
	token: Option<&str>,
	body: Value,
) -> (StatusCode, Value) {
	send_json(app, "POST", path, token, Some(body)).await
}

pub async fn get(app: &Router, path: &str, token: Option<&str>) -> (StatusCode, Value) {
	send_json(app, "GET", path, token, None).await
}

/// Register a user and return (access token, refresh token, user id).
pub async fn register_user(app: &Router, email: &str) -> (String, String, String) {
	let (status, body) = post(
		app,
		"/api/auth/register",
		None,
		serde_json::json!({"email": email, "password": "SecurePass123!"}),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "register failed: {body}");
	(
		body["data"]["accessToken"].as_str().unwrap().to_string(),
		body["data"]["refreshToken"].as_str().unwrap().to_string(),
		body["data"]["user"]["id"].as_str().unwrap().to_string(),
	)
}

/// Log the bootstrap admin in and return its access token.
pub async fn admin_token(app: &Router) -> String {
	let (status, body) = post(
		app,
		"/api/admin/login",
		None,
		serde_json::json!({"username": ADMIN_USERNAME, "password": ADMIN_PASSWORD}),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
	body["data"]["accessToken"].as_str().unwrap().to_string()
}

/// Create a collection through the admin API.
pub async fn create_collection(app: &Router, admin_token: &str, name: &str) {
	let (status, body) = post(
		app,
		"/api/admin/collections",
		Some(admin_token),
		serde_json::json!({"name": name}),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "create collection failed: {body}");
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router assembly.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use swiftbase_server_auth::{AuthService, TokenService};
use swiftbase_server_config::ServerConfig;
use swiftbase_server_db::{
	AuditRepository, CollectionRepository, CustomQueryRepository, FileRepository,
	PrincipalRepository, StorageKernel,
};
use swiftbase_server_query::{CustomQueryRegistry, QueryService};
use swiftbase_server_realtime::RealtimeHub;
use swiftbase_server_storage::FileService;

use crate::middleware::{require_admin, require_user, MAX_JSON_BODY_BYTES};
use crate::{routes, websocket};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub kernel: Arc<StorageKernel>,
	pub collections: Arc<CollectionRepository>,
	pub principals: Arc<PrincipalRepository>,
	pub audit: Arc<AuditRepository>,
	pub auth: Arc<AuthService>,
	pub query: Arc<QueryService>,
	pub registry: Arc<CustomQueryRegistry>,
	pub files: Arc<FileService>,
	pub hub: Arc<RealtimeHub>,
	pub config: ServerConfig,
}

/// Creates the application state, wiring every service to the one kernel.
pub async fn create_app_state(kernel: Arc<StorageKernel>, config: &ServerConfig) -> AppState {
	let collections = Arc::new(CollectionRepository::new(Arc::clone(&kernel)));
	let principals = Arc::new(PrincipalRepository::new(Arc::clone(&kernel)));
	let audit = Arc::new(AuditRepository::new(Arc::clone(&kernel)));
	let custom_queries = Arc::new(CustomQueryRepository::new(Arc::clone(&kernel)));
	let files_repo = Arc::new(FileRepository::new(Arc::clone(&kernel)));

	let secret = resolve_jwt_secret(config);
	let tokens = TokenService::new(
		secret.as_bytes(),
		config.auth.access_token_ttl_secs,
		config.auth.refresh_token_ttl_secs,
	);
	let auth = Arc::new(AuthService::new(Arc::clone(&principals), tokens));

	let registry = Arc::new(CustomQueryRegistry::new(custom_queries));
	let hub = Arc::new(RealtimeHub::new(config.realtime.clone()));
	let query = Arc::new(QueryService::new(
		Arc::clone(&kernel),
		Arc::clone(&collections),
		Arc::clone(&registry),
		Arc::clone(&hub),
	));

	let files = Arc::new(FileService::new(
		files_repo,
		&config.storage.files_dir,
		config.storage.max_upload_bytes,
		config.storage.sweep_batch_size,
	));

	AppState {
		kernel,
		collections,
		principals,
		audit,
		auth,
		query,
		registry,
		files,
		hub,
		config: config.clone(),
	}
}

fn resolve_jwt_secret(config: &ServerConfig) -> String {
	if !config.auth.jwt_secret.is_empty() {
		return config.auth.jwt_secret.clone();
	}
	tracing::warn!(
		"no SWIFTBASE_JWT_SECRET configured; using an ephemeral secret, tokens will not survive a restart"
	);
	format!(
		"{}{}",
		uuid::Uuid::new_v4().simple(),
		uuid::Uuid::new_v4().simple()
	)
}

/// Create the first admin from configuration when none exists.
pub async fn bootstrap_admin(state: &AppState) -> Result<(), crate::error::ServerError> {
	if state.principals.count_admins().await? > 0 {
		return Ok(());
	}

	let username = state.config.auth.bootstrap_admin_username.clone();
	let (password, generated) = if state.config.auth.bootstrap_admin_password.is_empty() {
		(uuid::Uuid::new_v4().simple().to_string(), true)
	} else {
		(state.config.auth.bootstrap_admin_password.clone(), false)
	};

	let password_for_hash = password.clone();
	let hash = tokio::task::spawn_blocking(move || {
		swiftbase_server_auth::hash_password(&password_for_hash)
	})
	.await
	.map_err(|e| crate::error::ServerError::Internal(e.to_string()))?
	.map_err(|e| crate::error::ServerError::Internal(e.to_string()))?;

	state.principals.create_admin(&username, &hash).await?;
	if generated {
		tracing::warn!(
			username = %username,
			password = %password,
			"bootstrap admin created with a generated password; change it immediately"
		);
	} else {
		tracing::info!(username = %username, "bootstrap admin created");
	}
	Ok(())
}

/// Assemble the full route table. The cross-cutting layers (CORS, tracing,
/// panic translation, request id, versioning, validation) are applied by the
/// caller around this router.
pub fn create_router(state: AppState) -> Router {
	let user_auth = axum::middleware::from_fn_with_state(state.clone(), require_user);
	let admin_auth = axum::middleware::from_fn_with_state(state.clone(), require_admin);

	let public = Router::new()
		.route("/health", get(routes::health::health))
		.route("/health/db", get(routes::health::health_db))
		.route("/api", get(routes::info::server_info))
		.route("/api/auth/register", post(routes::auth::register))
		.route("/api/auth/login", post(routes::auth::login))
		.route("/api/auth/refresh", post(routes::auth::refresh))
		.route("/api/admin/login", post(routes::auth::admin_login))
		.route("/api/realtime", get(websocket::ws_upgrade_handler));

	let user = Router::new()
		.route("/api/auth/logout", post(routes::auth::logout))
		.route("/api/auth/me", get(routes::auth::me))
		.route("/api/query", post(routes::query::execute))
		.route("/api/bulk", post(routes::collections::bulk))
		.route("/api/admin/collections", get(routes::collections::list))
		.route("/api/admin/collections/{name}", get(routes::collections::get_one))
		.route(
			"/api/admin/collections/{name}/stats",
			get(routes::collections::stats),
		)
		.route(
			"/api/storage/files/{id}",
			get(routes::storage::download).delete(routes::storage::remove),
		)
		.route("/api/storage/files/{id}/info", get(routes::storage::info))
		.route("/api/storage/files", get(routes::storage::list))
		.route("/api/storage/search", get(routes::storage::search))
		.route("/api/storage/stats", get(routes::storage::stats))
		.layer(user_auth.clone());

	let upload = Router::new()
		.route("/api/storage/upload", post(routes::storage::upload))
		.layer(user_auth)
		.layer(DefaultBodyLimit::max(
			state.config.storage.max_upload_bytes as usize + 1024 * 1024,
		));

	let admin = Router::new()
		.route("/api/admin/me", get(routes::auth::admin_me))
		.route("/api/admin/collections", post(routes::collections::create))
		.route(
			"/api/admin/collections/{name}",
			put(routes::collections::update).delete(routes::collections::remove),
		)
		.route("/api/admin/storage/cleanup", post(routes::storage::cleanup))
		.route("/api/admin/queries", get(routes::admin::list_queries))
		.route("/api/admin/realtime/stats", get(routes::admin::realtime_stats))
		.route("/api/admin/audit", get(routes::admin::audit_log))
		.layer(admin_auth);

	public
		.merge(user)
		.merge(upload)
		.merge(admin)
		.layer(DefaultBodyLimit::max(MAX_JSON_BODY_BYTES as usize))
		.with_state(state)
}

/// Router plus the cross-cutting middleware (panic translation, request id,
/// versioning, validation). The binary additionally layers CORS, tracing and
/// the request timeout on top.
pub fn create_app(state: AppState) -> Router {
	create_router(state)
		.layer(axum::middleware::from_fn(crate::middleware::validation))
		.layer(axum::middleware::from_fn(crate::middleware::versioning))
		.layer(axum::middleware::from_fn(crate::middleware::request_id))
		.layer(tower_http::catch_panic::CatchPanicLayer::custom(
			crate::middleware::panic_response,
		))
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod collections;
pub mod health;
pub mod info;
pub mod query;
pub mod storage;

use std::sync::Arc;

use axum::http::HeaderMap;
use swiftbase_server_auth::CurrentPrincipal;
use swiftbase_server_db::{AuditRepository, NewAuditEntry};

/// Client ip and user agent for audit entries.
pub(crate) fn request_origin(headers: &HeaderMap) -> (Option<String>, Option<String>) {
	let ip = headers
		.get("x-forwarded-for")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.split(',').next())
		.map(|v| v.trim().to_string());
	let user_agent = headers
		.get(http::header::USER_AGENT)
		.and_then(|v| v.to_str().ok())
		.map(str::to_string);
	(ip, user_agent)
}

/// Audit entries are appended off the request path; a failed append is
/// logged, never surfaced.
pub(crate) fn record_audit(audit: &Arc<AuditRepository>, entry: NewAuditEntry) {
	let audit = Arc::clone(audit);
	tokio::spawn(async move {
		if let Err(e) = audit.append(entry).await {
			tracing::warn!(error = %e, "failed to append audit entry");
		}
	});
}

/// Fill the principal columns of an audit entry.
pub(crate) fn audit_actor(entry: &mut NewAuditEntry, principal: &CurrentPrincipal) {
	match principal {
		CurrentPrincipal::User(user) => entry.user_id = Some(user.id.clone()),
		CurrentPrincipal::Admin(admin) => entry.admin_id = Some(admin.id.clone()),
	}
}

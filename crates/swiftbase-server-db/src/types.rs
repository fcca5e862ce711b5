// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Row types shared by the repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named container of documents. `schema`, `indexes` and `metadata` are
/// stored verbatim; nothing validates documents against them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
	pub id: String,
	pub name: String,
	pub schema: Option<serde_json::Value>,
	pub indexes: Option<serde_json::Value>,
	pub metadata: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A collection plus its derived document count.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionWithCount {
	#[serde(flatten)]
	pub collection: Collection,
	pub document_count: i64,
}

/// Per-collection statistics derived from the documents table.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
	pub document_count: i64,
	pub total_size_estimate: i64,
	pub average_document_size: i64,
	pub index_count: i64,
	pub oldest_created_at: Option<DateTime<Utc>>,
	pub newest_created_at: Option<DateTime<Utc>>,
}

/// A stored document row with its parsed JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
	pub id: String,
	pub data: serde_json::Value,
	pub version: i64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub created_by: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub updated_by: Option<String>,
}

/// One outstanding refresh token on a principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRecord {
	pub jti: String,
	pub issued_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

/// A registered end user. `password_hash` never leaves this crate's callers;
/// profile serialization happens on a dedicated view type upstream.
#[derive(Debug, Clone)]
pub struct User {
	pub id: String,
	pub email: String,
	pub password_hash: String,
	pub metadata: Option<serde_json::Value>,
	pub refresh_tokens: Vec<RefreshTokenRecord>,
	pub email_verified: bool,
	pub last_login: Option<DateTime<Utc>>,
	pub last_revoked_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// An administrator. Admins are not users.
#[derive(Debug, Clone)]
pub struct Admin {
	pub id: String,
	pub username: String,
	pub password_hash: String,
	pub refresh_tokens: Vec<RefreshTokenRecord>,
	pub last_login: Option<DateTime<Utc>>,
	pub last_revoked_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Metadata for one stored file.
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
	pub id: String,
	pub stored_name: String,
	pub original_name: String,
	pub content_type: String,
	pub size_bytes: i64,
	#[serde(skip_serializing)]
	pub path: String,
	pub metadata: Option<serde_json::Value>,
	pub uploaded_by: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Aggregate file totals.
#[derive(Debug, Clone, Serialize)]
pub struct FileStats {
	pub file_count: i64,
	pub total_bytes: i64,
}

/// One append-only audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
	pub id: i64,
	pub event_type: String,
	pub entity_type: String,
	pub entity_id: String,
	pub user_id: Option<String>,
	pub admin_id: Option<String>,
	pub data: Option<serde_json::Value>,
	pub ip: Option<String>,
	pub user_agent: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Fields for a new audit entry.
#[derive(Debug, Clone, Default)]
pub struct NewAuditEntry {
	pub event_type: String,
	pub entity_type: String,
	pub entity_id: String,
	pub user_id: Option<String>,
	pub admin_id: Option<String>,
	pub data: Option<serde_json::Value>,
	pub ip: Option<String>,
	pub user_agent: Option<String>,
}

/// Stored metadata describing a registered custom query.
#[derive(Debug, Clone, Serialize)]
pub struct CustomQueryMeta {
	pub id: String,
	pub name: String,
	pub description: Option<String>,
	pub params: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

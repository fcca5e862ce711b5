// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only audit trail.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

use crate::collections::parse_json_column;
use crate::error::Result;
use crate::kernel::{now_rfc3339, parse_timestamp, StorageKernel};
use crate::types::{AuditEntry, NewAuditEntry};

/// Filters for querying the audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
	pub event_type: Option<String>,
	pub entity_type: Option<String>,
	pub entity_id: Option<String>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

pub struct AuditRepository {
	kernel: Arc<StorageKernel>,
}

impl AuditRepository {
	pub fn new(kernel: Arc<StorageKernel>) -> Self {
		Self { kernel }
	}

	#[tracing::instrument(skip(self, entry))]
	pub async fn append(&self, entry: NewAuditEntry) -> Result<()> {
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					sqlx::query(
						"INSERT INTO audit_log (event_type, entity_type, entity_id, user_id, admin_id, data, ip, user_agent, created_at) \
						 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
					)
					.bind(&entry.event_type)
					.bind(&entry.entity_type)
					.bind(&entry.entity_id)
					.bind(&entry.user_id)
					.bind(&entry.admin_id)
					.bind(entry.data.as_ref().map(serde_json::Value::to_string))
					.bind(&entry.ip)
					.bind(&entry.user_agent)
					.bind(now_rfc3339())
					.execute(&mut *conn)
					.await?;
					Ok(())
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn query(&self, filter: AuditFilter) -> Result<(Vec<AuditEntry>, i64)> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let limit = filter.limit.unwrap_or(50).clamp(1, 1000);
					let offset = filter.offset.unwrap_or(0).max(0);

					let mut conditions = vec!["1=1".to_string()];
					if filter.event_type.is_some() {
						conditions.push("event_type = ?".to_string());
					}
					if filter.entity_type.is_some() {
						conditions.push("entity_type = ?".to_string());
					}
					if filter.entity_id.is_some() {
						conditions.push("entity_id = ?".to_string());
					}
					let where_clause = conditions.join(" AND ");

					let count_sql =
						format!("SELECT COUNT(*) AS cnt FROM audit_log WHERE {where_clause}");
					let mut count_query = sqlx::query(&count_sql);
					if let Some(v) = &filter.event_type {
						count_query = count_query.bind(v);
					}
					if let Some(v) = &filter.entity_type {
						count_query = count_query.bind(v);
					}
					if let Some(v) = &filter.entity_id {
						count_query = count_query.bind(v);
					}
					let total: i64 = count_query.fetch_one(&mut *conn).await?.get("cnt");

					let data_sql = format!(
						"SELECT * FROM audit_log WHERE {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
					);
					let mut data_query = sqlx::query(&data_sql);
					if let Some(v) = &filter.event_type {
						data_query = data_query.bind(v);
					}
					if let Some(v) = &filter.entity_type {
						data_query = data_query.bind(v);
					}
					if let Some(v) = &filter.entity_id {
						data_query = data_query.bind(v);
					}
					data_query = data_query.bind(limit).bind(offset);

					let rows = data_query.fetch_all(&mut *conn).await?;
					let entries: Result<Vec<AuditEntry>> =
						rows.iter().map(entry_from_row).collect();
					Ok((entries?, total))
				})
			})
			.await
	}
}

fn entry_from_row(row: &SqliteRow) -> Result<AuditEntry> {
	let created_at: String = row.get("created_at");
	Ok(AuditEntry {
		id: row.get("id"),
		event_type: row.get("event_type"),
		entity_type: row.get("entity_type"),
		entity_id: row.get("entity_id"),
		user_id: row.get("user_id"),
		admin_id: row.get("admin_id"),
		data: parse_json_column(row.get("data"))?,
		ip: row.get("ip"),
		user_agent: row.get("user_agent"),
		created_at: parse_timestamp(&created_at)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_kernel;

	async fn repo() -> AuditRepository {
		AuditRepository::new(Arc::new(create_test_kernel().await))
	}

	fn login_entry(entity_id: &str) -> NewAuditEntry {
		NewAuditEntry {
			event_type: "user.login".to_string(),
			entity_type: "user".to_string(),
			entity_id: entity_id.to_string(),
			user_id: Some(entity_id.to_string()),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_append_and_query() {
		let repo = repo().await;
		repo.append(login_entry("u1")).await.unwrap();
		repo.append(login_entry("u2")).await.unwrap();
		repo.append(NewAuditEntry {
			event_type: "collection.create".to_string(),
			entity_type: "collection".to_string(),
			entity_id: "c1".to_string(),
			..Default::default()
		})
		.await
		.unwrap();

		let (all, total) = repo.query(AuditFilter::default()).await.unwrap();
		assert_eq!(total, 3);
		assert_eq!(all.len(), 3);
		// Newest first.
		assert_eq!(all[0].event_type, "collection.create");

		let (logins, total) = repo
			.query(AuditFilter {
				event_type: Some("user.login".to_string()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 2);
		assert!(logins.iter().all(|e| e.event_type == "user.login"));
	}

	#[tokio::test]
	async fn test_query_pagination() {
		let repo = repo().await;
		for i in 0..5 {
			repo.append(login_entry(&format!("u{i}"))).await.unwrap();
		}
		let (page, total) = repo
			.query(AuditFilter {
				limit: Some(2),
				offset: Some(2),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 5);
		assert_eq!(page.len(), 2);
	}
}

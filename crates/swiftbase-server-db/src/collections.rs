// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collection rows and their statistics.
//!
//! Deleting a non-empty collection requires cascade; the cascade deletes the
//! documents and the collection row inside one write scope, so either both
//! survive or neither does.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::kernel::{now_rfc3339, parse_timestamp, StorageKernel};
use crate::types::{Collection, CollectionStats, CollectionWithCount};

const COLLECTION_COLUMNS: &str = "id, name, schema, indexes, metadata, created_at, updated_at";

pub struct CollectionRepository {
	kernel: Arc<StorageKernel>,
}

impl CollectionRepository {
	pub fn new(kernel: Arc<StorageKernel>) -> Self {
		Self { kernel }
	}

	#[tracing::instrument(skip(self, schema, indexes, metadata))]
	pub async fn create(
		&self,
		name: &str,
		schema: Option<serde_json::Value>,
		indexes: Option<serde_json::Value>,
		metadata: Option<serde_json::Value>,
	) -> Result<Collection> {
		let name = name.to_string();
		let id = Uuid::new_v4().to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let taken = sqlx::query("SELECT 1 FROM collections WHERE name = ?")
						.bind(&name)
						.fetch_optional(&mut *conn)
						.await?;
					if taken.is_some() {
						return Err(DbError::Conflict(format!(
							"collection '{name}' already exists"
						)));
					}

					let now = now_rfc3339();
					sqlx::query(
						"INSERT INTO collections (id, name, schema, indexes, metadata, created_at, updated_at) \
						 VALUES (?, ?, ?, ?, ?, ?, ?)",
					)
					.bind(&id)
					.bind(&name)
					.bind(schema.as_ref().map(serde_json::Value::to_string))
					.bind(indexes.as_ref().map(serde_json::Value::to_string))
					.bind(metadata.as_ref().map(serde_json::Value::to_string))
					.bind(&now)
					.bind(&now)
					.execute(&mut *conn)
					.await?;

					let row = sqlx::query(&format!(
						"SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?"
					))
					.bind(&id)
					.fetch_one(&mut *conn)
					.await?;
					collection_from_row(&row)
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_name(&self, name: &str) -> Result<Option<Collection>> {
		let name = name.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query(&format!(
						"SELECT {COLLECTION_COLUMNS} FROM collections WHERE name = ?"
					))
					.bind(&name)
					.fetch_optional(&mut *conn)
					.await?;
					row.as_ref().map(collection_from_row).transpose()
				})
			})
			.await
	}

	/// Resolve a collection name to its id, for the query plane.
	pub async fn resolve_id(&self, name: &str) -> Result<Option<String>> {
		let name = name.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT id FROM collections WHERE name = ?")
						.bind(&name)
						.fetch_optional(&mut *conn)
						.await?;
					Ok(row.map(|r| r.get("id")))
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_with_counts(&self) -> Result<Vec<CollectionWithCount>> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let rows = sqlx::query(&format!(
						"SELECT {COLLECTION_COLUMNS}, \
						 (SELECT COUNT(*) FROM documents d WHERE d.collection_id = collections.id) AS document_count \
						 FROM collections ORDER BY name",
					))
					.fetch_all(&mut *conn)
					.await?;

					rows.iter()
						.map(|row| {
							Ok(CollectionWithCount {
								collection: collection_from_row(row)?,
								document_count: row.get("document_count"),
							})
						})
						.collect()
				})
			})
			.await
	}

	#[tracing::instrument(skip(self, schema, indexes, metadata))]
	pub async fn update(
		&self,
		name: &str,
		schema: Option<serde_json::Value>,
		indexes: Option<serde_json::Value>,
		metadata: Option<serde_json::Value>,
	) -> Result<Collection> {
		let name = name.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let existing = sqlx::query("SELECT id FROM collections WHERE name = ?")
						.bind(&name)
						.fetch_optional(&mut *conn)
						.await?;
					let id: String = match existing {
						Some(row) => row.get("id"),
						None => {
							return Err(DbError::NotFound(format!("collection '{name}'")));
						}
					};

					// updated_at is trigger-owned; only payload columns change here.
					sqlx::query(
						"UPDATE collections SET \
						 schema = COALESCE(?, schema), \
						 indexes = COALESCE(?, indexes), \
						 metadata = COALESCE(?, metadata) \
						 WHERE id = ?",
					)
					.bind(schema.as_ref().map(serde_json::Value::to_string))
					.bind(indexes.as_ref().map(serde_json::Value::to_string))
					.bind(metadata.as_ref().map(serde_json::Value::to_string))
					.bind(&id)
					.execute(&mut *conn)
					.await?;

					let row = sqlx::query(&format!(
						"SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?"
					))
					.bind(&id)
					.fetch_one(&mut *conn)
					.await?;
					collection_from_row(&row)
				})
			})
			.await
	}

	/// Delete a collection. Without `cascade`, a non-empty collection is a
	/// conflict carrying the document count. With cascade, documents and the
	/// collection row go in the same write scope.
	///
	/// Returns the number of documents removed.
	#[tracing::instrument(skip(self))]
	pub async fn delete(&self, name: &str, cascade: bool) -> Result<i64> {
		let name = name.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let existing = sqlx::query("SELECT id FROM collections WHERE name = ?")
						.bind(&name)
						.fetch_optional(&mut *conn)
						.await?;
					let id: String = match existing {
						Some(row) => row.get("id"),
						None => {
							return Err(DbError::NotFound(format!("collection '{name}'")));
						}
					};

					let count_row =
						sqlx::query("SELECT COUNT(*) AS cnt FROM documents WHERE collection_id = ?")
							.bind(&id)
							.fetch_one(&mut *conn)
							.await?;
					let document_count: i64 = count_row.get("cnt");

					if document_count > 0 && !cascade {
						return Err(DbError::Conflict(format!(
							"collection '{name}' holds {document_count} documents; pass cascade=true to delete them"
						)));
					}

					sqlx::query("DELETE FROM documents WHERE collection_id = ?")
						.bind(&id)
						.execute(&mut *conn)
						.await?;
					sqlx::query("DELETE FROM collections WHERE id = ?")
						.bind(&id)
						.execute(&mut *conn)
						.await?;

					Ok(document_count)
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn stats(&self, name: &str) -> Result<CollectionStats> {
		let name = name.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query(
						"SELECT id, indexes FROM collections WHERE name = ?",
					)
					.bind(&name)
					.fetch_optional(&mut *conn)
					.await?;
					let (id, indexes): (String, Option<String>) = match row {
						Some(row) => (row.get("id"), row.get("indexes")),
						None => {
							return Err(DbError::NotFound(format!("collection '{name}'")));
						}
					};

					let index_count = indexes
						.as_deref()
						.and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
						.and_then(|v| v.as_array().map(|a| a.len() as i64))
						.unwrap_or(0);

					let stats_row = sqlx::query(
						"SELECT COUNT(*) AS cnt, \
						 COALESCE(SUM(LENGTH(data)), 0) AS total_size, \
						 MIN(created_at) AS oldest, \
						 MAX(created_at) AS newest \
						 FROM documents WHERE collection_id = ?",
					)
					.bind(&id)
					.fetch_one(&mut *conn)
					.await?;

					let document_count: i64 = stats_row.get("cnt");
					let total_size_estimate: i64 = stats_row.get("total_size");
					let oldest: Option<String> = stats_row.get("oldest");
					let newest: Option<String> = stats_row.get("newest");

					Ok(CollectionStats {
						document_count,
						total_size_estimate,
						average_document_size: if document_count > 0 {
							total_size_estimate / document_count
						} else {
							0
						},
						index_count,
						oldest_created_at: oldest.as_deref().map(parse_timestamp).transpose()?,
						newest_created_at: newest.as_deref().map(parse_timestamp).transpose()?,
					})
				})
			})
			.await
	}
}

fn collection_from_row(row: &SqliteRow) -> Result<Collection> {
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	Ok(Collection {
		id: row.get("id"),
		name: row.get("name"),
		schema: parse_json_column(row.get("schema"))?,
		indexes: parse_json_column(row.get("indexes"))?,
		metadata: parse_json_column(row.get("metadata"))?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}

pub(crate) fn parse_json_column(raw: Option<String>) -> Result<Option<serde_json::Value>> {
	raw.as_deref()
		.map(serde_json::from_str)
		.transpose()
		.map_err(DbError::from)
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File metadata rows. Byte payloads are owned by the storage service; this
//! repository only tracks the descriptors.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

use crate::collections::parse_json_column;
use crate::error::{DbError, Result};
use crate::kernel::{now_rfc3339, parse_timestamp, StorageKernel};
use crate::types::{FileMetadata, FileStats};

pub struct NewFileMetadata {
	pub id: String,
	pub stored_name: String,
	pub original_name: String,
	pub content_type: String,
	pub size_bytes: i64,
	pub path: String,
	pub metadata: Option<serde_json::Value>,
	pub uploaded_by: Option<String>,
}

/// Filters for listing and searching file metadata.
#[derive(Debug, Clone, Default)]
pub struct FileListFilter {
	/// Restrict to one uploader; `None` lists every principal's files.
	pub uploaded_by: Option<String>,
	pub content_type: Option<String>,
	/// Substring match against the original name.
	pub search: Option<String>,
	pub limit: i64,
	pub offset: i64,
}

pub struct FileRepository {
	kernel: Arc<StorageKernel>,
}

impl FileRepository {
	pub fn new(kernel: Arc<StorageKernel>) -> Self {
		Self { kernel }
	}

	#[tracing::instrument(skip(self, file))]
	pub async fn insert(&self, file: NewFileMetadata) -> Result<FileMetadata> {
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let now = now_rfc3339();
					sqlx::query(
						"INSERT INTO files (id, stored_name, original_name, content_type, size_bytes, path, metadata, uploaded_by, created_at) \
						 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
					)
					.bind(&file.id)
					.bind(&file.stored_name)
					.bind(&file.original_name)
					.bind(&file.content_type)
					.bind(file.size_bytes)
					.bind(&file.path)
					.bind(file.metadata.as_ref().map(serde_json::Value::to_string))
					.bind(&file.uploaded_by)
					.bind(&now)
					.execute(&mut *conn)
					.await?;

					let row = sqlx::query("SELECT * FROM files WHERE id = ?")
						.bind(&file.id)
						.fetch_one(&mut *conn)
						.await?;
					file_from_row(&row)
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<Option<FileMetadata>> {
		let id = id.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT * FROM files WHERE id = ?")
						.bind(&id)
						.fetch_optional(&mut *conn)
						.await?;
					row.as_ref().map(file_from_row).transpose()
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete(&self, id: &str) -> Result<bool> {
		let id = id.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let result = sqlx::query("DELETE FROM files WHERE id = ?")
						.bind(&id)
						.execute(&mut *conn)
						.await?;
					Ok(result.rows_affected() > 0)
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list(&self, filter: FileListFilter) -> Result<Vec<FileMetadata>> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let mut conditions = vec!["1=1".to_string()];
					if filter.uploaded_by.is_some() {
						conditions.push("uploaded_by = ?".to_string());
					}
					if filter.content_type.is_some() {
						conditions.push("content_type = ?".to_string());
					}
					if filter.search.is_some() {
						conditions.push("original_name LIKE ? ESCAPE '\\'".to_string());
					}
					let where_clause = conditions.join(" AND ");

					let sql = format!(
						"SELECT * FROM files WHERE {where_clause} ORDER BY created_at DESC LIMIT ? OFFSET ?"
					);
					let mut query = sqlx::query(&sql);
					if let Some(v) = &filter.uploaded_by {
						query = query.bind(v);
					}
					if let Some(v) = &filter.content_type {
						query = query.bind(v);
					}
					if let Some(v) = &filter.search {
						query = query.bind(format!("%{}%", escape_like(v)));
					}
					query = query.bind(filter.limit.clamp(1, 1000)).bind(filter.offset.max(0));

					let rows = query.fetch_all(&mut *conn).await?;
					rows.iter().map(file_from_row).collect()
				})
			})
			.await
	}

	/// Totals for one uploader, or instance-wide when `uploaded_by` is None.
	#[tracing::instrument(skip(self))]
	pub async fn stats(&self, uploaded_by: Option<String>) -> Result<FileStats> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = match &uploaded_by {
						Some(uploader) => {
							sqlx::query(
								"SELECT COUNT(*) AS cnt, COALESCE(SUM(size_bytes), 0) AS total \
								 FROM files WHERE uploaded_by = ?",
							)
							.bind(uploader)
							.fetch_one(&mut *conn)
							.await?
						}
						None => {
							sqlx::query(
								"SELECT COUNT(*) AS cnt, COALESCE(SUM(size_bytes), 0) AS total FROM files",
							)
							.fetch_one(&mut *conn)
							.await?
						}
					};
					Ok(FileStats {
						file_count: row.get("cnt"),
						total_bytes: row.get("total"),
					})
				})
			})
			.await
	}

	/// Every stored name currently referenced by a metadata row. Used by the
	/// sweep to find payloads without a row.
	pub async fn all_stored_names(&self) -> Result<Vec<String>> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let rows = sqlx::query("SELECT stored_name FROM files")
						.fetch_all(&mut *conn)
						.await?;
					Ok(rows.iter().map(|r| r.get("stored_name")).collect())
				})
			})
			.await
	}

	/// A batch of descriptors ordered by id, for sweep iteration.
	pub async fn batch(&self, after_id: Option<String>, limit: i64) -> Result<Vec<FileMetadata>> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let rows = match &after_id {
						Some(after) => {
							sqlx::query("SELECT * FROM files WHERE id > ? ORDER BY id LIMIT ?")
								.bind(after)
								.bind(limit)
								.fetch_all(&mut *conn)
								.await?
						}
						None => {
							sqlx::query("SELECT * FROM files ORDER BY id LIMIT ?")
								.bind(limit)
								.fetch_all(&mut *conn)
								.await?
						}
					};
					rows.iter().map(file_from_row).collect()
				})
			})
			.await
	}
}

fn escape_like(input: &str) -> String {
	input
		.replace('\\', "\\\\")
		.replace('%', "\\%")
		.replace('_', "\\_")
}

fn file_from_row(row: &SqliteRow) -> Result<FileMetadata> {
	let created_at: String = row.get("created_at");
	Ok(FileMetadata {
		id: row.get("id"),
		stored_name: row.get("stored_name"),
		original_name: row.get("original_name"),
		content_type: row.get("content_type"),
		size_bytes: row.get("size_bytes"),
		path: row.get("path"),
		metadata: parse_json_column(row.get("metadata"))?,
		uploaded_by: row.get("uploaded_by"),
		created_at: parse_timestamp(&created_at)
			.map_err(|e| DbError::Internal(format!("file row: {e}")))?,
	})
}

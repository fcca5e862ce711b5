// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Metadata rows for registered custom queries. The callables live in the
//! query crate's registry; this table backs the admin listing and survives
//! restarts for inspection.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use crate::collections::parse_json_column;
use crate::error::Result;
use crate::kernel::{now_rfc3339, parse_timestamp, StorageKernel};
use crate::types::CustomQueryMeta;

pub struct CustomQueryRepository {
	kernel: Arc<StorageKernel>,
}

impl CustomQueryRepository {
	pub fn new(kernel: Arc<StorageKernel>) -> Self {
		Self { kernel }
	}

	/// Insert or refresh the metadata row for a registered query.
	#[tracing::instrument(skip(self, description, params))]
	pub async fn upsert(
		&self,
		name: &str,
		description: Option<String>,
		params: Option<serde_json::Value>,
	) -> Result<()> {
		let name = name.to_string();
		let id = Uuid::new_v4().to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let now = now_rfc3339();
					sqlx::query(
						"INSERT INTO custom_queries (id, name, description, params, created_at, updated_at) \
						 VALUES (?, ?, ?, ?, ?, ?) \
						 ON CONFLICT(name) DO UPDATE SET description = excluded.description, params = excluded.params",
					)
					.bind(&id)
					.bind(&name)
					.bind(&description)
					.bind(params.as_ref().map(serde_json::Value::to_string))
					.bind(&now)
					.bind(&now)
					.execute(&mut *conn)
					.await?;
					Ok(())
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list(&self) -> Result<Vec<CustomQueryMeta>> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let rows = sqlx::query("SELECT * FROM custom_queries ORDER BY name")
						.fetch_all(&mut *conn)
						.await?;
					rows.iter().map(meta_from_row).collect()
				})
			})
			.await
	}
}

fn meta_from_row(row: &SqliteRow) -> Result<CustomQueryMeta> {
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	Ok(CustomQueryMeta {
		id: row.get("id"),
		name: row.get("name"),
		description: row.get("description"),
		params: parse_json_column(row.get("params"))?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_kernel;

	#[tokio::test]
	async fn test_upsert_and_list() {
		let repo = CustomQueryRepository::new(Arc::new(create_test_kernel().await));
		repo.upsert("top-products", Some("Best sellers".to_string()), None)
			.await
			.unwrap();
		repo.upsert(
			"top-products",
			Some("Best sellers, refreshed".to_string()),
			Some(serde_json::json!({"limit": "number"})),
		)
		.await
		.unwrap();

		let all = repo.list().await.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].name, "top-products");
		assert_eq!(all[0].description.as_deref(), Some("Best sellers, refreshed"));
	}
}

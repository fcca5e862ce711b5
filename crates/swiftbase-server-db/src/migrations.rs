// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned schema migrations.
//!
//! Each migration is `(version, name, up, down)`. Forward migrations apply in
//! order under a write scope; the `schema_migrations` row is inserted in the
//! same transaction as the migration's effects, so a migration either applies
//! fully and is recorded, or not at all. `rollback_last` reverses the most
//! recently applied migration's `down`.

use sqlx::Row;

use crate::error::{DbError, Result};
use crate::kernel::{now_rfc3339, StorageKernel};

/// A single schema migration.
pub struct Migration {
	pub version: i64,
	pub name: &'static str,
	pub up: &'static str,
	pub down: &'static str,
}

/// Ordered migration ledger. Append-only; never reorder or edit released
/// entries.
pub const MIGRATIONS: &[Migration] = &[
	Migration {
		version: 1,
		name: "collections_documents",
		up: include_str!("../migrations/001_collections_documents.up.sql"),
		down: include_str!("../migrations/001_collections_documents.down.sql"),
	},
	Migration {
		version: 2,
		name: "principals",
		up: include_str!("../migrations/002_principals.up.sql"),
		down: include_str!("../migrations/002_principals.down.sql"),
	},
	Migration {
		version: 3,
		name: "files",
		up: include_str!("../migrations/003_files.up.sql"),
		down: include_str!("../migrations/003_files.down.sql"),
	},
	Migration {
		version: 4,
		name: "audit_log",
		up: include_str!("../migrations/004_audit_log.up.sql"),
		down: include_str!("../migrations/004_audit_log.down.sql"),
	},
	Migration {
		version: 5,
		name: "custom_queries",
		up: include_str!("../migrations/005_custom_queries.up.sql"),
		down: include_str!("../migrations/005_custom_queries.down.sql"),
	},
	Migration {
		version: 6,
		name: "triggers",
		up: include_str!("../migrations/006_triggers.up.sql"),
		down: include_str!("../migrations/006_triggers.down.sql"),
	},
];

/// Apply all pending forward migrations.
///
/// Returns the number of migrations applied.
#[tracing::instrument(skip(kernel))]
pub async fn run_migrations(kernel: &StorageKernel) -> Result<usize> {
	ensure_ledger(kernel).await?;
	let current = current_version(kernel).await?;

	let mut applied = 0;
	for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
		apply_one(kernel, migration).await?;
		applied += 1;
	}

	if applied > 0 {
		tracing::info!(applied, "database migrations complete");
	} else {
		tracing::debug!("database schema is current");
	}
	Ok(applied)
}

/// Reverse the most recently applied migration.
///
/// Returns the version that was rolled back, or `None` when the schema is at
/// version zero.
#[tracing::instrument(skip(kernel))]
pub async fn rollback_last(kernel: &StorageKernel) -> Result<Option<i64>> {
	ensure_ledger(kernel).await?;
	let current = current_version(kernel).await?;
	if current == 0 {
		return Ok(None);
	}

	let migration = MIGRATIONS
		.iter()
		.find(|m| m.version == current)
		.ok_or_else(|| {
			DbError::Internal(format!(
				"schema version {current} has no migration entry; cannot roll back"
			))
		})?;

	kernel
		.write(|conn| {
			Box::pin(async move {
				sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(migration.down)).await?;
				sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
					.bind(migration.version)
					.execute(&mut *conn)
					.await?;
				Ok(())
			})
		})
		.await?;

	tracing::info!(version = current, name = migration.name, "migration rolled back");
	Ok(Some(current))
}

/// Highest applied migration version, or zero on a fresh database.
pub async fn current_version(kernel: &StorageKernel) -> Result<i64> {
	kernel
		.read(|conn| {
			Box::pin(async move {
				let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS v FROM schema_migrations")
					.fetch_one(&mut *conn)
					.await?;
				Ok(row.get::<i64, _>("v"))
			})
		})
		.await
}

async fn ensure_ledger(kernel: &StorageKernel) -> Result<()> {
	kernel
		.write(|conn| {
			Box::pin(async move {
				sqlx::query(
					r#"
					CREATE TABLE IF NOT EXISTS schema_migrations (
						version INTEGER PRIMARY KEY,
						name TEXT NOT NULL,
						applied_at TEXT NOT NULL
					)
					"#,
				)
				.execute(&mut *conn)
				.await?;
				Ok(())
			})
		})
		.await
}

async fn apply_one(kernel: &StorageKernel, migration: &'static Migration) -> Result<()> {
	kernel
		.write(|conn| {
			Box::pin(async move {
				sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(migration.up)).await?;
				sqlx::query(
					"INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
				)
				.bind(migration.version)
				.bind(migration.name)
				.bind(now_rfc3339())
				.execute(&mut *conn)
				.await?;
				Ok(())
			})
		})
		.await?;

	tracing::debug!(version = migration.version, name = migration.name, "migration applied");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_kernel;

	#[test]
	fn test_versions_are_strictly_increasing() {
		let mut last = 0;
		for m in MIGRATIONS {
			assert!(m.version > last, "migration {} out of order", m.name);
			last = m.version;
		}
	}

	#[tokio::test]
	async fn test_run_migrations_applies_all_then_none() {
		let kernel = create_test_kernel().await;
		// testing helper already migrated; a second run is a no-op
		let applied = run_migrations(&kernel).await.unwrap();
		assert_eq!(applied, 0);
		assert_eq!(
			current_version(&kernel).await.unwrap(),
			MIGRATIONS.last().unwrap().version
		);
	}

	#[tokio::test]
	async fn test_rollback_and_reapply() {
		let kernel = create_test_kernel().await;
		let top = MIGRATIONS.last().unwrap().version;

		let rolled = rollback_last(&kernel).await.unwrap();
		assert_eq!(rolled, Some(top));
		assert_eq!(current_version(&kernel).await.unwrap(), top - 1);

		let applied = run_migrations(&kernel).await.unwrap();
		assert_eq!(applied, 1);
		assert_eq!(current_version(&kernel).await.unwrap(), top);
	}

	#[tokio::test]
	async fn test_document_version_trigger_steps_only_on_change() {
		let kernel = create_test_kernel().await;

		kernel
			.write(|conn| {
				Box::pin(async move {
					sqlx::query(
						"INSERT INTO collections (id, name, created_at, updated_at) VALUES ('c1', 'things', ?, ?)",
					)
					.bind(now_rfc3339())
					.bind(now_rfc3339())
					.execute(&mut *conn)
					.await?;
					sqlx::query(
						"INSERT INTO documents (id, collection_id, data, created_at, updated_at) VALUES ('d1', 'c1', '{\"a\":1}', ?, ?)",
					)
					.bind(now_rfc3339())
					.bind(now_rfc3339())
					.execute(&mut *conn)
					.await?;
					Ok(())
				})
			})
			.await
			.unwrap();

		// Same data: no version step.
		kernel
			.write(|conn| {
				Box::pin(async move {
					sqlx::query("UPDATE documents SET data = '{\"a\":1}' WHERE id = 'd1'")
						.execute(&mut *conn)
						.await?;
					Ok(())
				})
			})
			.await
			.unwrap();

		let version: i64 = kernel
			.read(|conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT version FROM documents WHERE id = 'd1'")
						.fetch_one(&mut *conn)
						.await?;
					Ok(row.get("version"))
				})
			})
			.await
			.unwrap();
		assert_eq!(version, 1);

		// Changed data: version steps to 2.
		kernel
			.write(|conn| {
				Box::pin(async move {
					sqlx::query("UPDATE documents SET data = '{\"a\":2}' WHERE id = 'd1'")
						.execute(&mut *conn)
						.await?;
					Ok(())
				})
			})
			.await
			.unwrap();

		let version: i64 = kernel
			.read(|conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT version FROM documents WHERE id = 'd1'")
						.fetch_one(&mut *conn)
						.await?;
					Ok(row.get("version"))
				})
			})
			.await
			.unwrap();
		assert_eq!(version, 2);
	}
}

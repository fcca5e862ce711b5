// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage kernel: scoped read and write access to the embedded database.
//!
//! The kernel owns the only [`SqlitePool`] in the process. Callers never hold
//! a raw handle; they pass a closure to [`StorageKernel::read`] or
//! [`StorageKernel::write`] and get scoped access to a connection.
//!
//! Reads run concurrently on pooled connections (WAL permits readers beside
//! the in-flight writer). Writes are serialized through a process-wide writer
//! lease and run inside a transaction whose commit is the last step of the
//! scope; an error or a dropped future rolls the transaction back.

use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;
use tokio::sync::Mutex;

use crate::error::{DbError, Result};
use crate::pool::create_pool;

/// Scoped access to the embedded SQLite database.
#[derive(Clone)]
pub struct StorageKernel {
	pool: SqlitePool,
	writer: Arc<Mutex<()>>,
}

impl StorageKernel {
	/// Open the database at `database_url` and wrap it in a kernel.
	pub async fn open(database_url: &str) -> Result<Self> {
		let pool = create_pool(database_url).await?;
		Ok(Self::from_pool(pool))
	}

	/// Wrap an existing pool. Used by tests that build in-memory databases.
	pub fn from_pool(pool: SqlitePool) -> Self {
		Self {
			pool,
			writer: Arc::new(Mutex::new(())),
		}
	}

	/// Run `f` under a read-only view. Reads may run concurrently.
	pub async fn read<T, F>(&self, f: F) -> Result<T>
	where
		T: Send,
		F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send,
	{
		let mut conn = self.pool.acquire().await?;
		f(&mut conn).await
	}

	/// Run `f` under the exclusive writer lease, inside a transaction.
	///
	/// At most one write scope is in flight per kernel. The transaction
	/// commits after `f` returns Ok; on Err (or if the future is dropped)
	/// it rolls back and no partial state is visible.
	pub async fn write<T, F>(&self, f: F) -> Result<T>
	where
		T: Send,
		F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send,
	{
		let _lease = self.writer.lock().await;
		let mut tx = self.pool.begin().await?;
		let value = f(&mut *tx).await?;
		tx.commit().await?;
		Ok(value)
	}

	/// Liveness probe: runs `SELECT 1` through a read scope.
	pub async fn ping(&self) -> Result<()> {
		self.read(|conn| {
			Box::pin(async move {
				sqlx::query("SELECT 1").execute(&mut *conn).await?;
				Ok(())
			})
		})
		.await
	}

	/// Close the underlying pool. Further scopes fail.
	pub async fn close(&self) {
		self.pool.close().await;
	}
}

impl std::fmt::Debug for StorageKernel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StorageKernel").finish_non_exhaustive()
	}
}

/// Current UTC timestamp in the canonical column format.
///
/// Matches the trigger-side `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` so that
/// application-written and trigger-written timestamps compare consistently.
pub fn now_rfc3339() -> String {
	chrono::Utc::now()
		.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse a stored timestamp column.
pub fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
	chrono::DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&chrono::Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp '{value}': {e}")))
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test helpers: in-memory kernels with the full schema applied.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::kernel::StorageKernel;
use crate::migrations::run_migrations;

/// A migrated in-memory kernel.
///
/// The pool is pinned to a single connection so the in-memory database is
/// shared across scopes.
pub async fn create_test_kernel() -> StorageKernel {
	let options: SqliteConnectOptions = "sqlite::memory:".parse().unwrap();
	let options = options.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap();
	let kernel = StorageKernel::from_pool(pool);
	run_migrations(&kernel).await.unwrap();
	kernel
}

/// A migrated kernel backed by a file under `dir`, sharing WAL semantics with
/// production. Use when a test needs concurrent readers.
pub async fn create_file_kernel(dir: &std::path::Path) -> StorageKernel {
	let db_path = dir.join("test.db");
	let url = format!("sqlite:{}?mode=rwc", db_path.display());
	let kernel = StorageKernel::open(&url).await.unwrap();
	run_migrations(&kernel).await.unwrap();
	kernel
}

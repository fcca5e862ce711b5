// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage kernel, migrations and repositories for SwiftBase.
//!
//! The kernel owns the embedded SQLite database and hands out scoped read and
//! write access; everything else in the process goes through it. Repositories
//! wrap the kernel with typed operations over the system tables.

pub mod audit;
pub mod collections;
pub mod custom_queries;
pub mod error;
pub mod files;
pub mod kernel;
pub mod migrations;
pub mod pool;
pub mod principals;
pub mod testing;
pub mod types;

pub use audit::{AuditFilter, AuditRepository};
pub use collections::CollectionRepository;
pub use custom_queries::CustomQueryRepository;
pub use error::{DbError, Result};
pub use files::{FileListFilter, FileRepository, NewFileMetadata};
pub use kernel::{now_rfc3339, parse_timestamp, StorageKernel};
pub use migrations::{current_version, rollback_last, run_migrations, MIGRATIONS};
pub use pool::create_pool;
pub use principals::{PrincipalKind, PrincipalRepository};
pub use types::{
	Admin, AuditEntry, Collection, CollectionStats, CollectionWithCount, CustomQueryMeta,
	Document, FileMetadata, FileStats, NewAuditEntry, RefreshTokenRecord, User,
};

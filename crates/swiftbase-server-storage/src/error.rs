// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use swiftbase_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("payload too large: {size} bytes exceeds the {limit} byte limit")]
	PayloadTooLarge { size: u64, limit: u64 },

	#[error("file not found")]
	NotFound,

	#[error("forbidden")]
	Forbidden,

	#[error("unsatisfiable byte range")]
	InvalidRange,

	#[error("storage io error: {0}")]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

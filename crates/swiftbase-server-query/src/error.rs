// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use swiftbase_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
	#[error("invalid query: {0}")]
	InvalidQuery(String),

	#[error("collection '{0}' not found")]
	CollectionNotFound(String),

	#[error("document not found")]
	DocumentNotFound,

	#[error("custom query '{0}' not found")]
	CustomQueryNotFound(String),

	#[error("action '{0}' is not implemented")]
	NotImplemented(&'static str),

	#[error(transparent)]
	Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, QueryError>;

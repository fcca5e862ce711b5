// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use swiftbase_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("invalid email address")]
	InvalidEmail,

	#[error("password must be at least {0} characters")]
	WeakPassword(usize),

	#[error("email already registered")]
	EmailTaken,

	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("invalid refresh token")]
	InvalidRefresh,

	#[error("unauthorized")]
	Unauthorized,

	#[error("password hashing failed: {0}")]
	Hash(String),

	#[error(transparent)]
	Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

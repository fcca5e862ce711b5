// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing, signed tokens and sessions for SwiftBase.
//!
//! This crate provides:
//! - [`password`] - argon2id hashing with self-describing PHC strings
//! - [`token`] - HS256 access/refresh tokens with typed claims
//! - [`service`] - registration, login, rotation, logout-all semantics
//! - [`middleware`] - bearer-token extraction for the HTTP layer

pub mod error;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;
pub mod types;

pub use error::{AuthError, Result};
pub use middleware::extract_bearer_token;
pub use password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
pub use service::AuthService;
pub use token::{AccessClaims, PrincipalType, RefreshClaims, TokenError, TokenService};
pub use types::{
	AdminAuthResponse, AdminProfile, CurrentPrincipal, SessionTokens, UserAuthResponse,
	UserProfile,
};

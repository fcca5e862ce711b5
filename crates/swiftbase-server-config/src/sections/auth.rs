// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and token configuration.

use serde::Deserialize;

/// Auth configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuthConfig {
	/// Symmetric signing secret for access and refresh tokens.
	pub jwt_secret: String,
	/// Access token lifetime in seconds.
	pub access_token_ttl_secs: u64,
	/// Refresh token lifetime in seconds.
	pub refresh_token_ttl_secs: u64,
	/// Username for the bootstrap admin created on first startup.
	pub bootstrap_admin_username: String,
	/// Password for the bootstrap admin. Empty means generate and log one.
	pub bootstrap_admin_password: String,
	/// Deployment environment label (development, production).
	pub environment: String,
}

impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigLayer::default().finalize()
	}
}

/// Auth configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub jwt_secret: Option<String>,
	#[serde(default)]
	pub access_token_ttl_secs: Option<u64>,
	#[serde(default)]
	pub refresh_token_ttl_secs: Option<u64>,
	#[serde(default)]
	pub bootstrap_admin_username: Option<String>,
	#[serde(default)]
	pub bootstrap_admin_password: Option<String>,
	#[serde(default)]
	pub environment: Option<String>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.jwt_secret.is_some() {
			self.jwt_secret = other.jwt_secret;
		}
		if other.access_token_ttl_secs.is_some() {
			self.access_token_ttl_secs = other.access_token_ttl_secs;
		}
		if other.refresh_token_ttl_secs.is_some() {
			self.refresh_token_ttl_secs = other.refresh_token_ttl_secs;
		}
		if other.bootstrap_admin_username.is_some() {
			self.bootstrap_admin_username = other.bootstrap_admin_username;
		}
		if other.bootstrap_admin_password.is_some() {
			self.bootstrap_admin_password = other.bootstrap_admin_password;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			jwt_secret: self.jwt_secret.unwrap_or_default(),
			access_token_ttl_secs: self.access_token_ttl_secs.unwrap_or(15 * 60),
			refresh_token_ttl_secs: self.refresh_token_ttl_secs.unwrap_or(7 * 24 * 60 * 60),
			bootstrap_admin_username: self
				.bootstrap_admin_username
				.unwrap_or_else(|| "admin".to_string()),
			bootstrap_admin_password: self.bootstrap_admin_password.unwrap_or_default(),
			environment: self.environment.unwrap_or_else(|| "development".to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_ttl_defaults() {
		let config = AuthConfigLayer::default().finalize();
		assert_eq!(config.access_token_ttl_secs, 900);
		assert_eq!(config.refresh_token_ttl_secs, 604_800);
	}

	#[test]
	fn test_bootstrap_admin_default_username() {
		let config = AuthConfigLayer::default().finalize();
		assert_eq!(config.bootstrap_admin_username, "admin");
		assert!(config.bootstrap_admin_password.is_empty());
	}
}

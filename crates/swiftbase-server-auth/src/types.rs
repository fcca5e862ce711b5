// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire-facing views of principals and issued sessions.
//!
//! Profile types deliberately have no `password_hash` field; the hash cannot
//! reach a response body by construction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use swiftbase_server_db::{Admin, User};

use crate::token::PrincipalType;

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
	pub id: String,
	pub email: String,
	pub email_verified: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_login: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
	fn from(user: &User) -> Self {
		Self {
			id: user.id.clone(),
			email: user.email.clone(),
			email_verified: user.email_verified,
			metadata: user.metadata.clone(),
			last_login: user.last_login,
			created_at: user.created_at,
			updated_at: user.updated_at,
		}
	}
}

/// Public view of an admin.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProfile {
	pub id: String,
	pub username: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_login: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<&Admin> for AdminProfile {
	fn from(admin: &Admin) -> Self {
		Self {
			id: admin.id.clone(),
			username: admin.username.clone(),
			last_login: admin.last_login,
			created_at: admin.created_at,
			updated_at: admin.updated_at,
		}
	}
}

/// The token pair handed to a client on login, register and refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
	pub access_token: String,
	pub refresh_token: String,
	/// Seconds until the access token expires.
	pub expires_in: i64,
}

/// Response body for user register/login.
#[derive(Debug, Clone, Serialize)]
pub struct UserAuthResponse {
	pub user: UserProfile,
	#[serde(flatten)]
	pub tokens: SessionTokens,
}

/// Response body for admin login.
#[derive(Debug, Clone, Serialize)]
pub struct AdminAuthResponse {
	pub admin: AdminProfile,
	#[serde(flatten)]
	pub tokens: SessionTokens,
}

/// The authenticated principal attached to a request after token validation.
#[derive(Debug, Clone)]
pub enum CurrentPrincipal {
	User(UserProfile),
	Admin(AdminProfile),
}

impl CurrentPrincipal {
	pub fn id(&self) -> &str {
		match self {
			CurrentPrincipal::User(user) => &user.id,
			CurrentPrincipal::Admin(admin) => &admin.id,
		}
	}

	pub fn is_admin(&self) -> bool {
		matches!(self, CurrentPrincipal::Admin(_))
	}

	pub fn principal_type(&self) -> PrincipalType {
		match self {
			CurrentPrincipal::User(_) => PrincipalType::User,
			CurrentPrincipal::Admin(_) => PrincipalType::Admin,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn sample_user() -> User {
		User {
			id: "u1".to_string(),
			email: "a@example.com".to_string(),
			password_hash: "$argon2id$secret".to_string(),
			metadata: None,
			refresh_tokens: vec![],
			email_verified: false,
			last_login: None,
			last_revoked_at: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[test]
	fn test_profile_serialization_has_no_password_hash() {
		let profile = UserProfile::from(&sample_user());
		let json = serde_json::to_string(&profile).unwrap();
		assert!(!json.contains("password"));
		assert!(json.contains("\"email\":\"a@example.com\""));
	}

	#[test]
	fn test_tokens_serialize_camel_case() {
		let tokens = SessionTokens {
			access_token: "a".to_string(),
			refresh_token: "r".to_string(),
			expires_in: 900,
		};
		let json = serde_json::to_value(&tokens).unwrap();
		assert_eq!(json["expiresIn"], 900);
		assert!(json.get("accessToken").is_some());
		assert!(json.get("refreshToken").is_some());
	}
}

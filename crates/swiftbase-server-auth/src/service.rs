// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication service: registration, login, refresh, logout, "who am I".
//!
//! Session state is the refresh-token set on the principal row plus the
//! `last_revoked_at` tombstone. Rotation is the sole refresh path; logout
//! revokes everything outstanding, and access-token verification consults the
//! tombstone so pre-logout access tokens fail too.

use std::sync::Arc;
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use swiftbase_server_db::{DbError, PrincipalKind, PrincipalRepository, RefreshTokenRecord};

use crate::error::{AuthError, Result};
use crate::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::token::{AccessClaims, PrincipalType, TokenService};
use crate::types::{
	AdminAuthResponse, AdminProfile, CurrentPrincipal, SessionTokens, UserAuthResponse,
	UserProfile,
};

static EMAIL_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub struct AuthService {
	principals: Arc<PrincipalRepository>,
	tokens: TokenService,
}

impl AuthService {
	pub fn new(principals: Arc<PrincipalRepository>, tokens: TokenService) -> Self {
		Self { principals, tokens }
	}

	pub fn tokens(&self) -> &TokenService {
		&self.tokens
	}

	/// Register a new user and open a session.
	#[tracing::instrument(skip(self, password, metadata))]
	pub async fn register(
		&self,
		email: &str,
		password: &str,
		metadata: Option<serde_json::Value>,
	) -> Result<UserAuthResponse> {
		let email = email.trim().to_lowercase();
		if !EMAIL_REGEX.is_match(&email) {
			return Err(AuthError::InvalidEmail);
		}
		if password.len() < MIN_PASSWORD_LENGTH {
			return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
		}

		let password_hash = self.hash_on_blocking(password).await?;
		let user = self
			.principals
			.create_user(&email, &password_hash, metadata)
			.await
			.map_err(|e| match e {
				DbError::Conflict(_) => AuthError::EmailTaken,
				other => AuthError::Db(other),
			})?;

		let tokens = self.open_session(PrincipalType::User, &user.id).await?;
		tracing::info!(user_id = %user.id, "user registered");
		Ok(UserAuthResponse {
			user: UserProfile::from(&user),
			tokens,
		})
	}

	/// Log a user in with email and password.
	///
	/// The failure mode never discloses whether the email exists: a missing
	/// user and a wrong password both surface `InvalidCredentials`.
	#[tracing::instrument(skip(self, password))]
	pub async fn login_user(&self, email: &str, password: &str) -> Result<UserAuthResponse> {
		let email = email.trim().to_lowercase();
		let user = self
			.principals
			.get_user_by_email(&email)
			.await?
			.ok_or(AuthError::InvalidCredentials)?;

		if !self.verify_on_blocking(password, &user.password_hash).await? {
			return Err(AuthError::InvalidCredentials);
		}

		self.principals
			.record_login(PrincipalKind::User, &user.id)
			.await?;
		let tokens = self.open_session(PrincipalType::User, &user.id).await?;
		tracing::info!(user_id = %user.id, "user logged in");

		// Re-read so the profile reflects last_login.
		let user = self
			.principals
			.get_user_by_id(&user.id)
			.await?
			.ok_or(AuthError::InvalidCredentials)?;
		Ok(UserAuthResponse {
			user: UserProfile::from(&user),
			tokens,
		})
	}

	/// Log an admin in with username and password.
	#[tracing::instrument(skip(self, password))]
	pub async fn login_admin(&self, username: &str, password: &str) -> Result<AdminAuthResponse> {
		let admin = self
			.principals
			.get_admin_by_username(username)
			.await?
			.ok_or(AuthError::InvalidCredentials)?;

		if !self
			.verify_on_blocking(password, &admin.password_hash)
			.await?
		{
			return Err(AuthError::InvalidCredentials);
		}

		self.principals
			.record_login(PrincipalKind::Admin, &admin.id)
			.await?;
		let tokens = self.open_session(PrincipalType::Admin, &admin.id).await?;
		tracing::info!(admin_id = %admin.id, "admin logged in");

		let admin = self
			.principals
			.get_admin_by_id(&admin.id)
			.await?
			.ok_or(AuthError::InvalidCredentials)?;
		Ok(AdminAuthResponse {
			admin: AdminProfile::from(&admin),
			tokens,
		})
	}

	/// Exchange a refresh token for a new pair, consuming the presented jti.
	///
	/// A replayed (already consumed) refresh token fails here because its jti
	/// is no longer in the principal's set.
	#[tracing::instrument(skip(self, refresh_token))]
	pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
		let claims = self
			.tokens
			.verify_refresh(refresh_token, None)
			.map_err(|_| AuthError::InvalidRefresh)?;
		let kind = principal_kind(claims.principal_type);

		let (new_refresh, new_claims) = self
			.tokens
			.issue_refresh(&claims.sub, claims.principal_type);
		let rotated = self
			.principals
			.rotate_refresh_token(
				kind,
				&claims.sub,
				&claims.jti,
				RefreshTokenRecord {
					jti: new_claims.jti.clone(),
					issued_at: timestamp_to_datetime(new_claims.iat),
					expires_at: timestamp_to_datetime(new_claims.exp),
				},
			)
			.await
			.map_err(|e| match e {
				DbError::NotFound(_) => AuthError::InvalidRefresh,
				other => AuthError::Db(other),
			})?;
		if !rotated {
			tracing::warn!(sub = %claims.sub, "refresh token replay rejected");
			return Err(AuthError::InvalidRefresh);
		}

		let (access_token, _) = self.tokens.issue_access(&claims.sub, claims.principal_type);
		Ok(SessionTokens {
			access_token,
			refresh_token: new_refresh,
			expires_in: self.tokens.access_ttl_secs(),
		})
	}

	/// Revoke every outstanding session for the principal behind `claims`.
	#[tracing::instrument(skip(self, claims))]
	pub async fn logout(&self, claims: &AccessClaims) -> Result<()> {
		let kind = principal_kind(claims.principal_type);
		self.principals.revoke_all(kind, &claims.sub).await?;
		tracing::info!(sub = %claims.sub, "all sessions revoked");
		Ok(())
	}

	/// Validate an access token and load its principal.
	///
	/// Rejects expired, malformed and wrong-kind tokens, and tokens issued
	/// at or before the principal's revocation tombstone.
	#[tracing::instrument(skip(self, token))]
	pub async fn authenticate(
		&self,
		token: &str,
		expected: Option<PrincipalType>,
	) -> Result<(AccessClaims, CurrentPrincipal)> {
		let claims = self
			.tokens
			.verify_access(token, expected)
			.map_err(|_| AuthError::Unauthorized)?;

		let principal = match claims.principal_type {
			PrincipalType::User => {
				let user = self
					.principals
					.get_user_by_id(&claims.sub)
					.await?
					.ok_or(AuthError::Unauthorized)?;
				if revoked_since(claims.iat, user.last_revoked_at) {
					return Err(AuthError::Unauthorized);
				}
				CurrentPrincipal::User(UserProfile::from(&user))
			}
			PrincipalType::Admin => {
				let admin = self
					.principals
					.get_admin_by_id(&claims.sub)
					.await?
					.ok_or(AuthError::Unauthorized)?;
				if revoked_since(claims.iat, admin.last_revoked_at) {
					return Err(AuthError::Unauthorized);
				}
				CurrentPrincipal::Admin(AdminProfile::from(&admin))
			}
		};

		Ok((claims, principal))
	}

	async fn open_session(&self, principal_type: PrincipalType, sub: &str) -> Result<SessionTokens> {
		let (refresh_token, refresh_claims) = self.tokens.issue_refresh(sub, principal_type);
		self.principals
			.append_refresh_token(
				principal_kind(principal_type),
				sub,
				RefreshTokenRecord {
					jti: refresh_claims.jti.clone(),
					issued_at: timestamp_to_datetime(refresh_claims.iat),
					expires_at: timestamp_to_datetime(refresh_claims.exp),
				},
			)
			.await?;

		let (access_token, _) = self.tokens.issue_access(sub, principal_type);
		Ok(SessionTokens {
			access_token,
			refresh_token,
			expires_in: self.tokens.access_ttl_secs(),
		})
	}

	async fn hash_on_blocking(&self, password: &str) -> Result<String> {
		let password = password.to_string();
		tokio::task::spawn_blocking(move || hash_password(&password))
			.await
			.map_err(|e| AuthError::Hash(e.to_string()))?
	}

	async fn verify_on_blocking(&self, password: &str, stored: &str) -> Result<bool> {
		let password = password.to_string();
		let stored = stored.to_string();
		Ok(
			tokio::task::spawn_blocking(move || verify_password(&password, &stored))
				.await
				.map_err(|e| AuthError::Hash(e.to_string()))?,
		)
	}
}

fn principal_kind(principal_type: PrincipalType) -> PrincipalKind {
	match principal_type {
		PrincipalType::User => PrincipalKind::User,
		PrincipalType::Admin => PrincipalKind::Admin,
	}
}

/// True when the token's issue time falls at or before the tombstone.
///
/// Claims carry whole seconds while the tombstone has millisecond precision;
/// comparing with `<=` after truncation errs toward rejecting, so a token
/// issued in the same second as a logout cannot outlive it.
fn revoked_since(iat: i64, last_revoked_at: Option<DateTime<Utc>>) -> bool {
	match last_revoked_at {
		Some(tombstone) => iat <= tombstone.timestamp(),
		None => false,
	}
}

fn timestamp_to_datetime(timestamp: i64) -> DateTime<Utc> {
	Utc.timestamp_opt(timestamp, 0)
		.single()
		.unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
	use super::*;
	use swiftbase_server_db::testing::create_test_kernel;

	async fn service() -> AuthService {
		let kernel = Arc::new(create_test_kernel().await);
		let principals = Arc::new(PrincipalRepository::new(kernel));
		AuthService::new(principals, TokenService::new(b"test-secret", 900, 604_800))
	}

	#[tokio::test]
	async fn test_register_rejects_invalid_email() {
		let svc = service().await;
		let err = svc.register("not-an-email", "longenough", None).await.unwrap_err();
		assert!(matches!(err, AuthError::InvalidEmail));
	}

	#[tokio::test]
	async fn test_register_rejects_short_password() {
		let svc = service().await;
		let err = svc.register("a@example.com", "short", None).await.unwrap_err();
		assert!(matches!(err, AuthError::WeakPassword(8)));
	}

	#[tokio::test]
	async fn test_register_then_login() {
		let svc = service().await;
		let registered = svc
			.register("User@Example.com", "SecurePass123!", None)
			.await
			.unwrap();
		assert_eq!(registered.user.email, "user@example.com");
		assert!(!registered.user.email_verified);
		assert_eq!(registered.tokens.expires_in, 900);

		let session = svc.login_user("user@example.com", "SecurePass123!").await.unwrap();
		assert!(session.user.last_login.is_some());
	}

	#[tokio::test]
	async fn test_duplicate_registration_is_email_taken() {
		let svc = service().await;
		svc.register("a@example.com", "SecurePass123!", None).await.unwrap();
		let err = svc
			.register("A@example.com", "SecurePass123!", None)
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::EmailTaken));
	}

	#[tokio::test]
	async fn test_login_does_not_disclose_existence() {
		let svc = service().await;
		svc.register("a@example.com", "SecurePass123!", None).await.unwrap();

		let missing = svc.login_user("ghost@example.com", "whatever123").await.unwrap_err();
		let wrong = svc.login_user("a@example.com", "wrongpassword").await.unwrap_err();
		assert_eq!(missing.to_string(), wrong.to_string());
	}

	#[tokio::test]
	async fn test_refresh_rotation_and_replay() {
		let svc = service().await;
		let session = svc.register("a@example.com", "SecurePass123!", None).await.unwrap();

		let first = svc.refresh(&session.tokens.refresh_token).await.unwrap();
		// Replaying the consumed token fails.
		let replay = svc.refresh(&session.tokens.refresh_token).await;
		assert!(matches!(replay.unwrap_err(), AuthError::InvalidRefresh));
		// The rotated token works.
		let second = svc.refresh(&first.refresh_token).await.unwrap();
		assert_ne!(first.refresh_token, second.refresh_token);
	}

	#[tokio::test]
	async fn test_logout_invalidates_access_and_refresh() {
		let svc = service().await;
		let session = svc.register("a@example.com", "SecurePass123!", None).await.unwrap();

		let (claims, _) = svc
			.authenticate(&session.tokens.access_token, Some(PrincipalType::User))
			.await
			.unwrap();
		svc.logout(&claims).await.unwrap();

		let access = svc
			.authenticate(&session.tokens.access_token, Some(PrincipalType::User))
			.await;
		assert!(access.is_err());

		let refresh = svc.refresh(&session.tokens.refresh_token).await;
		assert!(matches!(refresh.unwrap_err(), AuthError::InvalidRefresh));
	}

	#[tokio::test]
	async fn test_authenticate_rejects_wrong_kind() {
		let svc = service().await;
		let session = svc.register("a@example.com", "SecurePass123!", None).await.unwrap();
		let result = svc
			.authenticate(&session.tokens.access_token, Some(PrincipalType::Admin))
			.await;
		assert!(matches!(result.unwrap_err(), AuthError::Unauthorized));
	}

	#[test]
	fn test_revoked_since_boundary() {
		let tombstone = Utc.timestamp_opt(1_000, 500_000_000).single();
		assert!(revoked_since(999, tombstone));
		assert!(revoked_since(1_000, tombstone));
		assert!(!revoked_since(1_001, tombstone));
		assert!(!revoked_since(999, None));
	}
}

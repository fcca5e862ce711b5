// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signed access and refresh tokens.
//!
//! Both kinds are HS256 JWTs signed with the symmetric secret from
//! configuration. Access tokens carry `{sub, type, iat, exp}`; refresh tokens
//! additionally carry a unique `jti` that the session store consumes on
//! rotation.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which principal table a token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
	User,
	Admin,
}

impl std::fmt::Display for PrincipalType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PrincipalType::User => write!(f, "user"),
			PrincipalType::Admin => write!(f, "admin"),
		}
	}
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
	pub sub: String,
	#[serde(rename = "type")]
	pub principal_type: PrincipalType,
	pub iat: i64,
	pub exp: i64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
	pub sub: String,
	#[serde(rename = "type")]
	pub principal_type: PrincipalType,
	pub jti: String,
	pub iat: i64,
	pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
	#[error("token expired")]
	Expired,

	#[error("token malformed")]
	Malformed,

	#[error("token is for a different principal kind")]
	WrongKind,
}

/// Issues and verifies signed tokens. Signing is in-process and synchronous.
#[derive(Clone)]
pub struct TokenService {
	encoding: EncodingKey,
	decoding: DecodingKey,
	access_ttl_secs: i64,
	refresh_ttl_secs: i64,
}

impl TokenService {
	pub fn new(secret: &[u8], access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
		Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			access_ttl_secs: access_ttl_secs as i64,
			refresh_ttl_secs: refresh_ttl_secs as i64,
		}
	}

	pub fn access_ttl_secs(&self) -> i64 {
		self.access_ttl_secs
	}

	pub fn refresh_ttl_secs(&self) -> i64 {
		self.refresh_ttl_secs
	}

	/// Issue an access token for `sub`.
	pub fn issue_access(&self, sub: &str, principal_type: PrincipalType) -> (String, AccessClaims) {
		let iat = chrono::Utc::now().timestamp();
		let claims = AccessClaims {
			sub: sub.to_string(),
			principal_type,
			iat,
			exp: iat + self.access_ttl_secs,
		};
		let token = encode(&Header::default(), &claims, &self.encoding)
			.expect("HS256 signing cannot fail with a valid key");
		(token, claims)
	}

	/// Issue a refresh token with a fresh jti.
	pub fn issue_refresh(
		&self,
		sub: &str,
		principal_type: PrincipalType,
	) -> (String, RefreshClaims) {
		let iat = chrono::Utc::now().timestamp();
		let claims = RefreshClaims {
			sub: sub.to_string(),
			principal_type,
			jti: Uuid::new_v4().to_string(),
			iat,
			exp: iat + self.refresh_ttl_secs,
		};
		let token = encode(&Header::default(), &claims, &self.encoding)
			.expect("HS256 signing cannot fail with a valid key");
		(token, claims)
	}

	/// Verify an access token of the expected principal kind.
	pub fn verify_access(
		&self,
		token: &str,
		expected: Option<PrincipalType>,
	) -> Result<AccessClaims, TokenError> {
		let claims = self.decode_claims::<AccessClaims>(token)?;
		if let Some(expected) = expected {
			if claims.principal_type != expected {
				return Err(TokenError::WrongKind);
			}
		}
		Ok(claims)
	}

	/// Verify a refresh token of the expected principal kind.
	pub fn verify_refresh(
		&self,
		token: &str,
		expected: Option<PrincipalType>,
	) -> Result<RefreshClaims, TokenError> {
		let claims = self.decode_claims::<RefreshClaims>(token)?;
		if let Some(expected) = expected {
			if claims.principal_type != expected {
				return Err(TokenError::WrongKind);
			}
		}
		Ok(claims)
	}

	fn decode_claims<C: serde::de::DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
		let mut validation = Validation::default();
		validation.leeway = 0;
		decode::<C>(token, &self.decoding, &validation)
			.map(|data| data.claims)
			.map_err(|e| match e.kind() {
				jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
				_ => TokenError::Malformed,
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn service() -> TokenService {
		TokenService::new(b"test-secret", 900, 7 * 24 * 60 * 60)
	}

	#[test]
	fn test_access_round_trip() {
		let svc = service();
		let (token, issued) = svc.issue_access("user-1", PrincipalType::User);
		let claims = svc.verify_access(&token, Some(PrincipalType::User)).unwrap();
		assert_eq!(claims.sub, "user-1");
		assert_eq!(claims.exp - claims.iat, 900);
		assert_eq!(claims.iat, issued.iat);
	}

	#[test]
	fn test_wrong_kind_is_rejected() {
		let svc = service();
		let (token, _) = svc.issue_access("admin-1", PrincipalType::Admin);
		let err = svc
			.verify_access(&token, Some(PrincipalType::User))
			.unwrap_err();
		assert_eq!(err, TokenError::WrongKind);
	}

	#[test]
	fn test_expired_token() {
		let svc = TokenService::new(b"test-secret", 0, 0);
		let (token, _) = svc.issue_access("user-1", PrincipalType::User);
		// exp == iat; with zero leeway the token is already expired.
		std::thread::sleep(std::time::Duration::from_millis(1100));
		let err = service().verify_access(&token, None).unwrap_err();
		assert_eq!(err, TokenError::Expired);
	}

	#[test]
	fn test_malformed_token() {
		let svc = service();
		assert_eq!(
			svc.verify_access("garbage", None).unwrap_err(),
			TokenError::Malformed
		);
	}

	#[test]
	fn test_wrong_secret_is_malformed() {
		let (token, _) = service().issue_access("user-1", PrincipalType::User);
		let other = TokenService::new(b"other-secret", 900, 900);
		assert_eq!(
			other.verify_access(&token, None).unwrap_err(),
			TokenError::Malformed
		);
	}

	#[test]
	fn test_refresh_jtis_are_unique() {
		let svc = service();
		let (_, a) = svc.issue_refresh("user-1", PrincipalType::User);
		let (_, b) = svc.issue_refresh("user-1", PrincipalType::User);
		assert_ne!(a.jti, b.jti);
	}

	#[test]
	fn test_access_token_is_not_a_valid_refresh_token() {
		let svc = service();
		let (token, _) = svc.issue_access("user-1", PrincipalType::User);
		// Missing jti claim: structurally invalid as a refresh token.
		assert_eq!(
			svc.verify_refresh(&token, None).unwrap_err(),
			TokenError::Malformed
		);
	}
}

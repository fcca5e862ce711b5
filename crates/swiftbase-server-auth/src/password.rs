// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing.
//!
//! Stored hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$digest`),
//! self-describing and forward-compatible with cost upgrades: verification
//! reads the parameters out of the stored string, so raising the cost only
//! affects newly hashed passwords.
//!
//! # Security Note
//!
//! Test builds use intentionally weak parameters for speed. They MUST NOT be
//! used in production; release builds take the argon2 defaults.

use argon2::{
	password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
	Argon2,
};
#[cfg(test)]
use argon2::{Algorithm, Params, Version};

use crate::error::{AuthError, Result};

/// Minimum accepted password length, enforced by callers before hashing.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[inline]
fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		// Fast, insecure parameters for tests ONLY.
		let params = Params::new(
			1024, // memory_kib: 1 MiB
			1,    // iterations
			1,    // parallelism
			None, // output length = default
		)
		.expect("valid Argon2 params for tests");
		Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
	}

	#[cfg(not(test))]
	{
		Argon2::default()
	}
}

/// Hash a password into a self-describing PHC string.
pub fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a password against a stored PHC string.
///
/// The digest comparison inside the argon2 crate is constant-time. Returns
/// false for a bad password or an unparseable stored string; callers treat
/// both as invalid credentials.
pub fn verify_password(password: &str, stored: &str) -> bool {
	let Ok(parsed) = PasswordHash::new(stored) else {
		return false;
	};
	argon2_instance()
		.verify_password(password.as_bytes(), &parsed)
		.is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_is_phc_self_describing() {
		let hash = hash_password("correct horse battery").unwrap();
		assert!(hash.starts_with("$argon2"));
	}

	#[test]
	fn test_verify_round_trip() {
		let hash = hash_password("SecurePass123!").unwrap();
		assert!(verify_password("SecurePass123!", &hash));
		assert!(!verify_password("SecurePass123", &hash));
	}

	#[test]
	fn test_hashes_are_salted() {
		let a = hash_password("same-password").unwrap();
		let b = hash_password("same-password").unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn test_verify_garbage_stored_string() {
		assert!(!verify_password("anything", "not-a-phc-string"));
		assert!(!verify_password("anything", ""));
	}
}

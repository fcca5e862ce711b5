// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Users and admins, including their refresh-token sets.
//!
//! Refresh-token records are stored as a JSON column on the principal row;
//! every mutation happens inside one write scope, so the set and the row can
//! never drift apart. `rotate_refresh_token` is the only refresh path:
//! presenting a jti that is not in the set (already consumed, or never
//! issued) is rejected, which is what makes replay fail.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use crate::collections::parse_json_column;
use crate::error::{DbError, Result};
use crate::kernel::{now_rfc3339, parse_timestamp, StorageKernel};
use crate::types::{Admin, RefreshTokenRecord, User};

/// Which principal table an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
	User,
	Admin,
}

impl PrincipalKind {
	fn table(self) -> &'static str {
		match self {
			PrincipalKind::User => "users",
			PrincipalKind::Admin => "admins",
		}
	}
}

pub struct PrincipalRepository {
	kernel: Arc<StorageKernel>,
}

impl PrincipalRepository {
	pub fn new(kernel: Arc<StorageKernel>) -> Self {
		Self { kernel }
	}

	#[tracing::instrument(skip(self, password_hash, metadata))]
	pub async fn create_user(
		&self,
		email: &str,
		password_hash: &str,
		metadata: Option<serde_json::Value>,
	) -> Result<User> {
		let email = email.to_lowercase();
		let password_hash = password_hash.to_string();
		let id = Uuid::new_v4().to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let taken = sqlx::query("SELECT 1 FROM users WHERE email = ?")
						.bind(&email)
						.fetch_optional(&mut *conn)
						.await?;
					if taken.is_some() {
						return Err(DbError::Conflict(format!("email '{email}' already registered")));
					}

					let now = now_rfc3339();
					sqlx::query(
						"INSERT INTO users (id, email, password_hash, metadata, created_at, updated_at) \
						 VALUES (?, ?, ?, ?, ?, ?)",
					)
					.bind(&id)
					.bind(&email)
					.bind(&password_hash)
					.bind(metadata.as_ref().map(serde_json::Value::to_string))
					.bind(&now)
					.bind(&now)
					.execute(&mut *conn)
					.await?;

					let row = sqlx::query("SELECT * FROM users WHERE id = ?")
						.bind(&id)
						.fetch_one(&mut *conn)
						.await?;
					user_from_row(&row)
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
		let email = email.to_lowercase();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT * FROM users WHERE email = ?")
						.bind(&email)
						.fetch_optional(&mut *conn)
						.await?;
					row.as_ref().map(user_from_row).transpose()
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
		let id = id.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT * FROM users WHERE id = ?")
						.bind(&id)
						.fetch_optional(&mut *conn)
						.await?;
					row.as_ref().map(user_from_row).transpose()
				})
			})
			.await
	}

	#[tracing::instrument(skip(self, password_hash))]
	pub async fn create_admin(&self, username: &str, password_hash: &str) -> Result<Admin> {
		let username = username.to_string();
		let password_hash = password_hash.to_string();
		let id = Uuid::new_v4().to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let taken = sqlx::query("SELECT 1 FROM admins WHERE username = ?")
						.bind(&username)
						.fetch_optional(&mut *conn)
						.await?;
					if taken.is_some() {
						return Err(DbError::Conflict(format!(
							"admin '{username}' already exists"
						)));
					}

					let now = now_rfc3339();
					sqlx::query(
						"INSERT INTO admins (id, username, password_hash, created_at, updated_at) \
						 VALUES (?, ?, ?, ?, ?)",
					)
					.bind(&id)
					.bind(&username)
					.bind(&password_hash)
					.bind(&now)
					.bind(&now)
					.execute(&mut *conn)
					.await?;

					let row = sqlx::query("SELECT * FROM admins WHERE id = ?")
						.bind(&id)
						.fetch_one(&mut *conn)
						.await?;
					admin_from_row(&row)
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
		let username = username.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT * FROM admins WHERE username = ?")
						.bind(&username)
						.fetch_optional(&mut *conn)
						.await?;
					row.as_ref().map(admin_from_row).transpose()
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_admin_by_id(&self, id: &str) -> Result<Option<Admin>> {
		let id = id.to_string();
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT * FROM admins WHERE id = ?")
						.bind(&id)
						.fetch_optional(&mut *conn)
						.await?;
					row.as_ref().map(admin_from_row).transpose()
				})
			})
			.await
	}

	pub async fn count_admins(&self) -> Result<i64> {
		self.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = sqlx::query("SELECT COUNT(*) AS cnt FROM admins")
						.fetch_one(&mut *conn)
						.await?;
					Ok(row.get("cnt"))
				})
			})
			.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn record_login(&self, kind: PrincipalKind, id: &str) -> Result<()> {
		let id = id.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					sqlx::query(&format!(
						"UPDATE {} SET last_login = ? WHERE id = ?",
						kind.table()
					))
					.bind(now_rfc3339())
					.bind(&id)
					.execute(&mut *conn)
					.await?;
					Ok(())
				})
			})
			.await
	}

	/// Persist a newly issued refresh token. Expired records are pruned in
	/// the same update.
	#[tracing::instrument(skip(self, record))]
	pub async fn append_refresh_token(
		&self,
		kind: PrincipalKind,
		id: &str,
		record: RefreshTokenRecord,
	) -> Result<()> {
		let id = id.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let mut tokens = load_refresh_tokens(conn, kind, &id).await?;
					prune_expired(&mut tokens);
					tokens.push(record);
					store_refresh_tokens(conn, kind, &id, &tokens).await
				})
			})
			.await
	}

	/// Consume `presented_jti` and persist `replacement` in one step.
	///
	/// Returns false when the presented jti is not in the set (consumed,
	/// revoked, or never issued); nothing is written in that case.
	#[tracing::instrument(skip(self, replacement))]
	pub async fn rotate_refresh_token(
		&self,
		kind: PrincipalKind,
		id: &str,
		presented_jti: &str,
		replacement: RefreshTokenRecord,
	) -> Result<bool> {
		let id = id.to_string();
		let presented_jti = presented_jti.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					let mut tokens = load_refresh_tokens(conn, kind, &id).await?;
					let before = tokens.len();
					tokens.retain(|t| t.jti != presented_jti);
					if tokens.len() == before {
						return Ok(false);
					}
					prune_expired(&mut tokens);
					tokens.push(replacement);
					store_refresh_tokens(conn, kind, &id, &tokens).await?;
					Ok(true)
				})
			})
			.await
	}

	/// Empty the refresh-token set and stamp the revocation tombstone.
	/// Access tokens issued before the stamp fail verification afterwards.
	#[tracing::instrument(skip(self))]
	pub async fn revoke_all(&self, kind: PrincipalKind, id: &str) -> Result<()> {
		let id = id.to_string();
		self.kernel
			.write(move |conn| {
				Box::pin(async move {
					sqlx::query(&format!(
						"UPDATE {} SET refresh_tokens = '[]', last_revoked_at = ? WHERE id = ?",
						kind.table()
					))
					.bind(now_rfc3339())
					.bind(&id)
					.execute(&mut *conn)
					.await?;
					Ok(())
				})
			})
			.await
	}
}

async fn load_refresh_tokens(
	conn: &mut sqlx::SqliteConnection,
	kind: PrincipalKind,
	id: &str,
) -> Result<Vec<RefreshTokenRecord>> {
	let row = sqlx::query(&format!(
		"SELECT refresh_tokens FROM {} WHERE id = ?",
		kind.table()
	))
	.bind(id)
	.fetch_optional(&mut *conn)
	.await?;
	let raw: String = match row {
		Some(row) => row.get("refresh_tokens"),
		None => return Err(DbError::NotFound(format!("principal '{id}'"))),
	};
	Ok(serde_json::from_str(&raw)?)
}

async fn store_refresh_tokens(
	conn: &mut sqlx::SqliteConnection,
	kind: PrincipalKind,
	id: &str,
	tokens: &[RefreshTokenRecord],
) -> Result<()> {
	sqlx::query(&format!(
		"UPDATE {} SET refresh_tokens = ? WHERE id = ?",
		kind.table()
	))
	.bind(serde_json::to_string(tokens)?)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	Ok(())
}

fn prune_expired(tokens: &mut Vec<RefreshTokenRecord>) {
	let now = chrono::Utc::now();
	tokens.retain(|t| t.expires_at > now);
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
	let refresh_raw: String = row.get("refresh_tokens");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let last_login: Option<String> = row.get("last_login");
	let last_revoked_at: Option<String> = row.get("last_revoked_at");
	Ok(User {
		id: row.get("id"),
		email: row.get("email"),
		password_hash: row.get("password_hash"),
		metadata: parse_json_column(row.get("metadata"))?,
		refresh_tokens: serde_json::from_str(&refresh_raw)?,
		email_verified: row.get::<i64, _>("email_verified") != 0,
		last_login: last_login.as_deref().map(parse_timestamp).transpose()?,
		last_revoked_at: last_revoked_at.as_deref().map(parse_timestamp).transpose()?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}

fn admin_from_row(row: &SqliteRow) -> Result<Admin> {
	let refresh_raw: String = row.get("refresh_tokens");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let last_login: Option<String> = row.get("last_login");
	let last_revoked_at: Option<String> = row.get("last_revoked_at");
	Ok(Admin {
		id: row.get("id"),
		username: row.get("username"),
		password_hash: row.get("password_hash"),
		refresh_tokens: serde_json::from_str(&refresh_raw)?,
		last_login: last_login.as_deref().map(parse_timestamp).transpose()?,
		last_revoked_at: last_revoked_at.as_deref().map(parse_timestamp).transpose()?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_kernel;
	use chrono::{Duration, Utc};

	async fn repo() -> PrincipalRepository {
		PrincipalRepository::new(Arc::new(create_test_kernel().await))
	}

	fn record(jti: &str) -> RefreshTokenRecord {
		RefreshTokenRecord {
			jti: jti.to_string(),
			issued_at: Utc::now(),
			expires_at: Utc::now() + Duration::days(7),
		}
	}

	#[tokio::test]
	async fn test_create_user_normalizes_email() {
		let repo = repo().await;
		let user = repo
			.create_user("User@Example.COM", "hash", None)
			.await
			.unwrap();
		assert_eq!(user.email, "user@example.com");
		assert!(!user.email_verified);

		let found = repo.get_user_by_email("USER@example.com").await.unwrap();
		assert!(found.is_some());
	}

	#[tokio::test]
	async fn test_duplicate_email_is_conflict() {
		let repo = repo().await;
		repo.create_user("a@example.com", "hash", None).await.unwrap();
		let err = repo
			.create_user("A@EXAMPLE.COM", "hash", None)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_rotate_consumes_presented_jti() {
		let repo = repo().await;
		let user = repo.create_user("a@example.com", "hash", None).await.unwrap();

		repo.append_refresh_token(PrincipalKind::User, &user.id, record("r1"))
			.await
			.unwrap();

		let rotated = repo
			.rotate_refresh_token(PrincipalKind::User, &user.id, "r1", record("r2"))
			.await
			.unwrap();
		assert!(rotated);

		// Replay of the consumed jti fails.
		let replayed = repo
			.rotate_refresh_token(PrincipalKind::User, &user.id, "r1", record("r3"))
			.await
			.unwrap();
		assert!(!replayed);

		// The replacement still works.
		let rotated = repo
			.rotate_refresh_token(PrincipalKind::User, &user.id, "r2", record("r4"))
			.await
			.unwrap();
		assert!(rotated);
	}

	#[tokio::test]
	async fn test_revoke_all_empties_set_and_stamps_tombstone() {
		let repo = repo().await;
		let user = repo.create_user("a@example.com", "hash", None).await.unwrap();
		repo.append_refresh_token(PrincipalKind::User, &user.id, record("r1"))
			.await
			.unwrap();

		repo.revoke_all(PrincipalKind::User, &user.id).await.unwrap();

		let user = repo.get_user_by_id(&user.id).await.unwrap().unwrap();
		assert!(user.refresh_tokens.is_empty());
		assert!(user.last_revoked_at.is_some());
	}

	#[tokio::test]
	async fn test_expired_records_are_pruned_on_append() {
		let repo = repo().await;
		let user = repo.create_user("a@example.com", "hash", None).await.unwrap();

		let expired = RefreshTokenRecord {
			jti: "old".to_string(),
			issued_at: Utc::now() - Duration::days(8),
			expires_at: Utc::now() - Duration::days(1),
		};
		repo.append_refresh_token(PrincipalKind::User, &user.id, expired)
			.await
			.unwrap();
		repo.append_refresh_token(PrincipalKind::User, &user.id, record("fresh"))
			.await
			.unwrap();

		let user = repo.get_user_by_id(&user.id).await.unwrap().unwrap();
		assert_eq!(user.refresh_tokens.len(), 1);
		assert_eq!(user.refresh_tokens[0].jti, "fresh");
	}

	#[tokio::test]
	async fn test_admin_username_lookup_is_case_insensitive() {
		let repo = repo().await;
		repo.create_admin("Root", "hash").await.unwrap();
		let found = repo.get_admin_by_username("root").await.unwrap();
		assert!(found.is_some());
	}
}

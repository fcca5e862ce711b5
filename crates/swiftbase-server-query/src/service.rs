// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query execution: Parser -> Builder -> Storage, plus event emission.
//!
//! Writes fetch the matched ids first, mutate inside one write scope, and
//! publish per-document events only after the scope commits; a rolled-back
//! write never reaches the hub. Reads never publish.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::Row;
use swiftbase_server_db::{
	now_rfc3339, parse_timestamp, CollectionRepository, DbError, Document, StorageKernel,
};
use swiftbase_server_realtime::{ChangeEvent, ChangeKind, RealtimeHub};
use uuid::Uuid;

use crate::error::{QueryError, Result};
use crate::parser::{parse_query, parse_update, validate_request};
use crate::registry::CustomQueryRegistry;
use crate::request::{Action, QueryRequest};
use crate::sql::{
	build_count, build_delete_by_ids, build_distinct, build_select, build_select_ids,
	build_update_statements, SqlStatement,
};

/// What a query returns, by action.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
	Documents(Vec<Document>),
	Document(Box<Document>),
	Values(Vec<Value>),
	Updated { updated: u64 },
	Deleted { deleted: u64 },
	Count { count: i64 },
	Custom(Value),
}

pub struct QueryService {
	kernel: Arc<StorageKernel>,
	collections: Arc<CollectionRepository>,
	registry: Arc<CustomQueryRegistry>,
	hub: Arc<RealtimeHub>,
}

impl QueryService {
	pub fn new(
		kernel: Arc<StorageKernel>,
		collections: Arc<CollectionRepository>,
		registry: Arc<CustomQueryRegistry>,
		hub: Arc<RealtimeHub>,
	) -> Self {
		Self {
			kernel,
			collections,
			registry,
			hub,
		}
	}

	pub fn registry(&self) -> &Arc<CustomQueryRegistry> {
		&self.registry
	}

	/// Execute one validated request.
	#[tracing::instrument(skip(self, request, principal_id), fields(action = ?request.action, collection = %request.collection))]
	pub async fn execute(
		&self,
		request: &QueryRequest,
		principal_id: Option<&str>,
	) -> Result<QueryOutcome> {
		validate_request(request)?;

		match request.action {
			Action::Find => self.find(request).await,
			Action::FindOne => self.find_one(request).await,
			Action::Count => self.count(request).await,
			Action::Create => self.create(request, principal_id).await,
			Action::Update => self.update(request, principal_id).await,
			Action::Delete => self.delete(request).await,
			Action::Aggregate => Err(QueryError::NotImplemented("aggregate")),
			Action::Custom => self.custom(request).await,
		}
	}

	async fn find(&self, request: &QueryRequest) -> Result<QueryOutcome> {
		let collection_id = self.resolve_collection(&request.collection).await?;
		let parsed = parse_query(request.query.as_ref())?;

		if let Some(distinct) = parsed.distinct.clone() {
			let statement = build_distinct(&collection_id, &distinct, &parsed)?;
			let values = self.fetch_distinct(statement).await?;
			return Ok(QueryOutcome::Values(values));
		}

		let statement = build_select(&collection_id, &parsed)?;
		let documents = self.fetch_documents(statement, parsed.select.as_deref()).await?;
		Ok(QueryOutcome::Documents(documents))
	}

	async fn find_one(&self, request: &QueryRequest) -> Result<QueryOutcome> {
		let collection_id = self.resolve_collection(&request.collection).await?;
		let mut parsed = parse_query(request.query.as_ref())?;
		parsed.limit = 1;

		let statement = build_select(&collection_id, &parsed)?;
		let mut documents = self.fetch_documents(statement, parsed.select.as_deref()).await?;
		match documents.pop() {
			Some(document) => Ok(QueryOutcome::Document(Box::new(document))),
			None => Err(QueryError::DocumentNotFound),
		}
	}

	async fn count(&self, request: &QueryRequest) -> Result<QueryOutcome> {
		let collection_id = self.resolve_collection(&request.collection).await?;
		let parsed = parse_query(request.query.as_ref())?;
		let statement = build_count(&collection_id, &parsed.where_tree)?;

		let count = self
			.kernel
			.read(move |conn| {
				Box::pin(async move {
					let row = statement
						.apply(sqlx::query(&statement.sql))
						.fetch_one(&mut *conn)
						.await?;
					Ok(row.get::<i64, _>("cnt"))
				})
			})
			.await?;
		Ok(QueryOutcome::Count { count })
	}

	async fn create(
		&self,
		request: &QueryRequest,
		principal_id: Option<&str>,
	) -> Result<QueryOutcome> {
		let collection_id = self.resolve_collection(&request.collection).await?;
		let Some(Value::Object(mut data)) = request.data.clone() else {
			return Err(QueryError::InvalidQuery(
				"create requires data to be an object".to_string(),
			));
		};

		let id = match data.get("_id") {
			None => Uuid::new_v4().to_string(),
			Some(Value::String(id)) if !id.is_empty() => id.clone(),
			Some(_) => {
				return Err(QueryError::InvalidQuery(
					"_id must be a non-empty string".to_string(),
				));
			}
		};
		data.insert("_id".to_string(), Value::String(id.clone()));
		let data = Value::Object(data);

		let document = {
			let collection_id = collection_id.clone();
			let id = id.clone();
			let serialized = data.to_string();
			let created_by = principal_id.map(str::to_string);
			self.kernel
				.write(move |conn| {
					Box::pin(async move {
						let taken = sqlx::query(
							"SELECT 1 FROM documents WHERE collection_id = ? AND id = ?",
						)
						.bind(&collection_id)
						.bind(&id)
						.fetch_optional(&mut *conn)
						.await?;
						if taken.is_some() {
							return Err(DbError::Conflict(format!(
								"document '{id}' already exists"
							)));
						}

						let now = now_rfc3339();
						sqlx::query(
							"INSERT INTO documents (id, collection_id, data, created_by, created_at, updated_at) \
							 VALUES (?, ?, ?, ?, ?, ?)",
						)
						.bind(&id)
						.bind(&collection_id)
						.bind(&serialized)
						.bind(&created_by)
						.bind(&now)
						.bind(&now)
						.execute(&mut *conn)
						.await?;

						let row = sqlx::query(
							"SELECT id, data, version, created_at, updated_at, created_by, updated_by \
							 FROM documents WHERE collection_id = ? AND id = ?",
						)
						.bind(&collection_id)
						.bind(&id)
						.fetch_one(&mut *conn)
						.await?;
						document_from_row(&row)
					})
				})
				.await?
		};

		self.hub
			.publish(&ChangeEvent {
				kind: ChangeKind::Create,
				collection: request.collection.clone(),
				document_id: id,
				document: serde_json::to_value(&document).ok(),
				timestamp: Utc::now(),
			})
			.await;

		Ok(QueryOutcome::Document(Box::new(document)))
	}

	async fn update(
		&self,
		request: &QueryRequest,
		principal_id: Option<&str>,
	) -> Result<QueryOutcome> {
		let collection_id = self.resolve_collection(&request.collection).await?;
		let parsed = parse_query(request.query.as_ref())?;
		let data = request
			.data
			.as_ref()
			.ok_or_else(|| QueryError::InvalidQuery("update requires data".to_string()))?;
		let ops = parse_update(data)?;

		let ids_statement = build_select_ids(&collection_id, &parsed.where_tree)?;
		let matched = {
			let collection_id = collection_id.clone();
			let updated_by = principal_id.map(str::to_string);
			self.kernel
				.write(move |conn| {
					Box::pin(async move {
						let ids = fetch_ids(&ids_statement, conn).await?;
						if ids.is_empty() {
							return Ok(ids);
						}

						if let Some(updated_by) = &updated_by {
							let marker = build_updated_by(updated_by, &collection_id, &ids);
							marker
								.apply(sqlx::query(&marker.sql))
								.execute(&mut *conn)
								.await?;
						}

						let statements = build_update_statements(&collection_id, &ids, &ops)
							.map_err(|e| DbError::Internal(e.to_string()))?;
						for statement in &statements {
							statement
								.apply(sqlx::query(&statement.sql))
								.execute(&mut *conn)
								.await?;
						}
						Ok(ids)
					})
				})
				.await?
		};

		for id in &matched {
			self.hub
				.publish(&ChangeEvent {
					kind: ChangeKind::Update,
					collection: request.collection.clone(),
					document_id: id.clone(),
					document: Some(data.clone()),
					timestamp: Utc::now(),
				})
				.await;
		}

		Ok(QueryOutcome::Updated {
			updated: matched.len() as u64,
		})
	}

	async fn delete(&self, request: &QueryRequest) -> Result<QueryOutcome> {
		let collection_id = self.resolve_collection(&request.collection).await?;
		let parsed = parse_query(request.query.as_ref())?;

		let ids_statement = build_select_ids(&collection_id, &parsed.where_tree)?;
		let matched = {
			let collection_id = collection_id.clone();
			self.kernel
				.write(move |conn| {
					Box::pin(async move {
						let ids = fetch_ids(&ids_statement, conn).await?;
						if ids.is_empty() {
							return Ok(ids);
						}
						let statement = build_delete_by_ids(&collection_id, &ids);
						statement
							.apply(sqlx::query(&statement.sql))
							.execute(&mut *conn)
							.await?;
						Ok(ids)
					})
				})
				.await?
		};

		for id in &matched {
			self.hub
				.publish(&ChangeEvent {
					kind: ChangeKind::Delete,
					collection: request.collection.clone(),
					document_id: id.clone(),
					document: None,
					timestamp: Utc::now(),
				})
				.await;
		}

		Ok(QueryOutcome::Deleted {
			deleted: matched.len() as u64,
		})
	}

	async fn custom(&self, request: &QueryRequest) -> Result<QueryOutcome> {
		let name = request.custom.as_deref().unwrap_or_default();
		let query = self.registry.get(name)?;
		let empty = serde_json::Map::new();
		let params = request.params.as_ref().unwrap_or(&empty);
		let result = query.run(params, &self.kernel).await?;
		Ok(QueryOutcome::Custom(result))
	}

	async fn resolve_collection(&self, name: &str) -> Result<String> {
		self.collections
			.resolve_id(name)
			.await?
			.ok_or_else(|| QueryError::CollectionNotFound(name.to_string()))
	}

	async fn fetch_documents(
		&self,
		statement: SqlStatement,
		select: Option<&[String]>,
	) -> Result<Vec<Document>> {
		let select = select.map(<[String]>::to_vec);
		let documents = self
			.kernel
			.read(move |conn| {
				Box::pin(async move {
					let rows = statement
						.apply(sqlx::query(&statement.sql))
						.fetch_all(&mut *conn)
						.await?;
					let mut documents = Vec::with_capacity(rows.len());
					for row in &rows {
						let mut document = document_from_row(row)?;
						if let Some(fields) = &select {
							document.data = project_fields(&document.data, fields);
						}
						documents.push(document);
					}
					Ok(documents)
				})
			})
			.await?;
		Ok(documents)
	}

	async fn fetch_distinct(&self, statement: SqlStatement) -> Result<Vec<Value>> {
		let values = self
			.kernel
			.read(move |conn| {
				Box::pin(async move {
					let rows = statement
						.apply(sqlx::query(&statement.sql))
						.fetch_all(&mut *conn)
						.await?;
					let mut values = Vec::with_capacity(rows.len());
					for row in &rows {
						values.push(column_to_json(row, "value")?);
					}
					Ok(values)
				})
			})
			.await?;
		Ok(values)
	}
}

async fn fetch_ids(
	statement: &SqlStatement,
	conn: &mut sqlx::SqliteConnection,
) -> std::result::Result<Vec<String>, DbError> {
	let rows = statement
		.apply(sqlx::query(&statement.sql))
		.fetch_all(&mut *conn)
		.await?;
	Ok(rows.iter().map(|row| row.get("id")).collect())
}

fn build_updated_by(updated_by: &str, collection_id: &str, ids: &[String]) -> SqlStatement {
	use crate::sql::BindValue;
	let placeholders = vec!["?"; ids.len()].join(", ");
	let sql = format!(
		"UPDATE documents SET updated_by = ? WHERE collection_id = ? AND id IN ({placeholders})"
	);
	let mut binds = vec![
		BindValue::Text(updated_by.to_string()),
		BindValue::Text(collection_id.to_string()),
	];
	binds.extend(ids.iter().map(|id| BindValue::Text(id.clone())));
	SqlStatement { sql, binds }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<Document, DbError> {
	let raw: String = row.get("data");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	Ok(Document {
		id: row.get("id"),
		data: serde_json::from_str(&raw)?,
		version: row.get("version"),
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
		created_by: row.get("created_by"),
		updated_by: row.get("updated_by"),
	})
}

fn column_to_json(
	row: &sqlx::sqlite::SqliteRow,
	column: &str,
) -> std::result::Result<Value, DbError> {
	use sqlx::{TypeInfo, ValueRef};

	let raw = row
		.try_get_raw(column)
		.map_err(|e| DbError::Internal(format!("distinct column: {e}")))?;
	if raw.is_null() {
		return Ok(Value::Null);
	}
	let decoded = match raw.type_info().name() {
		"INTEGER" => Value::from(row.try_get::<i64, _>(column).map_err(sqlx::Error::from)?),
		"REAL" => Value::from(row.try_get::<f64, _>(column).map_err(sqlx::Error::from)?),
		_ => Value::from(row.try_get::<String, _>(column).map_err(sqlx::Error::from)?),
	};
	Ok(decoded)
}

/// Keep only the selected field paths (plus `_id`) in a data object.
fn project_fields(data: &Value, fields: &[String]) -> Value {
	let Value::Object(source) = data else {
		return data.clone();
	};
	let mut out = serde_json::Map::new();
	if let Some(id) = source.get("_id") {
		out.insert("_id".to_string(), id.clone());
	}
	for field in fields {
		let mut src = source;
		let segments: Vec<&str> = field.split('.').collect();
		let mut found = true;
		for segment in &segments[..segments.len() - 1] {
			match src.get(*segment).and_then(Value::as_object) {
				Some(nested) => src = nested,
				None => {
					found = false;
					break;
				}
			}
		}
		if !found {
			continue;
		}
		let leaf = segments[segments.len() - 1];
		if let Some(value) = src.get(leaf) {
			insert_path(&mut out, &segments, value.clone());
		}
	}
	Value::Object(out)
}

fn insert_path(out: &mut serde_json::Map<String, Value>, segments: &[&str], value: Value) {
	if segments.len() == 1 {
		out.insert(segments[0].to_string(), value);
		return;
	}
	let entry = out
		.entry(segments[0].to_string())
		.or_insert_with(|| Value::Object(serde_json::Map::new()));
	if let Value::Object(nested) = entry {
		insert_path(nested, &segments[1..], value);
	}
}

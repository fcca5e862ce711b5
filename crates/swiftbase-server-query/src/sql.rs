// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lowering of parsed queries into parameterized SQLite.
//!
//! Every request-originated value travels as a positional parameter; JSON
//! paths derived from (already validated) field names are bound as
//! parameters too, so the statement text never interpolates request strings.
//! The only exception is `_id`, which lowers to the literal `id` column.

use serde_json::Value;

use crate::error::Result;
use crate::parser::{Condition, ParsedQuery, TypeName, UpdateOp, WhereNode, WhereOp};
use crate::request::SortDirection;

/// A positional bind value.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
	Null,
	Int(i64),
	Real(f64),
	Text(String),
}

/// One ready-to-run statement.
#[derive(Debug, Clone)]
pub struct SqlStatement {
	pub sql: String,
	pub binds: Vec<BindValue>,
}

impl SqlStatement {
	/// Bind all parameters onto a sqlx query.
	pub fn apply<'q>(
		&'q self,
		mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
	) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
		for bind in &self.binds {
			query = match bind {
				BindValue::Null => query.bind(Option::<String>::None),
				BindValue::Int(v) => query.bind(*v),
				BindValue::Real(v) => query.bind(*v),
				BindValue::Text(v) => query.bind(v.as_str()),
			};
		}
		query
	}
}

const DOCUMENT_COLUMNS: &str =
	"id, data, version, created_at, updated_at, created_by, updated_by";

/// SELECT for find/findOne.
pub fn build_select(collection_id: &str, query: &ParsedQuery) -> Result<SqlStatement> {
	let mut sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection_id = ?");
	let mut binds = vec![BindValue::Text(collection_id.to_string())];

	append_where(&query.where_tree, &mut sql, &mut binds)?;
	append_order_by(&query.order_by, &mut sql, &mut binds);

	sql.push_str(" LIMIT ? OFFSET ?");
	binds.push(BindValue::Int(query.limit));
	binds.push(BindValue::Int(query.offset));

	Ok(SqlStatement { sql, binds })
}

/// SELECT DISTINCT of one extracted field.
pub fn build_distinct(
	collection_id: &str,
	field: &str,
	query: &ParsedQuery,
) -> Result<SqlStatement> {
	let mut sql = String::from("SELECT DISTINCT ");
	let mut binds = Vec::new();
	push_field_expr(field, &mut sql, &mut binds);
	sql.push_str(" AS value FROM documents WHERE collection_id = ?");
	binds.push(BindValue::Text(collection_id.to_string()));

	append_where(&query.where_tree, &mut sql, &mut binds)?;

	sql.push_str(" LIMIT ? OFFSET ?");
	binds.push(BindValue::Int(query.limit));
	binds.push(BindValue::Int(query.offset));

	Ok(SqlStatement { sql, binds })
}

/// COUNT over the matching set.
pub fn build_count(collection_id: &str, where_tree: &Option<WhereNode>) -> Result<SqlStatement> {
	let mut sql = String::from("SELECT COUNT(*) AS cnt FROM documents WHERE collection_id = ?");
	let mut binds = vec![BindValue::Text(collection_id.to_string())];
	append_where(where_tree, &mut sql, &mut binds)?;
	Ok(SqlStatement { sql, binds })
}

/// The matched document ids, fetched before a mutation so events can carry
/// them after commit.
pub fn build_select_ids(
	collection_id: &str,
	where_tree: &Option<WhereNode>,
) -> Result<SqlStatement> {
	let mut sql = String::from("SELECT id FROM documents WHERE collection_id = ?");
	let mut binds = vec![BindValue::Text(collection_id.to_string())];
	append_where(where_tree, &mut sql, &mut binds)?;
	sql.push_str(" ORDER BY id");
	Ok(SqlStatement { sql, binds })
}

/// DELETE of an explicit id set.
pub fn build_delete_by_ids(collection_id: &str, ids: &[String]) -> SqlStatement {
	let mut sql = String::from("DELETE FROM documents WHERE collection_id = ?");
	let mut binds = vec![BindValue::Text(collection_id.to_string())];
	append_id_scope(ids, &mut sql, &mut binds);
	SqlStatement { sql, binds }
}

/// One or more UPDATE statements realizing the parsed operators against an
/// explicit id set. `$pull` produces one statement per field; the rest chain
/// their fields into a single `json_set`/`json_remove` call.
pub fn build_update_statements(
	collection_id: &str,
	ids: &[String],
	ops: &[UpdateOp],
) -> Result<Vec<SqlStatement>> {
	let mut statements = Vec::new();
	for op in ops {
		match op {
			UpdateOp::Set(pairs) => {
				let mut sql = String::from("UPDATE documents SET data = json_set(data");
				let mut binds = Vec::new();
				for (field, value) in pairs {
					sql.push_str(", ?, json(?)");
					binds.push(path_bind(field));
					binds.push(BindValue::Text(value.to_string()));
				}
				sql.push(')');
				finish_update(collection_id, ids, sql, binds, &mut statements);
			}
			UpdateOp::Unset(fields) => {
				let mut sql = String::from("UPDATE documents SET data = json_remove(data");
				let mut binds = Vec::new();
				for field in fields {
					sql.push_str(", ?");
					binds.push(path_bind(field));
				}
				sql.push(')');
				finish_update(collection_id, ids, sql, binds, &mut statements);
			}
			UpdateOp::Inc(pairs) => {
				let mut sql = String::from("UPDATE documents SET data = json_set(data");
				let mut binds = Vec::new();
				for (field, amount) in pairs {
					sql.push_str(", ?, COALESCE(json_extract(data, ?), 0) + ?");
					binds.push(path_bind(field));
					binds.push(path_bind(field));
					binds.push(number_bind(*amount));
				}
				sql.push(')');
				finish_update(collection_id, ids, sql, binds, &mut statements);
			}
			UpdateOp::Push(pairs) => {
				let mut sql = String::from("UPDATE documents SET data = json_set(data");
				let mut binds = Vec::new();
				for (field, value) in pairs {
					sql.push_str(
						", ?, json_insert(COALESCE(json_extract(data, ?), '[]'), '$[#]', json(?))",
					);
					binds.push(path_bind(field));
					binds.push(path_bind(field));
					binds.push(BindValue::Text(value.to_string()));
				}
				sql.push(')');
				finish_update(collection_id, ids, sql, binds, &mut statements);
			}
			UpdateOp::AddToSet(pairs) => {
				let mut sql = String::from("UPDATE documents SET data = json_set(data");
				let mut binds = Vec::new();
				for (field, value) in pairs {
					sql.push_str(
						", ?, CASE WHEN EXISTS (SELECT 1 FROM json_each(COALESCE(json_extract(data, ?), '[]')) \
						 WHERE json_each.value = json_extract(?, '$')) \
						 THEN json(COALESCE(json_extract(data, ?), '[]')) \
						 ELSE json_insert(COALESCE(json_extract(data, ?), '[]'), '$[#]', json(?)) END",
					);
					binds.push(path_bind(field));
					binds.push(path_bind(field));
					binds.push(BindValue::Text(value.to_string()));
					binds.push(path_bind(field));
					binds.push(path_bind(field));
					binds.push(BindValue::Text(value.to_string()));
				}
				sql.push(')');
				finish_update(collection_id, ids, sql, binds, &mut statements);
			}
			UpdateOp::Pull(pairs) => {
				// Rebuild the array without the matching elements. Scoped to
				// rows where the field is actually an array so a missing
				// field is not created as null.
				for (field, value) in pairs {
					let mut sql = String::from(
						"UPDATE documents SET data = json_set(data, ?, \
						 COALESCE((SELECT json_group_array(\
						 CASE WHEN json_each.type IN ('object', 'array') THEN json(json_each.value) ELSE json_each.value END) \
						 FROM json_each(data, ?) WHERE json_each.value IS NOT json_extract(?, '$')), json_array()))",
					);
					let mut binds = vec![
						path_bind(field),
						path_bind(field),
						BindValue::Text(value.to_string()),
					];
					sql.push_str(" WHERE collection_id = ?");
					binds.push(BindValue::Text(collection_id.to_string()));
					append_id_scope(ids, &mut sql, &mut binds);
					sql.push_str(" AND json_type(data, ?) = 'array'");
					binds.push(path_bind(field));
					statements.push(SqlStatement { sql, binds });
				}
			}
		}
	}
	Ok(statements)
}

fn finish_update(
	collection_id: &str,
	ids: &[String],
	mut sql: String,
	mut binds: Vec<BindValue>,
	statements: &mut Vec<SqlStatement>,
) {
	sql.push_str(" WHERE collection_id = ?");
	binds.push(BindValue::Text(collection_id.to_string()));
	append_id_scope(ids, &mut sql, &mut binds);
	statements.push(SqlStatement { sql, binds });
}

fn append_id_scope(ids: &[String], sql: &mut String, binds: &mut Vec<BindValue>) {
	sql.push_str(" AND id IN (");
	for (i, id) in ids.iter().enumerate() {
		if i > 0 {
			sql.push_str(", ");
		}
		sql.push('?');
		binds.push(BindValue::Text(id.clone()));
	}
	sql.push(')');
}

fn append_where(
	where_tree: &Option<WhereNode>,
	sql: &mut String,
	binds: &mut Vec<BindValue>,
) -> Result<()> {
	if let Some(node) = where_tree {
		sql.push_str(" AND ");
		lower_node(node, sql, binds)?;
	}
	Ok(())
}

fn append_order_by(
	order_by: &[(String, SortDirection)],
	sql: &mut String,
	binds: &mut Vec<BindValue>,
) {
	if order_by.is_empty() {
		return;
	}
	sql.push_str(" ORDER BY ");
	for (i, (field, direction)) in order_by.iter().enumerate() {
		if i > 0 {
			sql.push_str(", ");
		}
		push_field_expr(field, sql, binds);
		sql.push_str(match direction {
			SortDirection::Asc => " ASC",
			SortDirection::Desc => " DESC",
		});
	}
}

fn lower_node(node: &WhereNode, sql: &mut String, binds: &mut Vec<BindValue>) -> Result<()> {
	match node {
		WhereNode::And(children) | WhereNode::Or(children) => {
			if children.is_empty() {
				sql.push_str("1=1");
				return Ok(());
			}
			let joiner = if matches!(node, WhereNode::And(_)) {
				" AND "
			} else {
				" OR "
			};
			sql.push('(');
			for (i, child) in children.iter().enumerate() {
				if i > 0 {
					sql.push_str(joiner);
				}
				lower_node(child, sql, binds)?;
			}
			sql.push(')');
		}
		WhereNode::Not(inner) => {
			sql.push_str("NOT (");
			lower_node(inner, sql, binds)?;
			sql.push(')');
		}
		WhereNode::Condition(condition) => lower_condition(condition, sql, binds)?,
	}
	Ok(())
}

fn lower_condition(
	condition: &Condition,
	sql: &mut String,
	binds: &mut Vec<BindValue>,
) -> Result<()> {
	let field = condition.field.as_str();
	match &condition.op {
		WhereOp::Eq(Value::Null) => {
			push_field_expr(field, sql, binds);
			sql.push_str(" IS NULL");
		}
		WhereOp::Ne(Value::Null) => {
			push_field_expr(field, sql, binds);
			sql.push_str(" IS NOT NULL");
		}
		WhereOp::Eq(value) => comparison(field, "=", value, sql, binds),
		WhereOp::Ne(value) => comparison(field, "<>", value, sql, binds),
		WhereOp::Gt(value) => comparison(field, ">", value, sql, binds),
		WhereOp::Gte(value) => comparison(field, ">=", value, sql, binds),
		WhereOp::Lt(value) => comparison(field, "<", value, sql, binds),
		WhereOp::Lte(value) => comparison(field, "<=", value, sql, binds),
		WhereOp::In(values) | WhereOp::Nin(values) => {
			let negated = matches!(condition.op, WhereOp::Nin(_));
			if values.is_empty() {
				sql.push_str(if negated { "1=1" } else { "1=0" });
				return Ok(());
			}
			push_field_expr(field, sql, binds);
			sql.push_str(if negated { " NOT IN (" } else { " IN (" });
			for (i, value) in values.iter().enumerate() {
				if i > 0 {
					sql.push_str(", ");
				}
				push_value_expr(value, sql, binds);
			}
			sql.push(')');
		}
		WhereOp::Exists(exists) => {
			sql.push_str("json_type(data, ?)");
			binds.push(path_bind(field));
			sql.push_str(if *exists { " IS NOT NULL" } else { " IS NULL" });
		}
		WhereOp::Type(type_name) => {
			sql.push_str("json_type(data, ?)");
			binds.push(path_bind(field));
			match json_type_labels(*type_name) {
				(single, None) => {
					sql.push_str(" = ?");
					binds.push(BindValue::Text(single.to_string()));
				}
				(first, Some(second)) => {
					sql.push_str(" IN (?, ?)");
					binds.push(BindValue::Text(first.to_string()));
					binds.push(BindValue::Text(second.to_string()));
				}
			}
		}
		WhereOp::All(values) => {
			if values.is_empty() {
				sql.push_str("1=1");
				return Ok(());
			}
			sql.push('(');
			for (i, value) in values.iter().enumerate() {
				if i > 0 {
					sql.push_str(" AND ");
				}
				sql.push_str("EXISTS (SELECT 1 FROM json_each(data, ?) WHERE json_each.value ");
				binds.push(path_bind(field));
				match scalar_bind(value) {
					Some(bind) => {
						sql.push_str("= ?");
						binds.push(bind);
					}
					None => {
						sql.push_str("= json(?)");
						binds.push(BindValue::Text(value.to_string()));
					}
				}
				sql.push(')');
			}
			sql.push(')');
		}
		WhereOp::ElemMatch(pairs) => {
			sql.push('(');
			for (i, (key, value)) in pairs.iter().enumerate() {
				if i > 0 {
					sql.push_str(" AND ");
				}
				sql.push_str(
					"EXISTS (SELECT 1 FROM json_each(data, ?) WHERE json_extract(json_each.value, ?) ",
				);
				binds.push(path_bind(field));
				binds.push(BindValue::Text(format!("$.{key}")));
				match scalar_bind(value) {
					Some(bind) => {
						sql.push_str("= ?");
						binds.push(bind);
					}
					None => {
						sql.push_str("= json(?)");
						binds.push(BindValue::Text(value.to_string()));
					}
				}
				sql.push(')');
			}
			sql.push(')');
		}
		WhereOp::Size(size) => {
			sql.push_str("json_array_length(data, ?) = ?");
			binds.push(path_bind(field));
			binds.push(BindValue::Int(*size));
		}
		WhereOp::Regex(pattern) => {
			push_field_expr(field, sql, binds);
			sql.push_str(" LIKE ? ESCAPE '\\'");
			binds.push(BindValue::Text(regex_to_like(pattern)));
		}
		WhereOp::Mod { divisor, remainder } => {
			sql.push('(');
			push_field_expr(field, sql, binds);
			sql.push_str(" % ?) = ?");
			binds.push(BindValue::Int(*divisor));
			binds.push(BindValue::Int(*remainder));
		}
	}
	Ok(())
}

fn comparison(field: &str, op: &str, value: &Value, sql: &mut String, binds: &mut Vec<BindValue>) {
	push_field_expr(field, sql, binds);
	sql.push(' ');
	sql.push_str(op);
	sql.push(' ');
	push_value_expr(value, sql, binds);
}

/// `_id` is the id column; every other field is a bound JSON-path extraction.
fn push_field_expr(field: &str, sql: &mut String, binds: &mut Vec<BindValue>) {
	if field == "_id" {
		sql.push_str("id");
	} else {
		sql.push_str("json_extract(data, ?)");
		binds.push(path_bind(field));
	}
}

fn push_value_expr(value: &Value, sql: &mut String, binds: &mut Vec<BindValue>) {
	match scalar_bind(value) {
		Some(bind) => {
			sql.push('?');
			binds.push(bind);
		}
		None => {
			// Objects and arrays compare by canonical JSON text.
			sql.push_str("json(?)");
			binds.push(BindValue::Text(value.to_string()));
		}
	}
}

fn scalar_bind(value: &Value) -> Option<BindValue> {
	match value {
		Value::Null => Some(BindValue::Null),
		Value::Bool(b) => Some(BindValue::Int(i64::from(*b))),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Some(BindValue::Int(i))
			} else {
				n.as_f64().map(BindValue::Real)
			}
		}
		Value::String(s) => Some(BindValue::Text(s.clone())),
		Value::Array(_) | Value::Object(_) => None,
	}
}

fn path_bind(field: &str) -> BindValue {
	BindValue::Text(format!("$.{field}"))
}

fn number_bind(amount: f64) -> BindValue {
	if amount.fract() == 0.0 && amount.abs() < (i64::MAX as f64) {
		BindValue::Int(amount as i64)
	} else {
		BindValue::Real(amount)
	}
}

fn json_type_labels(type_name: TypeName) -> (&'static str, Option<&'static str>) {
	match type_name {
		TypeName::String => ("text", None),
		TypeName::Int | TypeName::Long => ("integer", None),
		TypeName::Double => ("real", None),
		TypeName::Number => ("integer", Some("real")),
		TypeName::Bool => ("true", Some("false")),
		TypeName::Array => ("array", None),
		TypeName::Object => ("object", None),
		TypeName::Null => ("null", None),
	}
}

/// Convert the supported regex subset to a LIKE pattern: `.*` becomes the
/// many-wildcard, `.` the one-wildcard, anchors are stripped, and an
/// unanchored pattern matches anywhere. A compatibility approximation, not
/// true regex.
fn regex_to_like(pattern: &str) -> String {
	let mut rest = pattern;
	let anchored_start = rest.starts_with('^');
	if anchored_start {
		rest = &rest[1..];
	}
	let anchored_end = rest.ends_with('$') && !rest.ends_with("\\$");
	if anchored_end {
		rest = &rest[..rest.len() - 1];
	}

	let mut body = String::with_capacity(rest.len() + 2);
	let mut chars = rest.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'.' => {
				if chars.peek() == Some(&'*') {
					chars.next();
					body.push('%');
				} else {
					body.push('_');
				}
			}
			'\\' => {
				if let Some(escaped) = chars.next() {
					push_like_literal(escaped, &mut body);
				}
			}
			other => push_like_literal(other, &mut body),
		}
	}

	let mut result = String::with_capacity(body.len() + 2);
	if !anchored_start {
		result.push('%');
	}
	result.push_str(&body);
	if !anchored_end {
		result.push('%');
	}
	result
}

fn push_like_literal(c: char, out: &mut String) {
	match c {
		'%' => out.push_str("\\%"),
		'_' => out.push_str("\\_"),
		'\\' => out.push_str("\\\\"),
		other => out.push(other),
	}
}

/// Builder-level guard used by debug assertions and tests: a statement may
/// not contain a single-quoted literal derived from the request. The fixed
/// literals the lowering itself emits are allow-listed.
#[cfg(test)]
fn statement_literals(sql: &str) -> Vec<&str> {
	let mut literals = Vec::new();
	let mut rest = sql;
	while let Some(start) = rest.find('\'') {
		let tail = &rest[start + 1..];
		let Some(end) = tail.find('\'') else { break };
		literals.push(&tail[..end]);
		rest = &tail[end + 1..];
	}
	literals
}

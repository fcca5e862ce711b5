// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request validation and where-clause lowering.
//!
//! Identifiers are the injection surface, so every field path referenced in
//! `where`, `select`, `orderBy` or `distinct` must match the safe path regex
//! before it goes anywhere near the SQL builder. Operators come from closed
//! sets; anything unrecognized is rejected, never passed through.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::request::{Action, QueryRequest, QuerySpec, SortDirection};

/// Server-side cap and default for `limit`.
pub const MAX_LIMIT: i64 = 1000;

/// Safe field path: dot-separated segments of alphanumerics, underscore,
/// hyphen.
static FIELD_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").unwrap()
});

/// Collection names: one safe segment, no dots.
static COLLECTION_NAME_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

pub fn validate_collection_name(name: &str) -> Result<()> {
	if name.is_empty() || !COLLECTION_NAME_REGEX.is_match(name) {
		return Err(QueryError::InvalidQuery(format!(
			"invalid collection name '{name}'"
		)));
	}
	Ok(())
}

pub fn validate_field_path(path: &str) -> Result<()> {
	if path.is_empty() || !FIELD_PATH_REGEX.is_match(path) {
		return Err(QueryError::InvalidQuery(format!(
			"unsafe field path '{path}'"
		)));
	}
	Ok(())
}

/// Recognized `$type` names, mapped later onto SQLite's json_type labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
	String,
	Int,
	Long,
	Double,
	Number,
	Bool,
	Array,
	Object,
	Null,
}

impl TypeName {
	fn parse(name: &str) -> Result<Self> {
		match name {
			"string" => Ok(TypeName::String),
			"int" => Ok(TypeName::Int),
			"long" => Ok(TypeName::Long),
			"double" => Ok(TypeName::Double),
			"number" => Ok(TypeName::Number),
			"bool" | "boolean" => Ok(TypeName::Bool),
			"array" => Ok(TypeName::Array),
			"object" => Ok(TypeName::Object),
			"null" => Ok(TypeName::Null),
			other => Err(QueryError::InvalidQuery(format!(
				"unrecognized $type name '{other}'"
			))),
		}
	}
}

/// One comparison against a field.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereOp {
	Eq(Value),
	Ne(Value),
	Gt(Value),
	Gte(Value),
	Lt(Value),
	Lte(Value),
	In(Vec<Value>),
	Nin(Vec<Value>),
	Exists(bool),
	Type(TypeName),
	All(Vec<Value>),
	ElemMatch(Vec<(String, Value)>),
	Size(i64),
	Regex(String),
	Mod { divisor: i64, remainder: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
	pub field: String,
	pub op: WhereOp,
}

/// Canonical where tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
	And(Vec<WhereNode>),
	Or(Vec<WhereNode>),
	Not(Box<WhereNode>),
	Condition(Condition),
}

/// A fully validated query block, ready for SQL lowering.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
	pub where_tree: Option<WhereNode>,
	pub select: Option<Vec<String>>,
	pub order_by: Vec<(String, SortDirection)>,
	pub limit: i64,
	pub offset: i64,
	pub distinct: Option<String>,
}

/// Validate and lower the `query` block. Absent blocks get the defaults.
pub fn parse_query(spec: Option<&QuerySpec>) -> Result<ParsedQuery> {
	let Some(spec) = spec else {
		return Ok(ParsedQuery {
			where_tree: None,
			select: None,
			order_by: Vec::new(),
			limit: MAX_LIMIT,
			offset: 0,
			distinct: None,
		});
	};

	let limit = match spec.limit {
		Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
		Some(limit) => {
			return Err(QueryError::InvalidQuery(format!(
				"limit must be between 1 and {MAX_LIMIT}, got {limit}"
			)));
		}
		None => MAX_LIMIT,
	};

	let offset = match spec.offset {
		Some(offset) if offset >= 0 => offset,
		Some(offset) => {
			return Err(QueryError::InvalidQuery(format!(
				"offset must be non-negative, got {offset}"
			)));
		}
		None => 0,
	};

	if let Some(select) = &spec.select {
		for field in select {
			validate_field_path(field)?;
		}
	}

	let mut order_by = Vec::new();
	if let Some(ordering) = &spec.order_by {
		for (field, direction) in ordering {
			validate_field_path(field)?;
			order_by.push((field.clone(), *direction));
		}
	}

	if let Some(distinct) = &spec.distinct {
		validate_field_path(distinct)?;
	}

	let where_tree = match &spec.r#where {
		Some(value) => parse_where(value)?,
		None => None,
	};

	Ok(ParsedQuery {
		where_tree,
		select: spec.select.clone(),
		order_by,
		limit,
		offset,
		distinct: spec.distinct.clone(),
	})
}

/// Lower a raw `where` value into the canonical tree. An empty object means
/// no constraint.
pub fn parse_where(value: &Value) -> Result<Option<WhereNode>> {
	let Value::Object(map) = value else {
		return Err(QueryError::InvalidQuery(
			"where must be an object".to_string(),
		));
	};
	if map.is_empty() {
		return Ok(None);
	}

	let mut nodes = Vec::with_capacity(map.len());
	for (key, val) in map {
		match key.as_str() {
			"$and" | "$or" => {
				let children = logical_children(key, val)?;
				nodes.push(if key == "$and" {
					WhereNode::And(children)
				} else {
					WhereNode::Or(children)
				});
			}
			"$not" => {
				let inner = parse_where(val)?.ok_or_else(|| {
					QueryError::InvalidQuery("$not requires a non-empty object".to_string())
				})?;
				nodes.push(WhereNode::Not(Box::new(inner)));
			}
			key if key.starts_with('$') => {
				return Err(QueryError::InvalidQuery(format!(
					"unknown operator '{key}'"
				)));
			}
			field => {
				validate_field_path(field)?;
				nodes.extend(parse_field_condition(field, val)?);
			}
		}
	}

	Ok(Some(if nodes.len() == 1 {
		nodes.remove(0)
	} else {
		WhereNode::And(nodes)
	}))
}

fn logical_children(op: &str, value: &Value) -> Result<Vec<WhereNode>> {
	let Value::Array(items) = value else {
		return Err(QueryError::InvalidQuery(format!("{op} requires an array")));
	};
	if items.is_empty() {
		return Err(QueryError::InvalidQuery(format!(
			"{op} requires at least one clause"
		)));
	}
	items
		.iter()
		.map(|item| {
			parse_where(item)?.ok_or_else(|| {
				QueryError::InvalidQuery(format!("{op} clauses must be non-empty objects"))
			})
		})
		.collect()
}

fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<WhereNode>> {
	let make = |op| {
		WhereNode::Condition(Condition {
			field: field.to_string(),
			op,
		})
	};

	let Value::Object(map) = value else {
		return Ok(vec![make(WhereOp::Eq(value.clone()))]);
	};

	let operator_keys = map.keys().filter(|k| k.starts_with('$')).count();
	if operator_keys == 0 {
		// A plain object literal: equality against the whole object.
		return Ok(vec![make(WhereOp::Eq(value.clone()))]);
	}
	if operator_keys != map.len() {
		return Err(QueryError::InvalidQuery(format!(
			"field '{field}' mixes operators and literal keys"
		)));
	}

	let mut nodes = Vec::with_capacity(map.len());
	for (op, operand) in map {
		let lowered = match op.as_str() {
			"$eq" => WhereOp::Eq(operand.clone()),
			"$ne" => WhereOp::Ne(operand.clone()),
			"$gt" => WhereOp::Gt(operand.clone()),
			"$gte" => WhereOp::Gte(operand.clone()),
			"$lt" => WhereOp::Lt(operand.clone()),
			"$lte" => WhereOp::Lte(operand.clone()),
			"$in" => WhereOp::In(array_operand(op, operand)?),
			"$nin" => WhereOp::Nin(array_operand(op, operand)?),
			"$exists" => match operand {
				Value::Bool(b) => WhereOp::Exists(*b),
				_ => {
					return Err(QueryError::InvalidQuery(
						"$exists requires a boolean".to_string(),
					));
				}
			},
			"$type" => match operand {
				Value::String(name) => WhereOp::Type(TypeName::parse(name)?),
				_ => {
					return Err(QueryError::InvalidQuery(
						"$type requires a type name string".to_string(),
					));
				}
			},
			"$all" => WhereOp::All(array_operand(op, operand)?),
			"$elemMatch" => WhereOp::ElemMatch(elem_match_operand(operand)?),
			"$size" => match operand.as_i64() {
				Some(size) if size >= 0 => WhereOp::Size(size),
				_ => {
					return Err(QueryError::InvalidQuery(
						"$size requires a non-negative integer".to_string(),
					));
				}
			},
			"$regex" => match operand {
				Value::String(pattern) => WhereOp::Regex(pattern.clone()),
				_ => {
					return Err(QueryError::InvalidQuery(
						"$regex requires a pattern string".to_string(),
					));
				}
			},
			"$mod" => mod_operand(operand)?,
			other => {
				return Err(QueryError::InvalidQuery(format!(
					"unknown operator '{other}'"
				)));
			}
		};
		nodes.push(make(lowered));
	}
	Ok(nodes)
}

fn array_operand(op: &str, value: &Value) -> Result<Vec<Value>> {
	match value {
		Value::Array(items) => Ok(items.clone()),
		_ => Err(QueryError::InvalidQuery(format!("{op} requires an array"))),
	}
}

fn elem_match_operand(value: &Value) -> Result<Vec<(String, Value)>> {
	let Value::Object(map) = value else {
		return Err(QueryError::InvalidQuery(
			"$elemMatch requires an object".to_string(),
		));
	};
	if map.is_empty() {
		return Err(QueryError::InvalidQuery(
			"$elemMatch requires at least one key".to_string(),
		));
	}
	let mut pairs = Vec::with_capacity(map.len());
	for (key, val) in map {
		if key.starts_with('$') {
			return Err(QueryError::InvalidQuery(format!(
				"unknown operator '{key}' inside $elemMatch"
			)));
		}
		validate_field_path(key)?;
		pairs.push((key.clone(), val.clone()));
	}
	Ok(pairs)
}

fn mod_operand(value: &Value) -> Result<WhereOp> {
	let Value::Array(items) = value else {
		return Err(QueryError::InvalidQuery(
			"$mod requires [divisor, remainder]".to_string(),
		));
	};
	let (Some(divisor), Some(remainder)) = (
		items.first().and_then(Value::as_i64),
		items.get(1).and_then(Value::as_i64),
	) else {
		return Err(QueryError::InvalidQuery(
			"$mod requires two integers".to_string(),
		));
	};
	if items.len() != 2 || divisor == 0 {
		return Err(QueryError::InvalidQuery(
			"$mod requires a non-zero divisor and a remainder".to_string(),
		));
	}
	Ok(WhereOp::Mod { divisor, remainder })
}

/// One update operator as lowered from the `data` document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
	Set(Vec<(String, Value)>),
	Unset(Vec<String>),
	Inc(Vec<(String, f64)>),
	Push(Vec<(String, Value)>),
	Pull(Vec<(String, Value)>),
	AddToSet(Vec<(String, Value)>),
}

/// Lower an update `data` document into operators.
///
/// A document with no top-level operator is a `$set` of all its keys.
pub fn parse_update(data: &Value) -> Result<Vec<UpdateOp>> {
	let Value::Object(map) = data else {
		return Err(QueryError::InvalidQuery(
			"update data must be an object".to_string(),
		));
	};
	if map.is_empty() {
		return Err(QueryError::InvalidQuery(
			"update data must not be empty".to_string(),
		));
	}

	let operator_keys = map.keys().filter(|k| k.starts_with('$')).count();
	if operator_keys == 0 {
		let pairs = field_value_pairs(map)?;
		return Ok(vec![UpdateOp::Set(pairs)]);
	}
	if operator_keys != map.len() {
		return Err(QueryError::InvalidQuery(
			"update data mixes operators and literal keys".to_string(),
		));
	}

	let mut ops = Vec::with_capacity(map.len());
	for (op, operand) in map {
		let Value::Object(fields) = operand else {
			return Err(QueryError::InvalidQuery(format!(
				"{op} requires an object of fields"
			)));
		};
		if fields.is_empty() {
			return Err(QueryError::InvalidQuery(format!(
				"{op} requires at least one field"
			)));
		}
		let lowered = match op.as_str() {
			"$set" => UpdateOp::Set(field_value_pairs(fields)?),
			"$unset" => {
				let mut names = Vec::with_capacity(fields.len());
				for field in fields.keys() {
					validate_field_path(field)?;
					names.push(field.clone());
				}
				UpdateOp::Unset(names)
			}
			"$inc" => {
				let mut pairs = Vec::with_capacity(fields.len());
				for (field, amount) in fields {
					validate_field_path(field)?;
					let amount = amount.as_f64().ok_or_else(|| {
						QueryError::InvalidQuery(format!("$inc amount for '{field}' must be numeric"))
					})?;
					pairs.push((field.clone(), amount));
				}
				UpdateOp::Inc(pairs)
			}
			"$push" => UpdateOp::Push(field_value_pairs(fields)?),
			"$pull" => UpdateOp::Pull(field_value_pairs(fields)?),
			"$addToSet" => UpdateOp::AddToSet(field_value_pairs(fields)?),
			other => {
				return Err(QueryError::InvalidQuery(format!(
					"unknown update operator '{other}'"
				)));
			}
		};
		ops.push(lowered);
	}
	Ok(ops)
}

fn field_value_pairs(map: &serde_json::Map<String, Value>) -> Result<Vec<(String, Value)>> {
	let mut pairs = Vec::with_capacity(map.len());
	for (field, value) in map {
		validate_field_path(field)?;
		pairs.push((field.clone(), value.clone()));
	}
	Ok(pairs)
}

/// Action-level requirements that do not depend on the query block.
pub fn validate_request(request: &QueryRequest) -> Result<()> {
	validate_collection_name(&request.collection)?;
	match request.action {
		Action::Create | Action::Update => {
			if request.data.is_none() {
				return Err(QueryError::InvalidQuery(format!(
					"{:?} requires data",
					request.action
				)));
			}
		}
		Action::Custom => {
			if request.custom.as_deref().unwrap_or("").is_empty() {
				return Err(QueryError::InvalidQuery(
					"custom requires the query name".to_string(),
				));
			}
		}
		_ => {}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn parse(where_value: serde_json::Value) -> Result<Option<WhereNode>> {
		parse_where(&where_value)
	}

	#[test]
	fn test_field_path_regex() {
		for good in ["price", "user_id", "a.b.c", "tags-2", "A1.b_2.c-3"] {
			assert!(validate_field_path(good).is_ok(), "{good} should pass");
		}
		for bad in ["", "a..b", ".a", "a.", "a;b", "a b", "a'b", "a\"b", "$set", "a*"] {
			assert!(validate_field_path(bad).is_err(), "{bad} should fail");
		}
	}

	#[test]
	fn test_collection_name_rejects_dots() {
		assert!(validate_collection_name("products").is_ok());
		assert!(validate_collection_name("a.b").is_err());
		assert!(validate_collection_name("").is_err());
	}

	#[test]
	fn test_implicit_eq() {
		let node = parse(json!({"active": true})).unwrap().unwrap();
		assert_eq!(
			node,
			WhereNode::Condition(Condition {
				field: "active".to_string(),
				op: WhereOp::Eq(json!(true)),
			})
		);
	}

	#[test]
	fn test_range_on_one_field_becomes_and() {
		let node = parse(json!({"price": {"$gte": 50, "$lte": 200}, "active": true}))
			.unwrap()
			.unwrap();
		let WhereNode::And(children) = node else {
			panic!("expected And");
		};
		assert_eq!(children.len(), 3);
	}

	#[test]
	fn test_logical_operators() {
		let node = parse(json!({
			"$or": [{"a": 1}, {"$and": [{"b": 2}, {"c": {"$ne": 3}}]}]
		}))
		.unwrap()
		.unwrap();
		let WhereNode::Or(children) = node else {
			panic!("expected Or");
		};
		assert_eq!(children.len(), 2);
		assert!(matches!(children[1], WhereNode::And(_)));
	}

	#[test]
	fn test_not() {
		let node = parse(json!({"$not": {"status": "archived"}})).unwrap().unwrap();
		assert!(matches!(node, WhereNode::Not(_)));
	}

	#[test]
	fn test_unknown_where_operator_is_rejected() {
		assert!(parse(json!({"price": {"$near": 1}})).is_err());
		assert!(parse(json!({"$nor": [{"a": 1}]})).is_err());
	}

	#[test]
	fn test_unsafe_field_is_rejected() {
		assert!(parse(json!({"price; DROP TABLE documents": 1})).is_err());
		assert!(parse(json!({"a'||'b": 1})).is_err());
	}

	#[test]
	fn test_type_names() {
		assert!(parse(json!({"a": {"$type": "string"}})).is_ok());
		assert!(parse(json!({"a": {"$type": "number"}})).is_ok());
		assert!(parse(json!({"a": {"$type": "timestamp"}})).is_err());
	}

	#[test]
	fn test_elem_match_rejects_nested_operators() {
		assert!(parse(json!({"items": {"$elemMatch": {"qty": 2}}})).is_ok());
		assert!(parse(json!({"items": {"$elemMatch": {"$gt": 2}}})).is_err());
	}

	#[test]
	fn test_mod_validation() {
		assert!(parse(json!({"a": {"$mod": [3, 1]}})).is_ok());
		assert!(parse(json!({"a": {"$mod": [0, 1]}})).is_err());
		assert!(parse(json!({"a": {"$mod": [3]}})).is_err());
	}

	#[test]
	fn test_limit_bounds() {
		let spec = QuerySpec {
			limit: Some(0),
			..Default::default()
		};
		assert!(parse_query(Some(&spec)).is_err());

		let spec = QuerySpec {
			limit: Some(1001),
			..Default::default()
		};
		assert!(parse_query(Some(&spec)).is_err());

		let parsed = parse_query(None).unwrap();
		assert_eq!(parsed.limit, MAX_LIMIT);
		assert_eq!(parsed.offset, 0);
	}

	#[test]
	fn test_negative_offset_is_rejected() {
		let spec = QuerySpec {
			offset: Some(-1),
			..Default::default()
		};
		assert!(parse_query(Some(&spec)).is_err());
	}

	#[test]
	fn test_update_plain_document_is_set() {
		let ops = parse_update(&json!({"name": "B", "qty": 2})).unwrap();
		assert_eq!(ops.len(), 1);
		let UpdateOp::Set(pairs) = &ops[0] else {
			panic!("expected Set");
		};
		assert_eq!(pairs.len(), 2);
	}

	#[test]
	fn test_update_operators() {
		let ops = parse_update(&json!({
			"$set": {"name": "B"},
			"$inc": {"qty": 2},
			"$unset": {"legacy": ""}
		}))
		.unwrap();
		assert_eq!(ops.len(), 3);
	}

	#[test]
	fn test_update_rejects_unknown_operator() {
		assert!(parse_update(&json!({"$rename": {"a": "b"}})).is_err());
	}

	#[test]
	fn test_update_rejects_mixed_document() {
		assert!(parse_update(&json!({"$set": {"a": 1}, "b": 2})).is_err());
	}

	#[test]
	fn test_update_rejects_empty() {
		assert!(parse_update(&json!({})).is_err());
		assert!(parse_update(&json!("not an object")).is_err());
	}
}

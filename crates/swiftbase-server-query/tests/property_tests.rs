// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property tests for the parser and SQL builder.
//!
//! The builder invariants under test: every value travels as a positional
//! parameter (placeholder count equals bind count, values never appear in
//! the statement text), and only safe field paths survive parsing.

use proptest::prelude::*;
use serde_json::{json, Value};
use swiftbase_server_query::{
	parse_query, parse_where, validate_field_path, QueryRequest, QuerySpec,
};

fn safe_segment() -> impl Strategy<Value = String> {
	"[A-Za-z0-9_-]{1,8}"
}

fn safe_field() -> impl Strategy<Value = String> {
	prop::collection::vec(safe_segment(), 1..4).prop_map(|segments| segments.join("."))
}

fn scalar_value() -> impl Strategy<Value = Value> {
	prop_oneof![
		Just(Value::Null),
		any::<bool>().prop_map(Value::from),
		any::<i64>().prop_map(Value::from),
		(-1.0e9f64..1.0e9).prop_map(Value::from),
		"[ -~]{0,20}".prop_map(Value::from),
	]
}

fn comparison_operator() -> impl Strategy<Value = &'static str> {
	prop_oneof![
		Just("$eq"),
		Just("$ne"),
		Just("$gt"),
		Just("$gte"),
		Just("$lt"),
		Just("$lte"),
	]
}

fn where_clause() -> impl Strategy<Value = Value> {
	prop::collection::vec(
		(safe_field(), comparison_operator(), scalar_value()),
		1..5,
	)
	.prop_map(|conditions| {
		let mut map = serde_json::Map::new();
		for (field, op, value) in conditions {
			let mut operator = serde_json::Map::new();
			operator.insert(op.to_string(), value);
			map.insert(field, Value::Object(operator));
		}
		Value::Object(map)
	})
}

proptest! {
	#[test]
	fn parsed_where_lowers_to_fully_parameterized_sql(where_value in where_clause()) {
		let spec = QuerySpec {
			r#where: Some(where_value.clone()),
			..Default::default()
		};
		let parsed = parse_query(Some(&spec)).unwrap();
		let statement = swiftbase_server_query::sql::build_select("c1", &parsed).unwrap();

		// Placeholders and binds must agree exactly.
		prop_assert_eq!(statement.sql.matches('?').count(), statement.binds.len());

		// No request-sourced string value may leak into the statement text.
		// The builder emits no semicolons and only fixed quoted literals, so
		// any value carrying quote/semicolon bytes would be visible at once.
		if let Value::Object(map) = &where_value {
			for operand in map.values() {
				if let Value::Object(ops) = operand {
					for value in ops.values() {
						if let Value::String(s) = value {
							if s.contains('\'') || s.contains(';') {
								prop_assert!(!statement.sql.contains(s.as_str()));
							}
						}
					}
				}
			}
		}
	}

	#[test]
	fn hostile_field_names_never_parse(field in "[ -~]{1,20}") {
		// Anything outside the safe charset must be rejected outright.
		let is_safe = !field.is_empty()
			&& field
				.split('.')
				.all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
			&& !field.starts_with('.')
			&& !field.ends_with('.');
		let accepted = validate_field_path(&field).is_ok();
		prop_assert_eq!(accepted, is_safe);

		if !is_safe && !field.starts_with('$') {
			let mut clause = serde_json::Map::new();
			clause.insert(field.clone(), json!(1));
			prop_assert!(parse_where(&Value::Object(clause)).is_err());
		}
	}

	#[test]
	fn request_envelope_round_trips(
		collection in "[A-Za-z0-9_-]{1,12}",
		limit in 1i64..=1000,
		offset in 0i64..10_000,
		where_value in where_clause(),
	) {
		let request = QueryRequest {
			action: swiftbase_server_query::Action::Find,
			collection,
			query: Some(QuerySpec {
				r#where: Some(where_value),
				limit: Some(limit),
				offset: Some(offset),
				..Default::default()
			}),
			data: None,
			options: None,
			custom: None,
			params: None,
		};
		let serialized = serde_json::to_string(&request).unwrap();
		let reparsed: QueryRequest = serde_json::from_str(&serialized).unwrap();
		prop_assert_eq!(reparsed, request);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for the query endpoint, collections and the envelope
//! contract (versioning and validation middleware included).

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{admin_token, create_collection, get, post, register_user, send_json, setup};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_find_range_over_seeded_data() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "products").await;
	let (access, _, _) = register_user(&app, "finder@example.com").await;

	for price in [49.99, 99.99, 149.99, 199.99] {
		let (status, _) = post(
			&app,
			"/api/query",
			Some(&access),
			json!({
				"action": "create",
				"collection": "products",
				"data": {"price": price, "active": true}
			}),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
	}

	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "find",
			"collection": "products",
			"query": {
				"where": {"price": {"$gte": 50, "$lte": 200}, "active": true},
				"orderBy": {"price": "asc"}
			}
		}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["success"], true);
	let documents = body["data"].as_array().unwrap();
	let prices: Vec<f64> = documents
		.iter()
		.map(|d| d["data"]["price"].as_f64().unwrap())
		.collect();
	assert_eq!(prices, vec![99.99, 149.99, 199.99]);
}

#[tokio::test]
async fn test_update_bumps_version() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "c").await;
	let (access, _, _) = register_user(&app, "updater@example.com").await;

	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({"action": "create", "collection": "c", "data": {"name": "A"}}),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	let id = body["data"]["id"].as_str().unwrap().to_string();
	assert_eq!(body["data"]["version"], 1);

	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "update",
			"collection": "c",
			"query": {"where": {"_id": id}},
			"data": {"$set": {"name": "B"}}
		}),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["updated"], 1);

	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "findOne",
			"collection": "c",
			"query": {"where": {"_id": id}}
		}),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["version"], 2);
	assert_eq!(body["data"]["data"]["name"], "B");
	let created_at = body["data"]["created_at"].as_str().unwrap();
	let updated_at = body["data"]["updated_at"].as_str().unwrap();
	assert!(updated_at > created_at);
}

#[tokio::test]
async fn test_count_and_delete() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "items").await;
	let (access, _, _) = register_user(&app, "counter@example.com").await;

	for i in 0..3 {
		post(
			&app,
			"/api/query",
			Some(&access),
			json!({"action": "create", "collection": "items", "data": {"n": i}}),
		)
		.await;
	}

	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({"action": "count", "collection": "items"}),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["count"], 3);

	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "delete",
			"collection": "items",
			"query": {"where": {"n": {"$lt": 2}}}
		}),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["deleted"], 2);
}

#[tokio::test]
async fn test_invalid_queries_are_bad_requests() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "c").await;
	let (access, _, _) = register_user(&app, "bad@example.com").await;

	// Unknown operator.
	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "find",
			"collection": "c",
			"query": {"where": {"a": {"$near": 1}}}
		}),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"]["code"], "BAD_REQUEST");

	// Unsafe field name.
	let (status, _) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "find",
			"collection": "c",
			"query": {"where": {"a; DROP TABLE documents": 1}}
		}),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	// Limit out of bounds.
	let (status, _) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({
			"action": "find",
			"collection": "c",
			"query": {"limit": 1001}
		}),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	// Aggregate is reserved.
	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({"action": "aggregate", "collection": "c"}),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"]["message"]
		.as_str()
		.unwrap()
		.contains("not implemented"));
}

#[tokio::test]
async fn test_query_requires_auth() {
	let (app, _state, _dir) = setup().await;
	let (status, _) = post(
		&app,
		"/api/query",
		None,
		json!({"action": "find", "collection": "c"}),
	)
	.await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_collection_is_not_found() {
	let (app, _state, _dir) = setup().await;
	let (access, _, _) = register_user(&app, "ghost@example.com").await;
	let (status, body) = post(
		&app,
		"/api/query",
		Some(&access),
		json!({"action": "find", "collection": "ghost"}),
	)
	.await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cascade_refusal_then_cascade() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "doomed").await;
	let (access, _, _) = register_user(&app, "cascade@example.com").await;

	for i in 0..2 {
		post(
			&app,
			"/api/query",
			Some(&access),
			json!({"action": "create", "collection": "doomed", "data": {"n": i}}),
		)
		.await;
	}

	let (status, body) =
		send_json(&app, "DELETE", "/api/admin/collections/doomed", Some(&admin), None).await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert!(body["error"]["message"].as_str().unwrap().contains('2'));

	let (status, _) = send_json(
		&app,
		"DELETE",
		"/api/admin/collections/doomed?cascade=true",
		Some(&admin),
		None,
	)
	.await;
	assert_eq!(status, StatusCode::OK);

	let (status, _) = get(&app, "/api/admin/collections/doomed", Some(&access)).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_collection_listing_and_stats() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "stats-target").await;
	let (access, _, _) = register_user(&app, "stats@example.com").await;

	post(
		&app,
		"/api/query",
		Some(&access),
		json!({"action": "create", "collection": "stats-target", "data": {"x": 1}}),
	)
	.await;

	let (status, body) = get(&app, "/api/admin/collections", Some(&access)).await;
	assert_eq!(status, StatusCode::OK);
	let listed = body["data"].as_array().unwrap();
	let entry = listed
		.iter()
		.find(|c| c["name"] == "stats-target")
		.unwrap();
	assert_eq!(entry["document_count"], 1);

	let (status, body) = get(
		&app,
		"/api/admin/collections/stats-target/stats",
		Some(&access),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["document_count"], 1);
	assert!(body["data"]["total_size_estimate"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_bulk_partial_failure() {
	let (app, _state, _dir) = setup().await;
	let admin = admin_token(&app).await;
	create_collection(&app, &admin, "bulked").await;
	let (access, _, _) = register_user(&app, "bulk@example.com").await;

	let (status, body) = post(
		&app,
		"/api/bulk",
		Some(&access),
		json!([
			{"type": "create", "collection": "bulked", "data": {"n": 1}},
			{"type": "create", "collection": "missing", "data": {"n": 2}},
			{"type": "delete", "collection": "bulked", "where": {"n": 999}}
		]),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["success"], false);
	let results = body["data"]["results"].as_array().unwrap();
	assert_eq!(results.len(), 3);
	assert_eq!(results[0]["success"], true);
	assert_eq!(results[1]["success"], false);
	assert_eq!(results[2]["success"], true);
}

#[tokio::test]
async fn test_version_headers_and_unsupported_version() {
	let (app, _state, _dir) = setup().await;

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.uri("/health")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("API-Version").unwrap(), "1.0");
	assert_eq!(
		response.headers().get("API-Supported-Versions").unwrap(),
		"1.0"
	);

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.uri("/health")
				.header("API-Version", "2.0")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_middleware_contracts() {
	let (app, _state, _dir) = setup().await;

	// Non-JSON content type on POST.
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/auth/login")
				.header("Content-Type", "text/plain")
				.body(Body::from("email=x"))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

	// Unsupported method.
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("TRACE")
				.uri("/health")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

	// Declared body over the JSON cap.
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/auth/login")
				.header("Content-Type", "application/json")
				.header("Content-Length", (11 * 1024 * 1024).to_string())
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_envelope_shape_on_success_and_error() {
	let (app, _state, _dir) = setup().await;

	let (status, body) = get(&app, "/health", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["success"], true);
	assert_eq!(body["metadata"]["version"], "1.0");
	assert!(body["metadata"]["timestamp"].is_string());

	let (status, body) = get(&app, "/api/auth/me", None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["success"], false);
	assert_eq!(body["error"]["code"], "UNAUTHORIZED");
	assert!(body["error"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_responses_never_leak_password_hashes() {
	let (app, _state, _dir) = setup().await;
	let (access, _, _) = register_user(&app, "leak@example.com").await;

	for path in ["/api/auth/me"] {
		let (_, body) = get(&app, path, Some(&access)).await;
		let raw = body.to_string();
		assert!(!raw.contains("password"), "password field leaked on {path}: {raw}");
		assert!(!raw.contains("argon2"), "hash leaked on {path}");
	}
}

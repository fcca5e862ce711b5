// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for the file storage surface.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{admin_token, get, register_user, send_json, setup};
use tower::ServiceExt;

async fn upload(
	app: &axum::Router,
	token: &str,
	filename: &str,
	content_type: Option<&str>,
	bytes: Vec<u8>,
) -> (StatusCode, serde_json::Value) {
	let mut builder = Request::builder()
		.method("POST")
		.uri("/api/storage/upload")
		.header("Authorization", format!("Bearer {token}"))
		.header("X-Filename", filename);
	if let Some(content_type) = content_type {
		builder = builder.header("Content-Type", content_type);
	}
	let response = app
		.clone()
		.oneshot(builder.body(Body::from(bytes)).unwrap())
		.await
		.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
	(status, value)
}

#[tokio::test]
async fn test_upload_info_download_delete() {
	let (app, _state, _dir) = setup().await;
	let (access, _, user_id) = register_user(&app, "files@example.com").await;

	let (status, body) = upload(&app, &access, "notes.txt", None, b"hello world".to_vec()).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["original_name"], "notes.txt");
	assert_eq!(body["data"]["content_type"], "text/plain");
	assert_eq!(body["data"]["size_bytes"], 11);
	assert_eq!(body["data"]["uploaded_by"], user_id.as_str());
	let id = body["data"]["id"].as_str().unwrap().to_string();

	let (status, body) = get(&app, &format!("/api/storage/files/{id}/info"), Some(&access)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["id"], id.as_str());
	// The on-disk locator never reaches clients.
	assert!(body["data"].get("path").is_none());

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.uri(format!("/api/storage/files/{id}"))
				.header("Authorization", format!("Bearer {access}"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get("Content-Type").unwrap(),
		"text/plain"
	);
	let payload = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	assert_eq!(&payload[..], b"hello world");

	let (status, _) = send_json(
		&app,
		"DELETE",
		&format!("/api/storage/files/{id}"),
		Some(&access),
		None,
	)
	.await;
	assert_eq!(status, StatusCode::OK);

	let (status, _) = get(&app, &format!("/api/storage/files/{id}/info"), Some(&access)).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_range_request_returns_partial_content() {
	let (app, _state, _dir) = setup().await;
	let (access, _, _) = register_user(&app, "ranges@example.com").await;

	let (_, body) = upload(&app, &access, "digits.bin", None, b"0123456789".to_vec()).await;
	let id = body["data"]["id"].as_str().unwrap().to_string();

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.uri(format!("/api/storage/files/{id}"))
				.header("Authorization", format!("Bearer {access}"))
				.header("Range", "bytes=2-5")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
	assert_eq!(
		response.headers().get("Content-Range").unwrap(),
		"bytes 2-5/10"
	);
	let payload = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	assert_eq!(&payload[..], b"2345");
}

#[tokio::test]
async fn test_upload_over_limit_is_content_too_large() {
	let (app, _state, _dir) = setup().await;
	let (access, _, _) = register_user(&app, "big@example.com").await;

	let oversized = vec![0u8; 100 * 1024 * 1024 + 1];
	let (status, body) = upload(&app, &access, "huge.bin", None, oversized).await;
	assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	assert_eq!(body["error"]["code"], "CONTENT_TOO_LARGE");
}

#[tokio::test]
async fn test_access_control_on_files() {
	let (app, _state, _dir) = setup().await;
	let (owner, _, _) = register_user(&app, "owner@example.com").await;
	let (other, _, _) = register_user(&app, "other@example.com").await;
	let admin = admin_token(&app).await;

	let (_, body) = upload(&app, &owner, "secret.txt", None, b"mine".to_vec()).await;
	let id = body["data"]["id"].as_str().unwrap().to_string();

	let (status, body) = get(&app, &format!("/api/storage/files/{id}/info"), Some(&other)).await;
	assert_eq!(status, StatusCode::FORBIDDEN);
	assert_eq!(body["error"]["code"], "FORBIDDEN");

	let (status, _) = get(&app, &format!("/api/storage/files/{id}/info"), Some(&admin)).await;
	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_search_and_stats() {
	let (app, _state, _dir) = setup().await;
	let (access, _, _) = register_user(&app, "lister@example.com").await;
	let (other, _, _) = register_user(&app, "noise@example.com").await;

	upload(&app, &access, "report.pdf", Some("application/pdf"), b"%PDF-".to_vec()).await;
	upload(&app, &access, "photo.png", None, b"\x89PNG\r\n\x1a\n...".to_vec()).await;
	upload(&app, &other, "other.txt", None, b"not mine".to_vec()).await;

	let (status, body) = get(&app, "/api/storage/files", Some(&access)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"].as_array().unwrap().len(), 2);

	let (status, body) = get(
		&app,
		"/api/storage/files?contentType=application/pdf",
		Some(&access),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"].as_array().unwrap().len(), 1);

	let (status, body) = get(&app, "/api/storage/search?q=photo", Some(&access)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"].as_array().unwrap().len(), 1);
	assert_eq!(body["data"][0]["original_name"], "photo.png");

	let (status, body) = get(&app, "/api/storage/stats", Some(&access)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["file_count"], 2);
}

#[tokio::test]
async fn test_admin_cleanup_endpoint() {
	let (app, state, dir) = setup().await;
	let admin = admin_token(&app).await;
	let (access, _, _) = register_user(&app, "sweep@example.com").await;

	// Orphan payload with no metadata row.
	let storage_dir = dir.path().join("storage");
	tokio::fs::create_dir_all(&storage_dir).await.unwrap();
	tokio::fs::write(storage_dir.join("orphan.bin"), b"x").await.unwrap();

	// Metadata row whose payload disappears.
	let (_, body) = upload(&app, &access, "gone.txt", None, b"bye".to_vec()).await;
	let id = body["data"]["id"].as_str().unwrap().to_string();
	let stored = state
		.files
		.get_metadata(
			&id,
			&swiftbase_server_storage::FilePrincipal {
				id: "ignored".to_string(),
				is_admin: true,
			},
		)
		.await
		.unwrap();
	tokio::fs::remove_file(&stored.path).await.unwrap();

	let (status, body) = send_json(&app, "POST", "/api/admin/storage/cleanup", Some(&admin), None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["data"]["orphanPayloadsRemoved"], 1);
	assert_eq!(body["data"]["danglingRowsRemoved"], 1);
}

#[tokio::test]
async fn test_cleanup_requires_admin() {
	let (app, _state, _dir) = setup().await;
	let (access, _, _) = register_user(&app, "nonadmin@example.com").await;
	let (status, _) = send_json(&app, "POST", "/api/admin/storage/cleanup", Some(&access), None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server info endpoint.

use axum::response::Response;
use serde_json::json;

use crate::api_response::{success, API_VERSION};

/// GET /api - name, version, supported API versions.
pub async fn server_info() -> Response {
	success(json!({
		"name": "swiftbase",
		"version": env!("CARGO_PKG_VERSION"),
		"apiVersion": API_VERSION,
		"supportedVersions": [API_VERSION],
	}))
}

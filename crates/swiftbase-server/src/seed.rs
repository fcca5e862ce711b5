// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Development seeding for the `seed` subcommand.

use serde_json::json;
use swiftbase_server_query::{Action, QueryRequest};

use crate::api::AppState;
use crate::error::{Result, ServerError};

/// Insert a demo collection with a handful of documents. Idempotent: a
/// pre-existing collection is left untouched.
pub async fn seed_demo_data(state: &AppState) -> Result<()> {
	if state.collections.get_by_name("products").await?.is_some() {
		tracing::info!("seed skipped, collection 'products' already exists");
		return Ok(());
	}

	state
		.collections
		.create(
			"products",
			Some(json!({"type": "object", "properties": {"name": {"type": "string"}}})),
			None,
			Some(json!({"seeded": true})),
		)
		.await?;

	let documents = [
		json!({"name": "Compass", "price": 49.99, "active": true, "tags": ["outdoor"]}),
		json!({"name": "Lantern", "price": 99.99, "active": true, "tags": ["outdoor", "light"]}),
		json!({"name": "Tent", "price": 149.99, "active": true, "tags": ["outdoor", "shelter"]}),
		json!({"name": "Stove", "price": 199.99, "active": true, "tags": ["kitchen"]}),
	];
	for data in documents {
		let request = QueryRequest {
			action: Action::Create,
			collection: "products".to_string(),
			query: None,
			data: Some(data),
			options: None,
			custom: None,
			params: None,
		};
		state
			.query
			.execute(&request, None)
			.await
			.map_err(ServerError::from)?;
	}

	tracing::info!("seeded collection 'products' with 4 documents");
	Ok(())
}

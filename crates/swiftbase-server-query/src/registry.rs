// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Named server-side queries.
//!
//! Callables are registered at startup and dispatched by name through the
//! `custom` action. Registration is rare and takes the write half of the
//! lock; execution only reads. Each registration also upserts a metadata row
//! so the admin listing survives restarts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use swiftbase_server_db::{CustomQueryRepository, StorageKernel};

use crate::error::{QueryError, Result};

/// A named server-side query. Execution inherits the caller's
/// authentication but is otherwise unrestricted.
#[async_trait]
pub trait CustomQuery: Send + Sync {
	fn name(&self) -> &str;

	fn description(&self) -> Option<String> {
		None
	}

	/// Parameter descriptor surfaced in the admin listing.
	fn params(&self) -> Option<serde_json::Value> {
		None
	}

	async fn run(
		&self,
		params: &serde_json::Map<String, serde_json::Value>,
		kernel: &StorageKernel,
	) -> Result<serde_json::Value>;
}

pub struct CustomQueryRegistry {
	entries: RwLock<HashMap<String, Arc<dyn CustomQuery>>>,
	repository: Arc<CustomQueryRepository>,
}

impl CustomQueryRegistry {
	pub fn new(repository: Arc<CustomQueryRepository>) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			repository,
		}
	}

	/// Register a query and persist its metadata row.
	#[tracing::instrument(skip(self, query), fields(name = query.name()))]
	pub async fn register(&self, query: Arc<dyn CustomQuery>) -> Result<()> {
		self.repository
			.upsert(query.name(), query.description(), query.params())
			.await?;
		let mut entries = self.entries.write().expect("registry lock poisoned");
		entries.insert(query.name().to_string(), query);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Result<Arc<dyn CustomQuery>> {
		let entries = self.entries.read().expect("registry lock poisoned");
		entries
			.get(name)
			.cloned()
			.ok_or_else(|| QueryError::CustomQueryNotFound(name.to_string()))
	}

	pub fn names(&self) -> Vec<String> {
		let entries = self.entries.read().expect("registry lock poisoned");
		let mut names: Vec<String> = entries.keys().cloned().collect();
		names.sort();
		names
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use swiftbase_server_db::testing::create_test_kernel;

	struct Echo;

	#[async_trait]
	impl CustomQuery for Echo {
		fn name(&self) -> &str {
			"echo"
		}

		fn description(&self) -> Option<String> {
			Some("Echoes its params".to_string())
		}

		async fn run(
			&self,
			params: &serde_json::Map<String, serde_json::Value>,
			_kernel: &StorageKernel,
		) -> Result<serde_json::Value> {
			Ok(serde_json::Value::Object(params.clone()))
		}
	}

	#[tokio::test]
	async fn test_register_and_dispatch() {
		let kernel = Arc::new(create_test_kernel().await);
		let registry =
			CustomQueryRegistry::new(Arc::new(CustomQueryRepository::new(Arc::clone(&kernel))));
		registry.register(Arc::new(Echo)).await.unwrap();

		let query = registry.get("echo").unwrap();
		let mut params = serde_json::Map::new();
		params.insert("x".to_string(), serde_json::json!(1));
		let result = query.run(&params, &kernel).await.unwrap();
		assert_eq!(result, serde_json::json!({"x": 1}));

		assert_eq!(registry.names(), vec!["echo".to_string()]);
	}

	#[tokio::test]
	async fn test_unknown_name_is_error() {
		let kernel = Arc::new(create_test_kernel().await);
		let registry =
			CustomQueryRegistry::new(Arc::new(CustomQueryRepository::new(kernel)));
		assert!(matches!(
			registry.get("ghost"),
			Err(QueryError::CustomQueryNotFound(_))
		));
	}
}

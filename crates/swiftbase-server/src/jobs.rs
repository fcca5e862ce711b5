// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background jobs wired into the scheduler at startup.

use std::sync::Arc;

use async_trait::async_trait;
use swiftbase_server_jobs::{Job, JobError};
use swiftbase_server_storage::FileService;

/// Periodic reconciliation of file payloads and metadata rows.
pub struct StorageSweepJob {
	files: Arc<FileService>,
}

impl StorageSweepJob {
	pub fn new(files: Arc<FileService>) -> Self {
		Self { files }
	}
}

#[async_trait]
impl Job for StorageSweepJob {
	fn id(&self) -> &str {
		"storage-sweep"
	}

	fn name(&self) -> &str {
		"Storage sweep"
	}

	async fn run(&self) -> Result<(), JobError> {
		self.files
			.sweep()
			.await
			.map(|_| ())
			.map_err(|e| JobError::Failed(e.to_string()))
	}
}

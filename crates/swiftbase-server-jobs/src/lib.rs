// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic background jobs.
//!
//! Jobs implement [`Job`] and are registered with an interval before
//! [`JobScheduler::start`]. Each job runs on its own tokio task; a failure is
//! logged and the next tick still fires. Shutdown is broadcast and joined.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// One background job.
#[async_trait]
pub trait Job: Send + Sync {
	/// Stable identifier, used in logs.
	fn id(&self) -> &str;

	fn name(&self) -> &str;

	async fn run(&self) -> Result<(), JobError>;
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("job failed: {0}")]
	Failed(String),
}

struct RegisteredJob {
	job: Arc<dyn Job>,
	interval: Duration,
}

pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs: HashMap::new(),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		let id = job.id().to_string();
		self.jobs.insert(id, RegisteredJob { job, interval });
	}

	/// Spawn every registered job's interval loop.
	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;
		for (job_id, registered) in &self.jobs {
			let job = Arc::clone(&registered.job);
			let interval = registered.interval;
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if let Err(e) = job.run().await {
								warn!(job_id = %job_id, error = %e, "background job failed");
							}
						}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "shutting down periodic job");
							break;
						}
					}
				}
			});
			handles.push(handle);
		}
		info!(jobs = self.jobs.len(), "job scheduler started");
	}

	/// Signal shutdown and wait for every job loop to exit.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());
		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}
		info!("job scheduler stopped");
	}
}

impl Default for JobScheduler {
	fn default() -> Self {
		Self::new()
	}
}

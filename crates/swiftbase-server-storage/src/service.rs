// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File payload and metadata service.
//!
//! Byte payloads live in the storage directory under collision-free stored
//! names; the metadata row is the only path to them. Access is restricted to
//! the uploader or an admin. Deleting removes payload and row in the same
//! logical operation, and the periodic sweep reconciles the two directions
//! of drift (payload without row, row without payload).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use swiftbase_server_db::{
	FileListFilter, FileMetadata, FileRepository, FileStats, NewFileMetadata,
};
use uuid::Uuid;

use crate::content_type::derive_content_type;
use crate::error::{Result, StorageError};

/// The principal performing a file operation.
#[derive(Debug, Clone)]
pub struct FilePrincipal {
	pub id: String,
	pub is_admin: bool,
}

/// A resolved byte range (inclusive start, exclusive end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
	pub start: u64,
	pub end: u64,
	pub total: u64,
}

/// Payload bytes plus their descriptor.
#[derive(Debug)]
pub struct FileContent {
	pub metadata: FileMetadata,
	pub bytes: Vec<u8>,
	/// Present when a range was requested and satisfied.
	pub range: Option<ResolvedRange>,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
	pub orphan_payloads_removed: usize,
	pub dangling_rows_removed: usize,
}

/// Listing options accepted by list/search.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
	pub content_type: Option<String>,
	pub search: Option<String>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

pub struct FileService {
	files: Arc<FileRepository>,
	files_dir: PathBuf,
	max_upload_bytes: u64,
	sweep_batch_size: usize,
}

impl FileService {
	pub fn new(
		files: Arc<FileRepository>,
		files_dir: impl Into<PathBuf>,
		max_upload_bytes: u64,
		sweep_batch_size: usize,
	) -> Self {
		Self {
			files,
			files_dir: files_dir.into(),
			max_upload_bytes,
			sweep_batch_size,
		}
	}

	/// Persist an uploaded payload and its metadata row.
	#[tracing::instrument(skip(self, bytes, metadata), fields(size = bytes.len()))]
	pub async fn upload(
		&self,
		bytes: Vec<u8>,
		original_name: &str,
		content_type: Option<&str>,
		metadata: Option<serde_json::Value>,
		principal: &FilePrincipal,
	) -> Result<FileMetadata> {
		let size = bytes.len() as u64;
		if size > self.max_upload_bytes {
			return Err(StorageError::PayloadTooLarge {
				size,
				limit: self.max_upload_bytes,
			});
		}

		let content_type = derive_content_type(content_type, original_name, &bytes);
		let id = Uuid::new_v4().to_string();
		let stored_name = stored_name_for(&id, original_name);
		let path = self.files_dir.join(&stored_name);

		tokio::fs::create_dir_all(&self.files_dir).await?;
		tokio::fs::write(&path, &bytes).await?;

		let inserted = self
			.files
			.insert(NewFileMetadata {
				id,
				stored_name,
				original_name: original_name.to_string(),
				content_type,
				size_bytes: size as i64,
				path: path.to_string_lossy().into_owned(),
				metadata,
				uploaded_by: Some(principal.id.clone()),
			})
			.await;

		match inserted {
			Ok(file) => {
				tracing::info!(file_id = %file.id, size, "file stored");
				Ok(file)
			}
			Err(e) => {
				// The payload must not outlive a failed metadata insert.
				if let Err(cleanup) = tokio::fs::remove_file(&path).await {
					tracing::warn!(error = %cleanup, "failed to remove payload after insert error");
				}
				Err(e.into())
			}
		}
	}

	/// Fetch a descriptor, enforcing uploader-or-admin access.
	#[tracing::instrument(skip(self, principal))]
	pub async fn get_metadata(&self, id: &str, principal: &FilePrincipal) -> Result<FileMetadata> {
		let file = self.files.get(id).await?.ok_or(StorageError::NotFound)?;
		check_access(&file, principal)?;
		Ok(file)
	}

	/// Fetch payload bytes, optionally a single byte range.
	#[tracing::instrument(skip(self, principal))]
	pub async fn read_bytes(
		&self,
		id: &str,
		principal: &FilePrincipal,
		range: Option<(u64, Option<u64>)>,
	) -> Result<FileContent> {
		let metadata = self.get_metadata(id, principal).await?;
		let bytes = match tokio::fs::read(&metadata.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::warn!(file_id = %id, "payload missing for metadata row");
				return Err(StorageError::NotFound);
			}
			Err(e) => return Err(e.into()),
		};

		let total = bytes.len() as u64;
		match range {
			None => Ok(FileContent {
				metadata,
				bytes,
				range: None,
			}),
			Some((start, end)) => {
				if start >= total {
					return Err(StorageError::InvalidRange);
				}
				// Inclusive range header semantics; end is clamped to EOF.
				let end_exclusive = end.map_or(total, |e| (e + 1).min(total));
				if end_exclusive <= start {
					return Err(StorageError::InvalidRange);
				}
				let slice = bytes[start as usize..end_exclusive as usize].to_vec();
				Ok(FileContent {
					metadata,
					bytes: slice,
					range: Some(ResolvedRange {
						start,
						end: end_exclusive,
						total,
					}),
				})
			}
		}
	}

	/// List the principal's files; admins see everything.
	#[tracing::instrument(skip(self, principal))]
	pub async fn list(
		&self,
		principal: &FilePrincipal,
		options: ListOptions,
	) -> Result<Vec<FileMetadata>> {
		let uploaded_by = if principal.is_admin {
			None
		} else {
			Some(principal.id.clone())
		};
		Ok(self
			.files
			.list(FileListFilter {
				uploaded_by,
				content_type: options.content_type,
				search: options.search,
				limit: options.limit.unwrap_or(100),
				offset: options.offset.unwrap_or(0),
			})
			.await?)
	}

	/// Delete payload and metadata as one logical operation.
	#[tracing::instrument(skip(self, principal))]
	pub async fn delete(&self, id: &str, principal: &FilePrincipal) -> Result<()> {
		let file = self.files.get(id).await?.ok_or(StorageError::NotFound)?;
		check_access(&file, principal)?;

		self.files.delete(id).await?;
		match tokio::fs::remove_file(&file.path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => {
				// Row is gone; the sweep cannot see this payload any more,
				// so surface the failure.
				tracing::error!(file_id = %id, error = %e, "payload removal failed");
				return Err(e.into());
			}
		}
		tracing::info!(file_id = %id, "file deleted");
		Ok(())
	}

	/// Totals for one principal, or instance-wide for admins.
	#[tracing::instrument(skip(self))]
	pub async fn stats(&self, scope: Option<&FilePrincipal>) -> Result<FileStats> {
		let uploaded_by = scope.map(|p| p.id.clone());
		Ok(self.files.stats(uploaded_by).await?)
	}

	/// Reconcile payloads and rows: remove payloads with no row, then rows
	/// with no payload. Runs in batches so the writer lease is only held in
	/// short scopes.
	#[tracing::instrument(skip(self))]
	pub async fn sweep(&self) -> Result<SweepReport> {
		let mut report = SweepReport::default();

		let known: std::collections::HashSet<String> =
			self.files.all_stored_names().await?.into_iter().collect();
		if let Ok(mut entries) = tokio::fs::read_dir(&self.files_dir).await {
			while let Ok(Some(entry)) = entries.next_entry().await {
				let name = entry.file_name().to_string_lossy().into_owned();
				if !known.contains(&name) {
					if tokio::fs::remove_file(entry.path()).await.is_ok() {
						report.orphan_payloads_removed += 1;
					}
				}
			}
		}

		let mut after_id: Option<String> = None;
		loop {
			let batch = self
				.files
				.batch(after_id.clone(), self.sweep_batch_size as i64)
				.await?;
			if batch.is_empty() {
				break;
			}
			after_id = batch.last().map(|f| f.id.clone());
			for file in batch {
				if !Path::new(&file.path).exists() {
					self.files.delete(&file.id).await?;
					report.dangling_rows_removed += 1;
				}
			}
		}

		if report.orphan_payloads_removed > 0 || report.dangling_rows_removed > 0 {
			tracing::info!(
				orphans = report.orphan_payloads_removed,
				dangling = report.dangling_rows_removed,
				"storage sweep reconciled drift"
			);
		}
		Ok(report)
	}
}

fn check_access(file: &FileMetadata, principal: &FilePrincipal) -> Result<()> {
	if principal.is_admin {
		return Ok(());
	}
	match &file.uploaded_by {
		Some(uploader) if *uploader == principal.id => Ok(()),
		_ => Err(StorageError::Forbidden),
	}
}

/// Collision-free stored name: uuid plus the sanitized original extension.
fn stored_name_for(id: &str, original_name: &str) -> String {
	let extension = original_name
		.rsplit('.')
		.next()
		.filter(|ext| ext.len() < original_name.len())
		.map(|ext| {
			ext.chars()
				.filter(|c| c.is_ascii_alphanumeric())
				.take(8)
				.collect::<String>()
				.to_ascii_lowercase()
		})
		.filter(|ext| !ext.is_empty());
	match extension {
		Some(ext) => format!("{id}.{ext}"),
		None => id.to_string(),
	}
}

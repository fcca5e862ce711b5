// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File storage configuration.

use serde::Deserialize;

/// Maximum accepted upload size: 100 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Storage configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct StorageConfig {
	/// Directory holding uploaded file payloads.
	pub files_dir: String,
	/// Upper bound on a single upload, in bytes.
	pub max_upload_bytes: u64,
	/// Interval between orphan sweeps, in seconds.
	pub sweep_interval_secs: u64,
	/// Batch size for sweep deletions.
	pub sweep_batch_size: usize,
}

impl Default for StorageConfig {
	fn default() -> Self {
		StorageConfigLayer::default().finalize()
	}
}

/// Storage configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfigLayer {
	#[serde(default)]
	pub files_dir: Option<String>,
	#[serde(default)]
	pub max_upload_bytes: Option<u64>,
	#[serde(default)]
	pub sweep_interval_secs: Option<u64>,
	#[serde(default)]
	pub sweep_batch_size: Option<usize>,
}

impl StorageConfigLayer {
	pub fn merge(&mut self, other: StorageConfigLayer) {
		if other.files_dir.is_some() {
			self.files_dir = other.files_dir;
		}
		if other.max_upload_bytes.is_some() {
			self.max_upload_bytes = other.max_upload_bytes;
		}
		if other.sweep_interval_secs.is_some() {
			self.sweep_interval_secs = other.sweep_interval_secs;
		}
		if other.sweep_batch_size.is_some() {
			self.sweep_batch_size = other.sweep_batch_size;
		}
	}

	pub fn finalize(self) -> StorageConfig {
		StorageConfig {
			files_dir: self
				.files_dir
				.unwrap_or_else(|| "./data/storage".to_string()),
			max_upload_bytes: self
				.max_upload_bytes
				.unwrap_or(MAX_UPLOAD_BYTES)
				.min(MAX_UPLOAD_BYTES),
			sweep_interval_secs: self.sweep_interval_secs.unwrap_or(60 * 60),
			sweep_batch_size: self.sweep_batch_size.unwrap_or(100),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = StorageConfigLayer::default().finalize();
		assert_eq!(config.files_dir, "./data/storage");
		assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
		assert_eq!(config.sweep_interval_secs, 3600);
	}

	#[test]
	fn test_max_upload_is_capped() {
		let layer = StorageConfigLayer {
			max_upload_bytes: Some(MAX_UPLOAD_BYTES * 4),
			..Default::default()
		};
		assert_eq!(layer.finalize().max_upload_bytes, MAX_UPLOAD_BYTES);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP listener configuration.

use serde::Deserialize;

/// HTTP configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	/// Per-request timeout in seconds.
	pub request_timeout_secs: u64,
	/// Maximum JSON request body size in bytes.
	pub max_body_bytes: usize,
}

impl Default for HttpConfig {
	fn default() -> Self {
		HttpConfigLayer::default().finalize()
	}
}

/// HTTP configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub max_body_bytes: Option<usize>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: HttpConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.max_body_bytes.is_some() {
			self.max_body_bytes = other.max_body_bytes;
		}
	}

	pub fn finalize(self) -> HttpConfig {
		HttpConfig {
			host: self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
			port: self.port.unwrap_or(8090),
			request_timeout_secs: self.request_timeout_secs.unwrap_or(30),
			max_body_bytes: self.max_body_bytes.unwrap_or(10 * 1024 * 1024),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = HttpConfigLayer::default().finalize();
		assert_eq!(config.host, "127.0.0.1");
		assert_eq!(config.port, 8090);
		assert_eq!(config.request_timeout_secs, 30);
		assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
	}

	#[test]
	fn test_merge_overrides() {
		let mut base = HttpConfigLayer::default();
		base.merge(HttpConfigLayer {
			host: Some("0.0.0.0".to_string()),
			port: Some(9000),
			request_timeout_secs: None,
			max_body_bytes: None,
		});
		let config = base.finalize();
		assert_eq!(config.host, "0.0.0.0");
		assert_eq!(config.port, 9000);
		assert_eq!(config.request_timeout_secs, 30);
	}
}

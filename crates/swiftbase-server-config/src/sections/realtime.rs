// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Realtime (WebSocket) configuration.

use serde::Deserialize;

/// Realtime configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
	/// Interval between protocol-level pings, in seconds.
	pub ping_interval_secs: u64,
	/// Idle period after which a connection is reaped, in seconds.
	pub idle_timeout_secs: u64,
	/// Outbound message queue depth per connection.
	pub send_queue_size: usize,
}

impl Default for RealtimeConfig {
	fn default() -> Self {
		RealtimeConfigLayer::default().finalize()
	}
}

/// Realtime configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealtimeConfigLayer {
	#[serde(default)]
	pub ping_interval_secs: Option<u64>,
	#[serde(default)]
	pub idle_timeout_secs: Option<u64>,
	#[serde(default)]
	pub send_queue_size: Option<usize>,
}

impl RealtimeConfigLayer {
	pub fn merge(&mut self, other: RealtimeConfigLayer) {
		if other.ping_interval_secs.is_some() {
			self.ping_interval_secs = other.ping_interval_secs;
		}
		if other.idle_timeout_secs.is_some() {
			self.idle_timeout_secs = other.idle_timeout_secs;
		}
		if other.send_queue_size.is_some() {
			self.send_queue_size = other.send_queue_size;
		}
	}

	pub fn finalize(self) -> RealtimeConfig {
		RealtimeConfig {
			ping_interval_secs: self.ping_interval_secs.unwrap_or(30),
			idle_timeout_secs: self.idle_timeout_secs.unwrap_or(60),
			send_queue_size: self.send_queue_size.unwrap_or(256),
		}
	}
}

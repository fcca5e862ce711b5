// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The process-wide realtime hub.
//!
//! The hub owns every connection's subscription state behind one lock and
//! fans committed change events out to matching subscribers. Delivery uses a
//! bounded per-connection queue with `try_send`: a consumer that cannot keep
//! up has its connection closed rather than stalling the publisher. Events
//! enqueued for one subscription preserve publish order (the queue is FIFO).
//!
//! Heartbeats are hub-driven: one maintenance tick sends protocol pings to
//! every connection and reaps those idle past the timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use swiftbase_server_config::RealtimeConfig;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::{ChangeEvent, ClientMessage, Outbound, ServerMessage};

/// One live subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
	pub id: String,
	pub collection: String,
	pub document_id: Option<String>,
	pub created_at: DateTime<Utc>,
}

impl Subscription {
	fn matches(&self, event: &ChangeEvent) -> bool {
		if self.collection != event.collection {
			return false;
		}
		match &self.document_id {
			Some(document_id) => *document_id == event.document_id,
			None => true,
		}
	}
}

struct ConnectionEntry {
	principal_id: Option<String>,
	tx: mpsc::Sender<Outbound>,
	subscriptions: HashMap<String, Subscription>,
	last_activity: Instant,
}

/// Admin-facing hub statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStats {
	pub total_connections: usize,
	pub authenticated_connections: usize,
	pub total_subscriptions: usize,
	pub subscriptions_by_collection: HashMap<String, usize>,
}

pub struct RealtimeHub {
	config: RealtimeConfig,
	connections: Mutex<HashMap<String, ConnectionEntry>>,
}

impl RealtimeHub {
	pub fn new(config: RealtimeConfig) -> Self {
		Self {
			config,
			connections: Mutex::new(HashMap::new()),
		}
	}

	/// Register a new connection and hand back its outbound queue.
	///
	/// The welcome frame is already enqueued when this returns.
	pub async fn register(
		&self,
		principal_id: Option<String>,
	) -> (String, mpsc::Receiver<Outbound>) {
		let connection_id = Uuid::new_v4().to_string();
		let (tx, rx) = mpsc::channel(self.config.send_queue_size);

		let welcome = ServerMessage::Welcome {
			connection_id: connection_id.clone(),
			timestamp: Utc::now(),
		};
		let _ = tx.try_send(Outbound::Frame(welcome));

		let mut connections = self.connections.lock().await;
		connections.insert(
			connection_id.clone(),
			ConnectionEntry {
				principal_id,
				tx,
				subscriptions: HashMap::new(),
				last_activity: Instant::now(),
			},
		);
		tracing::debug!(connection_id = %connection_id, "realtime connection registered");
		(connection_id, rx)
	}

	/// Dispatch one client text frame.
	pub async fn handle_client_message(&self, connection_id: &str, text: &str) {
		let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
		let mut connections = self.connections.lock().await;
		let Some(entry) = connections.get_mut(connection_id) else {
			return;
		};
		entry.last_activity = Instant::now();

		match parsed {
			Ok(ClientMessage::Subscribe {
				collection,
				document_id,
			}) => {
				let subscription = Subscription {
					id: Uuid::new_v4().to_string(),
					collection: collection.clone(),
					document_id: document_id.clone(),
					created_at: Utc::now(),
				};
				let reply = ServerMessage::Subscribed {
					subscription_id: subscription.id.clone(),
					collection,
					document_id,
				};
				entry
					.subscriptions
					.insert(subscription.id.clone(), subscription);
				let _ = entry.tx.try_send(Outbound::Frame(reply));
			}
			Ok(ClientMessage::Unsubscribe) => {
				entry.subscriptions.clear();
				let _ = entry.tx.try_send(Outbound::Frame(ServerMessage::Unsubscribed));
			}
			Ok(ClientMessage::Ping) => {
				let _ = entry.tx.try_send(Outbound::Pong);
			}
			Err(_) => {
				let _ = entry.tx.try_send(Outbound::Frame(ServerMessage::Error {
					message: "unknown action".to_string(),
				}));
			}
		}
	}

	/// Record inbound activity (any frame, including pong).
	pub async fn touch(&self, connection_id: &str) {
		let mut connections = self.connections.lock().await;
		if let Some(entry) = connections.get_mut(connection_id) {
			entry.last_activity = Instant::now();
		}
	}

	/// Drop a connection and all its subscriptions.
	pub async fn disconnect(&self, connection_id: &str) {
		let mut connections = self.connections.lock().await;
		if connections.remove(connection_id).is_some() {
			tracing::debug!(connection_id = %connection_id, "realtime connection removed");
		}
	}

	/// Fan an event out to every matching subscription.
	///
	/// Never blocks: a full or closed queue marks the connection dead and it
	/// is dropped along with its subscriptions.
	pub async fn publish(&self, event: &ChangeEvent) {
		let mut dead = Vec::new();
		{
			let connections = self.connections.lock().await;
			for (connection_id, entry) in connections.iter() {
				let matching = entry.subscriptions.values().filter(|s| s.matches(event)).count();
				for _ in 0..matching {
					let frame = Outbound::Frame(ServerMessage::Event {
						event: event.clone(),
					});
					if entry.tx.try_send(frame).is_err() {
						tracing::warn!(
							connection_id = %connection_id,
							"slow or dead realtime consumer, closing"
						);
						dead.push(connection_id.clone());
						break;
					}
				}
			}
		}
		for connection_id in dead {
			self.disconnect(&connection_id).await;
		}
	}

	/// One heartbeat pass: ping everyone, reap idle connections.
	pub async fn heartbeat_tick(&self) {
		let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);
		let mut reaped = Vec::new();
		{
			let mut connections = self.connections.lock().await;
			connections.retain(|connection_id, entry| {
				if entry.last_activity.elapsed() > idle_timeout {
					let _ = entry.tx.try_send(Outbound::Close);
					reaped.push(connection_id.clone());
					return false;
				}
				let _ = entry.tx.try_send(Outbound::Ping);
				true
			});
		}
		for connection_id in reaped {
			tracing::info!(connection_id = %connection_id, "realtime connection reaped (idle)");
		}
	}

	/// Spawn the periodic heartbeat task. Abort the handle on shutdown.
	pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
		let hub = Arc::clone(self);
		let interval = Duration::from_secs(hub.config.ping_interval_secs);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
			// The first tick fires immediately; skip it.
			ticker.tick().await;
			loop {
				ticker.tick().await;
				hub.heartbeat_tick().await;
			}
		})
	}

	/// Close every connection and drop all state.
	pub async fn shutdown(&self) {
		let mut connections = self.connections.lock().await;
		for (_, entry) in connections.drain() {
			let _ = entry.tx.try_send(Outbound::Close);
		}
		tracing::info!("realtime hub shut down");
	}

	pub async fn stats(&self) -> RealtimeStats {
		let connections = self.connections.lock().await;
		let mut subscriptions_by_collection: HashMap<String, usize> = HashMap::new();
		let mut total_subscriptions = 0;
		let mut authenticated_connections = 0;
		for entry in connections.values() {
			if entry.principal_id.is_some() {
				authenticated_connections += 1;
			}
			for subscription in entry.subscriptions.values() {
				total_subscriptions += 1;
				*subscriptions_by_collection
					.entry(subscription.collection.clone())
					.or_default() += 1;
			}
		}
		RealtimeStats {
			total_connections: connections.len(),
			authenticated_connections,
			total_subscriptions,
			subscriptions_by_collection,
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire protocol for the realtime endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
	Create,
	Update,
	Delete,
}

/// A committed document change, as published by the query plane.
///
/// For updates `document` carries the update delta (the operator document),
/// not the full new state; for creates it carries the created document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
	#[serde(rename = "event")]
	pub kind: ChangeKind,
	pub collection: String,
	pub document_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub document: Option<serde_json::Value>,
	pub timestamp: DateTime<Utc>,
}

/// Client-to-server messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
	Subscribe {
		collection: String,
		#[serde(default, rename = "documentId")]
		document_id: Option<String>,
	},
	Unsubscribe,
	Ping,
}

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
	Welcome {
		#[serde(rename = "connectionId")]
		connection_id: String,
		timestamp: DateTime<Utc>,
	},
	Subscribed {
		#[serde(rename = "subscriptionId")]
		subscription_id: String,
		collection: String,
		#[serde(rename = "documentId", skip_serializing_if = "Option::is_none")]
		document_id: Option<String>,
	},
	Unsubscribed,
	Event {
		#[serde(flatten)]
		event: ChangeEvent,
	},
	Error {
		message: String,
	},
}

/// What the socket task should put on the wire.
#[derive(Debug, Clone)]
pub enum Outbound {
	/// A JSON text frame.
	Frame(ServerMessage),
	/// Protocol-level ping (heartbeat).
	Ping,
	/// Protocol-level pong (reply to a client `{action: "ping"}`).
	Pong,
	/// Close the socket.
	Close,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_client_subscribe_parses() {
		let msg: ClientMessage =
			serde_json::from_str(r#"{"action":"subscribe","collection":"products"}"#).unwrap();
		match msg {
			ClientMessage::Subscribe {
				collection,
				document_id,
			} => {
				assert_eq!(collection, "products");
				assert!(document_id.is_none());
			}
			other => panic!("unexpected message: {other:?}"),
		}
	}

	#[test]
	fn test_client_unknown_action_fails() {
		let result = serde_json::from_str::<ClientMessage>(r#"{"action":"shout"}"#);
		assert!(result.is_err());
	}

	#[test]
	fn test_event_frame_shape() {
		let frame = ServerMessage::Event {
			event: ChangeEvent {
				kind: ChangeKind::Create,
				collection: "products".to_string(),
				document_id: "d1".to_string(),
				document: Some(serde_json::json!({"price": 10})),
				timestamp: Utc::now(),
			},
		};
		let json = serde_json::to_value(&frame).unwrap();
		assert_eq!(json["type"], "event");
		assert_eq!(json["event"], "create");
		assert_eq!(json["documentId"], "d1");
		assert_eq!(json["collection"], "products");
	}

	#[test]
	fn test_welcome_frame_shape() {
		let frame = ServerMessage::Welcome {
			connection_id: "c1".to_string(),
			timestamp: Utc::now(),
		};
		let json = serde_json::to_value(&frame).unwrap();
		assert_eq!(json["type"], "welcome");
		assert_eq!(json["connectionId"], "c1");
	}
}

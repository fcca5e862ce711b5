// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WebSocket endpoint bridging sockets to the realtime hub.
//!
//! Authentication is optional here: a token may arrive as the `token` query
//! parameter or a bearer header, and an invalid or missing token downgrades
//! the connection to anonymous rather than closing it. Anonymous connections
//! may subscribe; only the HTTP surface requires authentication.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use swiftbase_server_auth::extract_bearer_token;
use swiftbase_server_realtime::Outbound;
use tracing::{debug, info};

use crate::api::AppState;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct WsQueryParams {
	pub token: Option<String>,
}

/// GET /api/realtime upgrade handler.
pub async fn ws_upgrade_handler(
	ws: WebSocketUpgrade,
	Query(params): Query<WsQueryParams>,
	headers: HeaderMap,
	State(state): State<AppState>,
) -> impl IntoResponse {
	let token = params
		.token
		.or_else(|| extract_bearer_token(&headers).map(str::to_string));

	let principal_id = match token {
		Some(token) => match state.auth.authenticate(&token, None).await {
			Ok((_, principal)) => Some(principal.id().to_string()),
			Err(_) => {
				debug!("invalid realtime token, continuing as anonymous");
				None
			}
		},
		None => None,
	};

	ws.on_upgrade(move |socket| handle_ws_connection(socket, principal_id, state))
}

async fn handle_ws_connection(socket: WebSocket, principal_id: Option<String>, state: AppState) {
	let hub = state.hub;
	let (connection_id, mut outbound_rx) = hub.register(principal_id).await;
	info!(connection_id = %connection_id, "realtime connection opened");

	let (mut sender, mut receiver) = socket.split();

	let send_connection_id = connection_id.clone();
	let send_task = tokio::spawn(async move {
		while let Some(outbound) = outbound_rx.recv().await {
			let message = match outbound {
				Outbound::Frame(frame) => match serde_json::to_string(&frame) {
					Ok(json) => Message::Text(json.into()),
					Err(e) => {
						debug!(error = %e, "failed to serialize realtime frame");
						continue;
					}
				},
				Outbound::Ping => Message::Ping(Vec::new().into()),
				Outbound::Pong => Message::Pong(Vec::new().into()),
				Outbound::Close => {
					let _ = sender.send(Message::Close(None)).await;
					break;
				}
			};
			if let Err(e) = sender.send(message).await {
				debug!(connection_id = %send_connection_id, error = %e, "websocket send failed");
				break;
			}
		}
	});

	while let Some(message) = receiver.next().await {
		match message {
			Ok(Message::Text(text)) => {
				hub.handle_client_message(&connection_id, &text).await;
			}
			Ok(Message::Binary(data)) => {
				if let Ok(text) = String::from_utf8(data.to_vec()) {
					hub.handle_client_message(&connection_id, &text).await;
				}
			}
			Ok(Message::Pong(_)) | Ok(Message::Ping(_)) => {
				// Axum answers pings itself; both directions count as liveness.
				hub.touch(&connection_id).await;
			}
			Ok(Message::Close(_)) => {
				debug!(connection_id = %connection_id, "websocket close received");
				break;
			}
			Err(e) => {
				debug!(connection_id = %connection_id, error = %e, "websocket error");
				break;
			}
		}
	}

	hub.disconnect(&connection_id).await;
	send_task.abort();
	info!(connection_id = %connection_id, "realtime connection closed");
}

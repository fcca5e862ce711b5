// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SwiftBase HTTP/WebSocket front end.
//!
//! Routes requests to the auth, query, collection, storage and realtime
//! services, enforces the auth middleware, and produces the standardized
//! response envelope.

pub mod api;
pub mod api_response;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod seed;
pub mod websocket;

pub use api::{bootstrap_admin, create_app, create_app_state, create_router, AppState};
pub use api_response::API_VERSION;
pub use error::ServerError;
pub use swiftbase_server_config::{load_config, ServerConfig};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Realtime broadcast hub for SwiftBase.
//!
//! A single process-wide hub tracks duplex connections and their
//! subscriptions, and fans out document change events published by the query
//! plane. Slow consumers are closed, never awaited.

pub mod hub;
pub mod protocol;

pub use hub::{RealtimeHub, RealtimeStats, Subscription};
pub use protocol::{ChangeEvent, ChangeKind, ClientMessage, Outbound, ServerMessage};

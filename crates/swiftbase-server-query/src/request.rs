// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The wire-level query request envelope.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the client wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
	Find,
	FindOne,
	Create,
	Update,
	Delete,
	Count,
	Aggregate,
	Custom,
}

/// Sort direction for one orderBy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	Asc,
	Desc,
}

/// The optional `query` block of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
	#[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
	pub r#where: Option<serde_json::Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub select: Option<Vec<String>>,
	#[serde(default, rename = "orderBy", skip_serializing_if = "Option::is_none")]
	pub order_by: Option<BTreeMap<String, SortDirection>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub limit: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub offset: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub distinct: Option<String>,
}

/// One query request as received over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
	pub action: Action,
	pub collection: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query: Option<QuerySpec>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<serde_json::Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<serde_json::Map<String, serde_json::Value>>,
}

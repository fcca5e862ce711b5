// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer-token extraction helpers used by the HTTP layer.
//!
//! The Authorization scheme is bearer only: a missing header, a different
//! scheme and an empty token all fail the same way, so a probing client
//! cannot distinguish them.

use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Extract the bearer token from request headers, if any.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let rest = value.strip_prefix("Bearer ")?;
	let token = rest.trim();
	if token.is_empty() {
		None
	} else {
		Some(token)
	}
}

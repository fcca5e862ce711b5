// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Content-type derivation: extension table first, magic numbers second.

const EXTENSION_TABLE: &[(&str, &str)] = &[
	("txt", "text/plain"),
	("md", "text/markdown"),
	("html", "text/html"),
	("htm", "text/html"),
	("css", "text/css"),
	("csv", "text/csv"),
	("js", "text/javascript"),
	("json", "application/json"),
	("xml", "application/xml"),
	("pdf", "application/pdf"),
	("zip", "application/zip"),
	("gz", "application/gzip"),
	("tar", "application/x-tar"),
	("png", "image/png"),
	("jpg", "image/jpeg"),
	("jpeg", "image/jpeg"),
	("gif", "image/gif"),
	("webp", "image/webp"),
	("svg", "image/svg+xml"),
	("ico", "image/x-icon"),
	("mp3", "audio/mpeg"),
	("wav", "audio/wav"),
	("ogg", "audio/ogg"),
	("mp4", "video/mp4"),
	("webm", "video/webm"),
	("woff", "font/woff"),
	("woff2", "font/woff2"),
];

const MAGIC_TABLE: &[(&[u8], &str)] = &[
	(b"\x89PNG\r\n\x1a\n", "image/png"),
	(b"\xff\xd8\xff", "image/jpeg"),
	(b"GIF87a", "image/gif"),
	(b"GIF89a", "image/gif"),
	(b"%PDF-", "application/pdf"),
	(b"PK\x03\x04", "application/zip"),
	(b"\x1f\x8b", "application/gzip"),
	(b"OggS", "audio/ogg"),
	(b"ID3", "audio/mpeg"),
];

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Derive a content type from the original file name and leading bytes.
///
/// An explicitly provided type always wins; otherwise the extension table,
/// then the magic-number table, then the octet-stream fallback.
pub fn derive_content_type(
	provided: Option<&str>,
	original_name: &str,
	bytes: &[u8],
) -> String {
	if let Some(provided) = provided {
		let trimmed = provided.trim();
		if !trimmed.is_empty() {
			return trimmed.to_string();
		}
	}

	if let Some(extension) = original_name.rsplit('.').next() {
		if extension.len() < original_name.len() {
			let extension = extension.to_ascii_lowercase();
			for (candidate, content_type) in EXTENSION_TABLE {
				if *candidate == extension {
					return (*content_type).to_string();
				}
			}
		}
	}

	for (magic, content_type) in MAGIC_TABLE {
		if bytes.starts_with(magic) {
			return (*content_type).to_string();
		}
	}

	// RIFF containers distinguish by the form tag.
	if bytes.len() >= 12 && &bytes[..4] == b"RIFF" {
		match &bytes[8..12] {
			b"WEBP" => return "image/webp".to_string(),
			b"WAVE" => return "audio/wav".to_string(),
			_ => {}
		}
	}

	DEFAULT_CONTENT_TYPE.to_string()
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File payloads and metadata for SwiftBase.
//!
//! The service owns the bytes directory; metadata rows live in the storage
//! kernel. Nothing else in the process touches either.

pub mod content_type;
pub mod error;
pub mod service;

pub use content_type::{derive_content_type, DEFAULT_CONTENT_TYPE};
pub use error::{Result, StorageError};
pub use service::{
	FileContent, FilePrincipal, FileService, ListOptions, ResolvedRange, SweepReport,
};

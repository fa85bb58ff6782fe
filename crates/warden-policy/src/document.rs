// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decoding allowlist and denylist documents.
//!
//! A document is a list of entries in JSON or YAML. Both formats decode into
//! the same types and reject unknown fields.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{PolicyError, Result};
use crate::types::{AllowlistEntry, DenylistEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
	Json,
	Yaml,
}

impl DocumentFormat {
	/// Picks the format from the file extension. Unknown extensions are JSON.
	pub fn from_path(path: &Path) -> Self {
		match path
			.extension()
			.and_then(|ext| ext.to_str())
			.map(str::to_ascii_lowercase)
			.as_deref()
		{
			Some("yaml") | Some("yml") => Self::Yaml,
			_ => Self::Json,
		}
	}
}

fn parse<T: DeserializeOwned>(content: &str, format: DocumentFormat) -> Result<Vec<T>> {
	match format {
		DocumentFormat::Json => Ok(serde_json::from_str(content)?),
		DocumentFormat::Yaml => Ok(serde_yaml::from_str(content)?),
	}
}

pub fn parse_allowlist(content: &str, format: DocumentFormat) -> Result<Vec<AllowlistEntry>> {
	parse(content, format)
}

pub fn parse_denylist(content: &str, format: DocumentFormat) -> Result<Vec<DenylistEntry>> {
	parse(content, format)
}

fn read(path: &Path) -> Result<String> {
	std::fs::read_to_string(path).map_err(|source| PolicyError::FileRead {
		path: path.to_path_buf(),
		source,
	})
}

pub fn load_allowlist_file(path: impl AsRef<Path>) -> Result<Vec<AllowlistEntry>> {
	let path = path.as_ref();
	parse_allowlist(&read(path)?, DocumentFormat::from_path(path))
}

pub fn load_denylist_file(path: impl AsRef<Path>) -> Result<Vec<DenylistEntry>> {
	let path = path.as_ref();
	parse_denylist(&read(path)?, DocumentFormat::from_path(path))
}

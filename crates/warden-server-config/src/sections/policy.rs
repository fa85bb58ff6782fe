// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest request body read for constraint matching (1 MiB).
///
/// Mirrors `warden_policy::DEFAULT_MAX_BODY_BYTES` so this crate stays free of
/// the policy engine; the `warden` binary tests that the two agree.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfigLayer {
	pub allowlist_path: Option<PathBuf>,
	pub denylist_path: Option<PathBuf>,
	pub max_body_bytes: Option<usize>,
}

impl PolicyConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.allowlist_path.is_some() {
			self.allowlist_path = other.allowlist_path;
		}
		if other.denylist_path.is_some() {
			self.denylist_path = other.denylist_path;
		}
		if other.max_body_bytes.is_some() {
			self.max_body_bytes = other.max_body_bytes;
		}
	}

	pub fn finalize(self) -> PolicyConfig {
		PolicyConfig {
			allowlist_path: self.allowlist_path,
			denylist_path: self.denylist_path,
			max_body_bytes: self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
	pub allowlist_path: Option<PathBuf>,
	pub denylist_path: Option<PathBuf>,
	pub max_body_bytes: usize,
}

impl Default for PolicyConfig {
	fn default() -> Self {
		Self {
			allowlist_path: None,
			denylist_path: None,
			max_body_bytes: DEFAULT_MAX_BODY_BYTES,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = PolicyConfigLayer::default().finalize();
		assert_eq!(config, PolicyConfig::default());
		assert_eq!(config.max_body_bytes, 1_048_576);
		assert!(config.allowlist_path.is_none());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = PolicyConfigLayer {
			allowlist_path: Some(PathBuf::from("/a.yaml")),
			denylist_path: Some(PathBuf::from("/d.yaml")),
			max_body_bytes: None,
		};
		base.merge(PolicyConfigLayer {
			allowlist_path: Some(PathBuf::from("/b.yaml")),
			denylist_path: None,
			max_body_bytes: Some(512),
		});
		assert_eq!(base.allowlist_path, Some(PathBuf::from("/b.yaml")));
		assert_eq!(base.denylist_path, Some(PathBuf::from("/d.yaml")));
		assert_eq!(base.max_body_bytes, Some(512));
	}
}

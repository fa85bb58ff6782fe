// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration each source contributes.

use serde::{Deserialize, Serialize};

use crate::sections::{LoggingConfigLayer, PolicyConfigLayer};

/// One source's view of the configuration. Absent sections and fields defer
/// to lower-precedence sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WardenConfigLayer {
	pub policy: Option<PolicyConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl WardenConfigLayer {
	/// Overlays `other` onto `self`, field by field.
	pub fn merge(&mut self, other: Self) {
		if let Some(policy) = other.policy {
			self.policy.get_or_insert_with(Default::default).merge(policy);
		}
		if let Some(logging) = other.logging {
			self.logging.get_or_insert_with(Default::default).merge(logging);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sections::LogFormat;

	#[test]
	fn test_merge_keeps_fields_the_overlay_omits() {
		let mut base = WardenConfigLayer {
			policy: Some(PolicyConfigLayer {
				allowlist_path: Some("/etc/warden/allowlist.yaml".into()),
				max_body_bytes: Some(4096),
				..Default::default()
			}),
			logging: None,
		};
		base.merge(WardenConfigLayer {
			policy: Some(PolicyConfigLayer {
				max_body_bytes: Some(8192),
				..Default::default()
			}),
			logging: Some(LoggingConfigLayer {
				format: Some(LogFormat::Json),
				..Default::default()
			}),
		});

		let policy = base.policy.unwrap();
		assert_eq!(
			policy.allowlist_path.as_deref(),
			Some(std::path::Path::new("/etc/warden/allowlist.yaml"))
		);
		assert_eq!(policy.max_body_bytes, Some(8192));
		assert_eq!(base.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_parse_toml_layer() {
		let layer: WardenConfigLayer = toml::from_str(
			r#"
			[policy]
			allowlist_path = "/etc/warden/allowlist.yaml"
			denylist_path = "/etc/warden/denylist.json"

			[logging]
			level = "debug"
			format = "json"
			"#,
		)
		.unwrap();
		let logging = layer.logging.unwrap();
		assert_eq!(logging.level.as_deref(), Some("debug"));
		assert_eq!(logging.format, Some(LogFormat::Json));
		assert!(layer.policy.unwrap().denylist_path.is_some());
	}

	#[test]
	fn test_unknown_sections_rejected() {
		let result: Result<WardenConfigLayer, _> = toml::from_str("[database]\nurl = \"x\"\n");
		assert!(result.is_err());
	}
}

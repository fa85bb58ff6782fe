// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy configuration types.
//!
//! These types are both the on-disk document shape (JSON or YAML, decoded
//! strictly) and, once validated, the runtime form held by the stores:
//!
//! - [`AllowlistEntry`] / [`DenylistEntry`]: one per integration
//! - [`CallerConfig`] / [`DenylistCaller`]: per caller id, `"*"` for everyone else
//! - [`CallRule`]: a path pattern plus per-method [`RequestConstraint`]s
//! - [`CapabilityConfig`]: a named capability with parameters, expanded into rules

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::clean_segments;

/// Caller id that applies to every caller without rules of its own.
pub const WILDCARD_CALLER: &str = "*";

/// Returns the store key for a caller id; the empty id means the wildcard.
pub fn normalize_caller_id(id: &str) -> &str {
	if id.is_empty() {
		WILDCARD_CALLER
	} else {
		id
	}
}

/// Returns the store key for an integration name.
pub fn normalize_integration(name: &str) -> String {
	name.trim().to_lowercase()
}

/// Additional requirements a request must meet for a rule to apply.
///
/// All parts are optional; a constraint with nothing set matches every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConstraint {
	/// Header name → values that must each appear among the request's values.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, Vec<String>>,
	/// Query parameter → values that must each appear among the request's values.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub query: BTreeMap<String, Vec<String>>,
	/// Structural subset the decoded body must contain.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub body: Map<String, Value>,
}

impl RequestConstraint {
	/// Returns true if the constraint places no requirement on the request.
	pub fn is_empty(&self) -> bool {
		self.headers.is_empty() && self.query.is_empty() && self.body.is_empty()
	}

	/// Requires a header to carry the given value.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.entry(name.into()).or_default().push(value.into());
		self
	}

	/// Requires a query parameter to carry the given value.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.entry(name.into()).or_default().push(value.into());
		self
	}

	/// Requires the body to contain `key` matching `value`.
	pub fn with_body_field(mut self, key: impl Into<String>, value: Value) -> Self {
		self.body.insert(key.into(), value);
		self
	}
}

/// A path pattern and the methods (with constraints) allowed on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallRule {
	pub path: String,
	#[serde(default)]
	pub methods: BTreeMap<String, RequestConstraint>,
	/// `path` split into cleaned segments, filled in when the rule enters a store.
	#[serde(skip)]
	pub(crate) segments: Vec<String>,
}

impl CallRule {
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			methods: BTreeMap::new(),
			segments: Vec::new(),
		}
	}

	/// Adds a method with its constraint.
	pub fn with_method(mut self, method: impl Into<String>, constraint: RequestConstraint) -> Self {
		self.methods.insert(method.into(), constraint);
		self
	}

	/// Pre-split path segments. Empty until the rule has been installed.
	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	/// Upper-cases method keys and caches the path segments.
	pub(crate) fn prepare(mut self) -> Self {
		self.segments = clean_segments(&self.path);
		self.methods = std::mem::take(&mut self.methods)
			.into_iter()
			.map(|(method, constraint)| (method.to_ascii_uppercase(), constraint))
			.collect();
		self
	}
}

/// A named capability declared on a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityConfig {
	pub name: String,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub params: Map<String, Value>,
}

impl CapabilityConfig {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			params: Map::new(),
		}
	}

	pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
		self.params.insert(name.into(), value);
		self
	}
}

/// Allowlist configuration for one caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallerConfig {
	/// Caller id; empty or `"*"` means the wildcard caller.
	#[serde(default)]
	pub id: String,
	/// Expanded and appended to `rules` on install; never retained.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub capabilities: Vec<CapabilityConfig>,
	#[serde(default)]
	pub rules: Vec<CallRule>,
}

impl CallerConfig {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			capabilities: Vec::new(),
			rules: Vec::new(),
		}
	}

	pub fn with_rule(mut self, rule: CallRule) -> Self {
		self.rules.push(rule);
		self
	}

	pub fn with_capability(mut self, capability: CapabilityConfig) -> Self {
		self.capabilities.push(capability);
		self
	}
}

/// Allowlist configuration for one integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowlistEntry {
	pub integration: String,
	#[serde(default)]
	pub callers: Vec<CallerConfig>,
}

impl AllowlistEntry {
	pub fn new(integration: impl Into<String>, callers: Vec<CallerConfig>) -> Self {
		Self {
			integration: integration.into(),
			callers,
		}
	}
}

/// Denylist configuration for one caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenylistCaller {
	#[serde(default)]
	pub id: String,
	/// Required in documents: a denylist caller exists only to carry rules.
	pub rules: Vec<CallRule>,
}

impl DenylistCaller {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			rules: Vec::new(),
		}
	}

	pub fn with_rule(mut self, rule: CallRule) -> Self {
		self.rules.push(rule);
		self
	}
}

/// Denylist configuration for one integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenylistEntry {
	pub integration: String,
	#[serde(default)]
	pub callers: Vec<DenylistCaller>,
}

impl DenylistEntry {
	pub fn new(integration: impl Into<String>, callers: Vec<DenylistCaller>) -> Self {
		Self {
			integration: integration.into(),
			callers,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_normalize_caller_id() {
		assert_eq!(normalize_caller_id(""), "*");
		assert_eq!(normalize_caller_id("*"), "*");
		assert_eq!(normalize_caller_id("bot"), "bot");
	}

	#[test]
	fn test_normalize_integration() {
		assert_eq!(normalize_integration("Slack"), "slack");
		assert_eq!(normalize_integration(" GitHub "), "github");
	}

	#[test]
	fn test_empty_constraint() {
		assert!(RequestConstraint::default().is_empty());
		assert!(!RequestConstraint::default()
			.with_header("X-Team", "infra")
			.is_empty());
		assert!(!RequestConstraint::default()
			.with_body_field("channel", json!("general"))
			.is_empty());
	}

	#[test]
	fn test_prepare_uppercases_methods_and_splits_path() {
		let rule = CallRule::new("/api//chat.postMessage/")
			.with_method("post", RequestConstraint::default())
			.prepare();
		assert_eq!(rule.segments(), ["api", "chat.postMessage"]);
		assert!(rule.methods.contains_key("POST"));
		assert!(!rule.methods.contains_key("post"));
	}

	#[test]
	fn test_decode_rejects_unknown_fields() {
		let result: Result<CallRule, _> = serde_json::from_value(json!({
			"path": "/a",
			"methods": {"GET": {}},
			"verbs": ["GET"],
		}));
		assert!(result.is_err());

		let result: Result<RequestConstraint, _> =
			serde_json::from_value(json!({"headers": {}, "cookies": {}}));
		assert!(result.is_err());
	}

	#[test]
	fn test_decode_caller_defaults() {
		let caller: CallerConfig = serde_json::from_value(json!({
			"rules": [{"path": "/x", "methods": {"GET": {}}}],
		}))
		.unwrap();
		assert_eq!(caller.id, "");
		assert!(caller.capabilities.is_empty());
		assert_eq!(caller.rules.len(), 1);
		assert!(caller.rules[0].segments().is_empty());
	}

	#[test]
	fn test_denylist_caller_requires_rules() {
		let result: Result<DenylistCaller, _> = serde_json::from_value(json!({"id": "bot"}));
		let err = result.unwrap_err();
		assert!(err.to_string().contains("rules"));

		let caller: DenylistCaller = serde_json::from_value(json!({"id": "bot", "rules": []})).unwrap();
		assert!(caller.rules.is_empty());
	}

	#[test]
	fn test_denylist_caller_rejects_capabilities() {
		let result: Result<DenylistCaller, _> = serde_json::from_value(json!({
			"id": "bot",
			"capabilities": [{"name": "post_as"}],
		}));
		assert!(result.is_err());
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The denylist: an override stage evaluated after the allowlist.
//!
//! A request is blocked by the first rule whose path, method, and constraint
//! all match it. The caller's own rules are checked before the wildcard
//! caller's. An integration without denylist entries never blocks.

use std::collections::HashMap;
use std::sync::Arc;

use http::Request;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::body::BodyReader;
use crate::constraint::constraint_matches_request;
use crate::error::{PolicyError, Result};
use crate::path::{match_segments, request_segments};
use crate::types::{
	normalize_caller_id, normalize_integration, CallRule, DenylistCaller, DenylistEntry,
	WILDCARD_CALLER,
};
use crate::validate;

/// Prepared deny rules of one integration, keyed by normalized caller id.
pub type DenyIndex = HashMap<String, Vec<CallRule>>;

/// Deny indexes keyed by lower-cased integration name.
pub type DenylistMap = HashMap<String, Arc<DenyIndex>>;

/// Validates denylist entries without installing them.
pub fn validate_denylist_entries(entries: &[DenylistEntry]) -> Result<()> {
	build_denylist_map(entries).map(|_| ())
}

/// Validates a batch of entries into a complete denylist. Nothing is installed.
pub fn build_denylist_map(entries: &[DenylistEntry]) -> Result<DenylistMap> {
	let names = validate::integration_names(entries.iter().map(|e| e.integration.as_str()))?;

	let mut map = DenylistMap::with_capacity(entries.len());
	for (name, entry) in names.into_iter().zip(entries) {
		let index = build_deny_index(&name, &entry.callers)?;
		map.insert(name, Arc::new(index));
	}
	Ok(map)
}

fn build_deny_index(integration: &str, callers: &[DenylistCaller]) -> Result<DenyIndex> {
	validate::unique_callers(integration, callers.iter().map(|c| c.id.as_str()))?;

	let mut index = DenyIndex::with_capacity(callers.len());
	for caller in callers {
		validate::rules(integration, &caller.id, &caller.rules, true)?;
		let rules = caller.rules.iter().cloned().map(CallRule::prepare).collect();
		index.insert(normalize_caller_id(&caller.id).to_string(), rules);
	}
	Ok(index)
}

/// Denylist store shared by request handlers and the reload task.
#[derive(Debug, Default)]
pub struct DenylistStore {
	entries: RwLock<DenylistMap>,
}

impl DenylistStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Validates and installs the callers of one integration.
	///
	/// On error the store is left untouched.
	pub fn set(&self, integration: &str, callers: Vec<DenylistCaller>) -> Result<()> {
		let name = normalize_integration(integration);
		if name.is_empty() {
			return Err(PolicyError::MissingIntegration { index: 0 });
		}

		let index = build_deny_index(&name, &callers)?;
		let rules: usize = index.values().map(Vec::len).sum();
		let caller_count = index.len();

		self.entries.write().insert(name.clone(), Arc::new(index));
		info!(
			integration = %name,
			callers = caller_count,
			rules,
			"installed denylist"
		);
		Ok(())
	}

	/// Replaces the whole store with a map from [`build_denylist_map`].
	pub fn replace(&self, map: DenylistMap) {
		let integrations = map.len();
		*self.entries.write() = map;
		info!(integrations, "replaced denylist");
	}

	/// Returns the installed callers of an integration, sorted by id.
	pub fn get(&self, integration: &str) -> Vec<DenylistCaller> {
		let Some(index) = self.index(integration) else {
			return Vec::new();
		};
		let mut callers: Vec<DenylistCaller> = index
			.iter()
			.map(|(id, rules)| DenylistCaller {
				id: id.clone(),
				rules: rules.clone(),
			})
			.collect();
		callers.sort_by(|a, b| a.id.cmp(&b.id));
		callers
	}

	/// Returns the installed integration names, sorted.
	pub fn integrations(&self) -> Vec<String> {
		let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
		names.sort();
		names
	}

	/// Returns a copy of the whole store.
	pub fn snapshot(&self) -> DenylistMap {
		self.entries.read().clone()
	}

	/// Returns the reason the request is blocked, or `None` if it is not.
	///
	/// Once an integration has deny rules, a request path that cannot be
	/// decoded is blocked.
	pub fn match_request<B: BodyReader>(
		&self,
		integration: &str,
		caller: &str,
		req: &Request<B>,
	) -> Option<String> {
		let index = self.index(integration)?;
		if index.is_empty() {
			return None;
		}

		let caller = normalize_caller_id(caller);
		let method = req.method().as_str().to_ascii_uppercase();
		let path = req.uri().path();
		let Some(segments) = request_segments(path) else {
			debug!(integration, caller, %method, path, "undecodable request path");
			return Some(format!("caller {caller:?} sent an undecodable path {path}"));
		};

		let mut candidates = vec![caller];
		if caller != WILDCARD_CALLER {
			candidates.push(WILDCARD_CALLER);
		}

		for candidate in candidates {
			let Some(rules) = index.get(candidate) else {
				continue;
			};
			let blocked = rules.iter().any(|rule| {
				match_segments(&rule.segments, &segments)
					&& rule
						.methods
						.get(&method)
						.is_some_and(|constraint| constraint_matches_request(req, constraint))
			});
			if blocked {
				debug!(integration, caller, matched_as = candidate, %method, path, "denylist rule matched");
				return Some(format!("caller {caller:?} is denied {method} {path}"));
			}
		}
		None
	}

	fn index(&self, integration: &str) -> Option<Arc<DenyIndex>> {
		self.entries
			.read()
			.get(&normalize_integration(integration))
			.cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::body::BufferedBody;
	use crate::types::RequestConstraint;
	use http::header::CONTENT_TYPE;
	use serde_json::json;

	fn rule(path: &str, method: &str) -> CallRule {
		CallRule::new(path).with_method(method, RequestConstraint::default())
	}

	fn request(method: &str, uri: &str) -> Request<BufferedBody> {
		Request::builder()
			.method(method)
			.uri(uri)
			.body(BufferedBody::empty())
			.unwrap()
	}

	mod match_request {
		use super::*;

		#[test]
		fn test_no_entries_never_blocks() {
			let store = DenylistStore::new();
			assert!(store.match_request("slack", "bot", &request("DELETE", "/anything")).is_none());

			store.set("slack", Vec::new()).unwrap();
			assert!(store.match_request("slack", "bot", &request("DELETE", "/anything")).is_none());
		}

		#[test]
		fn test_caller_rule_blocks_with_reason() {
			let store = DenylistStore::new();
			store
				.set("Slack", vec![DenylistCaller::new("bot").with_rule(rule("/api/admin.users", "post"))])
				.unwrap();

			let req = request("POST", "/api/admin.users?limit=1");
			let reason = store.match_request("slack", "bot", &req).unwrap();
			assert!(reason.contains("bot"));
			assert!(reason.contains("POST"));
			assert!(reason.contains("/api/admin.users"));

			assert!(store.match_request("slack", "bot", &request("GET", "/api/admin.users")).is_none());
			assert!(store.match_request("slack", "other", &req).is_none());
		}

		#[test]
		fn test_encoded_path_is_still_blocked() {
			let store = DenylistStore::new();
			store
				.set("slack", vec![DenylistCaller::new("*").with_rule(rule("/api/admin", "GET"))])
				.unwrap();

			assert!(store.match_request("slack", "bot", &request("GET", "/api/%61dmin")).is_some());
			assert!(store
				.match_request("slack", "bot", &request("GET", "/api/x/%2E%2E/admin"))
				.is_some());
			let reason = store
				.match_request("slack", "bot", &request("GET", "/api/a%2Fb"))
				.unwrap();
			assert!(reason.contains("undecodable"));
			assert!(store.match_request("slack", "bot", &request("GET", "/api/users")).is_none());
		}

		#[test]
		fn test_wildcard_rules_apply_to_everyone() {
			let store = DenylistStore::new();
			store
				.set(
					"slack",
					vec![
						DenylistCaller::new("bot").with_rule(rule("/api/chat.delete", "POST")),
						DenylistCaller::new("*").with_rule(rule("/api/admin/**", "POST")),
					],
				)
				.unwrap();

			let admin = request("POST", "/api/admin/users/remove");
			let bot_reason = store.match_request("slack", "bot", &admin).unwrap();
			assert!(bot_reason.contains("\"bot\""));
			assert!(store.match_request("slack", "someone", &admin).is_some());
			assert!(store.match_request("slack", "", &admin).is_some());
			assert!(store
				.match_request("slack", "someone", &request("POST", "/api/chat.delete"))
				.is_none());
		}

		#[test]
		fn test_constraint_must_be_satisfied() {
			let store = DenylistStore::new();
			let general = RequestConstraint::default().with_body_field("channel", json!("general"));
			store
				.set(
					"slack",
					vec![DenylistCaller::new("*")
						.with_rule(CallRule::new("/api/chat.postMessage").with_method("POST", general))],
				)
				.unwrap();

			let post = |body: serde_json::Value| {
				Request::builder()
					.method("POST")
					.uri("/api/chat.postMessage")
					.header(CONTENT_TYPE, "application/json")
					.body(BufferedBody::with_default_limit(body.to_string()))
					.unwrap()
			};

			assert!(store
				.match_request("slack", "bot", &post(json!({"channel": "general", "text": "hi"})))
				.is_some());
			assert!(store
				.match_request("slack", "bot", &post(json!({"channel": "random"})))
				.is_none());
		}
	}

	mod install {
		use super::*;

		#[test]
		fn test_get_returns_prepared_rules() {
			let store = DenylistStore::new();
			store
				.set(
					"slack",
					vec![
						DenylistCaller::new("").with_rule(rule("/a/b/", "get")),
						DenylistCaller::new("bot").with_rule(rule("/c", "DELETE")),
					],
				)
				.unwrap();

			assert_eq!(store.integrations(), vec!["slack"]);
			let callers = store.get("SLACK");
			let ids: Vec<&str> = callers.iter().map(|c| c.id.as_str()).collect();
			assert_eq!(ids, vec!["*", "bot"]);
			assert_eq!(callers[0].rules[0].segments(), ["a", "b"]);
			assert!(callers[0].rules[0].methods.contains_key("GET"));
		}

		#[test]
		fn test_failed_set_leaves_store_intact() {
			let store = DenylistStore::new();
			store
				.set("slack", vec![DenylistCaller::new("bot").with_rule(rule("/a", "GET"))])
				.unwrap();
			let before = store.snapshot();

			let err = store
				.set(
					"slack",
					vec![DenylistCaller::new("bot")
						.with_rule(rule("/b", "GET"))
						.with_rule(rule("/b", "get"))],
				)
				.unwrap_err();
			assert!(matches!(err, PolicyError::DuplicateRule { .. }));
			assert_eq!(store.snapshot(), before);
		}

		#[test]
		fn test_replace_swaps_everything() {
			let store = DenylistStore::new();
			store
				.set("slack", vec![DenylistCaller::new("bot").with_rule(rule("/a", "GET"))])
				.unwrap();
			let map = build_denylist_map(&[DenylistEntry::new(
				"github",
				vec![DenylistCaller::new("*").with_rule(rule("/**", "DELETE"))],
			)])
			.unwrap();
			store.replace(map);
			assert_eq!(store.integrations(), vec!["github"]);
			assert!(store.get("slack").is_empty());
		}
	}

	mod validate_entries {
		use super::*;

		#[test]
		fn test_valid_batch() {
			let entries = vec![
				DenylistEntry::new("slack", vec![DenylistCaller::new("*").with_rule(rule("/a", "GET"))]),
				DenylistEntry::new("github", Vec::new()),
			];
			assert!(validate_denylist_entries(&entries).is_ok());
			assert_eq!(
				build_denylist_map(&entries).unwrap(),
				build_denylist_map(&entries).unwrap()
			);
		}

		#[test]
		fn test_rejections() {
			let dup_integration = vec![
				DenylistEntry::new("slack", Vec::new()),
				DenylistEntry::new("Slack", Vec::new()),
			];
			assert!(matches!(
				validate_denylist_entries(&dup_integration),
				Err(PolicyError::DuplicateIntegration(_))
			));

			let dup_caller = vec![DenylistEntry::new(
				"slack",
				vec![DenylistCaller::new("bot"), DenylistCaller::new("bot")],
			)];
			assert!(matches!(
				validate_denylist_entries(&dup_caller),
				Err(PolicyError::DuplicateCaller { .. })
			));

			let empty_path = vec![DenylistEntry::new(
				"slack",
				vec![DenylistCaller::new("bot").with_rule(rule("", "GET"))],
			)];
			assert!(matches!(
				validate_denylist_entries(&empty_path),
				Err(PolicyError::EmptyPath { .. })
			));
		}
	}
}

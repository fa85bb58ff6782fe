// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The allowlist: which caller may call which path and method, and under what
//! request constraint.
//!
//! Entries are validated and their capabilities expanded before the store's
//! lock is taken. Installation swaps a whole per-integration index in one
//! write, so readers see either the old index or the new one.
//!
//! # Evaluation
//!
//! [`AllowlistStore::find_constraint`] scans the caller's own rules in
//! declaration order and returns the constraint of the first rule whose path
//! pattern and method both match. A rule whose path matches but which does not
//! declare the method is skipped. The wildcard caller `"*"` is consulted only
//! when none of the caller's rules matched the path at all, so a caller with
//! explicit rules for a path never inherits the wildcard's methods there.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::capability::CapabilityRegistry;
use crate::error::{PolicyError, Result};
use crate::path::{match_segments, request_segments};
use crate::types::{
	normalize_caller_id, normalize_integration, AllowlistEntry, CallRule, CallerConfig,
	RequestConstraint, WILDCARD_CALLER,
};
use crate::validate;

/// Expanded callers of one integration, keyed by normalized caller id.
pub type CallerIndex = HashMap<String, CallerConfig>;

/// Caller indexes keyed by lower-cased integration name.
pub type AllowlistMap = HashMap<String, Arc<CallerIndex>>;

/// Validates allowlist entries without installing them.
pub fn validate_allowlist_entries(
	registry: &CapabilityRegistry,
	entries: &[AllowlistEntry],
) -> Result<()> {
	build_allowlist_map(registry, entries).map(|_| ())
}

/// Validates and expands a batch of entries into a complete allowlist.
///
/// Pure: nothing is installed. The first invalid entry fails the whole batch.
pub fn build_allowlist_map(
	registry: &CapabilityRegistry,
	entries: &[AllowlistEntry],
) -> Result<AllowlistMap> {
	let names = validate::integration_names(entries.iter().map(|e| e.integration.as_str()))?;

	let mut map = AllowlistMap::with_capacity(entries.len());
	for (name, entry) in names.into_iter().zip(entries) {
		let index = build_caller_index(registry, &name, &entry.callers)?;
		map.insert(name, Arc::new(index));
	}
	Ok(map)
}

fn build_caller_index(
	registry: &CapabilityRegistry,
	integration: &str,
	callers: &[CallerConfig],
) -> Result<CallerIndex> {
	validate::unique_callers(integration, callers.iter().map(|c| c.id.as_str()))?;
	for caller in callers {
		validate::rules(integration, &caller.id, &caller.rules, true)?;
	}

	let expanded = registry.expand(integration, callers)?;

	let mut index = CallerIndex::with_capacity(expanded.len());
	for caller in expanded {
		validate::rules(integration, &caller.id, &caller.rules, false)?;
		let id = normalize_caller_id(&caller.id).to_string();
		let rules = caller.rules.into_iter().map(CallRule::prepare).collect();
		index.insert(
			id.clone(),
			CallerConfig {
				id,
				capabilities: Vec::new(),
				rules,
			},
		);
	}
	Ok(index)
}

enum Scan<'a> {
	Matched(&'a RequestConstraint),
	PathOnly,
	Nothing,
}

fn scan<'a>(rules: &'a [CallRule], path: &[String], method: &str) -> Scan<'a> {
	let mut path_matched = false;
	for rule in rules {
		if !match_segments(&rule.segments, path) {
			continue;
		}
		if let Some(constraint) = rule.methods.get(method) {
			return Scan::Matched(constraint);
		}
		path_matched = true;
	}
	if path_matched {
		Scan::PathOnly
	} else {
		Scan::Nothing
	}
}

/// Allowlist store shared by request handlers and the reload task.
#[derive(Debug)]
pub struct AllowlistStore {
	registry: Arc<CapabilityRegistry>,
	entries: RwLock<AllowlistMap>,
}

impl AllowlistStore {
	/// Creates an empty store. An empty store allows nothing.
	pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
		Self {
			registry,
			entries: RwLock::new(AllowlistMap::new()),
		}
	}

	pub fn registry(&self) -> &Arc<CapabilityRegistry> {
		&self.registry
	}

	/// Validates, expands, and installs the callers of one integration.
	///
	/// On error the store is left untouched.
	pub fn set(&self, integration: &str, callers: Vec<CallerConfig>) -> Result<()> {
		let name = normalize_integration(integration);
		if name.is_empty() {
			return Err(PolicyError::MissingIntegration { index: 0 });
		}

		let index = build_caller_index(&self.registry, &name, &callers)?;
		let rules: usize = index.values().map(|c| c.rules.len()).sum();
		let caller_count = index.len();

		self.entries.write().insert(name.clone(), Arc::new(index));
		info!(
			integration = %name,
			callers = caller_count,
			rules,
			"installed allowlist"
		);
		Ok(())
	}

	/// Replaces the whole store with a map from [`build_allowlist_map`].
	pub fn replace(&self, map: AllowlistMap) {
		let integrations = map.len();
		*self.entries.write() = map;
		info!(integrations, "replaced allowlist");
	}

	/// Returns the expanded callers of an integration, sorted by id.
	pub fn get(&self, integration: &str) -> Vec<CallerConfig> {
		let Some(index) = self.index(integration) else {
			return Vec::new();
		};
		let mut callers: Vec<CallerConfig> = index.values().cloned().collect();
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
	pub fn snapshot(&self) -> AllowlistMap {
		self.entries.read().clone()
	}

	/// Finds the constraint governing a call, if the caller may make it at all.
	///
	/// `None` means the call is not allowed. `Some` means it is allowed provided
	/// the request satisfies the returned constraint. `path` is the raw request
	/// path; one that cannot be decoded is never allowed.
	pub fn find_constraint(
		&self,
		integration: &str,
		caller: &str,
		path: &str,
		method: &str,
	) -> Option<RequestConstraint> {
		let index = self.index(integration)?;
		let caller = normalize_caller_id(caller);
		let method = method.to_ascii_uppercase();
		let Some(segments) = request_segments(path) else {
			debug!(integration, caller, %method, path, "undecodable request path");
			return None;
		};

		let own = index.get(caller);
		let result = match own.map(|c| scan(&c.rules, &segments, &method)) {
			Some(Scan::Matched(constraint)) => Some((caller, constraint)),
			Some(Scan::PathOnly) => None,
			Some(Scan::Nothing) | None => index
				.get(WILDCARD_CALLER)
				.filter(|_| caller != WILDCARD_CALLER)
				.and_then(|wildcard| match scan(&wildcard.rules, &segments, &method) {
					Scan::Matched(constraint) => Some((WILDCARD_CALLER, constraint)),
					Scan::PathOnly | Scan::Nothing => None,
				}),
		};

		match result {
			Some((matched_as, constraint)) => {
				debug!(
					integration,
					caller,
					matched_as,
					%method,
					path,
					"allowlist rule matched"
				);
				Some(constraint.clone())
			}
			None => {
				debug!(integration, caller, %method, path, "no allowlist rule matched");
				None
			}
		}
	}

	fn index(&self, integration: &str) -> Option<Arc<CallerIndex>> {
		self.entries
			.read()
			.get(&normalize_integration(integration))
			.cloned()
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Checks shared by allowlist and denylist validation.

use std::collections::HashSet;

use http::header::HeaderName;
use http::Method;

use crate::error::{PolicyError, Result};
use crate::path::clean_path;
use crate::types::{normalize_caller_id, normalize_integration, CallRule};

/// Rejects empty and duplicate integration names, returning the normalized names.
pub(crate) fn integration_names<'a, I>(names: I) -> Result<Vec<String>>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut seen = HashSet::new();
	let mut normalized = Vec::new();
	for (index, name) in names.into_iter().enumerate() {
		let key = normalize_integration(name);
		if key.is_empty() {
			return Err(PolicyError::MissingIntegration { index });
		}
		if !seen.insert(key.clone()) {
			return Err(PolicyError::DuplicateIntegration(key));
		}
		normalized.push(key);
	}
	Ok(normalized)
}

/// Rejects caller ids that collide once the empty id is read as `"*"`.
pub(crate) fn unique_callers<'a, I>(integration: &str, ids: I) -> Result<()>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut seen = HashSet::new();
	for id in ids {
		let id = normalize_caller_id(id);
		if !seen.insert(id) {
			return Err(PolicyError::DuplicateCaller {
				integration: integration.to_string(),
				caller: id.to_string(),
			});
		}
	}
	Ok(())
}

/// Validates one caller's rules.
///
/// Every rule needs a path, at least one valid method, and valid header names.
/// With `reject_duplicates`, two rules may not share a cleaned path and
/// upper-cased method.
pub(crate) fn rules(
	integration: &str,
	caller: &str,
	rules: &[CallRule],
	reject_duplicates: bool,
) -> Result<()> {
	let caller = normalize_caller_id(caller);
	let mut seen: HashSet<(String, String)> = HashSet::new();

	for (index, rule) in rules.iter().enumerate() {
		if rule.path.trim().is_empty() {
			return Err(PolicyError::EmptyPath {
				integration: integration.to_string(),
				caller: caller.to_string(),
				rule: index,
			});
		}
		if rule.methods.is_empty() {
			return Err(PolicyError::NoMethods {
				integration: integration.to_string(),
				caller: caller.to_string(),
				rule: index,
				path: rule.path.clone(),
			});
		}

		let path = clean_path(&rule.path);
		for (method, constraint) in &rule.methods {
			let method = method.to_ascii_uppercase();
			if Method::from_bytes(method.as_bytes()).is_err() {
				return Err(PolicyError::InvalidMethod {
					integration: integration.to_string(),
					caller: caller.to_string(),
					rule: index,
					method,
				});
			}

			if let Some(header) = constraint
				.headers
				.keys()
				.find(|h| HeaderName::from_bytes(h.as_bytes()).is_err())
			{
				return Err(PolicyError::InvalidHeaderName {
					integration: integration.to_string(),
					caller: caller.to_string(),
					rule: index,
					header: header.clone(),
				});
			}

			if reject_duplicates && !seen.insert((path.clone(), method.clone())) {
				return Err(PolicyError::DuplicateRule {
					integration: integration.to_string(),
					caller: caller.to_string(),
					rule: index,
					path,
					method,
				});
			}
		}
	}
	Ok(())
}

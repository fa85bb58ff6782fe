// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capabilities shipped with Warden.

use serde_json::{json, Value};

use super::{
	optional_str, optional_str_list, required_str, CapabilityError, CapabilityParams,
	CapabilityRegistry, CapabilitySpec, GLOBAL_INTEGRATION,
};
use crate::types::{CallRule, RequestConstraint};

/// Every method [`http::Method`] names as a constant.
pub const ALL_METHODS: [&str; 9] = [
	"GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "CONNECT", "TRACE",
];

pub fn register_all(registry: &mut CapabilityRegistry) {
	registry.register(
		GLOBAL_INTEGRATION,
		"dangerously_allow_full_access",
		CapabilitySpec::new(&[], full_access),
	);

	registry.register(
		"slack",
		"post_as",
		CapabilitySpec::new(&["channel"], slack_post_as).with_required(&["username"]),
	);
	registry.register(
		"slack",
		"read_channels",
		CapabilitySpec::new(&[], slack_read_channels),
	);

	registry.register(
		"github",
		"read_repo",
		CapabilitySpec::new(&[], github_read_repo).with_required(&["repo"]),
	);
	registry.register(
		"github",
		"comment",
		CapabilitySpec::new(&[], github_comment).with_required(&["repo"]),
	);
	registry.register(
		"github",
		"create_issue",
		CapabilitySpec::new(&["labels"], github_create_issue).with_required(&["repo"]),
	);

	registry.register(
		"openai",
		"chat_completion",
		CapabilitySpec::new(&["model"], openai_chat_completion),
	);
}

fn full_access(_params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	let rule = ALL_METHODS
		.iter()
		.fold(CallRule::new("/**"), |rule, method| {
			rule.with_method(*method, RequestConstraint::default())
		});
	Ok(vec![rule])
}

fn slack_post_as(params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	let username = required_str(params, "username")?;
	let mut constraint =
		RequestConstraint::default().with_body_field("username", Value::from(username));
	if let Some(channel) = optional_str(params, "channel")? {
		constraint = constraint.with_body_field("channel", Value::from(channel));
	}
	Ok(vec![
		CallRule::new("/api/chat.postMessage").with_method("POST", constraint)
	])
}

fn slack_read_channels(_params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	Ok(["/api/conversations.list", "/api/conversations.history"]
		.into_iter()
		.map(|path| CallRule::new(path).with_method("GET", RequestConstraint::default()))
		.collect())
}

fn github_read_repo(params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	let repo = github_repo(params)?;
	// `**` also matches the repository root itself.
	Ok(vec![CallRule::new(format!("/repos/{repo}/**"))
		.with_method("GET", RequestConstraint::default())
		.with_method("HEAD", RequestConstraint::default())])
}

fn github_comment(params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	let repo = github_repo(params)?;
	Ok(vec![CallRule::new(format!("/repos/{repo}/issues/*/comments"))
		.with_method("POST", RequestConstraint::default())])
}

fn github_create_issue(params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	let repo = github_repo(params)?;
	let mut constraint = RequestConstraint::default();
	if let Some(labels) = optional_str_list(params, "labels")? {
		constraint = constraint.with_body_field("labels", json!(labels));
	}
	Ok(vec![
		CallRule::new(format!("/repos/{repo}/issues")).with_method("POST", constraint)
	])
}

fn openai_chat_completion(params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
	let mut constraint = RequestConstraint::default();
	if let Some(model) = optional_str(params, "model")? {
		constraint = constraint.with_body_field("model", Value::from(model));
	}
	Ok(vec![
		CallRule::new("/v1/chat/completions").with_method("POST", constraint)
	])
}

/// Reads `repo` as `owner/name`, rejecting anything that would widen the path.
fn github_repo(params: &CapabilityParams) -> Result<&str, CapabilityError> {
	let repo = required_str(params, "repo")?;
	let segments: Vec<&str> = repo.split('/').collect();
	let valid = segments.len() == 2
		&& segments
			.iter()
			.all(|s| !s.is_empty() && *s != "." && *s != ".." && !s.contains('*'));
	if !valid {
		return Err(CapabilityError::InvalidParam {
			name: "repo".to_string(),
			message: format!("must be in owner/name form, got {repo:?}"),
		});
	}
	Ok(repo)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::path::match_path;

	fn params(value: Value) -> CapabilityParams {
		value.as_object().cloned().unwrap_or_default()
	}

	/// A value accepted by every built-in parameter of the given name.
	fn sample_param(name: &str) -> Value {
		match name {
			"repo" => json!("acme/widgets"),
			"labels" => json!(["bug"]),
			_ => json!("sample"),
		}
	}

	#[test]
	fn test_every_builtin_generates_with_all_params() {
		let registry = CapabilityRegistry::with_builtins();
		for info in registry.capabilities() {
			let spec = registry.lookup(&info.integration, &info.name).unwrap();
			let all: CapabilityParams = spec
				.params()
				.iter()
				.map(|p| (p.clone(), sample_param(p)))
				.collect();
			let rules = spec.generate(&all).unwrap();
			assert!(!rules.is_empty(), "{} produced no rules", info.name);
			for rule in &rules {
				assert!(!rule.methods.is_empty(), "{} rule without methods", info.name);
			}
		}
	}

	#[test]
	fn test_every_builtin_rejects_missing_required_params() {
		let registry = CapabilityRegistry::with_builtins();
		for info in registry.capabilities() {
			let spec = registry.lookup(&info.integration, &info.name).unwrap();
			for missing in spec.required_params() {
				let partial: CapabilityParams = spec
					.params()
					.iter()
					.filter(|p| *p != missing)
					.map(|p| (p.clone(), sample_param(p)))
					.collect();
				assert_eq!(
					spec.generate(&partial).unwrap_err(),
					CapabilityError::MissingParam(missing.clone()),
					"{} accepted missing {}",
					info.name,
					missing
				);
			}
		}
	}

	#[test]
	fn test_full_access_covers_every_method_and_path() {
		let rules = full_access(&CapabilityParams::new()).unwrap();
		assert_eq!(rules.len(), 1);
		assert_eq!(rules[0].methods.len(), ALL_METHODS.len());
		assert!(match_path(&rules[0].path, "/"));
		assert!(match_path(&rules[0].path, "/deeply/nested/path"));
	}

	#[test]
	fn test_slack_post_as_constrains_body() {
		let rules = slack_post_as(&params(json!({"username": "deploy-bot"}))).unwrap();
		let constraint = &rules[0].methods["POST"];
		assert_eq!(constraint.body.get("username"), Some(&json!("deploy-bot")));
		assert!(constraint.body.get("channel").is_none());

		let rules =
			slack_post_as(&params(json!({"username": "deploy-bot", "channel": "C123"}))).unwrap();
		assert_eq!(rules[0].methods["POST"].body.get("channel"), Some(&json!("C123")));
	}

	#[test]
	fn test_github_repo_validation() {
		for bad in ["acme", "acme/", "/widgets", "acme/widgets/extra", "acme/*", "../x"] {
			assert!(
				github_comment(&params(json!({"repo": bad}))).is_err(),
				"accepted {bad}"
			);
		}
		let rules = github_comment(&params(json!({"repo": "acme/widgets"}))).unwrap();
		assert!(match_path(&rules[0].path, "/repos/acme/widgets/issues/42/comments"));
		assert!(!match_path(&rules[0].path, "/repos/acme/other/issues/42/comments"));
	}

	#[test]
	fn test_github_read_repo_includes_root() {
		let rules = github_read_repo(&params(json!({"repo": "acme/widgets"}))).unwrap();
		assert!(match_path(&rules[0].path, "/repos/acme/widgets"));
		assert!(match_path(&rules[0].path, "/repos/acme/widgets/pulls/1"));
		assert!(!rules[0].methods.contains_key("POST"));
	}

	#[test]
	fn test_github_create_issue_labels() {
		let rules = github_create_issue(&params(json!({"repo": "acme/widgets"}))).unwrap();
		assert!(rules[0].methods["POST"].is_empty());

		let rules = github_create_issue(&params(json!({
			"repo": "acme/widgets",
			"labels": ["triage", "bot"],
		})))
		.unwrap();
		assert_eq!(
			rules[0].methods["POST"].body.get("labels"),
			Some(&json!(["triage", "bot"]))
		);

		let err = github_create_issue(&params(json!({"repo": "acme/widgets", "labels": "bug"})))
			.unwrap_err();
		assert!(matches!(err, CapabilityError::InvalidParam { .. }));
	}

	#[test]
	fn test_openai_model_optional() {
		let rules = openai_chat_completion(&CapabilityParams::new()).unwrap();
		assert!(rules[0].methods["POST"].is_empty());
		let rules = openai_chat_completion(&params(json!({"model": "gpt-4o-mini"}))).unwrap();
		assert_eq!(
			rules[0].methods["POST"].body.get("model"),
			Some(&json!("gpt-4o-mini"))
		);
	}
}

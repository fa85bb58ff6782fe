// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capabilities: named, parameterized shortcuts that expand into call rules.
//!
//! Integration authors register a [`CapabilitySpec`] per (integration, name).
//! Allowlist authors then write `{name: "post_as", params: {username: "deploy-bot"}}`
//! instead of hand-writing the path globs and body constraints it stands for.
//!
//! Capabilities registered under [`GLOBAL_INTEGRATION`] are available to every
//! integration. Lookup tries the integration first, then the global set.

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use crate::error::{PolicyError, Result};
use crate::types::{normalize_caller_id, normalize_integration, CallRule, CallerConfig};

/// Integration name under which capabilities apply to every integration.
pub const GLOBAL_INTEGRATION: &str = "*";

/// Parameters passed to a capability.
pub type CapabilityParams = Map<String, Value>;

/// Errors a capability generator reports for unusable parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
	#[error("missing required parameter {0:?}")]
	MissingParam(String),

	#[error("parameter {name:?} {message}")]
	InvalidParam { name: String, message: String },
}

/// Turns capability parameters into concrete rules.
pub trait CapabilityGenerator: Send + Sync {
	fn generate(&self, params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError>;
}

impl<F> CapabilityGenerator for F
where
	F: Fn(&CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> + Send + Sync,
{
	fn generate(&self, params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
		self(params)
	}
}

/// A registered capability: its recognized parameters and its generator.
#[derive(Clone)]
pub struct CapabilitySpec {
	params: Vec<String>,
	required: Vec<String>,
	generator: Arc<dyn CapabilityGenerator>,
}

impl CapabilitySpec {
	/// Creates a spec recognizing `params`, none of them required.
	pub fn new<F>(params: &[&str], generator: F) -> Self
	where
		F: Fn(&CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> + Send + Sync + 'static,
	{
		Self::from_generator(params, generator)
	}

	/// Creates a spec backed by any [`CapabilityGenerator`].
	pub fn from_generator(params: &[&str], generator: impl CapabilityGenerator + 'static) -> Self {
		Self {
			params: params.iter().map(|p| p.to_string()).collect(),
			required: Vec::new(),
			generator: Arc::new(generator),
		}
	}

	/// Marks parameters as required. Required parameters are also recognized.
	pub fn with_required(mut self, required: &[&str]) -> Self {
		for name in required {
			if !self.params.iter().any(|p| p == name) {
				self.params.push(name.to_string());
			}
			self.required.push(name.to_string());
		}
		self
	}

	/// All parameter names the capability accepts, in declaration order.
	pub fn params(&self) -> &[String] {
		&self.params
	}

	/// Parameters the generator rejects when absent.
	pub fn required_params(&self) -> &[String] {
		&self.required
	}

	pub fn accepts(&self, param: &str) -> bool {
		self.params.iter().any(|p| p == param)
	}

	pub fn generate(&self, params: &CapabilityParams) -> Result<Vec<CallRule>, CapabilityError> {
		self.generator.generate(params)
	}
}

impl std::fmt::Debug for CapabilitySpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CapabilitySpec")
			.field("params", &self.params)
			.field("required", &self.required)
			.finish_non_exhaustive()
	}
}

/// Display form of a registered capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInfo {
	pub integration: String,
	pub name: String,
	pub params: Vec<String>,
	pub required: Vec<String>,
}

/// Capabilities by integration and name.
///
/// Populated at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
	specs: HashMap<String, HashMap<String, CapabilitySpec>>,
}

impl CapabilityRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry holding every built-in capability.
	pub fn with_builtins() -> Self {
		let mut registry = Self::new();
		builtin::register_all(&mut registry);
		registry
	}

	/// Registers a capability. A later registration of the same name replaces
	/// the earlier one.
	pub fn register(&mut self, integration: &str, name: &str, spec: CapabilitySpec) {
		self.specs
			.entry(normalize_integration(integration))
			.or_default()
			.insert(name.to_string(), spec);
	}

	/// Finds a capability for the integration, falling back to the global set.
	pub fn lookup(&self, integration: &str, name: &str) -> Option<&CapabilitySpec> {
		let integration = normalize_integration(integration);
		self.specs
			.get(&integration)
			.and_then(|specs| specs.get(name))
			.or_else(|| {
				self.specs
					.get(GLOBAL_INTEGRATION)
					.and_then(|specs| specs.get(name))
			})
	}

	/// Lists every registered capability, sorted by integration then name.
	pub fn capabilities(&self) -> Vec<CapabilityInfo> {
		let mut infos: Vec<CapabilityInfo> = self
			.specs
			.iter()
			.flat_map(|(integration, specs)| {
				specs.iter().map(move |(name, spec)| CapabilityInfo {
					integration: integration.clone(),
					name: name.clone(),
					params: spec.params.clone(),
					required: spec.required.clone(),
				})
			})
			.collect();
		infos.sort_by(|a, b| (&a.integration, &a.name).cmp(&(&b.integration, &b.name)));
		infos
	}

	/// Expands every caller's capabilities into rules appended after its own.
	///
	/// The input is left untouched; the returned callers carry no capabilities.
	/// The first unknown capability, unknown parameter, or generator error
	/// aborts the whole expansion.
	pub fn expand(&self, integration: &str, callers: &[CallerConfig]) -> Result<Vec<CallerConfig>> {
		callers
			.iter()
			.map(|caller| self.expand_caller(integration, caller))
			.collect()
	}

	fn expand_caller(&self, integration: &str, caller: &CallerConfig) -> Result<CallerConfig> {
		let caller_id = normalize_caller_id(&caller.id);
		let mut rules = caller.rules.clone();

		for capability in &caller.capabilities {
			let spec = self.lookup(integration, &capability.name).ok_or_else(|| {
				PolicyError::UnknownCapability {
					integration: integration.to_string(),
					caller: caller_id.to_string(),
					capability: capability.name.clone(),
				}
			})?;

			if let Some(param) = capability.params.keys().find(|p| !spec.accepts(p)) {
				return Err(PolicyError::UnknownCapabilityParam {
					integration: integration.to_string(),
					caller: caller_id.to_string(),
					capability: capability.name.clone(),
					param: param.clone(),
				});
			}

			let generated =
				spec.generate(&capability.params)
					.map_err(|source| PolicyError::CapabilityGeneration {
						integration: integration.to_string(),
						caller: caller_id.to_string(),
						capability: capability.name.clone(),
						source,
					})?;

			trace!(
				integration,
				caller = caller_id,
				capability = %capability.name,
				rules = generated.len(),
				"expanded capability"
			);
			rules.extend(generated);
		}

		Ok(CallerConfig {
			id: caller.id.clone(),
			capabilities: Vec::new(),
			rules,
		})
	}
}

/// Returns a required string parameter.
pub fn required_str<'a>(params: &'a CapabilityParams, name: &str) -> Result<&'a str, CapabilityError> {
	match params.get(name) {
		None | Some(Value::Null) => Err(CapabilityError::MissingParam(name.to_string())),
		Some(Value::String(s)) if s.trim().is_empty() => Err(CapabilityError::InvalidParam {
			name: name.to_string(),
			message: "must not be empty".to_string(),
		}),
		Some(Value::String(s)) => Ok(s),
		Some(_) => Err(CapabilityError::InvalidParam {
			name: name.to_string(),
			message: "must be a string".to_string(),
		}),
	}
}

/// Returns an optional string parameter.
pub fn optional_str<'a>(
	params: &'a CapabilityParams,
	name: &str,
) -> Result<Option<&'a str>, CapabilityError> {
	match params.get(name) {
		None | Some(Value::Null) => Ok(None),
		Some(_) => required_str(params, name).map(Some),
	}
}

/// Returns an optional list-of-strings parameter.
pub fn optional_str_list(
	params: &CapabilityParams,
	name: &str,
) -> Result<Option<Vec<String>>, CapabilityError> {
	let invalid = || CapabilityError::InvalidParam {
		name: name.to_string(),
		message: "must be a list of strings".to_string(),
	};
	match params.get(name) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Array(items)) => items
			.iter()
			.map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
			.collect::<Result<Vec<_>, _>>()
			.map(Some),
		Some(_) => Err(invalid()),
	}
}

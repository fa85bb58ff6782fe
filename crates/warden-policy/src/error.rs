// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for policy configuration.
//!
//! Only configuration problems are errors. A request that does not match any
//! rule is reported through [`crate::Decision`] and never through this type.

use std::path::PathBuf;

use thiserror::Error;

use crate::capability::CapabilityError;

/// Errors raised while validating, expanding, or loading policy configuration.
#[derive(Debug, Error)]
pub enum PolicyError {
	/// An entry did not name its integration.
	#[error("entry {index}: integration name must not be empty")]
	MissingIntegration { index: usize },

	/// The same integration appeared twice in one batch.
	#[error("duplicate integration {0:?}")]
	DuplicateIntegration(String),

	/// Two callers of one integration share an id.
	#[error("integration {integration:?}: duplicate caller {caller:?}")]
	DuplicateCaller { integration: String, caller: String },

	/// A rule has an empty path pattern.
	#[error("integration {integration:?} caller {caller:?} rule {rule}: path must not be empty")]
	EmptyPath {
		integration: String,
		caller: String,
		rule: usize,
	},

	/// A rule declares no methods.
	#[error("integration {integration:?} caller {caller:?} rule {rule} ({path}): no methods declared")]
	NoMethods {
		integration: String,
		caller: String,
		rule: usize,
		path: String,
	},

	/// A rule method is not a valid HTTP method token.
	#[error("integration {integration:?} caller {caller:?} rule {rule}: invalid method {method:?}")]
	InvalidMethod {
		integration: String,
		caller: String,
		rule: usize,
		method: String,
	},

	/// A header constraint names an invalid header.
	#[error("integration {integration:?} caller {caller:?} rule {rule}: invalid header name {header:?}")]
	InvalidHeaderName {
		integration: String,
		caller: String,
		rule: usize,
		header: String,
	},

	/// Two rules of one caller cover the same path and method.
	#[error("integration {integration:?} caller {caller:?} rule {rule}: duplicate rule for {method} {path}")]
	DuplicateRule {
		integration: String,
		caller: String,
		rule: usize,
		path: String,
		method: String,
	},

	/// No capability with this name is registered for the integration or globally.
	#[error("integration {integration:?} caller {caller:?}: unknown capability {capability:?}")]
	UnknownCapability {
		integration: String,
		caller: String,
		capability: String,
	},

	/// A capability was given a parameter it does not declare.
	#[error(
		"integration {integration:?} caller {caller:?} capability {capability:?}: unknown parameter {param:?}"
	)]
	UnknownCapabilityParam {
		integration: String,
		caller: String,
		capability: String,
		param: String,
	},

	/// A capability rejected its parameters.
	#[error("integration {integration:?} caller {caller:?} capability {capability:?}: {source}")]
	CapabilityGeneration {
		integration: String,
		caller: String,
		capability: String,
		#[source]
		source: CapabilityError,
	},

	/// A policy document could not be read.
	#[error("failed to read policy file {}: {source}", .path.display())]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// A JSON policy document could not be decoded.
	#[error("invalid JSON policy document: {0}")]
	Json(#[from] serde_json::Error),

	/// A YAML policy document could not be decoded.
	#[error("invalid YAML policy document: {0}")]
	Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = PolicyError> = std::result::Result<T, E>;

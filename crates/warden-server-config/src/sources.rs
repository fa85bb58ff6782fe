// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files, and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::WardenConfigLayer;
use crate::sections::{LogFormat, LoggingConfigLayer, PolicyConfigLayer};

/// Default location of the server config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/warden/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WardenConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WardenConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WardenConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WardenConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WARDEN_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_env_layer(&|name| std::env::var(name).ok())
	}
}

type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

fn load_env_layer(lookup: &Lookup<'_>) -> Result<WardenConfigLayer, ConfigError> {
	Ok(WardenConfigLayer {
		policy: Some(load_policy_from_env(lookup)?),
		logging: Some(load_logging_from_env(lookup)?),
	})
}

fn env_var(lookup: &Lookup<'_>, name: &str) -> Option<String> {
	lookup(name).filter(|s| !s.is_empty())
}

fn env_usize(lookup: &Lookup<'_>, name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(lookup, name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_policy_from_env(lookup: &Lookup<'_>) -> Result<PolicyConfigLayer, ConfigError> {
	Ok(PolicyConfigLayer {
		allowlist_path: env_var(lookup, "WARDEN_ALLOWLIST_PATH").map(PathBuf::from),
		denylist_path: env_var(lookup, "WARDEN_DENYLIST_PATH").map(PathBuf::from),
		max_body_bytes: env_usize(lookup, "WARDEN_MAX_BODY_BYTES")?,
	})
}

fn load_logging_from_env(lookup: &Lookup<'_>) -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var(lookup, "WARDEN_LOG_FORMAT") {
		Some(v) => Some(v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
			key: "WARDEN_LOG_FORMAT".to_string(),
			message,
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var(lookup, "WARDEN_LOG_LEVEL"),
		format,
	})
}

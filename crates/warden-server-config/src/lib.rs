// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the Warden proxy.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARDEN_*`)
//!
//! # Usage
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("allowlist: {:?}", config.policy.allowlist_path);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WardenConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WardenConfig {
	pub policy: PolicyConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_*`)
/// 2. Config file (`/etc/warden/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<WardenConfig, ConfigError> {
	let mut merged = WardenConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<WardenConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WardenConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: WardenConfigLayer) -> Result<WardenConfig, ConfigError> {
	let config = WardenConfig {
		policy: layer.policy.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		allowlist = ?config.policy.allowlist_path,
		denylist = ?config.policy.denylist_path,
		max_body_bytes = config.policy.max_body_bytes,
		log_level = %config.logging.level,
		log_format = %config.logging.format,
		"Warden configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &WardenConfig) -> Result<(), ConfigError> {
	if config.policy.max_body_bytes == 0 {
		return Err(ConfigError::Validation(
			"policy.max_body_bytes must be greater than zero".to_string(),
		));
	}

	if config.policy.denylist_path.is_some() && config.policy.allowlist_path.is_none() {
		return Err(ConfigError::Validation(
			"policy.denylist_path is set without policy.allowlist_path. \
			 A denylist only narrows what an allowlist grants."
				.to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::path::PathBuf;

	#[test]
	fn test_defaults() {
		let config = finalize(WardenConfigLayer::default()).unwrap();
		assert_eq!(config, WardenConfig::default());
		assert_eq!(config.policy.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
		assert_eq!(config.logging.format, LogFormat::Pretty);
	}

	#[test]
	fn test_zero_body_limit_rejected() {
		let mut config = WardenConfig::default();
		config.policy.max_body_bytes = 0;
		let err = validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("max_body_bytes"));
	}

	#[test]
	fn test_denylist_requires_allowlist() {
		let mut config = WardenConfig::default();
		config.policy.denylist_path = Some(PathBuf::from("/etc/warden/denylist.yaml"));
		assert!(validate_config(&config).is_err());

		config.policy.allowlist_path = Some(PathBuf::from("/etc/warden/allowlist.yaml"));
		assert!(validate_config(&config).is_ok());
	}

	#[test]
	fn test_load_config_with_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			"[policy]\nallowlist_path = \"/srv/allow.yaml\"\nmax_body_bytes = 65536\n\n[logging]\nformat = \"json\"\n"
		)
		.unwrap();

		let config = load_config_with_file(file.path()).unwrap();
		assert_eq!(config.policy.allowlist_path, Some(PathBuf::from("/srv/allow.yaml")));
		assert_eq!(config.policy.max_body_bytes, 65536);
		assert_eq!(config.logging.format, LogFormat::Json);
		assert_eq!(config.logging.level, "info");
	}

	#[test]
	fn test_invalid_file_values_fail_validation() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[policy]\nmax_body_bytes = 0\n").unwrap();
		assert!(matches!(
			load_config_with_file(file.path()),
			Err(ConfigError::Validation(_))
		));
	}
}

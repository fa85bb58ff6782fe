// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_server_config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init(config: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| config.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Pretty => registry
			.with(fmt::layer().with_writer(std::io::stderr))
			.init(),
		LogFormat::Json => registry
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init(),
	}
}

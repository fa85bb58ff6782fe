// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod capabilities;
pub mod check;
pub mod lint;

pub use capabilities::{handle_capabilities, CapabilitiesArgs};
pub use check::{handle_check, CheckArgs};
pub use lint::{handle_lint, LintArgs};

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use warden_server_config::PolicyConfig;

/// Policy document locations. Flags override the server config.
#[derive(Debug, Clone, Default, Args)]
pub struct PolicyFiles {
	/// Allowlist document (JSON or YAML)
	#[arg(long)]
	pub allowlist: Option<PathBuf>,

	/// Denylist document (JSON or YAML)
	#[arg(long)]
	pub denylist: Option<PathBuf>,
}

impl PolicyFiles {
	/// Returns the allowlist path and the optional denylist path.
	pub fn resolve(&self, config: &PolicyConfig) -> anyhow::Result<(PathBuf, Option<PathBuf>)> {
		let allowlist = self
			.allowlist
			.clone()
			.or_else(|| config.allowlist_path.clone())
			.context("no allowlist given: pass --allowlist or set policy.allowlist_path")?;
		let denylist = self
			.denylist
			.clone()
			.or_else(|| config.denylist_path.clone());
		Ok((allowlist, denylist))
	}
}

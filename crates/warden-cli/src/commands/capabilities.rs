// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;

use clap::Args;
use serde_json::json;
use warden_policy::{CapabilityInfo, CapabilityRegistry, GLOBAL_INTEGRATION};

#[derive(Debug, Clone, Default, Args)]
pub struct CapabilitiesArgs {
	/// Only list capabilities usable by this integration (global ones included)
	#[arg(long)]
	pub integration: Option<String>,

	/// Print JSON instead of a table
	#[arg(long)]
	pub json: bool,
}

pub fn handle_capabilities(args: &CapabilitiesArgs, out: &mut impl Write) -> anyhow::Result<()> {
	let all = CapabilityRegistry::with_builtins().capabilities();
	let wanted = args.integration.as_deref().map(|i| i.trim().to_lowercase());
	let capabilities: Vec<&CapabilityInfo> = all
		.iter()
		.filter(|info| match &wanted {
			None => true,
			// Global capabilities apply unless the integration shadows the name.
			Some(integration) => {
				info.integration == *integration
					|| (info.integration == GLOBAL_INTEGRATION
						&& !all
							.iter()
							.any(|other| other.integration == *integration && other.name == info.name))
			}
		})
		.collect();

	if args.json {
		let items: Vec<_> = capabilities
			.iter()
			.map(|info| {
				json!({
					"integration": info.integration,
					"name": info.name,
					"params": info.params,
					"required": info.required,
				})
			})
			.collect();
		writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
		return Ok(());
	}

	for info in capabilities {
		let params: Vec<String> = info
			.params
			.iter()
			.map(|p| {
				if info.required.contains(p) {
					format!("{p}*")
				} else {
					p.clone()
				}
			})
			.collect();
		writeln!(
			out,
			"{:<8} {:<32} {}",
			info.integration,
			info.name,
			params.join(", ")
		)?;
	}
	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `warden`: lint policy documents, evaluate requests against them, and list
//! the capabilities policies may use.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use warden_server_config::WardenConfig;

mod commands;
mod logging;

use commands::{CapabilitiesArgs, CheckArgs, LintArgs};

/// Exit code for a request that was evaluated and not allowed.
const EXIT_NOT_ALLOWED: u8 = 1;
/// Exit code for configuration, document, or usage errors.
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "warden", about = "Warden policy tooling", version)]
struct Args {
	/// Server config file (TOML); defaults to /etc/warden/server.toml
	#[arg(long, global = true, env = "WARDEN_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Validate allowlist and denylist documents
	Lint(LintArgs),
	/// Evaluate a single request against the policy documents
	Check(CheckArgs),
	/// List the capabilities policies may reference
	Capabilities(CapabilitiesArgs),
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<WardenConfig> {
	match path {
		Some(path) => warden_server_config::load_config_with_file(path)
			.with_context(|| format!("loading config from {}", path.display())),
		None => warden_server_config::load_config().context("loading config"),
	}
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
	let config = load_config(args.config.as_ref())?;
	logging::init(&config.logging);

	let mut out = io::stdout().lock();
	match args.command {
		Command::Lint(lint) => {
			commands::handle_lint(&lint, &config, &mut out)?;
			Ok(ExitCode::SUCCESS)
		}
		Command::Check(check) => {
			let decision = commands::handle_check(&check, &config, &mut out)?;
			if decision.is_allowed() {
				Ok(ExitCode::SUCCESS)
			} else {
				Ok(ExitCode::from(EXIT_NOT_ALLOWED))
			}
		}
		Command::Capabilities(capabilities) => {
			commands::handle_capabilities(&capabilities, &mut out)?;
			Ok(ExitCode::SUCCESS)
		}
	}
}

fn main() -> ExitCode {
	let args = Args::parse();
	match run(args) {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:#}");
			ExitCode::from(EXIT_ERROR)
		}
	}
}

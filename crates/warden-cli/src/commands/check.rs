// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Args;
use http::header::CONTENT_TYPE;
use http::Request;
use tracing::{debug, instrument};
use warden_policy::{BufferedBody, Decision, PolicyEngine};
use warden_server_config::WardenConfig;

use super::PolicyFiles;

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
	#[command(flatten)]
	pub files: PolicyFiles,

	/// Integration the request is sent to
	#[arg(long)]
	pub integration: String,

	/// Authenticated caller id (empty means the wildcard caller)
	#[arg(long, default_value = "")]
	pub caller: String,

	/// HTTP method
	#[arg(long, default_value = "GET")]
	pub method: String,

	/// Request path, optionally with a query string
	#[arg(long)]
	pub path: String,

	/// Request header as 'Name: value' (repeatable)
	#[arg(long = "header", value_name = "HEADER")]
	pub headers: Vec<String>,

	/// Content-Type of the body
	#[arg(long)]
	pub content_type: Option<String>,

	/// Request body
	#[arg(long, conflicts_with = "body_file")]
	pub body: Option<String>,

	/// File holding the request body
	#[arg(long)]
	pub body_file: Option<PathBuf>,

	/// Body size limit; defaults to policy.max_body_bytes
	#[arg(long)]
	pub max_body_bytes: Option<usize>,
}

/// Evaluates one request and prints the decision.
#[instrument(skip_all, fields(integration = %args.integration, caller = %args.caller))]
pub fn handle_check(
	args: &CheckArgs,
	config: &WardenConfig,
	out: &mut impl Write,
) -> anyhow::Result<Decision> {
	let (allowlist, denylist) = args.files.resolve(&config.policy)?;

	let engine = PolicyEngine::with_builtins();
	engine
		.load_files(&allowlist, denylist.as_deref())
		.context("loading policy documents")?;

	let limit = args.max_body_bytes.unwrap_or(config.policy.max_body_bytes);
	let request = build_request(args, limit)?;
	let decision = engine.authorize(&args.integration, &args.caller, &request);
	debug!(%decision, "evaluated request");

	writeln!(out, "{decision}")?;
	Ok(decision)
}

fn build_request(args: &CheckArgs, limit: usize) -> anyhow::Result<Request<BufferedBody>> {
	let body = match (&args.body, &args.body_file) {
		(Some(body), _) => body.clone().into_bytes(),
		(None, Some(path)) => std::fs::read(path)
			.with_context(|| format!("reading body from {}", path.display()))?,
		(None, None) => Vec::new(),
	};

	let mut builder = Request::builder()
		.method(args.method.to_ascii_uppercase().as_str())
		.uri(&args.path);
	for header in &args.headers {
		let (name, value) = header
			.split_once(':')
			.ok_or_else(|| anyhow!("header {header:?} is not in 'Name: value' form"))?;
		builder = builder.header(name.trim(), value.trim());
	}
	if let Some(content_type) = &args.content_type {
		builder = builder.header(CONTENT_TYPE, content_type.as_str());
	}

	builder
		.body(BufferedBody::new(body, limit))
		.context("building request")
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;

use anyhow::Context;
use clap::Args;
use tracing::{info, instrument};
use warden_policy::{
	load_allowlist_file, load_denylist_file, validate_allowlist_entries,
	validate_denylist_entries, CapabilityRegistry,
};
use warden_server_config::WardenConfig;

use super::PolicyFiles;

#[derive(Debug, Clone, Args)]
pub struct LintArgs {
	#[command(flatten)]
	pub files: PolicyFiles,
}

/// Validates both documents and prints what each integration declares.
#[instrument(skip_all)]
pub fn handle_lint(args: &LintArgs, config: &WardenConfig, out: &mut impl Write) -> anyhow::Result<()> {
	let (allowlist_path, denylist_path) = args.files.resolve(&config.policy)?;
	let registry = CapabilityRegistry::with_builtins();

	let entries = load_allowlist_file(&allowlist_path)?;
	validate_allowlist_entries(&registry, &entries)
		.with_context(|| format!("invalid allowlist {}", allowlist_path.display()))?;

	writeln!(out, "{}: ok", allowlist_path.display())?;
	for entry in &entries {
		let rules: usize = entry.callers.iter().map(|c| c.rules.len()).sum();
		let capabilities: usize = entry.callers.iter().map(|c| c.capabilities.len()).sum();
		writeln!(
			out,
			"  allowlist {}: {} callers, {rules} rules, {capabilities} capabilities",
			entry.integration,
			entry.callers.len()
		)?;
	}

	if let Some(denylist_path) = denylist_path {
		let entries = load_denylist_file(&denylist_path)?;
		validate_denylist_entries(&entries)
			.with_context(|| format!("invalid denylist {}", denylist_path.display()))?;

		writeln!(out, "{}: ok", denylist_path.display())?;
		for entry in &entries {
			let rules: usize = entry.callers.iter().map(|c| c.rules.len()).sum();
			writeln!(
				out,
				"  denylist {}: {} callers, {rules} rules",
				entry.integration,
				entry.callers.len()
			)?;
		}
	}

	info!(allowlist = %allowlist_path.display(), "policy documents are valid");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::{Path, PathBuf};
	use tempfile::TempDir;

	fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
		let path = dir.path().join(name);
		std::fs::write(&path, content).unwrap();
		path
	}

	fn lint(allowlist: &Path, denylist: Option<&Path>) -> anyhow::Result<String> {
		let args = LintArgs {
			files: PolicyFiles {
				allowlist: Some(allowlist.to_path_buf()),
				denylist: denylist.map(Path::to_path_buf),
			},
		};
		let mut out = Vec::<u8>::new();
		handle_lint(&args, &WardenConfig::default(), &mut out)?;
		Ok(String::from_utf8(out).unwrap())
	}

	#[test]
	fn test_lint_valid_documents() {
		let dir = tempfile::tempdir().unwrap();
		let allow = write(
			&dir,
			"allow.yaml",
			"- integration: github\n  callers:\n    - id: ci\n      capabilities:\n        - name: read_repo\n          params: {repo: acme/widgets}\n",
		);
		let deny = write(
			&dir,
			"deny.json",
			r#"[{"integration": "github", "callers": [{"id": "*", "rules": [{"path": "/**", "methods": {"DELETE": {}}}]}]}]"#,
		);

		let output = lint(&allow, Some(&deny)).unwrap();
		assert!(output.contains("allowlist github: 1 callers, 0 rules, 1 capabilities"));
		assert!(output.contains("denylist github: 1 callers, 1 rules"));
	}

	#[test]
	fn test_lint_reports_invalid_allowlist() {
		let dir = tempfile::tempdir().unwrap();
		let allow = write(
			&dir,
			"allow.json",
			r#"[{"integration": "github", "callers": [{"id": "ci", "capabilities": [{"name": "fly"}]}]}]"#,
		);
		let err = lint(&allow, None).unwrap_err();
		let message = format!("{err:#}");
		assert!(message.contains("invalid allowlist"));
		assert!(message.contains("fly"));
	}

	#[test]
	fn test_lint_reports_invalid_denylist() {
		let dir = tempfile::tempdir().unwrap();
		let allow = write(&dir, "allow.json", "[]");
		let deny = write(
			&dir,
			"deny.yaml",
			"- integration: github\n  callers:\n    - id: ci\n      rules:\n        - path: /x\n          methods: {}\n",
		);
		let err = lint(&allow, Some(&deny)).unwrap_err();
		assert!(format!("{err:#}").contains("no methods"));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Combined allow/deny evaluation.
//!
//! [`PolicyEngine::authorize`] runs the three stages in order:
//!
//! 1. **Allowlist**: find the constraint for the caller, path and method
//! 2. **Constraint**: the request must satisfy that constraint
//! 3. **Denylist**: any matching deny rule overrides the allow
//!
//! Decisions never surface errors. Anything that prevents a positive match is
//! a [`Decision::NotAllowed`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::Request;
use tracing::{debug, info, instrument, warn};

use crate::allowlist::{build_allowlist_map, AllowlistStore};
use crate::body::BodyReader;
use crate::capability::CapabilityRegistry;
use crate::constraint::constraint_matches_request;
use crate::denylist::{build_denylist_map, DenylistStore};
use crate::document::{load_allowlist_file, load_denylist_file};
use crate::error::Result;
use crate::types::{AllowlistEntry, DenylistEntry};

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	Allow,
	/// No allowlist rule matched, or the matched constraint was not satisfied.
	NotAllowed,
	/// Allowed by the allowlist but blocked by a deny rule.
	Denied { reason: String },
}

impl Decision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allow)
	}
}

impl fmt::Display for Decision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Decision::Allow => write!(f, "allow"),
			Decision::NotAllowed => write!(f, "not allowed"),
			Decision::Denied { reason } => write!(f, "denied: {reason}"),
		}
	}
}

/// The allowlist and denylist stores behind one entry point.
#[derive(Debug)]
pub struct PolicyEngine {
	registry: Arc<CapabilityRegistry>,
	allowlist: AllowlistStore,
	denylist: DenylistStore,
}

impl PolicyEngine {
	/// Creates an engine with empty stores. An empty engine allows nothing.
	pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
		Self {
			allowlist: AllowlistStore::new(Arc::clone(&registry)),
			denylist: DenylistStore::new(),
			registry,
		}
	}

	/// Creates an engine backed by the built-in capabilities.
	pub fn with_builtins() -> Self {
		Self::new(Arc::new(CapabilityRegistry::with_builtins()))
	}

	pub fn registry(&self) -> &Arc<CapabilityRegistry> {
		&self.registry
	}

	pub fn allowlist(&self) -> &AllowlistStore {
		&self.allowlist
	}

	pub fn denylist(&self) -> &DenylistStore {
		&self.denylist
	}

	/// Decides whether `caller` may send `req` to `integration`.
	#[instrument(
		level = "debug",
		skip(self, req),
		fields(method = %req.method(), path = %req.uri().path())
	)]
	pub fn authorize<B: BodyReader>(
		&self,
		integration: &str,
		caller: &str,
		req: &Request<B>,
	) -> Decision {
		let Some(constraint) = self.allowlist.find_constraint(
			integration,
			caller,
			req.uri().path(),
			req.method().as_str(),
		) else {
			return Decision::NotAllowed;
		};

		if !constraint_matches_request(req, &constraint) {
			debug!("request does not satisfy allowlist constraint");
			return Decision::NotAllowed;
		}

		match self.denylist.match_request(integration, caller, req) {
			Some(reason) => Decision::Denied { reason },
			None => Decision::Allow,
		}
	}

	/// Replaces both stores with the given entries.
	///
	/// Both lists are validated before either store changes. On error both
	/// stores keep their previous contents.
	pub fn reload(&self, allow: &[AllowlistEntry], deny: &[DenylistEntry]) -> Result<()> {
		let built = build_allowlist_map(&self.registry, allow)
			.and_then(|allowlist| build_denylist_map(deny).map(|denylist| (allowlist, denylist)));

		match built {
			Ok((allowlist, denylist)) => {
				self.allowlist.replace(allowlist);
				self.denylist.replace(denylist);
				info!(
					allow_entries = allow.len(),
					deny_entries = deny.len(),
					"policy reloaded"
				);
				Ok(())
			}
			Err(e) => {
				warn!(error = %e, "policy reload rejected, keeping previous policy");
				Err(e)
			}
		}
	}

	/// Reads the policy documents and reloads from them.
	///
	/// Without a denylist path the denylist is emptied.
	pub fn load_files(&self, allowlist: &Path, denylist: Option<&Path>) -> Result<()> {
		let allow = load_allowlist_file(allowlist)?;
		let deny = match denylist {
			Some(path) => load_denylist_file(path)?,
			None => Vec::new(),
		};
		self.reload(&allow, &deny)
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization policy engine for the Warden proxy.
//!
//! Callers reach Warden with an already-authenticated identity. This crate
//! decides which backend paths, methods, and payloads that identity may reach
//! for a given integration:
//!
//! - [`AllowlistStore`]: the positive source of truth, per integration and caller
//! - [`DenylistStore`]: an independent override evaluated after the allowlist
//! - [`CapabilityRegistry`]: named, parameterized shortcuts that expand into rules
//! - [`match_path`] / [`constraint_matches_request`]: the pure matching primitives
//! - [`PolicyEngine`]: bundles the above into a single allow/deny decision
//!
//! # Evaluation Flow
//!
//! ```text
//! Request → AllowlistStore::find_constraint ──none──→ NotAllowed
//!                     │
//!                constraint
//!                     │
//!          constraint_matches_request ──false──→ NotAllowed
//!                     │
//!          DenylistStore::match_request ──reason──→ Denied
//!                     │
//!                   Allow
//! ```
//!
//! # Example
//!
//! ```
//! use warden_policy::{AllowlistEntry, BufferedBody, CallRule, CallerConfig, Decision, PolicyEngine, RequestConstraint};
//!
//! let engine = PolicyEngine::with_builtins();
//! let entries = vec![AllowlistEntry::new(
//!     "github",
//!     vec![CallerConfig::new("ci-bot").with_rule(
//!         CallRule::new("/repos/acme/*/pulls").with_method("GET", RequestConstraint::default()),
//!     )],
//! )];
//! engine.reload(&entries, &[]).unwrap();
//!
//! let request = http::Request::get("/repos/acme/widgets/pulls")
//!     .body(BufferedBody::empty())
//!     .unwrap();
//! assert_eq!(engine.authorize("github", "ci-bot", &request), Decision::Allow);
//! ```

pub mod allowlist;
pub mod body;
pub mod capability;
pub mod constraint;
pub mod denylist;
pub mod document;
pub mod engine;
pub mod error;
pub mod path;
pub mod types;
mod validate;

pub use allowlist::{
	build_allowlist_map, validate_allowlist_entries, AllowlistMap, AllowlistStore, CallerIndex,
};
pub use body::{BodyError, BodyReader, BufferedBody, LazyBody, DEFAULT_MAX_BODY_BYTES};
pub use capability::{
	CapabilityError, CapabilityGenerator, CapabilityInfo, CapabilityParams, CapabilityRegistry,
	CapabilitySpec, GLOBAL_INTEGRATION,
};
pub use constraint::{constraint_matches_request, match_value};
pub use denylist::{
	build_denylist_map, validate_denylist_entries, DenyIndex, DenylistMap, DenylistStore,
};
pub use document::{
	load_allowlist_file, load_denylist_file, parse_allowlist, parse_denylist, DocumentFormat,
};
pub use engine::{Decision, PolicyEngine};
pub use error::{PolicyError, Result};
pub use path::{clean_segments, match_path, match_segments, request_segments};
pub use types::{
	AllowlistEntry, CallRule, CallerConfig, CapabilityConfig, DenylistCaller, DenylistEntry,
	RequestConstraint, WILDCARD_CALLER,
};

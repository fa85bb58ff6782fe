// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Segment-wise path globbing.
//!
//! Patterns are split on `/` and compared segment by segment:
//!
//! - `*` matches exactly one segment
//! - `**` matches everything from its position to the end, including nothing
//! - anything else must equal the path segment exactly
//!
//! There is no backtracking and no in-segment globbing, so a pattern reads the
//! same way it matches.
//!
//! Rule patterns are literal. Request paths arrive percent-encoded and go
//! through [`request_segments`], which decodes them the way the upstream will
//! before any segment is compared.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Cleans a path and splits it into segments.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment,
/// so `/a//b/./c/../` yields `["a", "b"]`.
pub fn clean_segments(path: &str) -> Vec<String> {
	fold_segments(path.split('/').map(Cow::Borrowed))
}

/// Percent-decodes a request path and splits it into cleaned segments.
///
/// Each segment is decoded before `.` and `..` are folded, so
/// `/a/b/%2e%2e/c` cleans to `["a", "c"]`. Returns `None` when a segment is not
/// UTF-8 once decoded, or decodes to something containing `/` (`%2F`).
pub fn request_segments(path: &str) -> Option<Vec<String>> {
	let mut decoded = Vec::new();
	for raw in path.split('/') {
		let segment = percent_decode_str(raw).decode_utf8().ok()?;
		if segment.contains('/') {
			return None;
		}
		decoded.push(segment);
	}
	Some(fold_segments(decoded))
}

fn fold_segments<'a>(raw: impl IntoIterator<Item = Cow<'a, str>>) -> Vec<String> {
	let mut segments: Vec<String> = Vec::new();
	for segment in raw {
		match &*segment {
			"" | "." => {}
			".." => {
				segments.pop();
			}
			_ => segments.push(segment.into_owned()),
		}
	}
	segments
}

/// Returns the cleaned, `/`-rooted form of a path.
pub(crate) fn clean_path(path: &str) -> String {
	format!("/{}", clean_segments(path).join("/"))
}

/// Matches a path against a pattern after cleaning both.
pub fn match_path(pattern: &str, path: &str) -> bool {
	match_segments(&clean_segments(pattern), &clean_segments(path))
}

/// Matches pre-split path segments against pre-split pattern segments.
pub fn match_segments<P: AsRef<str>, S: AsRef<str>>(pattern: &[P], path: &[S]) -> bool {
	let Some((head, pattern_rest)) = pattern.split_first() else {
		return path.is_empty();
	};

	let head = head.as_ref();
	if head == "**" {
		return true;
	}

	match path.split_first() {
		Some((segment, path_rest)) => {
			(head == "*" || head == segment.as_ref()) && match_segments(pattern_rest, path_rest)
		}
		None => false,
	}
}

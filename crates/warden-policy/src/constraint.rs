// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request constraint matching.
//!
//! A [`RequestConstraint`] is satisfied when every required header value,
//! every required query value, and the body subset are all present in the
//! request. Anything that prevents checking (an unreadable body, malformed
//! JSON, an unsupported content type) counts as not satisfied.

use std::collections::{BTreeMap, HashMap};

use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, Request};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::body::BodyReader;
use crate::types::RequestConstraint;

const JSON_MEDIA_TYPE: &str = "application/json";
const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Returns true if the request satisfies every part of the constraint.
pub fn constraint_matches_request<B: BodyReader>(
	req: &Request<B>,
	constraint: &RequestConstraint,
) -> bool {
	if constraint.is_empty() {
		return true;
	}

	if !headers_match(req.headers(), &constraint.headers) {
		return false;
	}

	if !query_matches(req.uri().query(), &constraint.query) {
		return false;
	}

	if constraint.body.is_empty() {
		return true;
	}

	body_matches(req, &constraint.body)
}

fn headers_match(headers: &HeaderMap, required: &BTreeMap<String, Vec<String>>) -> bool {
	required.iter().all(|(name, wanted)| {
		let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
			return false;
		};
		let present: Vec<&[u8]> = headers.get_all(&name).iter().map(|v| v.as_bytes()).collect();
		!present.is_empty()
			&& wanted
				.iter()
				.all(|want| present.iter().any(|have| *have == want.as_bytes()))
	})
}

fn query_matches(query: Option<&str>, required: &BTreeMap<String, Vec<String>>) -> bool {
	if required.is_empty() {
		return true;
	}
	let Some(params) = parse_urlencoded(query.unwrap_or_default().as_bytes()) else {
		return false;
	};
	required.iter().all(|(name, wanted)| match params.get(name) {
		Some(values) => wanted.iter().all(|want| values.contains(want)),
		None => false,
	})
}

fn body_matches<B: BodyReader>(req: &Request<B>, required: &Map<String, Value>) -> bool {
	let body = match req.body().read_body() {
		Ok(body) => body,
		Err(e) => {
			debug!(error = %e, "request body unavailable for constraint");
			return false;
		}
	};

	match media_type(req.headers()).as_deref() {
		Some(JSON_MEDIA_TYPE) => match serde_json::from_slice::<Value>(&body) {
			Ok(Value::Object(data)) => match_object(&data, required),
			Ok(_) => false,
			Err(e) => {
				debug!(error = %e, "request body is not valid JSON");
				false
			}
		},
		Some(FORM_MEDIA_TYPE) => match parse_urlencoded(&body) {
			Some(form) => form_matches(&form, required),
			None => {
				debug!("request body is not valid form encoding");
				false
			}
		},
		other => {
			debug!(content_type = ?other, "body constraint on unsupported content type");
			false
		}
	}
}

/// Lower-cased media type of the request, without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
	let media = value.split(';').next().unwrap_or_default().trim();
	Some(media.to_ascii_lowercase())
}

/// Returns true if `data` structurally contains `want`.
///
/// Objects match when every key of `want` is present in `data` and matches
/// recursively. Arrays match when every element of `want` matches some element
/// of `data`, in any order. Numbers compare by value across integer and float
/// representations; every other scalar compares exactly.
pub fn match_value(data: &Value, want: &Value) -> bool {
	match (want, data) {
		(Value::Object(want), Value::Object(data)) => match_object(data, want),
		(Value::Array(want), Value::Array(data)) => want
			.iter()
			.all(|w| data.iter().any(|d| match_value(d, w))),
		(Value::Number(want), Value::Number(data)) => numbers_equal(data, want),
		(Value::Object(_), _) | (Value::Array(_), _) | (Value::Number(_), _) => false,
		(want, data) => want == data,
	}
}

fn match_object(data: &Map<String, Value>, want: &Map<String, Value>) -> bool {
	want.iter().all(|(key, w)| match data.get(key) {
		Some(d) => match_value(d, w),
		None => false,
	})
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
	if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
		return a == b;
	}
	if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
		return a == b;
	}
	match (a.as_f64(), b.as_f64()) {
		(Some(a), Some(b)) => a == b,
		_ => false,
	}
}

fn form_matches(form: &HashMap<String, Vec<String>>, want: &Map<String, Value>) -> bool {
	want.iter().all(|(key, w)| {
		let Some(values) = form.get(key) else {
			return false;
		};
		match w {
			Value::String(s) => values.contains(s),
			Value::Array(items) => items.iter().all(|item| match item.as_str() {
				Some(s) => values.iter().any(|v| v == s),
				None => false,
			}),
			_ => false,
		}
	})
}

/// Parses `application/x-www-form-urlencoded` data into repeated values.
///
/// Returns `None` for invalid UTF-8 or a malformed percent escape.
fn parse_urlencoded(input: &[u8]) -> Option<HashMap<String, Vec<String>>> {
	if !is_well_formed_urlencoded(input) {
		return None;
	}
	let mut params: HashMap<String, Vec<String>> = HashMap::new();
	for (key, value) in url::form_urlencoded::parse(input) {
		params
			.entry(key.into_owned())
			.or_default()
			.push(value.into_owned());
	}
	Some(params)
}

fn is_well_formed_urlencoded(input: &[u8]) -> bool {
	if std::str::from_utf8(input).is_err() {
		return false;
	}
	let mut i = 0;
	while i < input.len() {
		if input[i] == b'%' {
			let escape = input.get(i + 1..i + 3);
			if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
				return false;
			}
			i += 3;
		} else {
			i += 1;
		}
	}
	true
}

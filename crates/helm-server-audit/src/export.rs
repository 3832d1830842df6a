// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CSV export formatting.
//!
//! The exporter produces strict CSV: every field is wrapped in double
//! quotes with embedded quotes doubled, so field values containing commas,
//! quotes or line breaks survive the round trip through spreadsheet
//! tooling. The caller decides how to deliver the resulting string.

use crate::event::AuditLogEntry;

/// Hard cap on exported rows, applied regardless of any caller-supplied
/// query limit.
pub const EXPORT_ROW_CAP: i64 = 10_000;

/// Fixed column order for exports.
pub const EXPORT_COLUMNS: [&str; 8] = [
	"timestamp",
	"action_type",
	"severity",
	"user_id",
	"target_user_id",
	"target_resource_type",
	"description",
	"ip_address",
];

/// Quote-escape a single field value.
///
/// Embedded `"` characters are doubled and the whole value is wrapped in
/// quotes. Applied to every field, so delimiters and newlines inside a
/// value never break the row structure.
pub fn escape_csv_field(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len() + 2);
	escaped.push('"');
	for c in value.chars() {
		if c == '"' {
			escaped.push('"');
		}
		escaped.push(c);
	}
	escaped.push('"');
	escaped
}

/// Format one entry as a CSV row. Missing optional fields render as empty
/// (quoted) strings.
pub fn format_csv_row(entry: &AuditLogEntry) -> String {
	let fields = [
		entry.timestamp.to_rfc3339(),
		entry.action_type.to_string(),
		entry.severity.to_string(),
		entry.user_id.to_string(),
		entry
			.target_user_id
			.map(|u| u.to_string())
			.unwrap_or_default(),
		entry.target_resource_type.clone().unwrap_or_default(),
		entry.description.clone(),
		entry.ip_address.clone().unwrap_or_default(),
	];

	fields
		.iter()
		.map(|f| escape_csv_field(f))
		.collect::<Vec<_>>()
		.join(",")
}

/// Serialize entries to a CSV document with a header row.
pub fn format_csv(entries: &[AuditLogEntry]) -> String {
	let mut out = String::new();
	out.push_str(
		&EXPORT_COLUMNS
			.iter()
			.map(|c| escape_csv_field(c))
			.collect::<Vec<_>>()
			.join(","),
	);
	out.push('\n');
	for entry in entries {
		out.push_str(&format_csv_row(entry));
		out.push('\n');
	}
	out
}

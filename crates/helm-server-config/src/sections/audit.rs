// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit logging configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_RETENTION_DAYS: i64 = 90;
const DEFAULT_QUERY_LIMIT: i64 = 100;
const DEFAULT_EXPORT_ROW_CAP: i64 = 10_000;

/// Audit configuration (runtime, fully resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
	pub enabled: bool,
	pub retention_days: i64,
	pub query_limit: i64,
	pub export_row_cap: i64,
}

impl Default for AuditConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			retention_days: DEFAULT_RETENTION_DAYS,
			query_limit: DEFAULT_QUERY_LIMIT,
			export_row_cap: DEFAULT_EXPORT_ROW_CAP,
		}
	}
}

/// Audit configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	pub enabled: Option<bool>,
	pub retention_days: Option<i64>,
	pub query_limit: Option<i64>,
	pub export_row_cap: Option<i64>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.retention_days.is_some() {
			self.retention_days = other.retention_days;
		}
		if other.query_limit.is_some() {
			self.query_limit = other.query_limit;
		}
		if other.export_row_cap.is_some() {
			self.export_row_cap = other.export_row_cap;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			enabled: self.enabled.unwrap_or(true),
			retention_days: self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
			query_limit: self.query_limit.unwrap_or(DEFAULT_QUERY_LIMIT),
			export_row_cap: self.export_row_cap.unwrap_or(DEFAULT_EXPORT_ROW_CAP),
		}
	}
}

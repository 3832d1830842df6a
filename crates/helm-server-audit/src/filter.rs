// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query filters for the audit log.
//!
//! Every filter is scoped to exactly one tenant; there is no way to express
//! a cross-tenant query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{AuditActionType, AuditLogEntry, AuditSeverity, TenantId, UserId};

/// Default page size when the caller does not supply a limit.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;

/// An inclusive timestamp range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
	pub start: DateTime<Utc>,
	pub end: DateTime<Utc>,
}

impl DateRange {
	pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
		Self { start, end }
	}

	/// Both bounds are inclusive.
	pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
		timestamp >= self.start && timestamp <= self.end
	}
}

/// Filter for [`crate::AuditService::query_logs`] and the exporter.
///
/// `action_types` and `severities` are set-membership predicates; a single
/// value is a one-element set. `None` means "no constraint".
#[derive(Debug, Clone)]
pub struct AuditLogFilter {
	pub tenant_id: TenantId,
	pub user_id: Option<UserId>,
	pub action_types: Option<Vec<AuditActionType>>,
	pub target_user_id: Option<UserId>,
	pub severities: Option<Vec<AuditSeverity>>,
	pub date_range: Option<DateRange>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

impl AuditLogFilter {
	/// An unconstrained filter for one tenant.
	pub fn for_tenant(tenant_id: TenantId) -> Self {
		Self {
			tenant_id,
			user_id: None,
			action_types: None,
			target_user_id: None,
			severities: None,
			date_range: None,
			limit: None,
			offset: None,
		}
	}

	pub fn user(mut self, user_id: UserId) -> Self {
		self.user_id = Some(user_id);
		self
	}

	pub fn action_type(mut self, action_type: AuditActionType) -> Self {
		self.action_types
			.get_or_insert_with(Vec::new)
			.push(action_type);
		self
	}

	pub fn action_types(mut self, action_types: Vec<AuditActionType>) -> Self {
		self.action_types = Some(action_types);
		self
	}

	pub fn target_user(mut self, user_id: UserId) -> Self {
		self.target_user_id = Some(user_id);
		self
	}

	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severities.get_or_insert_with(Vec::new).push(severity);
		self
	}

	pub fn severities(mut self, severities: Vec<AuditSeverity>) -> Self {
		self.severities = Some(severities);
		self
	}

	pub fn date_range(mut self, range: DateRange) -> Self {
		self.date_range = Some(range);
		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: i64) -> Self {
		self.offset = Some(offset);
		self
	}

	pub fn effective_limit(&self) -> i64 {
		self.limit.unwrap_or(DEFAULT_QUERY_LIMIT)
	}

	pub fn effective_offset(&self) -> i64 {
		self.offset.unwrap_or(0)
	}

	/// Whether an entry satisfies every predicate of this filter.
	///
	/// Pagination (`limit`/`offset`) is not part of the predicate; stores
	/// apply it after ordering.
	pub fn matches(&self, entry: &AuditLogEntry) -> bool {
		if entry.tenant_id != self.tenant_id {
			return false;
		}
		if let Some(user_id) = self.user_id {
			if entry.user_id != user_id {
				return false;
			}
		}
		if let Some(ref action_types) = self.action_types {
			if !action_types.contains(&entry.action_type) {
				return false;
			}
		}
		if let Some(target_user_id) = self.target_user_id {
			if entry.target_user_id != Some(target_user_id) {
				return false;
			}
		}
		if let Some(ref severities) = self.severities {
			if !severities.contains(&entry.severity) {
				return false;
			}
		}
		if let Some(ref range) = self.date_range {
			if !range.contains(entry.timestamp) {
				return false;
			}
		}
		true
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable store abstraction for audit log entries.
//!
//! The service talks to storage through [`AuditStore`]; the SQLite
//! implementation lives in `helm-server-db`. [`MemoryAuditStore`] is an
//! in-process implementation for unit tests and embedded use.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditActionType, AuditLogEntry, TenantId};
use crate::filter::{AuditLogFilter, DateRange};

/// Narrow interface over a durable structured store.
///
/// Entries are append-only: there is no update operation, and the only
/// delete is the tenant-scoped age-based sweep.
#[async_trait]
pub trait AuditStore: Send + Sync {
	/// Append one entry.
	async fn insert(&self, entry: &AuditLogEntry) -> AuditResult<()>;

	/// Return entries matching the filter, newest-first, paginated.
	async fn find_many(&self, filter: &AuditLogFilter) -> AuditResult<Vec<AuditLogEntry>>;

	/// Count matching entries grouped by action type. Grouped in the store,
	/// independent of any pagination limit.
	async fn count_by_action(
		&self,
		tenant_id: TenantId,
		range: Option<&DateRange>,
	) -> AuditResult<Vec<(AuditActionType, i64)>>;

	/// Delete entries for the tenant strictly older than the cutoff.
	/// Returns the number of rows removed.
	async fn delete_older_than(
		&self,
		tenant_id: TenantId,
		cutoff: DateTime<Utc>,
	) -> AuditResult<u64>;
}

/// In-memory [`AuditStore`], used as a fake in tests and anywhere a real
/// database is unwanted.
#[derive(Default)]
pub struct MemoryAuditStore {
	entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.read().expect("audit store lock poisoned").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
	async fn insert(&self, entry: &AuditLogEntry) -> AuditResult<()> {
		self.entries
			.write()
			.map_err(|_| AuditError::Store("audit store lock poisoned".to_string()))?
			.push(entry.clone());
		Ok(())
	}

	async fn find_many(&self, filter: &AuditLogFilter) -> AuditResult<Vec<AuditLogEntry>> {
		let entries = self
			.entries
			.read()
			.map_err(|_| AuditError::Store("audit store lock poisoned".to_string()))?;

		let mut matching: Vec<AuditLogEntry> = entries
			.iter()
			.filter(|e| filter.matches(e))
			.cloned()
			.collect();
		matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

		let offset = filter.effective_offset().max(0) as usize;
		let limit = filter.effective_limit().max(0) as usize;
		Ok(matching.into_iter().skip(offset).take(limit).collect())
	}

	async fn count_by_action(
		&self,
		tenant_id: TenantId,
		range: Option<&DateRange>,
	) -> AuditResult<Vec<(AuditActionType, i64)>> {
		let entries = self
			.entries
			.read()
			.map_err(|_| AuditError::Store("audit store lock poisoned".to_string()))?;

		let mut counts: HashMap<AuditActionType, i64> = HashMap::new();
		for entry in entries.iter() {
			if entry.tenant_id != tenant_id {
				continue;
			}
			if let Some(range) = range {
				if !range.contains(entry.timestamp) {
					continue;
				}
			}
			*counts.entry(entry.action_type).or_insert(0) += 1;
		}
		Ok(counts.into_iter().collect())
	}

	async fn delete_older_than(
		&self,
		tenant_id: TenantId,
		cutoff: DateTime<Utc>,
	) -> AuditResult<u64> {
		let mut entries = self
			.entries
			.write()
			.map_err(|_| AuditError::Store("audit store lock poisoned".to_string()))?;

		let before = entries.len();
		entries.retain(|e| !(e.tenant_id == tenant_id && e.timestamp < cutoff));
		Ok((before - entries.len()) as u64)
	}
}

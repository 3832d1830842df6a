// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The audit service: recording, querying, statistics, retention and export.
//!
//! Recording is fire-and-forget: a storage failure is reported to the
//! diagnostic channel (`tracing`) and discarded, never surfaced to the
//! caller. An audit trail gap is preferable to failing the primary
//! operation being observed. Queries, statistics, retention and export
//! propagate errors: those are explicit operator actions where silent
//! failure would hide data loss.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::AuditResult;
use crate::event::{
	AuditActionType, AuditEvent, AuditLogEntry, AuditSeverity, BulkOperationStatus, TenantId,
	TenantRole, UserId, DEFAULT_AUDIT_RETENTION_DAYS,
};
use crate::export::{format_csv, EXPORT_ROW_CAP};
use crate::filter::{AuditLogFilter, DateRange};
use crate::store::AuditStore;

/// Audit event recorder and query service over an injected store.
///
/// The service holds no mutable state of its own; concurrent calls are
/// independent awaits against the store.
pub struct AuditService {
	store: Arc<dyn AuditStore>,
}

impl AuditService {
	pub fn new(store: Arc<dyn AuditStore>) -> Self {
		Self { store }
	}

	/// Record one event. Assigns the entry id and timestamp, then persists.
	///
	/// Never fails: storage errors are logged and discarded. Callers cannot
	/// detect or retry a lost audit record; that tradeoff is deliberate.
	#[instrument(skip(self, event), fields(action_type = %event.action_type, tenant_id = %event.tenant_id))]
	pub async fn record(&self, event: AuditEvent) {
		let entry = AuditLogEntry::from_event(event, Uuid::new_v4(), Utc::now());
		if let Err(e) = self.store.insert(&entry).await {
			warn!(
				action_type = %entry.action_type,
				tenant_id = %entry.tenant_id,
				error = %e,
				"failed to record audit entry"
			);
		}
	}

	/// Record a permission change for a user.
	///
	/// Records nothing when both lists are empty. When any permission was
	/// added the entry is classified as a grant, even if removals happened
	/// in the same call; the description and `changes` payload still carry
	/// both sides.
	pub async fn record_permission_change(
		&self,
		tenant_id: TenantId,
		actor: UserId,
		target_user: UserId,
		permissions_added: &[String],
		permissions_removed: &[String],
	) {
		if permissions_added.is_empty() && permissions_removed.is_empty() {
			return;
		}

		let action_type = if !permissions_added.is_empty() {
			AuditActionType::PermissionGranted
		} else {
			AuditActionType::PermissionRevoked
		};

		let description = match (permissions_added.len(), permissions_removed.len()) {
			(added, 0) => format!("Granted {added} permission(s)"),
			(0, removed) => format!("Revoked {removed} permission(s)"),
			(added, removed) => {
				format!("Granted {added} permission(s), revoked {removed} permission(s)")
			}
		};

		let event = AuditEvent::builder(action_type, tenant_id, actor)
			.target_user(target_user)
			.description(description)
			.changes(json!({
				"permissions_added": permissions_added,
				"permissions_removed": permissions_removed,
			}))
			.build();
		self.record(event).await;
	}

	/// Record a role change for a user. Always records, even when the new
	/// role equals the previous one.
	///
	/// Elevation to an administrative role is always `Critical`.
	pub async fn record_role_change(
		&self,
		tenant_id: TenantId,
		actor: UserId,
		target_user: UserId,
		previous_role: TenantRole,
		new_role: TenantRole,
	) {
		let severity = if new_role.is_administrative() {
			AuditSeverity::Critical
		} else {
			AuditSeverity::Info
		};

		let event = AuditEvent::builder(AuditActionType::RoleChanged, tenant_id, actor)
			.target_user(target_user)
			.severity(severity)
			.description(format!("Role changed from {previous_role} to {new_role}"))
			.changes(json!({
				"previous_role": previous_role,
				"new_role": new_role,
			}))
			.build();
		self.record(event).await;
	}

	/// Record a change to one section of the tenant settings.
	pub async fn record_settings_change(
		&self,
		tenant_id: TenantId,
		actor: UserId,
		section: &str,
		changes: Option<serde_json::Value>,
	) {
		let mut builder = AuditEvent::builder(AuditActionType::SettingsChanged, tenant_id, actor)
			.severity(AuditSeverity::Info)
			.resource("settings", section)
			.description(format!("Updated {section} settings"));
		if let Some(changes) = changes {
			builder = builder.changes(changes);
		}
		self.record(builder.build()).await;
	}

	/// Record one phase of a bulk operation.
	pub async fn record_bulk_operation(
		&self,
		tenant_id: TenantId,
		actor: UserId,
		operation: &str,
		status: BulkOperationStatus,
		affected_count: u64,
	) {
		let severity = match status {
			BulkOperationStatus::Failed => AuditSeverity::Warning,
			BulkOperationStatus::Started | BulkOperationStatus::Completed => AuditSeverity::Info,
		};

		let event = AuditEvent::builder(status.action_type(), tenant_id, actor)
			.severity(severity)
			.description(format!("Bulk operation '{operation}' {status}"))
			.metadata(json!({
				"operation": operation,
				"affected_count": affected_count,
			}))
			.build();
		self.record(event).await;
	}

	/// Return entries matching the filter, newest-first.
	///
	/// The filter is tenant-scoped by construction; defaults are limit 100,
	/// offset 0.
	#[instrument(skip(self, filter), fields(tenant_id = %filter.tenant_id))]
	pub async fn query_logs(&self, filter: &AuditLogFilter) -> AuditResult<Vec<AuditLogEntry>> {
		self.store.find_many(filter).await
	}

	/// Count entries per action type for one tenant, optionally date-scoped.
	///
	/// Grouped in the store; the result is independent of any query limit.
	#[instrument(skip(self, date_range), fields(tenant_id = %tenant_id))]
	pub async fn get_statistics(
		&self,
		tenant_id: TenantId,
		date_range: Option<&DateRange>,
	) -> AuditResult<HashMap<AuditActionType, i64>> {
		let counts = self.store.count_by_action(tenant_id, date_range).await?;
		Ok(counts.into_iter().collect())
	}

	/// Delete entries for the tenant older than the retention window.
	/// Returns the number of entries removed. Irreversible.
	///
	/// Scheduling is the caller's concern; this is the one-shot sweep.
	#[instrument(skip(self), fields(tenant_id = %tenant_id))]
	pub async fn delete_old_logs(
		&self,
		tenant_id: TenantId,
		retention_days: Option<i64>,
	) -> AuditResult<u64> {
		let retention_days = retention_days.unwrap_or(DEFAULT_AUDIT_RETENTION_DAYS);
		let cutoff = Utc::now() - Duration::days(retention_days);
		self.store.delete_older_than(tenant_id, cutoff).await
	}

	/// Export matching entries as a CSV document.
	///
	/// The row cap of [`EXPORT_ROW_CAP`] is enforced regardless of any
	/// caller-supplied limit, and the filter's tenant is forced to the
	/// requested tenant.
	#[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
	pub async fn export_logs(
		&self,
		tenant_id: TenantId,
		filter: Option<AuditLogFilter>,
	) -> AuditResult<String> {
		let mut filter = filter.unwrap_or_else(|| AuditLogFilter::for_tenant(tenant_id));
		filter.tenant_id = tenant_id;
		filter.limit = Some(EXPORT_ROW_CAP);

		let entries = self.store.find_many(&filter).await?;
		Ok(format_csv(&entries))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryAuditStore;
	use async_trait::async_trait;
	use chrono::DateTime;
	use serde_json::json;

	fn service() -> (AuditService, Arc<MemoryAuditStore>) {
		let store = Arc::new(MemoryAuditStore::new());
		(AuditService::new(store.clone()), store)
	}

	/// Store whose insert always fails, for the swallowed-error contract.
	struct FailingStore;

	#[async_trait]
	impl AuditStore for FailingStore {
		async fn insert(&self, _entry: &AuditLogEntry) -> AuditResult<()> {
			Err(crate::error::AuditError::Store("disk on fire".to_string()))
		}

		async fn find_many(&self, _filter: &AuditLogFilter) -> AuditResult<Vec<AuditLogEntry>> {
			Ok(Vec::new())
		}

		async fn count_by_action(
			&self,
			_tenant_id: TenantId,
			_range: Option<&DateRange>,
		) -> AuditResult<Vec<(AuditActionType, i64)>> {
			Ok(Vec::new())
		}

		async fn delete_older_than(
			&self,
			_tenant_id: TenantId,
			_cutoff: DateTime<Utc>,
		) -> AuditResult<u64> {
			Ok(0)
		}
	}

	mod recording {
		use super::*;

		#[tokio::test]
		async fn record_assigns_timestamp_and_persists() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			let actor = UserId::generate();

			let before = Utc::now();
			service
				.record(AuditEvent::builder(AuditActionType::Login, tenant, actor).build())
				.await;
			let after = Utc::now();

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs.len(), 1);
			assert!(logs[0].timestamp >= before && logs[0].timestamp <= after);
			assert_eq!(logs[0].user_id, actor);
		}

		#[tokio::test]
		async fn record_swallows_store_failure() {
			let service = AuditService::new(Arc::new(FailingStore));
			// Must not panic or surface the error.
			service
				.record(
					AuditEvent::builder(
						AuditActionType::Login,
						TenantId::generate(),
						UserId::generate(),
					)
					.build(),
				)
				.await;
		}

		#[tokio::test]
		async fn round_trip_preserves_payloads() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			let actor = UserId::generate();
			let changes = json!({"before": {"name": "a"}, "after": {"name": "b"}});
			let metadata = json!({"request": "req-1", "nested": [1, 2, {"k": null}]});

			service
				.record(
					AuditEvent::builder(AuditActionType::UserUpdated, tenant, actor)
						.changes(changes.clone())
						.metadata(metadata.clone())
						.build(),
				)
				.await;

			let now = Utc::now();
			let range = DateRange::new(now - Duration::hours(1), now + Duration::hours(1));
			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant).date_range(range))
				.await
				.unwrap();
			assert_eq!(logs.len(), 1);
			assert_eq!(logs[0].changes, Some(changes));
			assert_eq!(logs[0].metadata, Some(metadata));
		}
	}

	mod permission_changes {
		use super::*;

		#[tokio::test]
		async fn empty_lists_record_nothing() {
			let (service, store) = service();
			service
				.record_permission_change(
					TenantId::generate(),
					UserId::generate(),
					UserId::generate(),
					&[],
					&[],
				)
				.await;
			assert!(store.is_empty());
		}

		#[tokio::test]
		async fn removal_only_is_a_revoke() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_permission_change(
					tenant,
					UserId::generate(),
					UserId::generate(),
					&[],
					&["reports.view".to_string()],
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs.len(), 1);
			assert_eq!(logs[0].action_type, AuditActionType::PermissionRevoked);
			assert_eq!(logs[0].description, "Revoked 1 permission(s)");
		}

		#[tokio::test]
		async fn mixed_grant_and_revoke_classifies_as_grant() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_permission_change(
					tenant,
					UserId::generate(),
					UserId::generate(),
					&["billing.manage".to_string(), "users.invite".to_string()],
					&["reports.view".to_string()],
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs[0].action_type, AuditActionType::PermissionGranted);
			assert_eq!(
				logs[0].description,
				"Granted 2 permission(s), revoked 1 permission(s)"
			);
			let changes = logs[0].changes.as_ref().unwrap();
			assert_eq!(changes["permissions_removed"], json!(["reports.view"]));
		}
	}

	mod role_changes {
		use super::*;

		#[tokio::test]
		async fn elevation_to_admin_is_critical() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_role_change(
					tenant,
					UserId::generate(),
					UserId::generate(),
					TenantRole::Member,
					TenantRole::Admin,
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs[0].severity, AuditSeverity::Critical);
			assert_eq!(logs[0].description, "Role changed from member to admin");
		}

		#[tokio::test]
		async fn elevation_to_super_admin_is_critical() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_role_change(
					tenant,
					UserId::generate(),
					UserId::generate(),
					TenantRole::Admin,
					TenantRole::SuperAdmin,
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs[0].severity, AuditSeverity::Critical);
		}

		#[tokio::test]
		async fn change_to_non_administrative_role_is_info() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_role_change(
					tenant,
					UserId::generate(),
					UserId::generate(),
					TenantRole::Admin,
					TenantRole::Member,
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs[0].severity, AuditSeverity::Info);
		}

		#[tokio::test]
		async fn same_role_change_still_records() {
			let (service, store) = service();
			service
				.record_role_change(
					TenantId::generate(),
					UserId::generate(),
					UserId::generate(),
					TenantRole::Member,
					TenantRole::Member,
				)
				.await;
			assert_eq!(store.len(), 1);
		}
	}

	mod settings_and_bulk {
		use super::*;

		#[tokio::test]
		async fn settings_change_tags_section() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_settings_change(
					tenant,
					UserId::generate(),
					"billing",
					Some(json!({"before": {"plan": "free"}, "after": {"plan": "pro"}})),
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs[0].action_type, AuditActionType::SettingsChanged);
			assert_eq!(logs[0].severity, AuditSeverity::Info);
			assert_eq!(logs[0].target_resource_type, Some("settings".to_string()));
			assert_eq!(logs[0].target_resource_id, Some("billing".to_string()));
		}

		#[tokio::test]
		async fn bulk_operation_failed_is_warning() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record_bulk_operation(
					tenant,
					UserId::generate(),
					"deactivate_users",
					BulkOperationStatus::Failed,
					17,
				)
				.await;

			let logs = service
				.query_logs(&AuditLogFilter::for_tenant(tenant))
				.await
				.unwrap();
			assert_eq!(logs[0].action_type, AuditActionType::BulkOperationFailed);
			assert_eq!(logs[0].severity, AuditSeverity::Warning);
			assert_eq!(
				logs[0].description,
				"Bulk operation 'deactivate_users' failed"
			);
			assert_eq!(logs[0].metadata.as_ref().unwrap()["affected_count"], 17);
		}

		#[tokio::test]
		async fn bulk_operation_phases_map_to_action_types() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			let actor = UserId::generate();
			for status in [BulkOperationStatus::Started, BulkOperationStatus::Completed] {
				service
					.record_bulk_operation(tenant, actor, "import", status, 0)
					.await;
			}

			let stats = service.get_statistics(tenant, None).await.unwrap();
			assert_eq!(
				stats.get(&AuditActionType::BulkOperationStarted),
				Some(&1)
			);
			assert_eq!(
				stats.get(&AuditActionType::BulkOperationCompleted),
				Some(&1)
			);
		}
	}

	mod queries_and_statistics {
		use super::*;

		#[tokio::test]
		async fn queries_never_cross_tenants() {
			let (service, _) = service();
			let tenant_a = TenantId::generate();
			let tenant_b = TenantId::generate();
			let actor = UserId::generate();

			for tenant in [tenant_a, tenant_a, tenant_b] {
				service
					.record(AuditEvent::builder(AuditActionType::Login, tenant, actor).build())
					.await;
			}

			let logs_a = service
				.query_logs(&AuditLogFilter::for_tenant(tenant_a))
				.await
				.unwrap();
			assert_eq!(logs_a.len(), 2);
			assert!(logs_a.iter().all(|e| e.tenant_id == tenant_a));

			let logs_b = service
				.query_logs(&AuditLogFilter::for_tenant(tenant_b).user(actor))
				.await
				.unwrap();
			assert_eq!(logs_b.len(), 1);
			assert_eq!(logs_b[0].tenant_id, tenant_b);
		}

		#[tokio::test]
		async fn statistics_agree_with_queries() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			let actor = UserId::generate();

			for _ in 0..4 {
				service
					.record(AuditEvent::builder(AuditActionType::Login, tenant, actor).build())
					.await;
			}
			for _ in 0..2 {
				service
					.record(
						AuditEvent::builder(AuditActionType::UserDeleted, tenant, actor).build(),
					)
					.await;
			}

			let stats = service.get_statistics(tenant, None).await.unwrap();

			for (action_type, count) in &stats {
				let equivalent = service
					.query_logs(
						&AuditLogFilter::for_tenant(tenant)
							.action_type(*action_type)
							.limit(i64::MAX),
					)
					.await
					.unwrap();
				assert_eq!(equivalent.len() as i64, *count);
			}
			assert_eq!(stats.get(&AuditActionType::Login), Some(&4));
			assert_eq!(stats.get(&AuditActionType::UserDeleted), Some(&2));
		}
	}

	mod retention {
		use super::*;
		use crate::store::MemoryAuditStore;
		use uuid::Uuid;

		#[tokio::test]
		async fn deletes_only_expired_entries_for_the_tenant() {
			let store = Arc::new(MemoryAuditStore::new());
			let service = AuditService::new(store.clone());
			let tenant = TenantId::generate();
			let other = TenantId::generate();
			let actor = UserId::generate();

			let old = Utc::now() - Duration::days(91);
			let recent = Utc::now() - Duration::days(10);
			for (tenant_id, timestamp) in [(tenant, old), (tenant, recent), (other, old)] {
				let entry = AuditLogEntry::from_event(
					AuditEvent::builder(AuditActionType::Login, tenant_id, actor).build(),
					Uuid::new_v4(),
					timestamp,
				);
				store.insert(&entry).await.unwrap();
			}

			let deleted = service.delete_old_logs(tenant, None).await.unwrap();
			assert_eq!(deleted, 1);

			// Second sweep with no new data is a no-op.
			let deleted = service.delete_old_logs(tenant, None).await.unwrap();
			assert_eq!(deleted, 0);

			// The other tenant's expired entry is untouched.
			let other_logs = service
				.query_logs(&AuditLogFilter::for_tenant(other))
				.await
				.unwrap();
			assert_eq!(other_logs.len(), 1);
		}

		#[tokio::test]
		async fn custom_retention_window() {
			let store = Arc::new(MemoryAuditStore::new());
			let service = AuditService::new(store.clone());
			let tenant = TenantId::generate();

			let entry = AuditLogEntry::from_event(
				AuditEvent::builder(AuditActionType::Login, tenant, UserId::generate()).build(),
				Uuid::new_v4(),
				Utc::now() - Duration::days(31),
			);
			store.insert(&entry).await.unwrap();

			assert_eq!(service.delete_old_logs(tenant, Some(60)).await.unwrap(), 0);
			assert_eq!(service.delete_old_logs(tenant, Some(30)).await.unwrap(), 1);
		}
	}

	mod export {
		use super::*;
		use crate::store::MemoryAuditStore;
		use uuid::Uuid;

		#[tokio::test]
		async fn export_quotes_embedded_quotes() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			service
				.record(
					AuditEvent::builder(
						AuditActionType::SettingsChanged,
						tenant,
						UserId::generate(),
					)
					.description("Say \"hi\"")
					.build(),
				)
				.await;

			let csv = service.export_logs(tenant, None).await.unwrap();
			assert!(csv.contains("\"Say \"\"hi\"\"\""));
		}

		#[tokio::test]
		async fn export_enforces_row_cap() {
			let store = Arc::new(MemoryAuditStore::new());
			let service = AuditService::new(store.clone());
			let tenant = TenantId::generate();
			let actor = UserId::generate();
			let base = Utc::now();

			for i in 0..(EXPORT_ROW_CAP + 50) {
				let entry = AuditLogEntry::from_event(
					AuditEvent::builder(AuditActionType::Login, tenant, actor).build(),
					Uuid::new_v4(),
					base - Duration::seconds(i),
				);
				store.insert(&entry).await.unwrap();
			}

			let filter = AuditLogFilter::for_tenant(tenant).limit(EXPORT_ROW_CAP + 50);
			let csv = service.export_logs(tenant, Some(filter)).await.unwrap();
			// Header plus exactly the capped number of rows.
			assert_eq!(csv.lines().count() as i64, EXPORT_ROW_CAP + 1);
		}

		#[tokio::test]
		async fn export_forces_tenant_scope() {
			let (service, _) = service();
			let tenant = TenantId::generate();
			let other = TenantId::generate();
			service
				.record(
					AuditEvent::builder(AuditActionType::Login, other, UserId::generate()).build(),
				)
				.await;

			// A filter built for another tenant is rescoped to the requested one.
			let filter = AuditLogFilter::for_tenant(other);
			let csv = service.export_logs(tenant, Some(filter)).await.unwrap();
			assert_eq!(csv.lines().count(), 1);
		}
	}
}

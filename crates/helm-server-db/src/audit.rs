// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed audit store.
//!
//! Implements `helm_server_audit::AuditStore` over an `audit_logs` table.
//! Timestamps are stored as RFC 3339 text; `changes`/`metadata` are stored
//! as opaque JSON text and degrade to `None` on read when malformed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use helm_server_audit::{
	AuditActionType, AuditError, AuditLogEntry, AuditLogFilter, AuditResult, AuditSeverity,
	AuditStore, DateRange, TenantId, UserId,
};

/// Create the `audit_logs` table and its tenant/timestamp index.
pub async fn ensure_audit_schema(pool: &SqlitePool) -> crate::error::Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS audit_logs (
			id TEXT PRIMARY KEY,
			tenant_id TEXT NOT NULL,
			timestamp TEXT NOT NULL,
			action_type TEXT NOT NULL,
			severity TEXT NOT NULL,
			user_id TEXT NOT NULL,
			target_user_id TEXT,
			target_resource_id TEXT,
			target_resource_type TEXT,
			description TEXT NOT NULL,
			changes TEXT,
			metadata TEXT,
			ip_address TEXT,
			user_agent TEXT,
			created_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_audit_logs_tenant_timestamp \
		 ON audit_logs (tenant_id, timestamp)",
	)
	.execute(pool)
	.await?;

	Ok(())
}

pub struct SqliteAuditStore {
	pool: SqlitePool,
}

impl SqliteAuditStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

fn store_err(e: sqlx::Error) -> AuditError {
	AuditError::Store(format!("database error: {e}"))
}

/// Decode one row, skipping rows whose identity columns are unreadable.
/// `changes`/`metadata` are best-effort and degrade to `None`.
fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Option<AuditLogEntry> {
	let id = Uuid::parse_str(&row.get::<String, _>("id")).ok()?;

	let ts_str: String = row.get("timestamp");
	let timestamp = DateTime::parse_from_rfc3339(&ts_str)
		.ok()?
		.with_timezone(&Utc);

	let action_type = AuditActionType::parse(&row.get::<String, _>("action_type"))?;
	let severity = AuditSeverity::parse(&row.get::<String, _>("severity"))
		.unwrap_or_else(|| action_type.default_severity());

	let tenant_id = TenantId::new(Uuid::parse_str(&row.get::<String, _>("tenant_id")).ok()?);
	let user_id = UserId::new(Uuid::parse_str(&row.get::<String, _>("user_id")).ok()?);
	let target_user_id = row
		.get::<Option<String>, _>("target_user_id")
		.and_then(|s| Uuid::parse_str(&s).ok())
		.map(UserId::new);

	Some(AuditLogEntry {
		id,
		timestamp,
		action_type,
		severity,
		tenant_id,
		user_id,
		target_user_id,
		target_resource_id: row.get("target_resource_id"),
		target_resource_type: row.get("target_resource_type"),
		description: row.get("description"),
		changes: row
			.get::<Option<String>, _>("changes")
			.and_then(|s| serde_json::from_str(&s).ok()),
		metadata: row
			.get::<Option<String>, _>("metadata")
			.and_then(|s| serde_json::from_str(&s).ok()),
		ip_address: row.get("ip_address"),
		user_agent: row.get("user_agent"),
	})
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
	#[tracing::instrument(skip(self, entry), fields(tenant_id = %entry.tenant_id))]
	async fn insert(&self, entry: &AuditLogEntry) -> AuditResult<()> {
		let changes_json = entry
			.changes
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;
		let metadata_json = entry
			.metadata
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;

		sqlx::query(
			r#"
			INSERT INTO audit_logs (
				id, tenant_id, timestamp, action_type, severity, user_id,
				target_user_id, target_resource_id, target_resource_type,
				description, changes, metadata, ip_address, user_agent, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(entry.id.to_string())
		.bind(entry.tenant_id.to_string())
		.bind(entry.timestamp.to_rfc3339())
		.bind(entry.action_type.to_string())
		.bind(entry.severity.to_string())
		.bind(entry.user_id.to_string())
		.bind(entry.target_user_id.as_ref().map(|u| u.to_string()))
		.bind(&entry.target_resource_id)
		.bind(&entry.target_resource_type)
		.bind(&entry.description)
		.bind(&changes_json)
		.bind(&metadata_json)
		.bind(&entry.ip_address)
		.bind(&entry.user_agent)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(store_err)?;

		Ok(())
	}

	#[tracing::instrument(skip(self, filter), fields(tenant_id = %filter.tenant_id))]
	async fn find_many(&self, filter: &AuditLogFilter) -> AuditResult<Vec<AuditLogEntry>> {
		// An empty membership set can match nothing; skip the round trip.
		if filter.action_types.as_ref().is_some_and(|v| v.is_empty())
			|| filter.severities.as_ref().is_some_and(|v| v.is_empty())
		{
			return Ok(Vec::new());
		}

		let mut conditions = vec!["tenant_id = ?".to_string()];
		if filter.user_id.is_some() {
			conditions.push("user_id = ?".to_string());
		}
		if filter.target_user_id.is_some() {
			conditions.push("target_user_id = ?".to_string());
		}
		if let Some(ref action_types) = filter.action_types {
			let placeholders = vec!["?"; action_types.len()].join(", ");
			conditions.push(format!("action_type IN ({placeholders})"));
		}
		if let Some(ref severities) = filter.severities {
			let placeholders = vec!["?"; severities.len()].join(", ");
			conditions.push(format!("severity IN ({placeholders})"));
		}
		if filter.date_range.is_some() {
			conditions.push("timestamp >= ?".to_string());
			conditions.push("timestamp <= ?".to_string());
		}

		let sql = format!(
			"SELECT id, tenant_id, timestamp, action_type, severity, user_id, \
			 target_user_id, target_resource_id, target_resource_type, \
			 description, changes, metadata, ip_address, user_agent \
			 FROM audit_logs WHERE {} ORDER BY timestamp DESC LIMIT ? OFFSET ?",
			conditions.join(" AND ")
		);

		let mut query = sqlx::query(&sql).bind(filter.tenant_id.to_string());
		if let Some(user_id) = filter.user_id {
			query = query.bind(user_id.to_string());
		}
		if let Some(target_user_id) = filter.target_user_id {
			query = query.bind(target_user_id.to_string());
		}
		if let Some(ref action_types) = filter.action_types {
			for action_type in action_types {
				query = query.bind(action_type.to_string());
			}
		}
		if let Some(ref severities) = filter.severities {
			for severity in severities {
				query = query.bind(severity.to_string());
			}
		}
		if let Some(ref range) = filter.date_range {
			query = query.bind(range.start.to_rfc3339());
			query = query.bind(range.end.to_rfc3339());
		}
		query = query
			.bind(filter.effective_limit())
			.bind(filter.effective_offset());

		let rows = query.fetch_all(&self.pool).await.map_err(store_err)?;
		Ok(rows.iter().filter_map(decode_row).collect())
	}

	#[tracing::instrument(skip(self, range), fields(tenant_id = %tenant_id))]
	async fn count_by_action(
		&self,
		tenant_id: TenantId,
		range: Option<&DateRange>,
	) -> AuditResult<Vec<(AuditActionType, i64)>> {
		let mut conditions = vec!["tenant_id = ?".to_string()];
		if range.is_some() {
			conditions.push("timestamp >= ?".to_string());
			conditions.push("timestamp <= ?".to_string());
		}

		let sql = format!(
			"SELECT action_type, COUNT(*) as cnt FROM audit_logs \
			 WHERE {} GROUP BY action_type",
			conditions.join(" AND ")
		);

		let mut query = sqlx::query(&sql).bind(tenant_id.to_string());
		if let Some(range) = range {
			query = query.bind(range.start.to_rfc3339());
			query = query.bind(range.end.to_rfc3339());
		}

		let rows = query.fetch_all(&self.pool).await.map_err(store_err)?;
		Ok(rows
			.iter()
			.filter_map(|row| {
				let action_type = AuditActionType::parse(&row.get::<String, _>("action_type"))?;
				let count: i64 = row.get("cnt");
				Some((action_type, count))
			})
			.collect())
	}

	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id))]
	async fn delete_older_than(
		&self,
		tenant_id: TenantId,
		cutoff: DateTime<Utc>,
	) -> AuditResult<u64> {
		let result = sqlx::query("DELETE FROM audit_logs WHERE tenant_id = ? AND timestamp < ?")
			.bind(tenant_id.to_string())
			.bind(cutoff.to_rfc3339())
			.execute(&self.pool)
			.await
			.map_err(store_err)?;

		Ok(result.rows_affected())
	}
}

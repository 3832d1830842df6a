// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! This module provides the foundational types for the audit system:
//!
//! - [`AuditActionType`]: Closed enumeration of all auditable actions
//! - [`AuditSeverity`]: Three-level importance tag
//! - [`AuditEvent`]: Draft event description, built by callers
//! - [`AuditEventBuilder`]: Fluent API for constructing drafts
//! - [`AuditLogEntry`]: Persisted record with recorder-assigned id/timestamp

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Default retention period for audit logs in days.
pub const DEFAULT_AUDIT_RETENTION_DAYS: i64 = 90;

/// Types of actions that can be recorded in the audit log.
///
/// This is a closed set: extending the taxonomy means adding enum members,
/// never free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActionType {
	// User lifecycle
	UserCreated,
	UserUpdated,
	UserDeleted,
	UserActivated,
	UserDeactivated,
	UserInvited,

	// Permission and role changes
	PermissionGranted,
	PermissionRevoked,
	RoleChanged,

	// Bulk operation phases
	BulkOperationStarted,
	BulkOperationCompleted,
	BulkOperationFailed,

	// Settings
	SettingsChanged,

	// Authentication
	Login,
	Logout,
	LoginFailed,
	PasswordChanged,
}

impl fmt::Display for AuditActionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditActionType::UserCreated => "user_created",
			AuditActionType::UserUpdated => "user_updated",
			AuditActionType::UserDeleted => "user_deleted",
			AuditActionType::UserActivated => "user_activated",
			AuditActionType::UserDeactivated => "user_deactivated",
			AuditActionType::UserInvited => "user_invited",
			AuditActionType::PermissionGranted => "permission_granted",
			AuditActionType::PermissionRevoked => "permission_revoked",
			AuditActionType::RoleChanged => "role_changed",
			AuditActionType::BulkOperationStarted => "bulk_operation_started",
			AuditActionType::BulkOperationCompleted => "bulk_operation_completed",
			AuditActionType::BulkOperationFailed => "bulk_operation_failed",
			AuditActionType::SettingsChanged => "settings_changed",
			AuditActionType::Login => "login",
			AuditActionType::Logout => "logout",
			AuditActionType::LoginFailed => "login_failed",
			AuditActionType::PasswordChanged => "password_changed",
		};
		write!(f, "{s}")
	}
}

impl AuditActionType {
	/// All members of the taxonomy, for iteration in stores and tests.
	pub fn all() -> &'static [AuditActionType] {
		&[
			AuditActionType::UserCreated,
			AuditActionType::UserUpdated,
			AuditActionType::UserDeleted,
			AuditActionType::UserActivated,
			AuditActionType::UserDeactivated,
			AuditActionType::UserInvited,
			AuditActionType::PermissionGranted,
			AuditActionType::PermissionRevoked,
			AuditActionType::RoleChanged,
			AuditActionType::BulkOperationStarted,
			AuditActionType::BulkOperationCompleted,
			AuditActionType::BulkOperationFailed,
			AuditActionType::SettingsChanged,
			AuditActionType::Login,
			AuditActionType::Logout,
			AuditActionType::LoginFailed,
			AuditActionType::PasswordChanged,
		]
	}

	/// Parse the snake_case name produced by [`fmt::Display`].
	pub fn parse(s: &str) -> Option<AuditActionType> {
		match s {
			"user_created" => Some(AuditActionType::UserCreated),
			"user_updated" => Some(AuditActionType::UserUpdated),
			"user_deleted" => Some(AuditActionType::UserDeleted),
			"user_activated" => Some(AuditActionType::UserActivated),
			"user_deactivated" => Some(AuditActionType::UserDeactivated),
			"user_invited" => Some(AuditActionType::UserInvited),
			"permission_granted" => Some(AuditActionType::PermissionGranted),
			"permission_revoked" => Some(AuditActionType::PermissionRevoked),
			"role_changed" => Some(AuditActionType::RoleChanged),
			"bulk_operation_started" => Some(AuditActionType::BulkOperationStarted),
			"bulk_operation_completed" => Some(AuditActionType::BulkOperationCompleted),
			"bulk_operation_failed" => Some(AuditActionType::BulkOperationFailed),
			"settings_changed" => Some(AuditActionType::SettingsChanged),
			"login" => Some(AuditActionType::Login),
			"logout" => Some(AuditActionType::Logout),
			"login_failed" => Some(AuditActionType::LoginFailed),
			"password_changed" => Some(AuditActionType::PasswordChanged),
			_ => None,
		}
	}

	/// Returns the default severity for this action type.
	///
	/// Security-relevant failures and destructive actions default to
	/// `Warning`; everything else is `Info`. `Critical` is never a default:
	/// it is derived for administrative role elevation (see
	/// [`crate::AuditService::record_role_change`]) or set explicitly.
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditActionType::UserDeleted
			| AuditActionType::BulkOperationFailed
			| AuditActionType::LoginFailed => AuditSeverity::Warning,

			AuditActionType::UserCreated
			| AuditActionType::UserUpdated
			| AuditActionType::UserActivated
			| AuditActionType::UserDeactivated
			| AuditActionType::UserInvited
			| AuditActionType::PermissionGranted
			| AuditActionType::PermissionRevoked
			| AuditActionType::RoleChanged
			| AuditActionType::BulkOperationStarted
			| AuditActionType::BulkOperationCompleted
			| AuditActionType::SettingsChanged
			| AuditActionType::Login
			| AuditActionType::Logout
			| AuditActionType::PasswordChanged => AuditSeverity::Info,
		}
	}
}

/// Severity levels for audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	#[default]
	Info = 0,
	Warning = 1,
	Critical = 2,
}

impl AuditSeverity {
	/// Returns all severity levels from most to least severe.
	pub fn all() -> &'static [AuditSeverity] {
		&[
			AuditSeverity::Critical,
			AuditSeverity::Warning,
			AuditSeverity::Info,
		]
	}

	/// Parse the snake_case name produced by [`fmt::Display`].
	pub fn parse(s: &str) -> Option<AuditSeverity> {
		match s {
			"info" => Some(AuditSeverity::Info),
			"warning" => Some(AuditSeverity::Warning),
			"critical" => Some(AuditSeverity::Critical),
			_ => None,
		}
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		(*self as u8).cmp(&(*other as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Info => "info",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

/// A unique identifier for a tenant, the isolation boundary of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
	pub fn new(id: Uuid) -> Self {
		Self(id)
	}

	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn into_inner(self) -> Uuid {
		self.0
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<Uuid> for TenantId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

impl From<TenantId> for Uuid {
	fn from(id: TenantId) -> Self {
		id.0
	}
}

/// A unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
	pub fn new(id: Uuid) -> Self {
		Self(id)
	}

	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn into_inner(self) -> Uuid {
		self.0
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<Uuid> for UserId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

impl From<UserId> for Uuid {
	fn from(id: UserId) -> Self {
		id.0
	}
}

/// Roles a user can hold within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
	SuperAdmin,
	Admin,
	Manager,
	Member,
}

impl TenantRole {
	/// Whether this role carries administrative privileges. Elevation to an
	/// administrative role is always recorded at `Critical` severity.
	pub fn is_administrative(&self) -> bool {
		matches!(self, TenantRole::SuperAdmin | TenantRole::Admin)
	}
}

impl fmt::Display for TenantRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			TenantRole::SuperAdmin => "super_admin",
			TenantRole::Admin => "admin",
			TenantRole::Manager => "manager",
			TenantRole::Member => "member",
		};
		write!(f, "{s}")
	}
}

/// Phase of a bulk operation as reported to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationStatus {
	Started,
	Completed,
	Failed,
}

impl BulkOperationStatus {
	pub fn action_type(&self) -> AuditActionType {
		match self {
			BulkOperationStatus::Started => AuditActionType::BulkOperationStarted,
			BulkOperationStatus::Completed => AuditActionType::BulkOperationCompleted,
			BulkOperationStatus::Failed => AuditActionType::BulkOperationFailed,
		}
	}
}

impl fmt::Display for BulkOperationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			BulkOperationStatus::Started => "started",
			BulkOperationStatus::Completed => "completed",
			BulkOperationStatus::Failed => "failed",
		};
		write!(f, "{s}")
	}
}

/// A draft audit event, as described by a reporting collaborator.
///
/// Drafts carry no id or timestamp: both are assigned by the recorder at
/// insert time, which is what makes the recorder-assigned-timestamp
/// invariant hold by construction.
#[derive(Debug, Clone)]
pub struct AuditEvent {
	pub action_type: AuditActionType,
	pub severity: AuditSeverity,
	pub tenant_id: TenantId,
	pub user_id: UserId,
	pub target_user_id: Option<UserId>,
	pub target_resource_id: Option<String>,
	pub target_resource_type: Option<String>,
	pub description: String,
	pub changes: Option<serde_json::Value>,
	pub metadata: Option<serde_json::Value>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl AuditEvent {
	/// Create a new builder for the given action type, tenant and actor.
	pub fn builder(
		action_type: AuditActionType,
		tenant_id: TenantId,
		user_id: UserId,
	) -> AuditEventBuilder {
		AuditEventBuilder::new(action_type, tenant_id, user_id)
	}
}

/// Builder for constructing audit event drafts with a fluent API.
///
/// Tenant and actor are required up front; everything else is optional.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
	action_type: AuditActionType,
	severity: Option<AuditSeverity>,
	tenant_id: TenantId,
	user_id: UserId,
	target_user_id: Option<UserId>,
	target_resource_id: Option<String>,
	target_resource_type: Option<String>,
	description: Option<String>,
	changes: Option<serde_json::Value>,
	metadata: Option<serde_json::Value>,
	ip_address: Option<String>,
	user_agent: Option<String>,
}

impl AuditEventBuilder {
	pub fn new(action_type: AuditActionType, tenant_id: TenantId, user_id: UserId) -> Self {
		Self {
			action_type,
			severity: None,
			tenant_id,
			user_id,
			target_user_id: None,
			target_resource_id: None,
			target_resource_type: None,
			description: None,
			changes: None,
			metadata: None,
			ip_address: None,
			user_agent: None,
		}
	}

	/// Set the severity level. Defaults to the action type's default severity.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	/// Set the user the action was performed on.
	pub fn target_user(mut self, user_id: UserId) -> Self {
		self.target_user_id = Some(user_id);
		self
	}

	/// Set the resource type and ID affected by this event.
	pub fn resource(
		mut self,
		resource_type: impl Into<String>,
		resource_id: impl Into<String>,
	) -> Self {
		self.target_resource_type = Some(resource_type.into());
		self.target_resource_id = Some(resource_id.into());
		self
	}

	/// Set the human-readable description.
	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Attach a structured before/after or added/removed diff.
	pub fn changes(mut self, changes: serde_json::Value) -> Self {
		self.changes = Some(changes);
		self
	}

	/// Attach arbitrary structured side-information.
	pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
		self.metadata = Some(metadata);
		self
	}

	/// Set the IP address of the request origin.
	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	/// Set the user agent string from the request.
	pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
		self.user_agent = Some(ua.into());
		self
	}

	/// Build the draft event.
	pub fn build(self) -> AuditEvent {
		AuditEvent {
			action_type: self.action_type,
			severity: self
				.severity
				.unwrap_or_else(|| self.action_type.default_severity()),
			tenant_id: self.tenant_id,
			user_id: self.user_id,
			target_user_id: self.target_user_id,
			target_resource_id: self.target_resource_id,
			target_resource_type: self.target_resource_type,
			description: self
				.description
				.unwrap_or_else(|| self.action_type.to_string()),
			changes: self.changes,
			metadata: self.metadata,
			ip_address: self.ip_address,
			user_agent: self.user_agent,
		}
	}
}

/// An entry in the audit log. Immutable once written: the subsystem only
/// ever inserts new entries or bulk-deletes by age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
	/// Unique identifier for this audit entry.
	pub id: Uuid,
	/// When the event was recorded. Assigned once, by the recorder.
	pub timestamp: DateTime<Utc>,
	/// The type of action.
	pub action_type: AuditActionType,
	/// The severity level of this event.
	pub severity: AuditSeverity,
	/// The tenant partition this entry belongs to.
	pub tenant_id: TenantId,
	/// The user who performed the action.
	pub user_id: UserId,
	/// The user the action was performed on, if any.
	pub target_user_id: Option<UserId>,
	/// The ID of the resource affected.
	pub target_resource_id: Option<String>,
	/// The type of resource affected (e.g., "settings", "invitation").
	pub target_resource_type: Option<String>,
	/// Human-readable summary of the action.
	pub description: String,
	/// Structured before/after or added/removed diff.
	pub changes: Option<serde_json::Value>,
	/// Arbitrary structured side-information.
	pub metadata: Option<serde_json::Value>,
	/// IP address of the request origin.
	pub ip_address: Option<String>,
	/// User agent string from the request.
	pub user_agent: Option<String>,
}

impl AuditLogEntry {
	/// Materialize a draft into a persisted entry with recorder-assigned
	/// id and timestamp.
	pub fn from_event(event: AuditEvent, id: Uuid, timestamp: DateTime<Utc>) -> Self {
		Self {
			id,
			timestamp,
			action_type: event.action_type,
			severity: event.severity,
			tenant_id: event.tenant_id,
			user_id: event.user_id,
			target_user_id: event.target_user_id,
			target_resource_id: event.target_resource_id,
			target_resource_type: event.target_resource_type,
			description: event.description,
			changes: event.changes,
			metadata: event.metadata,
			ip_address: event.ip_address,
			user_agent: event.user_agent,
		}
	}
}

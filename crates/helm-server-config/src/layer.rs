// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial server configuration, merged across sources before finalizing.

use serde::Deserialize;

use crate::sections::{AuditConfigLayer, DatabaseConfigLayer, LoggingConfigLayer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub audit: Option<AuditConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		match (&mut self.database, other.database) {
			(Some(base), Some(overlay)) => base.merge(overlay),
			(base @ None, overlay @ Some(_)) => *base = overlay,
			_ => {}
		}
		match (&mut self.logging, other.logging) {
			(Some(base), Some(overlay)) => base.merge(overlay),
			(base @ None, overlay @ Some(_)) => *base = overlay,
			_ => {}
		}
		match (&mut self.audit, other.audit) {
			(Some(base), Some(overlay)) => base.merge(overlay),
			(base @ None, overlay @ Some(_)) => *base = overlay,
			_ => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_prefers_overlay_fields() {
		let mut base = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:./base.db".to_string()),
			}),
			audit: Some(AuditConfigLayer {
				retention_days: Some(90),
				..Default::default()
			}),
			..Default::default()
		};

		base.merge(ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:./overlay.db".to_string()),
			}),
			audit: Some(AuditConfigLayer {
				query_limit: Some(25),
				..Default::default()
			}),
			..Default::default()
		});

		assert_eq!(
			base.database.unwrap().url,
			Some("sqlite:./overlay.db".to_string())
		);
		let audit = base.audit.unwrap();
		assert_eq!(audit.retention_days, Some(90));
		assert_eq!(audit.query_limit, Some(25));
	}

	#[test]
	fn merge_adopts_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			logging: Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(base.logging.unwrap().level, Some("debug".to_string()));
	}

	#[test]
	fn parses_from_toml() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
			[database]
			url = "sqlite:/var/lib/helm/data.db"

			[audit]
			retention_days = 30
			"#,
		)
		.unwrap();

		assert_eq!(
			layer.database.unwrap().url,
			Some("sqlite:/var/lib/helm/data.db".to_string())
		);
		assert_eq!(layer.audit.unwrap().retention_days, Some(30));
	}
}

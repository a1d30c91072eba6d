//! `SHOW READYSET STATUS` rows and their typed view.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SHOW_READYSET_STATUS: &str = "SHOW READYSET STATUS";

/// Row name reporting ReadySet's connection to its upstream database
pub const DATABASE_CONNECTION: &str = "Database Connection";

/// Value of [`DATABASE_CONNECTION`] when the upstream connection is up
pub const CONNECTED: &str = "Connected";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// One name/value pair returned by `SHOW READYSET STATUS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub name: String,
    pub value: String,
}

impl StatusRow {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// True when the rows report ReadySet as connected to its upstream database
pub fn is_upstream_connected(rows: &[StatusRow]) -> bool {
    rows.iter()
        .any(|row| row.name == DATABASE_CONNECTION && row.value == CONNECTED)
}

/// ReadySet's reported status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadysetStatus {
    pub connection_count: u64,
    /// Snake-cased status, e.g. `connected`
    pub database_connection_status: Option<String>,
    pub controller_status: Option<String>,
    /// Snake-cased status, e.g. `completed`
    pub snapshot_status: Option<String>,
    pub last_completed_snapshot: Option<NaiveDateTime>,
    pub last_replicator_error: Option<String>,
    pub last_started_controller: Option<NaiveDateTime>,
    pub last_started_replication: Option<NaiveDateTime>,
    pub minimum_replication_offset: Option<String>,
    pub maximum_replication_offset: Option<String>,
}

impl ReadysetStatus {
    pub fn from_rows(rows: &[StatusRow]) -> Self {
        let attributes: HashMap<&str, &str> = rows
            .iter()
            .map(|row| (row.name.as_str(), row.value.as_str()))
            .collect();
        let text = |name: &str| attributes.get(name).map(|value| value.to_string());
        let timestamp = |name: &str| attributes.get(name).and_then(|value| parse_timestamp(value));

        Self {
            connection_count: attributes
                .get("Connection Count")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(0),
            database_connection_status: attributes.get(DATABASE_CONNECTION).map(|v| snake_case(v)),
            controller_status: text("ReadySet Controller Status"),
            snapshot_status: attributes.get("Snapshot Status").map(|v| snake_case(v)),
            last_completed_snapshot: timestamp("Last completed snapshot"),
            last_replicator_error: text("Last replicator error"),
            last_started_controller: timestamp("Last started Controller"),
            last_started_replication: timestamp("Last started replication"),
            minimum_replication_offset: text("Minimum Replication Offset"),
            maximum_replication_offset: text("Maximum Replication Offset"),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.database_connection_status.as_deref() == Some("connected")
    }
}

fn snake_case(value: &str) -> String {
    value.trim().to_lowercase().replace(' ', "_")
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn status_rows() -> Vec<StatusRow> {
        vec![
            StatusRow::new("Database Connection", "Connected"),
            StatusRow::new("Connection Count", "5"),
            StatusRow::new("Snapshot Status", "Completed"),
            StatusRow::new("Maximum Replication Offset", "(0/33ED51B8, 0/33ED51E8)"),
            StatusRow::new("Minimum Replication Offset", "(0/33ED51B8, 0/33ED51E8)"),
            StatusRow::new("Last started Controller", "2023-11-22 16:40:34"),
            StatusRow::new("Last completed snapshot", "2023-11-22 16:40:34"),
            StatusRow::new("Last started replication", "not a time"),
        ]
    }

    #[test]
    fn test_upstream_connected() {
        assert!(is_upstream_connected(&status_rows()));
        assert!(!is_upstream_connected(&[StatusRow::new(
            DATABASE_CONNECTION,
            "Not Connected"
        )]));
        assert!(!is_upstream_connected(&[StatusRow::new("Connection Count", "Connected")]));
        assert!(!is_upstream_connected(&[]));
    }

    #[test]
    fn test_from_rows() {
        let status = ReadysetStatus::from_rows(&status_rows());
        let expected = NaiveDate::from_ymd_opt(2023, 11, 22)
            .and_then(|d| d.and_hms_opt(16, 40, 34));

        assert!(status.is_connected());
        assert_eq!(status.connection_count, 5);
        assert_eq!(status.snapshot_status.as_deref(), Some("completed"));
        assert_eq!(status.last_started_controller, expected);
        assert_eq!(status.last_completed_snapshot, expected);
        assert_eq!(status.last_started_replication, None);
        assert_eq!(status.last_replicator_error, None);
        assert_eq!(
            status.minimum_replication_offset.as_deref(),
            Some("(0/33ED51B8, 0/33ED51E8)")
        );
    }

    #[test]
    fn test_not_connected_status_is_snake_cased() {
        let status =
            ReadysetStatus::from_rows(&[StatusRow::new(DATABASE_CONNECTION, "Not Connected")]);

        assert_eq!(status.database_connection_status.as_deref(), Some("not_connected"));
        assert!(!status.is_connected());
        assert_eq!(status.connection_count, 0);
    }
}

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    /// Exited on its own with code 0.
    Completed,
    /// Exited on its own with a non-zero code.
    Failed,
    /// Killed by the supervisor or a client.
    Terminated,
    /// The supervisor itself failed to drive the child.
    Error,
}

impl ProcessStatus {
    pub const ALL: [ProcessStatus; 5] = [
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Terminated,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
            Self::Error => "error",
        }
    }

    /// Every state except `running` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "terminated" => Ok(Self::Terminated),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "Invalid status '{other}'. Valid values: running, completed, failed, terminated, error"
            )),
        }
    }
}

/// A single captured output line with its capture time.
///
/// Within one stream timestamps are non-decreasing; lines appended as a batch
/// share the batch flush time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(with = "micro_ts")]
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

/// Immutable snapshot of a process record for external consumption.
///
/// Omits internal task handles and raw log file paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub shell_cmd: String,
    pub directory: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envs: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub encoding: String,
    pub description: String,
    pub labels: Vec<String>,
    #[serde(with = "micro_ts")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "micro_ts_opt", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// ISO-8601 timestamps with microsecond precision, the on-disk and wire format
/// for every timestamp this crate emits.
pub mod micro_ts {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Accepts both offset-carrying RFC 3339 strings and the naive
    /// `YYYY-MM-DDTHH:MM:SS[.ffffff]` form (treated as UTC).
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
    }
}

mod micro_ts_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => super::micro_ts::serialize(dt, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|r| super::micro_ts::parse(&r).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in ProcessStatus::ALL {
            let parsed: ProcessStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_rejects_unknown_value() {
        let err = "paused".parse::<ProcessStatus>().unwrap_err();
        assert!(err.contains("Invalid status 'paused'"));
    }

    #[test]
    fn test_only_running_is_non_terminal() {
        for status in ProcessStatus::ALL {
            assert_eq!(status.is_terminal(), status != ProcessStatus::Running);
        }
    }

    #[test]
    fn test_log_entry_json_round_trip() {
        let entry = LogEntry::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 15).unwrap()
                + chrono::Duration::microseconds(123_456),
            "hello",
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("2025-03-01T08:30:15.123456Z"), "{json}");
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_log_entry_parses_naive_timestamp() {
        let back: LogEntry =
            serde_json::from_str(r#"{"timestamp":"2025-03-01T08:30:15.000001","text":"x"}"#)
                .unwrap();
        assert_eq!(back.timestamp.timestamp_subsec_micros(), 1);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessStatus::Terminated).unwrap(),
            "\"terminated\""
        );
    }
}

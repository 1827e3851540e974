use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// # Run Summary
///
/// Totals for one pass over the input list, written as JSON when a summary
/// path is configured and logged at the end of every run.
///
/// ## Fields
/// - `submitted`: addresses the feeder put on the intake queue
/// - `valid` / `invalid`: outcomes the collector received
/// - `unresolved`: submitted addresses that never produced an outcome
///   (non-zero only after an interrupt)
/// - `cancelled`: whether the run was cut short by a signal
///
/// ## Example JSON
/// ```json
/// {
///   "submitted": 3,
///   "valid": 2,
///   "invalid": 1,
///   "unresolved": 0,
///   "cancelled": false,
///   "started_at": "2024-03-10T15:30:45.123456789Z",
///   "finished_at": "2024-03-10T15:30:46.987654321Z"
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub valid: usize,
    pub invalid: usize,
    pub unresolved: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Builds a summary stamped with the current time as `finished_at`.
    pub fn finish(
        started_at: DateTime<Utc>,
        submitted: usize,
        valid: usize,
        invalid: usize,
        cancelled: bool,
    ) -> Self {
        Self {
            submitted,
            valid,
            invalid,
            unresolved: submitted.saturating_sub(valid + invalid),
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Writes the summary as pretty-printed JSON, replacing any existing file.
    pub async fn write_to(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| AppError::SummaryWrite {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_counts_unresolved() {
        let summary = RunSummary::finish(Utc::now(), 10, 4, 3, true);

        assert_eq!(summary.unresolved, 3);
        assert!(summary.cancelled);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn test_timestamps_serialize_as_rfc3339() {
        let summary = RunSummary::finish(Utc::now(), 1, 1, 0, false);
        let json = serde_json::to_value(&summary).unwrap();

        let started = json["started_at"].as_str().unwrap();
        assert!(
            DateTime::parse_from_rfc3339(started).is_ok(),
            "Timestamp should be valid RFC3339 format"
        );
        assert_eq!(json["submitted"], 1);
        assert_eq!(json["unresolved"], 0);
    }

    #[tokio::test]
    async fn test_write_to_round_trips_through_file() {
        let path = std::env::temp_dir().join(format!(
            "mx-sanitizer-summary-{}.json",
            std::process::id()
        ));
        let summary = RunSummary::finish(Utc::now(), 2, 1, 1, false);

        summary.write_to(&path).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        let parsed: RunSummary = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, summary);
    }

    #[tokio::test]
    async fn test_write_to_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join("mx-sanitizer-no-such-dir")
            .join("summary.json");
        let summary = RunSummary::finish(Utc::now(), 0, 0, 0, false);

        let result = summary.write_to(&path).await;
        assert!(matches!(result, Err(AppError::SummaryWrite { .. })));
    }
}

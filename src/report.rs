/// Run report: a JSON summary of one sequence run, written on request.
///
/// Uses atomic write pattern: write to temp file then rename.
use crate::executor::{RunOutcome, StepEvent};
use crate::sequence::{ShutdownSequence, Step};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The JSON payload written to the `--report` path.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pid: i32,
    /// Canonical text of the sequence that ran.
    pub sequence: String,
    pub steps: Vec<Step>,
    pub polling_period_secs: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: &'static str,
    pub error: Option<String>,
    pub trace: Vec<StepEvent>,
}

impl RunReport {
    pub fn new(
        pid: i32,
        sequence: &ShutdownSequence,
        polling_period_secs: u64,
        started_at: DateTime<Utc>,
        outcome: &RunOutcome,
        trace: Vec<StepEvent>,
    ) -> Self {
        let error = match outcome {
            RunOutcome::Failed { cause } => Some(cause.to_string()),
            _ => None,
        };
        Self {
            pid,
            sequence: sequence.to_string(),
            steps: sequence.steps().collect(),
            polling_period_secs,
            started_at,
            finished_at: Utc::now(),
            outcome: outcome.label(),
            error,
            trace,
        }
    }

    /// Atomically write the report to `path`.
    ///
    /// Writes to a temporary file in the same directory, then renames
    /// to ensure readers never see a partial write.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ReportError::Serialize { source: e })?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp_path = dir.join(format!(".morta-report.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| ReportError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            ReportError::Rename {
                from: tmp_path,
                to: path.to_path_buf(),
                source: e,
            }
        })?;

        Ok(())
    }
}

/// Errors from report file operations.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize run report: {source}")]
    Serialize { source: serde_json::Error },

    #[error("failed to write run report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionError;
    use crate::sequence::parse;
    use crate::signal::SignalKind;
    use tempfile::tempdir;

    fn sample(outcome: &RunOutcome) -> RunReport {
        let trace = vec![
            StepEvent::SignalSent {
                step: 0,
                signal: SignalKind::Term,
            },
            StepEvent::WaitStarted {
                step: 1,
                seconds: 5,
            },
            StepEvent::ProcessExited {
                step: 1,
                elapsed_ms: 1000,
            },
        ];
        RunReport::new(
            321,
            &parse("term:5:kill").unwrap(),
            1,
            Utc::now(),
            outcome,
            trace,
        )
    }

    #[test]
    fn test_write_creates_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");

        sample(&RunOutcome::ProcessExited).write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["pid"], 321);
        assert_eq!(value["sequence"], "term:5:kill");
        assert_eq!(value["outcome"], "process_exited");
        assert!(value["error"].is_null());
        assert_eq!(value["steps"].as_array().unwrap().len(), 3);
        assert_eq!(value["trace"][2]["event"], "process_exited");
        assert!(value["started_at"].is_string());
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample(&RunOutcome::SequenceExhausted).write(&path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("report.json")]);
    }

    #[test]
    fn test_write_overwrites_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, "stale").unwrap();

        sample(&RunOutcome::SequenceExhausted).write(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("sequence_exhausted"));
    }

    #[test]
    fn test_failed_outcome_records_cause() {
        let report = sample(&RunOutcome::Failed {
            cause: ExecutionError::Interrupted,
        });
        assert_eq!(report.outcome, "failed");
        assert_eq!(report.error.as_deref(), Some("shutdown sequence interrupted"));
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let err = sample(&RunOutcome::ProcessExited)
            .write(Path::new("/nonexistent-dir/impossible/report.json"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}

//! Human and JSON rendering of plans and outcomes

use serde::Serialize;
use std::io::Write;

use s3util_core::{AggregateOutcome, TransferJob};

/// JSON shape of one failed job
#[derive(Debug, Serialize)]
pub struct FailureReport<'a> {
    pub job: &'a TransferJob,
    pub error: String,
}

/// JSON shape of a finished run
#[derive(Debug, Serialize)]
pub struct OutcomeReport<'a> {
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_transferred: u64,
    pub failures: Vec<FailureReport<'a>>,
}

impl<'a> From<&'a AggregateOutcome> for OutcomeReport<'a> {
    fn from(outcome: &'a AggregateOutcome) -> Self {
        Self {
            succeeded: outcome.succeeded,
            failed: outcome.failed.len(),
            bytes_transferred: outcome.bytes_transferred,
            failures: outcome
                .failed
                .iter()
                .map(|failure| FailureReport {
                    job: &failure.job,
                    error: failure.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Print planned jobs, one per line or as a JSON array
pub fn write_plan(out: &mut impl Write, jobs: &[TransferJob], json: bool) -> crate::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, jobs)?;
        writeln!(out)?;
    } else {
        for job in jobs {
            writeln!(out, "{}", job)?;
        }
    }
    Ok(())
}

/// Print failures in submission order followed by a summary line
///
/// Failures and the summary always go to `err`. With `json` the full report
/// is also written to `out`.
pub fn write_outcome(
    out: &mut impl Write,
    err: &mut impl Write,
    outcome: &AggregateOutcome,
    json: bool,
) -> crate::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, &OutcomeReport::from(outcome))?;
        writeln!(out)?;
    }

    for failure in &outcome.failed {
        writeln!(err, "{}", failure)?;
    }
    writeln!(
        err,
        "{} succeeded, {} failed",
        outcome.succeeded,
        outcome.failed.len()
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use s3util_core::{JobError, StorageLocator, TransferResult};
    use std::path::PathBuf;

    fn outcome() -> AggregateOutcome {
        let ok = TransferJob::upload(PathBuf::from("/data/a.txt"), StorageLocator::new("b", "a.txt"));
        let bad = TransferJob::upload(PathBuf::from("/data/b.txt"), StorageLocator::new("b", "b.txt"));
        AggregateOutcome::from_results(vec![
            TransferResult {
                job: ok,
                outcome: Ok(4),
            },
            TransferResult {
                job: bad,
                outcome: Err(JobError::Aborted("boom".into())),
            },
        ])
    }

    #[test]
    fn test_text_outcome() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_outcome(&mut out, &mut err, &outcome(), false).unwrap();

        let err = String::from_utf8(err).unwrap();
        let lines: Vec<&str> = err.lines().collect();
        assert!(out.is_empty());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("/data/b.txt -> s3://b/b.txt: "));
        assert!(lines[0].contains("boom"));
        assert_eq!(lines[1], "1 succeeded, 1 failed");
    }

    #[test]
    fn test_json_outcome() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_outcome(&mut out, &mut err, &outcome(), true).unwrap();

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["succeeded"], 1);
        assert_eq!(report["failed"], 1);
        assert_eq!(report["bytes_transferred"], 4);
        assert_eq!(report["failures"][0]["job"]["direction"], "upload");

        let err = String::from_utf8(err).unwrap();
        let lines: Vec<&str> = err.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("/data/b.txt -> s3://b/b.txt: "));
        assert_eq!(lines[1], "1 succeeded, 1 failed");
    }

    #[test]
    fn test_text_plan() {
        let jobs = vec![TransferJob::download(
            StorageLocator::new("b", "logs/a.txt"),
            PathBuf::from("/out/a.txt"),
        )];
        let mut out = Vec::new();
        write_plan(&mut out, &jobs, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "s3://b/logs/a.txt -> /out/a.txt\n");
    }
}

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::app::bugreport::archive::{extract_and_filter_bugreport, latest_bugreport};
use crate::app::bugreport::durations::{duration_metrics, DurationMetrics};
use crate::app::config::CollectorSettings;
use crate::app::error::AppError;
use crate::app::models::DurationReport;

/// Lifecycle shared by the metric collectors a test listener drives:
/// start before the test, read metrics after, stop at teardown.
pub trait CollectorHelper {
    type Value;

    fn start_collecting(&mut self) -> bool;

    fn get_metrics(&mut self) -> Result<BTreeMap<String, Self::Value>, AppError>;

    fn stop_collecting(&mut self) -> bool;
}

/// Section durations from the newest bugreport archive in a directory.
#[derive(Debug, Clone)]
pub struct BugreportDurationCollector {
    dir: PathBuf,
    trace_id: String,
}

impl BugreportDurationCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            trace_id: String::new(),
        }
    }

    pub fn from_config(settings: &CollectorSettings) -> Self {
        Self::new(settings.bugreport_dir.trim())
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_bugreport(&self) -> Result<Option<String>, AppError> {
        latest_bugreport(&self.dir, &self.trace_id)
    }

    pub fn collect_report(&self) -> Result<DurationReport, AppError> {
        let archive = self.latest_bugreport()?.ok_or_else(|| {
            AppError::not_found(
                format!("No bugreport archive found in {}", self.dir.display()),
                &self.trace_id,
            )
        })?;
        self.collect_archive_report(archive)
    }

    /// Same as [`Self::collect_report`] for a named archive in the directory.
    pub fn collect_archive_report(&self, archive: String) -> Result<DurationReport, AppError> {
        let lines = extract_and_filter_bugreport(&self.dir, &archive, &self.trace_id)?;
        let metrics = duration_metrics(&lines);
        info!(
            trace_id = %self.trace_id,
            archive = %archive,
            dumpstate_lines = lines.dumpstate_lines.len(),
            dumpsys_lines = lines.dumpsys_lines.len(),
            metrics = metrics.len(),
            "Collected bugreport durations"
        );
        Ok(DurationReport {
            trace_id: self.trace_id.clone(),
            bugreport_dir: self.dir.to_string_lossy().to_string(),
            archive,
            generated_at: Utc::now().to_rfc3339(),
            dumpstate_lines: lines.dumpstate_lines.len(),
            dumpsys_lines: lines.dumpsys_lines.len(),
            metrics,
        })
    }
}

impl CollectorHelper for BugreportDurationCollector {
    type Value = f64;

    fn start_collecting(&mut self) -> bool {
        info!(trace_id = %self.trace_id, dir = %self.dir.display(), "Bugreport duration collector started");
        true
    }

    fn get_metrics(&mut self) -> Result<DurationMetrics, AppError> {
        match self.collect_report() {
            Ok(report) => Ok(report.metrics),
            Err(err) => {
                warn!(
                    trace_id = %self.trace_id,
                    error = %err.error,
                    code = %err.code,
                    "Failed to collect bugreport durations"
                );
                Err(err)
            }
        }
    }

    fn stop_collecting(&mut self) -> bool {
        info!(trace_id = %self.trace_id, dir = %self.dir.display(), "Bugreport duration collector stopped");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    const DELTA: f64 = 0.00001;

    fn write_archive(dir: &Path, name: &str, lines: &[&str]) {
        let file = File::create(dir.join(format!("{name}.zip"))).expect("create zip");
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(format!("{name}.txt"), FileOptions::<()>::default())
            .expect("start entry");
        for line in lines {
            zip.write_all(format!("{line}\n").as_bytes()).expect("write line");
        }
        zip.finish().expect("finish zip");
    }

    #[test]
    fn get_metrics_reads_latest_archive() {
        let dir = TempDir::new().expect("tmp");
        write_archive(
            dir.path(),
            "bugreport",
            &[
                "------ 44.619s was the duration of 'dumpstate_board()' ------",
                "------ 21.397s was the duration of 'DUMPSYS' ------",
                "------ 0.022s was the duration of 'DUMPSYS CRITICAL PROTO' ------",
                "--------- 0.051s was the duration of dumpsys SurfaceFlinger, ending at: 2023-04-27 23:50:35",
                "--------- 24.741s was the duration of dumpsys meminfo, ending at: 2023-04-27 23:51:38",
                "unrelated log line",
            ],
        );

        let mut collector = BugreportDurationCollector::new(dir.path());
        assert!(collector.start_collecting());
        let metrics = collector.get_metrics().expect("metrics");
        assert!(collector.stop_collecting());

        assert_eq!(metrics.len(), 5);
        assert!((metrics["bugreport-duration-dumpstate_board()"] - 44.619).abs() < DELTA);
        assert!((metrics["bugreport-duration-dumpsys"] - 21.397).abs() < DELTA);
        assert!((metrics["bugreport-duration-dumpsys-critical-proto"] - 0.022).abs() < DELTA);
        assert!((metrics["bugreport-dumpsys-duration-SurfaceFlinger"] - 0.051).abs() < DELTA);
        assert!((metrics["bugreport-dumpsys-duration-meminfo"] - 24.741).abs() < DELTA);
    }

    #[test]
    fn newest_archive_wins() {
        let dir = TempDir::new().expect("tmp");
        write_archive(
            dir.path(),
            "bugreport-2022-04-20-21-44-11",
            &["------ 1.000s was the duration of 'PROCRANK' ------"],
        );
        write_archive(
            dir.path(),
            "bugreport-2022-04-23-03-12-33",
            &["------ 3.000s was the duration of 'PROCRANK' ------"],
        );

        let collector = BugreportDurationCollector::new(dir.path()).with_trace_id("trace-newest");
        let report = collector.collect_report().expect("report");
        assert_eq!(report.archive, "bugreport-2022-04-23-03-12-33.zip");
        assert_eq!(report.trace_id, "trace-newest");
        assert_eq!(report.dumpstate_lines, 1);
        assert!((report.metrics["bugreport-duration-procrank"] - 3.0).abs() < DELTA);
    }

    #[test]
    fn missing_archive_is_not_found() {
        let dir = TempDir::new().expect("tmp");
        let mut collector = BugreportDurationCollector::new(dir.path());
        let err = collector.get_metrics().expect_err("expected error");
        assert!(err.is_not_found());
        assert!(err.error.contains("No bugreport archive found"));
    }

    #[test]
    fn lifecycle_hooks_succeed_without_archives() {
        let dir = TempDir::new().expect("tmp");
        let mut collector = BugreportDurationCollector::new(dir.path()).with_trace_id("trace-lifecycle");
        assert!(collector.start_collecting());
        assert!(collector.get_metrics().is_err());
        assert!(collector.stop_collecting());
        assert!(collector.stop_collecting());
    }

    #[test]
    fn from_config_uses_configured_dir() {
        let settings = CollectorSettings {
            bugreport_dir: " /data/local/tmp/reports ".to_string(),
        };
        let collector = BugreportDurationCollector::from_config(&settings);
        assert_eq!(collector.dir(), Path::new("/data/local/tmp/reports"));
    }
}

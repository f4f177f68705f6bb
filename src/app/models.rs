use serde::{Deserialize, Serialize};

use crate::app::bugreport::durations::DurationMetrics;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationReport {
    pub trace_id: String,
    pub bugreport_dir: String,
    pub archive: String,
    pub generated_at: String,
    pub dumpstate_lines: usize,
    pub dumpsys_lines: usize,
    pub metrics: DurationMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResult {
    pub serial: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PulledBugreport {
    pub serial: String,
    pub remote_path: String,
    pub local_path: String,
}

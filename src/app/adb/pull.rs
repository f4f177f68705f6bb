use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::app::adb::runner::{device_args, run_adb};
use crate::app::bugreport::archive::is_bugreport_archive_name;
use crate::app::error::AppError;
use crate::app::models::PulledBugreport;

/// File names from `ls -1 <dir>` output that look like bugreport archives.
pub fn list_remote_bugreports(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.rsplit('/').next().unwrap_or(line))
        .filter(|name| is_bugreport_archive_name(name))
        .map(str::to_string)
        .collect()
}

pub fn latest_remote_bugreport(output: &str) -> Option<String> {
    list_remote_bugreports(output).into_iter().max()
}

fn remote_join(remote_dir: &str, name: &str) -> String {
    format!("{}/{}", remote_dir.trim().trim_end_matches('/'), name)
}

/// Copies the newest archive under `remote_dir` on the device into `local_dir`.
pub fn pull_latest_bugreport(
    adb_program: &str,
    serial: &str,
    remote_dir: &str,
    local_dir: &Path,
    timeout: Duration,
    trace_id: &str,
) -> Result<PulledBugreport, AppError> {
    let listing = run_adb(
        adb_program,
        &device_args(serial, &["shell", "ls", "-1", remote_dir]),
        timeout,
        trace_id,
    )?;
    if !listing.succeeded() {
        return Err(AppError::dependency(
            format!("Failed to list {remote_dir}: {}", listing.stderr.trim()),
            trace_id,
        ));
    }
    let name = latest_remote_bugreport(&listing.stdout).ok_or_else(|| {
        AppError::not_found(format!("No bugreport archive found in {remote_dir}"), trace_id)
    })?;

    fs::create_dir_all(local_dir).map_err(|err| {
        AppError::system(format!("Failed to create output dir: {err}"), trace_id)
    })?;
    let remote_path = remote_join(remote_dir, &name);
    let local_path = local_dir.join(&name);
    let local_arg = local_path.to_string_lossy().to_string();
    let pull = run_adb(
        adb_program,
        &device_args(serial, &["pull", remote_path.as_str(), local_arg.as_str()]),
        timeout,
        trace_id,
    )?;
    if !pull.succeeded() {
        return Err(AppError::dependency(
            format!("Failed to pull bugreport: {}", pull.stderr.trim()),
            trace_id,
        ));
    }
    info!(trace_id = %trace_id, remote = %remote_path, local = %local_arg, "Pulled bugreport");

    Ok(PulledBugreport {
        serial: serial.trim().to_string(),
        remote_path,
        local_path: local_arg,
    })
}

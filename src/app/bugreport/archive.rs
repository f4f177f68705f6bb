use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};
use zip::read::ZipArchive;

use crate::app::bugreport::durations::BugreportDurationLines;
use crate::app::error::AppError;

const READ_BUFFER_SIZE: usize = 64 * 1024;
const ARCHIVE_PREFIX: &str = "bugreport";

pub fn is_bugreport_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    name.starts_with(ARCHIVE_PREFIX) && lower.ends_with(".zip")
}

/// Names are `bugreport-YYYY-MM-DD-HH-MM-SS.zip`, so the greatest name is the newest.
pub fn latest_bugreport(dir: &Path, trace_id: &str) -> Result<Option<String>, AppError> {
    let entries = fs::read_dir(dir).map_err(|err| {
        AppError::system(
            format!("Failed to read bugreport dir {}: {err}", dir.display()),
            trace_id,
        )
    })?;

    let mut latest: Option<String> = None;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "Skipping unreadable dir entry");
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_bugreport_archive_name(&name) {
            continue;
        }
        if latest.as_deref().is_none_or(|current| name.as_str() > current) {
            latest = Some(name);
        }
    }
    debug!(trace_id = %trace_id, latest = ?latest, dir = %dir.display(), "Scanned bugreport dir");
    Ok(latest)
}

/// Reads the text dump inside `archive_name` and keeps only duration lines.
pub fn extract_and_filter_bugreport(
    dir: &Path,
    archive_name: &str,
    trace_id: &str,
) -> Result<BugreportDurationLines, AppError> {
    let archive_path = dir.join(archive_name);
    let file = File::open(&archive_path).map_err(|err| {
        AppError::system(
            format!("Failed to open bugreport zip {}: {err}", archive_path.display()),
            trace_id,
        )
    })?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| AppError::system(format!("Failed to read bugreport zip: {err}"), trace_id))?;

    let expected = text_entry_name(archive_name);
    let index = match archive.index_for_name(&expected) {
        Some(index) => index,
        None => {
            warn!(
                trace_id = %trace_id,
                expected = %expected,
                "Bugreport entry not found by name; scanning archive"
            );
            find_bugreport_entry(&mut archive, trace_id)?
        }
    };
    let entry = archive
        .by_index(index)
        .map_err(|err| AppError::system(format!("Failed to open bugreport entry: {err}"), trace_id))?;
    read_bugreport_lines(entry, trace_id)
}

/// Streams any text dump through the duration line filter.
pub fn read_bugreport_lines<R: Read>(
    reader: R,
    trace_id: &str,
) -> Result<BugreportDurationLines, AppError> {
    let mut buf_reader = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
    let mut buffer = Vec::with_capacity(4096);
    let mut lines = BugreportDurationLines::new();

    loop {
        buffer.clear();
        let bytes = buf_reader.read_until(b'\n', &mut buffer).map_err(|err| {
            AppError::system(format!("Failed to read bugreport content: {err}"), trace_id)
        })?;
        if bytes == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buffer);
        lines.push(&line);
    }
    Ok(lines)
}

fn text_entry_name(archive_name: &str) -> String {
    let stem = Path::new(archive_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(archive_name);
    format!("{stem}.txt")
}

fn find_bugreport_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    trace_id: &str,
) -> Result<usize, AppError> {
    let mut chosen_index = None;
    let mut chosen_size = 0u64;
    for idx in 0..archive.len() {
        let file = archive
            .by_index(idx)
            .map_err(|err| AppError::system(format!("Failed to scan bugreport zip: {err}"), trace_id))?;
        let name = file.name().to_ascii_lowercase();
        if name.ends_with(".txt") && (name.contains("bugreport") || name.contains("main_entry")) {
            let size = file.size();
            if chosen_index.is_none() || size > chosen_size {
                chosen_index = Some(idx);
                chosen_size = size;
            }
        }
    }
    chosen_index
        .ok_or_else(|| AppError::not_found("No bugreport entry found in archive", trace_id))
}

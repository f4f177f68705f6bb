use std::path::Path;

use crate::app::config::DeviceSettings;
use crate::app::error::AppError;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

const DEFAULT_ADB_PROGRAM: &str = "adb";

/// An empty `device.adb_path` means `adb` from `PATH`.
pub fn resolve_adb_program(adb_path: &str) -> String {
    match normalize_command_path(adb_path) {
        path if path.is_empty() => DEFAULT_ADB_PROGRAM.to_string(),
        path => path,
    }
}

/// Bare program names are left to the `PATH` lookup at spawn time; anything
/// with a separator must be an existing file.
pub fn validate_adb_program(program: &str) -> Result<(), String> {
    let program = program.trim();
    if program.is_empty() {
        return Err("device.adb_path resolves to an empty adb program".to_string());
    }
    if !program.contains('/') && !program.contains(std::path::MAIN_SEPARATOR) {
        return Ok(());
    }
    let path = Path::new(program);
    if !path.exists() {
        return Err(format!(
            "adb not found at device.adb_path {program}; cannot reach the device for bugreports"
        ));
    }
    if !path.is_file() {
        return Err(format!("device.adb_path {program} is not an adb executable file"));
    }
    Ok(())
}

pub fn adb_program_from_settings(settings: &DeviceSettings, trace_id: &str) -> Result<String, AppError> {
    let program = resolve_adb_program(&settings.adb_path);
    validate_adb_program(&program).map_err(|message| AppError::validation(message, trace_id))?;
    Ok(program)
}

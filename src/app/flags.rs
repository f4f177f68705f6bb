//! Feature-flag gating for test runs.
//!
//! A test (or the class holding it) may require flags to be on or off. Flag
//! names are `{package}.{flag}`. A non-empty list on the test itself replaces
//! the class-level list of the same kind; the other list still comes from the
//! class.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::app::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagRequirements {
    #[serde(default)]
    pub required_on: Vec<String>,
    #[serde(default)]
    pub required_off: Vec<String>,
}

impl FlagRequirements {
    pub fn new(required_on: Vec<String>, required_off: Vec<String>) -> Self {
        Self {
            required_on,
            required_off,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.required_on.is_empty() && self.required_off.is_empty()
    }

    /// Requirements that apply to a test given its own and its class's.
    /// Each list resolves on its own: a method-level `required_on` replaces
    /// the class-level `required_on` but leaves the class's `required_off`.
    pub fn effective(
        method: Option<&FlagRequirements>,
        class: Option<&FlagRequirements>,
    ) -> FlagRequirements {
        FlagRequirements {
            required_on: first_non_empty(
                method.map(|req| &req.required_on),
                class.map(|req| &req.required_on),
            ),
            required_off: first_non_empty(
                method.map(|req| &req.required_off),
                class.map(|req| &req.required_off),
            ),
        }
    }

    pub fn validate(&self, trace_id: &str) -> Result<(), AppError> {
        for name in self.required_on.iter().chain(self.required_off.iter()) {
            validate_flag_name(name).map_err(|message| AppError::validation(message, trace_id))?;
        }
        if let Some(name) = self
            .required_on
            .iter()
            .find(|name| self.required_off.contains(name))
        {
            return Err(AppError::validation(
                format!("Flag {name} cannot be required both on and off"),
                trace_id,
            ));
        }
        Ok(())
    }
}

fn first_non_empty(method: Option<&Vec<String>>, class: Option<&Vec<String>>) -> Vec<String> {
    method
        .filter(|names| !names.is_empty())
        .or(class)
        .cloned()
        .unwrap_or_default()
}

pub fn validate_flag_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Flag name is empty".to_string());
    }
    let Some((package, flag)) = trimmed.rsplit_once('.') else {
        return Err(format!("Flag {trimmed} must be of the form package.flag"));
    };
    let valid_segment =
        |segment: &str| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !package.split('.').all(valid_segment) || !valid_segment(flag) {
        return Err(format!("Flag {trimmed} contains an invalid segment"));
    }
    Ok(())
}

pub trait FlagSource {
    /// `None` when the source does not know the flag.
    fn flag_value(&self, name: &str) -> Option<bool>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticFlagSource {
    values: HashMap<String, bool>,
}

impl StaticFlagSource {
    pub fn new(values: HashMap<String, bool>) -> Self {
        Self { values }
    }

    pub fn from_dump(dump: &str) -> Self {
        Self::new(parse_flag_dump(dump))
    }

    pub fn from_path(path: &Path, trace_id: &str) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::system(
                format!("Failed to read flag dump {}: {err}", path.display()),
                trace_id,
            )
        })?;
        Ok(Self::from_dump(&raw))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FlagSource for StaticFlagSource {
    fn flag_value(&self, name: &str) -> Option<bool> {
        self.values.get(name.trim()).copied()
    }
}

/// Parses `name=true|false` lines; `#` comments, blanks and anything else are skipped.
pub fn parse_flag_dump(dump: &str) -> HashMap<String, bool> {
    let mut values = HashMap::new();
    for line in dump.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((name, value)) = trimmed.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = match value.trim().to_ascii_lowercase().as_str() {
            "true" | "enabled" | "1" => true,
            "false" | "disabled" | "0" => false,
            _ => continue,
        };
        if validate_flag_name(name).is_ok() {
            values.insert(name.to_string(), value);
        }
    }
    values
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FlagGate {
    Run,
    Skip { reason: String },
}

impl FlagGate {
    pub fn should_run(&self) -> bool {
        matches!(self, FlagGate::Run)
    }
}

/// Unknown flags count as off.
pub fn evaluate(requirements: &FlagRequirements, source: &dyn FlagSource) -> FlagGate {
    let not_on: Vec<&str> = requirements
        .required_on
        .iter()
        .map(|name| name.trim())
        .filter(|name| source.flag_value(name) != Some(true))
        .collect();
    let not_off: Vec<&str> = requirements
        .required_off
        .iter()
        .map(|name| name.trim())
        .filter(|name| source.flag_value(name) == Some(true))
        .collect();

    if not_on.is_empty() && not_off.is_empty() {
        return FlagGate::Run;
    }
    let mut reasons = Vec::new();
    if !not_on.is_empty() {
        reasons.push(format!("flags required on are off: {}", not_on.join(", ")));
    }
    if !not_off.is_empty() {
        reasons.push(format!("flags required off are on: {}", not_off.join(", ")));
    }
    let reason = reasons.join("; ");
    debug!(reason = %reason, "Flag requirements not met");
    FlagGate::Skip { reason }
}

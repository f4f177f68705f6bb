//! Section duration lines emitted by dumpstate while it builds a bugreport.
//!
//! Two line shapes carry durations:
//!
//! ```text
//! ------ 44.619s was the duration of 'dumpstate_board()' ------
//! --------- 0.051s was the duration of dumpsys SurfaceFlinger, ending at: 2023-04-27 23:50:35
//! ```

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Reported for a line whose seconds field does not parse.
pub const MISSING_DURATION: f64 = -1.0;

pub const DUMPSTATE_KEY_PREFIX: &str = "bugreport-duration-";
pub const DUMPSYS_KEY_PREFIX: &str = "bugreport-dumpsys-duration-";

const DUMPSTATE_FILTER: &str = "was the duration of '";
const DUMPSYS_FILTER: &str = "was the duration of dumpsys ";
// One line per process; far too many to be useful as metrics.
const SHOWMAP_FILTER: &str = "'SHOW MAP ";

pub type DurationMetrics = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BugreportDurationLines {
    pub dumpstate_lines: Vec<String>,
    pub dumpsys_lines: Vec<String>,
}

impl BugreportDurationLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filtered = Self::new();
        for line in lines {
            filtered.push(line.as_ref());
        }
        filtered
    }

    /// Keeps the line if it is a duration line; returns whether it was kept.
    pub fn push(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if is_dumpsys_duration_line(trimmed) {
            self.dumpsys_lines.push(trimmed.to_string());
            true
        } else if is_dumpstate_duration_line(trimmed) {
            self.dumpstate_lines.push(trimmed.to_string());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.dumpstate_lines.iter().any(|kept| kept == trimmed)
            || self.dumpsys_lines.iter().any(|kept| kept == trimmed)
    }

    pub fn is_empty(&self) -> bool {
        self.dumpstate_lines.is_empty() && self.dumpsys_lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dumpstate_lines.len() + self.dumpsys_lines.len()
    }
}

pub fn is_dumpstate_duration_line(line: &str) -> bool {
    line.contains(DUMPSTATE_FILTER) && !line.contains(SHOWMAP_FILTER)
}

pub fn is_dumpsys_duration_line(line: &str) -> bool {
    line.contains(DUMPSYS_FILTER)
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<seconds>\d+(?:\.\d+)?)s was the duration of ")
            .expect("duration regex should compile")
    })
}

fn dumpstate_section_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"was the duration of '(?P<section>.+)'")
            .expect("dumpstate section regex should compile")
    })
}

fn dumpsys_section_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"was the duration of dumpsys (?P<section>.+?), ending at:")
            .expect("dumpsys section regex should compile")
    })
}

/// Seconds reported by a duration line, or [`MISSING_DURATION`].
pub fn parse_decimal_duration(line: &str) -> f64 {
    duration_regex()
        .captures(line)
        .and_then(|caps| caps["seconds"].parse::<f64>().ok())
        .unwrap_or(MISSING_DURATION)
}

pub fn parse_dumpstate_section(line: &str) -> Option<String> {
    let caps = dumpstate_section_regex().captures(line)?;
    Some(caps["section"].to_string())
}

pub fn parse_dumpsys_section(line: &str) -> Option<String> {
    let caps = dumpsys_section_regex().captures(line)?;
    Some(caps["section"].to_string())
}

/// `PROCESSES AND THREADS` -> `bugreport-duration-processes-and-threads`.
pub fn dumpstate_section_key(section: &str) -> String {
    format!(
        "{DUMPSTATE_KEY_PREFIX}{}",
        section.replace(' ', "-").to_lowercase()
    )
}

/// Service names keep their case: `SurfaceFlinger` stays `SurfaceFlinger`.
pub fn dumpsys_section_key(section: &str) -> String {
    format!("{DUMPSYS_KEY_PREFIX}{section}")
}

pub fn duration_metrics(lines: &BugreportDurationLines) -> DurationMetrics {
    let mut metrics = DurationMetrics::new();
    for line in &lines.dumpstate_lines {
        if let Some(section) = parse_dumpstate_section(line) {
            metrics.insert(dumpstate_section_key(&section), parse_decimal_duration(line));
        }
    }
    for line in &lines.dumpsys_lines {
        if let Some(section) = parse_dumpsys_section(line) {
            metrics.insert(dumpsys_section_key(&section), parse_decimal_duration(line));
        }
    }
    metrics
}

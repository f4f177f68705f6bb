use std::path::PathBuf;
use std::time::Duration;

use bugreport_metrics_lib::app::adb::locator::adb_program_from_settings;
use bugreport_metrics_lib::app::adb::pull::pull_latest_bugreport;
use bugreport_metrics_lib::app::collector::BugreportDurationCollector;
use bugreport_metrics_lib::app::config::{config_path, load_config_from_path, MetricsConfig};
use bugreport_metrics_lib::app::error::AppError;
use bugreport_metrics_lib::app::flags::{evaluate, FlagGate, FlagRequirements, StaticFlagSource};
use bugreport_metrics_lib::app::logging::init_logging;
use bugreport_metrics_lib::app::models::DurationReport;
use bugreport_metrics_lib::app::scenario::{builtin_scenarios, find_scenario, run_scenario};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

const USAGE: &str = "Usage: bugreport_metrics [metrics|latest|pull|scenario NAME|scenarios|flags] \
[--config PATH] [--dir DIR] [--archive NAME] [--serial SERIAL] [--out DIR] [--json] \
[--flags-file PATH] [--require-on FLAG]... [--require-off FLAG]...";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Metrics,
    Latest,
    Pull,
    Scenario(String),
    ListScenarios,
    Flags,
}

#[derive(Debug, Clone)]
struct Args {
    action: Action,
    config: Option<PathBuf>,
    dir: Option<PathBuf>,
    archive: Option<String>,
    serial: Option<String>,
    out_dir: Option<PathBuf>,
    json: bool,
    flags_file: Option<PathBuf>,
    require_on: Vec<String>,
    require_off: Vec<String>,
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Result<Args, String> {
    let mut action: Option<Action> = None;
    let mut config = None;
    let mut dir = None;
    let mut archive = None;
    let mut serial = std::env::var("ANDROID_SERIAL")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let mut out_dir = None;
    let mut json = false;
    let mut flags_file = None;
    let mut require_on = Vec::new();
    let mut require_off = Vec::new();

    let value_for = |flag: &str, it: &mut I| -> Result<String, String> {
        it.next()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("{flag} requires a value"))
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value_for("--config", &mut it)?)),
            "--dir" => dir = Some(PathBuf::from(value_for("--dir", &mut it)?)),
            "--archive" => archive = Some(value_for("--archive", &mut it)?),
            "--serial" => serial = Some(value_for("--serial", &mut it)?),
            "--out" => out_dir = Some(PathBuf::from(value_for("--out", &mut it)?)),
            "--json" => json = true,
            "--flags-file" => flags_file = Some(PathBuf::from(value_for("--flags-file", &mut it)?)),
            "--require-on" => require_on.push(value_for("--require-on", &mut it)?),
            "--require-off" => require_off.push(value_for("--require-off", &mut it)?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with('-') => return Err(format!("Unknown arg: {other}")),
            command if action.is_none() => {
                action = Some(match command {
                    "metrics" => Action::Metrics,
                    "latest" => Action::Latest,
                    "pull" => Action::Pull,
                    "scenarios" => Action::ListScenarios,
                    "flags" => Action::Flags,
                    "scenario" => Action::Scenario(value_for("scenario", &mut it)?),
                    other => return Err(format!("Unknown command: {other}\n{USAGE}")),
                });
            }
            other => return Err(format!("Unexpected argument: {other}")),
        }
    }

    let action = action.unwrap_or(Action::Metrics);
    if action == Action::Flags && require_on.is_empty() && require_off.is_empty() {
        return Err("flags requires --require-on or --require-off".to_string());
    }

    Ok(Args {
        action,
        config,
        dir,
        archive,
        serial,
        out_dir,
        json,
        flags_file,
        require_on,
        require_off,
    })
}

fn print_output<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) {
    let output = if json {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    } else {
        text(value)
    };
    println!("{output}");
}

fn collector_for(args: &Args, config: &MetricsConfig, trace_id: &str) -> BugreportDurationCollector {
    let collector = match &args.dir {
        Some(dir) => BugreportDurationCollector::new(dir.clone()),
        None => BugreportDurationCollector::from_config(&config.collector),
    };
    collector.with_trace_id(trace_id)
}

/// Durations from `--archive` when given, otherwise from the newest archive.
fn metrics_report(args: &Args, config: &MetricsConfig, trace_id: &str) -> Result<DurationReport, AppError> {
    let collector = collector_for(args, config, trace_id);
    match &args.archive {
        Some(name) => collector.collect_archive_report(name.clone()),
        None => collector.collect_report(),
    }
}

fn print_report(report: &DurationReport, json: bool) {
    print_output(json, report, |report| {
        let mut text = format!("archive: {}\n", report.archive);
        for (key, value) in &report.metrics {
            text.push_str(&format!("{key} {value:.3}\n"));
        }
        text
    });
}

fn run(args: Args, config: MetricsConfig, trace_id: &str) -> Result<(), AppError> {
    let timeout = Duration::from_secs(config.device.command_timeout as u64);
    let serial = args
        .serial
        .clone()
        .unwrap_or_else(|| config.device.serial.clone());

    match &args.action {
        Action::Metrics => {
            print_report(&metrics_report(&args, &config, trace_id)?, args.json);
            Ok(())
        }
        Action::Latest => {
            let collector = collector_for(&args, &config, trace_id);
            let latest = collector.latest_bugreport()?.ok_or_else(|| {
                AppError::not_found(
                    format!("No bugreport archive found in {}", collector.dir().display()),
                    trace_id,
                )
            })?;
            print_output(args.json, &latest, |name| name.clone());
            Ok(())
        }
        Action::Pull => {
            let adb_program = adb_program_from_settings(&config.device, trace_id)?;
            let local_dir = args
                .out_dir
                .clone()
                .or_else(|| args.dir.clone())
                .unwrap_or_else(|| std::env::temp_dir().join("bugreport_metrics"));
            let pulled = pull_latest_bugreport(
                &adb_program,
                &serial,
                &config.device.remote_bugreport_dir,
                &local_dir,
                Duration::from_secs(config.device.pull_timeout as u64),
                trace_id,
            )?;
            if !args.json {
                println!("pulled: {}", pulled.local_path);
            }
            let archive = PathBuf::from(&pulled.local_path)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .ok_or_else(|| AppError::system("Pulled bugreport has no file name", trace_id))?;
            let collector = BugreportDurationCollector::new(local_dir).with_trace_id(trace_id);
            print_report(&collector.collect_archive_report(archive)?, args.json);
            Ok(())
        }
        Action::ListScenarios => {
            print_output(args.json, &builtin_scenarios(), |scenarios| {
                scenarios
                    .iter()
                    .map(|s| format!("{:<24} {}", s.name, s.description))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            Ok(())
        }
        Action::Scenario(name) => {
            let scenario = find_scenario(name).ok_or_else(|| {
                AppError::validation(format!("Unknown scenario: {name}"), trace_id)
            })?;
            let adb_program = adb_program_from_settings(&config.device, trace_id)?;
            let result = run_scenario(&adb_program, &serial, scenario, timeout, trace_id)?;
            let succeeded = result.succeeded();
            print_output(args.json, &result, |result| result.stdout.trim_end().to_string());
            if succeeded {
                Ok(())
            } else {
                Err(AppError::dependency(
                    format!("Scenario {} failed: {}", scenario.name, result.stderr.trim()),
                    trace_id,
                ))
            }
        }
        Action::Flags => {
            let requirements =
                FlagRequirements::new(args.require_on.clone(), args.require_off.clone());
            requirements.validate(trace_id)?;
            let dump_path = args.flags_file.clone().or_else(|| {
                Some(config.flags.flag_dump_path.trim())
                    .filter(|path| !path.is_empty())
                    .map(PathBuf::from)
            });
            let source = match dump_path {
                Some(path) => StaticFlagSource::from_path(&path, trace_id)?,
                None => StaticFlagSource::default(),
            };
            let gate = evaluate(&requirements, &source);
            print_output(args.json, &gate, |gate| match gate {
                FlagGate::Run => "run".to_string(),
                FlagGate::Skip { reason } => format!("skip: {reason}"),
            });
            Ok(())
        }
    }
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let config_file = args.config.clone().unwrap_or_else(config_path);
    let config = match load_config_from_path(&config_file) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(&config.logging);

    let trace_id = Uuid::new_v4().to_string();
    let json = args.json;
    if let Err(err) = run(args, config, &trace_id) {
        error!(trace_id = %trace_id, code = %err.code, error = %err.error, "Command failed");
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string())
            );
        } else {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_archive(dir: &Path, name: &str, line: &str) {
        let file = File::create(dir.join(format!("{name}.zip"))).expect("create zip");
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(format!("{name}.txt"), FileOptions::<()>::default())
            .expect("start entry");
        zip.write_all(format!("{line}\n").as_bytes()).expect("write line");
        zip.finish().expect("finish zip");
    }

    fn parse(args: &[&str]) -> Result<Args, String> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_to_metrics() {
        let args = parse(&["--dir", "/tmp/reports", "--json"]).expect("args");
        assert_eq!(args.action, Action::Metrics);
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/reports")));
        assert!(args.json);
    }

    #[test]
    fn parses_archive_name() {
        let args = parse(&["metrics", "--archive", "bugreport-2022-04-20-21-44-11.zip"])
            .expect("args");
        assert_eq!(args.action, Action::Metrics);
        assert_eq!(
            args.archive.as_deref(),
            Some("bugreport-2022-04-20-21-44-11.zip")
        );
        assert_eq!(parse(&[]).expect("args").archive, None);
        assert!(parse(&["--archive"]).unwrap_err().contains("--archive requires a value"));
    }

    #[test]
    fn metrics_reads_named_archive_instead_of_newest() {
        let dir = TempDir::new().expect("tmp");
        write_archive(
            dir.path(),
            "bugreport-2022-04-20-21-44-11",
            "------ 1.000s was the duration of 'PROCRANK' ------",
        );
        write_archive(
            dir.path(),
            "bugreport-2022-04-23-03-12-33",
            "------ 3.000s was the duration of 'PROCRANK' ------",
        );
        let dir_arg = dir.path().to_string_lossy().to_string();
        let config = MetricsConfig::default();

        let args = parse(&[
            "metrics",
            "--dir",
            dir_arg.as_str(),
            "--archive",
            "bugreport-2022-04-20-21-44-11.zip",
        ])
        .expect("args");
        let report = metrics_report(&args, &config, "trace-archive").expect("report");
        assert_eq!(report.archive, "bugreport-2022-04-20-21-44-11.zip");
        assert_eq!(report.trace_id, "trace-archive");
        assert!((report.metrics["bugreport-duration-procrank"] - 1.0).abs() < 0.00001);

        let args = parse(&["metrics", "--dir", dir_arg.as_str()]).expect("args");
        let report = metrics_report(&args, &config, "trace-archive").expect("report");
        assert_eq!(report.archive, "bugreport-2022-04-23-03-12-33.zip");

        let args = parse(&["--dir", dir_arg.as_str(), "--archive", "bugreport-missing.zip"])
            .expect("args");
        assert!(metrics_report(&args, &config, "trace-archive").is_err());
    }

    #[test]
    fn parses_scenario_name() {
        let args = parse(&["scenario", "open-bluetooth-media", "--serial", "R58N123"])
            .expect("args");
        assert_eq!(args.action, Action::Scenario("open-bluetooth-media".to_string()));
        assert_eq!(args.serial.as_deref(), Some("R58N123"));
    }

    #[test]
    fn collects_repeated_flag_requirements() {
        let args = parse(&[
            "flags",
            "--require-on",
            "a.b",
            "--require-on",
            "c.d",
            "--require-off",
            "e.f",
        ])
        .expect("args");
        assert_eq!(args.require_on, vec!["a.b", "c.d"]);
        assert_eq!(args.require_off, vec!["e.f"]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--dir"]).unwrap_err().contains("--dir requires a value"));
        assert!(parse(&["--bogus"]).unwrap_err().contains("Unknown arg"));
        assert!(parse(&["explode"]).unwrap_err().contains("Unknown command"));
        assert!(parse(&["flags"]).unwrap_err().contains("--require-on"));
        assert!(parse(&["latest", "extra"]).unwrap_err().contains("Unexpected argument"));
    }
}

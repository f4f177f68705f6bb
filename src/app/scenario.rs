use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::adb::runner::{device_args, run_adb};
use crate::app::error::AppError;
use crate::app::models::CommandResult;

/// A device scenario that is nothing more than one shell command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub shell_command: &'static str,
}

const BUILTIN_SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "open-bluetooth-media",
        description: "Opens the Bluetooth media source in the car media template",
        shell_command: "am start -a android.car.intent.action.MEDIA_TEMPLATE \
                        -e android.car.intent.extra.MEDIA_COMPONENT \
                        com.android.bluetooth/com.android.bluetooth.avrcpcontroller.BluetoothMediaBrowseService",
    },
    Scenario {
        name: "open-all-apps-settings",
        description: "Opens Settings > Apps > All apps",
        shell_command: "am start -a android.settings.MANAGE_ALL_APPLICATIONS_SETTINGS",
    },
    Scenario {
        name: "take-bugreport",
        description: "Starts a full bugreport; the archive lands in /bugreports",
        shell_command: "am bug-report --full",
    },
];

pub fn builtin_scenarios() -> &'static [Scenario] {
    BUILTIN_SCENARIOS
}

pub fn find_scenario(name: &str) -> Option<&'static Scenario> {
    let name = name.trim();
    BUILTIN_SCENARIOS
        .iter()
        .find(|scenario| scenario.name.eq_ignore_ascii_case(name))
}

pub fn scenario_args(serial: &str, scenario: &Scenario) -> Vec<String> {
    device_args(serial, &["shell", scenario.shell_command])
}

pub fn run_scenario(
    adb_program: &str,
    serial: &str,
    scenario: &Scenario,
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandResult, AppError> {
    let output = run_adb(adb_program, &scenario_args(serial, scenario), timeout, trace_id)?;
    let result = CommandResult {
        serial: serial.trim().to_string(),
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
    };
    if result.succeeded() {
        info!(trace_id = %trace_id, scenario = scenario.name, "Scenario finished");
    } else {
        warn!(
            trace_id = %trace_id,
            scenario = scenario.name,
            exit_code = ?result.exit_code,
            stderr = %result.stderr.trim(),
            "Scenario command failed"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_scenarios_case_insensitively() {
        let scenario = find_scenario(" Open-Bluetooth-Media ").expect("scenario");
        assert_eq!(scenario.name, "open-bluetooth-media");
        assert!(find_scenario("does-not-exist").is_none());
    }

    #[test]
    fn media_scenario_targets_avrcp_browse_service() {
        let scenario = find_scenario("open-bluetooth-media").expect("scenario");
        assert_eq!(
            scenario.shell_command,
            "am start -a android.car.intent.action.MEDIA_TEMPLATE -e \
             android.car.intent.extra.MEDIA_COMPONENT \
             com.android.bluetooth/com.android.bluetooth.avrcpcontroller.BluetoothMediaBrowseService"
        );
    }

    #[test]
    fn builds_shell_args_for_serial() {
        let scenario = find_scenario("open-all-apps-settings").expect("scenario");
        assert_eq!(
            scenario_args("R58N123", scenario),
            vec![
                "-s",
                "R58N123",
                "shell",
                "am start -a android.settings.MANAGE_ALL_APPLICATIONS_SETTINGS",
            ]
        );
    }

    #[test]
    fn scenario_names_are_unique() {
        let mut names: Vec<_> = builtin_scenarios().iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), builtin_scenarios().len());
    }
}

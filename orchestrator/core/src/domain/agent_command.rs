// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent command vector
//!
//! Builds the argv of the agent process inside the application container and
//! its JSON-array encoding for the topology document.

/// Invocation token of the agent CLI.
pub const AGENT_COMMAND: &str = "copilot";
pub const BANNER_FLAG: &str = "--banner";
pub const ALLOW_ALL_TOOLS_FLAG: &str = "--allow-all-tools";
pub const ALLOW_ALL_PATHS_FLAG: &str = "--allow-all-paths";
pub const ADD_DIR_FLAG: &str = "--add-dir";

/// Caller argument counts at or below these open an interactive banner session.
const INTERACTIVE_ARG_THRESHOLD: usize = 1;
const INTERACTIVE_ARG_THRESHOLD_YOLO: usize = 3;

/// Build the agent argv.
///
/// `args` is the caller's agent command line and normally starts with
/// [`AGENT_COMMAND`]; that leading token is not repeated. Whether the session
/// is interactive is inferred from the length of `args` (`<= 1`, or `<= 3` in
/// yolo mode) rather than an explicit flag, so in yolo mode a single prompt
/// like `copilot -p TEXT` still gets the banner. Callers rely on this exact
/// behaviour.
pub fn build_agent_command(
    args: &[String],
    is_yolo: bool,
    container_work_dir: &str,
) -> Vec<String> {
    let mut command = vec![AGENT_COMMAND.to_string()];

    if is_yolo {
        command.push(ALLOW_ALL_TOOLS_FLAG.to_string());
        command.push(ALLOW_ALL_PATHS_FLAG.to_string());
        command.push(ADD_DIR_FLAG.to_string());
        command.push(container_work_dir.to_string());
    }

    let threshold = if is_yolo {
        INTERACTIVE_ARG_THRESHOLD_YOLO
    } else {
        INTERACTIVE_ARG_THRESHOLD
    };

    if args.len() <= threshold {
        command.push(BANNER_FLAG.to_string());
    } else {
        let passthrough = match args.first() {
            Some(first) if first == AGENT_COMMAND => &args[1..],
            _ => args,
        };
        command.extend(passthrough.iter().cloned());
    }

    command
}

/// JSON array encoding with compose interpolation disabled (`$` -> `$$`).
/// Quotes and backslashes are escaped by the JSON encoder.
pub fn encode_command(command: &[String]) -> String {
    let escaped: Vec<String> = command.iter().map(|arg| arg.replace('$', "$$")).collect();
    serde_json::to_string(&escaped).unwrap_or_else(|_| "[]".to_string())
}

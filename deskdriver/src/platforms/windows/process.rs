//! Process enumeration, launch and termination

use crate::AutomationError;
use std::process::Command;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Compare executable names the way Windows does: case-insensitive, `.exe` optional.
fn same_executable(process_name: &str, executable: &str) -> bool {
    fn stem(name: &str) -> String {
        let lower = name.to_lowercase();
        lower.strip_suffix(".exe").unwrap_or(&lower).to_string()
    }
    stem(process_name) == stem(executable)
}

/// Process IDs for `executable`, oldest PID first so repeated scans agree on order.
pub fn find_process_ids(executable: &str) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(_, process)| same_executable(&process.name().to_string_lossy(), executable))
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();

    debug!("Found {} process(es) for '{}': {:?}", pids.len(), executable, pids);
    pids
}

pub fn launch_process(executable: &str, args: &[String]) -> Result<u32, AutomationError> {
    info!("Launching '{}' with args {:?}", executable, args);
    let child = Command::new(executable).args(args).spawn().map_err(|e| {
        AutomationError::PlatformError(format!("Failed to launch '{executable}': {e}"))
    })?;
    Ok(child.id())
}

pub fn kill_processes(executable: &str) -> usize {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut killed_count = 0;
    for (pid, process) in system.processes() {
        if !same_executable(&process.name().to_string_lossy(), executable) {
            continue;
        }
        if process.kill() {
            killed_count += 1;
            debug!("Killed PID {}", pid.as_u32());
        } else {
            warn!(
                "Failed to kill PID {} (may require elevated permissions)",
                pid.as_u32()
            );
        }
    }
    killed_count
}

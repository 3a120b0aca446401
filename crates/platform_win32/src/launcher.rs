//! Starting applications whose windows are missing during a restore.

use std::path::Path;
use std::process::{Command, Stdio};
use winlayout_core::{Launcher, PlatformError};

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Spawns executables detached from the daemon.
///
/// A launch hint naming a directory becomes the working directory; any
/// other hint (a workspace or document path) is passed as the sole argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    fn command(path: &str, launch_hint: Option<&str>) -> Command {
        let mut command = Command::new(path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match launch_hint {
            Some(hint) if Path::new(hint).is_dir() => {
                command.current_dir(hint);
            }
            Some(hint) if !hint.is_empty() => {
                command.arg(hint);
            }
            _ => {}
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        command
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, path: &str, launch_hint: Option<&str>) -> Result<(), PlatformError> {
        let child = Self::command(path, launch_hint)
            .spawn()
            .map_err(|e| PlatformError::LaunchFailed {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(path, pid = child.id(), "Launched missing application");
        Ok(())
    }
}

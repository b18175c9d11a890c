use log::info;
use std::path::Path;
use std::process::Command;

use crate::error::{QcError, Result};

/// Hands a rendered file to whatever displays it
pub trait PlotOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Opens files with the operating system's default application
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl SystemOpener {
    /// Launcher command for the current platform, if one is known
    pub fn command(path: &Path) -> Option<Command> {
        if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]).arg(path);
            Some(command)
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(path);
            Some(command)
        } else if cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            let mut command = Command::new("xdg-open");
            command.arg(path);
            Some(command)
        } else {
            None
        }
    }
}

impl PlotOpener for SystemOpener {
    fn open(&self, path: &Path) -> Result<()> {
        let mut command = Self::command(path).ok_or_else(|| QcError::UnsupportedPlatform {
            path: path.to_path_buf(),
            platform: std::env::consts::OS.to_string(),
        })?;

        info!("Opening {:?}", path);
        command
            .spawn()
            .map_err(|e| QcError::persistence(format!("Failed to open {:?}", path), e))?;
        Ok(())
    }
}

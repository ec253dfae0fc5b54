use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// What a PID file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedPid {
    Pid(u32),
    /// Empty or unparseable contents.
    Unusable,
}

/// The single-line PID file left behind by a launch. Its presence means
/// "launched by us", regardless of whether the process is still alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    path: PathBuf,
}

impl ProcessRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&self.path)?;
        write!(file, "{}", pid)?;
        file.sync_all()?;
        Ok(())
    }

    /// `Ok(None)` when the file is missing.
    pub fn read(&self) -> Result<Option<RecordedPid>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let first = contents.lines().next().unwrap_or("").trim();
        Ok(Some(match first.parse::<u32>() {
            Ok(pid) => RecordedPid::Pid(pid),
            Err(_) => RecordedPid::Unusable,
        }))
    }

    /// Missing files are fine: another caller may have won the race.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//! One file per session under `<config-dir>/logs/`, named by ISO
//! timestamp with `:` and `.` replaced by `-`. Lines are
//! `[<iso-timestamp>] <message>`; the first and last lines record session
//! start/end and duration.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bridge_api::{Error, Result};
use chrono::{DateTime, Utc};

pub struct SessionLog {
    path: PathBuf,
    file: File,
    started_at: DateTime<Utc>,
}

impl SessionLog {
    /// Creates `<logs_dir>/<started_at-as-filename>` and writes the start
    /// line. `started_at` is accepted as a parameter (rather than read
    /// from the clock internally) so callers control the timestamp.
    pub fn start(logs_dir: &Path, started_at: DateTime<Utc>) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .map_err(|e| Error::InvalidInput(format!("failed to create logs dir: {e}")))?;
        let path = logs_dir.join(file_name_for(started_at));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::InvalidInput(format!("failed to open session log: {e}")))?;
        writeln!(file, "[{}] session started", iso(started_at))
            .map_err(|e| Error::InvalidInput(format!("failed to write session log: {e}")))?;
        Ok(Self {
            path,
            file,
            started_at,
        })
    }

    pub fn log(&mut self, at: DateTime<Utc>, message: &str) -> Result<()> {
        writeln!(self.file, "[{}] {message}", iso(at))
            .map_err(|e| Error::InvalidInput(format!("failed to write session log: {e}")))
    }

    pub fn finish(mut self, ended_at: DateTime<Utc>) -> Result<()> {
        let duration = ended_at.signed_duration_since(self.started_at);
        writeln!(
            self.file,
            "[{}] session ended (duration: {}s)",
            iso(ended_at),
            duration.num_seconds()
        )
        .map_err(|e| Error::InvalidInput(format!("failed to write session log: {e}")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn file_name_for(at: DateTime<Utc>) -> String {
    iso(at).replace(':', "-").replace('.', "-")
}

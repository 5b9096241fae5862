//! The subprocess-driven assistant that returns a capture identifier.
//! Framed in spec as a non-core external collaborator, kept thin: a
//! trait boundary plus a `std::process::Command`-backed default so the
//! workflow always has something to call.

use std::process::Command;

use bridge_api::{Error, Result};

/// Produces a fresh capture identifier. The default implementation shells
/// out to an external helper; tests substitute a fixed-value stub.
pub trait CaptureIdAssistant {
    fn next_capture_id(&self) -> Result<String>;
}

/// Invokes `command` with `args` and takes its trimmed stdout as the
/// capture id.
pub struct SubprocessCaptureIdAssistant {
    command: String,
    args: Vec<String>,
}

impl SubprocessCaptureIdAssistant {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl CaptureIdAssistant for SubprocessCaptureIdAssistant {
    fn next_capture_id(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .map_err(|e| Error::InvalidInput(format!("capture-id assistant failed to run: {e}")))?;
        if !output.status.success() {
            return Err(Error::InvalidInput(format!(
                "capture-id assistant exited with {}",
                output.status
            )));
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(Error::InvalidInput("capture-id assistant returned no id".into()));
        }
        Ok(id)
    }
}

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use bgs_core::ShellError;

/// Result of one foreground command execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShellCommandResponse {
    /// Error message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Exit status: 0 success, non-zero error, -1 timeout.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock seconds spent executing.
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Raw return code of the child; unset when no child ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i32>,
}

impl ShellCommandResponse {
    /// Project an executor error into the structured foreground response.
    /// Timeouts carry status -1; everything else status 1.
    pub(crate) fn from_error(error: &ShellError, started: Instant, directory: &Path) -> Self {
        let message = error.to_string();
        let status = match error {
            ShellError::Timeout { .. } => -1,
            _ => 1,
        };
        Self {
            error: Some(message.clone()),
            status,
            stdout: String::new(),
            stderr: message,
            execution_time: started.elapsed().as_secs_f64(),
            directory: Some(directory.to_path_buf()),
            returncode: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0 && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_status_minus_one() {
        let response = ShellCommandResponse::from_error(
            &ShellError::Timeout { seconds: 3 },
            Instant::now(),
            Path::new("/tmp"),
        );
        assert_eq!(response.status, -1);
        assert_eq!(response.error.as_deref(), Some("Command timed out after 3 seconds"));
        assert!(!response.is_success());
    }

    #[test]
    fn test_validation_error_maps_to_status_one() {
        let response = ShellCommandResponse::from_error(
            &ShellError::CommandValidation("Command not allowed: sudo".into()),
            Instant::now(),
            Path::new("/tmp"),
        );
        assert_eq!(response.status, 1);
        assert_eq!(response.stderr, "Command not allowed: sudo");
    }

    #[test]
    fn test_serializes_without_empty_optionals() {
        let response = ShellCommandResponse {
            error: None,
            status: 0,
            stdout: "hi".into(),
            stderr: String::new(),
            execution_time: 0.1,
            directory: None,
            returncode: Some(0),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"error\""));
        assert!(!json.contains("\"directory\""));
    }
}

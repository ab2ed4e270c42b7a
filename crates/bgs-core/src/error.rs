#[derive(thiserror::Error, Debug)]
pub enum ShellError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("{0}")]
    CommandValidation(String),

    #[error("{0}")]
    Directory(String),

    #[error("{0}")]
    IoRedirection(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Command timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("No process with PID {0}")]
    NotFound(u32),

    #[error("{0}")]
    IllegalState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShellError {
    /// Stable kind tag for adapters that report errors as structured text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyCommand => "empty_command",
            Self::CommandValidation(_) => "command_validation",
            Self::Directory(_) => "directory",
            Self::IoRedirection(_) => "io_redirection",
            Self::Spawn(_) => "spawn",
            Self::Timeout { .. } => "timeout",
            Self::NotFound(_) => "not_found",
            Self::IllegalState(_) => "illegal_state",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_empty_command() {
        assert_eq!(ShellError::EmptyCommand.to_string(), "Empty command");
    }

    #[test]
    fn test_display_command_validation() {
        let err = ShellError::CommandValidation("Command not allowed: sudo".into());
        assert_eq!(err.to_string(), "Command not allowed: sudo");
    }

    #[test]
    fn test_display_timeout() {
        let err = ShellError::Timeout { seconds: 15 };
        assert_eq!(err.to_string(), "Command timed out after 15 seconds");
    }

    #[test]
    fn test_display_not_found() {
        assert_eq!(
            ShellError::NotFound(4242).to_string(),
            "No process with PID 4242"
        );
    }

    #[test]
    fn test_kind_tags_are_distinct() {
        let errors = [
            ShellError::EmptyCommand,
            ShellError::CommandValidation(String::new()),
            ShellError::Directory(String::new()),
            ShellError::IoRedirection(String::new()),
            ShellError::Spawn(String::new()),
            ShellError::Timeout { seconds: 1 },
            ShellError::NotFound(1),
            ShellError::IllegalState(String::new()),
            ShellError::Internal(String::new()),
        ];
        let kinds: std::collections::BTreeSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ShellError>();
    }
}

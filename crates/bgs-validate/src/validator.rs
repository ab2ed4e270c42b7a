use std::collections::BTreeSet;
use std::path::Path;

use bgs_core::env::allowed_commands_from_env;
use bgs_core::ShellError;

/// Standalone tokens that would escape the allow-list if handed to the shell.
const FORBIDDEN_OPERATORS: [&str; 5] = [";", "&&", "||", "`", "$("];

/// Decides whether a command and its pipeline form are permitted.
///
/// The allow-list holds command basenames; an empty list denies everything.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    allowed: BTreeSet<String>,
}

impl CommandValidator {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed = commands
            .into_iter()
            .map(|c| normalize(c.into().trim()))
            .filter(|c| !c.is_empty())
            .collect();
        Self { allowed }
    }

    /// Allow-list from `ALLOW_COMMANDS` ∪ `ALLOWED_COMMANDS`.
    pub fn from_env() -> Self {
        Self::new(allowed_commands_from_env())
    }

    /// Sorted allow-list, for tool descriptions and diagnostics.
    pub fn allowed_commands(&self) -> Vec<String> {
        self.allowed.iter().cloned().collect()
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        self.allowed.contains(&normalize(command))
    }

    /// Fail unless `argv[0]` (basename, `./` stripped) is allow-listed.
    pub fn validate_command(&self, argv: &[String]) -> Result<(), ShellError> {
        let head = argv.first().ok_or(ShellError::EmptyCommand)?;
        if !self.is_allowed(head) {
            return Err(ShellError::CommandValidation(format!(
                "Command not allowed: {head}"
            )));
        }
        Ok(())
    }

    /// Fail on standalone shell operators that would chain or substitute
    /// commands behind the allow-list's back.
    pub fn validate_no_shell_operators(&self, token: &str) -> Result<(), ShellError> {
        if FORBIDDEN_OPERATORS.contains(&token) {
            return Err(ShellError::CommandValidation(format!(
                "Unexpected shell operator: {token}"
            )));
        }
        Ok(())
    }

    /// Fail on malformed pipe forms and on any segment whose head command is
    /// not allow-listed.
    pub fn validate_pipeline(&self, argv: &[String]) -> Result<(), ShellError> {
        if argv.is_empty() {
            return Err(ShellError::EmptyCommand);
        }
        if argv.first().map(String::as_str) == Some("|") {
            return Err(ShellError::CommandValidation(
                "Empty command before pipe operator".into(),
            ));
        }
        if argv.last().map(String::as_str) == Some("|") {
            return Err(ShellError::CommandValidation(
                "Empty command after pipe operator".into(),
            ));
        }

        let mut segment: Vec<String> = Vec::new();
        for token in argv {
            if token == "|" {
                if segment.is_empty() {
                    return Err(ShellError::CommandValidation(
                        "Empty command between pipe operators".into(),
                    ));
                }
                self.validate_command(&segment)?;
                segment.clear();
            } else {
                self.validate_no_shell_operators(token)?;
                segment.push(token.clone());
            }
        }
        if !segment.is_empty() {
            self.validate_command(&segment)?;
        }
        Ok(())
    }
}

/// Compare by basename so `./ls` and `/bin/ls` match an allow-listed `ls`.
/// Command names are case-insensitive on Windows only.
fn normalize(command: &str) -> String {
    let base = Path::new(command)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.to_string());
    if cfg!(windows) {
        base.to_lowercase()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_allowed_command_passes() {
        let validator = CommandValidator::new(["echo", "ls"]);
        assert!(validator.validate_command(&argv(&["echo", "hello"])).is_ok());
    }

    #[test]
    fn test_disallowed_command_is_named_in_error() {
        let validator = CommandValidator::new(["echo"]);
        let err = validator
            .validate_command(&argv(&["sudo", "reboot"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Command not allowed: sudo");
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        let validator = CommandValidator::new(["echo"]);
        assert!(matches!(
            validator.validate_command(&[]),
            Err(ShellError::EmptyCommand)
        ));
    }

    #[test]
    fn test_empty_allow_list_denies_all() {
        let validator = CommandValidator::new(Vec::<String>::new());
        assert!(validator.validate_command(&argv(&["echo"])).is_err());
    }

    #[test]
    fn test_path_prefixes_are_stripped() {
        let validator = CommandValidator::new(["ls"]);
        assert!(validator.is_allowed("./ls"));
        assert!(validator.is_allowed("/bin/ls"));
        assert!(!validator.is_allowed("lsx"));
    }

    #[test]
    fn test_forbidden_operators() {
        let validator = CommandValidator::new(["echo"]);
        for op in [";", "&&", "||", "`", "$("] {
            assert!(
                validator.validate_no_shell_operators(op).is_err(),
                "operator {op} must be rejected"
            );
        }
        assert!(validator.validate_no_shell_operators("plain").is_ok());
    }

    #[test]
    fn test_pipeline_validates_every_segment_head() {
        let validator = CommandValidator::new(["echo", "grep"]);
        assert!(validator
            .validate_pipeline(&argv(&["echo", "hi", "|", "grep", "h"]))
            .is_ok());

        let err = validator
            .validate_pipeline(&argv(&["echo", "hi", "|", "awk", "{print}"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Command not allowed: awk");
    }

    #[test]
    fn test_pipeline_rejects_malformed_pipe_forms() {
        let validator = CommandValidator::new(["echo"]);
        for bad in [
            vec!["|", "echo"],
            vec!["echo", "|"],
            vec!["echo", "|", "|", "echo"],
        ] {
            let bad = argv(&bad);
            assert!(validator.validate_pipeline(&bad).is_err(), "{bad:?}");
        }
    }
}

//! Environment variables that configure the server, with their readers.

/// Comma-separated allow-list of command basenames. Empty means deny all.
pub const ALLOW_COMMANDS: &str = "ALLOW_COMMANDS";

/// Second allow-list variable; the effective list is the union of both.
pub const ALLOWED_COMMANDS: &str = "ALLOWED_COMMANDS";

/// Seconds a terminal process record is retained before automatic cleanup.
/// `<= 0` disables auto-cleanup; records then live until explicit cleanup or
/// host shutdown.
pub const PROCESS_RETENTION_SECONDS: &str = "PROCESS_RETENTION_SECONDS";

/// Character encoding recorded for child output when not explicitly requested.
pub const DEFAULT_ENCODING: &str = "DEFAULT_ENCODING";

/// Controlling shell on Windows (`cmd.exe` when unset).
pub const COMSPEC: &str = "COMSPEC";

/// Controlling shell on POSIX (`/bin/sh` when unset).
pub const SHELL: &str = "SHELL";

pub const DEFAULT_RETENTION_SECONDS: i64 = 300;

/// Union of `ALLOW_COMMANDS` and `ALLOWED_COMMANDS`, trimmed and de-duplicated.
pub fn allowed_commands_from_env() -> Vec<String> {
    let mut commands: Vec<String> = [ALLOW_COMMANDS, ALLOWED_COMMANDS]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .flat_map(|value| {
            value
                .split(',')
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|c| !c.is_empty())
        .collect();
    commands.sort();
    commands.dedup();
    commands
}

pub fn retention_seconds_from_env() -> i64 {
    std::env::var(PROCESS_RETENTION_SECONDS)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETENTION_SECONDS)
}

/// Resolution order: `DEFAULT_ENCODING` env, then `utf-8`.
pub fn default_encoding() -> String {
    std::env::var(DEFAULT_ENCODING)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "utf-8".to_string())
}

/// The shell every child command runs under, with the flags that make it
/// execute one command string.
///
/// POSIX: `$SHELL` or `/bin/sh`, invoked `-i -c <cmd>`. Windows: `%COMSPEC%`
/// or `cmd.exe`, invoked `/c <cmd>`.
pub fn controlling_shell() -> (String, Vec<String>) {
    #[cfg(windows)]
    {
        let shell = std::env::var(COMSPEC).unwrap_or_else(|_| "cmd.exe".to_string());
        (shell, vec!["/c".to_string()])
    }
    #[cfg(not(windows))]
    {
        let shell = std::env::var(SHELL)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string());
        (shell, vec!["-i".to_string(), "-c".to_string()])
    }
}

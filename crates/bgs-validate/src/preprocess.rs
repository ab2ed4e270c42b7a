use std::path::PathBuf;

use bgs_core::ShellError;

/// A single parsed I/O redirection, foreground-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
    /// `< file` — the file's bytes become the child's stdin.
    Input(PathBuf),
    /// `> file` / `>> file` — the child's stdout goes to the file.
    Output { path: PathBuf, append: bool },
}

/// Redirection-like tokens this server does not interpret. Letting them
/// through to the shell would silently redirect streams the log store owns.
const UNSUPPORTED_REDIRECTS: [&str; 6] = ["2>", "2>>", "&>", "&>>", "<<", "<<<"];

/// Strip matched outer quoting from each token and drop empty tokens.
/// Token boundaries are preserved; inner quotes are left alone.
pub fn clean_command(argv: &[String]) -> Vec<String> {
    argv.iter()
        .map(|token| strip_outer_quotes(token.trim()))
        .filter(|token| !token.is_empty())
        .collect()
}

/// True iff any token is the literal pipe operator.
pub fn has_pipe(argv: &[String]) -> bool {
    argv.iter().any(|t| t == "|")
}

/// Split on `|` tokens, dropping empty leading/trailing segments.
pub fn split_pipe_commands(argv: &[String]) -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    let mut current = Vec::new();
    for token in argv {
        if token == "|" {
            if !current.is_empty() {
                commands.push(std::mem::take(&mut current));
            }
        } else {
            current.push(token.clone());
        }
    }
    if !current.is_empty() {
        commands.push(current);
    }
    commands
}

/// Separate redirection operators from the command argv.
///
/// Returns the argv without redirection tokens plus the parsed redirections.
/// Later redirections of the same kind win, matching shell behavior.
pub fn parse_redirections(argv: &[String]) -> Result<(Vec<String>, Vec<Redirection>), ShellError> {
    let mut cmd = Vec::new();
    let mut redirects = Vec::new();
    let mut tokens = argv.iter().peekable();

    while let Some(token) = tokens.next() {
        if UNSUPPORTED_REDIRECTS.contains(&token.as_str()) {
            return Err(ShellError::IoRedirection(format!(
                "Unsupported redirection operator: {token}"
            )));
        }
        match token.as_str() {
            "<" | ">" | ">>" => {
                let target = tokens.next().ok_or_else(|| {
                    ShellError::IoRedirection(format!("Missing path for redirection: {token}"))
                })?;
                if is_redirection_operator(target) {
                    return Err(ShellError::IoRedirection(format!(
                        "Invalid redirection target: {target}"
                    )));
                }
                redirects.push(match token.as_str() {
                    "<" => Redirection::Input(PathBuf::from(target)),
                    op => Redirection::Output {
                        path: PathBuf::from(target),
                        append: op == ">>",
                    },
                });
            }
            _ => cmd.push(token.clone()),
        }
    }

    if cmd.is_empty() {
        return Err(ShellError::EmptyCommand);
    }
    Ok((cmd, redirects))
}

/// Render an argv as one shell-safe command string.
pub fn render_shell_string(argv: &[String]) -> String {
    argv.iter()
        .map(|token| quote(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_redirection_operator(token: &str) -> bool {
    matches!(token, "<" | ">" | ">>") || UNSUPPORTED_REDIRECTS.contains(&token)
}

fn strip_outer_quotes(token: &str) -> String {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return token[1..token.len() - 1].to_string();
        }
    }
    token.to_string()
}

/// POSIX single-quote escaping; bare tokens pass through unquoted.
fn quote(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    let safe = token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"@%_+=:,./-".contains(&b));
    if safe {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_clean_strips_matched_outer_quotes() {
        assert_eq!(
            clean_command(&argv(&["echo", "\"hello world\"", "'x'", ""])),
            argv(&["echo", "hello world", "x"])
        );
    }

    #[test]
    fn test_clean_leaves_unmatched_quotes_alone() {
        assert_eq!(clean_command(&argv(&["\"half"])), argv(&["\"half"]));
    }

    #[test]
    fn test_has_pipe_only_matches_standalone_token() {
        assert!(has_pipe(&argv(&["a", "|", "b"])));
        assert!(!has_pipe(&argv(&["a|b"])));
    }

    #[test]
    fn test_split_pipe_commands_drops_empty_segments() {
        assert_eq!(
            split_pipe_commands(&argv(&["|", "echo", "hi", "|", "grep", "h", "|"])),
            vec![argv(&["echo", "hi"]), argv(&["grep", "h"])]
        );
    }

    #[test]
    fn test_parse_redirections() {
        let (cmd, redirects) =
            parse_redirections(&argv(&["sort", "<", "in.txt", ">", "out.txt"])).unwrap();
        assert_eq!(cmd, argv(&["sort"]));
        assert_eq!(
            redirects,
            vec![
                Redirection::Input(PathBuf::from("in.txt")),
                Redirection::Output {
                    path: PathBuf::from("out.txt"),
                    append: false
                },
            ]
        );
    }

    #[test]
    fn test_parse_append_redirection() {
        let (_, redirects) = parse_redirections(&argv(&["echo", "x", ">>", "log"])).unwrap();
        assert_eq!(
            redirects,
            vec![Redirection::Output {
                path: PathBuf::from("log"),
                append: true
            }]
        );
    }

    #[test]
    fn test_trailing_redirection_without_path_fails() {
        let err = parse_redirections(&argv(&["cat", ">"])).unwrap_err();
        assert!(err.to_string().contains("Missing path"));
    }

    #[test]
    fn test_operator_as_redirection_target_fails() {
        assert!(parse_redirections(&argv(&["cat", ">", ">"])).is_err());
    }

    #[test]
    fn test_unsupported_redirections_fail() {
        for op in UNSUPPORTED_REDIRECTS {
            let bad = argv(&["cmd", op, "file"]);
            assert!(parse_redirections(&bad).is_err(), "{op} must be rejected");
        }
    }

    #[test]
    fn test_redirection_only_argv_is_empty_command() {
        assert!(matches!(
            parse_redirections(&argv(&["<", "in.txt"])),
            Err(ShellError::EmptyCommand)
        ));
    }

    #[test]
    fn test_render_quotes_only_when_needed() {
        assert_eq!(
            render_shell_string(&argv(&["echo", "hello world", "a/b.txt"])),
            "echo 'hello world' a/b.txt"
        );
    }

    #[test]
    fn test_render_escapes_single_quotes() {
        assert_eq!(
            render_shell_string(&argv(&["echo", "it's"])),
            r"echo 'it'\''s'"
        );
    }
}

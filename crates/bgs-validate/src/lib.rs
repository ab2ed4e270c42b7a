//! Command admission: allow-list validation and argv preprocessing.

mod preprocess;
mod validator;

pub use preprocess::{
    clean_command, has_pipe, parse_redirections, render_shell_string, split_pipe_commands,
    Redirection,
};
pub use validator::CommandValidator;

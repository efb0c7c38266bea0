//! Command runner configuration

use std::path::PathBuf;

/// Configuration for the shell runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shell executable used to interpret stage commands
    pub shell: String,

    /// Arguments placed before the command string
    pub shell_args: Vec<String>,

    /// Working directory for commands that don't set their own
    pub working_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            shell_args: vec!["-c".to_string()],
            working_dir: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>, args: Vec<String>) -> Self {
        self.shell = shell.into();
        self.shell_args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;

/// Specification for a command to execute.
///
/// Arguments are discrete `OsString`s; nothing is ever handed to a shell for
/// word splitting. Configured commands (`["python", "-m", "pytest"]`) map
/// one-to-one onto `program` + `args`.
///
/// ```rust
/// use shipwright_runner::CommandSpec;
///
/// let cmd = CommandSpec::new("python")
///     .args(["-m", "pytest", "-v"])
///     .cwd("/tmp/attempt-1")
///     .clear_env()
///     .env("HOME", "/tmp/attempt-1");
///
/// assert_eq!(cmd.args.len(), 3);
/// assert!(cmd.env_cleared);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Start from an empty environment instead of inheriting ours.
    pub env_cleared: bool,
    pub env: BTreeMap<OsString, OsString>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Build from a configured argv. Returns `None` for an empty vector.
    #[must_use]
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(rest.iter().map(|a| a.as_ref().to_string())))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn clear_env(mut self) -> Self {
        self.env_cleared = true;
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Human-readable rendering for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        let mut out = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }

    /// Convert to a tokio command with piped stdout/stderr.
    ///
    /// stdin is null unless the caller replaces it; `kill_on_drop` guards the
    /// direct child if the owning future is dropped mid-flight.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if self.env_cleared {
            cmd.env_clear();
        }
        cmd.envs(&self.env);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_splits_program_and_args() {
        let spec = CommandSpec::from_argv(&["python", "-m", "pytest"]).unwrap();
        assert_eq!(spec.program, OsString::from("python"));
        assert_eq!(spec.args, vec![OsString::from("-m"), OsString::from("pytest")]);
    }

    #[test]
    fn from_argv_rejects_empty() {
        let empty: [&str; 0] = [];
        assert!(CommandSpec::from_argv(&empty).is_none());
    }

    #[test]
    fn display_joins_with_spaces() {
        let spec = CommandSpec::new("sh").arg("-c").arg("echo hi");
        assert_eq!(spec.display(), "sh -c echo hi");
    }

    #[test]
    fn shell_metacharacters_stay_in_one_argument() {
        let spec = CommandSpec::new("echo").arg("a; rm -rf /");
        assert_eq!(spec.args.len(), 1);
    }
}

use shell_escape::escape;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::StepError;

/// Struct to represent an engine invocation
///
/// # Example
///
/// ```rust
/// use stepipe::executor::job::Job;
///
/// let job = Job::new("nextflow")
///     .arg("run")
///     .arg("/opt/suite/trim/main.nf")
///     .args(["-c", "stepipe.config"]);
///
/// assert_eq!(job.to_shell(), "nextflow run /opt/suite/trim/main.nf -c stepipe.config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Job {
    /// Create a new job
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add an argument to the job
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the job
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a path argument to the job
    pub fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Set the working directory of the job
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-escaped single-line rendering of the job
    pub fn to_shell(&self) -> String {
        std::iter::once(self.program.to_string_lossy())
            .chain(self.args.iter().map(|a| Cow::Borrowed(a.as_str())))
            .map(escape)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Write the job to an executable shell script
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// job.write(Path::new("runs/trim_261016/command.sh"))?;
    /// ```
    pub fn write(&self, path: &Path) -> Result<(), StepError> {
        let mut script = String::from("#!/usr/bin/env bash\nset -euo pipefail\n\n");

        if let Some(cwd) = &self.cwd {
            script.push_str(&format!("cd {}\n", escape(cwd.to_string_lossy())));
        }
        script.push_str(&self.to_shell());
        script.push('\n');

        std::fs::write(path, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(())
    }

    /// Build the std Command for this job
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }
}

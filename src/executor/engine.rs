use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::{consts::*, core::layout::RunLayout, error::StepError, executor::job::Job};

/// Workflow engine the step is delegated to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    pub binary: PathBuf,
}

impl Engine {
    /// Locate the engine binary using the current PATH.
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// let engine = Engine::locate("nextflow")?;
    /// ```
    pub fn locate(binary: &str) -> Result<Self, StepError> {
        Self::locate_in(binary, std::env::var_os("PATH"))
    }

    /// Locate the engine binary: a value with a path separator must point
    /// at an existing file, a bare name is searched on `path_var`.
    ///
    /// The returned binary is absolute, since the engine is started from
    /// inside the run directory.
    pub fn locate_in(binary: &str, path_var: Option<OsString>) -> Result<Self, StepError> {
        let candidate = Path::new(binary);

        if binary.is_empty() {
            return Err(StepError::EngineNotFound("<empty>".into()));
        }

        if candidate.components().count() > 1 || candidate.is_absolute() {
            if candidate.is_file() {
                return Ok(Self {
                    binary: absolute(candidate)?,
                });
            }
            return Err(StepError::EngineNotFound(binary.to_string()));
        }

        let found = path_var
            .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .map(|dir| dir.join(binary))
            .find(|path| is_executable(path));

        match found {
            Some(binary) => {
                debug!("DEBUG: Using engine {}", binary.display());
                Ok(Self { binary })
            }
            None => Err(StepError::EngineNotFound(format!(
                "{} (not found on PATH; set {})",
                binary, ENV_ENGINE
            ))),
        }
    }

    /// Entry script of a step: `<dir>/<step>/main.nf`, then `<dir>/<step>.nf`.
    ///
    /// The script path is canonical so it stays valid from the run directory.
    pub fn step_script(pipeline_dir: &Path, step: &str) -> Result<PathBuf, StepError> {
        let pipeline_dir = &suite_dir(pipeline_dir)?;

        let nested = pipeline_dir.join(step).join(STEP_ENTRY);
        if nested.is_file() {
            return Ok(nested);
        }

        let flat = pipeline_dir.join(format!("{}.{}", step, STEP_EXT));
        if flat.is_file() {
            return Ok(flat);
        }

        Err(StepError::StepNotFound {
            step: step.to_string(),
            available: Self::list_steps(pipeline_dir)?,
        })
    }

    /// Sorted names of the steps available in the pipeline suite.
    pub fn list_steps(pipeline_dir: &Path) -> Result<Vec<String>, StepError> {
        let pipeline_dir = &suite_dir(pipeline_dir)?;
        let mut steps = std::fs::read_dir(pipeline_dir)?
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.is_dir() && path.join(STEP_ENTRY).is_file() {
                    path.file_name().map(|n| n.to_string_lossy().into_owned())
                } else if path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(STEP_EXT)
                {
                    path.file_stem().map(|n| n.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        steps.sort_unstable();
        steps.dedup();

        Ok(steps)
    }

    /// Assemble the engine invocation for a prepared run.
    ///
    /// ```text
    /// <engine> -log <run>/engine.log run <script> -c <run>/stepipe.config
    ///     -work-dir <run>/work [-resume] [extra args...]
    /// ```
    pub fn job(
        &self,
        script: &Path,
        layout: &RunLayout,
        resume: bool,
        extra: &[String],
    ) -> Job {
        let mut job = Job::new(&self.binary)
            .arg("-log")
            .path(&layout.engine_log())
            .arg("run")
            .path(script)
            .arg("-c")
            .path(&layout.profile())
            .arg("-work-dir")
            .path(&layout.work_dir);

        if resume {
            job = job.arg(RESUME);
        }

        job.args(extra.iter().cloned()).current_dir(&layout.run_dir)
    }

    /// Run a job with inherited stdio and return the engine's exit code.
    pub fn execute(&self, job: &Job) -> Result<u8, StepError> {
        info!("INFO: Running {}", job.to_shell());

        let status = job.command().status().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                StepError::EngineNotFound(job.program.display().to_string())
            }
            _ => StepError::Io(e),
        })?;

        let code = status.forward_code();
        if code == 0 {
            info!("INFO: Engine finished successfully");
        } else {
            log::error!("ERROR: Engine exited with code {}", code);
        }

        Ok(code)
    }
}

/// Exit code forwarded from a finished child process
pub trait ForwardCode {
    fn forward_code(self) -> u8;
}

impl ForwardCode for ExitStatus {
    fn forward_code(self) -> u8 {
        if let Some(code) = self.code() {
            return exit_byte(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = self.signal() {
                return 128u8.wrapping_add(signal as u8);
            }
        }

        1
    }
}

/// Codes outside 0..=255 only exist off unix; they never wrap to success.
fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn suite_dir(pipeline_dir: &Path) -> Result<PathBuf, StepError> {
    if !pipeline_dir.is_dir() {
        return Err(StepError::Config(format!(
            "pipeline directory {} does not exist",
            pipeline_dir.display()
        )));
    }

    Ok(pipeline_dir.canonicalize()?)
}

fn absolute(path: &Path) -> Result<PathBuf, StepError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

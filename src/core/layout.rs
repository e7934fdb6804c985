use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::{consts::*, core::ident::Identifiers, error::StepError};

/// Directory tree of a single step run
///
/// ```text
/// <root>/<year>/<species>/<sample_code>/
///     reads/
///     <step>_<date>[_<n>]/
///         results/
///         work/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub sample_dir: PathBuf,
    pub reads_dir: PathBuf,
    pub run_dir: PathBuf,
    pub results_dir: PathBuf,
    pub work_dir: PathBuf,
    pub resumed: bool,
}

impl RunLayout {
    /// Create (or reuse, when resuming) the directory tree of a step run.
    ///
    /// # Arguments
    ///
    /// * `root` - Root of the run tree, made absolute against the cwd.
    /// * `species` - Species slug.
    /// * `step` - Pipeline step name.
    /// * `ids` - Identifiers of this invocation.
    /// * `resume` - Reuse the latest run directory of `step` if any.
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// let layout = RunLayout::create(Path::new("runs"), "escherichia_coli", "trim", &ids, false)?;
    ///
    /// assert!(layout.run_dir.ends_with("trim_261016"));
    /// ```
    pub fn create(
        root: &Path,
        species: &str,
        step: &str,
        ids: &Identifiers,
        resume: bool,
    ) -> Result<Self, StepError> {
        let root = absolute(root)?;
        let sample_dir = root
            .join(&ids.year)
            .join(species)
            .join(&ids.sample_code);
        let reads_dir = sample_dir.join(READS_DIR);

        std::fs::create_dir_all(&reads_dir)?;

        let previous = if resume {
            let latest = latest_run_dir(&sample_dir, step)?;
            if latest.is_none() {
                warn!(
                    "WARN: --resume given but no previous run of {} found in {}, starting fresh",
                    step,
                    sample_dir.display()
                );
            }
            latest
        } else {
            None
        };

        let resumed = previous.is_some();
        let run_dir = match previous {
            Some(dir) => {
                info!("INFO: Resuming run in {}", dir.display());
                dir
            }
            None => next_run_dir(&sample_dir, step, &ids.date_token),
        };

        let results_dir = run_dir.join(RESULTS_DIR);
        let work_dir = run_dir.join(WORK_DIR);
        std::fs::create_dir_all(&results_dir)?;
        std::fs::create_dir_all(&work_dir)?;

        Ok(Self {
            sample_dir,
            reads_dir,
            run_dir,
            results_dir,
            work_dir,
            resumed,
        })
    }

    pub fn profile(&self) -> PathBuf {
        self.run_dir.join(PROFILE_FILE)
    }

    pub fn command(&self) -> PathBuf {
        self.run_dir.join(COMMAND_FILE)
    }

    pub fn engine_log(&self) -> PathBuf {
        self.run_dir.join(ENGINE_LOG)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, StepError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// First free `<step>_<date>[_<n>]` directory name under `sample_dir`.
pub fn next_run_dir(sample_dir: &Path, step: &str, date_token: &str) -> PathBuf {
    let base = format!("{}_{}", step, date_token);
    let first = sample_dir.join(&base);
    if !first.exists() {
        return first;
    }

    (2..)
        .map(|n| sample_dir.join(format!("{}_{}", base, n)))
        .find(|dir| !dir.exists())
        .unwrap_or(first)
}

/// Split `<step>_<date>[_<n>]` into (date, n); None for other names.
pub fn parse_run_dir_name(name: &str, step: &str) -> Option<(String, usize)> {
    let rest = name.strip_prefix(step)?.strip_prefix('_')?;

    let (date, n) = match rest.split_once('_') {
        Some((date, n)) => (date, n.parse::<usize>().ok().filter(|n| *n >= 2)?),
        None => (rest, 1),
    };

    if date.len() != DATE_TOKEN_LEN || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((date.to_string(), n))
}

/// Most recent run directory of `step`, ordered by (date, n).
pub fn latest_run_dir(sample_dir: &Path, step: &str) -> Result<Option<PathBuf>, StepError> {
    if !sample_dir.is_dir() {
        return Ok(None);
    }

    let mut runs = std::fs::read_dir(sample_dir)?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            parse_run_dir_name(&name, step).map(|key| (key, entry.path()))
        })
        .collect::<Vec<_>>();

    runs.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    Ok(runs.pop().map(|(_, path)| path))
}

use log::{debug, info, warn};
use serde::Deserialize;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::Args;
use crate::consts::*;
use crate::core::ident::species_slug;
use crate::error::StepError;

/// A struct representing an optional configuration file.
///
/// # Fields
///
/// * `engine` - Engine binary, pipeline suite location and extra engine args.
/// * `container` - Container toolchain settings.
/// * `output` - Root of the run directory tree.
/// * `executor` - Local executor limits.
/// * `params` - Pipeline parameters added to every run.
///
/// # Example
///
/// ``` toml
/// [engine]
/// binary = "nextflow"
/// pipeline_dir = "/opt/pipelines/suite"
///
/// [container]
/// engine = "singularity"
/// cache_dir = "/scratch/images"
///
/// [params]
/// min_quality = 20
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineSection,
    pub container: ContainerSection,
    pub output: OutputSection,
    pub executor: ExecutorSection,
    pub params: BTreeMap<String, ParamValue>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub binary: Option<String>,
    pub pipeline_dir: Option<PathBuf>,
    pub args: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerSection {
    pub engine: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub run_options: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorSection {
    pub cpus: Option<usize>,
    pub memory: Option<usize>,
}

impl Config {
    /// Read a configuration file and return a Config struct.
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// let config = Config::read(Path::new("config.toml"));
    /// ```
    pub fn read(config: &Path) -> Result<Self, StepError> {
        let mut file = File::open(config).map_err(|e| {
            StepError::Config(format!("could not open {}: {}", config.display(), e))
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Config = toml::from_str(&contents)?;

        Ok(config)
    }

    /// Find the configuration file to use, if any.
    ///
    /// An explicit path (CLI first, then STEPIPE_CONFIG) must exist; the
    /// per-user default is only used when present.
    pub fn locate<F>(cli: Option<&Path>, env: &F) -> Result<Option<PathBuf>, StepError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = cli
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(StepError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        Ok(dirs::config_dir()
            .map(|dir| dir.join(STEPIPE).join(CONFIG_FILE))
            .filter(|path| path.is_file()))
    }

    /// Locate and read the configuration file, falling back to defaults.
    pub fn load<F>(cli: Option<&Path>, env: &F) -> Result<Self, StepError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match Self::locate(cli, env)? {
            Some(path) => {
                info!("INFO: Reading config from {}", path.display());
                Self::read(&path)
            }
            None => {
                debug!("DEBUG: No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Fully resolved settings for one invocation.
///
/// Precedence: CLI flag > environment variable > config file > default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub step: Option<String>,
    pub read1: Option<PathBuf>,
    pub read2: Option<PathBuf>,
    pub seq_type: SeqType,
    pub species: String,
    pub sample_code: Option<String>,
    pub resume: bool,
    pub params: BTreeMap<String, ParamValue>,
    pub output_dir: PathBuf,
    pub engine: String,
    pub pipeline_dir: Option<PathBuf>,
    pub container: ContainerEngine,
    pub container_cache: Option<PathBuf>,
    pub container_run_options: Option<String>,
    pub cpus: Option<usize>,
    pub memory: Option<usize>,
    pub engine_args: Vec<String>,
    pub dry_run: bool,
    pub list_steps: bool,
}

impl Settings {
    /// Merge CLI arguments, environment and config file into Settings.
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// let args = Args::parse();
    /// let config = Config::load(args.config.as_deref(), &env_var)?;
    /// let settings = Settings::resolve(args, config, &env_var)?;
    /// ```
    pub fn resolve<F>(args: Args, config: Config, env: &F) -> Result<Self, StepError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = env(ENV_ENGINE)
            .or(config.engine.binary)
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

        let pipeline_dir = env(ENV_PIPELINE_DIR)
            .map(PathBuf::from)
            .or(config.engine.pipeline_dir);

        let container = match env(ENV_CONTAINER).or(config.container.engine) {
            Some(name) => ContainerEngine::from_str(&name).map_err(StepError::Config)?,
            None => ContainerEngine::Docker,
        };

        let container_cache = env(ENV_CONTAINER_CACHE)
            .map(PathBuf::from)
            .or(config.container.cache_dir);

        let output_dir = args
            .output_dir
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or(config.output.dir)
            .unwrap_or_else(|| PathBuf::from("."));

        // INFO: CLI params override config params with the same key
        let mut params = config.params;
        for (key, value) in args.params {
            if let Some(old) = params.insert(key.clone(), value) {
                debug!("DEBUG: --param {} overrides config value {}", key, old);
            }
        }

        let cpus = args.cpus.or(config.executor.cpus);
        if let Some(cpus) = cpus {
            if cpus == 0 {
                return Err(StepError::InvalidInput("--cpus must be at least 1".into()));
            }
            if cpus > num_cpus::get() {
                warn!(
                    "WARN: --cpus {} exceeds the {} CPUs available on this host",
                    cpus,
                    num_cpus::get()
                );
            }
        }

        let memory = args.memory.or(config.executor.memory);
        if memory == Some(0) {
            return Err(StepError::InvalidInput("--memory must be at least 1".into()));
        }

        let mut engine_args = config.engine.args;
        engine_args.extend(args.engine_args);

        Ok(Self {
            step: args.step,
            read1: args.read1,
            read2: args.read2,
            seq_type: args.seq_type,
            species: species_slug(args.species.as_deref()),
            sample_code: args.sample_code,
            resume: args.resume,
            params,
            output_dir,
            engine,
            pipeline_dir,
            container,
            container_cache,
            container_run_options: config.container.run_options,
            cpus,
            memory,
            engine_args,
            dry_run: args.dry_run,
            list_steps: args.list_steps,
        })
    }

    /// Pipeline suite root, required for every run.
    pub fn pipeline_dir(&self) -> Result<&Path, StepError> {
        self.pipeline_dir.as_deref().ok_or_else(|| {
            StepError::Config(format!(
                "no pipeline directory configured; set {} or [engine].pipeline_dir",
                ENV_PIPELINE_DIR
            ))
        })
    }
}

/// Read a non-empty environment variable.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// An enum representing sequencing types.
///
/// # Example
///
/// ```rust, ignore
/// let seq_type = SeqType::from_str("nanopore").unwrap();
///
/// assert_eq!(seq_type, SeqType::Nanopore);
/// assert!(!seq_type.is_short_read());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqType {
    Illumina,
    Nanopore,
    Pacbio,
}

impl SeqType {
    /// Short-read data may come as a pair of files.
    pub fn is_short_read(&self) -> bool {
        matches!(self, Self::Illumina)
    }
}

impl FromStr for SeqType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "illumina" => Ok(Self::Illumina),
            "nanopore" | "ont" => Ok(Self::Nanopore),
            "pacbio" => Ok(Self::Pacbio),
            _ => Err(format!("ERROR: Unknown sequencing type: {}", s)),
        }
    }
}

impl std::fmt::Display for SeqType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Illumina => write!(f, "illumina"),
            Self::Nanopore => write!(f, "nanopore"),
            Self::Pacbio => write!(f, "pacbio"),
        }
    }
}

/// Container toolchain the engine should run step processes with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerEngine {
    Docker,
    Podman,
    Singularity,
    Apptainer,
}

impl ContainerEngine {
    /// Name of the engine config scope for this toolchain
    pub fn scope(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
            Self::Singularity => "singularity",
            Self::Apptainer => "apptainer",
        }
    }

    /// Image-file based toolchains mount host paths and keep an image cache.
    pub fn is_image_based(&self) -> bool {
        matches!(self, Self::Singularity | Self::Apptainer)
    }
}

impl FromStr for ContainerEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            "singularity" => Ok(Self::Singularity),
            "apptainer" => Ok(Self::Apptainer),
            _ => Err(format!("ERROR: Unknown container engine: {}", s)),
        }
    }
}

impl std::fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scope())
    }
}

/// Represents a pipeline parameter value
///
/// # Example
///
/// ```rust, ignore
/// let value = ParamValue::parse("0.95");
///
/// assert_eq!(value, ParamValue::Float(0.95));
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl ParamValue {
    /// Parse a raw CLI value; tries int, float and bool before string.
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return ParamValue::Float(f);
            }
        }
        match raw {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => ParamValue::Str(raw.to_string()),
        }
    }

    /// Render the value as an engine config literal
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// assert_eq!(ParamValue::Str("it's".into()).to_literal(), r"'it\'s'");
    /// assert_eq!(ParamValue::Int(3).to_literal(), "3");
    /// ```
    pub fn to_literal(&self) -> String {
        match self {
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(flt) => flt.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Str(s) => quote(s),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(flt) => write!(f, "{}", flt),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Single-quote a string for the engine config syntax.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

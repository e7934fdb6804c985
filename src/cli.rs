use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::config::{ParamValue, SeqType};
use crate::consts::*;
use crate::error::validate_id;

/// Launch a single pipeline step through the workflow engine
///
/// # Example
///
/// ```bash,no_run
/// stepipe trim sample_R1.fq.gz sample_R2.fq.gz -s "Escherichia coli"
/// stepipe assembly reads.fastq.gz -t nanopore --resume -- -with-report
/// stepipe --list-steps
/// ```
///
/// # Note
///
/// * `READ2` is only accepted for short-read (illumina) data
/// * Everything after `--` is handed to the engine untouched
#[derive(Parser, Debug, Clone)]
#[command(name = STEPIPE, version, about, long_about = None)]
pub struct Args {
    #[arg(
        help = "Pipeline step to run",
        value_name = "STEP",
        value_parser = parse_step,
        required_unless_present = "list_steps"
    )]
    pub step: Option<String>,

    #[arg(
        help = "Primary read file",
        value_name = "READ1",
        required_unless_present = "list_steps"
    )]
    pub read1: Option<PathBuf>,

    #[arg(help = "Secondary read file (paired-end only)", value_name = "READ2")]
    pub read2: Option<PathBuf>,

    #[arg(
        short = 't',
        long = "seq-type",
        help = "Sequencing type: illumina, nanopore or pacbio",
        value_name = "TYPE",
        default_value = "illumina"
    )]
    pub seq_type: SeqType,

    #[arg(
        short = 's',
        long = "species",
        help = "Species of the sample",
        value_name = "NAME"
    )]
    pub species: Option<String>,

    #[arg(
        short = 'c',
        long = "sample-code",
        help = "Override the sample code derived from READ1",
        value_name = "CODE",
        value_parser = parse_sample_code
    )]
    pub sample_code: Option<String>,

    #[arg(
        short = 'r',
        long = "resume",
        help = "Resume the latest run of this step for this sample"
    )]
    pub resume: bool,

    #[arg(
        short = 'p',
        long = "param",
        help = "Extra pipeline parameter. Can be repeated.",
        value_name = "KEY=VALUE",
        value_parser = parse_param
    )]
    pub params: Vec<(String, ParamValue)>,

    #[arg(
        short = 'o',
        long = "output-dir",
        help = "Root of the run directory tree",
        value_name = "DIR"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(long = "config", help = "Path to a TOML configuration file", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long = "cpus", help = "Max CPUs for the local executor", value_name = "NUM")]
    pub cpus: Option<usize>,

    #[arg(
        long = "memory",
        help = "Max memory in GB for the local executor",
        value_name = "GB"
    )]
    pub memory: Option<usize>,

    #[arg(
        short = 'd',
        long = "dry-run",
        help = "Prepare the run and print the engine command without executing it"
    )]
    pub dry_run: bool,

    #[arg(
        short = 'l',
        long = "list-steps",
        help = "List the steps available in the pipeline directory"
    )]
    pub list_steps: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Increase verbosity",
        conflicts_with = "quiet"
    )]
    pub verbose: bool,

    #[arg(short = 'q', long = "quiet", help = "Decrease verbosity")]
    pub quiet: bool,

    #[arg(
        last = true,
        help = "Arguments passed through to the engine",
        value_name = "ENGINE_ARGS"
    )]
    pub engine_args: Vec<String>,
}

impl Args {
    /// Log level derived from --verbose/--quiet
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// let args = Args::parse_from(["stepipe", "-q", "trim", "r1.fq"]);
    /// assert_eq!(args.log_level(), LevelFilter::Warn);
    /// ```
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }
}

fn parse_step(step: &str) -> Result<String, String> {
    validate_id(step).map_err(|e| e.to_string())
}

fn parse_sample_code(code: &str) -> Result<String, String> {
    validate_id(code).map_err(|e| e.to_string())
}

/// Parse a KEY=VALUE pair into a pipeline parameter
///
/// # Example
///
/// ```rust, ignore
/// let (key, value) = parse_param("min_quality=20").unwrap();
///
/// assert_eq!(key, "min_quality");
/// assert_eq!(value, ParamValue::Int(20));
/// ```
pub fn parse_param(pair: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("ERROR: expected KEY=VALUE, got '{}'", pair))?;

    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!("ERROR: invalid parameter name '{}'", key));
    }

    Ok((key.to_string(), ParamValue::parse(value.trim())))
}

// project-wide pub const | names
pub const STEPIPE: &str = "stepipe";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_ENGINE: &str = "nextflow";
pub const DEFAULT_SPECIES: &str = "unspecified";
pub const CONFIG_FILE: &str = "config.toml";

// environment variables
pub const ENV_ENGINE: &str = "STEPIPE_ENGINE";
pub const ENV_PIPELINE_DIR: &str = "STEPIPE_PIPELINE_DIR";
pub const ENV_CONTAINER: &str = "STEPIPE_CONTAINER";
pub const ENV_CONTAINER_CACHE: &str = "STEPIPE_CONTAINER_CACHE";
pub const ENV_OUTPUT_DIR: &str = "STEPIPE_OUTPUT_DIR";
pub const ENV_CONFIG: &str = "STEPIPE_CONFIG";

// layout
pub const READS_DIR: &str = "reads";
pub const RESULTS_DIR: &str = "results";
pub const WORK_DIR: &str = "work";
pub const PROFILE_FILE: &str = "stepipe.config";
pub const COMMAND_FILE: &str = "command.sh";
pub const ENGINE_LOG: &str = "engine.log";

// step scripts
pub const STEP_ENTRY: &str = "main.nf";
pub const STEP_EXT: &str = "nf";

// engine flags
pub const RESUME: &str = "-resume";

// identifiers
pub const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const SAMPLE_CODE_LEN: usize = 8;
pub const MAX_ID_LEN: usize = 64;
pub const DATE_TOKEN_FMT: &str = "%y%m%d";
pub const DATE_TOKEN_LEN: usize = 6;

// container defaults
pub const DOCKER_RUN_OPTIONS: &str = "-u $(id -u):$(id -g)";

// collections
// INFO: longest suffixes first, first match wins
pub const READ_EXTENSIONS: &[(&str, &str)] = &[
    (".fastq.gz", ".fastq.gz"),
    (".fq.gz", ".fastq.gz"),
    (".fastq.bz2", ".fastq.bz2"),
    (".fq.bz2", ".fastq.bz2"),
    (".fasta.gz", ".fasta.gz"),
    (".fa.gz", ".fasta.gz"),
    (".fna.gz", ".fasta.gz"),
    (".fastq", ".fastq"),
    (".fq", ".fastq"),
    (".fasta", ".fasta"),
    (".fa", ".fasta"),
    (".fna", ".fasta"),
    (".bam", ".bam"),
];

#![cfg(unix)]

use chrono::NaiveDate;
use clap::Parser;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use stepipe::{
    cli::Args,
    config::{Config, Settings},
    consts::*,
    core::{ident::sample_code, run},
    error::StepError,
};

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    engine: PathBuf,
    suite: PathBuf,
    out: PathBuf,
    r1: PathBuf,
    r2: PathBuf,
}

/// A fake engine that records its arguments in the run dir; the exit
/// status is patched in per fixture.
const FAKE_ENGINE: &str = r#"#!/bin/sh
printf '%s\n' "$@" > engine.args
exit "${FAKE_EXIT:-0}"
"#;

fn fixture(exit_code: u8) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let engine = root.join("fake-nextflow");
    fs::write(
        &engine,
        FAKE_ENGINE.replace("${FAKE_EXIT:-0}", &exit_code.to_string()),
    )
    .unwrap();
    fs::set_permissions(&engine, fs::Permissions::from_mode(0o755)).unwrap();

    let suite = root.join("suite");
    fs::create_dir_all(suite.join("trim")).unwrap();
    fs::write(suite.join("trim").join("main.nf"), "workflow {}\n").unwrap();
    fs::write(suite.join("assembly.nf"), "workflow {}\n").unwrap();

    let data = root.join("data");
    fs::create_dir(&data).unwrap();
    let r1 = data.join("S1_L001_R1_001.fq.gz");
    let r2 = data.join("S1_L001_R2_001.fq.gz");
    fs::write(&r1, b"r1").unwrap();
    fs::write(&r2, b"r2").unwrap();

    Fixture {
        out: root.join("runs"),
        _dir: dir,
        root,
        engine,
        suite,
        r1,
        r2,
    }
}

fn settings(fx: &Fixture, argv: &[&str]) -> Settings {
    // INFO: -o goes first, anything after `--` belongs to the engine
    let mut full = vec![
        "stepipe".to_string(),
        "-o".to_string(),
        fx.out.display().to_string(),
    ];
    full.extend(argv.iter().map(|s| s.to_string()));

    let env: HashMap<&str, String> = [
        (ENV_ENGINE, fx.engine.display().to_string()),
        (ENV_PIPELINE_DIR, fx.suite.display().to_string()),
    ]
    .into_iter()
    .collect();
    let lookup = move |key: &str| env.get(key).cloned();

    Settings::resolve(Args::parse_from(full), Config::default(), &lookup).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn read_args(run_dir: &Path) -> Vec<String> {
    fs::read_to_string(run_dir.join("engine.args"))
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn paired_run_prepares_tree_and_forwards_exit_code() {
    let fx = fixture(3);
    let r1 = fx.r1.display().to_string();
    let r2 = fx.r2.display().to_string();
    let s = settings(
        &fx,
        &["trim", &r1, &r2, "-s", "Escherichia coli", "-p", "min_quality=25", "--", "-with-trace"],
    );

    let code = run(&s, today()).unwrap();
    assert_eq!(code, 3);

    let sample = sample_code(&fx.r1);
    let sample_dir = fx.out.join("2026").join("escherichia_coli").join(&sample);
    let run_dir = sample_dir.join("trim_261016");

    let link1 = sample_dir.join("reads").join(format!("{}_R1.fastq.gz", sample));
    let link2 = sample_dir.join("reads").join(format!("{}_R2.fastq.gz", sample));
    assert_eq!(fs::read_link(&link1).unwrap(), fx.r1);
    assert_eq!(fs::read_link(&link2).unwrap(), fx.r2);

    let profile = fs::read_to_string(run_dir.join(PROFILE_FILE)).unwrap();
    assert!(profile.contains("    min_quality = 25\n"));
    assert!(profile.contains(&format!("    sample_code = '{}'\n", sample)));
    assert!(profile.contains("    seq_type = 'illumina'\n"));
    assert!(profile.contains("    paired = true\n"));
    assert!(profile.contains("docker {\n    enabled = true\n"));

    let args = read_args(&run_dir);
    assert_eq!(args[0], "-log");
    assert_eq!(args[2], "run");
    assert_eq!(args[3], fx.suite.join("trim/main.nf").display().to_string());
    assert!(args.contains(&run_dir.join(PROFILE_FILE).display().to_string()));
    assert!(!args.contains(&RESUME.to_string()));
    assert_eq!(args.last().map(String::as_str), Some("-with-trace"));

    assert!(run_dir.join(COMMAND_FILE).is_file());
    assert!(run_dir.join(RESULTS_DIR).is_dir());
}

#[test]
fn dry_run_does_not_start_engine() {
    let fx = fixture(7);
    let r1 = fx.r1.display().to_string();
    let s = settings(&fx, &["assembly", &r1, "-t", "nanopore", "-c", "ISO-1", "--dry-run"]);

    assert_eq!(run(&s, today()).unwrap(), 0);

    let sample_dir = fx.out.join("2026").join(DEFAULT_SPECIES).join("ISO-1");
    let run_dir = sample_dir.join("assembly_261016");
    assert!(sample_dir.join("reads").join("ISO-1.fastq.gz").exists());
    assert!(run_dir.join(COMMAND_FILE).is_file());
    assert!(!run_dir.join("engine.args").exists());
}

#[test]
fn resume_reuses_previous_run_dir() {
    let fx = fixture(0);
    let r1 = fx.r1.display().to_string();

    let first = settings(&fx, &["trim", &r1]);
    assert_eq!(run(&first, today()).unwrap(), 0);

    let later = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let resumed = settings(&fx, &["trim", &r1, "--resume"]);
    assert_eq!(run(&resumed, later).unwrap(), 0);

    let sample_dir = fx.out.join("2026").join(DEFAULT_SPECIES).join(sample_code(&fx.r1));
    assert!(!sample_dir.join("trim_261018").exists());
    assert!(read_args(&sample_dir.join("trim_261016")).contains(&RESUME.to_string()));

    let fresh = settings(&fx, &["trim", &r1]);
    assert_eq!(run(&fresh, today()).unwrap(), 0);
    assert!(sample_dir.join("trim_261016_2").is_dir());
}

#[test]
fn reports_missing_inputs() {
    let fx = fixture(0);
    let r1 = fx.r1.display().to_string();
    let missing = fx.root.join("data/none.fq.gz").display().to_string();

    let s = settings(&fx, &["polish", &r1]);
    match run(&s, today()) {
        Err(StepError::StepNotFound { step, available }) => {
            assert_eq!(step, "polish");
            assert_eq!(available, vec!["assembly", "trim"]);
        }
        other => panic!("unexpected: {:?}", other),
    }

    let s = settings(&fx, &["trim", &missing]);
    assert!(matches!(run(&s, today()), Err(StepError::FileNotFound(_))));

    let mut s = settings(&fx, &["trim", &r1]);
    s.engine = fx.root.join("no-such-engine").display().to_string();
    assert!(matches!(run(&s, today()), Err(StepError::EngineNotFound(_))));

    // INFO: nothing was created for failed launches
    assert!(!fx.out.exists());
}

#[test]
fn rejected_read_pairs_leave_no_run_tree() {
    let fx = fixture(0);
    let r1 = fx.r1.display().to_string();
    let r2 = fx.r2.display().to_string();

    let s = settings(&fx, &["assembly", &r1, &r2, "-t", "nanopore"]);
    assert!(matches!(run(&s, today()), Err(StepError::InvalidInput(_))));

    let s = settings(&fx, &["trim", &r1, &r1]);
    assert!(matches!(run(&s, today()), Err(StepError::InvalidInput(_))));

    assert!(!fx.out.exists());

    let s = settings(&fx, &["assembly", &r1, "-t", "nanopore"]);
    assert_eq!(run(&s, today()).unwrap(), 0);

    let sample_dir = fx.out.join("2026").join(DEFAULT_SPECIES).join(sample_code(&fx.r1));
    assert!(sample_dir.join("assembly_261016").is_dir());
    assert!(!sample_dir.join("assembly_261016_2").exists());
}

#[test]
fn relative_pipeline_dir_resolves_from_run_dir() {
    let fx = fixture(0);
    let r1 = fx.r1.display().to_string();

    // INFO: the engine fails unless its script argument exists from its cwd
    fs::write(
        &fx.engine,
        "#!/bin/sh\n[ -f \"$4\" ] || exit 9\nprintf '%s\\n' \"$@\" > engine.args\n",
    )
    .unwrap();

    // INFO: relative to the package root, the cwd of cargo test
    let local = tempfile::tempdir_in(".").unwrap();
    let suite = Path::new(".").join(local.path().file_name().unwrap());
    fs::create_dir(suite.join("trim")).unwrap();
    fs::write(suite.join("trim").join("main.nf"), "workflow {}\n").unwrap();

    let mut s = settings(&fx, &["trim", &r1]);
    s.pipeline_dir = Some(suite.clone());

    assert_eq!(run(&s, today()).unwrap(), 0);

    let run_dir = fx
        .out
        .join("2026")
        .join(DEFAULT_SPECIES)
        .join(sample_code(&fx.r1))
        .join("trim_261016");
    let script = PathBuf::from(&read_args(&run_dir)[3]);
    assert!(script.is_absolute());
    assert_eq!(script, suite.canonicalize().unwrap().join("trim/main.nf"));
}

#[test]
fn reserved_params_and_memory_only_limits() {
    let fx = fixture(0);
    let r1 = fx.r1.display().to_string();
    let s = settings(
        &fx,
        &["trim", &r1, "-p", "paired=true", "-p", "step=other", "--memory", "8", "-d"],
    );

    assert_eq!(run(&s, today()).unwrap(), 0);

    let run_dir = fx
        .out
        .join("2026")
        .join(DEFAULT_SPECIES)
        .join(sample_code(&fx.r1))
        .join("trim_261016");
    let profile = fs::read_to_string(run_dir.join(PROFILE_FILE)).unwrap();

    assert!(profile.contains("    paired = false\n"));
    assert!(profile.contains("    step = 'trim'\n"));
    assert!(profile.contains(&format!(
        "executor {{\n    cpus = {}\n    memory = '8 GB'\n}}\n",
        num_cpus::get()
    )));
}

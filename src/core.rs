use chrono::NaiveDate;
use log::{info, warn};

use crate::{
    config::Settings,
    core::{ident::Identifiers, layout::RunLayout, profile::Profile, reads::ReadSet},
    error::{validate_file, StepError},
    executor::engine::Engine,
};

pub mod ident;
pub mod layout;
pub mod profile;
pub mod reads;

/// Prepare and launch a single pipeline step.
///
/// # Arguments
///
/// * `settings` - Resolved settings of this invocation.
/// * `today` - Date used for the year and date token.
///
/// # Returns
///
/// The engine's exit code (0 for a dry run).
///
/// # Example
///
/// ```rust, ignore
/// let code = run(&settings, chrono::Local::now().date_naive())?;
/// std::process::exit(code as i32);
/// ```
pub fn run(settings: &Settings, today: NaiveDate) -> Result<u8, StepError> {
    let step = settings
        .step
        .as_deref()
        .ok_or_else(|| StepError::InvalidInput("no step given".into()))?;
    let read1 = settings
        .read1
        .as_ref()
        .ok_or_else(|| StepError::InvalidInput("no primary read file given".into()))?;

    validate_file(read1)?;
    if let Some(read2) = &settings.read2 {
        validate_file(read2)?;
    }
    ReadSet::check(read1, settings.read2.as_deref(), settings.seq_type)?;

    let engine = Engine::locate(&settings.engine)?;
    let script = Engine::step_script(settings.pipeline_dir()?, step)?;
    info!("INFO [{}]: Using step script {}", step, script.display());

    let ids = Identifiers::derive(read1, settings.sample_code.as_deref(), today)?;
    info!(
        "INFO [{}]: sample {} | species {} | {} | {}",
        step, ids.sample_code, settings.species, settings.seq_type, ids.date_token
    );

    let layout = RunLayout::create(
        &settings.output_dir,
        &settings.species,
        step,
        &ids,
        settings.resume,
    )?;

    let reads = ReadSet::link(
        read1,
        settings.read2.as_deref(),
        settings.seq_type,
        &ids.sample_code,
        &layout.reads_dir,
    )?;

    Profile::new(settings, step, &ids, &layout, &reads, today).write(&layout.profile())?;

    // INFO: -resume is only meaningful when an earlier run directory was reused
    let job = engine.job(&script, &layout, layout.resumed, &settings.engine_args);
    job.write(&layout.command())?;

    if settings.dry_run {
        warn!("WARN: Dry run, engine not started");
        println!("{}", job.to_shell());
        return Ok(0);
    }

    engine.execute(&job)
}

/// Print the steps available in the configured pipeline suite.
pub fn list_steps(settings: &Settings) -> Result<u8, StepError> {
    let dir = settings.pipeline_dir()?;
    let steps = Engine::list_steps(dir)?;

    if steps.is_empty() {
        warn!("WARN: No steps found in {}", dir.display());
    }

    for step in steps {
        println!("{}", step);
    }

    Ok(0)
}

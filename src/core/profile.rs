use chrono::NaiveDate;
use log::warn;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::{
    config::{quote, ContainerEngine, ParamValue, Settings},
    consts::*,
    core::{ident::Identifiers, layout::RunLayout, reads::ReadSet},
    error::StepError,
};

/// Engine configuration fragment controlling container execution
///
/// # Example
///
/// ```rust, ignore
/// let profile = Profile::new(&settings, "trim", &ids, &layout, &reads, today);
/// profile.write(&layout.profile())?;
/// ```
#[derive(Debug, Clone)]
pub struct Profile {
    pub params: BTreeMap<String, ParamValue>,
    pub container: ContainerEngine,
    pub cache_dir: Option<PathBuf>,
    pub run_options: Option<String>,
    pub cpus: Option<usize>,
    pub memory: Option<usize>,
    pub generated: NaiveDate,
}

impl Profile {
    pub fn new(
        settings: &Settings,
        step: &str,
        ids: &Identifiers,
        layout: &RunLayout,
        reads: &ReadSet,
        today: NaiveDate,
    ) -> Self {
        let builtin = [
            ("input", ParamValue::Str(reads.input_pattern())),
            (
                "outdir",
                ParamValue::Str(layout.results_dir.to_string_lossy().into_owned()),
            ),
            ("paired", ParamValue::Bool(reads.is_paired())),
            ("sample_code", ParamValue::Str(ids.sample_code.clone())),
            ("seq_type", ParamValue::Str(settings.seq_type.to_string())),
            ("species", ParamValue::Str(settings.species.clone())),
            ("step", ParamValue::Str(step.to_string())),
        ];

        let mut params = settings.params.clone();
        for (key, value) in builtin {
            if params.insert(key.to_string(), value).is_some() {
                warn!("WARN: parameter '{}' is set by stepipe, ignoring the given value", key);
            }
        }

        // INFO: a memory limit alone still needs a cpu cap for the local executor
        let cpus = match (settings.cpus, settings.memory) {
            (Some(cpus), _) => Some(cpus),
            (None, Some(_)) => Some(num_cpus::get()),
            (None, None) => None,
        };

        Self {
            params,
            container: settings.container,
            cache_dir: settings.container_cache.clone(),
            run_options: settings.container_run_options.clone(),
            cpus,
            memory: settings.memory,
            generated: today,
        }
    }

    /// Render the fragment in engine config syntax.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "// generated by {} {} on {}",
            STEPIPE,
            VERSION,
            self.generated.format("%Y-%m-%d")
        );
        out.push('\n');

        out.push_str("params {\n");
        for (key, value) in &self.params {
            let _ = writeln!(out, "    {} = {}", key, value.to_literal());
        }
        out.push_str("}\n\n");

        let _ = writeln!(out, "{} {{", self.container.scope());
        out.push_str("    enabled = true\n");

        let run_options = match (&self.run_options, self.container) {
            (Some(opts), _) => Some(opts.clone()),
            (None, ContainerEngine::Docker) => Some(DOCKER_RUN_OPTIONS.to_string()),
            (None, _) => None,
        };

        if self.container.is_image_based() {
            out.push_str("    autoMounts = true\n");
            if let Some(cache) = &self.cache_dir {
                let _ = writeln!(out, "    cacheDir = {}", quote(&cache.to_string_lossy()));
            }
        } else if self.cache_dir.is_some() {
            warn!(
                "WARN: container cache dir is ignored by {}",
                self.container.scope()
            );
        }

        if let Some(opts) = run_options {
            let _ = writeln!(out, "    runOptions = {}", quote(&opts));
        }
        out.push_str("}\n");

        if let Some(cpus) = self.cpus {
            out.push_str("\nexecutor {\n");
            let _ = writeln!(out, "    cpus = {}", cpus);
            if let Some(memory) = self.memory {
                let _ = writeln!(out, "    memory = '{} GB'", memory);
            }
            out.push_str("}\n");
        }

        out
    }

    pub fn write(&self, path: &Path) -> Result<(), StepError> {
        std::fs::write(path, self.render())?;
        log::info!("INFO: Wrote engine config to {}", path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(container: ContainerEngine) -> Profile {
        let mut params = BTreeMap::new();
        params.insert("outdir".to_string(), ParamValue::Str("/runs/x/results".into()));
        params.insert("min_quality".to_string(), ParamValue::Int(20));
        params.insert("sample_code".to_string(), ParamValue::Str("AB12".into()));

        Profile {
            params,
            container,
            cache_dir: None,
            run_options: None,
            cpus: None,
            memory: None,
            generated: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        }
    }

    #[test]
    fn test_render_docker() {
        let text = profile(ContainerEngine::Docker).render();

        assert!(text.starts_with("// generated by stepipe "));
        assert!(text.contains("on 2026-10-16\n"));
        assert!(text.contains(
            "params {\n    min_quality = 20\n    outdir = '/runs/x/results'\n    sample_code = 'AB12'\n}\n"
        ));
        assert!(text.contains("docker {\n    enabled = true\n    runOptions = '-u $(id -u):$(id -g)'\n}\n"));
        assert!(!text.contains("executor"));
    }

    #[test]
    fn test_render_singularity_with_cache_and_limits() {
        let mut p = profile(ContainerEngine::Singularity);
        p.cache_dir = Some(PathBuf::from("/scratch/images"));
        p.run_options = Some("--bind /data".into());
        p.cpus = Some(4);
        p.memory = Some(16);

        let text = p.render();

        assert!(text.contains(
            "singularity {\n    enabled = true\n    autoMounts = true\n    cacheDir = '/scratch/images'\n    runOptions = '--bind /data'\n}\n"
        ));
        assert!(text.contains("executor {\n    cpus = 4\n    memory = '16 GB'\n}\n"));
        assert!(!text.contains("docker"));
    }

    #[test]
    fn test_render_podman_without_options() {
        let text = profile(ContainerEngine::Podman).render();

        assert!(text.contains("podman {\n    enabled = true\n}\n"));
        assert!(!text.contains("runOptions"));
    }
}

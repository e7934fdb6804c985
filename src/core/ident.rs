use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::{consts::*, error::validate_id, error::StepError};

/// Where the sample code of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    Derived,
    Override,
}

/// Identifiers derived once per invocation
///
/// # Example
///
/// ```rust, ignore
/// let today = chrono::NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
/// let ids = Identifiers::derive(Path::new("reads_R1.fq.gz"), None, today)?;
///
/// assert_eq!(ids.year, "2026");
/// assert_eq!(ids.date_token, "261016");
/// assert_eq!(ids.sample_code.len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    pub year: String,
    pub date_token: String,
    pub sample_code: String,
    pub code_source: CodeSource,
}

impl Identifiers {
    /// Derive identifiers for a primary read file. An override code wins
    /// over the hash-derived one.
    pub fn derive(
        read1: &Path,
        code: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, StepError> {
        let (sample_code, code_source) = match code {
            Some(code) => (validate_id(code)?, CodeSource::Override),
            None => {
                let canonical = read1
                    .canonicalize()
                    .map_err(|_| StepError::FileNotFound(read1.to_path_buf()))?;
                (sample_code(&canonical), CodeSource::Derived)
            }
        };

        Ok(Self {
            year: year(today),
            date_token: date_token(today),
            sample_code,
            code_source,
        })
    }
}

/// Four-digit year
pub fn year(today: NaiveDate) -> String {
    format!("{:04}", today.year())
}

/// Date token as YYMMDD
pub fn date_token(today: NaiveDate) -> String {
    today.format(DATE_TOKEN_FMT).to_string()
}

/// Pseudo-random sample code from the SHA-256 of a path.
///
/// The first SAMPLE_CODE_LEN digest bytes are mapped onto CHARSET, so the
/// same path always yields the same code.
pub fn sample_code(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();

    log::debug!(
        "DEBUG: sha256({}) = {}",
        path.display(),
        hex::encode(&digest)
    );

    digest
        .iter()
        .take(SAMPLE_CODE_LEN)
        .map(|b| CHARSET[*b as usize % CHARSET.len()] as char)
        .collect()
}

/// Lowercase slug used for the species directory
///
/// # Example
///
/// ```rust, ignore
/// assert_eq!(species_slug(Some("Escherichia coli K-12")), "escherichia_coli_k_12");
/// assert_eq!(species_slug(None), "unspecified");
/// ```
pub fn species_slug(species: Option<&str>) -> String {
    let slug = species
        .unwrap_or_default()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if slug.is_empty() {
        DEFAULT_SPECIES.to_string()
    } else {
        slug
    }
}

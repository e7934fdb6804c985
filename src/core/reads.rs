use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::{config::SeqType, consts::*, error::StepError};

/// A read file linked into the run tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedRead {
    pub source: PathBuf,
    pub link: PathBuf,
}

/// Primary (and optional secondary) reads of a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSet {
    pub primary: LinkedRead,
    pub secondary: Option<LinkedRead>,
}

impl ReadSet {
    /// Symlink the read files into `reads_dir` under the engine naming
    /// convention.
    ///
    /// # Arguments
    ///
    /// * `read1` - Primary read file.
    /// * `read2` - Secondary read file, short-read data only.
    /// * `seq_type` - Sequencing type.
    /// * `sample_code` - Sample code used as link stem.
    /// * `reads_dir` - Directory holding the links.
    ///
    /// # Example
    ///
    /// ```rust, ignore
    /// let reads = ReadSet::link(
    ///     Path::new("s_1.fq.gz"),
    ///     Some(Path::new("s_2.fq.gz")),
    ///     SeqType::Illumina,
    ///     "AB12CD34",
    ///     &layout.reads_dir,
    /// )?;
    ///
    /// assert!(reads.primary.link.ends_with("AB12CD34_R1.fastq.gz"));
    /// ```
    pub fn link(
        read1: &Path,
        read2: Option<&Path>,
        seq_type: SeqType,
        sample_code: &str,
        reads_dir: &Path,
    ) -> Result<Self, StepError> {
        let (source1, source2) = Self::check(read1, read2, seq_type)?;

        let ext1 = normalized_extension(&source1);
        let primary = LinkedRead {
            link: reads_dir.join(link_name(&ext1, seq_type, sample_code, 1)),
            source: source1,
        };
        symlink(&primary)?;

        let secondary = match source2 {
            Some(source) => {
                let ext2 = normalized_extension(&source);
                if ext2 != ext1 {
                    warn!(
                        "WARN: {} and {} have different formats",
                        primary.source.display(),
                        source.display()
                    );
                }

                let read = LinkedRead {
                    link: reads_dir.join(link_name(&ext2, seq_type, sample_code, 2)),
                    source,
                };
                symlink(&read)?;
                Some(read)
            }
            None => None,
        };

        Ok(Self { primary, secondary })
    }

    /// Check a read pair before anything is written: both files exist, a
    /// secondary read is only given for short-read data and differs from
    /// the primary one.
    ///
    /// Returns the canonical paths of both reads.
    pub fn check(
        read1: &Path,
        read2: Option<&Path>,
        seq_type: SeqType,
    ) -> Result<(PathBuf, Option<PathBuf>), StepError> {
        let source1 = canonical(read1)?;
        let source2 = read2.map(canonical).transpose()?;

        if let Some(source2) = &source2 {
            if !seq_type.is_short_read() {
                return Err(StepError::InvalidInput(format!(
                    "a secondary read file is only valid for short-read data, not {}",
                    seq_type
                )));
            }
            if *source2 == source1 {
                return Err(StepError::InvalidInput(format!(
                    "primary and secondary reads are the same file: {}",
                    source1.display()
                )));
            }
        }

        Ok((source1, source2))
    }

    pub fn is_paired(&self) -> bool {
        self.secondary.is_some()
    }

    /// Input handed to the engine: a `_R{1,2}` glob for paired data, the
    /// single link otherwise.
    pub fn input_pattern(&self) -> String {
        match &self.secondary {
            Some(_) => {
                let link = self.primary.link.to_string_lossy();
                match link.rfind("_R1") {
                    Some(idx) => format!("{}_R{{1,2}}{}", &link[..idx], &link[idx + 3..]),
                    None => link.into_owned(),
                }
            }
            None => self.primary.link.to_string_lossy().into_owned(),
        }
    }
}

fn canonical(path: &Path) -> Result<PathBuf, StepError> {
    if !path.is_file() {
        return Err(StepError::FileNotFound(path.to_path_buf()));
    }

    path.canonicalize()
        .map_err(|_| StepError::FileNotFound(path.to_path_buf()))
}

/// Normalized extension of a read file, e.g. `.fq.gz` -> `.fastq.gz`.
///
/// Unknown formats keep everything after the first '.' of the file name.
pub fn normalized_extension(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = name.to_lowercase();

    if let Some((_, ext)) = READ_EXTENSIONS
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix) && lower.len() > suffix.len())
    {
        return ext.to_string();
    }

    let ext = match name.find('.') {
        Some(idx) if idx > 0 => name[idx..].to_string(),
        _ => String::new(),
    };

    warn!(
        "WARN: unrecognized read format for {}, keeping extension '{}'",
        path.display(),
        ext
    );

    ext
}

/// Link file name for mate `mate` (1 or 2) of a sample, `ext` being the
/// normalized extension of its source.
pub fn link_name(ext: &str, seq_type: SeqType, sample_code: &str, mate: u8) -> String {
    if seq_type.is_short_read() {
        format!("{}_R{}{}", sample_code, mate, ext)
    } else {
        format!("{}{}", sample_code, ext)
    }
}

fn symlink(read: &LinkedRead) -> Result<(), StepError> {
    match std::fs::symlink_metadata(&read.link) {
        Ok(meta) => {
            let current = if meta.file_type().is_symlink() {
                std::fs::read_link(&read.link).ok()
            } else {
                None
            };

            if current.as_deref() == Some(read.source.as_path()) {
                debug!("DEBUG: {} already linked", read.link.display());
                return Ok(());
            }

            Err(StepError::LinkConflict {
                link: read.link.clone(),
                target: read.source.clone(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            create_symlink(&read.source, &read.link)?;
            info!(
                "INFO: Linked {} -> {}",
                read.link.display(),
                read.source.display()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn create_symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn create_symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"@r\nACGT\n+\nIIII\n").unwrap();
        path
    }

    #[test]
    fn test_normalized_extension() {
        assert_eq!(normalized_extension(Path::new("a/S1_L001_R1.fq.gz")), ".fastq.gz");
        assert_eq!(normalized_extension(Path::new("S1.FASTQ.GZ")), ".fastq.gz");
        assert_eq!(normalized_extension(Path::new("S1.fq")), ".fastq");
        assert_eq!(normalized_extension(Path::new("S1.fastq.bz2")), ".fastq.bz2");
        assert_eq!(normalized_extension(Path::new("contigs.fna.gz")), ".fasta.gz");
        assert_eq!(normalized_extension(Path::new("movie.hifi.bam")), ".bam");
        assert_eq!(normalized_extension(Path::new("reads.txt.zst")), ".txt.zst");
        assert_eq!(normalized_extension(Path::new("reads")), "");
    }

    #[test]
    fn test_link_names() {
        let ext = normalized_extension(Path::new("/x/sample_1.fq.gz"));
        assert_eq!(
            link_name(&ext, SeqType::Illumina, "AB12", 1),
            "AB12_R1.fastq.gz"
        );
        assert_eq!(
            link_name(&ext, SeqType::Illumina, "AB12", 2),
            "AB12_R2.fastq.gz"
        );
        assert_eq!(link_name(&ext, SeqType::Nanopore, "AB12", 1), "AB12.fastq.gz");
    }

    #[test]
    fn test_link_paired() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "s_1.fq.gz");
        let r2 = touch(dir.path(), "s_2.fq.gz");
        let reads_dir = dir.path().join("reads");
        fs::create_dir(&reads_dir).unwrap();

        let reads =
            ReadSet::link(&r1, Some(&r2), SeqType::Illumina, "AB12", &reads_dir).unwrap();

        assert!(reads.is_paired());
        assert_eq!(reads.primary.link, reads_dir.join("AB12_R1.fastq.gz"));
        assert_eq!(
            fs::read_link(&reads.primary.link).unwrap(),
            r1.canonicalize().unwrap()
        );
        assert_eq!(
            reads.input_pattern(),
            format!("{}/AB12_R{{1,2}}.fastq.gz", reads_dir.display())
        );

        // INFO: linking again is a no-op
        assert!(ReadSet::link(&r1, Some(&r2), SeqType::Illumina, "AB12", &reads_dir).is_ok());
    }

    #[test]
    fn test_link_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "a.fastq");
        let other = touch(dir.path(), "b.fastq");
        let reads_dir = dir.path().join("reads");
        fs::create_dir(&reads_dir).unwrap();

        ReadSet::link(&r1, None, SeqType::Nanopore, "CODE", &reads_dir).unwrap();
        let res = ReadSet::link(&other, None, SeqType::Nanopore, "CODE", &reads_dir);

        assert!(matches!(res, Err(StepError::LinkConflict { .. })));
    }

    #[test]
    fn test_link_rejects_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "a.fastq.gz");
        let r2 = touch(dir.path(), "b.fastq.gz");
        let reads_dir = dir.path().to_path_buf();

        assert!(matches!(
            ReadSet::link(&r1, Some(&r2), SeqType::Pacbio, "C", &reads_dir),
            Err(StepError::InvalidInput(_))
        ));
        assert!(matches!(
            ReadSet::link(&r1, Some(&r1), SeqType::Illumina, "C", &reads_dir),
            Err(StepError::InvalidInput(_))
        ));
        assert!(matches!(
            ReadSet::link(&dir.path().join("nope.fq"), None, SeqType::Illumina, "C", &reads_dir),
            Err(StepError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_check_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "a.fastq.gz");
        let r2 = touch(dir.path(), "b.fastq.gz");

        let (s1, s2) = ReadSet::check(&r1, Some(&r2), SeqType::Illumina).unwrap();
        assert_eq!(s1, r1.canonicalize().unwrap());
        assert_eq!(s2, Some(r2.canonicalize().unwrap()));

        assert!(ReadSet::check(&r1, Some(&r2), SeqType::Nanopore).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_link_unknown_format_pair() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "s_1.reads.txt");
        let r2 = touch(dir.path(), "s_2.reads.txt");
        let reads_dir = dir.path().join("reads");
        fs::create_dir(&reads_dir).unwrap();

        let reads =
            ReadSet::link(&r1, Some(&r2), SeqType::Illumina, "AB12", &reads_dir).unwrap();

        assert_eq!(reads.primary.link, reads_dir.join("AB12_R1.reads.txt"));
        assert_eq!(
            reads.secondary.map(|r| r.link),
            Some(reads_dir.join("AB12_R2.reads.txt"))
        );
    }

    #[test]
    fn test_single_end_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "s.fq");
        let reads_dir = dir.path().join("reads");
        fs::create_dir(&reads_dir).unwrap();

        let reads = ReadSet::link(&r1, None, SeqType::Illumina, "Z9", &reads_dir).unwrap();

        assert!(!reads.is_paired());
        assert_eq!(
            reads.input_pattern(),
            reads_dir.join("Z9_R1.fastq").to_string_lossy()
        );
    }
}

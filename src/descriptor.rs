//! Archive descriptors — immutable job descriptions
//!
//! A descriptor captures everything one operation needs: archive kind,
//! direction, compression level, ordered inputs, output directory, and the
//! resolved archive name. All validation happens in the factory functions so
//! that a descriptor that exists is a descriptor that can run.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::naming;
use crate::types::{ArchiveKind, CompressionMode};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Immutable description of one compress/extract job.
#[derive(Clone, Debug, Serialize)]
pub struct ArchiveDescriptor {
    kind: ArchiveKind,
    mode: CompressionMode,
    level: i64,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    archive_name: String,
}

impl ArchiveDescriptor {
    /// The archive container kind.
    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Whether this job compresses or extracts.
    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// The validated compression level (0 for extraction).
    pub fn level(&self) -> i64 {
        self.level
    }

    /// Ordered input paths. For extraction this is the archive itself.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Directory the output is written into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolved output archive name, including extension.
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Full path of the archive being created (compression direction).
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.archive_name)
    }

    /// Path of the archive being read (extraction direction).
    ///
    /// Extraction descriptors always carry exactly one input.
    pub fn archive_path(&self) -> &Path {
        &self.inputs[0]
    }
}

/// Create a descriptor for one compression job.
///
/// Fails fast on an empty input set, a level outside the codec's accepted
/// range, or an archive name with illegal characters. A missing extension is
/// completed with the kind's default.
pub fn compression_descriptor(
    codec: &dyn Codec,
    kind: ArchiveKind,
    archive_name: &str,
    level: i64,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
) -> Result<ArchiveDescriptor> {
    validate_level(codec, level)?;
    if inputs.is_empty() {
        return Err(Error::config(
            "at least one input path is required",
            "inputs",
        ));
    }
    let archive_name = validated_name(kind, archive_name)?;

    Ok(ArchiveDescriptor {
        kind,
        mode: CompressionMode::Compress,
        level,
        inputs,
        output_dir,
        archive_name,
    })
}

/// Create one compression descriptor per input, each with a unique name.
///
/// Every descriptor receives a single input and an archive name that
/// collides neither with files already in `output_dir` nor with the names
/// chosen for its batch siblings.
pub fn compression_descriptors(
    codec: &dyn Codec,
    kind: ArchiveKind,
    base_name: &str,
    level: i64,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
) -> Result<Vec<ArchiveDescriptor>> {
    validate_level(codec, level)?;
    if inputs.is_empty() {
        return Err(Error::config(
            "at least one input path is required",
            "inputs",
        ));
    }

    let base = strip_known_extension(kind, base_name);
    let ext = kind.default_extension();
    let mut reserved = HashSet::new();

    inputs
        .into_iter()
        .map(|input| {
            let name = naming::unique_filename_among(&output_dir, base, ext, &mut reserved);
            compression_descriptor(codec, kind, &name, level, vec![input], output_dir.clone())
        })
        .collect()
}

/// Create a descriptor for one extraction job.
pub fn extraction_descriptor(
    kind: ArchiveKind,
    archive: PathBuf,
    output_dir: PathBuf,
) -> Result<ArchiveDescriptor> {
    let archive_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidName {
            name: archive.display().to_string(),
            reason: "archive path has no file name".to_string(),
        })?;

    Ok(ArchiveDescriptor {
        kind,
        mode: CompressionMode::Extract,
        level: 0,
        inputs: vec![archive],
        output_dir,
        archive_name,
    })
}

fn validate_level(codec: &dyn Codec, level: i64) -> Result<()> {
    let accepted = codec.accepted_levels();
    if !accepted.contains(&level) {
        return Err(Error::config(
            format!(
                "compression level {level} outside accepted range {}..={}",
                accepted.start(),
                accepted.end()
            ),
            "compression_level",
        ));
    }
    Ok(())
}

/// Validate the archive name and complete a missing extension.
fn validated_name(kind: ArchiveKind, archive_name: &str) -> Result<String> {
    if archive_name.trim().is_empty() {
        return Err(Error::InvalidName {
            name: archive_name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if naming::has_illegal_chars(archive_name) {
        return Err(Error::InvalidName {
            name: archive_name.to_string(),
            reason: "name contains illegal characters".to_string(),
        });
    }

    let lower = archive_name.to_lowercase();
    let has_extension = kind.extensions().iter().any(|ext| lower.ends_with(ext));
    if has_extension {
        Ok(archive_name.to_string())
    } else {
        Ok(format!("{archive_name}{}", kind.default_extension()))
    }
}

fn strip_known_extension<'a>(kind: ArchiveKind, name: &'a str) -> &'a str {
    let lower = name.to_lowercase();
    for ext in kind.extensions() {
        if lower.ends_with(ext) {
            return &name[..name.len() - ext.len()];
        }
    }
    name
}

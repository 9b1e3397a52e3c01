//! ZIP codec backed by the `zip` crate

use crate::codec::{Codec, CodecContext};
use crate::descriptor::ArchiveDescriptor;
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::FileOptions;

/// Codec for ZIP archives.
///
/// Compresses with Deflate at the descriptor's level and extracts with
/// path-traversal protection. Progress is reported as cumulative bytes
/// processed over the total payload, which keeps per-operation progress
/// monotonically non-decreasing.
pub struct ZipCodec;

/// One file scheduled for archiving: absolute path, entry name, size.
struct PlannedEntry {
    path: PathBuf,
    name: String,
    size: u64,
}

impl Codec for ZipCodec {
    fn accepted_levels(&self) -> std::ops::RangeInclusive<i64> {
        // Deflate levels as accepted by the zip crate.
        0..=9
    }

    fn compress(&self, descriptor: &ArchiveDescriptor, ctx: &CodecContext) -> Result<()> {
        let output_path = descriptor.output_path();
        debug!(
            archive = %output_path.display(),
            inputs = descriptor.inputs().len(),
            level = descriptor.level(),
            "starting ZIP compression"
        );

        let entries = plan_entries(descriptor.inputs(), ctx)?;
        let total_bytes: u64 = entries.iter().map(|e| e.size).sum();

        let file = std::fs::File::create(&output_path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(descriptor.level() as i32));

        let mut processed: u64 = 0;
        for entry in &entries {
            ctx.check_interrupted()?;

            writer.start_file(entry.name.as_str(), options).map_err(|e| Error::Codec {
                archive: output_path.clone(),
                reason: format!("failed to start entry '{}': {e}", entry.name),
            })?;

            let mut input = std::fs::File::open(&entry.path)?;
            copy_chunked(&mut input, &mut writer, ctx, &mut processed, total_bytes)?;
        }

        writer.finish().map_err(|e| Error::Codec {
            archive: output_path.clone(),
            reason: format!("failed to finalize archive: {e}"),
        })?;

        ctx.report_percent(100.0);
        info!(
            archive = %output_path.display(),
            entries = entries.len(),
            bytes = total_bytes,
            "ZIP compression finished"
        );
        Ok(())
    }

    fn extract(&self, descriptor: &ArchiveDescriptor, ctx: &CodecContext) -> Result<()> {
        let archive_path = descriptor.archive_path().to_path_buf();
        let dest = descriptor.output_dir().to_path_buf();
        debug!(
            archive = %archive_path.display(),
            dest = %dest.display(),
            "starting ZIP extraction"
        );

        std::fs::create_dir_all(&dest)?;

        let file = std::fs::File::open(&archive_path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Codec {
            archive: archive_path.clone(),
            reason: format!("failed to read ZIP archive: {e}"),
        })?;

        // First pass: total payload of the entries that will be written.
        let mut total_bytes: u64 = 0;
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|e| Error::Codec {
                archive: archive_path.clone(),
                reason: format!("failed to read ZIP entry: {e}"),
            })?;
            if !entry.is_dir() && ctx.accepts_entry(entry.name()) {
                total_bytes += entry.size();
            }
        }

        let mut processed: u64 = 0;
        let mut extracted = 0usize;
        for index in 0..archive.len() {
            ctx.check_interrupted()?;

            let mut entry = archive.by_index(index).map_err(|e| Error::Codec {
                archive: archive_path.clone(),
                reason: format!("failed to read ZIP entry: {e}"),
            })?;

            if !ctx.accepts_entry(entry.name()) {
                continue;
            }

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!(entry = entry.name(), "skipping entry with unsafe path");
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&target)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut output = std::fs::File::create(&target)?;
            copy_chunked(&mut entry, &mut output, ctx, &mut processed, total_bytes)?;
            extracted += 1;
        }

        ctx.report_percent(100.0);
        info!(
            archive = %archive_path.display(),
            extracted,
            "ZIP extraction finished"
        );
        Ok(())
    }
}

/// Collect the files to archive, applying the entry filter up front so the
/// progress total reflects the actual payload.
fn plan_entries(inputs: &[PathBuf], ctx: &CodecContext) -> Result<Vec<PlannedEntry>> {
    let mut entries = Vec::new();
    for input in inputs {
        let metadata = std::fs::metadata(input)?;
        if metadata.is_dir() {
            let root_name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            walk_directory(input, &root_name, ctx, &mut entries)?;
        } else {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if ctx.accepts_entry(&name) {
                entries.push(PlannedEntry {
                    path: input.clone(),
                    name,
                    size: metadata.len(),
                });
            }
        }
    }
    Ok(entries)
}

fn walk_directory(
    dir: &Path,
    prefix: &str,
    ctx: &CodecContext,
    entries: &mut Vec<PlannedEntry>,
) -> Result<()> {
    let mut children: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    // Deterministic entry order.
    children.sort_by_key(|c| c.file_name());

    for child in children {
        let path = child.path();
        let name = if prefix.is_empty() {
            child.file_name().to_string_lossy().into_owned()
        } else {
            format!("{prefix}/{}", child.file_name().to_string_lossy())
        };

        let metadata = match child.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable entry; progress may be inaccurate");
                continue;
            }
        };

        if metadata.is_dir() {
            walk_directory(&path, &name, ctx, entries)?;
        } else if ctx.accepts_entry(&name) {
            entries.push(PlannedEntry {
                path,
                name,
                size: metadata.len(),
            });
        }
    }
    Ok(())
}

/// Copy `reader` into `writer` in buffer-sized chunks, polling the interrupt
/// flag at every chunk boundary and reporting cumulative progress.
fn copy_chunked<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    ctx: &CodecContext,
    processed: &mut u64,
    total: u64,
) -> Result<()> {
    let mut buffer = vec![0u8; ctx.copy_buffer_size()];
    loop {
        ctx.check_interrupted()?;
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        *processed += read as u64;
        if total > 0 {
            ctx.report_percent(*processed as f64 / total as f64 * 100.0);
        }
    }
    Ok(())
}

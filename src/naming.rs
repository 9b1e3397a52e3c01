//! Collision-free output-name generation
//!
//! Output archives are never silently overwritten: names are probed against
//! the filesystem and, for batch requests, against the sibling names chosen
//! earlier in the same batch. Probing is pure linear suffixing — a suffix
//! freed by a later deletion is never reused within one resolution.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Characters that are rejected in archive names across platforms.
const ILLEGAL_CHARS: &[char] = &['<', '>', '/', '\\', '|', ':', '*', '"', '?'];

/// Returns `true` if the name contains characters that are illegal in
/// filenames on at least one supported platform.
pub fn has_illegal_chars(name: &str) -> bool {
    name.chars().any(|c| ILLEGAL_CHARS.contains(&c))
}

/// Generate a unique file path inside `dir` for `base` + `ext`.
///
/// A leading asterisk in `ext` (as produced by file-dialog filter tokens
/// like `*.zip`) is stripped before concatenation. If `dir/base.ext` does
/// not exist it is returned unchanged; otherwise `start_suffix` (minimum 1)
/// is appended and incremented until a free name is found.
///
/// # Examples
///
/// ```
/// use archive_engine::naming::unique_filename;
/// use std::path::Path;
///
/// let dir = std::env::temp_dir();
/// let path = unique_filename(&dir, "definitely-not-there", ".zip", 1);
/// assert!(path.to_string_lossy().ends_with("definitely-not-there.zip"));
/// ```
pub fn unique_filename(dir: &Path, base: &str, ext: &str, start_suffix: u32) -> PathBuf {
    let ext = ext.strip_prefix('*').unwrap_or(ext);

    let candidate = dir.join(format!("{base}{ext}"));
    if !candidate.exists() {
        return candidate;
    }

    let mut suffix = start_suffix.max(1);
    loop {
        let candidate = dir.join(format!("{base}{suffix}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Pick a unique archive name for one member of a batch.
///
/// Like [`unique_filename`], but additionally guards against collisions with
/// sibling names already chosen in the same batch (which do not exist on
/// disk yet). The chosen name is recorded in `reserved` and returned without
/// the directory component.
pub(crate) fn unique_filename_among(
    dir: &Path,
    base: &str,
    ext: &str,
    reserved: &mut HashSet<String>,
) -> String {
    let ext = ext.strip_prefix('*').unwrap_or(ext);

    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{base}{ext}")
        } else {
            format!("{base}{suffix}{ext}")
        };
        suffix += 1;

        if !reserved.contains(&name) && !dir.join(&name).exists() {
            reserved.insert(name.clone());
            return name;
        }
    }
}

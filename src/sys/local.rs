use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Drops characters that are not allowed in file names on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Creates `<dir>/<stem>.<ext>`, or `<stem>(n).<ext>` when that is taken, and
/// returns its path. The empty file reserves the name, so repeated calls
/// never hand out the same path.
pub fn reserve_unique_path(dir: &Path, stem: &str, ext: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stem = sanitize_file_name(stem);

    let mut counter = 0u32;
    loop {
        let name = if counter == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}({}).{}", stem, counter, ext)
        };
        let candidate = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Files that could not be removed and need manual deletion.
    pub remaining: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Best-effort removal of temporary segment files. Failures are reported,
/// never raised.
pub fn remove_temp_files(paths: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => report.removed.push(path.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.removed.push(path.clone()),
            Err(e) => {
                log::warn!("Failed to remove temporary file {}: {}", path.display(), e);
                report.remaining.push(path.clone());
            }
        }
    }

    // Leave the directory alone if anything else still lives there.
    if let Some(dir) = paths.first().and_then(|p| p.parent()) {
        let _ = fs::remove_dir(dir);
    }
    report
}

/// Removes a reserved output file that ffmpeg never wrote to.
pub fn discard_if_empty(path: &Path) {
    if fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false) {
        let _ = fs::remove_file(path);
    }
}

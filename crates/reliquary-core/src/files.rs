//! Save-file discovery on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files under `dir` whose extension equals `extension` (without the dot,
/// compared case-insensitively), sorted by path. An empty extension matches
/// every file.
pub fn list_save_files(dir: &Path, recursive: bool, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect(dir, recursive, extension.trim_start_matches('.'), &mut out)?;
    out.sort();
    Ok(out)
}

fn collect(dir: &Path, recursive: bool, extension: &str, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect(&path, recursive, extension, out)?;
            }
            continue;
        }
        let matches = extension.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            out.push(path);
        }
    }
    Ok(())
}

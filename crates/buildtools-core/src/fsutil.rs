//! Filesystem helpers for moving trees and writing files atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::domain::error::{BuildError, Result};

/// Path with `suffix` appended to its file name (`a.jar` + `.part` -> `a.jar.part`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Write `data` to a temporary file beside `path` and rename it into place.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = parent_or_cwd(path);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| BuildError::Io(e.error))?;
    Ok(())
}

/// Write lines joined by `\n`, with a trailing newline.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Read a text file as lines (`\n` or `\r\n` terminated).
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Recursively copy `from` into `to`, creating `to`.
pub fn copy_dir(from: &Path, to: &Path) -> Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| BuildError::Io(std::io::Error::other(e)))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Move a directory, falling back to copy-and-delete across filesystems.
/// Fails if `to` already exists.
pub fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        return Err(BuildError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        )));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    debug!(from = %from.display(), to = %to.display(), "Rename failed, copying");
    copy_dir(from, to)?;
    fs::remove_dir_all(from)?;
    Ok(())
}

/// Replace `to` with `from`, removing whatever `to` held.
pub fn replace_dir(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    move_dir(from, to)
}

fn parent_or_cwd(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

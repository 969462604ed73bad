//! Atomic file replacement
//!
//! The store file is rewritten in full on every flush, so a crash mid-write
//! must never leave a truncated collection behind.
//!
//! # Pattern
//!
//! 1. Write to a sibling temporary file (`<name>.tmp`)
//! 2. Call sync_all() to flush to disk
//! 3. Rename the temporary file over the final path
//!
//! Readers therefore see either the previous collection or the new one.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temporary sibling used while replacing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("store"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with `content`
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> io::Result<()> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(())
}

/// Remove a temporary file left behind by an interrupted write
///
/// Returns whether a stale file was found.
pub fn cleanup_temp_file<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    let temp_path = temp_path_for(path.as_ref());
    match fs::remove_file(&temp_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

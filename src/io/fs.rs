use super::SharedReader;
use crate::config::AccessConfig;
use std::fs::{self, File};
use std::io::{Error, ErrorKind, Result};
use std::path::Path;
use std::sync::Arc;

pub fn fetch(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
}

#[cfg(unix)]
pub fn open(path: &Path) -> Result<SharedReader> {
    Ok(Arc::new(File::open(path)?))
}

#[cfg(not(unix))]
pub fn open(path: &Path) -> Result<SharedReader> {
    Ok(Arc::new(std::sync::Mutex::new(File::open(path)?)))
}

/// Name the allowed files next to a missing `path` in its NotFound error.
///
/// Nothing is listed when `access` disables directory listing.
pub fn describe_missing(path: &Path, error: Error, access: &AccessConfig) -> Error {
    if error.kind() != ErrorKind::NotFound || access.disable_directory_listing {
        return error;
    }
    let Some(Ok(entries)) = path.parent().map(fs::read_dir) else {
        return error;
    };
    let mut siblings: Vec<String> = entries
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .filter(|name| access.allows(name))
        .collect();
    if siblings.is_empty() {
        return error;
    }
    siblings.sort();
    Error::new(
        ErrorKind::NotFound,
        format!("{} not found, directory holds {}", path.display(), siblings.join(", ")),
    )
}

#[cfg(unix)]
impl super::ReadRange for File {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_at(&mut buf[filled..], start + filled as u64)? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }
}

// I/O Traits
//   ReadRange is stateless positional I/O: a superset of Read + Seek where self is
//   immutable, which maps directly onto http and s3 byte-range requests.
//   RasterStore resolves archive paths (s3://, http(s)://, local) into ReadRange
//   handles under a given AccessConfig.

use crate::config::AccessConfig;
use std::io::{Error, ErrorKind, Read, Result, Seek};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::warn;

pub mod fs;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "s3")]
pub mod s3;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

pub trait ReadRange {
    /// Read bytes from a specific offset
    ///
    /// This is a superset of std::io::{Read + Seek} with a key difference that
    /// self is immutable. This is a useful abstraction for concurrent I/O.
    ///
    /// Required methods
    ///   fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize>;
    ///
    /// Provided methods
    ///   fn read_range_exact(&self, start: u64, buf: &mut [u8]) -> Result<()> { ... }
    ///   fn read_range_to_vec(&self, start: u64, end: u64) -> Result<Vec<u8>> { ... }
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize>;

    fn read_range_exact(&self, start: u64, buf: &mut [u8]) -> Result<()> {
        let n = buf.len();
        let bytes_read = self.read_range(start, buf)?;
        if bytes_read == n {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("Failed to completely fill buffer: {bytes_read} < {n}"),
            ))
        }
    }

    fn read_range_to_vec(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let n = end.checked_sub(start).ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput, format!("Bad range {start}..{end}"))
        })? as usize;
        let mut buf = vec![0; n];
        self.read_range_exact(start, &mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek> ReadRange for Mutex<R> {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let mut locked_self = self
            .lock()
            .map_err(|e| Error::other(format!("{e:?}")))?;
        locked_self.seek(std::io::SeekFrom::Start(start))?;
        let mut filled = 0;
        while filled < buf.len() {
            match locked_self.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }
}

impl ReadRange for Vec<u8> {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (start as usize).min(self.len());
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

pub type SharedReader = Arc<dyn ReadRange + Send + Sync>;

/// Access to the files of a raster archive.
pub trait RasterStore: Send + Sync {
    /// Read a whole (small) file, e.g. a side-file.
    fn fetch(&self, path: &str, access: &AccessConfig) -> Result<Vec<u8>>;

    /// Open a file for byte-range reads.
    fn open(&self, path: &str, access: &AccessConfig) -> Result<SharedReader>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum Location<'a> {
    S3 { bucket: &'a str, key: &'a str },
    Http(&'a str),
    Local(&'a Path),
}

impl<'a> Location<'a> {
    pub fn parse(path: &'a str) -> Result<Self> {
        if let Some(rest) = path.strip_prefix("s3://") {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                    Ok(Location::S3 { bucket, key })
                }
                _ => Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("S3 path {path} has no bucket or key"),
                )),
            };
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Location::Http(path));
        }
        Ok(Location::Local(Path::new(
            path.strip_prefix("file://").unwrap_or(path),
        )))
    }
}

/// Dispatches archive paths to the s3, http or local backends.
pub struct RemoteStore {
    #[cfg(feature = "s3")]
    s3: s3::S3Store,
    #[cfg(feature = "http")]
    http: http::HttpStore,
}

impl RemoteStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            #[cfg(feature = "s3")]
            s3: s3::S3Store::new()?,
            #[cfg(feature = "http")]
            http: http::HttpStore,
        })
    }
}

fn check_allowed(path: &str, access: &AccessConfig) -> Result<()> {
    if access.allows(path) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::PermissionDenied,
            format!("{path} does not have an allowed extension {:?}", access.allowed_extensions),
        ))
    }
}

#[allow(dead_code)]
fn unsupported(path: &str, feature: &str) -> Error {
    Error::new(
        ErrorKind::Unsupported,
        format!("{path} needs the \"{feature}\" feature"),
    )
}

impl RasterStore for RemoteStore {
    fn fetch(&self, path: &str, access: &AccessConfig) -> Result<Vec<u8>> {
        check_allowed(path, access)?;
        match Location::parse(path)? {
            #[cfg(feature = "s3")]
            Location::S3 { bucket, key } => self.s3.fetch(bucket, key, access),
            #[cfg(not(feature = "s3"))]
            Location::S3 { .. } => Err(unsupported(path, "s3")),
            #[cfg(feature = "http")]
            Location::Http(url) => self.http.fetch(url, access),
            #[cfg(not(feature = "http"))]
            Location::Http(_) => Err(unsupported(path, "http")),
            Location::Local(local) => {
                fs::fetch(local).map_err(|e| fs::describe_missing(local, e, access))
            }
        }
    }

    fn open(&self, path: &str, access: &AccessConfig) -> Result<SharedReader> {
        check_allowed(path, access)?;
        match Location::parse(path)? {
            #[cfg(feature = "s3")]
            Location::S3 { bucket, key } => Ok(Arc::new(self.s3.open(bucket, key, access)?)),
            #[cfg(not(feature = "s3"))]
            Location::S3 { .. } => Err(unsupported(path, "s3")),
            #[cfg(feature = "http")]
            Location::Http(url) => Ok(Arc::new(self.http.open(url, access)?)),
            #[cfg(not(feature = "http"))]
            Location::Http(_) => Err(unsupported(path, "http")),
            Location::Local(local) => {
                fs::open(local).map_err(|e| fs::describe_missing(local, e, access))
            }
        }
    }
}

fn is_transient(error: &Error) -> bool {
    !matches!(
        error.kind(),
        ErrorKind::NotFound
            | ErrorKind::PermissionDenied
            | ErrorKind::InvalidInput
            | ErrorKind::Unsupported
    )
}

/// Run `operation`, retrying transient failures up to `max_retries` times with
/// exponential backoff.
pub fn with_retries<T>(max_retries: u32, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && is_transient(&e) => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                attempt += 1;
                warn!(attempt, max_retries, ?delay, error = %e, "retrying remote read");
                thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

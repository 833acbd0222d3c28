use super::{with_retries, ReadRange};
use crate::config::AccessConfig;
use reqwest::blocking::{Client, Response};
use reqwest::header::RANGE;
use reqwest::{StatusCode, Url};
use std::fmt;
use std::io::{Error, ErrorKind, Result};
use tracing::debug;

/// Blocking http(s) backend.
#[derive(Clone, Debug, Default)]
pub struct HttpStore;

impl HttpStore {
    fn client(access: &AccessConfig) -> Result<Client> {
        Client::builder()
            .timeout(access.timeout())
            .build()
            .map_err(|e| Error::other(format!("{e:?}")))
    }

    pub fn fetch(&self, url: &str, access: &AccessConfig) -> Result<Vec<u8>> {
        let client = Self::client(access)?;
        debug!(url, "fetching");
        with_retries(access.max_retries, || {
            let response = send(client.get(url))?;
            let bytes = response.bytes().map_err(to_io_error)?;
            Ok(bytes.to_vec())
        })
    }

    pub fn open(&self, url: &str, access: &AccessConfig) -> Result<HttpReader> {
        Ok(HttpReader {
            client: Self::client(access)?,
            url: Url::parse(url)
                .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("{e:?}")))?,
            max_retries: access.max_retries,
        })
    }
}

#[derive(Clone)]
pub struct HttpReader {
    client: Client,
    url: Url,
    max_retries: u32,
}

impl fmt::Debug for HttpReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpReader").field("url", &self.url.as_str()).finish()
    }
}

impl ReadRange for HttpReader {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len();
        if n == 0 {
            return Ok(0);
        }
        let end = start + n as u64 - 1; // GOTCHA byte range includes end
        let bytes = with_retries(self.max_retries, || {
            let request = self
                .client
                .get(self.url.clone())
                .header(RANGE, format!("bytes={start}-{end}"));
            let response = match send(request) {
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(vec![]),
                other => other?,
            };
            let status = response.status();
            let bytes = response.bytes().map_err(to_io_error)?;
            if status == StatusCode::PARTIAL_CONTENT {
                Ok(bytes.to_vec())
            } else {
                // Server ignored the range and sent the whole body
                let from = (start as usize).min(bytes.len());
                Ok(bytes[from..].to_vec())
            }
        })?;
        let count = bytes.len().min(n);
        buf[..count].copy_from_slice(&bytes[..count]);
        Ok(count)
    }
}

fn send(request: reqwest::blocking::RequestBuilder) -> Result<Response> {
    let response = request.send().map_err(to_io_error)?;
    let status = response.status();
    match status {
        s if s.is_success() => Ok(response),
        StatusCode::RANGE_NOT_SATISFIABLE => {
            Err(Error::new(ErrorKind::UnexpectedEof, "Range starts past end of file"))
        }
        StatusCode::NOT_FOUND => Err(Error::new(ErrorKind::NotFound, status.to_string())),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            Err(Error::new(ErrorKind::PermissionDenied, status.to_string()))
        }
        s => Err(Error::other(format!("HTTP {s}"))),
    }
}

fn to_io_error(e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() {
        ErrorKind::TimedOut
    } else if e.is_connect() {
        ErrorKind::NotConnected
    } else {
        ErrorKind::Other
    };
    Error::new(kind, format!("{e:?}"))
}

use super::ReadRange;
use crate::config::AccessConfig;
use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use std::fmt;
use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-west-2";

/// Anonymous or signed S3 backend, driven from blocking code.
pub struct S3Store {
    runtime: Arc<Runtime>,
    region: String,
}

impl S3Store {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            region: DEFAULT_REGION.to_string(),
        })
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    fn client(&self, access: &AccessConfig) -> Client {
        let region = Region::new(self.region.clone());
        let timeout = TimeoutConfig::builder()
            .operation_timeout(access.timeout())
            .build();
        // SDK attempts include the first request
        let retry = RetryConfig::standard().with_max_attempts(access.max_retries + 1);
        let unsigned = access.unsigned;

        self.runtime.block_on(async move {
            let mut loader = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .timeout_config(timeout)
                .retry_config(retry);
            if unsigned {
                loader = loader.no_credentials();
            }
            let shared = loader.load().await;
            // Bucket names with dots do not work as virtual hosts
            let config = aws_sdk_s3::config::Builder::from(&shared)
                .force_path_style(true)
                .build();
            Client::from_conf(config)
        })
    }

    pub fn fetch(&self, bucket: &str, key: &str, access: &AccessConfig) -> Result<Vec<u8>> {
        debug!(bucket, key, "fetching");
        let reader = self.open(bucket, key, access)?;
        let request = reader.client.get_object().bucket(bucket).key(key);
        // Transport retries are handled by the SDK retry config
        self.runtime.block_on(async move {
            let response = request.send().await.map_err(sdk_error)?;
            let body = response.body.collect().await.map_err(|e| {
                Error::new(
                    ErrorKind::Interrupted,
                    format!("Failed to read from S3 download stream: {e:?}"),
                )
            })?;
            Ok(body.into_bytes().to_vec())
        })
    }

    pub fn open(&self, bucket: &str, key: &str, access: &AccessConfig) -> Result<S3Reader> {
        Ok(S3Reader {
            runtime: self.runtime.clone(),
            client: self.client(access),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

pub struct S3Reader {
    runtime: Arc<Runtime>,
    client: Client,
    bucket: String,
    key: String,
}

impl fmt::Debug for S3Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Reader")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish()
    }
}

impl ReadRange for S3Reader {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len();
        if n == 0 {
            return Ok(0);
        }
        let end = start + n as u64 - 1; // GOTCHA byte range includes end
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .range(format!("bytes={start}-{end}"));

        self.runtime.block_on(async move {
            let mut response = match request.send().await {
                Ok(response) => response,
                Err(e) if is_invalid_range(&e) => return Ok(0),
                Err(e) => return Err(sdk_error(e)),
            };

            let mut pos = 0;
            while let Some(bytes) = response.body.try_next().await.map_err(|err| {
                Error::new(
                    ErrorKind::Interrupted,
                    format!("Failed to read from S3 download stream: {err:?}"),
                )
            })? {
                let bytes_len = bytes.len();
                let bytes_top = bytes_len.min(n - pos);
                let buf_top = n.min(pos + bytes_len);
                buf[pos..buf_top].copy_from_slice(&bytes[..bytes_top]);
                pos = buf_top;
                if pos == n {
                    break;
                }
            }
            Ok(pos)
        })
    }
}

type GetObjectSdkError =
    aws_sdk_s3::error::SdkError<GetObjectError, aws_sdk_s3::config::http::HttpResponse>;

fn is_invalid_range(e: &GetObjectSdkError) -> bool {
    e.raw_response()
        .map(|response| response.status().as_u16() == 416)
        .unwrap_or(false)
}

fn sdk_error(e: GetObjectSdkError) -> Error {
    let status = e.raw_response().map(|response| response.status().as_u16());
    let kind = match (e.as_service_error(), status) {
        (Some(service), _) if service.is_no_such_key() => ErrorKind::NotFound,
        (_, Some(404)) => ErrorKind::NotFound,
        (_, Some(401 | 403)) => ErrorKind::PermissionDenied,
        _ => ErrorKind::Other,
    };
    Error::new(kind, format!("{}", DisplayErrorContext(&e)))
}

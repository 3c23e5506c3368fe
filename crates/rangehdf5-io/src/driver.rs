//! URL-scheme backend drivers: local file and S3-style object store.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::error::IoError;

/// Positional, stateless ranged read against an open resource.
///
/// `read` fills as much of `buf` as the resource allows starting at `pos`
/// and returns the number of bytes read. Short reads are not an error at
/// this layer; the caller decides whether a minimum was violated.
pub trait IoDriver: Send + Sync + std::fmt::Debug {
    /// Read up to `buf.len()` bytes starting at absolute position `pos`.
    fn read(&self, buf: &mut [u8], pos: u64) -> Result<usize, IoError>;
}

/// Resolve a URL to a backend driver and its resource string.
///
/// `file://<path>` opens a local file; `s3://<bucket>/<key>` opens an
/// object-store resource. Anything else is an invalid URL.
pub fn open_url(url: &str) -> Result<(Box<dyn IoDriver>, String), IoError> {
    if let Some(path) = url.strip_prefix("file://") {
        let driver = FileDriver::open(path)?;
        Ok((Box::new(driver), path.to_string()))
    } else if let Some(resource) = url.strip_prefix("s3://") {
        let driver = S3Driver::open(resource)?;
        Ok((Box::new(driver), resource.to_string()))
    } else {
        Err(IoError::InvalidUrl(url.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FileDriver
// ---------------------------------------------------------------------------

/// Local-file backend: seeks then reads under an internal mutex so the
/// handle can be shared by concurrent readers.
#[derive(Debug)]
pub struct FileDriver {
    file: Mutex<File>,
}

impl FileDriver {
    /// Open a local file for ranged reading.
    pub fn open(path: &str) -> Result<Self, IoError> {
        let file = File::open(path).map_err(|source| IoError::OpenFailed {
            resource: path.to_string(),
            source,
        })?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl IoDriver for FileDriver {
    fn read(&self, buf: &mut [u8], pos: u64) -> Result<usize, IoError> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(pos))
            .map_err(|source| IoError::ReadFailed { pos, source })?;

        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(IoError::ReadFailed { pos, source }),
            }
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// S3Driver
// ---------------------------------------------------------------------------

/// Object-store backend issuing `Range: bytes=a-b` GETs.
///
/// The endpoint defaults to virtual-hosted S3 addressing
/// (`https://<bucket>.s3.<region>.amazonaws.com/<key>`); setting
/// `AWS_ENDPOINT_URL` switches to path-style addressing against that
/// endpoint, which is what local object-store stand-ins expect.
#[derive(Debug)]
pub struct S3Driver {
    client: reqwest::blocking::Client,
    object_url: String,
}

impl S3Driver {
    /// Open an object-store resource of the form `<bucket>/<key>`.
    pub fn open(resource: &str) -> Result<Self, IoError> {
        let (bucket, key) = split_resource(resource)?;
        let object_url = object_url(bucket, key);
        Ok(Self {
            client: reqwest::blocking::Client::new(),
            object_url,
        })
    }
}

/// Split `<bucket>/<key>` at the first slash.
fn split_resource(resource: &str) -> Result<(&str, &str), IoError> {
    match resource.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(IoError::InvalidUrl(format!("s3://{resource}"))),
    }
}

/// Build the HTTP URL for an object.
fn object_url(bucket: &str, key: &str) -> String {
    match std::env::var("AWS_ENDPOINT_URL") {
        Ok(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
        Err(_) => {
            let region =
                std::env::var("AWS_REGION").unwrap_or_else(|_| String::from("us-east-1"));
            format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
        }
    }
}

impl IoDriver for S3Driver {
    fn read(&self, buf: &mut [u8], pos: u64) -> Result<usize, IoError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = pos + buf.len() as u64 - 1;
        let resp = self
            .client
            .get(&self.object_url)
            .header("Range", format!("bytes={pos}-{end}"))
            .send()
            .map_err(|e| IoError::Http {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let status = resp.status();
        // 416 means the range starts past the object; callers treat that as
        // a short read, same as EOF on a local file.
        if status.as_u16() == 416 {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(IoError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        let body = resp.bytes().map_err(|e| IoError::Http {
            status: status.as_u16(),
            message: e.to_string(),
        })?;
        let n = body.len().min(buf.len());
        buf[..n].copy_from_slice(&body[..n]);
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// MemoryDriver
// ---------------------------------------------------------------------------

/// In-memory backend over an owned byte vector, used by tests and callers
/// that already hold the file image.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    data: Vec<u8>,
}

impl MemoryDriver {
    /// Create a driver over an owned byte vector.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the length of the backing data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the backing data is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl IoDriver for MemoryDriver {
    fn read(&self, buf: &mut [u8], pos: u64) -> Result<usize, IoError> {
        let pos = pos as usize;
        if pos >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - pos);
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        Ok(n)
    }
}

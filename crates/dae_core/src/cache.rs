//! Binary blob cache for parsed arrays.
//!
//! Large `<float_array>`, `<p>` and generated normal payloads are dumped to
//! disk the first time they are parsed so later loads can skip text parsing.
//! Blobs are a private, machine-local format: a small header followed by
//! length-prefixed native-endian `u32`/`f32` arrays. Any header or length
//! mismatch is treated as a miss and the blob is rewritten.
//!
//! All reads and writes are synchronous. They run inside fan-out tasks and
//! must never wait on other pool work.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAGIC: [u8; 4] = *b"DAEB";

/// Bumped whenever the layout of any blob kind changes.
pub const BLOB_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 12;

/// Errors that can occur while reading or writing a blob.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a blob file (bad magic)")]
    BadMagic,

    #[error("Blob format version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Blob holds {found:?} data, expected {expected:?}")]
    KindMismatch { found: u32, expected: BlobKind },

    #[error("Blob truncated at byte {offset}")]
    Truncated { offset: usize },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Whether parsed arrays are cached on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Disabled,
    ReadWrite,
}

/// What a blob contains; stored in the header so a key collision between
/// kinds reads as a miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum BlobKind {
    FloatArray = 1,
    Polylist = 2,
    IndexRanges = 3,
    Normals = 4,
}

/// Deterministic cache key built from entity ids, counts and parent names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    /// Join `parts` with `_`, replacing anything that is not safe in a file
    /// name.
    pub fn new(parts: &[&str]) -> Self {
        let joined = parts.join("_");
        let sanitized = joined
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self(sanitized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Appends header and arrays into a byte buffer.
pub struct BlobWriter {
    bytes: Vec<u8>,
}

impl BlobWriter {
    pub fn new(kind: BlobKind) -> Self {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&BLOB_FORMAT_VERSION.to_ne_bytes());
        bytes.extend_from_slice(&(kind as u32).to_ne_bytes());
        Self { bytes }
    }

    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn push_u32s(&mut self, values: &[u32]) -> &mut Self {
        self.push_u32(values.len() as u32);
        self.bytes.extend_from_slice(bytemuck::cast_slice(values));
        self
    }

    pub fn push_f32s(&mut self, values: &[f32]) -> &mut Self {
        self.push_u32(values.len() as u32);
        self.bytes.extend_from_slice(bytemuck::cast_slice(values));
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sequential reader over a validated blob.
pub struct BlobReader {
    bytes: Vec<u8>,
    offset: usize,
}

impl BlobReader {
    /// Validate the header and position the reader after it.
    pub fn from_bytes(bytes: Vec<u8>, kind: BlobKind) -> CacheResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CacheError::Truncated { offset: bytes.len() });
        }
        if bytes[0..4] != MAGIC {
            return Err(CacheError::BadMagic);
        }
        let mut reader = Self { bytes, offset: 4 };
        let version = reader.read_u32()?;
        if version != BLOB_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: version,
                expected: BLOB_FORMAT_VERSION,
            });
        }
        let found = reader.read_u32()?;
        if found != kind as u32 {
            return Err(CacheError::KindMismatch {
                found,
                expected: kind,
            });
        }
        Ok(reader)
    }

    fn take(&mut self, len: usize) -> CacheResult<&[u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CacheError::Truncated { offset: self.offset })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> CacheResult<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn read_u32s(&mut self) -> CacheResult<Vec<u32>> {
        let len = self.read_u32()? as usize;
        let raw = self.take(len * 4)?;
        Ok(bytemuck::allocation::pod_collect_to_vec(raw))
    }

    pub fn read_f32s(&mut self) -> CacheResult<Vec<f32>> {
        let len = self.read_u32()? as usize;
        let raw = self.take(len * 4)?;
        Ok(bytemuck::allocation::pod_collect_to_vec(raw))
    }

    pub fn is_at_end(&self) -> bool {
        self.offset == self.bytes.len()
    }
}

/// Directory-backed blob store.
#[derive(Clone, Debug)]
pub struct BlobCache {
    mode: CacheMode,
    dir: PathBuf,
}

impl BlobCache {
    /// A cache that never reads or writes.
    pub fn disabled() -> Self {
        Self {
            mode: CacheMode::Disabled,
            dir: PathBuf::new(),
        }
    }

    /// A read/write cache rooted at `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: CacheMode::ReadWrite,
            dir: dir.into(),
        }
    }

    pub fn with_mode(mode: CacheMode, dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            dir: dir.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode == CacheMode::ReadWrite
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &BlobKey) -> PathBuf {
        self.dir.join(format!("{}.blob", key.as_str()))
    }

    /// Synchronously open the blob for `key`.
    ///
    /// Returns `None` on a miss, including unreadable or stale blobs.
    pub fn read(&self, key: &BlobKey, kind: BlobKind) -> Option<BlobReader> {
        if !self.is_enabled() {
            return None;
        }
        let path = self.path_for(key);
        let bytes = fs::read(&path).ok()?;
        match BlobReader::from_bytes(bytes, kind) {
            Ok(reader) => Some(reader),
            Err(e) => {
                log::debug!("Ignoring stale blob {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Synchronously write the blob for `key`, replacing any previous one.
    pub fn write(&self, key: &BlobKey, blob: BlobWriter) -> CacheResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("tmp{}", std::process::id()));
        fs::write(&tmp, blob.into_bytes())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Write and log (instead of propagate) a failure; a failed write only
    /// costs the next load a re-parse.
    pub fn write_or_warn(&self, key: &BlobKey, blob: BlobWriter) {
        if let Err(e) = self.write(key, blob) {
            log::warn!("Failed to write blob {}: {}", key.as_str(), e);
        }
    }

    /// Read a single `f32` array blob of exactly `expected_len` values.
    pub fn read_f32s(&self, key: &BlobKey, expected_len: usize) -> Option<Vec<f32>> {
        let mut reader = self.read(key, BlobKind::FloatArray)?;
        let data = reader.read_f32s().ok()?;
        (data.len() == expected_len && reader.is_at_end()).then_some(data)
    }

    pub fn write_f32s(&self, key: &BlobKey, data: &[f32]) {
        let mut blob = BlobWriter::new(BlobKind::FloatArray);
        blob.push_f32s(data);
        self.write_or_warn(key, blob);
    }
}

impl Default for BlobCache {
    fn default() -> Self {
        Self::disabled()
    }
}

//! Backup container access and sniffing
//!
//! A container is opened fresh for every pass over it: the payload reader is
//! forward-only, so a second pass means a second `open`.

use crate::errors::{BackupError, BackupResult};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// gzip magic bytes (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// First two bytes of the retired JSON backup format: `{}`, `{"` and `{\n`.
pub const LEGACY_JSON_SIGNATURES: [[u8; 2]; 3] = [*b"{}", *b"{\"", *b"{\n"];

/// Bytes inspected to classify a container.
pub const SNIFF_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Gzip,
    Raw,
    LegacyRejected,
}

/// Classify a container from its leading bytes.
pub fn classify(head: &[u8]) -> ContainerKind {
    if head.len() < SNIFF_LEN {
        return ContainerKind::Raw;
    }
    let prefix = [head[0], head[1]];
    if prefix == GZIP_MAGIC {
        ContainerKind::Gzip
    } else if LEGACY_JSON_SIGNATURES.contains(&prefix) {
        ContainerKind::LegacyRejected
    } else {
        ContainerKind::Raw
    }
}

/// Something a backup can be (re)opened from.
pub trait ContainerSource: Send + Sync {
    /// Open a fresh stream positioned at offset 0.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Human-readable location used in logs.
    fn describe(&self) -> String;
}

/// A backup file on disk.
#[derive(Debug, Clone)]
pub struct FileContainer {
    path: PathBuf,
}

impl FileContainer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContainerSource for FileContainer {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A backup already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    bytes: Arc<[u8]>,
}

impl MemoryContainer {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl ContainerSource for MemoryContainer {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::Cursor::new(Arc::clone(&self.bytes))))
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.bytes.len())
    }
}

/// Reader that can look ahead without consuming.
///
/// Peeked bytes are held in `head` and replayed by `read` before anything
/// else is pulled from `inner`.
pub struct PeekReader<R> {
    inner: R,
    head: Vec<u8>,
    pos: usize,
}

impl<R: Read> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            head: Vec::new(),
            pos: 0,
        }
    }

    /// Return up to `n` upcoming bytes without advancing the read position.
    /// Fewer than `n` bytes are returned only at end of stream.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.head.drain(..self.pos);
            self.pos = 0;
        }
        while self.head.len() < n {
            let missing = n - self.head.len();
            let read = (&mut self.inner)
                .take(missing as u64)
                .read_to_end(&mut self.head)?;
            if read == 0 {
                break;
            }
        }
        let end = n.min(self.head.len());
        Ok(&self.head[..end])
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.head.len() {
            let available = &self.head[self.pos..];
            let count = available.len().min(buf.len());
            buf[..count].copy_from_slice(&available[..count]);
            self.pos += count;
            return Ok(count);
        }
        self.inner.read(buf)
    }
}

/// Open `source`, sniff it and return the decompressed payload stream.
///
/// Legacy JSON containers fail fast with [`BackupError::LegacyJson`]; a
/// container too short to sniff is unrecognized.
pub fn open_payload(
    source: &dyn ContainerSource,
) -> BackupResult<(ContainerKind, Box<dyn Read + Send>)> {
    let raw = source
        .open()
        .map_err(|e| BackupError::io(format!("opening {}", source.describe()), e))?;
    let mut reader = PeekReader::new(BufReader::new(raw));

    let head = reader
        .peek(SNIFF_LEN)
        .map_err(|e| BackupError::io("reading container header", e))?;
    if head.len() < SNIFF_LEN {
        return Err(BackupError::unrecognized("container is shorter than its header"));
    }

    let kind = classify(head);
    tracing::debug!(container = %source.describe(), ?kind, "classified backup container");

    let payload: Box<dyn Read + Send> = match kind {
        ContainerKind::Gzip => Box::new(BufReader::new(GzDecoder::new(reader))),
        ContainerKind::LegacyRejected => return Err(BackupError::LegacyJson),
        ContainerKind::Raw => Box::new(reader),
    };
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn classifies_by_leading_bytes() {
        assert_eq!(classify(&[0x1f, 0x8b, 0x08]), ContainerKind::Gzip);
        assert_eq!(classify(b"{}"), ContainerKind::LegacyRejected);
        assert_eq!(classify(b"{\"version\": 1}"), ContainerKind::LegacyRejected);
        assert_eq!(classify(b"{\n  \"a\""), ContainerKind::LegacyRejected);
        assert_eq!(classify(b"{ "), ContainerKind::Raw);
        assert_eq!(classify(&[0x0a, 0x05]), ContainerKind::Raw);
        assert_eq!(classify(&[0x1f, 0x00]), ContainerKind::Raw);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut reader = PeekReader::new(&b"\x0a\x03abc"[..]);
        assert_eq!(reader.peek(2).unwrap(), b"\x0a\x03");
        assert_eq!(reader.peek(2).unwrap(), b"\x0a\x03");

        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"\x0a\x03abc");
    }

    #[test]
    fn peek_after_partial_read_sees_next_bytes() {
        let mut reader = PeekReader::new(&b"abcdef"[..]);
        reader.peek(4).unwrap();
        let mut first = [0u8; 1];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"a");
        assert_eq!(reader.peek(2).unwrap(), b"bc");
    }

    #[test]
    fn peek_at_end_of_stream_returns_what_exists() {
        let mut reader = PeekReader::new(&b"x"[..]);
        assert_eq!(reader.peek(2).unwrap(), b"x");
    }

    #[test]
    fn raw_payload_includes_peeked_bytes() {
        let source = MemoryContainer::new(b"\x0a\x01z".to_vec());
        let (kind, mut payload) = open_payload(&source).unwrap();
        assert_eq!(kind, ContainerKind::Raw);

        let mut bytes = Vec::new();
        payload.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"\x0a\x01z");
    }

    #[test]
    fn gzip_payload_is_decompressed() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"\x0a\x01z").unwrap();
        let source = MemoryContainer::new(encoder.finish().unwrap());

        let (kind, mut payload) = open_payload(&source).unwrap();
        assert_eq!(kind, ContainerKind::Gzip);

        let mut bytes = Vec::new();
        payload.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"\x0a\x01z");
    }

    #[test]
    fn legacy_json_fails_fast() {
        let source = MemoryContainer::new(b"{\"backupManga\": []}".to_vec());
        let err = open_payload(&source).err().expect("legacy container rejected");
        assert!(matches!(err, BackupError::LegacyJson));
    }

    #[test]
    fn one_byte_container_is_unrecognized() {
        let source = MemoryContainer::new(vec![0x0a]);
        let err = open_payload(&source).err().expect("too short");
        assert!(err.is_unrecognized());
    }
}

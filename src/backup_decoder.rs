//! Bounded single-shot backup decoding
//!
//! Decodes a whole container into a [`Backup`]. The decompressed payload is
//! buffered in full, so the total is capped: a container that inflates past
//! the ceiling is rejected before it can exhaust memory.

use crate::container::{open_payload, ContainerSource};
use crate::errors::{BackupError, BackupResult};
use crate::models::Backup;
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use std::io::{Read, Write};

/// Default ceiling on decompressed bytes for single-shot decoding.
pub const MAX_BACKUP_BYTES: u64 = 256 * 1024 * 1024;

/// Default read granularity.
pub const READ_CHUNK_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct BackupDecoder {
    max_bytes: u64,
    chunk_bytes: usize,
}

impl Default for BackupDecoder {
    fn default() -> Self {
        Self {
            max_bytes: MAX_BACKUP_BYTES,
            chunk_bytes: READ_CHUNK_BYTES,
        }
    }
}

impl BackupDecoder {
    pub fn new(max_bytes: u64, chunk_bytes: usize) -> Self {
        Self {
            max_bytes,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Decode a potentially gzipped backup.
    pub fn decode(&self, source: &dyn ContainerSource) -> BackupResult<Backup> {
        let (kind, mut payload) = open_payload(source)?;
        let bytes = self.read_with_limit(&mut payload)?;
        tracing::debug!(?kind, bytes = bytes.len(), "backup payload buffered");

        Backup::decode(bytes.as_slice()).map_err(|e| BackupError::unrecognized(e.to_string()))
    }

    fn read_with_limit(&self, payload: &mut dyn Read) -> BackupResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut chunk = vec![0u8; self.chunk_bytes];
        let mut total: u64 = 0;
        loop {
            let read = match payload.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(BackupError::unrecognized(format!("payload read failed: {e}")))
                }
            };
            total += read as u64;
            if total > self.max_bytes {
                return Err(BackupError::SizeLimitExceeded {
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk[..read]);
        }
        Ok(buffer)
    }
}

/// Serialize `backup` into a container the readers accept.
pub fn encode_backup(backup: &Backup, compress: bool) -> BackupResult<Vec<u8>> {
    let payload = backup.encode_to_vec();
    if !compress {
        return Ok(payload);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&payload)
        .map_err(|e| BackupError::io("compressing backup", e))?;
    encoder
        .finish()
        .map_err(|e| BackupError::io("finishing gzip stream", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use crate::models::{BackupCategory, BackupManga, BackupSource};
    use crate::wire::write_length_delimited;

    fn sample() -> Backup {
        Backup {
            backup_manga: vec![BackupManga {
                source: 7,
                url: "/manga/1".into(),
                title: "Dungeon Meshi".into(),
                ..Default::default()
            }],
            backup_categories: vec![BackupCategory {
                name: "Reading".into(),
                order: 1,
                ..Default::default()
            }],
            backup_sources: vec![BackupSource {
                name: "Foo".into(),
                source_id: 7,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn decodes_gzip_and_raw_containers() {
        let backup = sample();
        for compress in [true, false] {
            let bytes = encode_backup(&backup, compress).unwrap();
            let decoded = BackupDecoder::default()
                .decode(&MemoryContainer::new(bytes))
                .unwrap();
            assert_eq!(decoded, backup);
        }
    }

    #[test]
    fn ceiling_is_inclusive() {
        let bytes = encode_backup(&sample(), false).unwrap();
        let len = bytes.len() as u64;
        let source = MemoryContainer::new(bytes);

        assert!(BackupDecoder::new(len, 16).decode(&source).is_ok());
        assert!(BackupDecoder::new(len + 1, 16).decode(&source).is_ok());

        let err = BackupDecoder::new(len - 1, 16).decode(&source).unwrap_err();
        assert!(matches!(err, BackupError::SizeLimitExceeded { .. }));
        assert!(err.is_unrecognized());
    }

    #[test]
    fn ceiling_applies_to_decompressed_size() {
        let raw_len = encode_backup(&sample(), false).unwrap().len() as u64;
        let gz = encode_backup(&sample(), true).unwrap();
        let err = BackupDecoder::new(raw_len - 1, 4)
            .decode(&MemoryContainer::new(gz))
            .unwrap_err();
        assert!(matches!(err, BackupError::SizeLimitExceeded { .. }));
    }

    #[test]
    fn unknown_top_level_fields_are_ignored() {
        let mut bytes = encode_backup(&sample(), false).unwrap();
        write_length_delimited(&mut bytes, 4_242, b"added in a later version");
        let decoded = BackupDecoder::default()
            .decode(&MemoryContainer::new(bytes))
            .unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn garbage_is_unrecognized() {
        let err = BackupDecoder::default()
            .decode(&MemoryContainer::new(vec![0x0a, 0x7f, 0x01]))
            .unwrap_err();
        assert!(matches!(err, BackupError::Unrecognized { .. }));
    }

    #[test]
    fn corrupt_gzip_is_unrecognized() {
        let mut gz = encode_backup(&sample(), true).unwrap();
        let len = gz.len();
        gz.truncate(len / 2);
        let err = BackupDecoder::default()
            .decode(&MemoryContainer::new(gz))
            .unwrap_err();
        assert!(err.is_unrecognized());
    }
}

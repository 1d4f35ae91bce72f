//! .dcsn snapshot file: the local key-value cache of upstream data.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::types::{CompanionError, CompanionResult, GameVersion, ScoredEntity};

/// Magic bytes: "DCSN"
const DCSN_MAGIC: u32 = 0x4443534E;

/// Current format version.
const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 64;

/// Everything the companion keeps between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub latest_version: Option<GameVersion>,
    /// map name -> scored brawlers as last fetched
    pub tier_data: BTreeMap<String, Vec<ScoredEntity>>,
    /// Free-form remembered values, e.g. the player tag.
    pub entries: BTreeMap<String, String>,
    /// Unix seconds of the last save, 0 if never saved.
    pub saved_at: u64,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tier data for `map`, matched case-insensitively.
    pub fn tier_data_for(&self, map: &str) -> Option<&[ScoredEntity]> {
        self.tier_data
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(map))
            .map(|(_, scores)| scores.as_slice())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

/// Writer for .dcsn files.
pub struct SnapshotWriter;

/// Reader for .dcsn files.
pub struct SnapshotReader;

impl SnapshotWriter {
    pub fn write_to_file(snapshot: &Snapshot, path: &Path) -> CompanionResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::File::create(path)?;
        Self::write_to(snapshot, &mut file)
    }

    pub fn write_to<W: Write>(snapshot: &Snapshot, writer: &mut W) -> CompanionResult<()> {
        let payload = serde_json::to_vec(snapshot)
            .map_err(|e| CompanionError::Snapshot(format!("Serialization failed: {e}")))?;

        let mut header = [0u8; HEADER_SIZE];
        write_u32(&mut header[0..4], DCSN_MAGIC);
        write_u16(&mut header[4..6], FORMAT_VERSION);
        write_u16(&mut header[6..8], 0); // flags
        write_u32(&mut header[8..12], snapshot.catalog.brawlers.len() as u32);
        write_u32(&mut header[12..16], snapshot.catalog.maps.len() as u32);
        write_u32(&mut header[16..20], snapshot.tier_data.len() as u32);
        write_u32(&mut header[20..24], snapshot.entries.len() as u32);
        write_u64(&mut header[24..32], snapshot.saved_at);
        write_u64(&mut header[32..40], payload.len() as u64);

        writer.write_all(&header)?;
        writer.write_all(&payload)?;

        Ok(())
    }
}

impl SnapshotReader {
    pub fn read_from_file(path: &Path) -> CompanionResult<Snapshot> {
        let mut file = std::fs::File::open(path)?;
        Self::read_from(&mut file)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> CompanionResult<Snapshot> {
        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|e| CompanionError::Snapshot(format!("Truncated header: {e}")))?;

        let magic = read_u32(&header[0..4]);
        if magic != DCSN_MAGIC {
            return Err(CompanionError::Snapshot(format!(
                "Invalid magic: expected 0x{DCSN_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = read_u16(&header[4..6]);
        if version != FORMAT_VERSION {
            return Err(CompanionError::Snapshot(format!(
                "Unsupported version: {version}"
            )));
        }

        let saved_at = read_u64(&header[24..32]);
        let payload_len = usize::try_from(read_u64(&header[32..40]))
            .map_err(|_| CompanionError::Snapshot("Payload length overflow".to_string()))?;

        let mut payload = Vec::new();
        reader
            .take(payload_len as u64)
            .read_to_end(&mut payload)?;
        if payload.len() != payload_len {
            return Err(CompanionError::Snapshot(format!(
                "Truncated payload: expected {payload_len} bytes, got {}",
                payload.len()
            )));
        }

        let mut snapshot: Snapshot = serde_json::from_slice(&payload)
            .map_err(|e| CompanionError::Snapshot(format!("Deserialization failed: {e}")))?;
        snapshot.saved_at = saved_at;
        Ok(snapshot)
    }
}

// Little-endian byte helpers
fn write_u16(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}
fn write_u32(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}
fn write_u64(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}
fn read_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7]])
}

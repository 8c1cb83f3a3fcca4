//! Append-only commit journal.
//!
//! Every commit becomes one record: `len: u32 LE | crc32: u32 LE | bincode(batch)`. Replay stops at
//! the first record that is torn or fails its checksum, and the file is truncated there so new
//! records are never appended after garbage.
//!
//! Once the file outgrows its threshold (and has at least doubled since the last rewrite), the
//! next commit replaces it with a single snapshot record of the whole database. The snapshot is
//! written and synced beside the journal and renamed over it, so a crash leaves either file
//! intact.

use bytes::{Buf, BufMut, BytesMut};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{Error, Mutation};

const HEADER_LEN: usize = 8;

pub(super) struct Journal {
    file: File,
    path: PathBuf,
    len: u64,
    fsync: bool,
    compact_after: u64,
    /// Length right after the last rewrite.
    compacted_len: u64,
}

impl Journal {
    /// Opens (or creates) the journal at `path` and returns it with every committed batch.
    pub(super) fn open(
        path: &Path,
        fsync: bool,
        compact_after: u64,
    ) -> Result<(Journal, Vec<Vec<Mutation>>), Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (batches, valid) = decode(&bytes);
        if valid < bytes.len() {
            warn!(
                path = %path.display(),
                discarded = bytes.len() - valid,
                "discarding torn journal tail"
            );
            file.set_len(valid as u64)?;
        }

        let journal = Journal {
            file,
            path: path.to_path_buf(),
            len: valid as u64,
            fsync,
            compact_after,
            compacted_len: 0,
        };

        Ok((journal, batches))
    }

    pub(super) fn len(&self) -> u64 {
        self.len
    }

    pub(super) fn needs_compaction(&self) -> bool {
        self.len > self.compact_after && self.len > self.compacted_len.saturating_mul(2)
    }

    /// Replaces the whole journal with one record holding `snapshot`.
    pub(super) fn compact(&mut self, snapshot: &[Mutation]) -> Result<(), Error> {
        let record = encode(snapshot)?;

        let mut staging = self.path.clone().into_os_string();
        staging.push(".compacting");
        let staging = PathBuf::from(staging);

        // Left over by a crash during an earlier rewrite.
        match fs::remove_file(&staging) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&staging)?;
        file.write_all(&record)?;
        file.sync_all()?;
        fs::rename(&staging, &self.path)?;

        // The staging handle now refers to the journal itself.
        self.file = file;
        self.len = record.len() as u64;
        self.compacted_len = self.len;
        Ok(())
    }

    pub(super) fn append(&mut self, batch: &[Mutation]) -> Result<(), Error> {
        let record = encode(batch)?;

        if let Err(e) = self.write(&record) {
            // Cut a partial record off so later commits stay replayable.
            if let Err(truncate) = self.file.set_len(self.len) {
                warn!(error = %truncate, "failed to truncate journal after a failed write");
            }
            return Err(e.into());
        }

        self.len += record.len() as u64;
        Ok(())
    }

    fn write(&mut self, record: &[u8]) -> io::Result<()> {
        self.file.write_all(record)?;
        if self.fsync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

fn encode(batch: &[Mutation]) -> Result<BytesMut, Error> {
    let payload = bincode::serialize(batch)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "journal record is too large"))?;

    let mut record = BytesMut::with_capacity(HEADER_LEN + payload.len());
    record.put_u32_le(len);
    record.put_u32_le(crc32fast::hash(&payload));
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Decodes every intact record, returning the batches and the length of the valid prefix.
fn decode(bytes: &[u8]) -> (Vec<Vec<Mutation>>, usize) {
    let mut batches = Vec::new();
    let mut offset = 0;

    while bytes.len() - offset >= HEADER_LEN {
        let mut header = &bytes[offset..offset + HEADER_LEN];
        let len = header.get_u32_le() as usize;
        let checksum = header.get_u32_le();

        let start = offset + HEADER_LEN;
        let Some(payload) = bytes.get(start..start + len) else {
            break;
        };
        if crc32fast::hash(payload) != checksum {
            break;
        }
        match bincode::deserialize::<Vec<Mutation>>(payload) {
            Ok(batch) => batches.push(batch),
            Err(_) => break,
        }

        offset = start + len;
    }

    (batches, offset)
}

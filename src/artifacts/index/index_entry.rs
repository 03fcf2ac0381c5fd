//! Index entry representation
//!
//! Each entry records a path, the blob id staged for it, the merge stage and
//! the stat data captured when it was staged. Comparing stat data lets status
//! skip re-hashing files whose size and timestamps did not move.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::cmp::min;
use std::fs::Metadata;
use std::io::{BufRead, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Largest name length representable in the flags field
const MAX_PATH_SIZE: usize = 0xfff;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

const STAGE_SHIFT: u16 = 12;
const STAGE_MASK: u16 = 0x3000;

/// Merge stage of an entry
///
/// Stage 0 is the normal staged content. A conflicted path has no stage 0
/// entry and instead carries one entry for each side that had the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    #[default]
    Merged = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    pub fn is_conflict(&self) -> bool {
        *self != Stage::Merged
    }
}

impl TryFrom<u16> for Stage {
    type Error = anyhow::Error;

    fn try_from(value: u16) -> anyhow::Result<Self> {
        match value {
            0 => Ok(Stage::Merged),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            other => Err(anyhow::anyhow!("invalid index stage {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// Path relative to the repository root
    pub name: PathBuf,
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
    #[new(default)]
    pub stage: Stage,
}

impl IndexEntry {
    /// A conflict-stage entry; it has no meaningful stat data
    pub fn conflicted(name: PathBuf, oid: ObjectId, mode: EntryMode, stage: Stage) -> Self {
        IndexEntry {
            name,
            oid,
            metadata: EntryMetadata {
                mode,
                ..Default::default()
            },
            stage,
        }
    }

    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid file name {:?}", self.name))
    }

    /// Ancestor directories of the entry, outermost first
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();

        dirs
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    fn flags(&self) -> anyhow::Result<u16> {
        let name_length = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid entry name {:?}", self.name))?
            .len();

        Ok(((self.stage as u16) << STAGE_SHIFT) | min(name_length, MAX_PATH_SIZE) as u16)
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.stage == other.stage
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.name, self.stage).cmp(&(&other.name, other.stage))
    }
}

/// Stat data cached for change detection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid entry name {:?}", self.name))?;

        let mut entry_bytes = Vec::with_capacity(ENTRY_MIN_SIZE + entry_name.len());
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<NetworkEndian>(self.flags()?)?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL terminates the name, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if bytes.len() < ENTRY_MIN_SIZE {
            anyhow::bail!("index entry is too short ({} bytes)", bytes.len());
        }

        let mode = EntryMode::try_from(NetworkEndian::read_u32(&bytes[24..28]))?;
        let oid = ObjectId::read_h40_from(&mut &bytes[40..60])?;
        let flags = NetworkEndian::read_u16(&bytes[60..62]);
        let stage = Stage::try_from((flags & STAGE_MASK) >> STAGE_SHIFT)?;

        let name_end = bytes[62..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("missing NUL terminator in index entry name"))?;
        let name = std::str::from_utf8(&bytes[62..62 + name_end])
            .map_err(|_| anyhow::anyhow!("invalid UTF-8 in index entry name"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            metadata: EntryMetadata {
                ctime: NetworkEndian::read_u32(&bytes[0..4]) as i64,
                ctime_nsec: NetworkEndian::read_u32(&bytes[4..8]) as i64,
                mtime: NetworkEndian::read_u32(&bytes[8..12]) as i64,
                mtime_nsec: NetworkEndian::read_u32(&bytes[12..16]) as i64,
                dev: NetworkEndian::read_u32(&bytes[16..20]) as u64,
                ino: NetworkEndian::read_u32(&bytes[20..24]) as u64,
                mode,
                uid: NetworkEndian::read_u32(&bytes[28..32]),
                gid: NetworkEndian::read_u32(&bytes[32..36]),
                size: NetworkEndian::read_u32(&bytes[36..40]) as u64,
            },
            stage,
        })
    }
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    /// `file_path` must be the absolute path the metadata was read from
    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self, Self::Error> {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        Ok(Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        })
    }
}

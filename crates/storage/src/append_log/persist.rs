//! File layout of the append-log store
//!
//! ```text
//! <root>/<domain>/<entity type>/<instance key>.log    framed event blocks
//! <root>/<domain>/<entity type>/<instance key>.meta   JSON {identity, header}
//! ```
//!
//! Every path component goes through [`file_stem`], so an over-long
//! component becomes a digest name. The `.meta` file carries the full
//! identity and is written before the first block of a stream, which makes
//! every log on disk traceable to its identity.
//!
//! The header file is replaced atomically (write to `.meta.tmp`, rename).
//! A block is written at the log's recorded valid length: bytes past it were
//! left by a failed write and are cut before the block lands, and a write
//! that fails is rolled back to that length.
//!
//! [`LogFiles::recover`] runs once, while the store is opening, before any
//! caller can reach it.

use crate::durability::DurabilityMode;
use crate::error::StorageError;
use crate::format::{encode_block, file_stem, scan_blocks, unescape_component};
use factlog_core::{EventRecord, PersistedEvent, ReadFault, StreamHeader, StreamIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOG_EXT: &str = "log";
const META_EXT: &str = "meta";

/// Contents of a `.meta` file
#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    identity: StreamIdentity,
    header: StreamHeader,
}

/// A stream as recovered from disk
#[derive(Debug)]
pub(crate) struct LoadedStream {
    pub header: StreamHeader,
    pub events: Vec<EventRecord>,
    /// Length of the valid block prefix of the log
    pub log_len: u64,
}

/// Outcome of recovering one stream
pub(crate) type Recovered = (StreamIdentity, Result<LoadedStream, ReadFault>);

/// Files of every stream under one root directory
#[derive(Debug)]
pub(crate) struct LogFiles {
    root: PathBuf,
    mode: DurabilityMode,
}

fn not_found_is_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn dir_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl LogFiles {
    pub fn open(root: impl Into<PathBuf>, mode: DurabilityMode) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(dir_error(&root))?;
        Ok(Self { root, mode })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_path(&self, identity: &StreamIdentity, ext: &str) -> PathBuf {
        self.root
            .join(file_stem(identity.domain_name()))
            .join(file_stem(identity.entity_type_name()))
            .join(format!("{}.{}", file_stem(identity.instance_key()), ext))
    }

    fn read_meta(&self, path: &Path) -> io::Result<Option<Result<MetaFile, serde_json::Error>>> {
        Ok(not_found_is_none(fs::read(path))?.map(|bytes| serde_json::from_slice(&bytes)))
    }

    /// Claim the files of a stream about to receive its first block
    ///
    /// Fails when the file names already belong to another identity, or when
    /// an unclaimed log holds data.
    pub fn create(&self, identity: &StreamIdentity, header: &StreamHeader) -> io::Result<()> {
        let meta_path = self.stream_path(identity, META_EXT);
        let claimed = match self.read_meta(&meta_path)? {
            Some(Ok(meta)) if &meta.identity != identity => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already belongs to {}", meta_path.display(), meta.identity),
                ));
            }
            Some(Ok(_)) => true,
            Some(Err(_)) | None => false,
        };
        if !claimed {
            let log_path = self.stream_path(identity, LOG_EXT);
            let existing = not_found_is_none(fs::metadata(&log_path))?.map_or(0, |m| m.len());
            if existing > 0 {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} holds blocks of an unknown stream", log_path.display()),
                ));
            }
        }
        self.write_header(identity, header)
    }

    /// Write one framed block at `valid_len`, returning the new valid length
    pub fn append_block(
        &self,
        identity: &StreamIdentity,
        payload: &[u8],
        valid_len: u64,
    ) -> io::Result<u64> {
        let frame = encode_block(payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let path = self.stream_path(identity, LOG_EXT);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).write(true).open(&path)?;
        let on_disk = file.metadata()?.len();
        if on_disk < valid_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} is shorter than its acknowledged blocks", path.display()),
            ));
        }
        if on_disk > valid_len {
            tracing::warn!(
                identity = %identity,
                valid_len,
                on_disk,
                "cutting bytes left by a failed block write"
            );
            file.set_len(valid_len)?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        let written = file.write_all(&frame).and_then(|()| {
            if self.mode.requires_fsync() {
                file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            if let Err(rollback) = file.set_len(valid_len) {
                tracing::error!(
                    identity = %identity,
                    valid_len,
                    error = %rollback,
                    "could not roll back failed block write"
                );
            }
            return Err(e);
        }
        Ok(valid_len + frame.len() as u64)
    }

    /// Replace the stream's header file
    pub fn write_header(&self, identity: &StreamIdentity, header: &StreamHeader) -> io::Result<()> {
        let path = self.stream_path(identity, META_EXT);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("{}.tmp", META_EXT));
        let meta = MetaFile {
            identity: identity.clone(),
            header: header.clone(),
        };
        let bytes = serde_json::to_vec(&meta).map_err(io::Error::from)?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            if self.mode.requires_fsync() {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, &path)
    }

    fn read_header_file(&self, identity: &StreamIdentity) -> Result<Option<StreamHeader>, ReadFault> {
        let path = self.stream_path(identity, META_EXT);
        match self.read_meta(&path).map_err(|e| ReadFault::io(identity.clone(), e))? {
            None => Ok(None),
            Some(Ok(meta)) => Ok(Some(meta.header)),
            Some(Err(e)) => {
                tracing::error!(identity = %identity, path = %path.display(), error = %e, "corrupt stream header");
                Err(ReadFault::corrupt(identity.clone(), format!("corrupt stream header: {}", e)).with_source(e))
            }
        }
    }

    /// Recover every stream under the root
    pub fn recover(&self) -> Result<Vec<Recovered>, StorageError> {
        let mut recovered = Vec::new();
        for (domain, domain_dir) in subdirs(&self.root)? {
            for (entity_type, entity_dir) in subdirs(&domain_dir)? {
                for stem in stems(&entity_dir)? {
                    let Some(identity) = self.identify(&domain, &entity_type, &entity_dir, &stem)
                    else {
                        continue;
                    };
                    match self.load(&identity) {
                        Ok(Some(stream)) => recovered.push((identity, Ok(stream))),
                        Ok(None) => {}
                        Err(fault) => recovered.push((identity, Err(fault))),
                    }
                }
            }
        }
        Ok(recovered)
    }

    /// Identity owning `<dir>/<stem>.*`: from the header file, else from the names
    fn identify(&self, domain: &str, entity_type: &str, dir: &Path, stem: &str) -> Option<StreamIdentity> {
        let from_meta = match self.read_meta(&dir.join(format!("{}.{}", stem, META_EXT))) {
            Ok(Some(Ok(meta))) => Some(meta.identity),
            _ => None,
        };
        let identity = from_meta.or_else(|| {
            StreamIdentity::new(
                unescape_component(domain)?,
                unescape_component(entity_type)?,
                unescape_component(stem)?,
            )
            .ok()
        });

        let log_path = dir.join(format!("{}.{}", stem, LOG_EXT));
        match identity {
            Some(identity) if self.stream_path(&identity, LOG_EXT) == log_path => Some(identity),
            Some(identity) => {
                tracing::warn!(identity = %identity, path = %log_path.display(), "stream files do not match their identity, skipped");
                None
            }
            None => {
                tracing::warn!(path = %log_path.display(), "unidentifiable stream files skipped");
                None
            }
        }
    }

    /// Recover one stream: scan its log, drop a torn tail, reconcile the header
    pub fn load(&self, identity: &StreamIdentity) -> Result<Option<LoadedStream>, ReadFault> {
        let header = self.read_header_file(identity)?;
        if matches!(&header, Some(h) if h.deleting) {
            tracing::warn!(identity = %identity, "completing interrupted stream deletion");
            self.remove(identity)
                .map_err(|e| ReadFault::io(identity.clone(), e))?;
            return Ok(None);
        }

        let log_path = self.stream_path(identity, LOG_EXT);
        let bytes = not_found_is_none(fs::read(&log_path))
            .map_err(|e| ReadFault::io(identity.clone(), e))?
            .unwrap_or_default();

        let scan = scan_blocks(&bytes).map_err(|e| {
            tracing::error!(identity = %identity, path = %log_path.display(), error = %e, "corrupt block in event log");
            ReadFault::corrupt(identity.clone(), e.to_string()).with_source(e)
        })?;

        let mut events = Vec::with_capacity(scan.payloads.len());
        for payload in &scan.payloads {
            let persisted = PersistedEvent::from_bytes(payload).map_err(|e| {
                tracing::error!(identity = %identity, error = %e, "undecodable event block");
                ReadFault::corrupt(identity.clone(), format!("undecodable event: {}", e)).with_source(e)
            })?;
            events.push(persisted.into_record());
        }

        if let Some(torn) = scan.torn_tail {
            tracing::warn!(
                identity = %identity,
                valid_len = scan.valid_len,
                file_len = bytes.len(),
                reason = ?torn,
                "truncating torn block at end of event log"
            );
            let file = OpenOptions::new()
                .write(true)
                .open(&log_path)
                .map_err(|e| ReadFault::io(identity.clone(), e))?;
            file.set_len(scan.valid_len)
                .map_err(|e| ReadFault::io(identity.clone(), e))?;
        }

        let highest = events.last().map(|e| e.sequence_number).unwrap_or(0);
        let mut header = match header {
            Some(header) => header,
            None if events.is_empty() => return Ok(None),
            None => StreamHeader::new(events[0].write_timestamp),
        };
        if header.last_sequence_number < highest {
            tracing::warn!(
                identity = %identity,
                header = header.last_sequence_number,
                highest,
                "raising stream header to highest persisted block"
            );
            header.last_sequence_number = highest;
            self.write_header(identity, &header)
                .map_err(|e| ReadFault::io(identity.clone(), e))?;
        }
        if header.last_sequence_number == 0 {
            // Claimed but the first block never landed.
            return Ok(None);
        }

        Ok(Some(LoadedStream {
            header,
            events,
            log_len: scan.valid_len,
        }))
    }

    /// Mark the stream as deleting, then remove its files
    ///
    /// When the log cannot be removed the mark is cleared again, so a
    /// failed delete leaves the stream as it was.
    pub fn delete(&self, identity: &StreamIdentity, header: &StreamHeader) -> io::Result<()> {
        let mut marked = header.clone();
        marked.deleting = true;
        self.write_header(identity, &marked)?;

        if let Err(e) = not_found_is_none(fs::remove_file(self.stream_path(identity, LOG_EXT))) {
            if let Err(restore) = self.write_header(identity, header) {
                tracing::error!(
                    identity = %identity,
                    error = %restore,
                    "could not clear deletion mark, the stream is erased on next open"
                );
            }
            return Err(e);
        }
        if let Err(e) = not_found_is_none(fs::remove_file(self.stream_path(identity, META_EXT))) {
            tracing::warn!(identity = %identity, error = %e, "deletion mark left behind, recovery removes it");
        }
        Ok(())
    }

    /// Remove both files without marking
    pub fn remove(&self, identity: &StreamIdentity) -> io::Result<()> {
        not_found_is_none(fs::remove_file(self.stream_path(identity, LOG_EXT)))?;
        not_found_is_none(fs::remove_file(self.stream_path(identity, META_EXT)))?;
        Ok(())
    }
}

/// Subdirectories of `dir` with UTF-8 names
fn subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, StorageError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_error(dir))? {
        let entry = entry.map_err(dir_error(dir))?;
        let path = entry.path();
        if !entry.file_type().map_err(dir_error(&path))?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            out.push((name.to_string(), path));
        }
    }
    out.sort();
    Ok(out)
}

/// Stems of the `.log` and `.meta` files in `dir`
fn stems(dir: &Path) -> Result<BTreeSet<String>, StorageError> {
    let mut out = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(dir_error(dir))? {
        let entry = entry.map_err(dir_error(dir))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let stem = name
            .strip_suffix(".log")
            .or_else(|| name.strip_suffix(".meta"));
        if let Some(stem) = stem {
            out.insert(stem.to_string());
        }
    }
    Ok(out)
}

//! [`FileCodec`] strategies.
//!
//! | strategy           | writes                                  |
//! |--------------------|-----------------------------------------|
//! | [`InlineFiles`]    | name, length-prefixed bytes             |
//! | [`OfferWriter`]    | name, 32-byte hash                      |
//! | [`ResolutionWriter`] | name, different flag, bytes if different |

use bitswarm_core::{BitReader, BitWriter};

use crate::error::{NetError, NetResult};
use crate::protocol::{FileCodec, NetFile};

use super::store::FileStore;
use super::{ContentHash, FileStatus, FileSyncCache, COLLISION_SUFFIX};

/// Files written in full on every send. Used for ordinary traffic.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineFiles;

impl FileCodec for InlineFiles {
    fn write_file(&mut self, _field: &str, file: &NetFile, writer: &mut BitWriter) -> NetResult<()> {
        writer.write_string(&file.name);
        writer.write_byte_block(&file.bytes);
        Ok(())
    }

    fn read_file(&mut self, _field: &str, reader: &mut BitReader<'_>) -> NetResult<NetFile> {
        let name = reader.try_read_string()?;
        let bytes = reader.try_read_byte_block()?;
        Ok(NetFile { name, bytes })
    }
}

/// Server side of the offer: hashes each file into the session cache.
pub struct OfferWriter<'a> {
    cache: &'a mut FileSyncCache,
}

impl<'a> OfferWriter<'a> {
    /// Offers into `cache`.
    pub fn new(cache: &'a mut FileSyncCache) -> Self {
        Self { cache }
    }
}

impl FileCodec for OfferWriter<'_> {
    fn write_file(&mut self, _field: &str, file: &NetFile, writer: &mut BitWriter) -> NetResult<()> {
        let hash = self.cache.offer(&file.name, &file.bytes);
        writer.write_string(&file.name);
        writer.write_bytes(hash.as_bytes());
        Ok(())
    }

    fn read_file(&mut self, field: &str, _reader: &mut BitReader<'_>) -> NetResult<NetFile> {
        Err(NetError::FileSync(format!("offer writer cannot read field '{field}'")))
    }
}

/// Client side of the offer: compares each hash against the local store.
///
/// A differing local file is moved aside to `<name>.orig` so the incoming
/// payload never overwrites it.
pub struct OfferReader<'a> {
    store: &'a mut dyn FileStore,
    verdicts: Vec<bool>,
}

impl<'a> OfferReader<'a> {
    /// Checks offers against `store`.
    pub fn new(store: &'a mut dyn FileStore) -> Self {
        Self {
            store,
            verdicts: Vec::new(),
        }
    }

    /// One verdict per offered file, true for IDENTICAL.
    #[must_use]
    pub fn into_verdicts(self) -> Vec<bool> {
        self.verdicts
    }
}

impl FileCodec for OfferReader<'_> {
    fn write_file(&mut self, field: &str, _file: &NetFile, _writer: &mut BitWriter) -> NetResult<()> {
        Err(NetError::FileSync(format!("offer reader cannot write field '{field}'")))
    }

    fn read_file(&mut self, _field: &str, reader: &mut BitReader<'_>) -> NetResult<NetFile> {
        let name = reader.try_read_string()?;
        let mut hash = ContentHash::default();
        reader.ensure(ContentHash::LEN * 8)?;
        reader.read_bytes_into(&mut hash.0);

        let identical = match self.store.read(&name)? {
            Some(local) if super::content_hash(&local) == hash => true,
            Some(_) => {
                let aside = format!("{name}{COLLISION_SUFFIX}");
                self.store.rename(&name, &aside)?;
                tracing::debug!("Local '{}' differs from offer, moved to '{}'", name, aside);
                false
            }
            None => false,
        };
        self.verdicts.push(identical);
        Ok(NetFile {
            name,
            bytes: Vec::new(),
        })
    }
}

/// Outcome of one resolved file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Logical name.
    pub name: String,
    /// Final verdict.
    pub status: FileStatus,
    /// Payload bytes sent.
    pub payload_bytes: usize,
}

/// Server side of the resolution: full bytes only for DIFFERENT files.
///
/// Each resolved record is removed from the cache.
pub struct ResolutionWriter<'a> {
    cache: &'a mut FileSyncCache,
    resolved: Vec<ResolvedFile>,
}

impl<'a> ResolutionWriter<'a> {
    /// Resolves against `cache`.
    pub fn new(cache: &'a mut FileSyncCache) -> Self {
        Self {
            cache,
            resolved: Vec::new(),
        }
    }

    /// Files resolved so far.
    #[must_use]
    pub fn into_resolved(self) -> Vec<ResolvedFile> {
        self.resolved
    }
}

impl FileCodec for ResolutionWriter<'_> {
    fn write_file(&mut self, _field: &str, file: &NetFile, writer: &mut BitWriter) -> NetResult<()> {
        let status = match self.cache.remove(&file.name) {
            Some(record) if record.status != FileStatus::AwaitingHash => record.status,
            _ => {
                return Err(NetError::FileSync(format!(
                    "no verdict for '{}' before resolution",
                    file.name
                )));
            }
        };
        let different = status == FileStatus::Different;

        writer.write_string(&file.name);
        writer.write_bool(different);
        let payload_bytes = if different {
            writer.write_byte_block(&file.bytes);
            file.bytes.len()
        } else {
            0
        };
        self.resolved.push(ResolvedFile {
            name: file.name.clone(),
            status,
            payload_bytes,
        });
        Ok(())
    }

    fn read_file(&mut self, field: &str, _reader: &mut BitReader<'_>) -> NetResult<NetFile> {
        Err(NetError::FileSync(format!("resolution writer cannot read field '{field}'")))
    }
}

/// Client side of the resolution: stores payloads, adopts identical files.
pub struct ResolutionReader<'a> {
    store: &'a mut dyn FileStore,
}

impl<'a> ResolutionReader<'a> {
    /// Resolves into `store`.
    pub fn new(store: &'a mut dyn FileStore) -> Self {
        Self { store }
    }
}

impl FileCodec for ResolutionReader<'_> {
    fn write_file(&mut self, field: &str, _file: &NetFile, _writer: &mut BitWriter) -> NetResult<()> {
        Err(NetError::FileSync(format!("resolution reader cannot write field '{field}'")))
    }

    fn read_file(&mut self, _field: &str, reader: &mut BitReader<'_>) -> NetResult<NetFile> {
        let name = reader.try_read_string()?;
        let bytes = if reader.try_read_bool()? {
            let bytes = reader.try_read_byte_block()?;
            self.store.write(&name, &bytes)?;
            bytes
        } else {
            self.store
                .read(&name)?
                .ok_or_else(|| NetError::FileSync(format!("identical file '{name}' disappeared")))?
        };
        Ok(NetFile { name, bytes })
    }
}

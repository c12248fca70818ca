//! Filesystem chunk store used by the `chunktree` binary.
//!
//! One file per chunk, holding its wire encoding, under a two-level
//! fan-out: `{root}/{hex[0..2]}/{hex[2..4]}/{hex}`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chunktree_types::{ChunkStore, Durability, StoreError};
use chunktree_wire::{Address, Chunk};
use tracing::{error, trace};

/// Chunk store rooted at a directory.
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so a crash never leaves a half-written chunk under its
/// address. [`Durability::Persist`] additionally syncs the file before
/// the rename; [`Durability::Transient`] leaves flushing to the OS.
///
/// Reads re-hash the stored bytes and report [`StoreError::Corrupt`] if
/// they no longer match the address.
pub struct FileChunkStore {
    root: PathBuf,
}

impl FileChunkStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, address: &Address) -> PathBuf {
        let hex = address.to_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(&hex)
    }
}

impl ChunkStore for FileChunkStore {
    fn put(&self, chunk: &Chunk, durability: Durability) -> Result<Address, StoreError> {
        let address = chunk.address();
        let path = self.chunk_path(&address);

        if path.exists() {
            if durability == Durability::Persist {
                File::open(&path)?.sync_all()?;
            }
            trace!(%address, "chunk already stored");
            return Ok(address);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        let mut file = File::create(&tmp_path)?;
        chunk.write_to(&mut file)?;
        if durability == Durability::Persist {
            file.sync_all()?;
        }
        drop(file);
        fs::rename(&tmp_path, &path)?;

        trace!(%address, path = %path.display(), span = chunk.span(), %durability, "stored chunk");
        Ok(address)
    }

    fn get(&self, address: &Address) -> Result<Option<Chunk>, StoreError> {
        let path = self.chunk_path(address);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let chunk = Chunk::decode(&bytes)?;
        let actual = chunk.address();
        if actual != *address {
            error!(expected = %address, %actual, "chunk corruption detected on read");
            return Err(StoreError::Corrupt {
                expected: *address,
                actual,
            });
        }
        Ok(Some(chunk))
    }

    fn contains(&self, address: &Address) -> Result<bool, StoreError> {
        match fs::metadata(self.chunk_path(address)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

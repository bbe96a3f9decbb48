use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::domain::message::MessageId;
use crate::error::{ArchiveError, Result};
use crate::store::repo::{ArchiveSnapshot, ArchiveStore};

/// One file per message in a flat directory, named by message id.
#[derive(Debug, Clone)]
pub struct DirArchive {
    dir: PathBuf,
}

impl DirArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &MessageId) -> io::Result<PathBuf> {
        let name = id.as_str();
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "message id is not a plain file name",
            ));
        }
        Ok(self.dir.join(name))
    }
}

impl ArchiveStore for DirArchive {
    fn snapshot(&self) -> Result<ArchiveSnapshot> {
        let read_err = |source| ArchiveError::Snapshot {
            path: self.dir.clone(),
            source,
        };

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            // follows symlinks, so links to directories and dangling links are skipped
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            match entry.file_name().into_string() {
                Ok(name) => ids.push(MessageId::new(name)),
                Err(name) => log::debug!("skipping non UTF-8 entry {name:?}"),
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn persist(&self, id: &MessageId, bytes: &[u8]) -> Result<PathBuf> {
        let persist_err = |path: PathBuf, source| ArchiveError::Persist {
            id: id.clone(),
            path,
            source,
        };

        let path = self
            .file_for(id)
            .map_err(|e| persist_err(self.dir.clone(), e))?;

        // same id always carries the same content, so overwriting is harmless
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }

        let write = || -> io::Result<()> {
            let mut f = opts.open(&path)?;
            f.write_all(bytes)?;
            f.sync_all()
        };
        write().map_err(|e| persist_err(path.clone(), e))?;
        Ok(path)
    }
}

use std::collections::HashSet;
use std::path::PathBuf;

use crate::domain::message::MessageId;
use crate::error::Result;

/// Ids present in the archive when a run started. Never updated during the run.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSnapshot {
    ids: HashSet<MessageId>,
}

impl ArchiveSnapshot {
    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<MessageId> for ArchiveSnapshot {
    fn from_iter<I: IntoIterator<Item = MessageId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Write-once message store keyed by remote id.
pub trait ArchiveStore {
    fn snapshot(&self) -> Result<ArchiveSnapshot>;

    /// Store `bytes` under `id`, returning where they went.
    fn persist(&self, id: &MessageId, bytes: &[u8]) -> Result<PathBuf>;
}

//! In-memory archive tree.
//!
//! Useful for embedders that already hold decoded records, and for tests.

use std::path::{Path, PathBuf};

use super::{Archive, Children, FolderSource, Messages, RawMessage};
use crate::error::SourceError;

/// An archive held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    path: PathBuf,
    root: MemoryFolder,
}

impl MemoryArchive {
    /// Create an archive whose (unnamed) root folder is `root`.
    pub fn new(path: impl Into<PathBuf>, root: MemoryFolder) -> Self {
        Self {
            path: path.into(),
            root,
        }
    }
}

impl Archive for MemoryArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn root(&self) -> &dyn FolderSource {
        &self.root
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Message(RawMessage),
    Unreadable { id: String, reason: String },
}

/// A folder node of a [`MemoryArchive`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFolder {
    name: String,
    children: Vec<MemoryFolder>,
    entries: Vec<Entry>,
}

impl MemoryFolder {
    /// An empty folder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a child folder.
    pub fn with_folder(mut self, folder: MemoryFolder) -> Self {
        self.children.push(folder);
        self
    }

    /// Append a message.
    pub fn with_message(mut self, message: RawMessage) -> Self {
        self.entries.push(Entry::Message(message));
        self
    }

    /// Append a record that fails to read, as damaged archives do.
    pub fn with_unreadable(mut self, id: impl Into<String>, reason: impl Into<String>) -> Self {
        self.entries.push(Entry::Unreadable {
            id: id.into(),
            reason: reason.into(),
        });
        self
    }
}

impl FolderSource for MemoryFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Children<'_> {
        Box::new(
            self.children
                .iter()
                .map(|c| Ok(Box::new(c) as Box<dyn FolderSource + '_>)),
        )
    }

    fn messages(&self) -> Messages<'_> {
        Box::new(self.entries.iter().map(|entry| match entry {
            Entry::Message(m) => Ok(m.clone()),
            Entry::Unreadable { id, reason } => Err(SourceError::Record {
                id: id.clone(),
                reason: reason.clone(),
            }),
        }))
    }
}

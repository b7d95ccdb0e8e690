// SPDX-License-Identifier: AGPL-3.0-or-later
//! File system entries

use crate::{Metadata, OnePath};
use serde::{Deserialize, Serialize};

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A resolved file system entry, as produced by listings and stat calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: OnePath,
    pub kind: EntryKind,
    pub metadata: Metadata,
}

impl Entry {
    pub fn file(path: OnePath, metadata: Metadata) -> Self {
        Self { path, kind: EntryKind::File, metadata }
    }

    /// Directories never carry a length.
    pub fn directory(path: OnePath, mut metadata: Metadata) -> Self {
        metadata.size = None;
        Self { path, kind: EntryKind::Directory, metadata }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    pub fn size(&self) -> Option<u64> {
        self.metadata.size
    }
}

/// Either a bare path or an entry a backend already resolved.
///
/// Facade calls taking a `Location` can answer from a resolved entry without
/// asking the backend again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(OnePath),
    Resolved(Entry),
}

impl Location {
    pub fn path(&self) -> &OnePath {
        match self {
            Location::Path(path) => path,
            Location::Resolved(entry) => &entry.path,
        }
    }

    pub fn resolved(&self) -> Option<&Entry> {
        match self {
            Location::Path(_) => None,
            Location::Resolved(entry) => Some(entry),
        }
    }
}

impl From<OnePath> for Location {
    fn from(path: OnePath) -> Self {
        Location::Path(path)
    }
}

impl From<&OnePath> for Location {
    fn from(path: &OnePath) -> Self {
        Location::Path(path.clone())
    }
}

impl From<Entry> for Location {
    fn from(entry: Entry) -> Self {
        Location::Resolved(entry)
    }
}

impl From<&Entry> for Location {
    fn from(entry: &Entry) -> Self {
        Location::Resolved(entry.clone())
    }
}

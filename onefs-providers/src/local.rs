// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local filesystem backend

use async_trait::async_trait;
use onefs_core::{
    backend::{ProtocolBackend, ReadStream, WriteStream},
    entry::{Entry, Location},
    error::OneFsResult,
    path::FILE_PROTOCOL,
    stream::{passthrough, TranslateStream},
    Metadata, OnePath,
};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Local filesystem backend, registered under `file`.
///
/// Serves `localhost` and, on Windows, UNC hosts. The host-less `file://`
/// root lists as empty since file servers cannot be enumerated.
#[derive(Debug, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    /// Native path for `path`; `None` for locations that only exist in the
    /// path model (the server root, and the drive list on Windows).
    fn to_real_path(path: &OnePath) -> Option<PathBuf> {
        if !path.has_host() {
            return None;
        }
        if path.is_localhost() {
            return Self::local_path(path.segments());
        }

        // UNC: \\host\share\...
        let mut real = format!(r"\\{}", path.host());
        for segment in path.segments() {
            real.push('\\');
            real.push_str(segment);
        }
        Some(PathBuf::from(real))
    }

    #[cfg(windows)]
    fn local_path(segments: &[String]) -> Option<PathBuf> {
        let (drive, rest) = segments.split_first()?;
        let mut real = PathBuf::from(format!("{drive}\\"));
        real.extend(rest);
        Some(real)
    }

    #[cfg(not(windows))]
    fn local_path(segments: &[String]) -> Option<PathBuf> {
        let mut real = PathBuf::from("/");
        real.extend(segments);
        Some(real)
    }

    #[cfg(windows)]
    fn drives() -> Vec<Entry> {
        let root = OnePath::new(FILE_PROTOCOL, onefs_core::path::LOCALHOST, None, std::iter::empty::<&str>());
        (b'A'..=b'Z')
            .map(|letter| format!("{}:", letter as char))
            .filter(|drive| Path::new(&format!("{drive}\\")).exists())
            .map(|drive| Entry::directory(root.child(&drive), Metadata::new()))
            .collect()
    }

    fn entry_from(path: OnePath, meta: std::fs::Metadata) -> Entry {
        if meta.is_dir() {
            Entry::directory(path, meta.into())
        } else {
            Entry::file(path, meta.into())
        }
    }

    async fn stat(real: &Path) -> io::Result<Option<std::fs::Metadata>> {
        refusal_as_none(fs::metadata(real).await, "stat", real)
    }
}

/// Missing targets, existing targets and permission refusals are answers,
/// not faults: all of them become `None`.
fn refusal_as_none<T>(result: io::Result<T>, op: &str, real: &Path) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound
                    | io::ErrorKind::AlreadyExists
                    | io::ErrorKind::PermissionDenied
            ) =>
        {
            debug!(path = %real.display(), error = %e, "{} refused", op);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ProtocolBackend for LocalBackend {
    fn protocol(&self) -> Option<&str> {
        Some(FILE_PROTOCOL)
    }

    fn display_name(&self) -> &str {
        "Local Filesystem"
    }

    fn accepts(&self, path: &OnePath) -> bool {
        !path.has_host() || path.is_localhost() || cfg!(windows)
    }

    async fn list_children(&self, path: &OnePath) -> OneFsResult<Option<Vec<Entry>>> {
        #[cfg(windows)]
        if path.is_localhost() && path.is_root() {
            return Ok(Some(Self::drives()));
        }

        let Some(real) = Self::to_real_path(path) else {
            return Ok(Some(Vec::new()));
        };
        match Self::stat(&real).await? {
            None => return Ok(None),
            Some(meta) if !meta.is_dir() => return Ok(Some(Vec::new())),
            Some(_) => {}
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&real).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // `\` is a separator in file paths, so such a name could never be
            // addressed again
            if name.contains('\\') {
                debug!(dir = %real.display(), name = %name, "skipping unaddressable entry");
                continue;
            }
            // follow links; a dangling one still shows up as itself
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(_) => fs::symlink_metadata(entry.path()).await?,
            };
            entries.push(Self::entry_from(path.child(&name), meta));
        }
        Ok(Some(entries))
    }

    async fn get_information(&self, path: &OnePath) -> OneFsResult<Option<Entry>> {
        let Some(real) = Self::to_real_path(path) else {
            return Ok(Some(Entry::directory(path.clone(), Metadata::new())));
        };
        Ok(Self::stat(&real).await?.map(|meta| Self::entry_from(path.clone(), meta)))
    }

    async fn open_read(&self, path: &OnePath) -> OneFsResult<Option<ReadStream>> {
        let Some(real) = Self::to_real_path(path) else {
            return Ok(None);
        };
        match Self::stat(&real).await? {
            Some(meta) if meta.is_file() => {}
            _ => return Ok(None),
        }
        let Some(file) = refusal_as_none(fs::File::open(&real).await, "open", &real)? else {
            return Ok(None);
        };
        Ok(Some(Box::pin(TranslateStream::new(file, passthrough))))
    }

    async fn create_file(&self, path: &OnePath) -> OneFsResult<Option<WriteStream>> {
        let Some(real) = Self::to_real_path(path) else {
            return Ok(None);
        };
        let parent_is_dir = match real.parent() {
            Some(parent) => Self::stat(parent).await?.is_some_and(|m| m.is_dir()),
            None => false,
        };
        if !parent_is_dir {
            return Ok(None);
        }

        let opened = fs::OpenOptions::new().write(true).create_new(true).open(&real).await;
        let Some(file) = refusal_as_none(opened, "create", &real)? else {
            return Ok(None);
        };
        Ok(Some(Box::pin(TranslateStream::new(file, passthrough))))
    }

    async fn delete(&self, location: &Location) -> OneFsResult<bool> {
        let Some(real) = Self::to_real_path(location.path()) else {
            return Ok(false);
        };
        let is_directory = match location.resolved() {
            Some(entry) => entry.is_directory(),
            None => match refusal_as_none(fs::symlink_metadata(&real).await, "delete", &real)? {
                Some(meta) => meta.is_dir(),
                None => return Ok(false),
            },
        };

        if is_directory {
            // non-empty, in use or not ours to remove: all plain refusals
            return Ok(match fs::remove_dir(&real).await {
                Ok(()) => true,
                Err(e) => {
                    debug!(path = %real.display(), error = %e, "directory not removed");
                    false
                }
            });
        }

        Ok(refusal_as_none(fs::remove_file(&real).await, "delete", &real)?.is_some())
    }

    async fn create_directory(&self, path: &OnePath) -> OneFsResult<bool> {
        let Some(real) = Self::to_real_path(path) else {
            return Ok(false);
        };
        Ok(refusal_as_none(fs::create_dir(&real).await, "mkdir", &real)?.is_some())
    }
}

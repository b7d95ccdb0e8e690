// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use chrono::{DateTime, Utc};
use console::style;
use directories::ProjectDirs;
use onefs_core::{Entry, EntryKind, OneFsError, OneFsResult, OnePath, Settings};
use onefs_providers::{FilesystemConfig, OneFilesystem};
use std::io;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tabled::{Table, Tabled};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Shared state for one CLI invocation
pub struct Context {
    fs: OneFilesystem,
    json: bool,
    settings: Settings,
    source: Option<PathBuf>,
}

/// Settings in effect, as shown by `onefs config`
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub source: Option<String>,
    pub connect_timeout_secs: u64,
    pub hosts: Vec<HostLogin>,
}

/// A configured login; the secret is never shown
#[derive(Debug, PartialEq, Eq, Serialize, Tabled)]
pub struct HostLogin {
    #[tabled(rename = "Host")]
    pub host: String,
    #[tabled(rename = "User")]
    pub username: String,
}

impl Context {
    pub fn new(json: bool) -> Self {
        Self {
            fs: OneFilesystem::new(FilesystemConfig::default()),
            json,
            settings: Settings::default(),
            source: None,
        }
    }

    /// Reads the settings file (explicit, or the per-user default) and builds
    /// the filesystem.
    pub async fn load(config: Option<&Path>, json: bool) -> OneFsResult<Self> {
        let source = config.map(Path::to_path_buf).or_else(default_config_path);
        let settings = match &source {
            Some(path) => {
                debug!(path = %path.display(), "loading settings");
                Settings::load(path).await?
            }
            None => Settings::default(),
        };
        debug!(params = ?settings.parameters(), hosts = settings.credentials.len(), "settings loaded");
        Ok(Self { settings, source, ..Self::new(json) })
    }

    pub fn effective_config(&self) -> EffectiveConfig {
        let mut hosts: Vec<HostLogin> = self
            .settings
            .credentials
            .iter()
            .map(|(host, cred)| HostLogin { host: host.clone(), username: cred.username.clone() })
            .collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));

        EffectiveConfig {
            source: self.source.as_ref().map(|p| p.display().to_string()),
            connect_timeout_secs: self.settings.parameters().connect_timeout.as_secs(),
            hosts,
        }
    }

    pub fn shutdown(&self) {
        self.fs.shutdown();
    }

    /// List directory contents
    pub async fn ls(&self, path: &str, long: bool, all: bool, human: bool) -> OneFsResult<()> {
        let path = resolve_path(path)?;
        debug!(%path, "listing");

        let entries = self
            .fs
            .list_children(&path)
            .await?
            .ok_or_else(|| not_found(&path))?;
        let entries: Vec<&Entry> = entries.iter().filter(|e| all || !is_hidden(e)).collect();

        if self.json {
            return print_json(&entries);
        }

        if entries.is_empty() {
            println!("(empty directory)");
        } else if long {
            let rows: Vec<LsEntry> = entries.iter().map(|e| LsEntry::new(e, human)).collect();
            println!("{}", Table::new(rows));
        } else {
            for entry in entries {
                println!("{}", display_name(entry));
            }
        }

        Ok(())
    }

    /// Display file contents
    pub async fn cat(&self, path: &str) -> OneFsResult<()> {
        let mut stdout = tokio::io::stdout();
        self.read_into(&resolve_path(path)?, &mut stdout).await
    }

    /// Write stdin to a file
    pub async fn put(&self, path: &str) -> OneFsResult<()> {
        let path = resolve_path(path)?;
        let written = self.write_from(&path, &mut tokio::io::stdin()).await?;
        if !self.json {
            println!("Wrote {} to {}", bytesize::ByteSize(written), path);
        }
        Ok(())
    }

    /// Remove files or empty directories
    pub async fn rm(&self, paths: &[String]) -> OneFsResult<()> {
        for raw in paths {
            let path = resolve_path(raw)?;
            debug!(%path, "removing");
            if !self.fs.delete(&path).await? {
                return Err(OneFsError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{path}: not removed (missing, not empty or refused)"),
                )));
            }
            if !self.json {
                println!("Removed {raw}");
            }
        }
        Ok(())
    }

    /// Create directories
    pub async fn mkdir(&self, paths: &[String]) -> OneFsResult<()> {
        for raw in paths {
            let path = resolve_path(raw)?;
            debug!(%path, "creating directory");
            if !self.fs.create_directory(&path).await? {
                return Err(OneFsError::Io(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{path}: already exists or parent is missing"),
                )));
            }
            if !self.json {
                println!("Created {raw}");
            }
        }
        Ok(())
    }

    /// Show file or directory information
    pub async fn stat(&self, path: &str) -> OneFsResult<()> {
        let path = resolve_path(path)?;
        let entry = self
            .fs
            .get_information(&path)
            .await?
            .ok_or_else(|| not_found(&path))?;

        if self.json {
            return print_json(&entry);
        }

        println!("  Path: {}", entry.path);
        println!("  Literal: {}", entry.path.literal());
        println!("  Type: {:?}", entry.kind);
        if let Some(size) = entry.metadata.size {
            println!("  Size: {} ({})", size, bytesize::ByteSize(size));
        }
        if let Some(created) = entry.metadata.created {
            println!("  Created: {created}");
        }
        if let Some(modified) = entry.metadata.modified {
            println!("  Modified: {modified}");
        }
        if let Some(accessed) = entry.metadata.accessed {
            println!("  Accessed: {accessed}");
        }

        Ok(())
    }

    /// List registered protocols
    pub fn protocols(&self) -> OneFsResult<()> {
        if self.json {
            return print_json(&self.fs.protocols());
        }
        println!("Registered protocols:");
        for tag in self.fs.protocols() {
            println!("  {}", style(tag).green());
        }
        Ok(())
    }

    /// Show the settings in effect
    pub fn config(&self) -> OneFsResult<()> {
        let config = self.effective_config();
        if self.json {
            return print_json(&config);
        }

        match &config.source {
            Some(source) => println!("  Settings: {source}"),
            None => println!("  Settings: (defaults)"),
        }
        println!("  Connect timeout: {}s", config.connect_timeout_secs);
        if config.hosts.is_empty() {
            println!("  Credentials: none, logins are anonymous");
        } else {
            println!("{}", Table::new(config.hosts));
        }
        Ok(())
    }

    async fn read_into<W>(&self, path: &OnePath, out: &mut W) -> OneFsResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        debug!(%path, "reading");
        let mut stream = self.fs.open_read(path).await?.ok_or_else(|| not_found(path))?;
        tokio::io::copy(&mut stream, out).await.map_err(OneFsError::recover)?;
        out.flush().await?;
        Ok(())
    }

    async fn write_from<R>(&self, path: &OnePath, input: &mut R) -> OneFsResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        debug!(%path, "writing");
        let mut stream = self.fs.create_file(path).await?.ok_or_else(|| {
            OneFsError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{path}: already exists or parent is missing"),
            ))
        })?;
        let written = tokio::io::copy(input, &mut stream)
            .await
            .map_err(OneFsError::recover)?;
        stream.shutdown().await.map_err(OneFsError::recover)?;
        Ok(written)
    }
}

/// Parses a command-line path. Anything the address syntax rejects is taken
/// as relative to the working directory.
fn resolve_path(raw: &str) -> OneFsResult<OnePath> {
    match OnePath::parse(raw) {
        Ok(path) => Ok(path),
        Err(OneFsError::MalformedAddress(_)) => {
            let cwd = std::env::current_dir()?;
            resolve_relative(&cwd, raw)
        }
        Err(e) => Err(e),
    }
}

fn resolve_relative(cwd: &Path, raw: &str) -> OneFsResult<OnePath> {
    OnePath::parse(&cwd.join(raw).to_string_lossy())
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "hyperpolymath", "onefs").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn not_found(path: &OnePath) -> OneFsError {
    OneFsError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{path}: no such file or directory"),
    ))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> OneFsResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| OneFsError::Backend(Box::new(e)))?;
    println!("{text}");
    Ok(())
}

fn is_hidden(entry: &Entry) -> bool {
    entry.name().is_some_and(|n| n.starts_with('.'))
}

/// Protocol roots have no segments; show their rendered form instead.
fn display_name(entry: &Entry) -> String {
    entry
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| entry.path.render())
}

fn format_time(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_size(size: Option<u64>, human: bool) -> String {
    match size {
        Some(s) if human => bytesize::ByteSize(s).to_string(),
        Some(s) => s.to_string(),
        None => "-".to_string(),
    }
}

fn format_kind(kind: EntryKind) -> String {
    match kind {
        EntryKind::Directory => style("d").cyan().to_string(),
        EntryKind::File => "-".to_string(),
    }
}

#[derive(Tabled)]
struct LsEntry {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl LsEntry {
    fn new(entry: &Entry, human: bool) -> Self {
        Self {
            kind: format_kind(entry.kind),
            size: format_size(entry.metadata.size, human),
            modified: format_time(entry.metadata.modified),
            name: display_name(entry),
        }
    }
}

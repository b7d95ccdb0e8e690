// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage providers for OneFS
//!
//! The local filesystem plus the FTP family (`ftp`, `ftps`, `ftpes`) and SFTP,
//! all behind the [`OneFilesystem`] facade. Remote backends talk to servers
//! through a [`RemoteConnector`] supplied by the caller.

mod filesystem;
pub mod remote;

#[cfg(feature = "local")]
mod local;

#[cfg(feature = "ftp")]
pub mod ftp;

#[cfg(feature = "sftp")]
pub mod sftp;

#[cfg(test)]
mod testing;

pub use filesystem::{FilesystemConfig, OneFilesystem};
pub use remote::{
    ConnectRequest, RemoteBackend, RemoteConnector, RemoteEntry, RemoteFault, RemoteKind,
    RemoteSession, TransportMode,
};

#[cfg(feature = "local")]
pub use local::LocalBackend;

#[cfg(feature = "ftp")]
pub use ftp::{FtpBackend, FtpMode};

#[cfg(feature = "sftp")]
pub use sftp::SftpBackend;

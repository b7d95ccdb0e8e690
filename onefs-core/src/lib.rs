// SPDX-License-Identifier: AGPL-3.0-or-later
//! OneFS Core
//!
//! Path model, entries, errors and the backend contract shared by every
//! protocol behind the OneFS facade.

pub mod backend;
pub mod credentials;
pub mod entry;
pub mod error;
pub mod metadata;
pub mod params;
pub mod path;
pub mod stream;

pub use backend::{ProtocolBackend, ReadStream, WriteStream};
pub use credentials::{resolve_credential, Credential, CredentialProvider, NoCredentials};
pub use entry::{Entry, EntryKind, Location};
pub use error::{OneFsError, OneFsResult};
pub use metadata::Metadata;
pub use params::{FilesystemParameters, Settings, SocketFactory};
pub use path::OnePath;
pub use stream::TranslateStream;

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Credential lookup for remote backends

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Username used when no credential is known for a host
pub const ANONYMOUS_USER: &str = "anonymous";

/// Password sent alongside [`ANONYMOUS_USER`]
pub const ANONYMOUS_PASSWORD: &str = "someone@somewhere";

/// A username and its secret
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER, ANONYMOUS_PASSWORD)
    }

    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS_USER
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies credentials per endpoint
pub trait CredentialProvider: Send + Sync {
    fn credential(&self, host: &str, port: u16, protocol: &str) -> Option<Credential>;
}

/// Provider that knows nobody; every login is anonymous
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credential(&self, _host: &str, _port: u16, _protocol: &str) -> Option<Credential> {
        None
    }
}

/// The same credential for every endpoint
impl CredentialProvider for Credential {
    fn credential(&self, _host: &str, _port: u16, _protocol: &str) -> Option<Credential> {
        Some(self.clone())
    }
}

/// Credentials keyed by host name
impl CredentialProvider for HashMap<String, Credential> {
    fn credential(&self, host: &str, _port: u16, _protocol: &str) -> Option<Credential> {
        self.get(host).cloned()
    }
}

/// Looks up the credential for an endpoint, falling back to the anonymous
/// login when none is known or the username is empty.
pub fn resolve_credential(
    provider: &dyn CredentialProvider,
    host: &str,
    port: u16,
    protocol: &str,
) -> Credential {
    provider
        .credential(host, port, protocol)
        .filter(|c| !c.username.is_empty())
        .unwrap_or_else(Credential::anonymous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let cred = Credential::new("alice", "hunter2");
        let debug = format!("{:?}", cred);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_fallback_to_anonymous() {
        let cred = resolve_credential(&NoCredentials, "ftp.example.org", 21, "ftp");
        assert_eq!(cred, Credential::anonymous());
        assert_eq!(cred.password, ANONYMOUS_PASSWORD);

        let empty = Credential::new("", "secret");
        assert!(resolve_credential(&empty, "h", 22, "sftp").is_anonymous());
    }

    #[test]
    fn test_per_host_lookup() {
        let mut creds = HashMap::new();
        creds.insert("box".to_string(), Credential::new("bob", "pw"));

        assert_eq!(resolve_credential(&creds, "box", 22, "sftp").username, "bob");
        assert!(resolve_credential(&creds, "other", 22, "sftp").is_anonymous());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structured path addressing
//!
//! A [`OnePath`] names a location on any protocol: the local machine, a
//! Windows file server, or a remote FTP/SFTP host. Several input syntaxes
//! are accepted and all of them normalize to the same structure:
//!
//! | input                         | protocol | host        | segments            |
//! |-------------------------------|----------|-------------|---------------------|
//! | `sftp://host:2222/home/me`    | `sftp`   | `host`      | `home`, `me`        |
//! | `ftp://`                      | `ftp`    | ``          |                     |
//! | `` (empty)                    | ``       | ``          |                     |
//! | `\\`                          | `file`   | ``          |                     |
//! | `\\server\share\dir`          | `file`   | `server`    | `share`, `dir`      |
//! | `C:\Windows`                  | `file`   | `localhost` | `C:`, `Windows`     |
//! | `/usr/lib`                    | `file`   | `localhost` | `usr`, `lib`        |
//!
//! An empty host is always the empty string, never absent: with a protocol it
//! means "enumerate the hosts of that protocol", without one it is the root of
//! all protocols.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{OneFsError, OneFsResult};

/// Host name of the local machine
pub const LOCALHOST: &str = "localhost";

/// Protocol tag of the local filesystem
pub const FILE_PROTOCOL: &str = "file";

/// Structured, normalized path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OnePath {
    protocol: String,
    host: String,
    port: Option<u16>,
    segments: Vec<String>,
}

impl OnePath {
    /// Builds a path from its parts, normalizing the segments.
    ///
    /// An empty protocol is the root of all protocols and carries nothing
    /// else, so host, port and segments are discarded in that case. A `file`
    /// path given any segment but no host refers to the local machine, even
    /// when the segments normalize away (`/etc/..`).
    pub fn new<I, S>(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        segments: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let protocol = protocol.into().to_ascii_lowercase();
        if protocol.is_empty() {
            return Self::protocols_root();
        }
        let raw: Vec<S> = segments.into_iter().collect();
        let mut host = host.into();
        let names_location = raw.iter().any(|s| !s.as_ref().is_empty());
        if host.is_empty() && protocol == FILE_PROTOCOL && names_location {
            host = LOCALHOST.to_string();
        }
        let segments = normalize(Vec::new(), raw);
        Self {
            protocol,
            host,
            port,
            segments,
        }
    }

    /// The root of all protocols (`""`).
    pub fn protocols_root() -> Self {
        Self {
            protocol: String::new(),
            host: String::new(),
            port: None,
            segments: Vec::new(),
        }
    }

    /// The host-less root of one protocol (`ftp://`).
    pub fn protocol_root(protocol: impl Into<String>) -> Self {
        Self::new(protocol, "", None, std::iter::empty::<&str>())
    }

    /// Parses any supported address syntax.
    ///
    /// Rules are tried in order and the first match wins: scheme-qualified
    /// URI, bare protocol root, empty root, UNC root, UNC server, drive path,
    /// absolute native path. Relative paths are rejected; resolve them
    /// against a working directory first.
    pub fn parse(input: &str) -> OneFsResult<Self> {
        const RULES: [fn(&str) -> Option<OnePath>; 7] = [
            parse_uri,
            parse_protocol_root,
            parse_empty_root,
            parse_unc_root,
            parse_unc_server,
            parse_drive_path,
            parse_native_path,
        ];

        RULES
            .iter()
            .find_map(|rule| rule(input))
            .ok_or_else(|| OneFsError::MalformedAddress(input.to_string()))
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True for the root of all protocols.
    pub fn is_protocols_root(&self) -> bool {
        self.protocol.is_empty()
    }

    pub fn has_host(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn is_localhost(&self) -> bool {
        self.host.eq_ignore_ascii_case(LOCALHOST)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// Same protocol, host and port without any segment.
    pub fn root(&self) -> Self {
        Self {
            protocol: self.protocol.clone(),
            host: self.host.clone(),
            port: self.port,
            segments: Vec::new(),
        }
    }

    /// This path followed by each of its parents, up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = OnePath> {
        std::iter::successors(Some(self.clone()), |p| p.parent())
    }

    /// Appends `name`, which may hold several separated tokens.
    ///
    /// Tokens fill the first empty slot: on the root of all protocols the
    /// first token becomes the protocol, on a host-less path it becomes the
    /// host, and every following token is a segment. `.` and empty tokens are
    /// skipped, `..` pops a segment and is a no-op on a root.
    pub fn join(&self, name: impl AsRef<str>) -> Self {
        let mut path = self.clone();
        for token in name.as_ref().split(is_separator) {
            if token.is_empty() || token == "." {
                continue;
            }
            if path.protocol.is_empty() {
                if token != ".." {
                    path = Self::protocol_root(token);
                }
            } else if path.host.is_empty() {
                if token != ".." {
                    path.host = token.to_string();
                }
            } else if token == ".." {
                path.segments.pop();
            } else {
                path.segments.push(token.to_string());
            }
        }
        path
    }

    /// Appends a single name taken verbatim, as reported by a directory
    /// listing. Separators inside `name` are kept; `.`, `..` and empty names
    /// leave the path unchanged.
    ///
    /// `file` paths split on `\` as well as `/` when parsed, so a child whose
    /// name holds either does not survive a render/parse round trip. The local
    /// backend leaves such names out of its listings.
    pub fn child(&self, name: &str) -> Self {
        let mut path = self.clone();
        match name {
            "" | "." | ".." => {}
            _ if path.protocol.is_empty() => path = Self::protocol_root(name),
            _ if path.host.is_empty() => path.host = name.to_string(),
            _ => path.segments.push(name.to_string()),
        }
        path
    }

    /// Canonical scheme-qualified form, the inverse of [`OnePath::parse`].
    pub fn render(&self) -> String {
        if self.protocol.is_empty() {
            return String::new();
        }
        if self.host.is_empty() && self.port.is_none() && self.segments.is_empty() {
            return format!("{}://", self.protocol);
        }

        let mut out = format!("{}://{}", self.protocol, self.host);
        if let Some(port) = self.port {
            out.push(':');
            out.push_str(&port.to_string());
        }
        out.push('/');
        out.push_str(&self.segments.join("/"));
        out
    }

    /// Host-OS syntax for `file` paths (drive, posix or UNC form), the
    /// canonical form for every other protocol.
    pub fn literal(&self) -> String {
        if self.protocol != FILE_PROTOCOL {
            return self.render();
        }
        if self.host.is_empty() {
            return r"\\".to_string();
        }
        if self.is_localhost() {
            return match self.segments.first() {
                Some(first) if is_drive(first) => {
                    if self.segments.len() == 1 {
                        format!("{first}\\")
                    } else {
                        self.segments.join("\\")
                    }
                }
                _ => format!("/{}", self.segments.join("/")),
            };
        }

        let mut out = format!(r"\\{}", self.host);
        for segment in &self.segments {
            out.push('\\');
            out.push_str(segment);
        }
        out
    }
}

impl fmt::Display for OnePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for OnePath {
    type Err = OneFsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OnePath {
    type Error = OneFsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OnePath> for String {
    fn from(path: OnePath) -> Self {
        path.render()
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn is_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Appends `parts` to `segments`, dropping `.` and empty parts and resolving
/// `..` against what is already there.
fn normalize<I, S>(mut segments: Vec<String>, parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for part in parts {
        match part.as_ref() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            part => segments.push(part.to_string()),
        }
    }
    segments
}

/// Splits `host[:port]`, `[v6]` or `[v6]:port`. An empty port means the
/// default one.
fn split_host_port(authority: &str) -> Option<(&str, Option<u16>)> {
    let (host, port) = if authority.starts_with('[') {
        let end = authority.find(']')?;
        let (host, rest) = authority.split_at(end + 1);
        match rest {
            "" => (host, ""),
            rest => (host, rest.strip_prefix(':')?),
        }
    } else {
        authority.rsplit_once(':').unwrap_or((authority, ""))
    };

    if host.chars().any(|c| c.is_whitespace() || matches!(c, '\\' | '?' | '#')) {
        return None;
    }
    let port = match port {
        "" => None,
        digits => Some(digits.parse::<u16>().ok()?),
    };
    Some((host, port))
}

fn parse_uri(input: &str) -> Option<OnePath> {
    let (scheme, rest) = input.split_once("://")?;
    if !is_scheme(scheme) || rest.is_empty() {
        return None;
    }

    let (authority, path) = rest.find('/').map_or((rest, ""), |i| rest.split_at(i));
    // user info never takes part in addressing; credentials are looked up per host
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let (host, port) = split_host_port(authority)?;

    let protocol = scheme.to_ascii_lowercase();
    if protocol == FILE_PROTOCOL {
        // `file:///...` names the local machine even with nothing after the slash
        let host = if host.is_empty() && !path.is_empty() { LOCALHOST } else { host };
        Some(OnePath::new(protocol, host, port, path.split(is_separator)))
    } else {
        Some(OnePath::new(protocol, host, port, path.split('/')))
    }
}

fn parse_protocol_root(input: &str) -> Option<OnePath> {
    let scheme = input.strip_suffix("://")?;
    is_scheme(scheme).then(|| OnePath::protocol_root(scheme))
}

fn parse_empty_root(input: &str) -> Option<OnePath> {
    input.is_empty().then(OnePath::protocols_root)
}

fn parse_unc_root(input: &str) -> Option<OnePath> {
    (input == r"\\").then(|| OnePath::protocol_root(FILE_PROTOCOL))
}

fn parse_unc_server(input: &str) -> Option<OnePath> {
    if !input.starts_with(r"\\") {
        return None;
    }
    let server = input.trim_matches('\\');
    if server.is_empty() || server.contains(is_separator) {
        return None;
    }
    Some(OnePath::new(
        FILE_PROTOCOL,
        server,
        None,
        std::iter::empty::<&str>(),
    ))
}

fn parse_drive_path(input: &str) -> Option<OnePath> {
    let drive = input.get(..2)?;
    if !is_drive(drive) {
        return None;
    }
    let rest = &input[2..];
    if !(rest.is_empty() || rest.starts_with(is_separator)) {
        return None;
    }
    Some(OnePath::new(
        FILE_PROTOCOL,
        LOCALHOST,
        None,
        std::iter::once(drive).chain(rest.split(is_separator)),
    ))
}

fn parse_native_path(input: &str) -> Option<OnePath> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if is_separator(a) && is_separator(b) => {
            // `//server/share` and mixed-separator UNC forms
            let mut parts = input.split(is_separator).filter(|p| !p.is_empty());
            let host = parts.next()?;
            Some(OnePath::new(FILE_PROTOCOL, host, None, parts))
        }
        (Some(a), _) if is_separator(a) => Some(OnePath::new(
            FILE_PROTOCOL,
            LOCALHOST,
            None,
            input.split(is_separator),
        )),
        _ => None,
    }
}

//! Image reference parsing and target rewriting

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER: &str = "docker.io";

/// Where tagged images are pushed: `server/namespace/...`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub server: Option<String>,
    pub namespace: String,
}

impl TargetSpec {
    pub fn new(server: Option<String>, namespace: impl Into<String>) -> Self {
        Self {
            server,
            namespace: namespace.into(),
        }
    }

    /// Configured server, or `docker.io` when unset or blank
    pub fn server(&self) -> &str {
        match self.server.as_deref() {
            Some(server) if !server.trim().is_empty() => server,
            _ => DEFAULT_SERVER,
        }
    }
}

/// Final path segment of a reference: everything after the last `/`
pub fn basename(reference: &str) -> &str {
    match reference.rfind('/') {
        Some(pos) => &reference[pos + 1..],
        None => reference,
    }
}

/// Rewrite `source` to `server/namespace/basename(source)`
pub fn rewrite(source: &str, spec: &TargetSpec) -> String {
    format!("{}/{}/{}", spec.server(), spec.namespace, basename(source))
}

/// Split a reference into repository and optional tag.
///
/// A `:` is a tag separator only after the last `/`, so a registry port such as
/// `host:5000/app` is left in the repository. Digest references (`@sha256:..`)
/// are returned whole with no tag.
pub fn split_tag(reference: &str) -> (&str, Option<&str>) {
    if reference.contains('@') {
        return (reference, None);
    }
    let name_start = reference.rfind('/').map(|pos| pos + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(offset) => {
            let colon = name_start + offset;
            (&reference[..colon], Some(&reference[colon + 1..]))
        }
        None => (reference, None),
    }
}

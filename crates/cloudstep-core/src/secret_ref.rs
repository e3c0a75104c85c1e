//! Compact secret reference syntax used by `--set-secrets` and friends.
//!
//! Two forms are accepted:
//!
//! ```text
//! my-secret:3                              -> (my-secret, 3)
//! my-secret                                -> (my-secret, latest)
//! projects/p/secrets/my-secret/versions/3  -> (my-secret, 3)
//! projects/p/secrets/my-secret             -> (my-secret, latest)
//! ```
//!
//! Parsing never fails. A reference without a usable name yields an empty
//! [`SecretReference::name`], which callers must skip.

/// Version used when a reference names no version.
pub const LATEST_VERSION: &str = "latest";

const SECRETS_SEGMENT: &str = "/secrets/";
const VERSIONS_SEGMENT: &str = "/versions/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub name: String,
    pub version: String,
}

impl SecretReference {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// A reference is usable only when it names a secret.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

pub fn parse_secret_reference(s: &str) -> SecretReference {
    let s = s.trim();

    if let Some((_, rest)) = s.split_once(SECRETS_SEGMENT) {
        let (name, version) = match rest.split_once(VERSIONS_SEGMENT) {
            Some((name, version)) => (name, version),
            None => (rest.trim_end_matches('/'), ""),
        };
        // A name with further path segments is not a secret id.
        let name = if name.contains('/') { "" } else { name };
        return SecretReference::new(name, or_latest(version));
    }

    match s.split_once(':') {
        Some((name, version)) => SecretReference::new(name, or_latest(version)),
        None => SecretReference::new(s, LATEST_VERSION),
    }
}

fn or_latest(version: &str) -> &str {
    if version.is_empty() {
        LATEST_VERSION
    } else {
        version
    }
}

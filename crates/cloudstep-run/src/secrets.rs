//! Secret-backed env vars and volumes, shared by the create and merge paths.

use crate::model::{Container, EnvVar, Volume, VolumeMount};
use cloudstep_core::{SecretReference, parse_secret_reference};
use std::collections::HashSet;

/// Where a `--*-secrets` entry lands in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SecretTarget {
    Env { name: String },
    Mount { path: String },
}

impl SecretTarget {
    pub(crate) fn from_key(key: &str) -> Self {
        if key.starts_with('/') {
            Self::Mount {
                path: key.to_owned(),
            }
        } else {
            Self::Env {
                name: key.to_owned(),
            }
        }
    }
}

/// Resolve one `KEY=REFERENCE` entry, skipping it when the reference names no secret.
pub(crate) fn resolve(key: &str, reference: &str) -> Option<(SecretTarget, SecretReference)> {
    let secret = parse_secret_reference(reference);
    if !secret.is_valid() {
        tracing::warn!(key, reference, "skipping secret entry without a secret name");
        return None;
    }
    Some((SecretTarget::from_key(key), secret))
}

/// Base name of a mount path, used as the file name inside the mount.
pub(crate) fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

pub(crate) fn volume_pair(path: &str, secret: &SecretReference) -> (Volume, VolumeMount) {
    let volume = Volume::from_secret(secret.name.clone(), secret, file_name(path));
    let mount = VolumeMount::new(secret.name.clone(), path);
    (volume, mount)
}

/// Add a volume + mount pair for `secret` at `path`.
///
/// The volume is named after the secret. An existing secret volume of that
/// name is retargeted in place. The entry is skipped with a warning when
/// `path` is already mounted from another volume, when the secret is already
/// mounted at another path, or when the name belongs to a non-secret volume.
pub(crate) fn push_volume_pair(
    container: &mut Container,
    volumes: &mut Vec<Volume>,
    path: &str,
    secret: &SecretReference,
) {
    let name = secret.name.as_str();
    if let Some(other) = container
        .volume_mounts
        .iter()
        .find(|m| m.mount_path == path && m.name != name)
    {
        tracing::warn!(
            path,
            volume = %other.name,
            secret = name,
            "mount path already used by another volume, skipping secret mount"
        );
        return;
    }
    if let Some(other) = container
        .volume_mounts
        .iter()
        .find(|m| m.name == name && m.mount_path != path)
    {
        tracing::warn!(
            path,
            mounted_at = %other.mount_path,
            secret = name,
            "secret already mounted at another path, skipping secret mount"
        );
        return;
    }

    let (volume, mount) = volume_pair(path, secret);
    match volumes.iter_mut().find(|v| v.name == name) {
        Some(existing) => match existing.secret.as_mut() {
            Some(source) => source.retarget(secret, file_name(path)),
            None => {
                tracing::warn!(
                    volume = name,
                    path,
                    "volume name taken by a non-secret volume, skipping secret mount"
                );
                return;
            }
        },
        None => volumes.push(volume),
    }
    if !container.volume_mounts.iter().any(|m| m.mount_path == path) {
        container.volume_mounts.push(mount);
    }
}

/// Point the secret volume mounted at `path` at `secret`, keeping the
/// volume's name and settings. Adds a new pair when nothing is mounted there.
pub(crate) fn update_mount(
    container: &mut Container,
    volumes: &mut Vec<Volume>,
    path: &str,
    secret: &SecretReference,
) {
    let Some(mounted) = container
        .volume_mounts
        .iter()
        .find(|m| m.mount_path == path)
        .map(|m| m.name.clone())
    else {
        push_volume_pair(container, volumes, path, secret);
        return;
    };
    if container
        .volume_mounts
        .iter()
        .any(|m| m.name == mounted && m.mount_path != path)
    {
        tracing::warn!(
            path,
            volume = %mounted,
            "volume is also mounted at another path, skipping secret update"
        );
        return;
    }
    match volumes
        .iter_mut()
        .find(|v| v.name == mounted)
        .and_then(|v| v.secret.as_mut())
    {
        Some(source) => source.retarget(secret, file_name(path)),
        None => tracing::warn!(
            path,
            volume = %mounted,
            "mount path is not backed by a secret volume, skipping secret update"
        ),
    }
}

/// Retarget a same-named env var in place, or append a new one.
pub(crate) fn upsert_env(container: &mut Container, name: &str, secret: &SecretReference) {
    match container.env.iter_mut().find(|e| e.name == name) {
        Some(existing) => existing.set_secret(secret),
        None => container.env.push(EnvVar::from_secret(name, secret)),
    }
}

/// Append one `KEY=REFERENCE` entry. A same-named env var is replaced, so
/// env names stay unique and rebuilding from the same entries gives the
/// same order.
pub(crate) fn add(container: &mut Container, volumes: &mut Vec<Volume>, key: &str, reference: &str) {
    let Some((target, secret)) = resolve(key, reference) else {
        return;
    };
    match target {
        SecretTarget::Env { name } => {
            container.env.retain(|e| e.name != name);
            container.env.push(EnvVar::from_secret(name, &secret));
        }
        SecretTarget::Mount { path } => push_volume_pair(container, volumes, &path, &secret),
    }
}

/// Drop every secret-sourced env var and every secret volume with its mounts.
/// Literal env vars and non-secret volumes are kept.
pub(crate) fn strip_all(container: &mut Container, volumes: &mut Vec<Volume>) {
    container.env.retain(|e| !e.is_secret_sourced());
    let removed: HashSet<String> = volumes
        .iter()
        .filter(|v| v.is_secret_backed())
        .map(|v| v.name.clone())
        .collect();
    remove_volumes(container, volumes, &removed);
}

/// Remove the entries `key` refers to: secret-sourced env vars whose secret or
/// name matches, and secret volumes matched by name or by mount path.
pub(crate) fn remove_matching(container: &mut Container, volumes: &mut Vec<Volume>, key: &str) {
    container
        .env
        .retain(|e| !(e.is_secret_sourced() && (e.name == key || e.secret_name() == Some(key))));

    let mounted_at: HashSet<&str> = container
        .volume_mounts
        .iter()
        .filter(|m| m.mount_path == key)
        .map(|m| m.name.as_str())
        .collect();
    let removed: HashSet<String> = volumes
        .iter()
        .filter(|v| v.is_secret_backed() && (v.name == key || mounted_at.contains(v.name.as_str())))
        .map(|v| v.name.clone())
        .collect();
    remove_volumes(container, volumes, &removed);
}

fn remove_volumes(container: &mut Container, volumes: &mut Vec<Volume>, names: &HashSet<String>) {
    if names.is_empty() {
        return;
    }
    volumes.retain(|v| !names.contains(&v.name));
    container.volume_mounts.retain(|m| !names.contains(&m.name));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_selects_target() {
        assert_eq!(
            SecretTarget::from_key("DB_PASS"),
            SecretTarget::Env {
                name: "DB_PASS".to_owned()
            }
        );
        assert_eq!(
            SecretTarget::from_key("/etc/secrets/db"),
            SecretTarget::Mount {
                path: "/etc/secrets/db".to_owned()
            }
        );
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("/etc/secrets/db.json"), "db.json");
        assert_eq!(file_name("/etc/secrets/db/"), "db");
        assert_eq!(file_name("/key"), "key");
    }

    #[test]
    fn invalid_reference_is_skipped() {
        assert!(resolve("DB_PASS", ":3").is_none());
        assert!(resolve("DB_PASS", "projects/p/secrets/").is_none());
        assert!(resolve("DB_PASS", "db:3").is_some());
    }

    #[test]
    fn volume_pair_is_named_after_secret() {
        let (volume, mount) = volume_pair("/etc/tls/cert.pem", &SecretReference::new("tls", "4"));

        assert_eq!(volume.name, "tls");
        assert_eq!(mount.name, "tls");
        assert_eq!(mount.mount_path, "/etc/tls/cert.pem");
        let source = volume.secret.unwrap();
        assert_eq!(source.secret_name, "tls");
        assert_eq!(source.items[0].key, "4");
        assert_eq!(source.items[0].path, "cert.pem");
    }

    #[test]
    fn pushing_same_path_again_retargets() {
        let mut container = Container::default();
        let mut volumes = Vec::new();

        push_volume_pair(&mut container, &mut volumes, "/etc/db", &SecretReference::new("db", "1"));
        push_volume_pair(&mut container, &mut volumes, "/etc/db", &SecretReference::new("db", "2"));

        assert_eq!(container.volume_mounts.len(), 1);
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].secret.as_ref().unwrap().items[0].key, "2");
    }

    #[test]
    fn second_path_for_mounted_secret_is_skipped() {
        let mut container = Container::default();
        let mut volumes = Vec::new();

        push_volume_pair(&mut container, &mut volumes, "/a/x", &SecretReference::new("s", "1"));
        push_volume_pair(&mut container, &mut volumes, "/b/y", &SecretReference::new("s", "2"));

        assert_eq!(container.volume_mounts, vec![VolumeMount::new("s", "/a/x")]);
        let source = volumes[0].secret.as_ref().unwrap();
        assert_eq!(source.items[0].key, "1");
        assert_eq!(source.items[0].path, "x");
    }
}

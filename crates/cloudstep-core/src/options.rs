use std::collections::BTreeMap;
use std::fmt;

/// Desired end-state of a single Cloud Run deployment.
///
/// Within the env-var family and within the secret family at most one of
/// set / update+remove / clear is active. The CLI enforces this before the
/// options reach the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Service name
    pub service: String,
    /// Container image reference. Empty leaves the image untouched on update.
    pub image: String,

    /// Replace all literal env vars with exactly this set
    pub env_vars: BTreeMap<String, String>,
    /// Add or update these literal env vars
    pub update_env_vars: BTreeMap<String, String>,
    /// Remove these literal env vars by name
    pub remove_env_vars: Vec<String>,
    /// Remove every literal env var
    pub clear_env_vars: bool,

    /// Replace all secret-backed entries. Keys are env var names, or mount
    /// paths when they start with `/`. Values are secret references.
    pub secrets: BTreeMap<String, String>,
    /// Add or update these secret-backed entries
    pub update_secrets: BTreeMap<String, String>,
    /// Remove secret-backed entries by secret name or key
    pub remove_secrets: Vec<String>,
    /// Remove every secret-backed entry
    pub clear_secrets: bool,

    /// `None` leaves the existing policy alone.
    pub ingress: Option<Ingress>,
    /// `None` leaves the existing policy alone.
    pub allow_unauthenticated: Option<bool>,
    /// `None` leaves the existing policy alone.
    pub default_url: Option<bool>,

    pub vpc: Vpc,
}

impl DeployOptions {
    pub fn new(service: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            image: image.into(),
            ..Self::default()
        }
    }
}

/// Network paths allowed to reach the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ingress {
    #[default]
    All,
    Internal,
    InternalAndCloudLoadBalancing,
}

impl Ingress {
    /// Parse a flag value. Anything unrecognized, including the empty
    /// string, falls back to [`Ingress::All`].
    pub fn from_flag(value: &str) -> Self {
        match value.trim() {
            "internal" => Self::Internal,
            "internal-and-cloud-load-balancing" => Self::InternalAndCloudLoadBalancing,
            "all" => Self::All,
            other => {
                if !other.is_empty() {
                    tracing::warn!(ingress = other, "unrecognized ingress, using 'all'");
                }
                Self::All
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Internal => "internal",
            Self::InternalAndCloudLoadBalancing => "internal-and-cloud-load-balancing",
        }
    }
}

impl fmt::Display for Ingress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serverless VPC access settings. Passed through as-is, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vpc {
    pub connector: Option<String>,
    pub network: Option<String>,
    pub subnetwork: Option<String>,
    pub egress: Option<String>,
}

impl Vpc {
    pub fn is_empty(&self) -> bool {
        self.connector.is_none()
            && self.network.is_none()
            && self.subnetwork.is_none()
            && self.egress.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingress_parses_known_values() {
        assert_eq!(Ingress::from_flag("all"), Ingress::All);
        assert_eq!(Ingress::from_flag("internal"), Ingress::Internal);
        assert_eq!(
            Ingress::from_flag("internal-and-cloud-load-balancing"),
            Ingress::InternalAndCloudLoadBalancing
        );
    }

    #[test]
    fn ingress_defaults_to_all() {
        assert_eq!(Ingress::from_flag(""), Ingress::All);
        assert_eq!(Ingress::from_flag("public"), Ingress::All);
        assert_eq!(Ingress::from_flag("INTERNAL"), Ingress::All);
    }

    #[test]
    fn ingress_display_matches_flag() {
        for ingress in [
            Ingress::All,
            Ingress::Internal,
            Ingress::InternalAndCloudLoadBalancing,
        ] {
            assert_eq!(Ingress::from_flag(&ingress.to_string()), ingress);
        }
    }

    #[test]
    fn vpc_is_empty_until_any_field_is_set() {
        assert!(Vpc::default().is_empty());
        let vpc = Vpc {
            egress: Some("all-traffic".to_owned()),
            ..Vpc::default()
        };
        assert!(!vpc.is_empty());
    }
}

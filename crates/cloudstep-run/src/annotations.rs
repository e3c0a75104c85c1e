use cloudstep_core::{Ingress, Vpc};
use std::collections::BTreeMap;

pub const INGRESS: &str = "run.googleapis.com/ingress";
pub const INVOKER_ACCESS: &str = "run.googleapis.com/invoker-access";
pub const LAUNCH_STAGE: &str = "run.googleapis.com/launch-stage";
pub const DEFAULT_URL_DISABLED: &str = "run.googleapis.com/default-url-disabled";

pub const VPC_CONNECTOR: &str = "run.googleapis.com/vpc-access-connector";
pub const VPC_EGRESS: &str = "run.googleapis.com/vpc-access-egress";
pub const NETWORK_INTERFACES: &str = "run.googleapis.com/network-interfaces";

/// Launch stage required for the default-URL toggle.
pub const BETA: &str = "BETA";

/// Invoker access value for unauthenticated services.
pub const INVOKER_ALL: &str = "all";
/// Invoker access value for services that require authentication.
pub const INVOKER_INTERNAL_AND_LB: &str = "internal-and-cloud-load-balancing";

type Annotations = BTreeMap<String, String>;

pub(crate) fn set_ingress(annotations: &mut Annotations, ingress: Ingress) {
    annotations.insert(INGRESS.to_owned(), ingress.as_str().to_owned());
}

pub(crate) fn set_invoker_access(annotations: &mut Annotations, allow_unauthenticated: bool) {
    let value = if allow_unauthenticated {
        INVOKER_ALL
    } else {
        INVOKER_INTERNAL_AND_LB
    };
    annotations.insert(INVOKER_ACCESS.to_owned(), value.to_owned());
}

pub(crate) fn set_default_url(annotations: &mut Annotations, enabled: bool) {
    if enabled {
        annotations.remove(DEFAULT_URL_DISABLED);
    } else {
        annotations.insert(LAUNCH_STAGE.to_owned(), BETA.to_owned());
        annotations.insert(DEFAULT_URL_DISABLED.to_owned(), "true".to_owned());
    }
}

/// Whether the service has opted out of its `run.app` URL.
pub fn default_url_disabled(annotations: &Annotations) -> bool {
    annotations
        .get(DEFAULT_URL_DISABLED)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Revision-template annotations. Only the settings present are written.
pub(crate) fn set_vpc(annotations: &mut Annotations, vpc: &Vpc) {
    if vpc.is_empty() {
        return;
    }
    if let Some(connector) = &vpc.connector {
        annotations.insert(VPC_CONNECTOR.to_owned(), connector.clone());
    }
    if let Some(egress) = &vpc.egress {
        annotations.insert(VPC_EGRESS.to_owned(), egress.clone());
    }
    if vpc.network.is_some() || vpc.subnetwork.is_some() {
        let mut interface = serde_json::Map::new();
        if let Some(network) = &vpc.network {
            interface.insert("network".to_owned(), network.clone().into());
        }
        if let Some(subnetwork) = &vpc.subnetwork {
            interface.insert("subnetwork".to_owned(), subnetwork.clone().into());
        }
        let interfaces = serde_json::Value::Array(vec![serde_json::Value::Object(interface)]);
        annotations.insert(NETWORK_INTERFACES.to_owned(), interfaces.to_string());
    }
}

use cloudstep_core::{DeployOptions, SecretReference};
use cloudstep_run::model::{EnvVar, Volume, VolumeMount};
use cloudstep_run::{ServiceDefinition, build_new, merge};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn env_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{0,8}"
}

fn value() -> impl Strategy<Value = String> {
    "[a-z0-9]{0,8}"
}

fn secret_ref() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9-]{0,8}",
        "[a-z][a-z0-9-]{0,8}:[1-9]",
        "projects/p/secrets/[a-z][a-z0-9-]{0,8}/versions/[1-9]",
    ]
}

fn secret_key() -> impl Strategy<Value = String> {
    prop_oneof![env_name(), "/etc/[a-z]{1,6}/[a-z]{1,6}"]
}

/// An existing service with a mix of literal and secret env vars plus one
/// secret volume and one plain volume.
fn existing_service() -> impl Strategy<Value = ServiceDefinition> {
    (
        btree_map(env_name(), value(), 0..5),
        btree_map(env_name(), "[a-z]{1,6}", 0..3),
    )
        .prop_map(|(literals, secrets)| {
            let mut svc = ServiceDefinition::new("api", "p");
            let c = svc.container_mut();
            c.image = "gcr.io/p/api:1".to_owned();
            for (name, v) in &literals {
                c.env.push(EnvVar::literal(name, v));
            }
            for (name, secret) in &secrets {
                if !literals.contains_key(name) {
                    c.env
                        .push(EnvVar::from_secret(name, &SecretReference::new(secret, "1")));
                }
            }
            c.volume_mounts.push(VolumeMount::new("tls", "/etc/tls/cert"));
            c.volume_mounts.push(VolumeMount::new("cache", "/cache"));
            svc.spec.template.spec.volumes = vec![
                Volume::from_secret("tls", &SecretReference::new("tls", "latest"), "cert"),
                Volume {
                    name: "cache".to_owned(),
                    ..Volume::default()
                },
            ];
            svc
        })
}

fn env_of(svc: &ServiceDefinition) -> &[EnvVar] {
    &svc.container().unwrap().env
}

proptest! {
    #[test]
    fn clear_env_vars_wins_and_keeps_secrets(
        svc in existing_service(),
        set in btree_map(env_name(), value(), 0..3),
        update in btree_map(env_name(), value(), 0..3),
        remove in vec(env_name(), 0..3),
    ) {
        let options = DeployOptions {
            clear_env_vars: true,
            env_vars: set,
            update_env_vars: update,
            remove_env_vars: remove,
            ..DeployOptions::new("api", "")
        };

        let after = merge(&svc, &options);

        prop_assert!(env_of(&after).iter().all(EnvVar::is_secret_sourced));
        let secrets_before: Vec<&EnvVar> =
            env_of(&svc).iter().filter(|e| e.is_secret_sourced()).collect();
        let secrets_after: Vec<&EnvVar> = env_of(&after).iter().collect();
        prop_assert_eq!(secrets_before, secrets_after);
        prop_assert_eq!(after.volumes(), svc.volumes());
    }

    #[test]
    fn set_secrets_is_idempotent(
        svc in existing_service(),
        secrets in btree_map(secret_key(), secret_ref(), 1..5),
    ) {
        let options = DeployOptions {
            secrets,
            ..DeployOptions::new("api", "gcr.io/p/api:2")
        };

        let once = merge(&svc, &options);
        let twice = merge(&once, &options);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn update_existing_literal_keeps_length(
        svc in existing_service(),
        v in value(),
    ) {
        let Some(target) = env_of(&svc).iter().find(|e| !e.is_secret_sourced()) else {
            return Ok(());
        };
        let name = target.name.clone();
        let options = DeployOptions {
            update_env_vars: BTreeMap::from([(name.clone(), v.clone())]),
            ..DeployOptions::new("api", "")
        };

        let after = merge(&svc, &options);

        prop_assert_eq!(env_of(&after).len(), env_of(&svc).len());
        let updated = env_of(&after).iter().find(|e| e.name == name).unwrap();
        prop_assert_eq!(updated.value.as_deref(), Some(v.as_str()));
    }

    #[test]
    fn removing_absent_env_var_is_a_no_op(svc in existing_service()) {
        let options = DeployOptions {
            remove_env_vars: vec!["DEFINITELY_NOT_SET_".to_owned()],
            ..DeployOptions::new("api", "")
        };

        let after = merge(&svc, &options);

        prop_assert_eq!(after, svc);
    }

    #[test]
    fn env_names_stay_unique(
        svc in existing_service(),
        set in btree_map(env_name(), value(), 0..4),
        secrets in btree_map(secret_key(), secret_ref(), 0..4),
    ) {
        let options = DeployOptions {
            env_vars: set,
            secrets,
            ..DeployOptions::new("api", "")
        };

        let after = merge(&svc, &options);
        let mut names: Vec<&str> = env_of(&after).iter().map(|e| e.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();

        prop_assert_eq!(names.len(), total);
    }

    #[test]
    fn every_mount_has_a_volume(
        secrets in btree_map(secret_key(), secret_ref(), 0..5),
    ) {
        let options = DeployOptions {
            secrets,
            ..DeployOptions::new("api", "img")
        };

        let svc = build_new("p", &options);
        let c = svc.container().unwrap();

        for mount in &c.volume_mounts {
            prop_assert!(svc.volumes().iter().any(|v| v.name == mount.name));
        }
    }
}

#[test]
fn image_only_update_changes_only_the_image() {
    let mut svc = ServiceDefinition::new("api", "p");
    svc.metadata
        .annotations
        .insert("run.googleapis.com/ingress".to_owned(), "internal".to_owned());
    svc.container_mut().image = "X".to_owned();
    svc.container_mut().env.push(EnvVar::literal("A", "1"));

    let after = merge(&svc, &DeployOptions::new("api", "Y"));

    assert_eq!(after.container().unwrap().image, "Y");
    let mut rest = after.clone();
    rest.container_mut().image = "X".to_owned();
    assert_eq!(rest, svc);
}

#[test]
fn image_update_keeps_unmodelled_volume_settings() {
    let fetched: ServiceDefinition = serde_json::from_value(serde_json::json!({
        "apiVersion": "serving.knative.dev/v1",
        "kind": "Service",
        "metadata": {"name": "api", "namespace": "p"},
        "spec": {"template": {"spec": {
            "containers": [{
                "image": "X",
                "env": [{"name": "DB", "valueFrom": {"secretKeyRef": {"name": "db", "key": "1", "optional": true}}}],
                "volumeMounts": [{"name": "v", "mountPath": "/m", "subPath": "sub"}]
            }],
            "volumes": [{"name": "v", "secret": {
                "secretName": "s",
                "defaultMode": 256,
                "items": [{"key": "1", "path": "f", "mode": 292}]
            }}]
        }}}
    }))
    .unwrap();

    let after = merge(&fetched, &DeployOptions::new("api", "Y"));
    let encoded = serde_json::to_value(&after).unwrap();
    let revision = &encoded["spec"]["template"]["spec"];

    assert_eq!(revision["containers"][0]["image"], "Y");
    assert_eq!(revision["containers"][0]["volumeMounts"][0]["subPath"], "sub");
    assert_eq!(
        revision["containers"][0]["env"][0]["valueFrom"]["secretKeyRef"]["optional"],
        true
    );
    assert_eq!(revision["volumes"][0]["secret"]["defaultMode"], 256);
    assert_eq!(revision["volumes"][0]["secret"]["items"][0]["mode"], 292);
}

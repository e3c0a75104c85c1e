use crate::annotations;
use crate::model::{Container, EnvVar, ServiceDefinition, Volume};
use crate::secrets::{self, SecretTarget};
use cloudstep_core::DeployOptions;

/// Merge the desired options into a fetched service, returning the definition
/// to write back.
///
/// Categories are applied independently: image, literal env vars, secrets,
/// then the service-level policy annotations. Within the env and secret
/// categories the first matching rule wins:
///
/// 1. clear
/// 2. set (replace the whole category)
/// 3. remove, then update
///
/// Fields the options do not mention are carried over unchanged.
pub fn merge(existing: &ServiceDefinition, options: &DeployOptions) -> ServiceDefinition {
    let mut service = existing.clone();

    if !options.image.is_empty() {
        service.container_mut().image = options.image.clone();
    }

    merge_env(service.container_mut(), options);

    // container_mut above guarantees containers[0].
    let template = &mut service.spec.template.spec;
    merge_secrets(&mut template.containers[0], &mut template.volumes, options);

    let annotations = &mut service.metadata.annotations;
    if let Some(ingress) = options.ingress {
        annotations::set_ingress(annotations, ingress);
    }
    if let Some(allow) = options.allow_unauthenticated {
        annotations::set_invoker_access(annotations, allow);
    }
    if let Some(enabled) = options.default_url {
        annotations::set_default_url(annotations, enabled);
    }

    annotations::set_vpc(&mut service.spec.template.metadata.annotations, &options.vpc);

    service
}

/// Literal env vars only. Secret-sourced entries belong to the secret category.
fn merge_env(container: &mut Container, options: &DeployOptions) {
    if options.clear_env_vars {
        container.env.retain(EnvVar::is_secret_sourced);
        return;
    }

    if !options.env_vars.is_empty() {
        let mut env: Vec<EnvVar> = options
            .env_vars
            .iter()
            .map(|(name, value)| EnvVar::literal(name, value))
            .collect();
        env.extend(
            container
                .env
                .drain(..)
                .filter(|e| e.is_secret_sourced() && !options.env_vars.contains_key(&e.name)),
        );
        container.env = env;
        return;
    }

    container
        .env
        .retain(|e| e.is_secret_sourced() || !options.remove_env_vars.contains(&e.name));

    for (name, value) in &options.update_env_vars {
        match container.env.iter_mut().find(|e| &e.name == name) {
            Some(existing) => existing.set_literal(value),
            None => container.env.push(EnvVar::literal(name, value)),
        }
    }
}

fn merge_secrets(container: &mut Container, volumes: &mut Vec<Volume>, options: &DeployOptions) {
    if options.clear_secrets {
        secrets::strip_all(container, volumes);
        return;
    }

    if !options.secrets.is_empty() {
        secrets::strip_all(container, volumes);
        for (key, reference) in &options.secrets {
            secrets::add(container, volumes, key, reference);
        }
        return;
    }

    for key in &options.remove_secrets {
        secrets::remove_matching(container, volumes, key);
    }

    for (key, reference) in &options.update_secrets {
        update_secret(container, volumes, key, reference);
    }
}

/// Retarget an existing env var or mount in place, or add a new one.
fn update_secret(container: &mut Container, volumes: &mut Vec<Volume>, key: &str, reference: &str) {
    let Some((target, secret)) = secrets::resolve(key, reference) else {
        return;
    };
    match target {
        SecretTarget::Env { name } => secrets::upsert_env(container, &name, &secret),
        SecretTarget::Mount { path } => secrets::update_mount(container, volumes, &path, &secret),
    }
}

use crate::annotations;
use crate::model::{EnvVar, ServiceDefinition};
use crate::secrets;
use cloudstep_core::DeployOptions;

/// Build a service definition from scratch for a service that does not exist yet.
///
/// Only the replace-style options apply here: `env_vars` and `secrets`. The
/// update, remove and clear options describe changes to an existing service
/// and are ignored.
pub fn build_new(project_id: &str, options: &DeployOptions) -> ServiceDefinition {
    let mut service = ServiceDefinition::new(&options.service, project_id);

    let annotations = &mut service.metadata.annotations;
    annotations::set_ingress(annotations, options.ingress.unwrap_or_default());
    annotations::set_invoker_access(annotations, options.allow_unauthenticated.unwrap_or(false));
    if !options.default_url.unwrap_or(true) {
        annotations::set_default_url(annotations, false);
    }

    annotations::set_vpc(&mut service.spec.template.metadata.annotations, &options.vpc);

    let template = &mut service.spec.template.spec;
    let mut container = crate::model::Container {
        image: options.image.clone(),
        ..Default::default()
    };
    container.env = options
        .env_vars
        .iter()
        .map(|(name, value)| EnvVar::literal(name, value))
        .collect();

    for (key, reference) in &options.secrets {
        secrets::add(&mut container, &mut template.volumes, key, reference);
    }

    template.containers = vec![container];
    service
}

use clap::Args;
use cloudstep_core::{DeployOptions, Ingress, StepConfig, Vpc};
use cloudstep_run::{PollSettings, Reconciler, RunApiClient};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Cloud Run service name
    #[arg(long)]
    service: String,

    /// Container image to deploy
    #[arg(long)]
    image: Option<String>,

    /// GCP project ID (overrides cloudstep.toml)
    #[arg(long, env = "CLOUDSDK_CORE_PROJECT")]
    project: Option<String>,

    /// Cloud Run region (overrides cloudstep.toml)
    #[arg(long, env = "CLOUDSDK_RUN_REGION")]
    region: Option<String>,

    /// Path to a cloudstep.toml (default: ./cloudstep.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Access token to use instead of `gcloud auth print-access-token`
    #[arg(long, env = "CLOUDSDK_AUTH_ACCESS_TOKEN", hide = true, hide_env_values = true)]
    access_token: Option<String>,

    /// Replace all env vars: KEY=VALUE,...
    #[arg(long, value_delimiter = ',', value_parser = parse_key_value,
          conflicts_with_all = ["update_env_vars", "remove_env_vars", "clear_env_vars"])]
    set_env_vars: Vec<(String, String)>,

    /// Add or update env vars: KEY=VALUE,...
    #[arg(long, value_delimiter = ',', value_parser = parse_key_value)]
    update_env_vars: Vec<(String, String)>,

    /// Remove env vars: KEY,...
    #[arg(long, value_delimiter = ',')]
    remove_env_vars: Vec<String>,

    /// Remove all env vars
    #[arg(long, conflicts_with_all = ["update_env_vars", "remove_env_vars"])]
    clear_env_vars: bool,

    /// Replace all secrets: KEY=SECRET[:VERSION],... (KEY starting with / mounts a file)
    #[arg(long, value_delimiter = ',', value_parser = parse_key_value,
          conflicts_with_all = ["update_secrets", "remove_secrets", "clear_secrets"])]
    set_secrets: Vec<(String, String)>,

    /// Add or update secrets: KEY=SECRET[:VERSION],...
    #[arg(long, value_delimiter = ',', value_parser = parse_key_value)]
    update_secrets: Vec<(String, String)>,

    /// Remove secrets by secret name or key
    #[arg(long, value_delimiter = ',')]
    remove_secrets: Vec<String>,

    /// Remove all secrets
    #[arg(long, conflicts_with_all = ["update_secrets", "remove_secrets"])]
    clear_secrets: bool,

    /// all | internal | internal-and-cloud-load-balancing
    #[arg(long)]
    ingress: Option<String>,

    /// Allow unauthenticated invocations
    #[arg(long, overrides_with = "no_allow_unauthenticated")]
    allow_unauthenticated: bool,

    /// Require authenticated invocations
    #[arg(long, overrides_with = "allow_unauthenticated")]
    no_allow_unauthenticated: bool,

    /// Serve the default run.app URL
    #[arg(long, overrides_with = "no_default_url")]
    default_url: bool,

    /// Disable the default run.app URL
    #[arg(long, overrides_with = "default_url")]
    no_default_url: bool,

    /// Return once the service is written, without waiting for readiness
    #[arg(long)]
    no_wait: bool,

    /// Seconds to wait for readiness (overrides cloudstep.toml)
    #[arg(long)]
    timeout: Option<u64>,

    /// Serverless VPC Access connector
    #[arg(long)]
    vpc_connector: Option<String>,

    /// VPC egress setting: all-traffic | private-ranges-only
    #[arg(long)]
    vpc_egress: Option<String>,

    /// VPC network for direct egress
    #[arg(long)]
    network: Option<String>,

    /// VPC subnetwork for direct egress
    #[arg(long)]
    subnet: Option<String>,
}

impl DeployArgs {
    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            service: self.service.clone(),
            image: self.image.clone().unwrap_or_default(),
            env_vars: to_map(&self.set_env_vars),
            update_env_vars: to_map(&self.update_env_vars),
            remove_env_vars: self.remove_env_vars.clone(),
            clear_env_vars: self.clear_env_vars,
            secrets: to_map(&self.set_secrets),
            update_secrets: to_map(&self.update_secrets),
            remove_secrets: self.remove_secrets.clone(),
            clear_secrets: self.clear_secrets,
            ingress: self.ingress.as_deref().map(Ingress::from_flag),
            allow_unauthenticated: flag_pair(
                self.allow_unauthenticated,
                self.no_allow_unauthenticated,
            ),
            default_url: flag_pair(self.default_url, self.no_default_url),
            vpc: Vpc {
                connector: self.vpc_connector.clone(),
                network: self.network.clone(),
                subnetwork: self.subnet.clone(),
                egress: self.vpc_egress.clone(),
            },
        }
    }
}

/// Create or update the service, then wait for it unless `--no-wait`.
pub async fn deploy(args: DeployArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => StepConfig::load_file(path)?,
        None => StepConfig::load(Path::new("."))?,
    };

    let project_id = args
        .project
        .as_deref()
        .or(config.project.gcp_project_id.as_deref())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "GCP project not set: pass --project, set CLOUDSDK_CORE_PROJECT, \
                 or set [project].gcp_project_id in cloudstep.toml"
            )
        })?;
    let region = args.region.as_deref().unwrap_or(&config.project.region);

    let mut client = RunApiClient::new(project_id, region);
    if let Some(endpoint) = &config.run.endpoint {
        client = client.with_endpoint(endpoint);
    }
    if let Some(token) = &args.access_token {
        client = client.with_access_token(token);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let options = args.deploy_options();
    let service = options.service.as_str();
    let reconciler = Reconciler::new(client, project_id).with_cancellation(cancel);

    println!("Deploying '{service}' to Cloud Run ({region})...");
    let deployed = reconciler.create_or_update(&options).await?;
    if deployed.was_created() {
        println!("Created service '{service}'");
    } else {
        println!("Updated service '{service}'");
    }

    if args.no_wait {
        println!("Not waiting for '{service}' to become ready (--no-wait)");
        return Ok(());
    }

    let settings = PollSettings {
        timeout: args
            .timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.run.timeout()),
        interval: config.run.poll_interval(),
    };
    let report = reconciler.poll_until_ready(service, settings).await?;

    println!(
        "Service '{service}' revision '{revision}' is ready and serving {percent}% of traffic",
        revision = report.revision,
        percent = report.traffic_percent,
    );
    match &report.url {
        Some(url) => println!("Service URL: {url}"),
        None => println!("No URL: the default URL is disabled for '{service}'"),
    }

    Ok(())
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("interrupted, cancelling deploy");
            token.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "could not listen for ctrl-c"),
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn to_map(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    pairs.iter().cloned().collect()
}

/// `--flag` / `--no-flag`; neither leaves the setting alone.
fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

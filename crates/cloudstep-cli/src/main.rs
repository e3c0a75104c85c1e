mod commands;

use clap::Parser;
use commands::DeployArgs;

#[derive(Parser)]
#[command(
    name = "cloudrun-deploy",
    about = "Create or update a Cloud Run service and wait until it is ready"
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    deploy: DeployArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::deploy(cli.deploy).await?;

    Ok(())
}

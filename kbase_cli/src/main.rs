mod commands;
mod output;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kbase_lib::client::spawn_cache_sweeper;
use kbase_lib::{AdminResource, CachedTransport, ClientConfig};

use crate::commands::Context;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "kbase")]
#[command(about = "Browse knowledge-base users, files and reports")]
struct Cli {
    /// Output format: table, json, csv or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// API base URL
    #[arg(long, env = "KBASE_API_URL", global = true)]
    api_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "KBASE_API_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all users (admin)
    Users(commands::admin::AdminArgs),
    /// List all uploaded files (admin)
    Files(commands::admin::AdminArgs),
    /// List generated reports (admin)
    Reports(commands::admin::AdminArgs),
    /// Show the signed-in user's profile
    Profile,
    /// List the signed-in user's files
    MyFiles(commands::ListArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("kbase=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        "csv" => OutputFormat::Csv,
        "markdown" | "md" => OutputFormat::Markdown,
        _ => OutputFormat::Table,
    };

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if cli.token.is_some() {
        config.token = cli.token;
    }

    tracing::debug!("using API at {}", config.api_url);
    let transport = Arc::new(CachedTransport::from_config(&config)?);
    let _sweeper = spawn_cache_sweeper(&transport, config.cache_sweep_interval);

    let ctx = Context {
        transport,
        token: config.token.clone(),
        timeout: config.timeout,
        format,
    };

    match &cli.command {
        Commands::Users(args) => commands::admin::run(AdminResource::Users, args, &ctx).await?,
        Commands::Files(args) => commands::admin::run(AdminResource::Files, args, &ctx).await?,
        Commands::Reports(args) => commands::admin::run(AdminResource::Reports, args, &ctx).await?,
        Commands::Profile => commands::user::run_profile(&ctx).await?,
        Commands::MyFiles(args) => commands::user::run_files(args, &ctx).await?,
    }

    Ok(())
}

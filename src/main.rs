mod app;
mod avatar;
mod config;
mod dispatch;
mod error;
mod gemini;
mod input;
mod ledger;
mod models;
mod presenter;
mod utils;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "SEO, content and feature recommendations for your website, powered by Gemini")]
struct Args {
    /// Directory holding .optiflow.yml
    #[arg(short, long, default_value = ".")]
    path: String,
    /// Gemini API base URL
    #[arg(long)]
    api_url: Option<String>,
    /// Gemini API key
    #[arg(long)]
    api_key: Option<String>,
    /// Gemini model name
    #[arg(long)]
    model: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create .optiflow.yml in the project directory
    Init,
    /// Edit configuration interactively
    Config {
        /// Edit the global configuration
        #[arg(short, long)]
        global: bool,
    },
    /// Show the available plans
    Plans,
    /// Run a single analysis without prompts
    Analyze {
        #[arg(long)]
        business_name: String,
        #[arg(long)]
        audience: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        url: Option<String>,
        /// Sample of the current page copy
        #[arg(long)]
        content: Option<String>,
        /// Screenshot to include in the analysis
        #[arg(long)]
        image: Option<PathBuf>,
        /// Write a plain-text report into this directory
        #[arg(long)]
        export: Option<PathBuf>,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = "User")]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let project_path = PathBuf::from(&args.path);
    if !project_path.exists() {
        error!("Path does not exist: {}", project_path.display());
        return Err(anyhow!("Path does not exist: {}", project_path.display()));
    }

    match args.command {
        Some(Commands::Init) => config::init_project(&project_path)?,
        Some(Commands::Config { global }) => {
            config::configure_interactive(&project_path, global).await?;
        }
        Some(Commands::Plans) => app::print_plans(None),
        Some(Commands::Analyze {
            business_name,
            audience,
            description,
            url,
            content,
            image,
            export,
            json,
            name,
            email,
        }) => {
            let config = config::get_effective_config(&project_path)?;
            let client = build_client(&config, args.api_url, args.api_key, args.model)?;
            let draft = input::RequestDraft::new()
                .business_name(business_name)
                .target_audience(audience)
                .description(description)
                .url(url.unwrap_or_default())
                .current_content(content.unwrap_or_default());
            let export_dir = export.or_else(|| config.export_dir.map(PathBuf::from));
            app::run_once(
                &client,
                app::OneShot {
                    name,
                    email,
                    draft,
                    image,
                    export_dir,
                    json,
                },
            )
            .await?;
        }
        None => {
            let config = config::get_effective_config(&project_path)?;
            let client = build_client(&config, args.api_url, args.api_key, args.model)?;
            let export_dir = config
                .export_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| project_path.clone());
            info!("Starting interactive session");
            app::run_interactive(&client, &export_dir).await?;
        }
    }

    Ok(())
}

/// Command-line flags take precedence over the config file.
fn build_client(
    config: &config::Config,
    api_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
) -> Result<gemini::GeminiClient> {
    let api_url = api_url.unwrap_or_else(|| config.api_url.clone());
    let api_key = api_key.unwrap_or_else(|| config.api_key.clone());
    let model = model.unwrap_or_else(|| config.model.clone());
    if api_key.trim().is_empty() {
        return Err(anyhow!(
            "No Gemini API key configured; run `optiflow config`, pass --api-key or set GEMINI_API_KEY"
        ));
    }
    info!("Using model {} at {}", model, api_url);

    Ok(gemini::GeminiClient::new(&api_url, &api_key, &model)
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_retry(
            config.max_attempts,
            Duration::from_millis(utils::RETRY_DELAY_MS),
        ))
}

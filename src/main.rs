use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use cloudburst::alert::{AlertPipeline, should_alert};
use cloudburst::api::AppState;
use cloudburst::{
    AppConfig, Coordinate, LogisticRiskModel, OpenWeatherClient, OverpassClient, PlaceFinder,
    ProbeTarget, RiskClassifier, SafeZoneSearch, SearchParams, SmtpMailer, SqliteUserDirectory,
    UserDirectory, WeatherProbe, logging, web,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/cloudburst/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Poll every registered user and email alerts
    Monitor {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },
    /// Evaluate one location and print the result
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    #[arg(long)]
    city: Option<String>,
}

/// Collaborators shared by every command
struct Services {
    probe: Arc<dyn WeatherProbe>,
    classifier: Arc<dyn RiskClassifier>,
    search: SafeZoneSearch,
    params: SearchParams,
}

impl Services {
    fn build(config: &AppConfig) -> Result<Self> {
        let api_key = config.require_weather_key()?;
        let probe: Arc<dyn WeatherProbe> =
            Arc::new(OpenWeatherClient::new(&config.weather, api_key)?);
        let classifier: Arc<dyn RiskClassifier> = Arc::new(LogisticRiskModel::load(
            config.classifier.model_path.as_deref(),
            config.classifier.decision_threshold,
        )?);
        let places: Arc<dyn PlaceFinder> = Arc::new(OverpassClient::new(&config.places)?);
        let search = SafeZoneSearch::new(probe.clone(), classifier.clone(), places);

        Ok(Self {
            probe,
            classifier,
            search,
            params: SearchParams::from_config(&config.search, &config.places),
        })
    }
}

async fn open_users(config: &AppConfig) -> Result<Arc<dyn UserDirectory>> {
    let directory =
        SqliteUserDirectory::open(&config.database.path, config.database.max_connections)
            .await
            .context("Failed to open user database")?;
    Ok(Arc::new(directory))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Command::Serve { port } => serve(&config, port).await,
        Command::Monitor { once } => monitor(&config, once).await,
        Command::Check(args) => check(&config, args).await,
    }
}

async fn serve(config: &AppConfig, port: Option<u16>) -> Result<()> {
    let services = Services::build(config)?;
    let state = AppState {
        probe: services.probe,
        classifier: services.classifier,
        search: services.search,
        users: open_users(config).await?,
        params: services.params,
    };
    web::run(state, port.unwrap_or(config.server.port), shutdown_signal()).await
}

async fn monitor(config: &AppConfig, once: bool) -> Result<()> {
    let services = Services::build(config)?;
    let mailer = Arc::new(SmtpMailer::new(&config.email)?);
    let pipeline = AlertPipeline::new(
        open_users(config).await?,
        services.probe,
        services.classifier,
        services.search,
        mailer,
        services.params,
        config.alert.poll_interval(),
    );

    if once {
        let report = pipeline.run_once().await?;
        println!(
            "Checked {} users: {} alerts sent, {} failures",
            report.users_checked, report.alerts_sent, report.failures
        );
    } else {
        pipeline.run(shutdown_signal()).await;
    }
    Ok(())
}

async fn check(config: &AppConfig, args: CheckArgs) -> Result<()> {
    let services = Services::build(config)?;
    let target = match (args.lat, args.lon, args.city) {
        (Some(lat), Some(lon), _) => ProbeTarget::Coordinates(Coordinate::new(lat, lon)?),
        (_, _, Some(city)) => ProbeTarget::City(city),
        _ => anyhow::bail!("Provide --lat and --lon, or --city"),
    };

    let weather = services.probe.fetch(&target).await?;
    let assessment = services.classifier.predict(&weather);

    println!("Location: {}", weather.resolved_place_name);
    for line in weather.condition_lines("") {
        println!("{line}");
    }
    if let Some(chance) = assessment.chance_percent() {
        println!("Cloudburst chance: {chance:.1}%");
    }

    if !should_alert(&assessment) {
        println!("No cloudburst risk detected.");
        return Ok(());
    }

    println!("\nCLOUDBURST RISK DETECTED");
    let origin = match target {
        ProbeTarget::Coordinates(c) => Some(c),
        ProbeTarget::City(_) => weather.resolved_coordinate,
    };
    let Some(origin) = origin else {
        println!("No coordinate available to search for safe zones.");
        return Ok(());
    };

    let zones = services.search.find_safe_zones(&origin, &services.params).await;
    println!("{}", cloudburst::alert::message::format_safe_zones(&zones));
    Ok(())
}

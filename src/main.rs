use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use bikecast::{
    AnalyticsReport, BikecastApiClient, Clock, Document, Event, InputEdit, Method,
    PredictionMode, SessionToken, SystemClock, Workflow, config::AppConfig, load_analytics,
    submit_with,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "bikecast")]
#[command(about = "Bike rental demand forecasts and prediction analytics")]
struct Args {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict total bike demand for one day
    Daily(FormArgs),
    /// Predict bike demand for one hour of a day
    Hourly(FormArgs),
    /// Upload a PDF and let the service extract the inputs
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "daily")]
        mode: PredictionMode,
    },
    /// Summarize prediction history
    Analytics,
    /// Show account prediction counters
    Dashboard,
}

/// Form values; anything left out keeps its default.
#[derive(clap::Args, Debug)]
struct FormArgs {
    /// Date to predict (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Weather situation: 1 clear, 2 mist, 3 light rain/snow, 4 heavy rain/snow
    #[arg(long)]
    weather: Option<u8>,
    /// Normalised temperature (0-1)
    #[arg(long)]
    temp: Option<f64>,
    /// Normalised humidity (0-1)
    #[arg(long)]
    humidity: Option<f64>,
    /// Normalised wind speed (0-1)
    #[arg(long)]
    windspeed: Option<f64>,
    #[arg(long)]
    working_day: Option<bool>,
    #[arg(long)]
    holiday: Option<bool>,
    /// Hour of day (0-23), hourly predictions only
    #[arg(long)]
    hour: Option<u8>,
}

impl FormArgs {
    fn edits(&self) -> Vec<InputEdit> {
        [
            self.date.map(InputEdit::Date),
            self.weather.map(InputEdit::WeatherSituation),
            self.temp.map(InputEdit::Temperature),
            self.humidity.map(InputEdit::Humidity),
            self.windspeed.map(InputEdit::Windspeed),
            self.working_day.map(InputEdit::WorkingDay),
            self.holiday.map(InputEdit::Holiday),
            self.hour.map(InputEdit::Hour),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let directive = if args.verbose {
        "bikecast=debug"
    } else {
        "bikecast=info"
    };
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy(directive);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let token = Arc::new(SessionToken::new(config.api.token.clone()));
    if !token.is_present() {
        tracing::warn!("No session token configured, requests are unauthenticated");
    }
    let client = BikecastApiClient::new(config.api.base_url.clone(), &config.network, token)?;
    tracing::debug!("API client initialized for {}", client.base_url());

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    rt.block_on(async {
        match args.command {
            Command::Daily(form) => run_form(Method::Daily, &form, &config, &client).await,
            Command::Hourly(form) => run_form(Method::Hourly, &form, &config, &client).await,
            Command::Upload { file, mode } => run_upload(&file, mode, &config, &client).await,
            Command::Analytics => run_analytics(&client).await,
            Command::Dashboard => run_dashboard(&client).await,
        }
    })
}

fn new_workflow(config: &AppConfig) -> Workflow {
    Workflow::new(SystemClock.today(), config.features.deriver())
}

/// Manual form path: select, fill, submit.
async fn run_form(
    method: Method,
    form: &FormArgs,
    config: &AppConfig,
    client: &BikecastApiClient,
) -> Result<()> {
    let workflow = form
        .edits()
        .into_iter()
        .fold(
            new_workflow(config).update(Event::ChooseMethod(method)),
            |wf, edit| wf.update(Event::Edit(edit)),
        );

    let workflow = submit_with(&workflow, client)
        .await
        .context("Invalid prediction inputs")?;
    print_result(&workflow)
}

/// Document path: select, attach, pick mode, submit.
async fn run_upload(
    file: &Path,
    mode: PredictionMode,
    config: &AppConfig,
    client: &BikecastApiClient,
) -> Result<()> {
    let document = Document::from_path(file)?;
    tracing::info!("{} selected ({:.2} MB)", document.file_name(), document.size_mb());

    let workflow = new_workflow(config)
        .update(Event::ChooseMethod(Method::Document))
        .update(Event::AttachDocument(document))
        .update(Event::ChooseDocumentMode(mode));

    let workflow = submit_with(&workflow, client).await?;
    print_result(&workflow)
}

fn print_result(workflow: &Workflow) -> Result<()> {
    if let Some(err) = workflow.last_error() {
        anyhow::bail!("Prediction failed: {}", err);
    }
    let view = workflow
        .result_view()
        .context("No prediction result received")?;

    println!("{} bikes expected", view.count);
    println!("{}", view.mode_label);
    if let Some(date) = &view.date_label {
        println!("Date: {}", date);
    }
    if let Some(time) = &view.time_label {
        println!("Time: {}", time);
    }
    Ok(())
}

async fn run_analytics(client: &BikecastApiClient) -> Result<()> {
    let report = load_analytics(client)
        .await
        .context("Failed to load analytics data")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &AnalyticsReport) {
    let summary = &report.summary;
    println!("Total predictions: {}", summary.total);
    println!("Daily: {}  Hourly: {}", summary.daily, summary.hourly);
    println!("Average prediction: {}", summary.mean);

    for chart in report.charts() {
        println!();
        println!("{}", chart.kind.title());
        if chart.is_empty() {
            println!("  (no data)");
        }
        for point in &chart.points {
            println!("  {:<12} {:>10.2}", point.label, point.value);
        }
    }
}

async fn run_dashboard(client: &BikecastApiClient) -> Result<()> {
    let stats = client
        .fetch_dashboard_stats()
        .await
        .context("Failed to load statistics")?;

    println!("Total predictions: {}", stats.total_predictions);
    println!(
        "Daily: {}  Hourly: {}",
        stats.daily_predictions, stats.hourly_predictions
    );
    match (stats.last_prediction_value, &stats.last_prediction_type) {
        (Some(value), Some(kind)) => {
            println!("Last prediction: {} ({} {:.0})", stats.last_prediction, kind, value)
        }
        _ => println!("Last prediction: {}", stats.last_prediction),
    }
    Ok(())
}

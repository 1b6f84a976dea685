//! GFS forecast mailer.
//!
//! Single-pass batch run: download a regional GFS GRIB2 subset from NOMADS
//! (skipped when a fresh copy exists), render forecast map PNGs, then
//! optionally zip and e-mail them.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gfs_mailer::config::{self, BoundingBox, ForecastRequest, MailConfig, Resolution};
use gfs_mailer::mail::SmtpMailer;
use gfs_mailer::pipeline::{self, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "gfs-mailer")]
#[command(about = "Fetch GFS forecast data, render map figures, and e-mail them")]
struct Args {
    /// Directory where GRIB2 files are saved
    #[arg(long, default_value = "DATA")]
    data_dir: PathBuf,

    /// Directory for generated figures and the archive
    #[arg(long, default_value = "FIGS")]
    fig_dir: PathBuf,

    /// Model run cycle: 'latest' or YYYYMMDDHH (hour 00/06/12/18)
    #[arg(long, default_value = "latest")]
    cycle: String,

    /// Hours NOMADS lags behind a cycle before its files appear
    #[arg(long, default_value = "4")]
    delay_hours: u32,

    /// Forecast lead time in hours
    #[arg(long, default_value = "24")]
    forecast_hour: u32,

    /// GFS grid resolution
    #[arg(long, value_enum, default_value = "0p25")]
    resolution: Resolution,

    /// Bounding box: west east south north (degrees)
    #[arg(
        long,
        num_args = 4,
        allow_negative_numbers = true,
        value_names = ["WEST", "EAST", "SOUTH", "NORTH"],
        default_values_t = [-80.0, -30.0, -60.0, 5.0]
    )]
    bbox: Vec<f64>,

    /// Skip the download if the local file is newer than this
    #[arg(long, default_value = "6")]
    max_age_hours: u64,

    /// Always download even if fresh data exists
    #[arg(long)]
    force_download: bool,

    /// NOMADS server base URL
    #[arg(long, default_value = config::DEFAULT_NOMADS_URL)]
    nomads_url: String,

    /// Send the figures via e-mail after rendering
    #[arg(long)]
    send_email: bool,

    /// Sender e-mail address
    #[arg(long)]
    sender: Option<String>,

    /// Recipient address list
    #[arg(long, num_args = 1..)]
    recipients: Vec<String>,

    /// E-mail subject
    #[arg(long, default_value = "GFS Forecast")]
    subject: String,

    /// E-mail body text
    #[arg(
        long,
        default_value = "Good morning,\n\nAttached you will find the latest forecast \
                         figure set generated from GFS.\n\nKind regards,"
    )]
    body: String,

    /// SMTP server
    #[arg(long, default_value = "smtp.gmail.com")]
    smtp_server: String,

    /// SMTP port (implicit TLS)
    #[arg(long, default_value = "465")]
    port: u16,

    /// Sender password/token; falls back to the EMAIL_PASSWORD env var
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Filename for the attached zip archive
    #[arg(long, default_value = "Forecast_Figures.zip")]
    zip_name: String,

    /// Delete the archive from disk after a successful send
    #[arg(long)]
    remove_archive: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let bbox = BoundingBox::new(args.bbox[0], args.bbox[1], args.bbox[2], args.bbox[3]);
    bbox.validate()?;

    let cycle = config::parse_cycle(&args.cycle, Utc::now(), args.delay_hours)?;
    let request = ForecastRequest {
        cycle,
        forecast_hour: args.forecast_hour,
        resolution: args.resolution,
        bbox,
        max_age: std::time::Duration::from_secs(args.max_age_hours * 3600),
    };

    info!(
        cycle = %request.cycle,
        forecast_hour = request.forecast_hour,
        resolution = request.resolution.token(),
        "Starting forecast run"
    );

    let options = RunOptions {
        data_dir: args.data_dir,
        fig_dir: args.fig_dir,
        force_download: args.force_download,
        nomads_url: args.nomads_url,
    };

    let mail_setup = if args.send_email {
        let Some(sender) = args.sender else {
            bail!("--sender is required with --send-email");
        };
        if args.recipients.is_empty() {
            bail!("--recipients is required with --send-email");
        }
        let config = MailConfig {
            sender,
            recipients: args.recipients,
            subject: args.subject,
            body: args.body,
            smtp_server: args.smtp_server.clone(),
            port: args.port,
            zip_name: args.zip_name,
            remove_archive: args.remove_archive,
        };
        let mailer = SmtpMailer::new(args.smtp_server, args.port, args.password)?;
        Some((config, mailer))
    } else {
        None
    };

    let outcome = match &mail_setup {
        Some((config, mailer)) => {
            pipeline::run(
                &request,
                &options,
                Some((config, mailer as &dyn gfs_mailer::mail::MailTransport)),
            )
            .await?
        }
        None => pipeline::run(&request, &options, None).await?,
    };

    info!(
        products = outcome.products.len(),
        skipped = outcome.skipped,
        archive = ?outcome.archive,
        "Pipeline finished"
    );

    Ok(())
}

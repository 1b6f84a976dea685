//! Linear orchestration of the three stages: fetch, render, deliver.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::{ForecastRequest, MailConfig};
use crate::fetch::Fetcher;
use crate::grib::GribContents;
use crate::mail::{MailTransport, OutgoingMail};
use crate::package;
use crate::render::{Product, Renderer};

/// Filesystem and fetch options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory for downloaded GRIB2 files.
    pub data_dir: PathBuf,
    /// Directory for rendered figures and the archive.
    pub fig_dir: PathBuf,
    /// Download even when a fresh file exists.
    pub force_download: bool,
    /// NOMADS server base URL; overridable for tests.
    pub nomads_url: String,
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub products: Vec<Product>,
    /// Per-product render errors that were skipped.
    pub skipped: usize,
    /// Path of the delivered archive, when e-mail was requested and kept.
    pub archive: Option<PathBuf>,
}

/// Run the pipeline once: fetch, render all products, and, when mail is
/// configured, zip and deliver them.
///
/// Stages run strictly in sequence; any stage error aborts the run. A
/// per-product render failure is only fatal when no product rendered at all.
pub async fn run(
    request: &ForecastRequest,
    options: &RunOptions,
    mail: Option<(&MailConfig, &dyn MailTransport)>,
) -> Result<RunOutcome> {
    // Stage 1: fetch.
    let fetcher = Fetcher::new(options.data_dir.clone(), options.nomads_url.clone())
        .context("failed to set up fetcher")?;
    let grib_file = fetcher
        .fetch(request, options.force_download)
        .await
        .context("fetch stage failed")?;

    // Stage 2: render.
    let contents =
        GribContents::load(&grib_file.path).context("failed to read downloaded GRIB2 file")?;
    info!(fields = contents.len(), "Loaded GRIB2 fields");

    let renderer = Renderer::new(options.fig_dir.clone());
    let outcome = renderer
        .render_all(&contents, request)
        .context("render stage failed")?;
    for error in &outcome.skipped {
        warn!(error = %error, "Product skipped");
    }
    if outcome.products.is_empty() {
        bail!("no products could be rendered from {}", grib_file.path.display());
    }

    // Stage 3: package and deliver.
    let mut archive = None;
    if let Some((config, transport)) = mail {
        let archive_path = options.fig_dir.join(&config.zip_name);
        package::zip_products(&outcome.products, &archive_path)
            .context("failed to create archive")?;
        let attachment =
            std::fs::read(&archive_path).context("failed to read archive for attachment")?;

        let outgoing = OutgoingMail {
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
            subject: config.subject.clone(),
            body: config.body.clone(),
            attachment_name: config.zip_name.clone(),
            attachment,
        };
        transport
            .send(&outgoing)
            .await
            .context("delivery stage failed")?;

        if config.remove_archive {
            std::fs::remove_file(&archive_path).ok();
        } else {
            archive = Some(archive_path);
        }
    }

    Ok(RunOutcome {
        products: outcome.products,
        skipped: outcome.skipped.len(),
        archive,
    })
}

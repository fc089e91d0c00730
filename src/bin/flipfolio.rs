//! CLI binary for flipfolio.
//!
//! A thin shim over the library crate: maps flags to `ViewerConfig`, wires the
//! storage and extraction endpoints explicitly, and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flipfolio::{
    document_path, encode, scroll_pages, slug_to_title, start_upload, DocumentViewer,
    ExtractionClient, ExtractionStatus, HttpFetcher, PdfiumDecoder, PublicBucketStorage,
    ResourceCache, SignedResourceCache, UploadEvent, ViewMode, ViewerConfig,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &'static str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn counter_bar(prefix: &'static str, len: u64, template: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload a PDF and request extraction
  flipfolio upload "My Portfolio.pdf" --extract

  # Page count, sizes and extraction status
  flipfolio inspect my-portfolio-k3x9q2

  # Paint the flip-view window around page 4
  flipfolio render my-portfolio-k3x9q2 --mode flipbook --page 4 -o out/

  # Paint every page with its overlay, at 150 % zoom
  flipfolio render my-portfolio-k3x9q2 --mode scroll --zoom 1.5 -o out/

  # Title shown for a slug
  flipfolio title portfolio_showcase-cvb44g

ENVIRONMENT VARIABLES:
  FLIPFOLIO_STORAGE_URL   Base URL of the document bucket
  FLIPFOLIO_EXTRACT_URL   Extraction service endpoint
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./ then the system library)
  RUST_LOG                Log filter (overrides -v)
"#;

/// Render, inspect and upload stored PDF folios.
#[derive(Parser, Debug)]
#[command(
    name = "flipfolio",
    version,
    about = "Render, inspect and upload stored PDF folios",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Base URL of the document bucket.
    #[arg(long, global = true, env = "FLIPFOLIO_STORAGE_URL")]
    storage_url: Option<String>,

    /// Extraction service endpoint.
    #[arg(long, global = true, env = "FLIPFOLIO_EXTRACT_URL")]
    extract_url: Option<String>,

    /// Viewport width the views are sized for.
    #[arg(long, global = true, env = "FLIPFOLIO_VIEWPORT_WIDTH", default_value_t = 1280.0)]
    viewport_width: f64,

    /// HTTP timeout in seconds.
    #[arg(long, global = true, env = "FLIPFOLIO_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FLIPFOLIO_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page count, page sizes and extraction status.
    Inspect {
        /// Folio slug or storage path ending in `.pdf`.
        folio: String,
    },
    /// Paint pages to PNG files.
    Render {
        /// Folio slug or storage path ending in `.pdf`.
        folio: String,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "flipbook")]
        mode: ModeArg,

        /// 1-indexed current page (flip view window centre).
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Zoom level (clamped to 0.5–3.0).
        #[arg(long, default_value_t = 1.0)]
        zoom: f64,
    },
    /// Upload a PDF (≤ 20 MiB) under a fresh slug.
    Upload {
        file: PathBuf,

        /// Request extraction once the upload succeeds.
        #[arg(long)]
        extract: bool,
    },
    /// Print the display title for a slug.
    Title { slug: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Flipbook,
    Scroll,
    Dynamic,
}

impl From<ModeArg> for ViewMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Flipbook => ViewMode::Flipbook,
            ModeArg::Scroll => ViewMode::Scroll,
            ModeArg::Dynamic => ViewMode::Dynamic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Title { slug } => {
            println!("{}", slug_to_title(slug));
            Ok(())
        }
        Command::Inspect { folio } => inspect(&cli, folio).await,
        Command::Render {
            folio,
            output,
            mode,
            page,
            zoom,
        } => render(&cli, folio, output, (*mode).into(), *page, *zoom).await,
        Command::Upload { file, extract } => upload(&cli, file, *extract).await,
    }
}

/// Slugs map to `public/<slug>.pdf`; anything ending in `.pdf` is a path.
fn folio_path(folio: &str) -> String {
    if folio.ends_with(".pdf") {
        folio.to_string()
    } else {
        document_path(folio)
    }
}

fn build_config(cli: &Cli) -> Result<ViewerConfig> {
    ViewerConfig::builder()
        .viewport_width(cli.viewport_width)
        .fetch_timeout_secs(cli.timeout)
        .build()
        .context("Invalid configuration")
}

fn storage(cli: &Cli) -> Result<Arc<PublicBucketStorage>> {
    let storage = PublicBucketStorage::from_endpoint(cli.storage_url.as_deref())
        .context("Storage is not configured")?;
    Ok(Arc::new(storage))
}

async fn open_viewer(cli: &Cli, folio: &str) -> Result<DocumentViewer> {
    let config = build_config(cli)?;
    let resources = Arc::new(SignedResourceCache::new(
        storage(cli)?,
        Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?),
        ResourceCache::shared(),
        config.signed_url_expires_in(),
    ));
    let decoder = Arc::new(PdfiumDecoder::new(config.max_rendered_pixels));
    let path = folio_path(folio);

    let mut viewer = DocumentViewer::new(config, resources, decoder, path.clone());

    let bar = spinner("Loading", &path);
    let loaded = viewer.load().await;
    bar.finish_and_clear();
    loaded.with_context(|| format!("Failed to load {path}"))?;

    viewer.load_extraction().await?;
    Ok(viewer)
}

async fn inspect(cli: &Cli, folio: &str) -> Result<()> {
    let viewer = open_viewer(cli, folio).await?;
    let sizes: Vec<_> = (0..viewer.num_pages())
        .filter_map(|i| viewer.native_page_size(i))
        .collect();
    let extraction = viewer.extraction();
    let slug = folio
        .trim_end_matches(".pdf")
        .rsplit('/')
        .next()
        .unwrap_or(folio);

    if cli.json {
        let value = serde_json::json!({
            "path": viewer.document_path(),
            "title": slug_to_title(slug),
            "pages": viewer.num_pages(),
            "pageSizes": sizes,
            "bytes": viewer.document_bytes().map(|h| h.len()),
            "extraction": extraction.map(|e| match e {
                ExtractionStatus::Available(c) => serde_json::json!({
                    "status": "available",
                    "pages": c.page_count(),
                    "createdAt": c.metadata.created_at,
                }),
                ExtractionStatus::NotFound => serde_json::json!({ "status": "notFound" }),
                ExtractionStatus::Failed { reason } =>
                    serde_json::json!({ "status": "failed", "reason": reason }),
            }),
            "modes": viewer.available_modes(),
            "theme": viewer.theme(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise output")?
        );
        return Ok(());
    }

    println!("Title:        {}", slug_to_title(slug));
    println!("Path:         {}", viewer.document_path());
    println!("Pages:        {}", viewer.num_pages());
    if let Some(h) = viewer.document_bytes() {
        println!("Size:         {} bytes", h.len());
    }
    for (i, s) in sizes.iter().enumerate() {
        println!("  page {:>3}   {:.0} × {:.0} pt", i + 1, s.width, s.height);
    }
    match extraction {
        Some(ExtractionStatus::Available(c)) => println!(
            "Extraction:   {} ({} pages, {})",
            green("available"),
            c.page_count(),
            c.metadata.created_at
        ),
        Some(other) => println!(
            "Extraction:   {}",
            dim(&other.notice().unwrap_or_default())
        ),
        None => {}
    }
    let modes: Vec<String> = viewer
        .available_modes()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Modes:        {}", modes.join(", "));
    Ok(())
}

async fn render(
    cli: &Cli,
    folio: &str,
    output: &Path,
    mode: ViewMode,
    page: usize,
    zoom: f64,
) -> Result<()> {
    if page == 0 {
        bail!("Pages are 1-indexed, minimum is 1");
    }
    let mut viewer = open_viewer(cli, folio).await?;
    viewer.set_current(page - 1);
    viewer.set_zoom_level(zoom);
    viewer.set_mode(mode).context("Cannot switch view mode")?;

    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    if mode == ViewMode::Dynamic {
        let reflow = viewer.reflow()?;
        let target = output.join("reflow.json");
        let json = serde_json::to_vec_pretty(&reflow).context("Failed to serialise reflow")?;
        tokio::fs::write(&target, json)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        eprintln!(
            "{} {} blocks  →  {}",
            green("✔"),
            reflow.blocks.len(),
            bold(&target.display().to_string())
        );
        return Ok(());
    }

    let pages = if mode == ViewMode::Flipbook {
        let bar = spinner("Painting", "flip-view window");
        let pages = viewer.paint_flipbook().await;
        bar.finish_and_clear();
        pages?
    } else {
        let bar = counter_bar(
            "Painting",
            viewer.num_pages() as u64,
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        );
        let mut pages = Vec::with_capacity(viewer.num_pages());
        let mut stream = scroll_pages(&viewer)?;
        while let Some(page) = stream.next().await {
            pages.push(page?);
            bar.inc(1);
        }
        bar.finish_and_clear();
        pages
    };

    let mut failed = 0;
    for painted in &pages {
        let n = painted.index + 1;
        match &painted.image {
            Some(img) => {
                let target = output.join(format!("page-{n}.png"));
                encode::write_png(img, &target)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                eprintln!(
                    "  {} Page {:>3}  {}",
                    green("✓"),
                    n,
                    dim(&format!("{:.0} × {:.0}", painted.size.width, painted.size.height))
                );
            }
            None => {
                failed += 1;
                let reason = painted
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                eprintln!("  {} Page {:>3}  {}", red("✗"), n, red(&reason));
            }
        }
        if let Some(overlay) = &painted.overlay {
            let target = output.join(format!("page-{n}.overlay.json"));
            let json =
                serde_json::to_vec_pretty(overlay).context("Failed to serialise overlay")?;
            tokio::fs::write(&target, json)
                .await
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }
    }

    eprintln!(
        "{} {}/{} pages  →  {}",
        if failed == 0 { green("✔") } else { red("⚠") },
        pages.len() - failed,
        pages.len(),
        bold(&output.display().to_string())
    );
    Ok(())
}

async fn upload(cli: &Cli, file: &Path, extract: bool) -> Result<()> {
    let storage = storage(cli)?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Upload path has no file name")?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let total = data.len() as u64;
    let mut task = start_upload(storage.clone(), &file_name, data).context("Upload rejected")?;

    let bar = counter_bar(
        "Uploading",
        total,
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
    );
    let mut stored = None;
    while let Some(event) = task.next_event().await {
        match event {
            UploadEvent::Progress(p) => bar.set_position(p.transferred_bytes),
            UploadEvent::Succeeded { slug, path } => {
                bar.finish_and_clear();
                eprintln!("{} Uploaded {}  →  {}", green("✔"), bold(&slug), path);
                stored = Some((slug, path));
            }
            UploadEvent::Failed { reason } => {
                bar.finish_and_clear();
                bail!("Upload failed: {reason}");
            }
            UploadEvent::Cancelled => {
                bar.finish_and_clear();
                bail!("Upload cancelled");
            }
        }
    }
    let (slug, path) = stored.context("Upload ended without a result")?;

    if extract {
        let endpoint = cli
            .extract_url
            .as_deref()
            .context("--extract needs FLIPFOLIO_EXTRACT_URL or --extract-url")?;
        let config = build_config(cli)?;
        let client = ExtractionClient::new(endpoint, cli.timeout)?;
        let bar = spinner("Extracting", &path);
        let content = client
            .request(storage.as_ref(), &path, config.signed_url_expires_in())
            .await;
        bar.finish_and_clear();
        let content = content.context("Extraction failed")?;
        eprintln!(
            "{} Extracted {} pages",
            green("✔"),
            content.page_count()
        );
    }

    println!("{slug}");
    Ok(())
}

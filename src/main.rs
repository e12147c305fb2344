//! pagesnap command line interface

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use pagesnap::capture::{auto_capture, fixed_capture, PageFormat, PrimaryScreen, SessionError, Ssim};
use pagesnap::config::AppConfig;
use pagesnap::viewer::{AdvanceKey, KeystrokeAdvancer, ViewerSession};

#[derive(Parser)]
#[command(name = "pagesnap")]
#[command(about = "Capture document pages as images by driving the viewer's GUI")]
#[command(version)]
struct Cli {
    /// Document to open in the default viewer
    document: PathBuf,

    /// Configuration file (defaults to ./pagesnap.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to save page images into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Seconds to wait after each page turn for the viewer to render
    #[arg(long)]
    delay: Option<f64>,

    /// Seconds to wait for the viewer to open
    #[arg(long)]
    startup_delay: Option<f64>,

    /// Image format for saved pages
    #[arg(long, value_enum)]
    format: Option<PageFormat>,

    /// Leave the viewer open when done
    #[arg(long)]
    no_close: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a fixed number of pages; you turn the pages yourself
    Shot {
        /// Number of screenshots to take
        #[arg(long)]
        pages: u32,
    },

    /// Capture pages automatically until the document stops advancing
    Auto {
        /// Maximum pages to capture
        #[arg(long)]
        max_pages: Option<u32>,

        /// Similarity threshold for end-of-document detection, in (0, 1]
        #[arg(long)]
        similarity: Option<f64>,

        /// Consecutive similar pages required to confirm the end
        #[arg(long)]
        similar_pages: Option<u32>,

        /// Key used to turn to the next page
        #[arg(long, value_enum)]
        advance_key: Option<AdvanceKey>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pagesnap=debug"
    } else {
        "pagesnap=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run(cli).await {
        Ok(()) => process::exit(0),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    anyhow::ensure!(
        cli.document.exists(),
        "document not found: {}",
        cli.document.display()
    );

    let mut app = AppConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut app, &cli);

    let viewer = ViewerSession::open(&cli.document, &app.viewer).await?;

    info!("Make sure the document is visible and properly positioned");
    info!("Starting capture in 2 seconds...");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut capturer = PrimaryScreen;
    let result = match &cli.command {
        Commands::Shot { pages } => {
            fixed_capture(
                *pages,
                &app.capture.output_dir,
                app.capture.page_delay(),
                app.capture.format,
                &mut capturer,
            )
            .await
        }
        Commands::Auto { .. } => {
            let mut advancer = KeystrokeAdvancer::new(app.viewer.advance_key);
            let scorer = Ssim::default();
            auto_capture(&app.capture, &mut capturer, &mut advancer, &scorer).await
        }
    };

    match result {
        Ok(pages) => {
            info!(
                "Captured {} page image(s) in {}",
                pages.len(),
                app.capture.output_dir.display()
            );
            if app.viewer.close_on_exit {
                info!("Closing viewer...");
                if let Err(err) = viewer.close().await {
                    warn!("Could not close viewer: {:#}", err);
                }
            }
            Ok(())
        }
        Err(err) => {
            // Leave the viewer open so the run can be resumed by hand; the
            // error itself reports how many pages made it to disk
            if let SessionError::Aborted { saved, .. } = &err {
                for path in saved {
                    info!("Kept partial capture: {}", path.display());
                }
            }
            Err(err.into())
        }
    }
}

fn apply_overrides(app: &mut AppConfig, cli: &Cli) {
    if let Some(dir) = &cli.output_dir {
        app.capture.output_dir = dir.clone();
    }
    if let Some(delay) = cli.delay {
        app.capture.page_delay_ms = (delay * 1000.0) as u64;
    }
    if let Some(startup) = cli.startup_delay {
        app.viewer.startup_delay_ms = (startup * 1000.0) as u64;
    }
    if let Some(format) = cli.format {
        app.capture.format = format;
    }
    if cli.no_close {
        app.viewer.close_on_exit = false;
    }

    if let Commands::Auto {
        max_pages,
        similarity,
        similar_pages,
        advance_key,
    } = &cli.command
    {
        if let Some(value) = max_pages {
            app.capture.max_pages = *value;
        }
        if let Some(value) = similarity {
            app.capture.similarity_threshold = *value;
        }
        if let Some(value) = similar_pages {
            app.capture.required_consecutive = *value;
        }
        if let Some(value) = advance_key {
            app.viewer.advance_key = *value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "pagesnap",
            "doc.pdf",
            "--output-dir",
            "shots",
            "--delay",
            "0.5",
            "--no-close",
            "auto",
            "--max-pages",
            "10",
            "--similarity",
            "0.9",
            "--similar-pages",
            "3",
            "--advance-key",
            "right",
        ]);

        let mut app = AppConfig::default();
        apply_overrides(&mut app, &cli);

        assert_eq!(app.capture.output_dir, PathBuf::from("shots"));
        assert_eq!(app.capture.page_delay_ms, 500);
        assert_eq!(app.capture.max_pages, 10);
        assert_eq!(app.capture.similarity_threshold, 0.9);
        assert_eq!(app.capture.required_consecutive, 3);
        assert_eq!(app.viewer.advance_key, AdvanceKey::Right);
        assert!(!app.viewer.close_on_exit);
    }

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let cli = Cli::parse_from(["pagesnap", "doc.pdf", "shot", "--pages", "5"]);

        let mut app = AppConfig::default();
        apply_overrides(&mut app, &cli);

        assert_eq!(app.capture.max_pages, 500);
        assert_eq!(app.capture.page_delay_ms, 2000);
        assert!(app.viewer.close_on_exit);
    }
}

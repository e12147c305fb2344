//! Auto-capture loop with end-of-document detection
//!
//! The loop owns the whole run: it captures a frame, persists it, compares
//! it against the previous capture and stops once a configured number of
//! consecutive near-identical pairs confirms the viewer has run out of
//! pages. The trailing duplicates are deleted so the retained sequence ends
//! at the last page that actually advanced.
//!
//! Everything is strictly sequential; each comparison depends on the
//! previous capture and each page turn must not fire before the current
//! frame is safely on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use screenshots::image::{DynamicImage, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::similarity::{match_dimensions, to_grayscale};
use super::{PageAdvancer, PageFormat, ScreenCapturer, SimilarityScorer};

/// Knobs for one auto-capture run. Defaults mirror the command-line tool's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCaptureConfig {
    /// Upper bound on pages captured when no end is detected
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Directory page images are written into (created on demand)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Wait after each page turn, for the viewer to finish rendering
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Similarity above which two neighboring captures count as "the same
    /// page", in (0, 1]
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Consecutive similar pairs required to confirm the end of the document
    #[serde(default = "default_required_consecutive")]
    pub required_consecutive: u32,
    #[serde(default)]
    pub format: PageFormat,
}

fn default_max_pages() -> u32 {
    500
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("page_images")
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_similarity_threshold() -> f64 {
    0.95
}

fn default_required_consecutive() -> u32 {
    2
}

impl Default for AutoCaptureConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            output_dir: default_output_dir(),
            page_delay_ms: default_page_delay_ms(),
            similarity_threshold: default_similarity_threshold(),
            required_consecutive: default_required_consecutive(),
            format: PageFormat::default(),
        }
    }
}

impl AutoCaptureConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Rejects invalid knobs before the loop starts, so a bad run creates no
    /// partial state.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_pages < 1 {
            return Err(SessionError::Config("max_pages must be at least 1".to_string()));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(SessionError::Config(
                "similarity_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.required_consecutive < 1 {
            return Err(SessionError::Config(
                "required_consecutive must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Capture run errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Rejected before the loop starts; nothing was captured.
    #[error("invalid capture configuration: {0}")]
    Config(String),

    /// Fatal collaborator or filesystem failure mid-run. Pages already
    /// written stay on disk so the run can be resumed by hand.
    #[error("{}: {:#} ({} page(s) already saved)", .context, .cause, .saved.len())]
    Aborted {
        context: String,
        cause: anyhow::Error,
        saved: Vec<PathBuf>,
    },
}

impl SessionError {
    /// Pages that survived a failed run, in index order.
    pub fn saved_pages(&self) -> &[PathBuf] {
        match self {
            SessionError::Config(_) => &[],
            SessionError::Aborted { saved, .. } => saved,
        }
    }
}

fn abort(context: &str, cause: impl Into<anyhow::Error>, saved: &[PathBuf]) -> SessionError {
    SessionError::Aborted {
        context: context.to_string(),
        cause: cause.into(),
        saved: saved.to_vec(),
    }
}

fn page_path(dir: &Path, index: u32, format: PageFormat) -> PathBuf {
    dir.join(format!("page_{:03}.{}", index, format.extension()))
}

fn save_page(frame: &RgbaImage, path: &Path, format: PageFormat) -> Result<()> {
    match format {
        PageFormat::Png => frame.save_with_format(path, format.image_format())?,
        // JPEG has no alpha channel
        PageFormat::Jpeg => DynamicImage::ImageRgba8(frame.clone())
            .into_rgb8()
            .save_with_format(path, format.image_format())?,
    }
    Ok(())
}

/// Capture pages until the document stops advancing, or `max_pages` is hit.
///
/// Returns the retained page files in index order. When the end of the
/// document is detected, the trailing `required_consecutive` captures (the
/// duplicates that triggered the decision) are deleted from disk and dropped
/// from the result. Reaching `max_pages` without a detection is not an
/// error; all captures are kept.
pub async fn auto_capture<C, A, S>(
    config: &AutoCaptureConfig,
    capturer: &mut C,
    advancer: &mut A,
    scorer: &S,
) -> Result<Vec<PathBuf>, SessionError>
where
    C: ScreenCapturer + Send,
    A: PageAdvancer + Send,
    S: SimilarityScorer,
{
    config.validate()?;
    let required = config.required_consecutive.min(config.max_pages);

    fs::create_dir_all(&config.output_dir)
        .map_err(|e| abort("could not create output directory", e, &[]))?;

    info!(
        "Capturing up to {} pages into {}",
        config.max_pages,
        config.output_dir.display()
    );

    let mut saved: Vec<PathBuf> = Vec::new();
    let mut reference: Option<GrayImage> = None;
    let mut similar_run: u32 = 0;
    let mut end_detected = false;

    for index in 1..=config.max_pages {
        let frame = capturer
            .capture()
            .await
            .map_err(|e| abort("screen capture failed", e, &saved))?;

        let path = page_path(&config.output_dir, index, config.format);
        save_page(&frame, &path, config.format)
            .map_err(|e| abort("could not save capture", e, &saved))?;
        info!("Captured page {} -> {}", index, path.display());
        saved.push(path);

        let gray = to_grayscale(&frame);
        drop(frame);

        if let Some(prev) = reference.as_ref() {
            // Only the newer frame is ever rescaled; the previous capture
            // stays the size reference for the pair
            let candidate = match_dimensions(prev, &gray);
            match scorer.score(prev, &candidate) {
                Ok(score) if score > config.similarity_threshold => {
                    similar_run += 1;
                    info!(
                        "Page {} is similar to page {} (score {:.4}, {}/{})",
                        index,
                        index - 1,
                        score,
                        similar_run,
                        required
                    );
                }
                Ok(score) => {
                    debug!("Page {} differs from page {} (score {:.4})", index, index - 1, score);
                    similar_run = 0;
                }
                Err(err) => {
                    // One bad comparison must not lose pages already
                    // captured; treat it as "not similar" and move on
                    warn!("Image comparison failed, treating pages as different: {:#}", err);
                    similar_run = 0;
                }
            }

            if similar_run >= required {
                info!("Detected end of document at page {}", index - required);
                for _ in 0..required {
                    let Some(duplicate) = saved.last().cloned() else {
                        break;
                    };
                    fs::remove_file(&duplicate)
                        .map_err(|e| abort("could not remove duplicate capture", e, &saved))?;
                    debug!("Removed duplicate capture {}", duplicate.display());
                    saved.pop();
                }
                end_detected = true;
            }
        }

        if end_detected {
            break;
        }

        reference = Some(gray);

        if index < config.max_pages {
            advancer
                .advance()
                .await
                .map_err(|e| abort("page advance failed", e, &saved))?;
            tokio::time::sleep(config.page_delay()).await;
        }
    }

    if !end_detected {
        info!(
            "No end of document detected within {} pages; keeping all captures",
            config.max_pages
        );
    }

    Ok(saved)
}

/// Capture a fixed number of pages with a delay between shots.
///
/// No page-advance input is sent; the user is expected to turn pages by hand
/// during the delay.
pub async fn fixed_capture<C>(
    pages: u32,
    output_dir: &Path,
    page_delay: Duration,
    format: PageFormat,
    capturer: &mut C,
) -> Result<Vec<PathBuf>, SessionError>
where
    C: ScreenCapturer + Send,
{
    if pages < 1 {
        return Err(SessionError::Config("pages must be at least 1".to_string()));
    }

    fs::create_dir_all(output_dir)
        .map_err(|e| abort("could not create output directory", e, &[]))?;

    info!("Will capture {} screenshots with {:?} between shots", pages, page_delay);

    let mut saved: Vec<PathBuf> = Vec::new();

    for index in 1..=pages {
        let frame = capturer
            .capture()
            .await
            .map_err(|e| abort("screen capture failed", e, &saved))?;

        let path = page_path(output_dir, index, format);
        save_page(&frame, &path, format)
            .map_err(|e| abort("could not save capture", e, &saved))?;
        info!("Captured page {}/{} -> {}", index, pages, path.display());
        saved.push(path);

        if index < pages {
            info!("Move to the next page; waiting {:?}...", page_delay);
            tokio::time::sleep(page_delay).await;
        }
    }

    Ok(saved)
}

//! Screen capture pipeline
//!
//! The document viewer is driven blind: the loop in [`session`] presses a
//! page-turn key, grabs the whole screen, and compares neighboring frames to
//! notice when the document stops advancing. The three collaborators below
//! are traits so the loop stays deterministic and testable without a GUI.

pub mod screen;
pub mod session;
pub mod similarity;

pub use screen::PrimaryScreen;
pub use session::{auto_capture, fixed_capture, AutoCaptureConfig, SessionError};
pub use similarity::Ssim;

use anyhow::Result;
use async_trait::async_trait;
use screenshots::image::{GrayImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

/// Produces a full-screen frame on demand.
#[async_trait]
pub trait ScreenCapturer {
    async fn capture(&mut self) -> Result<RgbaImage>;
}

/// Sends a "next page" input to the focused viewer.
///
/// Fire-and-forget: nothing acknowledges render completion, so the caller's
/// inter-page delay is the only synchronization mechanism.
#[async_trait]
pub trait PageAdvancer {
    async fn advance(&mut self) -> Result<()>;
}

/// Scores how alike two equal-dimension grayscale images are, in `[0, 1]`
/// with 1 meaning identical.
pub trait SimilarityScorer {
    fn score(&self, reference: &GrayImage, candidate: &GrayImage) -> Result<f64>;
}

/// On-disk format for saved page images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    Png,
    Jpeg,
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::Png
    }
}

impl PageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PageFormat::Png => "png",
            PageFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            PageFormat::Png => ImageFormat::Png,
            PageFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

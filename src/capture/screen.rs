//! Screen capture functionality using screenshots crate
//!
//! Full primary screen only: the viewer is expected to run maximized, so
//! there is no region parameter to get wrong.

use anyhow::Result;
use async_trait::async_trait;
use screenshots::image::RgbaImage;
use screenshots::Screen;

use super::ScreenCapturer;

/// Helper: Get the primary screen
fn get_primary_screen() -> Result<Screen> {
    let screens = Screen::all()?;
    screens
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No screens found"))
}

fn capture_primary_monitor() -> Result<RgbaImage> {
    let primary = get_primary_screen()?;
    let image = primary.capture()?;
    Ok(image)
}

/// [`ScreenCapturer`] backed by the primary monitor.
pub struct PrimaryScreen;

#[async_trait]
impl ScreenCapturer for PrimaryScreen {
    async fn capture(&mut self) -> Result<RgbaImage> {
        // The backend call blocks; keep it off the async thread
        tokio::task::spawn_blocking(capture_primary_monitor).await?
    }
}

//! External viewer lifecycle
//!
//! The viewer is an opaque GUI application: we can launch it with the
//! platform opener, nudge it with keystrokes, and kill it. Nothing here can
//! observe render state, so everything is timed with configured delays.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::capture::PageAdvancer;
use crate::input::{self, Key};

/// Which key turns the document to the next page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AdvanceKey {
    Space,
    Right,
    Down,
    PageDown,
    Enter,
}

impl Default for AdvanceKey {
    fn default() -> Self {
        AdvanceKey::Space
    }
}

impl From<AdvanceKey> for Key {
    fn from(key: AdvanceKey) -> Self {
        match key {
            AdvanceKey::Space => Key::Space,
            AdvanceKey::Right => Key::Right,
            AdvanceKey::Down => Key::Down,
            AdvanceKey::PageDown => Key::PageDown,
            AdvanceKey::Enter => Key::Return,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Wait for the viewer to start and render the first page
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Ask the viewer for fullscreen (F11) after focusing it
    #[serde(default = "default_true")]
    pub fullscreen: bool,
    /// Close the viewer once capture finishes successfully
    #[serde(default = "default_true")]
    pub close_on_exit: bool,
    #[serde(default)]
    pub advance_key: AdvanceKey,
}

fn default_startup_delay_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            fullscreen: true,
            close_on_exit: true,
            advance_key: AdvanceKey::default(),
        }
    }
}

/// [`PageAdvancer`] that injects the configured page-turn key into whatever
/// window holds focus. Fire-and-forget; the capture loop's delay is the only
/// synchronization with the viewer's rendering.
pub struct KeystrokeAdvancer {
    key: Key,
}

impl KeystrokeAdvancer {
    pub fn new(key: AdvanceKey) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl PageAdvancer for KeystrokeAdvancer {
    async fn advance(&mut self) -> Result<()> {
        input::press_key(self.key).await?;
        Ok(())
    }
}

/// Handle on the externally launched viewer process.
pub struct ViewerSession {
    child: Option<Child>,
}

impl ViewerSession {
    /// Open `document` with the platform's default application, wait for it
    /// to come up and try to bring it into focus.
    pub async fn open(document: &Path, config: &ViewerConfig) -> Result<Self> {
        let document = document
            .canonicalize()
            .with_context(|| format!("document not found: {}", document.display()))?;
        info!("Opening document: {}", document.display());

        let child = spawn_opener(&document)?;

        info!(
            "Waiting {} ms for the viewer to load...",
            config.startup_delay_ms
        );
        tokio::time::sleep(Duration::from_millis(config.startup_delay_ms)).await;

        let session = Self { child };
        // Focus is best effort; a viewer that grabbed focus on its own still
        // works fine
        if let Err(err) = session.focus(config).await {
            warn!("Could not focus viewer window: {:#}", err);
        }

        Ok(session)
    }

    /// Alt-Tab to the freshly opened window, then request fullscreen so the
    /// whole screen is document.
    async fn focus(&self, config: &ViewerConfig) -> Result<()> {
        input::press_combo(&[Key::Alt, Key::Tab]).await?;
        tokio::time::sleep(Duration::from_millis(500)).await;

        if config.fullscreen {
            input::press_key(Key::F11).await?;
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }

        Ok(())
    }

    /// Close the viewer: keyboard close first, then terminate the child if
    /// we still hold a handle.
    pub async fn close(mut self) -> Result<()> {
        #[cfg(target_os = "macos")]
        input::press_combo(&[Key::Command, Key::Q]).await?;

        #[cfg(not(target_os = "macos"))]
        input::press_combo(&[Key::Alt, Key::F4]).await?;

        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill().await {
                warn!("Could not terminate viewer process: {}", err);
            }
        }

        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn spawn_opener(document: &Path) -> Result<Option<Child>> {
    // `start` with an empty title detaches, so the handle is short-lived
    let child = Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(document)
        .spawn()
        .context("failed to launch viewer")?;
    Ok(Some(child))
}

#[cfg(target_os = "macos")]
fn spawn_opener(document: &Path) -> Result<Option<Child>> {
    let child = Command::new("open")
        .arg(document)
        .spawn()
        .context("failed to launch viewer")?;
    Ok(Some(child))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn spawn_opener(document: &Path) -> Result<Option<Child>> {
    let opener = which::which("xdg-open")
        .or_else(|_| which::which("gio"))
        .context("no document opener found (tried xdg-open, gio)")?;

    let mut command = Command::new(&opener);
    if opener.file_name().is_some_and(|name| name == "gio") {
        command.arg("open");
    }
    let child = command
        .arg(document)
        .spawn()
        .context("failed to launch viewer")?;
    Ok(Some(child))
}

#[cfg(not(any(unix, target_os = "windows")))]
fn spawn_opener(_document: &Path) -> Result<Option<Child>> {
    anyhow::bail!("no document opener available on this platform")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_key_maps_to_input_key() {
        assert_eq!(Key::from(AdvanceKey::Space), Key::Space);
        assert_eq!(Key::from(AdvanceKey::PageDown), Key::PageDown);
        assert_eq!(Key::from(AdvanceKey::Enter), Key::Return);
    }

    #[test]
    fn test_viewer_config_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.startup_delay_ms, 5000);
        assert!(config.fullscreen);
        assert!(config.close_on_exit);
        assert_eq!(config.advance_key, AdvanceKey::Space);
    }
}

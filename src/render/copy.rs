use super::RenderedDocument;
use async_trait::async_trait;
use displaydoc::Display;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// How long the copy button shows its result
pub const COPY_FEEDBACK: Duration = Duration::from_millis(1500);

/// Error when writing to the clipboard
#[derive(Debug, Error, Display)]
pub enum ClipboardError {
    /// No clipboard available
    Unavailable,
    /// Clipboard write failed: {0}
    Write(String),
}

/// The system clipboard
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// What the copy button currently shows
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Indicator {
    Idle,
    Copied,
    Failed,
}

impl Indicator {
    pub fn as_str(self) -> &'static str {
        match self {
            Indicator::Idle => "idle",
            Indicator::Copied => "copied",
            Indicator::Failed => "failed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Indicator::Idle => "Copy",
            Indicator::Copied => "Copied!",
            Indicator::Failed => "Copy failed",
        }
    }
}

/// The copy button of one code block
#[derive(Debug, Clone, Default)]
pub struct CopyControl {
    shown: Option<(Indicator, Instant)>,
}

impl CopyControl {
    fn show(&mut self, indicator: Indicator, now: Instant) {
        self.shown = Some((indicator, now));
    }

    /// The indicator at `now`; results revert to idle after [`COPY_FEEDBACK`]
    pub fn indicator(&self, now: Instant) -> Indicator {
        match self.shown {
            Some((indicator, since)) if now.saturating_duration_since(since) < COPY_FEEDBACK => {
                indicator
            }
            _ => Indicator::Idle,
        }
    }
}

impl RenderedDocument {
    /// Give every code block without one a copy button.
    ///
    /// Blocks that already have a button are skipped, so calling this again
    /// attaches nothing. Returns the number of attached buttons.
    pub fn attach_copy_controls(&mut self) -> usize {
        let mut attached = 0;
        for block in self.code_blocks.iter_mut().filter(|b| b.control.is_none()) {
            block.control = Some(CopyControl::default());
            attached += 1;
        }
        attached
    }

    /// Click the copy button of code block `index`.
    ///
    /// Returns the indicator shown afterwards, or `None` if that block has
    /// no button. A failing clipboard only shows [`Indicator::Failed`].
    pub async fn copy(
        &mut self,
        index: usize,
        clipboard: &dyn Clipboard,
        now: Instant,
    ) -> Option<Indicator> {
        let block = self.code_blocks.get_mut(index)?;
        let control = block.control.as_mut()?;
        let indicator = match clipboard.write_text(&block.text).await {
            Ok(()) => Indicator::Copied,
            Err(e) => {
                warn!("Failed to copy code block {}: {}", index, e);
                Indicator::Failed
            }
        };
        control.show(indicator, now);
        Some(indicator)
    }
}

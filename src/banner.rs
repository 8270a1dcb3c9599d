//! Rotating tips banner.
//!
//! Independent of the studio except for [`Banner::request_key_selection`],
//! which shares the studio's key-selection entry point.

use crate::error::Result;
use crate::studio::Studio;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tips shown in rotation.
pub const TIPS: [&str; 4] = [
    "Tip: Upload a PNG with a transparent background for the cleanest results.",
    "Tip: Click a suggestion to drop it into the prompt and refine it automatically.",
    "Tip: Use Refine to turn a casual idea into a detailed edit prompt.",
    "Tip: Describe expressions and gestures precisely, e.g. \"winking, thumbs up\".",
];

/// Time between tip changes.
pub const ROTATION_INTERVAL: Duration = Duration::from_secs(4);

/// How long a tip stays faded out before the next one appears.
pub const FADE_DURATION: Duration = Duration::from_millis(500);

/// Shortest accepted rotation interval.
pub const MIN_ROTATION_INTERVAL: Duration = Duration::from_millis(1);

/// What the banner shows at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BannerFrame {
    /// Position in [`TIPS`].
    pub index: usize,
    /// Tip text.
    pub tip: &'static str,
    /// True while the tip is faded out between rotations.
    pub faded: bool,
    /// True once the banner has been dismissed.
    pub dismissed: bool,
}

/// The banner widget.
#[derive(Debug, Clone)]
pub struct Banner {
    index: usize,
    dismissed: bool,
    rotation_interval: Duration,
    fade_duration: Duration,
}

impl Default for Banner {
    fn default() -> Self {
        Self {
            index: 0,
            dismissed: false,
            rotation_interval: ROTATION_INTERVAL,
            fade_duration: FADE_DURATION,
        }
    }
}

impl Banner {
    /// Creates a banner showing the first tip.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time between tip changes, at least [`MIN_ROTATION_INTERVAL`].
    pub fn rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval.max(MIN_ROTATION_INTERVAL);
        self
    }

    /// Sets the fade gap. Clamped below the rotation interval when run.
    pub fn fade_duration(mut self, fade: Duration) -> Self {
        self.fade_duration = fade;
        self
    }

    /// The tip currently shown.
    pub fn current_tip(&self) -> &'static str {
        TIPS[self.index]
    }

    /// Index of the tip currently shown.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the banner has been dismissed.
    pub fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    /// Moves to the next tip, wrapping around.
    pub fn advance(&mut self) -> &'static str {
        self.index = (self.index + 1) % TIPS.len();
        self.current_tip()
    }

    /// Hides the banner for the rest of the session.
    pub fn dismiss(&mut self) {
        self.dismissed = true;
    }

    /// Returns the frame for the current tip.
    pub fn frame(&self, faded: bool) -> BannerFrame {
        BannerFrame {
            index: self.index,
            tip: self.current_tip(),
            faded,
            dismissed: self.dismissed,
        }
    }

    /// Opens the key-selection flow through the studio.
    pub async fn request_key_selection(&self, studio: &Studio) -> Result<bool> {
        studio.select_api_key().await
    }

    /// Starts rotating on the current runtime.
    pub fn spawn(self) -> BannerHandle {
        let (frame_tx, frame_rx) = watch::channel(self.frame(false));
        let (dismiss_tx, dismiss_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(frame_tx, dismiss_rx));
        BannerHandle {
            frames: frame_rx,
            dismiss: dismiss_tx,
            task,
        }
    }

    async fn run(mut self, frames: watch::Sender<BannerFrame>, mut dismiss: watch::Receiver<bool>) {
        let fade = self.fade_duration.min(self.rotation_interval / 2);
        let mut ticker = tokio::time::interval(self.rotation_interval);
        ticker.tick().await;

        while !self.dismissed {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = dismiss.changed() => break,
            }
            frames.send_replace(self.frame(true));

            tokio::select! {
                _ = tokio::time::sleep(fade) => {}
                _ = dismiss.changed() => break,
            }
            self.advance();
            tracing::trace!(index = self.index, "banner rotated");
            frames.send_replace(self.frame(false));
        }

        self.dismiss();
        frames.send_replace(self.frame(false));
    }
}

/// A running banner.
pub struct BannerHandle {
    frames: watch::Receiver<BannerFrame>,
    dismiss: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BannerHandle {
    /// The frame shown right now.
    pub fn current(&self) -> BannerFrame {
        *self.frames.borrow()
    }

    /// A receiver that is notified on every frame change.
    pub fn subscribe(&self) -> watch::Receiver<BannerFrame> {
        self.frames.clone()
    }

    /// Dismisses the banner and waits for rotation to stop.
    pub async fn dismiss(self) -> BannerFrame {
        self.dismiss.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "banner task ended abnormally");
        }
        let frame = *self.frames.borrow();
        frame
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

/// How often the coordinating loop advances the frame counter.
pub const FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Tick counter advanced by the coordinating loop every [`FRAME_PERIOD`] and
/// once per handled event.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter(Arc<AtomicU64>);

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// `[HH:mm:ss.fff] ` prefix, formatted at most once per frame.
#[derive(Debug, Default)]
pub(crate) struct TimestampCache {
    frame: Option<u64>,
    cached: String,
}

impl TimestampCache {
    pub(crate) fn get(&mut self, frame: u64) -> &str {
        if self.frame != Some(frame) {
            self.cached = Local::now().format("[%H:%M:%S%.3f] ").to_string();
            self.frame = Some(frame);
        }
        &self.cached
    }
}

//! Log event delivery: the in-process broadcaster and the `tracing` bridge.

mod broadcaster;
mod capture;

pub use broadcaster::{LogBroadcaster, LogHandler, LogSource, Subscription};
pub use capture::LogCaptureLayer;

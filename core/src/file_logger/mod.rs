mod timestamp;
mod writer;

pub use timestamp::{FrameCounter, FRAME_PERIOD};
pub use writer::{start_file_logger, FileLogger};

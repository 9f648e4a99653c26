use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::FileLoggerConfig;
use crate::error::ReporterError;
use crate::log_event::{LogEvent, Severity};

use super::timestamp::{FrameCounter, TimestampCache};

/// Appends every observed log line to a file, independent of classification.
///
/// Lines go through an unbounded channel to a writer task that owns the file,
/// so `log` never blocks the delivering thread and never loses a line while
/// the logger is open. After `release` further lines are dropped silently.
pub struct FileLogger {
    path: PathBuf,
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    filter: Severity,
    timestamp: Option<Mutex<TimestampCache>>,
    frames: FrameCounter,
}

impl FileLogger {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Callable from any thread.
    pub fn log(&self, event: &LogEvent) {
        if !event.severity.passes(self.filter) {
            return;
        }

        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return;
        };

        let mut line = match &self.timestamp {
            Some(cache) => {
                let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                cache.get(self.frames.frame()).to_string()
            }
            None => String::new(),
        };
        line.push_str(&event.message);

        // Fails only once the writer task has stopped on an I/O error.
        let _ = tx.send(line);
    }

    /// Closes the channel, waits for the writer to drain and flush the file.
    pub async fn release(&self) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(tx);

        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = writer {
            if handle.await.is_err() {
                tracing::warn!(target: "autopilot.file_logger", "file logger writer task aborted");
            }
        }
    }
}

/// Opens (truncating) the log file and starts the writer task.
///
/// Returns `Ok(None)` when the logger is disabled or no path is configured.
pub async fn start_file_logger(
    cfg: &FileLoggerConfig,
    path: Option<PathBuf>,
    frames: FrameCounter,
) -> Result<Option<FileLogger>, ReporterError> {
    if !cfg.enabled {
        return Ok(None);
    }
    let Some(path) = path else {
        tracing::warn!(
            target: "autopilot.file_logger",
            "file logger output path is not set"
        );
        return Ok(None);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ReporterError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .await
        .map_err(|source| ReporterError::Io {
            path: path.display().to_string(),
            source,
        })?;

    tracing::info!(
        target: "autopilot.file_logger",
        path = %path.display(),
        "file logger started"
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let display_path = path.display().to_string();

    let handle = tokio::spawn(async move {
        let mut writer = tokio::io::BufWriter::new(file);
        let mut write_count = 0usize;
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                tracing::error!(
                    target: "autopilot.file_logger",
                    path = %display_path,
                    error = %e,
                    "failed to write log file, writer task exiting"
                );
                return;
            }
            write_count += 1;
            if write_count % 10 == 0 && writer.flush().await.is_err() {
                tracing::error!(
                    target: "autopilot.file_logger",
                    path = %display_path,
                    "failed to flush log file"
                );
                return;
            }
        }
        let _ = writer.flush().await;
    });

    Ok(Some(FileLogger {
        path,
        tx: Mutex::new(Some(tx)),
        writer: Mutex::new(Some(handle)),
        filter: cfg.filter_log_type,
        timestamp: cfg.timestamp.then(|| Mutex::new(TimestampCache::default())),
        frames,
    }))
}

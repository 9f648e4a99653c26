use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use autopilot_core::config::resolve_output_path;
use autopilot_core::error::ReporterError;
use autopilot_core::reporter::{ReportInput, Reporter};

use super::render::{render_report, TestCaseResult};

/// Writes the run outcome as a JUnit XML file.
pub struct JUnitXmlReporter {
    name: String,
    output_path: String,
}

impl JUnitXmlReporter {
    /// Relative paths resolve against the run's `output_root_path`.
    pub fn new(output_path: impl Into<String>) -> Self {
        Self {
            name: "junit".to_string(),
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }
}

#[async_trait]
impl Reporter for JUnitXmlReporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post_report(&self, input: &ReportInput) -> Result<(), ReporterError> {
        let Some(path) =
            resolve_output_path(&input.run.settings.output_root_path, &self.output_path, None)
        else {
            tracing::warn!(target: "autopilot.junit", "JUnit XML reporter output path is not set");
            return Ok(());
        };

        let case = TestCaseResult {
            name: input.run.name.clone(),
            time: input.run.elapsed,
            message: input.message.clone(),
            stack_trace: input.stack_trace.clone(),
            exit: input.exit_code.into(),
        };
        let bytes = render_report(&case, input.run.started_at)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .map_err(|e| ReporterError::Transport(e.into()))??;

        tracing::info!(
            target: "autopilot.junit",
            path = %path.display(),
            exit_code = %input.exit_code,
            "JUnit XML report written"
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReporterError> {
    let io_err = |source: std::io::Error, at: PathBuf| ReporterError::Io {
        path: at.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(e, parent.to_path_buf()))?;
    }

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(bytes))
        .map_err(|e| {
            let source = match e {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
            };
            io_err(source, path.to_path_buf())
        })
}

use std::process::Stdio;

use autopilot_core::log_event::{LogEvent, Severity};
use autopilot_core::log_source::LogBroadcaster;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn default_severity(self) -> Severity {
        match self {
            Stream::Stdout => Severity::Info,
            Stream::Stderr => Severity::Error,
        }
    }
}

/// A line is either a JSON `LogEvent` or plain text whose severity comes from the stream.
pub fn parse_line(line: &str, stream: Stream) -> LogEvent {
    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(event) = serde_json::from_str::<LogEvent>(trimmed) {
            return event;
        }
    }
    LogEvent::new(line, "", stream.default_severity())
}

/// The launched program with its output pumps.
pub struct WatchedProcess {
    pub child: Child,
    pumps: Vec<JoinHandle<()>>,
}

impl WatchedProcess {
    /// Waits for both output streams to reach EOF.
    pub async fn drain_output(&mut self) {
        for pump in self.pumps.iter_mut() {
            let _ = pump.await;
        }
        self.pumps.clear();
    }

    /// Stops reading output; a descendant may still hold the pipes open.
    pub fn abort_output(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
    }
}

pub fn spawn_watched(
    program: &[String],
    source: LogBroadcaster,
    echo: bool,
) -> std::io::Result<WatchedProcess> {
    let Some((bin, args)) = program.split_first() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no program given",
        ));
    };

    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(pump(stdout, Stream::Stdout, source.clone(), echo));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(pump(stderr, Stream::Stderr, source, echo));
    }

    tracing::info!(target: "autopilot.cli", program = %bin, pid = ?child.id(), "program launched");
    Ok(WatchedProcess { child, pumps })
}

fn pump<R>(reader: R, stream: Stream, source: LogBroadcaster, echo: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if echo {
                        echo_line(&line, stream).await;
                    }
                    source.publish(&parse_line(&line, stream));
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(target: "autopilot.cli", stream = ?stream, error = %e, "output stream closed");
                    break;
                }
            }
        }
    })
}

async fn echo_line(line: &str, stream: Stream) {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    let _ = match stream {
        Stream::Stdout => tokio::io::stdout().write_all(&buf).await,
        Stream::Stderr => tokio::io::stderr().write_all(&buf).await,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_carry_their_own_severity() {
        let ev = parse_line(
            r#"{"message":"boom","stack_trace":"at A.B()","severity":"exception"}"#,
            Stream::Stdout,
        );
        assert_eq!(ev, LogEvent::new("boom", "at A.B()", Severity::Exception));
    }

    #[test]
    fn plain_lines_take_stream_severity() {
        assert_eq!(parse_line("hello", Stream::Stdout).severity, Severity::Info);
        assert_eq!(parse_line("oops", Stream::Stderr).severity, Severity::Error);
        // Not a LogEvent: kept verbatim.
        let ev = parse_line(r#"{"level":"x"}"#, Stream::Stdout);
        assert_eq!(ev.message, r#"{"level":"x"}"#);
        assert_eq!(ev.severity, Severity::Info);
    }
}

//! JUnit XML rendering and parsing for a single-test-case run report.

use std::fmt;
use std::time::Duration;

use autopilot_core::error::ReporterError;
use autopilot_core::run::ExitCode;
use chrono::{DateTime, Local};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";

pub const SUITE_NAME: &str = "autopilot";
pub const CLASS_NAME: &str = "autopilot.Autopilot";

/// Exit code as seen by the renderer. Codes outside the known set still
/// produce a valid document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedExit {
    Known(ExitCode),
    Unknown(i32),
}

impl ReportedExit {
    pub fn from_code(code: i32) -> Self {
        ExitCode::from_code(code).map_or(ReportedExit::Unknown(code), ReportedExit::Known)
    }
}

impl From<ExitCode> for ReportedExit {
    fn from(code: ExitCode) -> Self {
        ReportedExit::Known(code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Passed,
    Error,
    Failure,
}

impl OutcomeKind {
    fn tag(self) -> Option<&'static str> {
        match self {
            OutcomeKind::Passed => None,
            OutcomeKind::Error => Some(ERROR_TAG),
            OutcomeKind::Failure => Some(FAILURE_TAG),
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutcomeKind::Passed => "passed",
            OutcomeKind::Error => "error",
            OutcomeKind::Failure => "failure",
        })
    }
}

/// Outcome category and the `type` attribute of the child element.
pub fn outcome_for(exit: ReportedExit) -> (OutcomeKind, String) {
    match exit {
        ReportedExit::Known(ExitCode::Normally) => (OutcomeKind::Passed, String::new()),
        ReportedExit::Known(
            code @ (ExitCode::UnCatchExceptions
            | ExitCode::DetectErrorsInLog
            | ExitCode::AutopilotLaunchingFailed),
        ) => (OutcomeKind::Error, code.name().to_string()),
        ReportedExit::Known(
            code @ (ExitCode::AutopilotFailed | ExitCode::AutopilotLifespanExpired),
        ) => (OutcomeKind::Failure, code.name().to_string()),
        ReportedExit::Unknown(code) => (OutcomeKind::Failure, code.to_string()),
    }
}

/// The run, modeled as one test case.
#[derive(Debug, Clone)]
pub struct TestCaseResult {
    pub name: String,
    pub time: Duration,
    pub message: String,
    pub stack_trace: String,
    pub exit: ReportedExit,
}

impl TestCaseResult {
    pub fn outcome(&self) -> OutcomeKind {
        outcome_for(self.exit).0
    }
}

fn xml_err(e: impl fmt::Display) -> ReporterError {
    ReporterError::Xml(e.to_string())
}

// Seconds with 3 decimal places.
fn serialize_time(time: &Duration) -> String {
    format!("{:.3}", time.as_secs_f64())
}

/// Renders the complete document: declaration, `testsuites`, one `testsuite`,
/// one `testcase`.
pub fn render_report(
    case: &TestCaseResult,
    started_at: DateTime<Local>,
) -> Result<Vec<u8>, ReporterError> {
    let (kind, ty) = outcome_for(case.exit);
    let errors = if kind == OutcomeKind::Error { "1" } else { "0" };
    let failures = if kind == OutcomeKind::Failure { "1" } else { "0" };
    let time = serialize_time(&case.time);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;

    let mut suites = BytesStart::new(TESTSUITES_TAG);
    suites.extend_attributes([
        ("name", SUITE_NAME),
        ("disabled", "0"),
        ("errors", errors),
        ("failures", failures),
        ("tests", "1"),
        ("time", time.as_str()),
    ]);
    writer.write_event(Event::Start(suites)).map_err(xml_err)?;

    let timestamp = started_at.format("%Y-%m-%dT%H:%M:%S").to_string();
    let mut suite = BytesStart::new(TESTSUITE_TAG);
    suite.extend_attributes([
        ("name", SUITE_NAME),
        ("tests", "1"),
        ("id", "0"),
        ("disabled", "0"),
        ("errors", errors),
        ("failures", failures),
        ("skipped", "0"),
        ("time", time.as_str()),
        ("timestamp", timestamp.as_str()),
    ]);
    writer.write_event(Event::Start(suite)).map_err(xml_err)?;

    let status = if kind == OutcomeKind::Passed {
        "Passed"
    } else {
        "Failed"
    };
    let mut testcase = BytesStart::new(TESTCASE_TAG);
    testcase.extend_attributes([
        ("name", case.name.as_str()),
        ("classname", CLASS_NAME),
        ("time", time.as_str()),
        ("status", status),
    ]);

    match kind.tag() {
        None => {
            writer.write_event(Event::Empty(testcase)).map_err(xml_err)?;
        }
        Some(tag) => {
            writer.write_event(Event::Start(testcase)).map_err(xml_err)?;

            let mut child = BytesStart::new(tag);
            child.extend_attributes([("message", case.message.as_str()), ("type", ty.as_str())]);
            writer.write_event(Event::Start(child)).map_err(xml_err)?;
            for chunk in cdata_chunks(&case.stack_trace) {
                writer
                    .write_event(Event::CData(BytesCData::new(chunk)))
                    .map_err(xml_err)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(tag)))
                .map_err(xml_err)?;

            writer
                .write_event(Event::End(BytesEnd::new(TESTCASE_TAG)))
                .map_err(xml_err)?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(TESTSUITE_TAG)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(TESTSUITES_TAG)))
        .map_err(xml_err)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

/// Splits text so no chunk contains `]]>`; consecutive CDATA sections
/// concatenate back to the original.
fn cdata_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        // Cut between "]]" and ">".
        chunks.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    chunks.push(rest);
    chunks
}

/// What a written report says about the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub name: String,
    pub time_secs: f64,
    pub status: String,
    pub outcome: OutcomeKind,
    pub exit_type: Option<String>,
    pub message: Option<String>,
    pub stack_trace: String,
}

pub fn parse_report(xml: &str) -> Result<ParsedReport, ReporterError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parsed: Option<ParsedReport> = None;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"testcase" => {
                    let time = attr(&e, "time")?.unwrap_or_default();
                    parsed = Some(ParsedReport {
                        name: attr(&e, "name")?.unwrap_or_default(),
                        time_secs: time.parse().map_err(xml_err)?,
                        status: attr(&e, "status")?.unwrap_or_default(),
                        outcome: OutcomeKind::Passed,
                        exit_type: None,
                        message: None,
                        stack_trace: String::new(),
                    });
                }
                name @ (b"error" | b"failure") => {
                    let Some(report) = parsed.as_mut() else {
                        return Err(ReporterError::Xml("outcome element outside testcase".into()));
                    };
                    report.outcome = if name == b"error" {
                        OutcomeKind::Error
                    } else {
                        OutcomeKind::Failure
                    };
                    report.exit_type = attr(&e, "type")?;
                    report.message = attr(&e, "message")?;
                }
                _ => {}
            },
            Event::CData(data) => {
                if let Some(report) = parsed.as_mut() {
                    report
                        .stack_trace
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    parsed.ok_or_else(|| ReporterError::Xml("no testcase element".into()))
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ReporterError> {
    match e.try_get_attribute(name).map_err(xml_err)? {
        Some(a) => Ok(Some(a.unescape_value().map_err(xml_err)?.into_owned())),
        None => Ok(None),
    }
}

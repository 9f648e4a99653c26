mod render;
mod reporter;

pub use render::{
    outcome_for, parse_report, render_report, OutcomeKind, ParsedReport, ReportedExit,
    TestCaseResult, CLASS_NAME, SUITE_NAME,
};
pub use reporter::JUnitXmlReporter;

mod dispatcher;
mod r#trait;

pub use dispatcher::{DispatchSummary, ReportDispatcher};
pub use r#trait::{ReportInput, Reporter};

//! The three connection-level steps of a run

pub mod case_runner;
pub mod count_discovery;
pub mod report_finalizer;

pub use case_runner::CaseRunner;
pub use count_discovery::CountDiscoverer;
pub use report_finalizer::ReportFinalizer;

//! Per-case results and the run report built from them

use serde::Serialize;
use shared::CaseIndex;
use std::fmt;

use crate::error::ConformanceResult;

/// How one case ended. Decided once by the case runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CaseOutcome {
    CompletedNormally,
    TimedOut,
    ConnectFailed,
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseOutcome::CompletedNormally => write!(f, "completed"),
            CaseOutcome::TimedOut => write!(f, "timed out"),
            CaseOutcome::ConnectFailed => write!(f, "connect failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub case: CaseIndex,
    pub outcome: CaseOutcome,
}

impl RunResult {
    pub fn new(case: CaseIndex, outcome: CaseOutcome) -> Self {
        Self { case, outcome }
    }
}

/// Result of the update-reports handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStatus {
    Updated,
    TimedOut,
    ConnectFailed,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Updated => write!(f, "updated"),
            ReportStatus::TimedOut => write!(f, "timed out"),
            ReportStatus::ConnectFailed => write!(f, "connect failed"),
        }
    }
}

/// Everything a finished run produced, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<RunResult>,
    pub report_status: ReportStatus,
    pub completed: usize,
    pub timed_out: usize,
    pub connect_failed: usize,
}

impl RunReport {
    pub fn new(results: Vec<RunResult>, report_status: ReportStatus) -> Self {
        let tally = |outcome: CaseOutcome| results.iter().filter(|r| r.outcome == outcome).count();

        Self {
            completed: tally(CaseOutcome::CompletedNormally),
            timed_out: tally(CaseOutcome::TimedOut),
            connect_failed: tally(CaseOutcome::ConnectFailed),
            results,
            report_status,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Case indices in the order they ran
    pub fn executed_cases(&self) -> Vec<CaseIndex> {
        self.results.iter().map(|r| r.case).collect()
    }

    pub fn all_completed(&self) -> bool {
        self.completed == self.total() && self.report_status == ReportStatus::Updated
    }

    pub fn to_json(&self) -> ConformanceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cases: {} completed, {} timed out, {} connect failed; reports {}",
            self.total(),
            self.completed,
            self.timed_out,
            self.connect_failed,
            self.report_status
        )
    }
}

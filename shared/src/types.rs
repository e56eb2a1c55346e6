//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

/// Unique identifier for one driver run, attached to every run-scoped log event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based ordinal of a case in the fuzzing server's registry.
///
/// This is the `case` query value, not the dotted case id (`7.3.1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CaseIndex(u32);

impl CaseIndex {
    pub fn new(value: u32) -> SharedResult<Self> {
        if value == 0 {
            return Err(SharedError::InvalidCaseIndex { input: value.to_string() });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Every index from 1 up to and including `count`, ascending
    pub fn range_to(count: u32) -> impl Iterator<Item = CaseIndex> {
        (1..=count).map(CaseIndex)
    }
}

impl TryFrom<u32> for CaseIndex {
    type Error = SharedError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CaseIndex> for u32 {
    fn from(index: CaseIndex) -> Self {
        index.0
    }
}

impl FromStr for CaseIndex {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| SharedError::InvalidCaseIndex { input: s.to_string() })?;
        Self::new(value)
    }
}

impl fmt::Display for CaseIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity string the client announces to the fuzzing server, `name/version`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity(String);

impl AgentIdentity {
    pub fn new(client_name: &str, client_version: &str) -> Self {
        Self(format!("{client_name}/{client_version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AgentIdentity {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(SharedError::InvalidAgent { input: s.to_string() });
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authority of the fuzzing server; every request URI is derived from it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetEndpoint {
    base: Url,
}

impl TargetEndpoint {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 9001;

    pub fn new(host: &str, port: u16) -> SharedResult<Self> {
        let invalid = |message: String| SharedError::InvalidEndpoint {
            host: host.to_string(),
            port,
            message,
        };

        if host.trim().is_empty() {
            return Err(invalid("empty host".to_string()));
        }

        // Bare IPv6 literals need brackets inside an authority
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };

        let base = Url::parse(&format!("ws://{authority}")).map_err(|e| invalid(e.to_string()))?;
        if base.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self { base })
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.base.port_or_known_default().unwrap_or(Self::DEFAULT_PORT)
    }

    /// `/getCaseCount`
    pub fn case_count_uri(&self) -> SharedResult<Url> {
        Ok(self.base.join("/getCaseCount")?)
    }

    /// `/runCase?case={n}&agent={agent}`, agent form-urlencoded
    pub fn run_case_uri(&self, case: CaseIndex, agent: &AgentIdentity) -> SharedResult<Url> {
        let mut uri = self.base.join("/runCase")?;
        uri.query_pairs_mut()
            .append_pair("case", &case.to_string())
            .append_pair("agent", agent.as_str());
        Ok(uri)
    }

    /// `/updateReports?agent={agent}`, agent form-urlencoded
    pub fn update_reports_uri(&self, agent: &AgentIdentity) -> SharedResult<Url> {
        let mut uri = self.base.join("/updateReports")?;
        uri.query_pairs_mut().append_pair("agent", agent.as_str());
        Ok(uri)
    }
}

impl Default for TargetEndpoint {
    fn default() -> Self {
        Self {
            base: Url::parse("ws://localhost:9001").expect("static endpoint URL is valid"),
        }
    }
}

impl fmt::Display for TargetEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host(), self.port())
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod coordinator;
pub mod gateway;
pub mod session;
pub mod synthesis;
pub mod transcript;

pub use coordinator::{CoordinatorOptions, ResearchCoordinator, ResearchReport};
pub use gateway::SearchGateway;
pub use session::{ModePolicy, ResearchSession};
pub use synthesis::{Synthesizer, CHUNK_SIZE};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("could not parse model output: {0}")]
    Parse(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Operating policy for one research session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Bounded, single round.
    Normal,
    /// Iterative, up to four rounds.
    Deep,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Deep => "deep",
        }
    }

    pub fn policy(&self) -> ModePolicy {
        ModePolicy::for_mode(*self)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Numeric aliases match the menu numbering users already know.
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "1" => Ok(Self::Normal),
            "deep" | "2" => Ok(Self::Deep),
            other => Err(Error::InvalidConfig(format!(
                "unknown mode {other:?} (allowed: normal, deep)"
            ))),
        }
    }
}

/// A single ranked hit, normalized from a backend's native result shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// A search hit after summarization. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub title: String,
    pub url: String,
    pub summary: String,
}

impl FindingRecord {
    pub fn from_hit(hit: SearchHit, summary: String) -> Self {
        Self {
            title: hit.title,
            url: hit.link,
            summary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub queries: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpDecision {
    pub should_continue: bool,
    pub rationale: String,
    /// Empty unless `should_continue` is true.
    pub queries: Vec<String>,
}

impl FollowUpDecision {
    pub fn stop(rationale: impl Into<String>) -> Self {
        Self {
            should_continue: false,
            rationale: rationale.into(),
            queries: Vec::new(),
        }
    }

    pub fn follow_up(rationale: impl Into<String>, queries: Vec<String>) -> Self {
        Self {
            should_continue: true,
            rationale: rationale.into(),
            queries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
    /// Per-request timeout hint for HTTP adapters.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Normalized hits in the backend's ranking order (not yet capped).
    pub results: Vec<SearchHit>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Expands the original query into candidate search queries.
#[async_trait::async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(&self, query: &str) -> Result<QueryPlan>;
}

/// Turns one search hit into a short textual summary.
#[async_trait::async_trait]
pub trait ResultSummarizer: Send + Sync {
    async fn summarize(&self, hit: &SearchHit) -> Result<String>;
}

/// Decides whether another research round is warranted.
///
/// Receives the full findings transcript every time it is called.
#[async_trait::async_trait]
pub trait FollowUpEvaluator: Send + Sync {
    async fn evaluate(&self, transcript: &str) -> Result<FollowUpDecision>;
}

/// The report-generation capability: transcript in, Markdown out.
#[async_trait::async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write_report(&self, input: &str) -> Result<String>;
}

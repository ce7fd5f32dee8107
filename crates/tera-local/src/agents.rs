use crate::llm::ChatModel;
use crate::prompts;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tera_core::{
    transcript, Error, FollowUpDecision, FollowUpEvaluator, Mode, QueryPlan, QueryPlanner,
    ReportWriter, Result, ResultSummarizer, SearchHit,
};

/// Best-effort parse of a JSON object out of a model reply: bare JSON, a
/// fenced block, or the outermost `{...}` inside surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<T>(trimmed) {
        return Ok(v);
    }
    let candidate = extract_json_object(trimmed)
        .ok_or_else(|| Error::Parse(format!("no JSON object in reply: {}", preview(trimmed))))?;
    serde_json::from_str::<T>(candidate).map_err(|e| Error::Parse(e.to_string()))
}

fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

fn preview(s: &str) -> String {
    let mut out: String = s.chars().take(120).collect();
    if out.len() < s.len() {
        out.push_str("...");
    }
    out
}

fn clean_queries(queries: Vec<String>) -> Vec<String> {
    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
struct PlannerOutput {
    #[serde(default)]
    queries: Vec<String>,
    #[serde(default, alias = "reasoning")]
    thoughts: String,
}

#[derive(Debug, Deserialize)]
struct FollowUpOutput {
    #[serde(alias = "should_continue")]
    should_follow_up: bool,
    #[serde(default, alias = "rationale")]
    reasoning: String,
    #[serde(default)]
    queries: Vec<String>,
}

impl From<FollowUpOutput> for FollowUpDecision {
    fn from(o: FollowUpOutput) -> Self {
        if o.should_follow_up {
            FollowUpDecision::follow_up(o.reasoning, clean_queries(o.queries))
        } else {
            FollowUpDecision::stop(o.reasoning)
        }
    }
}

pub struct LlmQueryPlanner {
    model: Arc<dyn ChatModel>,
    mode: Mode,
}

impl LlmQueryPlanner {
    pub fn new(model: Arc<dyn ChatModel>, mode: Mode) -> Self {
        Self { model, mode }
    }
}

#[async_trait::async_trait]
impl QueryPlanner for LlmQueryPlanner {
    async fn plan(&self, query: &str) -> Result<QueryPlan> {
        let raw = self
            .model
            .chat(&prompts::planner_system(self.mode), query, true)
            .await?;
        let out: PlannerOutput = parse_structured(&raw)?;
        let queries = clean_queries(out.queries);
        tracing::debug!(n = queries.len(), thoughts = %out.thoughts, "query plan");
        Ok(QueryPlan {
            queries,
            rationale: out.thoughts,
        })
    }
}

pub struct LlmResultSummarizer {
    model: Arc<dyn ChatModel>,
}

impl LlmResultSummarizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl ResultSummarizer for LlmResultSummarizer {
    async fn summarize(&self, hit: &SearchHit) -> Result<String> {
        let out = self
            .model
            .chat(
                prompts::summarizer_system(),
                &transcript::summarizer_input(hit),
                false,
            )
            .await?;
        Ok(out.trim().to_string())
    }
}

pub struct LlmFollowUpEvaluator {
    model: Arc<dyn ChatModel>,
    mode: Mode,
}

impl LlmFollowUpEvaluator {
    pub fn new(model: Arc<dyn ChatModel>, mode: Mode) -> Self {
        Self { model, mode }
    }
}

#[async_trait::async_trait]
impl FollowUpEvaluator for LlmFollowUpEvaluator {
    async fn evaluate(&self, transcript: &str) -> Result<FollowUpDecision> {
        let raw = self
            .model
            .chat(&prompts::follow_up_system(self.mode), transcript, true)
            .await?;
        let out: FollowUpOutput = parse_structured(&raw)?;
        Ok(out.into())
    }
}

pub struct LlmReportWriter {
    model: Arc<dyn ChatModel>,
    mode: Mode,
}

impl LlmReportWriter {
    pub fn new(model: Arc<dyn ChatModel>, mode: Mode) -> Self {
        Self { model, mode }
    }
}

#[async_trait::async_trait]
impl ReportWriter for LlmReportWriter {
    async fn write_report(&self, input: &str) -> Result<String> {
        let out = self
            .model
            .chat(&prompts::report_system(self.mode), input, false)
            .await?;
        Ok(out.trim().to_string())
    }
}

/// The four model-driven capabilities sharing one chat model.
pub struct ResearchAgents {
    pub planner: Arc<dyn QueryPlanner>,
    pub summarizer: Arc<dyn ResultSummarizer>,
    pub evaluator: Arc<dyn FollowUpEvaluator>,
    pub writer: Arc<dyn ReportWriter>,
}

impl ResearchAgents {
    pub fn build(model: Arc<dyn ChatModel>, mode: Mode) -> Self {
        Self {
            planner: Arc::new(LlmQueryPlanner::new(model.clone(), mode)),
            summarizer: Arc::new(LlmResultSummarizer::new(model.clone())),
            evaluator: Arc::new(LlmFollowUpEvaluator::new(model.clone(), mode)),
            writer: Arc::new(LlmReportWriter::new(model, mode)),
        }
    }
}

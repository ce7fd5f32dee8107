#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tera_core::{
    Error, FollowUpDecision, FollowUpEvaluator, Mode, QueryPlan, QueryPlanner, ReportWriter,
    ResearchCoordinator, Result, ResultSummarizer, SearchHit, SearchProvider, SearchQuery,
    SearchResponse,
};

pub struct ScriptedPlanner {
    pub queries: Vec<String>,
}

impl ScriptedPlanner {
    pub fn with(n: usize) -> Self {
        Self {
            queries: (1..=n).map(|i| format!("q{i}")).collect(),
        }
    }
}

#[async_trait::async_trait]
impl QueryPlanner for ScriptedPlanner {
    async fn plan(&self, _query: &str) -> Result<QueryPlan> {
        Ok(QueryPlan {
            queries: self.queries.clone(),
            rationale: "scripted".to_string(),
        })
    }
}

/// Returns `hits` results per query, ignoring the requested count.
pub struct FakeSearch {
    pub hits: usize,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(hits: usize) -> Self {
        Self {
            hits,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        self.calls.lock().unwrap().push(q.query.clone());
        if self.failing.contains(&q.query) {
            return Err(Error::Search("fake outage".to_string()));
        }
        let results = (0..self.hits)
            .map(|i| {
                SearchHit::new(
                    format!("{} #{i}", q.query),
                    format!("https://example.com/{}/{i}", q.query),
                )
            })
            .collect();
        Ok(SearchResponse {
            results,
            provider: "fake".to_string(),
            timings_ms: BTreeMap::new(),
        })
    }
}

#[derive(Default)]
pub struct EchoSummarizer {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ResultSummarizer for EchoSummarizer {
    async fn summarize(&self, hit: &SearchHit) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary of {}", hit.title))
    }
}

pub struct FailingPlanner;

#[async_trait::async_trait]
impl QueryPlanner for FailingPlanner {
    async fn plan(&self, _query: &str) -> Result<QueryPlan> {
        Err(Error::Parse("planner reply was not JSON".to_string()))
    }
}

pub struct FailingSummarizer;

#[async_trait::async_trait]
impl ResultSummarizer for FailingSummarizer {
    async fn summarize(&self, _hit: &SearchHit) -> Result<String> {
        Err(Error::Llm("model unavailable".to_string()))
    }
}

/// Pops scripted decisions; once empty it keeps asking to continue.
pub struct ScriptedEvaluator {
    pub script: Mutex<VecDeque<FollowUpDecision>>,
    pub fallback_queries: usize,
    pub inputs: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    pub fn new(script: Vec<FollowUpDecision>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback_queries: 10,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn always_continue(proposed: usize) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback_queries: proposed,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl FollowUpEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, transcript: &str) -> Result<FollowUpDecision> {
        let n = {
            let mut inputs = self.inputs.lock().unwrap();
            inputs.push(transcript.to_string());
            inputs.len()
        };
        if let Some(d) = self.script.lock().unwrap().pop_front() {
            return Ok(d);
        }
        Ok(FollowUpDecision::follow_up(
            "keep digging",
            (1..=self.fallback_queries)
                .map(|i| format!("f{n}-{i}"))
                .collect(),
        ))
    }
}

pub struct FailingEvaluator;

#[async_trait::async_trait]
impl FollowUpEvaluator for FailingEvaluator {
    async fn evaluate(&self, _transcript: &str) -> Result<FollowUpDecision> {
        Err(Error::Llm("evaluator timed out".to_string()))
    }
}

/// Numbers its reports; optionally fails on the n-th call (1-based).
#[derive(Default)]
pub struct CountingWriter {
    pub inputs: Mutex<Vec<String>>,
    pub fail_on: Option<usize>,
}

impl CountingWriter {
    pub fn failing_on(call: usize) -> Self {
        Self {
            inputs: Mutex::new(Vec::new()),
            fail_on: Some(call),
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ReportWriter for CountingWriter {
    async fn write_report(&self, input: &str) -> Result<String> {
        let mut inputs = self.inputs.lock().unwrap();
        inputs.push(input.to_string());
        if self.fail_on == Some(inputs.len()) {
            return Err(Error::Llm("writer failed".to_string()));
        }
        Ok(format!("## Report {}", inputs.len()))
    }
}

pub struct Harness {
    pub search: Arc<FakeSearch>,
    pub summarizer: Arc<EchoSummarizer>,
    pub writer: Arc<CountingWriter>,
}

impl Harness {
    pub fn new(search: FakeSearch) -> Self {
        Self::with_writer(search, CountingWriter::default())
    }

    pub fn with_writer(search: FakeSearch, writer: CountingWriter) -> Self {
        Self {
            search: Arc::new(search),
            summarizer: Arc::new(EchoSummarizer::default()),
            writer: Arc::new(writer),
        }
    }

    pub fn coordinator(&self, mode: Mode, planner: ScriptedPlanner) -> ResearchCoordinator {
        ResearchCoordinator::new(
            mode,
            self.search.clone(),
            Arc::new(planner),
            self.summarizer.clone(),
            self.writer.clone(),
        )
    }
}

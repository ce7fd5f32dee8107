//! The research loop.
//!
//! A session walks a small state machine:
//!
//! ```text
//! Planning -> Searching -> [FollowUpCheck -> Searching]* -> Synthesizing -> done
//! ```
//!
//! `FollowUpCheck` is only entered in deep mode with an evaluator attached, and
//! the session's round ceiling bounds the loop whatever the evaluator says.

use crate::gateway::SearchGateway;
use crate::session::ResearchSession;
use crate::synthesis::Synthesizer;
use crate::transcript;
use crate::{
    FindingRecord, FollowUpEvaluator, Mode, QueryPlanner, ReportWriter, Result, ResultSummarizer,
    SearchProvider,
};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Hits of one query summarized concurrently. 1 = strictly sequential.
    pub concurrency: usize,
    pub search_timeout_ms: Option<u64>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            search_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub query: String,
    pub mode: Mode,
    pub markdown: String,
    pub rounds: usize,
    pub queries_issued: usize,
    pub findings_processed: usize,
    pub synthesis_calls: usize,
    pub elapsed_ms: u128,
    pub findings: Vec<FindingRecord>,
}

enum Phase {
    Planning,
    Searching(Vec<String>),
    FollowUpCheck,
    Synthesizing,
}

pub struct ResearchCoordinator {
    mode: Mode,
    planner: Arc<dyn QueryPlanner>,
    summarizer: Arc<dyn ResultSummarizer>,
    evaluator: Option<Arc<dyn FollowUpEvaluator>>,
    gateway: SearchGateway,
    synthesizer: Synthesizer,
    options: CoordinatorOptions,
}

impl ResearchCoordinator {
    pub fn new(
        mode: Mode,
        search: Arc<dyn SearchProvider>,
        planner: Arc<dyn QueryPlanner>,
        summarizer: Arc<dyn ResultSummarizer>,
        writer: Arc<dyn ReportWriter>,
    ) -> Self {
        Self {
            mode,
            planner,
            summarizer,
            evaluator: None,
            gateway: SearchGateway::new(search, mode.policy().hits_per_query),
            synthesizer: Synthesizer::new(writer, mode),
            options: CoordinatorOptions::default(),
        }
    }

    pub fn with_follow_up(mut self, evaluator: Arc<dyn FollowUpEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_options(mut self, options: CoordinatorOptions) -> Self {
        self.gateway = self
            .gateway
            .clone()
            .with_timeout_ms(options.search_timeout_ms);
        self.options = options;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn search_provider(&self) -> &'static str {
        self.gateway.provider_name()
    }

    pub async fn research(&self, query: &str) -> Result<ResearchReport> {
        let t0 = Instant::now();
        let mut session = ResearchSession::new(query, self.mode);
        let mut phase = Phase::Planning;

        let synthesis = loop {
            phase = match phase {
                Phase::Planning => {
                    let plan = self.planner.plan(session.query()).await?;
                    tracing::info!(
                        rationale = %plan.rationale,
                        proposed = plan.queries.len(),
                        "query plan"
                    );
                    let batch = session.clamp_batch(plan.queries);
                    for (i, q) in batch.iter().enumerate() {
                        tracing::info!("  {}. {}", i + 1, q);
                    }
                    Phase::Searching(batch)
                }
                Phase::Searching(batch) => {
                    self.search_round(&mut session, batch).await?;
                    match (&self.evaluator, self.mode) {
                        (Some(_), Mode::Deep) => Phase::FollowUpCheck,
                        _ => Phase::Synthesizing,
                    }
                }
                Phase::FollowUpCheck => match &self.evaluator {
                    Some(evaluator) => self.follow_up(&mut session, evaluator.as_ref()).await?,
                    None => Phase::Synthesizing,
                },
                Phase::Synthesizing => {
                    break self
                        .synthesizer
                        .synthesize(session.query(), session.findings())
                        .await?;
                }
            };
        };

        tracing::info!(
            queries = session.queries_issued(),
            rounds = session.round(),
            findings = session.findings_processed(),
            "research complete"
        );
        Ok(ResearchReport {
            query: session.query().to_string(),
            mode: self.mode,
            markdown: synthesis.markdown,
            rounds: session.round(),
            queries_issued: session.queries_issued(),
            findings_processed: session.findings_processed(),
            synthesis_calls: synthesis.calls,
            elapsed_ms: t0.elapsed().as_millis(),
            findings: session.into_findings(),
        })
    }

    async fn search_round(&self, session: &mut ResearchSession, batch: Vec<String>) -> Result<()> {
        let round = session.round();
        tracing::info!(round, queries = batch.len(), "research round");
        let before = session.findings_processed();

        for query in batch {
            if session.finding_budget_exhausted() {
                tracing::info!(round, "finding limit reached; skipping remaining queries");
                break;
            }
            if !session.try_admit_query() {
                tracing::info!(round, "query limit reached; skipping remaining queries");
                break;
            }

            let hits = self.gateway.search(&query).await;
            let granted = session.reserve_findings(hits.len());
            tracing::info!(
                round,
                query = %query,
                provider = self.gateway.provider_name(),
                hits = hits.len(),
                admitted = granted,
                "searched"
            );

            let summarizer = &self.summarizer;
            let findings: Vec<FindingRecord> = futures::stream::iter(hits.into_iter().take(granted))
                .map(|hit| async move {
                    let t = Instant::now();
                    let summary = summarizer.summarize(&hit).await?;
                    tracing::debug!(
                        title = %hit.title,
                        url = %hit.link,
                        elapsed_ms = t.elapsed().as_millis(),
                        "summarized"
                    );
                    Ok::<_, crate::Error>(FindingRecord::from_hit(hit, summary))
                })
                .buffered(self.options.concurrency.max(1))
                .try_collect()
                .await?;

            for finding in findings {
                session.record_finding(finding);
            }
        }

        tracing::info!(
            round,
            new_findings = session.findings_processed() - before,
            total_findings = session.findings_processed(),
            "round complete"
        );
        Ok(())
    }

    async fn follow_up(
        &self,
        session: &mut ResearchSession,
        evaluator: &dyn FollowUpEvaluator,
    ) -> Result<Phase> {
        if session.round() >= session.policy().max_rounds {
            tracing::info!(round = session.round(), "round limit reached");
            return Ok(Phase::Synthesizing);
        }

        let input = transcript::follow_up_input(session.query(), session.findings());
        let decision = evaluator.evaluate(&input).await?;
        tracing::info!(
            should_continue = decision.should_continue,
            rationale = %decision.rationale,
            proposed = decision.queries.len(),
            "follow-up decision"
        );
        if !decision.should_continue {
            return Ok(Phase::Synthesizing);
        }

        // An empty batch still costs a round; the evaluator is asked again next time.
        let batch = session.clamp_batch(decision.queries);
        if !session.try_advance_round() {
            return Ok(Phase::Synthesizing);
        }
        tracing::info!(round = session.round(), queries = batch.len(), "follow-up research");
        Ok(Phase::Searching(batch))
    }
}

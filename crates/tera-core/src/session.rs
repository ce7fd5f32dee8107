//! Per-session budget bookkeeping.
//!
//! All caps are checked against one `ResearchSession`; callers ask for
//! admission before issuing a query or summarizing a hit, and the session
//! either grants it (and counts it) or refuses.

use crate::{FindingRecord, Mode};

/// Resource caps for one mode. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    /// Hits requested from (and kept per) search call.
    pub hits_per_query: usize,
    /// Queries taken from one planner or evaluator batch.
    pub queries_per_batch: usize,
    pub max_total_queries: Option<usize>,
    pub max_total_findings: Option<usize>,
    pub max_rounds: usize,
}

impl ModePolicy {
    pub const fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Normal => Self {
                hits_per_query: 2,
                queries_per_batch: 5,
                max_total_queries: Some(5),
                max_total_findings: Some(6),
                max_rounds: 1,
            },
            Mode::Deep => Self {
                hits_per_query: 5,
                queries_per_batch: 3,
                max_total_queries: None,
                max_total_findings: None,
                max_rounds: 4,
            },
        }
    }
}

#[derive(Debug)]
pub struct ResearchSession {
    query: String,
    mode: Mode,
    policy: ModePolicy,
    findings: Vec<FindingRecord>,
    round: usize,
    queries_issued: usize,
    findings_reserved: usize,
}

impl ResearchSession {
    pub fn new(query: impl Into<String>, mode: Mode) -> Self {
        Self {
            query: query.into(),
            mode,
            policy: mode.policy(),
            findings: Vec::new(),
            round: 1,
            queries_issued: 0,
            findings_reserved: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn policy(&self) -> &ModePolicy {
        &self.policy
    }

    pub fn findings(&self) -> &[FindingRecord] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<FindingRecord> {
        self.findings
    }

    /// 1-based.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn queries_issued(&self) -> usize {
        self.queries_issued
    }

    pub fn findings_processed(&self) -> usize {
        self.findings.len()
    }

    pub fn remaining_queries(&self) -> Option<usize> {
        self.policy
            .max_total_queries
            .map(|cap| cap.saturating_sub(self.queries_issued))
    }

    /// Counts reservations that have not been turned into findings yet.
    pub fn remaining_findings(&self) -> Option<usize> {
        self.policy
            .max_total_findings
            .map(|cap| cap.saturating_sub(self.findings_reserved))
    }

    pub fn query_budget_exhausted(&self) -> bool {
        self.remaining_queries() == Some(0)
    }

    pub fn finding_budget_exhausted(&self) -> bool {
        self.remaining_findings() == Some(0)
    }

    /// Truncates a planner/evaluator batch to what this session may still issue.
    pub fn clamp_batch(&self, mut queries: Vec<String>) -> Vec<String> {
        let mut limit = self.policy.queries_per_batch;
        if let Some(remaining) = self.remaining_queries() {
            limit = limit.min(remaining);
        }
        queries.truncate(limit);
        queries
    }

    /// Grants and counts one query, or refuses once the query budget is spent.
    pub fn try_admit_query(&mut self) -> bool {
        if self.query_budget_exhausted() {
            return false;
        }
        self.queries_issued += 1;
        true
    }

    /// Reserves up to `wanted` finding slots and returns how many were granted.
    ///
    /// Every granted slot must be filled with `record_finding` (or the session
    /// fails as a whole) so reservations never outlive the round.
    pub fn reserve_findings(&mut self, wanted: usize) -> usize {
        let granted = match self.remaining_findings() {
            Some(remaining) => wanted.min(remaining),
            None => wanted,
        };
        self.findings_reserved += granted;
        granted
    }

    pub fn record_finding(&mut self, finding: FindingRecord) {
        debug_assert!(self.findings.len() < self.findings_reserved);
        self.findings.push(finding);
    }

    /// Moves to the next round; refuses at the mode's round ceiling.
    pub fn try_advance_round(&mut self) -> bool {
        if self.round >= self.policy.max_rounds {
            return false;
        }
        self.round += 1;
        true
    }
}

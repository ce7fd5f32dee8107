use crate::{SearchHit, SearchProvider, SearchQuery};
use std::sync::Arc;

/// One configured backend plus the mode's per-query cap.
///
/// Provider errors never escape: they are logged and become an empty list.
#[derive(Clone)]
pub struct SearchGateway {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    timeout_ms: Option<u64>,
}

impl SearchGateway {
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let q = SearchQuery {
            query: query.to_string(),
            max_results: self.max_results,
            timeout_ms: self.timeout_ms,
        };
        match self.provider.search(&q).await {
            Ok(resp) => {
                let mut hits = resp.results;
                hits.truncate(self.max_results);
                tracing::debug!(
                    provider = self.provider.name(),
                    query,
                    hits = hits.len(),
                    "search ok"
                );
                hits
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    query,
                    error = %e,
                    "search failed; continuing with no results"
                );
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for SearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGateway")
            .field("provider", &self.provider.name())
            .field("max_results", &self.max_results)
            .finish()
    }
}

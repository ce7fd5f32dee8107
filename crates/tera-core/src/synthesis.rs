use crate::transcript;
use crate::{FindingRecord, Mode, ReportWriter, Result};
use std::sync::Arc;

/// Findings per partial synthesis call in deep mode.
pub const CHUNK_SIZE: usize = 15;

/// Contiguous, in-order partition of `findings` into groups of `CHUNK_SIZE`.
pub fn chunk_findings(findings: &[FindingRecord]) -> Vec<&[FindingRecord]> {
    findings.chunks(CHUNK_SIZE).collect()
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub markdown: String,
    /// Report-generation calls issued (chunks plus merge, or 1).
    pub calls: usize,
}

#[derive(Clone)]
pub struct Synthesizer {
    writer: Arc<dyn ReportWriter>,
    mode: Mode,
}

impl Synthesizer {
    pub fn new(writer: Arc<dyn ReportWriter>, mode: Mode) -> Self {
        Self { writer, mode }
    }

    pub fn needs_chunking(&self, total_findings: usize) -> bool {
        self.mode == Mode::Deep && total_findings > CHUNK_SIZE
    }

    pub async fn synthesize(&self, query: &str, findings: &[FindingRecord]) -> Result<Synthesis> {
        if !self.needs_chunking(findings.len()) {
            tracing::info!(findings = findings.len(), "synthesizing report in one pass");
            let input = transcript::synthesis_input(query, findings);
            let markdown = self.writer.write_report(&input).await?;
            return Ok(Synthesis { markdown, calls: 1 });
        }

        let chunks = chunk_findings(findings);
        tracing::info!(
            findings = findings.len(),
            chunks = chunks.len(),
            "synthesizing report in chunks"
        );
        let mut partials = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!(part = i + 1, size = chunk.len(), "partial synthesis");
            let input = transcript::synthesis_input(query, chunk);
            partials.push(self.writer.write_report(&input).await?);
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let combined = transcript::combined_partials(query, &partials);
            tracing::debug!(parts = partials.len(), chars = combined.len(), "combined partial reports");
        }

        let merge = transcript::merge_input(query, self.mode, findings.len(), &partials);
        let markdown = self.writer.write_report(&merge).await?;
        Ok(Synthesis {
            markdown,
            calls: partials.len() + 1,
        })
    }
}

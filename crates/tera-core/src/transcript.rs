//! Plain-text inputs handed to the model-backed capabilities.

use crate::{FindingRecord, Mode, SearchHit};
use std::fmt::Write as _;

pub fn summarizer_input(hit: &SearchHit) -> String {
    format!("Title: {}\nURL: {}", hit.title, hit.link)
}

fn push_findings(out: &mut String, findings: &[FindingRecord]) {
    for (i, f) in findings.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. Title: {}\n   URL: {}\n   Summary: {}\n",
            i + 1,
            f.title,
            f.url,
            f.summary
        );
    }
}

/// Synthesis input for one pass (whole session or a single chunk).
///
/// Numbering restarts at 1 for every chunk.
pub fn synthesis_input(query: &str, findings: &[FindingRecord]) -> String {
    let mut out = format!("Query: {query}\n\nSearch Results:\n");
    push_findings(&mut out, findings);
    out
}

/// Follow-up evaluator input; always built from the full findings list.
pub fn follow_up_input(query: &str, findings: &[FindingRecord]) -> String {
    let mut out = format!("Original Query: {query}\n\nCurrent Findings:\n");
    push_findings(&mut out, findings);
    out
}

pub fn combined_partials(query: &str, partials: &[String]) -> String {
    let mut out = format!("# Comprehensive Report on {query}\n\n");
    for (i, p) in partials.iter().enumerate() {
        let _ = write!(out, "## Part {}\n\n{}\n\n", i + 1, p);
    }
    out
}

pub fn merge_input(query: &str, mode: Mode, total_findings: usize, partials: &[String]) -> String {
    let mut out = format!("Query: {query}\n\nPartial Reports:\n");
    for (i, p) in partials.iter().enumerate() {
        let _ = write!(out, "\nPart {}:\n{}\n", i + 1, p);
    }
    let _ = write!(
        out,
        "\nSynthesize these partial reports into a cohesive final report, ensuring all sections \
         are covered and the total length meets the {mode} mode requirements \
         ({} for {total_findings} results).",
        min_length_hint(mode, total_findings)
    );
    out
}

/// Minimum report length the writer is asked for, scaled by result count.
pub fn min_length_hint(mode: Mode, total_findings: usize) -> String {
    match mode {
        Mode::Normal => "150-300 words".to_string(),
        Mode::Deep => {
            let words = match total_findings {
                0..=10 => 500,
                11..=20 => 1000,
                21..=30 => 1500,
                n => (2000 * n / 30).max(2000),
            };
            format!("{words}+ words")
        }
    }
}

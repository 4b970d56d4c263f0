//! Human-readable output

use research_core::{Paper, PipelineResult, SynthesisStatus};
use std::fmt::Write;

/// Numbered paper list with authors, date and links
pub(crate) fn papers(papers: &[Paper]) -> String {
    if papers.is_empty() {
        return "No papers found.\n".to_string();
    }

    let mut out = String::new();
    for (idx, paper) in papers.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", idx + 1, paper.title);
        if !paper.authors.is_empty() {
            let _ = writeln!(out, "   Authors: {}", paper.authors.join(", "));
        }
        if !paper.published.is_empty() {
            let _ = writeln!(out, "   Published: {}", paper.published);
        }
        let _ = writeln!(out, "   {}", paper.abs_url());
        if let Some(pdf) = &paper.pdf_url {
            let _ = writeln!(out, "   PDF: {pdf}");
        }
        let _ = writeln!(out);
    }
    out
}

/// Markdown rendering of a run's report
pub(crate) fn report(result: &PipelineResult) -> String {
    let report = &result.report;
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", report.title);
    let _ = writeln!(
        out,
        "Intent: {} (confidence {:.2})  ",
        report.intent, result.intent.confidence
    );
    let _ = writeln!(out, "Run: {}\n", result.run_id);

    if let Some(summary) = &report.summary {
        let _ = writeln!(out, "## Summary\n\n{summary}\n");
    }

    for section in &report.sections {
        let _ = writeln!(out, "## {}. {}\n", section.ordinal, section.sub_question);
        match section.status {
            SynthesisStatus::Failed => {
                let note = section.note.as_deref().unwrap_or("no detail");
                let _ = writeln!(out, "_No answer: {note}_\n");
            }
            status => {
                let _ = writeln!(out, "{}\n", section.body);
                if status == SynthesisStatus::Partial {
                    if let Some(note) = &section.note {
                        let _ = writeln!(out, "_Partial: {note}_\n");
                    }
                }
            }
        }
    }

    if !report.citations.is_empty() {
        let _ = writeln!(out, "## References\n");
        for citation in &report.citations {
            match &citation.url {
                Some(url) => {
                    let _ = writeln!(out, "- [{}] {} <{url}>", citation.id, citation.title);
                }
                None => {
                    let _ = writeln!(out, "- [{}] {}", citation.id, citation.title);
                }
            }
        }
        let _ = writeln!(out);
    }

    let stats = &result.stats;
    let _ = writeln!(
        out,
        "---\n{} ok, {} partial, {} failed ({} timed out) in {} ms",
        stats.ok, stats.partial, stats.failed, stats.timed_out, stats.elapsed_ms
    );
    out
}

//! Prompt construction for each reasoning stage
//!
//! Prompt wording is kept deliberately plain; the contract that matters is
//! the response format each stage asks for and parses back.

use crate::capability::{Prompt, PromptKind};
use crate::types::{EvidenceItem, Intent, IntentLabel, ResearchQuestion, SubQuestion};

const CLASSIFY_SYSTEM: &str = "You classify research questions. \
Reply with a single JSON object and nothing else: \
{\"intent\": <one of COMPARISON, SURVEY, METHOD_LOOKUP, DEFINITION, OTHER>, \
\"confidence\": <number between 0 and 1>}.";

const DECOMPOSE_SYSTEM: &str = "You break a research question into focused sub-questions \
that can each be answered from the scientific literature. \
Reply with a JSON array of strings, most foundational question first, and nothing else.";

const SYNTHESIZE_SYSTEM: &str = "You are a research analyst. Answer the sub-question using only \
the numbered papers provided. Cite papers inline by their id in square brackets. \
Be concise and note disagreements between papers.";

const SYNTHESIZE_NO_EVIDENCE_SYSTEM: &str = "You are a research analyst. No papers were found \
for this sub-question. Give a brief best-effort answer from general knowledge and state \
clearly which claims would need literature support.";

const SUMMARIZE_SYSTEM: &str = "You write the overall summary of a research report. \
Combine the section findings into one coherent paragraph that answers the original question. \
Do not introduce claims absent from the sections.";

/// Intent classification prompt
#[must_use]
pub fn classify_intent(question: &ResearchQuestion) -> Prompt {
    Prompt::new(
        PromptKind::ClassifyIntent,
        CLASSIFY_SYSTEM,
        format!("Research question: {question}"),
    )
}

/// Decomposition prompt
#[must_use]
pub fn decompose(question: &ResearchQuestion, intent: &Intent, max: usize) -> Prompt {
    let guidance = match intent.label {
        IntentLabel::Comparison => "Cover each compared approach separately, then how they compare.",
        IntentLabel::Survey => "Cover the main families of work, milestones and open problems.",
        IntentLabel::MethodLookup => "Cover how the method works, where it is used and its limits.",
        IntentLabel::Definition => "Cover the definition, its origin and closely related concepts.",
        IntentLabel::Other => "Cover the distinct aspects needed to answer the question.",
    };

    Prompt::new(
        PromptKind::Decompose,
        DECOMPOSE_SYSTEM,
        format!(
            "Research question: {question}\nIntent: {}\n{guidance}\nProduce at most {max} sub-questions.",
            intent.label
        ),
    )
}

/// Synthesis prompt grounded in evidence
#[must_use]
pub fn synthesize(sub_question: &SubQuestion, evidence: &[EvidenceItem]) -> Prompt {
    let papers = evidence
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. [{}] {}\n{}", i + 1, e.source_id, e.title, e.excerpt))
        .collect::<Vec<_>>()
        .join("\n\n");

    Prompt::new(
        PromptKind::Synthesize,
        SYNTHESIZE_SYSTEM,
        format!("Sub-question: {}\n\nPapers:\n{papers}", sub_question.text),
    )
}

/// Synthesis prompt when no evidence could be gathered
#[must_use]
pub fn synthesize_without_evidence(sub_question: &SubQuestion) -> Prompt {
    Prompt::new(
        PromptKind::Synthesize,
        SYNTHESIZE_NO_EVIDENCE_SYSTEM,
        format!("Sub-question: {}", sub_question.text),
    )
}

/// Overall summary prompt
#[must_use]
pub fn summarize(question: &ResearchQuestion, sections: &[(String, String)]) -> Prompt {
    let body = sections
        .iter()
        .map(|(q, answer)| format!("## {q}\n{answer}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    Prompt::new(
        PromptKind::Summarize,
        SUMMARIZE_SYSTEM,
        format!("Original question: {question}\n\n{body}"),
    )
}

/// Strip a Markdown code fence around a model response, if present
#[must_use]
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Slice from the first `open` to the last `close` delimiter
#[must_use]
pub(crate) fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

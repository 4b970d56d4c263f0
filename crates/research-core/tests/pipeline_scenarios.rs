//! End-to-end pipeline scenarios against scripted capabilities

use pretty_assertions::assert_eq;
use research_core::pipeline::{TASK_TERMINATED, TIMED_OUT};
use research_core::prelude::*;
use research_test_utils::{
    deepfake_papers, deepfake_reasoner, fast_config, sub_question_of, ScriptedReasoner,
    StaticPaperSource, DEEPFAKE_QUESTION, DEEPFAKE_SUB_QUESTIONS,
};
use std::sync::Arc;
use std::time::Duration;

fn numbered_questions(n: usize) -> Vec<String> {
    (1..=n).map(|k| format!("Sub-question number {k}?")).collect()
}

fn ordinal_in(prompt: &Prompt) -> Option<usize> {
    sub_question_of(prompt)?
        .trim_start_matches("Sub-question number ")
        .trim_end_matches('?')
        .parse()
        .ok()
}

fn reasoner_with_questions(subs: &[String]) -> ScriptedReasoner {
    let decomposition = serde_json::to_string(subs).unwrap();
    ScriptedReasoner::new()
        .reply(PromptKind::ClassifyIntent, r#"{"intent": "SURVEY", "confidence": 0.6}"#)
        .reply(PromptKind::Decompose, &decomposition)
        .on(PromptKind::Synthesize, |prompt| {
            Ok(format!("Answer for {}", sub_question_of(prompt).unwrap_or("?")))
        })
        .reply(PromptKind::Summarize, "Summary.")
}

#[tokio::test]
async fn deepfake_comparison_scenario() {
    let reasoner = Arc::new(deepfake_reasoner());
    let papers = Arc::new(StaticPaperSource::new(deepfake_papers()));
    let pipeline = ResearchPipeline::new(reasoner.clone(), papers.clone(), fast_config()).unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    assert_eq!(result.intent.label, IntentLabel::Comparison);
    let texts: Vec<&str> = result.sub_questions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, DEEPFAKE_SUB_QUESTIONS.to_vec());

    assert_eq!(result.report.sections.len(), 3);
    assert!(result
        .report
        .sections
        .iter()
        .all(|s| s.status == SynthesisStatus::Ok));
    assert!(result.report.summary.is_some());
    assert_eq!(result.report.title, format!("Research report: {DEEPFAKE_QUESTION}"));
    assert_eq!(result.stats.ok, 3);
    assert_eq!(papers.queries().len(), 3);
    assert_eq!(reasoner.calls(PromptKind::Summarize), 1);

    let first = &result.report.sections[0];
    assert_eq!(first.ordinal, 1);
    assert!(first.body.contains("[1901.08971]"));
    assert!(result.report.citations.iter().any(|c| c.id == "1901.08971"));
}

#[tokio::test]
async fn blank_question_invokes_no_stage() {
    let reasoner = Arc::new(deepfake_reasoner());
    let papers = Arc::new(StaticPaperSource::new(deepfake_papers()));
    let pipeline = ResearchPipeline::new(reasoner.clone(), papers.clone(), fast_config()).unwrap();

    let err = pipeline.run("").await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(!err.is_contract_violation());
    assert_eq!(reasoner.total_calls(), 0);
    assert!(papers.queries().is_empty());
}

#[tokio::test]
async fn empty_paper_source_degrades_to_partial() {
    let pipeline = ResearchPipeline::new(
        Arc::new(deepfake_reasoner()),
        Arc::new(StaticPaperSource::empty()),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    for synthesis in result.synthesis.values() {
        assert_eq!(synthesis.status, SynthesisStatus::Partial);
        assert!(!synthesis.text.is_empty());
        assert!(synthesis.evidence.is_empty());
    }
    assert_eq!(result.stats.partial, 3);
    assert!(result.report.citations.is_empty());
    assert!(result.report.summary.is_some());
}

#[tokio::test]
async fn failing_paper_source_degrades_to_partial() {
    let pipeline = ResearchPipeline::new(
        Arc::new(deepfake_reasoner()),
        Arc::new(StaticPaperSource::failing(CapabilityError::connection("refused"))),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    assert!(result
        .synthesis
        .values()
        .all(|s| s.status == SynthesisStatus::Partial
            && s.error.as_deref().is_some_and(|e| e.contains("refused"))));
}

#[tokio::test]
async fn pooled_papers_serve_as_evidence() {
    let pipeline = ResearchPipeline::new(
        Arc::new(deepfake_reasoner()),
        Arc::new(StaticPaperSource::empty()),
        fast_config(),
    )
    .unwrap();

    let result = pipeline
        .run_with_pool(DEEPFAKE_QUESTION, deepfake_papers())
        .await
        .unwrap();

    let first = &result.synthesis[0];
    assert_eq!(first.status, SynthesisStatus::Ok);
    assert!(!first.evidence.is_empty());
    assert!(!result.report.citations.is_empty());
}

#[tokio::test]
async fn all_syntheses_failing_still_yields_report() {
    let reasoner = Arc::new(
        deepfake_reasoner().fail(PromptKind::Synthesize, CapabilityError::connection("down")),
    );
    let pipeline = ResearchPipeline::new(
        reasoner.clone(),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    assert_eq!(result.report.sections.len(), 3);
    assert!(result.report.sections.iter().all(|s| s.status == SynthesisStatus::Failed));
    assert!(result.report.sections.iter().all(|s| s.body.is_empty()));
    assert!(result.report.summary.is_none());
    assert_eq!(reasoner.calls(PromptKind::Summarize), 0);
    assert_eq!(result.stats.failed, 3);
}

#[tokio::test]
async fn decomposition_failure_falls_back_to_question() {
    let reasoner = deepfake_reasoner().fail(
        PromptKind::Decompose,
        CapabilityError::Timeout { timeout_secs: 5 },
    );
    let pipeline = ResearchPipeline::new(
        Arc::new(reasoner),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    assert_eq!(result.sub_questions.len(), 1);
    assert_eq!(result.sub_questions[0].text, DEEPFAKE_QUESTION);
    assert_eq!(result.report.sections[0].sub_question, DEEPFAKE_QUESTION);
}

#[tokio::test]
async fn classification_failure_degrades_to_other() {
    let reasoner = deepfake_reasoner().fail(
        PromptKind::ClassifyIntent,
        CapabilityError::permanent("401 unauthorized"),
    );
    let pipeline = ResearchPipeline::new(
        Arc::new(reasoner),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    assert_eq!(result.intent.label, IntentLabel::Other);
    assert_eq!(result.intent.confidence, 0.0);
    assert_eq!(result.report.intent, IntentLabel::Other);
}

#[tokio::test(start_paused = true)]
async fn pipeline_timeout_marks_unfinished_failed() {
    let subs = numbered_questions(3);
    let reasoner = reasoner_with_questions(&subs).with_delay(|prompt| {
        if prompt.kind == PromptKind::Synthesize && ordinal_in(prompt) == Some(2) {
            Duration::from_secs(3600)
        } else {
            Duration::ZERO
        }
    });
    let config = fast_config()
        .with_call_timeout(Duration::from_secs(7200))
        .with_pipeline_timeout(Some(Duration::from_secs(30)));
    let pipeline = ResearchPipeline::new(
        Arc::new(reasoner),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        config,
    )
    .unwrap();

    let result = pipeline.run("Survey of the field").await.unwrap();

    let statuses: Vec<SynthesisStatus> = result.synthesis.values().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SynthesisStatus::Ok, SynthesisStatus::Failed, SynthesisStatus::Ok]
    );
    assert_eq!(result.synthesis[1].error.as_deref(), Some(TIMED_OUT));
    assert_eq!(result.stats.timed_out, 1);
    assert_eq!(result.report.sections.len(), 3);
}

#[tokio::test]
async fn panicking_synthesis_is_isolated() {
    let subs = numbered_questions(3);
    let reasoner = reasoner_with_questions(&subs).on(PromptKind::Synthesize, |prompt| {
        if ordinal_in(prompt) == Some(3) {
            panic!("synthesis blew up");
        }
        Ok("fine".to_string())
    });
    let pipeline = ResearchPipeline::new(
        Arc::new(reasoner),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run("Survey of the field").await.unwrap();

    assert_eq!(result.synthesis[0].status, SynthesisStatus::Ok);
    assert_eq!(result.synthesis[1].status, SynthesisStatus::Ok);
    assert_eq!(result.synthesis[2].status, SynthesisStatus::Failed);
    assert_eq!(result.synthesis[2].error.as_deref(), Some(TASK_TERMINATED));
    assert_eq!(result.stats.timed_out, 0);
}

#[tokio::test(start_paused = true)]
async fn panicked_synthesis_is_not_counted_as_timed_out() {
    let subs = numbered_questions(3);
    let reasoner = reasoner_with_questions(&subs)
        .on(PromptKind::Synthesize, |prompt| {
            if ordinal_in(prompt) == Some(3) {
                panic!("synthesis blew up");
            }
            Ok("fine".to_string())
        })
        .with_delay(|prompt| {
            if prompt.kind == PromptKind::Synthesize && ordinal_in(prompt) == Some(2) {
                Duration::from_secs(3600)
            } else {
                Duration::ZERO
            }
        });
    let config = fast_config()
        .with_call_timeout(Duration::from_secs(7200))
        .with_pipeline_timeout(Some(Duration::from_secs(30)));
    let pipeline = ResearchPipeline::new(
        Arc::new(reasoner),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        config,
    )
    .unwrap();

    let result = pipeline.run("Survey of the field").await.unwrap();

    assert_eq!(result.synthesis[0].status, SynthesisStatus::Ok);
    assert_eq!(result.synthesis[1].error.as_deref(), Some(TIMED_OUT));
    assert_eq!(result.synthesis[2].error.as_deref(), Some(TASK_TERMINATED));
    assert_eq!(result.stats.timed_out, 1);
    assert_eq!(result.stats.failed, 2);
}

#[tokio::test(start_paused = true)]
async fn synthesis_concurrency_is_bounded() {
    let subs = numbered_questions(8);
    let reasoner = Arc::new(reasoner_with_questions(&subs).with_delay(|prompt| {
        if prompt.kind == PromptKind::Synthesize {
            Duration::from_millis(100)
        } else {
            Duration::ZERO
        }
    }));
    let pipeline = ResearchPipeline::new(
        reasoner.clone(),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config().with_max_concurrency(2),
    )
    .unwrap();

    let result = pipeline.run("Survey of the field").await.unwrap();

    assert_eq!(result.stats.ok, 8);
    assert_eq!(reasoner.calls(PromptKind::Synthesize), 8);
    assert_eq!(reasoner.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn order_survives_shuffled_completion() {
    let subs = numbered_questions(5);
    // Earlier sub-questions finish last
    let reasoner = reasoner_with_questions(&subs).with_delay(|prompt| {
        match (prompt.kind, ordinal_in(prompt)) {
            (PromptKind::Synthesize, Some(k)) => Duration::from_millis(100 * (6 - k as u64)),
            _ => Duration::ZERO,
        }
    });
    let pipeline = ResearchPipeline::new(
        Arc::new(reasoner),
        Arc::new(StaticPaperSource::empty()),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run("Survey of the field").await.unwrap();

    let keys: Vec<u32> = result.synthesis.keys().map(|id| id.ordinal()).collect();
    assert_eq!(keys, vec![1, 2, 3, 4, 5]);

    for (section, sub_question) in result.report.sections.iter().zip(&subs) {
        assert_eq!(&section.sub_question, sub_question);
        assert!(section.body.ends_with(&format!("Answer for {sub_question}")));
    }
}

#[tokio::test]
async fn repeated_runs_share_no_state() {
    let pipeline = ResearchPipeline::new(
        Arc::new(deepfake_reasoner()),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config(),
    )
    .unwrap();

    let first = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();
    let second = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.report, second.report);
    assert_eq!(first.stats.ok, second.stats.ok);
}

#[tokio::test]
async fn report_serializes_to_plain_value() {
    let pipeline = ResearchPipeline::new(
        Arc::new(deepfake_reasoner()),
        Arc::new(StaticPaperSource::new(deepfake_papers())),
        fast_config(),
    )
    .unwrap();

    let result = pipeline.run(DEEPFAKE_QUESTION).await.unwrap();
    let value = result.report.to_value().unwrap();

    assert_eq!(value["intent"], "COMPARISON");
    assert_eq!(value["sections"].as_array().unwrap().len(), 3);
    assert_eq!(value["sections"][0]["status"], "OK");
    assert_eq!(value["sections"][0]["ordinal"], 1);

    let bundle = serde_json::to_value(&result).unwrap();
    assert_eq!(bundle["synthesis"]["2"]["status"], "OK");
}

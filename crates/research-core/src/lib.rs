//! Research Core - agentic research pipeline
//!
//! Turns a free-text research question into a structured research report:
//! - Classifies the question's intent
//! - Decomposes it into ordered sub-questions
//! - Synthesizes an evidence-grounded answer per sub-question, concurrently
//! - Composes and schema-validates the final report
//!
//! Every stage except input validation degrades instead of failing, so a
//! run either fails fast on a blank question or always returns a report.
//!
//! # Example
//!
//! ```rust,ignore
//! use research_core::{PipelineConfig, ResearchPipeline};
//!
//! # async fn example(reasoner: std::sync::Arc<dyn research_core::Reasoner>,
//! #                  papers: std::sync::Arc<dyn research_core::PaperSource>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ResearchPipeline::new(reasoner, papers, PipelineConfig::new())?;
//!
//! let result = pipeline
//!     .run("Compare CNN and transformer based deepfake detection methods")
//!     .await?;
//!
//! println!("{} sections", result.report.sections.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod capability;
pub mod config;
pub mod decomposition;
pub mod error;
pub mod evidence;
pub mod intent;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod state;
pub mod synthesis;
pub mod types;

// Re-exports for convenience
pub use capability::{PaperSource, Prompt, PromptKind, Reasoner};
pub use config::{PipelineConfig, RetryConfig};
pub use decomposition::SubQuestionGenerator;
pub use error::{CapabilityError, ConfigError, PipelineError};
pub use intent::IntentClassifier;
pub use pipeline::{PipelineResult, ResearchPipeline};
pub use report::{Citation, ReportComposer, ReportSection, ResearchReport};
pub use retry::call_with_retry;
pub use state::{RunState, RunTracker};
pub use synthesis::SynthesisEngine;
pub use types::{
    EvidenceItem, Intent, IntentLabel, Paper, ResearchQuestion, RunId, RunStats, SubQuestion,
    SubQuestionId, SynthesisResult, SynthesisStatus,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the research pipeline
    pub use crate::{
        CapabilityError, Intent, IntentLabel, Paper, PaperSource, PipelineConfig, PipelineError,
        PipelineResult, Prompt, PromptKind, Reasoner, ResearchPipeline, ResearchQuestion,
        ResearchReport, SubQuestion, SynthesisResult, SynthesisStatus,
    };
}

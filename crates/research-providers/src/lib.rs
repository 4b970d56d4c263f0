//! Research Providers - concrete capabilities for the research pipeline
//!
//! - [`ArxivPaperSource`]: paper search over the arXiv Atom API
//! - [`OpenAiReasoner`]: chat-completions reasoner for any OpenAI-compatible endpoint
//!
//! Both map transport and protocol failures onto
//! [`research_core::CapabilityError`] so the pipeline's retry policy applies.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod arxiv;
pub mod error;
pub mod openai;

pub use arxiv::{ArxivConfig, ArxivPaperSource};
pub use error::ProviderError;
pub use openai::{OpenAiReasoner, ReasonerConfig};

//! # Recording Analysis
//!
//! Everything between "a recording was uploaded" and "a report was stored".
//!
//! ## Modules:
//! - **types**: data passed between the stages and persisted in reports
//! - **text_metrics**: pure transcript measurements (tempo, fillers, pauses, word error rate)
//! - **scoring**: the composite 0-100 score
//! - **history**: recent sessions as uniform advice context
//! - **advice**: repairs model output into exactly four labelled items
//! - **orchestrator**: runs the stages in order against the external services

pub mod advice;
pub mod history;
pub mod orchestrator;
pub mod scoring;
pub mod text_metrics;
pub mod types;

pub use orchestrator::{AnalysisRequest, AnalysisSettings, Analyzer, Collaborators};

// src/analyze/mod.rs
//! Candidate analysis: language services, top-K selection and quality ranking.

pub mod ai_adapter;
pub mod quality;
pub mod selector;

pub use crate::analyze::ai_adapter::{
    AnalysisRequest, Analyst, DynAnalyst, DynTranslator, TranslationRequest, Translator,
};
pub use crate::analyze::quality::{pick_best, quality_score, RankedCandidate};
pub use crate::analyze::selector::{select_candidates, AnalyzedCandidate, TOP_K};

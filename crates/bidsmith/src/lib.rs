//! Construction specification analysis and bid assembly.
//!
//! Raw document text flows through [`analysis::DocumentExtractor`] (per document),
//! [`crossref::CrossReferenceEngine`] (across documents, driven by
//! [`pipeline::ProjectAnalyzer`]) and finally [`bidding::BidAssembler`], which ranks
//! catalog products with [`matching::ProductMatcher`] and prices the result.

pub mod analysis;
pub mod bidding;
pub mod config;
pub mod crossref;
pub mod domain;
pub mod error;
pub mod matching;
pub mod money;
pub mod pipeline;
pub mod telemetry;

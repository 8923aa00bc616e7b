// src/claims/mod.rs — Claim extraction, verification and scoring

pub mod context;
pub mod extractor;
pub mod prompts;
pub mod report;
pub mod salvage;
pub mod scorer;
pub mod types;
pub mod verifier;

pub use extractor::{ClaimExtractor, ExtractedClaims};
pub use report::render_gap_report;
pub use scorer::ComplianceScore;
pub use types::*;
pub use verifier::ClaimVerifier;

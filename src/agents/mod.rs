//! Agent System
//!
//! The four stages of a competitive-intelligence run:
//!
//! - **Scout Agent**: Invokes every tool adapter concurrently and collects results
//! - **Validator Agent**: Scores each source and decides whether to retry
//! - **Analyst Agent**: Derives competitive gaps, insights and a confidence score
//! - **Writer Agent**: Renders the findings into a PDF report
//!
//! ## Pipeline Overview
//!
//! ```text
//! AnalysisRequest
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Scout     │  → Fans out over tool adapters (in parallel)
//! │   Agent     │ ◄──────────────┐
//! └─────────────┘                │
//!      │                         │ missing areas only
//!      ▼                         │ (at most one retry)
//! ┌─────────────┐                │
//! │ Validator   │  → Quality ────┘
//! │   Agent     │    verdict
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Analyst    │  → Findings
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Writer     │  → PDF report path
//! │   Agent     │
//! └─────────────┘
//! ```
//!
//! Sequencing, retries and cancellation live in [`crate::workflow`].

pub mod analyst;
pub mod scout;
pub mod validator;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main components
pub use analyst::AnalystAgent;
pub use scout::ScoutAgent;
pub use validator::ValidatorAgent;
pub use writer::{PdfReportWriter, ReportError, ReportWriter};

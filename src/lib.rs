//! askdb - Retrieval-Augmented, Human-in-the-Loop Execution Core
//!
//! Answers user questions conversationally or, for data-analytic questions,
//! by generating SQL that a human must approve before execution. Hybrid
//! retrieval (BM25 lexical scoring fused with vector paths via Reciprocal
//! Rank Fusion) supplies schema and business context to generation; an
//! approval gate suspends the workflow on a SQL proposal, persists enough
//! state to resume it, and handles approve/reject/refine decisions per
//! conversation session.

pub mod approval;
pub mod config;
pub mod engine;
pub mod error;
pub mod retrieval;
pub mod session;
pub mod storage;

pub use error::{AskdbError, Result};

//! External collaborator contracts
//!
//! The core drives a workflow engine, a summarizer, and an optional query
//! rewriter; all three are implemented out of process scope (graph
//! scheduler, LLM wrappers) and injected as trait objects.

use crate::retrieval::Document;
use crate::session::Turn;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// LLM or pipeline failure while generating an answer. Surfaced to the
    /// caller as-is; retry policy belongs to the model-invocation layer.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Resumption of a suspended execution failed
    #[error("Resume failed for checkpoint '{checkpoint_id}': {message}")]
    Resume {
        checkpoint_id: String,
        message: String,
    },

    /// Mid-stream execution failure
    #[error("Execution stream failed: {0}")]
    Stream(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything the generation stage needs for one turn
#[derive(Debug, Clone)]
pub struct EngineInput {
    /// Effective user query (refinement constraints already applied)
    pub query: String,

    /// Rolling summary of compacted history, empty on a fresh session
    pub summary: String,

    /// Retained history tail
    pub history: Vec<Turn>,

    /// Fused retrieval context for schema/business grounding
    pub context: Vec<Document>,
}

/// Suspension signal raised when the pipeline wants human approval
///
/// Carries the engine-assigned interrupt id and the SQL the engine
/// proposes to execute once approved.
#[derive(Debug, Clone)]
pub struct SuspendSignal {
    pub interrupt_id: String,
    pub proposed_sql: String,
}

/// Chunked answer stream from the engine
pub type ChunkStream = BoxStream<'static, Result<String, EngineError>>;

/// Outcome of an engine invocation
pub enum EngineReply {
    /// The pipeline ran to completion; chunks stream the answer
    Stream(ChunkStream),

    /// The pipeline suspended mid-flight awaiting human approval
    Suspended(SuspendSignal),
}

/// The workflow engine contract
///
/// The engine owns node scheduling, branch evaluation, and the physical
/// interrupt/resume primitives; it snapshots in-flight state under the
/// checkpoint id this core mints for each fresh attempt.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Run the pipeline for one turn, checkpointing under `checkpoint_id`
    async fn stream(
        &self,
        input: EngineInput,
        checkpoint_id: &str,
    ) -> Result<EngineReply, EngineError>;

    /// Resume a suspended execution with the human's reply as payload
    async fn resume(
        &self,
        checkpoint_id: &str,
        interrupt_id: &str,
        resume_data: &str,
    ) -> Result<EngineReply, EngineError>;
}

/// Compacts older conversation turns into a rolling summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Merge the previous summary and the turns being compacted into a new
    /// summary
    async fn summarize(
        &self,
        previous_summary: &str,
        turns: &[Turn],
    ) -> anyhow::Result<String>;
}

/// Rewrites a follow-up question into a standalone retrieval query
///
/// Follow-ups like "and by region?" retrieve poorly verbatim; the rewriter
/// folds the session summary and recent turns into a self-contained search
/// statement.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(
        &self,
        summary: &str,
        history: &[Turn],
        query: &str,
    ) -> anyhow::Result<String>;
}

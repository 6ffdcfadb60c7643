//! Approval-gated execution protocol
//!
//! A generated SQL proposal suspends the workflow until a human decides:
//! approve (resume the suspended execution), reject (abandon it and ask
//! for a supplemental constraint), or refine (restart generation with the
//! constraint folded in). Gate state is an explicit enum with an
//! exhaustive transition function; every decision for a session is
//! strictly sequential.

use serde::{Deserialize, Serialize};

mod gate;

pub use gate::ApprovalGate;

/// Canonical approval tokens, matched case-insensitively after trimming.
///
/// Fixed compatibility contract with every front end; changing this set
/// requires a coordinated protocol version bump.
pub const APPROVAL_TOKENS: [&str; 3] = ["YES", "执行", "批准执行"];

/// Whether a user reply is an approval of the pending proposal
pub fn is_approval_token(message: &str) -> bool {
    let trimmed = message.trim();
    APPROVAL_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Per-session approval state
///
/// At most one exists per session. Created when the pipeline suspends;
/// replaced (not mutated) on rejection with the refinement marker; deleted
/// on approval-resume success or refinement completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalContext {
    /// Engine-assigned id of the suspension point; empty once the
    /// suspended execution has been abandoned
    pub interrupt_id: String,

    /// Checkpoint the suspended execution can resume from; empty once
    /// abandoned
    pub checkpoint_id: String,

    /// The query that produced the proposal, kept for refinement
    pub original_query: String,

    /// True after a rejection, while the supplemental constraint is
    /// awaited
    pub waiting_refinement: bool,
}

impl ApprovalContext {
    /// Context for a freshly suspended proposal
    pub fn proposed(
        interrupt_id: impl Into<String>,
        checkpoint_id: impl Into<String>,
        original_query: impl Into<String>,
    ) -> Self {
        Self {
            interrupt_id: interrupt_id.into(),
            checkpoint_id: checkpoint_id.into(),
            original_query: original_query.into(),
            waiting_refinement: false,
        }
    }

    /// Context after a rejection: the suspended execution is abandoned,
    /// only the original query survives
    pub fn refinement(original_query: impl Into<String>) -> Self {
        Self {
            interrupt_id: String::new(),
            checkpoint_id: String::new(),
            original_query: original_query.into(),
            waiting_refinement: true,
        }
    }
}

/// Gate state, derived from the session's approval context slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No proposal pending
    Idle,
    /// A SQL proposal awaits the human decision
    Proposed,
    /// The proposal was rejected; a supplemental constraint is awaited
    AwaitingRefinement,
}

/// Classify the approval context slot into a gate state
pub fn classify(context: Option<&ApprovalContext>) -> GateState {
    match context {
        None => GateState::Idle,
        Some(ctx) if ctx.waiting_refinement => GateState::AwaitingRefinement,
        Some(_) => GateState::Proposed,
    }
}

/// What the gate must do with an incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    /// Run the full pipeline from scratch
    StartFresh,

    /// An approval token arrived with no pending proposal (lost state,
    /// duplicate message, process restart): log and treat the literal
    /// message as a fresh invocation
    StaleResume,

    /// Resume the suspended execution recorded in the context
    Resume { context: ApprovalContext },

    /// Abandon the suspended execution and ask for a constraint
    Reject { original_query: String },

    /// Restart generation with the constraint folded into the query
    Refine { original_query: String },
}

/// The exhaustive transition function of the gate state machine
pub fn transition(context: Option<&ApprovalContext>, message: &str) -> GateAction {
    match (classify(context), is_approval_token(message)) {
        (GateState::Idle, true) => GateAction::StaleResume,
        (GateState::Idle, false) => GateAction::StartFresh,
        (GateState::Proposed, true) => GateAction::Resume {
            context: context.cloned().expect("Proposed state implies a context"),
        },
        (GateState::Proposed, false) => GateAction::Reject {
            original_query: context
                .map(|c| c.original_query.clone())
                .expect("Proposed state implies a context"),
        },
        // Any reply completes the refinement, approval token or not
        (GateState::AwaitingRefinement, _) => GateAction::Refine {
            original_query: context
                .map(|c| c.original_query.clone())
                .expect("AwaitingRefinement state implies a context"),
        },
    }
}

/// One caller request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: String,
}

/// The produced contract: exactly one of three response shapes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChatResponse {
    /// The pipeline ran to completion
    Success { answer: String },

    /// A SQL proposal awaits approval; nothing was executed
    NeedApproval {
        answer: String,
        session_id: String,
        interrupt_id: String,
    },

    /// The proposal was rejected; a supplemental constraint is expected
    NeedRefinement { answer: String },
}

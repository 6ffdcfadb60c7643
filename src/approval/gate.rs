//! Gate orchestrator
//!
//! Executes the state machine's decisions against the workflow engine and
//! the session registry: fresh runs go retrieval -> generation and may
//! suspend into a proposal; approvals resume the suspended execution;
//! rejections abandon it and collect a supplemental constraint.

use crate::approval::{
    transition, ApprovalContext, ChatRequest, ChatResponse, GateAction,
};
use crate::engine::{ChunkStream, EngineInput, EngineReply, QueryRewriter, Summarizer, WorkflowEngine};
use crate::error::Result;
use crate::retrieval::HybridRetriever;
use crate::session::{Session, SessionRegistry};
use futures::StreamExt;
use std::sync::Arc;

/// Approval-gated chat entry point
///
/// One instance serves all sessions; the registry's per-session locks keep
/// each session's decisions strictly sequential while distinct sessions
/// proceed concurrently.
pub struct ApprovalGate {
    engine: Arc<dyn WorkflowEngine>,
    retriever: Arc<HybridRetriever>,
    registry: Arc<SessionRegistry>,
    summarizer: Arc<dyn Summarizer>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
}

impl ApprovalGate {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        retriever: Arc<HybridRetriever>,
        registry: Arc<SessionRegistry>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            engine,
            retriever,
            registry,
            summarizer,
            rewriter: None,
        }
    }

    /// Install a query rewriter for follow-up questions
    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Handle one caller message for a session
    ///
    /// Dropping the returned future cancels in-flight retrieval and
    /// generation; a proposal aborted this way stays recoverable through
    /// the stale-resume rule.
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let _guard = self.registry.lock_session(&request.session_id).await;

        let context = self.registry.approval_context(&request.session_id);
        match transition(context.as_ref(), &request.query) {
            GateAction::StartFresh => {
                self.run_fresh(&request.session_id, &request.query, &request.query)
                    .await
            }
            GateAction::StaleResume => {
                tracing::warn!(
                    session_id = %request.session_id,
                    "approval token with no pending proposal; treating as a new query"
                );
                self.run_fresh(&request.session_id, &request.query, &request.query)
                    .await
            }
            GateAction::Resume { context } => {
                self.resume(&request.session_id, &request.query, context).await
            }
            GateAction::Reject { original_query } => {
                tracing::info!(
                    session_id = %request.session_id,
                    "proposal rejected; awaiting supplemental constraint"
                );
                self.registry.put_approval_context(
                    &request.session_id,
                    ApprovalContext::refinement(original_query),
                );
                Ok(ChatResponse::NeedRefinement {
                    answer: "The proposed SQL was not approved and will not run. \
                             Reply with a supplemental constraint to refine the query."
                        .to_string(),
                })
            }
            GateAction::Refine { original_query } => {
                self.registry.remove_approval_context(&request.session_id);
                let effective = format!(
                    "{} (supplemental constraint: {})",
                    original_query, request.query
                );
                tracing::info!(
                    session_id = %request.session_id,
                    query = %effective,
                    "restarting generation with refined query"
                );
                self.run_fresh(&request.session_id, &effective, &request.query)
                    .await
            }
        }
    }

    /// Full pipeline from scratch: retrieve, generate, and either answer
    /// or suspend into a proposal
    async fn run_fresh(
        &self,
        session_id: &str,
        effective_query: &str,
        raw_message: &str,
    ) -> Result<ChatResponse> {
        let mut session = self.registry.get(session_id);

        let search_query = self.search_query(&session, effective_query).await;
        let context_docs = self.retriever.retrieve(&search_query).await?;

        let checkpoint_id = self.registry.new_checkpoint_id(session_id);
        let input = EngineInput {
            query: effective_query.to_string(),
            summary: session.summary.clone(),
            history: session.history.clone(),
            context: context_docs,
        };

        match self.engine.stream(input, &checkpoint_id).await? {
            EngineReply::Suspended(signal) => {
                tracing::info!(
                    session_id,
                    checkpoint_id = %checkpoint_id,
                    interrupt_id = %signal.interrupt_id,
                    "pipeline suspended awaiting approval"
                );
                self.registry.put_approval_context(
                    session_id,
                    ApprovalContext::proposed(
                        signal.interrupt_id.clone(),
                        checkpoint_id,
                        effective_query,
                    ),
                );
                Ok(ChatResponse::NeedApproval {
                    answer: render_approval_prompt(&signal.proposed_sql),
                    session_id: session_id.to_string(),
                    interrupt_id: signal.interrupt_id,
                })
            }
            EngineReply::Stream(stream) => {
                let answer = collect_stream(stream).await?;
                session.record_exchange(raw_message, &answer);
                let _ = self
                    .registry
                    .spawn_compact_and_save(session, Arc::clone(&self.summarizer));
                Ok(ChatResponse::Success { answer })
            }
        }
    }

    /// Resume the suspended execution with the literal approval reply
    async fn resume(
        &self,
        session_id: &str,
        raw_message: &str,
        context: ApprovalContext,
    ) -> Result<ChatResponse> {
        tracing::info!(
            session_id,
            checkpoint_id = %context.checkpoint_id,
            interrupt_id = %context.interrupt_id,
            "resuming suspended execution"
        );

        // A failed resume leaves the context in place so the caller can
        // retry; only a completed execution consumes it.
        let reply = self
            .engine
            .resume(&context.checkpoint_id, &context.interrupt_id, raw_message)
            .await?;

        match reply {
            EngineReply::Stream(stream) => {
                let answer = collect_stream(stream).await?;
                self.registry.remove_approval_context(session_id);

                let mut session = self.registry.get(session_id);
                session.record_exchange(raw_message, &answer);
                let _ = self
                    .registry
                    .spawn_compact_and_save(session, Arc::clone(&self.summarizer));

                Ok(ChatResponse::Success { answer })
            }
            EngineReply::Suspended(signal) => {
                // The engine raised a further suspension point; the turn
                // becomes a new proposal under the same original query
                self.registry.put_approval_context(
                    session_id,
                    ApprovalContext::proposed(
                        signal.interrupt_id.clone(),
                        context.checkpoint_id,
                        context.original_query,
                    ),
                );
                Ok(ChatResponse::NeedApproval {
                    answer: render_approval_prompt(&signal.proposed_sql),
                    session_id: session_id.to_string(),
                    interrupt_id: signal.interrupt_id,
                })
            }
        }
    }

    /// Retrieval query for this turn, via the rewriter when installed
    ///
    /// First turns are used verbatim; a rewrite failure falls back to the
    /// original query rather than failing the request.
    async fn search_query(&self, session: &Session, query: &str) -> String {
        let rewriter = match &self.rewriter {
            Some(rewriter) if !session.history.is_empty() || !session.summary.is_empty() => {
                rewriter
            }
            _ => return query.to_string(),
        };

        match rewriter
            .rewrite(&session.summary, &session.history, query)
            .await
        {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "query rewrite failed; retrieving with the original query"
                );
                query.to_string()
            }
        }
    }
}

/// Human-readable proposal message with the SQL to be approved
fn render_approval_prompt(sql: &str) -> String {
    format!(
        "A SQL execution request was detected. Reply YES / 执行 / 批准执行 to run it.\n\n```sql\n{}\n```",
        sql
    )
}

async fn collect_stream(mut stream: ChunkStream) -> std::result::Result<String, crate::engine::EngineError> {
    let mut answer = String::new();
    while let Some(chunk) = stream.next().await {
        answer.push_str(&chunk?);
    }
    Ok(answer)
}

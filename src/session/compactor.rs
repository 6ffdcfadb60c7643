//! History compaction into the rolling summary
//!
//! When a session's history outgrows the configured retention length, the
//! older turns are merged into the summary via the external summarizer and
//! only the tail is kept verbatim. Triggered opportunistically after a
//! successful turn, never synchronously on reads.

use crate::engine::Summarizer;
use crate::session::Session;

/// Compact all but the most recent `max_history_len` turns into the
/// session summary
///
/// Returns whether compaction ran. The session is only mutated after the
/// summarizer succeeds; a summarization failure leaves history and summary
/// exactly as they were.
pub async fn compact_history(
    session: &mut Session,
    summarizer: &dyn Summarizer,
    max_history_len: usize,
) -> anyhow::Result<bool> {
    if session.history.len() <= max_history_len {
        return Ok(false);
    }

    let split = session.history.len() - max_history_len;
    let older = &session.history[..split];

    let new_summary = summarizer.summarize(&session.summary, older).await?;

    session.history.drain(..split);
    session.summary = new_summary;
    session.updated_at = chrono::Utc::now();

    tracing::debug!(
        session_id = %session.id,
        compacted = split,
        retained = session.history.len(),
        "compacted session history"
    );

    Ok(true)
}

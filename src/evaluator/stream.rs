//! `/stream` (spec §4.5, §4.8): toggles NDJSON streaming for a
//! callable. Rejected when an after-guard is already registered on that
//! callable (`STREAM_AFTER_GUARD_CONFLICT`) — a guard needs the whole
//! result to decide allow/deny/transform, which a stream can't provide
//! incrementally.

use crate::errors::{MlldError, MlldResult};

use super::Evaluator;

pub async fn eval_stream(ev: &Evaluator, enabled: bool, target: Option<&str>) -> MlldResult<()> {
    if !enabled {
        return Ok(());
    }
    let operation = target.unwrap_or("run");
    if ev.guards.lock().await.has_after_guard(operation) {
        return Err(MlldError::StreamAfterGuardConflict);
    }
    Ok(())
}

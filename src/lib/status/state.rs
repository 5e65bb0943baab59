use chrono::DateTime;

use super::types::{CanonicalStatus, Classification, FailureReason, RunState, TimestampError};

/// Actions after which the container's run state is inspected.
pub const TERMINAL_ACTIONS: [&str; 3] = ["die", "stop", "kill"];

pub fn is_terminal(action: &str) -> bool {
    TERMINAL_ACTIONS.contains(&action)
}

/// Maps a raw runtime action to its canonical status.
///
/// Matching is exact; anything unmatched is reported as the upper-cased action.
/// `kill` has no dedicated status and therefore reports `KILL`. That mirrors the
/// deployed behaviour and is kept until product confirms whether it should read
/// `STOP` instead.
pub fn canonical_status(action: &str) -> CanonicalStatus {
    match action {
        "oom" => CanonicalStatus::Failure,
        "create" => CanonicalStatus::Created,
        "start" => CanonicalStatus::Running,
        "stop" => CanonicalStatus::Stop,
        other => CanonicalStatus::Other(other.to_uppercase()),
    }
}

/// Derives status and enrichment for one action.
///
/// `state` is only consulted for terminal actions; callers that could not
/// inspect the container pass `None` and get the plain action mapping.
pub fn classify(action: &str, state: Option<&RunState>) -> Classification {
    let mut classification = Classification {
        status: canonical_status(action),
        exit_code: None,
        elapsed_secs: None,
        failure_reason: None,
        timestamp_error: None,
    };

    if let Some(state) = state.filter(|_| is_terminal(action)) {
        apply_terminal_state(&mut classification, state);
    }

    classification
}

fn apply_terminal_state(classification: &mut Classification, state: &RunState) {
    classification.exit_code = Some(state.exit_code);

    if state.exit_code != 0 {
        classification.status = CanonicalStatus::Failure;
    } else if !state.paused && !state.restarting && !state.running {
        classification.status = CanonicalStatus::Success;
    }

    // OOM wins over whatever the exit code said.
    if state.oom_killed {
        classification.failure_reason = Some(FailureReason::Oom);
        classification.status = CanonicalStatus::Failure;
    }

    match elapsed_secs(&state.started_at, &state.finished_at) {
        Ok(secs) if secs > 0 => classification.elapsed_secs = Some(secs as u64),
        Ok(_) => {}
        Err(err) => classification.timestamp_error = Some(err),
    }
}

/// Whole seconds between two RFC 3339 timestamps. May be zero or negative.
pub fn elapsed_secs(started_at: &str, finished_at: &str) -> Result<i64, TimestampError> {
    let start = parse_timestamp("start", started_at)?;
    let finish = parse_timestamp("finish", finished_at)?;

    Ok(finish.timestamp() - start.timestamp())
}

fn parse_timestamp(
    field: &'static str,
    value: &str,
) -> Result<DateTime<chrono::FixedOffset>, TimestampError> {
    DateTime::parse_from_rfc3339(value).map_err(|source| TimestampError {
        field,
        value: value.to_string(),
        source,
    })
}

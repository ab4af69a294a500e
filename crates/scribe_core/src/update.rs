use crate::{
    Effect, JobId, JobSnapshot, JobStatus, Msg, ObservationError, ObservationId, Phase,
    SessionState, SnapshotPurpose, StatusEvent,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages tagged with an observation that is no longer current (superseded
/// or cancelled) are dropped without touching state.
pub fn update(mut state: SessionState, msg: Msg) -> (SessionState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested {
            request,
            requested_at,
        } => {
            if state.phase() == Phase::Uploading {
                return (state, Vec::new());
            }
            let observation = state.begin_upload(requested_at);
            vec![
                Effect::CloseSubscription,
                Effect::Submit {
                    observation,
                    request,
                },
            ]
        }
        Msg::SubmitSucceeded {
            observation,
            job_id,
            status,
        } => {
            if !state.is_current(observation) || state.phase() != Phase::Uploading {
                return (state, Vec::new());
            }
            state.begin_tracking(job_id.clone(), JobStatus::Pending);
            apply_event(
                &mut state,
                observation,
                &job_id,
                StatusEvent::new(status, None),
                true,
            )
        }
        Msg::SubmitFailed {
            observation,
            reason,
        } => {
            if state.is_current(observation) && state.phase() == Phase::Uploading {
                state.fail_submission(reason);
            }
            Vec::new()
        }
        Msg::ObserveRequested {
            job_id,
            known_status,
            created_at,
        } => {
            let known_status = known_status.filter(|status| *status != JobStatus::Uploading);
            let placeholder = known_status.unwrap_or(JobStatus::Pending);
            let observation = state.begin_observation(job_id.clone(), placeholder, created_at);
            let mut effects = vec![Effect::CloseSubscription];
            match known_status {
                Some(status) if !status.is_terminal() => {
                    effects.push(Effect::OpenChannel {
                        observation,
                        job_id,
                    });
                }
                // Terminal or unknown: one snapshot decides what happens next.
                _ => {
                    state.request_snapshot(SnapshotPurpose::Resolve);
                    effects.push(Effect::FetchSnapshot {
                        observation,
                        job_id,
                    });
                }
            }
            effects
        }
        Msg::ChannelEvent { observation, event } => {
            if !state.is_current(observation) || state.job_is_terminal() {
                return (state, Vec::new());
            }
            let Some(job_id) = state.job().map(|job| job.id.clone()) else {
                return (state, Vec::new());
            };
            apply_event(&mut state, observation, &job_id, event, false)
        }
        Msg::ChannelLost {
            observation,
            reason,
        } => {
            if !state.is_current(observation) || state.job_is_terminal() {
                return (state, Vec::new());
            }
            state.set_error(ObservationError::ChannelTransport(reason));
            vec![Effect::CloseSubscription]
        }
        Msg::SnapshotFetched {
            observation,
            snapshot,
        } => {
            if !state.is_current(observation) {
                return (state, Vec::new());
            }
            let Some(purpose) = state.take_pending_snapshot() else {
                return (state, Vec::new());
            };
            state.mark_dirty();
            apply_snapshot(&mut state, observation, purpose, snapshot)
        }
        Msg::SnapshotFailed {
            observation,
            reason,
        } => {
            if state.is_current(observation) && state.take_pending_snapshot().is_some() {
                state.set_error(ObservationError::SnapshotFetch(reason));
            }
            Vec::new()
        }
        Msg::RetrySnapshot => {
            let retryable = matches!(state.error(), Some(ObservationError::SnapshotFetch(_)))
                && state.pending_snapshot().is_none();
            let (Some(observation), Some(job)) = (state.current_observation(), state.job())
            else {
                return (state, Vec::new());
            };
            if !retryable {
                return (state, Vec::new());
            }
            let job_id = job.id.clone();
            let purpose = if job.status == JobStatus::Completed {
                SnapshotPurpose::Transcript
            } else {
                SnapshotPurpose::Resolve
            };
            state.clear_error();
            state.request_snapshot(purpose);
            vec![Effect::FetchSnapshot {
                observation,
                job_id,
            }]
        }
        Msg::CancelRequested { observation } => {
            if !state.is_current(observation) {
                return (state, Vec::new());
            }
            state.cancel();
            vec![Effect::CloseSubscription]
        }
    };

    (state, effects)
}

/// Applies one status transition. `from_submission` marks the initial status
/// returned by the submit call, which still needs a channel when non-terminal.
fn apply_event(
    state: &mut SessionState,
    observation: ObservationId,
    job_id: &JobId,
    event: StatusEvent,
    from_submission: bool,
) -> Vec<Effect> {
    match event.status {
        JobStatus::Completed => {
            state.set_status(JobStatus::Completed);
            state.apply_message(event.message);
            state.request_snapshot(SnapshotPurpose::Transcript);
            vec![
                Effect::CloseSubscription,
                Effect::FetchSnapshot {
                    observation,
                    job_id: job_id.clone(),
                },
            ]
        }
        JobStatus::Failed => {
            state.mark_failed(event.message);
            vec![Effect::CloseSubscription]
        }
        status => {
            // UPLOADING never comes from the server; keep the current status.
            if status != JobStatus::Uploading {
                state.set_status(status);
            }
            state.apply_message(event.message);
            if from_submission {
                vec![Effect::OpenChannel {
                    observation,
                    job_id: job_id.clone(),
                }]
            } else {
                Vec::new()
            }
        }
    }
}

fn apply_snapshot(
    state: &mut SessionState,
    observation: ObservationId,
    purpose: SnapshotPurpose,
    snapshot: JobSnapshot,
) -> Vec<Effect> {
    let Some(job) = state.job() else {
        return Vec::new();
    };
    let job_id = job.id.clone();
    let current_status = job.status;

    // A terminal job never changes status again; a disagreeing snapshot only
    // means retrieval failed.
    if current_status.is_terminal() && snapshot.status != current_status {
        state.set_error(ObservationError::SnapshotFetch(format!(
            "server reported {} for a job already {current_status}",
            snapshot.status
        )));
        return Vec::new();
    }

    match snapshot.status {
        JobStatus::Completed => {
            state.apply_completed_snapshot(snapshot);
            Vec::new()
        }
        JobStatus::Failed => {
            state.mark_failed(snapshot.message);
            Vec::new()
        }
        status => {
            if purpose == SnapshotPurpose::Transcript {
                return Vec::new();
            }
            state.set_status(match status {
                JobStatus::Uploading => JobStatus::Pending,
                other => other,
            });
            state.apply_message(snapshot.message);
            vec![Effect::OpenChannel {
                observation,
                job_id,
            }]
        }
    }
}
